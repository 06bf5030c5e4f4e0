//! # Validation Module
//!
//! Input validation for values that reach the ledger.
//!
//! ## Where Validation Happens
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Presentation layer                                                     │
//! │  └── raw sale amounts: any sign, magnitude bounded by MAX_AMOUNT_CENTS  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  THIS MODULE                                                            │
//! │  ├── line items: quantity in 1..=999, price ≥ 0, name present           │
//! │  │   (the quick-sale line carries the raw amount, so any sign)          │
//! │  ├── inventory: name, unit, price                                       │
//! │  └── config: utc offset, list limit                                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Store codec: rejects malformed documents on read                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tillbook_core::validation::{validate_product_name, validate_quantity};
//!
//! validate_product_name("Whole Wheat Bread").unwrap();
//! validate_quantity(5).unwrap();
//! assert!(validate_quantity(0).is_err());
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{InventoryPatch, LineItem, NewInventoryItem};
use crate::ident::product_slug;
use crate::{MAX_AMOUNT_CENTS, MAX_LINE_QUANTITY, QUICK_SALE_PRODUCT_ID};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_NAME_LEN: usize = 200;
const MAX_UNIT_LEN: usize = 20;
const MAX_PRODUCT_ID_LEN: usize = 100;

/// Largest accepted shop UTC offset, in minutes (UTC±14:00).
pub const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

/// Largest accepted listing limit.
pub const MAX_LIST_LIMIT: usize = 10_000;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product name.
///
/// ## Rules
/// - Must not be empty (after trimming)
/// - Must be at most 200 characters
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "product_name".to_string(),
        });
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "product_name".to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(())
}

/// Validates a product id on a line item.
///
/// An empty id is allowed (the line item is simply not linked yet).
pub fn validate_product_id(product_id: &str) -> ValidationResult<()> {
    if product_id.len() > MAX_PRODUCT_ID_LEN {
        return Err(ValidationError::TooLong {
            field: "product_id".to_string(),
            max: MAX_PRODUCT_ID_LEN,
        });
    }
    Ok(())
}

/// Validates that a product id is a canonical inventory slug.
///
/// Ids reach the store as document ids, so anything other than the
/// lowercase-dash form `product_slug` produces is refused.
pub fn validate_product_slug(product_id: &str) -> ValidationResult<()> {
    validate_product_id(product_id)?;
    match product_slug(product_id) {
        Ok(slug) if slug == product_id => Ok(()),
        _ => Err(ValidationError::InvalidFormat {
            field: "product_id".to_string(),
            reason: "must be lowercase letters, digits and single dashes".to_string(),
        }),
    }
}

/// Validates an inventory unit label ("pcs", "kg").
pub fn validate_unit(unit: &str) -> ValidationResult<()> {
    let unit = unit.trim();

    if unit.is_empty() {
        return Err(ValidationError::Required {
            field: "unit".to_string(),
        });
    }

    if unit.chars().count() > MAX_UNIT_LEN {
        return Err(ValidationError::TooLong {
            field: "unit".to_string(),
            max: MAX_UNIT_LEN,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line item quantity.
///
/// ## Example
/// ```rust
/// use tillbook_core::validation::validate_quantity;
///
/// assert!(validate_quantity(1).is_ok());
/// assert!(validate_quantity(999).is_ok());
/// assert!(validate_quantity(1000).is_err());
/// ```
pub fn validate_quantity(qty: u32) -> ValidationResult<()> {
    if qty == 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY as i64,
        });
    }

    Ok(())
}

/// Validates a raw sale amount.
///
/// Zero and negative amounts (refunds, corrections) are recorded as given;
/// only the magnitude is bounded.
pub fn validate_amount(amount: Money) -> ValidationResult<()> {
    check_amount_range("amount", amount)
}

/// Validates a unit price (zero is allowed for giveaways).
pub fn validate_price(price: Money) -> ValidationResult<()> {
    if price.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "price".to_string(),
        });
    }
    check_amount_range("price", price)
}

fn check_amount_range(field: &str, amount: Money) -> ValidationResult<()> {
    if !(-MAX_AMOUNT_CENTS..=MAX_AMOUNT_CENTS).contains(&amount.cents()) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: -MAX_AMOUNT_CENTS,
            max: MAX_AMOUNT_CENTS,
        });
    }
    Ok(())
}

/// Validates a shop UTC offset in minutes.
pub fn validate_utc_offset(minutes: i32) -> ValidationResult<()> {
    if !(-MAX_UTC_OFFSET_MINUTES..=MAX_UTC_OFFSET_MINUTES).contains(&minutes) {
        return Err(ValidationError::OutOfRange {
            field: "utc_offset_minutes".to_string(),
            min: -(MAX_UTC_OFFSET_MINUTES as i64),
            max: MAX_UTC_OFFSET_MINUTES as i64,
        });
    }
    Ok(())
}

/// Validates a listing limit.
pub fn validate_list_limit(limit: usize) -> ValidationResult<()> {
    if limit == 0 || limit > MAX_LIST_LIMIT {
        return Err(ValidationError::OutOfRange {
            field: "list_limit".to_string(),
            min: 1,
            max: MAX_LIST_LIMIT as i64,
        });
    }
    Ok(())
}

// =============================================================================
// Composite Validators
// =============================================================================

/// Validates one line item.
///
/// The quick-sale line holds a raw amount, so its price may be negative.
pub fn validate_line_item(item: &LineItem) -> ValidationResult<()> {
    validate_product_id(&item.product_id)?;
    validate_product_name(&item.product_name)?;
    validate_quantity(item.quantity)?;
    if item.product_id == QUICK_SALE_PRODUCT_ID {
        validate_amount(item.price)
    } else {
        validate_price(item.price)
    }
}

/// Validates every line item in a list.
pub fn validate_line_items(items: &[LineItem]) -> ValidationResult<()> {
    items.iter().try_for_each(validate_line_item)
}

/// Validates input for a new inventory item.
pub fn validate_new_inventory_item(item: &NewInventoryItem) -> ValidationResult<()> {
    validate_product_name(&item.product_name)?;
    validate_unit(&item.unit)?;
    if item.unit_price.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "unit_price".to_string(),
        });
    }
    check_amount_range("unit_price", item.unit_price)
}

/// Validates the fields present on an inventory patch.
pub fn validate_inventory_patch(patch: &InventoryPatch) -> ValidationResult<()> {
    if let Some(name) = &patch.product_name {
        validate_product_name(name)?;
    }
    if let Some(unit) = &patch.unit {
        validate_unit(unit)?;
    }
    if let Some(price) = patch.unit_price {
        if price.is_negative() {
            return Err(ValidationError::MustNotBeNegative {
                field: "unit_price".to_string(),
            });
        }
        check_amount_range("unit_price", price)?;
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_product_name() {
        assert!(validate_product_name("Bread").is_ok());
        assert!(validate_product_name("   ").is_err());
        assert!(validate_product_name(&"x".repeat(201)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(matches!(
            validate_quantity(0),
            Err(ValidationError::MustBePositive { .. })
        ));
        assert!(validate_quantity(MAX_LINE_QUANTITY).is_ok());
        assert!(matches!(
            validate_quantity(MAX_LINE_QUANTITY + 1),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_validate_price() {
        assert!(validate_price(Money::zero()).is_ok());
        assert!(validate_price(Money::from_cents(-1)).is_err());
        assert!(validate_price(Money::from_cents(MAX_AMOUNT_CENTS)).is_ok());
        assert!(matches!(
            validate_price(Money::from_cents(MAX_AMOUNT_CENTS + 1)),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(Money::zero()).is_ok());
        assert!(validate_amount(Money::from_cents(-500)).is_ok());
        assert!(validate_amount(Money::from_cents(-MAX_AMOUNT_CENTS)).is_ok());
        assert!(matches!(
            validate_amount(Money::from_cents(i64::MAX)),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(matches!(
            validate_amount(Money::from_cents(i64::MIN)),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_validate_product_slug() {
        assert!(validate_product_slug("whole-wheat-bread").is_ok());
        assert!(validate_product_slug(QUICK_SALE_PRODUCT_ID).is_ok());
        assert!(validate_product_slug("").is_err());
        assert!(validate_product_slug("bread/../milk").is_err());
        assert!(validate_product_slug("Bread").is_err());
        assert!(validate_product_slug("bread-").is_err());
    }

    #[test]
    fn test_validate_line_item() {
        let ok = LineItem::new("bread", "Bread", 2, Money::from_cents(300));
        assert!(validate_line_item(&ok).is_ok());

        // unlinked items are valid, they just derive a pending status
        let unlinked = LineItem::new("", "Loose item", 1, Money::from_cents(100));
        assert!(validate_line_item(&unlinked).is_ok());

        let bad = LineItem::new("bread", "Bread", 0, Money::from_cents(300));
        assert!(validate_line_items(&[ok, bad]).is_err());
    }

    #[test]
    fn test_quick_sale_line_may_be_negative() {
        let refund = LineItem::quick_sale(Money::from_cents(-500));
        assert!(validate_line_item(&refund).is_ok());

        let linked = LineItem::new("bread", "Bread", 1, Money::from_cents(-500));
        assert!(matches!(
            validate_line_item(&linked),
            Err(ValidationError::MustNotBeNegative { .. })
        ));

        let huge = LineItem::quick_sale(Money::from_cents(-MAX_AMOUNT_CENTS - 1));
        assert!(matches!(
            validate_line_item(&huge),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_validate_inventory_input() {
        let item = NewInventoryItem {
            product_name: "Milk".to_string(),
            unit_price: Money::from_cents(150),
            stock_amount: 12,
            unit: "l".to_string(),
        };
        assert!(validate_new_inventory_item(&item).is_ok());

        let no_unit = NewInventoryItem {
            unit: String::new(),
            ..item
        };
        assert!(validate_new_inventory_item(&no_unit).is_err());

        let patch = InventoryPatch {
            unit_price: Some(Money::from_cents(-5)),
            ..Default::default()
        };
        assert!(validate_inventory_patch(&patch).is_err());
    }

    #[test]
    fn test_validate_config_values() {
        assert!(validate_utc_offset(0).is_ok());
        assert!(validate_utc_offset(-300).is_ok());
        assert!(validate_utc_offset(15 * 60).is_err());

        assert!(validate_list_limit(50).is_ok());
        assert!(validate_list_limit(0).is_err());
    }
}
