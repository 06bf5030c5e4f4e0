//! # Identity Derivation
//!
//! Shop ids, product slugs and transaction ids.
//!
//! ```text
//! "+1 (555) 010-2000"  ──derive_shop_id──►  "1_555_010_2000"
//! "Whole Wheat Bread"  ──product_slug────►  "whole-wheat-bread"
//! now() in millis      ──next_id─────────►  "1710000000000" (strictly increasing)
//! ```

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

use crate::error::ValidationError;

/// Lowercases `input`, keeps ASCII alphanumerics and collapses every other
/// run of characters into `separator`. Leading and trailing separators are
/// dropped.
fn normalize(input: &str, separator: char) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_separator = false;

    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_separator && !out.is_empty() {
                out.push(separator);
            }
            pending_separator = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }

    out
}

/// Derives a shop id from a contact string (phone number or e-mail).
pub fn derive_shop_id(contact: &str) -> Result<String, ValidationError> {
    let id = normalize(contact, '_');
    if id.is_empty() {
        return Err(ValidationError::Required {
            field: "contact".to_string(),
        });
    }
    Ok(id)
}

/// Derives the inventory product id from a product name.
pub fn product_slug(name: &str) -> Result<String, ValidationError> {
    let slug = normalize(name, '-');
    if slug.is_empty() {
        return Err(ValidationError::InvalidFormat {
            field: "product_name".to_string(),
            reason: "must contain at least one letter or digit".to_string(),
        });
    }
    Ok(slug)
}

/// Hands out timestamp-derived transaction ids.
///
/// Two sales recorded within the same millisecond still get distinct,
/// ordered ids: each id is `max(now_ms, previous + 1)`.
#[derive(Debug, Default)]
pub struct TransactionIdGenerator {
    last: AtomicI64,
}

impl TransactionIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id for a sale created at `now`.
    pub fn next_id(&self, now: DateTime<Utc>) -> String {
        let now_ms = now.timestamp_millis();
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now_ms.max(last.saturating_add(1)))
            })
            // the closure always returns Some
            .unwrap_or(now_ms);

        now_ms.max(previous.saturating_add(1)).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_shop_id_from_phone_and_email() {
        assert_eq!(derive_shop_id("+1 (555) 010-2000").unwrap(), "1_555_010_2000");
        assert_eq!(derive_shop_id("Owner@Corner.Shop").unwrap(), "owner_corner_shop");
        assert_eq!(derive_shop_id("  0712345678  ").unwrap(), "0712345678");
    }

    #[test]
    fn test_shop_id_is_stable() {
        let a = derive_shop_id("owner@corner.shop").unwrap();
        let b = derive_shop_id("OWNER@corner.shop").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_shop_id_rejects_empty() {
        assert!(derive_shop_id("").is_err());
        assert!(derive_shop_id(" +() - ").is_err());
    }

    #[test]
    fn test_product_slug() {
        assert_eq!(product_slug("Whole Wheat Bread").unwrap(), "whole-wheat-bread");
        assert_eq!(product_slug("  Milk (1L) ").unwrap(), "milk-1l");
        assert!(product_slug("!!!").is_err());
    }

    #[test]
    fn test_ids_strictly_increase_within_one_millisecond() {
        let generator = TransactionIdGenerator::new();
        let now = DateTime::from_timestamp(1_710_000_000, 0).unwrap();

        let ids: Vec<i64> = (0..5)
            .map(|_| generator.next_id(now).parse().unwrap())
            .collect();

        assert_eq!(ids[0], 1_710_000_000_000);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 5);
    }

    #[test]
    fn test_ids_follow_the_clock() {
        let generator = TransactionIdGenerator::new();
        let first = DateTime::from_timestamp(1_710_000_000, 0).unwrap();
        let later = DateTime::from_timestamp(1_710_000_100, 0).unwrap();

        generator.next_id(first);
        assert_eq!(generator.next_id(later), "1710000100000");
    }
}
