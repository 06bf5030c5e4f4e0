//! # Domain Types
//!
//! Core domain types used throughout Tillbook.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Shop (ShopId) ──owns──► DailyBucket (one per calendar date)            │
//! │                           │                                             │
//! │                           ├── total_revenue  = Σ total_price            │
//! │                           ├── sales_count    = len(transactions)        │
//! │                           └── transactions ──► SaleRecord               │
//! │                                                 │                       │
//! │                                                 ├── id (timestamp)      │
//! │                                                 ├── timestamp           │
//! │                                                 ├── line_items ──► LineItem
//! │                                                 ├── total_price         │
//! │                                                 └── status() (derived)  │
//! │                                                                         │
//! │  Shop ──owns──► InventoryItem (stock decremented by line items)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::ident::derive_shop_id;
use crate::money::Money;
use crate::{QUICK_SALE_PRODUCT_ID, QUICK_SALE_PRODUCT_NAME, STATUS_TOLERANCE};

// =============================================================================
// Shop Identity
// =============================================================================

/// Opaque shop identifier, derived from the owner's contact string.
///
/// Every document path is partitioned by this id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export)]
pub struct ShopId(String);

impl ShopId {
    /// Derives the shop id from a phone number or e-mail address.
    ///
    /// ## Example
    /// ```rust
    /// use tillbook_core::ShopId;
    ///
    /// let id = ShopId::from_contact("+1 (555) 010-2000").unwrap();
    /// assert_eq!(id.as_str(), "1_555_010_2000");
    /// ```
    pub fn from_contact(contact: &str) -> Result<Self, ValidationError> {
        derive_shop_id(contact).map(ShopId)
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The shop identity injected into every ledger call.
///
/// The presentation layer starts with `Unresolved` while the owner's session
/// is restored; ledger calls made in that window are inert.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ShopSession {
    /// Identity not known yet.
    #[default]
    Unresolved,
    /// Identity resolved to a shop.
    Resolved(ShopId),
}

impl ShopSession {
    /// Creates a resolved session.
    pub fn resolved(shop_id: ShopId) -> Self {
        ShopSession::Resolved(shop_id)
    }

    /// Resolves a session from a contact string.
    pub fn from_contact(contact: &str) -> Result<Self, ValidationError> {
        ShopId::from_contact(contact).map(ShopSession::Resolved)
    }

    /// Returns the shop id when resolved.
    pub fn shop_id(&self) -> Option<&ShopId> {
        match self {
            ShopSession::Resolved(id) => Some(id),
            ShopSession::Unresolved => None,
        }
    }

    /// Returns true once the identity is known.
    pub fn is_resolved(&self) -> bool {
        matches!(self, ShopSession::Resolved(_))
    }
}

// =============================================================================
// Line Item
// =============================================================================

/// One product + quantity + price entry within a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineItem {
    /// Inventory product id (slug). Empty means not yet linked to a product.
    pub product_id: String,
    /// Product name at time of sale (frozen).
    pub product_name: String,
    /// Quantity sold (> 0).
    pub quantity: u32,
    /// Unit price at time of sale (≥ 0).
    pub price: Money,
}

impl LineItem {
    /// Creates a line item.
    pub fn new(
        product_id: impl Into<String>,
        product_name: impl Into<String>,
        quantity: u32,
        price: Money,
    ) -> Self {
        LineItem {
            product_id: product_id.into(),
            product_name: product_name.into(),
            quantity,
            price,
        }
    }

    /// The single line item representing a raw-amount sale.
    pub fn quick_sale(amount: Money) -> Self {
        LineItem::new(QUICK_SALE_PRODUCT_ID, QUICK_SALE_PRODUCT_NAME, 1, amount)
    }

    /// Unit price × quantity.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.price.multiply_quantity(self.quantity)
    }

    /// Whether the line item points at a product.
    #[inline]
    pub fn has_product_reference(&self) -> bool {
        !self.product_id.trim().is_empty()
    }
}

// =============================================================================
// Transaction Status
// =============================================================================

/// Derived status of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// No line items yet, or a line item is not linked to a product.
    Pending,
    /// Line items are linked and the total matches their sum.
    Completed,
    /// Line items are linked but the total does not match their sum.
    Failed,
}

impl TransactionStatus {
    /// Returns the wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            other => Err(ValidationError::InvalidFormat {
                field: "status".to_string(),
                reason: format!("unknown status '{}'", other),
            }),
        }
    }
}

// =============================================================================
// Sale Record
// =============================================================================

/// One recorded sale (a.k.a. transaction / sale metadata).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleRecord {
    /// Unique id, derived from the creation timestamp. Never changes.
    pub id: String,
    /// When the sale occurred.
    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,
    /// Itemized lines, in entry order.
    pub line_items: Vec<LineItem>,
    /// Flat amount, or Σ price × quantity once itemized.
    pub total_price: Money,
}

impl SaleRecord {
    /// A raw-amount sale with one synthetic line item.
    pub fn quick_sale(id: impl Into<String>, timestamp: DateTime<Utc>, amount: Money) -> Self {
        SaleRecord {
            id: id.into(),
            timestamp,
            line_items: vec![LineItem::quick_sale(amount)],
            total_price: amount,
        }
    }

    /// A sale opened with no line items (pending, zero total).
    pub fn open(id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        SaleRecord {
            id: id.into(),
            timestamp,
            line_items: Vec::new(),
            total_price: Money::zero(),
        }
    }

    /// Σ price × quantity over the line items.
    pub fn line_items_total(&self) -> Money {
        self.line_items.iter().map(LineItem::line_total).sum()
    }

    /// Sets `total_price` from the line items.
    pub fn recompute_total(&mut self) {
        self.total_price = self.line_items_total();
    }

    /// Derives the status from the line items and total.
    ///
    /// ```text
    /// no line items ─────────────────────────────► Pending
    /// a line item without a product reference ───► Pending
    /// |total - Σ lines| < tolerance ─────────────► Completed
    /// otherwise ─────────────────────────────────► Failed
    /// ```
    pub fn status(&self) -> TransactionStatus {
        if self.line_items.is_empty() {
            return TransactionStatus::Pending;
        }

        if !self.line_items.iter().all(LineItem::has_product_reference) {
            return TransactionStatus::Pending;
        }

        let difference = (self.total_price - self.line_items_total()).abs();
        if difference.to_decimal() < STATUS_TOLERANCE {
            TransactionStatus::Completed
        } else {
            TransactionStatus::Failed
        }
    }
}

// =============================================================================
// Daily Bucket
// =============================================================================

/// All sales of one shop on one calendar date.
///
/// ## Invariant
/// `total_revenue == Σ transactions.total_price` and
/// `sales_count == transactions.len()` after every mutation made through
/// the methods in [`crate::ledger`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DailyBucket {
    /// Calendar date (document key).
    #[ts(as = "String")]
    pub date: NaiveDate,
    /// Σ total_price.
    pub total_revenue: Money,
    /// Number of transactions.
    pub sales_count: u64,
    /// Transactions in insertion order.
    pub transactions: Vec<SaleRecord>,
}

// =============================================================================
// Query Results
// =============================================================================

/// Aggregate answer for a range or listing query.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesSummary {
    pub total_revenue: Money,
    pub sales_count: u64,
    pub transactions: Vec<SaleRecord>,
}

impl SalesSummary {
    /// The zero value: no revenue, no sales.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Totals without the transaction list.
    pub fn totals(&self) -> PeriodTotals {
        PeriodTotals {
            total_revenue: self.total_revenue,
            sales_count: self.sales_count,
        }
    }
}

/// Revenue and count for one period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PeriodTotals {
    pub total_revenue: Money,
    pub sales_count: u64,
}

/// Dashboard view: totals for every standard period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PeriodOverview {
    pub today: PeriodTotals,
    pub week: PeriodTotals,
    pub month: PeriodTotals,
    pub all_time: PeriodTotals,
}

/// One row of per-day chart data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DailyTotal {
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub total_revenue: Money,
    pub sales_count: u64,
}

/// Options for listing transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TransactionFilter {
    /// Keep only transactions whose derived status matches.
    pub status: Option<TransactionStatus>,
    /// Keep at most this many (newest first).
    pub limit: Option<usize>,
}

impl TransactionFilter {
    /// Filter on a status.
    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Truncate to `limit` results.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Partial update of a transaction.
///
/// When `line_items` is present the total is recomputed from them and
/// `total_price` is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TransactionPatch {
    pub line_items: Option<Vec<LineItem>>,
    pub total_price: Option<Money>,
}

impl TransactionPatch {
    /// Replace the line items (total follows).
    pub fn line_items(items: Vec<LineItem>) -> Self {
        TransactionPatch {
            line_items: Some(items),
            total_price: None,
        }
    }

    /// Set a flat total.
    pub fn total_price(total: Money) -> Self {
        TransactionPatch {
            line_items: None,
            total_price: Some(total),
        }
    }

    /// True when the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.line_items.is_none() && self.total_price.is_none()
    }
}

// =============================================================================
// Sales Period
// =============================================================================

/// Standard reporting windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SalesPeriod {
    /// The current shop-local date.
    Today,
    /// The trailing seven days, today included.
    Week,
    /// From the first of the current month through today.
    Month,
    /// Every bucket.
    AllTime,
}

impl SalesPeriod {
    /// Returns the inclusive date range of the period, or `None` for all time.
    ///
    /// ## Example
    /// ```rust
    /// use chrono::NaiveDate;
    /// use tillbook_core::SalesPeriod;
    ///
    /// let today = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
    /// let (start, end) = SalesPeriod::Week.date_range(today).unwrap();
    /// assert_eq!(start, NaiveDate::from_ymd_opt(2024, 3, 3).unwrap());
    /// assert_eq!(end, today);
    /// ```
    pub fn date_range(&self, today: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
        match self {
            SalesPeriod::Today => Some((today, today)),
            SalesPeriod::Week => Some((today - Duration::days(6), today)),
            SalesPeriod::Month => Some((today.with_day(1).unwrap_or(today), today)),
            SalesPeriod::AllTime => None,
        }
    }
}

impl fmt::Display for SalesPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SalesPeriod::Today => write!(f, "today"),
            SalesPeriod::Week => write!(f, "week"),
            SalesPeriod::Month => write!(f, "month"),
            SalesPeriod::AllTime => write!(f, "all_time"),
        }
    }
}

// =============================================================================
// Inventory
// =============================================================================

/// A stocked product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InventoryItem {
    /// Slug derived from the product name at creation.
    pub product_id: String,
    pub product_name: String,
    pub unit_price: Money,
    /// Never negative; decrements clamp at zero.
    pub stock_amount: u64,
    /// Free-text unit ("pcs", "kg", "loaf").
    pub unit: String,
    #[ts(as = "String")]
    pub last_updated: DateTime<Utc>,
}

/// Input for creating or replacing an inventory item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewInventoryItem {
    pub product_name: String,
    pub unit_price: Money,
    pub stock_amount: u64,
    pub unit: String,
}

/// Partial update of an inventory item. A new name keeps the original id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InventoryPatch {
    pub product_name: Option<String>,
    pub unit_price: Option<Money>,
    pub stock_amount: Option<u64>,
    pub unit: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn at() -> DateTime<Utc> {
        DateTime::from_timestamp(1_710_000_000, 0).unwrap()
    }

    fn item(product_id: &str, quantity: u32, cents: i64) -> LineItem {
        LineItem::new(product_id, product_id, quantity, Money::from_cents(cents))
    }

    #[test]
    fn test_status_completed_when_totals_match() {
        let mut sale = SaleRecord::open("1", at());
        sale.line_items = vec![item("bread", 2, 5000)];
        sale.total_price = Money::from_cents(10000);

        assert_eq!(sale.status(), TransactionStatus::Completed);
    }

    #[test]
    fn test_status_failed_on_mismatch() {
        let mut sale = SaleRecord::open("1", at());
        sale.line_items = vec![item("bread", 2, 5000)];
        sale.total_price = Money::from_cents(15000);

        assert_eq!(sale.status(), TransactionStatus::Failed);
    }

    #[test]
    fn test_status_pending_without_line_items() {
        let sale = SaleRecord::open("1", at());
        assert_eq!(sale.status(), TransactionStatus::Pending);
    }

    #[test]
    fn test_status_pending_with_unlinked_line_item() {
        let mut sale = SaleRecord::open("1", at());
        sale.line_items = vec![item("bread", 1, 300), item("  ", 1, 200)];
        sale.recompute_total();

        assert_eq!(sale.status(), TransactionStatus::Pending);
    }

    #[test]
    fn test_quick_sale_is_completed() {
        let sale = SaleRecord::quick_sale("1", at(), Money::from_cents(1250));
        assert_eq!(sale.line_items.len(), 1);
        assert_eq!(sale.line_items[0].product_id, QUICK_SALE_PRODUCT_ID);
        assert_eq!(sale.total_price.cents(), 1250);
        assert_eq!(sale.status(), TransactionStatus::Completed);
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("pending".parse::<TransactionStatus>().unwrap(), TransactionStatus::Pending);
        assert_eq!("COMPLETED".parse::<TransactionStatus>().unwrap(), TransactionStatus::Completed);
        assert_eq!("failed".parse::<TransactionStatus>().unwrap(), TransactionStatus::Failed);
        assert!("refunded".parse::<TransactionStatus>().is_err());
    }

    #[test]
    fn test_session_resolution() {
        assert!(!ShopSession::default().is_resolved());
        assert_eq!(ShopSession::Unresolved.shop_id(), None);

        let session = ShopSession::from_contact("owner@corner.shop").unwrap();
        assert!(session.is_resolved());
        assert_eq!(session.shop_id().unwrap().as_str(), "owner_corner_shop");
    }

    #[test]
    fn test_period_ranges() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();

        assert_eq!(SalesPeriod::Today.date_range(today), Some((today, today)));
        assert_eq!(
            SalesPeriod::Month.date_range(today),
            Some((NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), today))
        );
        assert_eq!(SalesPeriod::AllTime.date_range(today), None);

        // Week crosses a month boundary
        let early = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        assert_eq!(
            SalesPeriod::Week.date_range(early),
            Some((NaiveDate::from_ymd_opt(2024, 2, 25).unwrap(), early))
        );
    }

    #[test]
    fn test_patch_is_empty() {
        assert!(TransactionPatch::default().is_empty());
        assert!(!TransactionPatch::total_price(Money::zero()).is_empty());
    }
}
