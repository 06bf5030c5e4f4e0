//! # Ledger Math
//!
//! Pure bucket operations. The store layer loads a [`DailyBucket`], calls one
//! of these, and writes the bucket back inside a single store transaction.
//!
//! ## Aggregate Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  After EVERY mutation:                                                  │
//! │                                                                         │
//! │    total_revenue == Σ transactions[i].total_price                       │
//! │    sales_count   == transactions.len()                                  │
//! │                                                                         │
//! │  append()           incremental (+price, +1)                            │
//! │  everything else    full recompute from the transaction list            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{
    DailyBucket, DailyTotal, LineItem, PeriodTotals, SaleRecord, SalesSummary, TransactionFilter,
    TransactionPatch,
};
use crate::validation::{validate_line_item, validate_line_items};

// =============================================================================
// Daily Bucket Operations
// =============================================================================

impl DailyBucket {
    /// A bucket with no transactions.
    pub fn empty(date: NaiveDate) -> Self {
        DailyBucket {
            date,
            total_revenue: Money::zero(),
            sales_count: 0,
            transactions: Vec::new(),
        }
    }

    /// Appends a sale and bumps the aggregates.
    pub fn append(&mut self, sale: SaleRecord) {
        self.total_revenue += sale.total_price;
        self.sales_count += 1;
        self.transactions.push(sale);
    }

    /// Recomputes both aggregates from the transaction list.
    pub fn recompute(&mut self) {
        self.total_revenue = self.transactions.iter().map(|t| t.total_price).sum();
        self.sales_count = self.transactions.len() as u64;
    }

    /// Whether the stored aggregates agree with the transaction list.
    pub fn is_consistent(&self) -> bool {
        let revenue: Money = self.transactions.iter().map(|t| t.total_price).sum();
        revenue == self.total_revenue && self.sales_count == self.transactions.len() as u64
    }

    /// Index of the transaction with `id`.
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.transactions.iter().position(|t| t.id == id)
    }

    /// Looks up a transaction by id.
    pub fn find(&self, id: &str) -> Option<&SaleRecord> {
        self.transactions.iter().find(|t| t.id == id)
    }

    /// Applies a patch to the transaction with `id`.
    ///
    /// Returns `Ok(None)` when the id is not in this bucket. Id and timestamp
    /// are never changed.
    pub fn apply_patch(
        &mut self,
        id: &str,
        patch: &TransactionPatch,
    ) -> CoreResult<Option<&SaleRecord>> {
        let Some(index) = self.position_of(id) else {
            return Ok(None);
        };

        if let Some(items) = &patch.line_items {
            validate_line_items(items)?;
        }

        let sale = &mut self.transactions[index];
        match (&patch.line_items, patch.total_price) {
            (Some(items), _) => {
                sale.line_items = items.clone();
                sale.recompute_total();
            }
            (None, Some(total)) => sale.total_price = total,
            (None, None) => {}
        }

        self.recompute();
        Ok(self.transactions.get(index))
    }

    /// Removes the transaction with `id`, returning it.
    pub fn remove(&mut self, id: &str) -> Option<SaleRecord> {
        let index = self.position_of(id)?;
        let removed = self.transactions.remove(index);
        self.recompute();
        Some(removed)
    }

    /// Appends a line item to a transaction and recomputes its total.
    pub fn add_line_item(&mut self, id: &str, item: LineItem) -> CoreResult<Option<&SaleRecord>> {
        let Some(index) = self.position_of(id) else {
            return Ok(None);
        };
        validate_line_item(&item)?;

        let sale = &mut self.transactions[index];
        sale.line_items.push(item);
        sale.recompute_total();

        self.recompute();
        Ok(self.transactions.get(index))
    }

    /// Removes the line item at `position` and recomputes the total.
    ///
    /// Stock is not restored.
    pub fn remove_line_item(
        &mut self,
        id: &str,
        position: usize,
    ) -> CoreResult<Option<LineItem>> {
        let Some(index) = self.position_of(id) else {
            return Ok(None);
        };

        let sale = &mut self.transactions[index];
        if position >= sale.line_items.len() {
            return Err(CoreError::LineItemOutOfRange {
                transaction_id: id.to_string(),
                position,
                len: sale.line_items.len(),
            });
        }

        let removed = sale.line_items.remove(position);
        sale.recompute_total();

        self.recompute();
        Ok(Some(removed))
    }

    /// Per-day totals row for charts.
    pub fn daily_total(&self) -> DailyTotal {
        DailyTotal {
            date: self.date,
            total_revenue: self.total_revenue,
            sales_count: self.sales_count,
        }
    }
}

// =============================================================================
// Multi-Bucket Aggregation
// =============================================================================

/// Sums the aggregates of several buckets and concatenates their transactions.
///
/// Aggregates come from the stored bucket fields; transactions keep bucket
/// order then insertion order.
pub fn merge_buckets<'a, I>(buckets: I) -> SalesSummary
where
    I: IntoIterator<Item = &'a DailyBucket>,
{
    let mut summary = SalesSummary::empty();
    for bucket in buckets {
        summary.total_revenue += bucket.total_revenue;
        summary.sales_count += bucket.sales_count;
        summary.transactions.extend(bucket.transactions.iter().cloned());
    }
    summary
}

/// Totals only, without cloning transactions.
pub fn sum_totals<'a, I>(buckets: I) -> PeriodTotals
where
    I: IntoIterator<Item = &'a DailyBucket>,
{
    buckets
        .into_iter()
        .fold(PeriodTotals::default(), |mut acc, bucket| {
            acc.total_revenue += bucket.total_revenue;
            acc.sales_count += bucket.sales_count;
            acc
        })
}

/// Orders transactions newest first; equal timestamps fall back to id, descending.
pub fn sort_newest_first(transactions: &mut [SaleRecord]) {
    transactions.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| compare_ids(&b.id, &a.id))
    });
}

/// Ids are millisecond timestamps; compare numerically when both parse.
fn compare_ids(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

/// Builds the flat transaction listing.
///
/// Status filter first, then newest-first ordering, then the limit. The
/// summary aggregates describe the returned transactions.
pub fn list_transactions<'a, I>(buckets: I, filter: &TransactionFilter) -> SalesSummary
where
    I: IntoIterator<Item = &'a DailyBucket>,
{
    let mut transactions: Vec<SaleRecord> = buckets
        .into_iter()
        .flat_map(|b| b.transactions.iter())
        .filter(|t| filter.status.map_or(true, |s| t.status() == s))
        .cloned()
        .collect();

    sort_newest_first(&mut transactions);
    if let Some(limit) = filter.limit {
        transactions.truncate(limit);
    }

    SalesSummary {
        total_revenue: transactions.iter().map(|t| t.total_price).sum(),
        sales_count: transactions.len() as u64,
        transactions,
    }
}

// =============================================================================
// Stock Arithmetic
// =============================================================================

/// Decrements stock by `quantity`, clamping at zero.
///
/// ## Example
/// ```rust
/// use tillbook_core::ledger::decrement_stock;
///
/// assert_eq!(decrement_stock(10, 3), 7);
/// assert_eq!(decrement_stock(2, 5), 0);
/// ```
#[inline]
pub fn decrement_stock(stock: u64, quantity: u32) -> u64 {
    stock.saturating_sub(quantity as u64)
}

/// Applies a signed stock delta, clamping at zero.
#[inline]
pub fn adjust_stock(stock: u64, delta: i64) -> u64 {
    if delta >= 0 {
        stock.saturating_add(delta as u64)
    } else {
        stock.saturating_sub(delta.unsigned_abs())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransactionStatus;
    use chrono::{DateTime, Duration, Utc};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn ts(offset_secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_710_000_000, 0).unwrap() + Duration::seconds(offset_secs)
    }

    fn quick(id: &str, offset_secs: i64, cents: i64) -> SaleRecord {
        SaleRecord::quick_sale(id, ts(offset_secs), Money::from_cents(cents))
    }

    fn bucket_with(d: u32, sales: Vec<SaleRecord>) -> DailyBucket {
        let mut bucket = DailyBucket::empty(date(d));
        for sale in sales {
            bucket.append(sale);
        }
        bucket
    }

    #[test]
    fn test_append_is_consistent() {
        let bucket = bucket_with(9, vec![quick("1", 0, 1250), quick("2", 1, 750)]);

        assert_eq!(bucket.total_revenue.cents(), 2000);
        assert_eq!(bucket.sales_count, 2);
        assert!(bucket.is_consistent());
    }

    #[test]
    fn test_patch_line_items_recomputes_total() {
        let mut bucket = bucket_with(9, vec![quick("1", 0, 1000), quick("2", 1, 500)]);
        let patch = TransactionPatch::line_items(vec![
            LineItem::new("bread", "Bread", 2, Money::from_cents(300)),
            LineItem::new("milk", "Milk", 1, Money::from_cents(150)),
        ]);

        let updated = bucket.apply_patch("1", &patch).unwrap().unwrap();
        assert_eq!(updated.total_price.cents(), 750);
        assert_eq!(updated.status(), TransactionStatus::Completed);

        assert_eq!(bucket.total_revenue.cents(), 1250);
        assert!(bucket.is_consistent());
    }

    #[test]
    fn test_patch_flat_total_can_mark_failed() {
        let mut bucket = bucket_with(9, vec![quick("1", 0, 1000)]);

        let updated = bucket
            .apply_patch("1", &TransactionPatch::total_price(Money::from_cents(1500)))
            .unwrap()
            .unwrap();
        assert_eq!(updated.status(), TransactionStatus::Failed);
        assert_eq!(bucket.total_revenue.cents(), 1500);
    }

    #[test]
    fn test_patch_missing_id() {
        let mut bucket = bucket_with(9, vec![quick("1", 0, 1000)]);
        let result = bucket
            .apply_patch("404", &TransactionPatch::total_price(Money::zero()))
            .unwrap();
        assert!(result.is_none());
        assert_eq!(bucket.total_revenue.cents(), 1000);
    }

    #[test]
    fn test_patch_rejects_zero_quantity() {
        let mut bucket = bucket_with(9, vec![quick("1", 0, 1000)]);
        let patch =
            TransactionPatch::line_items(vec![LineItem::new("x", "X", 0, Money::from_cents(1))]);

        assert!(bucket.apply_patch("1", &patch).is_err());
        assert_eq!(bucket.transactions[0].total_price.cents(), 1000);
    }

    #[test]
    fn test_remove_recomputes() {
        let mut bucket = bucket_with(9, vec![quick("1", 0, 1000), quick("2", 1, 500)]);

        let removed = bucket.remove("1").unwrap();
        assert_eq!(removed.id, "1");
        assert_eq!(bucket.total_revenue.cents(), 500);
        assert_eq!(bucket.sales_count, 1);
        assert!(bucket.remove("1").is_none());
    }

    #[test]
    fn test_add_and_remove_line_item() {
        let mut bucket = DailyBucket::empty(date(9));
        bucket.append(SaleRecord::open("1", ts(0)));

        let sale = bucket
            .add_line_item("1", LineItem::new("bread", "Bread", 2, Money::from_cents(300)))
            .unwrap()
            .unwrap();
        assert_eq!(sale.total_price.cents(), 600);
        assert_eq!(bucket.total_revenue.cents(), 600);

        let removed = bucket.remove_line_item("1", 0).unwrap().unwrap();
        assert_eq!(removed.product_id, "bread");
        assert!(bucket.total_revenue.is_zero());
        assert_eq!(bucket.transactions[0].status(), TransactionStatus::Pending);
    }

    #[test]
    fn test_remove_line_item_out_of_range() {
        let mut bucket = bucket_with(9, vec![quick("1", 0, 1000)]);
        let err = bucket.remove_line_item("1", 3).unwrap_err();
        assert!(matches!(err, CoreError::LineItemOutOfRange { len: 1, .. }));
    }

    #[test]
    fn test_merge_buckets() {
        let a = bucket_with(8, vec![quick("1", 0, 1000)]);
        let b = bucket_with(9, vec![quick("2", 1, 500), quick("3", 2, 250)]);

        let summary = merge_buckets([&a, &b]);
        assert_eq!(summary.total_revenue.cents(), 1750);
        assert_eq!(summary.sales_count, 3);
        assert_eq!(summary.transactions.len(), 3);

        let totals = sum_totals([&a, &b]);
        assert_eq!(totals, summary.totals());
    }

    #[test]
    fn test_list_sorted_filtered_and_limited() {
        let mut failed = quick("2", 5, 100);
        failed.total_price = Money::from_cents(999);

        let a = bucket_with(8, vec![quick("1", 0, 1000), failed]);
        let b = bucket_with(9, vec![quick("4", 10, 500), quick("3", 10, 250)]);

        let all = list_transactions([&a, &b], &TransactionFilter::default());
        let ids: Vec<&str> = all.transactions.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["4", "3", "2", "1"]);

        let completed = list_transactions(
            [&a, &b],
            &TransactionFilter::default().with_status(TransactionStatus::Completed).with_limit(2),
        );
        let ids: Vec<&str> = completed.transactions.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["4", "3"]);
        assert_eq!(completed.total_revenue.cents(), 750);
        assert_eq!(completed.sales_count, 2);
    }

    #[test]
    fn test_stock_clamps_at_zero() {
        assert_eq!(decrement_stock(5, 2), 3);
        assert_eq!(decrement_stock(1, 4), 0);
        assert_eq!(adjust_stock(5, 3), 8);
        assert_eq!(adjust_stock(5, -9), 0);
        assert_eq!(adjust_stock(u64::MAX, 1), u64::MAX);
    }
}
