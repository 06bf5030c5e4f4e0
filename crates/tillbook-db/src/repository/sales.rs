//! # Ledger Aggregator
//!
//! Records sales into daily buckets and answers range and listing queries.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. RECORD                                                              │
//! │     └── record_sale(amount) → quick-sale line item, appended to the     │
//! │         bucket for the shop-local date; index entry written             │
//! │     └── open_sale()        → empty (pending) transaction                │
//! │                                                                         │
//! │  2. ENRICH                                                              │
//! │     └── add_line_item()    → price from inventory, stock decremented    │
//! │     └── remove_line_item() → stock restored                             │
//! │                                                                         │
//! │  3. EDIT                                                                │
//! │     └── update_transaction(patch) → bucket totals recomputed            │
//! │                                                                         │
//! │  4. DELETE                                                              │
//! │     └── delete_transaction() → bucket recomputed, index entry dropped   │
//! │                                                                         │
//! │  Every step above is ONE store transaction.                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Finding a Transaction
//! ```text
//! date hint ──miss──► transactionIndex/{id} ──miss──► scan every bucket
//!     │                       │                            │
//!     └──────── hit ──────────┴──────────── hit ───────────┴──► repair index
//! ```

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use tillbook_core::ledger::{
    adjust_stock, decrement_stock, list_transactions, merge_buckets, sum_totals,
};
use tillbook_core::validation::{
    validate_amount, validate_line_items, validate_product_slug, validate_quantity,
};
use tillbook_core::{
    CoreError, DailyBucket, DailyTotal, LineItem, Money, PeriodOverview, PeriodTotals, SaleRecord,
    SalesPeriod, SalesSummary, ShopId, ShopSession, TransactionFilter, TransactionIdGenerator,
    TransactionPatch, QUICK_SALE_PRODUCT_ID,
};

use crate::codec::{
    decode_bucket, decode_index, decode_inventory, encode_bucket, encode_index, encode_inventory,
};
use crate::config::LedgerSettings;
use crate::document::{sales_collection, DocumentPath, DocumentStore, Snapshot, WriteBatch};
use crate::error::{LedgerError, LedgerResult, StoreError, StoreResult};
use crate::repository::{resolve, store_failure};

/// Attempts for an optimistic line-item removal before giving up.
const REMOVE_LINE_ITEM_ATTEMPTS: usize = 3;

/// Result of a transaction body that may find nothing to do.
enum Outcome<T> {
    Missing,
    Rejected(LedgerError),
    Done(T),
}

/// Records and queries a shop's sales.
///
/// ## Example
/// ```rust,no_run
/// use std::sync::Arc;
/// use tillbook_core::{Money, ShopSession};
/// use tillbook_db::{LedgerAggregator, LedgerSettings, MemoryDocumentStore};
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let ledger = LedgerAggregator::new(
///     Arc::new(MemoryDocumentStore::new()),
///     LedgerSettings::default(),
/// );
/// let session = ShopSession::from_contact("owner@corner.shop")?;
///
/// ledger.record_sale(&session, Money::from_cents(1250)).await?;
///
/// let today = ledger.today();
/// let summary = ledger.sales_for_range(&session, today, today).await?;
/// assert_eq!(summary.total_revenue.cents(), 1250);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LedgerAggregator {
    store: Arc<dyn DocumentStore>,
    settings: LedgerSettings,
    ids: Arc<TransactionIdGenerator>,
}

impl std::fmt::Debug for LedgerAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerAggregator")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl LedgerAggregator {
    /// Creates an aggregator over `store`.
    pub fn new(store: Arc<dyn DocumentStore>, settings: LedgerSettings) -> Self {
        LedgerAggregator {
            store,
            settings,
            ids: Arc::new(TransactionIdGenerator::new()),
        }
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.settings.utc_offset_minutes * 60).unwrap_or(Utc.fix())
    }

    /// The shop-local calendar date of `at`.
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset()).date_naive()
    }

    /// The shop-local date right now.
    pub fn today(&self) -> NaiveDate {
        self.local_date(Utc::now())
    }

    // =========================================================================
    // Recording
    // =========================================================================

    /// Records a raw-amount sale now.
    ///
    /// Zero and negative amounts are recorded; only amounts beyond
    /// `MAX_AMOUNT_CENTS` in either direction are refused.
    pub async fn record_sale(
        &self,
        session: &ShopSession,
        amount: Money,
    ) -> LedgerResult<Option<SaleRecord>> {
        self.record_sale_at(session, amount, Utc::now()).await
    }

    /// Records a raw-amount sale that happened at `at`.
    pub async fn record_sale_at(
        &self,
        session: &ShopSession,
        amount: Money,
        at: DateTime<Utc>,
    ) -> LedgerResult<Option<SaleRecord>> {
        let Some(shop) = resolve(session, "record_sale") else {
            return Ok(None);
        };
        validate_amount(amount)?;

        let sale = SaleRecord::quick_sale(self.ids.next_id(at), at, amount);
        self.append_sale(shop, sale, "record_sale").await.map(Some)
    }

    /// Opens an empty (pending) sale now, to be enriched with line items.
    pub async fn open_sale(&self, session: &ShopSession) -> LedgerResult<Option<SaleRecord>> {
        self.open_sale_at(session, Utc::now()).await
    }

    /// Opens an empty sale that happened at `at`.
    pub async fn open_sale_at(
        &self,
        session: &ShopSession,
        at: DateTime<Utc>,
    ) -> LedgerResult<Option<SaleRecord>> {
        let Some(shop) = resolve(session, "open_sale") else {
            return Ok(None);
        };

        let sale = SaleRecord::open(self.ids.next_id(at), at);
        self.append_sale(shop, sale, "open_sale").await.map(Some)
    }

    async fn append_sale(
        &self,
        shop: &ShopId,
        sale: SaleRecord,
        operation: &'static str,
    ) -> LedgerResult<SaleRecord> {
        let date = self.local_date(sale.timestamp);
        let bucket_path = DocumentPath::sales_bucket(shop, date);
        let index_path = DocumentPath::transaction_index(shop, &sale.id);
        let record = sale.clone();

        self.store
            .run_transaction(
                vec![bucket_path.clone()],
                Box::new(move |snapshot: &Snapshot| {
                    let mut bucket = match snapshot.get(&bucket_path) {
                        Some(value) => decode_bucket(&bucket_path, value)?,
                        None => DailyBucket::empty(date),
                    };
                    bucket.append(record);

                    let mut batch = WriteBatch::new();
                    batch
                        .set(bucket_path, encode_bucket(&bucket)?)
                        .set(index_path, encode_index(date)?);
                    Ok(batch)
                }),
            )
            .await
            .map_err(store_failure(shop, operation))?;

        info!(
            shop_id = %shop,
            transaction_id = %sale.id,
            date = %date,
            amount = %sale.total_price,
            "Sale recorded"
        );
        Ok(sale)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Every transaction dated `start..=end`, concatenated in bucket-date
    /// order, with the buckets' stored totals summed.
    pub async fn sales_for_range(
        &self,
        session: &ShopSession,
        start: NaiveDate,
        end: NaiveDate,
    ) -> LedgerResult<SalesSummary> {
        let Some(shop) = resolve(session, "sales_for_range") else {
            return Ok(SalesSummary::empty());
        };
        if start > end {
            debug!(shop_id = %shop, %start, %end, "Empty date range");
            return Ok(SalesSummary::empty());
        }

        let buckets = self
            .load_range(shop, start, end)
            .await
            .map_err(store_failure(shop, "sales_for_range"))?;
        Ok(merge_buckets(&buckets))
    }

    /// Sales for a standard period ending today.
    pub async fn sales_for_period(
        &self,
        session: &ShopSession,
        period: SalesPeriod,
    ) -> LedgerResult<SalesSummary> {
        self.sales_for_period_on(session, period, self.today()).await
    }

    /// Sales for a standard period ending on `today`.
    pub async fn sales_for_period_on(
        &self,
        session: &ShopSession,
        period: SalesPeriod,
        today: NaiveDate,
    ) -> LedgerResult<SalesSummary> {
        match period.date_range(today) {
            Some((start, end)) => self.sales_for_range(session, start, end).await,
            None => {
                let Some(shop) = resolve(session, "sales_for_period") else {
                    return Ok(SalesSummary::empty());
                };
                let buckets = self
                    .load_all(shop)
                    .await
                    .map_err(store_failure(shop, "sales_for_period"))?;
                Ok(merge_buckets(&buckets))
            }
        }
    }

    /// Today / week / month / all-time totals for a dashboard.
    pub async fn period_overview(&self, session: &ShopSession) -> LedgerResult<PeriodOverview> {
        self.period_overview_on(session, self.today()).await
    }

    /// Period totals relative to `today`, from a single read of all buckets.
    pub async fn period_overview_on(
        &self,
        session: &ShopSession,
        today: NaiveDate,
    ) -> LedgerResult<PeriodOverview> {
        let Some(shop) = resolve(session, "period_overview") else {
            return Ok(PeriodOverview::default());
        };

        let buckets = self
            .load_all(shop)
            .await
            .map_err(store_failure(shop, "period_overview"))?;

        let totals = |period: SalesPeriod| -> PeriodTotals {
            match period.date_range(today) {
                Some((start, end)) => {
                    sum_totals(buckets.iter().filter(|b| b.date >= start && b.date <= end))
                }
                None => sum_totals(&buckets),
            }
        };

        Ok(PeriodOverview {
            today: totals(SalesPeriod::Today),
            week: totals(SalesPeriod::Week),
            month: totals(SalesPeriod::Month),
            all_time: totals(SalesPeriod::AllTime),
        })
    }

    /// Per-date totals for populated buckets in `start..=end`, ascending.
    pub async fn daily_totals(
        &self,
        session: &ShopSession,
        start: NaiveDate,
        end: NaiveDate,
    ) -> LedgerResult<Vec<DailyTotal>> {
        let Some(shop) = resolve(session, "daily_totals") else {
            return Ok(Vec::new());
        };
        if start > end {
            return Ok(Vec::new());
        }

        let buckets = self
            .load_range(shop, start, end)
            .await
            .map_err(store_failure(shop, "daily_totals"))?;
        Ok(buckets.iter().map(DailyBucket::daily_total).collect())
    }

    /// All transactions, newest first, optionally filtered by status.
    ///
    /// Without a filter limit the configured default applies.
    pub async fn list_transactions(
        &self,
        session: &ShopSession,
        filter: &TransactionFilter,
    ) -> LedgerResult<SalesSummary> {
        let Some(shop) = resolve(session, "list_transactions") else {
            return Ok(SalesSummary::empty());
        };

        let buckets = self
            .load_all(shop)
            .await
            .map_err(store_failure(shop, "list_transactions"))?;

        let filter = TransactionFilter {
            status: filter.status,
            limit: filter.limit.or(Some(self.settings.default_list_limit)),
        };
        Ok(list_transactions(&buckets, &filter))
    }

    /// Fetches one transaction with the date of its bucket.
    pub async fn get_transaction(
        &self,
        session: &ShopSession,
        transaction_id: &str,
    ) -> LedgerResult<Option<(NaiveDate, SaleRecord)>> {
        let Some(shop) = resolve(session, "get_transaction") else {
            return Ok(None);
        };

        let Some(date) = self.locate(shop, transaction_id, None).await? else {
            return Ok(None);
        };

        let bucket = self
            .load_bucket(shop, date)
            .await
            .map_err(store_failure(shop, "get_transaction"))?;
        Ok(bucket
            .and_then(|b| b.find(transaction_id).cloned())
            .map(|sale| (date, sale)))
    }

    // =========================================================================
    // Edits
    // =========================================================================

    /// Applies `patch` to a transaction. Returns `false` if it doesn't exist.
    ///
    /// `date_hint` is the bucket date when the caller knows it.
    pub async fn update_transaction(
        &self,
        session: &ShopSession,
        transaction_id: &str,
        patch: &TransactionPatch,
        date_hint: Option<NaiveDate>,
    ) -> LedgerResult<bool> {
        let Some(shop) = resolve(session, "update_transaction") else {
            return Ok(false);
        };
        if let Some(items) = &patch.line_items {
            validate_line_items(items)?;
        }

        let Some(date) = self.locate(shop, transaction_id, date_hint).await? else {
            debug!(shop_id = %shop, transaction_id, "Transaction not found for update");
            return Ok(false);
        };

        let bucket_path = DocumentPath::sales_bucket(shop, date);
        let index_path = DocumentPath::transaction_index(shop, transaction_id);
        let mut outcome = Outcome::Missing;

        self.store
            .run_transaction(
                vec![bucket_path.clone()],
                Box::new(|snapshot: &Snapshot| {
                    let Some(mut bucket) = bucket_in(snapshot, &bucket_path)? else {
                        return Ok(WriteBatch::new());
                    };
                    let total = match bucket.apply_patch(transaction_id, patch) {
                        Ok(Some(sale)) => sale.total_price,
                        Ok(None) => return Ok(WriteBatch::new()),
                        Err(e) => {
                            outcome = Outcome::Rejected(e.into());
                            return Ok(WriteBatch::new());
                        }
                    };

                    let mut batch = WriteBatch::new();
                    batch
                        .set(bucket_path.clone(), encode_bucket(&bucket)?)
                        .set(index_path, encode_index(date)?);
                    outcome = Outcome::Done(total);
                    Ok(batch)
                }),
            )
            .await
            .map_err(store_failure(shop, "update_transaction"))?;

        match outcome {
            Outcome::Done(total) => {
                info!(shop_id = %shop, transaction_id, date = %date, total = %total, "Transaction updated");
                Ok(true)
            }
            Outcome::Rejected(err) => Err(err),
            Outcome::Missing => Ok(false),
        }
    }

    /// Deletes a transaction. Returns `false` if it doesn't exist.
    pub async fn delete_transaction(
        &self,
        session: &ShopSession,
        transaction_id: &str,
        date_hint: Option<NaiveDate>,
    ) -> LedgerResult<bool> {
        let Some(shop) = resolve(session, "delete_transaction") else {
            return Ok(false);
        };

        let Some(date) = self.locate(shop, transaction_id, date_hint).await? else {
            debug!(shop_id = %shop, transaction_id, "Transaction not found for delete");
            return Ok(false);
        };

        let bucket_path = DocumentPath::sales_bucket(shop, date);
        let index_path = DocumentPath::transaction_index(shop, transaction_id);

        let writes = self
            .store
            .run_transaction(
                vec![bucket_path.clone()],
                Box::new(|snapshot: &Snapshot| {
                    let Some(mut bucket) = bucket_in(snapshot, &bucket_path)? else {
                        return Ok(WriteBatch::new());
                    };
                    if bucket.remove(transaction_id).is_none() {
                        return Ok(WriteBatch::new());
                    }

                    let mut batch = WriteBatch::new();
                    batch
                        .set(bucket_path.clone(), encode_bucket(&bucket)?)
                        .delete(index_path);
                    Ok(batch)
                }),
            )
            .await
            .map_err(store_failure(shop, "delete_transaction"))?;

        if writes == 0 {
            return Ok(false);
        }

        info!(shop_id = %shop, transaction_id, date = %date, "Transaction deleted");
        Ok(true)
    }

    /// Adds `quantity` of an inventory product to a transaction.
    ///
    /// The line price is the product's current unit price. The product's
    /// stock drops by `quantity`, clamped at zero, in the same store
    /// transaction as the bucket write. Returns `false` if the transaction
    /// doesn't exist.
    pub async fn add_line_item(
        &self,
        session: &ShopSession,
        transaction_id: &str,
        product_id: &str,
        quantity: u32,
    ) -> LedgerResult<bool> {
        let Some(shop) = resolve(session, "add_line_item") else {
            return Ok(false);
        };
        validate_quantity(quantity)?;
        validate_product_slug(product_id)?;

        let Some(date) = self.locate(shop, transaction_id, None).await? else {
            debug!(shop_id = %shop, transaction_id, "Transaction not found for add_line_item");
            return Ok(false);
        };

        let bucket_path = DocumentPath::sales_bucket(shop, date);
        let index_path = DocumentPath::transaction_index(shop, transaction_id);
        let item_path = DocumentPath::inventory_item(shop, product_id);
        let now = Utc::now();
        let mut outcome = Outcome::Missing;

        self.store
            .run_transaction(
                vec![bucket_path.clone(), item_path.clone()],
                Box::new(|snapshot: &Snapshot| {
                    let Some(mut bucket) = bucket_in(snapshot, &bucket_path)? else {
                        return Ok(WriteBatch::new());
                    };
                    if bucket.position_of(transaction_id).is_none() {
                        return Ok(WriteBatch::new());
                    }

                    let Some(value) = snapshot.get(&item_path) else {
                        outcome = Outcome::Rejected(LedgerError::ProductNotFound {
                            product_id: product_id.to_string(),
                        });
                        return Ok(WriteBatch::new());
                    };
                    let mut item = decode_inventory(&item_path, value)?;

                    let line = LineItem::new(
                        item.product_id.clone(),
                        item.product_name.clone(),
                        quantity,
                        item.unit_price,
                    );
                    if let Err(e) = bucket.add_line_item(transaction_id, line) {
                        outcome = Outcome::Rejected(e.into());
                        return Ok(WriteBatch::new());
                    }

                    item.stock_amount = decrement_stock(item.stock_amount, quantity);
                    item.last_updated = now;

                    let mut batch = WriteBatch::new();
                    batch
                        .set(bucket_path.clone(), encode_bucket(&bucket)?)
                        .set(index_path, encode_index(date)?)
                        .set(item_path.clone(), encode_inventory(&item)?);
                    outcome = Outcome::Done(item.stock_amount);
                    Ok(batch)
                }),
            )
            .await
            .map_err(store_failure(shop, "add_line_item"))?;

        match outcome {
            Outcome::Done(stock) => {
                info!(
                    shop_id = %shop,
                    transaction_id,
                    product_id,
                    quantity,
                    stock_amount = stock,
                    "Line item added"
                );
                Ok(true)
            }
            Outcome::Rejected(err) => Err(err),
            Outcome::Missing => Ok(false),
        }
    }

    /// Removes the line item at `position` and restores its product's stock.
    ///
    /// Returns `false` if the transaction or position doesn't exist. Stock is
    /// not restored for products no longer in inventory.
    pub async fn remove_line_item(
        &self,
        session: &ShopSession,
        transaction_id: &str,
        position: usize,
    ) -> LedgerResult<bool> {
        let Some(shop) = resolve(session, "remove_line_item") else {
            return Ok(false);
        };

        let Some(date) = self.locate(shop, transaction_id, None).await? else {
            return Ok(false);
        };

        for attempt in 1..=REMOVE_LINE_ITEM_ATTEMPTS {
            // the inventory path depends on which product sits at `position`
            let expected = self
                .load_bucket(shop, date)
                .await
                .map_err(store_failure(shop, "remove_line_item"))?
                .and_then(|b| b.find(transaction_id).cloned())
                .and_then(|sale| sale.line_items.get(position).cloned());
            let Some(expected) = expected else {
                debug!(shop_id = %shop, transaction_id, position, "Line item not found");
                return Ok(false);
            };

            match self
                .try_remove_line_item(shop, date, transaction_id, position, &expected)
                .await?
            {
                Some(removed) => return Ok(removed),
                None => {
                    warn!(shop_id = %shop, transaction_id, attempt, "Line items changed concurrently, retrying");
                }
            }
        }

        Err(store_failure(shop, "remove_line_item")(
            StoreError::TransactionFailed(format!(
                "line items of {} kept changing",
                transaction_id
            )),
        ))
    }

    /// One attempt. `None` means the line item at `position` changed.
    async fn try_remove_line_item(
        &self,
        shop: &ShopId,
        date: NaiveDate,
        transaction_id: &str,
        position: usize,
        expected: &LineItem,
    ) -> LedgerResult<Option<bool>> {
        let bucket_path = DocumentPath::sales_bucket(shop, date);
        let index_path = DocumentPath::transaction_index(shop, transaction_id);
        // the quick-sale line never drew stock, so it returns none
        let item_path = (!expected.product_id.is_empty()
            && expected.product_id != QUICK_SALE_PRODUCT_ID)
            .then(|| DocumentPath::inventory_item(shop, &expected.product_id));
        let now = Utc::now();

        let mut reads = vec![bucket_path.clone()];
        reads.extend(item_path.clone());

        let mut outcome: Outcome<Option<LineItem>> = Outcome::Missing;

        self.store
            .run_transaction(
                reads,
                Box::new(|snapshot: &Snapshot| {
                    let Some(mut bucket) = bucket_in(snapshot, &bucket_path)? else {
                        return Ok(WriteBatch::new());
                    };

                    let current = bucket
                        .find(transaction_id)
                        .and_then(|sale| sale.line_items.get(position));
                    match current {
                        None => return Ok(WriteBatch::new()),
                        Some(item) if item != expected => {
                            outcome = Outcome::Done(None);
                            return Ok(WriteBatch::new());
                        }
                        Some(_) => {}
                    }

                    let removed = match bucket.remove_line_item(transaction_id, position) {
                        Ok(Some(removed)) => removed,
                        Ok(None) | Err(CoreError::LineItemOutOfRange { .. }) => {
                            return Ok(WriteBatch::new())
                        }
                        Err(e) => {
                            outcome = Outcome::Rejected(e.into());
                            return Ok(WriteBatch::new());
                        }
                    };

                    let mut batch = WriteBatch::new();
                    batch
                        .set(bucket_path.clone(), encode_bucket(&bucket)?)
                        .set(index_path, encode_index(date)?);

                    if let Some(path) = &item_path {
                        if let Some(value) = snapshot.get(path) {
                            let mut item = decode_inventory(path, value)?;
                            item.stock_amount =
                                adjust_stock(item.stock_amount, i64::from(removed.quantity));
                            item.last_updated = now;
                            batch.set(path.clone(), encode_inventory(&item)?);
                        }
                    }

                    outcome = Outcome::Done(Some(removed));
                    Ok(batch)
                }),
            )
            .await
            .map_err(store_failure(shop, "remove_line_item"))?;

        match outcome {
            Outcome::Done(Some(removed)) => {
                info!(
                    shop_id = %shop,
                    transaction_id,
                    product_id = %removed.product_id,
                    quantity = removed.quantity,
                    "Line item removed"
                );
                Ok(Some(true))
            }
            Outcome::Done(None) => Ok(None),
            Outcome::Rejected(err) => Err(err),
            Outcome::Missing => Ok(Some(false)),
        }
    }

    // =========================================================================
    // Lookup + Loading
    // =========================================================================

    /// Finds the bucket date holding `transaction_id`.
    async fn locate(
        &self,
        shop: &ShopId,
        transaction_id: &str,
        date_hint: Option<NaiveDate>,
    ) -> LedgerResult<Option<NaiveDate>> {
        self.locate_inner(shop, transaction_id, date_hint)
            .await
            .map_err(store_failure(shop, "locate_transaction"))
    }

    async fn locate_inner(
        &self,
        shop: &ShopId,
        transaction_id: &str,
        date_hint: Option<NaiveDate>,
    ) -> StoreResult<Option<NaiveDate>> {
        if let Some(date) = date_hint {
            if self.bucket_contains(shop, date, transaction_id).await? {
                return Ok(Some(date));
            }
        }

        let index_path = DocumentPath::transaction_index(shop, transaction_id);
        if let Some(value) = self.store.get(&index_path).await? {
            let date = decode_index(&index_path, &value)?;
            if self.bucket_contains(shop, date, transaction_id).await? {
                return Ok(Some(date));
            }
            debug!(shop_id = %shop, transaction_id, date = %date, "Stale index entry");
        }

        // records written before the index existed
        let found = self
            .load_all(shop)
            .await?
            .into_iter()
            .find(|b| b.position_of(transaction_id).is_some())
            .map(|b| b.date);

        if let Some(date) = found {
            info!(shop_id = %shop, transaction_id, date = %date, "Repairing transaction index");
            if let Err(e) = self.store.set(&index_path, encode_index(date)?).await {
                warn!(shop_id = %shop, transaction_id, error = %e, "Index repair failed");
            }
        }

        Ok(found)
    }

    async fn bucket_contains(
        &self,
        shop: &ShopId,
        date: NaiveDate,
        transaction_id: &str,
    ) -> StoreResult<bool> {
        Ok(self
            .load_bucket(shop, date)
            .await?
            .is_some_and(|b| b.position_of(transaction_id).is_some()))
    }

    async fn load_bucket(&self, shop: &ShopId, date: NaiveDate) -> StoreResult<Option<DailyBucket>> {
        let path = DocumentPath::sales_bucket(shop, date);
        match self.store.get(&path).await? {
            Some(value) => decode_bucket(&path, &value).map(Some),
            None => Ok(None),
        }
    }

    async fn load_range(
        &self,
        shop: &ShopId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Vec<DailyBucket>> {
        let collection = sales_collection(shop);
        let docs = self
            .store
            .list_range(
                &collection,
                &start.format("%Y-%m-%d").to_string(),
                &end.format("%Y-%m-%d").to_string(),
            )
            .await?;
        decode_buckets(&collection, docs)
    }

    async fn load_all(&self, shop: &ShopId) -> StoreResult<Vec<DailyBucket>> {
        let collection = sales_collection(shop);
        let docs = self.store.list(&collection).await?;
        decode_buckets(&collection, docs)
    }
}

fn bucket_in(snapshot: &Snapshot, path: &DocumentPath) -> StoreResult<Option<DailyBucket>> {
    snapshot
        .get(path)
        .map(|value| decode_bucket(path, value))
        .transpose()
}

fn decode_buckets(
    collection: &str,
    docs: Vec<(String, serde_json::Value)>,
) -> StoreResult<Vec<DailyBucket>> {
    docs.into_iter()
        .map(|(id, value)| decode_bucket(&DocumentPath::new(collection, id), &value))
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
