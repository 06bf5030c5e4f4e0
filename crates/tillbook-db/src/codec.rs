//! # Document Codec
//!
//! Converts domain types to and from store documents.
//!
//! ## Wire Shapes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sales/{date}                                                           │
//! │  { totalRevenue: 12.5, salesCount: 1, transactions: [                   │
//! │      { id: "1710000000000",                                             │
//! │        timestamp: { seconds: 1710000000, nanoseconds: 0 },              │
//! │        lineItems: [{ productId, productName, quantity, price }],        │
//! │        totalPrice: 12.5,                                                │
//! │        status: "completed" } ] }                                        │
//! │                                                                         │
//! │  inventory/{productId}                                                  │
//! │  { productId, productName, unitPrice, stockAmount, unit, lastUpdated }  │
//! │                                                                         │
//! │  transactionIndex/{txId}                                                │
//! │  { date: "2024-03-09" }                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Decoding is strict: missing fields, unknown fields, non-finite amounts,
//! negative counts, zero quantities, negative prices and unknown statuses
//! all yield [`StoreError::MalformedDocument`]. The stored `status` is
//! checked but the status derived from the line items wins.
//!
//! Amounts travel as decimal numbers, so both directions refuse anything
//! past [`Money::MAX_EXACT_CENTS`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use tillbook_core::{
    DailyBucket, InventoryItem, LineItem, Money, SaleRecord, TransactionStatus,
    QUICK_SALE_PRODUCT_ID,
};

use crate::document::DocumentPath;
use crate::error::{StoreError, StoreResult};

const DATE_FORMAT: &str = "%Y-%m-%d";

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct TimestampDoc {
    seconds: i64,
    nanoseconds: u32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct LineItemDoc {
    product_id: String,
    product_name: String,
    quantity: i64,
    price: f64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct TransactionDoc {
    id: String,
    timestamp: TimestampDoc,
    line_items: Vec<LineItemDoc>,
    total_price: f64,
    status: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct BucketDoc {
    total_revenue: f64,
    sales_count: i64,
    transactions: Vec<TransactionDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct InventoryDoc {
    product_id: String,
    product_name: String,
    unit_price: f64,
    stock_amount: i64,
    unit: String,
    last_updated: TimestampDoc,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct IndexDoc {
    date: String,
}

// =============================================================================
// Scalars
// =============================================================================

fn encode_timestamp(at: &DateTime<Utc>) -> TimestampDoc {
    TimestampDoc {
        seconds: at.timestamp(),
        nanoseconds: at.timestamp_subsec_nanos(),
    }
}

fn decode_timestamp(path: &DocumentPath, doc: &TimestampDoc) -> StoreResult<DateTime<Utc>> {
    if doc.nanoseconds >= 1_000_000_000 {
        return Err(StoreError::malformed(path, "timestamp nanoseconds out of range"));
    }
    DateTime::from_timestamp(doc.seconds, doc.nanoseconds)
        .ok_or_else(|| StoreError::malformed(path, "timestamp out of range"))
}

fn encode_money(field: &str, amount: Money) -> StoreResult<f64> {
    if !amount.is_exact_decimal() {
        return Err(StoreError::Internal(format!(
            "{} {} exceeds the exact decimal range",
            field, amount
        )));
    }
    Ok(amount.to_decimal())
}

fn decode_money(path: &DocumentPath, field: &str, value: f64) -> StoreResult<Money> {
    Money::from_decimal(value).ok_or_else(|| {
        StoreError::malformed(path, format!("{} is not a finite in-range amount", field))
    })
}

fn decode_count(path: &DocumentPath, field: &str, value: i64) -> StoreResult<u64> {
    u64::try_from(value)
        .map_err(|_| StoreError::malformed(path, format!("{} is negative", field)))
}

/// Parses a `YYYY-MM-DD` document id.
pub fn parse_date_id(path: &DocumentPath) -> StoreResult<NaiveDate> {
    NaiveDate::parse_from_str(path.id(), DATE_FORMAT)
        .map_err(|e| StoreError::malformed(path, format!("bucket id is not a date: {}", e)))
}

fn deserialize<'a, T: Deserialize<'a>>(path: &DocumentPath, value: &'a Value) -> StoreResult<T> {
    T::deserialize(value).map_err(|e| StoreError::malformed(path, e.to_string()))
}

// =============================================================================
// Daily Bucket
// =============================================================================

/// Encodes a bucket. The derived status of each transaction is written.
pub fn encode_bucket(bucket: &DailyBucket) -> StoreResult<Value> {
    let doc = BucketDoc {
        total_revenue: encode_money("totalRevenue", bucket.total_revenue)?,
        sales_count: i64::try_from(bucket.sales_count).unwrap_or(i64::MAX),
        transactions: bucket
            .transactions
            .iter()
            .map(encode_transaction)
            .collect::<StoreResult<Vec<_>>>()?,
    };
    Ok(serde_json::to_value(doc)?)
}

fn encode_transaction(sale: &SaleRecord) -> StoreResult<TransactionDoc> {
    let line_items = sale
        .line_items
        .iter()
        .map(|item| {
            Ok(LineItemDoc {
                product_id: item.product_id.clone(),
                product_name: item.product_name.clone(),
                quantity: i64::from(item.quantity),
                price: encode_money("price", item.price)?,
            })
        })
        .collect::<StoreResult<Vec<_>>>()?;

    Ok(TransactionDoc {
        id: sale.id.clone(),
        timestamp: encode_timestamp(&sale.timestamp),
        line_items,
        total_price: encode_money("totalPrice", sale.total_price)?,
        status: sale.status().as_str().to_string(),
    })
}

/// Decodes the bucket stored at `path` (the path id is the bucket date).
///
/// Stored aggregates are kept as-is; drift from the transaction list is
/// logged and corrected by the next mutation's recompute.
pub fn decode_bucket(path: &DocumentPath, value: &Value) -> StoreResult<DailyBucket> {
    let date = parse_date_id(path)?;
    let doc: BucketDoc = deserialize(path, value)?;

    let transactions = doc
        .transactions
        .iter()
        .map(|t| decode_transaction(path, t))
        .collect::<StoreResult<Vec<_>>>()?;

    let bucket = DailyBucket {
        date,
        total_revenue: decode_money(path, "totalRevenue", doc.total_revenue)?,
        sales_count: decode_count(path, "salesCount", doc.sales_count)?,
        transactions,
    };

    if !bucket.is_consistent() {
        warn!(
            path = %path,
            total_revenue = %bucket.total_revenue,
            sales_count = bucket.sales_count,
            transactions = bucket.transactions.len(),
            "Bucket aggregates drift from its transactions"
        );
    }

    Ok(bucket)
}

fn decode_transaction(path: &DocumentPath, doc: &TransactionDoc) -> StoreResult<SaleRecord> {
    if doc.id.is_empty() {
        return Err(StoreError::malformed(path, "transaction id is empty"));
    }

    let line_items = doc
        .line_items
        .iter()
        .map(|item| decode_line_item(path, item))
        .collect::<StoreResult<Vec<_>>>()?;

    let sale = SaleRecord {
        id: doc.id.clone(),
        timestamp: decode_timestamp(path, &doc.timestamp)?,
        line_items,
        total_price: decode_money(path, "totalPrice", doc.total_price)?,
    };

    let stored: TransactionStatus = doc.status.parse().map_err(|_| {
        StoreError::malformed(path, format!("unknown status '{}'", doc.status))
    })?;
    if stored != sale.status() {
        debug!(
            path = %path,
            transaction_id = %sale.id,
            stored = %stored,
            derived = %sale.status(),
            "Stored status differs from derived status"
        );
    }

    Ok(sale)
}

fn decode_line_item(path: &DocumentPath, doc: &LineItemDoc) -> StoreResult<LineItem> {
    let quantity = u32::try_from(doc.quantity)
        .ok()
        .filter(|q| *q > 0)
        .ok_or_else(|| StoreError::malformed(path, "line item quantity must be positive"))?;

    let price = decode_money(path, "price", doc.price)?;
    // the synthetic item carries the raw sale amount, which may be negative
    if price.is_negative() && doc.product_id != QUICK_SALE_PRODUCT_ID {
        return Err(StoreError::malformed(path, "line item price is negative"));
    }

    Ok(LineItem {
        product_id: doc.product_id.clone(),
        product_name: doc.product_name.clone(),
        quantity,
        price,
    })
}

// =============================================================================
// Inventory
// =============================================================================

pub fn encode_inventory(item: &InventoryItem) -> StoreResult<Value> {
    let doc = InventoryDoc {
        product_id: item.product_id.clone(),
        product_name: item.product_name.clone(),
        unit_price: encode_money("unitPrice", item.unit_price)?,
        stock_amount: i64::try_from(item.stock_amount).unwrap_or(i64::MAX),
        unit: item.unit.clone(),
        last_updated: encode_timestamp(&item.last_updated),
    };
    Ok(serde_json::to_value(doc)?)
}

pub fn decode_inventory(path: &DocumentPath, value: &Value) -> StoreResult<InventoryItem> {
    let doc: InventoryDoc = deserialize(path, value)?;

    if doc.product_id != path.id() {
        return Err(StoreError::malformed(
            path,
            format!("productId '{}' does not match document id", doc.product_id),
        ));
    }

    let unit_price = decode_money(path, "unitPrice", doc.unit_price)?;
    if unit_price.is_negative() {
        return Err(StoreError::malformed(path, "unitPrice is negative"));
    }

    Ok(InventoryItem {
        product_id: doc.product_id,
        product_name: doc.product_name,
        unit_price,
        stock_amount: decode_count(path, "stockAmount", doc.stock_amount)?,
        unit: doc.unit,
        last_updated: decode_timestamp(path, &doc.last_updated)?,
    })
}

// =============================================================================
// Transaction Index
// =============================================================================

pub fn encode_index(date: NaiveDate) -> StoreResult<Value> {
    Ok(serde_json::to_value(IndexDoc {
        date: date.format(DATE_FORMAT).to_string(),
    })?)
}

pub fn decode_index(path: &DocumentPath, value: &Value) -> StoreResult<NaiveDate> {
    let doc: IndexDoc = deserialize(path, value)?;
    NaiveDate::parse_from_str(&doc.date, DATE_FORMAT)
        .map_err(|e| StoreError::malformed(path, format!("index date: {}", e)))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tillbook_core::ShopId;

    fn shop() -> ShopId {
        ShopId::from_contact("owner@corner.shop").unwrap()
    }

    fn bucket_path() -> DocumentPath {
        DocumentPath::sales_bucket(&shop(), NaiveDate::from_ymd_opt(2024, 3, 9).unwrap())
    }

    fn sample_bucket() -> DailyBucket {
        let at = DateTime::from_timestamp(1_710_000_000, 123_000_000).unwrap();
        let mut bucket = DailyBucket::empty(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
        bucket.append(SaleRecord::quick_sale("1710000000123", at, Money::from_cents(1250)));

        let mut itemized = SaleRecord::open("1710000000124", at);
        itemized.line_items = vec![
            LineItem::new("bread", "Bread", 2, Money::from_cents(5000)),
            LineItem::new("milk", "Milk", 1, Money::from_cents(199)),
        ];
        itemized.recompute_total();
        bucket.append(itemized);
        bucket
    }

    #[test]
    fn test_bucket_round_trip() {
        let bucket = sample_bucket();
        let value = encode_bucket(&bucket).unwrap();

        assert_eq!(value["salesCount"], json!(2));
        assert_eq!(value["transactions"][1]["status"], json!("completed"));
        assert_eq!(value["transactions"][0]["timestamp"]["nanoseconds"], json!(123_000_000));

        let decoded = decode_bucket(&bucket_path(), &value).unwrap();
        assert_eq!(decoded, bucket);
    }

    #[test]
    fn test_derived_status_wins_over_stored() {
        let mut value = encode_bucket(&sample_bucket()).unwrap();
        value["transactions"][1]["status"] = json!("failed");

        let decoded = decode_bucket(&bucket_path(), &value).unwrap();
        assert_eq!(decoded.transactions[1].status(), TransactionStatus::Completed);
    }

    #[test]
    fn test_rejects_unknown_status() {
        let mut value = encode_bucket(&sample_bucket()).unwrap();
        value["transactions"][0]["status"] = json!("refunded");

        let err = decode_bucket(&bucket_path(), &value).unwrap_err();
        assert!(matches!(err, StoreError::MalformedDocument { .. }));
    }

    #[test]
    fn test_rejects_unknown_and_missing_fields() {
        let mut value = encode_bucket(&sample_bucket()).unwrap();
        value["extra"] = json!(true);
        assert!(decode_bucket(&bucket_path(), &value).is_err());

        let value = json!({"totalRevenue": 0, "salesCount": 0});
        assert!(decode_bucket(&bucket_path(), &value).is_err());
    }

    #[test]
    fn test_rejects_bad_numbers() {
        let mut value = encode_bucket(&sample_bucket()).unwrap();
        value["salesCount"] = json!(-1);
        assert!(decode_bucket(&bucket_path(), &value).is_err());

        let mut value = encode_bucket(&sample_bucket()).unwrap();
        value["transactions"][1]["lineItems"][0]["quantity"] = json!(0);
        assert!(decode_bucket(&bucket_path(), &value).is_err());

        let mut value = encode_bucket(&sample_bucket()).unwrap();
        value["transactions"][1]["lineItems"][0]["price"] = json!(-1.0);
        assert!(decode_bucket(&bucket_path(), &value).is_err());
    }

    #[test]
    fn test_amounts_past_exact_range() {
        // 1e17 major units cannot be held to the cent by a double
        let mut value = encode_bucket(&sample_bucket()).unwrap();
        value["totalRevenue"] = json!(1e17);
        assert!(matches!(
            decode_bucket(&bucket_path(), &value),
            Err(StoreError::MalformedDocument { .. })
        ));

        let mut value = encode_bucket(&sample_bucket()).unwrap();
        value["transactions"][0]["lineItems"][0]["price"] = json!(-1e17);
        assert!(decode_bucket(&bucket_path(), &value).is_err());

        let at = DateTime::from_timestamp(1_710_000_000, 0).unwrap();
        let mut bucket = DailyBucket::empty(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
        bucket.append(SaleRecord::quick_sale("1", at, Money::from_cents(i64::MAX)));
        assert!(matches!(encode_bucket(&bucket), Err(StoreError::Internal(_))));
    }

    #[test]
    fn test_negative_quick_sale_is_accepted() {
        let at = DateTime::from_timestamp(1_710_000_000, 0).unwrap();
        let mut bucket = DailyBucket::empty(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
        bucket.append(SaleRecord::quick_sale("1", at, Money::from_cents(-500)));

        let value = encode_bucket(&bucket).unwrap();
        let decoded = decode_bucket(&bucket_path(), &value).unwrap();
        assert_eq!(decoded.total_revenue.cents(), -500);
    }

    #[test]
    fn test_rejects_non_date_bucket_id() {
        let path = DocumentPath::new("shops/x/sales", "yesterday");
        let value = encode_bucket(&sample_bucket()).unwrap();
        assert!(decode_bucket(&path, &value).is_err());
    }

    #[test]
    fn test_drifted_aggregates_are_kept() {
        let mut value = encode_bucket(&sample_bucket()).unwrap();
        value["totalRevenue"] = json!(1.0);

        let decoded = decode_bucket(&bucket_path(), &value).unwrap();
        assert_eq!(decoded.total_revenue.cents(), 100);
        assert!(!decoded.is_consistent());
    }

    #[test]
    fn test_inventory_round_trip() {
        let item = InventoryItem {
            product_id: "bread".to_string(),
            product_name: "Bread".to_string(),
            unit_price: Money::from_cents(250),
            stock_amount: 40,
            unit: "loaf".to_string(),
            last_updated: DateTime::from_timestamp(1_710_000_000, 0).unwrap(),
        };
        let path = DocumentPath::inventory_item(&shop(), "bread");

        let value = encode_inventory(&item).unwrap();
        assert_eq!(value["unitPrice"], json!(2.5));
        assert_eq!(decode_inventory(&path, &value).unwrap(), item);

        let other = DocumentPath::inventory_item(&shop(), "milk");
        assert!(decode_inventory(&other, &value).is_err());
    }

    #[test]
    fn test_index_round_trip() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let path = DocumentPath::transaction_index(&shop(), "1");

        let value = encode_index(date).unwrap();
        assert_eq!(value, json!({"date": "2024-03-09"}));
        assert_eq!(decode_index(&path, &value).unwrap(), date);
        assert!(decode_index(&path, &json!({"date": "soon"})).is_err());
    }
}
