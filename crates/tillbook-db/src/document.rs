//! # Document Store Abstraction
//!
//! The ledger talks to a hierarchical document store: collections of JSON
//! documents addressed by `collection/id`.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  shops/{shopId}/sales/{YYYY-MM-DD}            ← DailyBucket             │
//! │  shops/{shopId}/inventory/{productId}         ← InventoryItem           │
//! │  shops/{shopId}/transactionIndex/{txId}       ← {date}                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Transactions
//! ```text
//! run_transaction(reads, f)
//!   │
//!   ├── read every path in `reads` into a Snapshot   ┐
//!   ├── f(&snapshot) → WriteBatch                    │ exclusive
//!   └── apply the batch atomically                   ┘
//! ```
//! An empty batch writes nothing, which is how callers abort.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use tillbook_core::ShopId;

use crate::error::StoreResult;

// =============================================================================
// Paths
// =============================================================================

/// Address of one document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentPath {
    collection: String,
    id: String,
}

impl DocumentPath {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        DocumentPath {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// `shops/{shop}/sales/{date}`
    pub fn sales_bucket(shop: &ShopId, date: NaiveDate) -> Self {
        Self::new(sales_collection(shop), date.format("%Y-%m-%d").to_string())
    }

    /// `shops/{shop}/inventory/{product_id}`
    pub fn inventory_item(shop: &ShopId, product_id: &str) -> Self {
        Self::new(inventory_collection(shop), product_id)
    }

    /// `shops/{shop}/transactionIndex/{transaction_id}`
    pub fn transaction_index(shop: &ShopId, transaction_id: &str) -> Self {
        Self::new(transaction_index_collection(shop), transaction_id)
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

pub fn sales_collection(shop: &ShopId) -> String {
    format!("shops/{}/sales", shop)
}

pub fn inventory_collection(shop: &ShopId) -> String {
    format!("shops/{}/inventory", shop)
}

pub fn transaction_index_collection(shop: &ShopId) -> String {
    format!("shops/{}/transactionIndex", shop)
}

// =============================================================================
// Write Batch
// =============================================================================

/// One pending write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Set(DocumentPath, Value),
    Delete(DocumentPath),
}

impl WriteOp {
    pub fn path(&self) -> &DocumentPath {
        match self {
            WriteOp::Set(path, _) | WriteOp::Delete(path) => path,
        }
    }
}

/// Writes applied together or not at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, path: DocumentPath, value: Value) -> &mut Self {
        self.ops.push(WriteOp::Set(path, value));
        self
    }

    pub fn delete(&mut self, path: DocumentPath) -> &mut Self {
        self.ops.push(WriteOp::Delete(path));
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// Documents read at the start of a transaction.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    docs: HashMap<DocumentPath, Value>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: DocumentPath, value: Value) {
        self.docs.insert(path, value);
    }

    /// The document at `path`, if it existed when the transaction started.
    pub fn get(&self, path: &DocumentPath) -> Option<&Value> {
        self.docs.get(path)
    }
}

/// Body of a store transaction.
pub type TransactionFn<'a> = Box<dyn FnOnce(&Snapshot) -> StoreResult<WriteBatch> + Send + 'a>;

// =============================================================================
// Store Trait
// =============================================================================

/// Hierarchical document store.
///
/// Listing results are ordered by document id.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads one document.
    async fn get(&self, path: &DocumentPath) -> StoreResult<Option<Value>>;

    /// Reads every document in a collection.
    async fn list(&self, collection: &str) -> StoreResult<Vec<(String, Value)>>;

    /// Reads the documents whose id lies in `start..=end`.
    async fn list_range(
        &self,
        collection: &str,
        start: &str,
        end: &str,
    ) -> StoreResult<Vec<(String, Value)>>;

    /// Creates or replaces one document.
    async fn set(&self, path: &DocumentPath, value: Value) -> StoreResult<()>;

    /// Deletes one document. Returns false if it did not exist.
    async fn delete(&self, path: &DocumentPath) -> StoreResult<bool>;

    /// Applies every write in the batch atomically.
    async fn commit(&self, batch: WriteBatch) -> StoreResult<()>;

    /// Reads `reads`, hands them to `f` and commits the returned batch, with
    /// no other writer interleaving. Returns the number of writes applied.
    async fn run_transaction(&self, reads: Vec<DocumentPath>, f: TransactionFn<'_>)
        -> StoreResult<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let shop = ShopId::from_contact("owner@corner.shop").unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();

        let bucket = DocumentPath::sales_bucket(&shop, date);
        assert_eq!(bucket.to_string(), "shops/owner_corner_shop/sales/2024-01-05");
        assert_eq!(bucket.id(), "2024-01-05");

        let item = DocumentPath::inventory_item(&shop, "bread");
        assert_eq!(item.collection(), "shops/owner_corner_shop/inventory");

        let index = DocumentPath::transaction_index(&shop, "1710000000000");
        assert_eq!(
            index.to_string(),
            "shops/owner_corner_shop/transactionIndex/1710000000000"
        );
    }

    #[test]
    fn test_batch() {
        let mut batch = WriteBatch::new();
        assert!(batch.is_empty());

        batch
            .set(DocumentPath::new("c", "a"), serde_json::json!({"x": 1}))
            .delete(DocumentPath::new("c", "b"));

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.ops()[1].path().id(), "b");
    }
}
