//! # In-Memory Document Store
//!
//! Ordered maps behind a `tokio::sync::RwLock`. Used by tests and by the
//! `memory` backend setting.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::document::{DocumentPath, DocumentStore, Snapshot, TransactionFn, WriteBatch, WriteOp};
use crate::error::StoreResult;

type Collections = BTreeMap<String, BTreeMap<String, Value>>;

/// Process-local document store.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<Collections>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents across all collections.
    pub async fn document_count(&self) -> usize {
        self.collections.read().await.values().map(BTreeMap::len).sum()
    }
}

fn apply(collections: &mut Collections, batch: WriteBatch) -> usize {
    let applied = batch.len();
    for op in batch.into_ops() {
        match op {
            WriteOp::Set(path, value) => {
                collections
                    .entry(path.collection().to_string())
                    .or_default()
                    .insert(path.id().to_string(), value);
            }
            WriteOp::Delete(path) => {
                if let Some(docs) = collections.get_mut(path.collection()) {
                    docs.remove(path.id());
                }
            }
        }
    }
    applied
}

fn lookup<'a>(collections: &'a Collections, path: &DocumentPath) -> Option<&'a Value> {
    collections
        .get(path.collection())
        .and_then(|docs| docs.get(path.id()))
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, path: &DocumentPath) -> StoreResult<Option<Value>> {
        let collections = self.collections.read().await;
        Ok(lookup(&collections, path).cloned())
    }

    async fn list(&self, collection: &str) -> StoreResult<Vec<(String, Value)>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| docs.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    async fn list_range(
        &self,
        collection: &str,
        start: &str,
        end: &str,
    ) -> StoreResult<Vec<(String, Value)>> {
        if start > end {
            return Ok(Vec::new());
        }

        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.range(start.to_string()..=end.to_string())
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn set(&self, path: &DocumentPath, value: Value) -> StoreResult<()> {
        let mut collections = self.collections.write().await;
        collections
            .entry(path.collection().to_string())
            .or_default()
            .insert(path.id().to_string(), value);
        Ok(())
    }

    async fn delete(&self, path: &DocumentPath) -> StoreResult<bool> {
        let mut collections = self.collections.write().await;
        Ok(collections
            .get_mut(path.collection())
            .and_then(|docs| docs.remove(path.id()))
            .is_some())
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut collections = self.collections.write().await;
        apply(&mut collections, batch);
        Ok(())
    }

    async fn run_transaction(
        &self,
        reads: Vec<DocumentPath>,
        f: TransactionFn<'_>,
    ) -> StoreResult<usize> {
        // the write lock is held from the first read to the last write
        let mut collections = self.collections.write().await;

        let mut snapshot = Snapshot::new();
        for path in reads {
            if let Some(value) = lookup(&collections, &path).cloned() {
                snapshot.insert(path, value);
            }
        }

        let batch = f(&snapshot)?;
        let applied = apply(&mut collections, batch);
        debug!(writes = applied, "Memory transaction committed");
        Ok(applied)
    }
}
