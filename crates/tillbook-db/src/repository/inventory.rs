//! # Inventory Coordinator
//!
//! Stock levels and prices for a shop's products.
//!
//! ## Key Operations
//! - Lookup and listing (sorted by name)
//! - Create-or-replace keyed by the product name slug
//! - Partial updates and absolute / relative stock changes
//! - Low-stock report
//!
//! Stock changes caused by sales go through the
//! [`LedgerAggregator`](super::sales::LedgerAggregator) so the bucket and
//! the stock level move in one store transaction. Direct edits here are
//! last-write-wins.
//!
//! ## Product Ids
//! ```text
//! "Whole Wheat Bread (800g)" ──product_slug──► "whole-wheat-bread-800g"
//!
//! Renaming keeps the original id:
//!   update_inventory_item("whole-wheat-bread-800g", name = "Brown Bread")
//!   → shops/{shop}/inventory/whole-wheat-bread-800g { productName: "Brown Bread" }
//! ```

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use tillbook_core::ident::product_slug;
use tillbook_core::ledger::adjust_stock;
use tillbook_core::validation::{validate_inventory_patch, validate_new_inventory_item};
use tillbook_core::{
    InventoryItem, InventoryPatch, NewInventoryItem, ShopId, ShopSession, ValidationError,
    QUICK_SALE_PRODUCT_ID,
};

use crate::codec::{decode_inventory, encode_inventory};
use crate::document::{inventory_collection, DocumentPath, DocumentStore, Snapshot, WriteBatch};
use crate::error::{LedgerResult, StoreResult};
use crate::repository::{resolve, store_failure};

/// Inventory operations for one store.
///
/// ## Usage
/// ```rust,ignore
/// let inventory = InventoryCoordinator::new(store);
///
/// let bread = inventory.upsert_item(&session, NewInventoryItem {
///     product_name: "Bread".into(),
///     unit_price: Money::from_cents(250),
///     stock_amount: 40,
///     unit: "loaf".into(),
/// }).await?;
///
/// inventory.adjust_stock(&session, "bread", -3).await?;
/// ```
#[derive(Clone)]
pub struct InventoryCoordinator {
    store: Arc<dyn DocumentStore>,
}

impl std::fmt::Debug for InventoryCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventoryCoordinator").finish_non_exhaustive()
    }
}

impl InventoryCoordinator {
    /// Creates a coordinator over `store`.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        InventoryCoordinator { store }
    }

    /// Gets one item by product id.
    pub async fn get_item(
        &self,
        session: &ShopSession,
        product_id: &str,
    ) -> LedgerResult<Option<InventoryItem>> {
        let Some(shop) = resolve(session, "get_item") else {
            return Ok(None);
        };

        self.load(shop, product_id)
            .await
            .map_err(store_failure(shop, "get_item"))
    }

    /// Every item, sorted by product name (case-insensitive), then id.
    pub async fn get_all_inventory(&self, session: &ShopSession) -> LedgerResult<Vec<InventoryItem>> {
        let Some(shop) = resolve(session, "get_all_inventory") else {
            return Ok(Vec::new());
        };

        let mut items = self
            .load_all(shop)
            .await
            .map_err(store_failure(shop, "get_all_inventory"))?;
        items.sort_by(|a, b| {
            a.product_name
                .to_lowercase()
                .cmp(&b.product_name.to_lowercase())
                .then_with(|| a.product_id.cmp(&b.product_id))
        });

        debug!(shop_id = %shop, count = items.len(), "Loaded inventory");
        Ok(items)
    }

    /// Items at or below `threshold`, lowest stock first.
    pub async fn low_stock(
        &self,
        session: &ShopSession,
        threshold: u64,
    ) -> LedgerResult<Vec<InventoryItem>> {
        let Some(shop) = resolve(session, "low_stock") else {
            return Ok(Vec::new());
        };

        let mut items: Vec<InventoryItem> = self
            .load_all(shop)
            .await
            .map_err(store_failure(shop, "low_stock"))?
            .into_iter()
            .filter(|item| item.stock_amount <= threshold)
            .collect();
        items.sort_by(|a, b| {
            a.stock_amount
                .cmp(&b.stock_amount)
                .then_with(|| a.product_id.cmp(&b.product_id))
        });
        Ok(items)
    }

    /// Creates or replaces the item whose id is the slug of its name.
    ///
    /// The `quick-sale` slug is reserved for raw-amount sale lines.
    pub async fn upsert_item(
        &self,
        session: &ShopSession,
        new_item: NewInventoryItem,
    ) -> LedgerResult<Option<InventoryItem>> {
        let Some(shop) = resolve(session, "upsert_item") else {
            return Ok(None);
        };
        validate_new_inventory_item(&new_item)?;

        let product_id = product_slug(&new_item.product_name)?;
        if product_id == QUICK_SALE_PRODUCT_ID {
            return Err(ValidationError::InvalidFormat {
                field: "product_name".to_string(),
                reason: format!("'{}' is reserved for quick sales", QUICK_SALE_PRODUCT_ID),
            }
            .into());
        }
        let item = InventoryItem {
            product_id,
            product_name: new_item.product_name.trim().to_string(),
            unit_price: new_item.unit_price,
            stock_amount: new_item.stock_amount,
            unit: new_item.unit.trim().to_string(),
            last_updated: Utc::now(),
        };

        let path = DocumentPath::inventory_item(shop, &item.product_id);
        let body = encode_inventory(&item).map_err(store_failure(shop, "upsert_item"))?;
        self.store
            .set(&path, body)
            .await
            .map_err(store_failure(shop, "upsert_item"))?;

        info!(
            shop_id = %shop,
            product_id = %item.product_id,
            stock_amount = item.stock_amount,
            "Inventory item saved"
        );
        Ok(Some(item))
    }

    /// Partially updates an item. Returns `false` if it doesn't exist.
    pub async fn update_inventory_item(
        &self,
        session: &ShopSession,
        product_id: &str,
        patch: &InventoryPatch,
    ) -> LedgerResult<bool> {
        let Some(shop) = resolve(session, "update_inventory_item") else {
            return Ok(false);
        };
        validate_inventory_patch(patch)?;

        let updated = self
            .modify(shop, product_id, |item| {
                if let Some(name) = &patch.product_name {
                    item.product_name = name.trim().to_string();
                }
                if let Some(price) = patch.unit_price {
                    item.unit_price = price;
                }
                if let Some(stock) = patch.stock_amount {
                    item.stock_amount = stock;
                }
                if let Some(unit) = &patch.unit {
                    item.unit = unit.trim().to_string();
                }
            })
            .await
            .map_err(store_failure(shop, "update_inventory_item"))?;

        if updated.is_some() {
            info!(shop_id = %shop, product_id, "Inventory item updated");
        }
        Ok(updated.is_some())
    }

    /// Sets an absolute stock level. Returns `false` if the item doesn't exist.
    pub async fn set_stock(
        &self,
        session: &ShopSession,
        product_id: &str,
        new_amount: u64,
    ) -> LedgerResult<bool> {
        let Some(shop) = resolve(session, "set_stock") else {
            return Ok(false);
        };

        let updated = self
            .modify(shop, product_id, |item| item.stock_amount = new_amount)
            .await
            .map_err(store_failure(shop, "set_stock"))?;

        if updated.is_some() {
            info!(shop_id = %shop, product_id, stock_amount = new_amount, "Stock set");
        }
        Ok(updated.is_some())
    }

    /// Moves stock by a signed delta, clamped at zero.
    ///
    /// Returns the new level, or `None` if the item doesn't exist.
    pub async fn adjust_stock(
        &self,
        session: &ShopSession,
        product_id: &str,
        delta: i64,
    ) -> LedgerResult<Option<u64>> {
        let Some(shop) = resolve(session, "adjust_stock") else {
            return Ok(None);
        };

        let updated = self
            .modify(shop, product_id, |item| {
                item.stock_amount = adjust_stock(item.stock_amount, delta)
            })
            .await
            .map_err(store_failure(shop, "adjust_stock"))?;

        if let Some(item) = &updated {
            info!(
                shop_id = %shop,
                product_id,
                delta,
                stock_amount = item.stock_amount,
                "Stock adjusted"
            );
        }
        Ok(updated.map(|item| item.stock_amount))
    }

    /// Deletes an item. Returns `false` if it doesn't exist.
    pub async fn remove_item(&self, session: &ShopSession, product_id: &str) -> LedgerResult<bool> {
        let Some(shop) = resolve(session, "remove_item") else {
            return Ok(false);
        };

        let path = DocumentPath::inventory_item(shop, product_id);
        let removed = self
            .store
            .delete(&path)
            .await
            .map_err(store_failure(shop, "remove_item"))?;

        if removed {
            info!(shop_id = %shop, product_id, "Inventory item removed");
        }
        Ok(removed)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Read-modify-write of one item, stamping `last_updated`.
    async fn modify<F>(
        &self,
        shop: &ShopId,
        product_id: &str,
        edit: F,
    ) -> StoreResult<Option<InventoryItem>>
    where
        F: FnOnce(&mut InventoryItem) + Send,
    {
        let path = DocumentPath::inventory_item(shop, product_id);
        let now = Utc::now();
        let mut updated = None;

        self.store
            .run_transaction(
                vec![path.clone()],
                Box::new(|snapshot: &Snapshot| {
                    let Some(value) = snapshot.get(&path) else {
                        return Ok(WriteBatch::new());
                    };
                    let mut item = decode_inventory(&path, value)?;
                    edit(&mut item);
                    item.last_updated = now;

                    let mut batch = WriteBatch::new();
                    batch.set(path.clone(), encode_inventory(&item)?);
                    updated = Some(item);
                    Ok(batch)
                }),
            )
            .await?;

        Ok(updated)
    }

    async fn load(&self, shop: &ShopId, product_id: &str) -> StoreResult<Option<InventoryItem>> {
        let path = DocumentPath::inventory_item(shop, product_id);
        match self.store.get(&path).await? {
            Some(value) => decode_inventory(&path, &value).map(Some),
            None => Ok(None),
        }
    }

    async fn load_all(&self, shop: &ShopId) -> StoreResult<Vec<InventoryItem>> {
        let collection = inventory_collection(shop);
        self.store
            .list(&collection)
            .await?
            .into_iter()
            .map(|(id, value)| decode_inventory(&DocumentPath::new(collection.as_str(), id), &value))
            .collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
