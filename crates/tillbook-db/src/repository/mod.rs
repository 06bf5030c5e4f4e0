//! # Repository Module
//!
//! Shop-scoped services over a [`DocumentStore`](crate::document::DocumentStore).
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Presentation layer                                                     │
//! │       │                                                                 │
//! │       │  ledger.record_sale(&session, amount)                           │
//! │       │  inventory.get_all_inventory(&session)                          │
//! │       ▼                                                                 │
//! │  LedgerAggregator            InventoryCoordinator                       │
//! │  ├── record_sale             ├── get_item / get_all_inventory           │
//! │  ├── sales_for_range         ├── set_stock / adjust_stock               │
//! │  ├── list_transactions       ├── upsert_item / update_inventory_item    │
//! │  ├── update / delete         └── remove_item / low_stock                │
//! │  └── add / remove line item                                             │
//! │       │                                                                 │
//! │       │  codec + run_transaction                                        │
//! │       ▼                                                                 │
//! │  DocumentStore (SQLite or in-memory)                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every call takes the [`ShopSession`] explicitly. An unresolved session
//! yields an inert result (`None`, an empty summary, `false`) and touches
//! nothing.

use tracing::{debug, error};

use tillbook_core::{ShopId, ShopSession};

use crate::error::{LedgerError, StoreError};

pub mod inventory;
pub mod sales;

/// Resolves the session or logs the inert call.
pub(crate) fn resolve<'a>(session: &'a ShopSession, operation: &'static str) -> Option<&'a ShopId> {
    let shop = session.shop_id();
    if shop.is_none() {
        debug!(operation, "Shop session unresolved, skipping");
    }
    shop
}

/// Logs a store failure with its shop and operation, then wraps it.
pub(crate) fn store_failure<'a>(
    shop: &'a ShopId,
    operation: &'static str,
) -> impl FnOnce(StoreError) -> LedgerError + 'a {
    move |err| {
        error!(shop_id = %shop, operation, error = %err, "Store operation failed");
        LedgerError::Persistence(err)
    }
}
