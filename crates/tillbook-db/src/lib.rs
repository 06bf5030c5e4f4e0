//! # tillbook-db: Document Store + Ledger Aggregator
//!
//! Persists a shop's daily sales buckets and inventory as documents and
//! exposes the ledger operations the presentation layer calls.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tillbook Data Flow                               │
//! │                                                                         │
//! │  Dashboard / sales screen                                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                  tillbook-db (THIS CRATE)                       │    │
//! │  │                                                                 │    │
//! │  │   ┌────────────────┐   ┌────────────────┐   ┌───────────────┐   │    │
//! │  │   │  Repositories  │   │     Codec      │   │ DocumentStore │   │    │
//! │  │   │                │   │   (codec.rs)   │   │               │   │    │
//! │  │   │ LedgerAggr.    │──►│ bucket ⇄ JSON  │──►│ SQLite (pool) │   │    │
//! │  │   │ InventoryCoord.│   │ item   ⇄ JSON  │   │ memory        │   │    │
//! │  │   └────────────────┘   └────────────────┘   └───────────────┘   │    │
//! │  │                                                                 │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  shops/{shopId}/sales/{date}          daily bucket                      │
//! │  shops/{shopId}/inventory/{productId} stock + price                     │
//! │  shops/{shopId}/transactionIndex/{id} id → bucket date                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`document`] - Paths, write batches and the [`DocumentStore`] trait
//! - [`pool`] - SQLite backend and pool configuration
//! - [`memory`] - In-memory backend
//! - [`migrations`] - Embedded database migrations
//! - [`codec`] - Strict document encoding / decoding
//! - [`repository`] - Ledger aggregator and inventory coordinator
//! - [`config`] - `tillbook.toml` + environment configuration
//! - [`error`] - Store and ledger error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tillbook_db::{InventoryCoordinator, LedgerAggregator, TillbookConfig};
//!
//! let config = TillbookConfig::load_or_default(None);
//! let store = config.open_store().await?;
//! let session = config.session();
//!
//! let ledger = LedgerAggregator::new(store.clone(), config.ledger.clone());
//! ledger.record_sale(&session, Money::from_cents(1250)).await?;
//!
//! let overview = ledger.period_overview(&session).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod codec;
pub mod config;
pub mod document;
pub mod error;
pub mod memory;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, ConfigResult, LedgerSettings, StoreBackend, TillbookConfig};
pub use document::{DocumentPath, DocumentStore, Snapshot, WriteBatch, WriteOp};
pub use error::{LedgerError, LedgerResult, StoreError, StoreResult};
pub use memory::MemoryDocumentStore;
pub use pool::{DbConfig, SqliteDocumentStore};

// Repository re-exports for convenience
pub use repository::inventory::InventoryCoordinator;
pub use repository::sales::LedgerAggregator;
