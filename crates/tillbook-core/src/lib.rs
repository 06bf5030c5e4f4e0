//! # tillbook-core: Pure Ledger Logic for Tillbook
//!
//! This crate is the **heart** of Tillbook. It contains the sales ledger rules
//! as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tillbook Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                Presentation Layer (external)                    │   │
//! │  │    Log Sale ──► Dashboard ──► Transactions ──► Inventory        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 tillbook-db (Ledger Aggregator)                 │   │
//! │  │     record_sale, sales_for_range, update/delete transaction     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ tillbook-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  ledger   │  │ validation│  │   │
//! │  │   │ SaleRecord│  │   Money   │  │  bucket   │  │   rules   │  │   │
//! │  │   │ LineItem  │  │  (cents)  │  │  math     │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (SaleRecord, DailyBucket, InventoryItem, etc.)
//! - [`money`] - Money type with integer arithmetic
//! - [`ledger`] - Bucket append/recompute/merge and stock arithmetic
//! - [`ident`] - Shop ids, product slugs, transaction id generation
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::{NaiveDate, Utc};
//! use tillbook_core::{DailyBucket, Money, SaleRecord};
//!
//! let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
//! let mut bucket = DailyBucket::empty(date);
//!
//! bucket.append(SaleRecord::quick_sale("1710000000000", Utc::now(), Money::from_cents(1250)));
//! bucket.append(SaleRecord::quick_sale("1710000000001", Utc::now(), Money::from_cents(750)));
//!
//! assert_eq!(bucket.total_revenue.cents(), 2000);
//! assert_eq!(bucket.sales_count, 2);
//! assert!(bucket.is_consistent());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ident;
pub mod ledger;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use ident::TransactionIdGenerator;
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Product id used for the synthetic line item of a raw-amount sale.
pub const QUICK_SALE_PRODUCT_ID: &str = "quick-sale";

/// Product name used for the synthetic line item of a raw-amount sale.
pub const QUICK_SALE_PRODUCT_NAME: &str = "Quick sale";

/// Maximum quantity on a single line item.
///
/// ## Business Reason
/// Catches fat-finger entries (typing 1000 instead of 10) before they
/// wipe out a product's stock level.
pub const MAX_LINE_QUANTITY: u32 = 999;

/// Largest magnitude, in cents, of a sale amount or line item price
/// (10 billion in major units).
///
/// Keeps bucket totals far below both the `i64` range and the range where
/// the store's decimal numbers stop being exact.
pub const MAX_AMOUNT_CENTS: i64 = 1_000_000_000_000;

/// Tolerance (in major currency units) when comparing a transaction's stored
/// total against the sum of its line items.
pub const STATUS_TOLERANCE: f64 = 0.001;
