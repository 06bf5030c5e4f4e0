//! # Store and Ledger Error Types
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  sqlx::Error / serde_json::Error / malformed document                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StoreError ← backend failures, categorized                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  LedgerError::Persistence ← what aggregator callers see                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Presentation layer shows "could not save the sale"                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use tillbook_core::{CoreError, ValidationError};

// =============================================================================
// Store Error
// =============================================================================

/// Document store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store connection failed.
    ///
    /// ## When This Occurs
    /// - Database file can't be created
    /// - File permissions issue
    /// - Disk full
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A store transaction could not begin or commit.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// A stored document does not match the expected shape.
    ///
    /// ## When This Occurs
    /// - Missing or unknown fields
    /// - Non-finite numbers, negative counts, zero quantities
    /// - Unknown status string
    #[error("Malformed document at {path}: {reason}")]
    MalformedDocument { path: String, reason: String },

    /// Internal store error.
    #[error("Internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Creates a MalformedDocument error.
    pub fn malformed(path: impl ToString, reason: impl Into<String>) -> Self {
        StoreError::MalformedDocument {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// Convert sqlx errors to StoreError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::Database       → StoreError::QueryFailed
/// sqlx::Error::PoolTimedOut   → StoreError::PoolExhausted
/// sqlx::Error::PoolClosed     → StoreError::ConnectionFailed
/// Other                       → StoreError::Internal
/// ```
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => StoreError::QueryFailed(db_err.message().to_string()),
            sqlx::Error::PoolTimedOut => StoreError::PoolExhausted,
            sqlx::Error::PoolClosed => StoreError::ConnectionFailed("Pool is closed".to_string()),
            _ => StoreError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Internal(format!("JSON error: {}", err))
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Ledger Error
// =============================================================================

/// Errors returned by the ledger aggregator and inventory coordinator.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The store rejected or failed a read or write.
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// Caller input failed validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A line item referenced a product that is not in inventory.
    #[error("Product not found in inventory: {product_id}")]
    ProductNotFound { product_id: String },

    /// A ledger rule was violated.
    #[error(transparent)]
    Core(CoreError),
}

impl From<CoreError> for LedgerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(e) => LedgerError::Validation(e),
            other => LedgerError::Core(other),
        }
    }
}

impl LedgerError {
    /// Returns true for errors caused by the store, not the caller.
    pub fn is_persistence(&self) -> bool {
        matches!(self, LedgerError::Persistence(_))
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

// =============================================================================
// Unit Tests
// =============================================================================
