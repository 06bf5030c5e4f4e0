//! # SQLite Document Store
//!
//! Connection pool creation and the SQLite-backed [`DocumentStore`].
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      SQLite Document Store                              │
//! │                                                                         │
//! │  DbConfig::new(path) ← Configure pool settings                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SqliteDocumentStore::new(config).await ← Create pool + run migrations  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                            │
//! │  │            SqlitePool                    │                           │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐       │                            │
//! │  │  │Conn1│ │Conn2│ │Conn3│ │Conn4│ ...   │  (max_connections)         │
//! │  │  └─────┘ └─────┘ └─────┘ └─────┘       │                            │
//! │  └─────────────────────────────────────────┘                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  documents(collection, document_id PK, body JSON, updated_at)           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! SQLite WAL (Write-Ahead Logging) mode is enabled so readers don't block
//! the writer. A store transaction is an sqlx transaction opened with
//! `BEGIN IMMEDIATE`: it takes the write lock before its first read, so
//! concurrent read-modify-writes queue on the busy timeout instead of failing
//! on lock upgrade. A failed body or a dropped future rolls it back.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::document::{DocumentPath, DocumentStore, Snapshot, TransactionFn, WriteBatch, WriteOp};
use crate::error::{StoreError, StoreResult};
use crate::migrations;

// =============================================================================
// Configuration
// =============================================================================

/// SQLite pool configuration.
///
/// ## Example
/// ```rust
/// use tillbook_db::DbConfig;
///
/// let config = DbConfig::new("/path/to/tillbook.db")
///     .max_connections(5)
///     .min_connections(1);
/// assert_eq!(config.max_connections, 5);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// Connection acquire timeout.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// How long a writer waits for another connection's write lock.
    /// Default: 30 seconds
    pub busy_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// Creates a configuration for the database file at `path`.
    /// The file is created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            busy_timeout: Duration::from_secs(30),
            run_migrations: true,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets how long a writer waits for the write lock.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1, // In-memory requires single connection
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(3600),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }
}

// =============================================================================
// SQL
// =============================================================================

const SELECT_ONE: &str = "SELECT body FROM documents WHERE collection = ?1 AND document_id = ?2";

const SELECT_COLLECTION: &str = r#"
    SELECT document_id, body
    FROM documents
    WHERE collection = ?1
    ORDER BY document_id
"#;

const SELECT_RANGE: &str = r#"
    SELECT document_id, body
    FROM documents
    WHERE collection = ?1 AND document_id BETWEEN ?2 AND ?3
    ORDER BY document_id
"#;

const UPSERT: &str = r#"
    INSERT INTO documents (collection, document_id, body, updated_at)
    VALUES (?1, ?2, ?3, ?4)
    ON CONFLICT(collection, document_id) DO UPDATE SET
        body = excluded.body,
        updated_at = excluded.updated_at
"#;

const DELETE_ONE: &str = "DELETE FROM documents WHERE collection = ?1 AND document_id = ?2";

/// Takes the write lock up front; see the module docs.
const BEGIN_IMMEDIATE: &str = "BEGIN IMMEDIATE";

// =============================================================================
// Store
// =============================================================================

/// [`DocumentStore`] backed by a single SQLite table.
#[derive(Debug, Clone)]
pub struct SqliteDocumentStore {
    /// The SQLite connection pool.
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    /// Opens the pool and (by default) runs migrations.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures SQLite: WAL journal, NORMAL synchronous
    /// 3. Creates the connection pool
    /// 4. Runs migrations (if enabled)
    pub async fn new(config: DbConfig) -> StoreResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing document store"
        );

        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(config.busy_timeout)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Document store pool created"
        );

        let store = SqliteDocumentStore { pool };

        if config.run_migrations {
            store.run_migrations().await?;
        }

        Ok(store)
    }

    /// Runs database migrations.
    pub async fn run_migrations(&self) -> StoreResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes the connection pool.
    pub async fn close(&self) {
        info!("Closing document store pool");
        self.pool.close().await;
    }

    /// Checks if the database can execute queries.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

fn decode_body(path: &str, body: &str) -> StoreResult<Value> {
    serde_json::from_str(body).map_err(|e| StoreError::malformed(path, e.to_string()))
}

fn decode_rows(collection: &str, rows: Vec<SqliteRow>) -> StoreResult<Vec<(String, Value)>> {
    rows.into_iter()
        .map(|row| {
            let id: String = row.try_get("document_id")?;
            let body: String = row.try_get("body")?;
            let value = decode_body(&format!("{}/{}", collection, id), &body)?;
            Ok((id, value))
        })
        .collect()
}

async fn fetch_one(conn: &mut SqliteConnection, path: &DocumentPath) -> StoreResult<Option<Value>> {
    let row = sqlx::query(SELECT_ONE)
        .bind(path.collection())
        .bind(path.id())
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => {
            let body: String = row.try_get("body")?;
            decode_body(&path.to_string(), &body).map(Some)
        }
        None => Ok(None),
    }
}

async fn write_one(conn: &mut SqliteConnection, op: &WriteOp) -> StoreResult<()> {
    match op {
        WriteOp::Set(path, value) => {
            let body = serde_json::to_string(value)?;
            sqlx::query(UPSERT)
                .bind(path.collection())
                .bind(path.id())
                .bind(body)
                .bind(Utc::now().to_rfc3339())
                .execute(&mut *conn)
                .await?;
        }
        WriteOp::Delete(path) => {
            sqlx::query(DELETE_ONE)
                .bind(path.collection())
                .bind(path.id())
                .execute(&mut *conn)
                .await?;
        }
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn get(&self, path: &DocumentPath) -> StoreResult<Option<Value>> {
        let mut conn = self.pool.acquire().await?;
        fetch_one(&mut *conn, path).await
    }

    async fn list(&self, collection: &str) -> StoreResult<Vec<(String, Value)>> {
        let rows = sqlx::query(SELECT_COLLECTION)
            .bind(collection)
            .fetch_all(&self.pool)
            .await?;
        decode_rows(collection, rows)
    }

    async fn list_range(
        &self,
        collection: &str,
        start: &str,
        end: &str,
    ) -> StoreResult<Vec<(String, Value)>> {
        let rows = sqlx::query(SELECT_RANGE)
            .bind(collection)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;
        decode_rows(collection, rows)
    }

    async fn set(&self, path: &DocumentPath, value: Value) -> StoreResult<()> {
        debug!(path = %path, "Writing document");
        let mut conn = self.pool.acquire().await?;
        write_one(&mut *conn, &WriteOp::Set(path.clone(), value)).await
    }

    async fn delete(&self, path: &DocumentPath) -> StoreResult<bool> {
        debug!(path = %path, "Deleting document");
        let result = sqlx::query(DELETE_ONE)
            .bind(path.collection())
            .bind(path.id())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin_with(BEGIN_IMMEDIATE)
            .await
            .map_err(|e| StoreError::TransactionFailed(e.to_string()))?;

        for op in batch.ops() {
            write_one(&mut *tx, op).await?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::TransactionFailed(e.to_string()))?;

        debug!(writes = batch.len(), "Batch committed");
        Ok(())
    }

    async fn run_transaction(
        &self,
        reads: Vec<DocumentPath>,
        f: TransactionFn<'_>,
    ) -> StoreResult<usize> {
        let mut tx = self
            .pool
            .begin_with(BEGIN_IMMEDIATE)
            .await
            .map_err(|e| StoreError::TransactionFailed(e.to_string()))?;

        let mut snapshot = Snapshot::new();
        for path in reads {
            if let Some(value) = fetch_one(&mut *tx, &path).await? {
                snapshot.insert(path, value);
            }
        }

        // an Err here drops `tx`, which rolls back
        let batch = f(&snapshot)?;
        if batch.is_empty() {
            return Ok(0);
        }

        for op in batch.ops() {
            write_one(&mut *tx, op).await?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::TransactionFailed(e.to_string()))?;

        debug!(writes = batch.len(), "Transaction committed");
        Ok(batch.len())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn store() -> SqliteDocumentStore {
        SqliteDocumentStore::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = store().await;
        assert!(store.health_check().await);

        let (total, applied) = migrations::migration_status(store.pool()).await.unwrap();
        assert_eq!(total, applied);
    }

    #[tokio::test]
    async fn test_config_builder() {
        let config = DbConfig::new("/tmp/test.db")
            .max_connections(10)
            .min_connections(2)
            .run_migrations(false);

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert!(!config.run_migrations);
    }

    #[tokio::test]
    async fn test_set_get_replace_delete() {
        let store = store().await;
        let path = DocumentPath::new("shops/a/inventory", "bread");

        store.set(&path, json!({"stockAmount": 3})).await.unwrap();
        store.set(&path, json!({"stockAmount": 5})).await.unwrap();
        assert_eq!(store.get(&path).await.unwrap(), Some(json!({"stockAmount": 5})));

        assert!(store.delete(&path).await.unwrap());
        assert!(store.get(&path).await.unwrap().is_none());
        assert!(!store.delete(&path).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_range() {
        let store = store().await;
        for day in ["2024-02-28", "2024-03-01", "2024-03-02"] {
            store
                .set(&DocumentPath::new("shops/a/sales", day), json!({"day": day}))
                .await
                .unwrap();
        }
        store
            .set(&DocumentPath::new("shops/b/sales", "2024-03-01"), json!({}))
            .await
            .unwrap();

        let docs = store
            .list_range("shops/a/sales", "2024-03-01", "2024-03-31")
            .await
            .unwrap();
        let ids: Vec<&str> = docs.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["2024-03-01", "2024-03-02"]);

        assert_eq!(store.list("shops/a/sales").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_transaction_commits_batch() {
        let store = store().await;
        let a = DocumentPath::new("c", "a");
        let b = DocumentPath::new("c", "b");
        store.set(&a, json!(10)).await.unwrap();

        let (ra, rb) = (a.clone(), b.clone());
        let applied = store
            .run_transaction(
                vec![a.clone()],
                Box::new(move |snapshot: &Snapshot| {
                    let value = snapshot.get(&ra).cloned().unwrap_or(Value::Null);
                    let mut batch = WriteBatch::new();
                    batch.delete(ra).set(rb, value);
                    Ok(batch)
                }),
            )
            .await
            .unwrap();

        assert_eq!(applied, 2);
        assert!(store.get(&a).await.unwrap().is_none());
        assert_eq!(store.get(&b).await.unwrap(), Some(json!(10)));
    }

    #[tokio::test]
    async fn test_failed_transaction_rolls_back() {
        let store = store().await;
        let a = DocumentPath::new("c", "a");
        store.set(&a, json!(1)).await.unwrap();

        let result = store
            .run_transaction(
                vec![a.clone()],
                Box::new(|_: &Snapshot| Err(StoreError::Internal("boom".to_string()))),
            )
            .await;

        assert!(matches!(result, Err(StoreError::Internal(_))));
        assert_eq!(store.get(&a).await.unwrap(), Some(json!(1)));
    }

    #[tokio::test]
    async fn test_corrupt_body_is_malformed() {
        let store = store().await;
        sqlx::query(UPSERT)
            .bind("c")
            .bind("x")
            .bind("{not json")
            .bind(Utc::now().to_rfc3339())
            .execute(store.pool())
            .await
            .unwrap();

        let err = store.get(&DocumentPath::new("c", "x")).await.unwrap_err();
        assert!(matches!(err, StoreError::MalformedDocument { .. }));
    }

    #[tokio::test]
    async fn test_ids_with_slashes_stay_distinct() {
        let store = store().await;
        let nested = DocumentPath::new("c/a", "b");
        let slashed = DocumentPath::new("c", "a/b");
        assert_eq!(nested.to_string(), slashed.to_string());

        store.set(&nested, json!("nested")).await.unwrap();
        store.set(&slashed, json!("slashed")).await.unwrap();

        assert_eq!(store.get(&nested).await.unwrap(), Some(json!("nested")));
        assert!(store.delete(&slashed).await.unwrap());
        assert_eq!(store.get(&nested).await.unwrap(), Some(json!("nested")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_transactions_serialize_on_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = DbConfig::new(dir.path().join("tillbook.db")).max_connections(5);
        let store = std::sync::Arc::new(SqliteDocumentStore::new(config).await.unwrap());
        let counter = DocumentPath::new("c", "counter");

        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                store
                    .run_transaction(
                        vec![counter.clone()],
                        Box::new(move |snapshot: &Snapshot| {
                            let n = snapshot.get(&counter).and_then(Value::as_i64).unwrap_or(0);
                            let mut batch = WriteBatch::new();
                            batch.set(counter, json!(n + 1));
                            Ok(batch)
                        }),
                    )
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.get(&counter).await.unwrap(), Some(json!(20)));
    }

    #[tokio::test]
    async fn test_file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("tillbook.db");
        let path = DocumentPath::new("shops/a/sales", "2024-03-09");

        {
            let store = SqliteDocumentStore::new(DbConfig::new(&db_path)).await.unwrap();
            store.set(&path, json!({"salesCount": 1})).await.unwrap();
            store.close().await;
        }

        let store = SqliteDocumentStore::new(DbConfig::new(&db_path)).await.unwrap();
        assert_eq!(store.get(&path).await.unwrap(), Some(json!({"salesCount": 1})));
    }
}
