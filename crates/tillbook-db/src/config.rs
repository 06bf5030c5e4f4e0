//! # Configuration
//!
//! Store, shop and ledger settings.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                            │
//! │     TILLBOOK_STORE_BACKEND=memory                                       │
//! │     TILLBOOK_SHOP_CONTACT=owner@corner.shop                             │
//! │                                                                         │
//! │  2. TOML Config File                                                    │
//! │     ~/.config/tillbook/tillbook.toml (Linux)                            │
//! │     ~/Library/Application Support/app.tillbook.tillbook/ (macOS)        │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [store]
//! backend = "sqlite"          # sqlite | memory
//! database_path = "./tillbook.db"
//! max_connections = 5
//! connect_timeout_secs = 30
//!
//! [shop]
//! contact = "+1 555 010 2000"
//!
//! [ledger]
//! utc_offset_minutes = -300   # shop-local "today"
//! default_list_limit = 100
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use tillbook_core::validation::{validate_list_limit, validate_utc_offset};
use tillbook_core::{ShopSession, ValidationError};

use crate::document::DocumentStore;
use crate::error::StoreError;
use crate::memory::MemoryDocumentStore;
use crate::pool::{DbConfig, SqliteDocumentStore};

// =============================================================================
// Config Error
// =============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read or written.
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML for this schema.
    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config could not be serialized.
    #[error("Config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is out of range or inconsistent.
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// No platform config directory is available.
    #[error("No config path available")]
    NoConfigPath,
}

impl From<ValidationError> for ConfigError {
    fn from(err: ValidationError) -> Self {
        ConfigError::Invalid(err.to_string())
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Store Settings
// =============================================================================

/// Which document store backs the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// SQLite file (default).
    #[default]
    Sqlite,
    /// Process memory; nothing survives a restart.
    Memory,
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackend::Sqlite => write!(f, "sqlite"),
            StoreBackend::Memory => write!(f, "memory"),
        }
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(StoreBackend::Sqlite),
            "memory" | "in_memory" => Ok(StoreBackend::Memory),
            other => Err(ConfigError::Invalid(format!(
                "Unknown store backend: '{}'. Valid options: sqlite, memory",
                other
            ))),
        }
    }
}

/// `[store]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default)]
    pub backend: StoreBackend,

    /// SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Pool acquire timeout (seconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("tillbook.db")
}

fn default_max_connections() -> u32 {
    5
}

fn default_connect_timeout() -> u64 {
    30
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            backend: StoreBackend::default(),
            database_path: default_database_path(),
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl StoreSettings {
    /// Pool configuration for the SQLite backend.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path.clone())
            .max_connections(self.max_connections)
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
    }
}

// =============================================================================
// Shop + Ledger Settings
// =============================================================================

/// `[shop]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShopSettings {
    /// Owner phone number or e-mail; the shop id is derived from it.
    #[serde(default)]
    pub contact: Option<String>,
}

/// `[ledger]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSettings {
    /// Shop offset from UTC in minutes; decides which bucket a sale lands in.
    #[serde(default)]
    pub utc_offset_minutes: i32,

    /// Listing limit used when a filter does not give one.
    #[serde(default = "default_list_limit")]
    pub default_list_limit: usize,
}

fn default_list_limit() -> usize {
    100
}

impl Default for LedgerSettings {
    fn default() -> Self {
        LedgerSettings {
            utc_offset_minutes: 0,
            default_list_limit: default_list_limit(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete Tillbook configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TillbookConfig {
    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub shop: ShopSettings,

    #[serde(default)]
    pub ledger: LedgerSettings,
}

impl TillbookConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (tillbook.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or(ConfigError::NoConfigPath)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        validate_utc_offset(self.ledger.utc_offset_minutes)?;
        validate_list_limit(self.ledger.default_list_limit)?;

        if self.store.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "max_connections must be greater than 0".into(),
            ));
        }

        if self.store.backend == StoreBackend::Sqlite
            && self.store.database_path.as_os_str().is_empty()
        {
            return Err(ConfigError::Invalid(
                "database_path is required for the sqlite backend".into(),
            ));
        }

        if let Some(contact) = &self.shop.contact {
            ShopSession::from_contact(contact)?;
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies `TILLBOOK_*` overrides from `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(backend) = lookup("TILLBOOK_STORE_BACKEND") {
            match backend.parse() {
                Ok(parsed) => {
                    debug!(backend = %backend, "Overriding store backend from environment");
                    self.store.backend = parsed;
                }
                Err(_) => warn!(backend = %backend, "Unknown store backend in environment"),
            }
        }

        if let Some(path) = lookup("TILLBOOK_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.store.database_path = PathBuf::from(path);
        }

        if let Some(contact) = lookup("TILLBOOK_SHOP_CONTACT") {
            self.shop.contact = Some(contact);
        }

        if let Some(offset) = lookup("TILLBOOK_UTC_OFFSET_MINUTES") {
            match offset.parse::<i32>() {
                Ok(minutes) => self.ledger.utc_offset_minutes = minutes,
                Err(_) => warn!(offset = %offset, "Invalid UTC offset in environment"),
            }
        }

        if let Some(limit) = lookup("TILLBOOK_LIST_LIMIT") {
            match limit.parse::<usize>() {
                Ok(n) => self.ledger.default_list_limit = n,
                Err(_) => warn!(limit = %limit, "Invalid list limit in environment"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("app", "tillbook", "tillbook")
            .map(|dirs| dirs.config_dir().join("tillbook.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Session for the configured contact, unresolved when none is set.
    pub fn session(&self) -> ShopSession {
        self.shop
            .contact
            .as_deref()
            .and_then(|contact| ShopSession::from_contact(contact).ok())
            .unwrap_or_default()
    }

    /// Opens the configured document store.
    pub async fn open_store(&self) -> Result<Arc<dyn DocumentStore>, StoreError> {
        match self.store.backend {
            StoreBackend::Sqlite => {
                let store = SqliteDocumentStore::new(self.store.db_config()).await?;
                Ok(Arc::new(store))
            }
            StoreBackend::Memory => {
                info!("Using in-memory document store");
                Ok(Arc::new(MemoryDocumentStore::new()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = TillbookConfig::default();
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.ledger.default_list_limit, 100);
        assert_eq!(config.ledger.utc_offset_minutes, 0);
        assert!(config.validate().is_ok());
        assert!(!config.session().is_resolved());
    }

    #[test]
    fn test_backend_parsing() {
        assert_eq!("sqlite".parse::<StoreBackend>().unwrap(), StoreBackend::Sqlite);
        assert_eq!("MEMORY".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert!("postgres".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: TillbookConfig = toml::from_str(
            r#"
            [shop]
            contact = "owner@corner.shop"

            [ledger]
            utc_offset_minutes = -300
            "#,
        )
        .unwrap();

        assert_eq!(config.ledger.utc_offset_minutes, -300);
        assert_eq!(config.ledger.default_list_limit, 100);
        assert_eq!(config.store.max_connections, 5);
        assert_eq!(
            config.session().shop_id().map(|s| s.as_str()),
            Some("owner_corner_shop")
        );
    }

    #[test]
    fn test_validation() {
        let mut config = TillbookConfig::default();

        config.ledger.utc_offset_minutes = 15 * 60;
        assert!(config.validate().is_err());

        config.ledger.utc_offset_minutes = 60;
        config.ledger.default_list_limit = 0;
        assert!(config.validate().is_err());

        config.ledger.default_list_limit = 10;
        config.shop.contact = Some("  ".to_string());
        assert!(config.validate().is_err());

        config.shop.contact = None;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("TILLBOOK_STORE_BACKEND", "memory"),
            ("TILLBOOK_SHOP_CONTACT", "+1 555 0100"),
            ("TILLBOOK_UTC_OFFSET_MINUTES", "120"),
            ("TILLBOOK_LIST_LIMIT", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = TillbookConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.shop.contact.as_deref(), Some("+1 555 0100"));
        assert_eq!(config.ledger.utc_offset_minutes, 120);
        // invalid values are ignored
        assert_eq!(config.ledger.default_list_limit, 100);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tillbook.toml");

        let mut config = TillbookConfig::default();
        config.store.backend = StoreBackend::Memory;
        config.ledger.utc_offset_minutes = 330;
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[ledger]"));

        let loaded: TillbookConfig = toml::from_str(&contents).unwrap();
        assert_eq!(loaded.store.backend, StoreBackend::Memory);
        assert_eq!(loaded.ledger.utc_offset_minutes, 330);
    }

    #[tokio::test]
    async fn test_open_memory_store() {
        let mut config = TillbookConfig::default();
        config.store.backend = StoreBackend::Memory;

        let store = config.open_store().await.unwrap();
        assert!(store.list("shops/x/sales").await.unwrap().is_empty());
    }
}
