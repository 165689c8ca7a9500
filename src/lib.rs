//! Price-Scout: vendor minimum-price discovery
//!
//! This crate implements a batch enrichment job that, for every catalog product
//! sourced from a print vendor, probes the vendor's per-combination pricing API
//! and records the lowest attainable price back into the catalog.

pub mod batch;
pub mod config;
pub mod output;
pub mod pricing;
pub mod storage;
pub mod vendor;

use thiserror::Error;

/// Main error type for Price-Scout operations
#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Vendor credentials for the active mode are missing or unusable
    #[error("Vendor credentials incomplete for {mode} mode: {detail}")]
    Configuration { mode: String, detail: String },

    #[error("Vendor authentication failed: {0}")]
    Auth(String),

    #[error("Invalid options for vendor product {product}: {reason}")]
    InvalidOptions { product: String, reason: String },

    #[error("Failed to persist price for product {product_id}: {source}")]
    Persistence {
        product_id: i64,
        source: storage::StorageError,
    },

    #[error("Timed out after {seconds}s: {what}")]
    Timeout { what: String, seconds: u64 },

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP status {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScoutError {
    /// Returns true if this error is reported as `success:false` without an
    /// error status
    ///
    /// Only missing credentials qualify; everything else that escapes an
    /// invocation is an unexpected failure.
    pub fn is_soft_failure(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Price-Scout operations
pub type Result<T> = std::result::Result<T, ScoutError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use batch::{BatchRequest, BatchSummary, InvocationResponse, Orchestrator};
pub use config::Config;
pub use storage::{CredentialMode, SqliteStorage};
