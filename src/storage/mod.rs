//! Storage module for the product catalog
//!
//! This module handles all database operations for the enrichment job, including:
//! - SQLite database initialization and schema management
//! - Unenriched and range-based product selection
//! - Atomic write-back of the resolved price triple
//! - The settings store holding the active credential mode
//! - Run tracking and per-product failure records

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::ScoutError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Settings key under which the active credential mode is stored
pub const CREDENTIAL_MODE_SETTING: &str = "vendor_credential_mode";

/// Initializes or opens a storage database
pub fn open_storage(path: &Path) -> Result<SqliteStorage, ScoutError> {
    SqliteStorage::new(path)
}

/// Represents a catalog product in the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRecord {
    pub id: i64,
    /// Vendor-side product id; `None` for products not sourced from the vendor
    pub vendor_product_id: Option<String>,
    pub name: String,
    pub min_price_cents: Option<i64>,
    pub base_cost_cents: Option<i64>,
    pub min_price_variant_key: Option<String>,
    pub price_updated_at: Option<String>,
}

/// A product to be inserted into (or refreshed in) the catalog
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub vendor_product_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub min_price_cents: Option<i64>,
    #[serde(default)]
    pub base_cost_cents: Option<i64>,
}

/// The price triple written back for a resolved product
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceUpdate {
    pub min_price_cents: i64,
    pub base_cost_cents: i64,
    pub variant_key: String,
}

impl PriceUpdate {
    /// Builds an update with `base_cost_cents` mirrored from the minimum
    pub fn mirrored(min_price_cents: i64, variant_key: String) -> Self {
        Self {
            min_price_cents,
            base_cost_cents: min_price_cents,
            variant_key,
        }
    }
}

/// Parameters recorded when an invocation starts
#[derive(Debug, Clone)]
pub struct NewRun {
    pub config_hash: String,
    pub mode: CredentialMode,
    pub store_code: u32,
    pub force_refresh: bool,
    pub offset: u64,
    pub batch_size: u32,
}

/// Aggregate counts recorded when an invocation ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounts {
    pub processed: u64,
    pub updated: u64,
    pub errors: u64,
}

/// Represents an enrichment run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub mode: CredentialMode,
    pub store_code: u32,
    pub force_refresh: bool,
    pub offset: u64,
    pub batch_size: u32,
    pub status: RunStatus,
    pub counts: RunCounts,
    pub error_message: Option<String>,
}

/// Status of an enrichment run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Which vendor credential set an invocation authenticates with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialMode {
    #[default]
    Test,
    Live,
}

impl CredentialMode {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Live => "live",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "test" | "sandbox" => Some(Self::Test),
            "live" | "production" => Some(Self::Live),
            _ => None,
        }
    }
}

impl fmt::Display for CredentialMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// Pipeline stage at which a product failed to resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStage {
    Options,
    Pricing,
    Timeout,
    Persistence,
}

impl ErrorStage {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Options => "options",
            Self::Pricing => "pricing",
            Self::Timeout => "timeout",
            Self::Persistence => "persistence",
        }
    }
}
