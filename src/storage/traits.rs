//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{
    CredentialMode, ErrorStage, NewProduct, NewRun, PriceUpdate, ProductRecord, RunCounts,
    RunRecord, RunStatus, CREDENTIAL_MODE_SETTING,
};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Product not found: {0}")]
    ProductNotFound(i64),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Invalid setting {key}: {value}")]
    InvalidSetting { key: String, value: String },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for catalog storage backends
///
/// This trait defines every database operation the enrichment job needs.
pub trait Storage {
    // ===== Products =====

    /// Inserts a product, or refreshes the name of the product with the same
    /// vendor id
    ///
    /// Existing price fields are never touched by an upsert.
    fn upsert_product(&mut self, product: &NewProduct) -> StorageResult<i64>;

    /// Gets a product by ID
    fn get_product(&self, product_id: i64) -> StorageResult<ProductRecord>;

    /// Selects up to `limit` vendor products whose price is NULL or the
    /// sentinel, ordered by id
    fn select_unenriched(&self, sentinel_cents: i64, limit: u32)
        -> StorageResult<Vec<ProductRecord>>;

    /// Selects vendor products at positions `[offset, offset + limit)` in id
    /// order, regardless of price state
    fn select_range(&self, offset: u64, limit: u32) -> StorageResult<Vec<ProductRecord>>;

    /// Counts products sourced from the vendor
    fn count_vendor_products(&self) -> StorageResult<u64>;

    /// Counts vendor products still matching the unenriched predicate
    fn count_unenriched(&self, sentinel_cents: i64) -> StorageResult<u64>;

    /// Writes the price triple for one product in a single keyed update
    fn write_min_price(&mut self, product_id: i64, update: &PriceUpdate) -> StorageResult<()>;

    // ===== Settings =====

    /// Reads a setting value
    fn get_setting(&self, key: &str) -> StorageResult<Option<String>>;

    /// Inserts or replaces a setting value
    fn set_setting(&mut self, key: &str, value: &str) -> StorageResult<()>;

    /// Reads the active credential mode from the settings store
    fn active_credential_mode(&self) -> StorageResult<Option<CredentialMode>> {
        match self.get_setting(CREDENTIAL_MODE_SETTING)? {
            None => Ok(None),
            Some(value) => CredentialMode::from_db_string(&value)
                .map(Some)
                .ok_or(StorageError::InvalidSetting {
                    key: CREDENTIAL_MODE_SETTING.to_string(),
                    value,
                }),
        }
    }

    // ===== Run Management =====

    /// Records the start of an invocation and returns its run id
    fn create_run(&mut self, run: &NewRun) -> StorageResult<i64>;

    /// Marks a run as finished with its final counts
    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        counts: RunCounts,
        error_message: Option<&str>,
    ) -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    // ===== Failure Records =====

    /// Records why a product could not be resolved during a run
    fn record_enrichment_error(
        &mut self,
        run_id: i64,
        product_id: i64,
        stage: ErrorStage,
        message: &str,
    ) -> StorageResult<()>;

    /// Counts failure records, optionally restricted to one run
    fn count_enrichment_errors(&self, run_id: Option<i64>) -> StorageResult<u64>;

    /// Failure record counts per stage, most frequent first
    fn enrichment_errors_by_stage(&self, run_id: Option<i64>) -> StorageResult<Vec<(String, u64)>>;
}
