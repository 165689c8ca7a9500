//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    CredentialMode, ErrorStage, NewProduct, NewRun, PriceUpdate, ProductRecord, RunCounts,
    RunRecord, RunStatus,
};
use crate::ScoutError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const PRODUCT_COLUMNS: &str = "id, vendor_product_id, name, min_price_cents, base_cost_cents,
     min_price_variant_key, price_updated_at";

const RUN_COLUMNS: &str = "id, started_at, finished_at, config_hash, mode, store_code,
     force_refresh, start_offset, batch_size, status, processed, updated, errors, error_message";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens (or creates) the catalog database at `path`
    pub fn new(path: &Path) -> Result<Self, ScoutError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, ScoutError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn product_from_row(row: &Row<'_>) -> rusqlite::Result<ProductRecord> {
    Ok(ProductRecord {
        id: row.get(0)?,
        vendor_product_id: row.get(1)?,
        name: row.get(2)?,
        min_price_cents: row.get(3)?,
        base_cost_cents: row.get(4)?,
        min_price_variant_key: row.get(5)?,
        price_updated_at: row.get(6)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        mode: CredentialMode::from_db_string(&row.get::<_, String>(4)?).unwrap_or_default(),
        store_code: row.get(5)?,
        force_refresh: row.get(6)?,
        offset: row.get::<_, i64>(7)?.max(0) as u64,
        batch_size: row.get(8)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(9)?)
            .unwrap_or(RunStatus::Failed),
        counts: RunCounts {
            processed: row.get::<_, i64>(10)?.max(0) as u64,
            updated: row.get::<_, i64>(11)?.max(0) as u64,
            errors: row.get::<_, i64>(12)?.max(0) as u64,
        },
        error_message: row.get(13)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Products =====

    fn upsert_product(&mut self, product: &NewProduct) -> StorageResult<i64> {
        if let Some(vendor_id) = &product.vendor_product_id {
            let existing: Option<i64> = self
                .conn
                .query_row(
                    "SELECT id FROM products WHERE vendor_product_id = ?1",
                    params![vendor_id],
                    |row| row.get(0),
                )
                .optional()?;

            if let Some(id) = existing {
                self.conn.execute(
                    "UPDATE products SET name = ?1 WHERE id = ?2",
                    params![product.name, id],
                )?;
                return Ok(id);
            }
        }

        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO products (vendor_product_id, name, min_price_cents, base_cost_cents, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                product.vendor_product_id,
                product.name,
                product.min_price_cents,
                product.base_cost_cents,
                now
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    fn get_product(&self, product_id: i64) -> StorageResult<ProductRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS),
                params![product_id],
                product_from_row,
            )
            .optional()?
            .ok_or(StorageError::ProductNotFound(product_id))
    }

    fn select_unenriched(
        &self,
        sentinel_cents: i64,
        limit: u32,
    ) -> StorageResult<Vec<ProductRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM products
             WHERE vendor_product_id IS NOT NULL
               AND (min_price_cents IS NULL OR min_price_cents = ?1)
             ORDER BY id ASC
             LIMIT ?2",
            PRODUCT_COLUMNS
        ))?;

        let products = stmt
            .query_map(params![sentinel_cents, limit], product_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(products)
    }

    fn select_range(&self, offset: u64, limit: u32) -> StorageResult<Vec<ProductRecord>> {
        let offset = i64::try_from(offset).map_err(|_| {
            StorageError::ConstraintViolation(format!("offset {} out of range", offset))
        })?;

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM products
             WHERE vendor_product_id IS NOT NULL
             ORDER BY id ASC
             LIMIT ?1 OFFSET ?2",
            PRODUCT_COLUMNS
        ))?;

        let products = stmt
            .query_map(params![limit, offset], product_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(products)
    }

    fn count_vendor_products(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM products WHERE vendor_product_id IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_unenriched(&self, sentinel_cents: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM products
             WHERE vendor_product_id IS NOT NULL
               AND (min_price_cents IS NULL OR min_price_cents = ?1)",
            params![sentinel_cents],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn write_min_price(&mut self, product_id: i64, update: &PriceUpdate) -> StorageResult<()> {
        if update.min_price_cents <= 0 {
            return Err(StorageError::ConstraintViolation(format!(
                "refusing to write non-positive price {} for product {}",
                update.min_price_cents, product_id
            )));
        }

        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE products
             SET min_price_cents = ?1, base_cost_cents = ?2, min_price_variant_key = ?3,
                 price_updated_at = ?4
             WHERE id = ?5",
            params![
                update.min_price_cents,
                update.base_cost_cents,
                update.variant_key,
                now,
                product_id
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::ProductNotFound(product_id));
        }

        Ok(())
    }

    // ===== Settings =====

    fn get_setting(&self, key: &str) -> StorageResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_setting(&mut self, key: &str, value: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, now],
        )?;
        Ok(())
    }

    // ===== Run Management =====

    fn create_run(&mut self, run: &NewRun) -> StorageResult<i64> {
        let offset = i64::try_from(run.offset).map_err(|_| {
            StorageError::ConstraintViolation(format!("offset {} out of range", run.offset))
        })?;

        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, mode, store_code, force_refresh,
             start_offset, batch_size, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                now,
                run.config_hash,
                run.mode.to_db_string(),
                run.store_code,
                run.force_refresh,
                offset,
                run.batch_size,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        counts: RunCounts,
        error_message: Option<&str>,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, processed = ?3, updated = ?4,
             errors = ?5, error_message = ?6 WHERE id = ?7",
            params![
                status.to_db_string(),
                now,
                counts.processed as i64,
                counts.updated as i64,
                counts.errors as i64,
                error_message,
                run_id
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }

        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS),
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    // ===== Failure Records =====

    fn record_enrichment_error(
        &mut self,
        run_id: i64,
        product_id: i64,
        stage: ErrorStage,
        message: &str,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO enrichment_errors (run_id, product_id, stage, message, occurred_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![run_id, product_id, stage.to_db_string(), message, now],
        )?;
        Ok(())
    }

    fn count_enrichment_errors(&self, run_id: Option<i64>) -> StorageResult<u64> {
        let count: i64 = match run_id {
            Some(id) => self.conn.query_row(
                "SELECT COUNT(*) FROM enrichment_errors WHERE run_id = ?1",
                params![id],
                |row| row.get(0),
            )?,
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM enrichment_errors", [], |row| {
                    row.get(0)
                })?,
        };
        Ok(count as u64)
    }

    fn enrichment_errors_by_stage(&self, run_id: Option<i64>) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT stage, COUNT(*) AS n FROM enrichment_errors
             WHERE ?1 IS NULL OR run_id = ?1
             GROUP BY stage
             ORDER BY n DESC, stage",
        )?;

        let rows = stmt
            .query_map(params![run_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}
