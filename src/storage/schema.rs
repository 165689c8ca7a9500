//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the catalog database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Catalog products; price fields are only written by the enrichment job
CREATE TABLE IF NOT EXISTS products (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    vendor_product_id TEXT UNIQUE,
    name TEXT NOT NULL,
    min_price_cents INTEGER CHECK (min_price_cents IS NULL OR min_price_cents >= 0),
    base_cost_cents INTEGER,
    min_price_variant_key TEXT,
    price_updated_at TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_products_min_price ON products(min_price_cents);

-- Key/value settings supplied by the storefront admin
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- One row per batch invocation
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    mode TEXT NOT NULL,
    store_code INTEGER NOT NULL,
    force_refresh INTEGER NOT NULL,
    start_offset INTEGER NOT NULL,
    batch_size INTEGER NOT NULL,
    status TEXT NOT NULL,
    processed INTEGER NOT NULL DEFAULT 0,
    updated INTEGER NOT NULL DEFAULT 0,
    errors INTEGER NOT NULL DEFAULT 0,
    error_message TEXT
);

-- Products that could not be resolved during a run
CREATE TABLE IF NOT EXISTS enrichment_errors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    product_id INTEGER NOT NULL REFERENCES products(id),
    stage TEXT NOT NULL,
    message TEXT NOT NULL,
    occurred_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_enrichment_errors_run ON enrichment_errors(run_id);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
