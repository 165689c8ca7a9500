//! Enrichment statistics from the catalog database
//!
//! This module provides functionality for extracting and displaying
//! enrichment progress from the storage layer.

use crate::storage::{RunRecord, Storage};
use crate::ScoutError;

/// Catalog enrichment summary
#[derive(Debug, Clone)]
pub struct EnrichmentStatistics {
    /// Products sourced from the vendor
    pub vendor_products: u64,

    /// Vendor products with a resolved minimum price
    pub enriched: u64,

    /// Vendor products still matching the unenriched predicate
    pub unenriched: u64,

    /// Failure records across all runs
    pub error_records: u64,

    /// Failure records per pipeline stage
    pub errors_by_stage: Vec<(String, u64)>,

    /// Most recent invocation, if any
    pub latest_run: Option<RunRecord>,
}

impl EnrichmentStatistics {
    /// Share of vendor products with a resolved price, in percent
    pub fn coverage_percent(&self) -> f64 {
        if self.vendor_products == 0 {
            0.0
        } else {
            (self.enriched as f64 / self.vendor_products as f64) * 100.0
        }
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
/// * `sentinel_cents` - Price value that marks a product as not yet enriched
pub fn load_statistics(
    storage: &dyn Storage,
    sentinel_cents: i64,
) -> Result<EnrichmentStatistics, ScoutError> {
    let vendor_products = storage.count_vendor_products()?;
    let unenriched = storage.count_unenriched(sentinel_cents)?;

    Ok(EnrichmentStatistics {
        vendor_products,
        enriched: vendor_products.saturating_sub(unenriched),
        unenriched,
        error_records: storage.count_enrichment_errors(None)?,
        errors_by_stage: storage.enrichment_errors_by_stage(None)?,
        latest_run: storage.get_latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &EnrichmentStatistics) {
    println!("=== Enrichment Statistics ===\n");

    println!("Catalog:");
    println!("  Vendor products: {}", stats.vendor_products);
    println!(
        "  Enriched: {} ({:.1}%)",
        stats.enriched,
        stats.coverage_percent()
    );
    println!("  Unenriched: {}", stats.unenriched);
    println!();

    if !stats.errors_by_stage.is_empty() {
        println!("Failures ({} records):", stats.error_records);
        for (stage, count) in &stats.errors_by_stage {
            println!("  {}: {}", stage, count);
        }
        println!();
    }

    match &stats.latest_run {
        Some(run) => {
            println!("Latest Run (#{}):", run.id);
            println!("  Status: {}", run.status.to_db_string());
            println!("  Mode: {}", run.mode);
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            println!(
                "  Cursor: store {}, batch {}, {}",
                run.store_code,
                run.batch_size,
                if run.force_refresh {
                    format!("refresh from offset {}", run.offset)
                } else {
                    "unenriched only".to_string()
                }
            );
            println!(
                "  Counts: {} processed, {} updated, {} errors",
                run.counts.processed, run.counts.updated, run.counts.errors
            );
            if let Some(message) = &run.error_message {
                println!("  Error: {}", message);
            }
        }
        None => println!("No runs recorded yet"),
    }
}
