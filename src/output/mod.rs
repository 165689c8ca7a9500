//! Output module for reports and catalog import
//!
//! This module handles:
//! - Loading and printing enrichment statistics
//! - Importing catalog products from JSON

pub mod stats;

pub use stats::{load_statistics, print_statistics, EnrichmentStatistics};

use crate::storage::{NewProduct, Storage};
use crate::ScoutError;
use std::path::Path;

/// Upserts every product in a JSON array file into the catalog
///
/// Each element is `{vendorProductId?, name, minPriceCents?, baseCostCents?}`.
/// Returns the number of products written.
pub fn import_products(storage: &mut dyn Storage, path: &Path) -> Result<usize, ScoutError> {
    let content = std::fs::read_to_string(path)?;
    let products: Vec<NewProduct> = serde_json::from_str(&content)?;

    for product in &products {
        storage.upsert_product(product)?;
    }

    tracing::info!("Imported {} products from {}", products.len(), path.display());
    Ok(products.len())
}
