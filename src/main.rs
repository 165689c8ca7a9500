//! Price-Scout main entry point
//!
//! This is the command-line interface for the vendor minimum-price discovery
//! job.

use anyhow::{Context, Result};
use clap::Parser;
use price_scout::batch::{BatchRequest, Orchestrator};
use price_scout::config::{load_config_with_hash, Config};
use price_scout::output::{import_products, load_statistics, print_statistics};
use price_scout::storage::{open_storage, CredentialMode, SqliteStorage, Storage, CREDENTIAL_MODE_SETTING};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Price-Scout: vendor minimum-price discovery
///
/// Price-Scout walks the catalog in bounded batches, probes the print
/// vendor's pricing API for each product's option combinations and records
/// the lowest price found.
#[derive(Parser, Debug)]
#[command(name = "price-scout")]
#[command(version)]
#[command(about = "Vendor minimum-price discovery", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Products to process in this invocation
    #[arg(long, visible_alias = "limit", value_name = "N")]
    batch_size: Option<u32>,

    /// Vendor store code
    #[arg(long, value_name = "CODE")]
    store_code: Option<u32>,

    /// Re-price every product in id order instead of only unenriched ones
    #[arg(long)]
    force_refresh: bool,

    /// Row offset for refresh mode
    #[arg(long, value_name = "N", requires = "force_refresh")]
    offset: Option<u64>,

    /// Credential mode, overriding the settings store
    #[arg(long, value_parser = parse_mode)]
    mode: Option<CredentialMode>,

    /// Keep invoking until the catalog is covered
    #[arg(long)]
    until_done: bool,

    /// Upsert products from a JSON array file and exit
    #[arg(long, value_name = "PATH", conflicts_with_all = ["set_mode", "stats", "dry_run"])]
    import: Option<PathBuf>,

    /// Store the active credential mode and exit
    #[arg(long, value_parser = parse_mode, conflicts_with_all = ["import", "stats", "dry_run"])]
    set_mode: Option<CredentialMode>,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["import", "set_mode", "dry_run"])]
    stats: bool,

    /// Validate config and show what would be priced without any network I/O
    #[arg(long, conflicts_with_all = ["import", "set_mode", "stats"])]
    dry_run: bool,
}

impl Cli {
    fn request(&self) -> BatchRequest {
        BatchRequest {
            batch_size: self.batch_size,
            limit: None,
            store_code: self.store_code,
            force_refresh: Some(self.force_refresh),
            offset: self.offset,
        }
    }
}

fn parse_mode(raw: &str) -> Result<CredentialMode, String> {
    CredentialMode::from_db_string(raw).ok_or_else(|| format!("unknown mode '{}' (expected test or live)", raw))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let storage = open_storage(Path::new(&config.output.database_path))
        .with_context(|| format!("failed to open database {}", config.output.database_path))?;

    if let Some(path) = &cli.import {
        handle_import(storage, path)
    } else if let Some(mode) = cli.set_mode {
        handle_set_mode(storage, mode)
    } else if cli.stats {
        handle_stats(&config, storage)
    } else if cli.dry_run {
        handle_dry_run(&cli, Orchestrator::new(config, config_hash, storage))
    } else {
        handle_enrich(&cli, Orchestrator::new(config, config_hash, storage)).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("price_scout=info,warn"),
            1 => EnvFilter::new("price_scout=debug,info"),
            2 => EnvFilter::new("price_scout=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn handle_import(mut storage: SqliteStorage, path: &Path) -> Result<()> {
    let count = import_products(&mut storage, path)
        .with_context(|| format!("failed to import {}", path.display()))?;
    println!("✓ Imported {} products", count);
    Ok(())
}

fn handle_set_mode(mut storage: SqliteStorage, mode: CredentialMode) -> Result<()> {
    storage.set_setting(CREDENTIAL_MODE_SETTING, mode.to_db_string())?;
    println!("✓ Active credential mode set to {}", mode);
    Ok(())
}

fn handle_stats(config: &Config, storage: SqliteStorage) -> Result<()> {
    println!("Database: {}\n", config.output.database_path);
    let stats = load_statistics(&storage, config.batch.sentinel_price_cents)?;
    print_statistics(&stats);
    Ok(())
}

/// Handles the --dry-run mode: shows the resolved settings and selection
fn handle_dry_run(cli: &Cli, orchestrator: Orchestrator<SqliteStorage>) -> Result<()> {
    let config = orchestrator.config();
    let cursor = cli.request().cursor(&config.batch);
    let mode = orchestrator.active_mode(cli.mode)?;

    println!("=== Price-Scout Dry Run ===\n");

    println!("Prober:");
    println!("  Combination cap: {}", config.prober.combination_cap);
    println!("  Wave width: {}", config.prober.wave_width);
    println!("  Wave timeout: {}s", config.prober.wave_timeout_secs);
    match config.prober.sample_seed {
        Some(seed) => println!("  Sample seed: {}", seed),
        None => println!("  Sample seed: random"),
    }

    println!("\nBatch:");
    println!("  Batch size: {}", cursor.batch_size);
    println!("  Store code: {}", cursor.store_code);
    println!("  Product timeout: {}s", config.batch.product_timeout_secs);
    if cursor.force_refresh {
        println!("  Mode: refresh from offset {}", cursor.offset);
    } else {
        println!(
            "  Mode: unenriched only (sentinel {} cents)",
            config.batch.sentinel_price_cents
        );
    }

    println!("\nCredentials ({} mode):", mode);
    match orchestrator.credentials(mode) {
        Ok(credentials) => println!("  {:?}", credentials),
        Err(e) => println!("  ✗ {}", e),
    }

    let products = orchestrator.select_products(&cursor)?;
    println!("\nWould price {} products:", products.len());
    for product in &products {
        println!(
            "  - #{} {} (vendor id {})",
            product.id,
            product.name,
            product.vendor_product_id.as_deref().unwrap_or("-")
        );
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the default mode: one invocation, or repeated ones with --until-done
async fn handle_enrich(cli: &Cli, mut orchestrator: Orchestrator<SqliteStorage>) -> Result<()> {
    let mut request = cli.request();

    loop {
        let response = orchestrator.invoke_active(&request, cli.mode).await;
        println!("{}", serde_json::to_string(&response)?);

        if response.is_error_status() {
            anyhow::bail!(
                "invocation failed: {}",
                response.error.as_deref().unwrap_or("unknown error")
            );
        }

        let next = match (&response.summary, cli.until_done) {
            (Some(summary), true) => request.follow_up(summary),
            _ => None,
        };
        match next {
            Some(next) => request = next,
            None => break,
        }
    }

    Ok(())
}
