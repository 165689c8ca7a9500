//! Batch orchestration
//!
//! One invocation resolves credentials, selects a bounded slice of the
//! catalog, authenticates if that slice is non-empty and drives each product
//! through the pricing pipeline in turn. Products never run concurrently with each other; only the price
//! probes within a product do.

use crate::batch::request::{BatchCursor, BatchRequest, BatchSummary, InvocationResponse};
use crate::config::Config;
use crate::pricing::{resolve_minimum, CombinationGenerator, PriceProber, Resolution, VendorPriceSource};
use crate::storage::{
    CredentialMode, ErrorStage, NewRun, PriceUpdate, ProductRecord, RunCounts, RunStatus, Storage,
};
use crate::vendor::{authenticate, build_http_client, resolve_credentials, VendorClient, VendorCredentials};
use crate::ScoutError;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// How a single product ended up in one run
#[derive(Debug)]
enum ProductOutcome {
    Updated { price_cents: i64, variant_key: String },
    Unresolved { stage: ErrorStage, message: String },
}

/// Drives enrichment invocations against one catalog
pub struct Orchestrator<S: Storage> {
    config: Config,
    config_hash: String,
    storage: S,
    env: EnvLookup,
}

impl<S: Storage> Orchestrator<S> {
    /// Creates an orchestrator reading credential overrides from the process
    /// environment
    pub fn new(config: Config, config_hash: impl Into<String>, storage: S) -> Self {
        Self {
            config,
            config_hash: config_hash.into(),
            storage,
            env: Box::new(|key| std::env::var(key).ok()),
        }
    }

    /// Replaces the environment lookup used for credential overrides
    pub fn with_env<F>(mut self, env: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Box::new(env);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Picks the credential mode: explicit override, then the settings
    /// store, then the configured default
    pub fn active_mode(&self, requested: Option<CredentialMode>) -> Result<CredentialMode, ScoutError> {
        if let Some(mode) = requested {
            return Ok(mode);
        }
        Ok(self
            .storage
            .active_credential_mode()?
            .unwrap_or(self.config.vendor.default_mode))
    }

    /// Resolves the credentials for `mode` without touching the network
    pub fn credentials(&self, mode: CredentialMode) -> Result<VendorCredentials, ScoutError> {
        resolve_credentials(&self.config.credentials, mode, |key| (self.env)(key))
    }

    /// Rows the given cursor would process
    pub fn select_products(&self, cursor: &BatchCursor) -> Result<Vec<ProductRecord>, ScoutError> {
        let products = if cursor.force_refresh {
            self.storage.select_range(cursor.offset, cursor.batch_size)?
        } else {
            self.storage
                .select_unenriched(self.config.batch.sentinel_price_cents, cursor.batch_size)?
        };
        Ok(products)
    }

    /// Runs one invocation and wraps the outcome in a response envelope
    ///
    /// Missing credentials become a soft `success:false`; any other escaping
    /// error becomes an error-status failure.
    pub async fn invoke(&mut self, request: &BatchRequest, mode: CredentialMode) -> InvocationResponse {
        let cursor = request.cursor(&self.config.batch);

        match self.run_batch(&cursor, mode).await {
            Ok(summary) => InvocationResponse::ok(summary),
            Err(e) if e.is_soft_failure() => {
                tracing::warn!("Enrichment skipped: {}", e);
                InvocationResponse::from_error(&e)
            }
            Err(e) => {
                tracing::error!("Enrichment failed: {}", e);
                InvocationResponse::from_error(&e)
            }
        }
    }

    /// Runs one invocation under the mode active right now
    ///
    /// The settings store is re-read on every call. A mode that cannot be
    /// resolved becomes an error-status failure.
    pub async fn invoke_active(
        &mut self,
        request: &BatchRequest,
        requested: Option<CredentialMode>,
    ) -> InvocationResponse {
        match self.active_mode(requested) {
            Ok(mode) => self.invoke(request, mode).await,
            Err(e) => {
                tracing::error!("Cannot resolve credential mode: {}", e);
                InvocationResponse::failure(e.to_string())
            }
        }
    }

    /// Processes one batch and reports progress
    pub async fn run_batch(
        &mut self,
        cursor: &BatchCursor,
        mode: CredentialMode,
    ) -> Result<BatchSummary, ScoutError> {
        // Fails before any network I/O when the active mode is incomplete
        let credentials = self.credentials(mode)?;
        let http = build_http_client(&self.config.vendor)?;

        let run_id = self.storage.create_run(&NewRun {
            config_hash: self.config_hash.clone(),
            mode,
            store_code: cursor.store_code,
            force_refresh: cursor.force_refresh,
            offset: cursor.offset,
            batch_size: cursor.batch_size,
        })?;

        tracing::info!(
            "Run {} started: {} mode, store {}, batch {}, {}",
            run_id,
            mode,
            cursor.store_code,
            cursor.batch_size,
            if cursor.force_refresh {
                format!("refresh from offset {}", cursor.offset)
            } else {
                "unenriched only".to_string()
            }
        );

        match self.run_products(run_id, &http, &credentials, cursor).await {
            Ok(summary) => {
                let counts = RunCounts {
                    processed: summary.processed,
                    updated: summary.updated,
                    errors: summary.errors,
                };
                self.storage
                    .finish_run(run_id, RunStatus::Completed, counts, None)?;
                tracing::info!(
                    "Run {} complete: {} processed, {} updated, {} errors, {} remaining",
                    run_id,
                    summary.processed,
                    summary.updated,
                    summary.errors,
                    summary.remaining
                );
                Ok(summary)
            }
            Err(e) => {
                let message = e.to_string();
                if let Err(finish_err) = self.storage.finish_run(
                    run_id,
                    RunStatus::Failed,
                    RunCounts::default(),
                    Some(&message),
                ) {
                    tracing::warn!("Failed to mark run {} as failed: {}", run_id, finish_err);
                }
                Err(e)
            }
        }
    }

    async fn run_products(
        &mut self,
        run_id: i64,
        http: &reqwest::Client,
        credentials: &VendorCredentials,
        cursor: &BatchCursor,
    ) -> Result<BatchSummary, ScoutError> {
        let products = self.select_products(cursor)?;
        let total = self.storage.count_vendor_products()?;
        tracing::info!("Selected {} of {} vendor products", products.len(), total);

        let mut counts = RunCounts::default();
        if products.is_empty() {
            return self.summarize(cursor, &counts, total);
        }

        let token = authenticate(http, credentials).await?;
        let client = VendorClient::new(http.clone(), credentials, token);

        let mut generator = match self.config.prober.sample_seed {
            Some(seed) => CombinationGenerator::new(self.config.prober.combination_cap, StdRng::seed_from_u64(seed)),
            None => CombinationGenerator::new(self.config.prober.combination_cap, StdRng::from_entropy()),
        };
        let prober = PriceProber::new(
            self.config.prober.wave_width,
            Duration::from_secs(self.config.prober.wave_timeout_secs),
        );

        for product in &products {
            counts.processed += 1;

            let outcome = self
                .process_product(&client, &mut generator, &prober, product, cursor.store_code)
                .await;

            match outcome {
                ProductOutcome::Updated {
                    price_cents,
                    variant_key,
                } => {
                    counts.updated += 1;
                    tracing::info!(
                        "Product {} ({}) resolved at {} cents [{}]",
                        product.id,
                        product.name,
                        price_cents,
                        variant_key
                    );
                }
                ProductOutcome::Unresolved { stage, message } => {
                    counts.errors += 1;
                    tracing::warn!(
                        "Product {} ({}) unresolved at {} stage: {}",
                        product.id,
                        product.name,
                        stage.to_db_string(),
                        message
                    );
                    if let Err(e) =
                        self.storage
                            .record_enrichment_error(run_id, product.id, stage, &message)
                    {
                        tracing::warn!("Failed to record error for product {}: {}", product.id, e);
                    }
                }
            }
        }

        self.summarize(cursor, &counts, total)
    }

    fn summarize(
        &self,
        cursor: &BatchCursor,
        counts: &RunCounts,
        total: u64,
    ) -> Result<BatchSummary, ScoutError> {
        let (remaining, next_offset) = if cursor.force_refresh {
            let next_offset = cursor.offset + counts.processed;
            (total.saturating_sub(next_offset), next_offset)
        } else {
            (
                self.storage
                    .count_unenriched(self.config.batch.sentinel_price_cents)?,
                0,
            )
        };

        Ok(BatchSummary {
            processed: counts.processed,
            updated: counts.updated,
            errors: counts.errors,
            remaining,
            next_offset,
            total,
        })
    }

    /// Runs the full pipeline for one product and writes its price
    ///
    /// Only the network stage is bounded by the product timeout; the write
    /// happens afterwards and is never cancelled.
    async fn process_product(
        &mut self,
        client: &VendorClient,
        generator: &mut CombinationGenerator<StdRng>,
        prober: &PriceProber,
        product: &ProductRecord,
        store_code: u32,
    ) -> ProductOutcome {
        let Some(vendor_id) = product.vendor_product_id.as_deref() else {
            return ProductOutcome::Unresolved {
                stage: ErrorStage::Options,
                message: "product has no vendor product id".to_string(),
            };
        };

        let limit = self.config.batch.product_timeout_secs;
        let stage = price_product(client, generator, prober, vendor_id, store_code);

        let resolution = match tokio::time::timeout(Duration::from_secs(limit), stage).await {
            Err(_) => {
                return ProductOutcome::Unresolved {
                    stage: ErrorStage::Timeout,
                    message: ScoutError::Timeout {
                        what: format!("pricing vendor product {}", vendor_id),
                        seconds: limit,
                    }
                    .to_string(),
                }
            }
            Ok(Err(e)) => {
                return ProductOutcome::Unresolved {
                    stage: ErrorStage::Options,
                    message: e.to_string(),
                }
            }
            Ok(Ok(resolution)) => resolution,
        };

        let Some(best) = resolution.best else {
            return ProductOutcome::Unresolved {
                stage: ErrorStage::Pricing,
                message: format!(
                    "no positive price from {} of {} combinations{}{}",
                    resolution.candidates,
                    resolution.total_combinations,
                    if resolution.sampled { " (sampled)" } else { "" },
                    if resolution.used_fallback {
                        " or the fallback probe"
                    } else {
                        ""
                    }
                ),
            };
        };

        let variant_key = best.variant_key();
        let update = PriceUpdate::mirrored(best.price_cents, variant_key.clone());

        match self.storage.write_min_price(product.id, &update) {
            Ok(()) => ProductOutcome::Updated {
                price_cents: best.price_cents,
                variant_key,
            },
            Err(source) => ProductOutcome::Unresolved {
                stage: ErrorStage::Persistence,
                message: ScoutError::Persistence {
                    product_id: product.id,
                    source,
                }
                .to_string(),
            },
        }
    }
}

/// Network stage for one product: options, then probing
async fn price_product(
    client: &VendorClient,
    generator: &mut CombinationGenerator<StdRng>,
    prober: &PriceProber,
    vendor_id: &str,
    store_code: u32,
) -> Result<Resolution, ScoutError> {
    let groups = client.fetch_options(vendor_id, store_code).await?;
    tracing::debug!(
        "Vendor product {} has groups: {}",
        vendor_id,
        groups
            .iter()
            .map(|(name, options)| format!("{}({})", name, options.len()))
            .collect::<Vec<_>>()
            .join(", ")
    );

    let source = VendorPriceSource::new(client, vendor_id, store_code);
    Ok(resolve_minimum(generator, prober, &source, &groups).await)
}
