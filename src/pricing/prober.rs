//! Wave-based price probing
//!
//! Candidates are priced in fixed-width waves. Every probe in a wave runs
//! concurrently, and the next wave starts only once the whole wave has
//! settled or the wave deadline passed. Probes that settled before the
//! deadline keep their prices; only those still in flight are dropped. A
//! probe that fails for any reason yields no price and is logged, never
//! raised.

use crate::pricing::combinations::{variant_key, Combination};
use crate::pricing::price::{extract_price, MaybePrice};
use crate::pricing::selector::PriceQuote;
use crate::vendor::VendorClient;
use crate::ScoutError;
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use std::time::Duration;

/// Something that can quote a price for a full option combination
#[allow(async_fn_in_trait)]
pub trait PriceSource {
    async fn quote(&self, combination: &[u64]) -> Result<Value, ScoutError>;
}

/// [`PriceSource`] for one vendor product at one store
pub struct VendorPriceSource<'a> {
    client: &'a VendorClient,
    vendor_product_id: &'a str,
    store_code: u32,
}

impl<'a> VendorPriceSource<'a> {
    pub fn new(client: &'a VendorClient, vendor_product_id: &'a str, store_code: u32) -> Self {
        Self {
            client,
            vendor_product_id,
            store_code,
        }
    }
}

impl PriceSource for VendorPriceSource<'_> {
    async fn quote(&self, combination: &[u64]) -> Result<Value, ScoutError> {
        self.client
            .quote_price(self.vendor_product_id, self.store_code, combination)
            .await
    }
}

/// What one probing pass produced
#[derive(Debug, Default)]
pub struct ProbeReport {
    /// Successful quotes, in submission order
    pub quotes: Vec<PriceQuote>,
    /// Probes issued, including those cut off by a wave deadline
    pub attempted: usize,
    /// Probes that produced no usable price, including cut-off ones
    pub failed: usize,
    /// Waves cut off by the wave deadline
    pub abandoned_waves: usize,
}

/// Issues price probes in bounded-concurrency waves
#[derive(Debug, Clone)]
pub struct PriceProber {
    wave_width: usize,
    wave_timeout: Duration,
}

impl PriceProber {
    pub fn new(wave_width: usize, wave_timeout: Duration) -> Self {
        Self {
            wave_width: wave_width.max(1),
            wave_timeout,
        }
    }

    /// Prices every candidate, each prefixed with the baseline quantity
    pub async fn probe<S: PriceSource>(
        &self,
        source: &S,
        baseline_quantity: Option<u64>,
        candidates: &[Combination],
    ) -> ProbeReport {
        let full: Vec<Combination> = candidates
            .iter()
            .map(|candidate| with_baseline(baseline_quantity, candidate))
            .collect();

        let mut report = ProbeReport::default();

        for (index, wave) in full.chunks(self.wave_width).enumerate() {
            report.attempted += wave.len();

            let mut pending: FuturesUnordered<_> = wave
                .iter()
                .enumerate()
                .map(|(position, combination)| async move {
                    (position, probe_one(source, combination).await)
                })
                .collect();

            let deadline = tokio::time::Instant::now() + self.wave_timeout;
            let mut settled = Vec::with_capacity(wave.len());
            while let Ok(Some(result)) = tokio::time::timeout_at(deadline, pending.next()).await {
                settled.push(result);
            }
            drop(pending);

            let cut_off = wave.len() - settled.len();
            if cut_off > 0 {
                tracing::warn!(
                    "Price wave {} exceeded {}s, abandoning {} of {} probes",
                    index + 1,
                    self.wave_timeout.as_secs(),
                    cut_off,
                    wave.len()
                );
                report.failed += cut_off;
                report.abandoned_waves += 1;
            }

            // Completion order is arbitrary; ties resolve by submission order
            settled.sort_by_key(|(position, _)| *position);
            for (_, result) in settled {
                match result {
                    Some(quote) => report.quotes.push(quote),
                    None => report.failed += 1,
                }
            }
        }

        tracing::debug!(
            "Probed {} combinations: {} priced, {} without price",
            report.attempted,
            report.quotes.len(),
            report.failed
        );

        report
    }

    /// Issues a single probe under the wave deadline
    pub async fn probe_single<S: PriceSource>(
        &self,
        source: &S,
        combination: &[u64],
    ) -> Option<PriceQuote> {
        match tokio::time::timeout(self.wave_timeout, probe_one(source, combination)).await {
            Ok(quote) => quote,
            Err(_) => {
                tracing::warn!(
                    "Price probe {} exceeded {}s",
                    variant_key(combination),
                    self.wave_timeout.as_secs()
                );
                None
            }
        }
    }
}

fn with_baseline(baseline_quantity: Option<u64>, candidate: &[u64]) -> Combination {
    let mut combination = Vec::with_capacity(candidate.len() + 1);
    combination.extend(baseline_quantity);
    combination.extend_from_slice(candidate);
    combination
}

async fn probe_one<S: PriceSource>(source: &S, combination: &[u64]) -> Option<PriceQuote> {
    match source.quote(combination).await {
        Ok(body) => match extract_price(&body) {
            MaybePrice::Found { field, cents } => {
                tracing::debug!(
                    "Combination {} priced at {} cents ({})",
                    variant_key(combination),
                    cents,
                    field.key()
                );
                Some(PriceQuote {
                    combination: combination.to_vec(),
                    price_cents: cents,
                })
            }
            other => {
                tracing::debug!(
                    "Combination {} returned no usable price: {:?}",
                    variant_key(combination),
                    other
                );
                None
            }
        },
        Err(e) => {
            tracing::debug!("Price probe {} failed: {}", variant_key(combination), e);
            None
        }
    }
}
