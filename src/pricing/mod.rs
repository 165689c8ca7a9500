//! Minimum-price discovery for a single product
//!
//! This module contains the pricing pipeline that runs once option groups are
//! known:
//! - Combination generation with a bounded, sampled search space
//! - Wave-based price probing
//! - Price extraction from vendor responses
//! - Running-minimum selection and the fallback probe

mod combinations;
mod fallback;
mod price;
mod prober;
mod selector;

pub use combinations::{
    cartesian_product, parse_variant_key, sort_quantities, variant_key, Combination,
    CombinationGenerator, CombinationPlan, QTY_GROUP, SIZE_GROUP,
};
pub use fallback::{fallback_combination, probe_fallback};
pub use price::{dollars_to_cents, extract_price, read_field, MaybePrice, PriceField, PRICE_FIELDS};
pub use prober::{PriceProber, PriceSource, ProbeReport, VendorPriceSource};
pub use selector::{MinimumSelector, PriceQuote};

use crate::vendor::OptionGroups;
use rand::Rng;

/// Outcome of the pricing pipeline for one product
#[derive(Debug)]
pub struct Resolution {
    /// Lowest price found, if any
    pub best: Option<PriceQuote>,
    pub candidates: usize,
    pub total_combinations: u128,
    pub sampled: bool,
    pub probe: ProbeReport,
    pub used_fallback: bool,
}

/// Finds the lowest price for one product's option groups
///
/// Plans the candidates, probes them in waves, and keeps the strict minimum.
/// When no probe succeeded the fallback combination is tried once.
pub async fn resolve_minimum<R: Rng, S: PriceSource>(
    generator: &mut CombinationGenerator<R>,
    prober: &PriceProber,
    source: &S,
    groups: &OptionGroups,
) -> Resolution {
    let plan = generator.plan(groups);
    if plan.sampled {
        tracing::debug!(
            "Sampling {} of {} combinations",
            plan.candidates.len(),
            plan.total_combinations
        );
    }

    let baseline = plan.baseline_quantity.as_ref().map(|o| o.id);
    let probe = prober.probe(source, baseline, &plan.candidates).await;

    let mut selector = MinimumSelector::new();
    selector.offer_all(probe.quotes.iter().cloned());

    let mut used_fallback = false;
    if selector.best().is_none() {
        used_fallback = true;
        if let Some(quote) = probe_fallback(prober, source, &plan).await {
            selector.offer(quote);
        }
    }

    Resolution {
        best: selector.into_best(),
        candidates: plan.candidates.len(),
        total_combinations: plan.total_combinations,
        sampled: plan.sampled,
        probe,
        used_fallback,
    }
}
