//! Last-resort probe for products where no wave produced a price

use crate::pricing::combinations::{Combination, CombinationPlan};
use crate::pricing::prober::{PriceProber, PriceSource};
use crate::pricing::selector::PriceQuote;

/// The single combination tried by the fallback probe
///
/// Baseline quantity plus the first size option when a size group exists.
/// A product with a quantity group but no size group falls back to the
/// baseline quantity alone. With neither there is nothing to try.
pub fn fallback_combination(plan: &CombinationPlan) -> Option<Combination> {
    let baseline = plan.baseline_quantity.as_ref().map(|o| o.id);
    match (baseline, plan.first_size) {
        (None, None) => None,
        (baseline, size) => Some(baseline.into_iter().chain(size).collect()),
    }
}

/// Retries a product exactly once with its fallback combination
pub async fn probe_fallback<S: PriceSource>(
    prober: &PriceProber,
    source: &S,
    plan: &CombinationPlan,
) -> Option<PriceQuote> {
    let combination = fallback_combination(plan)?;
    tracing::debug!("Trying fallback combination {:?}", combination);
    prober.probe_single(source, &combination).await
}
