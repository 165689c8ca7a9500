//! Combination generation
//!
//! Quantity is pinned to its smallest option and kept out of the expansion.
//! Every other populated group, size included, is varied. When the full
//! product of those groups exceeds the cap, a uniform sample of exactly `cap`
//! distinct combinations is drawn instead of a prefix.

use crate::vendor::{OptionGroups, ProductOption};
use rand::seq::index;
use rand::Rng;
use std::collections::HashSet;

/// Group holding quantity options
pub const QTY_GROUP: &str = "qty";

/// Group holding size options
pub const SIZE_GROUP: &str = "size";

/// Option ids submitted together for one price quote
pub type Combination = Vec<u64>;

/// Search space chosen for one product
#[derive(Debug, Clone)]
pub struct CombinationPlan {
    /// Smallest quantity, prefixed to every probed combination
    pub baseline_quantity: Option<ProductOption>,
    /// First size option as listed by the vendor, used by the fallback probe
    pub first_size: Option<u64>,
    /// Candidate combinations over the variable groups (quantity excluded)
    pub candidates: Vec<Combination>,
    /// Size of the full space over the variable groups (saturating)
    pub total_combinations: u128,
    /// Whether `candidates` is a sample rather than the full space
    pub sampled: bool,
}

/// Builds bounded candidate sets from option groups
///
/// The entropy source is injected so sampling can be made reproducible.
pub struct CombinationGenerator<R> {
    cap: usize,
    rng: R,
}

impl<R: Rng> CombinationGenerator<R> {
    pub fn new(cap: usize, rng: R) -> Self {
        Self {
            cap: cap.max(1),
            rng,
        }
    }

    /// Plans the candidates to probe for one product's option groups
    pub fn plan(&mut self, groups: &OptionGroups) -> CombinationPlan {
        let baseline_quantity = groups
            .get(QTY_GROUP)
            .and_then(|options| sort_quantities(options).into_iter().next());

        let first_size = groups
            .get(SIZE_GROUP)
            .and_then(|options| options.first())
            .map(|o| o.id);

        let variable: Vec<Vec<u64>> = groups
            .iter()
            .filter(|(name, options)| name.as_str() != QTY_GROUP && !options.is_empty())
            .map(|(_, options)| options.iter().map(|o| o.id).collect())
            .collect();

        if variable.is_empty() {
            return CombinationPlan {
                baseline_quantity,
                first_size,
                candidates: Vec::new(),
                total_combinations: 0,
                sampled: false,
            };
        }

        let lists: Vec<&[u64]> = variable.iter().map(Vec::as_slice).collect();
        let total = lists
            .iter()
            .try_fold(1u128, |acc, list| acc.checked_mul(list.len() as u128))
            .unwrap_or(u128::MAX);

        let (candidates, sampled) = if total <= self.cap as u128 {
            (cartesian_product(&lists), false)
        } else {
            (self.sample(&lists, total), true)
        };

        CombinationPlan {
            baseline_quantity,
            first_size,
            candidates,
            total_combinations: total,
            sampled,
        }
    }

    /// Draws `cap` distinct combinations uniformly from a space of `total`
    fn sample(&mut self, lists: &[&[u64]], total: u128) -> Vec<Combination> {
        if let Ok(length) = usize::try_from(total) {
            return index::sample(&mut self.rng, length, self.cap)
                .into_iter()
                .map(|i| combination_at(lists, i as u128))
                .collect();
        }

        // Space too large to index; draw tuples directly and drop repeats.
        let mut seen = HashSet::with_capacity(self.cap);
        let mut out = Vec::with_capacity(self.cap);
        while out.len() < self.cap {
            let combination: Combination = lists
                .iter()
                .map(|list| list[self.rng.gen_range(0..list.len())])
                .collect();
            if seen.insert(combination.clone()) {
                out.push(combination);
            }
        }
        out
    }
}

/// Sorts quantity options numerically ascending; non-numeric names sort last
pub fn sort_quantities(options: &[ProductOption]) -> Vec<ProductOption> {
    let mut sorted = options.to_vec();
    sorted.sort_by(|a, b| {
        match (quantity_value(&a.name), quantity_value(&b.name)) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }
    });
    sorted
}

fn quantity_value(name: &str) -> Option<f64> {
    let cleaned: String = name.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Full Cartesian product of the given option id lists
///
/// The last list varies fastest.
pub fn cartesian_product(lists: &[&[u64]]) -> Vec<Combination> {
    match lists.split_first() {
        None => vec![Vec::new()],
        Some((head, tail)) => {
            let rest = cartesian_product(tail);
            let mut out = Vec::with_capacity(head.len() * rest.len());
            for id in head.iter() {
                for suffix in &rest {
                    let mut combination = Vec::with_capacity(suffix.len() + 1);
                    combination.push(*id);
                    combination.extend_from_slice(suffix);
                    out.push(combination);
                }
            }
            out
        }
    }
}

/// The `index`-th element of [`cartesian_product`] without materializing it
fn combination_at(lists: &[&[u64]], mut index: u128) -> Combination {
    let mut combination = vec![0; lists.len()];
    for (slot, list) in lists.iter().enumerate().rev() {
        let radix = list.len() as u128;
        combination[slot] = list[(index % radix) as usize];
        index /= radix;
    }
    combination
}

/// Canonical key for a combination: ids sorted ascending, joined with `-`
pub fn variant_key(ids: &[u64]) -> String {
    let mut sorted = ids.to_vec();
    sorted.sort_unstable();
    sorted
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join("-")
}

/// Decodes a variant key back into its sorted ids
pub fn parse_variant_key(key: &str) -> Option<Vec<u64>> {
    if key.is_empty() {
        return None;
    }
    key.split('-').map(|part| part.parse().ok()).collect()
}
