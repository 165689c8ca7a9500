//! Running minimum over a product's price quotes

use crate::pricing::combinations::{variant_key, Combination};

/// One successful probe: the full combination submitted and its price
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceQuote {
    pub combination: Combination,
    pub price_cents: i64,
}

impl PriceQuote {
    /// Canonical key of the combination that produced this price
    pub fn variant_key(&self) -> String {
        variant_key(&self.combination)
    }
}

/// Tracks the lowest price seen for one product
///
/// Starts empty (positive infinity). A quote replaces the current minimum only
/// when strictly lower, so the first of several equal prices is kept.
#[derive(Debug, Default)]
pub struct MinimumSelector {
    best: Option<PriceQuote>,
}

impl MinimumSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offers a quote; returns true if it became the new minimum
    ///
    /// Non-positive prices are ignored.
    pub fn offer(&mut self, quote: PriceQuote) -> bool {
        if quote.price_cents <= 0 {
            return false;
        }

        let better = match &self.best {
            None => true,
            Some(current) => quote.price_cents < current.price_cents,
        };
        if better {
            self.best = Some(quote);
        }
        better
    }

    pub fn offer_all(&mut self, quotes: impl IntoIterator<Item = PriceQuote>) {
        for quote in quotes {
            self.offer(quote);
        }
    }

    pub fn best(&self) -> Option<&PriceQuote> {
        self.best.as_ref()
    }

    pub fn into_best(self) -> Option<PriceQuote> {
        self.best
    }
}
