//! Price extraction from vendor price responses
//!
//! The vendor reports a price under one of several keys, as a JSON number or
//! a numeric string, in dollars. Extraction walks [`PRICE_FIELDS`] in order
//! and takes the first strictly positive value.

use serde_json::Value;

/// A field a price may be reported under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceField {
    Price,
    UnitPrice,
    TotalPrice,
}

impl PriceField {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::UnitPrice => "unit_price",
            Self::TotalPrice => "total_price",
        }
    }
}

/// Extraction order; earlier fields win
pub const PRICE_FIELDS: [PriceField; 3] =
    [PriceField::Price, PriceField::UnitPrice, PriceField::TotalPrice];

/// Outcome of reading one price field (or a whole response)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaybePrice {
    /// A strictly positive price, in cents
    Found { field: PriceField, cents: i64 },
    /// The field held a number that was zero or negative
    NonPositive,
    /// The field held something that is not a number
    Unparseable,
    /// The field was absent or null
    Missing,
}

impl MaybePrice {
    pub fn cents(&self) -> Option<i64> {
        match self {
            Self::Found { cents, .. } => Some(*cents),
            _ => None,
        }
    }
}

/// Reads one field of a price response
pub fn read_field(body: &Value, field: PriceField) -> MaybePrice {
    let amount = match body.get(field.key()) {
        None | Some(Value::Null) => return MaybePrice::Missing,
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => parse_amount(s),
        Some(_) => None,
    };

    match amount {
        None => MaybePrice::Unparseable,
        Some(dollars) if !dollars.is_finite() => MaybePrice::Unparseable,
        Some(dollars) => match dollars_to_cents(dollars) {
            Some(cents) if cents > 0 => MaybePrice::Found { field, cents },
            _ => MaybePrice::NonPositive,
        },
    }
}

/// Extracts the price from a response body
///
/// Returns the first [`MaybePrice::Found`] in [`PRICE_FIELDS`] order. When no
/// field yields a price, the most informative failure is returned
/// (unparseable over non-positive over missing).
pub fn extract_price(body: &Value) -> MaybePrice {
    let mut outcome = MaybePrice::Missing;

    for field in PRICE_FIELDS {
        match read_field(body, field) {
            found @ MaybePrice::Found { .. } => return found,
            MaybePrice::Unparseable => outcome = MaybePrice::Unparseable,
            MaybePrice::NonPositive if outcome == MaybePrice::Missing => {
                outcome = MaybePrice::NonPositive
            }
            _ => {}
        }
    }

    outcome
}

/// Parses a dollar amount such as `"12.50"`, `"$1,299.00"` or `" 7 "`
fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    cleaned.parse::<f64>().ok()
}

/// Converts dollars to whole cents, rounding half away from zero
pub fn dollars_to_cents(dollars: f64) -> Option<i64> {
    let cents = (dollars * 100.0).round();
    if cents.is_finite() && cents.abs() < i64::MAX as f64 {
        Some(cents as i64)
    } else {
        None
    }
}
