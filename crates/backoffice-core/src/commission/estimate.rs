//! # Base-Fare Estimation
//!
//! When a ticket is sold without its base fare, the commission base is
//! estimated from the airline's recent history:
//!
//! ```text
//! recent FINAL tickets (base, amount)
//!        │
//!        ▼
//! mean(base / amount) ──► clamp [0.20, 0.95] ──► amount × ratio
//!        │
//!        └── no history: rule default (or 0.60), same clamp
//! ```

use crate::money::Money;
use crate::types::Ratio;
use crate::{DEFAULT_BASE_FARE_RATIO, MAX_BASE_FARE_RATIO, MIN_BASE_FARE_RATIO};

/// Sub-basis-point precision of the running sum.
const FINE_SCALE: i128 = 1_000_000;

/// One historical ticket used for estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FareSample {
    pub base_fare: Money,
    pub amount: Money,
}

impl FareSample {
    pub fn new(base_fare: Money, amount: Money) -> Self {
        FareSample { base_fare, amount }
    }
}

/// Estimates the base-fare ratio from samples.
///
/// Samples with a non-positive amount are skipped. With no usable sample the
/// fallback (or [`DEFAULT_BASE_FARE_RATIO`]) is used. The result is always
/// clamped into `[MIN_BASE_FARE_RATIO, MAX_BASE_FARE_RATIO]`.
pub fn estimate_base_fare_ratio(samples: &[FareSample], fallback: Option<Ratio>) -> Ratio {
    let min = Ratio::from_bps(MIN_BASE_FARE_RATIO);
    let max = Ratio::from_bps(MAX_BASE_FARE_RATIO);

    let usable: Vec<&FareSample> = samples.iter().filter(|s| s.amount.is_positive()).collect();

    if usable.is_empty() {
        return fallback
            .unwrap_or(Ratio::from_bps(DEFAULT_BASE_FARE_RATIO))
            .clamp(min, max);
    }

    // Each ratio is kept to a millionth of a basis point so the mean is
    // rounded once, half up, instead of once per sample.
    let sum: i128 = usable
        .iter()
        .map(|s| {
            let scaled = s.base_fare.cents() as i128 * 10_000 * FINE_SCALE;
            let amount = s.amount.cents() as i128;
            (scaled * 2 + amount).div_euclid(amount * 2)
        })
        .sum();
    let divisor = usable.len() as i128 * FINE_SCALE;
    let mean = (sum * 2 + divisor).div_euclid(divisor * 2) as i64;

    Ratio::from_bps(mean).clamp(min, max)
}

/// Estimated base fare for a sale amount.
pub fn estimate_base_fare(amount: Money, samples: &[FareSample], fallback: Option<Ratio>) -> Money {
    amount.apply_ratio(estimate_base_fare_ratio(samples, fallback))
}
