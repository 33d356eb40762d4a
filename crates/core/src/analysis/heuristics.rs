//! Independent detectors for common deceptive-pricing templates.
//!
//! Each check looks at one product (and, where needed, its category
//! statistics) and reports its own signal. None of them short-circuits
//! another; aggregation happens in the scorers.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::stats::CategoryStatistics;
use crate::config::EngineConfig;
use crate::domain::product::{decimal_to_f64, ProductObservation};

const CHARM_ORIGINAL_MIN_FRACTION: Decimal = Decimal::from_parts(98, 0, 0, false, 2);
const CHARM_SALE_MAX_FRACTION: Decimal = Decimal::from_parts(5, 0, 0, false, 2);

/// Evidence produced by the pattern heuristics for one product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeuristicSignals {
    pub round_original: bool,
    /// The marketing-friendly discount the product's discount sits on, if any.
    pub round_discount: Option<f64>,
    pub price_doubling: bool,
    /// `original / p90` when the original price is inflated for the category.
    pub inflated_original: Option<f64>,
    pub average_after_discount: bool,
    /// Original ends in .99 while the sale price ends in .00.
    pub charm_ending: bool,
}

impl HeuristicSignals {
    /// How many of the fake-discount indicators agree.
    pub fn fake_discount_agreement(&self) -> usize {
        [
            self.round_original,
            self.inflated_original.is_some(),
            self.price_doubling,
            self.average_after_discount,
        ]
        .into_iter()
        .filter(|fired| *fired)
        .count()
    }
}

/// Run every heuristic for `product`. Products without a real discount carry
/// no discount narrative to evaluate and get an empty signal set.
pub fn evaluate(
    product: &ProductObservation,
    stats: Option<&CategoryStatistics>,
    config: &EngineConfig,
) -> HeuristicSignals {
    let (Some(original), Some(discount)) = (product.original_price, product.discount_pct()) else {
        return HeuristicSignals::default();
    };
    if discount <= 0.0 {
        return HeuristicSignals::default();
    }

    HeuristicSignals {
        round_original: is_round_price(original, config),
        round_discount: matching_marketing_discount(discount, config),
        price_doubling: is_price_doubling(product, config),
        inflated_original: stats.and_then(|stats| inflated_original_ratio(product, stats, config)),
        average_after_discount: stats
            .is_some_and(|stats| is_average_after_discount(product, stats, config)),
        charm_ending: is_charm_ending(product),
    }
}

/// A price is round when it lies within `round_price_tolerance` of a positive
/// multiple of one of the configured round numbers (so 2000 and 1999 both count).
pub fn is_round_price(price: Decimal, config: &EngineConfig) -> bool {
    config.round_numbers.iter().any(|step| {
        if *step <= Decimal::ZERO {
            return false;
        }
        let Some(nearest) = price.checked_div(*step).and_then(|steps| steps.round().checked_mul(*step))
        else {
            return false;
        };
        nearest > Decimal::ZERO
            && price.checked_sub(nearest).is_some_and(|gap| gap.abs() <= config.round_price_tolerance)
    })
}

pub fn matching_marketing_discount(discount_pct: f64, config: &EngineConfig) -> Option<f64> {
    config
        .marketing_discounts
        .iter()
        .copied()
        .find(|target| (discount_pct - target).abs() <= config.round_discount_tolerance_pct)
}

/// Original price is (almost) exactly twice the current price.
pub fn is_price_doubling(product: &ProductObservation, config: &EngineConfig) -> bool {
    let Some((current, original)) = product.price_pair() else {
        return false;
    };
    if current <= Decimal::ZERO {
        return false;
    }
    let Some(gap) = current.checked_mul(Decimal::TWO).and_then(|double| original.checked_sub(double))
    else {
        return false;
    };
    decimal_to_f64(gap.abs()) <= decimal_to_f64(original) * config.doubling_tolerance_pct / 100.0
}

/// Ratio of the original price to the category's 90th percentile, when it
/// exceeds `inflated_original_multiplier`.
pub fn inflated_original_ratio(
    product: &ProductObservation,
    stats: &CategoryStatistics,
    config: &EngineConfig,
) -> Option<f64> {
    let original = decimal_to_f64(product.original_price?);
    if !stats.has_price_baseline(config.min_category_samples) || stats.price.p90 <= 0.0 {
        return None;
    }
    let ratio = original / stats.price.p90;
    (ratio > config.inflated_original_multiplier).then_some(ratio)
}

/// A large advertised discount that still lands inside the category's
/// interquartile price range: the "sale" price is just the market price.
pub fn is_average_after_discount(
    product: &ProductObservation,
    stats: &CategoryStatistics,
    config: &EngineConfig,
) -> bool {
    let Some(discount) = product.discount_pct() else {
        return false;
    };
    if discount < config.average_after_discount_min_pct
        || !stats.has_price_baseline(config.min_category_samples)
    {
        return false;
    }
    let Some(current) = product.current_price.map(decimal_to_f64) else {
        return false;
    };
    (stats.price.p25..=stats.price.p75).contains(&current)
}

pub fn is_charm_ending(product: &ProductObservation) -> bool {
    let (Some(current), Some(original)) = (product.current_price, product.original_price) else {
        return false;
    };
    original.fract() >= CHARM_ORIGINAL_MIN_FRACTION && current.fract() < CHARM_SALE_MAX_FRACTION
}
