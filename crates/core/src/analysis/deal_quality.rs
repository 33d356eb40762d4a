//! "How good is this deal, taken at face value", independent of plausibility.

use serde::{Deserialize, Serialize};

use super::stats::CategoryStatistics;
use crate::config::EngineConfig;
use crate::domain::product::{decimal_to_f64, ProductObservation};

const DISCOUNT_DEPTH_MAX_POINTS: f64 = 40.0;
/// Discount at which the depth component saturates.
const DISCOUNT_DEPTH_SATURATION_PCT: f64 = 40.0;
const SAVINGS_MAX_POINTS: f64 = 30.0;
const RELATIVE_MAX_POINTS: f64 = 30.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DealQualityResult {
    /// Sum of the three components, 0-100.
    pub score: f64,
    /// 0-40
    pub discount_depth: f64,
    /// 0-30
    pub absolute_savings: f64,
    /// 0-30
    pub relative_to_category: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealQualityTier {
    Poor,
    Fair,
    Good,
    Great,
    Exceptional,
}

impl DealQualityResult {
    pub fn tier(&self) -> DealQualityTier {
        match self.score {
            s if s >= 85.0 => DealQualityTier::Exceptional,
            s if s >= 70.0 => DealQualityTier::Great,
            s if s >= 50.0 => DealQualityTier::Good,
            s if s >= 30.0 => DealQualityTier::Fair,
            _ => DealQualityTier::Poor,
        }
    }
}

/// Score a product's deal. Deterministic; products without a positive
/// discount score zero on every component.
pub fn score_deal(
    product: &ProductObservation,
    stats: Option<&CategoryStatistics>,
    config: &EngineConfig,
) -> DealQualityResult {
    let Some(discount) = product.discount_pct().filter(|pct| *pct > 0.0) else {
        return DealQualityResult::default();
    };

    let discount_depth =
        (discount / DISCOUNT_DEPTH_SATURATION_PCT).min(1.0) * DISCOUNT_DEPTH_MAX_POINTS;

    let savings = decimal_to_f64(product.savings());
    let absolute_savings = (savings / config.reference_savings).clamp(0.0, 1.0) * SAVINGS_MAX_POINTS;

    let current = product.current_price.map(decimal_to_f64).unwrap_or_default();
    let relative_to_category = stats
        .filter(|stats| stats.has_price_baseline(config.min_category_samples))
        .map(|stats| relative_points(current, stats))
        .unwrap_or(0.0);

    DealQualityResult {
        score: (discount_depth + absolute_savings + relative_to_category).min(100.0),
        discount_depth,
        absolute_savings,
        relative_to_category,
    }
}

/// Points for sitting below the category median, saturating at the 10th percentile.
fn relative_points(current: f64, stats: &CategoryStatistics) -> f64 {
    let median = stats.price.median;
    let p10 = stats.price.p10;
    if current >= median {
        return 0.0;
    }
    if current <= p10 || median <= p10 {
        return RELATIVE_MAX_POINTS;
    }
    ((median - current) / (median - p10)).clamp(0.0, 1.0) * RELATIVE_MAX_POINTS
}
