//! Fraud-facing suspicion score with an itemised, auditable reason list.
//!
//! Every check that fires appends a reason carrying its point contribution.
//! Scores are plain sums (uncapped) and depend only on the product, its
//! category statistics and the configuration, so a rerun reproduces the same
//! score and the same reasons in the same order.

use serde::{Deserialize, Serialize};

use super::deal_quality::DealQualityResult;
use super::heuristics::HeuristicSignals;
use super::stats::CategoryStatistics;
use super::validator::ValidationIssue;
use crate::config::EngineConfig;
use crate::domain::product::{decimal_to_f64, ProductObservation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    StatisticalOutlier,
    CriticalDiscount,
    VeryHighDiscount,
    HighDiscount,
    BelowCategoryMedian,
    RoundOriginalPrice,
    InflatedOriginalPrice,
    ExceptionalDealQuality,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspicionReason {
    pub code: ReasonCode,
    pub contribution: f64,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationTier {
    Normal,
    Unusual,
    LikelyTooGood,
    VerySuspicious,
    AlmostCertain,
}

impl RecommendationTier {
    pub fn from_score(score: f64, flagged: bool) -> Self {
        if !flagged {
            return Self::Normal;
        }
        match score {
            s if s >= 80.0 => Self::AlmostCertain,
            s if s >= 70.0 => Self::VerySuspicious,
            s if s >= 60.0 => Self::LikelyTooGood,
            _ => Self::Unusual,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::Normal => "Normal discount range",
            Self::Unusual => "Unusual deal, verify before purchasing",
            Self::LikelyTooGood => "Likely too good to be true, check product details and seller",
            Self::VerySuspicious => "Very suspicious, investigate thoroughly",
            Self::AlmostCertain => "Almost certainly a pricing error or deceptive discount",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspicionResult {
    pub score: f64,
    pub reasons: Vec<SuspicionReason>,
    pub flagged: bool,
    pub recommendation: RecommendationTier,
    /// Human-readable guidance for the tier, carried so report consumers do
    /// not need their own copy of the wording.
    pub recommendation_text: String,
}

impl SuspicionResult {
    fn from_reasons(reasons: Vec<SuspicionReason>, config: &EngineConfig) -> Self {
        let score: f64 = reasons.iter().map(|reason| reason.contribution).sum();
        let flagged = score >= config.flag_threshold;
        let recommendation = RecommendationTier::from_score(score, flagged);
        Self {
            score,
            reasons,
            flagged,
            recommendation,
            recommendation_text: recommendation.message().to_string(),
        }
    }
}

/// Combine statistics, heuristics and deal quality into one suspicion score.
///
/// Products with a structural validation defect or without a positive
/// discount have no discount story to judge and score zero.
pub fn score_suspicion(
    product: &ProductObservation,
    stats: Option<&CategoryStatistics>,
    signals: &HeuristicSignals,
    deal: &DealQualityResult,
    validation: &[ValidationIssue],
    config: &EngineConfig,
) -> SuspicionResult {
    let mut reasons = Vec::new();

    let structural = validation.iter().any(|issue| issue.code.is_structural());
    let discount = product.discount_pct().filter(|pct| *pct > 0.0);
    let (Some(discount), false) = (discount, structural) else {
        return SuspicionResult::from_reasons(reasons, config);
    };
    let weights = &config.weights;

    if let Some(stats) = stats {
        if let Some(z) = stats.discount.z_score(discount) {
            if z > config.z_score_threshold {
                reasons.push(SuspicionReason {
                    code: ReasonCode::StatisticalOutlier,
                    contribution: weights.statistical_outlier,
                    detail: format!(
                        "Discount is {z:.1}σ above category average ({:.1}%)",
                        stats.discount.mean
                    ),
                });
            }
        }
    }

    let tiers = &config.tiers;
    let tier = if discount >= tiers.critical {
        Some((ReasonCode::CriticalDiscount, weights.critical_discount, "Extreme discount"))
    } else if discount >= tiers.very_high {
        Some((ReasonCode::VeryHighDiscount, weights.very_high_discount, "Very high discount"))
    } else if discount >= tiers.high {
        Some((ReasonCode::HighDiscount, weights.high_discount, "High discount"))
    } else {
        None
    };
    if let Some((code, contribution, label)) = tier {
        reasons.push(SuspicionReason {
            code,
            contribution,
            detail: format!("{label}: {discount:.1}%"),
        });
    }

    if let Some(stats) = stats.filter(|stats| stats.has_price_baseline(config.min_category_samples)) {
        let current = product.current_price.map(decimal_to_f64).unwrap_or_default();
        let median = stats.price.median;
        if current < median * config.below_median_ratio {
            reasons.push(SuspicionReason {
                code: ReasonCode::BelowCategoryMedian,
                contribution: weights.below_category_median,
                detail: format!(
                    "Price significantly below category median ({current:.2} vs {median:.2})"
                ),
            });
        }
    }

    if signals.round_original {
        let original = product.original_price.map(decimal_to_f64).unwrap_or_default();
        reasons.push(SuspicionReason {
            code: ReasonCode::RoundOriginalPrice,
            contribution: weights.round_original,
            detail: format!("Suspiciously round original price: {original:.2}"),
        });
    }

    if let Some(ratio) = signals.inflated_original {
        let p90 = stats.map(|stats| stats.price.p90).unwrap_or_default();
        reasons.push(SuspicionReason {
            code: ReasonCode::InflatedOriginalPrice,
            contribution: weights.inflated_original,
            detail: format!(
                "Original price may be inflated ({ratio:.1}x the 90th percentile of {p90:.2})"
            ),
        });
    }

    if deal.score > config.exceptional_deal_quality {
        reasons.push(SuspicionReason {
            code: ReasonCode::ExceptionalDealQuality,
            contribution: weights.exceptional_deal,
            detail: format!("Exceptional deal quality score: {:.0}/100", deal.score),
        });
    }

    SuspicionResult::from_reasons(reasons, config)
}
