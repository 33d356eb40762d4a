//! Anomaly detection over a single product.
//!
//! Five detectors run side by side. Each one is a pure function of the
//! product, its category statistics, the heuristic signals and the
//! configuration, and yields at most one finding of its own kind. The
//! detectors do not know about each other; a product may carry several
//! findings and nothing here ranks or reconciles them.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::heuristics::HeuristicSignals;
use super::stats::CategoryStatistics;
use crate::config::EngineConfig;
use crate::domain::product::{decimal_to_f64, ProductId, ProductObservation};

const IQR_MIN_SAMPLES: usize = 4;
const COLLAPSED_PRICE_CEILING: f64 = 50.0;
const COLLAPSED_ORIGINAL_FLOOR: f64 = 500.0;

// ---------------------------------------------------------------------------
// Findings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyKind {
    StatisticalOutlier,
    IqrOutlier,
    FakeDiscount,
    TooGoodToBeTrue,
    PriceManipulation,
}

impl AnomalyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StatisticalOutlier => "STATISTICAL_OUTLIER",
            Self::IqrOutlier => "IQR_OUTLIER",
            Self::FakeDiscount => "FAKE_DISCOUNT",
            Self::TooGoodToBeTrue => "TOO_GOOD_TO_BE_TRUE",
            Self::PriceManipulation => "PRICE_MANIPULATION",
        }
    }
}

impl std::fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyFinding {
    pub product_id: ProductId,
    pub product_name: String,
    pub kind: AnomalyKind,
    /// In `0.0..=1.0`.
    pub confidence: f64,
    pub description: String,
    pub evidence: Vec<String>,
    pub recommendation: String,
}

/// Recommendation wording for the statistical detectors, by confidence band.
pub fn recommendation_for_confidence(confidence: f64) -> &'static str {
    match confidence {
        c if c >= 0.9 => "CRITICAL: Extremely unusual pricing, likely an error or a scam",
        c if c >= 0.8 => "HIGH RISK: Very suspicious pricing, verify before purchasing",
        c if c >= 0.7 => "SUSPICIOUS: Unusual pricing pattern detected, investigate further",
        c if c >= 0.6 => "CAUTION: Pricing deviates from the category norm",
        _ => "NOTICE: Minor pricing irregularity",
    }
}

// ---------------------------------------------------------------------------
// Detectors
// ---------------------------------------------------------------------------

/// Inputs shared by every detector for one product.
#[derive(Debug, Clone, Copy)]
pub struct DetectionContext<'a> {
    pub product: &'a ProductObservation,
    pub discount_pct: f64,
    pub stats: Option<&'a CategoryStatistics>,
    pub signals: &'a HeuristicSignals,
    pub config: &'a EngineConfig,
}

impl DetectionContext<'_> {
    fn finding(
        &self,
        kind: AnomalyKind,
        confidence: f64,
        description: String,
        evidence: Vec<String>,
        recommendation: &str,
    ) -> AnomalyFinding {
        AnomalyFinding {
            product_id: self.product.id.clone(),
            product_name: self.product.name.clone(),
            kind,
            confidence: confidence.clamp(0.0, 1.0),
            description,
            evidence,
            recommendation: recommendation.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detector {
    StatisticalOutlier,
    IqrOutlier,
    FakeDiscount,
    TooGoodToBeTrue,
    PriceManipulation,
}

impl Detector {
    pub const ALL: [Detector; 5] = [
        Detector::StatisticalOutlier,
        Detector::IqrOutlier,
        Detector::FakeDiscount,
        Detector::TooGoodToBeTrue,
        Detector::PriceManipulation,
    ];

    pub fn run(&self, ctx: &DetectionContext<'_>) -> Option<AnomalyFinding> {
        match self {
            Self::StatisticalOutlier => detect_statistical_outlier(ctx),
            Self::IqrOutlier => detect_iqr_outlier(ctx),
            Self::FakeDiscount => detect_fake_discount(ctx),
            Self::TooGoodToBeTrue => detect_too_good_to_be_true(ctx),
            Self::PriceManipulation => detect_price_manipulation(ctx),
        }
    }
}

/// Run every detector and keep the findings at or above `min_confidence`.
pub fn detect_anomalies(
    product: &ProductObservation,
    stats: Option<&CategoryStatistics>,
    signals: &HeuristicSignals,
    config: &EngineConfig,
) -> Vec<AnomalyFinding> {
    let Some(discount_pct) = product.discount_pct().filter(|pct| *pct > 0.0) else {
        return Vec::new();
    };
    let ctx = DetectionContext { product, discount_pct, stats, signals, config };

    Detector::ALL.iter().fold(Vec::new(), |mut findings, detector| {
        if let Some(finding) = detector.run(&ctx) {
            if finding.confidence >= config.min_confidence {
                findings.push(finding);
            } else {
                debug!(
                    event_name = "analysis.anomaly.below_min_confidence",
                    product_id = %product.id,
                    kind = %finding.kind,
                    confidence = finding.confidence,
                    "finding dropped below minimum confidence"
                );
            }
        }
        findings
    })
}

pub fn detect_statistical_outlier(ctx: &DetectionContext<'_>) -> Option<AnomalyFinding> {
    let stats = ctx.stats?;
    let Some(z) = stats.discount.z_score(ctx.discount_pct) else {
        debug!(
            event_name = "analysis.anomaly.z_score_suppressed",
            product_id = %ctx.product.id,
            category = %stats.category,
            samples = stats.discount.sample_count,
            "discount deviation undefined for category"
        );
        return None;
    };
    if z <= ctx.config.z_score_threshold {
        return None;
    }

    let confidence = (z / (ctx.config.z_score_threshold * 2.0)).min(1.0);
    Some(ctx.finding(
        AnomalyKind::StatisticalOutlier,
        confidence,
        format!(
            "Discount of {:.1}% is {z:.1} standard deviations from the {} average",
            ctx.discount_pct, stats.category
        ),
        vec![
            format!("z-score: {z:.2}"),
            format!("category mean discount: {:.1}%", stats.discount.mean),
            format!("category samples: {}", stats.discount.sample_count),
        ],
        recommendation_for_confidence(confidence),
    ))
}

pub fn detect_iqr_outlier(ctx: &DetectionContext<'_>) -> Option<AnomalyFinding> {
    let stats = ctx.stats?;
    let Some((lower, upper)) = stats.discount.iqr_bounds(ctx.config.iqr_multiplier, IQR_MIN_SAMPLES)
    else {
        debug!(
            event_name = "analysis.anomaly.iqr_suppressed",
            product_id = %ctx.product.id,
            category = %stats.category,
            samples = stats.discount.sample_count,
            "too few discount samples for IQR bounds"
        );
        return None;
    };

    let iqr = stats.discount.iqr();
    if iqr <= f64::EPSILON {
        debug!(
            event_name = "analysis.anomaly.iqr_suppressed",
            product_id = %ctx.product.id,
            category = %stats.category,
            samples = stats.discount.sample_count,
            "category discounts have no interquartile spread"
        );
        return None;
    }

    let beyond = if ctx.discount_pct > upper {
        ctx.discount_pct - upper
    } else if ctx.discount_pct < lower {
        lower - ctx.discount_pct
    } else {
        return None;
    };
    let deviation = beyond / iqr;
    let confidence = (0.5 + deviation * 0.2).min(1.0);

    Some(ctx.finding(
        AnomalyKind::IqrOutlier,
        confidence,
        format!(
            "Discount of {:.1}% lies outside the {} interquartile fence [{lower:.1}%, {upper:.1}%]",
            ctx.discount_pct, stats.category
        ),
        vec![
            format!("Q1: {:.1}%, Q3: {:.1}%", stats.discount.q1, stats.discount.q3),
            format!("IQR deviation: {deviation:.2}"),
        ],
        recommendation_for_confidence(confidence),
    ))
}

pub fn detect_fake_discount(ctx: &DetectionContext<'_>) -> Option<AnomalyFinding> {
    let signals = ctx.signals;
    if signals.fake_discount_agreement() < 2 {
        return None;
    }

    let mut weight: f64 = 0.0;
    let mut evidence = Vec::new();
    let original = ctx.product.original_price.map(decimal_to_f64).unwrap_or_default();
    if signals.round_original {
        weight += 0.20;
        evidence.push(format!("original price {original:.2} is a round number"));
    }
    if signals.price_doubling {
        weight += 0.25;
        evidence.push("original price is double the current price".to_string());
    }
    if let Some(ratio) = signals.inflated_original {
        weight += 0.35;
        evidence.push(format!("original price is {ratio:.1}x the category 90th percentile"));
    }
    if signals.average_after_discount {
        weight += 0.35;
        evidence.push(format!(
            "{:.1}% discount still lands in the category's typical price range",
            ctx.discount_pct
        ));
    }

    Some(ctx.finding(
        AnomalyKind::FakeDiscount,
        (0.2 + weight).min(1.0),
        format!(
            "Advertised original price of {original:.2} looks fabricated ({} indicators agree)",
            signals.fake_discount_agreement()
        ),
        evidence,
        "Check the price history to confirm the original price was ever charged",
    ))
}

pub fn detect_too_good_to_be_true(ctx: &DetectionContext<'_>) -> Option<AnomalyFinding> {
    let config = ctx.config;
    if ctx.discount_pct < config.tiers.critical {
        return None;
    }

    let product = ctx.product;
    let savings = decimal_to_f64(product.savings());
    let current = product.current_price.map(decimal_to_f64).unwrap_or_default();
    let original = product.original_price.map(decimal_to_f64).unwrap_or_default();
    let large_savings = savings >= config.tgtbt_savings_floor;
    let premium = is_premium(product, config);
    if !large_savings && !premium {
        return None;
    }

    let mut confidence: f64 = 0.4 + (ctx.discount_pct - config.tiers.critical) / 100.0;
    let mut evidence = vec![format!("discount: {:.1}%", ctx.discount_pct)];
    if savings >= config.tgtbt_savings_floor * 2.5 {
        confidence += 0.3;
        evidence.push(format!("savings of {savings:.2} far exceed the usual range"));
    } else if large_savings {
        confidence += 0.2;
        evidence.push(format!("savings of {savings:.2}"));
    }
    if premium {
        confidence += 0.2;
        evidence.push("premium brand or category rarely discounted this deeply".to_string());
    }
    if current < COLLAPSED_PRICE_CEILING && original > COLLAPSED_ORIGINAL_FLOOR {
        confidence += 0.15;
        evidence.push(format!("price collapsed from {original:.2} to {current:.2}"));
    }

    Some(ctx.finding(
        AnomalyKind::TooGoodToBeTrue,
        confidence.min(1.0),
        format!(
            "{:.1}% off {original:.2} is implausible for legitimate pricing",
            ctx.discount_pct
        ),
        evidence,
        "Likely a pricing error or scam listing, verify the seller before purchasing",
    ))
}

pub fn detect_price_manipulation(ctx: &DetectionContext<'_>) -> Option<AnomalyFinding> {
    let signals = ctx.signals;
    if !signals.price_doubling && signals.round_discount.is_none() {
        return None;
    }

    let mut confidence: f64 = 0.4;
    let mut evidence = Vec::new();
    if signals.price_doubling {
        confidence += 0.3;
        evidence.push("original price set at double the sale price".to_string());
    }
    if let Some(target) = signals.round_discount {
        confidence += 0.2;
        evidence.push(format!(
            "discount of {:.1}% matches the marketing figure {target}%",
            ctx.discount_pct
        ));
    }
    if signals.charm_ending {
        confidence += 0.15;
        evidence.push("charm-priced original against a whole-number sale price".to_string());
    }

    Some(ctx.finding(
        AnomalyKind::PriceManipulation,
        confidence.min(1.0),
        "Discount follows a deliberate pricing template".to_string(),
        evidence,
        "Treat the advertised discount as a marketing figure, not a real saving",
    ))
}

fn is_premium(product: &ProductObservation, config: &EngineConfig) -> bool {
    let brand_match = product.brand.as_deref().is_some_and(|brand| {
        let brand = brand.trim().to_lowercase();
        config.premium_brands.iter().any(|premium| premium.to_lowercase() == brand)
    });
    brand_match || config.premium_categories.contains(&product.category)
}
