//! Batch scoring engine.
//!
//! `DealAnalyzer` builds category statistics once per batch, then scores each
//! product independently on the rayon pool. Nothing is shared between batches
//! and the configuration is only ever read.

pub mod anomaly;
pub mod deal_quality;
pub mod heuristics;
pub mod stats;
pub mod summary;
pub mod suspicion;
pub mod validator;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use self::anomaly::{detect_anomalies, AnomalyFinding};
use self::deal_quality::{score_deal, DealQualityResult};
use self::heuristics::HeuristicSignals;
use self::stats::{build_category_statistics, StatisticsMap};
use self::summary::BatchSummary;
use self::suspicion::{score_suspicion, SuspicionResult};
use self::validator::{validate_product, ValidationIssue};
use crate::config::{ConfigError, EngineConfig};
use crate::domain::product::{Category, ProductId, ProductObservation};

/// Everything the engine concluded about one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductAssessment {
    pub product_id: ProductId,
    pub product_name: String,
    pub category: Category,
    /// `None` when the product has no usable price pair.
    pub discount_pct: Option<f64>,
    pub validation: Vec<ValidationIssue>,
    pub signals: HeuristicSignals,
    pub deal_quality: DealQualityResult,
    pub suspicion: SuspicionResult,
    pub findings: Vec<AnomalyFinding>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub statistics: StatisticsMap,
    /// In input order.
    pub assessments: Vec<ProductAssessment>,
    pub summary: BatchSummary,
}

impl BatchReport {
    pub fn assessment(&self, id: &ProductId) -> Option<&ProductAssessment> {
        self.assessments.iter().find(|assessment| &assessment.product_id == id)
    }

    pub fn findings(&self) -> impl Iterator<Item = &AnomalyFinding> {
        self.assessments.iter().flat_map(|assessment| assessment.findings.iter())
    }

    /// Flagged products, highest suspicion first. Ties keep input order.
    pub fn suspicious_deals(&self) -> Vec<&ProductAssessment> {
        let mut flagged: Vec<&ProductAssessment> =
            self.assessments.iter().filter(|assessment| assessment.suspicion.flagged).collect();
        flagged.sort_by(|left, right| right.suspicion.score.total_cmp(&left.suspicion.score));
        flagged
    }
}

#[derive(Debug, Clone)]
pub struct DealAnalyzer {
    config: EngineConfig,
}

impl DealAnalyzer {
    /// Rejects an invalid configuration before any batch can be scored.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn analyze(&self, batch: &[ProductObservation]) -> BatchReport {
        if batch.is_empty() {
            warn!(event_name = "analysis.batch.empty", "analysis requested for an empty batch");
        }

        let statistics = build_category_statistics(batch);
        let assessments: Vec<ProductAssessment> =
            batch.par_iter().map(|product| self.assess(product, &statistics)).collect();
        let summary = BatchSummary::from_assessments(&assessments);

        info!(
            event_name = "analysis.batch.completed",
            products = summary.total_products,
            categories = statistics.len(),
            discounted = summary.discounted_products,
            flagged = summary.flagged_products,
            findings = summary.findings_by_kind.values().sum::<usize>(),
            invalid = summary.validation.invalid_products,
            "batch analysis completed"
        );

        BatchReport { statistics, assessments, summary }
    }

    /// Score one product against prebuilt statistics.
    pub fn assess(
        &self,
        product: &ProductObservation,
        statistics: &StatisticsMap,
    ) -> ProductAssessment {
        let config = &self.config;
        let stats = statistics.get(&product.category);

        let validation = validate_product(product, config);
        let signals = heuristics::evaluate(product, stats, config);
        let deal_quality = score_deal(product, stats, config);
        let suspicion = score_suspicion(product, stats, &signals, &deal_quality, &validation, config);
        let findings = detect_anomalies(product, stats, &signals, config);

        ProductAssessment {
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            category: product.category,
            discount_pct: product.discount_pct(),
            validation,
            signals,
            deal_quality,
            suspicion,
            findings,
        }
    }
}
