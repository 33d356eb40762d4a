//! Batch-level roll-up of a scored batch.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::anomaly::AnomalyKind;
use super::stats::percentile;
use super::validator::ValidationSummary;
use super::ProductAssessment;

const BUCKETS: [(&str, f64, Option<f64>); 6] = [
    ("0-10%", 0.0, Some(10.0)),
    ("10-25%", 10.0, Some(25.0)),
    ("25-50%", 25.0, Some(50.0)),
    ("50-75%", 50.0, Some(75.0)),
    ("75-90%", 75.0, Some(90.0)),
    ("90%+", 90.0, None),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountBucket {
    pub label: String,
    pub lower_pct: f64,
    /// Exclusive; `None` for the open-ended top bucket.
    pub upper_pct: Option<f64>,
    pub count: usize,
}

impl DiscountBucket {
    fn contains(&self, discount_pct: f64) -> bool {
        discount_pct >= self.lower_pct && self.upper_pct.map_or(true, |upper| discount_pct < upper)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_products: usize,
    /// Products with a positive discount.
    pub discounted_products: usize,
    pub average_discount_pct: Option<f64>,
    pub median_discount_pct: Option<f64>,
    pub max_discount_pct: Option<f64>,
    pub discount_distribution: Vec<DiscountBucket>,
    pub flagged_products: usize,
    pub findings_by_kind: BTreeMap<AnomalyKind, usize>,
    pub validation: ValidationSummary,
}

impl BatchSummary {
    pub fn from_assessments(assessments: &[ProductAssessment]) -> Self {
        let mut discounts: Vec<f64> = assessments
            .iter()
            .filter_map(|assessment| assessment.discount_pct)
            .filter(|pct| *pct > 0.0)
            .collect();
        discounts.sort_by(f64::total_cmp);

        let mut distribution: Vec<DiscountBucket> = BUCKETS
            .iter()
            .map(|(label, lower_pct, upper_pct)| DiscountBucket {
                label: (*label).to_string(),
                lower_pct: *lower_pct,
                upper_pct: *upper_pct,
                count: 0,
            })
            .collect();
        for discount in &discounts {
            if let Some(bucket) = distribution.iter_mut().find(|bucket| bucket.contains(*discount)) {
                bucket.count += 1;
            }
        }

        let mut findings_by_kind = BTreeMap::new();
        for finding in assessments.iter().flat_map(|assessment| &assessment.findings) {
            *findings_by_kind.entry(finding.kind).or_insert(0) += 1;
        }

        let (average_discount_pct, median_discount_pct, max_discount_pct) = if discounts.is_empty() {
            (None, None, None)
        } else {
            (
                Some(discounts.iter().sum::<f64>() / discounts.len() as f64),
                Some(percentile(&discounts, 0.5)),
                discounts.last().copied(),
            )
        };

        Self {
            total_products: assessments.len(),
            discounted_products: discounts.len(),
            average_discount_pct,
            median_discount_pct,
            max_discount_pct,
            discount_distribution: distribution,
            flagged_products: assessments
                .iter()
                .filter(|assessment| assessment.suspicion.flagged)
                .count(),
            findings_by_kind,
            validation: ValidationSummary::from_issues(
                assessments.iter().map(|assessment| assessment.validation.as_slice()),
            ),
        }
    }

    pub fn bucket(&self, label: &str) -> Option<&DiscountBucket> {
        self.discount_distribution.iter().find(|bucket| bucket.label == label)
    }
}
