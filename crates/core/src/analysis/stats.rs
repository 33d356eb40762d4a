//! Per-category population statistics for one batch.
//!
//! Built once per run and shared read-only with every per-product check.
//! Only structurally valid products contribute; everything else is still
//! scored individually but never skews the baseline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::validator::is_structurally_valid;
use crate::domain::product::{decimal_to_f64, Category, ProductObservation};

pub type StatisticsMap = BTreeMap<Category, CategoryStatistics>;

/// Distribution of discount percentages among products carrying an original price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountDistribution {
    pub sample_count: usize,
    pub mean: f64,
    /// Population standard deviation; `None` with fewer than two samples.
    pub std_dev: Option<f64>,
    pub q1: f64,
    pub q3: f64,
}

impl DiscountDistribution {
    /// Signed z-score of `discount_pct`. `None` when the deviation is
    /// undefined or zero, which suppresses z-based checks for the category.
    pub fn z_score(&self, discount_pct: f64) -> Option<f64> {
        let std_dev = self.std_dev?;
        if std_dev <= f64::EPSILON {
            return None;
        }
        Some((discount_pct - self.mean) / std_dev)
    }

    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }

    /// `[Q1 - k*IQR, Q3 + k*IQR]`, or `None` below `min_samples`.
    pub fn iqr_bounds(&self, multiplier: f64, min_samples: usize) -> Option<(f64, f64)> {
        if self.sample_count < min_samples {
            return None;
        }
        let iqr = self.iqr();
        Some((self.q1 - multiplier * iqr, self.q3 + multiplier * iqr))
    }
}

/// Current-price percentiles within a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceDistribution {
    pub sample_count: usize,
    pub p10: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
    pub p90: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStatistics {
    pub category: Category,
    /// Every product of the category in the batch, valid or not.
    pub product_count: usize,
    pub discount: DiscountDistribution,
    pub price: PriceDistribution,
}

impl CategoryStatistics {
    /// True when enough priced products exist for price-positioning checks.
    pub fn has_price_baseline(&self, min_samples: usize) -> bool {
        self.price.sample_count >= min_samples && self.price.median > 0.0
    }
}

/// Build statistics for every category present in `batch`. Pure and idempotent.
pub fn build_category_statistics(batch: &[ProductObservation]) -> StatisticsMap {
    let mut grouped: BTreeMap<Category, Vec<&ProductObservation>> = BTreeMap::new();
    for product in batch {
        grouped.entry(product.category).or_default().push(product);
    }

    grouped
        .into_iter()
        .map(|(category, products)| {
            let stats = category_statistics(category, &products);
            debug!(
                event_name = "analysis.stats.category_built",
                category = %category,
                products = stats.product_count,
                price_samples = stats.price.sample_count,
                discount_samples = stats.discount.sample_count,
                std_defined = stats.discount.std_dev.is_some(),
                "category statistics built"
            );
            (category, stats)
        })
        .collect()
}

fn category_statistics(category: Category, products: &[&ProductObservation]) -> CategoryStatistics {
    let valid: Vec<&ProductObservation> =
        products.iter().copied().filter(|product| is_structurally_valid(product)).collect();

    let mut discounts: Vec<f64> = valid.iter().filter_map(|product| product.discount_pct()).collect();
    let mut prices: Vec<f64> =
        valid.iter().filter_map(|product| product.current_price.map(decimal_to_f64)).collect();

    sort_f64(&mut discounts);
    sort_f64(&mut prices);

    let mean = mean(&discounts);
    let std_dev = (discounts.len() >= 2).then(|| population_std_dev(&discounts, mean));

    CategoryStatistics {
        category,
        product_count: products.len(),
        discount: DiscountDistribution {
            sample_count: discounts.len(),
            mean,
            std_dev,
            q1: percentile(&discounts, 0.25),
            q3: percentile(&discounts, 0.75),
        },
        price: PriceDistribution {
            sample_count: prices.len(),
            p10: percentile(&prices, 0.10),
            p25: percentile(&prices, 0.25),
            median: percentile(&prices, 0.50),
            p75: percentile(&prices, 0.75),
            p90: percentile(&prices, 0.90),
        },
    }
}

fn sort_f64(values: &mut [f64]) {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std_dev(values: &[f64], mean: f64) -> f64 {
    let variance =
        values.iter().map(|value| (value - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Linear interpolation between closest ranks over an ascending slice.
/// Returns 0.0 for an empty slice.
pub(crate) fn percentile(sorted: &[f64], quantile: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        len => {
            let position = quantile.clamp(0.0, 1.0) * (len - 1) as f64;
            let lower = position.floor() as usize;
            let upper = position.ceil() as usize;
            let weight = position - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * weight
        }
    }
}
