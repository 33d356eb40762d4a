//! Structural price checks that need no population context.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::domain::product::ProductObservation;

const HIGH_ERROR_RATE: f64 = 0.5;
const MODERATE_ERROR_RATE: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    MissingPrice,
    InvalidPrice,
    PriceInversion,
    DiscountMismatch,
    ExtremeDiscount,
    ExcessivePrice,
    NegativeDiscount,
    ExcessiveDiscount,
    HighValueExtremeDiscount,
}

impl ValidationCode {
    /// Structural defects leave the product without a usable price pair, so it
    /// is kept out of category statistics.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::MissingPrice | Self::InvalidPrice | Self::PriceInversion)
    }

    pub fn severity(&self) -> ValidationSeverity {
        match self {
            Self::MissingPrice | Self::InvalidPrice => ValidationSeverity::Critical,
            Self::PriceInversion | Self::ExtremeDiscount | Self::ExcessivePrice => {
                ValidationSeverity::High
            }
            Self::DiscountMismatch
            | Self::NegativeDiscount
            | Self::ExcessiveDiscount
            | Self::HighValueExtremeDiscount => ValidationSeverity::Medium,
        }
    }
}

impl std::fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::MissingPrice => "MISSING_PRICE",
            Self::InvalidPrice => "INVALID_PRICE",
            Self::PriceInversion => "PRICE_INVERSION",
            Self::DiscountMismatch => "DISCOUNT_MISMATCH",
            Self::ExtremeDiscount => "EXTREME_DISCOUNT",
            Self::ExcessivePrice => "EXCESSIVE_PRICE",
            Self::NegativeDiscount => "NEGATIVE_DISCOUNT",
            Self::ExcessiveDiscount => "EXCESSIVE_DISCOUNT",
            Self::HighValueExtremeDiscount => "HIGH_VALUE_EXTREME_DISCOUNT",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationSeverity {
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub code: ValidationCode,
    pub severity: ValidationSeverity,
    pub message: String,
}

impl ValidationIssue {
    fn new(code: ValidationCode, message: String) -> Self {
        Self { code, severity: code.severity(), message }
    }
}

/// True when the product has a current price, no negative price and no
/// inverted price pair.
pub fn is_structurally_valid(product: &ProductObservation) -> bool {
    let Some(current) = product.current_price else {
        return false;
    };
    if current < Decimal::ZERO {
        return false;
    }
    match product.original_price {
        Some(original) => original >= Decimal::ZERO && current <= original,
        None => true,
    }
}

/// Check one product's price relationships. Never fails: every defect comes
/// back as an issue and the product still flows through scoring.
pub fn validate_product(
    product: &ProductObservation,
    config: &EngineConfig,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if product.current_price.is_none() {
        issues.push(ValidationIssue::new(
            ValidationCode::MissingPrice,
            "Listing has no current price".to_string(),
        ));
    }

    let mut negative = Vec::new();
    if let Some(current) = product.current_price.filter(|current| *current < Decimal::ZERO) {
        negative.push(format!("current price {current}"));
    }
    if let Some(original) = product.original_price.filter(|original| *original < Decimal::ZERO) {
        negative.push(format!("original price {original}"));
    }
    if !negative.is_empty() {
        issues.push(ValidationIssue::new(
            ValidationCode::InvalidPrice,
            format!("Negative {}", negative.join(" and ")),
        ));
    }

    if let (Some(current), Some(original)) = (product.current_price, product.original_price) {
        if current > original {
            issues.push(ValidationIssue::new(
                ValidationCode::PriceInversion,
                format!(
                    "Current price ({current:.2}) is higher than original price ({original:.2})"
                ),
            ));
        }
    }

    let too_high = [product.current_price, product.original_price]
        .into_iter()
        .flatten()
        .any(|price| price > config.max_price);
    if too_high {
        issues.push(ValidationIssue::new(
            ValidationCode::ExcessivePrice,
            format!("Price exceeds the expected ceiling of {}", config.max_price),
        ));
    }

    if let Some(advertised) = product.advertised_discount_pct {
        if advertised < 0.0 {
            issues.push(ValidationIssue::new(
                ValidationCode::NegativeDiscount,
                format!("Advertised discount is negative: {advertised:.1}%"),
            ));
        } else if advertised > config.implausible_discount_pct {
            issues.push(ValidationIssue::new(
                ValidationCode::ExcessiveDiscount,
                format!(
                    "Advertised discount of {advertised:.1}% is above {:.0}%",
                    config.implausible_discount_pct
                ),
            ));
        }
    }

    if let Some(discount) = product.discount_pct() {
        if let Some(advertised) = product.advertised_discount_pct {
            if (discount - advertised).abs() > config.discount_mismatch_tolerance_pct {
                issues.push(ValidationIssue::new(
                    ValidationCode::DiscountMismatch,
                    format!(
                        "Advertised discount ({advertised:.1}%) differs from calculated ({discount:.1}%)"
                    ),
                ));
            }
        }

        if discount >= config.implausible_discount_pct {
            issues.push(ValidationIssue::new(
                ValidationCode::ExtremeDiscount,
                format!("Implausibly high discount: {discount:.1}%"),
            ));
        }

        let high_value =
            product.original_price.is_some_and(|original| original > config.high_value_price);
        if high_value && discount > config.high_value_discount_pct {
            issues.push(ValidationIssue::new(
                ValidationCode::HighValueExtremeDiscount,
                format!(
                    "High-value item (above {}) with {discount:.1}% discount",
                    config.high_value_price
                ),
            ));
        }
    }

    issues
}

/// Batch roll-up of validation outcomes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub total_products: usize,
    /// Products with no issue at all.
    pub valid_products: usize,
    pub invalid_products: usize,
    pub issues_by_code: BTreeMap<ValidationCode, usize>,
    /// Operator follow-ups derived from the error rate and the issue mix.
    pub recommendations: Vec<String>,
}

impl ValidationSummary {
    pub fn from_issues<'a, I>(per_product: I) -> Self
    where
        I: IntoIterator<Item = &'a [ValidationIssue]>,
    {
        let mut summary = per_product.into_iter().fold(Self::default(), |mut summary, issues| {
            summary.total_products += 1;
            if issues.is_empty() {
                summary.valid_products += 1;
            } else {
                summary.invalid_products += 1;
            }
            for issue in issues {
                *summary.issues_by_code.entry(issue.code).or_default() += 1;
            }
            summary
        });
        summary.recommendations = summary.build_recommendations();
        summary
    }

    pub fn error_rate(&self) -> f64 {
        if self.total_products == 0 {
            return 0.0;
        }
        self.invalid_products as f64 / self.total_products as f64
    }

    fn count(&self, code: ValidationCode) -> usize {
        self.issues_by_code.get(&code).copied().unwrap_or(0)
    }

    fn build_recommendations(&self) -> Vec<String> {
        let mut recommendations = Vec::new();

        let error_rate = self.error_rate();
        if error_rate > HIGH_ERROR_RATE {
            recommendations.push(format!(
                "High error rate ({:.1}%): review the data collection process",
                error_rate * 100.0
            ));
        } else if error_rate > MODERATE_ERROR_RATE {
            recommendations.push(format!(
                "Moderate error rate ({:.1}%): check scraper selectors for recent site changes",
                error_rate * 100.0
            ));
        }

        let missing = self.count(ValidationCode::MissingPrice);
        if missing > 0 {
            recommendations.push(format!("Address {missing} products missing price data"));
        }
        let inverted = self.count(ValidationCode::PriceInversion);
        if inverted > 0 {
            recommendations
                .push(format!("Fix {inverted} products with incorrect price relationships"));
        }
        let excessive = self.count(ValidationCode::ExcessiveDiscount);
        if excessive > 0 {
            recommendations
                .push(format!("Review {excessive} products with unusually high discounts"));
        }

        if recommendations.is_empty() {
            recommendations.push("Data validation completed successfully".to_string());
        }
        recommendations
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::{
        is_structurally_valid, validate_product, ValidationCode, ValidationSeverity,
        ValidationSummary,
    };
    use crate::config::EngineConfig;
    use crate::domain::product::{Category, ProductId, ProductObservation};

    fn product(current: i64, original: Option<i64>, advertised: Option<f64>) -> ProductObservation {
        ProductObservation {
            id: ProductId("V-1".to_string()),
            name: "Blender".to_string(),
            category: Category::Home,
            brand: None,
            current_price: Some(Decimal::new(current, 0)),
            original_price: original.map(|value| Decimal::new(value, 0)),
            advertised_discount_pct: advertised,
            observed_at: Utc::now(),
        }
    }

    fn codes(product: &ProductObservation) -> Vec<ValidationCode> {
        validate_product(product, &EngineConfig::default()).into_iter().map(|i| i.code).collect()
    }

    #[test]
    fn clean_product_has_no_issues() {
        assert!(codes(&product(750, Some(1000), Some(25.0))).is_empty());
        assert!(codes(&product(750, None, None)).is_empty());
    }

    #[test]
    fn negative_prices_are_invalid_and_critical() {
        let issues = validate_product(&product(-5, Some(-10), None), &EngineConfig::default());
        let invalid = issues
            .iter()
            .find(|issue| issue.code == ValidationCode::InvalidPrice)
            .expect("negative prices are reported");

        assert_eq!(invalid.severity, ValidationSeverity::Critical);
        assert!(invalid.message.contains("current price"));
        assert!(invalid.message.contains("original price"));
        assert!(!is_structurally_valid(&product(-5, None, None)));
    }

    #[test]
    fn sale_price_above_original_is_inversion() {
        let inverted = product(1200, Some(1000), None);
        assert_eq!(codes(&inverted), vec![ValidationCode::PriceInversion]);
        assert!(!is_structurally_valid(&inverted));
    }

    #[test]
    fn advertised_badge_outside_tolerance_is_mismatch() {
        // computed 25%, badge 30%
        assert_eq!(codes(&product(750, Some(1000), Some(30.0))), vec![ValidationCode::DiscountMismatch]);
        // within 2 percentage points
        assert!(codes(&product(750, Some(1000), Some(26.5))).is_empty());
    }

    #[test]
    fn extreme_discount_starts_at_ceiling() {
        assert_eq!(codes(&product(50, Some(1000), None)), vec![ValidationCode::ExtremeDiscount]);
        assert!(codes(&product(51, Some(1000), None)).is_empty());
    }

    #[test]
    fn prices_above_ceiling_are_excessive() {
        let issues = codes(&product(150_000, Some(200_000), None));
        assert_eq!(issues, vec![ValidationCode::ExcessivePrice]);
        assert!(is_structurally_valid(&product(150_000, Some(200_000), None)));
    }

    #[test]
    fn summary_counts_products_and_issue_codes() {
        let config = EngineConfig::default();
        let batch = [
            product(100, Some(200), None),
            product(300, Some(200), None),
            product(-5, Some(200), Some(10.0)),
        ];
        let issues: Vec<_> = batch.iter().map(|p| validate_product(p, &config)).collect();

        let summary = ValidationSummary::from_issues(issues.iter().map(Vec::as_slice));

        assert_eq!(summary.total_products, 3);
        assert_eq!(summary.valid_products, 1);
        assert_eq!(summary.invalid_products, 2);
        assert_eq!(summary.issues_by_code.get(&ValidationCode::PriceInversion), Some(&1));
        assert_eq!(summary.issues_by_code.get(&ValidationCode::InvalidPrice), Some(&1));
        assert!((summary.error_rate() - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(
            summary.recommendations,
            vec![
                "High error rate (66.7%): review the data collection process".to_string(),
                "Fix 1 products with incorrect price relationships".to_string(),
            ]
        );
    }

    #[test]
    fn empty_summary_has_zero_rate() {
        let summary = ValidationSummary::from_issues(std::iter::empty());
        assert_eq!(summary.total_products, 0);
        assert_eq!(summary.error_rate(), 0.0);
        assert_eq!(summary.recommendations, vec!["Data validation completed successfully".to_string()]);
    }

    #[test]
    fn missing_current_price_is_critical_and_structural() {
        let mut listing = product(0, Some(1000), Some(20.0));
        listing.current_price = None;

        let issues = validate_product(&listing, &EngineConfig::default());

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, ValidationCode::MissingPrice);
        assert_eq!(issues[0].severity, ValidationSeverity::Critical);
        assert!(issues[0].code.is_structural());
        assert!(!is_structurally_valid(&listing));
    }

    #[test]
    fn advertised_badge_must_stay_in_range() {
        let negative = product(750, None, Some(-5.0));
        assert_eq!(codes(&negative), vec![ValidationCode::NegativeDiscount]);

        let excessive = product(750, None, Some(97.0));
        assert_eq!(codes(&excessive), vec![ValidationCode::ExcessiveDiscount]);
    }

    #[test]
    fn high_value_item_with_deep_discount_is_flagged() {
        // 85% off a 2000 list price: below the extreme ceiling, above the high-value cut
        assert_eq!(
            codes(&product(300, Some(2000), None)),
            vec![ValidationCode::HighValueExtremeDiscount]
        );
        // same depth on a cheap item is fine
        assert!(codes(&product(30, Some(200), None)).is_empty());
        // high value but ordinary discount
        assert!(codes(&product(1500, Some(2000), None)).is_empty());
    }

    #[test]
    fn moderate_error_rate_lists_issue_specific_followups() {
        let config = EngineConfig::default();
        let mut missing = product(0, Some(100), None);
        missing.current_price = None;
        let batch = [
            missing,
            product(750, None, Some(97.0)),
            product(10, Some(20), None),
            product(10, Some(20), None),
            product(10, Some(20), None),
            product(10, Some(20), None),
            product(10, Some(20), None),
            product(10, Some(20), None),
        ];
        let issues: Vec<_> = batch.iter().map(|p| validate_product(p, &config)).collect();

        let summary = ValidationSummary::from_issues(issues.iter().map(Vec::as_slice));

        assert_eq!(summary.invalid_products, 2);
        assert_eq!(
            summary.recommendations,
            vec![
                "Moderate error rate (25.0%): check scraper selectors for recent site changes"
                    .to_string(),
                "Address 1 products missing price data".to_string(),
                "Review 1 products with unusually high discounts".to_string(),
            ]
        );
    }
}
