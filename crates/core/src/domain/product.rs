use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::EngineError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId(pub String);

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Electronics,
    Home,
    Fashion,
    Sports,
    Other,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Category::Electronics => "electronics",
            Category::Home => "home",
            Category::Fashion => "fashion",
            Category::Sports => "sports",
            Category::Other => "other",
        };
        write!(f, "{s}")
    }
}

/// One scraped snapshot of a listing. The engine reads these and never mutates them.
///
/// `original_price` is the claimed "before" price and is untrusted; whether it
/// is plausible is exactly what the analysis decides.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductObservation {
    pub id: ProductId,
    pub name: String,
    pub category: Category,
    #[serde(default)]
    pub brand: Option<String>,
    /// Absent when the scraper could not read a price; reported as MISSING_PRICE.
    #[serde(default)]
    pub current_price: Option<Decimal>,
    #[serde(default)]
    pub original_price: Option<Decimal>,
    /// Discount badge shown on the listing, if the scraper captured one.
    #[serde(default)]
    pub advertised_discount_pct: Option<f64>,
    pub observed_at: DateTime<Utc>,
}

impl ProductObservation {
    /// `(current, original)` when the listing carries a usable price pair:
    /// both prices non-negative, a positive original and `current <= original`.
    pub fn price_pair(&self) -> Option<(Decimal, Decimal)> {
        let (current, original) = (self.current_price?, self.original_price?);
        (current >= Decimal::ZERO && original > Decimal::ZERO && current <= original)
            .then_some((current, original))
    }

    pub fn has_valid_price_pair(&self) -> bool {
        self.price_pair().is_some()
    }

    /// `(original - current) / original * 100`, or `None` when no valid price
    /// pair exists or the arithmetic leaves the `Decimal` range.
    pub fn discount_pct(&self) -> Option<f64> {
        let (current, original) = self.price_pair()?;
        let pct = original
            .checked_sub(current)?
            .checked_mul(Decimal::ONE_HUNDRED)?
            .checked_div(original)?;
        Some(decimal_to_f64(pct))
    }

    /// Absolute savings in currency units, zero when there is no valid price pair.
    pub fn savings(&self) -> Decimal {
        self.price_pair()
            .and_then(|(current, original)| original.checked_sub(current))
            .unwrap_or(Decimal::ZERO)
    }

    /// True when the listing advertises a real price reduction.
    pub fn is_discounted(&self) -> bool {
        self.discount_pct().is_some_and(|pct| pct > 0.0)
    }
}

/// Parse a JSON array of observations as produced by the ingestion layer.
pub fn parse_batch(raw: &str) -> Result<Vec<ProductObservation>, EngineError> {
    Ok(serde_json::from_str(raw)?)
}

pub(crate) fn decimal_to_f64(d: Decimal) -> f64 {
    use rust_decimal::prelude::ToPrimitive;
    d.to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::{parse_batch, Category, ProductId, ProductObservation};

    fn observation(current: i64, original: Option<i64>) -> ProductObservation {
        ProductObservation {
            id: ProductId("P-1".to_string()),
            name: "Espresso Machine".to_string(),
            category: Category::Home,
            brand: None,
            current_price: Some(Decimal::new(current, 0)),
            original_price: original.map(|value| Decimal::new(value, 0)),
            advertised_discount_pct: None,
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn discount_is_computed_from_price_pair() {
        let product = observation(750, Some(1000));
        let pct = product.discount_pct().expect("valid pair");
        assert!((pct - 25.0).abs() < 1e-9);
        assert_eq!(product.savings(), Decimal::new(250, 0));
        assert!(product.is_discounted());
    }

    #[test]
    fn missing_or_inverted_original_has_no_discount() {
        assert_eq!(observation(500, None).discount_pct(), None);
        assert_eq!(observation(1200, Some(1000)).discount_pct(), None);
        assert_eq!(observation(1200, Some(1000)).savings(), Decimal::ZERO);
    }

    #[test]
    fn equal_prices_are_not_discounted() {
        let product = observation(999, Some(999));
        assert_eq!(product.discount_pct(), Some(0.0));
        assert!(!product.is_discounted());
    }

    #[test]
    fn parses_batch_with_optional_fields_omitted() {
        let raw = r#"[
            {
                "id": "SKU-1",
                "name": "Running Shoes",
                "category": "sports",
                "current_price": "499.95",
                "observed_at": "2026-01-15T10:00:00Z"
            }
        ]"#;

        let batch = parse_batch(raw).expect("batch should parse");
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].category, Category::Sports);
        assert_eq!(batch[0].original_price, None);
        assert_eq!(batch[0].current_price, Some(Decimal::new(49995, 2)));
    }

    #[test]
    fn rejects_unknown_category() {
        let raw = r#"[{"id":"x","name":"x","category":"garden","current_price":"1","observed_at":"2026-01-15T10:00:00Z"}]"#;
        assert!(parse_batch(raw).is_err());
    }

    #[test]
    fn record_without_current_price_still_parses() {
        let raw = r#"[
            {"id": "A", "name": "Lamp", "category": "home", "original_price": "80",
             "observed_at": "2026-01-15T10:00:00Z"},
            {"id": "B", "name": "Rug", "category": "home", "current_price": "60",
             "original_price": "80", "observed_at": "2026-01-15T10:00:00Z"}
        ]"#;

        let batch = parse_batch(raw).expect("batch should parse");
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].current_price, None);
        assert_eq!(batch[0].discount_pct(), None);
        assert_eq!(batch[0].savings(), Decimal::ZERO);
        assert!(batch[1].is_discounted());
    }

    #[test]
    fn overflowing_price_pair_has_no_discount() {
        let mut product = observation(1, None);
        product.original_price = Some(Decimal::MAX);

        assert_eq!(product.discount_pct(), None);
        assert!(!product.is_discounted());
        assert_eq!(product.savings(), Decimal::MAX - Decimal::ONE);
    }
}
