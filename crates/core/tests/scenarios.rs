use chrono::{TimeZone, Utc};
use pricewatch_core::{
    AnomalyKind, BatchReport, Category, DealAnalyzer, DealQualityTier, EngineConfig,
    ProductAssessment, ProductId, ProductObservation, RecommendationTier, ValidationCode,
};
use rust_decimal::Decimal;

type ScenarioResult<T = ()> = Result<T, String>;

macro_rules! require {
    ($cond:expr) => {
        if !$cond {
            return Err(format!("assertion failed: `{}`", stringify!($cond)));
        }
    };
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($($arg)*));
        }
    };
}

macro_rules! require_eq {
    ($left:expr, $right:expr) => {
        if $left != $right {
            return Err(format!(
                "assertion failed: `left == right` (`{:?}` != `{:?}`)",
                $left,
                $right
            ));
        }
    };
}

fn observation(
    id: &str,
    category: Category,
    current: Decimal,
    original: Option<Decimal>,
) -> ProductObservation {
    ProductObservation {
        id: ProductId(id.to_string()),
        name: format!("Listing {id}"),
        category,
        brand: None,
        current_price: Some(current),
        original_price: original,
        advertised_discount_pct: None,
        observed_at: Utc.with_ymd_and_hms(2024, 11, 29, 8, 0, 0).single().unwrap_or_default(),
    }
}

fn whole(value: i64) -> Decimal {
    Decimal::new(value, 0)
}

fn analyzer() -> ScenarioResult<DealAnalyzer> {
    DealAnalyzer::new(EngineConfig::default()).map_err(|error| error.to_string())
}

fn assessment<'a>(report: &'a BatchReport, id: &str) -> ScenarioResult<&'a ProductAssessment> {
    report
        .assessment(&ProductId(id.to_string()))
        .ok_or_else(|| format!("assessment for {id} should be present"))
}

fn has_finding(assessment: &ProductAssessment, kind: AnomalyKind) -> bool {
    assessment.findings.iter().any(|finding| finding.kind == kind)
}

/// Twenty electronics listings discounted 20-30%, plus one at 92% off a
/// charm-priced 2999.
fn electronics_batch() -> Vec<ProductObservation> {
    let mut batch: Vec<ProductObservation> = (0..20)
        .map(|index| {
            let original = whole(800 + 25 * index);
            let discount = 20 + index % 11;
            let current = original * whole(100 - discount) / Decimal::ONE_HUNDRED;
            observation(&format!("EL-{index:02}"), Category::Electronics, current, Some(original))
        })
        .collect();
    batch.push(observation("EL-OUTLIER", Category::Electronics, whole(239), Some(whole(2999))));
    batch
}

#[test]
fn scenario_extreme_discount_among_normal_electronics_is_flagged() -> ScenarioResult {
    let report = analyzer()?.analyze(&electronics_batch());
    let outlier = assessment(&report, "EL-OUTLIER")?;

    require!(outlier.suspicion.flagged, "outlier should be flagged");
    require!(outlier.suspicion.score >= 70.0, "score was {}", outlier.suspicion.score);
    require_eq!(outlier.suspicion.recommendation, RecommendationTier::AlmostCertain);
    require!(has_finding(outlier, AnomalyKind::StatisticalOutlier));
    require!(has_finding(outlier, AnomalyKind::FakeDiscount));
    require!(has_finding(outlier, AnomalyKind::IqrOutlier));
    require!(has_finding(outlier, AnomalyKind::TooGoodToBeTrue));

    let statistical = outlier
        .findings
        .iter()
        .find(|finding| finding.kind == AnomalyKind::StatisticalOutlier)
        .ok_or("statistical finding should be present")?;
    require!(
        (0.85..0.9).contains(&statistical.confidence),
        "statistical confidence was {}",
        statistical.confidence
    );

    let others_flagged = report
        .assessments
        .iter()
        .filter(|assessment| assessment.product_id.0 != "EL-OUTLIER")
        .any(|assessment| assessment.suspicion.flagged || !assessment.findings.is_empty());
    require!(!others_flagged, "ordinary listings should stay clean");

    let suspicious = report.suspicious_deals();
    require_eq!(suspicious.len(), 1);
    require_eq!(report.summary.flagged_products, 1);
    Ok(())
}

#[test]
fn scenario_good_home_deal_is_not_flagged() -> ScenarioResult {
    let batch: Vec<ProductObservation> = [
        ("HM-1", 4000, 5500),
        ("HM-2", 5000, 7000),
        ("HM-B", 6499, 8999),
        ("HM-3", 7000, 9500),
        ("HM-4", 8500, 11500),
        ("HM-5", 9000, 12500),
        ("HM-6", 9500, 13000),
        ("HM-7", 10000, 13500),
        ("HM-8", 11000, 15000),
    ]
    .into_iter()
    .map(|(id, current, original)| observation(id, Category::Home, whole(current), Some(whole(original))))
    .collect();

    let report = analyzer()?.analyze(&batch);
    require_eq!(report.statistics[&Category::Home].price.median, 8500.0);

    let deal = assessment(&report, "HM-B")?;
    require!(deal.suspicion.score < 40.0, "score was {}", deal.suspicion.score);
    require!(!deal.suspicion.flagged);
    require_eq!(deal.deal_quality.tier(), DealQualityTier::Good);
    require!(
        (deal.deal_quality.score - 59.0).abs() < 0.1,
        "deal quality was {}",
        deal.deal_quality.score
    );
    Ok(())
}

#[test]
fn scenario_single_product_category_skips_statistical_detectors() -> ScenarioResult {
    let mut batch = electronics_batch();
    batch.push(observation("SP-ONLY", Category::Sports, whole(1000), Some(whole(2000))));

    let report = analyzer()?.analyze(&batch);
    let lone = assessment(&report, "SP-ONLY")?;

    require!(!has_finding(lone, AnomalyKind::StatisticalOutlier));
    require!(!has_finding(lone, AnomalyKind::IqrOutlier));
    require!(lone.signals.round_original);
    require!(lone.signals.price_doubling);
    require!(has_finding(lone, AnomalyKind::FakeDiscount));
    require!(has_finding(lone, AnomalyKind::PriceManipulation));
    require_eq!(report.statistics[&Category::Sports].discount.std_dev, None::<f64>);
    Ok(())
}

#[test]
fn scenario_average_price_behind_big_discount_is_fake() -> ScenarioResult {
    let batch: Vec<ProductObservation> = [
        ("HD-1", 700, 950),
        ("HD-2", 800, 1050),
        ("HD-3", 900, 1200),
        ("HD-4", 950, 1300),
        ("HD-D", 999, 1999),
        ("HD-5", 1100, 1450),
        ("HD-6", 1200, 1600),
    ]
    .into_iter()
    .map(|(id, current, original)| observation(id, Category::Home, whole(current), Some(whole(original))))
    .collect();

    let report = analyzer()?.analyze(&batch);
    require_eq!(report.statistics[&Category::Home].price.median, 950.0);

    let deal = assessment(&report, "HD-D")?;
    require!(deal.signals.average_after_discount);
    require!(deal.signals.round_original);
    let fake = deal
        .findings
        .iter()
        .find(|finding| finding.kind == AnomalyKind::FakeDiscount)
        .ok_or("fake discount finding should be present")?;
    require!(fake.confidence >= 0.6, "confidence was {}", fake.confidence);
    Ok(())
}

#[test]
fn products_without_original_price_have_no_discount_story() -> ScenarioResult {
    let mut batch = electronics_batch();
    batch.push(observation("EL-BARE", Category::Electronics, whole(2000), None));

    let report = analyzer()?.analyze(&batch);
    let bare = assessment(&report, "EL-BARE")?;

    require_eq!(bare.deal_quality.discount_depth, 0.0);
    require_eq!(bare.deal_quality.score, 0.0);
    require!(!has_finding(bare, AnomalyKind::FakeDiscount));
    require!(!has_finding(bare, AnomalyKind::PriceManipulation));
    require!(bare.findings.is_empty());
    Ok(())
}

#[test]
fn repeated_runs_are_identical() -> ScenarioResult {
    let analyzer = analyzer()?;
    let batch = electronics_batch();

    let first = analyzer.analyze(&batch);
    let second = analyzer.analyze(&batch);

    require!(first == second, "reports should be identical");
    let first_json = serde_json::to_string(&first).map_err(|error| error.to_string())?;
    let second_json = serde_json::to_string(&second).map_err(|error| error.to_string())?;
    require_eq!(first_json, second_json);
    Ok(())
}

#[test]
fn deeper_discount_never_lowers_suspicion() -> ScenarioResult {
    let analyzer = analyzer()?;
    let statistics = analyzer.analyze(&electronics_batch()).statistics;

    let mut previous = f64::MIN;
    for current in (1..=300).rev().map(|step| whole(step * 10)) {
        let listing = observation("EL-SWEEP", Category::Electronics, current, Some(whole(2999)));
        let score = analyzer.assess(&listing, &statistics).suspicion.score;
        require!(score >= previous, "score dropped to {score} at current price {current}");
        previous = score;
    }
    Ok(())
}

#[test]
fn undiscounted_listing_is_never_flagged() -> ScenarioResult {
    let mut batch = electronics_batch();
    batch.push(observation("EL-FULL", Category::Electronics, whole(2000), Some(whole(2000))));

    let report = analyzer()?.analyze(&batch);
    let full = assessment(&report, "EL-FULL")?;

    require_eq!(full.discount_pct, Some(0.0));
    require!(!full.suspicion.flagged);
    require_eq!(full.suspicion.score, 0.0);
    require_eq!(full.deal_quality.score, 0.0);
    require!(full.findings.is_empty());
    Ok(())
}

#[test]
fn batch_json_round_trips_into_engine() -> ScenarioResult {
    let raw = r#"[
        {"id": "J-1", "name": "Kettle", "category": "home", "current_price": "39.99",
         "original_price": "49.99", "observed_at": "2024-11-29T08:00:00Z"},
        {"id": "J-2", "name": "Toaster", "category": "home", "current_price": "25.00",
         "original_price": "20.00", "observed_at": "2024-11-29T08:00:00Z"}
    ]"#;

    let batch = pricewatch_core::parse_batch(raw).map_err(|error| error.to_string())?;
    let report = analyzer()?.analyze(&batch);

    require_eq!(report.assessments.len(), 2);
    require_eq!(report.summary.validation.invalid_products, 1);
    require_eq!(report.summary.discounted_products, 1);
    Ok(())
}

#[test]
fn listing_without_price_is_reported_and_batch_still_scored() -> ScenarioResult {
    let raw = r#"[
        {"id": "M-1", "name": "Kettle", "category": "home", "current_price": "39.99",
         "original_price": "49.99", "observed_at": "2024-11-29T08:00:00Z"},
        {"id": "M-2", "name": "Toaster", "category": "home",
         "original_price": "80.00", "observed_at": "2024-11-29T08:00:00Z"}
    ]"#;

    let batch = pricewatch_core::parse_batch(raw).map_err(|error| error.to_string())?;
    let report = analyzer()?.analyze(&batch);

    require_eq!(report.assessments.len(), 2);
    let unpriced = assessment(&report, "M-2")?;
    require_eq!(unpriced.validation.len(), 1);
    require_eq!(unpriced.validation[0].code, ValidationCode::MissingPrice);
    require_eq!(unpriced.suspicion.score, 0.0);
    require!(unpriced.findings.is_empty());

    let priced = assessment(&report, "M-1")?;
    require!(priced.validation.is_empty());
    require!(priced.discount_pct.is_some());
    require_eq!(report.summary.validation.invalid_products, 1);
    require!(
        report
            .summary
            .validation
            .recommendations
            .iter()
            .any(|line| line.contains("1 products missing price data")),
        "recommendations were {:?}",
        report.summary.validation.recommendations
    );
    Ok(())
}

#[test]
fn price_at_decimal_limit_does_not_abort_batch() -> ScenarioResult {
    let mut batch = electronics_batch();
    batch.push(observation("EL-HUGE", Category::Electronics, whole(1), Some(Decimal::MAX)));

    let report = analyzer()?.analyze(&batch);
    let huge = assessment(&report, "EL-HUGE")?;

    require_eq!(huge.discount_pct, None::<f64>);
    require!(huge
        .validation
        .iter()
        .any(|issue| issue.code == ValidationCode::ExcessivePrice));
    require!(!huge.suspicion.flagged);
    require_eq!(report.assessments.len(), 21);
    Ok(())
}
