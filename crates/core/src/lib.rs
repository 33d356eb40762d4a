pub mod analysis;
pub mod config;
pub mod domain;
pub mod errors;

pub use analysis::anomaly::{AnomalyFinding, AnomalyKind};
pub use analysis::deal_quality::{DealQualityResult, DealQualityTier};
pub use analysis::stats::{CategoryStatistics, StatisticsMap};
pub use analysis::summary::BatchSummary;
pub use analysis::suspicion::{RecommendationTier, SuspicionReason, SuspicionResult};
pub use analysis::validator::{ValidationCode, ValidationIssue, ValidationSeverity};
pub use analysis::{BatchReport, DealAnalyzer, ProductAssessment};
pub use config::{AppConfig, ConfigError, EngineConfig};
pub use domain::product::{parse_batch, Category, ProductId, ProductObservation};
pub use errors::EngineError;
