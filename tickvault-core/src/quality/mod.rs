//! Data quality framework — validation levels, outlier detection, scoring,
//! auto-correction, and trend tracking.

pub mod correction;
pub mod outliers;
pub mod score;
pub mod trend;
pub mod validate;

pub use correction::{correct_batch, CorrectionMethod, DataCorrection};
pub use outliers::{OutlierMethod, OutlierResult};
pub use score::{QualityMetrics, ScoreWeights};
pub use trend::{QualityHistory, TrendDirection, TrendEntry, TrendError, TrendSummary};
pub use validate::{
    IssueCategory, LevelResult, QualityConfig, QualityEngine, QualityIssue, Severity,
    ValidationReport,
};
