//! Three-level batch validation.
//!
//! Level 1 (basic): required-value presence and null counts. A NaN price or
//! empty symbol is a missing critical value (Error); a zero volume is the
//! typed-struct analog of a null in a non-critical field (Warning).
//! Level 2 (logical): domain invariants — OHLC ordering, non-negative
//! prices, ask >= bid. Violations are Errors.
//! Level 3 (statistical): outlier detection. Findings are always Warnings;
//! outliers alone never invalidate a batch.
//!
//! A batch passes iff no Error-severity issue exists. Offending row indexes
//! are reported so callers can store the valid remainder.

use crate::domain::{RecordBatch, Timeframe};
use crate::quality::outliers::OutlierMethod;
use crate::quality::score::{QualityMetrics, ScoreWeights};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Issue severity, ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    MissingField,
    NullValue,
    InvariantViolation,
    Outlier,
    Duplicate,
    Stale,
}

/// One validation finding. Created during a run, appended to the report's
/// issue list, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityIssue {
    pub severity: Severity,
    pub category: IssueCategory,
    pub description: String,
    pub affected_rows: usize,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,
}

/// Outcome of one validation level.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LevelResult {
    pub passed: bool,
    pub error_count: usize,
    pub warning_count: usize,
}

/// Full report from a comprehensive validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub passed: bool,
    pub level1: LevelResult,
    pub level2: LevelResult,
    pub level3: LevelResult,
    pub issues: Vec<QualityIssue>,
    pub metrics: QualityMetrics,
    /// Rows that failed Level 1 or Level 2, sorted ascending. These must
    /// not be forwarded to storage.
    pub invalid_rows: Vec<usize>,
}

/// Tunables for the quality engine. Every field has a default and is
/// overridable from the pipeline config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub outlier: OutlierMethod,
    pub weights: ScoreWeights,
    pub auto_correct: bool,
    /// Timeliness reaches zero once the newest record is this many expected
    /// steps old.
    pub stale_after_steps: f64,
    /// Expected arrival cadence for ticks, which carry no timeframe.
    pub tick_cadence_secs: i64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            outlier: OutlierMethod::default(),
            weights: ScoreWeights::default(),
            auto_correct: false,
            stale_after_steps: 3.0,
            tick_cadence_secs: 60,
        }
    }
}

/// Stateless validator. Construct once with a config, share by reference.
#[derive(Debug, Clone, Default)]
pub struct QualityEngine {
    config: QualityConfig,
}

impl QualityEngine {
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    /// Run all three levels over a batch. `as_of` (epoch seconds) anchors
    /// the timeliness score; pass `None` when freshness is not meaningful
    /// (e.g. historical backfill), which scores timeliness as 1.0.
    pub fn validate(&self, batch: &RecordBatch, as_of: Option<i64>) -> ValidationReport {
        if batch.is_empty() {
            return ValidationReport {
                passed: true,
                level1: LevelResult { passed: true, ..Default::default() },
                level2: LevelResult { passed: true, ..Default::default() },
                level3: LevelResult { passed: true, ..Default::default() },
                issues: Vec::new(),
                metrics: QualityMetrics::perfect(),
                invalid_rows: Vec::new(),
            };
        }

        let mut issues: Vec<QualityIssue> = Vec::new();
        let mut invalid_rows: Vec<usize> = Vec::new();

        let (level1, null_fields, total_fields) =
            self.level1_basic(batch, &mut issues, &mut invalid_rows);
        let (level2, l2_failed) = self.level2_logical(batch, &mut issues, &mut invalid_rows);
        let level3 = self.level3_statistical(batch, &mut issues);

        invalid_rows.sort_unstable();
        invalid_rows.dedup();

        let n = batch.len();
        let completeness = 1.0 - null_fields as f64 / total_fields as f64;
        let accuracy = 1.0 - l2_failed as f64 / n as f64;
        let consistency = self.consistency(batch, &mut issues);
        let timeliness = self.timeliness(batch, as_of, &mut issues);

        let metrics = QualityMetrics::compose(
            completeness,
            accuracy,
            consistency,
            timeliness,
            &self.config.weights,
        );

        let passed = issues.iter().all(|i| i.severity != Severity::Error);

        ValidationReport {
            passed,
            level1,
            level2,
            level3,
            issues,
            metrics,
            invalid_rows,
        }
    }

    /// Level 1: presence of required values. Returns the level result plus
    /// (null field count, total field count) for the completeness score.
    fn level1_basic(
        &self,
        batch: &RecordBatch,
        issues: &mut Vec<QualityIssue>,
        invalid_rows: &mut Vec<usize>,
    ) -> (LevelResult, usize, usize) {
        let mut missing_symbol_rows = 0usize;
        let mut nan_rows: Vec<usize> = Vec::new();
        let mut zero_volume_rows = 0usize;
        let mut null_fields = 0usize;

        let total_fields = match batch {
            RecordBatch::Bars(bars) => {
                for (i, bar) in bars.iter().enumerate() {
                    if bar.symbol.is_empty() {
                        missing_symbol_rows += 1;
                        null_fields += 1;
                        invalid_rows.push(i);
                    }
                    if bar.is_void() {
                        null_fields += [bar.open, bar.high, bar.low, bar.close]
                            .iter()
                            .filter(|v| v.is_nan())
                            .count();
                        nan_rows.push(i);
                    }
                    if bar.volume == 0 {
                        zero_volume_rows += 1;
                        null_fields += 1;
                    }
                }
                bars.len() * 6
            }
            RecordBatch::Ticks(ticks) => {
                for (i, tick) in ticks.iter().enumerate() {
                    if tick.symbol.is_empty() {
                        missing_symbol_rows += 1;
                        null_fields += 1;
                        invalid_rows.push(i);
                    }
                    if tick.is_void() {
                        null_fields += [tick.bid, tick.ask]
                            .iter()
                            .filter(|v| v.is_nan())
                            .count();
                        nan_rows.push(i);
                    }
                    if tick.volume == 0 {
                        zero_volume_rows += 1;
                        null_fields += 1;
                    }
                }
                ticks.len() * 4
            }
        };

        let mut error_count = 0usize;
        let mut warning_count = 0usize;

        if missing_symbol_rows > 0 {
            error_count += 1;
            issues.push(QualityIssue {
                severity: Severity::Error,
                category: IssueCategory::MissingField,
                description: "rows with empty symbol".into(),
                affected_rows: missing_symbol_rows,
                details: BTreeMap::new(),
            });
        }
        if !nan_rows.is_empty() {
            error_count += 1;
            invalid_rows.extend_from_slice(&nan_rows);
            issues.push(QualityIssue {
                severity: Severity::Error,
                category: IssueCategory::NullValue,
                description: "rows with NaN in a required price field".into(),
                affected_rows: nan_rows.len(),
                details: BTreeMap::new(),
            });
        }
        if zero_volume_rows > 0 {
            warning_count += 1;
            issues.push(QualityIssue {
                severity: Severity::Warning,
                category: IssueCategory::NullValue,
                description: "rows with zero volume".into(),
                affected_rows: zero_volume_rows,
                details: BTreeMap::new(),
            });
        }

        (
            LevelResult {
                passed: error_count == 0,
                error_count,
                warning_count,
            },
            null_fields,
            total_fields,
        )
    }

    /// Level 2: domain invariants. Returns the level result plus the number
    /// of rows that failed (for the accuracy score).
    fn level2_logical(
        &self,
        batch: &RecordBatch,
        issues: &mut Vec<QualityIssue>,
        invalid_rows: &mut Vec<usize>,
    ) -> (LevelResult, usize) {
        let failed: Vec<usize> = match batch {
            RecordBatch::Bars(bars) => bars
                .iter()
                .enumerate()
                .filter(|(_, b)| !b.is_sane())
                .map(|(i, _)| i)
                .collect(),
            RecordBatch::Ticks(ticks) => ticks
                .iter()
                .enumerate()
                .filter(|(_, t)| !t.is_sane())
                .map(|(i, _)| i)
                .collect(),
        };

        let failed_count = failed.len();
        let mut error_count = 0usize;
        if failed_count > 0 {
            error_count = 1;
            invalid_rows.extend_from_slice(&failed);
            let description = match batch {
                RecordBatch::Bars(_) => "rows violating OHLC ordering or price bounds",
                RecordBatch::Ticks(_) => "rows violating ask >= bid or price bounds",
            };
            issues.push(QualityIssue {
                severity: Severity::Error,
                category: IssueCategory::InvariantViolation,
                description: description.into(),
                affected_rows: failed_count,
                details: BTreeMap::new(),
            });
        }

        (
            LevelResult {
                passed: error_count == 0,
                error_count,
                warning_count: 0,
            },
            failed_count,
        )
    }

    /// Level 3: outlier detection over close (bars) or mid (ticks) prices.
    fn level3_statistical(
        &self,
        batch: &RecordBatch,
        issues: &mut Vec<QualityIssue>,
    ) -> LevelResult {
        let series: Vec<f64> = match batch {
            RecordBatch::Bars(bars) => bars.iter().map(|b| b.close).collect(),
            RecordBatch::Ticks(ticks) => {
                ticks.iter().map(|t| (t.bid + t.ask) / 2.0).collect()
            }
        };

        let result = self.config.outlier.detect(&series);
        let mut warning_count = 0usize;
        if result.outlier_count > 0 {
            warning_count = 1;
            let mut details = BTreeMap::new();
            details.insert("method".into(), result.method.to_string());
            issues.push(QualityIssue {
                severity: Severity::Warning,
                category: IssueCategory::Outlier,
                description: format!("{} statistical outliers detected", result.outlier_count),
                affected_rows: result.outlier_count,
                details,
            });
        }

        LevelResult {
            passed: true, // outliers never fail a batch
            error_count: 0,
            warning_count,
        }
    }

    /// Consistency: 1 minus the duplicate-timestamp fraction.
    fn consistency(&self, batch: &RecordBatch, issues: &mut Vec<QualityIssue>) -> f64 {
        let timestamps = batch.timestamps();
        let mut counts: HashMap<i64, usize> = HashMap::new();
        for ts in &timestamps {
            *counts.entry(*ts).or_insert(0) += 1;
        }
        let duplicate_rows: usize = counts
            .values()
            .filter(|&&c| c >= 2)
            .map(|&c| c - 1)
            .sum();

        if duplicate_rows > 0 {
            issues.push(QualityIssue {
                severity: Severity::Warning,
                category: IssueCategory::Duplicate,
                description: "duplicate timestamps within batch".into(),
                affected_rows: duplicate_rows,
                details: BTreeMap::new(),
            });
        }

        1.0 - duplicate_rows as f64 / timestamps.len() as f64
    }

    /// Timeliness: freshness of the newest record against the expected
    /// cadence. 1.0 within one step of `as_of`, linear decay to 0.0 at
    /// `stale_after_steps` steps.
    fn timeliness(
        &self,
        batch: &RecordBatch,
        as_of: Option<i64>,
        issues: &mut Vec<QualityIssue>,
    ) -> f64 {
        let Some(now) = as_of else {
            return 1.0;
        };
        let Some(newest) = batch.timestamps().into_iter().max() else {
            return 1.0;
        };

        let step = match batch {
            RecordBatch::Bars(bars) => bars
                .first()
                .map(|b| b.timeframe.step_secs())
                .unwrap_or(Timeframe::M1.step_secs()),
            RecordBatch::Ticks(_) => self.config.tick_cadence_secs,
        };

        let age = (now - newest).max(0) as f64;
        let steps = age / step as f64;
        let stale_after = self.config.stale_after_steps.max(1.0);

        let score = if steps <= 1.0 {
            1.0
        } else {
            (1.0 - (steps - 1.0) / (stale_after - 1.0).max(f64::EPSILON)).max(0.0)
        };

        if score == 0.0 {
            issues.push(QualityIssue {
                severity: Severity::Warning,
                category: IssueCategory::Stale,
                description: format!("newest record is {steps:.1} steps old"),
                affected_rows: 0,
                details: BTreeMap::new(),
            });
        }

        score
    }
}
