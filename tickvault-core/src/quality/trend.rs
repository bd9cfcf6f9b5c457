//! Quality trend tracking — JSONL metric history per series.
//!
//! Each validated batch appends its metrics to an append-only JSONL file
//! keyed by (symbol, timeframe). History is bounded by a retention window
//! in days, not by entry count. Malformed lines are skipped on read so one
//! torn write cannot poison a series.

use crate::domain::Timeframe;
use crate::quality::score::QualityMetrics;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrendError {
    #[error("history I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("history serialization: {0}")]
    Serde(#[from] serde_json::Error),
}

/// One appended observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendEntry {
    pub ts: i64,
    pub metrics: QualityMetrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
}

/// Windowed summary of a series' overall scores. `NoData` is a normal
/// outcome for an empty history, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum TrendSummary {
    NoData,
    Data {
        count: usize,
        avg: f64,
        min: f64,
        max: f64,
        direction: TrendDirection,
    },
}

/// Per-series quality metric history rooted at a directory.
pub struct QualityHistory {
    dir: PathBuf,
    retention_days: u32,
}

/// Slope smaller than this (overall-score units per observation) counts as
/// stable.
const STABLE_SLOPE_EPS: f64 = 1e-3;

impl QualityHistory {
    pub fn new(dir: impl Into<PathBuf>, retention_days: u32) -> Self {
        Self {
            dir: dir.into(),
            retention_days,
        }
    }

    fn series_path(&self, symbol: &str, timeframe: Option<Timeframe>) -> PathBuf {
        let tf = timeframe.map(|t| t.as_str()).unwrap_or("tick");
        self.dir.join(format!("{symbol}_{tf}.jsonl"))
    }

    /// Append one observation, pruning entries older than the retention
    /// window. The prune rewrites the file atomically (tmp + rename).
    pub fn record(
        &self,
        symbol: &str,
        timeframe: Option<Timeframe>,
        ts: i64,
        metrics: QualityMetrics,
    ) -> Result<(), TrendError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.series_path(symbol, timeframe);

        let cutoff = ts - i64::from(self.retention_days) * 86_400;
        let existing = read_entries(&path)?;
        let needs_prune = existing.iter().any(|e| e.ts < cutoff);

        if needs_prune {
            let mut kept: Vec<&TrendEntry> =
                existing.iter().filter(|e| e.ts >= cutoff).collect();
            let new_entry = TrendEntry { ts, metrics };
            kept.push(&new_entry);

            let tmp = path.with_extension("jsonl.tmp");
            let mut out = fs::File::create(&tmp)?;
            for entry in kept {
                writeln!(out, "{}", serde_json::to_string(entry)?)?;
            }
            out.flush()?;
            fs::rename(&tmp, &path)?;
        } else {
            let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
            writeln!(file, "{}", serde_json::to_string(&TrendEntry { ts, metrics })?)?;
            file.flush()?;
        }
        Ok(())
    }

    /// All retained entries for a series, in append order.
    pub fn entries(
        &self,
        symbol: &str,
        timeframe: Option<Timeframe>,
    ) -> Result<Vec<TrendEntry>, TrendError> {
        read_entries(&self.series_path(symbol, timeframe))
    }

    /// Summarize the last `window` observations of a series.
    pub fn summary(
        &self,
        symbol: &str,
        timeframe: Option<Timeframe>,
        window: usize,
    ) -> Result<TrendSummary, TrendError> {
        let entries = self.entries(symbol, timeframe)?;
        if entries.is_empty() {
            return Ok(TrendSummary::NoData);
        }

        let start = entries.len().saturating_sub(window.max(1));
        let scores: Vec<f64> = entries[start..].iter().map(|e| e.metrics.overall).collect();

        let count = scores.len();
        let avg = scores.iter().sum::<f64>() / count as f64;
        let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
        let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let slope = least_squares_slope(&scores);
        let direction = if slope > STABLE_SLOPE_EPS {
            TrendDirection::Improving
        } else if slope < -STABLE_SLOPE_EPS {
            TrendDirection::Declining
        } else {
            TrendDirection::Stable
        };

        Ok(TrendSummary::Data {
            count,
            avg,
            min,
            max,
            direction,
        })
    }
}

fn read_entries(path: &Path) -> Result<Vec<TrendEntry>, TrendError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let reader = BufReader::new(fs::File::open(path)?);
    let mut entries = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<TrendEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(_) => continue, // skip malformed lines
        }
    }
    Ok(entries)
}

/// Least-squares slope of `values` against their index.
fn least_squares_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let nf = n as f64;
    let x_mean = (nf - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / nf;
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}
