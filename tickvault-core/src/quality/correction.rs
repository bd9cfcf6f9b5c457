//! Opt-in auto-correction for repairable issue classes.
//!
//! Corrections are conservative: only issues with an unambiguous repair are
//! touched (swapped high/low, NaN price interpolation from neighbors,
//! inverted tick spread). Each repair yields a `DataCorrection` record with
//! a confidence reflecting the method's reliability. With correction
//! disabled the input is returned unchanged with zero corrections — a
//! no-op, not an error.

use crate::domain::RecordBatch;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionMethod {
    SwapHighLow,
    SwapBidAsk,
    InterpolateNeighbors,
}

impl CorrectionMethod {
    /// How much to trust a repair made with this method.
    pub fn confidence(&self) -> f64 {
        match self {
            CorrectionMethod::SwapHighLow => 0.9,
            CorrectionMethod::SwapBidAsk => 0.9,
            CorrectionMethod::InterpolateNeighbors => 0.7,
        }
    }
}

/// Audit record for one repaired value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataCorrection {
    pub row: usize,
    pub field: String,
    pub original: f64,
    pub corrected: f64,
    pub method: CorrectionMethod,
    pub reason: String,
    pub confidence: f64,
}

/// Repair correctable issues in `batch`. Returns the (possibly) repaired
/// batch and the corrections applied. `enabled = false` is a strict no-op.
pub fn correct_batch(batch: &RecordBatch, enabled: bool) -> (RecordBatch, Vec<DataCorrection>) {
    if !enabled {
        return (batch.clone(), Vec::new());
    }

    let mut corrections = Vec::new();
    let repaired = match batch {
        RecordBatch::Bars(bars) => {
            let mut bars = bars.clone();

            // Swapped high/low: both finite, just transposed.
            for (i, bar) in bars.iter_mut().enumerate() {
                if bar.high.is_finite() && bar.low.is_finite() && bar.high < bar.low {
                    let (orig_high, orig_low) = (bar.high, bar.low);
                    std::mem::swap(&mut bar.high, &mut bar.low);
                    corrections.push(DataCorrection {
                        row: i,
                        field: "high/low".into(),
                        original: orig_high,
                        corrected: orig_low,
                        method: CorrectionMethod::SwapHighLow,
                        reason: "high below low; values transposed".into(),
                        confidence: CorrectionMethod::SwapHighLow.confidence(),
                    });
                }
            }

            // NaN close: interpolate from the nearest finite neighbors.
            let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
            for (i, bar) in bars.iter_mut().enumerate() {
                if bar.close.is_nan() {
                    if let Some(value) = interpolate(&closes, i) {
                        corrections.push(DataCorrection {
                            row: i,
                            field: "close".into(),
                            original: f64::NAN,
                            corrected: value,
                            method: CorrectionMethod::InterpolateNeighbors,
                            reason: "NaN close interpolated from neighbors".into(),
                            confidence: CorrectionMethod::InterpolateNeighbors.confidence(),
                        });
                        bar.close = value;
                    }
                }
            }

            RecordBatch::Bars(bars)
        }
        RecordBatch::Ticks(ticks) => {
            let mut ticks = ticks.clone();
            for (i, tick) in ticks.iter_mut().enumerate() {
                if tick.bid.is_finite() && tick.ask.is_finite() && tick.ask < tick.bid {
                    let (orig_bid, orig_ask) = (tick.bid, tick.ask);
                    std::mem::swap(&mut tick.bid, &mut tick.ask);
                    corrections.push(DataCorrection {
                        row: i,
                        field: "bid/ask".into(),
                        original: orig_bid,
                        corrected: orig_ask,
                        method: CorrectionMethod::SwapBidAsk,
                        reason: "ask below bid; values transposed".into(),
                        confidence: CorrectionMethod::SwapBidAsk.confidence(),
                    });
                }
            }
            RecordBatch::Ticks(ticks)
        }
    };

    (repaired, corrections)
}

/// Linear interpolation from the nearest finite neighbors of `series[i]`.
/// Falls back to the single available neighbor at the edges; `None` when no
/// finite neighbor exists.
fn interpolate(series: &[f64], i: usize) -> Option<f64> {
    let prev = series[..i].iter().rev().find(|v| v.is_finite()).copied();
    let next = series[i + 1..].iter().find(|v| v.is_finite()).copied();
    match (prev, next) {
        (Some(a), Some(b)) => Some((a + b) / 2.0),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}
