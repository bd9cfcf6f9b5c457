//! Statistical outlier detection over a numeric series.
//!
//! Three interchangeable methods behind one enum, dispatched through a
//! single match so adding a method is a compile error until every call
//! site handles it. All methods return a boolean mask over the input plus
//! summary statistics; findings are advisory (Warning severity upstream)
//! and never invalidate a batch on their own.

use serde::{Deserialize, Serialize};

/// Outlier detection method with its tuning parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutlierMethod {
    /// Tukey fences: value outside [Q1 - k*IQR, Q3 + k*IQR].
    Iqr { k: f64 },
    /// |value - mean| / stddev > threshold. Zero-variance series produce
    /// an empty result, not an error.
    ZScore { threshold: f64 },
    /// Deviation from a rolling mean, scaled by the rolling stddev.
    MovingAverage { window: usize, threshold: f64 },
}

impl Default for OutlierMethod {
    fn default() -> Self {
        OutlierMethod::Iqr { k: 1.5 }
    }
}

impl OutlierMethod {
    pub fn name(&self) -> &'static str {
        match self {
            OutlierMethod::Iqr { .. } => "iqr",
            OutlierMethod::ZScore { .. } => "z_score",
            OutlierMethod::MovingAverage { .. } => "moving_average",
        }
    }

    /// Flag outliers in `series`. The mask has one entry per input value.
    pub fn detect(&self, series: &[f64]) -> OutlierResult {
        let mask = match *self {
            OutlierMethod::Iqr { k } => detect_iqr(series, k),
            OutlierMethod::ZScore { threshold } => detect_z_score(series, threshold),
            OutlierMethod::MovingAverage { window, threshold } => {
                detect_moving_average(series, window, threshold)
            }
        };
        let outlier_count = mask.iter().filter(|&&m| m).count();
        OutlierResult {
            method: self.name(),
            mask,
            outlier_count,
        }
    }
}

/// Mask plus summary statistics from one detection run.
#[derive(Debug, Clone)]
pub struct OutlierResult {
    pub method: &'static str,
    pub mask: Vec<bool>,
    pub outlier_count: usize,
}

impl OutlierResult {
    /// Indexes of flagged values, ascending.
    pub fn outlier_indexes(&self) -> Vec<usize> {
        self.mask
            .iter()
            .enumerate()
            .filter(|(_, &m)| m)
            .map(|(i, _)| i)
            .collect()
    }
}

fn detect_iqr(series: &[f64], k: f64) -> Vec<bool> {
    // Quartiles are meaningless for very short series.
    if series.len() < 4 {
        return vec![false; series.len()];
    }

    let mut sorted: Vec<f64> = series.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.len() < 4 {
        return vec![false; series.len()];
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let q1 = percentile(&sorted, 0.25);
    let q3 = percentile(&sorted, 0.75);
    let iqr = q3 - q1;
    let lo = q1 - k * iqr;
    let hi = q3 + k * iqr;

    series
        .iter()
        .map(|&v| v.is_finite() && (v < lo || v > hi))
        .collect()
}

fn detect_z_score(series: &[f64], threshold: f64) -> Vec<bool> {
    let finite: Vec<f64> = series.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.len() < 2 {
        return vec![false; series.len()];
    }

    let n = finite.len() as f64;
    let mean = finite.iter().sum::<f64>() / n;
    let var = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std = var.sqrt();

    // Constant series: no spread, nothing to flag.
    if std == 0.0 {
        return vec![false; series.len()];
    }

    series
        .iter()
        .map(|&v| v.is_finite() && ((v - mean) / std).abs() > threshold)
        .collect()
}

fn detect_moving_average(series: &[f64], window: usize, threshold: f64) -> Vec<bool> {
    let window = window.max(2);
    if series.len() < window {
        return vec![false; series.len()];
    }

    let mut mask = vec![false; series.len()];
    for i in (window - 1)..series.len() {
        let slice = &series[i + 1 - window..=i];
        if slice.iter().any(|v| !v.is_finite()) {
            continue;
        }
        let n = slice.len() as f64;
        let mean = slice.iter().sum::<f64>() / n;
        let var = slice.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();
        if std == 0.0 {
            continue;
        }
        if (series[i] - mean).abs() > threshold * std {
            mask[i] = true;
        }
    }
    mask
}

/// Linear-interpolated percentile over a sorted slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let idx = p * (sorted.len() - 1) as f64;
    let lo = idx.floor() as usize;
    let hi = idx.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = idx - lo as f64;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant_series() -> Vec<f64> {
        vec![100.0; 50]
    }

    fn series_with_spike() -> Vec<f64> {
        let mut s: Vec<f64> = (0..50).map(|i| 100.0 + (i % 5) as f64 * 0.1).collect();
        s[25] = 500.0;
        s
    }

    #[test]
    fn constant_series_has_zero_outliers_all_methods() {
        let series = constant_series();
        let methods = [
            OutlierMethod::Iqr { k: 1.5 },
            OutlierMethod::ZScore { threshold: 3.0 },
            OutlierMethod::MovingAverage {
                window: 20,
                threshold: 3.0,
            },
        ];
        for method in methods {
            let result = method.detect(&series);
            assert_eq!(result.outlier_count, 0, "method {}", result.method);
        }
    }

    #[test]
    fn z_score_zero_variance_is_empty_not_a_crash() {
        let result = OutlierMethod::ZScore { threshold: 3.0 }.detect(&constant_series());
        assert_eq!(result.outlier_count, 0);
        assert_eq!(result.mask.len(), 50);
    }

    #[test]
    fn iqr_flags_spike() {
        let result = OutlierMethod::Iqr { k: 1.5 }.detect(&series_with_spike());
        assert!(result.mask[25]);
        assert_eq!(result.outlier_count, 1);
    }

    #[test]
    fn z_score_flags_spike() {
        let result = OutlierMethod::ZScore { threshold: 3.0 }.detect(&series_with_spike());
        assert!(result.mask[25]);
    }

    #[test]
    fn moving_average_flags_spike() {
        let result = OutlierMethod::MovingAverage {
            window: 20,
            threshold: 3.0,
        }
        .detect(&series_with_spike());
        assert!(result.mask[25]);
    }

    #[test]
    fn moving_average_short_series_no_flags() {
        let result = OutlierMethod::MovingAverage {
            window: 20,
            threshold: 3.0,
        }
        .detect(&[1.0, 2.0, 3.0]);
        assert_eq!(result.outlier_count, 0);
    }

    #[test]
    fn empty_series_is_fine() {
        for method in [
            OutlierMethod::default(),
            OutlierMethod::ZScore { threshold: 3.0 },
        ] {
            let result = method.detect(&[]);
            assert!(result.mask.is_empty());
            assert_eq!(result.outlier_count, 0);
        }
    }

    #[test]
    fn nan_values_never_flagged() {
        let mut series = series_with_spike();
        series[10] = f64::NAN;
        let result = OutlierMethod::Iqr { k: 1.5 }.detect(&series);
        assert!(!result.mask[10]);
        assert!(result.mask[25]);
    }

    #[test]
    fn outlier_indexes_lists_flagged_positions() {
        let result = OutlierMethod::Iqr { k: 1.5 }.detect(&series_with_spike());
        assert_eq!(result.outlier_indexes(), vec![25]);
    }

    #[test]
    fn method_serde_roundtrip() {
        let method = OutlierMethod::MovingAverage {
            window: 20,
            threshold: 3.0,
        };
        let json = serde_json::to_string(&method).unwrap();
        let back: OutlierMethod = serde_json::from_str(&json).unwrap();
        assert_eq!(method, back);
    }
}
