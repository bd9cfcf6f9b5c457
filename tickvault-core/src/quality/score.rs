//! Quality score composition.
//!
//! Four component scores in [0, 1] combine into an overall score via a
//! weighted sum. The shipped weights are plain configuration — nothing
//! downstream assumes the exact values.

use serde::{Deserialize, Serialize};

/// Weights for the overall score. Should sum to 1.0; `compose` normalizes
/// so a hand-edited config that sums to 0.99 does not skew results.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub completeness: f64,
    pub accuracy: f64,
    pub consistency: f64,
    pub timeliness: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            completeness: 0.3,
            accuracy: 0.3,
            consistency: 0.2,
            timeliness: 0.2,
        }
    }
}

/// Component scores plus the derived overall score for one validated batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub completeness: f64,
    pub accuracy: f64,
    pub consistency: f64,
    pub timeliness: f64,
    pub overall: f64,
}

impl QualityMetrics {
    pub fn compose(
        completeness: f64,
        accuracy: f64,
        consistency: f64,
        timeliness: f64,
        weights: &ScoreWeights,
    ) -> Self {
        let completeness = completeness.clamp(0.0, 1.0);
        let accuracy = accuracy.clamp(0.0, 1.0);
        let consistency = consistency.clamp(0.0, 1.0);
        let timeliness = timeliness.clamp(0.0, 1.0);

        let total =
            weights.completeness + weights.accuracy + weights.consistency + weights.timeliness;
        let overall = if total > 0.0 {
            (weights.completeness * completeness
                + weights.accuracy * accuracy
                + weights.consistency * consistency
                + weights.timeliness * timeliness)
                / total
        } else {
            0.0
        };

        Self {
            completeness,
            accuracy,
            consistency,
            timeliness,
            overall,
        }
    }

    /// A perfect score, used for empty batches where nothing can be wrong.
    pub fn perfect() -> Self {
        Self {
            completeness: 1.0,
            accuracy: 1.0,
            consistency: 1.0,
            timeliness: 1.0,
            overall: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_favor_completeness_and_accuracy() {
        let w = ScoreWeights::default();
        assert_eq!(w.completeness, 0.3);
        assert_eq!(w.accuracy, 0.3);
        assert_eq!(w.consistency, 0.2);
        assert_eq!(w.timeliness, 0.2);
    }

    #[test]
    fn compose_weighted_sum() {
        let m = QualityMetrics::compose(1.0, 0.5, 1.0, 0.0, &ScoreWeights::default());
        // 0.3*1.0 + 0.3*0.5 + 0.2*1.0 + 0.2*0.0 = 0.65
        assert!((m.overall - 0.65).abs() < 1e-12);
    }

    #[test]
    fn compose_clamps_inputs() {
        let m = QualityMetrics::compose(1.5, -0.2, 0.5, 0.5, &ScoreWeights::default());
        assert_eq!(m.completeness, 1.0);
        assert_eq!(m.accuracy, 0.0);
        assert!(m.overall <= 1.0 && m.overall >= 0.0);
    }

    #[test]
    fn compose_normalizes_nonunit_weights() {
        let w = ScoreWeights {
            completeness: 3.0,
            accuracy: 3.0,
            consistency: 2.0,
            timeliness: 2.0,
        };
        let a = QualityMetrics::compose(0.8, 0.6, 1.0, 0.4, &w);
        let b = QualityMetrics::compose(0.8, 0.6, 1.0, 0.4, &ScoreWeights::default());
        assert!((a.overall - b.overall).abs() < 1e-12);
    }

    #[test]
    fn zero_weights_give_zero_overall() {
        let w = ScoreWeights {
            completeness: 0.0,
            accuracy: 0.0,
            consistency: 0.0,
            timeliness: 0.0,
        };
        let m = QualityMetrics::compose(1.0, 1.0, 1.0, 1.0, &w);
        assert_eq!(m.overall, 0.0);
    }
}
