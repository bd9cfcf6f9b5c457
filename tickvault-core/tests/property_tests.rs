//! Property tests for quality-engine invariants.
//!
//! Uses proptest to verify:
//! 1. Outlier masks always match the input length
//! 2. Quality metrics stay within [0, 1] for arbitrary batches
//! 3. Dropping reported invalid rows always yields a passing batch

use proptest::prelude::*;
use tickvault_core::domain::{Bar, RecordBatch, Timeframe};
use tickvault_core::quality::{OutlierMethod, QualityConfig, QualityEngine};

fn arb_price() -> impl Strategy<Value = f64> {
    prop_oneof![
        9 => 0.5..2.0_f64,
        1 => Just(f64::NAN),
    ]
}

fn arb_bar(index: usize) -> impl Strategy<Value = Bar> {
    (arb_price(), arb_price(), arb_price(), arb_price(), 0..10_000u64).prop_map(
        move |(open, high, low, close, volume)| Bar {
            symbol: "EURUSD".to_string(),
            timeframe: Timeframe::H1,
            ts: index as i64 * 3_600,
            open,
            high,
            low,
            close,
            volume,
        },
    )
}

fn arb_batch() -> impl Strategy<Value = RecordBatch> {
    prop::collection::vec(any::<usize>(), 0..60).prop_flat_map(|seeds| {
        seeds
            .into_iter()
            .enumerate()
            .map(|(i, _)| arb_bar(i))
            .collect::<Vec<_>>()
            .prop_map(RecordBatch::Bars)
    })
}

proptest! {
    /// Every detection method returns one mask slot per input value.
    #[test]
    fn outlier_mask_matches_series_length(
        series in prop::collection::vec(0.5..2.0_f64, 0..200),
        k in 0.5..3.0_f64,
    ) {
        for method in [
            OutlierMethod::Iqr { k },
            OutlierMethod::ZScore { threshold: 3.0 },
            OutlierMethod::MovingAverage { window: 20, threshold: 3.0 },
        ] {
            let result = method.detect(&series);
            prop_assert_eq!(result.mask.len(), series.len());
            prop_assert_eq!(
                result.outlier_count,
                result.mask.iter().filter(|&&m| m).count()
            );
        }
    }

    /// Metric components and the overall score never leave [0, 1].
    #[test]
    fn metrics_stay_in_unit_interval(batch in arb_batch()) {
        let engine = QualityEngine::new(QualityConfig::default());
        let report = engine.validate(&batch, None);
        for value in [
            report.metrics.completeness,
            report.metrics.accuracy,
            report.metrics.consistency,
            report.metrics.timeliness,
            report.metrics.overall,
        ] {
            prop_assert!((0.0..=1.0).contains(&value), "metric out of range: {value}");
        }
    }

    /// After removing the rows a report flags, revalidation finds no
    /// Level 1/2 errors.
    #[test]
    fn dropping_invalid_rows_yields_valid_batch(batch in arb_batch()) {
        let engine = QualityEngine::new(QualityConfig::default());
        let report = engine.validate(&batch, None);
        let cleaned = batch.without_rows(&report.invalid_rows);
        prop_assert_eq!(cleaned.len(), batch.len() - report.invalid_rows.len());

        let second = engine.validate(&cleaned, None);
        prop_assert!(second.level1.passed);
        prop_assert!(second.level2.passed);
        prop_assert!(second.invalid_rows.is_empty());
    }
}
