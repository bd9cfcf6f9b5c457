//! End-to-end quality pipeline: fetch from a source, validate, correct,
//! persist through storage, and reload.

use tickvault_core::domain::{Bar, RecordBatch, Timeframe};
use tickvault_core::quality::{correct_batch, QualityConfig, QualityEngine, Severity};
use tickvault_core::source::{MarketDataSource, SyntheticSource};
use tickvault_core::storage::{ParquetStorage, TableStorage};
use tempfile::TempDir;

fn bad_bar(ts: i64) -> Bar {
    Bar {
        symbol: "EURUSD".to_string(),
        timeframe: Timeframe::H1,
        ts,
        open: 1.10,
        high: 1.09, // swapped with low
        low: 1.12,
        close: 1.11,
        volume: 500,
    }
}

#[test]
fn synthetic_batch_survives_full_pipeline() {
    let source = SyntheticSource::new(42);
    source.connect().unwrap();
    let bars = source
        .fetch_bars("EURUSD", Timeframe::H1, 0, 7 * 86_400)
        .unwrap();
    let batch = RecordBatch::Bars(bars);

    let engine = QualityEngine::new(QualityConfig::default());
    let report = engine.validate(&batch, None);
    assert!(report.passed, "synthetic data should pass validation");
    assert!(report.metrics.overall > 0.9);

    let tmp = TempDir::new().unwrap();
    let storage = ParquetStorage;
    let path = tmp.path().join("historical/EURUSD/1h/data.parquet");
    storage.write(&batch, &path).unwrap();

    let reloaded = storage.read(&path).unwrap();
    assert_eq!(reloaded.len(), batch.len());
    let report2 = engine.validate(&reloaded, None);
    assert!(report2.passed);
}

#[test]
fn corrected_batch_revalidates_clean() {
    let mut bars = vec![bad_bar(3_600)];
    bars.push(Bar {
        symbol: "EURUSD".to_string(),
        timeframe: Timeframe::H1,
        ts: 7_200,
        open: 1.11,
        high: 1.13,
        low: 1.10,
        close: 1.12,
        volume: 800,
    });
    let batch = RecordBatch::Bars(bars);

    let engine = QualityEngine::new(QualityConfig::default());
    let before = engine.validate(&batch, None);
    assert!(!before.passed);
    assert!(before
        .issues
        .iter()
        .any(|i| i.severity == Severity::Error));

    let (fixed, corrections) = correct_batch(&batch, true);
    assert_eq!(corrections.len(), 1);

    let after = engine.validate(&fixed, None);
    assert!(after.passed, "high/low swap should be repaired");
}

#[test]
fn invalid_rows_can_be_dropped_before_storage() {
    let mut bars = vec![bad_bar(3_600)];
    for i in 2..10 {
        bars.push(Bar {
            symbol: "EURUSD".to_string(),
            timeframe: Timeframe::H1,
            ts: i * 3_600,
            open: 1.10,
            high: 1.12,
            low: 1.09,
            close: 1.11,
            volume: 700,
        });
    }
    let batch = RecordBatch::Bars(bars);

    let engine = QualityEngine::new(QualityConfig::default());
    let report = engine.validate(&batch, None);
    assert_eq!(report.invalid_rows, vec![0]);

    let valid = batch.without_rows(&report.invalid_rows);
    assert_eq!(valid.len(), 8);

    let tmp = TempDir::new().unwrap();
    let storage = ParquetStorage;
    let path = tmp.path().join("data.parquet");
    storage.write(&valid, &path).unwrap();
    assert!(engine.validate(&storage.read(&path).unwrap(), None).passed);
}
