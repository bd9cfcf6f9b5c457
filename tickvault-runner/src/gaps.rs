//! Gap identification over stored historical data.
//!
//! Compares the timestamps actually present against the expected cadence
//! of the timeframe and reports missing runs as half-open `(from, to)`
//! epoch-second intervals. Diagnostics only: this never errors — a series
//! with no stored data in the requested range reports no gaps (nothing has
//! been collected yet, which is not the same as data going missing), and
//! an unreadable table reports no gaps rather than failing a status call.

use crate::warehouse::Warehouse;
use std::collections::HashSet;
use tickvault_core::domain::Timeframe;

/// Missing `[from, to)` intervals within `[start, end)`, aligned to the
/// timeframe step.
pub fn identify_gaps(
    warehouse: &Warehouse,
    symbol: &str,
    timeframe: Timeframe,
    start: i64,
    end: i64,
) -> Vec<(i64, i64)> {
    if end <= start {
        return Vec::new();
    }

    let stored: HashSet<i64> = match warehouse.historical_batch(symbol, timeframe) {
        Ok(Some(batch)) => batch.timestamps().into_iter().collect(),
        Ok(None) => return Vec::new(),
        Err(e) => {
            tracing::warn!(symbol, error = %e, "gap scan skipped unreadable historical table");
            return Vec::new();
        }
    };
    // No stored data in the window means the range was never collected;
    // only ranges with some coverage can have gaps.
    if !stored.iter().any(|ts| (start..end).contains(ts)) {
        return Vec::new();
    }

    let step = timeframe.step_secs();
    let mut first_expected = start - start.rem_euclid(step);
    if first_expected < start {
        first_expected += step;
    }

    let mut gaps: Vec<(i64, i64)> = Vec::new();
    let mut run_start: Option<i64> = None;
    let mut ts = first_expected;
    while ts < end {
        if stored.contains(&ts) {
            if let Some(from) = run_start.take() {
                gaps.push((from, ts));
            }
        } else if run_start.is_none() {
            run_start = Some(ts);
        }
        ts += step;
    }
    if let Some(from) = run_start {
        gaps.push((from, end.min(ts)));
    }
    gaps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::Tier;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tickvault_core::domain::{Bar, RecordBatch};
    use tickvault_core::storage::ParquetStorage;

    fn bar(ts: i64) -> Bar {
        Bar {
            symbol: "EURUSD".into(),
            timeframe: Timeframe::H1,
            ts,
            open: 1.08,
            high: 1.09,
            low: 1.07,
            close: 1.085,
            volume: 1_000,
        }
    }

    fn warehouse_with_bars(tmp: &TempDir, ts: &[i64]) -> Warehouse {
        let wh = Warehouse::new(tmp.path(), Arc::new(ParquetStorage));
        if !ts.is_empty() {
            wh.stage_batch(
                Tier::Update,
                "EURUSD",
                Timeframe::H1,
                &RecordBatch::Bars(ts.iter().copied().map(bar).collect()),
            )
            .unwrap();
            wh.merge_update_to_historical("EURUSD", Timeframe::H1).unwrap();
        }
        wh
    }

    #[test]
    fn empty_storage_reports_no_gaps() {
        let tmp = TempDir::new().unwrap();
        let wh = warehouse_with_bars(&tmp, &[]);
        let gaps = identify_gaps(&wh, "EURUSD", Timeframe::H1, 0, 4 * 3_600);
        assert!(gaps.is_empty(), "uncollected series has no gaps: {gaps:?}");
    }

    #[test]
    fn window_outside_stored_data_reports_no_gaps() {
        let tmp = TempDir::new().unwrap();
        let wh = warehouse_with_bars(&tmp, &[0, 3_600]);
        let gaps = identify_gaps(&wh, "EURUSD", Timeframe::H1, 86_400, 2 * 86_400);
        assert!(gaps.is_empty(), "window beyond coverage has no gaps: {gaps:?}");
    }

    #[test]
    fn complete_series_has_no_gaps() {
        let tmp = TempDir::new().unwrap();
        let wh = warehouse_with_bars(&tmp, &[0, 3_600, 7_200, 10_800]);
        let gaps = identify_gaps(&wh, "EURUSD", Timeframe::H1, 0, 4 * 3_600);
        assert!(gaps.is_empty());
    }

    #[test]
    fn interior_gap_is_detected() {
        let tmp = TempDir::new().unwrap();
        // Missing 7200 and 10800.
        let wh = warehouse_with_bars(&tmp, &[0, 3_600, 14_400]);
        let gaps = identify_gaps(&wh, "EURUSD", Timeframe::H1, 0, 5 * 3_600);
        assert_eq!(gaps, vec![(7_200, 14_400)]);
    }

    #[test]
    fn trailing_gap_runs_to_window_end() {
        let tmp = TempDir::new().unwrap();
        let wh = warehouse_with_bars(&tmp, &[0, 3_600]);
        let gaps = identify_gaps(&wh, "EURUSD", Timeframe::H1, 0, 4 * 3_600);
        assert_eq!(gaps, vec![(7_200, 4 * 3_600)]);
    }

    #[test]
    fn degenerate_window_is_empty() {
        let tmp = TempDir::new().unwrap();
        let wh = warehouse_with_bars(&tmp, &[0]);
        assert!(identify_gaps(&wh, "EURUSD", Timeframe::H1, 3_600, 3_600).is_empty());
        assert!(identify_gaps(&wh, "EURUSD", Timeframe::H1, 7_200, 3_600).is_empty());
    }
}
