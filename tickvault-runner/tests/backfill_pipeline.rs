//! Full pipeline: request a backfill, run it against a source, merge the
//! update tier, then verify integrity, gaps, and crash recovery.

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tickvault_core::domain::{Catalog, Timeframe};
use tickvault_core::quality::{QualityConfig, QualityEngine, QualityHistory};
use tickvault_core::source::{CircuitBreaker, MarketDataSource, RetryPolicy, SyntheticSource};
use tickvault_core::storage::ParquetStorage;
use tickvault_runner::dlq::DeadLetterQueue;
use tickvault_runner::gaps::identify_gaps;
use tickvault_runner::job::JobStatus;
use tickvault_runner::manager::{BackfillManager, BackfillRequest};
use tickvault_runner::registry::JobRegistry;
use tickvault_runner::warehouse::{MergeStatus, Tier, Warehouse};

fn build_manager(root: &std::path::Path) -> BackfillManager {
    let warehouse = Arc::new(Warehouse::new(root, Arc::new(ParquetStorage)));
    let registry = JobRegistry::new(warehouse.metadata_dir().join("jobs"));
    registry.load().unwrap();
    let dlq = DeadLetterQueue::new(root.join("dlq"), 1 << 20);
    let history = QualityHistory::new(warehouse.metadata_dir().join("quality"), 90);
    BackfillManager::new(
        Catalog::default_set(),
        warehouse,
        registry,
        dlq,
        QualityEngine::new(QualityConfig::default()),
        history,
        RetryPolicy::new(2, Duration::from_millis(1)),
        CircuitBreaker::new(Duration::from_secs(60)),
    )
}

fn january_request() -> BackfillRequest {
    BackfillRequest {
        symbol: "EURUSD".into(),
        timeframe: Timeframe::H1,
        start: "2025-01-01".parse().unwrap(),
        end: "2025-01-31".parse().unwrap(),
        batch_size_days: 7,
        priority: 1,
    }
}

#[test]
fn backfill_merge_verify_no_gaps() {
    let tmp = TempDir::new().unwrap();
    let mgr = build_manager(tmp.path());

    let id = mgr.request_backfill(january_request()).unwrap();
    assert_eq!(mgr.job_status(&id).unwrap().status, JobStatus::Queued);

    let source = SyntheticSource::new(7);
    source.connect().unwrap();
    let view = mgr.run_job(&id, &source).unwrap();
    assert_eq!(view.status, JobStatus::Completed);
    assert_eq!(view.total_batches, 5);

    let merge = mgr
        .warehouse()
        .merge_update_to_historical("EURUSD", Timeframe::H1)
        .unwrap();
    assert_eq!(merge.status, MergeStatus::Merged);
    // 30 days of hourly bars.
    assert_eq!(merge.rows_merged, 30 * 24);

    // Merging again with an empty update tier is a clean no-op.
    let again = mgr
        .warehouse()
        .merge_update_to_historical("EURUSD", Timeframe::H1)
        .unwrap();
    assert_eq!(again.status, MergeStatus::NoData);

    let integrity = mgr
        .warehouse()
        .validate_integrity(Tier::Historical, "EURUSD", Timeframe::H1)
        .unwrap();
    assert!(integrity.is_valid, "errors: {:?}", integrity.errors);
    assert!(integrity.warnings.is_empty());

    // The collected window has no gaps.
    let from = "2025-01-01"
        .parse::<chrono::NaiveDate>()
        .unwrap()
        .and_time(chrono::NaiveTime::MIN)
        .and_utc()
        .timestamp();
    let to = "2025-01-31"
        .parse::<chrono::NaiveDate>()
        .unwrap()
        .and_time(chrono::NaiveTime::MIN)
        .and_utc()
        .timestamp();
    let gaps = identify_gaps(mgr.warehouse(), "EURUSD", Timeframe::H1, from, to);
    assert!(gaps.is_empty(), "unexpected gaps: {gaps:?}");

    // A window the job never covered is uncollected, not gapped.
    let later = identify_gaps(
        mgr.warehouse(),
        "EURUSD",
        Timeframe::H1,
        to,
        to + 86_400,
    );
    assert!(later.is_empty(), "unexpected gaps: {later:?}");

    // A window straddling the coverage edge reports only the missing tail.
    let straddling = identify_gaps(
        mgr.warehouse(),
        "EURUSD",
        Timeframe::H1,
        to - 7_200,
        to + 7_200,
    );
    assert_eq!(straddling, vec![(to, to + 7_200)]);
}

#[test]
fn restart_resumes_job_with_preserved_progress() {
    let tmp = TempDir::new().unwrap();
    let id;
    {
        let mgr = build_manager(tmp.path());
        id = mgr.request_backfill(january_request()).unwrap();

        // Complete two batches, then "crash".
        let job = mgr.registry().get(&id).unwrap();
        let source = SyntheticSource::new(7);
        source.connect().unwrap();
        for batch_no in 0..2 {
            let (from, to) = job.batch_range(batch_no).unwrap();
            let bars = source
                .fetch_bars(
                    "EURUSD",
                    Timeframe::H1,
                    from.and_time(chrono::NaiveTime::MIN).and_utc().timestamp(),
                    to.and_time(chrono::NaiveTime::MIN).and_utc().timestamp(),
                )
                .unwrap();
            mgr.submit_batch(&id, batch_no, &tickvault_core::domain::RecordBatch::Bars(bars))
                .unwrap();
        }
        let view = mgr.job_status(&id).unwrap();
        assert_eq!(view.completed_batches, 2);
        assert_eq!(view.status, JobStatus::InProgress);
    }

    // New process: registry reload preserves status and progress, and the
    // remaining batches finish the job.
    let mgr = build_manager(tmp.path());
    let view = mgr.job_status(&id).unwrap();
    assert_eq!(view.completed_batches, 2);
    assert_eq!(view.status, JobStatus::InProgress);

    let source = SyntheticSource::new(7);
    source.connect().unwrap();
    let finished = mgr.run_job(&id, &source).unwrap();
    assert_eq!(finished.status, JobStatus::Completed);

    let merge = mgr
        .warehouse()
        .merge_update_to_historical("EURUSD", Timeframe::H1)
        .unwrap();
    assert_eq!(merge.rows_merged, 30 * 24);
}

#[test]
fn cancelled_job_stops_run_loop() {
    let tmp = TempDir::new().unwrap();
    let mgr = build_manager(tmp.path());
    let id = mgr.request_backfill(january_request()).unwrap();
    mgr.cancel(&id).unwrap();

    let source = SyntheticSource::new(7);
    source.connect().unwrap();
    let view = mgr.run_job(&id, &source).unwrap();
    assert_eq!(view.status, JobStatus::Cancelled);
    assert_eq!(view.completed_batches, 0);
}
