//! Property tests for job batching invariants.
//!
//! Uses proptest to verify:
//! 1. Batch ranges tile the requested window exactly — full coverage, no
//!    overlap, no spill past the end date
//! 2. Progress stays within [0, 100] for arbitrary counter states

use chrono::NaiveDate;
use proptest::prelude::*;
use tickvault_core::domain::Timeframe;
use tickvault_runner::job::{BackfillJob, JobStatus};

fn job(start: NaiveDate, days: u32, batch_size_days: u32) -> BackfillJob {
    let total_batches = days.div_ceil(batch_size_days);
    BackfillJob {
        id: "prop".into(),
        symbol: "EURUSD".into(),
        timeframe: Timeframe::H1,
        start,
        end: start + chrono::Duration::days(i64::from(days)),
        batch_size_days,
        priority: 0,
        status: JobStatus::Queued,
        total_batches,
        completed_batches: 0,
        errors: Vec::new(),
        warnings: Vec::new(),
        created_at: chrono::Utc::now(),
        started_at: None,
        completed_at: None,
        active: true,
    }
}

fn arb_start() -> impl Strategy<Value = NaiveDate> {
    (2000i32..2030, 1u32..13, 1u32..29)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

proptest! {
    /// Consecutive batch ranges are contiguous, start at the job start,
    /// and end exactly at the job end.
    #[test]
    fn batch_ranges_tile_the_window(
        start in arb_start(),
        days in 1u32..400,
        batch_size in 1u32..40,
    ) {
        let j = job(start, days, batch_size);
        let ranges: Vec<_> = (0..j.total_batches)
            .map(|n| j.batch_range(n).unwrap())
            .collect();

        prop_assert_eq!(ranges.first().unwrap().0, j.start);
        prop_assert_eq!(ranges.last().unwrap().1, j.end);
        for pair in ranges.windows(2) {
            prop_assert_eq!(pair[0].1, pair[1].0, "ranges must be contiguous");
        }
        for (from, to) in &ranges {
            prop_assert!(from < to, "every batch covers at least one day");
            prop_assert!(*to <= j.end);
        }
        prop_assert!(j.batch_range(j.total_batches).is_none());
    }

    /// Progress never leaves [0, 100], whatever the counters say.
    #[test]
    fn progress_stays_in_bounds(
        start in arb_start(),
        days in 0u32..400,
        batch_size in 1u32..40,
        completed in 0u32..500,
    ) {
        let mut j = job(start, days.max(1), batch_size);
        j.total_batches = days.div_ceil(batch_size); // may be 0 when days == 0
        j.completed_batches = completed;
        let p = j.progress();
        prop_assert!((0.0..=100.0).contains(&p), "progress out of bounds: {p}");
        if j.total_batches == 0 {
            prop_assert_eq!(p, 0.0);
        }
    }

    /// A completed job always reports exactly 100.
    #[test]
    fn completed_reports_exactly_100(
        start in arb_start(),
        days in 1u32..400,
        batch_size in 1u32..40,
    ) {
        let mut j = job(start, days, batch_size);
        j.transition(JobStatus::InProgress);
        j.completed_batches = j.total_batches;
        j.transition(JobStatus::Completed);
        prop_assert_eq!(j.progress(), 100.0);
    }
}
