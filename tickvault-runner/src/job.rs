//! Backfill job model and state machine.
//!
//! Lifecycle: `Queued → InProgress → Completed | Failed`, with `Cancelled`
//! reachable from any non-terminal state. Terminal states absorb. Terminal
//! jobs are soft-deleted (`active = false`) and kept for audit.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }

    /// Whether the state machine permits `self -> next`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match (self, next) {
            (JobStatus::Queued, JobStatus::InProgress) => true,
            (JobStatus::InProgress, JobStatus::Completed | JobStatus::Failed) => true,
            (from, JobStatus::Cancelled) if !from.is_terminal() => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Queued => "QUEUED",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// A resumable historical-collection job. Everything needed to recompute
/// batch boundaries after a restart is persisted on the job itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillJob {
    pub id: String,
    pub symbol: String,
    pub timeframe: tickvault_core::domain::Timeframe,
    pub start: NaiveDate,
    /// Exclusive end date.
    pub end: NaiveDate,
    pub batch_size_days: u32,
    pub priority: u8,
    pub status: JobStatus,
    pub total_batches: u32,
    pub completed_batches: u32,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Soft-delete flag; terminal jobs are retained for audit.
    pub active: bool,
}

impl BackfillJob {
    /// Completion percentage, clamped to [0, 100]. A job with zero batches
    /// reports 0 until it is explicitly completed, and only a Completed
    /// job reports 100 — a full counter on a cancelled or failed job (a
    /// final in-flight batch landing after cancellation) stays just short.
    pub fn progress(&self) -> f64 {
        if self.status == JobStatus::Completed {
            return 100.0;
        }
        if self.total_batches == 0 {
            return 0.0;
        }
        (f64::from(self.completed_batches) / f64::from(self.total_batches) * 100.0)
            .clamp(0.0, 99.9)
    }

    /// Half-open date range `[from, to)` covered by batch `n`. Deterministic
    /// given the persisted job fields, so a restarted process resumes with
    /// identical boundaries.
    pub fn batch_range(&self, n: u32) -> Option<(NaiveDate, NaiveDate)> {
        if n >= self.total_batches {
            return None;
        }
        let size = i64::from(self.batch_size_days);
        let from = self.start + chrono::Duration::days(i64::from(n) * size);
        let to_candidate = from + chrono::Duration::days(size);
        let to = to_candidate.min(self.end);
        Some((from, to))
    }

    pub fn transition(&mut self, next: JobStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        let now = Utc::now();
        match next {
            JobStatus::InProgress => self.started_at = Some(now),
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled => {
                self.completed_at = Some(now);
                self.active = false;
            }
            JobStatus::Queued => {}
        }
        self.status = next;
        true
    }
}
