//! Backfill manager — request intake, batch submission, cancellation, and
//! the fetch loop that drives a job against a market-data source.

use crate::dlq::{DeadLetterQueue, DlqEntry, DlqError};
use crate::job::{BackfillJob, JobStatus};
use crate::registry::{JobRegistry, RegistryError};
use crate::warehouse::{Tier, Warehouse, WarehouseError};
use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tickvault_core::domain::{Catalog, RecordBatch, Timeframe};
use tickvault_core::quality::{correct_batch, QualityEngine, QualityHistory};
use tickvault_core::source::{CircuitBreaker, MarketDataSource, RetryPolicy, SourceError};

#[derive(Debug, Error)]
pub enum JobError {
    #[error("unknown job id '{0}'")]
    NotFound(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("job '{id}' is {status} and not accepting batches")]
    NotAccepting { id: String, status: JobStatus },
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Warehouse(#[from] WarehouseError),
    #[error(transparent)]
    Dlq(#[from] DlqError),
}

/// A backfill request as received from the caller.
#[derive(Debug, Clone)]
pub struct BackfillRequest {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub start: NaiveDate,
    /// Exclusive end date.
    pub end: NaiveDate,
    pub batch_size_days: u32,
    pub priority: u8,
}

/// Read-only snapshot of one job for status queries and CLI output.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatusView {
    pub id: String,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub status: JobStatus,
    pub progress_pct: f64,
    pub completed_batches: u32,
    pub total_batches: u32,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub active: bool,
}

impl From<&BackfillJob> for JobStatusView {
    fn from(job: &BackfillJob) -> Self {
        Self {
            id: job.id.clone(),
            symbol: job.symbol.clone(),
            timeframe: job.timeframe,
            status: job.status,
            progress_pct: job.progress(),
            completed_batches: job.completed_batches,
            total_batches: job.total_batches,
            errors: job.errors.clone(),
            warnings: job.warnings.clone(),
            active: job.active,
        }
    }
}

/// Outcome of one submitted batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub batch_no: u32,
    pub rows_received: usize,
    pub rows_stored: usize,
    pub rows_rejected: usize,
    pub corrections_applied: usize,
    pub job_status: JobStatus,
    pub progress_pct: f64,
}

pub struct BackfillManager {
    catalog: Catalog,
    warehouse: Arc<Warehouse>,
    registry: JobRegistry,
    dlq: DeadLetterQueue,
    quality: QualityEngine,
    history: QualityHistory,
    retry: RetryPolicy,
    breaker: CircuitBreaker,
}

impl BackfillManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        catalog: Catalog,
        warehouse: Arc<Warehouse>,
        registry: JobRegistry,
        dlq: DeadLetterQueue,
        quality: QualityEngine,
        history: QualityHistory,
        retry: RetryPolicy,
        breaker: CircuitBreaker,
    ) -> Self {
        Self {
            catalog,
            warehouse,
            registry,
            dlq,
            quality,
            history,
            retry,
            breaker,
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn warehouse(&self) -> &Warehouse {
        &self.warehouse
    }

    /// Validate and enqueue a backfill request. Returns the new job id.
    pub fn request_backfill(&self, req: BackfillRequest) -> Result<String, JobError> {
        if !self.catalog.is_supported_symbol(&req.symbol) {
            return Err(JobError::InvalidArgument(format!(
                "symbol '{}' is not in the catalog",
                req.symbol
            )));
        }
        if !self.catalog.is_supported_timeframe(req.timeframe) {
            return Err(JobError::InvalidArgument(format!(
                "timeframe '{}' is not in the catalog",
                req.timeframe.as_str()
            )));
        }
        if req.start >= req.end {
            return Err(JobError::InvalidArgument(format!(
                "start {} must be before end {}",
                req.start, req.end
            )));
        }
        if req.batch_size_days == 0 {
            return Err(JobError::InvalidArgument(
                "batch size must be at least one day".into(),
            ));
        }

        let days = (req.end - req.start).num_days() as u32;
        let total_batches = days.div_ceil(req.batch_size_days);
        let id = job_id(&req);

        let job = BackfillJob {
            id: id.clone(),
            symbol: req.symbol,
            timeframe: req.timeframe,
            start: req.start,
            end: req.end,
            batch_size_days: req.batch_size_days,
            priority: req.priority,
            status: JobStatus::Queued,
            total_batches,
            completed_batches: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            active: true,
        };
        self.registry.insert(job)?;
        tracing::info!(id, total_batches, "backfill job queued");
        Ok(id)
    }

    /// Snapshot of a job. Errors only for an unknown id; a known job's own
    /// failures surface in its `errors` field, never as an `Err` here.
    pub fn job_status(&self, id: &str) -> Result<JobStatusView, JobError> {
        let job = self
            .registry
            .get(id)
            .ok_or_else(|| JobError::NotFound(id.to_string()))?;
        Ok(JobStatusView::from(&job))
    }

    /// Ingest one fetched batch for a job: validate, store the valid rows
    /// in the update tier, and advance progress. Invalid rows are counted
    /// and dropped, never stored and never fatal. A storage failure fails
    /// the job (already-stored batches are retained) and lands in the DLQ.
    pub fn submit_batch(
        &self,
        id: &str,
        batch_no: u32,
        batch: &RecordBatch,
    ) -> Result<BatchReport, JobError> {
        let job = self
            .registry
            .get(id)
            .ok_or_else(|| JobError::NotFound(id.to_string()))?;
        if job.status.is_terminal() {
            return Err(JobError::NotAccepting {
                id: id.to_string(),
                status: job.status,
            });
        }
        if batch_no >= job.total_batches {
            return Err(JobError::InvalidArgument(format!(
                "batch {batch_no} out of range (total {})",
                job.total_batches
            )));
        }
        if job.status == JobStatus::Queued {
            self.registry.update(id, |j| {
                j.transition(JobStatus::InProgress);
            })?;
        }

        let report = self.quality.validate(batch, None);
        let (candidate, corrections) = correct_batch(batch, self.quality.config().auto_correct);
        // Re-validate after correction so repaired rows are kept.
        let report = if corrections.is_empty() {
            report
        } else {
            self.quality.validate(&candidate, None)
        };
        let valid = candidate.without_rows(&report.invalid_rows);

        let rows_received = batch.len();
        let rows_stored = valid.len();
        let rows_rejected = rows_received - rows_stored;

        if !valid.is_empty() {
            if let Err(e) =
                self.warehouse
                    .stage_batch(Tier::Update, &job.symbol, job.timeframe, &valid)
            {
                let failed = self.registry.update(id, |j| {
                    j.errors.push(format!("batch {batch_no}: storage failure: {e}"));
                    j.transition(JobStatus::Failed);
                })?;
                self.dlq.record_failure(&storage_failure_entry(&failed, batch_no, &e))?;
                return Err(e.into());
            }
        }

        // Trend history is advisory; a failed append never fails the batch.
        if let Err(e) = self.history.record(
            &job.symbol,
            Some(job.timeframe),
            Utc::now().timestamp(),
            report.metrics,
        ) {
            tracing::warn!(id, error = %e, "quality history append failed");
        }

        let updated = self.registry.update(id, |j| {
            // A cancel that landed while this batch was in flight wins:
            // the job stays terminal and its counter stops moving.
            if j.status.is_terminal() {
                return;
            }
            j.completed_batches = (j.completed_batches + 1).min(j.total_batches);
            if rows_rejected > 0 {
                j.warnings
                    .push(format!("batch {batch_no}: {rows_rejected} invalid rows dropped"));
            }
            if j.completed_batches == j.total_batches {
                j.transition(JobStatus::Completed);
            }
        })?;

        Ok(BatchReport {
            batch_no,
            rows_received,
            rows_stored,
            rows_rejected,
            corrections_applied: corrections.len(),
            job_status: updated.status,
            progress_pct: updated.progress(),
        })
    }

    /// Cooperative cancellation: an in-flight batch finishes, later
    /// submissions are rejected.
    pub fn cancel(&self, id: &str) -> Result<JobStatusView, JobError> {
        let job = self
            .registry
            .get(id)
            .ok_or_else(|| JobError::NotFound(id.to_string()))?;
        if job.status.is_terminal() {
            return Err(JobError::InvalidArgument(format!(
                "job '{id}' is already {}",
                job.status
            )));
        }
        let updated = self.registry.update(id, |j| {
            j.transition(JobStatus::Cancelled);
        })?;
        tracing::info!(id, "backfill job cancelled");
        Ok(JobStatusView::from(&updated))
    }

    /// Drive a job to completion against a source: fetch each remaining
    /// batch with retry/backoff behind the circuit breaker, then submit
    /// it. Exhausted retries land in the DLQ and fail the job. Returns
    /// the final job view rather than erroring on a failed fetch.
    pub fn run_job(
        &self,
        id: &str,
        source: &dyn MarketDataSource,
    ) -> Result<JobStatusView, JobError> {
        let job = self
            .registry
            .get(id)
            .ok_or_else(|| JobError::NotFound(id.to_string()))?;

        for batch_no in job.completed_batches..job.total_batches {
            // Re-read between batches so cancellation takes effect.
            let current = self
                .registry
                .get(id)
                .ok_or_else(|| JobError::NotFound(id.to_string()))?;
            if current.status.is_terminal() {
                break;
            }
            let Some((from_date, to_date)) = current.batch_range(batch_no) else {
                break;
            };
            let from = epoch_secs(from_date);
            let to = epoch_secs(to_date);

            let fetched = self.retry.run(&self.breaker, || {
                source.fetch_bars(&current.symbol, current.timeframe, from, to)
            });
            match fetched {
                Ok(bars) => {
                    self.submit_batch(id, batch_no, &RecordBatch::Bars(bars))?;
                }
                Err(e) => {
                    let failed = self.registry.update(id, |j| {
                        j.errors.push(format!("batch {batch_no}: fetch failed: {e}"));
                        j.transition(JobStatus::Failed);
                    })?;
                    self.dlq
                        .record_failure(&fetch_failure_entry(&failed, batch_no, &e))?;
                    break;
                }
            }
        }

        self.job_status(id)
    }
}

fn job_id(req: &BackfillRequest) -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static SEQ: AtomicU64 = AtomicU64::new(0);

    let mut hasher = blake3::Hasher::new();
    hasher.update(req.symbol.as_bytes());
    hasher.update(req.timeframe.as_str().as_bytes());
    hasher.update(req.start.to_string().as_bytes());
    hasher.update(req.end.to_string().as_bytes());
    hasher.update(&req.batch_size_days.to_le_bytes());
    let nonce = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    hasher.update(&nonce.to_le_bytes());
    hasher.update(&SEQ.fetch_add(1, Ordering::Relaxed).to_le_bytes());
    hasher.finalize().to_hex()[..16].to_string()
}

fn epoch_secs(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

fn job_context(job: &BackfillJob, batch_no: u32) -> BTreeMap<String, String> {
    let mut context = BTreeMap::new();
    context.insert("job_id".into(), job.id.clone());
    context.insert("symbol".into(), job.symbol.clone());
    context.insert("timeframe".into(), job.timeframe.as_str().to_string());
    context.insert("batch_no".into(), batch_no.to_string());
    context
}

fn storage_failure_entry(job: &BackfillJob, batch_no: u32, err: &WarehouseError) -> DlqEntry {
    DlqEntry {
        ts: Utc::now().timestamp(),
        // Disk and schema problems do not fix themselves on retry.
        retryable: false,
        error_type: "storage".into(),
        error_message: err.to_string(),
        payload: String::new(),
        context: job_context(job, batch_no),
        stack_trace: None,
    }
}

fn fetch_failure_entry(job: &BackfillJob, batch_no: u32, err: &SourceError) -> DlqEntry {
    DlqEntry {
        ts: Utc::now().timestamp(),
        retryable: err.is_retryable(),
        error_type: "fetch".into(),
        error_message: err.to_string(),
        payload: String::new(),
        context: job_context(job, batch_no),
        stack_trace: None,
    }
}
