//! Dead-letter queue — durable JSONL capture of pipeline failures.
//!
//! Entries append to a rotating set of segments named
//! `dlq-{created_millis}.jsonl`. Each `record_failure` flushes and fsyncs
//! before returning, so an acknowledged entry survives a crash. Rotation
//! happens before the write when the active segment is over the size
//! limit; an entry never spans two segments.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DlqError {
    #[error("dead-letter I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("dead-letter serialization: {0}")]
    Serde(#[from] serde_json::Error),
}

/// One captured failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqEntry {
    pub ts: i64,
    pub retryable: bool,
    pub error_type: String,
    pub error_message: String,
    /// Original payload. Binary payloads are rendered as base-16 text so
    /// every entry stays one valid JSON line.
    pub payload: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
}

impl DlqEntry {
    /// Render an arbitrary payload as text, hex-encoding when it is not
    /// valid UTF-8.
    pub fn render_payload(bytes: &[u8]) -> String {
        match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => bytes.iter().map(|b| format!("{b:02x}")).collect(),
        }
    }
}

/// Aggregate view over all retained segments.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DlqStatistics {
    pub total: usize,
    pub retryable: usize,
    pub non_retryable: usize,
    pub by_error_type: BTreeMap<String, usize>,
    pub oldest_ts: Option<i64>,
    pub newest_ts: Option<i64>,
    pub segments: usize,
}

pub struct DeadLetterQueue {
    dir: PathBuf,
    max_segment_bytes: u64,
}

impl DeadLetterQueue {
    pub fn new(dir: impl Into<PathBuf>, max_segment_bytes: u64) -> Self {
        Self {
            dir: dir.into(),
            max_segment_bytes: max_segment_bytes.max(1),
        }
    }

    /// Segment paths in creation order (the timestamp in the name sorts
    /// lexicographically within a run and numerically across runs).
    fn segments(&self) -> Result<Vec<PathBuf>, DlqError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut segments: Vec<(u128, PathBuf)> = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if let Some(created) = segment_created_millis(&path) {
                segments.push((created, path));
            }
        }
        segments.sort_by_key(|(created, _)| *created);
        Ok(segments.into_iter().map(|(_, p)| p).collect())
    }

    fn active_segment(&self) -> Result<PathBuf, DlqError> {
        let segments = self.segments()?;
        if let Some(last) = segments.last() {
            let size = fs::metadata(last)?.len();
            if size < self.max_segment_bytes {
                return Ok(last.clone());
            }
        }
        Ok(self.new_segment_path(&segments))
    }

    fn new_segment_path(&self, existing: &[PathBuf]) -> PathBuf {
        let mut millis = chrono::Utc::now().timestamp_millis().max(0) as u128;
        // Guard against two rotations within the same millisecond.
        while existing
            .iter()
            .any(|p| segment_created_millis(p) == Some(millis))
        {
            millis += 1;
        }
        self.dir.join(format!("dlq-{millis}.jsonl"))
    }

    /// Append one entry durably. Flushes and fsyncs before returning.
    pub fn record_failure(&self, entry: &DlqEntry) -> Result<(), DlqError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.active_segment()?;

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "{}", serde_json::to_string(entry)?)?;
        file.flush()?;
        file.sync_all()?;

        tracing::warn!(
            error_type = %entry.error_type,
            retryable = entry.retryable,
            segment = %path.display(),
            "failure recorded in dead-letter queue"
        );
        Ok(())
    }

    /// Entries across all segments in write order. Corrupt lines are
    /// skipped so one torn write cannot block triage of the rest.
    pub fn failures(
        &self,
        retryable_only: bool,
        limit: Option<usize>,
    ) -> Result<Vec<DlqEntry>, DlqError> {
        let cap = limit.unwrap_or(usize::MAX);
        let mut out = Vec::new();
        for segment in self.segments()? {
            let reader = BufReader::new(fs::File::open(&segment)?);
            for line in reader.lines() {
                if out.len() >= cap {
                    return Ok(out);
                }
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let Ok(entry) = serde_json::from_str::<DlqEntry>(&line) else {
                    continue;
                };
                if retryable_only && !entry.retryable {
                    continue;
                }
                out.push(entry);
            }
        }
        Ok(out)
    }

    pub fn statistics(&self) -> Result<DlqStatistics, DlqError> {
        let segments = self.segments()?;
        let mut stats = DlqStatistics {
            segments: segments.len(),
            ..Default::default()
        };
        for entry in self.failures(false, None)? {
            stats.total += 1;
            if entry.retryable {
                stats.retryable += 1;
            } else {
                stats.non_retryable += 1;
            }
            *stats.by_error_type.entry(entry.error_type).or_insert(0) += 1;
            stats.oldest_ts = Some(stats.oldest_ts.map_or(entry.ts, |t: i64| t.min(entry.ts)));
            stats.newest_ts = Some(stats.newest_ts.map_or(entry.ts, |t: i64| t.max(entry.ts)));
        }
        Ok(stats)
    }
}

fn segment_created_millis(path: &Path) -> Option<u128> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_prefix("dlq-")?.strip_suffix(".jsonl")?;
    stem.parse().ok()
}
