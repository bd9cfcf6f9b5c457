//! Warehouse lifecycle manager.
//!
//! Layout: `{root}/{tier}/{instrument}/{timeframe}/*.parquet`, plus
//! `{root}/metadata/` for registry documents, `{root}/archive/{name}/` and
//! `{root}/backups/{name}/` for named copies.
//!
//! Writes to one (tier, instrument, timeframe) leaf are serialized through
//! a keyed lock map; operations on different leaves proceed concurrently.

use crate::config::RetentionConfig;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tickvault_core::domain::{RecordBatch, Timeframe};
use tickvault_core::storage::{StorageError, TableStorage};

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("warehouse I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("warehouse metadata: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("backup '{name}' hash mismatch for {file}")]
    HashMismatch { name: String, file: String },
    #[error("cannot merge mixed bar and tick files under one leaf")]
    MixedKinds,
}

/// Storage tiers, ordered by data freshness guarantees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Historical,
    Update,
    Realtime,
    Validated,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Historical => "historical",
            Tier::Update => "update",
            Tier::Realtime => "realtime",
            Tier::Validated => "validated",
        }
    }

    pub fn all() -> [Tier; 4] {
        [Tier::Historical, Tier::Update, Tier::Realtime, Tier::Validated]
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "historical" => Ok(Tier::Historical),
            "update" => Ok(Tier::Update),
            "realtime" => Ok(Tier::Realtime),
            "validated" => Ok(Tier::Validated),
            other => Err(format!("unknown tier '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MoveReport {
    pub files_moved: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStatus {
    Merged,
    NoData,
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeReport {
    pub status: MergeStatus,
    pub rows_merged: usize,
    pub update_files_consumed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveReport {
    pub files_copied: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupStatus {
    Cleaned,
    NoData,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanupReport {
    pub status: CleanupStatus,
    pub files_deleted: usize,
    pub bytes_freed: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub is_valid: bool,
    pub files_checked: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupManifest {
    pub created_at: i64,
    pub source_tier: Tier,
    /// Relative path -> blake3 hex digest.
    pub files: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackupReport {
    pub files_copied: usize,
    pub manifest_path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct RestoreReport {
    pub files_restored: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TierStats {
    pub files: usize,
    pub bytes: u64,
    pub by_instrument: BTreeMap<String, InstrumentStats>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct InstrumentStats {
    pub files: usize,
    pub bytes: u64,
    pub by_timeframe: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WarehouseStats {
    pub total_files: usize,
    pub total_bytes: u64,
    pub tiers: BTreeMap<String, TierStats>,
}

pub struct Warehouse {
    root: PathBuf,
    storage: Arc<dyn TableStorage>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Warehouse {
    pub fn new(root: impl Into<PathBuf>, storage: Arc<dyn TableStorage>) -> Self {
        Self {
            root: root.into(),
            storage,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.root.join("metadata")
    }

    pub fn tier_dir(&self, tier: Tier) -> PathBuf {
        self.root.join(tier.as_str())
    }

    pub fn leaf_dir(&self, tier: Tier, instrument: &str, timeframe: Timeframe) -> PathBuf {
        self.tier_dir(tier)
            .join(instrument)
            .join(timeframe.as_str())
    }

    fn lock_handle(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        locks.entry(key.to_string()).or_default().clone()
    }

    fn lock_for(&self, tier: Tier, instrument: &str, timeframe: Timeframe) -> Arc<Mutex<()>> {
        self.lock_handle(&leaf_key(tier, instrument, timeframe))
    }

    /// Lock handles for two leaves, ordered by key so every multi-leaf
    /// operation acquires them in the same order and cannot deadlock a
    /// concurrent one. The second handle is `None` when both leaves are
    /// the same key.
    fn lock_pair(
        &self,
        a: (Tier, &str, Timeframe),
        b: (Tier, &str, Timeframe),
    ) -> (Arc<Mutex<()>>, Option<Arc<Mutex<()>>>) {
        let key_a = leaf_key(a.0, a.1, a.2);
        let key_b = leaf_key(b.0, b.1, b.2);
        if key_a == key_b {
            return (self.lock_handle(&key_a), None);
        }
        let (first, second) = if key_a < key_b {
            (key_a, key_b)
        } else {
            (key_b, key_a)
        };
        (self.lock_handle(&first), Some(self.lock_handle(&second)))
    }

    /// Stage a batch into a tier as a new timestamp-named file. Later
    /// stages sort after earlier ones, which gives merge its keep-last
    /// ordering.
    pub fn stage_batch(
        &self,
        tier: Tier,
        instrument: &str,
        timeframe: Timeframe,
        batch: &RecordBatch,
    ) -> Result<PathBuf, WarehouseError> {
        let lock = self.lock_for(tier, instrument, timeframe);
        let _guard = lock.lock().unwrap_or_else(|p| p.into_inner());

        let dir = self.leaf_dir(tier, instrument, timeframe);
        fs::create_dir_all(&dir)?;
        let mut millis = chrono::Utc::now().timestamp_millis().max(0);
        let mut path = dir.join(format!("{millis}.parquet"));
        while path.exists() {
            millis += 1;
            path = dir.join(format!("{millis}.parquet"));
        }
        self.storage.write(batch, &path)?;
        tracing::info!(
            tier = %tier,
            instrument,
            timeframe = timeframe.as_str(),
            rows = batch.len(),
            "batch staged"
        );
        Ok(path)
    }

    /// Move every data file of one leaf to another tier.
    pub fn move_tier(
        &self,
        src: Tier,
        dst: Tier,
        instrument: &str,
        timeframe: Timeframe,
    ) -> Result<MoveReport, WarehouseError> {
        let (first, second) =
            self.lock_pair((src, instrument, timeframe), (dst, instrument, timeframe));
        let _first_guard = first.lock().unwrap_or_else(|p| p.into_inner());
        let _second_guard = second
            .as_ref()
            .map(|l| l.lock().unwrap_or_else(|p| p.into_inner()));

        let src_dir = self.leaf_dir(src, instrument, timeframe);
        let files = parquet_files(&src_dir)?;
        if files.is_empty() {
            return Err(WarehouseError::NotFound(format!(
                "no data under {}",
                src_dir.display()
            )));
        }

        let dst_dir = self.leaf_dir(dst, instrument, timeframe);
        fs::create_dir_all(&dst_dir)?;
        let mut moved = 0usize;
        for file in &files {
            let target = dst_dir.join(file.file_name().unwrap_or_default());
            fs::rename(file, &target)?;
            moved += 1;
        }
        tracing::info!(src = %src, dst = %dst, instrument, moved, "tier move complete");
        Ok(MoveReport { files_moved: moved })
    }

    /// Fold all staged update files into the historical table.
    ///
    /// Rows are deduplicated by timestamp keep-last: the row from the
    /// later file in scan order wins, and within one file a later row
    /// wins. The merged table is sorted ascending and written atomically;
    /// update files are cleared only after the write lands, so a retry
    /// after a crash re-merges the same inputs (idempotent).
    pub fn merge_update_to_historical(
        &self,
        instrument: &str,
        timeframe: Timeframe,
    ) -> Result<MergeReport, WarehouseError> {
        let (first, second) = self.lock_pair(
            (Tier::Update, instrument, timeframe),
            (Tier::Historical, instrument, timeframe),
        );
        let _first_guard = first.lock().unwrap_or_else(|p| p.into_inner());
        let _second_guard = second
            .as_ref()
            .map(|l| l.lock().unwrap_or_else(|p| p.into_inner()));

        let update_files = parquet_files(&self.leaf_dir(Tier::Update, instrument, timeframe))?;
        if update_files.is_empty() {
            return Ok(MergeReport {
                status: MergeStatus::NoData,
                rows_merged: 0,
                update_files_consumed: 0,
            });
        }

        let hist_path = self.historical_path(instrument, timeframe);
        let mut batches: Vec<RecordBatch> = Vec::new();
        if hist_path.exists() {
            batches.push(self.storage.read(&hist_path)?);
        }
        for file in &update_files {
            batches.push(self.storage.read(file)?);
        }

        let merged = merge_keep_last(batches)?;
        let rows = merged.len();
        self.storage.write(&merged, &hist_path)?;

        for file in &update_files {
            fs::remove_file(file)?;
        }

        tracing::info!(
            instrument,
            timeframe = timeframe.as_str(),
            rows,
            files = update_files.len(),
            "update tier merged into historical"
        );
        Ok(MergeReport {
            status: MergeStatus::Merged,
            rows_merged: rows,
            update_files_consumed: update_files.len(),
        })
    }

    pub fn historical_path(&self, instrument: &str, timeframe: Timeframe) -> PathBuf {
        self.leaf_dir(Tier::Historical, instrument, timeframe)
            .join("data.parquet")
    }

    /// Merged historical table for a series, or `None` when nothing has
    /// been merged yet.
    pub fn historical_batch(
        &self,
        instrument: &str,
        timeframe: Timeframe,
    ) -> Result<Option<RecordBatch>, WarehouseError> {
        let path = self.historical_path(instrument, timeframe);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(self.storage.read(&path)?))
    }

    /// Copy a leaf into `{root}/archive/{name}/...` without touching the
    /// source.
    pub fn archive(
        &self,
        src: Tier,
        name: &str,
        instrument: &str,
        timeframe: Timeframe,
    ) -> Result<ArchiveReport, WarehouseError> {
        let src_dir = self.leaf_dir(src, instrument, timeframe);
        let files = parquet_files(&src_dir)?;
        if files.is_empty() {
            return Err(WarehouseError::NotFound(format!(
                "no data under {}",
                src_dir.display()
            )));
        }

        let dst_dir = self
            .root
            .join("archive")
            .join(name)
            .join(instrument)
            .join(timeframe.as_str());
        fs::create_dir_all(&dst_dir)?;
        for file in &files {
            fs::copy(file, dst_dir.join(file.file_name().unwrap_or_default()))?;
        }
        Ok(ArchiveReport {
            files_copied: files.len(),
        })
    }

    /// Delete files in a tier whose modification time is older than the
    /// retention window. A missing tier directory is a no-op, not an
    /// error.
    pub fn cleanup(&self, tier: Tier, retention_days: u32) -> Result<CleanupReport, WarehouseError> {
        let dir = self.tier_dir(tier);
        if !dir.exists() {
            return Ok(CleanupReport {
                status: CleanupStatus::NoData,
                files_deleted: 0,
                bytes_freed: 0,
            });
        }

        let cutoff = std::time::SystemTime::now()
            - std::time::Duration::from_secs(u64::from(retention_days) * 86_400);
        let mut deleted = 0usize;
        let mut freed = 0u64;
        // Visit leaf by leaf under that leaf's write lock, so a concurrent
        // merge or move on the same key never loses a file mid-operation.
        for entry in fs::read_dir(&dir)? {
            let instrument_dir = entry?.path();
            if !instrument_dir.is_dir() {
                continue;
            }
            let instrument = instrument_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            for entry in fs::read_dir(&instrument_dir)? {
                let leaf = entry?.path();
                if !leaf.is_dir() {
                    continue;
                }
                let tf = leaf
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let lock = self.lock_handle(&format!("{tier}/{instrument}/{tf}"));
                let _guard = lock.lock().unwrap_or_else(|p| p.into_inner());
                for file in parquet_files(&leaf)? {
                    let meta = fs::metadata(&file)?;
                    if meta.modified()? < cutoff {
                        freed += meta.len();
                        fs::remove_file(&file)?;
                        deleted += 1;
                    }
                }
            }
        }
        tracing::info!(tier = %tier, deleted, freed, "cleanup complete");
        Ok(CleanupReport {
            status: CleanupStatus::Cleaned,
            files_deleted: deleted,
            bytes_freed: freed,
        })
    }

    /// Check every data file of a leaf. Empty files, unreadable files, and
    /// NaN prices are errors; duplicate or non-monotonic timestamps are
    /// warnings. `is_valid` reflects errors only.
    pub fn validate_integrity(
        &self,
        tier: Tier,
        instrument: &str,
        timeframe: Timeframe,
    ) -> Result<IntegrityReport, WarehouseError> {
        let dir = self.leaf_dir(tier, instrument, timeframe);
        let files = parquet_files(&dir)?;

        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for file in &files {
            let label = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let batch = match self.storage.read(file) {
                Ok(batch) => batch,
                Err(e) => {
                    errors.push(format!("{label}: unreadable ({e})"));
                    continue;
                }
            };
            if batch.is_empty() {
                errors.push(format!("{label}: empty file"));
                continue;
            }
            let nan_rows = match &batch {
                RecordBatch::Bars(bars) => bars.iter().filter(|b| b.is_void()).count(),
                RecordBatch::Ticks(ticks) => ticks.iter().filter(|t| t.is_void()).count(),
            };
            if nan_rows > 0 {
                errors.push(format!("{label}: {nan_rows} rows with NaN prices"));
            }

            let timestamps = batch.timestamps();
            let mut seen = std::collections::HashSet::new();
            let duplicates = timestamps.iter().filter(|ts| !seen.insert(**ts)).count();
            if duplicates > 0 {
                warnings.push(format!("{label}: {duplicates} duplicate timestamps"));
            }
            if timestamps.windows(2).any(|w| w[0] > w[1]) {
                warnings.push(format!("{label}: timestamps not monotonically increasing"));
            }
        }

        Ok(IntegrityReport {
            is_valid: errors.is_empty(),
            files_checked: files.len(),
            errors,
            warnings,
        })
    }

    /// Copy a tier (optionally filtered by instrument/timeframe) into
    /// `{root}/backups/{name}/` with a blake3 manifest.
    pub fn backup(
        &self,
        src: Tier,
        name: &str,
        instruments: Option<&[String]>,
        timeframes: Option<&[Timeframe]>,
    ) -> Result<BackupReport, WarehouseError> {
        let src_dir = self.tier_dir(src);
        let backup_dir = self.root.join("backups").join(name);
        fs::create_dir_all(&backup_dir)?;

        let mut manifest = BackupManifest {
            created_at: chrono::Utc::now().timestamp(),
            source_tier: src,
            files: BTreeMap::new(),
        };

        let mut copied = 0usize;
        for file in walk_parquet_files(&src_dir)? {
            let rel = file
                .strip_prefix(&src_dir)
                .map_err(|_| WarehouseError::NotFound(file.display().to_string()))?;
            if !rel_matches(rel, instruments, timeframes) {
                continue;
            }
            let target = backup_dir.join(rel);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&file, &target)?;
            let hash = blake3::hash(&fs::read(&target)?).to_hex().to_string();
            manifest.files.insert(rel.to_string_lossy().into_owned(), hash);
            copied += 1;
        }

        let manifest_path = backup_dir.join("manifest.json");
        let tmp = backup_dir.join("manifest.json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&manifest)?)?;
        fs::rename(&tmp, &manifest_path)?;

        tracing::info!(name, copied, "backup written");
        Ok(BackupReport {
            files_copied: copied,
            manifest_path,
        })
    }

    /// Restore a named backup into a tier, verifying manifest hashes.
    pub fn restore(
        &self,
        name: &str,
        dst: Tier,
        instruments: Option<&[String]>,
        timeframes: Option<&[Timeframe]>,
    ) -> Result<RestoreReport, WarehouseError> {
        let backup_dir = self.root.join("backups").join(name);
        let manifest_path = backup_dir.join("manifest.json");
        if !manifest_path.exists() {
            return Err(WarehouseError::NotFound(format!("backup '{name}'")));
        }
        let manifest: BackupManifest = serde_json::from_slice(&fs::read(&manifest_path)?)?;

        let dst_dir = self.tier_dir(dst);
        let mut restored = 0usize;
        for (rel, expected_hash) in &manifest.files {
            let rel_path = Path::new(rel);
            if !rel_matches(rel_path, instruments, timeframes) {
                continue;
            }
            let source = backup_dir.join(rel_path);
            let bytes = fs::read(&source)?;
            let actual = blake3::hash(&bytes).to_hex().to_string();
            if &actual != expected_hash {
                return Err(WarehouseError::HashMismatch {
                    name: name.to_string(),
                    file: rel.clone(),
                });
            }
            let target = dst_dir.join(rel_path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, bytes)?;
            restored += 1;
        }

        tracing::info!(name, restored, dst = %dst, "backup restored");
        Ok(RestoreReport {
            files_restored: restored,
        })
    }

    /// Per-tier file and byte totals with per-instrument breakdown. Reads
    /// only; instrument directories are scanned in parallel.
    pub fn stats(&self) -> Result<WarehouseStats, WarehouseError> {
        let mut stats = WarehouseStats::default();

        for tier in Tier::all() {
            let tier_dir = self.tier_dir(tier);
            if !tier_dir.exists() {
                continue;
            }

            let instrument_dirs: Vec<PathBuf> = fs::read_dir(&tier_dir)?
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.is_dir())
                .collect();

            let per_instrument: Vec<(String, InstrumentStats)> = instrument_dirs
                .par_iter()
                .map(|dir| {
                    let name = dir
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    (name, instrument_stats(dir))
                })
                .collect();

            let mut tier_stats = TierStats::default();
            for (name, inst) in per_instrument {
                tier_stats.files += inst.files;
                tier_stats.bytes += inst.bytes;
                tier_stats.by_instrument.insert(name, inst);
            }
            stats.total_files += tier_stats.files;
            stats.total_bytes += tier_stats.bytes;
            stats.tiers.insert(tier.as_str().to_string(), tier_stats);
        }

        Ok(stats)
    }
}

/// Dedup concatenated batches by timestamp keep-last and sort ascending.
fn leaf_key(tier: Tier, instrument: &str, timeframe: Timeframe) -> String {
    format!("{tier}/{instrument}/{}", timeframe.as_str())
}

fn merge_keep_last(batches: Vec<RecordBatch>) -> Result<RecordBatch, WarehouseError> {
    let all_bars = batches.iter().all(|b| matches!(b, RecordBatch::Bars(_)));
    let all_ticks = batches.iter().all(|b| matches!(b, RecordBatch::Ticks(_)));
    if !all_bars && !all_ticks {
        return Err(WarehouseError::MixedKinds);
    }

    if all_bars {
        let mut by_ts: BTreeMap<i64, tickvault_core::domain::Bar> = BTreeMap::new();
        for batch in batches {
            if let RecordBatch::Bars(bars) = batch {
                for bar in bars {
                    by_ts.insert(bar.ts, bar);
                }
            }
        }
        Ok(RecordBatch::Bars(by_ts.into_values().collect()))
    } else {
        let mut by_ts: BTreeMap<i64, tickvault_core::domain::Tick> = BTreeMap::new();
        for batch in batches {
            if let RecordBatch::Ticks(ticks) = batch {
                for tick in ticks {
                    by_ts.insert(tick.ts, tick);
                }
            }
        }
        Ok(RecordBatch::Ticks(by_ts.into_values().collect()))
    }
}

/// Direct children of `dir` ending in `.parquet`, sorted by file name.
fn parquet_files(dir: &Path) -> Result<Vec<PathBuf>, WarehouseError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "parquet"))
        .collect();
    files.sort();
    Ok(files)
}

/// All `.parquet` files under `dir`, recursively.
fn walk_parquet_files(dir: &Path) -> Result<Vec<PathBuf>, WarehouseError> {
    let mut out = Vec::new();
    if !dir.exists() {
        return Ok(out);
    }
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().is_some_and(|ext| ext == "parquet") {
                out.push(path);
            }
        }
    }
    out.sort();
    Ok(out)
}

/// Filter on the `{instrument}/{timeframe}/{file}` relative layout.
fn rel_matches(
    rel: &Path,
    instruments: Option<&[String]>,
    timeframes: Option<&[Timeframe]>,
) -> bool {
    let mut components = rel.components().map(|c| c.as_os_str().to_string_lossy());
    let instrument = components.next().unwrap_or_default();
    let timeframe = components.next().unwrap_or_default();

    if let Some(wanted) = instruments {
        if !wanted.iter().any(|i| i == instrument.as_ref()) {
            return false;
        }
    }
    if let Some(wanted) = timeframes {
        if !wanted.iter().any(|tf| tf.as_str() == timeframe.as_ref()) {
            return false;
        }
    }
    true
}

fn instrument_stats(dir: &Path) -> InstrumentStats {
    let mut stats = InstrumentStats::default();
    let Ok(files) = walk_parquet_files(dir) else {
        return stats;
    };
    for file in files {
        stats.files += 1;
        stats.bytes += fs::metadata(&file).map(|m| m.len()).unwrap_or(0);
        if let Some(tf) = file
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
        {
            *stats.by_timeframe.entry(tf).or_insert(0) += 1;
        }
    }
    stats
}

/// Apply the per-tier retention policy.
pub fn run_retention(
    warehouse: &Warehouse,
    retention: &RetentionConfig,
) -> Result<BTreeMap<String, CleanupReport>, WarehouseError> {
    let mut reports = BTreeMap::new();
    for (tier, days) in [
        (Tier::Update, retention.update_days),
        (Tier::Realtime, retention.realtime_days),
    ] {
        reports.insert(tier.as_str().to_string(), warehouse.cleanup(tier, days)?);
    }
    Ok(reports)
}
