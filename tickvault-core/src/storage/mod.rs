//! Table storage seam — format-agnostic row-batch persistence.
//!
//! The warehouse and job manager talk to `TableStorage` only; the Parquet
//! implementation is the default backend but nothing upstream depends on
//! the columnar encoding.

pub mod parquet;

pub use parquet::ParquetStorage;

use crate::domain::RecordBatch;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("no data file at {0}")]
    NotFound(PathBuf),
    #[error("storage I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("parquet: {0}")]
    Parquet(String),
    #[error("schema: {0}")]
    Schema(String),
    #[error("cannot append {incoming} rows onto a {existing} file")]
    KindMismatch {
        existing: &'static str,
        incoming: &'static str,
    },
}

/// What kind of rows a data file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    Bars,
    Ticks,
}

impl DataKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::Bars => "bars",
            DataKind::Ticks => "ticks",
        }
    }
}

/// Metadata about one stored data file.
#[derive(Debug, Clone)]
pub struct TableInfo {
    pub rows: usize,
    pub size_bytes: u64,
    pub kind: DataKind,
}

/// Row-batch persistence contract.
///
/// Implementations must be `Send + Sync`; callers hold `Arc<dyn
/// TableStorage>` and may read concurrently. Writes to the same path must
/// be serialized by the caller (the warehouse holds per-key locks).
pub trait TableStorage: Send + Sync {
    /// Write a batch to `path`, replacing any existing file atomically.
    fn write(&self, batch: &RecordBatch, path: &Path) -> Result<(), StorageError>;

    /// Load the full batch stored at `path`.
    fn read(&self, path: &Path) -> Result<RecordBatch, StorageError>;

    /// Append rows onto an existing file (or create it).
    fn append(&self, batch: &RecordBatch, path: &Path) -> Result<(), StorageError>;

    /// Row count, byte size, and data kind of the file at `path`.
    fn info(&self, path: &Path) -> Result<TableInfo, StorageError>;
}
