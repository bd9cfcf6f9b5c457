//! Parquet-backed `TableStorage`.
//!
//! Writes are atomic: the frame goes to a `.tmp` sibling which is renamed
//! into place, so a crash mid-write leaves either the old file or a stray
//! temp file, never a torn data file.

use super::{DataKind, StorageError, TableInfo, TableStorage};
use crate::domain::{Bar, RecordBatch, Tick, Timeframe};
use polars::prelude::*;
use std::fs;
use std::path::Path;

const BAR_COLUMNS: [&str; 8] = [
    "symbol", "timeframe", "ts", "open", "high", "low", "close", "volume",
];
const TICK_COLUMNS: [&str; 5] = ["symbol", "ts", "bid", "ask", "volume"];

/// The default storage backend.
#[derive(Debug, Clone, Default)]
pub struct ParquetStorage;

impl TableStorage for ParquetStorage {
    fn write(&self, batch: &RecordBatch, path: &Path) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let df = batch_to_dataframe(batch)?;
        let tmp_path = path.with_extension("parquet.tmp");
        write_parquet(&df, &tmp_path)?;

        fs::rename(&tmp_path, path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            StorageError::Io(e)
        })
    }

    fn read(&self, path: &Path) -> Result<RecordBatch, StorageError> {
        if !path.exists() {
            return Err(StorageError::NotFound(path.to_path_buf()));
        }
        let df = read_parquet(path)?;
        dataframe_to_batch(&df)
    }

    fn append(&self, batch: &RecordBatch, path: &Path) -> Result<(), StorageError> {
        if !path.exists() {
            return self.write(batch, path);
        }

        let existing = self.read(path)?;
        let combined = match (existing, batch) {
            (RecordBatch::Bars(mut have), RecordBatch::Bars(add)) => {
                have.extend(add.iter().cloned());
                RecordBatch::Bars(have)
            }
            (RecordBatch::Ticks(mut have), RecordBatch::Ticks(add)) => {
                have.extend(add.iter().cloned());
                RecordBatch::Ticks(have)
            }
            (RecordBatch::Bars(_), RecordBatch::Ticks(_)) => {
                return Err(StorageError::KindMismatch {
                    existing: "bars",
                    incoming: "ticks",
                })
            }
            (RecordBatch::Ticks(_), RecordBatch::Bars(_)) => {
                return Err(StorageError::KindMismatch {
                    existing: "ticks",
                    incoming: "bars",
                })
            }
        };
        self.write(&combined, path)
    }

    fn info(&self, path: &Path) -> Result<TableInfo, StorageError> {
        if !path.exists() {
            return Err(StorageError::NotFound(path.to_path_buf()));
        }
        let size_bytes = fs::metadata(path)?.len();
        let df = read_parquet(path)?;
        let kind = frame_kind(&df)?;
        Ok(TableInfo {
            rows: df.height(),
            size_bytes,
            kind,
        })
    }
}

fn write_parquet(df: &DataFrame, path: &Path) -> Result<(), StorageError> {
    let file = fs::File::create(path)?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| StorageError::Parquet(format!("write: {e}")))?;
    Ok(())
}

fn read_parquet(path: &Path) -> Result<DataFrame, StorageError> {
    let file = fs::File::open(path)?;
    ParquetReader::new(file)
        .finish()
        .map_err(|e| StorageError::Parquet(format!("read: {e}")))
}

fn frame_kind(df: &DataFrame) -> Result<DataKind, StorageError> {
    if df.column("bid").is_ok() {
        for col in &TICK_COLUMNS {
            if df.column(col).is_err() {
                return Err(StorageError::Schema(format!("missing column '{col}'")));
            }
        }
        Ok(DataKind::Ticks)
    } else {
        for col in &BAR_COLUMNS {
            if df.column(col).is_err() {
                return Err(StorageError::Schema(format!("missing column '{col}'")));
            }
        }
        Ok(DataKind::Bars)
    }
}

fn batch_to_dataframe(batch: &RecordBatch) -> Result<DataFrame, StorageError> {
    let df = match batch {
        RecordBatch::Bars(bars) => {
            let symbols: Vec<String> = bars.iter().map(|b| b.symbol.clone()).collect();
            let timeframes: Vec<String> =
                bars.iter().map(|b| b.timeframe.as_str().to_string()).collect();
            let ts: Vec<i64> = bars.iter().map(|b| b.ts).collect();
            let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
            let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
            let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
            let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
            let volumes: Vec<u64> = bars.iter().map(|b| b.volume).collect();

            DataFrame::new(vec![
                Column::new("symbol".into(), symbols),
                Column::new("timeframe".into(), timeframes),
                Column::new("ts".into(), ts),
                Column::new("open".into(), opens),
                Column::new("high".into(), highs),
                Column::new("low".into(), lows),
                Column::new("close".into(), closes),
                Column::new("volume".into(), volumes),
            ])
        }
        RecordBatch::Ticks(ticks) => {
            let symbols: Vec<String> = ticks.iter().map(|t| t.symbol.clone()).collect();
            let ts: Vec<i64> = ticks.iter().map(|t| t.ts).collect();
            let bids: Vec<f64> = ticks.iter().map(|t| t.bid).collect();
            let asks: Vec<f64> = ticks.iter().map(|t| t.ask).collect();
            let volumes: Vec<u64> = ticks.iter().map(|t| t.volume).collect();

            DataFrame::new(vec![
                Column::new("symbol".into(), symbols),
                Column::new("ts".into(), ts),
                Column::new("bid".into(), bids),
                Column::new("ask".into(), asks),
                Column::new("volume".into(), volumes),
            ])
        }
    };
    df.map_err(|e| StorageError::Parquet(format!("dataframe creation: {e}")))
}

fn dataframe_to_batch(df: &DataFrame) -> Result<RecordBatch, StorageError> {
    match frame_kind(df)? {
        DataKind::Bars => dataframe_to_bars(df).map(RecordBatch::Bars),
        DataKind::Ticks => dataframe_to_ticks(df).map(RecordBatch::Ticks),
    }
}

fn col_err(e: PolarsError) -> StorageError {
    StorageError::Parquet(format!("column read: {e}"))
}

fn dataframe_to_bars(df: &DataFrame) -> Result<Vec<Bar>, StorageError> {
    let symbols = df.column("symbol").map_err(col_err)?.str().map_err(col_err)?;
    let timeframes = df.column("timeframe").map_err(col_err)?.str().map_err(col_err)?;
    let ts = df.column("ts").map_err(col_err)?.i64().map_err(col_err)?;
    let opens = df.column("open").map_err(col_err)?.f64().map_err(col_err)?;
    let highs = df.column("high").map_err(col_err)?.f64().map_err(col_err)?;
    let lows = df.column("low").map_err(col_err)?.f64().map_err(col_err)?;
    let closes = df.column("close").map_err(col_err)?.f64().map_err(col_err)?;
    let volumes = df.column("volume").map_err(col_err)?.u64().map_err(col_err)?;

    let n = df.height();
    let mut bars = Vec::with_capacity(n);
    for i in 0..n {
        let tf_str = timeframes
            .get(i)
            .ok_or_else(|| StorageError::Schema(format!("null timeframe at row {i}")))?;
        let timeframe: Timeframe = tf_str
            .parse()
            .map_err(|e: String| StorageError::Schema(e))?;

        bars.push(Bar {
            symbol: symbols
                .get(i)
                .ok_or_else(|| StorageError::Schema(format!("null symbol at row {i}")))?
                .to_string(),
            timeframe,
            ts: ts
                .get(i)
                .ok_or_else(|| StorageError::Schema(format!("null ts at row {i}")))?,
            open: opens.get(i).unwrap_or(f64::NAN),
            high: highs.get(i).unwrap_or(f64::NAN),
            low: lows.get(i).unwrap_or(f64::NAN),
            close: closes.get(i).unwrap_or(f64::NAN),
            volume: volumes.get(i).unwrap_or(0),
        });
    }
    Ok(bars)
}

fn dataframe_to_ticks(df: &DataFrame) -> Result<Vec<Tick>, StorageError> {
    let symbols = df.column("symbol").map_err(col_err)?.str().map_err(col_err)?;
    let ts = df.column("ts").map_err(col_err)?.i64().map_err(col_err)?;
    let bids = df.column("bid").map_err(col_err)?.f64().map_err(col_err)?;
    let asks = df.column("ask").map_err(col_err)?.f64().map_err(col_err)?;
    let volumes = df.column("volume").map_err(col_err)?.u64().map_err(col_err)?;

    let n = df.height();
    let mut ticks = Vec::with_capacity(n);
    for i in 0..n {
        ticks.push(Tick {
            symbol: symbols
                .get(i)
                .ok_or_else(|| StorageError::Schema(format!("null symbol at row {i}")))?
                .to_string(),
            ts: ts
                .get(i)
                .ok_or_else(|| StorageError::Schema(format!("null ts at row {i}")))?,
            bid: bids.get(i).unwrap_or(f64::NAN),
            ask: asks.get(i).unwrap_or(f64::NAN),
            volume: volumes.get(i).unwrap_or(0),
        });
    }
    Ok(ticks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_bars() -> Vec<Bar> {
        vec![
            Bar {
                symbol: "EURUSD".into(),
                timeframe: Timeframe::H1,
                ts: 3_600,
                open: 1.0850,
                high: 1.0880,
                low: 1.0840,
                close: 1.0870,
                volume: 1_000,
            },
            Bar {
                symbol: "EURUSD".into(),
                timeframe: Timeframe::H1,
                ts: 7_200,
                open: 1.0870,
                high: 1.0895,
                low: 1.0860,
                close: 1.0890,
                volume: 1_100,
            },
        ]
    }

    fn sample_ticks() -> Vec<Tick> {
        vec![
            Tick { symbol: "EURUSD".into(), ts: 1, bid: 1.0850, ask: 1.0852, volume: 2 },
            Tick { symbol: "EURUSD".into(), ts: 2, bid: 1.0851, ask: 1.0853, volume: 1 },
        ]
    }

    #[test]
    fn bars_roundtrip_byte_identical() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bars.parquet");
        let storage = ParquetStorage;

        let batch = RecordBatch::Bars(sample_bars());
        storage.write(&batch, &path).unwrap();
        let loaded = storage.read(&path).unwrap();
        assert_eq!(batch, loaded);
    }

    #[test]
    fn ticks_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ticks.parquet");
        let storage = ParquetStorage;

        let batch = RecordBatch::Ticks(sample_ticks());
        storage.write(&batch, &path).unwrap();
        let loaded = storage.read(&path).unwrap();
        assert_eq!(batch, loaded);
    }

    #[test]
    fn read_missing_file_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let storage = ParquetStorage;
        let err = storage.read(&tmp.path().join("missing.parquet")).unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[test]
    fn append_extends_existing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bars.parquet");
        let storage = ParquetStorage;

        storage.write(&RecordBatch::Bars(sample_bars()), &path).unwrap();
        storage.append(&RecordBatch::Bars(sample_bars()), &path).unwrap();
        assert_eq!(storage.read(&path).unwrap().len(), 4);
    }

    #[test]
    fn append_creates_when_missing() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("fresh.parquet");
        let storage = ParquetStorage;
        storage.append(&RecordBatch::Bars(sample_bars()), &path).unwrap();
        assert_eq!(storage.read(&path).unwrap().len(), 2);
    }

    #[test]
    fn append_rejects_kind_mismatch() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bars.parquet");
        let storage = ParquetStorage;
        storage.write(&RecordBatch::Bars(sample_bars()), &path).unwrap();
        let err = storage
            .append(&RecordBatch::Ticks(sample_ticks()), &path)
            .unwrap_err();
        assert!(matches!(err, StorageError::KindMismatch { .. }));
    }

    #[test]
    fn info_reports_rows_and_kind() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bars.parquet");
        let storage = ParquetStorage;
        storage.write(&RecordBatch::Bars(sample_bars()), &path).unwrap();

        let info = storage.info(&path).unwrap();
        assert_eq!(info.rows, 2);
        assert_eq!(info.kind, DataKind::Bars);
        assert!(info.size_bytes > 0);
    }

    #[test]
    fn write_creates_parent_directories() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a/b/c/bars.parquet");
        let storage = ParquetStorage;
        storage.write(&RecordBatch::Bars(sample_bars()), &path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn no_temp_file_left_after_write() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bars.parquet");
        ParquetStorage.write(&RecordBatch::Bars(sample_bars()), &path).unwrap();
        assert!(!path.with_extension("parquet.tmp").exists());
    }
}
