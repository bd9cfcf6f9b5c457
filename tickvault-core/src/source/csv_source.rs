//! CSV-backed source for fixtures and offline imports.
//!
//! Expects one file per series under a root directory:
//! `{symbol}_{timeframe}.csv` with header `ts,open,high,low,close,volume`
//! and `{symbol}_ticks.csv` with header `ts,bid,ask,volume`.

use super::{MarketDataSource, SourceError};
use crate::domain::{Bar, Tick, Timeframe};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Deserialize)]
struct BarRow {
    ts: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: u64,
}

#[derive(Debug, Deserialize)]
struct TickRow {
    ts: i64,
    bid: f64,
    ask: f64,
    volume: u64,
}

pub struct CsvSource {
    root: PathBuf,
    connected: AtomicBool,
}

impl CsvSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            connected: AtomicBool::new(false),
        }
    }

    fn series_file(&self, symbol: &str, suffix: &str) -> Result<PathBuf, SourceError> {
        let path = self.root.join(format!("{symbol}_{suffix}.csv"));
        if !path.exists() {
            return Err(SourceError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        Ok(path)
    }

    fn ensure_connected(&self) -> Result<(), SourceError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(SourceError::Connection("source not connected".into()));
        }
        Ok(())
    }
}

fn open_reader(path: &Path) -> Result<csv::Reader<std::fs::File>, SourceError> {
    csv::Reader::from_path(path).map_err(|e| SourceError::Decode(e.to_string()))
}

impl MarketDataSource for CsvSource {
    fn name(&self) -> &str {
        "csv"
    }

    fn connect(&self) -> Result<bool, SourceError> {
        if !self.root.is_dir() {
            return Err(SourceError::Connection(format!(
                "csv root {} is not a directory",
                self.root.display()
            )));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(true)
    }

    fn disconnect(&self) -> Result<bool, SourceError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(true)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        from: i64,
        to: i64,
    ) -> Result<Vec<Bar>, SourceError> {
        self.ensure_connected()?;
        let path = self.series_file(symbol, timeframe.as_str())?;
        let mut reader = open_reader(&path)?;
        let mut bars = Vec::new();
        for row in reader.deserialize::<BarRow>() {
            let row = row.map_err(|e| SourceError::Decode(e.to_string()))?;
            if row.ts < from || row.ts >= to {
                continue;
            }
            bars.push(Bar {
                symbol: symbol.to_string(),
                timeframe,
                ts: row.ts,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            });
        }
        Ok(bars)
    }

    fn fetch_ticks(&self, symbol: &str, from: i64, to: i64) -> Result<Vec<Tick>, SourceError> {
        self.ensure_connected()?;
        let path = self.series_file(symbol, "ticks")?;
        let mut reader = open_reader(&path)?;
        let mut ticks = Vec::new();
        for row in reader.deserialize::<TickRow>() {
            let row = row.map_err(|e| SourceError::Decode(e.to_string()))?;
            if row.ts < from || row.ts >= to {
                continue;
            }
            ticks.push(Tick {
                symbol: symbol.to_string(),
                ts: row.ts,
                bid: row.bid,
                ask: row.ask,
                volume: row.volume,
            });
        }
        Ok(ticks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_fixture(dir: &Path) {
        fs::write(
            dir.join("EURUSD_1h.csv"),
            "ts,open,high,low,close,volume\n\
             3600,1.10,1.12,1.09,1.11,1000\n\
             7200,1.11,1.13,1.10,1.12,1200\n\
             10800,1.12,1.14,1.11,1.13,900\n",
        )
        .unwrap();
        fs::write(
            dir.join("EURUSD_ticks.csv"),
            "ts,bid,ask,volume\n\
             3600,1.1000,1.1002,10\n\
             3660,1.1001,1.1003,12\n",
        )
        .unwrap();
    }

    #[test]
    fn fetch_bars_honors_time_window() {
        let tmp = TempDir::new().unwrap();
        write_fixture(tmp.path());
        let source = CsvSource::new(tmp.path());
        source.connect().unwrap();

        let bars = source
            .fetch_bars("EURUSD", Timeframe::H1, 7200, 10800)
            .unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].ts, 7200);
        assert_eq!(bars[0].symbol, "EURUSD");
    }

    #[test]
    fn fetch_ticks_reads_fixture() {
        let tmp = TempDir::new().unwrap();
        write_fixture(tmp.path());
        let source = CsvSource::new(tmp.path());
        source.connect().unwrap();

        let ticks = source.fetch_ticks("EURUSD", 0, i64::MAX).unwrap();
        assert_eq!(ticks.len(), 2);
        assert!(ticks[0].ask >= ticks[0].bid);
    }

    #[test]
    fn unknown_symbol_is_not_retryable() {
        let tmp = TempDir::new().unwrap();
        let source = CsvSource::new(tmp.path());
        source.connect().unwrap();

        let err = source
            .fetch_bars("BOGUS", Timeframe::H1, 0, i64::MAX)
            .unwrap_err();
        assert!(matches!(err, SourceError::SymbolNotFound { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn fetch_without_connect_fails() {
        let tmp = TempDir::new().unwrap();
        write_fixture(tmp.path());
        let source = CsvSource::new(tmp.path());

        let err = source
            .fetch_bars("EURUSD", Timeframe::H1, 0, i64::MAX)
            .unwrap_err();
        assert!(matches!(err, SourceError::Connection(_)));
    }

    #[test]
    fn connect_rejects_missing_root() {
        let source = CsvSource::new("/nonexistent/csv/root");
        assert!(source.connect().is_err());
        assert!(!source.is_connected());
    }

    #[test]
    fn disconnect_blocks_further_fetches() {
        let tmp = TempDir::new().unwrap();
        write_fixture(tmp.path());
        let source = CsvSource::new(tmp.path());
        source.connect().unwrap();
        source.disconnect().unwrap();
        assert!(!source.is_connected());
        assert!(source.fetch_ticks("EURUSD", 0, i64::MAX).is_err());
    }
}
