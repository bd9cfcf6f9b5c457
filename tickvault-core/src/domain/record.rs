//! Bar and Tick — the fundamental market data units.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bar timeframe. Serialized as the canonical string ("1m", "1h", ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
}

impl Timeframe {
    /// Expected bar-to-bar step in seconds.
    pub fn step_secs(&self) -> i64 {
        match self {
            Timeframe::M1 => 60,
            Timeframe::M5 => 300,
            Timeframe::M15 => 900,
            Timeframe::H1 => 3_600,
            Timeframe::H4 => 14_400,
            Timeframe::D1 => 86_400,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }

    /// All supported timeframes, smallest step first.
    pub fn all() -> &'static [Timeframe] {
        &[
            Timeframe::M1,
            Timeframe::M5,
            Timeframe::M15,
            Timeframe::H1,
            Timeframe::H4,
            Timeframe::D1,
        ]
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Timeframe::M1),
            "5m" => Ok(Timeframe::M5),
            "15m" => Ok(Timeframe::M15),
            "1h" | "H1" => Ok(Timeframe::H1),
            "4h" | "H4" => Ok(Timeframe::H4),
            "1d" | "D1" => Ok(Timeframe::D1),
            other => Err(format!("unknown timeframe '{other}'")),
        }
    }
}

/// OHLCV bar for a single symbol and timeframe.
///
/// `ts` is the bar end timestamp as UTC epoch seconds. Immutable once it
/// passes validation — the pipeline never edits stored rows in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub ts: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    /// Returns true if any price field is NaN (void bar).
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// OHLC sanity: high >= max(open, close) >= min(open, close) >= low >= 0.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.low >= 0.0
    }
}

/// Bid/ask tick for a single symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: String,
    pub ts: i64,
    pub bid: f64,
    pub ask: f64,
    pub volume: u64,
}

impl Tick {
    pub fn is_void(&self) -> bool {
        self.bid.is_nan() || self.ask.is_nan()
    }

    /// Tick sanity: ask >= bid, both positive and finite.
    pub fn is_sane(&self) -> bool {
        !self.is_void() && self.ask >= self.bid && self.bid > 0.0 && self.ask.is_finite()
    }
}

/// A batch of records of a single data kind.
///
/// Validation and storage operate on one kind at a time; the enum makes
/// mixed batches unrepresentable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecordBatch {
    Bars(Vec<Bar>),
    Ticks(Vec<Tick>),
}

impl RecordBatch {
    pub fn len(&self) -> usize {
        match self {
            RecordBatch::Bars(b) => b.len(),
            RecordBatch::Ticks(t) => t.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Timestamps in batch order.
    pub fn timestamps(&self) -> Vec<i64> {
        match self {
            RecordBatch::Bars(b) => b.iter().map(|x| x.ts).collect(),
            RecordBatch::Ticks(t) => t.iter().map(|x| x.ts).collect(),
        }
    }

    /// Keep only the rows whose index is not in `drop`, preserving order.
    pub fn without_rows(&self, drop: &[usize]) -> RecordBatch {
        let dropped: std::collections::HashSet<usize> = drop.iter().copied().collect();
        match self {
            RecordBatch::Bars(bars) => RecordBatch::Bars(
                bars.iter()
                    .enumerate()
                    .filter(|(i, _)| !dropped.contains(i))
                    .map(|(_, b)| b.clone())
                    .collect(),
            ),
            RecordBatch::Ticks(ticks) => RecordBatch::Ticks(
                ticks
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| !dropped.contains(i))
                    .map(|(_, t)| t.clone())
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bar() -> Bar {
        Bar {
            symbol: "EURUSD".into(),
            timeframe: Timeframe::H1,
            ts: 1_700_000_000,
            open: 1.0850,
            high: 1.0880,
            low: 1.0840,
            close: 1.0870,
            volume: 12_000,
        }
    }

    #[test]
    fn bar_is_sane() {
        assert!(sample_bar().is_sane());
    }

    #[test]
    fn bar_detects_void() {
        let mut bar = sample_bar();
        bar.close = f64::NAN;
        assert!(bar.is_void());
        assert!(!bar.is_sane());
    }

    #[test]
    fn bar_detects_inverted_high_low() {
        let mut bar = sample_bar();
        bar.high = 1.0830; // below low
        assert!(!bar.is_sane());
    }

    #[test]
    fn tick_requires_ask_at_least_bid() {
        let tick = Tick {
            symbol: "EURUSD".into(),
            ts: 1_700_000_000,
            bid: 1.0851,
            ask: 1.0849,
            volume: 1,
        };
        assert!(!tick.is_sane());
    }

    #[test]
    fn timeframe_roundtrip() {
        for tf in Timeframe::all() {
            let parsed: Timeframe = tf.as_str().parse().unwrap();
            assert_eq!(*tf, parsed);
        }
    }

    #[test]
    fn timeframe_serde_uses_canonical_string() {
        let json = serde_json::to_string(&Timeframe::H1).unwrap();
        assert_eq!(json, "\"1h\"");
        let back: Timeframe = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Timeframe::H1);
    }

    #[test]
    fn batch_without_rows_drops_by_index() {
        let bars = vec![sample_bar(), sample_bar(), sample_bar()];
        let batch = RecordBatch::Bars(bars);
        let kept = batch.without_rows(&[1]);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn bar_serialization_roundtrip() {
        let bar = sample_bar();
        let json = serde_json::to_string(&bar).unwrap();
        let deser: Bar = serde_json::from_str(&json).unwrap();
        assert_eq!(bar, deser);
    }
}
