//! Market-data source seam.
//!
//! The feed itself is an external collaborator; this module defines the
//! contract plus two local implementations used for fixtures and demos
//! (CSV import and a seeded synthetic random walk), and the retry/circuit
//! breaker machinery that guards feed calls.

pub mod csv_source;
pub mod retry;
pub mod synthetic;

pub use csv_source::CsvSource;
pub use retry::{CircuitBreaker, RetryPolicy};
pub use synthetic::SyntheticSource;

use crate::domain::{Bar, Tick, Timeframe};
use thiserror::Error;

/// Structured error types for feed operations.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("feed connection: {0}")]
    Connection(String),

    #[error("feed timeout: {0}")]
    Timeout(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("feed response decode: {0}")]
    Decode(String),

    #[error("feed requests blocked (circuit breaker tripped)")]
    CircuitBreakerTripped,
}

impl SourceError {
    /// Whether a retry could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SourceError::Connection(_) | SourceError::Timeout(_))
    }
}

/// Upstream market-data feed contract.
///
/// Implementations use interior mutability for connection state so the
/// trait stays object-safe behind `&dyn MarketDataSource`.
pub trait MarketDataSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Establish the connection. Returns `true` once connected.
    fn connect(&self) -> Result<bool, SourceError>;

    /// Tear down the connection. Returns `true` once disconnected.
    fn disconnect(&self) -> Result<bool, SourceError>;

    fn is_connected(&self) -> bool;

    /// Fetch bars for `[from, to)` (epoch seconds).
    fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        from: i64,
        to: i64,
    ) -> Result<Vec<Bar>, SourceError>;

    /// Fetch ticks for `[from, to)` (epoch seconds).
    fn fetch_ticks(&self, symbol: &str, from: i64, to: i64) -> Result<Vec<Tick>, SourceError>;
}
