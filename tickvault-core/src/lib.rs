//! TickVault Core — domain types, data quality, sources, and table storage.
//!
//! This crate contains the building blocks of the market-data warehouse:
//! - Domain types (bars, ticks, record batches, timeframes, the catalog)
//! - Three-level quality validation with outlier detection and scoring
//! - Auto-correction of repairable defects
//! - Quality trend history (append-only JSONL per series)
//! - Market-data source contract with CSV and synthetic implementations
//! - Retry policy and circuit breaker for feed calls
//! - Format-agnostic table storage with a Parquet backend

pub mod domain;
pub mod quality;
pub mod source;
pub mod storage;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types shared across worker threads are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::Tick>();
        require_sync::<domain::Tick>();
        require_send::<domain::RecordBatch>();
        require_sync::<domain::RecordBatch>();
        require_send::<domain::Timeframe>();
        require_sync::<domain::Timeframe>();
        require_send::<domain::Catalog>();
        require_sync::<domain::Catalog>();

        require_send::<quality::QualityEngine>();
        require_sync::<quality::QualityEngine>();
        require_send::<quality::ValidationReport>();
        require_sync::<quality::ValidationReport>();
        require_send::<quality::QualityHistory>();
        require_sync::<quality::QualityHistory>();

        require_send::<source::SyntheticSource>();
        require_sync::<source::SyntheticSource>();
        require_send::<source::CsvSource>();
        require_sync::<source::CsvSource>();
        require_send::<source::CircuitBreaker>();
        require_sync::<source::CircuitBreaker>();

        require_send::<storage::ParquetStorage>();
        require_sync::<storage::ParquetStorage>();
    }
}
