//! Domain types — bars, ticks, timeframes, and the instrument catalog.

pub mod catalog;
pub mod record;

pub use catalog::{Catalog, CatalogError};
pub use record::{Bar, RecordBatch, Tick, Timeframe};
