//! TickVault Runner — warehouse lifecycle and backfill orchestration.
//!
//! This crate drives the warehouse built on `tickvault-core`:
//! - Tiered warehouse manager (move, merge, archive, cleanup, integrity,
//!   backup/restore, stats)
//! - Dead-letter queue with rotating JSONL segments
//! - Backfill job manager with a durable job registry
//! - Gap identification over stored history
//! - Pipeline configuration (TOML)

pub mod config;
pub mod dlq;
pub mod gaps;
pub mod job;
pub mod manager;
pub mod registry;
pub mod warehouse;
