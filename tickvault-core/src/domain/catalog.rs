//! Instrument catalog — the supported symbol/timeframe registry.
//!
//! The catalog is an explicit object constructed once at startup and passed
//! by reference to consumers. It can be loaded from a TOML file or built
//! from the default FX/index set, and persists itself as JSON metadata
//! documents inside the warehouse metadata namespace.

use crate::domain::Timeframe;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("read catalog file: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse catalog TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("serialize catalog: {0}")]
    Json(#[from] serde_json::Error),
}

/// Supported instruments and timeframes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub symbols: BTreeSet<String>,
    pub timeframes: BTreeSet<Timeframe>,
}

impl Catalog {
    /// Default catalog: major FX pairs plus a few index CFDs, all timeframes.
    pub fn default_set() -> Self {
        let symbols = [
            "EURUSD", "GBPUSD", "USDJPY", "USDCHF", "AUDUSD", "USDCAD", "NZDUSD", "XAUUSD",
            "US500", "NAS100",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        Self {
            symbols,
            timeframes: Timeframe::all().iter().copied().collect(),
        }
    }

    /// Load a catalog from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn is_supported_symbol(&self, symbol: &str) -> bool {
        self.symbols.contains(symbol)
    }

    pub fn is_supported_timeframe(&self, timeframe: Timeframe) -> bool {
        self.timeframes.contains(&timeframe)
    }

    /// Write `instruments.json` and `timeframes.json` under `meta_dir`.
    pub fn persist(&self, meta_dir: &Path) -> Result<(), CatalogError> {
        std::fs::create_dir_all(meta_dir)?;
        let instruments = serde_json::to_string_pretty(&self.symbols)?;
        std::fs::write(meta_dir.join("instruments.json"), instruments)?;
        let timeframes = serde_json::to_string_pretty(&self.timeframes)?;
        std::fs::write(meta_dir.join("timeframes.json"), timeframes)?;
        Ok(())
    }
}
