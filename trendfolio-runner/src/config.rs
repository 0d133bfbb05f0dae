//! Backtest configuration file.
//!
//! A TOML file with an `[engine]` table (the simulator's [`EngineConfig`]),
//! a `[data]` table (where bars come from), `[metrics]`, `[output]` and an
//! optional `[sweep]` grid. Every table has defaults, so a minimal file only
//! names its data source and rules.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use trendfolio_core::EngineConfig;

use crate::data_loader::LoadError;
use crate::metrics::MetricsConfig;
use crate::sweep::{ParamGrid, SweepUnit};
use crate::synthetic::SyntheticConfig;

pub use trendfolio_core::ConfigError;

/// Content hash identifying a parameter set (BLAKE3 hex).
pub type RunId = String;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub engine: EngineConfig,
    pub data: DataConfig,
    pub metrics: MetricsConfig,
    pub output: OutputConfig,
    pub sweep: SweepConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Directory of `<SYMBOL>.csv` files.
    pub dir: Option<PathBuf>,
    /// Symbols to load; empty loads every CSV in `dir`.
    pub symbols: Vec<String>,
    /// Generate a synthetic universe instead of reading files.
    pub synthetic: Option<SyntheticConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("results"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub grid: ParamGrid,
    pub unit: SweepUnit,
    /// JSONL checkpoint; defaults to `<output.dir>/sweep.jsonl`.
    pub checkpoint: Option<PathBuf>,
}

impl BacktestConfig {
    /// Read and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| LoadError::Toml {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        let conf = self.metrics.var_confidence;
        if !(conf > 0.0 && conf < 1.0) {
            return Err(ConfigError::InvalidPercentage {
                name: "metrics.var_confidence",
                value: conf,
            });
        }
        if !self.metrics.risk_free_rate.is_finite() {
            return Err(ConfigError::InvalidAmount {
                name: "metrics.risk_free_rate",
                value: self.metrics.risk_free_rate,
            });
        }
        Ok(())
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.sweep
            .checkpoint
            .clone()
            .unwrap_or_else(|| self.output.dir.join("sweep.jsonl"))
    }
}

/// Deterministic id of an engine parameter set.
///
/// Two configs that serialize identically share a run id.
pub fn run_id(engine: &EngineConfig) -> Result<RunId, serde_json::Error> {
    let json = serde_json::to_string(engine)?;
    Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
}
