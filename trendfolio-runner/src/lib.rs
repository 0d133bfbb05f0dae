//! Trendfolio runner: backtest orchestration, metrics, sweeps and artifacts.
//!
//! This crate builds on `trendfolio-core` to provide:
//! - TOML config loading and validation
//! - CSV and synthetic data loading
//! - Single-backtest runner with performance and tail metrics
//! - Checkpointed parallel parameter sweeps
//! - JSON and CSV export

pub mod checkpoint;
pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod runner;
pub mod sweep;
pub mod synthetic;
pub mod tail_metrics;

pub use checkpoint::{Checkpoint, CheckpointError, CheckpointRecord, UnitStatus};
pub use config::{run_id, BacktestConfig, ConfigError, DataConfig};
pub use data_loader::{dataset_hash, load_data, LoadError};
pub use metrics::{MetricsConfig, PerformanceReport, ReturnFrequency};
pub use runner::{run_backtest, run_on_universe, run_report, RunError, RunReport};
pub use sweep::{leaderboard, ParamGrid, Sweep, SweepError, SweepSummary, SweepUnit};
pub use synthetic::SyntheticConfig;
pub use tail_metrics::TailMetrics;
