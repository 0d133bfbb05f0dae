//! Backtest runner: wires together data loading, the simulator and metrics.
//!
//! Two entry points:
//! - `run_backtest()`: loads data per the config, then runs. Used by the CLI.
//! - `run_on_universe()`: pre-loaded data, no I/O. Used by sweeps.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use trendfolio_core::domain::{EquitySample, PortfolioState, SkippedSymbol, Trade, Universe};
use trendfolio_core::engine::RunDiagnostics;
use trendfolio_core::{simulate, ConfigError, EngineConfig, SimulationOutcome};

use crate::config::{run_id, BacktestConfig};
use crate::data_loader::{dataset_hash, load_data, LoadError};
use crate::metrics::{benchmark_curve, period_returns, MetricsConfig, PerformanceReport};
use crate::tail_metrics::{compute_tail_metrics, TailMetrics};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Load(#[from] LoadError),
    #[error("failed to compute parameter signature: {0}")]
    Signature(#[from] serde_json::Error),
}

/// Current schema version for persisted reports.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of one backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: String,
    pub dataset_hash: String,
    pub symbols: Vec<String>,
    pub engine: EngineConfig,
    pub metrics: PerformanceReport,
    pub tail: TailMetrics,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquitySample>,
    pub diagnostics: RunDiagnostics,
    pub skipped: Vec<SkippedSymbol>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Load the configured data and run one backtest.
pub fn run_backtest(config: &BacktestConfig) -> Result<RunReport, RunError> {
    config.validate()?;
    let universe = load_data(&config.data)?;
    run_report(&universe, &config.engine, &config.metrics)
}

/// Run one backtest over pre-loaded data and package the full report.
pub fn run_report(
    universe: &Universe,
    engine: &EngineConfig,
    metrics: &MetricsConfig,
) -> Result<RunReport, RunError> {
    let run_id = run_id(engine)?;
    let (outcome, report) = run_on_universe(universe, engine, metrics)?;
    let returns = period_returns(&outcome.equity_curve, engine.initial_capital, metrics.frequency);

    info!(
        run_id = %&run_id[..12],
        trades = report.trade_count,
        total_return = report.total_return,
        sharpe = report.sharpe,
        max_drawdown = report.max_drawdown,
        "backtest finished"
    );

    Ok(RunReport {
        schema_version: SCHEMA_VERSION,
        run_id,
        dataset_hash: dataset_hash(universe),
        symbols: universe.symbols().map(str::to_string).collect(),
        engine: engine.clone(),
        metrics: report,
        tail: compute_tail_metrics(&returns, metrics.var_confidence),
        trades: outcome.trades,
        equity_curve: outcome.equity_curve,
        diagnostics: outcome.diagnostics,
        skipped: universe.skipped().to_vec(),
    })
}

/// Simulate and compute metrics. No I/O.
///
/// The information ratio is measured against an equal-weight buy-and-hold of
/// the same universe over the same dates.
pub fn run_on_universe(
    universe: &Universe,
    engine: &EngineConfig,
    metrics: &MetricsConfig,
) -> Result<(SimulationOutcome, PerformanceReport), ConfigError> {
    let outcome = simulate(universe, engine, PortfolioState::new(engine.initial_capital))?;

    let dates: Vec<_> = outcome.equity_curve.iter().map(|s| s.date).collect();
    let benchmark = benchmark_curve(universe, &dates, engine.initial_capital);
    let report = PerformanceReport::compute(
        &outcome.equity_curve,
        &outcome.trades,
        engine.initial_capital,
        metrics,
        Some(&benchmark),
    );
    Ok((outcome, report))
}
