//! Parameter sweeps over a grid of engine configs.
//!
//! A sweep expands a [`ParamGrid`] against a base config and runs every
//! resulting parameter set, either once per symbol or once over the whole
//! universe. Units are independent, so they run on the rayon pool. Each
//! finished unit is appended to a [`Checkpoint`]; units already recorded
//! there are skipped, which makes an interrupted sweep resumable.

use std::cmp::Ordering;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use trendfolio_core::domain::Universe;
use trendfolio_core::EngineConfig;

use crate::checkpoint::{unit_key, Checkpoint, CheckpointError, CheckpointRecord, UnitStatus};
use crate::config::run_id;
use crate::metrics::MetricsConfig;
use crate::runner::run_on_universe;

#[derive(Debug, Error)]
pub enum SweepError {
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("failed to compute parameter signature: {0}")]
    Signature(#[from] serde_json::Error),

    #[error("parameter grid produced no valid configurations")]
    EmptyGrid,
}

/// Values to sweep. An empty list keeps the base config's value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamGrid {
    pub entry_periods: Vec<usize>,
    pub entry_multipliers: Vec<f64>,
    pub exit_periods: Vec<usize>,
    pub exit_multipliers: Vec<f64>,
    pub max_positions: Vec<usize>,
}

impl ParamGrid {
    /// Number of combinations before invalid ones are dropped.
    pub fn size(&self) -> usize {
        [
            self.entry_periods.len(),
            self.entry_multipliers.len(),
            self.exit_periods.len(),
            self.exit_multipliers.len(),
            self.max_positions.len(),
        ]
        .iter()
        .map(|n| (*n).max(1))
        .product()
    }

    /// Every valid combination applied to `base`, in grid order.
    pub fn generate(&self, base: &EngineConfig) -> Vec<EngineConfig> {
        let entry_periods = or_base(&self.entry_periods, base.entry_trend.period);
        let entry_mults = or_base(&self.entry_multipliers, base.entry_trend.multiplier);
        let exit_periods = or_base(&self.exit_periods, base.exit_trend.period);
        let exit_mults = or_base(&self.exit_multipliers, base.exit_trend.multiplier);
        let max_positions = or_base(&self.max_positions, base.max_positions);

        let mut configs = Vec::with_capacity(self.size());
        for &ep in &entry_periods {
            for &em in &entry_mults {
                for &xp in &exit_periods {
                    for &xm in &exit_mults {
                        for &mp in &max_positions {
                            let mut config = base.clone();
                            config.entry_trend.period = ep;
                            config.entry_trend.multiplier = em;
                            config.exit_trend.period = xp;
                            config.exit_trend.multiplier = xm;
                            config.max_positions = mp;
                            match config.validate() {
                                Ok(()) => configs.push(config),
                                Err(e) => debug!(error = %e, "skipping invalid grid point"),
                            }
                        }
                    }
                }
            }
        }
        configs
    }
}

fn or_base<T: Copy>(values: &[T], base: T) -> Vec<T> {
    if values.is_empty() {
        vec![base]
    } else {
        values.to_vec()
    }
}

/// What one sweep unit simulates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SweepUnit {
    /// One backtest per (parameter set, symbol).
    #[default]
    PerSymbol,
    /// One portfolio backtest per parameter set.
    Universe,
}

/// Outcome counts for a sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepSummary {
    pub total: usize,
    pub completed: usize,
    /// Already present in the checkpoint; not recomputed.
    pub resumed: usize,
    pub skipped: usize,
    pub failed: usize,
}

struct WorkItem<'a> {
    key: String,
    run_id: String,
    engine: &'a EngineConfig,
    symbol: Option<&'a str>,
}

/// Sweep executor.
pub struct Sweep<'a> {
    universe: &'a Universe,
    metrics: MetricsConfig,
    unit: SweepUnit,
    parallel: bool,
}

impl<'a> Sweep<'a> {
    pub fn new(universe: &'a Universe, metrics: MetricsConfig) -> Self {
        Self {
            universe,
            metrics,
            unit: SweepUnit::default(),
            parallel: true,
        }
    }

    pub fn with_unit(mut self, unit: SweepUnit) -> Self {
        self.unit = unit;
        self
    }

    /// Enables or disables parallel execution.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Run every unit of `configs` not already in `checkpoint`.
    pub fn run(
        &self,
        configs: &[EngineConfig],
        checkpoint: &Checkpoint,
    ) -> Result<SweepSummary, SweepError> {
        if configs.is_empty() {
            return Err(SweepError::EmptyGrid);
        }
        let items = self.plan(configs)?;
        let total = items.len();
        let (pending, done): (Vec<_>, Vec<_>) = items
            .into_iter()
            .partition(|item| !checkpoint.contains(&item.key));

        info!(
            total,
            pending = pending.len(),
            resumed = done.len(),
            parallel = self.parallel,
            "starting sweep"
        );

        let statuses: Vec<UnitStatus> = if self.parallel {
            pending
                .par_iter()
                .map(|item| self.run_unit(item, checkpoint))
                .collect::<Result<_, _>>()?
        } else {
            pending
                .iter()
                .map(|item| self.run_unit(item, checkpoint))
                .collect::<Result<_, _>>()?
        };

        let count = |status: UnitStatus| statuses.iter().filter(|s| **s == status).count();
        let summary = SweepSummary {
            total,
            completed: count(UnitStatus::Completed),
            resumed: done.len(),
            skipped: count(UnitStatus::Skipped),
            failed: count(UnitStatus::Failed),
        };
        info!(
            completed = summary.completed,
            resumed = summary.resumed,
            skipped = summary.skipped,
            failed = summary.failed,
            "sweep finished"
        );
        Ok(summary)
    }

    fn plan<'c>(&'c self, configs: &'c [EngineConfig]) -> Result<Vec<WorkItem<'c>>, SweepError> {
        let mut items = Vec::new();
        for engine in configs {
            let run_id = run_id(engine)?;
            match self.unit {
                SweepUnit::Universe => items.push(WorkItem {
                    key: unit_key(&run_id, None),
                    run_id,
                    engine,
                    symbol: None,
                }),
                SweepUnit::PerSymbol => {
                    for symbol in self.universe.symbols() {
                        items.push(WorkItem {
                            key: unit_key(&run_id, Some(symbol)),
                            run_id: run_id.clone(),
                            engine,
                            symbol: Some(symbol),
                        });
                    }
                }
            }
        }
        Ok(items)
    }

    fn run_unit(&self, item: &WorkItem<'_>, checkpoint: &Checkpoint) -> Result<UnitStatus, CheckpointError> {
        let single;
        let universe = match item.symbol {
            Some(symbol) => {
                single = single_symbol(self.universe, symbol);
                &single
            }
            None => self.universe,
        };

        let (status, report, error) = match run_on_universe(universe, item.engine, &self.metrics) {
            Ok((outcome, _)) if outcome.equity_curve.is_empty() => {
                (UnitStatus::Skipped, None, Some("no bars in window".to_string()))
            }
            Ok((_, report)) => (UnitStatus::Completed, Some(report), None),
            Err(e) => {
                warn!(key = %item.key, error = %e, "sweep unit failed");
                (UnitStatus::Failed, None, Some(e.to_string()))
            }
        };
        debug!(key = %item.key, ?status, "unit finished");

        checkpoint.append(&CheckpointRecord {
            key: item.key.clone(),
            run_id: item.run_id.clone(),
            symbol: item.symbol.map(str::to_string),
            status,
            engine: item.engine.clone(),
            report,
            error,
        })?;
        Ok(status)
    }
}

fn single_symbol(universe: &Universe, symbol: &str) -> Universe {
    let mut single = Universe::new();
    if let Some(series) = universe.get(symbol) {
        // A fresh universe cannot already hold the symbol.
        let _ = single.insert(series.clone());
    }
    single
}

/// Completed records, best Sharpe first (ties by key).
pub fn leaderboard(records: &[CheckpointRecord], top: usize) -> Vec<&CheckpointRecord> {
    let mut ranked: Vec<&CheckpointRecord> = records
        .iter()
        .filter(|r| r.status == UnitStatus::Completed && r.report.is_some())
        .collect();
    let sharpe = |r: &CheckpointRecord| r.report.as_ref().map_or(0.0, |m| m.sharpe);
    ranked.sort_by(|a, b| {
        sharpe(b)
            .partial_cmp(&sharpe(a))
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.key.cmp(&b.key))
    });
    ranked.truncate(top);
    ranked
}
