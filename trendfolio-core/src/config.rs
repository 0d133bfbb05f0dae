//! Engine configuration and its validation.
//!
//! A config is checked once, before the first bar is simulated. Nothing in
//! the bar loop re-validates, so every invalid combination must be rejected
//! here.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ExitReason;
use crate::indicators::TrendParams;
use crate::signals::{EntryRule, ExitRule, MomentumParams};
use crate::sizing::SizingPolicy;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("initial_capital must be positive and finite, got {0}")]
    NonPositiveCapital(f64),

    #[error("commission_rate must be in [0, 1), got {0}")]
    CommissionOutOfRange(f64),

    #[error("max_positions must be at least 1")]
    ZeroMaxPositions,

    #[error("{name}: period must be at least 1")]
    ZeroPeriod { name: &'static str },

    #[error("{name}: multiplier must be positive and finite, got {value}")]
    InvalidMultiplier { name: &'static str, value: f64 },

    #[error("{name}: percentage out of range, got {value}")]
    InvalidPercentage { name: &'static str, value: f64 },

    #[error("{name}: must be positive and finite, got {value}")]
    InvalidAmount { name: &'static str, value: f64 },

    #[error("at least one entry rule is required")]
    NoEntryRules,

    #[error("exit rule {0} configured more than once")]
    DuplicateExitRule(ExitReason),

    #[error("tiered sizing needs at least one tier")]
    EmptyTiers,

    #[error("momentum exit_pct ({exit_pct}) must be >= entry_pct ({entry_pct})")]
    MomentumThresholds { entry_pct: f64, exit_pct: f64 },

    #[error("start_date {start} is after end_date {end}")]
    InvalidWindow { start: NaiveDate, end: NaiveDate },
}

/// Everything one simulation needs besides the price data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub initial_capital: f64,
    /// Fraction of notional charged on each leg.
    pub commission_rate: f64,
    pub max_positions: usize,
    pub sizing: SizingPolicy,
    pub entry_rules: Vec<EntryRule>,
    pub exit_rules: Vec<ExitRule>,
    pub entry_trend: TrendParams,
    pub exit_trend: TrendParams,
    /// ATR period recorded at entry for ATR stops.
    pub stop_atr_period: usize,
    pub momentum: MomentumParams,
    /// Dates before this only warm up indicators.
    pub start_date: Option<NaiveDate>,
    /// Bars after this are ignored.
    pub end_date: Option<NaiveDate>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_capital: 1_000_000.0,
            commission_rate: 0.0,
            max_positions: 50,
            sizing: SizingPolicy::default(),
            entry_rules: vec![EntryRule::TrendUp {
                require_flip: false,
            }],
            exit_rules: vec![ExitRule::TrendReversal],
            entry_trend: TrendParams::new(10, 3.0),
            exit_trend: TrendParams::new(30, 6.0),
            stop_atr_period: 14,
            momentum: MomentumParams::default(),
            start_date: None,
            end_date: None,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(ConfigError::NonPositiveCapital(self.initial_capital));
        }
        if !(self.commission_rate >= 0.0 && self.commission_rate < 1.0) {
            return Err(ConfigError::CommissionOutOfRange(self.commission_rate));
        }
        if self.max_positions == 0 {
            return Err(ConfigError::ZeroMaxPositions);
        }
        self.sizing.validate()?;

        if self.entry_rules.is_empty() {
            return Err(ConfigError::NoEntryRules);
        }
        for rule in &self.entry_rules {
            rule.validate()?;
        }
        let mut seen = Vec::with_capacity(self.exit_rules.len());
        for rule in &self.exit_rules {
            rule.validate()?;
            let reason = rule.reason();
            if seen.contains(&reason) {
                return Err(ConfigError::DuplicateExitRule(reason));
            }
            seen.push(reason);
        }

        self.entry_trend.validate("entry_trend")?;
        self.exit_trend.validate("exit_trend")?;
        if self.stop_atr_period == 0 {
            return Err(ConfigError::ZeroPeriod {
                name: "stop_atr_period",
            });
        }
        self.momentum.validate()?;

        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(ConfigError::InvalidWindow { start, end });
            }
        }
        Ok(())
    }
}
