//! Entry and exit rule definitions.
//!
//! Rules are plain data, deserialized from config. Evaluation lives in
//! [`SignalEngine`](super::SignalEngine).

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::domain::{EntryReason, ExitReason};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryRule {
    /// Entry trend is up. With `require_flip`, only on the bar it turns up.
    TrendUp {
        #[serde(default)]
        require_flip: bool,
    },

    /// Close above the prior `lookback`-bar high on above-average volume.
    Breakout {
        lookback: usize,
        #[serde(default = "default_volume_multiplier")]
        volume_multiplier: f64,
        #[serde(default = "default_volume_lookback")]
        volume_lookback: usize,
        /// Also require close above its own simple moving average.
        #[serde(default)]
        trend_ma: Option<usize>,
    },

    /// In the top momentum bucket at a rebalance.
    MomentumRankTop,

    /// Unconditional.
    BuyAndHold,
}

fn default_volume_multiplier() -> f64 {
    1.5
}

fn default_volume_lookback() -> usize {
    20
}

impl EntryRule {
    pub fn reason(&self) -> EntryReason {
        match self {
            Self::TrendUp { .. } => EntryReason::TrendUp,
            Self::Breakout { .. } => EntryReason::Breakout,
            Self::MomentumRankTop => EntryReason::MomentumRankTop,
            Self::BuyAndHold => EntryReason::BuyAndHold,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Self::Breakout {
            lookback,
            volume_multiplier,
            volume_lookback,
            trend_ma,
        } = self
        {
            if *lookback == 0 {
                return Err(ConfigError::ZeroPeriod {
                    name: "breakout.lookback",
                });
            }
            if *volume_lookback == 0 {
                return Err(ConfigError::ZeroPeriod {
                    name: "breakout.volume_lookback",
                });
            }
            if trend_ma == &Some(0) {
                return Err(ConfigError::ZeroPeriod {
                    name: "breakout.trend_ma",
                });
            }
            if !(volume_multiplier.is_finite() && *volume_multiplier >= 0.0) {
                return Err(ConfigError::InvalidMultiplier {
                    name: "breakout.volume_multiplier",
                    value: *volume_multiplier,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopMethod {
    /// `value` is a fraction below the entry price.
    FixedPct,
    /// `value` is a multiple of the stop ATR at entry.
    Atr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitRule {
    StopLoss { method: StopMethod, value: f64 },
    ProfitTarget { pct: f64 },
    /// Close below the high-water mark by more than `pct`.
    TrailingStop { pct: f64 },
    /// Exit trend turns from up to down on this bar.
    TrendReversal,
    /// Close below the prior `lookback`-bar low.
    Breakdown { lookback: usize },
    /// Fell out of the momentum hold bucket at a rebalance.
    MomentumRankLost,
    MaxHold { bars: usize },
}

impl ExitRule {
    /// Reason recorded on exit. Its ordering is the evaluation priority.
    pub fn reason(&self) -> ExitReason {
        match self {
            Self::StopLoss { .. } => ExitReason::StopLoss,
            Self::ProfitTarget { .. } => ExitReason::ProfitTarget,
            Self::TrailingStop { .. } => ExitReason::TrailingStop,
            Self::TrendReversal => ExitReason::TrendReversal,
            Self::Breakdown { .. } => ExitReason::Breakdown,
            Self::MomentumRankLost => ExitReason::MomentumRankLost,
            Self::MaxHold { .. } => ExitReason::MaxHoldExpired,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::StopLoss {
                method: StopMethod::FixedPct,
                value,
            } => fraction("stop_loss.value", *value),
            Self::StopLoss {
                method: StopMethod::Atr,
                value,
            } => {
                if value.is_finite() && *value > 0.0 {
                    Ok(())
                } else {
                    Err(ConfigError::InvalidMultiplier {
                        name: "stop_loss.value",
                        value: *value,
                    })
                }
            }
            Self::ProfitTarget { pct } => {
                if pct.is_finite() && *pct > 0.0 {
                    Ok(())
                } else {
                    Err(ConfigError::InvalidPercentage {
                        name: "profit_target.pct",
                        value: *pct,
                    })
                }
            }
            Self::TrailingStop { pct } => fraction("trailing_stop.pct", *pct),
            Self::Breakdown { lookback: 0 } => Err(ConfigError::ZeroPeriod {
                name: "breakdown.lookback",
            }),
            Self::MaxHold { bars: 0 } => Err(ConfigError::ZeroPeriod {
                name: "max_hold.bars",
            }),
            _ => Ok(()),
        }
    }
}

/// Open interval (0, 1).
fn fraction(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidPercentage { name, value })
    }
}
