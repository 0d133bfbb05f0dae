//! Why a position was opened or closed.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryReason {
    Breakout,
    TrendUp,
    MomentumRankTop,
    BuyAndHold,
}

/// Exit reasons. Declaration order is evaluation priority: when several
/// conditions hold on the same bar, the earliest variant is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    StopLoss,
    ProfitTarget,
    TrailingStop,
    TrendReversal,
    Breakdown,
    MomentumRankLost,
    MaxHoldExpired,
    EndOfBacktest,
}

impl EntryReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Breakout => "BREAKOUT",
            Self::TrendUp => "TREND_UP",
            Self::MomentumRankTop => "MOMENTUM_RANK_TOP",
            Self::BuyAndHold => "BUY_AND_HOLD",
        }
    }
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StopLoss => "STOP_LOSS",
            Self::ProfitTarget => "PROFIT_TARGET",
            Self::TrailingStop => "TRAILING_STOP",
            Self::TrendReversal => "TREND_REVERSAL",
            Self::Breakdown => "BREAKDOWN",
            Self::MomentumRankLost => "MOMENTUM_RANK_LOST",
            Self::MaxHoldExpired => "MAX_HOLD_EXPIRED",
            Self::EndOfBacktest => "END_OF_BACKTEST",
        }
    }
}

impl fmt::Display for EntryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
