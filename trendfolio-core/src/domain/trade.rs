//! Trade: an immutable record of a closed round trip.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::reason::{EntryReason, ExitReason};

/// A completed long round trip.
///
/// `pnl` is net of `commission` (both legs); with a zero commission rate it is
/// exactly `(exit_price - entry_price) * shares`. `hold_days` counts bars held.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub symbol: String,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub entry_price: f64,
    pub exit_price: f64,
    pub shares: u64,
    pub pnl: f64,
    /// Net PnL as a fraction of the entry notional.
    pub pnl_pct: f64,
    pub hold_days: usize,
    pub entry_reason: EntryReason,
    pub exit_reason: ExitReason,
    pub commission: f64,
}

impl Trade {
    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn is_loser(&self) -> bool {
        self.pnl < 0.0
    }

    pub fn entry_notional(&self) -> f64 {
        self.entry_price * self.shares as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_trade(pnl: f64) -> Trade {
        Trade {
            symbol: "SPY".into(),
            entry_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            exit_date: NaiveDate::from_ymd_opt(2024, 1, 12).unwrap(),
            entry_price: 100.0,
            exit_price: 100.0 + pnl / 10.0,
            shares: 10,
            pnl,
            pnl_pct: pnl / 1000.0,
            hold_days: 8,
            entry_reason: EntryReason::TrendUp,
            exit_reason: ExitReason::TrendReversal,
            commission: 0.0,
        }
    }

    #[test]
    fn winner_and_loser() {
        assert!(sample_trade(50.0).is_winner());
        assert!(sample_trade(-50.0).is_loser());
        let flat = sample_trade(0.0);
        assert!(!flat.is_winner() && !flat.is_loser());
    }

    #[test]
    fn notional() {
        assert_eq!(sample_trade(0.0).entry_notional(), 1000.0);
    }
}
