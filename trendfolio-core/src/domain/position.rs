//! Position: an open long holding and its lifecycle.
//!
//! `Open → Closed`. A closed position is never reopened; re-entering a symbol
//! creates a fresh `Position`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::reason::{EntryReason, ExitReason};
use super::trade::Trade;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub entry_date: NaiveDate,
    /// Bar index of the entry within the symbol's own series.
    pub entry_index: usize,
    pub entry_price: f64,
    pub shares: u64,
    pub highest_price_since_entry: f64,
    /// Stop ATR at entry, if it was warmed up.
    pub entry_atr: Option<f64>,
    /// Bars marked since entry; the entry bar itself is 0.
    pub bars_held: usize,
    pub entry_reason: EntryReason,
    pub entry_commission: f64,
    pub status: PositionStatus,
}

impl Position {
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        symbol: String,
        entry_date: NaiveDate,
        entry_index: usize,
        entry_price: f64,
        shares: u64,
        entry_atr: Option<f64>,
        entry_reason: EntryReason,
        entry_commission: f64,
    ) -> Self {
        Self {
            symbol,
            entry_date,
            entry_index,
            entry_price,
            shares,
            highest_price_since_entry: entry_price,
            entry_atr,
            bars_held: 0,
            entry_reason,
            entry_commission,
            status: PositionStatus::Open,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    /// Advance one bar: ratchet the high-water mark and count the bar.
    pub fn mark(&mut self, close: f64) {
        if close > self.highest_price_since_entry {
            self.highest_price_since_entry = close;
        }
        self.bars_held += 1;
    }

    pub fn cost_basis(&self) -> f64 {
        self.entry_price * self.shares as f64
    }

    pub fn market_value(&self, price: f64) -> f64 {
        price * self.shares as f64
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.shares as f64
    }

    /// Close the position and produce its trade record.
    pub fn close(
        &mut self,
        exit_date: NaiveDate,
        exit_price: f64,
        exit_reason: ExitReason,
        exit_commission: f64,
    ) -> Trade {
        self.status = PositionStatus::Closed;
        let commission = self.entry_commission + exit_commission;
        let pnl = (exit_price - self.entry_price) * self.shares as f64 - commission;
        let basis = self.cost_basis();
        let pnl_pct = if basis > 0.0 { pnl / basis } else { 0.0 };
        Trade {
            symbol: self.symbol.clone(),
            entry_date: self.entry_date,
            exit_date,
            entry_price: self.entry_price,
            exit_price,
            shares: self.shares,
            pnl,
            pnl_pct,
            hold_days: self.bars_held,
            entry_reason: self.entry_reason,
            exit_reason,
            commission,
        }
    }
}
