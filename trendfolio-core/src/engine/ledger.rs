//! Position ledger: cash, open positions, the trade log and last-known prices.
//!
//! All capital movement goes through here. Commission is `rate * notional`
//! on each leg; the entry leg is paid from cash at entry and both legs are
//! netted into the trade's PnL at exit.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::debug;

use crate::domain::{EntryReason, EquitySample, ExitReason, PortfolioState, Position, Trade};
use crate::sizing::share_count;

/// What the ledger did with an entry request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Opened,
    AlreadyOpen,
    NoSlot,
    NoAllocation,
    ZeroShares,
    InsufficientCash,
}

/// A sized entry, ready for admission.
#[derive(Debug, Clone)]
pub struct EntryRequest<'a> {
    pub symbol: &'a str,
    pub date: NaiveDate,
    pub index: usize,
    pub price: f64,
    pub allocation: f64,
    pub atr: Option<f64>,
    pub reason: EntryReason,
}

#[derive(Debug, Clone)]
pub struct PositionLedger {
    state: PortfolioState,
    trades: Vec<Trade>,
    commission_rate: f64,
    max_positions: usize,
    last_prices: BTreeMap<String, f64>,
}

impl PositionLedger {
    pub fn new(state: PortfolioState, commission_rate: f64, max_positions: usize) -> Self {
        Self {
            state,
            trades: Vec::new(),
            commission_rate,
            max_positions,
            last_prices: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> &PortfolioState {
        &self.state
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn cash(&self) -> f64 {
        self.state.cash
    }

    pub fn open_count(&self) -> usize {
        self.state.open_count()
    }

    pub fn has_capacity(&self) -> bool {
        self.open_count() < self.max_positions
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.state.positions.get(symbol).filter(|p| p.is_open())
    }

    /// Open symbols, in order.
    pub fn open_symbols(&self) -> Vec<String> {
        self.state
            .positions
            .values()
            .filter(|p| p.is_open())
            .map(|p| p.symbol.clone())
            .collect()
    }

    pub fn observe_price(&mut self, symbol: &str, close: f64) {
        self.last_prices.insert(symbol.to_string(), close);
    }

    pub fn last_price(&self, symbol: &str) -> Option<f64> {
        self.last_prices.get(symbol).copied()
    }

    fn commission(&self, notional: f64) -> f64 {
        self.commission_rate * notional
    }

    /// Advance an open position by one bar at `close`.
    pub fn mark(&mut self, symbol: &str, close: f64) {
        if let Some(pos) = self.state.positions.get_mut(symbol) {
            pos.mark(close);
        }
    }

    pub fn try_open(&mut self, req: EntryRequest<'_>) -> Admission {
        if self.state.has_position(req.symbol) {
            return Admission::AlreadyOpen;
        }
        if !self.has_capacity() {
            return Admission::NoSlot;
        }
        if !(req.allocation > 0.0) {
            return Admission::NoAllocation;
        }
        let shares = share_count(req.allocation, req.price);
        if shares == 0 {
            return Admission::ZeroShares;
        }
        let notional = shares as f64 * req.price;
        let commission = self.commission(notional);
        if self.state.cash < notional + commission {
            debug!(
                symbol = req.symbol,
                cash = self.state.cash,
                needed = notional + commission,
                "entry rejected: insufficient cash"
            );
            return Admission::InsufficientCash;
        }

        self.state.cash -= notional + commission;
        let position = Position::open(
            req.symbol.to_string(),
            req.date,
            req.index,
            req.price,
            shares,
            req.atr,
            req.reason,
            commission,
        );
        debug!(
            symbol = req.symbol,
            date = %req.date,
            price = req.price,
            shares,
            reason = %req.reason,
            "opened position"
        );
        self.state
            .positions
            .insert(req.symbol.to_string(), position);
        Admission::Opened
    }

    /// Close `symbol` at `price`. Returns the trade, or `None` if nothing was open.
    pub fn close(
        &mut self,
        symbol: &str,
        date: NaiveDate,
        price: f64,
        reason: ExitReason,
    ) -> Option<&Trade> {
        let mut position = self.state.positions.remove(symbol)?;
        let exit_commission = self.commission(position.market_value(price));
        let trade = position.close(date, price, reason, exit_commission);
        self.state.cash += position.market_value(price) - exit_commission;
        debug!(
            symbol,
            date = %date,
            price,
            pnl = trade.pnl,
            hold_days = trade.hold_days,
            reason = %reason,
            "closed position"
        );
        self.trades.push(trade);
        self.trades.last()
    }

    /// Append the end-of-bar equity sample.
    pub fn record_sample(&mut self, date: NaiveDate) -> &EquitySample {
        self.state.record_sample(date, &self.last_prices)
    }

    /// Close everything at last-known prices and restate the final sample.
    pub fn liquidate(&mut self, date: NaiveDate) -> usize {
        let symbols = self.open_symbols();
        for symbol in &symbols {
            let price = self
                .last_price(symbol)
                .or_else(|| self.position(symbol).map(|p| p.entry_price));
            if let Some(price) = price {
                self.close(symbol, date, price, ExitReason::EndOfBacktest);
            }
        }
        self.state.restate_last_sample(&self.last_prices);
        symbols.len()
    }

    pub fn into_parts(self) -> (PortfolioState, Vec<Trade>) {
        (self.state, self.trades)
    }
}
