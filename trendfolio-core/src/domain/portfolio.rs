//! Portfolio state: cash, open positions and the equity curve.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::position::Position;

/// One point of the equity curve, taken after the bar's mark-to-market.
///
/// `equity == cash + position_value` holds for every sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquitySample {
    pub date: NaiveDate,
    pub cash: f64,
    pub position_value: f64,
    pub equity: f64,
    pub running_peak: f64,
    /// `(equity - running_peak) / running_peak`, always `<= 0`.
    pub drawdown: f64,
    pub open_count: usize,
}

/// Aggregate state for one backtest. Owned by exactly one simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    pub initial_capital: f64,
    pub cash: f64,
    pub positions: BTreeMap<String, Position>,
    pub equity_curve: Vec<EquitySample>,
}

impl PortfolioState {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            cash: initial_capital,
            positions: BTreeMap::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn open_count(&self) -> usize {
        self.positions.values().filter(|p| p.is_open()).count()
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.get(symbol).is_some_and(Position::is_open)
    }

    /// Sum of position values at the given last-known prices.
    ///
    /// A symbol without a known price is valued at its entry price.
    pub fn position_value(&self, last_prices: &BTreeMap<String, f64>) -> f64 {
        self.positions
            .values()
            .map(|pos| {
                let price = last_prices
                    .get(&pos.symbol)
                    .copied()
                    .unwrap_or(pos.entry_price);
                pos.market_value(price)
            })
            .sum()
    }

    pub fn equity(&self, last_prices: &BTreeMap<String, f64>) -> f64 {
        self.cash + self.position_value(last_prices)
    }

    /// Highest equity observed so far, seeded with initial capital.
    pub fn running_peak(&self) -> f64 {
        self.equity_curve
            .last()
            .map_or(self.initial_capital, |s| s.running_peak)
    }

    /// Append a sample for `date` valued at `last_prices`.
    pub fn record_sample(
        &mut self,
        date: NaiveDate,
        last_prices: &BTreeMap<String, f64>,
    ) -> &EquitySample {
        let prior_peak = self.running_peak();
        let sample = self.sample(date, prior_peak, last_prices);
        self.equity_curve.push(sample);
        &self.equity_curve[self.equity_curve.len() - 1]
    }

    /// Recompute the last sample in place from the current cash and positions.
    pub fn restate_last_sample(&mut self, last_prices: &BTreeMap<String, f64>) {
        let Some(last) = self.equity_curve.last() else {
            return;
        };
        let date = last.date;
        let n = self.equity_curve.len();
        let prior_peak = if n >= 2 {
            self.equity_curve[n - 2].running_peak
        } else {
            self.initial_capital
        };
        let sample = self.sample(date, prior_peak, last_prices);
        self.equity_curve[n - 1] = sample;
    }

    fn sample(
        &self,
        date: NaiveDate,
        prior_peak: f64,
        last_prices: &BTreeMap<String, f64>,
    ) -> EquitySample {
        let position_value = self.position_value(last_prices);
        let equity = self.cash + position_value;
        let running_peak = prior_peak.max(equity);
        let drawdown = if running_peak > 0.0 {
            ((equity - running_peak) / running_peak).min(0.0)
        } else {
            0.0
        };
        EquitySample {
            date,
            cash: self.cash,
            position_value,
            equity,
            running_peak,
            drawdown,
            open_count: self.open_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EntryReason;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn with_spy_position() -> PortfolioState {
        let mut state = PortfolioState::new(100_000.0);
        state.cash = 90_000.0;
        state.positions.insert(
            "SPY".into(),
            Position::open(
                "SPY".into(),
                date(2),
                0,
                100.0,
                100,
                None,
                EntryReason::BuyAndHold,
                0.0,
            ),
        );
        state
    }

    #[test]
    fn equity_with_no_positions() {
        let state = PortfolioState::new(100_000.0);
        assert_eq!(state.equity(&BTreeMap::new()), 100_000.0);
        assert_eq!(state.running_peak(), 100_000.0);
    }

    #[test]
    fn equity_uses_last_known_price() {
        let state = with_spy_position();
        let prices = BTreeMap::from([("SPY".to_string(), 110.0)]);
        assert_eq!(state.equity(&prices), 101_000.0);
        // no price known yet: valued at entry
        assert_eq!(state.equity(&BTreeMap::new()), 100_000.0);
    }

    #[test]
    fn samples_track_peak_and_drawdown() {
        let mut state = with_spy_position();
        let up = BTreeMap::from([("SPY".to_string(), 120.0)]);
        let down = BTreeMap::from([("SPY".to_string(), 90.0)]);
        state.record_sample(date(3), &up);
        let s = state.record_sample(date(4), &down).clone();
        assert_eq!(s.running_peak, 102_000.0);
        assert_eq!(s.equity, 99_000.0);
        assert!((s.drawdown - (-3_000.0 / 102_000.0)).abs() < 1e-12);
        assert_eq!(s.open_count, 1);
    }

    #[test]
    fn restate_recomputes_last_sample() {
        let mut state = with_spy_position();
        let prices = BTreeMap::from([("SPY".to_string(), 110.0)]);
        state.record_sample(date(3), &prices);
        state.positions.clear();
        state.cash = 100_990.0;
        state.restate_last_sample(&prices);
        let last = state.equity_curve.last().unwrap();
        assert_eq!(last.position_value, 0.0);
        assert_eq!(last.equity, 100_990.0);
        assert_eq!(last.running_peak, 100_990.0);
        assert_eq!(last.open_count, 0);
    }
}
