//! Walk-forward simulator.
//!
//! Walks the global timeline one date at a time. Every symbol with a bar on
//! the date first advances its indicator track; dates before the configured
//! start stop there (warm-up). Inside the window each date runs, in order:
//!
//! 1. Mark: open positions with a bar ratchet their high-water mark.
//! 2. Exits: open positions with a bar are checked against the exit rules.
//! 3. Entries: flat symbols with a bar, in symbol order, while slots remain.
//! 4. Mark-to-market at the last known close of every holding.
//! 5. Equity sample.
//!
//! After the last date, anything still open is closed at its last known close
//! and the final sample is restated.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{ConfigError, EngineConfig};
use crate::domain::{EquitySample, History, PortfolioState, PriceSeries, Trade, Universe};
use crate::signals::{needs_momentum, IndicatorTrack, MomentumBook, Signal, SignalContext, SignalEngine};
use crate::sizing::{detect, RegimeReading};

use super::ledger::{Admission, EntryRequest, PositionLedger};
use super::timeline::Timeline;

/// Counters describing what the loop did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunDiagnostics {
    pub dates: usize,
    pub warmup_dates: usize,
    pub bars_processed: usize,
    pub entries_rejected: usize,
    pub rebalances: usize,
    pub forced_exits: usize,
    pub symbols_skipped: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutcome {
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquitySample>,
    pub final_state: PortfolioState,
    pub diagnostics: RunDiagnostics,
}

impl SimulationOutcome {
    pub fn final_equity(&self) -> f64 {
        self.equity_curve
            .last()
            .map_or(self.final_state.cash, |s| s.equity)
    }
}

/// Per-symbol cursor into its series plus its indicator track.
struct SymbolState<'a> {
    series: &'a PriceSeries,
    track: IndicatorTrack,
    /// Index of the next unconsumed bar.
    cursor: usize,
}

impl<'a> SymbolState<'a> {
    /// Index of the latest consumed bar.
    fn latest(&self) -> Option<usize> {
        self.cursor.checked_sub(1)
    }

    fn history(&self) -> Option<History<'a>> {
        self.latest().and_then(|i| self.series.history(i))
    }
}

/// Run one backtest. `state` is usually `PortfolioState::new(config.initial_capital)`.
pub fn simulate(
    universe: &Universe,
    config: &EngineConfig,
    state: PortfolioState,
) -> Result<SimulationOutcome, ConfigError> {
    config.validate()?;

    let engine = SignalEngine::from_config(config);
    let timeline = Timeline::from_universe(universe, config.end_date);
    let use_momentum = needs_momentum(config);
    let regime_params = config.sizing.regime_params().copied();

    let mut symbols: BTreeMap<&str, SymbolState<'_>> = BTreeMap::new();
    for series in universe.iter() {
        symbols.insert(
            series.symbol(),
            SymbolState {
                series,
                track: IndicatorTrack::new(config)?,
                cursor: 0,
            },
        );
    }

    let mut ledger = PositionLedger::new(state, config.commission_rate, config.max_positions);
    let mut diagnostics = RunDiagnostics {
        symbols_skipped: universe.skipped().len(),
        ..RunDiagnostics::default()
    };
    let mut book: Option<MomentumBook> = None;
    let mut last_in_window: Option<NaiveDate> = None;

    for (t, &date) in timeline.dates().iter().enumerate() {
        diagnostics.dates += 1;

        // Advance every symbol with a bar today.
        let mut today: Vec<(&str, usize)> = Vec::new();
        for (symbol, sym) in symbols.iter_mut() {
            let Some(bar) = sym.series.bars().get(sym.cursor) else {
                continue;
            };
            if bar.date != date {
                continue;
            }
            sym.track.advance(bar);
            ledger.observe_price(symbol, bar.close);
            today.push((*symbol, sym.cursor));
            sym.cursor += 1;
            diagnostics.bars_processed += 1;
        }

        if config.start_date.is_some_and(|start| date < start) {
            diagnostics.warmup_dates += 1;
            continue;
        }
        last_in_window = Some(date);

        let regime: Option<RegimeReading> = regime_params.map(|params| {
            detect(symbols.values().filter_map(SymbolState::history), &params)
        });

        let rebalance =
            use_momentum && timeline.is_rebalance(t, config.momentum.rebalance);
        if rebalance {
            let defensive = regime.is_some_and(|r| r.is_bear());
            book = Some(MomentumBook::rank(
                symbols.values().filter_map(SymbolState::history),
                &config.momentum,
                defensive,
            ));
            diagnostics.rebalances += 1;
        }
        let ctx = SignalContext {
            momentum: book.as_ref(),
            rebalance,
        };

        // 1. Mark.
        for &(symbol, index) in &today {
            if ledger.position(symbol).is_some() {
                let close = symbols[symbol].series.bars()[index].close;
                ledger.mark(symbol, close);
            }
        }

        // 2. Exits.
        let mut exited: Vec<&str> = Vec::new();
        for &(symbol, index) in &today {
            let Some(position) = ledger.position(symbol) else {
                continue;
            };
            let sym = &symbols[symbol];
            let Some(history) = sym.series.history(index) else {
                continue;
            };
            if let Signal::Exit(reason) = engine.evaluate_exit(history, &sym.track, position, &ctx)
            {
                ledger.close(symbol, date, history.current().close, reason);
                exited.push(symbol);
            }
        }

        // 3. Entries, after every exit has settled.
        for &(symbol, index) in &today {
            if !ledger.has_capacity() {
                break;
            }
            if ledger.position(symbol).is_some() || exited.contains(&symbol) {
                continue;
            }
            let sym = &symbols[symbol];
            let Some(history) = sym.series.history(index) else {
                continue;
            };
            let Signal::Entry(reason, strength) = engine.evaluate_entry(history, &sym.track, &ctx)
            else {
                continue;
            };
            let allocation = config.sizing.allocation(strength, regime.as_ref());
            let admission = ledger.try_open(EntryRequest {
                symbol,
                date,
                index,
                price: history.current().close,
                allocation,
                atr: sym.track.atr(),
                reason,
            });
            if admission != Admission::Opened {
                debug!(symbol, date = %date, ?admission, "entry not admitted");
                diagnostics.entries_rejected += 1;
            }
        }

        // 4 + 5. Mark-to-market and sample.
        ledger.record_sample(date);
    }

    if let Some(date) = last_in_window {
        diagnostics.forced_exits = ledger.liquidate(date);
    }

    let (final_state, trades) = ledger.into_parts();
    info!(
        dates = diagnostics.dates,
        trades = trades.len(),
        final_cash = final_state.cash,
        "simulation finished"
    );
    Ok(SimulationOutcome {
        equity_curve: final_state.equity_curve.clone(),
        trades,
        final_state,
        diagnostics,
    })
}
