//! Trendfolio Core: walk-forward multi-symbol portfolio backtesting.
//!
//! This crate contains the simulation engine and nothing that touches disk:
//! - Domain types (bars, series, positions, trades, portfolio state)
//! - Streaming indicators, including the ATR-banded `TrendState`
//! - Signal engine: entry/exit rules, momentum ranking, backward-only history
//! - Position sizing and the market-breadth regime detector
//! - Position ledger and the per-date walk-forward simulator

pub mod config;
pub mod domain;
pub mod engine;
pub mod indicators;
pub mod signals;
pub mod sizing;

pub use config::{ConfigError, EngineConfig};
pub use engine::{simulate, SimulationOutcome};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: core types are Send + Sync, so sweeps can move
    /// them across rayon workers.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::PriceSeries>();
        require_sync::<domain::PriceSeries>();
        require_send::<domain::Universe>();
        require_sync::<domain::Universe>();
        require_send::<domain::Position>();
        require_sync::<domain::Position>();
        require_send::<domain::Trade>();
        require_sync::<domain::Trade>();
        require_send::<domain::PortfolioState>();
        require_sync::<domain::PortfolioState>();

        // Engine types
        require_send::<EngineConfig>();
        require_sync::<EngineConfig>();
        require_send::<SimulationOutcome>();
        require_sync::<SimulationOutcome>();
        require_send::<engine::PositionLedger>();
        require_sync::<engine::PositionLedger>();

        // Signal and indicator state
        require_send::<signals::IndicatorTrack>();
        require_sync::<signals::IndicatorTrack>();
        require_send::<signals::SignalEngine>();
        require_sync::<signals::SignalEngine>();
        require_send::<signals::MomentumBook>();
        require_sync::<signals::MomentumBook>();
        require_send::<indicators::TrendState>();
        require_sync::<indicators::TrendState>();
    }

    /// Architecture contract: rule evaluation sees only a history prefix.
    ///
    /// `History` can only be constructed through `History::upto(bars, index)`,
    /// which slices `bars[..=index]`. Evaluators receive nothing else that
    /// carries bars.
    #[test]
    fn signal_engine_only_receives_history_prefixes() {
        fn _check(
            engine: &signals::SignalEngine,
            bars: &[domain::Bar],
            track: &signals::IndicatorTrack,
        ) -> Option<signals::Signal> {
            let history = domain::History::upto(bars, 0)?;
            Some(engine.evaluate(history, track, None, &signals::SignalContext::default()))
        }
    }
}
