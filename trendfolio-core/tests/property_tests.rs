//! Property tests for simulator invariants.
//!
//! Uses proptest over random-walk universes and a handful of rule sets to
//! verify:
//! 1. Equity identity: every sample satisfies equity == cash + position value
//! 2. Peak monotonicity: the running peak never falls, drawdown stays <= 0
//! 3. Book closure: final equity equals initial capital plus realized PnL
//! 4. One position per symbol: a symbol's trades never overlap
//! 5. Capacity: open positions never exceed max_positions
//! 6. Determinism: the same inputs give the same outcome

use chrono::NaiveDate;
use proptest::prelude::*;
use trendfolio_core::domain::{Bar, PortfolioState, Universe};
use trendfolio_core::engine::{simulate, SimulationOutcome};
use trendfolio_core::signals::{EntryRule, ExitRule, StopMethod};
use trendfolio_core::sizing::SizingPolicy;
use trendfolio_core::indicators::TrendParams;
use trendfolio_core::EngineConfig;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_walk(len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-0.06..0.06_f64, len).prop_map(|steps| {
        let mut price = 50.0;
        steps
            .into_iter()
            .map(|r| {
                price = (price * (1.0 + r)).max(1.0);
                (price * 100.0).round() / 100.0
            })
            .collect()
    })
}

fn arb_universe() -> impl Strategy<Value = Universe> {
    (1usize..=4, 30usize..80).prop_flat_map(|(n, len)| {
        prop::collection::vec(arb_walk(len), n).prop_map(|walks| {
            let base = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
            Universe::from_bars(walks.into_iter().enumerate().map(|(s, closes)| {
                let symbol = format!("S{s}");
                let bars = closes
                    .iter()
                    .enumerate()
                    .map(|(i, &c)| Bar {
                        symbol: symbol.clone(),
                        date: base + chrono::Duration::days(i as i64),
                        open: c,
                        high: c * 1.01,
                        low: c * 0.99,
                        close: c,
                        volume: 1_000 + (i as u64 % 7) * 400,
                    })
                    .collect();
                (symbol, bars)
            }))
        })
    })
}

fn arb_config() -> impl Strategy<Value = EngineConfig> {
    (0usize..4, 1usize..=3, 0.0..0.003_f64, 0usize..3).prop_map(
        |(rules, max_positions, commission_rate, sizing)| {
            let (entry_rules, exit_rules) = match rules {
                0 => (
                    vec![EntryRule::BuyAndHold],
                    vec![ExitRule::TrailingStop { pct: 0.1 }],
                ),
                1 => (
                    vec![EntryRule::TrendUp { require_flip: false }],
                    vec![
                        ExitRule::StopLoss {
                            method: StopMethod::Atr,
                            value: 2.0,
                        },
                        ExitRule::TrendReversal,
                    ],
                ),
                2 => (
                    vec![EntryRule::Breakout {
                        lookback: 5,
                        volume_multiplier: 1.0,
                        volume_lookback: 5,
                        trend_ma: None,
                    }],
                    vec![
                        ExitRule::Breakdown { lookback: 5 },
                        ExitRule::MaxHold { bars: 8 },
                    ],
                ),
                _ => (
                    vec![EntryRule::MomentumRankTop],
                    vec![ExitRule::MomentumRankLost],
                ),
            };
            let sizing = match sizing {
                0 => SizingPolicy::Fixed { amount: 4_000.0 },
                1 => SizingPolicy::Tiered {
                    base_amount: 3_000.0,
                    tiers: trendfolio_core::sizing::default_tiers(),
                },
                _ => SizingPolicy::RegimeAdjusted {
                    base_amount: 4_000.0,
                    regime: Default::default(),
                    block_entries_in_bear: true,
                },
            };
            let mut config = EngineConfig {
                initial_capital: 10_000.0,
                commission_rate,
                max_positions,
                sizing,
                entry_rules,
                exit_rules,
                entry_trend: TrendParams::new(5, 2.0),
                exit_trend: TrendParams::new(8, 3.0),
                stop_atr_period: 5,
                ..EngineConfig::default()
            };
            config.momentum.lookback = 20;
            config.momentum.min_lookback = 5;
            config.momentum.entry_pct = 0.5;
            config.momentum.exit_pct = 0.75;
            config
        },
    )
}

fn run(universe: &Universe, config: &EngineConfig) -> SimulationOutcome {
    simulate(universe, config, PortfolioState::new(config.initial_capital)).unwrap()
}

// ── Invariants ───────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Equity identity, peak monotonicity and non-negative cash on every sample.
    #[test]
    fn equity_curve_is_consistent(universe in arb_universe(), config in arb_config()) {
        let outcome = run(&universe, &config);
        let mut peak = config.initial_capital;
        for sample in &outcome.equity_curve {
            prop_assert!((sample.equity - (sample.cash + sample.position_value)).abs() < 1e-6);
            prop_assert!(sample.running_peak >= peak - 1e-9);
            prop_assert!(sample.running_peak >= sample.equity - 1e-9);
            prop_assert!(sample.drawdown <= 0.0);
            prop_assert!(sample.cash >= -1e-9);
            prop_assert!(sample.open_count <= config.max_positions);
            peak = sample.running_peak;
        }
    }

    /// With everything liquidated at the end, realized PnL accounts for all
    /// of the change in equity.
    #[test]
    fn books_close_on_realized_pnl(universe in arb_universe(), config in arb_config()) {
        let outcome = run(&universe, &config);
        let realized: f64 = outcome.trades.iter().map(|t| t.pnl).sum();
        prop_assert_eq!(outcome.final_state.open_count(), 0);
        prop_assert!((outcome.final_equity() - (config.initial_capital + realized)).abs() < 1e-6);
        prop_assert!((outcome.final_state.cash - outcome.final_equity()).abs() < 1e-6);
    }

    /// A symbol is never held twice at once and never re-entered on its exit bar.
    #[test]
    fn trades_per_symbol_do_not_overlap(universe in arb_universe(), config in arb_config()) {
        let outcome = run(&universe, &config);
        for symbol in universe.symbols() {
            let mut trades: Vec<_> = outcome.trades.iter().filter(|t| t.symbol == symbol).collect();
            trades.sort_by_key(|t| t.entry_date);
            for pair in trades.windows(2) {
                prop_assert!(pair[1].entry_date > pair[0].exit_date);
            }
            for t in &trades {
                prop_assert!(t.exit_date >= t.entry_date);
                prop_assert!(t.shares > 0);
            }
        }
    }

    /// Same universe and config, same outcome.
    #[test]
    fn simulation_is_deterministic(universe in arb_universe(), config in arb_config()) {
        let a = run(&universe, &config);
        let b = run(&universe, &config);
        prop_assert_eq!(a, b);
    }
}
