//! Criterion benchmarks for Trendfolio hot paths.
//!
//! Benchmarks:
//! 1. TrendState streaming update over a long series
//! 2. Momentum ranking across a wide universe
//! 3. Full walk-forward simulation, trend rules and momentum rules

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use trendfolio_core::domain::{Bar, PortfolioState, Universe};
use trendfolio_core::engine::simulate;
use trendfolio_core::indicators::{TrendParams, TrendState};
use trendfolio_core::signals::{EntryRule, ExitRule, MomentumBook, MomentumParams};
use trendfolio_core::EngineConfig;

// ── Helpers ──────────────────────────────────────────────────────────

fn make_bars(symbol: &str, n: usize, salt: u64) -> Vec<Bar> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2015, 1, 2).unwrap();
    let mut seed = salt.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut price = 100.0_f64;
    (0..n)
        .map(|i| {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
            let r = ((seed >> 33) % 1_000) as f64 / 1_000.0 - 0.495;
            price = (price * (1.0 + r * 0.04)).max(5.0);
            Bar {
                symbol: symbol.to_string(),
                date: base_date + chrono::Duration::days(i as i64),
                open: price * 0.998,
                high: price * 1.01,
                low: price * 0.99,
                close: price,
                volume: 500_000 + (seed >> 44) % 500_000,
            }
        })
        .collect()
}

fn make_universe(symbols: usize, bars: usize) -> Universe {
    Universe::from_bars((0..symbols).map(|s| {
        let symbol = format!("SYM{s:03}");
        let series = make_bars(&symbol, bars, s as u64);
        (symbol, series)
    }))
}

// ── 1. TrendState ────────────────────────────────────────────────────

fn bench_trend_state(c: &mut Criterion) {
    let bars = make_bars("BENCH", 10_000, 1);
    c.bench_function("trend_state_10k_bars", |b| {
        b.iter(|| {
            let mut state = TrendState::new(TrendParams::new(10, 3.0)).unwrap();
            for bar in &bars {
                black_box(state.step(bar));
            }
        })
    });
}

// ── 2. Momentum ranking ──────────────────────────────────────────────

fn bench_momentum_rank(c: &mut Criterion) {
    let universe = make_universe(200, 300);
    let params = MomentumParams::default();
    c.bench_function("momentum_rank_200_symbols", |b| {
        b.iter(|| {
            let histories = universe.iter().filter_map(|s| s.history(s.len() - 1));
            black_box(MomentumBook::rank(histories, &params, false))
        })
    });
}

// ── 3. Simulation ────────────────────────────────────────────────────

fn bench_simulate(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulate");
    group.sample_size(20);

    let trend = EngineConfig {
        max_positions: 20,
        exit_rules: vec![ExitRule::TrailingStop { pct: 0.15 }, ExitRule::TrendReversal],
        ..EngineConfig::default()
    };
    let momentum = EngineConfig {
        max_positions: 20,
        entry_rules: vec![EntryRule::MomentumRankTop],
        exit_rules: vec![ExitRule::MomentumRankLost],
        ..EngineConfig::default()
    };

    for symbols in [10usize, 50] {
        let universe = make_universe(symbols, 1_000);
        for (name, config) in [("trend", &trend), ("momentum", &momentum)] {
            group.bench_with_input(BenchmarkId::new(name, symbols), &universe, |b, u| {
                b.iter(|| {
                    simulate(u, config, PortfolioState::new(config.initial_capital)).unwrap()
                })
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_trend_state, bench_momentum_rank, bench_simulate);
criterion_main!(benches);
