//! Deterministic synthetic universes.
//!
//! Each symbol is a seeded geometric random walk over weekdays. The RNG seed
//! is derived from the configured seed and the symbol name, so adding a symbol
//! never changes the others.

use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use trendfolio_core::domain::{Bar, Universe};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    /// Number of symbols, named `SYN000`, `SYN001`, ...
    pub symbols: usize,
    pub start: NaiveDate,
    /// Weekday bars per symbol.
    pub bars: usize,
    pub seed: u64,
    pub start_price: f64,
    /// Mean daily log return.
    pub drift: f64,
    /// Daily return half-width; returns are uniform in `drift ± volatility`.
    pub volatility: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            symbols: 10,
            start: NaiveDate::from_ymd_opt(2018, 1, 2).unwrap_or_default(),
            bars: 1_260,
            seed: 42,
            start_price: 100.0,
            drift: 0.0003,
            volatility: 0.03,
        }
    }
}

pub fn symbol_name(i: usize) -> String {
    format!("SYN{i:03}")
}

pub fn generate_universe(config: &SyntheticConfig) -> Universe {
    Universe::from_bars((0..config.symbols).map(|i| {
        let symbol = symbol_name(i);
        let bars = generate_bars(&symbol, config);
        (symbol, bars)
    }))
}

/// One symbol's walk.
pub fn generate_bars(symbol: &str, config: &SyntheticConfig) -> Vec<Bar> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&config.seed.to_le_bytes());
    hasher.update(symbol.as_bytes());
    let mut rng = StdRng::from_seed(*hasher.finalize().as_bytes());

    let half_width = config.volatility.abs().max(f64::EPSILON);
    let mut bars = Vec::with_capacity(config.bars);
    let mut price = config.start_price.max(0.01);
    let mut date = config.start;

    while bars.len() < config.bars {
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            date += chrono::Duration::days(1);
            continue;
        }

        let daily_return: f64 = config.drift + rng.gen_range(-half_width..half_width);
        let open = price;
        let close = (price * (1.0 + daily_return)).max(0.01);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
        let volume = rng.gen_range(500_000..5_000_000u64);

        bars.push(Bar {
            symbol: symbol.to_string(),
            date,
            open,
            high,
            low,
            close,
            volume,
        });

        price = close;
        date += chrono::Duration::days(1);
    }
    bars
}
