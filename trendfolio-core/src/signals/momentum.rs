//! Cross-sectional momentum ranking.
//!
//! At each rebalance date every symbol with enough history is scored by its
//! trailing return and ranked, best first (ties broken by symbol). Two buckets
//! fall out of the ranking: the entry bucket (top `entry_pct`) and the wider
//! hold bucket (top `exit_pct`). Only positive momentum qualifies for either.
//! A book stays in force until the next rebalance.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::domain::History;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RebalanceFrequency {
    Weekly,
    #[default]
    Monthly,
}

impl RebalanceFrequency {
    /// `date` opens a new period relative to `prev`.
    pub fn starts_period(self, prev: NaiveDate, date: NaiveDate) -> bool {
        match self {
            Self::Monthly => (prev.year(), prev.month()) != (date.year(), date.month()),
            Self::Weekly => prev.iso_week() != date.iso_week(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumParams {
    /// Bars of trailing return.
    pub lookback: usize,
    /// Shorter histories are scored over what exists, down to this many bars.
    pub min_lookback: usize,
    pub entry_pct: f64,
    pub exit_pct: f64,
    pub rebalance: RebalanceFrequency,
}

impl Default for MomentumParams {
    fn default() -> Self {
        Self {
            lookback: 126,
            min_lookback: 30,
            entry_pct: 0.20,
            exit_pct: 0.35,
            rebalance: RebalanceFrequency::Monthly,
        }
    }
}

impl MomentumParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lookback == 0 {
            return Err(ConfigError::ZeroPeriod {
                name: "momentum.lookback",
            });
        }
        for (name, value) in [
            ("momentum.entry_pct", self.entry_pct),
            ("momentum.exit_pct", self.exit_pct),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::InvalidPercentage { name, value });
            }
        }
        if self.exit_pct < self.entry_pct {
            return Err(ConfigError::MomentumThresholds {
                entry_pct: self.entry_pct,
                exit_pct: self.exit_pct,
            });
        }
        Ok(())
    }
}

/// Trailing return in percent, or `None` when history is too short.
pub fn momentum_pct(history: &History<'_>, params: &MomentumParams) -> Option<f64> {
    let span = params.lookback.min(history.index());
    if span == 0 || span < params.min_lookback {
        return None;
    }
    let past = history.close_back(span)?;
    Some((history.current().close / past - 1.0) * 100.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentumScore {
    pub symbol: String,
    pub momentum_pct: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MomentumBook {
    ranked: Vec<MomentumScore>,
    entry_set: BTreeSet<String>,
    hold_set: BTreeSet<String>,
}

impl MomentumBook {
    /// Rank every history.
    ///
    /// In `defensive` mode (bear regime) the entry bucket is halved, never
    /// below one symbol, and the hold bucket shrinks to that same size. A held
    /// symbol outside the smaller top-k is then dropped at the rebalance.
    pub fn rank<'a, I>(histories: I, params: &MomentumParams, defensive: bool) -> Self
    where
        I: IntoIterator<Item = History<'a>>,
    {
        let mut ranked: Vec<MomentumScore> = histories
            .into_iter()
            .filter_map(|h| {
                momentum_pct(&h, params).map(|m| MomentumScore {
                    symbol: h.current().symbol.clone(),
                    momentum_pct: m,
                })
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.momentum_pct
                .total_cmp(&a.momentum_pct)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });

        let n = ranked.len();
        let mut entry_n = bucket_size(n, params.entry_pct);
        if defensive {
            entry_n = (entry_n / 2).max(1).min(n);
        }
        let hold_n = if defensive {
            entry_n
        } else {
            bucket_size(n, params.exit_pct)
        };

        let top = |k: usize| -> BTreeSet<String> {
            ranked[..k]
                .iter()
                .filter(|s| s.momentum_pct > 0.0)
                .map(|s| s.symbol.clone())
                .collect()
        };
        let entry_set = top(entry_n);
        let hold_set = top(hold_n);

        Self {
            ranked,
            entry_set,
            hold_set,
        }
    }

    pub fn ranked(&self) -> &[MomentumScore] {
        &self.ranked
    }

    pub fn momentum(&self, symbol: &str) -> Option<f64> {
        self.ranked
            .iter()
            .find(|s| s.symbol == symbol)
            .map(|s| s.momentum_pct)
    }

    pub fn in_entry_set(&self, symbol: &str) -> bool {
        self.entry_set.contains(symbol)
    }

    pub fn in_hold_set(&self, symbol: &str) -> bool {
        self.hold_set.contains(symbol)
    }
}

/// `floor(n * pct)`, at least one when anything is ranked.
fn bucket_size(n: usize, pct: f64) -> usize {
    if n == 0 {
        return 0;
    }
    ((n as f64 * pct).floor() as usize).clamp(1, n)
}
