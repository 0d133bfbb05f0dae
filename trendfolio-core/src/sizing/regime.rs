//! Market-breadth regime detector.
//!
//! Looks across every symbol with at least `slow_ma` bars of history and
//! measures the share trading above their fast and slow simple moving averages,
//! plus the annualized volatility of the pooled recent daily returns. The
//! result scales new-position size through an exposure factor.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::domain::History;
use crate::indicators::window::{close_returns, mean_close};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Regime {
    Bull,
    Weak,
    Correction,
    Bear,
    /// No symbol had enough history.
    Unknown,
}

impl Regime {
    pub fn base_exposure(self) -> f64 {
        match self {
            Self::Bull | Self::Unknown => 1.0,
            Self::Weak => 0.75,
            Self::Correction => 0.50,
            Self::Bear => 0.25,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeParams {
    pub fast_ma: usize,
    pub slow_ma: usize,
    pub vol_window: usize,
    /// Annualized volatility above which exposure is cut.
    pub high_vol_threshold: f64,
    pub high_vol_factor: f64,
    pub periods_per_year: f64,
}

impl Default for RegimeParams {
    fn default() -> Self {
        Self {
            fast_ma: 50,
            slow_ma: 200,
            vol_window: 20,
            high_vol_threshold: 0.25,
            high_vol_factor: 0.75,
            periods_per_year: 252.0,
        }
    }
}

impl RegimeParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fast_ma == 0 {
            return Err(ConfigError::ZeroPeriod {
                name: "regime.fast_ma",
            });
        }
        if self.slow_ma == 0 {
            return Err(ConfigError::ZeroPeriod {
                name: "regime.slow_ma",
            });
        }
        if self.vol_window == 0 {
            return Err(ConfigError::ZeroPeriod {
                name: "regime.vol_window",
            });
        }
        if !(self.high_vol_factor > 0.0 && self.high_vol_factor <= 1.0) {
            return Err(ConfigError::InvalidPercentage {
                name: "regime.high_vol_factor",
                value: self.high_vol_factor,
            });
        }
        if !(self.high_vol_threshold.is_finite() && self.high_vol_threshold > 0.0) {
            return Err(ConfigError::InvalidAmount {
                name: "regime.high_vol_threshold",
                value: self.high_vol_threshold,
            });
        }
        if !(self.periods_per_year.is_finite() && self.periods_per_year > 0.0) {
            return Err(ConfigError::InvalidAmount {
                name: "regime.periods_per_year",
                value: self.periods_per_year,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeReading {
    pub regime: Regime,
    pub pct_above_fast: f64,
    pub pct_above_slow: f64,
    pub volatility: f64,
    pub exposure: f64,
    pub eligible: usize,
}

impl RegimeReading {
    pub fn unknown() -> Self {
        Self {
            regime: Regime::Unknown,
            pct_above_fast: 0.0,
            pct_above_slow: 0.0,
            volatility: 0.0,
            exposure: 1.0,
            eligible: 0,
        }
    }

    pub fn is_bear(&self) -> bool {
        self.regime == Regime::Bear
    }
}

/// Classify the market from each symbol's history as of the current date.
pub fn detect<'a, I>(histories: I, params: &RegimeParams) -> RegimeReading
where
    I: IntoIterator<Item = History<'a>>,
{
    let mut eligible = 0usize;
    let mut above_fast = 0usize;
    let mut above_slow = 0usize;
    let mut pooled = Vec::new();

    for history in histories {
        if history.len() < params.slow_ma {
            continue;
        }
        let (Some(slow), Some(fast)) = (
            history.trailing(params.slow_ma).and_then(mean_close),
            history.trailing(params.fast_ma.min(history.len())).and_then(mean_close),
        ) else {
            continue;
        };
        eligible += 1;
        let close = history.current().close;
        if close > fast {
            above_fast += 1;
        }
        if close > slow {
            above_slow += 1;
        }
        if history.len() >= params.vol_window {
            let n = (params.vol_window + 1).min(history.len());
            if let Some(window) = history.trailing(n) {
                pooled.extend(close_returns(window));
            }
        }
    }

    if eligible == 0 {
        return RegimeReading::unknown();
    }

    let pct_above_fast = above_fast as f64 / eligible as f64;
    let pct_above_slow = above_slow as f64 / eligible as f64;
    let volatility = population_std(&pooled) * params.periods_per_year.sqrt();

    let regime = if pct_above_slow < 0.3 {
        Regime::Bear
    } else if pct_above_slow < 0.5 {
        Regime::Correction
    } else if pct_above_fast < 0.4 {
        Regime::Weak
    } else {
        Regime::Bull
    };

    let mut exposure = regime.base_exposure();
    if volatility > params.high_vol_threshold {
        exposure *= params.high_vol_factor;
    }

    RegimeReading {
        regime,
        pct_above_fast,
        pct_above_slow,
        volatility,
        exposure,
        eligible,
    }
}

fn population_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;

    fn params() -> RegimeParams {
        RegimeParams {
            fast_ma: 3,
            slow_ma: 5,
            vol_window: 3,
            high_vol_threshold: 10.0,
            ..RegimeParams::default()
        }
    }

    fn last<'a>(bars: &'a [crate::domain::Bar]) -> History<'a> {
        History::upto(bars, bars.len() - 1).unwrap()
    }

    #[test]
    fn no_eligible_symbols_is_unknown() {
        let bars = make_bars(&[100.0, 101.0]);
        let r = detect([last(&bars)], &params());
        assert_eq!(r.regime, Regime::Unknown);
        assert_eq!(r.exposure, 1.0);
    }

    #[test]
    fn rising_market_is_bull() {
        let a = make_bars(&[100.0, 101.0, 102.0, 103.0, 104.0, 105.0]);
        let b = make_bars(&[50.0, 51.0, 52.0, 53.0, 54.0, 55.0]);
        let r = detect([last(&a), last(&b)], &params());
        assert_eq!(r.regime, Regime::Bull);
        assert_eq!(r.pct_above_slow, 1.0);
        assert_eq!(r.exposure, 1.0);
    }

    #[test]
    fn falling_market_is_bear() {
        let a = make_bars(&[105.0, 104.0, 103.0, 102.0, 101.0, 100.0]);
        let b = make_bars(&[55.0, 54.0, 53.0, 52.0, 51.0, 50.0]);
        let r = detect([last(&a), last(&b)], &params());
        assert!(r.is_bear());
        assert_eq!(r.exposure, 0.25);
    }

    #[test]
    fn short_term_weakness() {
        // above the 5-bar mean, below the 3-bar mean
        let a = make_bars(&[100.0, 100.0, 100.0, 100.0, 140.0, 118.0]);
        let r = detect([last(&a)], &params());
        assert_eq!(r.regime, Regime::Weak);
        assert_eq!(r.exposure, 0.75);
    }

    #[test]
    fn high_volatility_cuts_exposure() {
        let a = make_bars(&[100.0, 130.0, 100.0, 130.0, 100.0, 140.0]);
        let p = RegimeParams {
            high_vol_threshold: 0.25,
            ..params()
        };
        let r = detect([last(&a)], &p);
        assert_eq!(r.regime, Regime::Bull);
        assert!(r.volatility > 0.25);
        assert!((r.exposure - 0.75).abs() < 1e-12);
    }
}
