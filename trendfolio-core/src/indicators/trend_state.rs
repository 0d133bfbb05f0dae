//! TrendState: ATR-banded directional regime (supertrend), one bar at a time.
//!
//! Basic bands sit `multiplier * ATR` above and below the bar midpoint. Final
//! bands ratchet: the upper band only moves down (unless the prior close broke
//! above it) and the lower band only moves up (unless the prior close broke
//! below it). Direction flips up when the close crosses above the prior final
//! upper band, and down when it crosses below the prior final lower band.
//!
//! The state is strictly forward: each bar is folded in once and earlier
//! readings are never revised. Two instances never share anything, so an
//! entry (tight) and an exit (wide) trend can run side by side.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::domain::Bar;
use crate::indicators::atr::{AtrSmoothing, AtrState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// +1 for up, -1 for down.
    pub fn sign(self) -> i8 {
        match self {
            Self::Up => 1,
            Self::Down => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendParams {
    pub period: usize,
    pub multiplier: f64,
    #[serde(default)]
    pub smoothing: AtrSmoothing,
}

impl TrendParams {
    pub fn new(period: usize, multiplier: f64) -> Self {
        Self {
            period,
            multiplier,
            smoothing: AtrSmoothing::Wilder,
        }
    }

    pub fn validate(&self, name: &'static str) -> Result<(), ConfigError> {
        if self.period == 0 {
            return Err(ConfigError::ZeroPeriod { name });
        }
        if !self.multiplier.is_finite() || self.multiplier <= 0.0 {
            return Err(ConfigError::InvalidMultiplier {
                name,
                value: self.multiplier,
            });
        }
        Ok(())
    }
}

/// Output of one [`TrendState::step`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendReading {
    pub atr: f64,
    pub basic_upper: f64,
    pub basic_lower: f64,
    pub final_upper: f64,
    pub final_lower: f64,
    pub direction: Direction,
    /// Direction differs from the previous reading.
    pub flipped: bool,
}

impl TrendReading {
    pub fn flipped_up(&self) -> bool {
        self.flipped && self.direction == Direction::Up
    }

    pub fn flipped_down(&self) -> bool {
        self.flipped && self.direction == Direction::Down
    }
}

#[derive(Debug, Clone)]
pub struct TrendState {
    params: TrendParams,
    atr: AtrState,
    prev_close: Option<f64>,
    last: Option<TrendReading>,
}

impl TrendState {
    pub fn new(params: TrendParams) -> Result<Self, ConfigError> {
        params.validate("trend")?;
        Ok(Self {
            params,
            atr: AtrState::new(params.period, params.smoothing),
            prev_close: None,
            last: None,
        })
    }

    pub fn params(&self) -> &TrendParams {
        &self.params
    }

    /// Latest reading, if warmed up.
    pub fn last(&self) -> Option<&TrendReading> {
        self.last.as_ref()
    }

    /// Fold in the next bar. `None` while fewer than `period` bars have been seen.
    pub fn step(&mut self, bar: &Bar) -> Option<TrendReading> {
        let atr = self.atr.update(bar);
        let prev_close = self.prev_close.replace(bar.close);
        let atr = atr?;

        let mid = bar.hl2();
        let basic_upper = mid + self.params.multiplier * atr;
        let basic_lower = mid - self.params.multiplier * atr;

        let reading = match (self.last, prev_close) {
            (Some(prev), Some(prev_close)) => {
                let final_upper =
                    if basic_upper < prev.final_upper || prev_close > prev.final_upper {
                        basic_upper
                    } else {
                        prev.final_upper
                    };
                let final_lower =
                    if basic_lower > prev.final_lower || prev_close < prev.final_lower {
                        basic_lower
                    } else {
                        prev.final_lower
                    };
                let direction = match prev.direction {
                    Direction::Down if bar.close > prev.final_upper => Direction::Up,
                    Direction::Up if bar.close < prev.final_lower => Direction::Down,
                    unchanged => unchanged,
                };
                TrendReading {
                    atr,
                    basic_upper,
                    basic_lower,
                    final_upper,
                    final_lower,
                    direction,
                    flipped: direction != prev.direction,
                }
            }
            _ => TrendReading {
                atr,
                basic_upper,
                basic_lower,
                final_upper: basic_upper,
                final_lower: basic_lower,
                direction: Direction::Up,
                flipped: false,
            },
        };

        self.last = Some(reading);
        Some(reading)
    }
}
