//! Average True Range (ATR), computed incrementally.
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|); the first
//! bar has no previous close and uses high-low.
//! Lookback: `period` bars before the first value is produced.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::domain::Bar;

/// How true ranges are averaged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AtrSmoothing {
    /// Rolling mean of the last `period` true ranges.
    Simple,
    /// Seeded with the mean of the first `period` true ranges, then
    /// `(prev * (period - 1) + tr) / period`.
    #[default]
    Wilder,
}

pub fn true_range(bar: &Bar, prev_close: Option<f64>) -> f64 {
    let hl = bar.high - bar.low;
    match prev_close {
        Some(pc) => hl.max((bar.high - pc).abs()).max((bar.low - pc).abs()),
        None => hl,
    }
}

/// Streaming ATR. Feed every bar once, in date order.
#[derive(Debug, Clone)]
pub struct AtrState {
    period: usize,
    smoothing: AtrSmoothing,
    prev_close: Option<f64>,
    window: VecDeque<f64>,
    window_sum: f64,
    value: Option<f64>,
}

impl AtrState {
    pub fn new(period: usize, smoothing: AtrSmoothing) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self {
            period,
            smoothing,
            prev_close: None,
            window: VecDeque::with_capacity(period + 1),
            window_sum: 0.0,
            value: None,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Latest ATR, `None` until `period` bars have been seen.
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn update(&mut self, bar: &Bar) -> Option<f64> {
        let tr = true_range(bar, self.prev_close);
        self.prev_close = Some(bar.close);

        match (self.smoothing, self.value) {
            (AtrSmoothing::Wilder, Some(prev)) => {
                let p = self.period as f64;
                self.value = Some((prev * (p - 1.0) + tr) / p);
            }
            _ => {
                self.window.push_back(tr);
                self.window_sum += tr;
                if self.window.len() > self.period {
                    if let Some(old) = self.window.pop_front() {
                        self.window_sum -= old;
                    }
                }
                if self.window.len() == self.period {
                    self.value = Some(self.window_sum / self.period as f64);
                    if self.smoothing == AtrSmoothing::Wilder {
                        self.window.clear();
                        self.window_sum = 0.0;
                    }
                }
            }
        }
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn first_true_range_is_high_minus_low() {
        let bars = make_bars(&[100.0]);
        assert_approx(true_range(&bars[0], None), 2.0, DEFAULT_EPSILON);
    }

    #[test]
    fn true_range_uses_gap_from_prev_close() {
        let bars = make_bars(&[100.0, 110.0]);
        // bar 1: open 100, high 111, low 99, prev close 100 -> max(12, 11, 1)
        assert_approx(true_range(&bars[1], Some(100.0)), 12.0, DEFAULT_EPSILON);
        // a gap up past the whole range
        assert_approx(true_range(&bars[1], Some(80.0)), 31.0, DEFAULT_EPSILON);
    }

    #[test]
    fn none_until_period_bars() {
        let bars = make_bars(&[100.0, 101.0, 102.0, 103.0]);
        let mut atr = AtrState::new(3, AtrSmoothing::Wilder);
        assert!(atr.update(&bars[0]).is_none());
        assert!(atr.update(&bars[1]).is_none());
        assert!(atr.update(&bars[2]).is_some());
    }

    #[test]
    fn wilder_seed_then_smooth() {
        // TRs: 2, 3, 3, 3, 12
        let bars = make_bars(&[100.0, 101.0, 102.0, 103.0, 113.0]);
        let mut atr = AtrState::new(3, AtrSmoothing::Wilder);
        let values: Vec<Option<f64>> = bars.iter().map(|b| atr.update(b)).collect();
        assert_approx(values[2].unwrap(), 8.0 / 3.0, DEFAULT_EPSILON);
        let v3 = (8.0 / 3.0 * 2.0 + 3.0) / 3.0;
        assert_approx(values[3].unwrap(), v3, DEFAULT_EPSILON);
        assert_approx(values[4].unwrap(), (v3 * 2.0 + 12.0) / 3.0, DEFAULT_EPSILON);
    }

    #[test]
    fn simple_is_rolling_mean() {
        let bars = make_bars(&[100.0, 101.0, 102.0, 103.0, 113.0]);
        let mut atr = AtrState::new(3, AtrSmoothing::Simple);
        let values: Vec<Option<f64>> = bars.iter().map(|b| atr.update(b)).collect();
        assert_approx(values[2].unwrap(), 8.0 / 3.0, DEFAULT_EPSILON);
        assert_approx(values[3].unwrap(), 3.0, DEFAULT_EPSILON);
        assert_approx(values[4].unwrap(), 6.0, DEFAULT_EPSILON);
    }
}
