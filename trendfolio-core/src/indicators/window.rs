//! Window statistics over bar slices.
//!
//! Callers pass windows taken from a [`History`](crate::domain::History), so
//! these never see bars past the current one.

use crate::domain::Bar;

/// Highest high in the window, `None` if empty.
pub fn highest_high(bars: &[Bar]) -> Option<f64> {
    bars.iter().map(|b| b.high).reduce(f64::max)
}

/// Lowest low in the window, `None` if empty.
pub fn lowest_low(bars: &[Bar]) -> Option<f64> {
    bars.iter().map(|b| b.low).reduce(f64::min)
}

pub fn mean_volume(bars: &[Bar]) -> Option<f64> {
    if bars.is_empty() {
        return None;
    }
    Some(bars.iter().map(|b| b.volume as f64).sum::<f64>() / bars.len() as f64)
}

pub fn mean_close(bars: &[Bar]) -> Option<f64> {
    if bars.is_empty() {
        return None;
    }
    Some(bars.iter().map(|b| b.close).sum::<f64>() / bars.len() as f64)
}

/// Close-to-close simple returns within the window.
pub fn close_returns(bars: &[Bar]) -> Vec<f64> {
    bars.windows(2)
        .map(|w| w[1].close / w[0].close - 1.0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn extremes() {
        let bars = make_bars(&[10.0, 14.0, 12.0]);
        assert_eq!(highest_high(&bars), Some(15.0));
        assert_eq!(lowest_low(&bars), Some(9.0));
        assert_eq!(highest_high(&[]), None);
    }

    #[test]
    fn means() {
        let bars = make_bars(&[10.0, 20.0, 30.0]);
        assert_approx(mean_close(&bars).unwrap(), 20.0, DEFAULT_EPSILON);
        assert_approx(mean_volume(&bars).unwrap(), 1000.0, DEFAULT_EPSILON);
        assert!(mean_close(&[]).is_none());
    }

    #[test]
    fn returns() {
        let bars = make_bars(&[100.0, 110.0, 99.0]);
        let r = close_returns(&bars);
        assert_eq!(r.len(), 2);
        assert_approx(r[0], 0.1, DEFAULT_EPSILON);
        assert_approx(r[1], -0.1, DEFAULT_EPSILON);
    }
}
