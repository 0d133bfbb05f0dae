//! Tail risk metrics: VaR, CVaR, skewness, kurtosis.
//!
//! All functions are pure: periodic returns in, scalar out. Empty input
//! yields 0.

use serde::{Deserialize, Serialize};

use crate::metrics::{mean_f64, std_dev};

/// Distribution-shape statistics of a return series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TailMetrics {
    pub confidence: f64,
    pub value_at_risk: f64,
    pub conditional_var: f64,
    pub skewness: f64,
    /// Fourth standardized moment minus 3.
    pub excess_kurtosis: f64,
    pub sample_size: usize,
}

pub fn compute_tail_metrics(returns: &[f64], confidence: f64) -> TailMetrics {
    TailMetrics {
        confidence,
        value_at_risk: value_at_risk(returns, confidence),
        conditional_var: conditional_var(returns, confidence),
        skewness: skewness(returns),
        excess_kurtosis: excess_kurtosis(returns),
        sample_size: returns.len(),
    }
}

/// Empirical percentile with linear interpolation between closest ranks.
///
/// `q` is in `[0, 1]`; out-of-range values are clamped.
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Value at Risk: the `(1 - confidence)` percentile of returns.
///
/// A loss shows up as a negative number.
pub fn value_at_risk(returns: &[f64], confidence: f64) -> f64 {
    percentile(returns, 1.0 - confidence)
}

/// Conditional VaR: mean of the returns at or below VaR.
pub fn conditional_var(returns: &[f64], confidence: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let var = value_at_risk(returns, confidence);
    let tail: Vec<f64> = returns.iter().copied().filter(|r| *r <= var).collect();
    if tail.is_empty() {
        return var;
    }
    mean_f64(&tail)
}

/// Skewness (third standardized moment), population form.
pub fn skewness(returns: &[f64]) -> f64 {
    standardized_moment(returns, 3)
}

pub fn excess_kurtosis(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let m4 = standardized_moment(returns, 4);
    if m4 == 0.0 {
        return 0.0;
    }
    m4 - 3.0
}

fn standardized_moment(returns: &[f64], k: i32) -> f64 {
    let std = std_dev(returns);
    if std < 1e-15 {
        return 0.0;
    }
    let mean = mean_f64(returns);
    returns
        .iter()
        .map(|r| ((r - mean) / std).powi(k))
        .sum::<f64>()
        / returns.len() as f64
}
