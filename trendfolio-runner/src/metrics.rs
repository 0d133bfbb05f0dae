//! Performance metrics: pure functions that compute strategy statistics.
//!
//! Every metric is a pure function: equity curve and/or trade list in, scalar
//! out. Degenerate inputs (no trades, flat equity, too few samples) resolve
//! to 0, never NaN or infinity.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use trendfolio_core::domain::{EquitySample, ExitReason, Trade, Universe};

use crate::tail_metrics::{conditional_var, value_at_risk};

/// Profit factor reported when there are winners and no losers.
pub const PROFIT_FACTOR_CAP: f64 = 100.0;

const DAYS_PER_YEAR: f64 = 365.25;

/// Sampling frequency for Sharpe, Sortino, IR and VaR.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnFrequency {
    Daily,
    Weekly,
    #[default]
    Monthly,
}

impl ReturnFrequency {
    pub fn periods_per_year(self) -> f64 {
        match self {
            Self::Daily => 252.0,
            Self::Weekly => 52.0,
            Self::Monthly => 12.0,
        }
    }

    /// Bucket key; consecutive samples with the same key share a period.
    fn period_key(self, date: NaiveDate) -> (i32, u32) {
        match self {
            Self::Daily => (date.year(), date.ordinal()),
            Self::Weekly => {
                let week = date.iso_week();
                (week.year(), week.week())
            }
            Self::Monthly => (date.year(), date.month()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Annual rate.
    pub risk_free_rate: f64,
    pub frequency: ReturnFrequency,
    pub var_confidence: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.0,
            frequency: ReturnFrequency::Monthly,
            var_confidence: 0.95,
        }
    }
}

/// Aggregate performance statistics for one backtest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub initial_capital: f64,
    pub final_equity: f64,
    pub total_return: f64,
    pub cagr: f64,
    pub max_drawdown: f64,
    /// Longest run of samples below the running peak.
    pub max_drawdown_duration: usize,
    /// Mean drawdown over samples that are in drawdown.
    pub avg_drawdown: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
    pub recovery_factor: f64,
    pub information_ratio: f64,
    pub value_at_risk: f64,
    pub conditional_var: f64,
    /// Fraction of samples with at least one open position.
    pub exposure: f64,

    pub trade_count: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub avg_trade: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub avg_hold_days: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub exit_reasons: BTreeMap<ExitReason, usize>,
}

impl PerformanceReport {
    /// Compute every metric. `benchmark` is an equity series aligned with
    /// `equity_curve`; without it the information ratio is 0.
    pub fn compute(
        equity_curve: &[EquitySample],
        trades: &[Trade],
        initial_capital: f64,
        config: &MetricsConfig,
        benchmark: Option<&[f64]>,
    ) -> Self {
        let equity: Vec<f64> = equity_curve.iter().map(|s| s.equity).collect();
        let final_equity = equity.last().copied().unwrap_or(initial_capital);
        let years = years_between(equity_curve);

        let returns = period_returns(equity_curve, initial_capital, config.frequency);
        let ppy = config.frequency.periods_per_year();

        let total_return = total_return(initial_capital, final_equity);
        let cagr = cagr(initial_capital, final_equity, years);
        let max_drawdown = max_drawdown(initial_capital, &equity);

        let information_ratio = benchmark
            .filter(|b| b.len() == equity_curve.len())
            .map_or(0.0, |b| {
                let bench = period_returns_from(
                    equity_curve.iter().map(|s| s.date).zip(b.iter().copied()),
                    initial_capital,
                    config.frequency,
                );
                information_ratio(&returns, &bench, ppy)
            });

        Self {
            initial_capital,
            final_equity,
            total_return,
            cagr,
            max_drawdown,
            max_drawdown_duration: max_drawdown_duration(initial_capital, &equity),
            avg_drawdown: avg_drawdown(initial_capital, &equity),
            sharpe: sharpe_ratio(&returns, config.risk_free_rate, ppy),
            sortino: sortino_ratio(&returns, config.risk_free_rate, ppy),
            calmar: ratio_to_drawdown(cagr, max_drawdown),
            recovery_factor: ratio_to_drawdown(total_return, max_drawdown),
            information_ratio,
            value_at_risk: value_at_risk(&returns, config.var_confidence),
            conditional_var: conditional_var(&returns, config.var_confidence),
            exposure: exposure(equity_curve),

            trade_count: trades.len(),
            winning_trades: trades.iter().filter(|t| t.is_winner()).count(),
            losing_trades: trades.iter().filter(|t| t.is_loser()).count(),
            win_rate: win_rate(trades),
            profit_factor: profit_factor(trades),
            avg_win: mean_of(trades.iter().filter(|t| t.is_winner()).map(|t| t.pnl)),
            avg_loss: mean_of(trades.iter().filter(|t| t.is_loser()).map(|t| t.pnl)),
            avg_trade: mean_of(trades.iter().map(|t| t.pnl)),
            largest_win: trades.iter().map(|t| t.pnl).fold(0.0, f64::max),
            largest_loss: trades.iter().map(|t| t.pnl).fold(0.0, f64::min),
            avg_hold_days: mean_of(trades.iter().map(|t| t.hold_days as f64)),
            max_consecutive_wins: max_consecutive(trades, Trade::is_winner),
            max_consecutive_losses: max_consecutive(trades, Trade::is_loser),
            exit_reasons: exit_reason_breakdown(trades),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return as a fraction of initial capital.
pub fn total_return(initial_capital: f64, final_equity: f64) -> f64 {
    if initial_capital <= 0.0 {
        return 0.0;
    }
    (final_equity - initial_capital) / initial_capital
}

/// Compound annual growth rate over `years` calendar years.
///
/// 0 when `years <= 0`, either end of the curve is non-positive, or a very
/// short window annualizes past `f64` range.
pub fn cagr(initial_capital: f64, final_equity: f64, years: f64) -> f64 {
    if years <= 0.0 || initial_capital <= 0.0 || final_equity <= 0.0 {
        return 0.0;
    }
    let growth = (final_equity / initial_capital).powf(1.0 / years) - 1.0;
    if growth.is_finite() {
        growth
    } else {
        0.0
    }
}

/// Calendar years spanned by the curve (days / 365.25).
pub fn years_between(equity_curve: &[EquitySample]) -> f64 {
    match (equity_curve.first(), equity_curve.last()) {
        (Some(first), Some(last)) => (last.date - first.date).num_days() as f64 / DAYS_PER_YEAR,
        _ => 0.0,
    }
}

/// Maximum drawdown as a negative fraction, peak seeded with initial capital.
pub fn max_drawdown(initial_capital: f64, equity: &[f64]) -> f64 {
    drawdowns(initial_capital, equity).fold(0.0, f64::min)
}

/// Longest run of consecutive samples below the running peak.
pub fn max_drawdown_duration(initial_capital: f64, equity: &[f64]) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for dd in drawdowns(initial_capital, equity) {
        if dd < 0.0 {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

/// Mean of the negative drawdown samples; 0 if never under water.
pub fn avg_drawdown(initial_capital: f64, equity: &[f64]) -> f64 {
    mean_of(drawdowns(initial_capital, equity).filter(|dd| *dd < 0.0))
}

fn drawdowns(initial_capital: f64, equity: &[f64]) -> impl Iterator<Item = f64> + '_ {
    let mut peak = initial_capital;
    equity.iter().map(move |&eq| {
        peak = peak.max(eq);
        if peak > 0.0 {
            ((eq - peak) / peak).min(0.0)
        } else {
            0.0
        }
    })
}

/// Annualized Sharpe ratio of periodic returns.
///
/// Uses the sample standard deviation of excess returns. 0 with fewer than
/// two returns or zero deviation.
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64, periods_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let excess = excess_returns(returns, risk_free_rate, periods_per_year);
    let std = std_dev(&excess);
    if std < 1e-15 {
        return 0.0;
    }
    mean_f64(&excess) / std * periods_per_year.sqrt()
}

/// Annualized Sortino ratio.
///
/// The denominator is the sample standard deviation of the negative excess
/// returns only.
pub fn sortino_ratio(returns: &[f64], risk_free_rate: f64, periods_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let excess = excess_returns(returns, risk_free_rate, periods_per_year);
    let downside: Vec<f64> = excess.iter().copied().filter(|r| *r < 0.0).collect();
    let std = std_dev(&downside);
    if std < 1e-15 {
        return 0.0;
    }
    mean_f64(&excess) / std * periods_per_year.sqrt()
}

/// Annualized information ratio of strategy returns over benchmark returns.
pub fn information_ratio(returns: &[f64], benchmark: &[f64], periods_per_year: f64) -> f64 {
    if returns.len() != benchmark.len() || returns.len() < 2 {
        return 0.0;
    }
    let active: Vec<f64> = returns.iter().zip(benchmark).map(|(r, b)| r - b).collect();
    let std = std_dev(&active);
    if std < 1e-15 {
        return 0.0;
    }
    mean_f64(&active) / std * periods_per_year.sqrt()
}

/// `value / |max_drawdown|`, used for Calmar and recovery factor.
///
/// 0 when there was no drawdown.
pub fn ratio_to_drawdown(value: f64, max_drawdown: f64) -> f64 {
    if max_drawdown >= 0.0 {
        return 0.0;
    }
    value / max_drawdown.abs()
}

/// Fraction of samples holding at least one position.
pub fn exposure(equity_curve: &[EquitySample]) -> f64 {
    if equity_curve.is_empty() {
        return 0.0;
    }
    let invested = equity_curve.iter().filter(|s| s.open_count > 0).count();
    invested as f64 / equity_curve.len() as f64
}

/// Fraction of trades with positive PnL.
pub fn win_rate(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64
}

/// Gross profit over gross loss.
///
/// 0 with no winners; [`PROFIT_FACTOR_CAP`] with winners and no losers.
pub fn profit_factor(trades: &[Trade]) -> f64 {
    let gross_profit: f64 = trades.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl).sum();
    let gross_loss: f64 = trades
        .iter()
        .filter(|t| t.pnl < 0.0)
        .map(|t| t.pnl.abs())
        .sum();

    if gross_profit <= 0.0 {
        return 0.0;
    }
    if gross_loss <= 0.0 {
        return PROFIT_FACTOR_CAP;
    }
    gross_profit / gross_loss
}

/// Longest run of consecutive trades matching `pred`.
pub fn max_consecutive(trades: &[Trade], pred: impl Fn(&Trade) -> bool) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for trade in trades {
        if pred(trade) {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

pub fn exit_reason_breakdown(trades: &[Trade]) -> BTreeMap<ExitReason, usize> {
    let mut counts = BTreeMap::new();
    for trade in trades {
        *counts.entry(trade.exit_reason).or_insert(0) += 1;
    }
    counts
}

// ─── Return series ──────────────────────────────────────────────────

/// Returns between period-end equities, starting from initial capital.
pub fn period_returns(
    equity_curve: &[EquitySample],
    initial_capital: f64,
    frequency: ReturnFrequency,
) -> Vec<f64> {
    period_returns_from(
        equity_curve.iter().map(|s| (s.date, s.equity)),
        initial_capital,
        frequency,
    )
}

/// Resample `(date, equity)` pairs to the last value of each period and take
/// simple returns, with `initial` as the opening value.
pub fn period_returns_from<I>(points: I, initial: f64, frequency: ReturnFrequency) -> Vec<f64>
where
    I: IntoIterator<Item = (NaiveDate, f64)>,
{
    let mut closes: Vec<f64> = Vec::new();
    let mut last_key = None;
    for (date, equity) in points {
        let key = frequency.period_key(date);
        if last_key == Some(key) {
            if let Some(last) = closes.last_mut() {
                *last = equity;
            }
        } else {
            closes.push(equity);
        }
        last_key = Some(key);
    }

    let mut prev = initial;
    closes
        .into_iter()
        .map(|eq| {
            let r = if prev > 0.0 { eq / prev - 1.0 } else { 0.0 };
            prev = eq;
            r
        })
        .collect()
}

/// Equal-weight buy-and-hold of every symbol, valued on `dates`.
///
/// Each symbol gets `initial / n` at its first close on or after the first
/// date and is carried at its last known close afterwards.
pub fn benchmark_curve(universe: &Universe, dates: &[NaiveDate], initial: f64) -> Vec<f64> {
    let Some(&first) = dates.first() else {
        return Vec::new();
    };
    // (series, entry close); symbols with no bar in the window are left out.
    let legs: Vec<_> = universe
        .iter()
        .filter_map(|s| {
            let i = s.bars().iter().position(|b| b.date >= first)?;
            Some((s, s.bars()[i].close))
        })
        .collect();
    if legs.is_empty() {
        return vec![initial; dates.len()];
    }
    let weight = initial / legs.len() as f64;

    dates
        .iter()
        .map(|&date| {
            legs.iter()
                .map(|(series, entry)| {
                    // A late starter sits in cash until its first bar.
                    let price = series
                        .index_at_or_before(date)
                        .map_or(*entry, |i| series.bars()[i].close);
                    weight * price / entry
                })
                .sum()
        })
        .collect()
}

// ─── Helpers ────────────────────────────────────────────────────────

fn excess_returns(returns: &[f64], risk_free_rate: f64, periods_per_year: f64) -> Vec<f64> {
    let rf = risk_free_rate / periods_per_year;
    returns.iter().map(|r| r - rf).collect()
}

fn mean_of(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    mean_of(values.iter().copied())
}

/// Sample standard deviation; 0 with fewer than two values.
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use trendfolio_core::domain::{Bar, EntryReason};

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(n)
    }

    fn curve(equity: &[f64]) -> Vec<EquitySample> {
        curve_with_step(equity, 1)
    }

    fn curve_with_step(equity: &[f64], step_days: i64) -> Vec<EquitySample> {
        equity
            .iter()
            .enumerate()
            .map(|(i, &e)| EquitySample {
                date: day(i as i64 * step_days),
                cash: e,
                position_value: 0.0,
                equity: e,
                running_peak: e,
                drawdown: 0.0,
                open_count: 0,
            })
            .collect()
    }

    fn make_trade(pnl: f64, hold_days: usize, exit_reason: ExitReason) -> Trade {
        Trade {
            symbol: "SPY".into(),
            entry_date: day(0),
            exit_date: day(hold_days as i64),
            entry_price: 100.0,
            exit_price: 100.0 + pnl / 50.0,
            shares: 50,
            pnl,
            pnl_pct: pnl / 5_000.0,
            hold_days,
            entry_reason: EntryReason::BuyAndHold,
            exit_reason,
            commission: 0.0,
        }
    }

    fn pnl_trades(pnls: &[f64]) -> Vec<Trade> {
        pnls.iter()
            .map(|&p| make_trade(p, 5, ExitReason::TrailingStop))
            .collect()
    }

    // ── Scenario D: nothing happened ──

    #[test]
    fn zero_trades_gives_zero_ratios() {
        let eq = curve(&[100_000.0; 30]);
        let r = PerformanceReport::compute(&eq, &[], 100_000.0, &MetricsConfig::default(), None);
        assert_eq!(r.trade_count, 0);
        for v in [
            r.total_return,
            r.cagr,
            r.max_drawdown,
            r.sharpe,
            r.sortino,
            r.calmar,
            r.recovery_factor,
            r.information_ratio,
            r.value_at_risk,
            r.conditional_var,
            r.exposure,
            r.win_rate,
            r.profit_factor,
            r.avg_win,
            r.avg_loss,
            r.avg_trade,
            r.largest_win,
            r.largest_loss,
            r.avg_hold_days,
            r.avg_drawdown,
        ] {
            assert_eq!(v, 0.0);
        }
        assert!(r.exit_reasons.is_empty());
    }

    #[test]
    fn empty_curve_is_all_zeros() {
        let r = PerformanceReport::compute(&[], &[], 50_000.0, &MetricsConfig::default(), None);
        assert_eq!(r.final_equity, 50_000.0);
        assert_eq!(r.total_return, 0.0);
        assert_eq!(r.sharpe, 0.0);
        assert_eq!(r.max_drawdown_duration, 0);
    }

    // ── Returns ──

    #[test]
    fn cagr_over_calendar_years() {
        // 10% over exactly 365.25 * 2 days
        let c = cagr(100.0, 121.0, 2.0);
        assert!((c - 0.1).abs() < 1e-12);
        assert_eq!(cagr(100.0, 121.0, 0.0), 0.0);
        assert_eq!(cagr(100.0, 0.0, 1.0), 0.0);
    }

    #[test]
    fn years_use_calendar_days() {
        let eq = curve_with_step(&[1.0, 1.0], 365);
        assert!((years_between(&eq) - 365.0 / 365.25).abs() < 1e-12);
    }

    #[test]
    fn monthly_resampling_uses_period_end() {
        // Every 10 days from Jan 1: four samples in Jan, two in Feb, two in Mar.
        let eq = curve_with_step(&[100.0, 101.0, 102.0, 110.0, 108.0, 121.0, 105.0, 99.0], 10);
        let r = period_returns(&eq, 100.0, ReturnFrequency::Monthly);
        assert_eq!(r.len(), 3);
        assert!((r[0] - 0.10).abs() < 1e-12);
        assert!((r[1] - 0.10).abs() < 1e-12);
        assert!((r[2] - (99.0 / 121.0 - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn daily_returns_start_from_initial_capital() {
        let eq = curve(&[110.0, 99.0]);
        let r = period_returns(&eq, 100.0, ReturnFrequency::Daily);
        assert_eq!(r.len(), 2);
        assert!((r[0] - 0.1).abs() < 1e-12);
        assert!((r[1] + 0.1).abs() < 1e-12);
    }

    // ── Sharpe / Sortino / IR ──

    #[test]
    fn sharpe_constant_return_is_zero() {
        assert_eq!(sharpe_ratio(&[0.01; 20], 0.0, 252.0), 0.0);
        assert_eq!(sharpe_ratio(&[0.01], 0.0, 252.0), 0.0);
    }

    #[test]
    fn sharpe_known_value() {
        let r = [0.02, 0.0];
        // mean 0.01, sample std sqrt(0.0002)
        let expected = 0.01 / 0.0002_f64.sqrt() * 12.0_f64.sqrt();
        assert!((sharpe_ratio(&r, 0.0, 12.0) - expected).abs() < 1e-12);
    }

    #[test]
    fn sortino_uses_only_negative_returns() {
        let r = [0.05, -0.01, 0.03, -0.03];
        let downside_std = std_dev(&[-0.01, -0.03]);
        let expected = mean_f64(&r) / downside_std * 12.0_f64.sqrt();
        assert!((sortino_ratio(&r, 0.0, 12.0) - expected).abs() < 1e-12);
        assert_eq!(sortino_ratio(&[0.01, 0.02, 0.03], 0.0, 12.0), 0.0);
    }

    #[test]
    fn information_ratio_against_itself_is_zero() {
        let r = [0.01, -0.02, 0.03];
        assert_eq!(information_ratio(&r, &r, 12.0), 0.0);
        assert_eq!(information_ratio(&r, &r[..2], 12.0), 0.0);
        assert!(information_ratio(&r, &[0.0, -0.03, 0.0], 12.0) > 0.0);
    }

    // ── Drawdown ──

    #[test]
    fn drawdown_statistics() {
        let eq = [100.0, 110.0, 99.0, 88.0, 110.0, 121.0, 110.0];
        assert!((max_drawdown(100.0, &eq) - (-0.2)).abs() < 1e-12);
        assert_eq!(max_drawdown_duration(100.0, &eq), 2);
        let expected = (-0.1 - 0.2 - 1.0 / 11.0) / 3.0;
        assert!((avg_drawdown(100.0, &eq) - expected).abs() < 1e-12);
        assert!((ratio_to_drawdown(0.1, -0.2) - 0.5).abs() < 1e-12);
        assert_eq!(ratio_to_drawdown(0.1, 0.0), 0.0);
    }

    #[test]
    fn drawdown_peak_is_seeded_with_initial_capital() {
        assert!((max_drawdown(100.0, &[90.0, 95.0]) - (-0.1)).abs() < 1e-12);
    }

    // ── Trades ──

    #[test]
    fn profit_factor_rules() {
        assert_eq!(profit_factor(&[]), 0.0);
        assert_eq!(profit_factor(&pnl_trades(&[-10.0, -5.0])), 0.0);
        assert_eq!(profit_factor(&pnl_trades(&[10.0, 5.0])), PROFIT_FACTOR_CAP);
        assert!((profit_factor(&pnl_trades(&[500.0, -200.0, 300.0])) - 4.0).abs() < 1e-12);
        // Uncapped when losses exist.
        assert!((profit_factor(&pnl_trades(&[1_000.0, -1.0])) - 1_000.0).abs() < 1e-9);
    }

    #[test]
    fn trade_statistics() {
        let trades = vec![
            make_trade(100.0, 4, ExitReason::ProfitTarget),
            make_trade(200.0, 6, ExitReason::ProfitTarget),
            make_trade(-50.0, 2, ExitReason::StopLoss),
            make_trade(-25.0, 3, ExitReason::StopLoss),
            make_trade(-25.0, 5, ExitReason::StopLoss),
            make_trade(300.0, 10, ExitReason::EndOfBacktest),
        ];
        let eq = curve(&[100_000.0, 100_500.0]);
        let r = PerformanceReport::compute(&eq, &trades, 100_000.0, &MetricsConfig::default(), None);
        assert_eq!(r.winning_trades, 3);
        assert_eq!(r.losing_trades, 3);
        assert!((r.win_rate - 0.5).abs() < 1e-12);
        assert!((r.avg_win - 200.0).abs() < 1e-12);
        assert!((r.avg_loss + 100.0 / 3.0).abs() < 1e-12);
        assert!((r.avg_trade - 500.0 / 6.0).abs() < 1e-12);
        assert_eq!(r.largest_win, 300.0);
        assert_eq!(r.largest_loss, -50.0);
        assert!((r.avg_hold_days - 5.0).abs() < 1e-12);
        assert_eq!(r.max_consecutive_wins, 2);
        assert_eq!(r.max_consecutive_losses, 3);
        assert_eq!(r.exit_reasons[&ExitReason::StopLoss], 3);
        assert_eq!(r.exit_reasons[&ExitReason::ProfitTarget], 2);
        assert_eq!(r.exit_reasons[&ExitReason::EndOfBacktest], 1);
    }

    #[test]
    fn exposure_counts_invested_samples() {
        let mut eq = curve(&[1.0, 1.0, 1.0, 1.0]);
        eq[1].open_count = 2;
        eq[2].open_count = 1;
        assert!((exposure(&eq) - 0.5).abs() < 1e-12);
    }

    // ── Benchmark ──

    #[test]
    fn benchmark_is_equal_weight_buy_and_hold() {
        let bars = |symbol: &str, closes: &[f64]| {
            let v: Vec<Bar> = closes
                .iter()
                .enumerate()
                .map(|(i, &c)| Bar {
                    symbol: symbol.into(),
                    date: day(i as i64),
                    open: c,
                    high: c,
                    low: c,
                    close: c,
                    volume: 1,
                })
                .collect();
            (symbol.to_string(), v)
        };
        let universe = Universe::from_bars(vec![
            bars("A", &[10.0, 20.0, 20.0]),
            bars("B", &[50.0, 50.0, 25.0]),
        ]);
        let dates = [day(0), day(1), day(2)];
        let b = benchmark_curve(&universe, &dates, 1_000.0);
        assert_eq!(b.len(), 3);
        assert!((b[0] - 1_000.0).abs() < 1e-9);
        assert!((b[1] - 1_500.0).abs() < 1e-9);
        assert!((b[2] - 1_250.0).abs() < 1e-9);
    }

    #[test]
    fn every_field_is_finite_on_a_real_curve() {
        let mut values = vec![100_000.0];
        for i in 1..400 {
            let r = if i % 3 == 0 { 0.996 } else { 1.003 };
            values.push(values[i - 1] * r);
        }
        let eq = curve(&values);
        let trades = pnl_trades(&[500.0, -200.0, 300.0]);
        let bench: Vec<f64> = values.iter().map(|v| v * 0.99).collect();
        let r = PerformanceReport::compute(
            &eq,
            &trades,
            100_000.0,
            &MetricsConfig::default(),
            Some(&bench),
        );
        let json = serde_json::to_value(&r).unwrap();
        for (key, v) in json.as_object().unwrap() {
            if let Some(f) = v.as_f64() {
                assert!(f.is_finite(), "{key} is not finite");
            }
        }
        assert!(r.sharpe > 0.0);
        assert!(r.max_drawdown < 0.0);
        assert!(r.conditional_var <= r.value_at_risk);
    }
}
