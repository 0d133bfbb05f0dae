//! Signal engine: turns rules plus per-symbol indicator state into signals.
//!
//! Entry rules are tried in configured order and the first that fires wins.
//! Exit rules are sorted once, at construction, by [`ExitReason`] priority, so
//! a stop-loss is always recorded ahead of a trend reversal on the same bar.

use tracing::trace;

use crate::config::{ConfigError, EngineConfig};
use crate::domain::{Bar, EntryReason, ExitReason, History, Position};
use crate::indicators::window::{highest_high, lowest_low, mean_close, mean_volume};
use crate::indicators::{AtrSmoothing, AtrState, Direction, TrendReading, TrendState};

use super::momentum::MomentumBook;
use super::rules::{EntryRule, ExitRule, StopMethod};
use super::Signal;

/// Streaming indicators for one symbol, advanced once per observed bar.
#[derive(Debug, Clone)]
pub struct IndicatorTrack {
    entry_trend: TrendState,
    exit_trend: TrendState,
    stop_atr: AtrState,
    entry_reading: Option<TrendReading>,
    exit_reading: Option<TrendReading>,
    bars_seen: usize,
}

impl IndicatorTrack {
    pub fn new(config: &EngineConfig) -> Result<Self, ConfigError> {
        config.entry_trend.validate("entry_trend")?;
        config.exit_trend.validate("exit_trend")?;
        if config.stop_atr_period == 0 {
            return Err(ConfigError::ZeroPeriod {
                name: "stop_atr_period",
            });
        }
        Ok(Self {
            entry_trend: TrendState::new(config.entry_trend)?,
            exit_trend: TrendState::new(config.exit_trend)?,
            stop_atr: AtrState::new(config.stop_atr_period, AtrSmoothing::Wilder),
            entry_reading: None,
            exit_reading: None,
            bars_seen: 0,
        })
    }

    pub fn advance(&mut self, bar: &Bar) {
        self.entry_reading = self.entry_trend.step(bar);
        self.exit_reading = self.exit_trend.step(bar);
        self.stop_atr.update(bar);
        self.bars_seen += 1;
    }

    /// Entry trend reading for the latest bar.
    pub fn entry_reading(&self) -> Option<&TrendReading> {
        self.entry_reading.as_ref()
    }

    /// Exit trend reading for the latest bar.
    pub fn exit_reading(&self) -> Option<&TrendReading> {
        self.exit_reading.as_ref()
    }

    pub fn atr(&self) -> Option<f64> {
        self.stop_atr.value()
    }

    pub fn bars_seen(&self) -> usize {
        self.bars_seen
    }
}

/// Cross-sectional inputs for the current date.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalContext<'a> {
    pub momentum: Option<&'a MomentumBook>,
    /// The current date opens a rebalance period.
    pub rebalance: bool,
}

#[derive(Debug, Clone)]
pub struct SignalEngine {
    entry_rules: Vec<EntryRule>,
    exit_rules: Vec<ExitRule>,
}

impl SignalEngine {
    pub fn new(entry_rules: Vec<EntryRule>, mut exit_rules: Vec<ExitRule>) -> Self {
        exit_rules.sort_by_key(ExitRule::reason);
        Self {
            entry_rules,
            exit_rules,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.entry_rules.clone(), config.exit_rules.clone())
    }

    pub fn entry_rules(&self) -> &[EntryRule] {
        &self.entry_rules
    }

    /// Exit rules in evaluation order.
    pub fn exit_rules(&self) -> &[ExitRule] {
        &self.exit_rules
    }

    /// Exit rules for an open position, entry rules otherwise.
    pub fn evaluate(
        &self,
        history: History<'_>,
        track: &IndicatorTrack,
        position: Option<&Position>,
        ctx: &SignalContext<'_>,
    ) -> Signal {
        match position {
            Some(pos) => self.evaluate_exit(history, track, pos, ctx),
            None => self.evaluate_entry(history, track, ctx),
        }
    }

    pub fn evaluate_entry(
        &self,
        history: History<'_>,
        track: &IndicatorTrack,
        ctx: &SignalContext<'_>,
    ) -> Signal {
        for rule in &self.entry_rules {
            if let Some(strength) = entry_strength(rule, history, track, ctx) {
                trace!(
                    symbol = %history.current().symbol,
                    date = %history.current().date,
                    reason = %rule.reason(),
                    strength,
                    "entry signal"
                );
                return Signal::Entry(rule.reason(), strength);
            }
        }
        Signal::None
    }

    pub fn evaluate_exit(
        &self,
        history: History<'_>,
        track: &IndicatorTrack,
        position: &Position,
        ctx: &SignalContext<'_>,
    ) -> Signal {
        self.exit_rules
            .iter()
            .find(|rule| exit_fires(rule, history, track, position, ctx))
            .map_or(Signal::None, |rule| Signal::Exit(rule.reason()))
    }
}

/// Signal strength when the rule fires.
fn entry_strength(
    rule: &EntryRule,
    history: History<'_>,
    track: &IndicatorTrack,
    ctx: &SignalContext<'_>,
) -> Option<f64> {
    let bar = history.current();
    match rule {
        EntryRule::TrendUp { require_flip } => {
            let reading = track.entry_reading()?;
            let up = reading.direction == Direction::Up;
            if !up || (*require_flip && !reading.flipped) {
                return None;
            }
            Some((bar.close / reading.final_lower - 1.0) * 100.0)
        }
        EntryRule::Breakout {
            lookback,
            volume_multiplier,
            volume_lookback,
            trend_ma,
        } => {
            let prior_high = history.prior(*lookback).and_then(highest_high)?;
            let avg_volume = history.prior(*volume_lookback).and_then(mean_volume)?;
            if bar.close <= prior_high || (bar.volume as f64) <= volume_multiplier * avg_volume {
                return None;
            }
            if let Some(ma) = trend_ma {
                let sma = history.trailing(*ma).and_then(mean_close)?;
                if bar.close <= sma {
                    return None;
                }
            }
            Some((bar.close / prior_high - 1.0) * 100.0)
        }
        EntryRule::MomentumRankTop => {
            let book = ctx.momentum?;
            if !ctx.rebalance || !book.in_entry_set(&bar.symbol) {
                return None;
            }
            book.momentum(&bar.symbol)
        }
        EntryRule::BuyAndHold => Some(0.0),
    }
}

fn exit_fires(
    rule: &ExitRule,
    history: History<'_>,
    track: &IndicatorTrack,
    position: &Position,
    ctx: &SignalContext<'_>,
) -> bool {
    let close = history.current().close;
    match rule {
        ExitRule::StopLoss {
            method: StopMethod::FixedPct,
            value,
        } => close <= position.entry_price * (1.0 - value),
        ExitRule::StopLoss {
            method: StopMethod::Atr,
            value,
        } => position
            .entry_atr
            .is_some_and(|atr| close <= position.entry_price - value * atr),
        ExitRule::ProfitTarget { pct } => close >= position.entry_price * (1.0 + pct),
        ExitRule::TrailingStop { pct } => close < position.highest_price_since_entry * (1.0 - pct),
        ExitRule::TrendReversal => track.exit_reading().is_some_and(TrendReading::flipped_down),
        ExitRule::Breakdown { lookback } => history
            .prior(*lookback)
            .and_then(lowest_low)
            .is_some_and(|low| close < low),
        ExitRule::MomentumRankLost => match ctx.momentum {
            Some(book) if ctx.rebalance => !book.in_hold_set(&position.symbol),
            _ => false,
        },
        ExitRule::MaxHold { bars } => position.bars_held >= *bars,
    }
}

/// Entry reasons that only fire on rebalance dates.
pub fn needs_momentum(config: &EngineConfig) -> bool {
    config
        .entry_rules
        .iter()
        .any(|r| r.reason() == EntryReason::MomentumRankTop)
        || config
            .exit_rules
            .iter()
            .any(|r| r.reason() == ExitReason::MomentumRankLost)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{make_bars, TrendParams};
    use chrono::NaiveDate;

    fn config() -> EngineConfig {
        EngineConfig {
            entry_trend: TrendParams::new(3, 1.0),
            exit_trend: TrendParams::new(3, 1.0),
            stop_atr_period: 3,
            ..EngineConfig::default()
        }
    }

    fn warmed(bars: &[Bar]) -> IndicatorTrack {
        let mut track = IndicatorTrack::new(&config()).unwrap();
        for b in bars {
            track.advance(b);
        }
        track
    }

    fn position_at(entry_price: f64, entry_atr: Option<f64>) -> Position {
        Position::open(
            "TEST".into(),
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            0,
            entry_price,
            10,
            entry_atr,
            EntryReason::TrendUp,
            0.0,
        )
    }

    #[test]
    fn exit_rules_sorted_by_priority() {
        let engine = SignalEngine::new(
            vec![EntryRule::BuyAndHold],
            vec![
                ExitRule::MaxHold { bars: 5 },
                ExitRule::TrendReversal,
                ExitRule::StopLoss {
                    method: StopMethod::FixedPct,
                    value: 0.1,
                },
            ],
        );
        let reasons: Vec<ExitReason> = engine.exit_rules().iter().map(ExitRule::reason).collect();
        assert_eq!(
            reasons,
            vec![
                ExitReason::StopLoss,
                ExitReason::TrendReversal,
                ExitReason::MaxHoldExpired
            ]
        );
    }

    #[test]
    fn stop_loss_wins_over_max_hold() {
        let bars = make_bars(&[100.0, 99.0, 98.0, 85.0]);
        let track = warmed(&bars);
        let engine = SignalEngine::new(
            vec![],
            vec![
                ExitRule::MaxHold { bars: 1 },
                ExitRule::StopLoss {
                    method: StopMethod::FixedPct,
                    value: 0.1,
                },
            ],
        );
        let mut pos = position_at(100.0, None);
        pos.bars_held = 3;
        let h = History::upto(&bars, 3).unwrap();
        assert_eq!(
            engine.evaluate_exit(h, &track, &pos, &SignalContext::default()),
            Signal::Exit(ExitReason::StopLoss)
        );
    }

    #[test]
    fn atr_stop_needs_entry_atr() {
        let bars = make_bars(&[100.0, 99.0, 98.0, 90.0]);
        let track = warmed(&bars);
        let engine = SignalEngine::new(
            vec![],
            vec![ExitRule::StopLoss {
                method: StopMethod::Atr,
                value: 2.0,
            }],
        );
        let h = History::upto(&bars, 3).unwrap();
        let ctx = SignalContext::default();
        assert_eq!(
            engine.evaluate_exit(h, &track, &position_at(100.0, Some(4.0)), &ctx),
            Signal::Exit(ExitReason::StopLoss)
        );
        assert_eq!(
            engine.evaluate_exit(h, &track, &position_at(100.0, Some(6.0)), &ctx),
            Signal::None
        );
        assert_eq!(
            engine.evaluate_exit(h, &track, &position_at(100.0, None), &ctx),
            Signal::None
        );
    }

    #[test]
    fn trailing_and_profit_target() {
        let bars = make_bars(&[100.0, 120.0, 101.0]);
        let track = warmed(&bars);
        let ctx = SignalContext::default();
        let mut pos = position_at(100.0, None);
        pos.highest_price_since_entry = 120.0;
        let trailing = SignalEngine::new(vec![], vec![ExitRule::TrailingStop { pct: 0.15 }]);
        let h = History::upto(&bars, 2).unwrap();
        assert_eq!(
            trailing.evaluate_exit(h, &track, &pos, &ctx),
            Signal::Exit(ExitReason::TrailingStop)
        );
        let target = SignalEngine::new(vec![], vec![ExitRule::ProfitTarget { pct: 0.15 }]);
        let h1 = History::upto(&bars, 1).unwrap();
        assert_eq!(
            target.evaluate_exit(h1, &track, &pos, &ctx),
            Signal::Exit(ExitReason::ProfitTarget)
        );
    }

    #[test]
    fn breakout_needs_volume_confirmation() {
        let mut bars = make_bars(&[100.0, 101.0, 100.5, 101.5, 100.8, 105.0]);
        let engine = SignalEngine::new(
            vec![EntryRule::Breakout {
                lookback: 3,
                volume_multiplier: 1.5,
                volume_lookback: 3,
                trend_ma: None,
            }],
            vec![],
        );
        let ctx = SignalContext::default();
        let quiet = warmed(&bars);
        let h = History::upto(&bars, 5).unwrap();
        assert_eq!(engine.evaluate_entry(h, &quiet, &ctx), Signal::None);

        bars[5].volume = 2_000;
        let h = History::upto(&bars, 5).unwrap();
        match engine.evaluate_entry(h, &quiet, &ctx) {
            Signal::Entry(EntryReason::Breakout, strength) => {
                // prior 3-bar high is 102.5
                assert!((strength - (105.0 / 102.5 - 1.0) * 100.0).abs() < 1e-10);
            }
            other => panic!("expected breakout, got {other:?}"),
        }
    }

    #[test]
    fn breakout_respects_trend_filter() {
        let mut bars = make_bars(&[200.0, 150.0, 100.0, 100.5, 101.0, 104.0]);
        bars[5].volume = 5_000;
        let engine = SignalEngine::new(
            vec![EntryRule::Breakout {
                lookback: 2,
                volume_multiplier: 1.5,
                volume_lookback: 2,
                trend_ma: Some(6),
            }],
            vec![],
        );
        let h = History::upto(&bars, 5).unwrap();
        let track = warmed(&bars);
        assert_eq!(
            engine.evaluate_entry(h, &track, &SignalContext::default()),
            Signal::None
        );
    }

    #[test]
    fn first_matching_entry_rule_wins() {
        let bars = make_bars(&[100.0, 101.0, 102.0, 103.0, 104.0]);
        let track = warmed(&bars);
        let engine = SignalEngine::new(
            vec![
                EntryRule::TrendUp { require_flip: true },
                EntryRule::TrendUp {
                    require_flip: false,
                },
                EntryRule::BuyAndHold,
            ],
            vec![],
        );
        let h = History::upto(&bars, 4).unwrap();
        match engine.evaluate_entry(h, &track, &SignalContext::default()) {
            Signal::Entry(EntryReason::TrendUp, strength) => assert!(strength > 0.0),
            other => panic!("expected trend entry, got {other:?}"),
        }
    }

    #[test]
    fn trend_entry_waits_for_warmup() {
        let bars = make_bars(&[100.0, 101.0]);
        let track = warmed(&bars);
        let engine = SignalEngine::new(vec![EntryRule::TrendUp { require_flip: false }], vec![]);
        let h = History::upto(&bars, 1).unwrap();
        assert_eq!(
            engine.evaluate_entry(h, &track, &SignalContext::default()),
            Signal::None
        );
    }

    #[test]
    fn momentum_rules_only_fire_on_rebalance() {
        use crate::signals::momentum::{MomentumBook, MomentumParams};
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let bars = make_bars(&closes);
        let h = History::upto(&bars, 39).unwrap();
        let params = MomentumParams {
            lookback: 20,
            min_lookback: 5,
            ..MomentumParams::default()
        };
        let book = MomentumBook::rank([h], &params, false);
        let track = warmed(&bars);
        let engine = SignalEngine::new(vec![EntryRule::MomentumRankTop], vec![]);

        let off = SignalContext {
            momentum: Some(&book),
            rebalance: false,
        };
        assert_eq!(engine.evaluate_entry(h, &track, &off), Signal::None);
        let on = SignalContext {
            momentum: Some(&book),
            rebalance: true,
        };
        assert!(matches!(
            engine.evaluate_entry(h, &track, &on),
            Signal::Entry(EntryReason::MomentumRankTop, _)
        ));

        let exit = SignalEngine::new(vec![], vec![ExitRule::MomentumRankLost]);
        let empty = MomentumBook::default();
        let lost = SignalContext {
            momentum: Some(&empty),
            rebalance: true,
        };
        assert_eq!(
            exit.evaluate_exit(h, &track, &position_at(100.0, None), &lost),
            Signal::Exit(ExitReason::MomentumRankLost)
        );
    }
}
