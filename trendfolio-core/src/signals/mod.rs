//! Signals: entry and exit decisions per symbol per bar.
//!
//! Evaluators only ever receive a [`History`](crate::domain::History) prefix,
//! the symbol's own indicator track and the date's cross-sectional context.
//! Portfolio state is out of reach, apart from the position being exited.

pub mod engine;
pub mod momentum;
pub mod rules;

pub use engine::{needs_momentum, IndicatorTrack, SignalContext, SignalEngine};
pub use momentum::{momentum_pct, MomentumBook, MomentumParams, MomentumScore, RebalanceFrequency};
pub use rules::{EntryRule, ExitRule, StopMethod};

use crate::domain::{EntryReason, ExitReason};

/// Outcome of evaluating one symbol on one bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Signal {
    /// Open a position. The strength feeds tiered sizing.
    Entry(EntryReason, f64),
    Exit(ExitReason),
    None,
}

impl Signal {
    pub fn is_entry(&self) -> bool {
        matches!(self, Self::Entry(..))
    }

    pub fn is_exit(&self) -> bool {
        matches!(self, Self::Exit(_))
    }
}
