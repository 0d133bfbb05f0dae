//! Backtesting engine: ledger, timeline and the walk-forward loop.
//!
//! The simulator owns one [`PositionLedger`] per run and drives it through a
//! fixed per-date phase order: mark, exits, entries, mark-to-market, sample.

pub mod ledger;
pub mod simulator;
pub mod timeline;

pub use ledger::{Admission, EntryRequest, PositionLedger};
pub use simulator::{simulate, RunDiagnostics, SimulationOutcome};
pub use timeline::Timeline;
