//! Domain types: bars, series, positions, trades and portfolio state.

pub mod bar;
pub mod portfolio;
pub mod position;
pub mod reason;
pub mod series;
pub mod trade;

pub use bar::{Bar, BarError};
pub use portfolio::{EquitySample, PortfolioState};
pub use position::{Position, PositionStatus};
pub use reason::{EntryReason, ExitReason};
pub use series::{DataError, History, PriceSeries, SkippedSymbol, Universe};
pub use trade::Trade;
