//! Bar: one day of OHLCV data for one symbol.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV bar for a single symbol on a single day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Why a bar was rejected by [`Bar::validate`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BarError {
    #[error("{symbol} {date}: {field} is not finite")]
    NonFinite {
        symbol: String,
        date: NaiveDate,
        field: &'static str,
    },

    #[error("{symbol} {date}: {field} must be positive, got {value}")]
    NonPositive {
        symbol: String,
        date: NaiveDate,
        field: &'static str,
        value: f64,
    },

    #[error("{symbol} {date}: OHLC out of range (low {low}, open {open}, close {close}, high {high})")]
    InconsistentRange {
        symbol: String,
        date: NaiveDate,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },
}

impl Bar {
    /// Midpoint of the bar's range.
    pub fn hl2(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    /// Check finiteness, positivity and `low <= open, close <= high`.
    pub fn validate(&self) -> Result<(), BarError> {
        let fields = [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ];
        for (field, value) in fields {
            if !value.is_finite() {
                return Err(BarError::NonFinite {
                    symbol: self.symbol.clone(),
                    date: self.date,
                    field,
                });
            }
            if value <= 0.0 {
                return Err(BarError::NonPositive {
                    symbol: self.symbol.clone(),
                    date: self.date,
                    field,
                    value,
                });
            }
        }

        let lo = self.open.min(self.close);
        let hi = self.open.max(self.close);
        if self.low > lo || self.high < hi {
            return Err(BarError::InconsistentRange {
                symbol: self.symbol.clone(),
                date: self.date,
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}
