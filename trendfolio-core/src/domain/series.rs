//! Price series, the multi-symbol universe, and the backward-only history view.
//!
//! A [`PriceSeries`] is cleaned on construction: invalid bars, bars for another
//! symbol and repeated dates are dropped with a warning, and the remainder is
//! sorted ascending by date. A symbol left with no usable bars never enters the
//! [`Universe`]; it is recorded as skipped instead.
//!
//! [`History`] is the only way rule evaluators see bars. It can only be built
//! as a prefix `bars[..=index]`, so nothing after the current bar is reachable.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use super::bar::Bar;

/// Errors raised while assembling series into a universe.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("{symbol}: no usable bars ({dropped} dropped)")]
    Empty { symbol: String, dropped: usize },

    #[error("{symbol}: loaded twice")]
    DuplicateSymbol { symbol: String },
}

/// Date-ascending bars for one symbol. Gaps between dates are allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<Bar>,
}

impl PriceSeries {
    /// Build a cleaned series. Returns the series and the number of dropped bars.
    pub fn new(symbol: impl Into<String>, bars: Vec<Bar>) -> Result<(Self, usize), DataError> {
        let symbol = symbol.into();
        let total = bars.len();

        let mut kept: Vec<Bar> = bars
            .into_iter()
            .filter(|bar| {
                if bar.symbol != symbol {
                    warn!(expected = %symbol, found = %bar.symbol, date = %bar.date, "dropping bar for foreign symbol");
                    return false;
                }
                match bar.validate() {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(error = %e, "dropping malformed bar");
                        false
                    }
                }
            })
            .collect();

        kept.sort_by_key(|bar| bar.date);
        kept.dedup_by(|later, earlier| {
            if later.date == earlier.date {
                warn!(symbol = %later.symbol, date = %later.date, "dropping repeated date");
                true
            } else {
                false
            }
        });

        let dropped = total - kept.len();
        if kept.is_empty() {
            return Err(DataError::Empty { symbol, dropped });
        }
        Ok((Self { symbol, bars: kept }, dropped))
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_date(&self) -> NaiveDate {
        self.bars[0].date
    }

    pub fn last_date(&self) -> NaiveDate {
        self.bars[self.bars.len() - 1].date
    }

    /// Index of the last bar dated on or before `date`.
    pub fn index_at_or_before(&self, date: NaiveDate) -> Option<usize> {
        match self.bars.binary_search_by_key(&date, |b| b.date) {
            Ok(i) => Some(i),
            Err(0) => None,
            Err(i) => Some(i - 1),
        }
    }

    /// Backward-only view ending at `index`.
    pub fn history(&self, index: usize) -> Option<History<'_>> {
        History::upto(&self.bars, index)
    }
}

/// A symbol that could not be admitted to the universe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub reason: String,
}

/// All series for one backtest, keyed and iterated in symbol order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Universe {
    series: BTreeMap<String, PriceSeries>,
    skipped: Vec<SkippedSymbol>,
}

impl Universe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw per-symbol bars. Unusable symbols are skipped, never fatal.
    pub fn from_bars<I>(input: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<Bar>)>,
    {
        let mut universe = Self::new();
        for (symbol, bars) in input {
            match PriceSeries::new(symbol.clone(), bars) {
                Ok((series, _)) => {
                    if let Err(e) = universe.insert(series) {
                        universe.skip(symbol, &e);
                    }
                }
                Err(e) => universe.skip(symbol, &e),
            }
        }
        universe
    }

    pub fn insert(&mut self, series: PriceSeries) -> Result<(), DataError> {
        if self.series.contains_key(series.symbol()) {
            return Err(DataError::DuplicateSymbol {
                symbol: series.symbol().to_string(),
            });
        }
        self.series.insert(series.symbol().to_string(), series);
        Ok(())
    }

    /// Record a symbol that was excluded before or during loading.
    pub fn skip(&mut self, symbol: impl Into<String>, reason: &dyn std::fmt::Display) {
        let symbol = symbol.into();
        warn!(%symbol, %reason, "skipping symbol");
        self.skipped.push(SkippedSymbol {
            symbol,
            reason: reason.to_string(),
        });
    }

    pub fn get(&self, symbol: &str) -> Option<&PriceSeries> {
        self.series.get(symbol)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PriceSeries> {
        self.series.values()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn skipped(&self) -> &[SkippedSymbol] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Prefix view `bars[..=index]` over one symbol's series.
///
/// The last bar is "now"; windows reach only into earlier bars.
#[derive(Debug, Clone, Copy)]
pub struct History<'a> {
    bars: &'a [Bar],
}

impl<'a> History<'a> {
    /// `None` when `index` is out of range.
    pub fn upto(bars: &'a [Bar], index: usize) -> Option<Self> {
        bars.get(..=index).map(|bars| Self { bars })
    }

    pub fn current(&self) -> &'a Bar {
        &self.bars[self.bars.len() - 1]
    }

    /// Index of the current bar within its series.
    pub fn index(&self) -> usize {
        self.bars.len() - 1
    }

    /// Number of bars visible, current included.
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn bars(&self) -> &'a [Bar] {
        self.bars
    }

    /// The `n` bars strictly before the current one.
    pub fn prior(&self, n: usize) -> Option<&'a [Bar]> {
        let end = self.index();
        if n == 0 || n > end {
            return None;
        }
        Some(&self.bars[end - n..end])
    }

    /// The last `n` bars, current included.
    pub fn trailing(&self, n: usize) -> Option<&'a [Bar]> {
        if n == 0 || n > self.bars.len() {
            return None;
        }
        Some(&self.bars[self.bars.len() - n..])
    }

    /// Close `n` bars before the current one.
    pub fn close_back(&self, n: usize) -> Option<f64> {
        self.index().checked_sub(n).map(|i| self.bars[i].close)
    }
}
