//! Global date timeline: the sorted union of every symbol's bar dates.

use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::domain::Universe;
use crate::signals::RebalanceFrequency;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    dates: Vec<NaiveDate>,
}

impl Timeline {
    /// Union of all dates, optionally cut at `end` (inclusive).
    pub fn from_universe(universe: &Universe, end: Option<NaiveDate>) -> Self {
        let set: BTreeSet<NaiveDate> = universe
            .iter()
            .flat_map(|s| s.bars().iter().map(|b| b.date))
            .filter(|d| end.map_or(true, |end| *d <= end))
            .collect();
        Self {
            dates: set.into_iter().collect(),
        }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn last(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// The date at `index` opens a new rebalance period. The first date does.
    pub fn is_rebalance(&self, index: usize, frequency: RebalanceFrequency) -> bool {
        match index {
            0 => !self.dates.is_empty(),
            i if i < self.dates.len() => {
                frequency.starts_period(self.dates[i - 1], self.dates[i])
            }
            _ => false,
        }
    }
}
