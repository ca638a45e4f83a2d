//! Date to index alignment over the shared weekly axis.
//!
//! Two rounding directions exist and must not be confused:
//! [`CalendarIndex::index_at_or_before`] floors (the data point visible at a
//! simulated date), [`CalendarIndex::index_at_or_after`] ceils (the first data
//! point a switch made on that date can affect).

use crate::store::{parse_date_str, TimeSeriesStore};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Sorted date axis with floor/ceiling lookups.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CalendarIndex {
    dates: Vec<NaiveDate>,
}

impl CalendarIndex {
    /// `dates` must be strictly increasing.
    pub fn new(dates: Vec<NaiveDate>) -> Self {
        debug_assert!(dates.windows(2).all(|w| w[0] < w[1]));
        Self { dates }
    }

    pub fn from_store(store: &TimeSeriesStore) -> Self {
        Self::new(store.dates())
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn date(&self, index: usize) -> Option<NaiveDate> {
        self.dates.get(index).copied()
    }

    pub fn last_index(&self) -> usize {
        self.dates.len().saturating_sub(1)
    }

    /// Greatest `i` with `dates[i] <= date`; 0 when `date` precedes the data.
    pub fn index_at_or_before(&self, date: NaiveDate) -> usize {
        self.dates.partition_point(|d| *d <= date).saturating_sub(1)
    }

    /// Smallest `i` with `dates[i] >= date`; the last index when `date` is
    /// past the data.
    pub fn index_at_or_after(&self, date: NaiveDate) -> usize {
        let i = self.dates.partition_point(|d| *d < date);
        i.min(self.last_index())
    }

    /// First index falling in January of `year`.
    pub fn year_start_index(&self, year: i32) -> Option<usize> {
        let i = self
            .dates
            .partition_point(|d| (d.year(), d.month()) < (year, 1));
        self.dates
            .get(i)
            .filter(|d| d.year() == year && d.month() == 1)
            .map(|_| i)
    }
}

/// Key whose date is closest to `date`.
///
/// Keys that do not parse as dates are ignored. Ties keep the first key seen.
/// When the best match is further than `tolerance_days`, the earliest key is
/// returned instead so that something is always shown. `None` only when no
/// key parses.
pub fn nearest_date_key<'a, I>(date: NaiveDate, keys: I, tolerance_days: i64) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(&'a str, i64)> = None;
    let mut earliest: Option<(&'a str, NaiveDate)> = None;
    for key in keys {
        let Some(d) = parse_date_str(key) else {
            continue;
        };
        let diff = (d - date).num_days().abs();
        if best.map_or(true, |(_, b)| diff < b) {
            best = Some((key, diff));
        }
        if earliest.map_or(true, |(_, e)| d < e) {
            earliest = Some((key, d));
        }
    }
    let (key, diff) = best?;
    if diff > tolerance_days {
        return earliest.map(|(k, _)| k);
    }
    Some(key)
}
