//! Ordered record of fund switches and the value series they imply.

use crate::calendar::CalendarIndex;
use crate::store::SeriesView;
use crate::ProductId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// The player elects to hold `product` from `effective_date` onward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioSwitch {
    pub effective_date: NaiveDate,
    pub product: ProductId,
}

/// A switch that violates the ledger contract. Indicates a caller bug.
#[derive(Debug, Error, PartialEq)]
pub enum InvalidSwitchError {
    #[error("switch dated {date} precedes the last recorded switch at {last}")]
    OutOfOrder { date: NaiveDate, last: NaiveDate },
    #[error("unknown product id {id}; {known} products loaded")]
    UnknownProduct { id: usize, known: usize },
}

/// Append-only (until cleared) list of switches in non-decreasing date order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PortfolioLedger {
    product_count: usize,
    switches: Vec<PortfolioSwitch>,
}

impl PortfolioLedger {
    pub fn new(product_count: usize) -> Self {
        Self {
            product_count,
            switches: Vec::new(),
        }
    }

    pub fn record_switch(
        &mut self,
        date: NaiveDate,
        product: ProductId,
    ) -> Result<(), InvalidSwitchError> {
        if product.0 >= self.product_count {
            return Err(InvalidSwitchError::UnknownProduct {
                id: product.0,
                known: self.product_count,
            });
        }
        if let Some(last) = self.switches.last() {
            if date < last.effective_date {
                return Err(InvalidSwitchError::OutOfOrder {
                    date,
                    last: last.effective_date,
                });
            }
        }
        debug!(%date, product = product.0, "switch recorded");
        self.switches.push(PortfolioSwitch {
            effective_date: date,
            product,
        });
        Ok(())
    }

    pub fn switches(&self) -> &[PortfolioSwitch] {
        &self.switches
    }

    pub fn is_empty(&self) -> bool {
        self.switches.is_empty()
    }

    /// Product held after the most recent switch.
    pub fn current_product(&self) -> Option<ProductId> {
        self.switches.last().map(|s| s.product)
    }

    pub fn clear(&mut self) {
        self.switches.clear();
    }

    /// Resolved (ceiling) start index of every switch, in ledger order.
    pub fn start_indices(&self, calendar: &CalendarIndex) -> Vec<usize> {
        self.switches
            .iter()
            .map(|s| calendar.index_at_or_after(s.effective_date))
            .collect()
    }

    /// Product held at every axis index, `None` before the first switch and
    /// after `upto`.
    ///
    /// Segment `k` spans from its start index to one before the next switch's
    /// start index (or `upto` for the last one). Segments are written in
    /// ledger order, so when two switches resolve to the same index the later
    /// one wins.
    pub fn holdings(&self, calendar: &CalendarIndex, upto: usize) -> Vec<Option<ProductId>> {
        let mut out = vec![None; calendar.len()];
        if out.is_empty() {
            return out;
        }
        let upto = upto.min(calendar.last_index());
        let starts = self.start_indices(calendar);
        for (k, switch) in self.switches.iter().enumerate() {
            let start = starts[k];
            let end = match starts.get(k + 1) {
                Some(&next) => match next.checked_sub(1) {
                    Some(e) => e.min(upto),
                    None => continue,
                },
                None => upto,
            };
            for slot in out.iter_mut().take(end + 1).skip(start) {
                *slot = Some(switch.product);
            }
        }
        out
    }

    /// Spliced nullable value series over the full axis.
    pub fn value_series(
        &self,
        calendar: &CalendarIndex,
        view: &SeriesView<'_>,
        upto: usize,
    ) -> Vec<Option<f64>> {
        self.holdings(calendar, upto)
            .into_iter()
            .enumerate()
            .map(|(i, held)| held.and_then(|p| view.value(p, i)))
            .collect()
    }

    /// Held-return equity curve from the first held index through `upto`.
    ///
    /// Starts at the first held value; each later week `i - 1 -> i` is
    /// credited with the return of the product held at `i - 1`, so a switch
    /// made after a move was visible never earns that move.
    pub fn equity_curve(
        &self,
        calendar: &CalendarIndex,
        view: &SeriesView<'_>,
        upto: usize,
    ) -> Vec<f64> {
        let holdings = self.holdings(calendar, upto);
        let Some(first) = holdings.iter().position(Option::is_some) else {
            return Vec::new();
        };
        let mut curve = Vec::with_capacity(holdings.len() - first);
        let mut held_over_week: Option<ProductId> = None;
        for (i, held) in holdings.iter().enumerate().skip(first) {
            let Some(p) = *held else { break };
            let next = match (curve.last(), held_over_week) {
                (Some(&prev), Some(q)) => match view.step(q, i) {
                    Some((a, b)) if a > 0.0 => Some(prev * b / a),
                    _ => Some(prev),
                },
                _ => view.value(p, i),
            };
            match next {
                Some(v) => curve.push(v),
                None => break,
            }
            held_over_week = Some(p);
        }
        curve
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TimeSeriesStore;
    use crate::{Product, SeriesPoint};
    use proptest::prelude::*;

    fn d0() -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 1, 1).unwrap()
    }

    fn week(i: i64) -> NaiveDate {
        d0() + chrono::Duration::days(7 * i)
    }

    fn store(values: &[&[f64]]) -> TimeSeriesStore {
        let products = values
            .iter()
            .enumerate()
            .map(|(i, vals)| Product {
                id: ProductId(i),
                name: format!("P{i}"),
                series: vals
                    .iter()
                    .enumerate()
                    .map(|(w, v)| SeriesPoint {
                        date: week(w as i64),
                        value: *v,
                    })
                    .collect(),
            })
            .collect();
        TimeSeriesStore::from_products(products).unwrap()
    }

    #[test]
    fn splices_segments_across_switches() {
        let a: &[f64] = &[1.0, 1.1, 1.2, 1.3, 1.4, 1.5, 1.6, 1.7];
        let b: &[f64] = &[2.0, 2.1, 2.2, 2.3, 2.4, 2.5, 2.6, 2.7];
        let s = store(&[a, b]);
        let cal = CalendarIndex::from_store(&s);
        let mut ledger = PortfolioLedger::new(s.len());
        ledger.record_switch(week(0), ProductId(0)).unwrap();
        ledger.record_switch(week(3), ProductId(1)).unwrap();
        let vs = ledger.value_series(&cal, &s.view(None), 5);
        assert_eq!(
            vs,
            vec![
                Some(1.0),
                Some(1.1),
                Some(1.2),
                Some(2.3),
                Some(2.4),
                Some(2.5),
                None,
                None
            ]
        );
    }

    #[test]
    fn leading_nulls_before_first_switch_and_ceiling_start() {
        let a: &[f64] = &[1.0, 1.1, 1.2, 1.3, 1.4];
        let s = store(&[a]);
        let cal = CalendarIndex::from_store(&s);
        let mut ledger = PortfolioLedger::new(1);
        // Mid-week switch resolves to the following data point.
        ledger
            .record_switch(week(1) + chrono::Duration::days(2), ProductId(0))
            .unwrap();
        let vs = ledger.value_series(&cal, &s.view(None), 4);
        assert_eq!(vs, vec![None, None, Some(1.2), Some(1.3), Some(1.4)]);
    }

    #[test]
    fn later_switch_wins_same_index() {
        let a: &[f64] = &[1.0, 1.1, 1.2, 1.3];
        let b: &[f64] = &[2.0, 2.1, 2.2, 2.3];
        let s = store(&[a, b]);
        let cal = CalendarIndex::from_store(&s);
        let mut ledger = PortfolioLedger::new(2);
        let mid = week(1) + chrono::Duration::days(1);
        ledger.record_switch(mid, ProductId(0)).unwrap();
        ledger.record_switch(mid, ProductId(1)).unwrap();
        let vs = ledger.value_series(&cal, &s.view(None), 3);
        assert_eq!(vs, vec![None, None, Some(2.2), Some(2.3)]);
    }

    #[test]
    fn rejects_out_of_order_and_unknown() {
        let mut ledger = PortfolioLedger::new(2);
        ledger.record_switch(week(2), ProductId(0)).unwrap();
        assert_eq!(
            ledger.record_switch(week(1), ProductId(1)),
            Err(InvalidSwitchError::OutOfOrder {
                date: week(1),
                last: week(2)
            })
        );
        assert_eq!(
            ledger.record_switch(week(3), ProductId(7)),
            Err(InvalidSwitchError::UnknownProduct { id: 7, known: 2 })
        );
        assert_eq!(ledger.switches().len(), 1);
        ledger.clear();
        assert!(ledger.is_empty());
        assert_eq!(ledger.current_product(), None);
    }

    #[test]
    fn equity_curve_chains_held_returns() {
        let a: &[f64] = &[1.0, 2.0, 2.0, 2.0];
        let b: &[f64] = &[10.0, 10.0, 10.0, 11.0];
        let s = store(&[a, b]);
        let cal = CalendarIndex::from_store(&s);
        let mut ledger = PortfolioLedger::new(2);
        ledger.record_switch(week(0), ProductId(0)).unwrap();
        ledger.record_switch(week(2), ProductId(1)).unwrap();
        let curve = ledger.equity_curve(&cal, &s.view(None), 3);
        assert_eq!(curve.len(), 4);
        assert!((curve[1] - 2.0).abs() < 1e-12);
        // week 1 -> 2 belongs to A (flat), week 2 -> 3 to B
        assert!((curve[2] - 2.0).abs() < 1e-12);
        assert!((curve[3] - 2.2).abs() < 1e-12);
    }

    #[test]
    fn switch_after_a_visible_move_does_not_earn_it() {
        let a: &[f64] = &[1.0, 1.0, 1.0];
        let b: &[f64] = &[1.0, 1.5, 1.5];
        let s = store(&[a, b]);
        let cal = CalendarIndex::from_store(&s);
        let mut ledger = PortfolioLedger::new(2);
        ledger.record_switch(week(0), ProductId(0)).unwrap();
        // B's jump to 1.5 is already on screen when the player moves
        ledger.record_switch(week(1), ProductId(1)).unwrap();
        let curve = ledger.equity_curve(&cal, &s.view(None), 2);
        assert_eq!(curve, vec![1.0, 1.0, 1.0]);
        // the raw splice still shows B's level
        assert_eq!(
            ledger.value_series(&cal, &s.view(None), 2),
            vec![Some(1.0), Some(1.5), Some(1.5)]
        );
    }

    #[test]
    fn empty_ledger_has_no_values() {
        let a: &[f64] = &[1.0, 1.1];
        let s = store(&[a]);
        let cal = CalendarIndex::from_store(&s);
        let ledger = PortfolioLedger::new(1);
        assert_eq!(ledger.value_series(&cal, &s.view(None), 1), vec![None, None]);
        assert!(ledger.equity_curve(&cal, &s.view(None), 1).is_empty());
    }

    proptest! {
        #[test]
        fn defined_exactly_from_first_start_through_upto(
            n in 2usize..30,
            first in 0i64..40,
            upto_frac in 0.0f64..1.0,
        ) {
            let vals: Vec<f64> = (0..n).map(|i| 1.0 + i as f64).collect();
            let s = store(&[vals.as_slice()]);
            let cal = CalendarIndex::from_store(&s);
            let upto = ((n - 1) as f64 * upto_frac) as usize;
            let mut ledger = PortfolioLedger::new(1);
            let date = d0() + chrono::Duration::days(first);
            ledger.record_switch(date, ProductId(0)).unwrap();
            let start = cal.index_at_or_after(date);
            let vs = ledger.value_series(&cal, &s.view(None), upto);
            for (i, v) in vs.iter().enumerate() {
                prop_assert_eq!(v.is_some(), i >= start && i <= upto);
            }
        }
    }
}
