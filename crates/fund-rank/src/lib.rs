#![deny(warnings)]

//! Leaderboards: ranking products and the player by performance metrics.

pub mod review;

pub use review::{index_proxies, weekly_review, IndexMove, Mover, WeeklyReview};

use fund_core::{ProductId, SeriesView};
use fund_stats::{StatsBundle, StatsParams};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Metric a leaderboard is ordered by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    TotalReturn,
    WeeklyReturn,
    Volatility,
    MaxDrawdown,
    SharpeRatio,
}

impl Metric {
    pub fn of(self, s: &StatsBundle) -> f64 {
        match self {
            Metric::TotalReturn => s.total_return,
            Metric::WeeklyReturn => s.weekly_return,
            Metric::Volatility => s.volatility,
            Metric::MaxDrawdown => s.max_drawdown,
            Metric::SharpeRatio => s.sharpe_ratio,
        }
    }
}

/// Sort direction; `Descending` puts the largest value first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Ascending,
    Descending,
}

/// A product with its metrics, before ranking.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub product: ProductId,
    pub name: String,
    pub stats: StatsBundle,
}

/// A ranked row; `rank` is 1-based.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub rank: usize,
    pub product: ProductId,
    pub name: String,
    pub stats: StatsBundle,
}

/// Stable sort by `metric`; equal values keep their insertion order.
pub fn rank(mut entries: Vec<Entry>, metric: Metric, direction: Direction) -> Vec<RankedEntry> {
    entries.sort_by(|a, b| {
        let (x, y) = (metric.of(&a.stats), metric.of(&b.stats));
        match direction {
            Direction::Ascending => x.total_cmp(&y),
            Direction::Descending => y.total_cmp(&x),
        }
    });
    entries
        .into_iter()
        .enumerate()
        .map(|(i, e)| RankedEntry {
            rank: i + 1,
            product: e.product,
            name: e.name,
            stats: e.stats,
        })
        .collect()
}

/// Player's position among `ranked`: one past the first entry the player
/// strictly beats (`>` when descending, `<` when ascending), or last place
/// when none is beaten.
///
/// This is a first-beaten scan rather than a sorted insertion: a player tied
/// with an entry lands below it.
pub fn user_rank(user_value: f64, ranked: &[RankedEntry], metric: Metric, direction: Direction) -> usize {
    ranked
        .iter()
        .position(|e| {
            let v = metric.of(&e.stats);
            match direction {
                Direction::Descending => user_value > v,
                Direction::Ascending => user_value < v,
            }
        })
        .map_or(ranked.len() + 1, |i| i + 1)
}

/// Metrics of every product over `[start, end]` of the read view.
pub fn product_entries(
    view: &SeriesView<'_>,
    start: usize,
    end: usize,
    params: &StatsParams,
) -> Vec<Entry> {
    view.store()
        .products()
        .iter()
        .map(|p| {
            let series = view.values(p.id, start, end);
            Entry {
                product: p.id,
                name: p.name.clone(),
                stats: StatsBundle::compute_with(&series, series.len().saturating_sub(1), params),
            }
        })
        .collect()
}

/// Ranked products plus the player's placement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Leaderboard {
    pub metric: Metric,
    pub rows: Vec<RankedEntry>,
    pub user: Option<StatsBundle>,
    /// Present when `user` is.
    pub user_rank: Option<usize>,
    /// Products plus the player.
    pub participants: usize,
}

impl Leaderboard {
    /// Rank `entries` by `metric` (descending) and place the player.
    pub fn build(entries: Vec<Entry>, metric: Metric, user: Option<StatsBundle>) -> Self {
        let rows = rank(entries, metric, Direction::Descending);
        let user_rank = user
            .as_ref()
            .map(|u| user_rank(metric.of(u), &rows, metric, Direction::Descending));
        debug!(rows = rows.len(), ?user_rank, ?metric, "leaderboard built");
        Self {
            metric,
            participants: rows.len() + 1,
            rows,
            user,
            user_rank,
        }
    }

    /// Leaderboard over `[start, end]` of the read view, ordered by total return.
    pub fn over_window(
        view: &SeriesView<'_>,
        start: usize,
        end: usize,
        user: Option<StatsBundle>,
        params: &StatsParams,
    ) -> Self {
        Self::build(
            product_entries(view, start, end, params),
            Metric::TotalReturn,
            user,
        )
    }

    /// First `n` rows.
    pub fn top(&self, n: usize) -> &[RankedEntry] {
        &self.rows[..n.min(self.rows.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use fund_core::{Product, SeriesPoint, TimeSeriesStore};
    use proptest::prelude::*;

    fn entry(id: usize, total: f64) -> Entry {
        Entry {
            product: ProductId(id),
            name: format!("F{id}"),
            stats: StatsBundle {
                total_return: total,
                ..StatsBundle::default()
            },
        }
    }

    #[test]
    fn ranks_descending_and_ascending() {
        let e = vec![entry(0, 1.0), entry(1, 5.0), entry(2, -2.0)];
        let desc = rank(e.clone(), Metric::TotalReturn, Direction::Descending);
        let ids: Vec<usize> = desc.iter().map(|r| r.product.0).collect();
        assert_eq!(ids, vec![1, 0, 2]);
        assert_eq!(desc[0].rank, 1);
        let asc = rank(e, Metric::TotalReturn, Direction::Ascending);
        let ids: Vec<usize> = asc.iter().map(|r| r.product.0).collect();
        assert_eq!(ids, vec![2, 0, 1]);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let e = vec![entry(3, 2.0), entry(1, 2.0), entry(2, 9.0), entry(0, 2.0)];
        let ids: Vec<usize> = rank(e, Metric::TotalReturn, Direction::Descending)
            .iter()
            .map(|r| r.product.0)
            .collect();
        assert_eq!(ids, vec![2, 3, 1, 0]);
    }

    #[test]
    fn user_rank_first_exceeds() {
        let rows = rank(
            vec![entry(0, 10.0), entry(1, 5.0), entry(2, 1.0)],
            Metric::TotalReturn,
            Direction::Descending,
        );
        let r = |u| user_rank(u, &rows, Metric::TotalReturn, Direction::Descending);
        assert_eq!(r(11.0), 1);
        assert_eq!(r(6.0), 2);
        // tied with the second fund: placed below it
        assert_eq!(r(5.0), 3);
        assert_eq!(r(0.0), 4);
        assert_eq!(user_rank(1.0, &[], Metric::TotalReturn, Direction::Descending), 1);
    }

    #[test]
    fn leaderboard_over_store_window() {
        let day0 = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        let mk = |id: usize, vals: &[f64]| Product {
            id: ProductId(id),
            name: format!("F{id}"),
            series: vals
                .iter()
                .enumerate()
                .map(|(w, v)| SeriesPoint {
                    date: day0 + chrono::Duration::days(7 * w as i64),
                    value: *v,
                })
                .collect(),
        };
        let store = TimeSeriesStore::from_products(vec![
            mk(0, &[2.0, 2.25, 2.5]),
            mk(1, &[2.0, 3.0, 2.5]),
            mk(2, &[2.0, 1.5, 1.0]),
        ])
        .unwrap();
        let user = StatsBundle {
            total_return: 25.0,
            ..StatsBundle::default()
        };
        let lb = Leaderboard::over_window(
            &store.view(None),
            0,
            2,
            Some(user),
            &StatsParams::default(),
        );
        assert_eq!(lb.participants, 4);
        // F0 and F1 both +25%: insertion order kept, user ties and drops below
        let ids: Vec<usize> = lb.rows.iter().map(|r| r.product.0).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(lb.user_rank, Some(3));
        assert_eq!(lb.top(1).len(), 1);
        assert_eq!(lb.top(10).len(), 3);
        assert!(lb.rows[1].stats.max_drawdown > 0.0);
    }

    proptest! {
        #[test]
        fn rank_is_reproducible(vals in proptest::collection::vec(-50i32..50, 0..30)) {
            let entries: Vec<Entry> = vals.iter().enumerate().map(|(i, v)| entry(i, *v as f64)).collect();
            let a = rank(entries.clone(), Metric::TotalReturn, Direction::Descending);
            let b = rank(entries, Metric::TotalReturn, Direction::Descending);
            prop_assert_eq!(&a, &b);
            for w in a.windows(2) {
                prop_assert!(w[0].stats.total_return >= w[1].stats.total_return);
                if w[0].stats.total_return == w[1].stats.total_return {
                    prop_assert!(w[0].product < w[1].product);
                }
            }
        }
    }
}
