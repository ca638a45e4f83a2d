//! Weekly market review: best and worst movers plus broad-index proxies.

use fund_core::{ProductId, SeriesView};
use fund_stats::{median, period_return};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Broad indices approximated from the product universe, with the width of
/// the noise band (in percentage points) around the universe's mean move.
const INDEX_PROXIES: [(&str, f64); 4] = [
    ("CSI 300", 2.0),
    ("CSI 500", 3.0),
    ("CSI 1000", 4.0),
    ("CSI 2000", 5.0),
];

const MOVERS: usize = 3;

/// One product's move over the week.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mover {
    pub product: ProductId,
    pub name: String,
    /// Percent.
    pub weekly_return: f64,
}

/// Approximate weekly move of a broad index, in percent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexMove {
    pub name: String,
    pub change: f64,
}

/// Review of the week ending at `index`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeeklyReview {
    pub index: usize,
    /// Best three, best first.
    pub top: Vec<Mover>,
    /// Worst three, worst first.
    pub bottom: Vec<Mover>,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub indices: Vec<IndexMove>,
}

/// Index proxies: `mean_return` plus seeded uniform noise within each
/// proxy's band. Same seed, same output.
pub fn index_proxies(mean_return: f64, seed: u64) -> Vec<IndexMove> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    INDEX_PROXIES
        .iter()
        .map(|&(name, band)| {
            let half = band / 2.0;
            let noise: f64 = rng.gen_range(-half..=half);
            IndexMove {
                name: name.to_string(),
                change: mean_return + noise,
            }
        })
        .collect()
}

/// Review of the week ending at `index`; `None` at index 0, where no week
/// has elapsed yet.
pub fn weekly_review(view: &SeriesView<'_>, index: usize, seed: u64) -> Option<WeeklyReview> {
    if index == 0 || index >= view.store().axis_len() {
        return None;
    }
    let mut moves: Vec<Mover> = view
        .store()
        .products()
        .iter()
        .map(|p| {
            let weekly_return = view
                .step(p.id, index)
                .map_or(0.0, |(a, b)| period_return(&[a, b], 1));
            Mover {
                product: p.id,
                name: p.name.clone(),
                weekly_return,
            }
        })
        .collect();
    moves.sort_by(|a, b| b.weekly_return.total_cmp(&a.weekly_return));

    let returns: Vec<f64> = moves.iter().map(|m| m.weekly_return).collect();
    let max = returns.first().copied().unwrap_or(0.0);
    let min = returns.last().copied().unwrap_or(0.0);
    let mean = if returns.is_empty() {
        0.0
    } else {
        returns.iter().sum::<f64>() / returns.len() as f64
    };

    let top = moves.iter().take(MOVERS).cloned().collect();
    let bottom = moves.iter().rev().take(MOVERS).cloned().collect();
    Some(WeeklyReview {
        index,
        top,
        bottom,
        median: median(&returns),
        min,
        max,
        indices: index_proxies(mean, seed.wrapping_add(index as u64)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use fund_core::{Product, SeriesPoint, TimeSeriesStore};

    fn store(finals: &[f64]) -> TimeSeriesStore {
        let d0 = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        let products = finals
            .iter()
            .enumerate()
            .map(|(i, v)| Product {
                id: ProductId(i),
                name: format!("F{i}"),
                series: vec![
                    SeriesPoint { date: d0, value: 1.0 },
                    SeriesPoint {
                        date: d0 + chrono::Duration::days(7),
                        value: *v,
                    },
                ],
            })
            .collect();
        TimeSeriesStore::from_products(products).unwrap()
    }

    #[test]
    fn movers_and_spread() {
        let s = store(&[1.01, 0.98, 1.05, 1.0, 0.9]);
        let r = weekly_review(&s.view(None), 1, 7).unwrap();
        let top: Vec<usize> = r.top.iter().map(|m| m.product.0).collect();
        let bottom: Vec<usize> = r.bottom.iter().map(|m| m.product.0).collect();
        assert_eq!(top, vec![2, 0, 3]);
        assert_eq!(bottom, vec![4, 1, 3]);
        assert!((r.max - 5.0).abs() < 1e-9);
        assert!((r.min + 10.0).abs() < 1e-9);
        assert!(r.median.abs() < 1e-9);
        assert_eq!(r.indices.len(), 4);
    }

    #[test]
    fn first_live_week_is_a_real_move() {
        let s = store(&[1.05, 0.8]);
        let raw = weekly_review(&s.view(None), 1, 7).unwrap();
        let rebased = weekly_review(&s.view(Some(1)), 1, 7).unwrap();
        assert_eq!(rebased.top[0].product, ProductId(0));
        assert!((rebased.max - 5.0).abs() < 1e-9);
        assert!((rebased.min + 20.0).abs() < 1e-9);
        assert!((rebased.median - raw.median).abs() < 1e-9);
        for (x, y) in rebased.indices.iter().zip(&raw.indices) {
            assert!((x.change - y.change).abs() < 1e-9);
        }
    }

    #[test]
    fn no_review_at_first_index() {
        let s = store(&[1.1]);
        assert!(weekly_review(&s.view(None), 0, 7).is_none());
        assert!(weekly_review(&s.view(None), 5, 7).is_none());
    }

    #[test]
    fn proxies_are_seeded_and_bounded() {
        let a = index_proxies(1.5, 42);
        let b = index_proxies(1.5, 42);
        assert_eq!(a, b);
        for (m, (_, band)) in a.iter().zip(INDEX_PROXIES) {
            assert!((m.change - 1.5).abs() <= band / 2.0 + 1e-12);
        }
    }
}
