#![deny(warnings)]

//! Dataset ingestion: product histories and market commentary from JSON,
//! plus a seeded synthetic generator for demos and benchmarks.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use fund_core::{
    DataShapeError, Product, ProductId, RawCommentary, RawProduct, SeriesPoint, TimeSeriesStore,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Parse a product dataset (`[{ "name", "data": [{ "date", "value" }] }]`).
pub fn parse_products(json: &str) -> Result<TimeSeriesStore> {
    let raw: Vec<RawProduct> = serde_json::from_str(json).context("malformed product dataset")?;
    let store = TimeSeriesStore::from_raw(raw)?;
    Ok(store)
}

/// Load and validate a product dataset file.
pub fn load_products<P: AsRef<Path>>(path: P) -> Result<TimeSeriesStore> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading product dataset {}", path.display()))?;
    let store = parse_products(&text).with_context(|| format!("loading {}", path.display()))?;
    info!(path = %path.display(), products = store.len(), "products loaded");
    Ok(store)
}

/// Load a commentary file (`{ "reviews": {...}, "defaultReview": "..." }`).
pub fn load_commentary<P: AsRef<Path>>(path: P) -> Result<RawCommentary> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading commentary {}", path.display()))?;
    let raw: RawCommentary =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    info!(path = %path.display(), entries = raw.reviews.len(), "commentary loaded");
    Ok(raw)
}

/// Commentary is optional: a missing or broken file degrades to the
/// default text.
pub fn load_commentary_or_default<P: AsRef<Path>>(path: P) -> RawCommentary {
    load_commentary(path).unwrap_or_else(|e| {
        warn!(error = %format!("{e:#}"), "commentary unavailable, using default text");
        RawCommentary::default()
    })
}

/// Parameters of a synthetic weekly random-walk dataset.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyntheticSpec {
    pub products: usize,
    pub start: NaiveDate,
    pub weeks: usize,
    /// Mean weekly return (fraction).
    pub drift: f64,
    /// Half-width of the uniform weekly shock (fraction).
    pub shock: f64,
    pub seed: u64,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            products: 8,
            start: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap_or_default(),
            weeks: 156,
            drift: 0.001,
            shock: 0.03,
            seed: 42,
        }
    }
}

/// Deterministic random-walk products on a shared weekly axis.
pub fn synthetic_store(spec: &SyntheticSpec) -> Result<TimeSeriesStore, DataShapeError> {
    let mut rng = ChaCha8Rng::seed_from_u64(spec.seed);
    let dates: Vec<NaiveDate> = (0..spec.weeks)
        .map(|w| spec.start + chrono::Duration::days(7 * w as i64))
        .collect();
    let products = (0..spec.products)
        .map(|i| {
            // per-product tilt keeps the universe from moving in lockstep
            let tilt: f64 = rng.gen_range(-spec.drift..=spec.drift);
            let mut value = 1.0 + i as f64 * 0.1;
            let series = dates
                .iter()
                .enumerate()
                .map(|(w, &date)| {
                    if w > 0 {
                        let shock: f64 = rng.gen_range(-spec.shock..=spec.shock);
                        value *= (1.0 + spec.drift + tilt + shock).max(0.5);
                    }
                    SeriesPoint { date, value }
                })
                .collect();
            Product {
                id: ProductId(i),
                name: format!("Synthetic Fund {:02}", i + 1),
                series,
            }
        })
        .collect();
    TimeSeriesStore::from_products(products)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_dataset_text() {
        let store = parse_products(
            r#"[{"name": "A", "data": [{"date": "2021-01-01", "value": "1.0"},
                                      {"date": "2021-01-08", "value": 1.1}]}]"#,
        )
        .unwrap();
        assert_eq!(store.axis_len(), 2);
    }

    #[test]
    fn shape_errors_surface() {
        let err = parse_products(
            r#"[{"name": "A", "data": [{"date": "2021-01-01", "value": 1}]},
                {"name": "B", "data": []}]"#,
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DataShapeError>(),
            Some(DataShapeError::EmptySeries { .. })
        ));
        assert!(parse_products("not json").is_err());
    }

    #[test]
    fn missing_commentary_falls_back() {
        let raw = load_commentary_or_default("/nonexistent/marketReviews.json");
        assert!(raw.reviews.is_empty());
        assert!(!raw.default_review.is_empty());
    }

    #[test]
    fn synthetic_is_deterministic() {
        let spec = SyntheticSpec::default();
        let a = synthetic_store(&spec).unwrap();
        let b = synthetic_store(&spec).unwrap();
        assert_eq!(a.len(), 8);
        assert_eq!(a.axis_len(), 156);
        assert_eq!(a.products()[3].values(), b.products()[3].values());
    }

    proptest! {
        #[test]
        fn synthetic_values_positive(seed in any::<u64>(), weeks in 1usize..120) {
            let spec = SyntheticSpec { weeks, seed, products: 3, ..SyntheticSpec::default() };
            let s = synthetic_store(&spec).unwrap();
            for p in s.products() {
                prop_assert!(p.series.iter().all(|pt| pt.value > 0.0 && pt.value.is_finite()));
            }
        }
    }
}
