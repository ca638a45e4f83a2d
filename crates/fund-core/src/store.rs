//! Immutable per-product value histories on a shared weekly date axis.

use crate::{Product, ProductId, SeriesPoint};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Raw date as delivered by the loader: a native date or a date string.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawDate {
    Date(NaiveDate),
    Text(String),
}

/// Raw value: numeric or numeric string.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
}

/// One raw observation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawPoint {
    pub date: RawDate,
    pub value: RawValue,
    /// Reported by some datasets; the engine recomputes returns itself.
    #[serde(default, rename = "weeklyReturn", skip_serializing_if = "Option::is_none")]
    pub weekly_return: Option<RawValue>,
}

/// One raw product as delivered by the loader.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawProduct {
    pub name: String,
    pub data: Vec<RawPoint>,
}

/// The dataset does not fit the common-axis model.
#[derive(Debug, Error, PartialEq)]
pub enum DataShapeError {
    #[error("dataset contains no products")]
    NoProducts,
    #[error("product {product:?} has an empty series")]
    EmptySeries { product: String },
    #[error("product {product:?} has {found} points, expected {expected}")]
    LengthMismatch {
        product: String,
        expected: usize,
        found: usize,
    },
    #[error("product {product:?} date at index {index} differs from the shared axis")]
    AxisMismatch { product: String, index: usize },
    #[error("product {product:?} dates are not strictly increasing at index {index}")]
    UnorderedDates { product: String, index: usize },
    #[error("product {product:?} has a non-positive or non-finite value at index {index}")]
    NonPositiveValue { product: String, index: usize },
    #[error("product {product:?} has an unparsable date {raw:?} at index {index}")]
    InvalidDate {
        product: String,
        index: usize,
        raw: String,
    },
    #[error("product {product:?} has an unparsable value {raw:?} at index {index}")]
    InvalidValue {
        product: String,
        index: usize,
        raw: String,
    },
}

/// Parse `YYYY-MM-DD`, `YYYY/MM/DD`, or an ISO datetime (date part only).
pub fn parse_date_str(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let head = s.split(['T', ' ']).next().unwrap_or(s);
    NaiveDate::parse_from_str(head, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(head, "%Y/%m/%d"))
        .ok()
}

fn parse_value(raw: &RawValue) -> Option<f64> {
    match raw {
        RawValue::Number(v) => Some(*v),
        RawValue::Text(s) => s.trim().parse::<f64>().ok(),
    }
}

fn normalize(id: usize, raw: RawProduct) -> Result<Product, DataShapeError> {
    let name = raw.name;
    if raw.data.is_empty() {
        return Err(DataShapeError::EmptySeries { product: name });
    }
    let mut series = Vec::with_capacity(raw.data.len());
    for (index, p) in raw.data.iter().enumerate() {
        let date = match &p.date {
            RawDate::Date(d) => *d,
            RawDate::Text(s) => parse_date_str(s).ok_or_else(|| DataShapeError::InvalidDate {
                product: name.clone(),
                index,
                raw: s.clone(),
            })?,
        };
        let value = parse_value(&p.value).ok_or_else(|| DataShapeError::InvalidValue {
            product: name.clone(),
            index,
            raw: format!("{:?}", p.value),
        })?;
        if !(value.is_finite() && value > 0.0) {
            return Err(DataShapeError::NonPositiveValue {
                product: name,
                index,
            });
        }
        if let Some(prev) = series.last().map(|p: &SeriesPoint| p.date) {
            if date <= prev {
                return Err(DataShapeError::UnorderedDates {
                    product: name,
                    index,
                });
            }
        }
        series.push(SeriesPoint { date, value });
    }
    Ok(Product {
        id: ProductId(id),
        name,
        series,
    })
}

/// Products sharing one weekly date axis. Immutable after construction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimeSeriesStore {
    products: Vec<Product>,
}

impl TimeSeriesStore {
    /// Normalize raw products, enforcing the common axis.
    pub fn from_raw(raw: Vec<RawProduct>) -> Result<Self, DataShapeError> {
        let products = raw
            .into_iter()
            .enumerate()
            .map(|(i, r)| normalize(i, r))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_products(products)
    }

    /// Accept already-typed products. Ids are reassigned to dataset order.
    pub fn from_products(mut products: Vec<Product>) -> Result<Self, DataShapeError> {
        let Some(first) = products.first() else {
            return Err(DataShapeError::NoProducts);
        };
        let axis: Vec<NaiveDate> = first.series.iter().map(|p| p.date).collect();
        for (i, p) in products.iter_mut().enumerate() {
            p.id = ProductId(i);
            if p.series.is_empty() {
                return Err(DataShapeError::EmptySeries {
                    product: p.name.clone(),
                });
            }
            if p.series.len() != axis.len() {
                return Err(DataShapeError::LengthMismatch {
                    product: p.name.clone(),
                    expected: axis.len(),
                    found: p.series.len(),
                });
            }
            for (index, (pt, d)) in p.series.iter().zip(&axis).enumerate() {
                if pt.date != *d {
                    return Err(DataShapeError::AxisMismatch {
                        product: p.name.clone(),
                        index,
                    });
                }
                if index > 0 && pt.date <= p.series[index - 1].date {
                    return Err(DataShapeError::UnorderedDates {
                        product: p.name.clone(),
                        index,
                    });
                }
                if !(pt.value.is_finite() && pt.value > 0.0) {
                    return Err(DataShapeError::NonPositiveValue {
                        product: p.name.clone(),
                        index,
                    });
                }
            }
        }
        info!(
            products = products.len(),
            weeks = axis.len(),
            "dataset accepted"
        );
        Ok(Self { products })
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn product(&self, id: ProductId) -> Option<&Product> {
        self.products.get(id.0)
    }

    /// Number of products.
    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Length of the shared date axis.
    pub fn axis_len(&self) -> usize {
        self.products.first().map_or(0, |p| p.series.len())
    }

    /// The shared date axis.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.products
            .first()
            .map(|p| p.series.iter().map(|pt| pt.date).collect())
            .unwrap_or_default()
    }

    /// Stored (never rebased) value.
    pub fn raw_value(&self, id: ProductId, index: usize) -> Option<f64> {
        self.product(id)
            .and_then(|p| p.series.get(index))
            .map(|pt| pt.value)
    }

    /// Read view rebased at `pivot`: from the pivot onward every value is
    /// divided by the pivot's value. `None` reads stored values.
    pub fn view(&self, pivot: Option<usize>) -> SeriesView<'_> {
        SeriesView { store: self, pivot }
    }
}

/// Read-time normalization over a [`TimeSeriesStore`].
#[derive(Clone, Copy, Debug)]
pub struct SeriesView<'a> {
    store: &'a TimeSeriesStore,
    pivot: Option<usize>,
}

impl<'a> SeriesView<'a> {
    pub fn store(&self) -> &'a TimeSeriesStore {
        self.store
    }

    pub fn pivot(&self) -> Option<usize> {
        self.pivot
    }

    pub fn value(&self, id: ProductId, index: usize) -> Option<f64> {
        let v = self.store.raw_value(id, index)?;
        match self.pivot {
            Some(pivot) if index >= pivot => {
                let base = self.store.raw_value(id, pivot)?;
                Some(v / base)
            }
            _ => Some(v),
        }
    }

    /// Values at `index - 1` and `index`, both on the base used at `index`.
    /// A step onto the pivot is then a real move, not a rebasing jump.
    pub fn step(&self, id: ProductId, index: usize) -> Option<(f64, f64)> {
        let prev = self.store.raw_value(id, index.checked_sub(1)?)?;
        let cur = self.store.raw_value(id, index)?;
        match self.pivot {
            Some(pivot) if index >= pivot => {
                let base = self.store.raw_value(id, pivot)?;
                Some((prev / base, cur / base))
            }
            _ => Some((prev, cur)),
        }
    }

    /// Values for indices `start..=end`, clamped to the axis.
    pub fn values(&self, id: ProductId, start: usize, end: usize) -> Vec<f64> {
        let last = self.store.axis_len().saturating_sub(1);
        let end = end.min(last);
        if start > end {
            return Vec::new();
        }
        (start..=end).filter_map(|i| self.value(id, i)).collect()
    }

    /// Full product with rebased values, as handed to presentation.
    pub fn snapshot(&self, id: ProductId) -> Option<Product> {
        let p = self.store.product(id)?;
        let series = p
            .series
            .iter()
            .enumerate()
            .filter_map(|(i, pt)| {
                self.value(id, i).map(|value| SeriesPoint {
                    date: pt.date,
                    value,
                })
            })
            .collect();
        Some(Product {
            id,
            name: p.name.clone(),
            series,
        })
    }
}
