#![deny(warnings)]

//! Performance statistics over weekly value series.
//!
//! Every function works on a window `[0, n]` of a value series (or on the
//! returns derived from it) and fails closed: an empty or single-point window,
//! a zero base value, or a zero volatility yields `0.0` instead of NaN or
//! infinity, so callers can always render a number.
//!
//! Conventions:
//! - [`total_return`], [`period_return`], [`weekly_returns`] and the
//!   [`StatsBundle`] fields are percentages.
//! - [`simple_returns`] are fractions; [`volatility`] and [`sharpe_ratio`]
//!   take fractional returns.
//! - [`max_drawdown`] is a fraction of the running peak.

use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, OrderStatistics, Statistics};
use thiserror::Error;
use tracing::debug;

/// Observations per year for weekly data.
pub const PERIODS_PER_YEAR: u32 = 52;
/// Annual risk-free rate used by the Sharpe ratio.
pub const RISK_FREE_RATE: f64 = 0.03;
/// Volatility (in percent) below which the Sharpe ratio is reported as 0.
const VOLATILITY_FLOOR: f64 = 1e-9;

/// Statistics were requested over a window with fewer than two points.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
#[error("statistics window [0, {end}] over {len} points has no periods")]
pub struct EmptyWindowWarning {
    pub len: usize,
    pub end: usize,
}

/// Clamp the window end to the series and reject windows without a period.
pub fn try_window(series: &[f64], n: usize) -> Result<usize, EmptyWindowWarning> {
    if n == 0 || series.len() < 2 {
        return Err(EmptyWindowWarning {
            len: series.len(),
            end: n,
        });
    }
    Ok(n.min(series.len() - 1))
}

fn pct_change(from: f64, to: f64) -> f64 {
    if from > 0.0 && from.is_finite() && to.is_finite() {
        (to - from) / from * 100.0
    } else {
        0.0
    }
}

/// Return from `series[0]` to `series[n]` in percent.
///
/// Example:
/// assert_eq!(total_return(&[100.0, 110.0, 99.0], 2), -1.0);
pub fn total_return(series: &[f64], n: usize) -> f64 {
    match try_window(series, n) {
        Ok(end) => pct_change(series[0], series[end]),
        Err(_) => 0.0,
    }
}

/// Return from `series[i - 1]` to `series[i]` in percent; 0 at `i = 0`.
pub fn period_return(series: &[f64], i: usize) -> f64 {
    if i == 0 || i >= series.len() {
        return 0.0;
    }
    pct_change(series[i - 1], series[i])
}

/// Per-period returns for `i = 1..=n`, in percent.
pub fn weekly_returns(series: &[f64], n: usize) -> Vec<f64> {
    match try_window(series, n) {
        Ok(end) => (1..=end).map(|i| period_return(series, i)).collect(),
        Err(_) => Vec::new(),
    }
}

/// Per-period returns for `i = 1..=n`, as fractions.
pub fn simple_returns(series: &[f64], n: usize) -> Vec<f64> {
    weekly_returns(series, n)
        .into_iter()
        .map(|r| r / 100.0)
        .collect()
}

/// Annualized volatility in percent: `sqrt(population_variance * 52) * 100`.
pub fn volatility(returns: &[f64]) -> f64 {
    volatility_with(returns, PERIODS_PER_YEAR)
}

/// [`volatility`] with an explicit annualization factor.
pub fn volatility_with(returns: &[f64], periods_per_year: u32) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let var = returns.iter().population_variance();
    let vol = (var * periods_per_year as f64).sqrt() * 100.0;
    if vol.is_finite() {
        vol
    } else {
        0.0
    }
}

/// Largest decline from a running peak, as a fraction of that peak.
///
/// The peak starts at `series[0]` and moves up whenever a new high is seen;
/// each point is measured against the most recent peak.
///
/// Example:
/// assert!((max_drawdown(&[100.0, 110.0, 99.0], 2) - 0.1).abs() < 1e-12);
pub fn max_drawdown(series: &[f64], n: usize) -> f64 {
    let Ok(end) = try_window(series, n) else {
        return 0.0;
    };
    let mut peak = series[0];
    let mut worst = 0.0_f64;
    for &v in &series[1..=end] {
        if v > peak {
            peak = v;
        } else if peak > 0.0 {
            worst = worst.max((peak - v) / peak);
        }
    }
    worst
}

/// Sharpe ratio of weekly fractional returns with the default risk-free rate.
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    sharpe_ratio_with(returns, RISK_FREE_RATE, PERIODS_PER_YEAR)
}

/// `((1 + mean)^periods - 1 - rf) / (volatility / 100)`; 0 when volatility is 0.
pub fn sharpe_ratio_with(returns: &[f64], risk_free_rate: f64, periods_per_year: u32) -> f64 {
    let vol = volatility_with(returns, periods_per_year);
    if vol < VOLATILITY_FLOOR {
        return 0.0;
    }
    let mean = returns.iter().mean();
    let annualized = (1.0 + mean).powf(periods_per_year as f64) - 1.0;
    let sharpe = (annualized - risk_free_rate) / (vol / 100.0);
    if sharpe.is_finite() {
        sharpe
    } else {
        0.0
    }
}

/// Median of `values`; 0 when empty.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut data = Data::new(values.to_vec());
    let m = data.median();
    if m.is_finite() {
        m
    } else {
        0.0
    }
}

/// Parameters shared by the risk metrics.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatsParams {
    pub risk_free_rate: f64,
    pub periods_per_year: u32,
}

impl Default for StatsParams {
    fn default() -> Self {
        Self {
            risk_free_rate: RISK_FREE_RATE,
            periods_per_year: PERIODS_PER_YEAR,
        }
    }
}

/// Metrics shown for a product or for the player. All percentages except
/// the Sharpe ratio.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsBundle {
    pub total_return: f64,
    /// Return of the last period in the window.
    pub weekly_return: f64,
    pub volatility: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
}

impl StatsBundle {
    /// Metrics over the whole series with default parameters.
    pub fn compute(series: &[f64]) -> Self {
        Self::compute_with(series, series.len().saturating_sub(1), &StatsParams::default())
    }

    /// Metrics over `[0, n]`; zeroed when the window is empty.
    pub fn compute_with(series: &[f64], n: usize, params: &StatsParams) -> Self {
        match Self::try_compute_with(series, n, params) {
            Ok(b) => b,
            Err(w) => {
                debug!(%w, "zeroed statistics");
                Self::default()
            }
        }
    }

    /// Metrics over `[0, n]`, reporting an empty window to the caller.
    pub fn try_compute_with(
        series: &[f64],
        n: usize,
        params: &StatsParams,
    ) -> Result<Self, EmptyWindowWarning> {
        let end = try_window(series, n)?;
        let returns = simple_returns(series, end);
        Ok(Self {
            total_return: total_return(series, end),
            weekly_return: period_return(series, end),
            volatility: volatility_with(&returns, params.periods_per_year),
            max_drawdown: max_drawdown(series, end) * 100.0,
            sharpe_ratio: sharpe_ratio_with(
                &returns,
                params.risk_free_rate,
                params.periods_per_year,
            ),
        })
    }
}
