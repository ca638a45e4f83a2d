#![deny(warnings)]

//! Core domain models and invariants for Fund Arena.
//!
//! This crate defines the time-indexed data model shared by the rest of the
//! simulation: products and their weekly value history, the calendar lookups
//! that align arbitrary dates to data indices, the commentary lookup, and the
//! ledger of fund switches that rebuilds the player's value series.

pub mod calendar;
pub mod commentary;
pub mod ledger;
pub mod store;

pub use calendar::{nearest_date_key, CalendarIndex};
pub use commentary::{CommentaryBook, RawCommentary};
pub use ledger::{InvalidSwitchError, PortfolioLedger, PortfolioSwitch};
pub use store::{
    parse_date_str, DataShapeError, RawDate, RawPoint, RawProduct, RawValue, SeriesView,
    TimeSeriesStore,
};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable identifier of a product: its position in the loaded dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProductId(pub usize);

/// One weekly observation of a product's value.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    /// Net value, always > 0 and finite once accepted by the store.
    pub value: f64,
}

/// A fund-like investable product with its weekly value history.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    /// Display label.
    pub name: String,
    /// Strictly increasing in date, one point per calendar week.
    pub series: Vec<SeriesPoint>,
}

impl Product {
    /// Values only, in axis order.
    pub fn values(&self) -> Vec<f64> {
        self.series.iter().map(|p| p.value).collect()
    }
}

/// Simulation phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Unscored warm-up; reselection is unlimited.
    Tutorial,
    /// Scored portion, starting with the normalization reset.
    Live,
}

/// Clock-owned progression state exposed to collaborators as plain data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    pub current_date: NaiveDate,
    pub phase: Phase,
    pub current_year: i32,
    pub remaining_adjustments: u8,
}

/// Simulation configuration parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Initial simulated date; its year is the initial `current_year`.
    pub start_date: NaiveDate,
    /// First calendar year of the live phase.
    pub live_start_year: i32,
    /// Adjustments granted at every year start.
    pub adjustments_per_year: u8,
    /// Annual risk-free rate used by the Sharpe ratio (0.03 = 3%).
    pub risk_free_rate: f64,
    /// Observations per year used for annualization.
    pub periods_per_year: u32,
    /// Maximum distance for nearest-commentary matches.
    pub commentary_tolerance_days: i64,
    /// December day from which the annual summary fires.
    pub year_end_day: u32,
    /// Period of the auto-advance driver.
    pub autoplay_interval_ms: u64,
    /// Seed for the broad-index proxy noise.
    pub index_noise_seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2020, 12, 30).unwrap_or_default(),
            live_start_year: 2022,
            adjustments_per_year: 3,
            risk_free_rate: 0.03,
            periods_per_year: 52,
            commentary_tolerance_days: 30,
            year_end_day: 25,
            autoplay_interval_ms: 1000,
            index_noise_seed: 42,
        }
    }
}

impl SimConfig {
    /// State at the very start of a play-through.
    pub fn initial_state(&self) -> SimulationState {
        SimulationState {
            current_date: self.start_date,
            phase: if self.start_date.year() >= self.live_start_year {
                Phase::Live
            } else {
                Phase::Tutorial
            },
            current_year: self.start_date.year(),
            remaining_adjustments: self.adjustments_per_year,
        }
    }
}

/// Validation errors for configuration invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Year outside supported range [1970, 2100].
    #[error("year {0} is out of supported range [1970, 2100]")]
    YearOutOfRange(i32),
    /// Numeric field must be finite.
    #[error("non-finite numeric value encountered")]
    NonFinite,
    /// Annualization needs at least one period per year.
    #[error("periods per year must be > 0")]
    ZeroPeriods,
    /// Tolerance must be non-negative.
    #[error("commentary tolerance must be >= 0 days")]
    NegativeTolerance,
    /// December day must be a valid day of the month.
    #[error("year-end day {0} is not within [1, 31]")]
    InvalidYearEndDay(u32),
    /// The live phase cannot start before the simulation does.
    #[error("live start year {live} precedes start year {start}")]
    LiveBeforeStart { live: i32, start: i32 },
}

/// Validate a configuration.
pub fn validate_config(cfg: &SimConfig) -> Result<(), ValidationError> {
    let start = cfg.start_date.year();
    for year in [start, cfg.live_start_year] {
        if !(1970..=2100).contains(&year) {
            return Err(ValidationError::YearOutOfRange(year));
        }
    }
    if cfg.live_start_year < start {
        return Err(ValidationError::LiveBeforeStart {
            live: cfg.live_start_year,
            start,
        });
    }
    if !cfg.risk_free_rate.is_finite() {
        return Err(ValidationError::NonFinite);
    }
    if cfg.periods_per_year == 0 {
        return Err(ValidationError::ZeroPeriods);
    }
    if cfg.commentary_tolerance_days < 0 {
        return Err(ValidationError::NegativeTolerance);
    }
    if !(1..=31).contains(&cfg.year_end_day) {
        return Err(ValidationError::InvalidYearEndDay(cfg.year_end_day));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = SimConfig::default();
        validate_config(&cfg).unwrap();
        let st = cfg.initial_state();
        assert_eq!(st.current_year, 2020);
        assert_eq!(st.phase, Phase::Tutorial);
        assert_eq!(st.remaining_adjustments, 3);
    }

    #[test]
    fn config_partial_yaml_like_json_uses_defaults() {
        let cfg: SimConfig = serde_json::from_str(r#"{"live_start_year": 2023}"#).unwrap();
        assert_eq!(cfg.live_start_year, 2023);
        assert_eq!(cfg.adjustments_per_year, 3);
        assert_eq!(cfg.start_date, NaiveDate::from_ymd_opt(2020, 12, 30).unwrap());
    }

    #[test]
    fn live_before_start_rejected() {
        let cfg = SimConfig {
            live_start_year: 2019,
            ..SimConfig::default()
        };
        assert_eq!(
            validate_config(&cfg),
            Err(ValidationError::LiveBeforeStart {
                live: 2019,
                start: 2020
            })
        );
    }

    #[test]
    fn zero_periods_rejected() {
        let cfg = SimConfig {
            periods_per_year: 0,
            ..SimConfig::default()
        };
        assert_eq!(validate_config(&cfg), Err(ValidationError::ZeroPeriods));
    }

    #[test]
    fn state_serializes_phase_snake_case() {
        let st = SimConfig::default().initial_state();
        let s = serde_json::to_string(&st).unwrap();
        assert!(s.contains("\"tutorial\""));
    }

    proptest! {
        #[test]
        fn non_finite_rate_rejected(bits in any::<u64>()) {
            let r = f64::from_bits(bits);
            let cfg = SimConfig { risk_free_rate: r, ..SimConfig::default() };
            prop_assert_eq!(validate_config(&cfg).is_ok(), r.is_finite());
        }
    }
}
