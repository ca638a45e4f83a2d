//! Phase state machine driving the simulated date.

use chrono::{Datelike, Days, NaiveDate};
use fund_core::{CalendarIndex, Phase, PortfolioLedger, SimConfig, SimulationState};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// What a single [`SimulationClock::advance`] did, in the order it happened.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ClockEvent {
    Advanced { date: NaiveDate, index: usize },
    /// Terminal: the last data point has been reached.
    Finished { index: usize },
    /// The date entered the last days of December.
    YearEnding { year: i32 },
    /// Tutorial ended; reads are rebased at `pivot` from now on and the
    /// ledger was cleared.
    WentLive { year: i32, pivot: Option<usize> },
    YearStarted {
        year: i32,
        phase: Phase,
        remaining_adjustments: u8,
    },
}

#[derive(Debug, Error, PartialEq)]
pub enum ClockError {
    #[error("simulation has reached the end of the data")]
    Finished,
    #[error("no fund adjustments left for {year}")]
    AdjustmentExhausted { year: i32 },
}

/// Sole owner of [`SimulationState`]. The date only moves forward, one week
/// per [`advance`](Self::advance).
#[derive(Clone, Debug)]
pub struct SimulationClock {
    config: SimConfig,
    calendar: CalendarIndex,
    state: SimulationState,
    pivot: Option<usize>,
    finished: bool,
}

impl SimulationClock {
    pub fn new(config: SimConfig, calendar: CalendarIndex) -> Self {
        let state = config.initial_state();
        let pivot = match state.phase {
            Phase::Live => calendar.year_start_index(config.live_start_year),
            Phase::Tutorial => None,
        };
        Self {
            config,
            calendar,
            state,
            pivot,
            finished: false,
        }
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn calendar(&self) -> &CalendarIndex {
        &self.calendar
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Data index visible at the current date.
    pub fn current_index(&self) -> usize {
        self.calendar.index_at_or_before(self.state.current_date)
    }

    /// Normalization base, set once when the live phase starts.
    pub fn pivot(&self) -> Option<usize> {
        self.pivot
    }

    /// First index of the scored window: the pivot in live phase, else 0.
    pub fn window_start(&self) -> usize {
        match self.state.phase {
            Phase::Live => self.pivot.unwrap_or(0).min(self.current_index()),
            Phase::Tutorial => 0,
        }
    }

    /// Spend one adjustment. Free in tutorial phase.
    pub fn request_adjustment(&mut self) -> Result<(), ClockError> {
        if self.state.phase == Phase::Tutorial {
            return Ok(());
        }
        if self.state.remaining_adjustments == 0 {
            return Err(ClockError::AdjustmentExhausted {
                year: self.state.current_year,
            });
        }
        self.state.remaining_adjustments -= 1;
        Ok(())
    }

    /// Move one week forward, then check, in order: end of data (terminal,
    /// nothing else runs), year ending, year boundary.
    pub fn advance(&mut self, ledger: &mut PortfolioLedger) -> Result<Vec<ClockEvent>, ClockError> {
        if self.finished {
            return Err(ClockError::Finished);
        }
        let Some(date) = self.state.current_date.checked_add_days(Days::new(7)) else {
            self.finished = true;
            return Err(ClockError::Finished);
        };
        self.state.current_date = date;
        let index = self.current_index();
        let mut events = vec![ClockEvent::Advanced { date, index }];

        if index >= self.calendar.last_index() {
            self.finished = true;
            info!(%date, index, "end of data reached");
            events.push(ClockEvent::Finished { index });
            return Ok(events);
        }

        if date.month() == 12 && date.day() >= self.config.year_end_day {
            events.push(ClockEvent::YearEnding { year: date.year() });
        }

        if date.year() > self.state.current_year {
            self.start_year(date.year(), ledger, &mut events);
        }
        Ok(events)
    }

    fn start_year(&mut self, year: i32, ledger: &mut PortfolioLedger, events: &mut Vec<ClockEvent>) {
        self.state.current_year = year;
        if self.state.phase == Phase::Tutorial && year >= self.config.live_start_year {
            self.state.phase = Phase::Live;
            self.pivot = self.calendar.year_start_index(year);
            ledger.clear();
            info!(year, pivot = ?self.pivot, "tutorial over, live phase started");
            events.push(ClockEvent::WentLive {
                year,
                pivot: self.pivot,
            });
        }
        self.state.remaining_adjustments = self.config.adjustments_per_year;
        info!(year, phase = ?self.state.phase, "new year");
        events.push(ClockEvent::YearStarted {
            year,
            phase: self.state.phase,
            remaining_adjustments: self.state.remaining_adjustments,
        });
    }
}
