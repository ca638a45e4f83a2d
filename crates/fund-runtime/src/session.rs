//! The single entry point a presentation layer talks to.

use crate::clock::{ClockError, ClockEvent, SimulationClock};
use crate::events::{AnnualSummary, FinalSummary, SimEvent, SimObserver};
use chrono::{Datelike, NaiveDate};
use fund_core::{
    validate_config, CalendarIndex, CommentaryBook, InvalidSwitchError, Phase, PortfolioLedger,
    ProductId, RawCommentary, SeriesView, SimConfig, SimulationState, TimeSeriesStore,
    ValidationError,
};
use fund_rank::{product_entries, rank, weekly_review, Direction, Leaderboard, Metric, WeeklyReview};
use fund_stats::{StatsBundle, StatsParams};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error(transparent)]
    InvalidSwitch(#[from] InvalidSwitchError),
    #[error("no fund adjustments left for {year}")]
    AdjustmentExhausted { year: i32 },
    #[error("fund selector is closed")]
    SelectorClosed,
    #[error("simulation has finished")]
    Finished,
    #[error("another step is still running")]
    Busy,
    #[error(transparent)]
    Config(#[from] ValidationError),
}

impl From<ClockError> for SessionError {
    fn from(e: ClockError) -> Self {
        match e {
            ClockError::Finished => SessionError::Finished,
            ClockError::AdjustmentExhausted { year } => SessionError::AdjustmentExhausted { year },
        }
    }
}

/// Outcome of one [`Session::advance`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub state: SimulationState,
    pub events: Vec<SimEvent>,
}

impl TickReport {
    pub fn is_finished(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, SimEvent::FinalSummary(_)))
    }

    pub fn needs_attention(&self) -> bool {
        self.events.iter().any(SimEvent::needs_attention)
    }

    pub fn annual_summary(&self) -> Option<&AnnualSummary> {
        self.events.iter().find_map(|e| match e {
            SimEvent::AnnualSummary(s) => Some(s),
            _ => None,
        })
    }

    pub fn final_summary(&self) -> Option<&FinalSummary> {
        self.events.iter().find_map(|e| match e {
            SimEvent::FinalSummary(s) => Some(s),
            _ => None,
        })
    }
}

/// Plain-data view of the session for rendering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub state: SimulationState,
    pub index: usize,
    pub finished: bool,
    pub selector_open: bool,
    pub selected: Option<ProductId>,
    /// Chart window, inclusive.
    pub window: (usize, usize),
    pub user: StatsBundle,
    pub commentary: String,
}

/// Owns the dataset, the clock and the player's ledger; all mutation goes
/// through its three actions: [`open_selector`](Self::open_selector),
/// [`select_product`](Self::select_product) and [`advance`](Self::advance).
pub struct Session {
    store: TimeSeriesStore,
    clock: SimulationClock,
    ledger: PortfolioLedger,
    commentary: CommentaryBook,
    params: StatsParams,
    selector_open: bool,
    observers: Vec<Box<dyn SimObserver>>,
}

impl Session {
    pub fn new(
        store: TimeSeriesStore,
        commentary: RawCommentary,
        config: SimConfig,
    ) -> Result<Self, SessionError> {
        validate_config(&config)?;
        let calendar = CalendarIndex::from_store(&store);
        let ledger = PortfolioLedger::new(store.len());
        let commentary = CommentaryBook::new(commentary, config.commentary_tolerance_days);
        let params = StatsParams {
            risk_free_rate: config.risk_free_rate,
            periods_per_year: config.periods_per_year,
        };
        info!(
            products = store.len(),
            weeks = store.axis_len(),
            start = %config.start_date,
            "session created"
        );
        Ok(Self {
            store,
            clock: SimulationClock::new(config, calendar),
            ledger,
            commentary,
            params,
            selector_open: true,
            observers: Vec::new(),
        })
    }

    pub fn subscribe(&mut self, observer: Box<dyn SimObserver>) {
        self.observers.push(observer);
    }

    pub fn state(&self) -> &SimulationState {
        self.clock.state()
    }

    pub fn config(&self) -> &SimConfig {
        self.clock.config()
    }

    pub fn store(&self) -> &TimeSeriesStore {
        &self.store
    }

    pub fn calendar(&self) -> &CalendarIndex {
        self.clock.calendar()
    }

    pub fn ledger(&self) -> &PortfolioLedger {
        &self.ledger
    }

    pub fn current_index(&self) -> usize {
        self.clock.current_index()
    }

    pub fn is_finished(&self) -> bool {
        self.clock.is_finished()
    }

    pub fn selector_open(&self) -> bool {
        self.selector_open
    }

    pub fn selected_product(&self) -> Option<ProductId> {
        self.ledger.current_product()
    }

    /// Read view of the data, rebased once the live phase has started.
    pub fn view(&self) -> SeriesView<'_> {
        self.store.view(self.clock.pivot())
    }

    /// Inclusive index range the charts and scores cover.
    pub fn chart_window(&self) -> (usize, usize) {
        (self.clock.window_start(), self.current_index())
    }

    /// Open the fund selector. Costs one adjustment in live phase, as does
    /// the prompt at each new year. A selector that is already open stays
    /// open without a second charge; the first pick of the game is free.
    pub fn open_selector(&mut self) -> Result<(), SessionError> {
        if self.clock.is_finished() {
            return Err(SessionError::Finished);
        }
        if self.selector_open {
            return Ok(());
        }
        if let Err(e) = self.clock.request_adjustment() {
            warn!(%e, "selector request refused");
            return Err(e.into());
        }
        self.selector_open = true;
        let remaining = self.state().remaining_adjustments;
        debug!(remaining, "selector opened");
        self.publish(vec![SimEvent::SelectorOpened {
            remaining_adjustments: remaining,
        }]);
        Ok(())
    }

    /// Switch to `product` effective today and close the selector.
    pub fn select_product(&mut self, product: ProductId) -> Result<(), SessionError> {
        if self.clock.is_finished() {
            return Err(SessionError::Finished);
        }
        if !self.selector_open {
            return Err(SessionError::SelectorClosed);
        }
        let date = self.state().current_date;
        self.ledger.record_switch(date, product)?;
        self.selector_open = false;
        info!(%date, product = product.0, "fund selected");
        self.publish(vec![SimEvent::Switched { date, product }]);
        Ok(())
    }

    /// Move the simulation one week and publish what happened.
    pub fn advance(&mut self) -> Result<TickReport, SessionError> {
        let clock_events = self.clock.advance(&mut self.ledger)?;
        let mut events = Vec::with_capacity(clock_events.len() + 1);
        for ev in clock_events {
            match ev {
                ClockEvent::Advanced { date, index } => {
                    events.push(SimEvent::Advanced { date, index });
                }
                ClockEvent::Finished { .. } => {
                    self.selector_open = false;
                    events.push(SimEvent::FinalSummary(self.final_summary()));
                }
                ClockEvent::YearEnding { year } => {
                    let summary = self.annual_summary_for(year);
                    events.push(SimEvent::AnnualSummary(summary));
                }
                ClockEvent::WentLive { pivot, .. } => {
                    events.push(SimEvent::PhaseChanged {
                        phase: Phase::Live,
                        pivot,
                    });
                }
                ClockEvent::YearStarted { year, phase, .. } => {
                    // the new-year prompt is a selector opening like any other
                    if let Err(e) = self.clock.request_adjustment() {
                        warn!(%e, year, "new-year prompt without adjustments");
                    }
                    events.push(SimEvent::YearStarted {
                        year,
                        phase,
                        remaining_adjustments: self.state().remaining_adjustments,
                    });
                    self.selector_open = true;
                    events.push(SimEvent::SelectorPrompted);
                }
            }
        }
        let report = TickReport {
            state: self.state().clone(),
            events,
        };
        self.publish(report.events.clone());
        Ok(report)
    }

    /// Spliced value series of the player's holdings up to today.
    pub fn value_series(&self) -> Vec<Option<f64>> {
        let view = self.view();
        self.ledger
            .value_series(self.calendar(), &view, self.current_index())
    }

    /// Held-return curve over the chart window.
    pub fn equity_curve(&self) -> Vec<f64> {
        let view = self.view();
        self.ledger
            .equity_curve(self.calendar(), &view, self.current_index())
    }

    /// Player statistics; zeroed before the first selection.
    pub fn user_stats(&self) -> StatsBundle {
        let curve = self.equity_curve();
        StatsBundle::compute_with(&curve, curve.len().saturating_sub(1), &self.params)
    }

    /// Statistics of one product over the chart window.
    pub fn product_stats(&self, product: ProductId) -> Option<StatsBundle> {
        self.store.product(product)?;
        let (start, end) = self.chart_window();
        let series = self.view().values(product, start, end);
        Some(StatsBundle::compute_with(
            &series,
            series.len().saturating_sub(1),
            &self.params,
        ))
    }

    /// Funds over the chart window by `metric`, with the player placed
    /// when holding something.
    pub fn leaderboard(&self, metric: Metric) -> Leaderboard {
        let (start, end) = self.chart_window();
        let entries = product_entries(&self.view(), start, end, &self.params);
        let user = self.selected_product().map(|_| self.user_stats());
        Leaderboard::build(entries, metric, user)
    }

    /// Review of the week that just ended.
    pub fn weekly_review(&self) -> Option<WeeklyReview> {
        weekly_review(
            &self.view(),
            self.current_index(),
            self.config().index_noise_seed,
        )
    }

    /// Market commentary closest to today.
    pub fn commentary(&self) -> &str {
        self.commentary.lookup(self.state().current_date)
    }

    pub fn commentary_at(&self, date: NaiveDate) -> &str {
        self.commentary.lookup(date)
    }

    /// Summary of the year the current date is in.
    pub fn annual_summary(&self) -> AnnualSummary {
        self.annual_summary_for(self.state().current_date.year())
    }

    fn annual_summary_for(&self, year: i32) -> AnnualSummary {
        let (window_start, end) = self.chart_window();
        let start = self
            .calendar()
            .year_start_index(year)
            .filter(|&i| i >= window_start)
            .unwrap_or(window_start);
        let entries = product_entries(&self.view(), start, end, &self.params);
        let summary = AnnualSummary {
            year,
            user: self.user_stats(),
            selected: self.selected_product(),
            funds: rank(entries, Metric::TotalReturn, Direction::Descending),
        };
        info!(year, user_return = summary.user.total_return, "annual summary");
        summary
    }

    /// End-of-game ranking by total return over the scored window.
    pub fn final_summary(&self) -> FinalSummary {
        let user = self.user_stats();
        let leaderboard = self.leaderboard_with_user(user);
        info!(
            user_return = user.total_return,
            rank = ?leaderboard.user_rank,
            participants = leaderboard.participants,
            "final summary"
        );
        FinalSummary { user, leaderboard }
    }

    fn leaderboard_with_user(&self, user: StatsBundle) -> Leaderboard {
        let (start, end) = self.chart_window();
        Leaderboard::over_window(&self.view(), start, end, Some(user), &self.params)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state().clone(),
            index: self.current_index(),
            finished: self.is_finished(),
            selector_open: self.selector_open,
            selected: self.selected_product(),
            window: self.chart_window(),
            user: self.user_stats(),
            commentary: self.commentary().to_string(),
        }
    }

    fn publish(&mut self, events: Vec<SimEvent>) {
        for ev in &events {
            for obs in self.observers.iter_mut() {
                obs.on_event(ev);
            }
        }
    }
}
