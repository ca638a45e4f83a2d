//! Events published by a [`Session`](crate::Session) and the summaries they carry.

use chrono::NaiveDate;
use fund_core::{Phase, ProductId};
use fund_rank::{Leaderboard, RankedEntry};
use fund_stats::StatsBundle;
use serde::{Deserialize, Serialize};

/// End-of-year report: the player's year and every fund's, best first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnnualSummary {
    pub year: i32,
    /// Player statistics over the scored window.
    pub user: StatsBundle,
    pub selected: Option<ProductId>,
    /// Funds over the year, by total return.
    pub funds: Vec<RankedEntry>,
}

/// End-of-game report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FinalSummary {
    pub user: StatsBundle,
    /// Fund ranking with the player's placement among the participants.
    pub leaderboard: Leaderboard,
}

impl FinalSummary {
    pub fn user_rank(&self) -> usize {
        self.leaderboard
            .user_rank
            .unwrap_or(self.leaderboard.participants)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    Advanced {
        date: NaiveDate,
        index: usize,
    },
    YearStarted {
        year: i32,
        phase: Phase,
        remaining_adjustments: u8,
    },
    PhaseChanged {
        phase: Phase,
        pivot: Option<usize>,
    },
    /// The fund selector was opened by a new year, free of charge.
    SelectorPrompted,
    SelectorOpened {
        remaining_adjustments: u8,
    },
    Switched {
        date: NaiveDate,
        product: ProductId,
    },
    AnnualSummary(AnnualSummary),
    FinalSummary(FinalSummary),
}

impl SimEvent {
    /// Events a presentation layer must show before time moves on.
    pub fn needs_attention(&self) -> bool {
        matches!(
            self,
            SimEvent::AnnualSummary(_)
                | SimEvent::FinalSummary(_)
                | SimEvent::PhaseChanged { .. }
                | SimEvent::SelectorPrompted
        )
    }
}

/// Receives every event a session publishes, in order.
pub trait SimObserver: Send {
    fn on_event(&mut self, event: &SimEvent);
}

impl<F> SimObserver for F
where
    F: FnMut(&SimEvent) + Send,
{
    fn on_event(&mut self, event: &SimEvent) {
        self(event)
    }
}
