#![deny(warnings)]

//! Game runtime: the weekly clock, the session facade over data, ledger and
//! statistics, and a timer-driven auto-advance loop.

pub mod autoplay;
pub mod clock;
pub mod events;
pub mod session;

pub use autoplay::{AutoPlay, AutoPlayOutcome, SharedSession, StopReason};
pub use clock::{ClockError, ClockEvent, SimulationClock};
pub use events::{AnnualSummary, FinalSummary, SimEvent, SimObserver};
pub use session::{Session, SessionError, SessionSnapshot, TickReport};
