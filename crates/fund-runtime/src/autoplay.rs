//! Timer-driven auto-advance.

use crate::session::{Session, SessionError, TickReport};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// A session shared between the auto-advance task and manual commands.
#[derive(Clone)]
pub struct SharedSession {
    inner: Arc<Mutex<Session>>,
}

impl SharedSession {
    pub fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Advance unless another caller holds the session; never waits.
    pub fn try_advance(&self) -> Result<TickReport, SessionError> {
        let mut guard = match self.inner.try_lock() {
            Ok(g) => g,
            Err(TryLockError::WouldBlock) => return Err(SessionError::Busy),
            Err(TryLockError::Poisoned(p)) => p.into_inner(),
        };
        guard.advance()
    }

    /// Run `f` with exclusive access, waiting for the lock.
    pub fn with<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    Finished,
    /// A summary or prompt is waiting for the player.
    NeedsAttention,
    Failed(String),
}

#[derive(Clone, Debug)]
pub struct AutoPlayOutcome {
    pub ticks: u32,
    /// Ticks dropped because a previous step still held the session.
    pub skipped: u32,
    pub reason: StopReason,
    pub last: Option<TickReport>,
}

/// Handle to a running auto-advance task. Dropping it stops the task at its
/// next wake-up.
pub struct AutoPlay {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<AutoPlayOutcome>,
}

impl AutoPlay {
    /// Advance `session` every `period` until cancelled, finished, or an
    /// event needs the player's attention.
    pub fn start(session: SharedSession, period: Duration) -> Self {
        let period = period.max(Duration::from_millis(1));
        let (tx, rx) = oneshot::channel();
        info!(period_ms = period.as_millis() as u64, "auto-advance started");
        let task = tokio::spawn(run(session, period, rx));
        Self {
            stop: Some(tx),
            task,
        }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Cancel and wait for the task to wind down.
    pub async fn stop(mut self) -> AutoPlayOutcome {
        if let Some(tx) = self.stop.take() {
            let _ = tx.send(());
        }
        finish(self.task).await
    }

    /// Wait for the task to stop by itself.
    pub async fn join(self) -> AutoPlayOutcome {
        let AutoPlay { stop, task } = self;
        let outcome = finish(task).await;
        drop(stop);
        outcome
    }
}

async fn finish(task: JoinHandle<AutoPlayOutcome>) -> AutoPlayOutcome {
    match task.await {
        Ok(outcome) => outcome,
        Err(e) => AutoPlayOutcome {
            ticks: 0,
            skipped: 0,
            reason: StopReason::Failed(e.to_string()),
            last: None,
        },
    }
}

async fn run(
    session: SharedSession,
    period: Duration,
    mut stop: oneshot::Receiver<()>,
) -> AutoPlayOutcome {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // the first tick completes immediately
    interval.tick().await;

    let mut ticks = 0;
    let mut skipped = 0;
    let mut last = None;
    let reason = loop {
        tokio::select! {
            _ = &mut stop => break StopReason::Cancelled,
            _ = interval.tick() => match session.try_advance() {
                Ok(report) => {
                    ticks += 1;
                    let finished = report.is_finished();
                    let attention = report.needs_attention();
                    last = Some(report);
                    if finished {
                        break StopReason::Finished;
                    }
                    if attention {
                        break StopReason::NeedsAttention;
                    }
                }
                Err(SessionError::Busy) => {
                    skipped += 1;
                    debug!("session busy, tick skipped");
                }
                Err(SessionError::Finished) => break StopReason::Finished,
                Err(e) => {
                    warn!(%e, "auto-advance failed");
                    break StopReason::Failed(e.to_string());
                }
            },
        }
    };
    info!(ticks, skipped, ?reason, "auto-advance stopped");
    AutoPlayOutcome {
        ticks,
        skipped,
        reason,
        last,
    }
}
