//! Periodic tick source for the active session.
//!
//! One tokio task owns the interval, so ticks for a session are never
//! concurrent. Commands issued through the shared controller (pause,
//! cancel) land between two ticks.

use std::sync::PoisonError;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::events::Event;
use crate::progression::{SessionReport, SharedController};

/// Why the ticker stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum TickerExit {
    /// The session completed on one of our ticks.
    Completed(Box<SessionReport>),
    /// The slot emptied underneath us (cancelled or replaced).
    SessionGone,
    /// The tick itself failed.
    Failed(EngineError),
}

pub struct TickerHandle {
    task: JoinHandle<TickerExit>,
}

impl TickerHandle {
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Wait for the ticker to stop. An aborted ticker reports `SessionGone`.
    pub async fn join(self) -> TickerExit {
        self.task.await.unwrap_or(TickerExit::SessionGone)
    }
}

/// Tick `controller` every `period` until its session finishes.
///
/// Events from the completing tick are sent on `events`; a closed receiver
/// does not stop the ticker.
pub fn spawn_ticker(
    controller: SharedController,
    period: Duration,
    events: mpsc::UnboundedSender<Event>,
) -> TickerHandle {
    let task = tokio::spawn(async move {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of a tokio interval fires immediately.
        interval.tick().await;

        loop {
            interval.tick().await;
            let step = {
                let mut guard = controller.lock().unwrap_or_else(PoisonError::into_inner);
                guard.tick()
            };
            match step {
                Ok(None) => continue,
                Ok(Some(report)) => {
                    for event in &report.events {
                        let _ = events.send(event.clone());
                    }
                    debug!("ticker finished: session completed");
                    return TickerExit::Completed(Box::new(report));
                }
                Err(EngineError::NoActiveSession) => {
                    debug!("ticker finished: no active session");
                    return TickerExit::SessionGone;
                }
                Err(e) => {
                    warn!(error = %e, "ticker stopped on error");
                    return TickerExit::Failed(e);
                }
            }
        }
    });
    TickerHandle { task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::focus::FocusAdapter;
    use crate::pet::{EvolutionTable, Pet, PetKind};
    use crate::progression::{ProgressionController, ProgressionSettings};
    use std::sync::Arc;

    fn shared() -> SharedController {
        ProgressionController::new(
            Pet::new(PetKind::Dog, "Biscuit"),
            EvolutionTable::default(),
            Arc::new(FocusAdapter::default()),
            ProgressionSettings::default(),
        )
        .unwrap()
        .into_shared()
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_session_to_completion() {
        let controller = shared();
        controller.lock().unwrap().start_session(10).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handle = spawn_ticker(Arc::clone(&controller), Duration::from_secs(1), tx);
        match handle.join().await {
            TickerExit::Completed(report) => assert_eq!(report.result.points_awarded, 10),
            other => panic!("unexpected exit {other:?}"),
        }

        assert!(matches!(rx.recv().await, Some(Event::SessionCompleted { .. })));
        assert!(matches!(rx.recv().await, Some(Event::ProgressCommitted { .. })));
        assert_eq!(controller.lock().unwrap().pet().progress_points(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_holds_elapsed_between_ticks() {
        let controller = shared();
        controller.lock().unwrap().start_session(10).unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let handle = spawn_ticker(Arc::clone(&controller), Duration::from_secs(1), tx);

        time::sleep(Duration::from_millis(30_500)).await;
        controller.lock().unwrap().pause_session().unwrap();
        let paused_at = controller.lock().unwrap().session().unwrap().elapsed_secs();
        assert_eq!(paused_at, 30);

        time::sleep(Duration::from_secs(120)).await;
        assert_eq!(
            controller.lock().unwrap().session().unwrap().elapsed_secs(),
            paused_at
        );

        controller.lock().unwrap().resume_session().unwrap();
        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(
            controller.lock().unwrap().session().unwrap().elapsed_secs(),
            40
        );
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_ticker() {
        let controller = shared();
        controller.lock().unwrap().start_session(25).unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let handle = spawn_ticker(Arc::clone(&controller), Duration::from_secs(1), tx);

        time::sleep(Duration::from_millis(5_500)).await;
        let report = controller.lock().unwrap().cancel_session().unwrap();
        assert_eq!(report.result.elapsed_secs, 5);

        assert_eq!(handle.join().await, TickerExit::SessionGone);
    }
}
