//! Owns the pet's ledger and the single active session.
//!
//! ```text
//! start_session -> tick ... tick -> commit -> ledger.add -> observers
//!                    \-> cancel_session -> credit policy -> commit
//! ```

use chrono::Utc;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use super::{
    award_points, CancelCredit, ObserverFailure, ProgressObserver, ProgressionSettings,
    SessionOutcome, SessionReport, SessionResult,
};
use crate::error::{ConfigError, EngineError};
use crate::events::Event;
use crate::focus::FocusAdapter;
use crate::pet::{EvolutionOutcome, EvolutionRecord, EvolutionTable, MasteryLedger, Pet};
use crate::storage::Config;
use crate::timer::{SessionScheduler, SessionStatus, StudySession};

/// Controller shared between a tick driver and command handlers.
pub type SharedController = Arc<Mutex<ProgressionController>>;

pub struct ProgressionController {
    ledger: MasteryLedger,
    focus: Arc<FocusAdapter>,
    settings: ProgressionSettings,
    session: Option<SessionScheduler>,
    observers: Vec<Box<dyn ProgressObserver>>,
}

impl ProgressionController {
    /// # Errors
    /// Returns `ConfigError` if the pet's stage is not in `table`.
    pub fn new(
        pet: Pet,
        table: EvolutionTable,
        focus: Arc<FocusAdapter>,
        settings: ProgressionSettings,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            ledger: MasteryLedger::new(pet, table)?,
            focus,
            settings,
            session: None,
            observers: Vec::new(),
        })
    }

    /// Build from a validated configuration with a fresh focus adapter.
    pub fn from_config(pet: Pet, config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Self::new(
            pet,
            config.evolution_table()?,
            Arc::new(FocusAdapter::new(config.focus_settings())),
            config.progression_settings(),
        )
    }

    /// Replace the pet, e.g. after loading it from storage. Any active
    /// session is dropped without credit and without notifying observers.
    /// The pet is re-checked against the evolution table.
    pub fn restore(&mut self, pet: Pet) -> Result<(), ConfigError> {
        let table = self.ledger.table().clone();
        self.ledger = MasteryLedger::new(pet, table)?;
        self.session = None;
        Ok(())
    }

    pub fn add_observer(&mut self, observer: Box<dyn ProgressObserver>) {
        self.observers.push(observer);
    }

    pub fn into_shared(self) -> SharedController {
        Arc::new(Mutex::new(self))
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn pet(&self) -> Pet {
        self.ledger.pet()
    }

    pub fn ledger(&self) -> &MasteryLedger {
        &self.ledger
    }

    pub fn focus(&self) -> Arc<FocusAdapter> {
        Arc::clone(&self.focus)
    }

    pub fn settings(&self) -> &ProgressionSettings {
        &self.settings
    }

    pub fn session(&self) -> Option<&StudySession> {
        self.session.as_ref().map(SessionScheduler::session)
    }

    pub fn has_active_session(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.status().is_active())
    }

    pub fn snapshot(&self) -> Event {
        let pet = self.ledger.pet();
        let limit = self
            .ledger
            .table()
            .limit_for(pet.stage().ordinal())
            .unwrap_or_default();
        let session = self.session();
        Event::StateSnapshot {
            pet_name: pet.name().to_string(),
            stage: pet.stage(),
            progress_points: pet.progress_points(),
            progress_limit: limit,
            mood: pet.mood(limit),
            session_status: session.map(StudySession::status),
            elapsed_secs: session.map_or(0, StudySession::elapsed_secs),
            remaining_secs: session.map_or(0, StudySession::remaining_secs),
            focus_multiplier: self.focus.current_multiplier(),
            at: Utc::now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Select and start a session of `minutes`.
    ///
    /// # Errors
    /// `SessionAlreadyActive` while another session is running or paused,
    /// `InvalidDuration` for a length the duration policy rejects.
    pub fn start_session(&mut self, minutes: i64) -> Result<Vec<Event>, EngineError> {
        if self.has_active_session() {
            return Err(EngineError::SessionAlreadyActive);
        }
        let mut scheduler = SessionScheduler::new(
            self.settings.durations.clone(),
            self.settings.tick_interval,
        );
        let selected = scheduler.select(minutes)?;
        let started = scheduler.start()?;
        self.focus.reset();
        scheduler.record_multiplier(self.focus.current_multiplier());
        self.session = Some(scheduler);

        Ok(self.notify_events(vec![selected, started]))
    }

    /// Pause the running session. Returns `SessionPaused` followed by any
    /// observer failures.
    pub fn pause_session(&mut self) -> Result<Vec<Event>, EngineError> {
        let event = self.active_mut()?.pause()?;
        Ok(self.notify_events(vec![event]))
    }

    /// Resume the paused session. Returns `SessionResumed` followed by any
    /// observer failures.
    pub fn resume_session(&mut self) -> Result<Vec<Event>, EngineError> {
        let event = self.active_mut()?.resume()?;
        Ok(self.notify_events(vec![event]))
    }

    /// Cancel the active session and apply the cancellation credit policy.
    pub fn cancel_session(&mut self) -> Result<SessionReport, EngineError> {
        let event = self.active_mut()?.cancel()?;
        let scheduler = self.session.take().ok_or(EngineError::NoActiveSession)?;
        self.commit(scheduler, event)
    }

    /// Advance the active session by one interval.
    ///
    /// Returns the report on the tick that completes the session. Once the
    /// session is finished the slot is empty and further ticks fail with
    /// `NoActiveSession`.
    pub fn tick(&mut self) -> Result<Option<SessionReport>, EngineError> {
        let multiplier = self.focus.current_multiplier();
        let scheduler = self.active_mut()?;
        if scheduler.status() == SessionStatus::Running {
            scheduler.record_multiplier(multiplier);
        }
        match scheduler.tick()? {
            Some(event) => {
                let scheduler = self.session.take().ok_or(EngineError::NoActiveSession)?;
                self.commit(scheduler, event).map(Some)
            }
            None => Ok(None),
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn active_mut(&mut self) -> Result<&mut SessionScheduler, EngineError> {
        self.session.as_mut().ok_or(EngineError::NoActiveSession)
    }

    /// Turn a finished session into points, hand them to the ledger and
    /// notify observers. Observer failures are collected, not propagated.
    fn commit(
        &mut self,
        mut scheduler: SessionScheduler,
        terminal: Event,
    ) -> Result<SessionReport, EngineError> {
        let cancelled = scheduler.status() == SessionStatus::Cancelled;
        let multiplier = self.focus.current_multiplier();
        scheduler.record_multiplier(multiplier);
        let session = scheduler.into_session();

        let earned = award_points(
            session.elapsed_minutes(),
            self.settings.accrual_rate,
            multiplier,
        );
        let points = match (cancelled, self.settings.cancel_credit) {
            (true, CancelCredit::None) => 0,
            _ => earned,
        };

        let ledger = if cancelled && points == 0 {
            None
        } else {
            Some(self.ledger.add(i64::from(points))?)
        };
        let outcome = match ledger {
            _ if cancelled => SessionOutcome::Cancelled,
            Some(l) => SessionOutcome::from(l),
            None => SessionOutcome::Accrued,
        };

        let evolution = match ledger {
            Some(EvolutionOutcome::Evolved { from, to }) => Some(EvolutionRecord {
                from_stage: from,
                to_stage: to,
                points_at_evolution: self.ledger.table().limit_for(from.ordinal())?,
                timestamp: Utc::now(),
            }),
            _ => None,
        };

        let result = SessionResult {
            session_id: session.id(),
            session_duration: session.requested_minutes(),
            elapsed_secs: session.elapsed_secs(),
            points_awarded: points,
            multiplier,
            outcome,
            ledger,
            pet: self.ledger.pet(),
            created_at: Utc::now(),
        };
        info!(
            session = %result.session_id,
            points = result.points_awarded,
            outcome = %result.outcome,
            "session committed"
        );

        let mut events = vec![
            terminal,
            Event::ProgressCommitted {
                result: result.clone(),
            },
        ];
        if let Some(record) = &evolution {
            events.push(Event::PetEvolved {
                record: record.clone(),
            });
        }

        let mut failures = Vec::new();
        for observer in &self.observers {
            for event in &events {
                if let Err(e) = observer.on_event(event) {
                    failures.push(failure(observer.as_ref(), e));
                }
            }
            if let Err(e) = observer.on_session_result(&result) {
                failures.push(failure(observer.as_ref(), e));
            }
            if let Some(record) = &evolution {
                if let Err(e) = observer.on_evolution(record) {
                    failures.push(failure(observer.as_ref(), e));
                }
            }
        }
        events.extend(failures.iter().map(ObserverFailure::to_event));

        Ok(SessionReport {
            result,
            evolution,
            failures,
            events,
        })
    }

    /// Hand `events` to every observer and append an `ObserverFailed`
    /// event per failed delivery.
    fn notify_events(&self, mut events: Vec<Event>) -> Vec<Event> {
        let mut failed = Vec::new();
        for observer in &self.observers {
            for event in &events {
                if let Err(e) = observer.on_event(event) {
                    failed.push(failure(observer.as_ref(), e).to_event());
                }
            }
        }
        events.extend(failed);
        events
    }
}

fn failure(
    observer: &dyn ProgressObserver,
    err: Box<dyn std::error::Error + Send + Sync>,
) -> ObserverFailure {
    warn!(observer = observer.name(), error = %err, "observer notification failed");
    ObserverFailure {
        observer: observer.name().to_string(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::focus::{FocusLabel, FocusSample};
    use crate::pet::{PetKind, Stage};
    use crate::timer::DurationPolicy;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn controller() -> ProgressionController {
        ProgressionController::new(
            Pet::new(PetKind::Axolotl, "Pip"),
            EvolutionTable::default(),
            Arc::new(FocusAdapter::default()),
            ProgressionSettings {
                durations: DurationPolicy::default().with_custom(true),
                ..ProgressionSettings::default()
            },
        )
        .unwrap()
    }

    fn run_to_completion(c: &mut ProgressionController) -> SessionReport {
        loop {
            if let Some(report) = c.tick().unwrap() {
                return report;
            }
        }
    }

    #[test]
    fn full_session_awards_one_point_per_minute() {
        let mut c = controller();
        c.start_session(25).unwrap();
        let report = run_to_completion(&mut c);
        assert_eq!(report.result.points_awarded, 25);
        assert_eq!(report.result.outcome, SessionOutcome::Accrued);
        assert_eq!(c.pet().progress_points(), 25);
        assert!(c.session().is_none());
        assert!(matches!(report.events[0], Event::SessionCompleted { .. }));
    }

    #[test]
    fn sustained_distraction_quarters_the_award() {
        let mut c = controller();
        c.start_session(25).unwrap();
        let focus = c.focus();
        for _ in 0..6 {
            focus.record(FocusSample::new(FocusLabel::Distracted, 0.95));
        }
        assert_eq!(focus.current_multiplier(), 0.25);
        let report = run_to_completion(&mut c);
        assert_eq!(report.result.points_awarded, 6);
        assert_eq!(report.result.multiplier, 0.25);
    }

    #[test]
    fn second_start_while_active_is_rejected() {
        let mut c = controller();
        c.start_session(25).unwrap();
        assert_eq!(c.start_session(10), Err(EngineError::SessionAlreadyActive));
        c.pause_session().unwrap();
        assert_eq!(c.start_session(10), Err(EngineError::SessionAlreadyActive));
    }

    #[test]
    fn cancel_defaults_to_zero_credit() {
        let mut c = controller();
        c.start_session(25).unwrap();
        for _ in 0..600 {
            c.tick().unwrap();
        }
        let report = c.cancel_session().unwrap();
        assert_eq!(report.result.outcome, SessionOutcome::Cancelled);
        assert_eq!(report.result.points_awarded, 0);
        assert_eq!(report.result.ledger, None);
        assert_eq!(report.result.elapsed_secs, 600);
        assert_eq!(c.pet().progress_points(), 0);
        assert_eq!(c.tick(), Err(EngineError::NoActiveSession));
        // The slot is free again.
        c.start_session(10).unwrap();
    }

    #[test]
    fn proportional_cancel_credit() {
        let mut c = controller();
        c.settings.cancel_credit = CancelCredit::Proportional;
        c.start_session(25).unwrap();
        for _ in 0..(10 * 60) {
            c.tick().unwrap();
        }
        let report = c.cancel_session().unwrap();
        assert_eq!(report.result.outcome, SessionOutcome::Cancelled);
        assert_eq!(report.result.points_awarded, 10);
        assert_eq!(c.pet().progress_points(), 10);
    }

    #[test]
    fn back_to_back_sessions_evolve_once_and_discard_overflow() {
        let mut c = controller();
        c.start_session(150).unwrap();
        let first = run_to_completion(&mut c);
        assert_eq!(first.result.outcome, SessionOutcome::Accrued);
        c.start_session(60).unwrap();
        let second = run_to_completion(&mut c);
        assert_eq!(second.result.outcome, SessionOutcome::Evolved);
        let record = second.evolution.unwrap();
        assert_eq!(record.from_stage, Stage::Egg);
        assert_eq!(record.to_stage, Stage::Baby);
        assert_eq!(record.points_at_evolution, 200);
        assert_eq!(c.pet().stage(), Stage::Baby);
        assert_eq!(c.pet().progress_points(), 0);
        assert!(second
            .events
            .iter()
            .any(|e| matches!(e, Event::PetEvolved { .. })));
    }

    #[test]
    fn pause_and_resume_through_controller() {
        let mut c = controller();
        c.start_session(10).unwrap();
        c.tick().unwrap();
        c.pause_session().unwrap();
        c.tick().unwrap();
        assert_eq!(c.session().unwrap().elapsed_secs(), 1);
        c.resume_session().unwrap();
        assert_eq!(c.session().unwrap().elapsed_secs(), 1);
        assert!(c.resume_session().is_err());
    }

    #[test]
    fn commands_without_session_fail() {
        let mut c = controller();
        assert_eq!(c.pause_session(), Err(EngineError::NoActiveSession));
        assert_eq!(c.cancel_session(), Err(EngineError::NoActiveSession));
        assert_eq!(c.tick(), Err(EngineError::NoActiveSession));
    }

    struct Failing {
        calls: Arc<AtomicUsize>,
    }

    impl ProgressObserver for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn on_session_result(
            &self,
            _result: &SessionResult,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err("disk full".into())
        }
    }

    #[test]
    fn observer_failure_is_reported_and_progress_kept() {
        let mut c = controller();
        let calls = Arc::new(AtomicUsize::new(0));
        c.add_observer(Box::new(Failing {
            calls: Arc::clone(&calls),
        }));
        c.start_session(10).unwrap();
        let report = run_to_completion(&mut c);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!report.is_fully_delivered());
        assert_eq!(
            report.failures,
            vec![ObserverFailure {
                observer: "failing".into(),
                message: "disk full".into()
            }]
        );
        assert!(matches!(
            report.events.last(),
            Some(Event::ObserverFailed { .. })
        ));
        assert_eq!(c.pet().progress_points(), 10);
    }

    struct RejectsEvents;

    impl ProgressObserver for RejectsEvents {
        fn name(&self) -> &str {
            "events"
        }

        fn on_event(&self, _event: &Event) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            Err("read-only database".into())
        }
    }

    #[test]
    fn lifecycle_event_failures_reach_the_caller() {
        let mut c = controller();
        c.add_observer(Box::new(RejectsEvents));

        let events = c.start_session(10).unwrap();
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], Event::SessionSelected { .. }));
        assert!(matches!(events[1], Event::SessionStarted { .. }));
        assert!(matches!(
            &events[2],
            Event::ObserverFailed { observer, message, .. }
                if observer == "events" && message == "read-only database"
        ));

        let events = c.pause_session().unwrap();
        assert!(matches!(events[0], Event::SessionPaused { .. }));
        assert!(matches!(events[1], Event::ObserverFailed { .. }));
        let events = c.resume_session().unwrap();
        assert_eq!(events.len(), 2);
        assert!(c.has_active_session());
    }

    #[test]
    fn restore_drops_session_without_credit_and_clamps_pet() {
        let mut c = controller();
        let calls = Arc::new(AtomicUsize::new(0));
        c.add_observer(Box::new(Failing {
            calls: Arc::clone(&calls),
        }));
        c.start_session(10).unwrap();
        for _ in 0..120 {
            c.tick().unwrap();
        }

        let saved = Pet::from_parts(PetKind::Cat, "Mochi", Stage::Baby, 5_000, 600, Utc::now());
        c.restore(saved).unwrap();
        assert!(c.session().is_none());
        assert_eq!(c.tick(), Err(EngineError::NoActiveSession));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let pet = c.pet();
        assert_eq!(pet.name(), "Mochi");
        assert_eq!(pet.stage(), Stage::Baby);
        assert_eq!(pet.progress_points(), 199);
        assert_eq!(pet.experience(), 600);
    }

    #[test]
    fn multiplier_history_tracks_changes_during_session() {
        let mut c = controller();
        c.start_session(10).unwrap();
        c.tick().unwrap();
        let focus = c.focus();
        for _ in 0..3 {
            focus.record(FocusSample::new(FocusLabel::NotPresent, 0.9));
        }
        c.tick().unwrap();
        assert_eq!(
            c.session().unwrap().focus_multiplier_history(),
            &[1.0, 0.75]
        );
    }

    #[test]
    fn snapshot_reflects_pet_and_session() {
        let mut c = controller();
        c.start_session(10).unwrap();
        c.tick().unwrap();
        match c.snapshot() {
            Event::StateSnapshot {
                stage,
                progress_limit,
                session_status,
                elapsed_secs,
                remaining_secs,
                ..
            } => {
                assert_eq!(stage, Stage::Egg);
                assert_eq!(progress_limit, 200);
                assert_eq!(session_status, Some(SessionStatus::Running));
                assert_eq!(elapsed_secs, 1);
                assert_eq!(remaining_secs, 599);
            }
            other => panic!("Expected StateSnapshot, got {other:?}"),
        }
    }
}
