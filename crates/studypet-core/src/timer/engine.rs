//! Study session state machine.
//!
//! The scheduler does not own a thread or a clock. Whoever drives it calls
//! `tick()` once per interval; each tick adds exactly one interval of
//! studied time while the session is running.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Selecting -> Running <-> Paused
//!                         |          |
//!                         v          v
//!                    Completed   Cancelled
//! ```
//!
//! `Completed` and `Cancelled` are terminal. A new session needs a new
//! scheduler.
//!
//! ## Usage
//!
//! ```ignore
//! let mut scheduler = SessionScheduler::new(DurationPolicy::default(), Duration::from_secs(1));
//! scheduler.select(25)?;
//! scheduler.start()?;
//! // Once per second:
//! if let Some(event) = scheduler.tick()? { /* completed */ }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use super::duration::DurationPolicy;
use crate::error::EngineError;
use crate::events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Selecting,
    Running,
    Paused,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Cancelled)
    }

    /// Running or paused: the session holds the controller's single slot.
    pub fn is_active(self) -> bool {
        matches!(self, SessionStatus::Running | SessionStatus::Paused)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Selecting => "selecting",
            SessionStatus::Running => "running",
            SessionStatus::Paused => "paused",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timed study interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudySession {
    id: Uuid,
    /// Requested length in minutes (0 until selected).
    requested_minutes: u32,
    elapsed_secs: u64,
    status: SessionStatus,
    /// Accrual multipliers applied over the session, in order, deduplicated.
    focus_multiplier_history: Vec<f64>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl StudySession {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            requested_minutes: 0,
            elapsed_secs: 0,
            status: SessionStatus::Idle,
            focus_multiplier_history: Vec::new(),
            started_at: None,
            ended_at: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn requested_minutes(&self) -> u32 {
        self.requested_minutes
    }

    pub fn requested_secs(&self) -> u64 {
        u64::from(self.requested_minutes).saturating_mul(60)
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs
    }

    pub fn elapsed_minutes(&self) -> f64 {
        self.elapsed_secs as f64 / 60.0
    }

    pub fn remaining_secs(&self) -> u64 {
        self.requested_secs().saturating_sub(self.elapsed_secs)
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn focus_multiplier_history(&self) -> &[f64] {
        &self.focus_multiplier_history
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }
}

/// Drives one [`StudySession`] from selection to a terminal state.
#[derive(Debug, Clone)]
pub struct SessionScheduler {
    session: StudySession,
    policy: DurationPolicy,
    tick_secs: u64,
}

impl SessionScheduler {
    /// A fresh scheduler in `Idle`. Sub-second intervals round up to one second.
    pub fn new(policy: DurationPolicy, tick_interval: Duration) -> Self {
        Self {
            session: StudySession::new(),
            policy,
            tick_secs: tick_interval.as_secs().max(1),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn session(&self) -> &StudySession {
        &self.session
    }

    pub fn into_session(self) -> StudySession {
        self.session
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_secs)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Choose the session length. Allowed from `Idle` or `Selecting`.
    pub fn select(&mut self, minutes: i64) -> Result<Event, EngineError> {
        self.require(
            "select",
            &[SessionStatus::Idle, SessionStatus::Selecting],
        )?;
        let minutes = self.policy.validate(minutes)?;
        self.session.requested_minutes = minutes;
        self.session.status = SessionStatus::Selecting;
        Ok(Event::SessionSelected {
            session_id: self.session.id,
            duration_min: minutes,
            at: Utc::now(),
        })
    }

    pub fn start(&mut self) -> Result<Event, EngineError> {
        self.require("start", &[SessionStatus::Selecting])?;
        let now = Utc::now();
        self.session.status = SessionStatus::Running;
        self.session.started_at = Some(now);
        info!(
            session = %self.session.id,
            minutes = self.session.requested_minutes,
            "study session started"
        );
        Ok(Event::SessionStarted {
            session_id: self.session.id,
            duration_min: self.session.requested_minutes,
            at: now,
        })
    }

    pub fn pause(&mut self) -> Result<Event, EngineError> {
        self.require("pause", &[SessionStatus::Running])?;
        self.session.status = SessionStatus::Paused;
        Ok(Event::SessionPaused {
            session_id: self.session.id,
            elapsed_secs: self.session.elapsed_secs,
            at: Utc::now(),
        })
    }

    pub fn resume(&mut self) -> Result<Event, EngineError> {
        self.require("resume", &[SessionStatus::Paused])?;
        self.session.status = SessionStatus::Running;
        Ok(Event::SessionResumed {
            session_id: self.session.id,
            elapsed_secs: self.session.elapsed_secs,
            at: Utc::now(),
        })
    }

    /// Abandon the session. The event carries the elapsed time so the
    /// caller can decide on partial credit.
    pub fn cancel(&mut self) -> Result<Event, EngineError> {
        self.require("cancel", &[SessionStatus::Running, SessionStatus::Paused])?;
        let now = Utc::now();
        self.session.status = SessionStatus::Cancelled;
        self.session.ended_at = Some(now);
        info!(
            session = %self.session.id,
            elapsed_secs = self.session.elapsed_secs,
            "study session cancelled"
        );
        Ok(Event::SessionCancelled {
            session_id: self.session.id,
            elapsed_secs: self.session.elapsed_secs,
            at: now,
        })
    }

    /// Advance by one interval. Returns `Some(Event::SessionCompleted)`
    /// exactly once, on the tick that reaches the requested duration.
    ///
    /// Ticks while paused are ignored. Ticks before `start` or after a
    /// terminal state are errors.
    pub fn tick(&mut self) -> Result<Option<Event>, EngineError> {
        match self.session.status {
            SessionStatus::Paused => Ok(None),
            SessionStatus::Running => {
                let requested = self.session.requested_secs();
                self.session.elapsed_secs = self
                    .session
                    .elapsed_secs
                    .saturating_add(self.tick_secs)
                    .min(requested);
                debug!(
                    session = %self.session.id,
                    elapsed_secs = self.session.elapsed_secs,
                    "tick"
                );
                if self.session.elapsed_secs < requested {
                    return Ok(None);
                }
                let now = Utc::now();
                self.session.status = SessionStatus::Completed;
                self.session.ended_at = Some(now);
                info!(session = %self.session.id, "study session completed");
                Ok(Some(Event::SessionCompleted {
                    session_id: self.session.id,
                    elapsed_secs: self.session.elapsed_secs,
                    at: now,
                }))
            }
            state => Err(EngineError::InvalidTransition {
                action: "tick",
                state,
            }),
        }
    }

    /// Append an applied accrual multiplier to the audit trail when it
    /// differs from the last one recorded.
    pub fn record_multiplier(&mut self, multiplier: f64) {
        let history = &mut self.session.focus_multiplier_history;
        if history.last().map_or(true, |&last| last != multiplier) {
            history.push(multiplier);
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn require(
        &self,
        action: &'static str,
        allowed: &[SessionStatus],
    ) -> Result<(), EngineError> {
        if allowed.contains(&self.session.status) {
            Ok(())
        } else {
            Err(EngineError::InvalidTransition {
                action,
                state: self.session.status,
            })
        }
    }
}
