use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ObserverFailure;
use crate::events::Event;
use crate::pet::{EvolutionOutcome, EvolutionRecord, Pet};

/// Persisted outcome of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    Accrued,
    Evolved,
    AtCap,
    Cancelled,
}

impl SessionOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionOutcome::Accrued => "accrued",
            SessionOutcome::Evolved => "evolved",
            SessionOutcome::AtCap => "at_cap",
            SessionOutcome::Cancelled => "cancelled",
        }
    }
}

impl From<EvolutionOutcome> for SessionOutcome {
    fn from(outcome: EvolutionOutcome) -> Self {
        match outcome {
            EvolutionOutcome::Accrued { .. } => SessionOutcome::Accrued,
            EvolutionOutcome::Evolved { .. } => SessionOutcome::Evolved,
            EvolutionOutcome::AtCap => SessionOutcome::AtCap,
        }
    }
}

impl fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accrued" => Ok(SessionOutcome::Accrued),
            "evolved" => Ok(SessionOutcome::Evolved),
            "at_cap" => Ok(SessionOutcome::AtCap),
            "cancelled" => Ok(SessionOutcome::Cancelled),
            other => Err(format!("unknown session outcome: {other}")),
        }
    }
}

/// What a finished session earned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    pub session_id: Uuid,
    /// Requested length in minutes.
    pub session_duration: u32,
    pub elapsed_secs: u64,
    pub points_awarded: u32,
    /// Focus multiplier applied to this session.
    pub multiplier: f64,
    pub outcome: SessionOutcome,
    /// Ledger result; `None` when nothing was credited for a cancellation.
    pub ledger: Option<EvolutionOutcome>,
    /// Pet after the ledger update.
    pub pet: Pet,
    pub created_at: DateTime<Utc>,
}

impl SessionResult {
    /// Whole minutes studied, as persisted in session history.
    pub fn elapsed_minutes(&self) -> u64 {
        self.elapsed_secs / 60
    }
}

/// Everything that came out of finishing a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub result: SessionResult,
    pub evolution: Option<EvolutionRecord>,
    /// Observers that failed to take the notification.
    pub failures: Vec<ObserverFailure>,
    /// In emission order, starting with the terminal session event.
    pub events: Vec<Event>,
}

impl SessionReport {
    pub fn is_fully_delivered(&self) -> bool {
        self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pet::Stage;

    #[test]
    fn outcome_strings_round_trip() {
        for outcome in [
            SessionOutcome::Accrued,
            SessionOutcome::Evolved,
            SessionOutcome::AtCap,
            SessionOutcome::Cancelled,
        ] {
            assert_eq!(outcome.as_str().parse::<SessionOutcome>(), Ok(outcome));
        }
    }

    #[test]
    fn ledger_outcome_maps_to_session_outcome() {
        let evolved = EvolutionOutcome::Evolved {
            from: Stage::Egg,
            to: Stage::Baby,
        };
        assert_eq!(SessionOutcome::from(evolved), SessionOutcome::Evolved);
        assert_eq!(
            SessionOutcome::from(EvolutionOutcome::Accrued { total: 3 }),
            SessionOutcome::Accrued
        );
    }
}
