use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pet::{EvolutionRecord, PetMood, Stage};
use crate::progression::SessionResult;
use crate::timer::SessionStatus;

/// Every state change in the engine produces an Event.
/// The CLI prints them; observers receive them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionSelected {
        session_id: Uuid,
        duration_min: u32,
        at: DateTime<Utc>,
    },
    SessionStarted {
        session_id: Uuid,
        duration_min: u32,
        at: DateTime<Utc>,
    },
    SessionPaused {
        session_id: Uuid,
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    SessionResumed {
        session_id: Uuid,
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    SessionCompleted {
        session_id: Uuid,
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    SessionCancelled {
        session_id: Uuid,
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    /// Points were computed for a finished session and handed to the ledger.
    ProgressCommitted { result: SessionResult },
    PetEvolved { record: EvolutionRecord },
    /// An observer rejected a notification. The ledger change stands.
    ObserverFailed {
        observer: String,
        message: String,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        pet_name: String,
        stage: Stage,
        progress_points: u32,
        progress_limit: u32,
        mood: PetMood,
        session_status: Option<SessionStatus>,
        elapsed_secs: u64,
        remaining_secs: u64,
        focus_multiplier: f64,
        at: DateTime<Utc>,
    },
}
