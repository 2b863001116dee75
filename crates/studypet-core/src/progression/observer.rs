use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::SessionResult;
use crate::events::Event;
use crate::pet::EvolutionRecord;

/// Presentation / persistence collaborator notified by the controller.
///
/// Failures are reported back to the caller of the controller; they never
/// undo progress that the ledger has already recorded.
pub trait ProgressObserver: Send {
    /// Unique identifier used in failure reports.
    fn name(&self) -> &str;

    /// Called for every session lifecycle event.
    fn on_event(&self, _event: &Event) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(()) // default no-op
    }

    /// Called once per finished session, after the ledger update.
    fn on_session_result(
        &self,
        _result: &SessionResult,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(()) // default no-op
    }

    /// Called once per stage transition.
    fn on_evolution(
        &self,
        _record: &EvolutionRecord,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(()) // default no-op
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObserverFailure {
    pub observer: String,
    pub message: String,
}

impl ObserverFailure {
    /// The failure as an event for the caller's event stream.
    pub fn to_event(&self) -> Event {
        Event::ObserverFailed {
            observer: self.observer.clone(),
            message: self.message.clone(),
            at: Utc::now(),
        }
    }
}
