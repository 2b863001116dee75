//! Orchestration of sessions, focus and the ledger.

mod controller;
mod observer;
mod result;

pub use controller::{ProgressionController, SharedController};
pub use observer::{ObserverFailure, ProgressObserver};
pub use result::{SessionOutcome, SessionReport, SessionResult};

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::timer::DurationPolicy;

/// Credit given for a cancelled session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancelCredit {
    /// Cancelled sessions earn nothing.
    #[default]
    None,
    /// Elapsed time is credited with the usual formula.
    Proportional,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressionSettings {
    pub durations: DurationPolicy,
    pub tick_interval: Duration,
    /// Points per studied minute before focus adjustment.
    pub accrual_rate: f64,
    pub cancel_credit: CancelCredit,
}

impl Default for ProgressionSettings {
    fn default() -> Self {
        Self {
            durations: DurationPolicy::default(),
            tick_interval: Duration::from_secs(1),
            accrual_rate: 1.0,
            cancel_credit: CancelCredit::None,
        }
    }
}

/// `floor(elapsed_minutes * accrual_rate * multiplier)`, never negative.
pub fn award_points(elapsed_minutes: f64, accrual_rate: f64, multiplier: f64) -> u32 {
    let raw = (elapsed_minutes * accrual_rate * multiplier).floor();
    if raw.is_finite() && raw > 0.0 {
        raw.min(u32::MAX as f64) as u32
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn award_points_floors() {
        assert_eq!(award_points(25.0, 1.0, 1.0), 25);
        assert_eq!(award_points(25.0, 1.0, 0.25), 6);
        assert_eq!(award_points(12.5, 2.0, 0.5), 12);
        assert_eq!(award_points(0.0, 1.0, 1.0), 0);
        assert_eq!(award_points(10.0, -1.0, 1.0), 0);
    }
}
