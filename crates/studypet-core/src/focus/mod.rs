//! Attentiveness samples and the accrual multiplier derived from them.
//!
//! An external classifier pushes [`FocusSample`]s at its own cadence. The
//! adapter keeps a short window of recent labels; a window made entirely of
//! distraction lowers the multiplier one step at a time down to a floor,
//! a window made entirely of focus restores it to 1.0.
//!
//! `record` is the only writer. `current_multiplier` is a lock-free read,
//! so the session side never waits on the sampling side.

pub mod feed;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusLabel {
    Focus,
    Distracted,
    #[serde(alias = "absent")]
    NotPresent,
}

impl FocusLabel {
    fn is_inattentive(self) -> bool {
        !matches!(self, FocusLabel::Focus)
    }
}

/// One classification result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusSample {
    pub label: FocusLabel,
    /// 0.0 ..= 1.0
    pub confidence: f64,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl FocusSample {
    pub fn new(label: FocusLabel, confidence: f64) -> Self {
        Self {
            label,
            confidence,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusSettings {
    /// With no classifier wired in the multiplier stays at 1.0.
    pub enabled: bool,
    pub multiplier_floor: f64,
    /// `Distracted` samples below this confidence are treated as noise.
    pub confidence_threshold: f64,
    /// Consecutive accepted samples that count as "sustained".
    pub window: usize,
    /// Multiplier reduction per sustained-distraction sample.
    pub penalty_step: f64,
}

impl Default for FocusSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            multiplier_floor: 0.25,
            confidence_threshold: 0.7,
            window: 3,
            penalty_step: 0.25,
        }
    }
}

#[derive(Debug)]
pub struct FocusAdapter {
    settings: FocusSettings,
    /// f64 bits.
    multiplier: AtomicU64,
    recent: Mutex<VecDeque<FocusLabel>>,
}

impl FocusAdapter {
    pub fn new(settings: FocusSettings) -> Self {
        let window = settings.window.max(1);
        Self {
            settings: FocusSettings { window, ..settings },
            multiplier: AtomicU64::new(1.0f64.to_bits()),
            recent: Mutex::new(VecDeque::with_capacity(window)),
        }
    }

    /// Adapter with no classifier behind it.
    pub fn disabled() -> Self {
        Self::new(FocusSettings {
            enabled: false,
            ..FocusSettings::default()
        })
    }

    pub fn settings(&self) -> &FocusSettings {
        &self.settings
    }

    pub fn current_multiplier(&self) -> f64 {
        if !self.settings.enabled {
            return 1.0;
        }
        f64::from_bits(self.multiplier.load(Ordering::Acquire))
    }

    /// Feed one sample. Returns whether it was accepted into the window.
    pub fn record(&self, sample: FocusSample) -> bool {
        if !self.settings.enabled {
            return false;
        }
        if !(0.0..=1.0).contains(&sample.confidence) {
            warn!(confidence = sample.confidence, "focus sample with out-of-range confidence dropped");
            return false;
        }
        if sample.label == FocusLabel::Distracted
            && sample.confidence < self.settings.confidence_threshold
        {
            debug!(confidence = sample.confidence, "low-confidence distraction ignored");
            return false;
        }

        let mut recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
        recent.push_back(sample.label);
        while recent.len() > self.settings.window {
            recent.pop_front();
        }
        if recent.len() < self.settings.window {
            return true;
        }

        let current = f64::from_bits(self.multiplier.load(Ordering::Acquire));
        let next = if recent.iter().all(|l| l.is_inattentive()) {
            (current - self.settings.penalty_step).max(self.settings.multiplier_floor)
        } else if recent.iter().all(|l| !l.is_inattentive()) {
            1.0
        } else {
            current
        };
        if next != current {
            debug!(from = current, to = next, "focus multiplier changed");
            self.multiplier.store(next.to_bits(), Ordering::Release);
        }
        true
    }

    /// Forget the window and restore 1.0. Called when a session starts.
    pub fn reset(&self) {
        let mut recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
        recent.clear();
        self.multiplier.store(1.0f64.to_bits(), Ordering::Release);
    }
}

impl Default for FocusAdapter {
    fn default() -> Self {
        Self::new(FocusSettings::default())
    }
}
