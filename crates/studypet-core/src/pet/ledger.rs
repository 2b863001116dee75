//! The single write path for pet progress.
//!
//! Points that reach a stage's limit evolve the pet and reset progress to 0.
//! Overflow past the limit is discarded, not carried into the next stage.
//! The terminal stage clamps at its limit instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use super::{EvolutionTable, Pet, Stage};
use crate::error::{ConfigError, EngineError};

/// Result of a single [`MasteryLedger::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EvolutionOutcome {
    /// Points credited, no stage change.
    Accrued { total: u32 },
    /// The limit was reached and the pet moved to the next stage.
    Evolved { from: Stage, to: Stage },
    /// Terminal stage; progress is pinned at its limit.
    AtCap,
}

/// Emitted once per stage transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvolutionRecord {
    pub from_stage: Stage,
    pub to_stage: Stage,
    pub points_at_evolution: u32,
    pub timestamp: DateTime<Utc>,
}

/// Holds the pet and serializes every mutation of it.
#[derive(Debug)]
pub struct MasteryLedger {
    table: EvolutionTable,
    pet: Mutex<Pet>,
}

impl MasteryLedger {
    /// Take ownership of `pet`.
    ///
    /// Out-of-range progress (possible with hand-edited persisted data) is
    /// clamped to [`EvolutionTable::max_resting_progress`], so a restored pet
    /// never sits at a limit it should already have evolved past.
    ///
    /// # Errors
    /// Returns `ConfigError::UndefinedStage` if the pet's stage is missing
    /// from `table`.
    pub fn new(mut pet: Pet, table: EvolutionTable) -> Result<Self, ConfigError> {
        let max = table.max_resting_progress(pet.stage.ordinal())?;
        if pet.progress_points > max {
            debug!(
                progress = pet.progress_points,
                max, "clamping restored progress"
            );
            pet.progress_points = max;
        }
        Ok(Self {
            table,
            pet: Mutex::new(pet),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Pet> {
        // Pet is never left half-written between statements, so a poisoned
        // guard still holds a consistent value.
        self.pet.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn table(&self) -> &EvolutionTable {
        &self.table
    }

    /// Snapshot of the pet.
    pub fn pet(&self) -> Pet {
        self.lock().clone()
    }

    pub fn stage(&self) -> Stage {
        self.lock().stage
    }

    pub fn progress_points(&self) -> u32 {
        self.lock().progress_points
    }

    /// Limit of the pet's current stage.
    pub fn current_limit(&self) -> Result<u32, ConfigError> {
        let stage = self.stage();
        self.table.limit_for(stage.ordinal())
    }

    /// Credit `points` to the pet.
    ///
    /// Reaching the limit exactly is enough to evolve.
    ///
    /// # Errors
    /// `EngineError::InvalidDelta` for a negative delta, `EngineError::Config`
    /// if the table does not know the pet's stage.
    pub fn add(&self, points: i64) -> Result<EvolutionOutcome, EngineError> {
        if points < 0 {
            return Err(EngineError::InvalidDelta(points));
        }
        let points = u32::try_from(points).unwrap_or(u32::MAX);

        let mut pet = self.lock();
        let ordinal = pet.stage.ordinal();
        let limit = self.table.limit_for(ordinal)?;
        let next = self.table.next_stage(ordinal)?;

        pet.experience = pet.experience.saturating_add(u64::from(points));
        let total = pet.progress_points.saturating_add(points);

        let outcome = if total < limit {
            pet.progress_points = total;
            EvolutionOutcome::Accrued { total }
        } else if let Some(to) = next {
            let from = pet.stage;
            pet.stage = to;
            pet.progress_points = 0;
            info!(%from, %to, pet = pet.name(), "pet evolved");
            EvolutionOutcome::Evolved { from, to }
        } else {
            pet.progress_points = limit;
            EvolutionOutcome::AtCap
        };

        debug!(points, ?outcome, "ledger add");
        Ok(outcome)
    }
}
