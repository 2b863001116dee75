//! The study companion and its growth rules.
//!
//! A [`Pet`] moves through five fixed [`Stage`]s. Progress points are only
//! ever written through the [`MasteryLedger`]; everything else reads
//! snapshots.

mod evolution;
mod ledger;

pub use evolution::{EvolutionTable, StageDef, DEFAULT_STAGE_LIMITS};
pub use ledger::{EvolutionOutcome, EvolutionRecord, MasteryLedger};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Growth stage. The discriminant is the persisted `stage_level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Egg = 1,
    Baby = 2,
    Child = 3,
    Grown = 4,
    BattleFit = 5,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Egg,
        Stage::Baby,
        Stage::Child,
        Stage::Grown,
        Stage::BattleFit,
    ];

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn from_ordinal(ordinal: u8) -> Option<Stage> {
        Stage::ALL.iter().copied().find(|s| s.ordinal() == ordinal)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Stage::Egg => "Egg",
            Stage::Baby => "Baby",
            Stage::Child => "Child",
            Stage::Grown => "Grown",
            Stage::BattleFit => "Battle-fit",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Species of the companion. Cosmetic only; every kind evolves the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PetKind {
    Cat,
    Dog,
    Axolotl,
    Raccoon,
    Penguin,
}

impl PetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PetKind::Cat => "cat",
            PetKind::Dog => "dog",
            PetKind::Axolotl => "axolotl",
            PetKind::Raccoon => "raccoon",
            PetKind::Penguin => "penguin",
        }
    }
}

impl fmt::Display for PetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cat" => Ok(PetKind::Cat),
            "dog" => Ok(PetKind::Dog),
            "axolotl" => Ok(PetKind::Axolotl),
            "raccoon" => Ok(PetKind::Raccoon),
            "penguin" => Ok(PetKind::Penguin),
            other => Err(format!("unknown pet kind: {other}")),
        }
    }
}

/// Mood derived from how far the pet is into its current stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PetMood {
    Sad,
    Worried,
    Hungry,
    Happy,
    Restless,
}

impl PetMood {
    /// Bucket a 0..=100 progress percentage.
    pub fn from_progress_pct(pct: f64) -> Self {
        if pct < 20.0 {
            PetMood::Sad
        } else if pct < 40.0 {
            PetMood::Worried
        } else if pct < 60.0 {
            PetMood::Hungry
        } else if pct < 80.0 {
            PetMood::Happy
        } else {
            PetMood::Restless
        }
    }
}

/// The companion.
///
/// `name`, `kind` and `created_at` are fixed at creation. `stage`,
/// `progress_points` and `experience` are only mutated by [`MasteryLedger`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pet {
    name: String,
    kind: PetKind,
    pub(crate) stage: Stage,
    pub(crate) progress_points: u32,
    /// Lifetime sum of credited points. Never reset by evolution.
    #[serde(default)]
    pub(crate) experience: u64,
    created_at: DateTime<Utc>,
}

impl Pet {
    /// A fresh egg. An empty name falls back to the kind's name.
    pub fn new(kind: PetKind, name: &str) -> Self {
        let name = name.trim();
        Self {
            name: if name.is_empty() {
                kind.as_str().to_string()
            } else {
                name.to_string()
            },
            kind,
            stage: Stage::Egg,
            progress_points: 0,
            experience: 0,
            created_at: Utc::now(),
        }
    }

    /// Rebuild a pet from persisted fields. The ledger re-validates
    /// `progress_points` against the stage limit when it takes ownership.
    pub fn from_parts(
        kind: PetKind,
        name: &str,
        stage: Stage,
        progress_points: u32,
        experience: u64,
        created_at: DateTime<Utc>,
    ) -> Self {
        let mut pet = Pet::new(kind, name);
        pet.stage = stage;
        pet.progress_points = progress_points;
        pet.experience = experience;
        pet.created_at = created_at;
        pet
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PetKind {
        self.kind
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn progress_points(&self) -> u32 {
        self.progress_points
    }

    pub fn experience(&self) -> u64 {
        self.experience
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn level(&self) -> u8 {
        self.stage.ordinal()
    }

    /// 0.0 ..= 100.0 progress toward `limit`.
    pub fn progress_pct(&self, limit: u32) -> f64 {
        if limit == 0 {
            return 0.0;
        }
        (self.progress_points as f64 / limit as f64 * 100.0).min(100.0)
    }

    pub fn mood(&self, limit: u32) -> PetMood {
        PetMood::from_progress_pct(self.progress_pct(limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_ordinals_round_trip() {
        for stage in Stage::ALL {
            assert_eq!(Stage::from_ordinal(stage.ordinal()), Some(stage));
        }
        assert_eq!(Stage::from_ordinal(0), None);
        assert_eq!(Stage::from_ordinal(6), None);
    }

    #[test]
    fn new_pet_starts_as_egg() {
        let pet = Pet::new(PetKind::Axolotl, "Mochi");
        assert_eq!(pet.stage(), Stage::Egg);
        assert_eq!(pet.progress_points(), 0);
        assert_eq!(pet.level(), 1);
        assert_eq!(pet.name(), "Mochi");
    }

    #[test]
    fn blank_name_defaults_to_kind() {
        let pet = Pet::new(PetKind::Penguin, "   ");
        assert_eq!(pet.name(), "penguin");
    }

    #[test]
    fn mood_follows_progress_buckets() {
        let mut pet = Pet::new(PetKind::Cat, "Tom");
        assert_eq!(pet.mood(200), PetMood::Sad);
        pet.progress_points = 60;
        assert_eq!(pet.mood(200), PetMood::Worried);
        pet.progress_points = 100;
        assert_eq!(pet.mood(200), PetMood::Hungry);
        pet.progress_points = 150;
        assert_eq!(pet.mood(200), PetMood::Happy);
        pet.progress_points = 199;
        assert_eq!(pet.mood(200), PetMood::Restless);
    }

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!("Raccoon".parse::<PetKind>(), Ok(PetKind::Raccoon));
        assert!("dragon".parse::<PetKind>().is_err());
    }
}
