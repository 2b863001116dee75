//! Static stage/threshold definitions.

use serde::{Deserialize, Serialize};

use super::Stage;
use crate::error::ConfigError;

/// Progress limits for stages 1..=5. The last stage has no successor.
pub const DEFAULT_STAGE_LIMITS: [u32; 5] = [200, 200, 200, 200, 1000];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDef {
    pub stage: Stage,
    pub name: String,
    pub progress_limit: u32,
}

/// Ordered stage definitions. Pure lookup, no state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvolutionTable {
    stages: Vec<StageDef>,
}

impl EvolutionTable {
    /// Build a table from one limit per stage, in stage order.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidValue` if the number of limits does not
    /// match the number of stages or any limit is zero.
    pub fn new(limits: &[u32]) -> Result<Self, ConfigError> {
        if limits.len() != Stage::ALL.len() {
            return Err(ConfigError::invalid(
                "evolution.stage_limits",
                format!("expected {} limits, got {}", Stage::ALL.len(), limits.len()),
            ));
        }
        if let Some(pos) = limits.iter().position(|&l| l == 0) {
            return Err(ConfigError::invalid(
                "evolution.stage_limits",
                format!("limit for stage {} must be positive", pos + 1),
            ));
        }
        let stages = Stage::ALL
            .iter()
            .zip(limits)
            .map(|(&stage, &progress_limit)| StageDef {
                stage,
                name: stage.display_name().to_string(),
                progress_limit,
            })
            .collect();
        Ok(Self { stages })
    }

    pub fn stages(&self) -> &[StageDef] {
        &self.stages
    }

    fn def(&self, ordinal: u8) -> Result<&StageDef, ConfigError> {
        self.stages
            .iter()
            .find(|d| d.stage.ordinal() == ordinal)
            .ok_or(ConfigError::UndefinedStage(ordinal))
    }

    /// Progress limit for the stage with the given ordinal.
    pub fn limit_for(&self, ordinal: u8) -> Result<u32, ConfigError> {
        self.def(ordinal).map(|d| d.progress_limit)
    }

    /// Successor of the given stage, or `None` for the terminal stage.
    pub fn next_stage(&self, ordinal: u8) -> Result<Option<Stage>, ConfigError> {
        self.def(ordinal)?;
        Ok(self
            .stages
            .iter()
            .map(|d| d.stage)
            .find(|s| s.ordinal() == ordinal.saturating_add(1)))
    }

    /// Highest progress a pet can hold at rest on this stage: one below the
    /// limit while a successor exists, the limit itself on the terminal stage.
    pub fn max_resting_progress(&self, ordinal: u8) -> Result<u32, ConfigError> {
        let limit = self.limit_for(ordinal)?;
        Ok(match self.next_stage(ordinal)? {
            Some(_) => limit - 1,
            None => limit,
        })
    }

    pub fn terminal(&self) -> Stage {
        self.stages
            .last()
            .map(|d| d.stage)
            .unwrap_or(Stage::BattleFit)
    }
}

impl Default for EvolutionTable {
    fn default() -> Self {
        let stages = Stage::ALL
            .iter()
            .zip(DEFAULT_STAGE_LIMITS)
            .map(|(&stage, progress_limit)| StageDef {
                stage,
                name: stage.display_name().to_string(),
                progress_limit,
            })
            .collect();
        Self { stages }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits() {
        let table = EvolutionTable::default();
        for ordinal in 1..=4 {
            assert_eq!(table.limit_for(ordinal), Ok(200));
        }
        assert_eq!(table.limit_for(5), Ok(1000));
    }

    #[test]
    fn next_stage_chain_ends_at_battle_fit() {
        let table = EvolutionTable::default();
        assert_eq!(table.next_stage(1), Ok(Some(Stage::Baby)));
        assert_eq!(table.next_stage(4), Ok(Some(Stage::BattleFit)));
        assert_eq!(table.next_stage(5), Ok(None));
        assert_eq!(table.terminal(), Stage::BattleFit);
    }

    #[test]
    fn resting_progress_stays_below_evolving_limits() {
        let table = EvolutionTable::new(&[10, 20, 30, 40, 50]).unwrap();
        assert_eq!(table.max_resting_progress(1), Ok(9));
        assert_eq!(table.max_resting_progress(4), Ok(39));
        assert_eq!(table.max_resting_progress(5), Ok(50));
    }

    #[test]
    fn undefined_ordinal_is_config_error() {
        let table = EvolutionTable::default();
        assert_eq!(table.limit_for(0), Err(ConfigError::UndefinedStage(0)));
        assert_eq!(table.next_stage(9), Err(ConfigError::UndefinedStage(9)));
    }

    #[test]
    fn rejects_wrong_length_and_zero_limits() {
        assert!(EvolutionTable::new(&[200, 200]).is_err());
        assert!(EvolutionTable::new(&[200, 0, 200, 200, 1000]).is_err());
        let custom = EvolutionTable::new(&[10, 20, 30, 40, 50]).unwrap();
        assert_eq!(custom.limit_for(3), Ok(30));
    }
}
