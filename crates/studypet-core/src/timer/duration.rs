use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Session lengths offered by default, in minutes.
pub const DEFAULT_PRESETS: [u32; 6] = [10, 15, 25, 30, 45, 60];

/// Which session lengths `select` accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationPolicy {
    presets: Vec<u32>,
    /// Extended mode: any positive length, up to `max_custom_minutes` if set.
    allow_custom: bool,
    max_custom_minutes: Option<u32>,
}

impl DurationPolicy {
    pub fn new(presets: Vec<u32>, allow_custom: bool, max_custom_minutes: Option<u32>) -> Self {
        Self {
            presets,
            allow_custom,
            max_custom_minutes,
        }
    }

    pub fn presets(&self) -> &[u32] {
        &self.presets
    }

    /// Same policy with custom mode switched on or off.
    pub fn with_custom(mut self, allow_custom: bool) -> Self {
        self.allow_custom = allow_custom;
        self
    }

    /// Validate a requested length in minutes.
    ///
    /// # Errors
    /// `EngineError::InvalidDuration` if the length is not positive, not a
    /// preset outside custom mode, or above the custom cap.
    pub fn validate(&self, minutes: i64) -> Result<u32, EngineError> {
        let invalid = |reason: String| EngineError::InvalidDuration { minutes, reason };

        if minutes <= 0 {
            return Err(invalid("duration must be positive".into()));
        }
        let m = u32::try_from(minutes).map_err(|_| invalid("duration too large".into()))?;

        if self.presets.contains(&m) {
            return Ok(m);
        }
        if !self.allow_custom {
            return Err(invalid(format!(
                "not one of the presets {:?}",
                self.presets
            )));
        }
        if let Some(max) = self.max_custom_minutes {
            if m > max {
                return Err(invalid(format!("custom sessions are capped at {max} minutes")));
            }
        }
        Ok(m)
    }
}

impl Default for DurationPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_PRESETS.to_vec(), false, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_accepted() {
        let policy = DurationPolicy::default();
        for m in DEFAULT_PRESETS {
            assert_eq!(policy.validate(m as i64), Ok(m));
        }
    }

    #[test]
    fn non_preset_rejected_outside_custom_mode() {
        let policy = DurationPolicy::default();
        assert!(matches!(
            policy.validate(20),
            Err(EngineError::InvalidDuration { minutes: 20, .. })
        ));
    }

    #[test]
    fn non_positive_always_rejected() {
        let policy = DurationPolicy::default().with_custom(true);
        assert!(policy.validate(0).is_err());
        assert!(policy.validate(-5).is_err());
    }

    #[test]
    fn custom_mode_accepts_any_positive_length() {
        let policy = DurationPolicy::default().with_custom(true);
        assert_eq!(policy.validate(1), Ok(1));
        assert_eq!(policy.validate(150), Ok(150));
        assert_eq!(policy.validate(10_000), Ok(10_000));
    }

    #[test]
    fn custom_cap_applies_to_custom_lengths_only() {
        let policy = DurationPolicy::new(vec![25, 240], true, Some(180));
        assert_eq!(policy.validate(180), Ok(180));
        assert!(policy.validate(181).is_err());
        assert_eq!(policy.validate(240), Ok(240));
    }
}
