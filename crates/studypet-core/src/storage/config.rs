//! TOML-based engine configuration.
//!
//! Covers the tunables of the engine:
//! - Session lengths and the custom-duration switch
//! - Point accrual and cancellation credit
//! - Focus adapter thresholds
//! - Stage limits of the evolution table
//!
//! Configuration is stored at `<data_dir>/config.toml`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::data_dir;
use crate::error::ConfigError;
use crate::focus::FocusSettings;
use crate::pet::{EvolutionTable, DEFAULT_STAGE_LIMITS};
use crate::progression::{CancelCredit, ProgressionSettings};
use crate::timer::{DurationPolicy, DEFAULT_PRESETS};

/// Session-length and accrual configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_presets")]
    pub presets: Vec<u32>,
    #[serde(default)]
    pub allow_custom: bool,
    /// Upper bound for custom lengths; unset means uncapped.
    #[serde(default)]
    pub max_custom_minutes: Option<u32>,
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
    /// Points per studied minute.
    #[serde(default = "default_accrual_rate")]
    pub accrual_rate: f64,
    #[serde(default)]
    pub cancel_credit: CancelCredit,
}

/// Focus adapter configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_multiplier_floor")]
    pub multiplier_floor: f64,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    #[serde(default = "default_window")]
    pub window: usize,
    #[serde(default = "default_penalty_step")]
    pub penalty_step: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionConfig {
    #[serde(default = "default_stage_limits")]
    pub stage_limits: Vec<u32>,
}

/// Engine configuration.
///
/// Serialized to/from TOML at `<data_dir>/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub focus: FocusConfig,
    #[serde(default)]
    pub evolution: EvolutionConfig,
}

fn default_presets() -> Vec<u32> {
    DEFAULT_PRESETS.to_vec()
}
fn default_tick_interval_secs() -> u64 {
    1
}
fn default_accrual_rate() -> f64 {
    1.0
}
fn default_true() -> bool {
    true
}
fn default_multiplier_floor() -> f64 {
    0.25
}
fn default_confidence_threshold() -> f64 {
    0.7
}
fn default_window() -> usize {
    3
}
fn default_penalty_step() -> f64 {
    0.25
}
fn default_stage_limits() -> Vec<u32> {
    DEFAULT_STAGE_LIMITS.to_vec()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            presets: default_presets(),
            allow_custom: false,
            max_custom_minutes: None,
            tick_interval_secs: default_tick_interval_secs(),
            accrual_rate: default_accrual_rate(),
            cancel_credit: CancelCredit::None,
        }
    }
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            multiplier_floor: default_multiplier_floor(),
            confidence_threshold: default_confidence_threshold(),
            window: default_window(),
            penalty_step: default_penalty_step(),
        }
    }
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            stage_limits: default_stage_limits(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(root: &mut Value, key: &str, value: &str) -> Result<(), ConfigError> {
        let unknown = || ConfigError::invalid(key, "unknown config key");
        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(ConfigError::invalid(key, "config key is empty"));
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;
            let new_value = match (existing, value.trim()) {
                (Value::String(_), _) => Value::String(value.to_string()),
                // Clearing words map to null; deserialization rejects them
                // for keys that are not optional.
                (_, "" | "none" | "null") => Value::Null,
                (Value::Bool(_), v) => Value::Bool(
                    v.parse::<bool>()
                        .map_err(|e| ConfigError::invalid(key, e.to_string()))?,
                ),
                (Value::Number(_) | Value::Null, v) => parse_number(key, v)?,
                (Value::Object(_) | Value::Array(_), v) => serde_json::from_str(v)
                    .map_err(|e| ConfigError::invalid(key, e.to_string()))?,
            };

            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("config.toml"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from the data directory, writing the defaults on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            let cfg = Self::default();
            cfg.save_to(&path)?;
            Ok(cfg)
        }
    }

    /// Load from an explicit path.
    ///
    /// # Errors
    /// `LoadFailed` if the file cannot be read, `ParseFailed` if it is not
    /// valid TOML for this schema.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(e.to_string()))
    }

    /// Persist to the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dotted key. The result must still pass [`validate`].
    /// Nothing is written to disk; call [`save`] afterwards.
    ///
    /// [`validate`]: Config::validate
    /// [`save`]: Config::save
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the updated configuration is invalid. `self` is left untouched
    /// on error.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::invalid(key, e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Flattened `key = value` pairs, sorted by key within each section.
    pub fn entries(&self) -> Vec<(String, String)> {
        fn walk(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
            match value {
                Value::Object(map) => {
                    for (k, v) in map {
                        let key = if prefix.is_empty() {
                            k.clone()
                        } else {
                            format!("{prefix}.{k}")
                        };
                        walk(&key, v, out);
                    }
                }
                Value::String(s) => out.push((prefix.to_string(), s.clone())),
                other => out.push((prefix.to_string(), other.to_string())),
            }
        }

        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            walk("", &json, &mut out);
        }
        out
    }

    /// Check every value against the engine's constraints.
    ///
    /// # Errors
    /// `InvalidValue` naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.session;
        if s.presets.is_empty() {
            return Err(ConfigError::invalid("session.presets", "at least one preset is required"));
        }
        if s.presets.contains(&0) {
            return Err(ConfigError::invalid("session.presets", "presets must be positive"));
        }
        if s.max_custom_minutes == Some(0) {
            return Err(ConfigError::invalid("session.max_custom_minutes", "must be positive"));
        }
        if s.tick_interval_secs == 0 {
            return Err(ConfigError::invalid("session.tick_interval_secs", "must be positive"));
        }
        if !(s.accrual_rate.is_finite() && s.accrual_rate > 0.0) {
            return Err(ConfigError::invalid("session.accrual_rate", "must be greater than 0"));
        }

        let f = &self.focus;
        if !(f.multiplier_floor > 0.0 && f.multiplier_floor <= 1.0) {
            return Err(ConfigError::invalid("focus.multiplier_floor", "must be in (0, 1]"));
        }
        if !(0.0..=1.0).contains(&f.confidence_threshold) {
            return Err(ConfigError::invalid("focus.confidence_threshold", "must be in [0, 1]"));
        }
        if f.window == 0 {
            return Err(ConfigError::invalid("focus.window", "must be at least 1"));
        }
        if !(f.penalty_step.is_finite() && f.penalty_step >= 0.0) {
            return Err(ConfigError::invalid("focus.penalty_step", "must be non-negative"));
        }

        self.evolution_table().map(|_| ())
    }

    pub fn duration_policy(&self) -> DurationPolicy {
        DurationPolicy::new(
            self.session.presets.clone(),
            self.session.allow_custom,
            self.session.max_custom_minutes,
        )
    }

    pub fn focus_settings(&self) -> FocusSettings {
        FocusSettings {
            enabled: self.focus.enabled,
            multiplier_floor: self.focus.multiplier_floor,
            confidence_threshold: self.focus.confidence_threshold,
            window: self.focus.window,
            penalty_step: self.focus.penalty_step,
        }
    }

    /// # Errors
    /// `InvalidValue` if the limit list is not five positive numbers.
    pub fn evolution_table(&self) -> Result<EvolutionTable, ConfigError> {
        EvolutionTable::new(&self.evolution.stage_limits).map_err(|e| match e {
            ConfigError::InvalidValue { message, .. } => {
                ConfigError::invalid("evolution.stage_limits", message)
            }
            other => other,
        })
    }

    pub fn progression_settings(&self) -> ProgressionSettings {
        ProgressionSettings {
            durations: self.duration_policy(),
            tick_interval: Duration::from_secs(self.session.tick_interval_secs.max(1)),
            accrual_rate: self.session.accrual_rate,
            cancel_credit: self.session.cancel_credit,
        }
    }
}

fn parse_number(key: &str, value: &str) -> Result<Value, ConfigError> {
    if let Ok(n) = value.parse::<u64>() {
        Ok(Value::Number(n.into()))
    } else if let Ok(n) = value.parse::<f64>() {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .ok_or_else(|| ConfigError::invalid(key, format!("cannot parse '{value}' as number")))
    } else {
        Err(ConfigError::invalid(key, format!("cannot parse '{value}' as number")))
    }
}
