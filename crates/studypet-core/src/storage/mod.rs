mod config;
pub mod database;
pub mod migrations;

pub use config::{Config, EvolutionConfig, FocusConfig, SessionConfig};
pub use database::{Database, SessionHistoryEntry, Stats, LAST_EVENT_KEY};

use std::path::PathBuf;

/// Returns the directory holding `config.toml` and `studypet.db`.
///
/// `STUDYPET_DATA_DIR` wins when set. Otherwise `~/.config/studypet`, or
/// `~/.config/studypet-dev` with `STUDYPET_ENV=dev`.
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let dir = match std::env::var_os("STUDYPET_DATA_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("STUDYPET_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("studypet-dev")
            } else {
                base_dir.join("studypet")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
