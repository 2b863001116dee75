pub mod config;
pub mod pet;
pub mod session;
pub mod stats;

use studypet_core::{Config, Database, Pet};

/// Load and validate the configuration.
pub fn load_config() -> Result<Config, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    config.validate()?;
    Ok(config)
}

/// Load the stored pet or explain how to create one.
pub fn require_pet(db: &Database, config: &Config) -> Result<Pet, Box<dyn std::error::Error>> {
    db.load_pet(&config.evolution_table()?)?
        .ok_or_else(|| "no pet yet; create one with `studypet pet create <name>`".into())
}
