use clap::Subcommand;
use studypet_core::Config;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print one value, or every value of a section ("session", "focus", "evolution")
    Get {
        /// Dotted key (e.g. "session.allow_custom") or section name
        key: String,
    },
    /// Validate and store a value
    Set {
        /// Dotted key
        key: String,
        /// New value ("none" clears an optional value)
        value: String,
    },
    /// Print every value as `key = value`
    List,
    /// Write the default configuration (the pet is not touched)
    Reset,
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let entries = config.entries();
            if let Some((_, value)) = entries.iter().find(|(k, _)| *k == key) {
                println!("{value}");
                return Ok(());
            }
            let section = format!("{key}.");
            let matching: Vec<_> = entries
                .iter()
                .filter(|(k, _)| k.starts_with(&section))
                .collect();
            if matching.is_empty() {
                return Err(format!("unknown key: {key}").into());
            }
            for (k, v) in matching {
                println!("{k} = {v}");
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            let stored = config.get(&key).unwrap_or(value);
            println!("{key} = {stored}");
        }
        ConfigAction::List => {
            for (key, value) in Config::load()?.entries() {
                println!("{key} = {value}");
            }
        }
        ConfigAction::Reset => {
            Config::default().save()?;
            println!("config reset to defaults");
        }
    }
    Ok(())
}
