use clap::Subcommand;
use serde_json::json;
use studypet_core::{Database, Pet, PetKind};

use super::{load_config, require_pet};

#[derive(Subcommand)]
pub enum PetAction {
    /// Hatch a new pet
    Create {
        name: String,
        /// cat, dog, axolotl, raccoon or penguin
        #[arg(long, default_value = "cat")]
        kind: PetKind,
    },
    /// Print the pet as JSON
    Show,
    /// Delete the pet and its history
    Reset,
}

pub fn run(action: PetAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let db = Database::open()?;

    match action {
        PetAction::Create { name, kind } => {
            if db.load_pet(&config.evolution_table()?)?.is_some() {
                return Err("a pet already exists; run `studypet pet reset` first".into());
            }
            let pet = Pet::new(kind, &name);
            db.save_pet(&pet)?;
            println!("{}", serde_json::to_string_pretty(&pet)?);
        }
        PetAction::Show => {
            let pet = require_pet(&db, &config)?;
            let limit = config.evolution_table()?.limit_for(pet.stage().ordinal())?;
            let view = json!({
                "name": pet.name(),
                "kind": pet.kind(),
                "stage": pet.stage(),
                "stage_name": pet.stage().display_name(),
                "level": pet.level(),
                "progress_points": pet.progress_points(),
                "progress_limit": limit,
                "progress_pct": pet.progress_pct(limit),
                "mood": pet.mood(limit),
                "experience": pet.experience(),
                "created_at": pet.created_at(),
            });
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        PetAction::Reset => {
            db.delete_pet()?;
            println!("pet reset");
        }
    }
    Ok(())
}
