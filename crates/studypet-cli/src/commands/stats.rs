use studypet_core::storage::Database;

/// Print the last `limit` sessions as a JSON array.
pub fn history(limit: usize) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let entries = db.session_history(limit)?;
    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let stats = db.stats()?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
