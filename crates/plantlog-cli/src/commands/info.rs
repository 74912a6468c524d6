use std::path::Path;

use crate::commands::common::open_database;
use crate::error::CliError;

pub fn run(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let guard = db.lock().unwrap();
    let info = guard.info()?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    for counts in &info.collections {
        println!(
            "{:<16}  {:>5} records  {:>4} pending  {:>3} conflicts",
            counts.collection.to_string(),
            counts.total,
            counts.pending,
            counts.conflicts
        );
    }
    println!("database size: {} bytes", info.size_bytes);
    Ok(())
}
