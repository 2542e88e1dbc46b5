use std::path::Path;

use erpsync_core::db::{load_reference_data, ReferenceData};

use crate::commands::common::open_database;
use crate::error::CliError;

pub fn run_reference_load(path: &Path, db_path: &Path) -> Result<(), CliError> {
    let data = ReferenceData::from_json(&std::fs::read_to_string(path)?)?;
    let mut db = open_database(db_path)?;
    let inserted = db.transaction(|tx| load_reference_data(tx, &data))?;
    println!("Loaded {inserted} reference row(s) from {}", path.display());
    Ok(())
}
