use std::path::Path;

use erpsync_core::db::{SqliteSyncLogRepository, SyncLogRepository};

use crate::commands::common::{format_log_lines, log_to_item, open_database, print_json, LogListItem};
use crate::error::CliError;

pub fn run_log_list(
    limit: usize,
    run: Option<&str>,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let logs = SqliteSyncLogRepository::new(db.connection());
    let entries = match run {
        Some(run_id) => logs.list_run(run_id)?,
        None => logs.list(limit)?,
    };

    if as_json {
        let items = entries.iter().map(log_to_item).collect::<Vec<LogListItem>>();
        return print_json(&items);
    }
    if entries.is_empty() {
        println!("No sync log entries.");
        return Ok(());
    }
    for line in format_log_lines(&entries) {
        println!("{line}");
    }
    Ok(())
}
