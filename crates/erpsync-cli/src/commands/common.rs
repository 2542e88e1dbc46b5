use std::env;
use std::path::{Path, PathBuf};

use erpsync_core::db::Database;
use erpsync_core::import::ImportReport;
use erpsync_core::models::{Endpoint, SyncLogEntry};
use erpsync_core::spreadsheet::{read_rows, read_rows_base64};
use serde::Serialize;

use crate::cli::WorkbookArgs;
use crate::connections::ConnectionsConfig;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct LogListItem {
    pub id: Option<i64>,
    pub run_id: String,
    pub connection: String,
    pub res_model: String,
    pub res_id: Option<i64>,
    pub name: String,
    pub date_issue: String,
    pub skipped: Option<String>,
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os("ERPSYNC_DB_PATH").map(PathBuf::from)) {
        return Ok(path);
    }
    default_db_path()
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_local_dir()
        .map(|dir| dir.join("erpsync").join("erpsync.db"))
        .ok_or_else(|| CliError::Config("Failed to resolve local data directory".into()))
}

pub fn open_database(path: &Path) -> Result<Database, CliError> {
    Ok(Database::open(path)?)
}

pub fn load_config() -> Result<ConnectionsConfig, CliError> {
    ConnectionsConfig::load().map_err(CliError::Config)
}

/// Endpoint of the explicit connection, or the active one
pub fn resolve_endpoint(
    config: &ConnectionsConfig,
    explicit: Option<&str>,
) -> Result<Endpoint, CliError> {
    let name = config.resolve_connection_name(explicit);
    config
        .endpoint(&name)
        .ok_or(CliError::ConnectionNotFound(name))
}

/// Rows of the first worksheet of a workbook file
pub fn read_workbook(file: &WorkbookArgs) -> Result<Vec<Vec<String>>, CliError> {
    let rows = if file.base64 {
        read_rows_base64(&std::fs::read_to_string(&file.path)?)?
    } else {
        read_rows(&std::fs::read(&file.path)?)?
    };
    tracing::debug!("Read {} row(s) from {}", rows.len(), file.path.display());
    Ok(rows)
}

pub fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_import_report(report: &ImportReport, as_json: bool) -> Result<(), CliError> {
    if as_json {
        return print_json(report);
    }
    println!("{}", report.message());
    Ok(())
}

pub fn log_to_item(entry: &SyncLogEntry) -> LogListItem {
    LogListItem {
        id: entry.id,
        run_id: entry.run_id.clone(),
        connection: entry.connection.clone(),
        res_model: entry.res_model.clone(),
        res_id: entry.res_id,
        name: entry.name.clone(),
        date_issue: entry.date_issue.to_string(),
        skipped: skip_reason(entry).map(str::to_string),
    }
}

fn skip_reason(entry: &SyncLogEntry) -> Option<&str> {
    entry.json_data.get("skipped").and_then(|reason| reason.as_str())
}

pub fn format_log_lines(entries: &[SyncLogEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            let run = entry.run_id.chars().take(13).collect::<String>();
            let remote = entry
                .res_id
                .map_or_else(|| "-".to_string(), |id| id.to_string());
            let status = skip_reason(entry)
                .map_or_else(|| "imported".to_string(), |reason| format!("skipped: {reason}"));
            format!(
                "{}  {run}  {} {remote}  {}  {status}",
                entry.date_issue, entry.res_model, entry.name
            )
        })
        .collect()
}
