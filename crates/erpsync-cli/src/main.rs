//! erpsync CLI - pull ERP records into a local store
//!
//! Connections and run defaults live in the user config directory; the
//! local store defaults to the user data directory.

mod cli;
mod commands;
mod connections;
mod error;

use clap::Parser;

use crate::cli::{Cli, Commands, LogCommands, ReferenceCommands};
use crate::commands::common::resolve_db_path;
use crate::commands::connection::run_connection;
use crate::commands::import::run_import;
use crate::commands::log::run_log_list;
use crate::commands::reference::run_reference_load;
use crate::commands::sync::run_sync;
use crate::error::CliError;

fn main() {
    if let Err(error) = run() {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "erpsync=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let connection = cli.connection.as_deref();

    match cli.command {
        Commands::Connection { command } => run_connection(command, connection)?,
        Commands::Reference {
            command: ReferenceCommands::Load { path },
        } => run_reference_load(&path, &resolve_db_path(cli.db_path)?)?,
        Commands::Sync { command } => {
            run_sync(command, connection, &resolve_db_path(cli.db_path)?)?;
        }
        Commands::Import { command } => run_import(command, &resolve_db_path(cli.db_path)?)?,
        Commands::Log {
            command: LogCommands::List { limit, run, json },
        } => run_log_list(limit, run.as_deref(), json, &resolve_db_path(cli.db_path)?)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests;
