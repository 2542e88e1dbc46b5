use erpsync_core::rpc::{ConnectionReport, JsonRpcConnector};
use serde::Serialize;

use crate::cli::{ConnectionCommands, SettingsArgs};
use crate::commands::common::{load_config, print_json, resolve_endpoint};
use crate::connections::{normalize_connection_name, ConnectionsConfig, SavedConnection};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct ConnectionListItem {
    pub name: String,
    pub active: bool,
    pub url: String,
    pub database: String,
    pub user: String,
    pub version: u32,
}

pub fn run_connection(
    command: ConnectionCommands,
    global_connection: Option<&str>,
) -> Result<(), CliError> {
    match command {
        ConnectionCommands::Add {
            name,
            host,
            port,
            database,
            user,
            password,
            version,
            no_activate,
        } => {
            let saved = SavedConnection {
                host,
                port,
                database,
                user,
                password,
                version,
            };
            run_connection_add(&name, saved, no_activate)
        }
        ConnectionCommands::List { json } => run_connection_list(json),
        ConnectionCommands::Remove { name } => run_connection_remove(&name),
        ConnectionCommands::Test { name, json } => {
            run_connection_test(name.as_deref().or(global_connection), json)
        }
        ConnectionCommands::Use { name } => run_connection_use(&name),
        ConnectionCommands::Settings(args) => run_connection_settings(&args),
    }
}

pub fn run_connection_add(
    name: &str,
    saved: SavedConnection,
    no_activate: bool,
) -> Result<(), CliError> {
    let name = normalize_connection_name(Some(name))
        .ok_or_else(|| CliError::Config("Connection name cannot be empty".into()))?;
    if saved.host.trim().is_empty() || saved.database.trim().is_empty() {
        return Err(CliError::Config("Host and database are required".into()));
    }

    let mut config = load_config()?;
    let replaced = config.connections.insert(name.clone(), saved).is_some();
    if !no_activate {
        config.active_connection = Some(name.clone());
    }
    let path = config.save().map_err(CliError::Config)?;

    let verb = if replaced { "Updated" } else { "Added" };
    println!("{verb} connection '{name}' in {}", path.display());
    Ok(())
}

pub fn connection_items(config: &ConnectionsConfig) -> Vec<ConnectionListItem> {
    config
        .connections
        .iter()
        .filter_map(|(name, _)| config.endpoint(name))
        .map(|endpoint| ConnectionListItem {
            active: config.active_connection.as_deref() == Some(endpoint.name.as_str()),
            url: endpoint.base_url(),
            database: endpoint.database,
            user: endpoint.user,
            version: endpoint.version,
            name: endpoint.name,
        })
        .collect()
}

pub fn run_connection_list(as_json: bool) -> Result<(), CliError> {
    let config = load_config()?;
    let items = connection_items(&config);

    if as_json {
        return print_json(&items);
    }
    if items.is_empty() {
        println!("No connections saved. Add one with `erpsync connection add`.");
        return Ok(());
    }
    for item in &items {
        let marker = if item.active { "*" } else { " " };
        println!(
            "{marker} {}  {}  db={}  user={}  v{}",
            item.name, item.url, item.database, item.user, item.version
        );
    }
    Ok(())
}

pub fn run_connection_remove(name: &str) -> Result<(), CliError> {
    let mut config = load_config()?;
    if config.connections.remove(name).is_none() {
        return Err(CliError::ConnectionNotFound(name.to_string()));
    }
    if config.active_connection.as_deref() == Some(name) {
        config.active_connection = None;
    }
    config.save().map_err(CliError::Config)?;
    println!("Removed connection '{name}'");
    Ok(())
}

pub fn run_connection_use(name: &str) -> Result<(), CliError> {
    let mut config = load_config()?;
    if !config.connections.contains_key(name) {
        return Err(CliError::ConnectionNotFound(name.to_string()));
    }
    config.active_connection = Some(name.to_string());
    config.save().map_err(CliError::Config)?;
    println!("Active connection: {name}");
    Ok(())
}

pub fn format_connection_report(report: &ConnectionReport) -> Vec<String> {
    let check = |ok: bool| if ok { "ok" } else { "failed" };
    let mut lines = vec![format!(
        "connection:     {}{}",
        check(report.connection),
        report
            .version
            .as_deref()
            .map_or_else(String::new, |version| format!(" (server {version})"))
    )];
    if report.connection {
        lines.push(format!(
            "authentication: {}{}",
            check(report.authentication),
            report
                .user_id
                .map_or_else(String::new, |uid| format!(" (uid {uid})"))
        ));
    }
    if report.authentication {
        lines.push(format!("basic read:     {}", check(report.basic_read)));
    }
    if let Some(error) = &report.error {
        lines.push(format!("error: {error}"));
    }
    lines
}

pub fn run_connection_test(name: Option<&str>, as_json: bool) -> Result<(), CliError> {
    let config = load_config()?;
    let endpoint = resolve_endpoint(&config, name)?;
    let connector = JsonRpcConnector::from_settings(&config.settings);
    let report = connector.test_connection(&endpoint);

    if as_json {
        print_json(&report)?;
    } else {
        println!("Testing '{}' at {}", endpoint.name, endpoint.base_url());
        for line in format_connection_report(&report) {
            println!("{line}");
        }
    }

    if report.is_ok() {
        Ok(())
    } else {
        Err(CliError::ConnectionTest(
            report.error.unwrap_or_else(|| "unknown failure".into()),
        ))
    }
}

pub fn apply_settings(config: &mut ConnectionsConfig, args: &SettingsArgs) -> bool {
    let settings = &mut config.settings;
    let before = settings.clone();
    if let Some(chunk_size) = args.chunk_size {
        settings.chunk_size = chunk_size;
    }
    if let Some(timeout) = args.timeout {
        settings.request_timeout_secs = timeout;
    }
    if args.default_tax.is_some() {
        settings.default_tax_id = args.default_tax;
    }
    if args.company.is_some() {
        settings.company_id = args.company;
    }
    if args.local_company.is_some() {
        settings.local_company_id = args.local_company;
    }
    if args.location.is_some() {
        settings.location_id = args.location;
    }
    *settings != before
}

pub fn run_connection_settings(args: &SettingsArgs) -> Result<(), CliError> {
    let mut config = load_config()?;
    if apply_settings(&mut config, args) {
        config.settings.validate()?;
        let path = config.save().map_err(CliError::Config)?;
        println!("Saved settings to {}", path.display());
    }

    if args.json {
        return print_json(&config.settings);
    }
    let settings = &config.settings;
    let show = |value: Option<i64>| value.map_or_else(|| "-".to_string(), |id| id.to_string());
    println!("chunk size:      {}", settings.chunk_size);
    println!("request timeout: {}s", settings.request_timeout_secs);
    println!("default tax:     {}", show(settings.default_tax_id));
    println!("remote company:  {}", show(settings.company_id));
    println!("local company:   {}", show(settings.local_company_id));
    println!("location:        {}", show(settings.location_id));
    Ok(())
}
