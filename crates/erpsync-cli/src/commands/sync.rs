use std::path::Path;

use erpsync_core::config::SyncSettings;
use erpsync_core::models::{RecordKind, SourceVersion};
use erpsync_core::rpc::JsonRpcConnector;
use erpsync_core::sync::{RepairReport, SyncEngine, SyncOptions, SyncReport};

use crate::cli::{DocumentKind, SyncArgs, SyncCommands};
use crate::commands::common::{load_config, open_database, print_json, resolve_endpoint};
use crate::error::CliError;

/// Run options from persisted settings, overridden by command-line flags
pub fn build_options(
    kind: RecordKind,
    version: SourceVersion,
    settings: &SyncSettings,
    args: &SyncArgs,
) -> SyncOptions {
    let mut options = SyncOptions::new(kind, version).with_settings(settings);
    if let Some(from) = args.from {
        options.date_from = from;
    }
    if let Some(to) = args.to {
        options.date_to = to;
    }
    if let Some(name) = &args.name {
        options.name_filter = erpsync_core::util::normalize_text_option(Some(name.clone()));
    }
    if let Some(chunk_size) = args.chunk_size {
        options.chunk_size = chunk_size;
    }
    if args.company.is_some() {
        options.company_id = args.company;
    }
    options.limit = args.limit;
    options.start_id = args.start_id;
    options.end_id = args.end_id;
    options
}

pub fn format_sync_report(report: &SyncReport) -> Vec<String> {
    let mut lines = vec![format!("Run {}: {}", report.run_id, report.summary())];
    lines.extend(
        report
            .skipped
            .iter()
            .map(|skipped| format!("  skipped {} ({}): {}", skipped.name, skipped.remote_id, skipped.reason)),
    );
    lines
}

pub fn run_sync(
    command: SyncCommands,
    connection: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let config = load_config()?;
    let endpoint = resolve_endpoint(&config, connection)?;
    let version = endpoint.source_version();
    let connector = JsonRpcConnector::from_settings(&config.settings);
    let mut db = open_database(db_path)?;
    let mut engine = SyncEngine::new(&connector, &endpoint, &mut db);

    tracing::info!("Using connection '{}' ({version})", endpoint.name);

    let (kind, args) = match command {
        SyncCommands::Invoice(args) => (RecordKind::Invoice, args),
        SyncCommands::CreditNote(args) => (RecordKind::CreditNote, args),
        SyncCommands::SaleOrder(args) => (RecordKind::SaleOrder, args),
        SyncCommands::Partner(args) => (RecordKind::Partner, args),
        SyncCommands::Product(args) => (RecordKind::Product, args),
        SyncCommands::EcommerceProduct(args) => (RecordKind::EcommerceProduct, args),
        SyncCommands::Lot(args) => (RecordKind::Lot, args),
        SyncCommands::RefreshProducts(args) => {
            let options = build_options(RecordKind::Product, version, &config.settings, &args);
            let report = engine.refresh_products(&options)?;
            if args.json {
                return print_json(&report);
            }
            println!(
                "Run {}: {} imported product(s), {} updated, {} missing remotely in {} chunk(s)",
                report.run_id, report.found, report.updated, report.missing, report.chunks
            );
            return Ok(());
        }
        SyncCommands::Repair { documents, args } => {
            let kinds = documents.map_or_else(
                || DocumentKind::for_version(version),
                |documents| vec![documents],
            );
            let mut total = RepairReport::default();
            for document in kinds {
                let options =
                    build_options(document.record_kind(), version, &config.settings, &args);
                let report = engine.repair(&options)?;
                total.checked += report.checked;
                total.posted += report.posted;
                total.settled += report.settled;
            }
            if args.json {
                return print_json(&total);
            }
            println!(
                "Checked {} unfinished import(s): {} posted, {} settled",
                total.checked, total.posted, total.settled
            );
            return Ok(());
        }
    };

    let options = build_options(kind, version, &config.settings, &args);
    let report = engine.run(&options)?;
    if args.json {
        return print_json(&report);
    }
    for line in format_sync_report(&report) {
        println!("{line}");
    }
    Ok(())
}
