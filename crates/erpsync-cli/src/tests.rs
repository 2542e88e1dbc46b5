use chrono::NaiveDate;
use clap::{CommandFactory, Parser};
use erpsync_core::config::SyncSettings;
use erpsync_core::db::{Database, RefTable, ReferenceRepository, SqliteReferenceRepository};
use erpsync_core::import::ProductLookup;
use erpsync_core::models::{RecordKind, SourceVersion, SyncLogEntry};
use erpsync_core::rpc::ConnectionReport;
use erpsync_core::sync::{SkippedRecord, SyncReport};
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::cli::{
    Cli, Commands, DocumentKind, ImportCommands, SettingsArgs, SyncArgs, SyncCommands,
    UpdateField,
};
use crate::commands::common::{format_log_lines, log_to_item, read_workbook, resolve_db_path};
use crate::commands::connection::{apply_settings, connection_items, format_connection_report};
use crate::commands::reference::run_reference_load;
use crate::commands::sync::{build_options, format_sync_report};
use crate::connections::{ConnectionsConfig, SavedConnection};
use crate::error::CliError;

fn date(text: &str) -> NaiveDate {
    text.parse().unwrap()
}

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn sync_flags_parse_into_args() {
    let cli = Cli::try_parse_from([
        "erpsync",
        "sync",
        "credit-note",
        "--from",
        "2024-05-01",
        "--to",
        "2024-05-31",
        "--name",
        "FC01",
        "--limit",
        "5",
        "--connection",
        "legacy",
    ])
    .unwrap();

    assert_eq!(cli.connection.as_deref(), Some("legacy"));
    let Commands::Sync {
        command: SyncCommands::CreditNote(args),
    } = cli.command
    else {
        panic!("expected a credit note sync");
    };
    assert_eq!(args.from, Some(date("2024-05-01")));
    assert_eq!(args.to, Some(date("2024-05-31")));
    assert_eq!(args.name.as_deref(), Some("FC01"));
    assert_eq!(args.limit, Some(5));
}

#[test]
fn build_options_layers_flags_over_settings() {
    let settings = SyncSettings {
        chunk_size: 50,
        default_tax_id: Some(1),
        company_id: Some(2),
        local_company_id: Some(3),
        location_id: Some(8),
        ..SyncSettings::default()
    };
    let args = SyncArgs {
        from: Some(date("2024-01-01")),
        to: Some(date("2024-01-31")),
        name: Some("  ".into()),
        chunk_size: Some(10),
        ..SyncArgs::default()
    };

    let options = build_options(RecordKind::Invoice, SourceVersion::V13, &settings, &args);

    assert_eq!(options.date_from, date("2024-01-01"));
    assert_eq!(options.date_to, date("2024-01-31"));
    assert_eq!(options.name_filter, None);
    assert_eq!(options.chunk_size, 10);
    assert_eq!(options.company_id, Some(2));
    assert_eq!(options.default_tax_id, Some(1));
    assert_eq!(options.local_company_id, Some(3));
    assert_eq!(options.location_id, Some(8));
}

#[test]
fn build_options_keeps_kind_defaults() {
    let options = build_options(
        RecordKind::Invoice,
        SourceVersion::V11,
        &SyncSettings::default(),
        &SyncArgs::default(),
    );
    assert_eq!(options.name_filter.as_deref(), Some("F"));
    assert_eq!(options.chunk_size, 30);
    assert_eq!(options.limit, None);
}

#[test]
fn product_import_update_fields_parse() {
    let cli = Cli::try_parse_from([
        "erpsync",
        "import",
        "products",
        "catalog.xlsx",
        "--lookup",
        "minicode",
        "--update",
        "price,default-code",
    ])
    .unwrap();
    let Commands::Import {
        command: ImportCommands::Products { lookup, update, .. },
    } = cli.command
    else {
        panic!("expected a products import");
    };
    assert_eq!(lookup, ProductLookup::Minicode);
    let fields = UpdateField::collect(&update.unwrap());
    assert!(fields.price && fields.default_code);
    assert!(!fields.name && !fields.tracking);

    let cli = Cli::try_parse_from(["erpsync", "import", "products", "catalog.xlsx", "--update"])
        .unwrap();
    let Commands::Import {
        command: ImportCommands::Products { update, .. },
    } = cli.command
    else {
        panic!("expected a products import");
    };
    assert_eq!(update, Some(Vec::new()));
}

#[test]
fn inventory_import_requires_location() {
    assert!(Cli::try_parse_from(["erpsync", "import", "inventory", "count.xlsx"]).is_err());
    assert!(
        Cli::try_parse_from(["erpsync", "import", "inventory", "count.xlsx", "--location", "8"])
            .is_ok()
    );
}

#[test]
fn explicit_db_path_wins() {
    let path = resolve_db_path(Some("/tmp/erpsync-test.db".into())).unwrap();
    assert_eq!(path.to_string_lossy(), "/tmp/erpsync-test.db");
}

#[test]
fn connection_items_mark_active() {
    let mut config = ConnectionsConfig {
        active_connection: Some("new".into()),
        ..ConnectionsConfig::default()
    };
    for name in ["legacy", "new"] {
        config.connections.insert(
            name.into(),
            SavedConnection {
                host: "erp.example.com".into(),
                port: 8069,
                database: "prod".into(),
                user: "admin".into(),
                password: "secret".into(),
                version: if name == "new" { 17 } else { 11 },
            },
        );
    }

    let items = connection_items(&config);
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].name, "legacy");
    assert!(!items[0].active);
    assert!(items[1].active);
    assert_eq!(items[1].url, "http://erp.example.com:8069");
    assert_eq!(items[1].version, 17);
}

#[test]
fn apply_settings_reports_changes() {
    let mut config = ConnectionsConfig::default();
    assert!(!apply_settings(&mut config, &SettingsArgs::default()));

    let args = SettingsArgs {
        chunk_size: Some(15),
        location: Some(12),
        ..SettingsArgs::default()
    };
    assert!(apply_settings(&mut config, &args));
    assert_eq!(config.settings.chunk_size, 15);
    assert_eq!(config.settings.location_id, Some(12));
    assert!(!apply_settings(&mut config, &args));
}

#[test]
fn connection_report_stops_at_first_failure() {
    let report = ConnectionReport {
        connection: true,
        version: Some("13.0".into()),
        error: Some("Authentication failed: denied".into()),
        ..ConnectionReport::default()
    };
    assert_eq!(
        format_connection_report(&report),
        vec![
            "connection:     ok (server 13.0)".to_string(),
            "authentication: failed".to_string(),
            "error: Authentication failed: denied".to_string(),
        ]
    );
}

#[test]
fn sync_report_lists_skipped_records() {
    let report = SyncReport {
        run_id: "run-1".into(),
        found: 3,
        already_imported: 1,
        created: 1,
        skipped: vec![SkippedRecord {
            remote_id: 9,
            name: "F009-00000001".into(),
            reason: "journal not found: F009".into(),
        }],
        chunks: 1,
    };

    let lines = format_sync_report(&report);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("Run run-1: found 3"));
    assert_eq!(lines[1], "  skipped F009-00000001 (9): journal not found: F009");
}

#[test]
fn log_lines_show_skip_reasons() {
    let imported = SyncLogEntry::new(
        "0190a1b2-c3d4-7000-8000-000000000000",
        "legacy",
        "account.move",
        Some(7),
        "F001-00000007",
        json!({"name": "F001-00000007"}),
    );
    let skipped = SyncLogEntry::new(
        "0190a1b2-c3d4-7000-8000-000000000000",
        "legacy",
        "account.move",
        Some(9),
        "F009-00000001",
        json!({"skipped": "journal not found: F009"}),
    );

    let lines = format_log_lines(&[imported.clone(), skipped.clone()]);
    assert!(lines[0].contains("0190a1b2-c3d4"));
    assert!(lines[0].ends_with("imported"));
    assert!(lines[1].ends_with("skipped: journal not found: F009"));

    assert_eq!(log_to_item(&imported).skipped, None);
    assert_eq!(
        log_to_item(&skipped).skipped.as_deref(),
        Some("journal not found: F009")
    );
}

#[test]
fn reference_load_seeds_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let seed = dir.path().join("reference.json");
    let db_path = dir.path().join("data").join("erpsync.db");
    std::fs::write(
        &seed,
        r#"{"currencies": ["PEN", "USD"], "payment_terms": ["Contado"]}"#,
    )
    .unwrap();

    run_reference_load(&seed, &db_path).unwrap();
    run_reference_load(&seed, &db_path).unwrap();

    let db = Database::open(&db_path).unwrap();
    let references = SqliteReferenceRepository::new(db.connection());
    assert_eq!(references.list(RefTable::Currency).unwrap().len(), 2);
    assert_eq!(references.list(RefTable::PaymentTerm).unwrap().len(), 1);
}

#[test]
fn receipt_and_shop_syncs_parse() {
    let cli = Cli::try_parse_from(["erpsync", "sync", "sale-order", "--from", "2024-05-01"]).unwrap();
    let Commands::Sync {
        command: SyncCommands::SaleOrder(args),
    } = cli.command
    else {
        panic!("expected a sale order sync");
    };
    assert_eq!(args.from, Some(date("2024-05-01")));
    let options = build_options(RecordKind::SaleOrder, SourceVersion::V11, &SyncSettings::default(), &args);
    assert_eq!(options.name_filter.as_deref(), Some("B"));

    let cli = Cli::try_parse_from(["erpsync", "sync", "ecommerce-product", "--company", "2"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Sync {
            command: SyncCommands::EcommerceProduct(_)
        }
    ));
}

#[test]
fn repair_covers_receipts_on_legacy_instances() {
    assert_eq!(
        DocumentKind::for_version(SourceVersion::V11),
        vec![DocumentKind::Invoice, DocumentKind::CreditNote, DocumentKind::SaleOrder]
    );
    assert!(!DocumentKind::for_version(SourceVersion::V13).contains(&DocumentKind::SaleOrder));
}

#[test]
fn product_variants_import_parses() {
    let cli = Cli::try_parse_from([
        "erpsync",
        "import",
        "product-variants",
        "catalog.xlsx",
        "--company",
        "1",
        "--json",
    ])
    .unwrap();
    let Commands::Import {
        command: ImportCommands::ProductVariants { file, company },
    } = cli.command
    else {
        panic!("expected a product variants import");
    };
    assert_eq!(company, Some(1));
    assert!(file.json);
    assert_eq!(file.path, std::path::PathBuf::from("catalog.xlsx"));
}

#[test]
fn missing_workbook_is_an_io_error() {
    let cli = Cli::try_parse_from([
        "erpsync",
        "import",
        "variants",
        "/nonexistent/erpsync/sheet.xlsx",
        "--location",
        "8",
    ])
    .unwrap();
    let Commands::Import {
        command: ImportCommands::Variants { file, .. },
    } = cli.command
    else {
        panic!("expected a variants import");
    };
    assert!(matches!(read_workbook(&file), Err(CliError::Io(_))));
}
