use std::path::Path;

use erpsync_core::import::{
    import_inventory, import_product_variants, import_products, import_variants, InventoryOptions,
    ProductImportOptions, ProductVariantOptions, VariantOptions,
};

use crate::cli::{ImportCommands, UpdateField};
use crate::commands::common::{open_database, print_import_report, read_workbook};
use crate::error::CliError;

pub fn run_import(command: ImportCommands, db_path: &Path) -> Result<(), CliError> {
    let mut db = open_database(db_path)?;

    match command {
        ImportCommands::Inventory {
            file,
            lookup,
            location,
            company,
            no_serials,
        } => {
            let rows = read_workbook(&file)?;
            let options = InventoryOptions {
                lookup,
                company_id: company,
                serial_lots: !no_serials,
                ..InventoryOptions::new(location)
            };
            let report = import_inventory(&mut db, &rows, &options)?;
            print_import_report(&report, file.json)
        }
        ImportCommands::Variants {
            file,
            location,
            company,
        } => {
            let rows = read_workbook(&file)?;
            let options = VariantOptions {
                location_id: location,
                company_id: company,
            };
            let report = import_variants(&mut db, &rows, &options)?;
            print_import_report(&report, file.json)
        }
        ImportCommands::ProductVariants { file, company } => {
            let rows = read_workbook(&file)?;
            let options = ProductVariantOptions { company_id: company };
            let report = import_product_variants(&mut db, &rows, &options)?;
            print_import_report(&report, file.json)
        }
        ImportCommands::Products {
            file,
            lookup,
            update,
            company,
        } => {
            let rows = read_workbook(&file)?;
            let options = ProductImportOptions {
                lookup,
                update: update.as_deref().map(UpdateField::collect),
                company_id: company,
            };
            let report = import_products(&mut db, &rows, &options)?;
            print_import_report(&report, file.json)
        }
    }
}
