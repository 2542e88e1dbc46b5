//! Stock count import
//!
//! Sheet columns: name, quantity, serial, default code, minicode, barcode.

use rusqlite::Connection;

use super::{cell, data_rows, is_blank, parse_number, record_failure, ImportReport, ProductLookup};
use crate::db::{Database, ProductRepository, SqliteProductRepository, SqliteStockRepository, StockRepository};
use crate::error::{Error, Result};
use crate::models::{NewLot, Tracking};
use crate::util::non_empty;

const NAME: usize = 0;
const QUANTITY: usize = 1;
const LOT: usize = 2;
const DEFAULT_CODE: usize = 3;
const MINICODE: usize = 4;
const BARCODE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InventoryOptions {
    pub lookup: ProductLookup,
    pub location_id: i64,
    pub company_id: Option<i64>,
    /// Find or create the serial lot of serial-tracked products
    pub serial_lots: bool,
}

impl InventoryOptions {
    pub const fn new(location_id: i64) -> Self {
        Self {
            lookup: ProductLookup::Code,
            location_id,
            company_id: None,
            serial_lots: true,
        }
    }
}

/// Set on-hand quantities from a stock count sheet.
///
/// Rows whose product cannot be found or whose quantity is not a number are
/// reported and skipped; the rest are committed together.
pub fn import_inventory(
    db: &mut Database,
    rows: &[Vec<String>],
    options: &InventoryOptions,
) -> Result<ImportReport> {
    let report = db.transaction(|tx| {
        let mut report = ImportReport::default();
        for (number, row) in data_rows(rows) {
            if is_blank(row) {
                continue;
            }
            match import_row(tx, number, row, options) {
                Ok(()) => report.completed += 1,
                Err(error) => record_failure(&mut report, number, error)?,
            }
        }
        Ok(report)
    })?;

    tracing::info!(
        "Inventory import: {} row(s) counted, {} skipped",
        report.completed,
        report.skipped.len()
    );
    Ok(report)
}

fn find_product(conn: &Connection, number: usize, row: &[String], lookup: ProductLookup) -> Result<i64> {
    let column = match lookup {
        ProductLookup::Name => NAME,
        ProductLookup::Barcode => BARCODE,
        ProductLookup::Code => DEFAULT_CODE,
        ProductLookup::Minicode => MINICODE,
    };
    let value = cell(row, column).trim();
    if value.is_empty() {
        return Err(Error::row_format(number, format!("product not found: {lookup} is empty")));
    }

    let products = SqliteProductRepository::new(conn);
    let found = match lookup {
        ProductLookup::Name => products.find_by_name_like(value)?,
        ProductLookup::Barcode => products.find_by_barcode(value)?,
        ProductLookup::Code => products.find_by_default_code(value)?,
        ProductLookup::Minicode => products.find_by_minicode(value)?,
    };
    found.ok_or_else(|| Error::row_format(number, format!("product not found: {lookup} - {value}")))
}

fn import_row(conn: &Connection, number: usize, row: &[String], options: &InventoryOptions) -> Result<()> {
    let product_id = find_product(conn, number, row, options.lookup)?;
    let product = SqliteProductRepository::new(conn)
        .get(product_id)?
        .ok_or_else(|| Error::NotFound(format!("product {product_id}")))?;

    let quantity = match non_empty(cell(row, QUANTITY)) {
        Some(value) => parse_number(number, "quantity", value)?,
        None => 1.0,
    };

    let stock = SqliteStockRepository::new(conn);
    let serial = non_empty(cell(row, LOT)).filter(|_| options.serial_lots && product.tracking == Tracking::Serial);
    let lot_id = match serial {
        Some(name) => match stock.find_lot(name, product_id, options.company_id, None)? {
            Some(lot) => Some(lot.id),
            None => {
                let id = stock.create_lot(&NewLot {
                    name: name.to_string(),
                    product_id,
                    company_id: options.company_id,
                    location_id: Some(options.location_id),
                })?;
                tracing::debug!("Created lot {name} for {}", product.name);
                Some(id)
            }
        },
        None => None,
    };

    stock.set_quantity(product_id, options.location_id, lot_id, options.company_id, quantity)?;
    Ok(())
}
