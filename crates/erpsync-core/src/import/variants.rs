//! Variant stock import
//!
//! Reads the description, attribute, attribute value and quantity columns of
//! a variant count sheet. Any invalid row rejects the whole sheet.

use rusqlite::Connection;

use super::{cell, data_rows, ImportReport};
use crate::db::{CatalogRepository, Database, SqliteCatalogRepository, SqliteStockRepository, StockRepository};
use crate::error::{Error, Result};
use crate::util::non_empty;

const DESCRIPTION: usize = 0;
const ATTRIBUTE: usize = 6;
const VALUE: usize = 7;
const QUANTITY: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantOptions {
    pub location_id: i64,
    pub company_id: Option<i64>,
}

pub fn import_variants(
    db: &mut Database,
    rows: &[Vec<String>],
    options: &VariantOptions,
) -> Result<ImportReport> {
    let report = db.transaction(|tx| {
        let mut report = ImportReport::default();
        let mut errors = Vec::new();

        for (number, row) in data_rows(rows) {
            let Some(name) = non_empty(cell(row, DESCRIPTION)) else {
                report.skip(number, "description is empty");
                continue;
            };
            match import_row(tx, number, name, row, options)? {
                Ok(()) => report.completed += 1,
                Err(message) => errors.push(message),
            }
        }

        if errors.is_empty() {
            Ok(report)
        } else {
            Err(Error::Validation(format!(
                "Import finished with errors:\n\n{}",
                errors.join("\n")
            )))
        }
    })?;

    tracing::info!("Variant import: {} row(s) counted", report.completed);
    Ok(report)
}

/// Store errors propagate; row problems come back as the inner `Err`
fn import_row(
    conn: &Connection,
    number: usize,
    name: &str,
    row: &[String],
    options: &VariantOptions,
) -> Result<std::result::Result<(), String>> {
    let quantity_text = cell(row, QUANTITY).trim();
    let Ok(quantity) = quantity_text.parse::<f64>() else {
        return Ok(Err(format!(
            "Row {number}: invalid quantity '{quantity_text}' for '{name}'"
        )));
    };

    let (Some(attribute), Some(value)) = (non_empty(cell(row, ATTRIBUTE)), non_empty(cell(row, VALUE)))
    else {
        return Ok(Err(format!(
            "Row {number}: missing attribute or value for '{name}'"
        )));
    };

    let Some(variant_id) = SqliteCatalogRepository::new(conn).find_variant_by_value(name, attribute, value)? else {
        return Ok(Err(format!(
            "Row {number}: no variant of '{name}' with {attribute} = {value}"
        )));
    };

    SqliteStockRepository::new(conn).set_quantity(
        variant_id,
        options.location_id,
        None,
        options.company_id,
        quantity,
    )?;
    Ok(Ok(()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ProductRepository, SqliteProductRepository};
    use crate::import::{import_product_variants, sheet, ProductVariantOptions};
    use crate::models::NewProduct;
    use pretty_assertions::assert_eq;

    const OPTIONS: VariantOptions = VariantOptions {
        location_id: 8,
        company_id: Some(1),
    };

    fn setup() -> (Database, i64, i64) {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();
        let template = SqliteProductRepository::new(conn)
            .create(&NewProduct::named("POLO"))
            .unwrap();
        let catalog = SqliteCatalogRepository::new(conn);
        let color = catalog.ensure_attribute("Color").unwrap();
        let red = catalog
            .create_variant(template, &[catalog.ensure_value(color, "Rojo").unwrap()])
            .unwrap();
        let blue = catalog
            .create_variant(template, &[catalog.ensure_value(color, "Azul").unwrap()])
            .unwrap();
        (db, red, blue)
    }

    fn row(description: &str, attribute: &str, value: &str, quantity: &str) -> Vec<String> {
        let mut row = vec![String::new(); 10];
        row[DESCRIPTION] = description.into();
        row[ATTRIBUTE] = attribute.into();
        row[VALUE] = value.into();
        row[QUANTITY] = quantity.into();
        row
    }

    fn quantity(db: &Database, product_id: i64) -> Option<f64> {
        SqliteStockRepository::new(db.connection())
            .find_quant(product_id, 8, None)
            .unwrap()
            .map(|quant| quant.quantity)
    }

    #[test]
    fn variants_are_counted_by_attribute_value() {
        let (mut db, red, blue) = setup();
        let rows = vec![
            row("description", "attribute", "value", "quantity"),
            row("POLO", "Color", "Rojo", "3"),
            row("POLO", "Color", "Azul", "2.5"),
            row("", "", "", ""),
        ];

        let report = import_variants(&mut db, &rows, &OPTIONS).unwrap();

        assert_eq!(report.completed, 2);
        assert_eq!(report.skipped[&4], "description is empty");
        assert_eq!(quantity(&db, red), Some(3.0));
        assert_eq!(quantity(&db, blue), Some(2.5));
    }

    #[test]
    fn one_bad_row_rejects_the_sheet() {
        let (mut db, red, _) = setup();
        let rows = vec![
            row("description", "attribute", "value", "quantity"),
            row("POLO", "Color", "Rojo", "3"),
            row("POLO", "Color", "Verde", "1"),
            row("POLO", "Color", "Azul", "x"),
            row("POLO", "", "Azul", "1"),
        ];

        let err = import_variants(&mut db, &rows, &OPTIONS).unwrap_err();

        let message = match err {
            Error::Validation(message) => message,
            other => panic!("expected a validation error, got {other}"),
        };
        assert_eq!(
            message,
            "Import finished with errors:\n\n\
             Row 3: no variant of 'POLO' with Color = Verde\n\
             Row 4: invalid quantity 'x' for 'POLO'\n\
             Row 5: missing attribute or value for 'POLO'"
        );
        assert_eq!(quantity(&db, red), None);
    }

    #[test]
    fn variants_created_by_the_variant_sheet_are_counted() {
        let mut db = Database::open_in_memory().unwrap();
        let catalog = sheet(&[
            &["name", "id_articulo", "minicode", "code", "price", "cost", "attributes", "values", "barcode"],
            &["POLO", "A1", "P1", "POL-R", "35", "20", "Color", "Rojo", ""],
        ]);
        import_product_variants(&mut db, &catalog, &ProductVariantOptions::default()).unwrap();

        let rows = vec![
            row("description", "attribute", "value", "quantity"),
            row("POLO", "Color", "Rojo", "3"),
        ];
        let report = import_variants(&mut db, &rows, &OPTIONS).unwrap();

        assert_eq!(report.completed, 1);
        let variant = SqliteCatalogRepository::new(db.connection())
            .find_variant_by_value("POLO", "Color", "Rojo")
            .unwrap()
            .unwrap();
        assert_eq!(quantity(&db, variant), Some(3.0));
    }
}
