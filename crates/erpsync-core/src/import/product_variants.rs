//! Product template and variant import
//!
//! Sheet columns: name, article id, minicode, default code, price, cost,
//! attributes, attribute values, barcode. Attributes and values are comma
//! separated lists matched by position; a value may carry an `@price`
//! suffix, which is dropped. Consecutive rows with the same name share one
//! template.

use rusqlite::Connection;

use super::{cell, data_rows, is_blank, parse_number, record_failure, ImportReport};
use crate::db::{
    CatalogRepository, Database, ProductRepository, SqliteCatalogRepository,
    SqliteProductRepository,
};
use crate::error::{Error, Result};
use crate::models::{NewProduct, ProductType, ProductUpdate};
use crate::util::non_empty;

const NAME: usize = 0;
const ID_ARTICULO: usize = 1;
const MINICODE: usize = 2;
const DEFAULT_CODE: usize = 3;
const LIST_PRICE: usize = 4;
const STANDARD_PRICE: usize = 5;
const ATTRIBUTES: usize = 6;
const VALUES: usize = 7;
const BARCODE: usize = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProductVariantOptions {
    pub company_id: Option<i64>,
}

/// Upsert templates by name and create the variant each row describes
pub fn import_product_variants(
    db: &mut Database,
    rows: &[Vec<String>],
    options: &ProductVariantOptions,
) -> Result<ImportReport> {
    let report = db.transaction(|tx| {
        let mut report = ImportReport::default();
        let mut template: Option<(String, i64)> = None;

        for (number, row) in data_rows(rows) {
            if is_blank(row) {
                continue;
            }
            let Some(name) = non_empty(cell(row, NAME)) else {
                report.skip(number, "description is empty");
                continue;
            };
            let template_id = match template.as_ref() {
                Some((current, id)) if current == name => *id,
                _ => match upsert_template(tx, number, name, row, options) {
                    Ok(id) => {
                        template = Some((name.to_string(), id));
                        id
                    }
                    Err(error) => {
                        record_failure(&mut report, number, error)?;
                        continue;
                    }
                },
            };
            match import_variant(tx, number, template_id, row) {
                Ok(()) => report.completed += 1,
                Err(error) => record_failure(&mut report, number, error)?,
            }
        }
        Ok(report)
    })?;

    tracing::info!(
        "Product variant import: {} row(s) synced, {} skipped",
        report.completed,
        report.skipped.len()
    );
    Ok(report)
}

fn text(row: &[String], column: usize) -> Option<String> {
    non_empty(cell(row, column)).map(str::to_string)
}

fn price(number: usize, row: &[String], column: usize, label: &str) -> Result<Option<f64>> {
    non_empty(cell(row, column))
        .map(|value| parse_number(number, label, value))
        .transpose()
}

fn upsert_template(
    conn: &Connection,
    number: usize,
    name: &str,
    row: &[String],
    options: &ProductVariantOptions,
) -> Result<i64> {
    let list_price = price(number, row, LIST_PRICE, "price")?;
    let standard_price = price(number, row, STANDARD_PRICE, "cost")?;
    let products = SqliteProductRepository::new(conn);

    if let Some(id) = products.find_template(name)? {
        products.update(
            id,
            &ProductUpdate {
                id_articulo: text(row, ID_ARTICULO),
                minicode: text(row, MINICODE),
                default_code: text(row, DEFAULT_CODE),
                barcode: text(row, BARCODE),
                list_price,
                standard_price,
                detailed_type: Some(ProductType::Product),
                company_id: options.company_id,
                ..ProductUpdate::default()
            },
        )?;
        return Ok(id);
    }

    let id = products.create(&NewProduct {
        id_articulo: text(row, ID_ARTICULO),
        minicode: text(row, MINICODE),
        default_code: text(row, DEFAULT_CODE),
        barcode: text(row, BARCODE),
        list_price: list_price.unwrap_or_default(),
        standard_price: standard_price.unwrap_or_default(),
        detailed_type: ProductType::Product,
        company_id: options.company_id,
        ..NewProduct::named(name)
    })?;
    tracing::debug!("Created template {name} ({id})");
    Ok(id)
}

/// Non-empty entries of a comma separated cell, `@price` suffixes dropped
fn split_list(value: &str) -> Vec<&str> {
    value
        .split(',')
        .filter_map(|entry| non_empty(entry.split('@').next().unwrap_or_default()))
        .collect()
}

fn import_variant(conn: &Connection, number: usize, template_id: i64, row: &[String]) -> Result<()> {
    let attributes = split_list(cell(row, ATTRIBUTES));
    let values = split_list(cell(row, VALUES));
    if attributes.is_empty() || values.is_empty() {
        return Ok(());
    }
    if attributes.len() != values.len() {
        return Err(Error::row_format(
            number,
            format!(
                "number of attributes ({}) and values ({}) differs",
                attributes.len(),
                values.len()
            ),
        ));
    }

    let catalog = SqliteCatalogRepository::new(conn);
    let mut value_ids = Vec::with_capacity(values.len());
    for (attribute, value) in attributes.iter().zip(&values) {
        let attribute_id = catalog.ensure_attribute(attribute)?;
        value_ids.push(catalog.ensure_value(attribute_id, value)?);
    }

    let variant_id = match catalog.find_variant(template_id, &value_ids)? {
        Some(id) => id,
        None => catalog.create_variant(template_id, &value_ids)?,
    };

    let update = ProductUpdate {
        id_articulo: text(row, ID_ARTICULO),
        minicode: text(row, MINICODE),
        default_code: text(row, DEFAULT_CODE),
        ..ProductUpdate::default()
    };
    if !update.is_empty() {
        SqliteProductRepository::new(conn).update(variant_id, &update)?;
    }
    tracing::debug!("Row {number}: variant {variant_id} of template {template_id}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::sheet;
    use pretty_assertions::assert_eq;

    const HEADER: &[&str] = &[
        "name", "id_articulo", "minicode", "code", "price", "cost", "attributes", "values", "barcode",
    ];

    fn import(db: &mut Database, rows: &[&[&str]]) -> ImportReport {
        let mut all = vec![HEADER];
        all.extend_from_slice(rows);
        import_product_variants(db, &sheet(&all), &ProductVariantOptions { company_id: Some(1) })
            .unwrap()
    }

    #[test]
    fn rows_build_one_template_with_variants() {
        let mut db = Database::open_in_memory().unwrap();

        let report = import(
            &mut db,
            &[
                &["POLO", "A1", "P1", "POL-RM", "35", "20", "Color, Talla", "Rojo, M@5", "775001"],
                &["POLO", "A2", "P2", "POL-AM", "", "", "Color,Talla", "Azul,M", ""],
                &["POLO", "", "", "", "", "", "Color,Talla", "Rojo,M", ""],
            ],
        );
        assert_eq!(report.completed, 3);
        assert!(report.skipped.is_empty());

        let conn = db.connection();
        let products = SqliteProductRepository::new(conn);
        let catalog = SqliteCatalogRepository::new(conn);
        let template_id = products.find_template("POLO").unwrap().unwrap();
        let template = products.get(template_id).unwrap().unwrap();
        assert_eq!(template.detailed_type, ProductType::Product);
        assert_eq!(template.company_id, Some(1));
        assert_eq!(template.barcode.as_deref(), Some("775001"));
        assert!((template.list_price - 35.0).abs() < f64::EPSILON);

        // the third row matches the first variant instead of adding one
        let variants = catalog.variants(template_id).unwrap();
        assert_eq!(variants.len(), 2);
        let red = products.get(variants[0]).unwrap().unwrap();
        assert_eq!(red.id_articulo.as_deref(), Some("A1"));
        assert_eq!(red.minicode.as_deref(), Some("P1"));
        assert_eq!(red.default_code.as_deref(), Some("POL-RM"));
        assert_eq!(
            catalog.product_values(red.id).unwrap(),
            vec![("Color".to_string(), "Rojo".to_string()), ("Talla".to_string(), "M".to_string())]
        );
        let blue = products.get(variants[1]).unwrap().unwrap();
        assert_eq!(blue.default_code.as_deref(), Some("POL-AM"));
    }

    #[test]
    fn existing_template_is_updated_by_name() {
        let mut db = Database::open_in_memory().unwrap();
        let existing = SqliteProductRepository::new(db.connection())
            .create(&NewProduct {
                list_price: 10.0,
                ..NewProduct::named("GORRA")
            })
            .unwrap();

        import(&mut db, &[&["GORRA", "", "G1", "", "12.5", "", "", "", ""]]);

        let products = SqliteProductRepository::new(db.connection());
        assert_eq!(products.count().unwrap(), 1);
        let updated = products.get(existing).unwrap().unwrap();
        assert_eq!(updated.minicode.as_deref(), Some("G1"));
        assert!((updated.list_price - 12.5).abs() < f64::EPSILON);
    }

    #[test]
    fn bad_rows_are_reported() {
        let mut db = Database::open_in_memory().unwrap();

        let report = import(
            &mut db,
            &[
                &["", "A1", "", "", "", "", "", "", ""],
                &["CASACA", "", "", "", "", "", "Color,Talla", "Negro", ""],
                &["MEDIAS", "", "", "", "barato", "", "", "", ""],
                &["CASACA", "", "", "", "", "", "Color", "Negro", ""],
            ],
        );

        assert_eq!(report.completed, 1);
        assert_eq!(report.skipped[&2], "description is empty");
        assert_eq!(report.skipped[&3], "number of attributes (2) and values (1) differs");
        assert_eq!(report.skipped[&4], "invalid price 'barato'");

        let conn = db.connection();
        let products = SqliteProductRepository::new(conn);
        assert_eq!(products.find_template("MEDIAS").unwrap(), None);
        // no attribute is created for the mismatched row
        assert_eq!(SqliteCatalogRepository::new(conn).find_attribute("Talla").unwrap(), None);
        let casaca = products.find_template("CASACA").unwrap().unwrap();
        assert_eq!(SqliteCatalogRepository::new(conn).variants(casaca).unwrap().len(), 1);
    }

    #[test]
    fn split_list_drops_prices_and_blanks() {
        assert_eq!(split_list(" Rojo@5, ,M "), vec!["Rojo", "M"]);
        assert!(split_list("").is_empty());
    }
}
