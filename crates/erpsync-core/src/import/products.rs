//! Product catalog import
//!
//! Sheet columns: product, default code, minicode, serial flag, cost, price,
//! sale description, category, subcategory, technology, brand, public,
//! model, warranty, availability. Brand, public, warranty and availability
//! are read but not stored.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use super::{cell, data_rows, is_blank, parse_number, record_failure, ImportReport, ProductLookup};
use crate::db::{
    Database, ProductRepository, RefTable, ReferenceRepository, SqliteProductRepository,
    SqliteReferenceRepository,
};
use crate::error::{Error, Result};
use crate::models::{NewProduct, ProductType, ProductUpdate, Tracking};
use crate::util::non_empty;

const PRODUCT: usize = 0;
const DEFAULT_CODE: usize = 1;
const MINICODE: usize = 2;
const LOT: usize = 3;
const STANDARD_PRICE: usize = 4;
const LIST_PRICE: usize = 5;
const DESCRIPTION_SALE: usize = 6;
const CATEGORY: usize = 7;
const SUBCATEGORY: usize = 8;
const TECHNOLOGY: usize = 9;
const MODEL: usize = 12;

/// Columns written to products that already exist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateFields {
    pub name: bool,
    pub cost: bool,
    pub price: bool,
    pub category: bool,
    pub model: bool,
    pub minicode: bool,
    pub technology: bool,
    pub default_code: bool,
    pub description_sale: bool,
    pub tracking: bool,
}

impl UpdateFields {
    pub const fn is_empty(&self) -> bool {
        !(self.name
            || self.cost
            || self.price
            || self.category
            || self.model
            || self.minicode
            || self.technology
            || self.default_code
            || self.description_sale
            || self.tracking)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProductImportOptions {
    pub lookup: ProductLookup,
    /// Fields to refresh on existing products; `None` leaves them as they are
    pub update: Option<UpdateFields>,
    pub company_id: Option<i64>,
}

/// Create missing products and refresh existing ones from a catalog sheet.
///
/// Rows without a minicode are reported and skipped.
pub fn import_products(
    db: &mut Database,
    rows: &[Vec<String>],
    options: &ProductImportOptions,
) -> Result<ImportReport> {
    if options.update.is_some_and(|fields| fields.is_empty()) {
        return Err(Error::InvalidInput("select at least one field to update".into()));
    }
    if options.lookup == ProductLookup::Barcode {
        return Err(Error::InvalidInput(
            "the product sheet has no barcode column, choose another lookup".into(),
        ));
    }

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
        "Product import: {} row(s) synced, {} skipped",
        report.completed,
        report.skipped.len()
    );
    Ok(report)
}

fn import_row(conn: &Connection, number: usize, row: &[String], options: &ProductImportOptions) -> Result<()> {
    let Some(minicode) = non_empty(cell(row, MINICODE)) else {
        return Err(Error::row_format(number, "product minicode is empty"));
    };
    let products = SqliteProductRepository::new(conn);

    let existing = match options.lookup {
        ProductLookup::Minicode => match products.find_by_minicode(minicode)? {
            Some(id) => Some(id),
            None => match non_empty(cell(row, PRODUCT)) {
                Some(name) => {
                    let found = products.find_by_name(name)?;
                    if let Some(id) = found {
                        products.update(
                            id,
                            &ProductUpdate {
                                minicode: Some(minicode.to_string()),
                                ..ProductUpdate::default()
                            },
                        )?;
                    }
                    found
                }
                None => None,
            },
        },
        ProductLookup::Code => match non_empty(cell(row, DEFAULT_CODE)) {
            Some(code) => products.find_by_default_code(code)?,
            None => None,
        },
        ProductLookup::Name => match non_empty(cell(row, PRODUCT)) {
            Some(name) => products.find_by_name(name)?,
            None => None,
        },
        ProductLookup::Barcode => None,
    };

    match existing {
        Some(id) => update_product(conn, number, row, id, options.update.unwrap_or_default()),
        None if products.find_by_minicode(minicode)?.is_some() => Err(Error::row_format(
            number,
            format!("a product with minicode {minicode} already exists"),
        )),
        None => create_product(conn, number, row, minicode, options.company_id),
    }
}

/// Category, or its subcategory when the row names one
fn category(conn: &Connection, row: &[String]) -> Result<Option<i64>> {
    let Some(name) = non_empty(cell(row, CATEGORY)) else {
        return Ok(None);
    };
    let references = SqliteReferenceRepository::new(conn);
    let parent = match references.find_by_name(RefTable::Category, name, None)? {
        Some(id) => id,
        None => references.insert(RefTable::Category, name, None, None)?,
    };
    let Some(sub) = non_empty(cell(row, SUBCATEGORY)) else {
        return Ok(Some(parent));
    };
    let child = match references.find_by_name(RefTable::Category, sub, Some(parent))? {
        Some(id) => id,
        None => references.insert(RefTable::Category, sub, None, Some(parent))?,
    };
    Ok(Some(child))
}

fn optional_number(number: usize, row: &[String], column: usize, label: &str) -> Result<Option<f64>> {
    non_empty(cell(row, column))
        .map(|value| parse_number(number, label, value))
        .transpose()
}

fn create_product(
    conn: &Connection,
    number: usize,
    row: &[String],
    minicode: &str,
    company_id: Option<i64>,
) -> Result<()> {
    let Some(name) = non_empty(cell(row, PRODUCT)) else {
        return Err(Error::row_format(number, "product name is required"));
    };
    let tracking = match non_empty(cell(row, LOT)) {
        Some(flag) if (parse_number(number, "serial flag", flag)? - 1.0).abs() < f64::EPSILON => {
            Tracking::Serial
        }
        _ => Tracking::None,
    };

    let product = NewProduct {
        default_code: non_empty(cell(row, DEFAULT_CODE)).map(str::to_uppercase),
        minicode: Some(minicode.to_string()),
        list_price: optional_number(number, row, LIST_PRICE, "price")?.unwrap_or_default(),
        standard_price: optional_number(number, row, STANDARD_PRICE, "cost")?.unwrap_or_default(),
        detailed_type: ProductType::Product,
        tracking,
        categ_id: category(conn, row)?,
        company_id,
        description_sale: non_empty(cell(row, DESCRIPTION_SALE)).map(str::to_string),
        model: non_empty(cell(row, MODEL)).map(str::to_string),
        technology: non_empty(cell(row, TECHNOLOGY)).map(str::to_string),
        ..NewProduct::named(name.to_uppercase())
    };
    let id = SqliteProductRepository::new(conn).create(&product)?;
    tracing::debug!("Created product {} ({id})", product.name);
    Ok(())
}

fn update_product(
    conn: &Connection,
    number: usize,
    row: &[String],
    id: i64,
    fields: UpdateFields,
) -> Result<()> {
    let mut update = ProductUpdate {
        detailed_type: Some(ProductType::Product),
        ..ProductUpdate::default()
    };
    if fields.category {
        update.categ_id = category(conn, row)?;
    }
    if fields.price {
        update.list_price = optional_number(number, row, LIST_PRICE, "price")?;
    }
    if fields.cost {
        update.standard_price = optional_number(number, row, STANDARD_PRICE, "cost")?;
    }
    if fields.model {
        update.model = non_empty(cell(row, MODEL)).map(str::to_string);
    }
    if fields.technology {
        update.technology = Some(non_empty(cell(row, TECHNOLOGY)).map(str::to_string));
    }
    if fields.name {
        update.name = non_empty(cell(row, PRODUCT)).map(str::to_uppercase);
    }
    if fields.default_code {
        update.default_code = non_empty(cell(row, DEFAULT_CODE)).map(str::to_uppercase);
    }
    if fields.description_sale {
        update.description_sale = non_empty(cell(row, DESCRIPTION_SALE)).map(str::to_string);
    }
    if fields.tracking {
        update.tracking = Some(if non_empty(cell(row, LOT)).is_some() {
            Tracking::Serial
        } else {
            Tracking::None
        });
    }
    if fields.minicode {
        update.minicode = non_empty(cell(row, MINICODE))
            .filter(|minicode| *minicode != "0")
            .map(str::to_string);
    }

    SqliteProductRepository::new(conn).update(id, &update)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(values: &[(usize, &str)]) -> Vec<String> {
        let mut row = vec![String::new(); 15];
        for (column, value) in values {
            row[*column] = (*value).to_string();
        }
        row
    }

    fn header() -> Vec<String> {
        row(&[(PRODUCT, "product"), (MINICODE, "minicode")])
    }

    fn product(db: &Database, minicode: &str) -> crate::models::Product {
        let products = SqliteProductRepository::new(db.connection());
        let id = products.find_by_minicode(minicode).unwrap().unwrap();
        products.get(id).unwrap().unwrap()
    }

    #[test]
    fn new_products_are_created_with_categories() {
        let mut db = Database::open_in_memory().unwrap();
        let rows = vec![
            header(),
            row(&[
                (PRODUCT, " laptop x1 "),
                (DEFAULT_CODE, "lap-01"),
                (MINICODE, "L1"),
                (LOT, "1"),
                (STANDARD_PRICE, "1500"),
                (LIST_PRICE, "1999.9"),
                (CATEGORY, "Computo"),
                (SUBCATEGORY, "Laptops"),
                (TECHNOLOGY, "SSD"),
                (MODEL, "X1-2024"),
            ]),
        ];
        let options = ProductImportOptions {
            company_id: Some(1),
            ..ProductImportOptions::default()
        };

        let report = import_products(&mut db, &rows, &options).unwrap();
        assert_eq!(report.completed, 1);

        let created = product(&db, "L1");
        assert_eq!(created.name, "LAPTOP X1");
        assert_eq!(created.default_code.as_deref(), Some("LAP-01"));
        assert_eq!(created.tracking, Tracking::Serial);
        assert_eq!(created.detailed_type, ProductType::Product);
        assert_eq!(created.company_id, Some(1));
        assert_eq!(created.model.as_deref(), Some("X1-2024"));
        assert!((created.list_price - 1999.9).abs() < f64::EPSILON);

        let references = SqliteReferenceRepository::new(db.connection());
        let parent = references
            .find_by_name(RefTable::Category, "Computo", None)
            .unwrap()
            .unwrap();
        let child = references
            .find_by_name(RefTable::Category, "Laptops", Some(parent))
            .unwrap();
        assert_eq!(created.categ_id, child);
    }

    #[test]
    fn existing_products_only_get_selected_fields() {
        let mut db = Database::open_in_memory().unwrap();
        SqliteProductRepository::new(db.connection())
            .create(&NewProduct {
                default_code: Some("MS-01".into()),
                minicode: Some("M1".into()),
                list_price: 10.0,
                standard_price: 5.0,
                ..NewProduct::named("MOUSE")
            })
            .unwrap();
        let rows = vec![
            header(),
            row(&[
                (PRODUCT, "mouse optico"),
                (DEFAULT_CODE, "MS-01"),
                (MINICODE, "M1"),
                (STANDARD_PRICE, "6"),
                (LIST_PRICE, "12"),
            ]),
        ];
        let options = ProductImportOptions {
            update: Some(UpdateFields {
                price: true,
                ..UpdateFields::default()
            }),
            ..ProductImportOptions::default()
        };

        import_products(&mut db, &rows, &options).unwrap();

        let updated = product(&db, "M1");
        assert_eq!(updated.name, "MOUSE");
        assert!((updated.list_price - 12.0).abs() < f64::EPSILON);
        assert!((updated.standard_price - 5.0).abs() < f64::EPSILON);
        assert_eq!(updated.detailed_type, ProductType::Product);
        assert_eq!(SqliteProductRepository::new(db.connection()).count().unwrap(), 1);
    }

    #[test]
    fn minicode_lookup_falls_back_to_the_name() {
        let mut db = Database::open_in_memory().unwrap();
        SqliteProductRepository::new(db.connection())
            .create(&NewProduct::named("TECLADO"))
            .unwrap();
        let rows = vec![header(), row(&[(PRODUCT, "TECLADO"), (MINICODE, "T9")])];
        let options = ProductImportOptions {
            lookup: ProductLookup::Minicode,
            ..ProductImportOptions::default()
        };

        import_products(&mut db, &rows, &options).unwrap();

        assert_eq!(product(&db, "T9").name, "TECLADO");
        assert_eq!(SqliteProductRepository::new(db.connection()).count().unwrap(), 1);
    }

    #[test]
    fn rows_without_minicode_or_name_are_reported() {
        let mut db = Database::open_in_memory().unwrap();
        let rows = vec![
            header(),
            row(&[(PRODUCT, "CABLE")]),
            row(&[(MINICODE, "C1")]),
            row(&[(PRODUCT, "HUB"), (MINICODE, "H1"), (LIST_PRICE, "cheap")]),
            row(&[(PRODUCT, "HDMI"), (MINICODE, "H2")]),
        ];

        let report = import_products(&mut db, &rows, &ProductImportOptions::default()).unwrap();

        assert_eq!(report.completed, 1);
        assert_eq!(report.skipped[&2], "product minicode is empty");
        assert_eq!(report.skipped[&3], "product name is required");
        assert_eq!(report.skipped[&4], "invalid price 'cheap'");
    }

    #[test]
    fn update_without_fields_is_rejected() {
        let mut db = Database::open_in_memory().unwrap();
        let options = ProductImportOptions {
            update: Some(UpdateFields::default()),
            ..ProductImportOptions::default()
        };
        assert!(matches!(
            import_products(&mut db, &[header()], &options),
            Err(Error::InvalidInput(_))
        ));
    }
}
