//! Product repository

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::models::{NewProduct, Product, ProductUpdate};

pub trait ProductRepository {
    fn create(&self, product: &NewProduct) -> Result<i64>;

    fn get(&self, id: i64) -> Result<Option<Product>>;

    fn find_by_import_id(&self, import_id: i64) -> Result<Option<i64>>;

    fn find_by_name(&self, name: &str) -> Result<Option<i64>>;

    /// Product named `name` that is not a variant of another
    fn find_template(&self, name: &str) -> Result<Option<i64>>;

    /// Case-insensitive substring match on the name
    fn find_by_name_like(&self, name: &str) -> Result<Option<i64>>;

    fn find_by_default_code(&self, code: &str) -> Result<Option<i64>>;

    fn find_by_barcode(&self, barcode: &str) -> Result<Option<i64>>;

    fn find_by_minicode(&self, minicode: &str) -> Result<Option<i64>>;

    /// Whether a product was imported from `import_id` or carries the
    /// non-empty `default_code`
    fn exists(&self, import_id: i64, default_code: Option<&str>) -> Result<bool>;

    fn update(&self, id: i64, update: &ProductUpdate) -> Result<()>;

    /// `(local id, import id)` of imported products ordered by import id
    fn imported(&self, limit: Option<usize>) -> Result<Vec<(i64, i64)>>;

    /// `(name, id)` of every product, oldest first
    fn names(&self) -> Result<Vec<(String, i64)>>;

    fn count(&self) -> Result<usize>;
}

/// `SQLite` implementation of `ProductRepository`
pub struct SqliteProductRepository<'a> {
    conn: &'a Connection,
}

const PRODUCT_COLUMNS: &str = "id, name, default_code, barcode, minicode, list_price, standard_price,
    detailed_type, tracking, categ_id, company_id, description_sale, model, technology, import_id,
    id_articulo, is_published, template_id";

impl<'a> SqliteProductRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn find_one(&self, condition: &str, value: &str) -> Result<Option<i64>> {
        let sql = format!("SELECT id FROM products WHERE {condition} ORDER BY id LIMIT 1");
        Ok(self
            .conn
            .query_row(&sql, params![value], |row| row.get(0))
            .optional()?)
    }

    fn parse_product(row: &rusqlite::Row<'_>) -> rusqlite::Result<Product> {
        let detailed_type: String = row.get(7)?;
        let tracking: String = row.get(8)?;
        Ok(Product {
            id: row.get(0)?,
            name: row.get(1)?,
            default_code: row.get(2)?,
            barcode: row.get(3)?,
            minicode: row.get(4)?,
            list_price: row.get(5)?,
            standard_price: row.get(6)?,
            detailed_type: detailed_type.parse().unwrap_or_default(),
            tracking: tracking.parse().unwrap_or_default(),
            categ_id: row.get(9)?,
            company_id: row.get(10)?,
            description_sale: row.get(11)?,
            model: row.get(12)?,
            technology: row.get(13)?,
            import_id: row.get(14)?,
            id_articulo: row.get(15)?,
            is_published: row.get(16)?,
            template_id: row.get(17)?,
        })
    }
}

impl ProductRepository for SqliteProductRepository<'_> {
    fn create(&self, product: &NewProduct) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO products (name, default_code, barcode, minicode, list_price, standard_price,
                detailed_type, tracking, categ_id, company_id, description_sale, model, technology,
                id_articulo, is_published, template_id, import_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                product.name,
                product.default_code,
                product.barcode,
                product.minicode,
                product.list_price,
                product.standard_price,
                product.detailed_type.as_str(),
                product.tracking.as_str(),
                product.categ_id,
                product.company_id,
                product.description_sale,
                product.model,
                product.technology,
                product.id_articulo,
                product.is_published,
                product.template_id,
                product.import_id,
                chrono::Utc::now().timestamp_millis(),
            ],
        )?;
        let id = self.conn.last_insert_rowid();

        for tax_id in &product.tax_ids {
            self.conn.execute(
                "INSERT OR IGNORE INTO product_taxes (product_id, tax_id) VALUES (?, ?)",
                params![id, tax_id],
            )?;
        }

        Ok(id)
    }

    fn get(&self, id: i64) -> Result<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?");
        let result = self.conn.query_row(&sql, params![id], Self::parse_product);

        match result {
            Ok(product) => Ok(Some(product)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn find_by_import_id(&self, import_id: i64) -> Result<Option<i64>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id FROM products WHERE import_id = ? ORDER BY id LIMIT 1",
                params![import_id],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn find_by_name(&self, name: &str) -> Result<Option<i64>> {
        self.find_one("name = ?", name)
    }

    fn find_template(&self, name: &str) -> Result<Option<i64>> {
        self.find_one("name = ? AND template_id IS NULL", name)
    }

    fn find_by_name_like(&self, name: &str) -> Result<Option<i64>> {
        self.find_one("LOWER(name) LIKE '%' || LOWER(?) || '%'", name)
    }

    fn find_by_default_code(&self, code: &str) -> Result<Option<i64>> {
        self.find_one("default_code = ?", code)
    }

    fn find_by_barcode(&self, barcode: &str) -> Result<Option<i64>> {
        self.find_one("barcode = ?", barcode)
    }

    fn find_by_minicode(&self, minicode: &str) -> Result<Option<i64>> {
        self.find_one("minicode = ?", minicode)
    }

    fn exists(&self, import_id: i64, default_code: Option<&str>) -> Result<bool> {
        Ok(self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM products
             WHERE import_id = ?1 OR (?2 IS NOT NULL AND ?2 != '' AND default_code = ?2))",
            params![import_id, default_code],
            |row| row.get(0),
        )?)
    }

    fn update(&self, id: i64, update: &ProductUpdate) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE products SET
                name = COALESCE(?1, name),
                default_code = COALESCE(?2, default_code),
                minicode = COALESCE(?3, minicode),
                list_price = COALESCE(?4, list_price),
                standard_price = COALESCE(?5, standard_price),
                detailed_type = COALESCE(?6, detailed_type),
                tracking = COALESCE(?7, tracking),
                categ_id = COALESCE(?8, categ_id),
                company_id = COALESCE(?9, company_id),
                description_sale = COALESCE(?10, description_sale),
                model = COALESCE(?11, model),
                technology = CASE WHEN ?12 THEN ?13 ELSE technology END,
                barcode = COALESCE(?14, barcode),
                id_articulo = COALESCE(?15, id_articulo)
             WHERE id = ?16",
            params![
                update.name,
                update.default_code,
                update.minicode,
                update.list_price,
                update.standard_price,
                update.detailed_type.map(|value| value.as_str()),
                update.tracking.map(|value| value.as_str()),
                update.categ_id,
                update.company_id,
                update.description_sale,
                update.model,
                update.technology.is_some(),
                update.technology.clone().flatten(),
                update.barcode,
                update.id_articulo,
                id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(format!("product {id}")));
        }
        Ok(())
    }

    fn imported(&self, limit: Option<usize>) -> Result<Vec<(i64, i64)>> {
        let limit = limit.map_or(-1, |limit| i64::try_from(limit).unwrap_or(i64::MAX));
        let mut stmt = self.conn.prepare(
            "SELECT id, import_id FROM products WHERE import_id IS NOT NULL
             ORDER BY import_id LIMIT ?",
        )?;
        let rows = stmt
            .query_map(params![limit], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn names(&self) -> Result<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare("SELECT name, id FROM products ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn count(&self) -> Result<usize> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?)
    }
}
