//! Attributes, variants and website categories

use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use crate::error::{Error, Result};

pub trait CatalogRepository {
    fn find_attribute(&self, name: &str) -> Result<Option<i64>>;

    /// Case-insensitive substring match on the attribute name
    fn find_attribute_like(&self, name: &str) -> Result<Option<i64>>;

    /// Id of the attribute named `name`, created when missing
    fn ensure_attribute(&self, name: &str) -> Result<i64>;

    /// Id of the value `name` of `attribute_id`, created when missing
    fn ensure_value(&self, attribute_id: i64, name: &str) -> Result<i64>;

    fn add_attribute_value(&self, product_id: i64, value_id: i64) -> Result<()>;

    /// `(attribute, value)` names linked to a product, by attribute name
    fn product_values(&self, product_id: i64) -> Result<Vec<(String, String)>>;

    /// First variant of `template_id` carrying every value in `value_ids`
    fn find_variant(&self, template_id: i64, value_ids: &[i64]) -> Result<Option<i64>>;

    /// Variant of the template named `template` carrying `attribute = value`
    fn find_variant_by_value(&self, template: &str, attribute: &str, value: &str) -> Result<Option<i64>>;

    /// Copy the template row into a new variant linked to `value_ids`
    fn create_variant(&self, template_id: i64, value_ids: &[i64]) -> Result<i64>;

    fn variants(&self, template_id: i64) -> Result<Vec<i64>>;

    /// Website category `name`, created under `parent` when missing.
    ///
    /// A missing parent is created by name; an existing category keeps its
    /// parent.
    fn ensure_public_category(&self, name: &str, parent: Option<&str>) -> Result<i64>;

    /// Replace the website categories of a product
    fn set_public_categories(&self, product_id: i64, categ_ids: &[i64]) -> Result<()>;

    fn public_categories(&self, product_id: i64) -> Result<Vec<i64>>;

    fn set_published(&self, product_id: i64, published: bool) -> Result<()>;
}

/// `SQLite` implementation of `CatalogRepository`
pub struct SqliteCatalogRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteCatalogRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn find_public_category(&self, name: &str) -> Result<Option<i64>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id FROM public_categories WHERE name = ? ORDER BY id LIMIT 1",
                params![name],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn insert_public_category(&self, name: &str, parent_id: Option<i64>) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO public_categories (name, parent_id) VALUES (?, ?)",
            params![name, parent_id],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn ids(&self, sql: &str, id: i64) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params![id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(rows)
    }
}

impl CatalogRepository for SqliteCatalogRepository<'_> {
    fn find_attribute(&self, name: &str) -> Result<Option<i64>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id FROM product_attributes WHERE name = ?",
                params![name],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn find_attribute_like(&self, name: &str) -> Result<Option<i64>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id FROM product_attributes
                 WHERE LOWER(name) LIKE '%' || LOWER(?) || '%' ORDER BY id LIMIT 1",
                params![name],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn ensure_attribute(&self, name: &str) -> Result<i64> {
        if let Some(id) = self.find_attribute(name)? {
            return Ok(id);
        }
        self.conn
            .execute("INSERT INTO product_attributes (name) VALUES (?)", params![name])?;
        tracing::debug!("Created attribute {name}");
        Ok(self.conn.last_insert_rowid())
    }

    fn ensure_value(&self, attribute_id: i64, name: &str) -> Result<i64> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM product_attribute_values WHERE attribute_id = ? AND name = ?",
                params![attribute_id, name],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = found {
            return Ok(id);
        }
        self.conn.execute(
            "INSERT INTO product_attribute_values (attribute_id, name) VALUES (?, ?)",
            params![attribute_id, name],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn add_attribute_value(&self, product_id: i64, value_id: i64) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO product_variant_values (product_id, value_id) VALUES (?, ?)",
            params![product_id, value_id],
        )?;
        Ok(())
    }

    fn product_values(&self, product_id: i64) -> Result<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT a.name, v.name FROM product_variant_values pv
             JOIN product_attribute_values v ON v.id = pv.value_id
             JOIN product_attributes a ON a.id = v.attribute_id
             WHERE pv.product_id = ?
             ORDER BY a.name, v.name",
        )?;
        let rows = stmt
            .query_map(params![product_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn find_variant(&self, template_id: i64, value_ids: &[i64]) -> Result<Option<i64>> {
        if value_ids.is_empty() {
            return Ok(None);
        }
        let placeholders = vec!["?"; value_ids.len()].join(", ");
        let sql = format!(
            "SELECT p.id FROM products p
             WHERE p.template_id = ?
               AND (SELECT COUNT(DISTINCT pv.value_id) FROM product_variant_values pv
                    WHERE pv.product_id = p.id AND pv.value_id IN ({placeholders})) = ?
             ORDER BY p.id LIMIT 1"
        );
        let mut distinct = value_ids.to_vec();
        distinct.sort_unstable();
        distinct.dedup();
        let expected = i64::try_from(distinct.len()).unwrap_or(i64::MAX);

        let mut values = Vec::with_capacity(distinct.len() + 2);
        values.push(template_id);
        values.extend(distinct);
        values.push(expected);
        Ok(self
            .conn
            .query_row(&sql, params_from_iter(values), |row| row.get(0))
            .optional()?)
    }

    fn find_variant_by_value(&self, template: &str, attribute: &str, value: &str) -> Result<Option<i64>> {
        Ok(self
            .conn
            .query_row(
                "SELECT p.id FROM products p
                 JOIN products t ON t.id = p.template_id
                 JOIN product_variant_values pv ON pv.product_id = p.id
                 JOIN product_attribute_values v ON v.id = pv.value_id
                 JOIN product_attributes a ON a.id = v.attribute_id
                 WHERE t.name = ? AND a.name = ? AND v.name = ?
                 ORDER BY p.id LIMIT 1",
                params![template, attribute, value],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn create_variant(&self, template_id: i64, value_ids: &[i64]) -> Result<i64> {
        let rows = self.conn.execute(
            "INSERT INTO products (name, default_code, barcode, minicode, list_price, standard_price,
                detailed_type, tracking, categ_id, company_id, description_sale, model, technology,
                id_articulo, is_published, template_id, import_id, created_at)
             SELECT name, default_code, barcode, minicode, list_price, standard_price,
                detailed_type, tracking, categ_id, company_id, description_sale, model, technology,
                id_articulo, is_published, id, NULL, ?
             FROM products WHERE id = ? AND template_id IS NULL",
            params![chrono::Utc::now().timestamp_millis(), template_id],
        )?;
        if rows == 0 {
            return Err(Error::NotFound(format!("product template {template_id}")));
        }
        let id = self.conn.last_insert_rowid();

        self.conn.execute(
            "INSERT INTO product_taxes (product_id, tax_id)
             SELECT ?, tax_id FROM product_taxes WHERE product_id = ?",
            params![id, template_id],
        )?;
        for value_id in value_ids {
            self.add_attribute_value(id, *value_id)?;
        }
        Ok(id)
    }

    fn variants(&self, template_id: i64) -> Result<Vec<i64>> {
        self.ids(
            "SELECT id FROM products WHERE template_id = ? ORDER BY id",
            template_id,
        )
    }

    fn ensure_public_category(&self, name: &str, parent: Option<&str>) -> Result<i64> {
        let parent_id = match parent {
            Some(parent) => Some(match self.find_public_category(parent)? {
                Some(id) => id,
                None => self.insert_public_category(parent, None)?,
            }),
            None => None,
        };
        match self.find_public_category(name)? {
            Some(id) => Ok(id),
            None => self.insert_public_category(name, parent_id),
        }
    }

    fn set_public_categories(&self, product_id: i64, categ_ids: &[i64]) -> Result<()> {
        self.conn.execute(
            "DELETE FROM product_public_categories WHERE product_id = ?",
            params![product_id],
        )?;
        for categ_id in categ_ids {
            self.conn.execute(
                "INSERT OR IGNORE INTO product_public_categories (product_id, categ_id) VALUES (?, ?)",
                params![product_id, categ_id],
            )?;
        }
        Ok(())
    }

    fn public_categories(&self, product_id: i64) -> Result<Vec<i64>> {
        self.ids(
            "SELECT categ_id FROM product_public_categories WHERE product_id = ? ORDER BY categ_id",
            product_id,
        )
    }

    fn set_published(&self, product_id: i64, published: bool) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE products SET is_published = ? WHERE id = ?",
            params![published, product_id],
        )?;
        if rows == 0 {
            return Err(Error::NotFound(format!("product {product_id}")));
        }
        Ok(())
    }
}
