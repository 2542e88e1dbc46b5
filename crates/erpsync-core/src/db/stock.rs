//! Serial lot and stock quantity repository

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::models::{Lot, NewLot, StockQuant};

pub trait StockRepository {
    fn create_lot(&self, lot: &NewLot) -> Result<i64>;

    /// Lot named `name` for `product_id`, optionally narrowed by company and location
    fn find_lot(
        &self,
        name: &str,
        product_id: i64,
        company_id: Option<i64>,
        location_id: Option<i64>,
    ) -> Result<Option<Lot>>;

    fn lot_count(&self) -> Result<usize>;

    fn find_quant(
        &self,
        product_id: i64,
        location_id: i64,
        lot_id: Option<i64>,
    ) -> Result<Option<StockQuant>>;

    /// Set the counted quantity, creating the quant when missing
    fn set_quantity(
        &self,
        product_id: i64,
        location_id: i64,
        lot_id: Option<i64>,
        company_id: Option<i64>,
        quantity: f64,
    ) -> Result<i64>;
}

/// `SQLite` implementation of `StockRepository`
pub struct SqliteStockRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteStockRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl StockRepository for SqliteStockRepository<'_> {
    fn create_lot(&self, lot: &NewLot) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO lots (name, product_id, company_id, location_id) VALUES (?, ?, ?, ?)",
            params![lot.name, lot.product_id, lot.company_id, lot.location_id],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn find_lot(
        &self,
        name: &str,
        product_id: i64,
        company_id: Option<i64>,
        location_id: Option<i64>,
    ) -> Result<Option<Lot>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, product_id, company_id, location_id FROM lots
                 WHERE name = ?1 AND product_id = ?2
                   AND (?3 IS NULL OR company_id = ?3)
                   AND (?4 IS NULL OR location_id = ?4)
                 ORDER BY id LIMIT 1",
                params![name, product_id, company_id, location_id],
                |row| {
                    Ok(Lot {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        product_id: row.get(2)?,
                        company_id: row.get(3)?,
                        location_id: row.get(4)?,
                    })
                },
            )
            .optional()?)
    }

    fn lot_count(&self) -> Result<usize> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM lots", [], |row| row.get(0))?)
    }

    fn find_quant(
        &self,
        product_id: i64,
        location_id: i64,
        lot_id: Option<i64>,
    ) -> Result<Option<StockQuant>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, product_id, location_id, lot_id, quantity, reserved_quantity,
                        company_id, inventory_date
                 FROM stock_quants
                 WHERE product_id = ?1 AND location_id = ?2 AND lot_id IS ?3
                 ORDER BY id LIMIT 1",
                params![product_id, location_id, lot_id],
                |row| {
                    Ok(StockQuant {
                        id: row.get(0)?,
                        product_id: row.get(1)?,
                        location_id: row.get(2)?,
                        lot_id: row.get(3)?,
                        quantity: row.get(4)?,
                        reserved_quantity: row.get(5)?,
                        company_id: row.get(6)?,
                        inventory_date: row.get(7)?,
                    })
                },
            )
            .optional()?)
    }

    fn set_quantity(
        &self,
        product_id: i64,
        location_id: i64,
        lot_id: Option<i64>,
        company_id: Option<i64>,
        quantity: f64,
    ) -> Result<i64> {
        let today = chrono::Local::now().date_naive();
        if let Some(existing) = self.find_quant(product_id, location_id, lot_id)? {
            self.conn.execute(
                "UPDATE stock_quants SET quantity = ?, inventory_date = ? WHERE id = ?",
                params![quantity, today, existing.id],
            )?;
            return Ok(existing.id);
        }

        self.conn.execute(
            "INSERT INTO stock_quants (product_id, location_id, lot_id, quantity, company_id,
                inventory_date)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![product_id, location_id, lot_id, quantity, company_id, today],
        )?;
        Ok(self.conn.last_insert_rowid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::products::{ProductRepository, SqliteProductRepository};
    use crate::db::Database;
    use crate::models::NewProduct;

    fn setup() -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        let product_id = SqliteProductRepository::new(db.connection())
            .create(&NewProduct::named("LAPTOP X1"))
            .unwrap();
        (db, product_id)
    }

    #[test]
    fn test_find_lot_narrows_by_company() {
        let (db, product_id) = setup();
        let repo = SqliteStockRepository::new(db.connection());

        let lot = NewLot {
            name: "SN001".into(),
            product_id,
            company_id: Some(1),
            location_id: Some(8),
        };
        let id = repo.create_lot(&lot).unwrap();

        assert_eq!(repo.find_lot("SN001", product_id, None, None).unwrap().unwrap().id, id);
        assert!(repo.find_lot("SN001", product_id, Some(2), None).unwrap().is_none());
        assert!(repo.find_lot("SN002", product_id, None, None).unwrap().is_none());
        assert_eq!(repo.lot_count().unwrap(), 1);
    }

    #[test]
    fn test_set_quantity_creates_then_updates() {
        let (db, product_id) = setup();
        let repo = SqliteStockRepository::new(db.connection());

        let first = repo.set_quantity(product_id, 8, None, Some(1), 3.0).unwrap();
        let second = repo.set_quantity(product_id, 8, None, Some(1), 5.0).unwrap();
        assert_eq!(first, second);

        let quant = repo.find_quant(product_id, 8, None).unwrap().unwrap();
        assert!((quant.quantity - 5.0).abs() < f64::EPSILON);
        assert!(quant.inventory_date.is_some());
    }

    #[test]
    fn test_quants_are_per_lot() {
        let (db, product_id) = setup();
        let repo = SqliteStockRepository::new(db.connection());
        let lot_id = repo
            .create_lot(&NewLot {
                name: "SN9".into(),
                product_id,
                company_id: None,
                location_id: None,
            })
            .unwrap();

        let plain = repo.set_quantity(product_id, 8, None, None, 1.0).unwrap();
        let with_lot = repo.set_quantity(product_id, 8, Some(lot_id), None, 1.0).unwrap();
        assert_ne!(plain, with_lot);
    }
}
