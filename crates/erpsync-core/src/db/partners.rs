//! Partner repository

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::models::{NewPartner, Partner};

pub trait PartnerRepository {
    fn create(&self, partner: &NewPartner) -> Result<i64>;

    fn get(&self, id: i64) -> Result<Option<Partner>>;

    fn find_by_import_id(&self, import_id: i64) -> Result<Option<i64>>;

    fn find_by_vat(&self, vat: &str) -> Result<Option<i64>>;

    /// Whether a partner was imported from `import_id` or carries `vat`
    fn exists(&self, import_id: i64, vat: Option<&str>) -> Result<bool>;

    /// `(id, import_id, vat)` of every partner, for the run caches
    fn natural_keys(&self) -> Result<Vec<(i64, Option<i64>, Option<String>)>>;

    fn count(&self) -> Result<usize>;
}

/// `SQLite` implementation of `PartnerRepository`
pub struct SqlitePartnerRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqlitePartnerRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_partner(row: &rusqlite::Row<'_>) -> rusqlite::Result<Partner> {
        let company_type: String = row.get(5)?;
        Ok(Partner {
            id: row.get(0)?,
            name: row.get(1)?,
            vat: row.get(2)?,
            street: row.get(3)?,
            zip: row.get(4)?,
            company_type: company_type.parse().unwrap_or(crate::models::CompanyType::Company),
            identification_type_id: row.get(6)?,
            country_id: row.get(7)?,
            state_id: row.get(8)?,
            city_id: row.get(9)?,
            district_id: row.get(10)?,
            import_id: row.get(11)?,
        })
    }
}

impl PartnerRepository for SqlitePartnerRepository<'_> {
    fn create(&self, partner: &NewPartner) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO partners (name, vat, street, zip, company_type, identification_type_id,
                country_id, state_id, city_id, district_id, import_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                partner.name,
                partner.vat,
                partner.street,
                partner.zip,
                partner.company_type.as_str(),
                partner.identification_type_id,
                partner.country_id,
                partner.state_id,
                partner.city_id,
                partner.district_id,
                partner.import_id,
                chrono::Utc::now().timestamp_millis(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get(&self, id: i64) -> Result<Option<Partner>> {
        let result = self.conn.query_row(
            "SELECT id, name, vat, street, zip, company_type, identification_type_id,
                    country_id, state_id, city_id, district_id, import_id
             FROM partners WHERE id = ?",
            params![id],
            Self::parse_partner,
        );

        match result {
            Ok(partner) => Ok(Some(partner)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn find_by_import_id(&self, import_id: i64) -> Result<Option<i64>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id FROM partners WHERE import_id = ? ORDER BY id LIMIT 1",
                params![import_id],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn find_by_vat(&self, vat: &str) -> Result<Option<i64>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id FROM partners WHERE vat = ? ORDER BY id LIMIT 1",
                params![vat],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn exists(&self, import_id: i64, vat: Option<&str>) -> Result<bool> {
        Ok(self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM partners WHERE import_id = ?1 OR (?2 IS NOT NULL AND vat = ?2))",
            params![import_id, vat],
            |row| row.get(0),
        )?)
    }

    fn natural_keys(&self) -> Result<Vec<(i64, Option<i64>, Option<String>)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, import_id, vat FROM partners ORDER BY id")?;
        let keys = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(keys)
    }

    fn count(&self) -> Result<usize> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM partners", [], |row| row.get(0))?)
    }
}
