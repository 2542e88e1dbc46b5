//! Reference data repository and JSON seed loader

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{Journal, NamedRef};

/// Reference tables keyed by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefTable {
    Currency,
    PaymentTerm,
    Shop,
    Uom,
    Tax,
    IdentificationType,
    Country,
    State,
    City,
    District,
    Location,
    Category,
}

impl RefTable {
    const fn table(self) -> &'static str {
        match self {
            Self::Currency => "currencies",
            Self::PaymentTerm => "payment_terms",
            Self::Shop => "shops",
            Self::Uom => "uoms",
            Self::Tax => "taxes",
            Self::IdentificationType => "identification_types",
            Self::Country => "countries",
            Self::State => "country_states",
            Self::City => "cities",
            Self::District => "districts",
            Self::Location => "locations",
            Self::Category => "product_categories",
        }
    }

    const fn code_column(self) -> Option<&'static str> {
        match self {
            Self::Shop | Self::Country => Some("code"),
            Self::IdentificationType => Some("vat_code"),
            _ => None,
        }
    }

    const fn parent_column(self) -> Option<&'static str> {
        match self {
            Self::State => Some("country_id"),
            Self::City => Some("state_id"),
            Self::District => Some("city_id"),
            Self::Category => Some("parent_id"),
            _ => None,
        }
    }

    fn code_select(self) -> String {
        self.code_column()
            .map_or_else(|| "NULL".to_string(), str::to_string)
    }
}

/// Lookup and insert operations over reference tables
pub trait ReferenceRepository {
    fn list(&self, table: RefTable) -> Result<Vec<NamedRef>>;

    /// Exact, case-sensitive name match; `parent` restricts hierarchical tables
    fn find_by_name(&self, table: RefTable, name: &str, parent: Option<i64>) -> Result<Option<i64>>;

    /// Case-insensitive substring match
    fn find_by_name_like(
        &self,
        table: RefTable,
        name: &str,
        parent: Option<i64>,
    ) -> Result<Option<i64>>;

    fn find_by_code(&self, table: RefTable, code: &str) -> Result<Option<i64>>;

    fn insert(
        &self,
        table: RefTable,
        name: &str,
        code: Option<&str>,
        parent: Option<i64>,
    ) -> Result<i64>;

    fn lowest_id(&self, table: RefTable) -> Result<Option<i64>>;

    fn journals(&self) -> Result<Vec<Journal>>;

    fn insert_journal(
        &self,
        code: &str,
        name: &str,
        company_id: Option<i64>,
        document_type_code: Option<&str>,
    ) -> Result<i64>;
}

/// `SQLite` implementation of `ReferenceRepository`
pub struct SqliteReferenceRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteReferenceRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn find_where(
        &self,
        table: RefTable,
        condition: &str,
        value: &str,
        parent: Option<i64>,
    ) -> Result<Option<i64>> {
        let sql = match (table.parent_column(), parent) {
            (Some(column), Some(_)) => format!(
                "SELECT id FROM {} WHERE {condition} AND {column} = ?2 ORDER BY id LIMIT 1",
                table.table()
            ),
            _ => format!(
                "SELECT id FROM {} WHERE {condition} ORDER BY id LIMIT 1",
                table.table()
            ),
        };
        let id = if sql.contains("?2") {
            self.conn
                .query_row(&sql, params![value, parent], |row| row.get(0))
                .optional()?
        } else {
            self.conn
                .query_row(&sql, params![value], |row| row.get(0))
                .optional()?
        };
        Ok(id)
    }
}

impl ReferenceRepository for SqliteReferenceRepository<'_> {
    fn list(&self, table: RefTable) -> Result<Vec<NamedRef>> {
        let sql = format!(
            "SELECT id, name, {} FROM {} ORDER BY id",
            table.code_select(),
            table.table()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(NamedRef {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    code: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn find_by_name(&self, table: RefTable, name: &str, parent: Option<i64>) -> Result<Option<i64>> {
        self.find_where(table, "name = ?1", name, parent)
    }

    fn find_by_name_like(
        &self,
        table: RefTable,
        name: &str,
        parent: Option<i64>,
    ) -> Result<Option<i64>> {
        self.find_where(
            table,
            "LOWER(name) LIKE '%' || LOWER(?1) || '%'",
            name,
            parent,
        )
    }

    fn find_by_code(&self, table: RefTable, code: &str) -> Result<Option<i64>> {
        let Some(column) = table.code_column() else {
            return Ok(None);
        };
        self.find_where(table, &format!("{column} = ?1"), code, None)
    }

    fn insert(
        &self,
        table: RefTable,
        name: &str,
        code: Option<&str>,
        parent: Option<i64>,
    ) -> Result<i64> {
        let mut columns = vec!["name"];
        let mut values: Vec<rusqlite::types::Value> = vec![name.to_string().into()];
        if let Some(column) = table.code_column() {
            columns.push(column);
            values.push(code.map(str::to_string).into());
        }
        if let Some(column) = table.parent_column() {
            columns.push(column);
            values.push(parent.into());
        }
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({placeholders})",
            table.table(),
            columns.join(", ")
        );
        self.conn
            .execute(&sql, rusqlite::params_from_iter(values))?;
        Ok(self.conn.last_insert_rowid())
    }

    fn lowest_id(&self, table: RefTable) -> Result<Option<i64>> {
        let sql = format!("SELECT MIN(id) FROM {}", table.table());
        Ok(self.conn.query_row(&sql, [], |row| row.get(0))?)
    }

    fn journals(&self) -> Result<Vec<Journal>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, code, name, company_id, document_type_code FROM journals ORDER BY id",
        )?;
        let journals = stmt
            .query_map([], |row| {
                Ok(Journal {
                    id: row.get(0)?,
                    code: row.get(1)?,
                    name: row.get(2)?,
                    company_id: row.get(3)?,
                    document_type_code: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(journals)
    }

    fn insert_journal(
        &self,
        code: &str,
        name: &str,
        company_id: Option<i64>,
        document_type_code: Option<&str>,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO journals (code, name, company_id, document_type_code) VALUES (?, ?, ?, ?)",
            params![code, name, company_id, document_type_code],
        )?;
        Ok(self.conn.last_insert_rowid())
    }
}

/// Reference data seed, usually loaded from a JSON file before the first sync
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceData {
    pub journals: Vec<JournalSeed>,
    pub currencies: Vec<String>,
    pub payment_terms: Vec<String>,
    pub shops: Vec<CodeSeed>,
    pub uoms: Vec<String>,
    pub taxes: Vec<String>,
    pub identification_types: Vec<CodeSeed>,
    pub countries: Vec<CountrySeed>,
    pub locations: Vec<String>,
    pub categories: Vec<CategorySeed>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JournalSeed {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub company_id: Option<i64>,
    #[serde(default)]
    pub document_type_code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeSeed {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountrySeed {
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub states: Vec<StateSeed>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSeed {
    pub name: String,
    #[serde(default)]
    pub cities: Vec<CitySeed>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CitySeed {
    pub name: String,
    #[serde(default)]
    pub districts: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategorySeed {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
}

impl ReferenceData {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Insert every seed row that is not present yet; returns the number of rows inserted.
///
/// Rows are matched by code where the table has one, otherwise by name.
pub fn load_reference_data(conn: &Connection, data: &ReferenceData) -> Result<usize> {
    let repo = SqliteReferenceRepository::new(conn);
    let mut inserted = 0;

    let existing_journals = repo.journals()?;
    for journal in &data.journals {
        let exists = existing_journals
            .iter()
            .any(|row| row.code == journal.code && row.company_id == journal.company_id);
        if !exists {
            repo.insert_journal(
                &journal.code,
                &journal.name,
                journal.company_id,
                journal.document_type_code.as_deref(),
            )?;
            inserted += 1;
        }
    }

    let mut ensure = |table: RefTable, name: &str, code: Option<&str>, parent: Option<i64>| -> Result<i64> {
        let found = match code {
            Some(code) => repo.find_by_code(table, code)?,
            None => repo.find_by_name(table, name, parent)?,
        };
        if let Some(id) = found {
            return Ok(id);
        }
        inserted += 1;
        repo.insert(table, name, code, parent)
    };

    for name in &data.currencies {
        ensure(RefTable::Currency, name, None, None)?;
    }
    for name in &data.payment_terms {
        ensure(RefTable::PaymentTerm, name, None, None)?;
    }
    for shop in &data.shops {
        ensure(RefTable::Shop, &shop.name, Some(&shop.code), None)?;
    }
    for name in &data.uoms {
        ensure(RefTable::Uom, name, None, None)?;
    }
    for name in &data.taxes {
        ensure(RefTable::Tax, name, None, None)?;
    }
    for kind in &data.identification_types {
        ensure(RefTable::IdentificationType, &kind.name, Some(&kind.code), None)?;
    }
    for country in &data.countries {
        let country_id = ensure(RefTable::Country, &country.name, country.code.as_deref(), None)?;
        for state in &country.states {
            let state_id = ensure(RefTable::State, &state.name, None, Some(country_id))?;
            for city in &state.cities {
                let city_id = ensure(RefTable::City, &city.name, None, Some(state_id))?;
                for district in &city.districts {
                    ensure(RefTable::District, district, None, Some(city_id))?;
                }
            }
        }
    }
    for name in &data.locations {
        ensure(RefTable::Location, name, None, None)?;
    }
    for category in &data.categories {
        let parent = match category.parent.as_deref() {
            Some(parent) => Some(ensure(RefTable::Category, parent, None, None)?),
            None => None,
        };
        ensure(RefTable::Category, &category.name, None, parent)?;
    }

    tracing::info!("Loaded {inserted} reference rows");
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;

    const SEED: &str = r#"{
        "journals": [
            {"code": "F001", "name": "Facturas F001", "document_type_code": "01"},
            {"code": "FC01", "name": "Notas de credito", "document_type_code": "07"}
        ],
        "currencies": ["PEN", "USD"],
        "payment_terms": ["Contado", "30 dias"],
        "shops": [{"code": "0000", "name": "Principal"}],
        "uoms": ["Unidades", "Kg"],
        "identification_types": [{"code": "6", "name": "RUC"}, {"code": "1", "name": "DNI"}],
        "countries": [{
            "name": "Peru", "code": "PE",
            "states": [{"name": "Lima", "cities": [{"name": "Lima", "districts": ["Miraflores"]}]}]
        }],
        "locations": ["WH/Stock"],
        "categories": [{"name": "Laptops", "parent": "All"}]
    }"#;

    fn setup() -> Database {
        let db = Database::open_in_memory().unwrap();
        let data = ReferenceData::from_json(SEED).unwrap();
        load_reference_data(db.connection(), &data).unwrap();
        db
    }

    #[test]
    fn seed_loads_every_table() {
        let db = setup();
        let repo = SqliteReferenceRepository::new(db.connection());

        assert_eq!(repo.journals().unwrap().len(), 2);
        assert_eq!(repo.list(RefTable::Currency).unwrap().len(), 2);
        let shops = repo.list(RefTable::Shop).unwrap();
        assert_eq!(shops[0].code.as_deref(), Some("0000"));
        assert_eq!(repo.list(RefTable::District).unwrap().len(), 1);
        assert_eq!(repo.list(RefTable::Category).unwrap().len(), 2);
    }

    #[test]
    fn seed_is_idempotent() {
        let db = setup();
        let data = ReferenceData::from_json(SEED).unwrap();
        assert_eq!(load_reference_data(db.connection(), &data).unwrap(), 0);
    }

    #[test]
    fn lookups_respect_parent() {
        let db = setup();
        let repo = SqliteReferenceRepository::new(db.connection());

        let peru = repo.find_by_name(RefTable::Country, "Peru", None).unwrap().unwrap();
        let lima = repo
            .find_by_name_like(RefTable::State, "LIMA", Some(peru))
            .unwrap();
        assert!(lima.is_some());
        assert_eq!(
            repo.find_by_name(RefTable::State, "Lima", Some(peru + 100)).unwrap(),
            None
        );
        assert_eq!(
            repo.find_by_code(RefTable::IdentificationType, "6").unwrap(),
            repo.find_by_name(RefTable::IdentificationType, "RUC", None).unwrap()
        );
        assert_eq!(repo.find_by_code(RefTable::Currency, "PEN").unwrap(), None);
    }

    #[test]
    fn lowest_id_is_first_inserted() {
        let db = setup();
        let repo = SqliteReferenceRepository::new(db.connection());
        let units = repo.find_by_name(RefTable::Uom, "Unidades", None).unwrap();
        assert_eq!(repo.lowest_id(RefTable::Uom).unwrap(), units);
        assert_eq!(repo.lowest_id(RefTable::Location).unwrap(), Some(1));
    }
}
