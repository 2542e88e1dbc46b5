//! Per-run lookup caches

use std::collections::HashMap;

use rusqlite::Connection;

use super::partner::PartnerLayout;
use super::SyncOptions;
use crate::db::{
    PartnerRepository, ProductRepository, RefTable, ReferenceRepository, SqlitePartnerRepository,
    SqliteProductRepository, SqliteReferenceRepository,
};
use crate::error::Result;
use crate::models::{Journal, RemoteRecord};
use crate::rpc::{read_all_by_id, RemoteSession};

/// Local natural-key maps built once at the start of a run.
///
/// The store is not read again; placeholders created during the run are
/// written through with the `remember_*` methods.
#[derive(Debug, Clone, Default)]
pub struct LookupCache {
    journals: HashMap<String, Journal>,
    currencies: HashMap<String, i64>,
    payment_terms: HashMap<String, i64>,
    shops: HashMap<String, i64>,
    uoms: HashMap<String, i64>,
    default_uom: Option<i64>,
    identification_types: HashMap<String, i64>,
    categories: HashMap<String, i64>,
    products: HashMap<String, i64>,
    partners_by_import: HashMap<i64, i64>,
    partners_by_vat: HashMap<String, i64>,
}

impl LookupCache {
    pub fn load(conn: &Connection) -> Result<Self> {
        let references = SqliteReferenceRepository::new(conn);
        let mut cache = Self::default();

        for journal in references.journals()? {
            cache.journals.entry(journal.code.clone()).or_insert(journal);
        }
        cache.currencies = by_name(&references, RefTable::Currency)?;
        cache.payment_terms = by_name(&references, RefTable::PaymentTerm)?;
        cache.categories = by_name(&references, RefTable::Category)?;
        for row in references.list(RefTable::Shop)? {
            if let Some(code) = row.code {
                cache.shops.entry(code).or_insert(row.id);
            }
        }
        for row in references.list(RefTable::IdentificationType)? {
            if let Some(code) = row.code {
                cache.identification_types.entry(code).or_insert(row.id);
            }
        }
        for row in references.list(RefTable::Uom)? {
            cache.uoms.entry(row.name.to_uppercase()).or_insert(row.id);
        }
        cache.default_uom = references.lowest_id(RefTable::Uom)?;

        for (name, id) in SqliteProductRepository::new(conn).names()? {
            cache.products.entry(name).or_insert(id);
        }
        for (id, import_id, vat) in SqlitePartnerRepository::new(conn).natural_keys()? {
            if let Some(import_id) = import_id {
                cache.partners_by_import.entry(import_id).or_insert(id);
            }
            if let Some(vat) = vat {
                cache.partners_by_vat.entry(vat).or_insert(id);
            }
        }

        tracing::debug!(
            "Lookup cache: {} journals, {} currencies, {} shops, {} uoms, {} products, {} partners",
            cache.journals.len(),
            cache.currencies.len(),
            cache.shops.len(),
            cache.uoms.len(),
            cache.products.len(),
            cache.partners_by_import.len()
        );
        Ok(cache)
    }

    pub fn journal(&self, code: &str) -> Option<&Journal> {
        self.journals.get(code)
    }

    pub fn currency(&self, name: &str) -> Option<i64> {
        self.currencies.get(name).copied()
    }

    pub fn payment_term(&self, name: &str) -> Option<i64> {
        self.payment_terms.get(name).copied()
    }

    /// First payment term whose name contains `needle`, ignoring case
    pub fn payment_term_like(&self, needle: &str) -> Option<i64> {
        let needle = needle.to_lowercase();
        self.payment_terms
            .iter()
            .filter(|(name, _)| name.to_lowercase().contains(&needle))
            .map(|(_, id)| *id)
            .min()
    }

    pub fn shop(&self, code: &str) -> Option<i64> {
        self.shops.get(code).copied()
    }

    /// Lowest shop id, used by layouts that fall back to the main shop
    pub fn first_shop(&self) -> Option<i64> {
        self.shops.values().copied().min()
    }

    /// Unit of measure by name, case-insensitive
    pub fn uom(&self, name: &str) -> Option<i64> {
        self.uoms.get(&name.to_uppercase()).copied()
    }

    /// First unit of measure whose name starts like `name`
    pub fn uom_like(&self, name: &str) -> Option<i64> {
        let prefix: String = name.to_uppercase().chars().take(6).collect();
        if prefix.is_empty() {
            return None;
        }
        self.uoms
            .iter()
            .filter(|(uom, _)| uom.contains(&prefix))
            .map(|(_, id)| *id)
            .min()
    }

    pub const fn default_uom(&self) -> Option<i64> {
        self.default_uom
    }

    pub fn identification_type(&self, vat_code: &str) -> Option<i64> {
        self.identification_types.get(vat_code).copied()
    }

    pub fn category(&self, name: &str) -> Option<i64> {
        self.categories.get(name).copied()
    }

    pub fn product(&self, name: &str) -> Option<i64> {
        self.products.get(name).copied()
    }

    pub fn partner_by_import(&self, import_id: i64) -> Option<i64> {
        self.partners_by_import.get(&import_id).copied()
    }

    pub fn partner_by_vat(&self, vat: &str) -> Option<i64> {
        self.partners_by_vat.get(vat).copied()
    }

    pub fn remember_product(&mut self, name: &str, id: i64) {
        self.products.entry(name.to_string()).or_insert(id);
    }

    pub fn remember_partner(&mut self, import_id: Option<i64>, vat: Option<&str>, id: i64) {
        if let Some(import_id) = import_id {
            self.partners_by_import.entry(import_id).or_insert(id);
        }
        if let Some(vat) = vat {
            self.partners_by_vat.entry(vat.to_string()).or_insert(id);
        }
    }

    pub fn remember_category(&mut self, name: &str, id: i64) {
        self.categories.entry(name.to_string()).or_insert(id);
    }
}

fn by_name(
    references: &SqliteReferenceRepository<'_>,
    table: RefTable,
) -> Result<HashMap<String, i64>> {
    let mut map = HashMap::new();
    for row in references.list(table)? {
        map.entry(row.name).or_insert(row.id);
    }
    Ok(map)
}

/// Remote tables read in full once per run, keyed by remote id
#[derive(Debug, Clone, Default)]
pub struct RemoteLookups {
    pub products: HashMap<i64, RemoteRecord>,
    pub identification_types: HashMap<i64, RemoteRecord>,
    pub countries: HashMap<i64, RemoteRecord>,
    pub states: HashMap<i64, RemoteRecord>,
    pub cities: HashMap<i64, RemoteRecord>,
    pub districts: HashMap<i64, RemoteRecord>,
}

pub const PRODUCT_FIELDS: &[&str] = &[
    "id",
    "name",
    "list_price",
    "type",
    "standard_price",
    "default_code",
];

impl RemoteLookups {
    pub fn load_products(&mut self, session: &dyn RemoteSession) -> Result<()> {
        self.products = read_all_by_id(session, "product.product", PRODUCT_FIELDS)?;
        tracing::debug!("Remote lookups: {} products", self.products.len());
        Ok(())
    }

    /// Identification types and, where the layout has the models, the
    /// country/state/city/district hierarchy
    pub fn load_geography(
        &mut self,
        session: &dyn RemoteSession,
        layout: &PartnerLayout,
    ) -> Result<()> {
        self.identification_types = read_all_by_id(
            session,
            layout.identification_model,
            &["name", layout.identification_code_field],
        )?;
        if layout.geography_models {
            self.countries = read_all_by_id(session, "res.country", &["name"])?;
            self.states = read_all_by_id(session, "res.country.state", &["name"])?;
            self.cities = read_all_by_id(session, "res.city", &["name"])?;
            self.districts = read_all_by_id(session, "l10n_pe.res.city.district", &["name"])?;
        }
        tracing::debug!(
            "Remote lookups: {} identification types, {} countries, {} states, {} cities, {} districts",
            self.identification_types.len(),
            self.countries.len(),
            self.states.len(),
            self.cities.len(),
            self.districts.len()
        );
        Ok(())
    }

    /// Name of the remote record `id` in `table`, falling back to `fallback`
    pub fn name_in<'a>(
        table: &'a HashMap<i64, RemoteRecord>,
        id: i64,
        fallback: Option<&'a str>,
    ) -> Option<&'a str> {
        table
            .get(&id)
            .and_then(|record| record.str("name"))
            .or(fallback)
    }
}

/// Counters of placeholders created during a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    pub partners_created: usize,
    pub products_created: usize,
    pub categories_created: usize,
}

/// State shared by the stages of one run
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    /// Connection name written to the sync log
    pub connection: String,
    pub options: SyncOptions,
    pub cache: LookupCache,
    pub remote: RemoteLookups,
    pub counters: RunCounters,
}

impl RunContext {
    pub fn new(connection: impl Into<String>, options: SyncOptions, cache: LookupCache) -> Self {
        Self {
            run_id: uuid::Uuid::now_v7().to_string(),
            connection: connection.into(),
            options,
            cache,
            remote: RemoteLookups::default(),
            counters: RunCounters::default(),
        }
    }
}
