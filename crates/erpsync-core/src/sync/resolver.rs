//! Foreign-key resolution against the run caches.
//!
//! Each reference kind has its own resolver. A resolver either finds the
//! local id in the run cache or describes the minimal placeholder to create;
//! kinds that cannot be created fail with `Error::Reference`, which skips
//! the record being transformed.

use std::convert::Infallible;

use rusqlite::Connection;

use super::partner::{partner_values, PartnerLayout};
use super::RunContext;
use crate::db::{
    PartnerRepository, ProductRepository, RefTable, ReferenceRepository, SqlitePartnerRepository,
    SqliteProductRepository, SqliteReferenceRepository,
};
use crate::error::{Error, Result};
use crate::models::{NewPartner, NewProduct, ReferenceKind, RemoteRecord};

/// Result of resolving one reference
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<P> {
    /// The local id is already known
    CacheHit(i64),
    /// Nothing matches; these are the values of the record to create
    CreatePlaceholder(P),
}

impl Resolution<Infallible> {
    pub fn id(self) -> i64 {
        match self {
            Self::CacheHit(id) => id,
            Self::CreatePlaceholder(never) => match never {},
        }
    }
}

pub trait ReferenceResolver {
    type Key: ?Sized;
    type Placeholder;

    const KIND: ReferenceKind;

    fn resolve(
        &self,
        conn: &Connection,
        ctx: &RunContext,
        key: &Self::Key,
    ) -> Result<Resolution<Self::Placeholder>>;
}

/// Journal from the document-number prefix (`F001-00000042` → `F001`)
#[derive(Debug, Clone, Copy, Default)]
pub struct JournalResolver;

impl JournalResolver {
    pub fn code(number: &str) -> &str {
        number.split('-').next().unwrap_or(number).trim()
    }
}

impl ReferenceResolver for JournalResolver {
    type Key = str;
    type Placeholder = Infallible;

    const KIND: ReferenceKind = ReferenceKind::Journal;

    fn resolve(&self, _conn: &Connection, ctx: &RunContext, number: &str) -> Result<Resolution<Infallible>> {
        let code = Self::code(number);
        ctx.cache
            .journal(code)
            .map(|journal| Resolution::CacheHit(journal.id))
            .ok_or_else(|| Error::reference(Self::KIND, code))
    }
}

/// Currency by name, optionally falling back to a default currency
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrencyResolver {
    pub fallback: Option<&'static str>,
}

impl ReferenceResolver for CurrencyResolver {
    type Key = str;
    type Placeholder = Infallible;

    const KIND: ReferenceKind = ReferenceKind::Currency;

    fn resolve(&self, _conn: &Connection, ctx: &RunContext, name: &str) -> Result<Resolution<Infallible>> {
        ctx.cache
            .currency(name)
            .or_else(|| self.fallback.and_then(|fallback| ctx.cache.currency(fallback)))
            .map(Resolution::CacheHit)
            .ok_or_else(|| Error::reference(Self::KIND, name))
    }
}

/// Shop by code, optionally falling back to the main shop
#[derive(Debug, Clone, Copy, Default)]
pub struct ShopResolver {
    pub fallback_to_first: bool,
}

impl ReferenceResolver for ShopResolver {
    type Key = str;
    type Placeholder = Infallible;

    const KIND: ReferenceKind = ReferenceKind::Shop;

    fn resolve(&self, _conn: &Connection, ctx: &RunContext, code: &str) -> Result<Resolution<Infallible>> {
        ctx.cache
            .shop(code)
            .or_else(|| {
                self.fallback_to_first
                    .then(|| ctx.cache.first_shop())
                    .flatten()
            })
            .map(Resolution::CacheHit)
            .ok_or_else(|| Error::reference(Self::KIND, code))
    }
}

/// Payment term by exact name, or by fuzzy name with a cash fallback
#[derive(Debug, Clone, Copy, Default)]
pub struct PaymentTermResolver {
    pub fuzzy: bool,
}

/// Payment term used when the fuzzy match finds nothing
pub const CASH_PAYMENT_TERM: &str = "Contado";

impl ReferenceResolver for PaymentTermResolver {
    type Key = str;
    type Placeholder = Infallible;

    const KIND: ReferenceKind = ReferenceKind::PaymentTerm;

    fn resolve(&self, _conn: &Connection, ctx: &RunContext, name: &str) -> Result<Resolution<Infallible>> {
        let found = if self.fuzzy {
            ctx.cache
                .payment_term_like(name)
                .or_else(|| ctx.cache.payment_term_like(CASH_PAYMENT_TERM))
        } else {
            ctx.cache.payment_term(name)
        };
        found
            .map(Resolution::CacheHit)
            .ok_or_else(|| Error::reference(Self::KIND, name))
    }
}

/// Unit of measure by name, falling back to the first local unit
#[derive(Debug, Clone, Copy, Default)]
pub struct UomResolver {
    pub fuzzy: bool,
}

impl ReferenceResolver for UomResolver {
    type Key = str;
    type Placeholder = Infallible;

    const KIND: ReferenceKind = ReferenceKind::Uom;

    fn resolve(&self, _conn: &Connection, ctx: &RunContext, name: &str) -> Result<Resolution<Infallible>> {
        let found = if self.fuzzy {
            ctx.cache.uom_like(name)
        } else {
            ctx.cache.uom(name)
        };
        found
            .or_else(|| ctx.cache.default_uom())
            .map(Resolution::CacheHit)
            .ok_or_else(|| Error::reference(Self::KIND, name))
    }
}

/// Product by name; unknown products become placeholders built from the
/// remote product record
#[derive(Debug, Clone, Default)]
pub struct ProductResolver {
    pub tax_ids: Vec<i64>,
}

impl ReferenceResolver for ProductResolver {
    type Key = RemoteRecord;
    type Placeholder = NewProduct;

    const KIND: ReferenceKind = ReferenceKind::Product;

    fn resolve(&self, _conn: &Connection, ctx: &RunContext, remote: &RemoteRecord) -> Result<Resolution<NewProduct>> {
        let name = remote
            .text("name")
            .ok_or_else(|| Error::reference(Self::KIND, remote.id().to_string()))?;
        if let Some(id) = ctx.cache.product(&name) {
            return Ok(Resolution::CacheHit(id));
        }
        Ok(Resolution::CreatePlaceholder(NewProduct {
            list_price: remote.f64("list_price").unwrap_or_default(),
            standard_price: remote.f64("standard_price").unwrap_or_default(),
            detailed_type: remote
                .str("type")
                .and_then(|kind| kind.parse().ok())
                .unwrap_or_default(),
            default_code: remote.text("default_code"),
            tax_ids: self.tax_ids.clone(),
            ..NewProduct::named(name)
        }))
    }
}

/// How a document's customer is matched against local partners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartnerMatch {
    ImportId,
    /// Import id first, then tax id
    Vat,
}

/// Document customer by import id or tax id; unknown customers become
/// placeholders
#[derive(Debug, Clone, Copy)]
pub struct PartnerResolver {
    pub matching: PartnerMatch,
    pub layout: PartnerLayout,
}

impl ReferenceResolver for PartnerResolver {
    type Key = RemoteRecord;
    type Placeholder = NewPartner;

    const KIND: ReferenceKind = ReferenceKind::Partner;

    fn resolve(&self, conn: &Connection, ctx: &RunContext, remote: &RemoteRecord) -> Result<Resolution<NewPartner>> {
        let found = match self.matching {
            PartnerMatch::ImportId => ctx.cache.partner_by_import(remote.id()),
            PartnerMatch::Vat => ctx.cache.partner_by_import(remote.id()).or_else(|| {
                remote
                    .text("vat")
                    .and_then(|vat| ctx.cache.partner_by_vat(&vat))
            }),
        };
        if let Some(id) = found {
            return Ok(Resolution::CacheHit(id));
        }
        Ok(Resolution::CreatePlaceholder(partner_values(
            conn,
            ctx,
            &self.layout,
            remote,
            true,
        )?))
    }
}

/// Category to create, parent first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryPlaceholder {
    pub name: String,
    pub parent: Option<String>,
}

/// Product category by name; the key is `(name, parent name)`
#[derive(Debug, Clone, Copy, Default)]
pub struct CategoryResolver;

impl ReferenceResolver for CategoryResolver {
    type Key = (String, Option<String>);
    type Placeholder = CategoryPlaceholder;

    const KIND: ReferenceKind = ReferenceKind::Category;

    fn resolve(
        &self,
        _conn: &Connection,
        ctx: &RunContext,
        (name, parent): &(String, Option<String>),
    ) -> Result<Resolution<CategoryPlaceholder>> {
        if let Some(id) = ctx.cache.category(name) {
            return Ok(Resolution::CacheHit(id));
        }
        Ok(Resolution::CreatePlaceholder(CategoryPlaceholder {
            name: name.clone(),
            parent: parent.clone(),
        }))
    }
}

/// Resolve a product, creating the placeholder when needed
pub fn ensure_product(
    conn: &Connection,
    ctx: &mut RunContext,
    resolver: &ProductResolver,
    remote: &RemoteRecord,
) -> Result<i64> {
    match resolver.resolve(conn, ctx, remote)? {
        Resolution::CacheHit(id) => Ok(id),
        Resolution::CreatePlaceholder(product) => {
            let id = SqliteProductRepository::new(conn).create(&product)?;
            ctx.cache.remember_product(&product.name, id);
            ctx.counters.products_created += 1;
            tracing::debug!("Created placeholder product {} ({id})", product.name);
            Ok(id)
        }
    }
}

/// Resolve a customer, creating the placeholder when needed
pub fn ensure_partner(
    conn: &Connection,
    ctx: &mut RunContext,
    resolver: &PartnerResolver,
    remote: &RemoteRecord,
) -> Result<i64> {
    match resolver.resolve(conn, ctx, remote)? {
        Resolution::CacheHit(id) => Ok(id),
        Resolution::CreatePlaceholder(partner) => {
            let id = SqlitePartnerRepository::new(conn).create(&partner)?;
            ctx.cache
                .remember_partner(partner.import_id, partner.vat.as_deref(), id);
            ctx.counters.partners_created += 1;
            tracing::debug!("Created placeholder partner {} ({id})", partner.name);
            Ok(id)
        }
    }
}

/// Resolve a category, creating it and its parent when needed
pub fn ensure_category(
    conn: &Connection,
    ctx: &mut RunContext,
    name: &str,
    parent: Option<&str>,
) -> Result<i64> {
    let key = (name.to_string(), parent.map(str::to_string));
    match CategoryResolver.resolve(conn, ctx, &key)? {
        Resolution::CacheHit(id) => Ok(id),
        Resolution::CreatePlaceholder(category) => {
            let references = SqliteReferenceRepository::new(conn);
            let parent_id = match category.parent.as_deref() {
                Some(parent) => Some(ensure_category(conn, ctx, parent, None)?),
                None => None,
            };
            let id = references.insert(RefTable::Category, &category.name, None, parent_id)?;
            ctx.cache.remember_category(&category.name, id);
            ctx.counters.categories_created += 1;
            Ok(id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{load_reference_data, Database, ReferenceData};
    use crate::models::{ProductType, RecordKind, SourceVersion};
    use crate::sync::{LookupCache, SyncOptions};
    use serde_json::json;

    fn setup() -> (Database, RunContext) {
        let db = Database::open_in_memory().unwrap();
        let data = ReferenceData::from_json(
            r#"{
                "journals": [{"code": "F001", "name": "Facturas"}],
                "currencies": ["PEN", "USD"],
                "payment_terms": ["Contado", "Credito 30 dias"],
                "shops": [{"code": "0001", "name": "Principal"}, {"code": "0002", "name": "Sucursal"}],
                "uoms": ["Unidades", "Kg"],
                "categories": [{"name": "Laptops", "parent": "All"}]
            }"#,
        )
        .unwrap();
        load_reference_data(db.connection(), &data).unwrap();
        let ctx = RunContext::new(
            "prod",
            SyncOptions::new(RecordKind::Invoice, SourceVersion::V13),
            LookupCache::load(db.connection()).unwrap(),
        );
        (db, ctx)
    }

    #[test]
    fn journal_comes_from_number_prefix() {
        let (db, ctx) = setup();
        let conn = db.connection();
        assert_eq!(JournalResolver::code("F001-00000042"), "F001");
        assert_eq!(JournalResolver.resolve(conn, &ctx, "F001-42").unwrap().id(), 1);

        let error = JournalResolver.resolve(conn, &ctx, "F009-1").unwrap_err();
        assert!(error.is_recoverable());
        assert_eq!(error.to_string(), "journal not found: F009");
    }

    #[test]
    fn currency_and_shop_fallbacks() {
        let (db, ctx) = setup();
        let conn = db.connection();
        let strict = CurrencyResolver::default();
        let lenient = CurrencyResolver {
            fallback: Some("PEN"),
        };
        assert_eq!(strict.resolve(conn, &ctx, "USD").unwrap().id(), 2);
        assert!(strict.resolve(conn, &ctx, "EUR").is_err());
        assert_eq!(lenient.resolve(conn, &ctx, "EUR").unwrap().id(), 1);

        assert!(ShopResolver::default().resolve(conn, &ctx, "0009").is_err());
        let shop = ShopResolver {
            fallback_to_first: true,
        };
        assert_eq!(shop.resolve(conn, &ctx, "0009").unwrap().id(), 1);
        assert_eq!(shop.resolve(conn, &ctx, "0002").unwrap().id(), 2);
    }

    #[test]
    fn payment_term_and_uom() {
        let (db, ctx) = setup();
        let conn = db.connection();
        assert!(PaymentTermResolver::default()
            .resolve(conn, &ctx, "Credito")
            .is_err());
        let fuzzy = PaymentTermResolver { fuzzy: true };
        assert_eq!(fuzzy.resolve(conn, &ctx, "credito").unwrap().id(), 2);
        assert_eq!(fuzzy.resolve(conn, &ctx, "Letras").unwrap().id(), 1);

        assert_eq!(UomResolver::default().resolve(conn, &ctx, "kg").unwrap().id(), 2);
        assert_eq!(UomResolver::default().resolve(conn, &ctx, "Caja").unwrap().id(), 1);
    }

    #[test]
    fn unknown_product_becomes_placeholder_once() {
        let (db, mut ctx) = setup();
        let resolver = ProductResolver { tax_ids: vec![] };
        let remote = RemoteRecord::from(json!({
            "id": 5, "name": "MOUSE USB", "list_price": 25.0, "type": "product",
            "standard_price": 12.5, "default_code": false
        }));

        let Resolution::CreatePlaceholder(product) = resolver.resolve(db.connection(), &ctx, &remote).unwrap() else {
            panic!("expected a placeholder");
        };
        assert_eq!(product.detailed_type, ProductType::Product);
        assert_eq!(product.default_code, None);

        let first = ensure_product(db.connection(), &mut ctx, &resolver, &remote).unwrap();
        let second = ensure_product(db.connection(), &mut ctx, &resolver, &remote).unwrap();
        assert_eq!(first, second);
        assert_eq!(ctx.counters.products_created, 1);
    }

    #[test]
    fn unknown_partner_is_created_once() {
        let (db, mut ctx) = setup();
        let resolver = PartnerResolver {
            matching: PartnerMatch::ImportId,
            layout: PartnerLayout::for_version(SourceVersion::V13),
        };
        let remote = RemoteRecord::from(json!({"id": 44, "name": "Cliente", "vat": "20111111111"}));

        let first = ensure_partner(db.connection(), &mut ctx, &resolver, &remote).unwrap();
        let second = ensure_partner(db.connection(), &mut ctx, &resolver, &remote).unwrap();
        assert_eq!(first, second);
        assert_eq!(ctx.counters.partners_created, 1);
    }

    #[test]
    fn customer_without_vat_is_matched_by_import_id() {
        let (db, mut ctx) = setup();
        let resolver = PartnerResolver {
            matching: PartnerMatch::Vat,
            layout: PartnerLayout::for_version(SourceVersion::V11),
        };
        let remote = RemoteRecord::from(json!({"id": 8, "name": "Clientes Varios", "vat": false}));

        let first = ensure_partner(db.connection(), &mut ctx, &resolver, &remote).unwrap();
        let second = ensure_partner(db.connection(), &mut ctx, &resolver, &remote).unwrap();
        assert_eq!(first, second);
        assert_eq!(ctx.counters.partners_created, 1);

        // a different remote customer with a known tax id still matches by vat
        let other = RemoteRecord::from(json!({"id": 9, "name": "ACME", "vat": "20100000001"}));
        let acme = ensure_partner(db.connection(), &mut ctx, &resolver, &other).unwrap();
        let same_vat = RemoteRecord::from(json!({"id": 10, "name": "ACME SAC", "vat": "20100000001"}));
        assert_eq!(ensure_partner(db.connection(), &mut ctx, &resolver, &same_vat).unwrap(), acme);
        assert_eq!(ctx.counters.partners_created, 2);
    }

    #[test]
    fn category_creates_parent_first() {
        let (db, mut ctx) = setup();
        let existing = ensure_category(db.connection(), &mut ctx, "Laptops", Some("All")).unwrap();
        assert_eq!(ctx.counters.categories_created, 0);

        let created = ensure_category(db.connection(), &mut ctx, "Mouses", Some("Accesorios")).unwrap();
        assert_ne!(created, existing);
        assert_eq!(ctx.counters.categories_created, 2);
        assert!(ctx.cache.category("Accesorios").is_some());
    }
}
