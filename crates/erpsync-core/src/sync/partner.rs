//! Partner pipeline and the shared partner value builder

use rusqlite::Connection;

use super::cache::RemoteLookups;
use super::{Fetched, Outcome, RecordPipeline, RunContext, SyncOptions};
use crate::db::{
    PartnerRepository, RefTable, ReferenceRepository, SqlitePartnerRepository,
    SqliteReferenceRepository,
};
use crate::error::Result;
use crate::models::{CompanyType, NewPartner, RemoteRecord, SourceVersion};
use crate::rpc::{read_ordered, Domain, RemoteSession};

/// Tax id given to placeholder partners whose remote record has none
pub const PLACEHOLDER_VAT: &str = "00000000";

/// Partner field names of a remote layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartnerLayout {
    pub identification_field: &'static str,
    pub identification_model: &'static str,
    pub identification_code_field: &'static str,
    pub city_field: &'static str,
    pub district_field: &'static str,
    /// Whether the country/state/city/district models can be read in full
    pub geography_models: bool,
}

impl PartnerLayout {
    pub const fn for_version(version: SourceVersion) -> Self {
        match version {
            SourceVersion::V11 => Self {
                identification_field: "catalog_06_id",
                identification_model: "einvoice.catalog.06",
                identification_code_field: "code",
                city_field: "province_id",
                district_field: "district_id",
                geography_models: false,
            },
            SourceVersion::V13 => Self {
                identification_field: "l10n_latam_identification_type_id",
                identification_model: "l10n_latam.identification.type",
                identification_code_field: "l10n_pe_vat_code",
                city_field: "city_id",
                district_field: "l10n_pe_district",
                geography_models: true,
            },
        }
    }

    pub fn fields(&self) -> Vec<&'static str> {
        vec![
            "id",
            "name",
            "vat",
            "street",
            "zip",
            "country_id",
            "state_id",
            self.city_field,
            self.district_field,
            self.identification_field,
        ]
    }

    /// Tax identification code of the partner's document type
    fn identification_code(&self, lookups: &RemoteLookups, partner: &RemoteRecord) -> Option<String> {
        let id = partner.many2one_id(self.identification_field)?;
        lookups
            .identification_types
            .get(&id)?
            .text(self.identification_code_field)
    }
}

/// How partner geography is matched against local reference data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoMatch {
    /// Case-insensitive substring, each level within its parent
    Hierarchical,
    /// Exact name, levels independent
    Exact,
}

/// Local values for the remote partner `partner`.
///
/// `placeholder` builds the minimal record created while resolving a
/// document's customer: the name is kept as-is and a missing tax id becomes
/// [`PLACEHOLDER_VAT`]. Otherwise names are uppercased for a full import.
pub fn partner_values(
    conn: &Connection,
    ctx: &RunContext,
    layout: &PartnerLayout,
    partner: &RemoteRecord,
    placeholder: bool,
) -> Result<NewPartner> {
    let references = SqliteReferenceRepository::new(conn);
    let remote_vat = partner.text("vat");
    let company_type = CompanyType::from_vat(remote_vat.as_deref());
    let name = partner.text("name").unwrap_or_default();

    let mut values = if placeholder {
        let mut values = NewPartner::new(
            name,
            Some(remote_vat.unwrap_or_else(|| PLACEHOLDER_VAT.to_string())),
        );
        values.street = partner.text("street");
        values
    } else {
        let mut values = NewPartner::new(name.to_uppercase(), remote_vat);
        values.street = partner.text("street").map(|street| street.to_uppercase());
        values
    };
    values.company_type = company_type;
    values.zip = partner.text("zip");
    values.import_id = Some(partner.id());
    values.identification_type_id = layout
        .identification_code(&ctx.remote, partner)
        .and_then(|code| ctx.cache.identification_type(&code));

    let geo = if placeholder {
        GeoMatch::Exact
    } else {
        GeoMatch::Hierarchical
    };
    let remote = &ctx.remote;
    let country = partner
        .many2one("country_id")
        .and_then(|(id, name)| RemoteLookups::name_in(&remote.countries, id, Some(name)));
    let state = partner
        .many2one("state_id")
        .and_then(|(id, name)| RemoteLookups::name_in(&remote.states, id, Some(name)));
    let city = partner
        .many2one(layout.city_field)
        .and_then(|(id, name)| RemoteLookups::name_in(&remote.cities, id, Some(name)));
    let district = partner
        .many2one(layout.district_field)
        .and_then(|(id, name)| RemoteLookups::name_in(&remote.districts, id, Some(name)));

    match geo {
        GeoMatch::Exact => {
            let exact = |table, name: Option<&str>| -> Result<Option<i64>> {
                match name.filter(|name| !name.is_empty()) {
                    Some(name) => references.find_by_name(table, name, None),
                    None => Ok(None),
                }
            };
            values.country_id = exact(RefTable::Country, country)?;
            values.state_id = exact(RefTable::State, state)?;
            values.city_id = exact(RefTable::City, city)?;
            values.district_id = exact(RefTable::District, district)?;
        }
        GeoMatch::Hierarchical => {
            let Some(country_id) = country
                .filter(|name| !name.is_empty())
                .map(|name| references.find_by_name(RefTable::Country, name, None))
                .transpose()?
                .flatten()
            else {
                return Ok(values);
            };
            values.country_id = Some(country_id);

            let within = |table, name: Option<&str>, parent: i64| -> Result<Option<i64>> {
                match name.filter(|name| !name.is_empty()) {
                    Some(name) => references.find_by_name_like(table, name, Some(parent)),
                    None => Ok(None),
                }
            };
            values.state_id = within(RefTable::State, state, country_id)?;
            if let Some(state_id) = values.state_id {
                values.city_id = within(RefTable::City, city, state_id)?;
                if let Some(city_id) = values.city_id {
                    values.district_id = within(RefTable::District, district, city_id)?;
                }
            }
        }
    }

    Ok(values)
}

/// Imports customers and suppliers
#[derive(Debug, Clone)]
pub struct PartnerPipeline {
    layout: PartnerLayout,
}

impl PartnerPipeline {
    pub const fn new(version: SourceVersion) -> Self {
        Self {
            layout: PartnerLayout::for_version(version),
        }
    }
}

impl RecordPipeline for PartnerPipeline {
    type Source = RemoteRecord;
    type Item = NewPartner;

    fn remote_model(&self) -> &'static str {
        "res.partner"
    }

    fn order(&self) -> &'static str {
        "name"
    }

    fn domain(&self, _options: &SyncOptions) -> Domain {
        Domain::new()
    }

    fn key_fields(&self) -> &'static [&'static str] {
        &["vat"]
    }

    fn is_imported(&self, conn: &Connection, key: &RemoteRecord) -> Result<bool> {
        SqlitePartnerRepository::new(conn).exists(key.id(), key.text("vat").as_deref())
    }

    fn prepare(
        &self,
        session: &dyn RemoteSession,
        _conn: &Connection,
        ctx: &mut RunContext,
    ) -> Result<()> {
        ctx.remote.load_geography(session, &self.layout)
    }

    fn fetch(&self, session: &dyn RemoteSession, ids: &[i64]) -> Result<Vec<Fetched<RemoteRecord>>> {
        let fields = self.layout.fields();
        Ok(read_ordered(session, self.remote_model(), ids, &fields)?
            .into_iter()
            .map(|record| Fetched {
                remote_id: record.id(),
                name: record.text("name").unwrap_or_default(),
                source: record,
            })
            .collect())
    }

    fn transform(
        &self,
        conn: &Connection,
        ctx: &mut RunContext,
        source: &RemoteRecord,
    ) -> Result<Outcome<NewPartner>> {
        if source.text("name").is_none() {
            return Ok(Outcome::Skip("partner has no name".into()));
        }
        if self.is_imported(conn, source)? {
            return Ok(Outcome::AlreadyImported);
        }
        Ok(Outcome::Create(partner_values(
            conn,
            ctx,
            &self.layout,
            source,
            false,
        )?))
    }

    fn create(&self, conn: &Connection, item: &NewPartner) -> Result<i64> {
        SqlitePartnerRepository::new(conn).create(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{load_reference_data, Database, ReferenceData};
    use crate::models::RecordKind;
    use crate::sync::LookupCache;
    use serde_json::json;

    fn setup() -> Database {
        let db = Database::open_in_memory().unwrap();
        let data = ReferenceData::from_json(
            r#"{
                "identification_types": [{"code": "6", "name": "RUC"}, {"code": "1", "name": "DNI"}],
                "countries": [{
                    "name": "Peru",
                    "states": [{"name": "Lima", "cities": [{"name": "Lima", "districts": ["Miraflores", "San Isidro"]}]}]
                }]
            }"#,
        )
        .unwrap();
        load_reference_data(db.connection(), &data).unwrap();
        db
    }

    fn context(db: &Database) -> RunContext {
        let mut ctx = RunContext::new(
            "prod",
            SyncOptions::new(RecordKind::Partner, SourceVersion::V13),
            LookupCache::load(db.connection()).unwrap(),
        );
        ctx.remote.identification_types.insert(
            4,
            RemoteRecord::from(json!({"id": 4, "name": "RUC", "l10n_pe_vat_code": "6"})),
        );
        ctx.remote.states.insert(15, RemoteRecord::from(json!({"id": 15, "name": "Lima"})));
        ctx
    }

    fn remote_partner() -> RemoteRecord {
        RemoteRecord::from(json!({
            "id": 31,
            "name": " acme sac ",
            "vat": "20123456789",
            "street": "av. larco 123",
            "zip": false,
            "country_id": [173, "Peru"],
            "state_id": [15, "Lima (PE)"],
            "city_id": [140, "Lima"],
            "l10n_pe_district": [1500, "miraflores"],
            "l10n_latam_identification_type_id": [4, "RUC"],
        }))
    }

    #[test]
    fn full_import_uppercases_and_walks_geography() {
        let db = setup();
        let ctx = context(&db);
        let layout = PartnerLayout::for_version(SourceVersion::V13);

        let values = partner_values(db.connection(), &ctx, &layout, &remote_partner(), false).unwrap();
        assert_eq!(values.name, "ACME SAC");
        assert_eq!(values.street.as_deref(), Some("AV. LARCO 123"));
        assert_eq!(values.company_type, CompanyType::Company);
        assert_eq!(values.identification_type_id, Some(1));
        assert_eq!(values.country_id, Some(1));
        assert_eq!(values.state_id, Some(1));
        assert_eq!(values.city_id, Some(1));
        assert_eq!(values.district_id, Some(1));
        assert_eq!(values.import_id, Some(31));
        assert_eq!(values.zip, None);
    }

    #[test]
    fn placeholder_defaults_missing_vat() {
        let db = setup();
        let ctx = context(&db);
        let layout = PartnerLayout::for_version(SourceVersion::V13);
        let partner = RemoteRecord::from(json!({"id": 8, "name": "Cliente Varios", "vat": false}));

        let values = partner_values(db.connection(), &ctx, &layout, &partner, true).unwrap();
        assert_eq!(values.name, "Cliente Varios");
        assert_eq!(values.vat.as_deref(), Some(PLACEHOLDER_VAT));
        assert_eq!(values.company_type, CompanyType::Company);
        assert_eq!(values.country_id, None);
    }

    #[test]
    fn short_vat_is_a_person() {
        let db = setup();
        let ctx = context(&db);
        let layout = PartnerLayout::for_version(SourceVersion::V13);
        let partner = RemoteRecord::from(json!({"id": 9, "name": "Juan Perez", "vat": "45678912"}));

        let values = partner_values(db.connection(), &ctx, &layout, &partner, false).unwrap();
        assert_eq!(values.company_type, CompanyType::Person);
    }

    #[test]
    fn transform_skips_known_vat() {
        let db = setup();
        let mut ctx = context(&db);
        let pipeline = PartnerPipeline::new(SourceVersion::V13);
        let first = pipeline
            .transform(db.connection(), &mut ctx, &remote_partner())
            .unwrap();
        let Outcome::Create(values) = first else {
            panic!("expected a partner to create");
        };
        pipeline.create(db.connection(), &values).unwrap();

        let mut again = remote_partner();
        again.insert("id", json!(99));
        assert!(matches!(
            pipeline.transform(db.connection(), &mut ctx, &again).unwrap(),
            Outcome::AlreadyImported
        ));
    }
}
