//! Serial lot pipeline

use std::collections::HashMap;

use rusqlite::Connection;

use super::{Fetched, Outcome, RecordPipeline, RunContext, SyncOptions};
use crate::db::{ProductRepository, SqliteProductRepository, SqliteStockRepository, StockRepository};
use crate::error::Result;
use crate::models::{normalize_serial, NewLot, RemoteRecord, SourceVersion};
use crate::rpc::{read_ordered, Domain, RemoteSession};

/// Company stamped on lots when the run does not name one
pub const DEFAULT_LOT_COMPANY: i64 = 1;
/// Stock location stamped on lots when the run does not name one
pub const DEFAULT_LOT_LOCATION: i64 = 8;

#[derive(Debug, Clone, Default)]
pub struct RemoteLot {
    pub record: RemoteRecord,
    pub product_name: Option<String>,
}

/// Imports serial lots, matching products by name
#[derive(Debug, Clone, Copy)]
pub struct LotPipeline {
    version: SourceVersion,
}

impl LotPipeline {
    pub const fn new(version: SourceVersion) -> Self {
        Self { version }
    }
}

/// Product name without the `[CODE] ` prefix of remote display names
fn strip_code(display_name: &str) -> &str {
    display_name
        .strip_prefix('[')
        .and_then(|rest| rest.split_once("] "))
        .map_or(display_name, |(_, name)| name)
        .trim()
}

fn local_product(conn: &Connection, ctx: Option<&RunContext>, name: &str) -> Result<Option<i64>> {
    if let Some(id) = ctx.and_then(|ctx| ctx.cache.product(name)) {
        return Ok(Some(id));
    }
    SqliteProductRepository::new(conn).find_by_name(name)
}

impl RecordPipeline for LotPipeline {
    type Source = RemoteLot;
    type Item = NewLot;

    fn remote_model(&self) -> &'static str {
        self.version.lot_model()
    }

    fn order(&self) -> &'static str {
        "id"
    }

    fn domain(&self, _options: &SyncOptions) -> Domain {
        Domain::new()
    }

    fn key_fields(&self) -> &'static [&'static str] {
        &["name", "product_id"]
    }

    fn is_imported(&self, conn: &Connection, key: &RemoteRecord) -> Result<bool> {
        let (Some(name), Some(product)) = (key.text("name"), key.many2one_name("product_id")) else {
            return Ok(false);
        };
        let Some(product_id) = local_product(conn, None, strip_code(product))? else {
            return Ok(false);
        };
        Ok(SqliteStockRepository::new(conn)
            .find_lot(&normalize_serial(&name), product_id, None, None)?
            .is_some())
    }

    fn fetch(&self, session: &dyn RemoteSession, ids: &[i64]) -> Result<Vec<Fetched<RemoteLot>>> {
        let records = read_ordered(session, self.remote_model(), ids, &["id", "name", "product_id"])?;

        let mut product_ids: Vec<i64> = records
            .iter()
            .filter_map(|record| record.many2one_id("product_id"))
            .collect();
        product_ids.sort_unstable();
        product_ids.dedup();
        let products: HashMap<i64, String> = read_ordered(session, "product.product", &product_ids, &["name"])?
            .into_iter()
            .filter_map(|product| product.text("name").map(|name| (product.id(), name)))
            .collect();

        Ok(records
            .into_iter()
            .map(|record| {
                let product_name = record.many2one("product_id").map(|(id, display_name)| {
                    products
                        .get(&id)
                        .cloned()
                        .unwrap_or_else(|| strip_code(display_name).to_string())
                });
                Fetched {
                    remote_id: record.id(),
                    name: record.text("name").unwrap_or_default(),
                    source: RemoteLot {
                        record,
                        product_name,
                    },
                }
            })
            .collect())
    }

    fn transform(
        &self,
        conn: &Connection,
        ctx: &mut RunContext,
        source: &RemoteLot,
    ) -> Result<Outcome<NewLot>> {
        let Some(name) = source.record.text("name").map(|name| normalize_serial(&name)) else {
            return Ok(Outcome::Skip("lot has no name".into()));
        };
        if name.is_empty() {
            return Ok(Outcome::Skip("lot has no name".into()));
        }
        let Some(product_name) = source.product_name.as_deref() else {
            return Ok(Outcome::Skip("lot has no product".into()));
        };
        let Some(product_id) = local_product(conn, Some(&*ctx), product_name)? else {
            return Ok(Outcome::Skip(format!("product not found: {product_name}")));
        };

        if SqliteStockRepository::new(conn)
            .find_lot(&name, product_id, None, None)?
            .is_some()
        {
            return Ok(Outcome::AlreadyImported);
        }

        Ok(Outcome::Create(NewLot {
            name,
            product_id,
            company_id: Some(ctx.options.local_company_id.unwrap_or(DEFAULT_LOT_COMPANY)),
            location_id: Some(ctx.options.location_id.unwrap_or(DEFAULT_LOT_LOCATION)),
        }))
    }

    fn create(&self, conn: &Connection, item: &NewLot) -> Result<i64> {
        SqliteStockRepository::new(conn).create_lot(item)
    }
}
