//! Remote-to-local sync pipeline.
//!
//! A run goes through four stages: the planner searches the remote side and
//! drops records already imported, the remaining ids are split into chunks,
//! each chunk is fetched in one round trip and transformed against the
//! run's lookup caches, and the transformed batch is committed in a single
//! local transaction before per-record post-processing.

mod cache;
mod chunk;
mod ecommerce;
mod engine;
mod invoice;
mod lot;
mod partner;
mod planner;
mod product;
mod resolver;
mod sale_order;

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{SyncSettings, DEFAULT_CHUNK_SIZE};
use crate::error::{Error, Result};
use crate::models::{RecordKind, RemoteRecord, SourceVersion};
use crate::rpc::{Domain, RemoteSession};

pub use cache::{LookupCache, RemoteLookups, RunContext, RunCounters};
pub use chunk::Chunks;
pub use ecommerce::{EcommercePipeline, PublicCategory};
pub use engine::{RefreshReport, RepairReport, SyncEngine};
pub use invoice::InvoicePipeline;
pub use lot::LotPipeline;
pub use partner::PartnerPipeline;
pub use planner::{plan, Plan};
pub use product::ProductPipeline;
pub use resolver::{
    CategoryResolver, CurrencyResolver, JournalResolver, PartnerResolver, PaymentTermResolver,
    ProductResolver, ReferenceResolver, Resolution, ShopResolver, UomResolver,
};
pub use sale_order::SaleOrderPipeline;

/// Parameters of one sync run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    pub kind: RecordKind,
    pub version: SourceVersion,
    /// Issue date range for accounting kinds, inclusive
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    /// Substring filter on the document number
    pub name_filter: Option<String>,
    /// Remote company filter
    pub company_id: Option<i64>,
    pub chunk_size: usize,
    /// Cap on the remote search; `None` searches everything
    pub limit: Option<usize>,
    /// Remote id range for product runs
    pub start_id: Option<i64>,
    pub end_id: Option<i64>,
    pub default_tax_id: Option<i64>,
    pub local_company_id: Option<i64>,
    pub location_id: Option<i64>,
}

impl SyncOptions {
    /// Options for `kind` covering the current month
    pub fn new(kind: RecordKind, version: SourceVersion) -> Self {
        let (date_from, date_to) = crate::util::month_bounds(chrono::Local::now().date_naive());
        Self {
            kind,
            version,
            date_from,
            date_to,
            name_filter: kind.default_name_filter().map(str::to_string),
            company_id: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            limit: None,
            start_id: None,
            end_id: None,
            default_tax_id: None,
            local_company_id: None,
            location_id: None,
        }
    }

    /// Fill the run defaults from persisted settings
    #[must_use]
    pub fn with_settings(mut self, settings: &SyncSettings) -> Self {
        self.chunk_size = settings.chunk_size;
        self.default_tax_id = settings.default_tax_id;
        self.company_id = settings.company_id;
        self.local_company_id = settings.local_company_id;
        self.location_id = settings.location_id;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidInput(
                "chunk size must be greater than zero".into(),
            ));
        }
        if self.date_from > self.date_to {
            return Err(Error::InvalidInput(format!(
                "date range is empty: {} is after {}",
                self.date_from, self.date_to
            )));
        }
        if self.kind == RecordKind::SaleOrder && self.version != SourceVersion::V11 {
            return Err(Error::InvalidInput(
                "sale order receipts are only read from v11 instances".into(),
            ));
        }
        if let (Some(start), Some(end)) = (self.start_id, self.end_id) {
            if start > end {
                return Err(Error::InvalidInput(format!(
                    "id range is empty: {start} is after {end}"
                )));
            }
        }
        Ok(())
    }

    /// Tax ids stamped on imported lines and products
    pub fn default_taxes(&self) -> Vec<i64> {
        self.default_tax_id.into_iter().collect()
    }
}

/// A record left out of a run, with the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRecord {
    pub remote_id: i64,
    pub name: String,
    pub reason: String,
}

/// Outcome of a sync run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub run_id: String,
    /// Ids matched by the remote search
    pub found: usize,
    /// Ids dropped because a local record already exists
    pub already_imported: usize,
    pub created: usize,
    pub skipped: Vec<SkippedRecord>,
    pub chunks: usize,
}

impl SyncReport {
    pub fn summary(&self) -> String {
        format!(
            "found {}, already imported {}, created {}, skipped {} in {} chunk(s)",
            self.found,
            self.already_imported,
            self.created,
            self.skipped.len(),
            self.chunks
        )
    }
}

/// A remote record fetched for transformation, with the identity used in
/// logs and reports
#[derive(Debug, Clone)]
pub struct Fetched<S> {
    pub remote_id: i64,
    pub name: String,
    pub source: S,
}

/// What the transform stage decided for one record
#[derive(Debug)]
pub enum Outcome<T> {
    Create(T),
    /// A matching local record exists
    AlreadyImported,
    Skip(String),
}

/// One record kind flowing through the four sync stages
pub trait RecordPipeline {
    /// Everything the transform stage needs about one remote record
    type Source;
    /// Transformed values ready for the batch insert
    type Item: Serialize;

    /// Remote model searched by the planner
    fn remote_model(&self) -> &'static str;

    /// Remote sort order, the natural display key
    fn order(&self) -> &'static str;

    fn domain(&self, options: &SyncOptions) -> Domain;

    /// Fields the planner reads to decide whether a record is imported
    fn key_fields(&self) -> &'static [&'static str];

    fn is_imported(&self, conn: &Connection, key: &RemoteRecord) -> Result<bool>;

    /// Build the run caches; called once with the planning session
    fn prepare(
        &self,
        _session: &dyn RemoteSession,
        _conn: &Connection,
        _ctx: &mut RunContext,
    ) -> Result<()> {
        Ok(())
    }

    /// Fetch one chunk
    fn fetch(&self, session: &dyn RemoteSession, ids: &[i64]) -> Result<Vec<Fetched<Self::Source>>>;

    /// Turn one fetched record into local values.
    ///
    /// Placeholders created while resolving references go through `conn`, so
    /// they share the batch transaction.
    fn transform(
        &self,
        conn: &Connection,
        ctx: &mut RunContext,
        source: &Self::Source,
    ) -> Result<Outcome<Self::Item>>;

    /// Insert the transformed values; returns the local id
    fn create(&self, conn: &Connection, item: &Self::Item) -> Result<i64>;

    /// Per-record work after the batch commit
    fn post_process(&self, _conn: &Connection, _item: &Self::Item, _local_id: i64) -> Result<()> {
        Ok(())
    }

    /// Terminal per-record pass after every record of the chunk is post-processed
    fn finalize(&self, _conn: &Connection, _item: &Self::Item, _local_id: i64) -> Result<()> {
        Ok(())
    }

    /// Payload stored in the sync log
    fn log_payload(&self, item: &Self::Item) -> Result<Value> {
        Ok(serde_json::to_value(item)?)
    }
}
