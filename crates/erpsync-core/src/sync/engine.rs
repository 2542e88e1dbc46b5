//! Sync run orchestration

use std::collections::HashMap;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::ecommerce::{ensure_public_categories, public_categories, PUBLIC_CATEGORY_MODEL};
use super::invoice::{edi_document, edi_fields, finish_move, read_many};
use super::product::PRODUCT_TEMPLATE_MODEL;
use super::sale_order::{sale_order_edi_fields, SALE_ORDER_MODEL};
use super::{
    plan, Chunks, EcommercePipeline, Fetched, InvoicePipeline, LookupCache, LotPipeline, Outcome,
    PartnerPipeline, ProductPipeline, RecordPipeline, RunContext, SaleOrderPipeline,
    SkippedRecord, SyncOptions, SyncReport,
};
use crate::db::{
    CatalogRepository, Database, MoveRepository, ProductRepository, SqliteCatalogRepository,
    SqliteMoveRepository, SqliteProductRepository, SqliteSyncLogRepository, SyncLogRepository,
};
use crate::error::Result;
use crate::models::{
    EdiDocument, Endpoint, MoveState, MoveType, PaymentState, ProductUpdate, RecordKind,
    SyncLogEntry,
};
use crate::rpc::{read_ordered, Connector};

/// Outcome of a product refresh
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshReport {
    pub run_id: String,
    /// Local products carrying an import id
    pub found: usize,
    pub updated: usize,
    /// Products the remote side no longer has
    pub missing: usize,
    pub chunks: usize,
}

/// Outcome of a repair pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairReport {
    /// Unfinished imported moves found
    pub checked: usize,
    pub posted: usize,
    pub settled: usize,
}

/// Runs sync stages against one remote endpoint and the local store
pub struct SyncEngine<'a, C: Connector> {
    connector: &'a C,
    endpoint: &'a Endpoint,
    db: &'a mut Database,
}

impl<'a, C: Connector> SyncEngine<'a, C> {
    pub fn new(connector: &'a C, endpoint: &'a Endpoint, db: &'a mut Database) -> Self {
        Self {
            connector,
            endpoint,
            db,
        }
    }

    /// Import every pending record of `options.kind`
    pub fn run(&mut self, options: &SyncOptions) -> Result<SyncReport> {
        options.validate()?;
        tracing::info!(
            "Sync {} from {} ({}, {} to {})",
            options.kind,
            self.endpoint.name,
            options.version,
            options.date_from,
            options.date_to
        );
        match options.kind {
            RecordKind::Invoice => self.run_pipeline(
                &InvoicePipeline::new(MoveType::OutInvoice, options.version),
                options,
            ),
            RecordKind::CreditNote => self.run_pipeline(
                &InvoicePipeline::new(MoveType::OutRefund, options.version),
                options,
            ),
            RecordKind::SaleOrder => self.run_pipeline(&SaleOrderPipeline::new(), options),
            RecordKind::Partner => self.run_pipeline(&PartnerPipeline::new(options.version), options),
            RecordKind::Product => self.run_pipeline(&ProductPipeline::new(), options),
            RecordKind::EcommerceProduct => self.run_pipeline(&EcommercePipeline::new(), options),
            RecordKind::Lot => self.run_pipeline(&LotPipeline::new(options.version), options),
        }
    }

    /// Plan, then fetch, transform and commit chunk by chunk.
    ///
    /// Each chunk opens its own session. The chunk's creations commit in one
    /// transaction; post-processing and finalization each commit per record
    /// afterwards, so a failure there leaves committed records behind for
    /// [`SyncEngine::repair`].
    pub fn run_pipeline<P: RecordPipeline>(
        &mut self,
        pipeline: &P,
        options: &SyncOptions,
    ) -> Result<SyncReport> {
        let cache = LookupCache::load(self.db.connection())?;
        let mut ctx = RunContext::new(self.endpoint.name.clone(), options.clone(), cache);

        let planned = {
            let session = self.connector.connect(self.endpoint)?;
            let planned = plan(&session, self.db.connection(), pipeline, options)?;
            if !planned.pending.is_empty() {
                pipeline.prepare(&session, self.db.connection(), &mut ctx)?;
            }
            planned
        };

        let chunks = Chunks::new(&planned.pending, options.chunk_size)?;
        let mut report = SyncReport {
            run_id: ctx.run_id.clone(),
            found: planned.found,
            already_imported: planned.already_imported,
            chunks: chunks.chunk_count(),
            ..SyncReport::default()
        };

        let total = report.chunks;
        for (index, ids) in chunks.enumerate() {
            tracing::info!("Chunk {} of {}: {} record(s)", index + 1, total, ids.len());
            let fetched = {
                let session = self.connector.connect(self.endpoint)?;
                pipeline.fetch(&session, ids)?
            };

            let created = self
                .db
                .transaction(|tx| commit_chunk(tx, pipeline, &mut ctx, fetched, &mut report))?;
            report.created += created.len();

            for (item, local_id) in &created {
                self.db
                    .transaction(|tx| pipeline.post_process(tx, item, *local_id))?;
            }
            for (item, local_id) in &created {
                self.db
                    .transaction(|tx| pipeline.finalize(tx, item, *local_id))?;
            }
        }

        tracing::info!(
            "Sync {} finished: {}; placeholders: {} partner(s), {} product(s), {} category(ies)",
            options.kind,
            report.summary(),
            ctx.counters.partners_created,
            ctx.counters.products_created,
            ctx.counters.categories_created
        );
        Ok(report)
    }

    /// Refresh tracking, company and website categories of already imported
    /// products
    pub fn refresh_products(&mut self, options: &SyncOptions) -> Result<RefreshReport> {
        options.validate()?;
        let imported = SqliteProductRepository::new(self.db.connection()).imported(options.limit)?;
        let chunks = Chunks::new(&imported, options.chunk_size)?;
        let mut report = RefreshReport {
            run_id: uuid::Uuid::now_v7().to_string(),
            found: imported.len(),
            chunks: chunks.chunk_count(),
            ..RefreshReport::default()
        };
        tracing::info!("Refreshing {} imported product(s)", report.found);

        for pairs in chunks {
            let import_ids: Vec<i64> = pairs.iter().map(|(_, import_id)| *import_id).collect();
            let (remote, categories) = {
                let session = self.connector.connect(self.endpoint)?;
                let records = read_ordered(
                    &session,
                    PRODUCT_TEMPLATE_MODEL,
                    &import_ids,
                    &["name", "tracking", "company_id", "public_categ_ids"],
                )?;
                let categories = read_many(
                    &session,
                    PUBLIC_CATEGORY_MODEL,
                    &records,
                    "public_categ_ids",
                    &["name", "parent_id"],
                )?;
                let remote: HashMap<i64, _> = records
                    .into_iter()
                    .map(|record| (record.id(), record))
                    .collect();
                (remote, categories)
            };

            let connection = self.endpoint.name.clone();
            let run_id = report.run_id.clone();
            self.db.transaction(|tx| {
                let products = SqliteProductRepository::new(tx);
                let catalog = SqliteCatalogRepository::new(tx);
                let logs = SqliteSyncLogRepository::new(tx);
                for (local_id, import_id) in pairs {
                    let Some(record) = remote.get(import_id) else {
                        tracing::warn!("Product {import_id} no longer exists on the remote side");
                        report.missing += 1;
                        continue;
                    };
                    let update = ProductUpdate {
                        tracking: record.str("tracking").and_then(|tracking| tracking.parse().ok()),
                        company_id: options.local_company_id,
                        ..ProductUpdate::default()
                    };
                    let website = public_categories(&categories, record);
                    let categ_ids = ensure_public_categories(tx, &website)?;
                    catalog.set_public_categories(*local_id, &categ_ids)?;
                    if update.is_empty() && categ_ids.is_empty() {
                        continue;
                    }
                    if !update.is_empty() {
                        products.update(*local_id, &update)?;
                    }
                    logs.append(&SyncLogEntry::new(
                        &run_id,
                        &connection,
                        PRODUCT_TEMPLATE_MODEL,
                        Some(*import_id),
                        record.text("name").unwrap_or_default(),
                        json!({
                            "import_id": import_id,
                            "tracking": update.tracking,
                            "company_id": update.company_id,
                            "public_categ_ids": categ_ids,
                        }),
                    ))?;
                    report.updated += 1;
                }
                Ok(())
            })?;
        }

        tracing::info!(
            "Refreshed {} product(s), {} missing on the remote side",
            report.updated,
            report.missing
        );
        Ok(report)
    }

    /// Post and settle imported moves a failed run left unfinished.
    ///
    /// The electronic document of each draft move is read again from the
    /// remote side by import id. Only moves whose number contains the run's
    /// name filter are repaired, so receipts and invoices of one move type
    /// are read from their own remote model.
    pub fn repair(&mut self, options: &SyncOptions) -> Result<RepairReport> {
        options.validate()?;
        let move_type = options.kind.move_type();
        let filter = options
            .name_filter
            .as_deref()
            .filter(|filter| !filter.is_empty())
            .map(str::to_lowercase);
        let moves = {
            let repository = SqliteMoveRepository::new(self.db.connection());
            let mut moves = Vec::new();
            for id in repository.unfinished_imports(move_type)? {
                if let Some(found) = repository.get(id)? {
                    if filter
                        .as_deref()
                        .map_or(true, |filter| found.name.to_lowercase().contains(filter))
                    {
                        moves.push(found);
                    }
                }
            }
            moves
        };
        let mut report = RepairReport {
            checked: moves.len(),
            ..RepairReport::default()
        };
        if moves.is_empty() {
            tracing::info!("No unfinished imports");
            return Ok(report);
        }
        tracing::info!("Repairing {} unfinished import(s)", moves.len());

        let (model, fields) = match options.kind {
            RecordKind::SaleOrder => (SALE_ORDER_MODEL, sale_order_edi_fields()),
            _ => (options.version.move_model(), edi_fields(options.version)),
        };
        for chunk in moves.chunks(options.chunk_size) {
            let drafts: Vec<i64> = chunk
                .iter()
                .filter(|found| found.state == MoveState::Draft)
                .filter_map(|found| found.import_id)
                .collect();
            let documents: HashMap<i64, EdiDocument> = if drafts.is_empty() {
                HashMap::new()
            } else {
                let session = self.connector.connect(self.endpoint)?;
                read_ordered(&session, model, &drafts, &fields)?
                    .iter()
                    .map(|record| (record.id(), edi_document(record)))
                    .collect()
            };

            for found in chunk {
                if found.state == MoveState::Draft {
                    let edi = found
                        .import_id
                        .and_then(|import_id| documents.get(&import_id))
                        .cloned()
                        .unwrap_or_default();
                    self.db
                        .transaction(|tx| finish_move(tx, found.id, &found.name, &edi))?;
                    report.posted += 1;
                }
                if found.payment_state != PaymentState::Paid {
                    self.db
                        .transaction(|tx| SqliteMoveRepository::new(tx).settle(found.id))?;
                    report.settled += 1;
                }
                tracing::info!("Repaired {}", found.name);
            }
        }
        Ok(report)
    }
}

/// Transform and create one chunk inside the batch transaction.
///
/// Returns the created items with their local ids.
fn commit_chunk<P: RecordPipeline>(
    conn: &Connection,
    pipeline: &P,
    ctx: &mut RunContext,
    fetched: Vec<Fetched<P::Source>>,
    report: &mut SyncReport,
) -> Result<Vec<(P::Item, i64)>> {
    let logs = SqliteSyncLogRepository::new(conn);
    let mut created = Vec::new();

    for record in fetched {
        let reason = match pipeline.transform(conn, ctx, &record.source) {
            Ok(Outcome::Create(item)) => {
                let local_id = pipeline.create(conn, &item)?;
                logs.append(&SyncLogEntry::new(
                    &ctx.run_id,
                    &ctx.connection,
                    pipeline.remote_model(),
                    Some(record.remote_id),
                    &record.name,
                    pipeline.log_payload(&item)?,
                ))?;
                tracing::info!(
                    "Imported {} {} ({})",
                    pipeline.remote_model(),
                    record.remote_id,
                    record.name
                );
                created.push((item, local_id));
                continue;
            }
            Ok(Outcome::AlreadyImported) => {
                tracing::debug!("{} already imported", record.name);
                report.already_imported += 1;
                continue;
            }
            Ok(Outcome::Skip(reason)) => reason,
            Err(error) if error.is_recoverable() => error.to_string(),
            Err(error) => return Err(error),
        };

        tracing::warn!("Skipped {} ({}): {reason}", record.name, record.remote_id);
        logs.append(&SyncLogEntry::new(
            &ctx.run_id,
            &ctx.connection,
            pipeline.remote_model(),
            Some(record.remote_id),
            &record.name,
            json!({ "skipped": reason }),
        ))?;
        report.skipped.push(SkippedRecord {
            remote_id: record.remote_id,
            name: record.name,
            reason,
        });
    }
    Ok(created)
}
