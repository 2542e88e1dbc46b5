//! Customer invoice and credit note pipeline

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;

use super::cache::PRODUCT_FIELDS;
use super::partner::PartnerLayout;
use super::resolver::{
    ensure_partner, ensure_product, CurrencyResolver, JournalResolver, PartnerMatch,
    PartnerResolver, PaymentTermResolver, ProductResolver, ReferenceResolver, ShopResolver,
    UomResolver, CASH_PAYMENT_TERM,
};
use super::{Fetched, Outcome, RecordPipeline, RunContext, SyncOptions};
use crate::db::{
    AttachmentRepository, MoveRepository, SqliteAttachmentRepository, SqliteMoveRepository,
};
use crate::error::Result;
use crate::models::{
    EdiDocument, MoveState, MoveType, NewMove, NewMoveLine, RemoteRecord, SourceVersion,
};
use crate::rpc::{read_ordered, Domain, RemoteSession};

/// Model name attachments of electronic document requests are stored under
pub const EDI_REQUEST_MODEL: &str = "edi.request";

/// Electronic document fields shared by both layouts
pub const EDI_FIELDS: &[&str] = &[
    "comprobante_xml",
    "xml_filename",
    "comprobante_cdr",
    "cdr_filename",
    "digest_value",
    "anulada",
];

pub(super) const SHOP_MODEL: &str = "l10n_pe_edi.shop";
pub(super) const DEFAULT_CURRENCY: &str = "PEN";
pub(super) const DATE_FORMAT: &str = "%Y-%m-%d";
pub(super) const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Line fields of one remote document model
#[derive(Debug, Clone, Copy)]
pub(super) struct LineLayout {
    pub uom_field: &'static str,
    pub tax_field: &'static str,
    pub quantity_field: &'static str,
    /// Only lines carrying a sale IGV tax get the default tax
    pub check_taxes: bool,
    /// Fuzzy unit of measure match
    pub fuzzy_uom: bool,
}

/// A line whose fallible references are resolved; nothing is created yet
#[derive(Debug)]
pub(super) struct PlannedLine<'a> {
    line: &'a RemoteRecord,
    uom_id: i64,
    product: Option<RemoteRecord>,
}

/// Field names that differ between remote layouts
#[derive(Debug, Clone, Copy)]
struct MoveLayout {
    version: SourceVersion,
    due_date_field: &'static str,
    payment_term_field: &'static str,
    type_field: &'static str,
    line_uom_field: &'static str,
    line_tax_field: &'static str,
    reversal_field: &'static str,
    reversal_model: &'static str,
    origin_field: &'static str,
}

impl MoveLayout {
    const fn for_version(version: SourceVersion) -> Self {
        match version {
            SourceVersion::V11 => Self {
                version,
                due_date_field: "date_due",
                payment_term_field: "payment_term_id",
                type_field: "type",
                line_uom_field: "uom_id",
                line_tax_field: "invoice_line_tax_ids",
                reversal_field: "tipo_ncredito_id",
                reversal_model: "einvoice.catalog.09",
                origin_field: "invoice_ncredito_id",
            },
            SourceVersion::V13 => Self {
                version,
                due_date_field: "invoice_date_due",
                payment_term_field: "invoice_payment_term_id",
                type_field: "type",
                line_uom_field: "product_uom_id",
                line_tax_field: "tax_ids",
                reversal_field: "l10n_pe_edi_reversal_type_id",
                reversal_model: "l10n_pe_edi.catalog.09",
                origin_field: "reversed_entry_id",
            },
        }
    }

    /// The legacy layout falls back to defaults where the newer one skips
    const fn lenient(self) -> bool {
        matches!(self.version, SourceVersion::V11)
    }

    fn number_field(self) -> &'static str {
        self.version.number_field()
    }

    const fn lines(self) -> LineLayout {
        LineLayout {
            uom_field: self.line_uom_field,
            tax_field: self.line_tax_field,
            quantity_field: "quantity",
            check_taxes: self.lenient(),
            fuzzy_uom: self.lenient(),
        }
    }

    fn move_fields(self, move_type: MoveType) -> Vec<&'static str> {
        let mut fields = vec![
            "id",
            self.number_field(),
            self.type_field,
            self.version.date_field(),
            self.due_date_field,
            self.payment_term_field,
            "journal_id",
            "partner_id",
            "currency_id",
            "datetime_invoice",
            "invoice_line_ids",
            "state",
        ];
        if self.version == SourceVersion::V13 {
            fields.push("l10n_pe_edi_shop_id");
        }
        if move_type == MoveType::OutRefund {
            fields.push(self.reversal_field);
            fields.push(self.origin_field);
            if self.version == SourceVersion::V13 {
                fields.push("l10n_pe_edi_cancel_reason");
            }
        }
        fields.extend_from_slice(EDI_FIELDS);
        fields
    }

    fn line_fields(self) -> Vec<&'static str> {
        let mut fields = vec![
            "product_id",
            self.line_uom_field,
            "name",
            "quantity",
            "price_unit",
            self.line_tax_field,
        ];
        if self.version == SourceVersion::V11 {
            fields.push("discount");
        }
        fields
    }
}

/// One remote document with everything its transform needs
#[derive(Debug, Clone, Default)]
pub struct RemoteDocument {
    pub record: RemoteRecord,
    pub partner: Option<RemoteRecord>,
    pub shop_code: Option<String>,
    pub lines: Vec<RemoteRecord>,
    /// Remote product records of the lines, by remote id
    pub products: HashMap<i64, RemoteRecord>,
    /// Line taxes of the legacy layout, by remote id
    pub taxes: HashMap<i64, RemoteRecord>,
    pub reversal_code: Option<String>,
    pub origin_name: Option<String>,
}

/// Transformed document ready for the batch insert
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceDraft {
    #[serde(flatten)]
    pub values: NewMove,
    #[serde(skip)]
    pub edi: EdiDocument,
}

/// Electronic document payload of a remote document
pub fn edi_document(record: &RemoteRecord) -> EdiDocument {
    EdiDocument {
        xml: record.text("comprobante_xml"),
        xml_filename: record.text("xml_filename"),
        cdr: record.text("comprobante_cdr"),
        cdr_filename: record.text("cdr_filename"),
        digest_value: record.text("digest_value"),
        voided: record.bool("anulada"),
    }
}

/// Remote fields read when only the electronic document is needed
pub fn edi_fields(version: SourceVersion) -> Vec<&'static str> {
    let mut fields = vec![version.number_field()];
    fields.extend_from_slice(EDI_FIELDS);
    fields
}

/// Post the move, mark its electronic document accepted and store the
/// document attachments.
pub fn finish_move(conn: &Connection, move_id: i64, name: &str, edi: &EdiDocument) -> Result<()> {
    let moves = SqliteMoveRepository::new(conn);
    let attachments = SqliteAttachmentRepository::new(conn);

    let request_id = moves.post(move_id)?;
    moves.mark_edi_accepted(request_id, edi.voided, edi.digest_value.as_deref())?;

    if let Some(xml) = edi.xml.as_deref() {
        let filename = edi
            .xml_filename
            .clone()
            .unwrap_or_else(|| format!("{name}.xml"));
        let attachment_id = attachments.create(&filename, EDI_REQUEST_MODEL, request_id, xml)?;
        moves.set_xml_attachment(request_id, attachment_id)?;
    }
    if let Some(cdr) = edi.cdr.as_deref() {
        let filename = edi
            .cdr_filename
            .clone()
            .unwrap_or_else(|| format!("R-{name}.zip"));
        let attachment_id = attachments.create(&filename, EDI_REQUEST_MODEL, request_id, cdr)?;
        moves.set_cdr_attachment(request_id, attachment_id)?;
    }

    tracing::debug!("Posted {name}");
    Ok(())
}

/// Imports customer invoices or credit notes
#[derive(Debug, Clone)]
pub struct InvoicePipeline {
    move_type: MoveType,
    layout: MoveLayout,
    partner_layout: PartnerLayout,
}

impl InvoicePipeline {
    pub const fn new(move_type: MoveType, version: SourceVersion) -> Self {
        Self {
            move_type,
            layout: MoveLayout::for_version(version),
            partner_layout: PartnerLayout::for_version(version),
        }
    }

    pub const fn move_type(&self) -> MoveType {
        self.move_type
    }

    fn fetch_v13(
        &self,
        session: &dyn RemoteSession,
        records: &[RemoteRecord],
    ) -> Result<Vec<RemoteDocument>> {
        let partners = read_related(
            session,
            "res.partner",
            records,
            "partner_id",
            &self.partner_layout.fields(),
        )?;
        let shops = read_related(session, SHOP_MODEL, records, "l10n_pe_edi_shop_id", &["name", "code"])?;
        let lines = read_lines(session, self.layout, records)?;
        let reversals = self.read_reversals(session, records)?;

        Ok(records
            .iter()
            .map(|record| RemoteDocument {
                partner: lookup(&partners, record, "partner_id"),
                shop_code: lookup(&shops, record, "l10n_pe_edi_shop_id")
                    .and_then(|shop| shop.text("code")),
                lines: record
                    .ids("invoice_line_ids")
                    .iter()
                    .filter_map(|id| lines.get(id).cloned())
                    .collect(),
                reversal_code: lookup(&reversals, record, self.layout.reversal_field)
                    .and_then(|reversal| reversal.text("code")),
                origin_name: record
                    .many2one_name(self.layout.origin_field)
                    .map(str::to_string),
                record: record.clone(),
                ..RemoteDocument::default()
            })
            .collect())
    }

    fn fetch_v11(
        &self,
        session: &dyn RemoteSession,
        records: &[RemoteRecord],
    ) -> Result<Vec<RemoteDocument>> {
        let partners = read_related(
            session,
            "res.partner",
            records,
            "partner_id",
            &self.partner_layout.fields(),
        )?;
        let journals = read_related(
            session,
            "account.journal",
            records,
            "journal_id",
            &["shop_id", "edocument_type"],
        )?;
        let journal_rows: Vec<RemoteRecord> = journals.values().cloned().collect();
        let shops = read_related(session, SHOP_MODEL, &journal_rows, "shop_id", &["name", "code"])?;
        let lines = read_lines(session, self.layout, records)?;
        let line_rows: Vec<RemoteRecord> = lines.values().cloned().collect();
        let products = read_related(session, "product.product", &line_rows, "product_id", PRODUCT_FIELDS)?;
        let taxes = read_many(
            session,
            "account.tax",
            &line_rows,
            self.layout.line_tax_field,
            &["einv_type_tax", "type_tax_use"],
        )?;
        let reversals = self.read_reversals(session, records)?;
        let origins = if self.move_type == MoveType::OutRefund {
            read_related(session, "account.invoice", records, self.layout.origin_field, &["move_name"])?
        } else {
            HashMap::new()
        };

        Ok(records
            .iter()
            .map(|record| {
                let journal = lookup(&journals, record, "journal_id");
                let shop_code = journal
                    .as_ref()
                    .and_then(|journal| lookup(&shops, journal, "shop_id"))
                    .and_then(|shop| shop.text("code"));
                let document_lines: Vec<RemoteRecord> = record
                    .ids("invoice_line_ids")
                    .iter()
                    .filter_map(|id| lines.get(id).cloned())
                    .collect();
                RemoteDocument {
                    partner: lookup(&partners, record, "partner_id"),
                    shop_code,
                    products: line_products(&products, &document_lines),
                    taxes: line_taxes(&taxes, &document_lines, self.layout.line_tax_field),
                    lines: document_lines,
                    reversal_code: lookup(&reversals, record, self.layout.reversal_field)
                        .and_then(|reversal| reversal.text("code")),
                    origin_name: lookup(&origins, record, self.layout.origin_field)
                        .and_then(|origin| origin.text("move_name")),
                    record: record.clone(),
                }
            })
            .collect())
    }

    fn read_reversals(
        &self,
        session: &dyn RemoteSession,
        records: &[RemoteRecord],
    ) -> Result<HashMap<i64, RemoteRecord>> {
        if self.move_type != MoveType::OutRefund {
            return Ok(HashMap::new());
        }
        read_related(
            session,
            self.layout.reversal_model,
            records,
            self.layout.reversal_field,
            &["code"],
        )
    }
}

impl RecordPipeline for InvoicePipeline {
    type Source = RemoteDocument;
    type Item = InvoiceDraft;

    fn remote_model(&self) -> &'static str {
        self.layout.version.move_model()
    }

    fn order(&self) -> &'static str {
        self.layout.number_field()
    }

    fn domain(&self, options: &SyncOptions) -> Domain {
        let date_field = self.layout.version.date_field();
        let states: Vec<Value> = self
            .layout
            .version
            .importable_states()
            .iter()
            .map(|state| Value::from(*state))
            .collect();

        let mut domain = Domain::new()
            .filter(self.layout.type_field, "=", self.move_type.as_str())
            .filter(date_field, ">=", options.date_from.format(DATE_FORMAT).to_string())
            .filter(date_field, "<=", options.date_to.format(DATE_FORMAT).to_string())
            .filter("state", "in", Value::Array(states));
        if let Some(filter) = options.name_filter.as_deref().filter(|filter| !filter.is_empty()) {
            domain = domain.filter(self.layout.number_field(), "ilike", filter);
        }
        if let Some(company_id) = options.company_id {
            domain = domain.filter("company_id", "=", company_id);
        }
        domain
    }

    fn key_fields(&self) -> &'static [&'static str] {
        match self.layout.version {
            SourceVersion::V11 => &["move_name"],
            SourceVersion::V13 => &["name"],
        }
    }

    fn is_imported(&self, conn: &Connection, key: &RemoteRecord) -> Result<bool> {
        let name = key.text(self.layout.number_field()).unwrap_or_default();
        SqliteMoveRepository::new(conn).exists(self.move_type, key.id(), &name)
    }

    fn prepare(
        &self,
        session: &dyn RemoteSession,
        _conn: &Connection,
        ctx: &mut RunContext,
    ) -> Result<()> {
        if self.layout.version == SourceVersion::V13 {
            ctx.remote.load_products(session)?;
        }
        ctx.remote.load_geography(session, &self.partner_layout)
    }

    fn fetch(&self, session: &dyn RemoteSession, ids: &[i64]) -> Result<Vec<Fetched<RemoteDocument>>> {
        let fields = self.layout.move_fields(self.move_type);
        let records = read_ordered(session, self.remote_model(), ids, &fields)?;
        let documents = match self.layout.version {
            SourceVersion::V11 => self.fetch_v11(session, &records)?,
            SourceVersion::V13 => self.fetch_v13(session, &records)?,
        };
        Ok(documents
            .into_iter()
            .map(|document| Fetched {
                remote_id: document.record.id(),
                name: document
                    .record
                    .text(self.layout.number_field())
                    .unwrap_or_default(),
                source: document,
            })
            .collect())
    }

    fn transform(
        &self,
        conn: &Connection,
        ctx: &mut RunContext,
        document: &RemoteDocument,
    ) -> Result<Outcome<InvoiceDraft>> {
        let record = &document.record;
        let Some(number) = record.text(self.layout.number_field()) else {
            return Ok(Outcome::Skip("document has no number".into()));
        };
        if SqliteMoveRepository::new(conn).exists(self.move_type, record.id(), &number)? {
            return Ok(Outcome::AlreadyImported);
        }
        let lenient = self.layout.lenient();

        // Every reference that can skip the document is resolved before any
        // placeholder is created
        let journal_id = JournalResolver.resolve(conn, ctx, &number)?.id();
        let document_type_code = ctx
            .cache
            .journal(JournalResolver::code(&number))
            .and_then(|journal| journal.document_type_code.clone());
        let currency_id = CurrencyResolver {
            fallback: lenient.then_some(DEFAULT_CURRENCY),
        }
        .resolve(conn, ctx, record.many2one_name("currency_id").unwrap_or_default())?
        .id();
        let shop_id = ShopResolver {
            fallback_to_first: lenient,
        }
        .resolve(conn, ctx, document.shop_code.as_deref().unwrap_or_default())?
        .id();

        let payment_term_name = record.many2one_name(self.layout.payment_term_field);
        let payment_term_id = payment_term(conn, ctx, payment_term_name, lenient);
        if payment_term_id.is_none() {
            tracing::debug!("{number}: payment term {payment_term_name:?} not found");
        }

        let planned = plan_lines(conn, ctx, self.layout.lines(), &document.products, &document.lines)?;

        let partner_id = match document.partner.as_ref() {
            Some(partner) => {
                let resolver = PartnerResolver {
                    matching: if lenient {
                        PartnerMatch::Vat
                    } else {
                        PartnerMatch::ImportId
                    },
                    layout: self.partner_layout,
                };
                Some(ensure_partner(conn, ctx, &resolver, partner)?)
            }
            None => None,
        };

        let lines = build_lines(conn, ctx, self.layout.lines(), &document.taxes, planned)?;

        let invoice_date = parse_date(record.str(self.layout.version.date_field()));
        let state = if record.str("state") == Some("cancel") {
            MoveState::Cancel
        } else {
            MoveState::Draft
        };

        let (reversal_type_code, origin_move_id, reference) = if self.move_type == MoveType::OutRefund {
            let origin_move_id = match document.origin_name.as_deref() {
                Some(origin) => SqliteMoveRepository::new(conn).find_by_name(origin)?,
                None => None,
            };
            (
                document.reversal_code.clone(),
                origin_move_id,
                record.text("l10n_pe_edi_cancel_reason"),
            )
        } else {
            (None, None, None)
        };

        Ok(Outcome::Create(InvoiceDraft {
            values: NewMove {
                name: number,
                move_type: self.move_type,
                invoice_date,
                invoice_date_due: parse_date(record.str(self.layout.due_date_field)),
                date: invoice_date,
                journal_id,
                partner_id,
                currency_id,
                payment_term_id,
                shop_id,
                document_type_code,
                datetime_invoice: record
                    .str("datetime_invoice")
                    .and_then(|value| NaiveDateTime::parse_from_str(value, DATETIME_FORMAT).ok()),
                state,
                reversal_type_code,
                origin_move_id,
                reference,
                import_id: record.id(),
                lines,
            },
            edi: edi_document(record),
        }))
    }

    fn create(&self, conn: &Connection, item: &InvoiceDraft) -> Result<i64> {
        SqliteMoveRepository::new(conn).create(&item.values)
    }

    fn post_process(&self, conn: &Connection, item: &InvoiceDraft, local_id: i64) -> Result<()> {
        if item.values.state == MoveState::Cancel {
            return Ok(());
        }
        finish_move(conn, local_id, &item.values.name, &item.edi)
    }

    fn finalize(&self, conn: &Connection, item: &InvoiceDraft, local_id: i64) -> Result<()> {
        if item.values.state == MoveState::Cancel {
            return Ok(());
        }
        SqliteMoveRepository::new(conn).settle(local_id)
    }

    fn log_payload(&self, item: &InvoiceDraft) -> Result<Value> {
        Ok(serde_json::to_value(&item.values)?)
    }
}

/// Optional payment term; lenient lookups fall back to cash
pub(super) fn payment_term(conn: &Connection, ctx: &RunContext, name: Option<&str>, lenient: bool) -> Option<i64> {
    let name = match (name, lenient) {
        (Some(name), _) => name,
        (None, true) => CASH_PAYMENT_TERM,
        (None, false) => return None,
    };
    PaymentTermResolver { fuzzy: lenient }
        .resolve(conn, ctx, name)
        .ok()
        .map(|resolution| resolution.id())
}

/// Resolve the unit of measure and check the product of every line.
///
/// Fails on the first reference that would skip the document; creates
/// nothing.
pub(super) fn plan_lines<'a>(
    conn: &Connection,
    ctx: &RunContext,
    layout: LineLayout,
    document_products: &HashMap<i64, RemoteRecord>,
    lines: &'a [RemoteRecord],
) -> Result<Vec<PlannedLine<'a>>> {
    let resolver = ProductResolver::default();
    let mut planned = Vec::with_capacity(lines.len());
    for line in lines {
        let uom_name = line.many2one_name(layout.uom_field).unwrap_or_default();
        let uom_id = UomResolver {
            fuzzy: layout.fuzzy_uom,
        }
        .resolve(conn, ctx, uom_name)?
        .id();

        let product = match line.many2one("product_id") {
            Some((remote_id, display_name)) => {
                let remote = ctx
                    .remote
                    .products
                    .get(&remote_id)
                    .or_else(|| document_products.get(&remote_id))
                    .cloned()
                    .unwrap_or_else(|| {
                        RemoteRecord::from(serde_json::json!({"id": remote_id, "name": display_name}))
                    });
                resolver.resolve(conn, ctx, &remote)?;
                Some(remote)
            }
            None => None,
        };
        planned.push(PlannedLine {
            line,
            uom_id,
            product,
        });
    }
    Ok(planned)
}

/// Create missing products and build the local lines
pub(super) fn build_lines(
    conn: &Connection,
    ctx: &mut RunContext,
    layout: LineLayout,
    taxes: &HashMap<i64, RemoteRecord>,
    planned: Vec<PlannedLine<'_>>,
) -> Result<Vec<NewMoveLine>> {
    let resolver = ProductResolver {
        tax_ids: ctx.options.default_taxes(),
    };
    let mut lines = Vec::with_capacity(planned.len());
    for PlannedLine {
        line,
        uom_id,
        product,
    } in planned
    {
        let product_id = match product {
            Some(remote) => Some(ensure_product(conn, ctx, &resolver, &remote)?),
            None => None,
        };

        let is_sale_igv = line.ids(layout.tax_field).iter().any(|id| {
            taxes.get(id).is_some_and(|tax| {
                tax.str("einv_type_tax") == Some("igv") && tax.str("type_tax_use") == Some("sale")
            })
        });
        let tax_ids = if !layout.check_taxes || is_sale_igv {
            ctx.options.default_taxes()
        } else {
            Vec::new()
        };

        lines.push(NewMoveLine {
            product_id,
            uom_id,
            name: line.text("name"),
            quantity: line.f64(layout.quantity_field).unwrap_or_default(),
            price_unit: line.f64("price_unit").unwrap_or_default(),
            discount: line.f64("discount").unwrap_or_default(),
            tax_ids,
        });
    }
    Ok(lines)
}

/// Remote products referenced by `lines`
pub(super) fn line_products(
    products: &HashMap<i64, RemoteRecord>,
    lines: &[RemoteRecord],
) -> HashMap<i64, RemoteRecord> {
    lines
        .iter()
        .filter_map(|line| line.many2one_id("product_id"))
        .filter_map(|id| products.get(&id).map(|product| (id, product.clone())))
        .collect()
}

/// Remote taxes referenced by the `tax_field` of `lines`
pub(super) fn line_taxes(
    taxes: &HashMap<i64, RemoteRecord>,
    lines: &[RemoteRecord],
    tax_field: &str,
) -> HashMap<i64, RemoteRecord> {
    lines
        .iter()
        .flat_map(|line| line.ids(tax_field))
        .filter_map(|id| taxes.get(&id).map(|tax| (id, tax.clone())))
        .collect()
}

pub(super) fn parse_date(value: Option<&str>) -> Option<NaiveDate> {
    let value = value?;
    let date = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(date, DATE_FORMAT).ok()
}

pub(super) fn lookup(table: &HashMap<i64, RemoteRecord>, record: &RemoteRecord, field: &str) -> Option<RemoteRecord> {
    record
        .many2one_id(field)
        .and_then(|id| table.get(&id))
        .cloned()
}

/// Read the records referenced by the many2one `field` of `records`
pub(super) fn read_related(
    session: &dyn RemoteSession,
    model: &str,
    records: &[RemoteRecord],
    field: &str,
    fields: &[&str],
) -> Result<HashMap<i64, RemoteRecord>> {
    let mut ids: Vec<i64> = records
        .iter()
        .filter_map(|record| record.many2one_id(field))
        .collect();
    read_by_id(session, model, &mut ids, fields)
}

/// Read the records referenced by the x2many `field` of `records`
pub(super) fn read_many(
    session: &dyn RemoteSession,
    model: &str,
    records: &[RemoteRecord],
    field: &str,
    fields: &[&str],
) -> Result<HashMap<i64, RemoteRecord>> {
    let mut ids: Vec<i64> = records.iter().flat_map(|record| record.ids(field)).collect();
    read_by_id(session, model, &mut ids, fields)
}

fn read_lines(
    session: &dyn RemoteSession,
    layout: MoveLayout,
    records: &[RemoteRecord],
) -> Result<HashMap<i64, RemoteRecord>> {
    read_many(
        session,
        layout.version.line_model(),
        records,
        "invoice_line_ids",
        &layout.line_fields(),
    )
}

fn read_by_id(
    session: &dyn RemoteSession,
    model: &str,
    ids: &mut Vec<i64>,
    fields: &[&str],
) -> Result<HashMap<i64, RemoteRecord>> {
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    Ok(session
        .read(model, ids, fields)?
        .into_iter()
        .map(|record| (record.id(), record))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordKind;
    use serde_json::json;

    #[test]
    fn domain_filters_type_dates_states_and_name() {
        let pipeline = InvoicePipeline::new(MoveType::OutInvoice, SourceVersion::V13);
        let mut options = SyncOptions::new(RecordKind::Invoice, SourceVersion::V13);
        options.date_from = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        options.date_to = NaiveDate::from_ymd_opt(2024, 5, 31).unwrap();
        options.company_id = Some(2);

        assert_eq!(
            pipeline.domain(&options).to_value(),
            json!([
                ["type", "=", "out_invoice"],
                ["invoice_date", ">=", "2024-05-01"],
                ["invoice_date", "<=", "2024-05-31"],
                ["state", "in", ["posted", "cancel"]],
                ["name", "ilike", "F"],
                ["company_id", "=", 2]
            ])
        );
    }

    #[test]
    fn legacy_layout_uses_invoice_model() {
        let pipeline = InvoicePipeline::new(MoveType::OutRefund, SourceVersion::V11);
        let mut options = SyncOptions::new(RecordKind::CreditNote, SourceVersion::V11);
        options.name_filter = None;

        assert_eq!(pipeline.remote_model(), "account.invoice");
        assert_eq!(pipeline.order(), "move_name");
        let domain = pipeline.domain(&options).to_value();
        assert_eq!(domain[0], json!(["type", "=", "out_refund"]));
        assert_eq!(domain[3], json!(["state", "in", ["open", "paid", "cancel"]]));
        assert_eq!(domain.as_array().unwrap().len(), 4);
    }

    #[test]
    fn edi_document_reads_payload() {
        let record = RemoteRecord::from(json!({
            "id": 1,
            "comprobante_xml": "PHhtbC8+",
            "xml_filename": "20100000001-01-F001-1.xml",
            "comprobante_cdr": false,
            "digest_value": "abc=",
            "anulada": false
        }));
        let edi = edi_document(&record);
        assert_eq!(edi.xml.as_deref(), Some("PHhtbC8+"));
        assert_eq!(edi.cdr, None);
        assert!(!edi.voided);
    }

    #[test]
    fn parse_date_accepts_datetime_prefix() {
        assert_eq!(
            parse_date(Some("2024-05-03 10:00:00")),
            NaiveDate::from_ymd_opt(2024, 5, 3)
        );
        assert_eq!(parse_date(Some("garbage")), None);
        assert_eq!(parse_date(None), None);
    }

    #[test]
    fn refund_reads_reversal_fields() {
        let fields = MoveLayout::for_version(SourceVersion::V13).move_fields(MoveType::OutRefund);
        assert!(fields.contains(&"reversed_entry_id"));
        assert!(fields.contains(&"l10n_pe_edi_cancel_reason"));
        assert!(fields.contains(&"comprobante_xml"));

        let fields = MoveLayout::for_version(SourceVersion::V11).move_fields(MoveType::OutInvoice);
        assert!(fields.contains(&"move_name"));
        assert!(!fields.contains(&"tipo_ncredito_id"));
    }
}
