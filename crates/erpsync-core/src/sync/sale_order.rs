//! Legacy sale receipt pipeline
//!
//! A v11 instance issues receipts from sale orders: the order carries the
//! receipt number, issue date and electronic document. Each order becomes
//! a customer invoice; orders never sent to the tax authority come in
//! cancelled.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde_json::Value;

use super::cache::PRODUCT_FIELDS;
use super::invoice::{
    build_lines, edi_document, finish_move, line_products, line_taxes, lookup, parse_date,
    payment_term, plan_lines, read_many, read_related, InvoiceDraft, LineLayout, DATETIME_FORMAT,
    DATE_FORMAT, DEFAULT_CURRENCY, EDI_FIELDS, SHOP_MODEL,
};
use super::partner::PartnerLayout;
use super::resolver::{
    ensure_partner, CurrencyResolver, JournalResolver, PartnerMatch, PartnerResolver,
    ReferenceResolver, ShopResolver,
};
use super::{Fetched, Outcome, RecordPipeline, RunContext, SyncOptions};
use crate::db::{MoveRepository, SqliteMoveRepository};
use crate::error::Result;
use crate::models::{MoveState, MoveType, NewMove, RemoteRecord, SourceVersion};
use crate::rpc::{read_ordered, Domain, RemoteSession};

pub const SALE_ORDER_MODEL: &str = "sale.order";
const LINE_MODEL: &str = "sale.order.line";
const ORDER_TYPE_MODEL: &str = "sale.order.type";
const DOCUMENT_TYPE_MODEL: &str = "einvoice.catalog.01";

const ORDER_STATES: [&str; 2] = ["sale", "done"];

const ORDER_FIELDS: &[&str] = &[
    "id",
    "name",
    "date_invoice",
    "date_order",
    "payment_term_id",
    "partner_id",
    "currency_id",
    "type_id",
    "order_line",
    "state",
    "enviado",
    "comprobante_xml",
    "xml_filename",
    "comprobante_cdr",
    "cdr_filename",
    "digest_value",
];

const LINE_FIELDS: &[&str] = &[
    "product_id",
    "product_uom",
    "name",
    "product_uom_qty",
    "price_unit",
    "tax_id",
];

/// Remote fields read when only the electronic document of an order is needed
pub(super) fn sale_order_edi_fields() -> Vec<&'static str> {
    ORDER_FIELDS
        .iter()
        .copied()
        .filter(|field| *field == "name" || EDI_FIELDS.contains(field))
        .collect()
}

const LINES: LineLayout = LineLayout {
    uom_field: "product_uom",
    tax_field: "tax_id",
    quantity_field: "product_uom_qty",
    check_taxes: true,
    fuzzy_uom: true,
};

/// One remote sale order with its related records
#[derive(Debug, Clone, Default)]
pub struct RemoteSaleOrder {
    pub record: RemoteRecord,
    pub partner: Option<RemoteRecord>,
    /// Shop of the order type's journal
    pub shop_code: Option<String>,
    /// Document type of the order type's journal
    pub document_type_code: Option<String>,
    pub lines: Vec<RemoteRecord>,
    pub products: HashMap<i64, RemoteRecord>,
    pub taxes: HashMap<i64, RemoteRecord>,
}

/// Imports v11 sale orders as customer invoices
#[derive(Debug, Clone)]
pub struct SaleOrderPipeline {
    partner_layout: PartnerLayout,
}

impl Default for SaleOrderPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl SaleOrderPipeline {
    pub const fn new() -> Self {
        Self {
            partner_layout: PartnerLayout::for_version(SourceVersion::V11),
        }
    }
}

impl RecordPipeline for SaleOrderPipeline {
    type Source = RemoteSaleOrder;
    type Item = InvoiceDraft;

    fn remote_model(&self) -> &'static str {
        SALE_ORDER_MODEL
    }

    fn order(&self) -> &'static str {
        "name"
    }

    fn domain(&self, options: &SyncOptions) -> Domain {
        let states: Vec<Value> = ORDER_STATES.iter().map(|state| Value::from(*state)).collect();
        let mut domain = Domain::new();
        if let Some(filter) = options.name_filter.as_deref().filter(|filter| !filter.is_empty()) {
            domain = domain.filter("name", "ilike", filter);
        }
        domain = domain
            .filter("date_invoice", ">=", options.date_from.format(DATE_FORMAT).to_string())
            .filter("date_invoice", "<=", options.date_to.format(DATE_FORMAT).to_string())
            .filter("state", "in", Value::Array(states));
        if let Some(company_id) = options.company_id {
            domain = domain.filter("company_id", "=", company_id);
        }
        domain
    }

    fn key_fields(&self) -> &'static [&'static str] {
        &["name"]
    }

    fn is_imported(&self, conn: &Connection, key: &RemoteRecord) -> Result<bool> {
        let name = key.text("name").unwrap_or_default();
        SqliteMoveRepository::new(conn).exists_exact(MoveType::OutInvoice, key.id(), &name)
    }

    fn prepare(
        &self,
        session: &dyn RemoteSession,
        _conn: &Connection,
        ctx: &mut RunContext,
    ) -> Result<()> {
        ctx.remote.load_geography(session, &self.partner_layout)
    }

    fn fetch(&self, session: &dyn RemoteSession, ids: &[i64]) -> Result<Vec<Fetched<RemoteSaleOrder>>> {
        let records = read_ordered(session, SALE_ORDER_MODEL, ids, ORDER_FIELDS)?;
        let partners = read_related(
            session,
            "res.partner",
            &records,
            "partner_id",
            &self.partner_layout.fields(),
        )?;
        let order_types = read_related(session, ORDER_TYPE_MODEL, &records, "type_id", &["journal_id"])?;
        let type_rows: Vec<RemoteRecord> = order_types.values().cloned().collect();
        let journals = read_related(
            session,
            "account.journal",
            &type_rows,
            "journal_id",
            &["shop_id", "edocument_type"],
        )?;
        let journal_rows: Vec<RemoteRecord> = journals.values().cloned().collect();
        let shops = read_related(session, SHOP_MODEL, &journal_rows, "shop_id", &["name", "code"])?;
        let document_types = read_related(
            session,
            DOCUMENT_TYPE_MODEL,
            &journal_rows,
            "edocument_type",
            &["code"],
        )?;
        let lines = read_many(session, LINE_MODEL, &records, "order_line", LINE_FIELDS)?;
        let line_rows: Vec<RemoteRecord> = lines.values().cloned().collect();
        let products = read_related(session, "product.product", &line_rows, "product_id", PRODUCT_FIELDS)?;
        let taxes = read_many(
            session,
            "account.tax",
            &line_rows,
            LINES.tax_field,
            &["einv_type_tax", "type_tax_use"],
        )?;

        Ok(records
            .into_iter()
            .map(|record| {
                let journal = lookup(&order_types, &record, "type_id")
                    .and_then(|order_type| lookup(&journals, &order_type, "journal_id"));
                let shop_code = journal
                    .as_ref()
                    .and_then(|journal| lookup(&shops, journal, "shop_id"))
                    .and_then(|shop| shop.text("code"));
                let document_type_code = journal
                    .as_ref()
                    .and_then(|journal| lookup(&document_types, journal, "edocument_type"))
                    .and_then(|document_type| document_type.text("code"));
                let order_lines: Vec<RemoteRecord> = record
                    .ids("order_line")
                    .iter()
                    .filter_map(|id| lines.get(id).cloned())
                    .collect();
                Fetched {
                    remote_id: record.id(),
                    name: record.text("name").unwrap_or_default(),
                    source: RemoteSaleOrder {
                        partner: lookup(&partners, &record, "partner_id"),
                        shop_code,
                        document_type_code,
                        products: line_products(&products, &order_lines),
                        taxes: line_taxes(&taxes, &order_lines, LINES.tax_field),
                        lines: order_lines,
                        record,
                    },
                }
            })
            .collect())
    }

    fn transform(
        &self,
        conn: &Connection,
        ctx: &mut RunContext,
        order: &RemoteSaleOrder,
    ) -> Result<Outcome<InvoiceDraft>> {
        let record = &order.record;
        let Some(number) = record.text("name") else {
            return Ok(Outcome::Skip("sale order has no number".into()));
        };
        if self.is_imported(conn, record)? {
            return Ok(Outcome::AlreadyImported);
        }

        let journal_id = JournalResolver.resolve(conn, ctx, &number)?.id();
        let document_type_code = order.document_type_code.clone().or_else(|| {
            ctx.cache
                .journal(JournalResolver::code(&number))
                .and_then(|journal| journal.document_type_code.clone())
        });
        let currency_id = CurrencyResolver {
            fallback: Some(DEFAULT_CURRENCY),
        }
        .resolve(conn, ctx, record.many2one_name("currency_id").unwrap_or_default())?
        .id();
        let shop_id = ShopResolver {
            fallback_to_first: true,
        }
        .resolve(conn, ctx, order.shop_code.as_deref().unwrap_or_default())?
        .id();
        let payment_term_id = payment_term(conn, ctx, record.many2one_name("payment_term_id"), true);
        let planned = plan_lines(conn, ctx, LINES, &order.products, &order.lines)?;

        let partner_id = match order.partner.as_ref() {
            Some(partner) => {
                let resolver = PartnerResolver {
                    matching: PartnerMatch::Vat,
                    layout: self.partner_layout,
                };
                Some(ensure_partner(conn, ctx, &resolver, partner)?)
            }
            None => None,
        };
        let lines = build_lines(conn, ctx, LINES, &order.taxes, planned)?;

        let sent = record.bool("enviado");
        let invoice_date = parse_date(record.str("date_invoice"));
        let mut edi = edi_document(record);
        edi.voided = !sent;

        Ok(Outcome::Create(InvoiceDraft {
            values: NewMove {
                name: number,
                move_type: MoveType::OutInvoice,
                invoice_date,
                invoice_date_due: invoice_date,
                date: invoice_date,
                journal_id,
                partner_id,
                currency_id,
                payment_term_id,
                shop_id,
                document_type_code,
                datetime_invoice: record
                    .str("date_order")
                    .and_then(|value| NaiveDateTime::parse_from_str(value, DATETIME_FORMAT).ok()),
                state: if sent { MoveState::Draft } else { MoveState::Cancel },
                reversal_type_code: None,
                origin_move_id: None,
                reference: None,
                import_id: record.id(),
                lines,
            },
            edi,
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
