//! Accounting move and electronic document repository

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::models::{EdiRequest, Move, MoveState, MoveType, NewMove};

pub trait MoveRepository {
    /// Insert the move and its lines; residual starts at the total
    fn create(&self, new_move: &NewMove) -> Result<i64>;

    fn get(&self, id: i64) -> Result<Option<Move>>;

    /// Whether a move of `move_type` was imported from `import_id` or is named `name`
    fn exists(&self, move_type: MoveType, import_id: i64, name: &str) -> Result<bool>;

    /// Whether a move carries both `import_id` and `name`
    fn exists_exact(&self, move_type: MoveType, import_id: i64, name: &str) -> Result<bool>;

    fn find_by_name(&self, name: &str) -> Result<Option<i64>>;

    fn line_count(&self, move_id: i64) -> Result<usize>;

    /// Finalize a draft move and open its electronic document request.
    ///
    /// Returns the request id. Posting an already posted move returns its
    /// existing request.
    fn post(&self, id: i64) -> Result<i64>;

    fn edi_request(&self, request_id: i64) -> Result<Option<EdiRequest>>;

    fn mark_edi_accepted(
        &self,
        request_id: i64,
        canceled: bool,
        digest_value: Option<&str>,
    ) -> Result<()>;

    fn set_xml_attachment(&self, request_id: i64, attachment_id: i64) -> Result<()>;

    fn set_cdr_attachment(&self, request_id: i64, attachment_id: i64) -> Result<()>;

    /// Mark the move paid with nothing left to collect
    fn settle(&self, id: i64) -> Result<()>;

    /// Imported, non-cancelled moves that are still draft or unpaid
    fn unfinished_imports(&self, move_type: Option<MoveType>) -> Result<Vec<i64>>;
}

/// `SQLite` implementation of `MoveRepository`
pub struct SqliteMoveRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteMoveRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_move(row: &rusqlite::Row<'_>) -> rusqlite::Result<Move> {
        let move_type: String = row.get(2)?;
        let state: String = row.get(8)?;
        let payment_state: String = row.get(9)?;
        Ok(Move {
            id: row.get(0)?,
            name: row.get(1)?,
            move_type: move_type.parse().unwrap_or(MoveType::OutInvoice),
            invoice_date: row.get(3)?,
            journal_id: row.get(4)?,
            partner_id: row.get(5)?,
            currency_id: row.get(6)?,
            shop_id: row.get(7)?,
            state: state.parse().unwrap_or_default(),
            payment_state: payment_state.parse().unwrap_or_default(),
            amount_total: row.get(10)?,
            amount_residual: row.get(11)?,
            import_id: row.get(12)?,
            edi_request_id: row.get(13)?,
        })
    }
}

impl MoveRepository for SqliteMoveRepository<'_> {
    fn create(&self, new_move: &NewMove) -> Result<i64> {
        let total = new_move.amount_total();
        self.conn.execute(
            "INSERT INTO moves (name, move_type, invoice_date, invoice_date_due, date, journal_id,
                partner_id, currency_id, payment_term_id, shop_id, document_type_code,
                datetime_invoice, state, payment_state, amount_total, amount_residual,
                reversal_type_code, origin_move_id, ref, import_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'not_paid', ?, ?, ?, ?, ?, ?, ?)",
            params![
                new_move.name,
                new_move.move_type.as_str(),
                new_move.invoice_date,
                new_move.invoice_date_due,
                new_move.date,
                new_move.journal_id,
                new_move.partner_id,
                new_move.currency_id,
                new_move.payment_term_id,
                new_move.shop_id,
                new_move.document_type_code,
                new_move.datetime_invoice,
                new_move.state.as_str(),
                total,
                total,
                new_move.reversal_type_code,
                new_move.origin_move_id,
                new_move.reference,
                new_move.import_id,
                chrono::Utc::now().timestamp_millis(),
            ],
        )?;
        let move_id = self.conn.last_insert_rowid();

        for line in &new_move.lines {
            self.conn.execute(
                "INSERT INTO move_lines (move_id, product_id, uom_id, name, quantity, price_unit,
                    discount, price_subtotal)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    move_id,
                    line.product_id,
                    line.uom_id,
                    line.name,
                    line.quantity,
                    line.price_unit,
                    line.discount,
                    line.subtotal(),
                ],
            )?;
            let line_id = self.conn.last_insert_rowid();
            for tax_id in &line.tax_ids {
                self.conn.execute(
                    "INSERT OR IGNORE INTO move_line_taxes (line_id, tax_id) VALUES (?, ?)",
                    params![line_id, tax_id],
                )?;
            }
        }

        Ok(move_id)
    }

    fn get(&self, id: i64) -> Result<Option<Move>> {
        let result = self.conn.query_row(
            "SELECT id, name, move_type, invoice_date, journal_id, partner_id, currency_id, shop_id,
                    state, payment_state, amount_total, amount_residual, import_id, edi_request_id
             FROM moves WHERE id = ?",
            params![id],
            Self::parse_move,
        );

        match result {
            Ok(found) => Ok(Some(found)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, move_type: MoveType, import_id: i64, name: &str) -> Result<bool> {
        Ok(self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM moves
             WHERE move_type = ?1 AND (import_id = ?2 OR name = ?3))",
            params![move_type.as_str(), import_id, name],
            |row| row.get(0),
        )?)
    }

    fn exists_exact(&self, move_type: MoveType, import_id: i64, name: &str) -> Result<bool> {
        Ok(self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM moves
             WHERE move_type = ?1 AND import_id = ?2 AND name = ?3)",
            params![move_type.as_str(), import_id, name],
            |row| row.get(0),
        )?)
    }

    fn find_by_name(&self, name: &str) -> Result<Option<i64>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id FROM moves WHERE name = ? ORDER BY id LIMIT 1",
                params![name],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn line_count(&self, move_id: i64) -> Result<usize> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM move_lines WHERE move_id = ?",
            params![move_id],
            |row| row.get(0),
        )?)
    }

    fn post(&self, id: i64) -> Result<i64> {
        let current = self.get(id)?.ok_or_else(|| Error::NotFound(format!("move {id}")))?;
        if current.state == MoveState::Cancel {
            return Err(Error::InvalidInput(format!(
                "cannot post cancelled move {}",
                current.name
            )));
        }
        if let Some(request_id) = current.edi_request_id {
            return Ok(request_id);
        }

        self.conn.execute(
            "UPDATE moves SET state = 'posted' WHERE id = ?",
            params![id],
        )?;
        self.conn.execute(
            "INSERT INTO edi_requests (move_id) VALUES (?)",
            params![id],
        )?;
        let request_id = self.conn.last_insert_rowid();
        self.conn.execute(
            "UPDATE moves SET edi_request_id = ? WHERE id = ?",
            params![request_id, id],
        )?;
        Ok(request_id)
    }

    fn edi_request(&self, request_id: i64) -> Result<Option<EdiRequest>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, move_id, ose_accepted, sunat_accepted, sunat_canceled, xml_generated,
                        xml_attachment_id, cdr_attachment_id, digest_value
                 FROM edi_requests WHERE id = ?",
                params![request_id],
                |row| {
                    Ok(EdiRequest {
                        id: row.get(0)?,
                        move_id: row.get(1)?,
                        ose_accepted: row.get(2)?,
                        sunat_accepted: row.get(3)?,
                        sunat_canceled: row.get(4)?,
                        xml_generated: row.get(5)?,
                        xml_attachment_id: row.get(6)?,
                        cdr_attachment_id: row.get(7)?,
                        digest_value: row.get(8)?,
                    })
                },
            )
            .optional()?)
    }

    fn mark_edi_accepted(
        &self,
        request_id: i64,
        canceled: bool,
        digest_value: Option<&str>,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE edi_requests SET ose_accepted = 1, sunat_accepted = 1, sunat_canceled = ?,
                digest_value = COALESCE(?, digest_value)
             WHERE id = ?",
            params![canceled, digest_value, request_id],
        )?;
        Ok(())
    }

    fn set_xml_attachment(&self, request_id: i64, attachment_id: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE edi_requests SET xml_attachment_id = ?, xml_generated = 1 WHERE id = ?",
            params![attachment_id, request_id],
        )?;
        Ok(())
    }

    fn set_cdr_attachment(&self, request_id: i64, attachment_id: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE edi_requests SET cdr_attachment_id = ? WHERE id = ?",
            params![attachment_id, request_id],
        )?;
        Ok(())
    }

    fn settle(&self, id: i64) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE moves SET payment_state = 'paid', amount_residual = 0 WHERE id = ?",
            params![id],
        )?;
        if rows == 0 {
            return Err(Error::NotFound(format!("move {id}")));
        }
        Ok(())
    }

    fn unfinished_imports(&self, move_type: Option<MoveType>) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT id FROM moves
             WHERE import_id IS NOT NULL
               AND state != 'cancel'
               AND (state = 'draft' OR payment_state != 'paid')
               AND (?1 IS NULL OR move_type = ?1)
             ORDER BY name",
        )?;
        let ids = stmt
            .query_map(params![move_type.map(MoveType::as_str)], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::reference::{load_reference_data, ReferenceData};
    use crate::db::Database;
    use crate::models::{NewMoveLine, PaymentState};

    fn setup() -> Database {
        let db = Database::open_in_memory().unwrap();
        let data = ReferenceData::from_json(
            r#"{"journals": [{"code": "F001", "name": "Facturas"}], "currencies": ["PEN"]}"#,
        )
        .unwrap();
        load_reference_data(db.connection(), &data).unwrap();
        db
    }

    fn invoice(name: &str, import_id: i64, state: MoveState) -> NewMove {
        NewMove {
            name: name.into(),
            move_type: MoveType::OutInvoice,
            invoice_date: None,
            invoice_date_due: None,
            date: None,
            journal_id: 1,
            partner_id: None,
            currency_id: 1,
            payment_term_id: None,
            shop_id: 1,
            document_type_code: Some("01".into()),
            datetime_invoice: None,
            state,
            reversal_type_code: None,
            origin_move_id: None,
            reference: None,
            import_id,
            lines: vec![NewMoveLine {
                product_id: None,
                uom_id: 1,
                name: Some("Servicio".into()),
                quantity: 2.0,
                price_unit: 59.0,
                discount: 0.0,
                tax_ids: vec![1],
            }],
        }
    }

    #[test]
    fn test_create_sets_residual_to_total() {
        let db = setup();
        let repo = SqliteMoveRepository::new(db.connection());

        let id = repo.create(&invoice("F001-1", 100, MoveState::Draft)).unwrap();
        let created = repo.get(id).unwrap().unwrap();
        assert_eq!(created.state, MoveState::Draft);
        assert_eq!(created.payment_state, PaymentState::NotPaid);
        assert!((created.amount_total - 118.0).abs() < f64::EPSILON);
        assert!((created.amount_residual - 118.0).abs() < f64::EPSILON);
        assert_eq!(repo.line_count(id).unwrap(), 1);
    }

    #[test]
    fn test_exists_by_import_id_or_name() {
        let db = setup();
        let repo = SqliteMoveRepository::new(db.connection());
        repo.create(&invoice("F001-1", 100, MoveState::Draft)).unwrap();

        assert!(repo.exists(MoveType::OutInvoice, 100, "other").unwrap());
        assert!(repo.exists(MoveType::OutInvoice, 1, "F001-1").unwrap());
        assert!(!repo.exists(MoveType::OutRefund, 100, "F001-1").unwrap());

        assert!(repo.exists_exact(MoveType::OutInvoice, 100, "F001-1").unwrap());
        assert!(!repo.exists_exact(MoveType::OutInvoice, 100, "B001-1").unwrap());
        assert!(!repo.exists_exact(MoveType::OutInvoice, 1, "F001-1").unwrap());
    }

    #[test]
    fn test_post_opens_single_edi_request() {
        let db = setup();
        let repo = SqliteMoveRepository::new(db.connection());
        let id = repo.create(&invoice("F001-1", 100, MoveState::Draft)).unwrap();

        let request_id = repo.post(id).unwrap();
        assert_eq!(repo.post(id).unwrap(), request_id);

        repo.mark_edi_accepted(request_id, false, Some("abc=")).unwrap();
        repo.set_xml_attachment(request_id, 7).unwrap();
        let request = repo.edi_request(request_id).unwrap().unwrap();
        assert!(request.ose_accepted && request.sunat_accepted);
        assert!(request.xml_generated);
        assert_eq!(request.xml_attachment_id, Some(7));
        assert_eq!(request.digest_value.as_deref(), Some("abc="));

        let posted = repo.get(id).unwrap().unwrap();
        assert_eq!(posted.state, MoveState::Posted);
        assert_eq!(posted.edi_request_id, Some(request_id));
    }

    #[test]
    fn test_cancelled_move_cannot_be_posted() {
        let db = setup();
        let repo = SqliteMoveRepository::new(db.connection());
        let id = repo.create(&invoice("F001-2", 101, MoveState::Cancel)).unwrap();
        assert!(matches!(repo.post(id), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_unfinished_imports() {
        let db = setup();
        let repo = SqliteMoveRepository::new(db.connection());
        let draft = repo.create(&invoice("F001-1", 1, MoveState::Draft)).unwrap();
        let done = repo.create(&invoice("F001-2", 2, MoveState::Draft)).unwrap();
        repo.create(&invoice("F001-3", 3, MoveState::Cancel)).unwrap();
        repo.post(done).unwrap();
        repo.settle(done).unwrap();

        assert_eq!(repo.unfinished_imports(None).unwrap(), vec![draft]);
        assert_eq!(
            repo.unfinished_imports(Some(MoveType::OutRefund)).unwrap(),
            Vec::<i64>::new()
        );
    }
}
