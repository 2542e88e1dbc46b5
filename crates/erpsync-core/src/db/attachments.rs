//! Binary attachment repository

use rusqlite::{params, Connection};

use crate::error::Result;
use crate::models::Attachment;

pub trait AttachmentRepository {
    /// Store base64 `datas` against the record `res_model`/`res_id`
    fn create(&self, name: &str, res_model: &str, res_id: i64, datas: &str) -> Result<i64>;

    fn list_for(&self, res_model: &str, res_id: i64) -> Result<Vec<Attachment>>;
}

/// `SQLite` implementation of `AttachmentRepository`
pub struct SqliteAttachmentRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteAttachmentRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl AttachmentRepository for SqliteAttachmentRepository<'_> {
    fn create(&self, name: &str, res_model: &str, res_id: i64, datas: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO attachments (name, res_model, res_id, datas, created_at)
             VALUES (?, ?, ?, ?, ?)",
            params![
                name,
                res_model,
                res_id,
                datas,
                chrono::Utc::now().timestamp_millis()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_for(&self, res_model: &str, res_id: i64) -> Result<Vec<Attachment>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, res_model, res_id, datas FROM attachments
             WHERE res_model = ? AND res_id = ? ORDER BY id",
        )?;
        let attachments = stmt
            .query_map(params![res_model, res_id], |row| {
                Ok(Attachment {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    res_model: row.get(2)?,
                    res_id: row.get(3)?,
                    datas: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(attachments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn test_create_and_list() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteAttachmentRepository::new(db.connection());

        repo.create("F001-1.xml", "account.move", 3, "PHhtbC8+").unwrap();
        repo.create("R-F001-1.zip", "account.move", 3, "UEsDBA==").unwrap();
        repo.create("other.xml", "account.move", 4, "PHhtbC8+").unwrap();

        let listed = repo.list_for("account.move", 3).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].name, "F001-1.xml");
        assert!(repo.list_for("product.template", 3).unwrap().is_empty());
    }
}
