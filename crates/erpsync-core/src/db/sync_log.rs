//! Sync log repository

use rusqlite::{params, Connection};

use crate::error::Result;
use crate::models::SyncLogEntry;

pub trait SyncLogRepository {
    fn append(&self, entry: &SyncLogEntry) -> Result<i64>;

    /// Most recent entries first
    fn list(&self, limit: usize) -> Result<Vec<SyncLogEntry>>;

    fn list_run(&self, run_id: &str) -> Result<Vec<SyncLogEntry>>;

    fn count(&self) -> Result<usize>;
}

/// `SQLite` implementation of `SyncLogRepository`
pub struct SqliteSyncLogRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSyncLogRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncLogEntry> {
        let json_data: String = row.get(8)?;
        Ok(SyncLogEntry {
            id: row.get(0)?,
            run_id: row.get(1)?,
            connection: row.get(2)?,
            res_id: row.get(3)?,
            res_model: row.get(4)?,
            name: row.get(5)?,
            date_issue: row.get(6)?,
            created_at: row.get(7)?,
            json_data: serde_json::from_str(&json_data).unwrap_or(serde_json::Value::Null),
        })
    }
}

impl SyncLogRepository for SqliteSyncLogRepository<'_> {
    fn append(&self, entry: &SyncLogEntry) -> Result<i64> {
        let json_data = serde_json::to_string(&entry.json_data)?;
        self.conn.execute(
            "INSERT INTO sync_log (run_id, connection, res_id, res_model, name, date_issue,
                created_at, json_data)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                entry.run_id,
                entry.connection,
                entry.res_id,
                entry.res_model,
                entry.name,
                entry.date_issue,
                entry.created_at,
                json_data,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list(&self, limit: usize) -> Result<Vec<SyncLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, connection, res_id, res_model, name, date_issue, created_at, json_data
             FROM sync_log ORDER BY created_at DESC, id DESC LIMIT ?",
        )?;
        let entries = stmt
            .query_map(params![limit], Self::parse_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn list_run(&self, run_id: &str) -> Result<Vec<SyncLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, connection, res_id, res_model, name, date_issue, created_at, json_data
             FROM sync_log WHERE run_id = ? ORDER BY id",
        )?;
        let entries = stmt
            .query_map(params![run_id], Self::parse_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn count(&self) -> Result<usize> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM sync_log", [], |row| row.get(0))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use serde_json::json;

    #[test]
    fn test_append_and_list_run() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteSyncLogRepository::new(db.connection());

        let first = SyncLogEntry::new(
            "run-a",
            "prod",
            "account.move",
            Some(10),
            "F001-10",
            json!({"name": "F001-10"}),
        );
        let skipped = SyncLogEntry::new(
            "run-a",
            "prod",
            "account.move",
            Some(11),
            "F001-11",
            json!({"skipped": "journal not found: F009"}),
        );
        let other = SyncLogEntry::new("run-b", "prod", "res.partner", Some(1), "ACME", json!({}));
        repo.append(&first).unwrap();
        repo.append(&skipped).unwrap();
        repo.append(&other).unwrap();

        let run = repo.list_run("run-a").unwrap();
        assert_eq!(run.len(), 2);
        assert_eq!(run[1].json_data["skipped"], "journal not found: F009");
        assert_eq!(run[0].res_id, Some(10));
        assert_eq!(repo.list(2).unwrap().len(), 2);
        assert_eq!(repo.count().unwrap(), 3);
    }
}
