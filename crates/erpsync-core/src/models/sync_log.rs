//! Sync log model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Append-only audit entry written for every processed remote record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    /// Row identifier, `None` until stored
    pub id: Option<i64>,
    /// Run that produced the entry (UUID v7)
    pub run_id: String,
    /// Connection name
    pub connection: String,
    /// Remote record id
    pub res_id: Option<i64>,
    /// Remote model name
    pub res_model: String,
    /// Display name or document number
    pub name: String,
    pub date_issue: NaiveDate,
    /// Timestamp (Unix ms)
    pub created_at: i64,
    /// Transformed payload, or the skip reason
    pub json_data: Value,
}

impl SyncLogEntry {
    pub fn new(
        run_id: impl Into<String>,
        connection: impl Into<String>,
        res_model: impl Into<String>,
        res_id: Option<i64>,
        name: impl Into<String>,
        json_data: Value,
    ) -> Self {
        let now = chrono::Local::now();
        Self {
            id: None,
            run_id: run_id.into(),
            connection: connection.into(),
            res_id,
            res_model: res_model.into(),
            name: name.into(),
            date_issue: now.date_naive(),
            created_at: now.timestamp_millis(),
            json_data,
        }
    }
}
