//! Remote record wrapper

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// A row returned by the remote `read` call.
///
/// The remote side encodes "no value" as `false` for every field type, so the
/// accessors here treat `false` and `null` alike as absent. Many2one fields
/// arrive as `[id, display_name]` pairs and x2many fields as id arrays.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteRecord(Map<String, Value>);

impl RemoteRecord {
    pub const fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(Error::Rpc(format!(
                "expected a record object, got {}",
                crate::util::compact_text(&other.to_string())
            ))),
        }
    }

    /// Remote integer id, `0` when missing
    pub fn id(&self) -> i64 {
        self.0.get("id").and_then(Value::as_i64).unwrap_or_default()
    }

    /// Raw field value, `None` for absent, `null` and `false`
    pub fn get(&self, field: &str) -> Option<&Value> {
        match self.0.get(field) {
            None | Some(Value::Null | Value::Bool(false)) => None,
            Some(value) => Some(value),
        }
    }

    pub fn str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// Trimmed non-empty text
    pub fn text(&self, field: &str) -> Option<String> {
        crate::util::normalize_text_option(self.str(field).map(str::to_string))
    }

    pub fn f64(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(Value::as_f64)
    }

    pub fn i64(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(Value::as_i64)
    }

    pub fn bool(&self, field: &str) -> bool {
        self.get(field).is_some_and(|value| value.as_bool().unwrap_or(true))
    }

    /// `(id, display_name)` of a many2one field
    pub fn many2one(&self, field: &str) -> Option<(i64, &str)> {
        let pair = self.get(field)?.as_array()?;
        let id = pair.first()?.as_i64()?;
        let name = pair.get(1).and_then(Value::as_str).unwrap_or_default();
        Some((id, name))
    }

    pub fn many2one_id(&self, field: &str) -> Option<i64> {
        self.many2one(field).map(|(id, _)| id)
    }

    pub fn many2one_name(&self, field: &str) -> Option<&str> {
        self.many2one(field)
            .map(|(_, name)| name)
            .filter(|name| !name.is_empty())
    }

    /// Ids of an x2many field
    pub fn ids(&self, field: &str) -> Vec<i64> {
        self.get(field)
            .and_then(Value::as_array)
            .map(|values| values.iter().filter_map(Value::as_i64).collect())
            .unwrap_or_default()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Value> for RemoteRecord {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self(fields),
            _ => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> RemoteRecord {
        RemoteRecord::from(json!({
            "id": 42,
            "name": "F001-00000042",
            "zip": false,
            "street": null,
            "partner_id": [7, "ACME SAC"],
            "shop_id": false,
            "invoice_line_ids": [3, 4, 5],
            "amount_total": 118.0,
            "anulada": true,
        }))
    }

    #[test]
    fn false_reads_as_absent() {
        let record = record();
        assert_eq!(record.get("zip"), None);
        assert_eq!(record.get("street"), None);
        assert_eq!(record.str("zip"), None);
        assert!(!record.bool("zip"));
        assert!(record.bool("anulada"));
    }

    #[test]
    fn many2one_reads_pair() {
        let record = record();
        assert_eq!(record.id(), 42);
        assert_eq!(record.many2one("partner_id"), Some((7, "ACME SAC")));
        assert_eq!(record.many2one_id("shop_id"), None);
        assert_eq!(record.ids("invoice_line_ids"), vec![3, 4, 5]);
        assert_eq!(record.f64("amount_total"), Some(118.0));
    }

    #[test]
    fn from_value_rejects_non_objects() {
        assert!(RemoteRecord::from_value(json!([1, 2])).is_err());
        assert!(RemoteRecord::from_value(json!({"id": 1})).is_ok());
    }
}
