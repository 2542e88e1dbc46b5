//! In-memory remote used by tests

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use serde_json::Value;

use super::{Connector, Domain, RemoteSession, Term};
use crate::error::{Error, Result};
use crate::models::{Endpoint, RemoteRecord};

#[derive(Default)]
struct State {
    database: String,
    reject_credentials: bool,
    models: HashMap<String, BTreeMap<i64, RemoteRecord>>,
    opened: usize,
    closed: usize,
    reads: HashMap<String, usize>,
    executed: Vec<(String, String, Value)>,
}

/// Remote instance backed by in-memory tables.
///
/// Clones share the same tables and counters.
#[derive(Clone)]
pub struct MemoryRemote {
    state: Rc<RefCell<State>>,
}

impl MemoryRemote {
    pub fn new(database: &str) -> Self {
        Self {
            state: Rc::new(RefCell::new(State {
                database: database.to_string(),
                ..State::default()
            })),
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint {
            name: "memory".into(),
            host: "localhost".into(),
            port: 8069,
            database: self.state.borrow().database.clone(),
            user: "admin".into(),
            password: "admin".into(),
            version: 13,
        }
    }

    /// Insert a record; `fields` must be an object with an `id`
    pub fn insert(&self, model: &str, fields: Value) {
        let record = RemoteRecord::from(fields);
        self.state
            .borrow_mut()
            .models
            .entry(model.to_string())
            .or_default()
            .insert(record.id(), record);
    }

    pub fn reject_credentials(&self) {
        self.state.borrow_mut().reject_credentials = true;
    }

    pub fn opened(&self) -> usize {
        self.state.borrow().opened
    }

    pub fn closed(&self) -> usize {
        self.state.borrow().closed
    }

    /// Number of `read` round trips against `model`
    pub fn reads(&self, model: &str) -> usize {
        self.state.borrow().reads.get(model).copied().unwrap_or_default()
    }

    pub fn executed(&self) -> Vec<(String, String, Value)> {
        self.state.borrow().executed.clone()
    }
}

impl Connector for MemoryRemote {
    type Session = MemorySession;

    fn connect(&self, endpoint: &Endpoint) -> Result<MemorySession> {
        let mut state = self.state.borrow_mut();
        if state.database != endpoint.database {
            return Err(Error::Connection(format!(
                "database '{}' does not exist",
                endpoint.database
            )));
        }
        if state.reject_credentials {
            return Err(Error::Authentication("Access Denied".into()));
        }
        state.opened += 1;
        Ok(MemorySession {
            state: Rc::clone(&self.state),
        })
    }
}

pub struct MemorySession {
    state: Rc<RefCell<State>>,
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.state.borrow_mut().closed += 1;
    }
}

impl RemoteSession for MemorySession {
    fn search(
        &self,
        model: &str,
        domain: &Domain,
        order: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<i64>> {
        let state = self.state.borrow();
        let Some(records) = state.models.get(model) else {
            return Ok(Vec::new());
        };
        let mut matched: Vec<&RemoteRecord> = records
            .values()
            .filter(|record| matches(domain.terms(), record))
            .collect();
        if let Some(field) = order.and_then(|order| order.split_whitespace().next()) {
            matched.sort_by(|a, b| compare(key(a, field), key(b, field)).unwrap_or(Ordering::Equal));
        }
        let limit = limit.filter(|limit| *limit > 0).unwrap_or(usize::MAX);
        Ok(matched.into_iter().take(limit).map(RemoteRecord::id).collect())
    }

    fn read(&self, model: &str, ids: &[i64], fields: &[&str]) -> Result<Vec<RemoteRecord>> {
        let mut state = self.state.borrow_mut();
        *state.reads.entry(model.to_string()).or_default() += 1;
        let Some(records) = state.models.get(model) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| records.get(id))
            .map(|record| project(record, fields))
            .collect())
    }

    fn execute(&self, model: &str, method: &str, args: Value) -> Result<Value> {
        self.state
            .borrow_mut()
            .executed
            .push((model.to_string(), method.to_string(), args));
        Ok(Value::Bool(true))
    }
}

fn project(record: &RemoteRecord, fields: &[&str]) -> RemoteRecord {
    if fields.is_empty() {
        return record.clone();
    }
    let mut projected = RemoteRecord::default();
    projected.insert("id", Value::from(record.id()));
    for field in fields {
        projected.insert(*field, record.get(field).cloned().unwrap_or(Value::Bool(false)));
    }
    projected
}

fn matches(terms: &[Term], record: &RemoteRecord) -> bool {
    let mut position = 0;
    let mut result = true;
    while position < terms.len() {
        let (value, next) = evaluate(terms, position, record);
        result &= value;
        position = next;
    }
    result
}

fn evaluate(terms: &[Term], position: usize, record: &RemoteRecord) -> (bool, usize) {
    let Some(term) = terms.get(position) else {
        return (true, position);
    };
    match term {
        Term::Or => {
            let (left, next) = evaluate(terms, position + 1, record);
            let (right, next) = evaluate(terms, next, record);
            (left || right, next)
        }
        Term::And => {
            let (left, next) = evaluate(terms, position + 1, record);
            let (right, next) = evaluate(terms, next, record);
            (left && right, next)
        }
        Term::Not => {
            let (value, next) = evaluate(terms, position + 1, record);
            (!value, next)
        }
        Term::Leaf {
            field,
            operator,
            value,
        } => (leaf(key(record, field), operator, value), position + 1),
    }
}

/// Comparable field value: many2one pairs compare by id
fn key<'a>(record: &'a RemoteRecord, field: &str) -> Option<&'a Value> {
    let value = record.get(field)?;
    match value.as_array() {
        Some(pair) if pair.len() == 2 && pair[0].is_i64() => pair.first(),
        _ => Some(value),
    }
}

fn compare(left: Option<&Value>, right: Option<&Value>) -> Option<Ordering> {
    match (left, right) {
        (None, None) => Some(Ordering::Equal),
        (None, Some(_)) => Some(Ordering::Less),
        (Some(_), None) => Some(Ordering::Greater),
        (Some(left), Some(right)) => match (left.as_f64(), right.as_f64()) {
            (Some(left), Some(right)) => left.partial_cmp(&right),
            _ => match (left.as_str(), right.as_str()) {
                (Some(left), Some(right)) => Some(left.cmp(right)),
                _ => None,
            },
        },
    }
}

fn leaf(actual: Option<&Value>, operator: &str, expected: &Value) -> bool {
    let expected_value = match expected {
        Value::Bool(false) | Value::Null => None,
        other => Some(other),
    };
    match operator {
        "=" => compare(actual, expected_value) == Some(Ordering::Equal),
        "!=" => compare(actual, expected_value) != Some(Ordering::Equal),
        ">=" => actual.is_some() && compare(actual, expected_value).is_some_and(Ordering::is_ge),
        "<=" => actual.is_some() && compare(actual, expected_value).is_some_and(Ordering::is_le),
        ">" => actual.is_some() && compare(actual, expected_value) == Some(Ordering::Greater),
        "<" => actual.is_some() && compare(actual, expected_value) == Some(Ordering::Less),
        "in" => expected.as_array().is_some_and(|values| {
            values
                .iter()
                .any(|value| compare(actual, Some(value)) == Some(Ordering::Equal))
        }),
        "ilike" => match (actual.and_then(Value::as_str), expected.as_str()) {
            (Some(actual), Some(needle)) => actual.to_lowercase().contains(&needle.to_lowercase()),
            _ => false,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn remote() -> MemoryRemote {
        let remote = MemoryRemote::new("prod");
        remote.insert("account.move", json!({"id": 1, "name": "F001-2", "state": "posted", "partner_id": [9, "ACME"]}));
        remote.insert("account.move", json!({"id": 2, "name": "F001-1", "state": "cancel", "partner_id": false}));
        remote.insert("account.move", json!({"id": 3, "name": "B001-1", "state": "draft", "partner_id": [9, "ACME"]}));
        remote
    }

    #[test]
    fn search_evaluates_prefix_domain() {
        let remote = remote();
        let session = remote.connect(&remote.endpoint()).unwrap();

        let domain = Domain::new()
            .filter("state", "in", json!(["posted", "cancel"]))
            .filter("name", "ilike", "f001");
        assert_eq!(
            session.search("account.move", &domain, Some("name"), None).unwrap(),
            vec![2, 1]
        );

        let domain = Domain::new()
            .or()
            .filter("partner_id", "=", 9)
            .filter("state", "=", "cancel");
        assert_eq!(
            session.search("account.move", &domain, Some("id"), Some(2)).unwrap(),
            vec![1, 2]
        );

        let domain = Domain::new().not().filter("partner_id", "=", false);
        assert_eq!(
            session.search("account.move", &domain, Some("id"), None).unwrap(),
            vec![1, 3]
        );
    }

    #[test]
    fn sessions_are_counted_on_drop() {
        let remote = remote();
        {
            let _session = remote.connect(&remote.endpoint()).unwrap();
            assert_eq!(remote.opened(), 1);
            assert_eq!(remote.closed(), 0);
        }
        assert_eq!(remote.closed(), 1);
    }

    #[test]
    fn connect_checks_database_and_credentials() {
        let remote = remote();
        let mut endpoint = remote.endpoint();
        endpoint.database = "missing".into();
        assert!(matches!(remote.connect(&endpoint), Err(Error::Connection(_))));

        remote.reject_credentials();
        assert!(matches!(
            remote.connect(&remote.endpoint()),
            Err(Error::Authentication(_))
        ));
        assert_eq!(remote.opened(), 0);
    }

    #[test]
    fn read_projects_fields() {
        let remote = remote();
        let session = remote.connect(&remote.endpoint()).unwrap();
        let records = session.read("account.move", &[3, 1], &["name"]).unwrap();
        assert_eq!(records[0].str("name"), Some("B001-1"));
        assert_eq!(records[1].id(), 1);
        assert_eq!(records[1].get("state"), None);
        assert_eq!(remote.reads("account.move"), 1);
    }
}
