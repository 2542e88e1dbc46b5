//! Remote ERP access.
//!
//! `Connector` opens an authenticated `RemoteSession`. Sessions release their
//! server-side state when dropped, so every exit path of a sync stage closes
//! the session it opened.

mod client;
mod domain;
#[cfg(test)]
pub mod memory;

use serde_json::Value;

use crate::error::Result;
use crate::models::{Endpoint, RemoteRecord};

pub use client::{ConnectionReport, JsonRpcConnector, JsonRpcSession};
pub use domain::{Domain, Term};

/// An authenticated session on a remote instance
pub trait RemoteSession {
    /// Ids matching `domain`, sorted by `order` when given
    fn search(
        &self,
        model: &str,
        domain: &Domain,
        order: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<i64>>;

    /// Field values of `ids`; an empty `fields` slice reads every field
    fn read(&self, model: &str, ids: &[i64], fields: &[&str]) -> Result<Vec<RemoteRecord>>;

    /// Every field of `ids`
    fn browse(&self, model: &str, ids: &[i64]) -> Result<Vec<RemoteRecord>> {
        self.read(model, ids, &[])
    }

    /// Arbitrary model method with positional arguments
    fn execute(&self, model: &str, method: &str, args: Value) -> Result<Value>;
}

/// Opens sessions against an endpoint
pub trait Connector {
    type Session: RemoteSession;

    /// Fails with `Error::Connection` when the database does not exist on the
    /// server and `Error::Authentication` when the credentials are rejected.
    fn connect(&self, endpoint: &Endpoint) -> Result<Self::Session>;
}

/// Read `ids` and return them in the same order, dropping ids the remote no
/// longer has.
pub fn read_ordered<S: RemoteSession + ?Sized>(
    session: &S,
    model: &str,
    ids: &[i64],
    fields: &[&str],
) -> Result<Vec<RemoteRecord>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut records: std::collections::HashMap<i64, RemoteRecord> = session
        .read(model, ids, fields)?
        .into_iter()
        .map(|record| (record.id(), record))
        .collect();
    Ok(ids.iter().filter_map(|id| records.remove(id)).collect())
}

/// Read every record of `model` and key it by remote id
pub fn read_all_by_id<S: RemoteSession + ?Sized>(
    session: &S,
    model: &str,
    fields: &[&str],
) -> Result<std::collections::HashMap<i64, RemoteRecord>> {
    let ids = session.search(model, &Domain::new(), None, None)?;
    if ids.is_empty() {
        return Ok(std::collections::HashMap::new());
    }
    Ok(session
        .read(model, &ids, fields)?
        .into_iter()
        .map(|record| (record.id(), record))
        .collect())
}
