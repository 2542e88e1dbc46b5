//! JSON-RPC client for the remote web endpoints

use std::cell::Cell;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::{Connector, Domain, RemoteSession};
use crate::config::{SyncSettings, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::error::{Error, Result};
use crate::models::{Endpoint, RemoteRecord};
use crate::util::compact_text;

/// Opens `JsonRpcSession`s over HTTP
#[derive(Debug, Clone)]
pub struct JsonRpcConnector {
    timeout: Duration,
}

impl Default for JsonRpcConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
    }
}

impl JsonRpcConnector {
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub const fn from_settings(settings: &SyncSettings) -> Self {
        Self::new(settings.request_timeout())
    }

    fn transport(&self, endpoint: &Endpoint) -> Result<Transport> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(self.timeout)
            .build()?;
        Ok(Transport {
            client,
            base_url: endpoint.base_url(),
            next_id: Cell::new(1),
        })
    }

    /// Check an endpoint step by step without failing.
    ///
    /// Each step only runs when the previous one succeeded; the first failure
    /// is reported in `error`.
    pub fn test_connection(&self, endpoint: &Endpoint) -> ConnectionReport {
        let mut report = ConnectionReport::default();

        let transport = match self.transport(endpoint) {
            Ok(transport) => transport,
            Err(error) => {
                report.error = Some(format!("Connection failed: {error}"));
                return report;
            }
        };

        match transport.call("/web/webclient/version_info", json!({})) {
            Ok(info) => {
                report.connection = true;
                report.version = info
                    .get("server_version")
                    .and_then(Value::as_str)
                    .map(str::to_string);
            }
            Err(Error::Http(error)) => {
                report.error = Some(format!("Connection failed: {error}"));
                return report;
            }
            Err(error) => {
                report.connection = true;
                report.error = Some(format!("Version check failed: {error}"));
            }
        }

        let session = match self.connect(endpoint) {
            Ok(session) => session,
            Err(error) => {
                report.error = Some(error.to_string());
                return report;
            }
        };
        report.authentication = true;
        report.user_id = Some(session.uid());

        match basic_read(&session) {
            Ok(sample) => {
                report.basic_read = true;
                report.sample = sample;
            }
            Err(error) => report.error = Some(format!("Basic operations failed: {error}")),
        }

        tracing::info!(
            "Connection test for {}: connection={} authentication={} basic_read={}",
            endpoint.name,
            report.connection,
            report.authentication,
            report.basic_read
        );
        report
    }
}

fn basic_read(session: &JsonRpcSession) -> Result<Option<Value>> {
    let ids = session.search("res.partner", &Domain::new(), None, Some(1))?;
    let records = if ids.is_empty() {
        session.read("res.users", &[session.uid()], &["name"])?
    } else {
        session.read("res.partner", &ids[..1], &["name"])?
    };
    Ok(records.into_iter().next().map(RemoteRecord::into_value))
}

impl Connector for JsonRpcConnector {
    type Session = JsonRpcSession;

    fn connect(&self, endpoint: &Endpoint) -> Result<JsonRpcSession> {
        let transport = self.transport(endpoint)?;

        let databases = transport
            .call_service("db", "list", json!([]))
            .map_err(|error| match error {
                Error::Http(error) => {
                    Error::Connection(format!("{} is unreachable: {error}", endpoint.base_url()))
                }
                other => other,
            })?;
        let databases: Vec<String> = serde_json::from_value(databases)?;
        if !has_database(&databases, &endpoint.database) {
            return Err(Error::Connection(format!(
                "database '{}' does not exist on {}",
                endpoint.database,
                endpoint.base_url()
            )));
        }

        let result = transport
            .call(
                "/web/session/authenticate",
                json!({
                    "db": endpoint.database,
                    "login": endpoint.user,
                    "password": endpoint.password,
                }),
            )
            .map_err(|error| match error {
                Error::Rpc(message) => Error::Authentication(message),
                other => other,
            })?;

        let uid = result
            .get("uid")
            .and_then(Value::as_i64)
            .filter(|uid| *uid > 0)
            .ok_or_else(|| {
                Error::Authentication(format!(
                    "credentials rejected for user '{}' on '{}'",
                    endpoint.user, endpoint.database
                ))
            })?;
        let context = result
            .get("user_context")
            .cloned()
            .unwrap_or_else(|| json!({}));

        tracing::debug!(
            "Opened remote session on {} as uid {uid}",
            endpoint.database
        );
        Ok(JsonRpcSession {
            transport,
            database: endpoint.database.clone(),
            uid,
            context,
        })
    }
}

struct Transport {
    client: Client,
    base_url: String,
    next_id: Cell<u64>,
}

impl Transport {
    fn call(&self, path: &str, params: Value) -> Result<Value> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .header("Accept", "application/json")
            .json(&json!({
                "jsonrpc": "2.0",
                "method": "call",
                "params": params,
                "id": id,
            }))
            .send()?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(Error::Rpc(parse_http_error(status, &body)));
        }

        let payload = response.json::<RpcResponse>()?;
        if let Some(fault) = payload.error {
            return Err(Error::Rpc(fault.describe()));
        }
        Ok(payload.result.unwrap_or(Value::Null))
    }

    fn call_service(&self, service: &str, method: &str, args: Value) -> Result<Value> {
        self.call(
            "/jsonrpc",
            json!({
                "service": service,
                "method": method,
                "args": args,
            }),
        )
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcFault>,
}

#[derive(Debug, Deserialize)]
struct RpcFault {
    message: Option<String>,
    data: Option<RpcFaultData>,
}

#[derive(Debug, Deserialize)]
struct RpcFaultData {
    name: Option<String>,
    message: Option<String>,
}

impl RpcFault {
    fn describe(&self) -> String {
        let data_message = self.data.as_ref().and_then(|data| data.message.as_deref());
        let message = data_message
            .or(self.message.as_deref())
            .unwrap_or("unknown remote error");
        match self.data.as_ref().and_then(|data| data.name.as_deref()) {
            Some(name) => format!("{} ({name})", compact_text(message)),
            None => compact_text(message),
        }
    }
}

fn parse_http_error(status: StatusCode, body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", compact_text(trimmed), status.as_u16())
    }
}

/// Authenticated JSON-RPC session; destroyed on the server when dropped
pub struct JsonRpcSession {
    transport: Transport,
    database: String,
    uid: i64,
    context: Value,
}

impl JsonRpcSession {
    pub const fn uid(&self) -> i64 {
        self.uid
    }

    fn call_kw(&self, model: &str, method: &str, args: Value, kwargs: Map<String, Value>) -> Result<Value> {
        let mut kwargs = kwargs;
        kwargs.insert("context".into(), self.context.clone());
        self.transport.call(
            "/web/dataset/call_kw",
            json!({
                "model": model,
                "method": method,
                "args": args,
                "kwargs": kwargs,
            }),
        )
    }
}

impl RemoteSession for JsonRpcSession {
    fn search(
        &self,
        model: &str,
        domain: &Domain,
        order: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<i64>> {
        let mut kwargs = Map::new();
        if let Some(order) = order {
            kwargs.insert("order".into(), Value::from(order));
        }
        if let Some(limit) = limit.filter(|limit| *limit > 0) {
            kwargs.insert("limit".into(), Value::from(limit));
        }
        let result = self.call_kw(model, "search", json!([domain.to_value()]), kwargs)?;
        Ok(serde_json::from_value(result)?)
    }

    fn read(&self, model: &str, ids: &[i64], fields: &[&str]) -> Result<Vec<RemoteRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let result = self.call_kw(model, "read", json!([ids, fields]), Map::new())?;
        match result {
            Value::Array(rows) => rows.into_iter().map(RemoteRecord::from_value).collect(),
            other => Err(Error::Rpc(format!(
                "{model}.read returned {}",
                compact_text(&other.to_string())
            ))),
        }
    }

    fn execute(&self, model: &str, method: &str, args: Value) -> Result<Value> {
        let args = match args {
            Value::Array(_) => args,
            other => Value::Array(vec![other]),
        };
        self.call_kw(model, method, args, Map::new())
    }
}

impl Drop for JsonRpcSession {
    fn drop(&mut self) {
        match self.transport.call("/web/session/destroy", json!({})) {
            Ok(_) => tracing::debug!("Closed remote session on {}", self.database),
            Err(error) => tracing::warn!(
                "Failed to close remote session on {}: {error}",
                self.database
            ),
        }
    }
}

/// Outcome of `JsonRpcConnector::test_connection`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConnectionReport {
    pub connection: bool,
    pub version: Option<String>,
    pub authentication: bool,
    pub user_id: Option<i64>,
    pub basic_read: bool,
    /// Record read during the basic operations step
    pub sample: Option<Value>,
    pub error: Option<String>,
}

impl ConnectionReport {
    pub const fn is_ok(&self) -> bool {
        self.connection && self.authentication && self.basic_read
    }
}

/// Exact match; a configured `prod` never selects `prod_copy`
fn has_database(databases: &[String], database: &str) -> bool {
    databases.iter().any(|name| name == database)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_must_match_exactly() {
        let databases = vec!["prod_copy".to_string(), "test".to_string()];
        assert!(!has_database(&databases, "prod"));
        assert!(has_database(&databases, "prod_copy"));
    }

    #[test]
    fn fault_prefers_data_message() {
        let fault: RpcFault = serde_json::from_value(json!({
            "code": 200,
            "message": "Odoo Server Error",
            "data": {"name": "odoo.exceptions.AccessDenied", "message": "Access Denied"}
        }))
        .unwrap();
        assert_eq!(
            fault.describe(),
            "Access Denied (odoo.exceptions.AccessDenied)"
        );
    }

    #[test]
    fn fault_without_data_uses_message() {
        let fault: RpcFault =
            serde_json::from_value(json!({"message": "Session expired"})).unwrap();
        assert_eq!(fault.describe(), "Session expired");
    }

    #[test]
    fn http_error_includes_status() {
        assert_eq!(
            parse_http_error(StatusCode::NOT_FOUND, ""),
            "HTTP 404"
        );
        assert_eq!(
            parse_http_error(StatusCode::BAD_GATEWAY, " upstream down "),
            "upstream down (502)"
        );
    }

    #[test]
    fn unreachable_endpoint_reports_connection_failure() {
        let endpoint = Endpoint {
            name: "offline".into(),
            host: "127.0.0.1".into(),
            port: 9,
            database: "prod".into(),
            user: "admin".into(),
            password: "admin".into(),
            version: 13,
        };
        let connector = JsonRpcConnector::new(Duration::from_secs(2));
        let report = connector.test_connection(&endpoint);
        assert!(!report.connection);
        assert!(!report.is_ok());
        assert!(report.error.is_some());

        assert!(matches!(
            connector.connect(&endpoint),
            Err(Error::Connection(_))
        ));
    }
}
