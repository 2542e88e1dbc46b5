//! Remote endpoint description

use serde::{Deserialize, Serialize};
use std::fmt;

use super::SourceVersion;

/// Connection parameters of a remote instance
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Display name used in sync logs
    pub name: String,
    /// Host name or base URL (`erp.example.com`, `https://erp.example.com`)
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    /// Major version of the remote instance (11, 12, 13, 17)
    #[serde(default = "default_version")]
    pub version: u32,
}

const fn default_version() -> u32 {
    11
}

impl Endpoint {
    /// Base URL for HTTP calls, defaulting to plain `http` when no scheme is given
    pub fn base_url(&self) -> String {
        let host = self.host.trim().trim_end_matches('/');
        if crate::util::is_http_url(host) {
            format!("{host}:{}", self.port)
        } else {
            format!("http://{host}:{}", self.port)
        }
    }

    pub const fn source_version(&self) -> SourceVersion {
        SourceVersion::from_major(self.version)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Endpoint")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("version", &self.version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(host: &str) -> Endpoint {
        Endpoint {
            name: "legacy".into(),
            host: host.into(),
            port: 8069,
            database: "prod".into(),
            user: "admin".into(),
            password: "secret-password".into(),
            version: 13,
        }
    }

    #[test]
    fn base_url_adds_scheme_when_missing() {
        assert_eq!(endpoint("10.0.0.5").base_url(), "http://10.0.0.5:8069");
        assert_eq!(
            endpoint("https://erp.example.com/").base_url(),
            "https://erp.example.com:8069"
        );
    }

    #[test]
    fn debug_redacts_password() {
        let rendered = format!("{:?}", endpoint("localhost"));
        assert!(!rendered.contains("secret-password"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn version_defaults_to_legacy_layout() {
        let endpoint: Endpoint = serde_json::from_str(
            r#"{"name":"a","host":"h","port":8069,"database":"d","user":"u","password":"p"}"#,
        )
        .unwrap();
        assert_eq!(endpoint.source_version(), SourceVersion::V11);
    }
}
