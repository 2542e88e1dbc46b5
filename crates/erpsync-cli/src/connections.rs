//! Persistent connection configuration.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use erpsync_core::config::SyncSettings;
use erpsync_core::models::Endpoint;
use erpsync_core::util::normalize_text_option;
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "connections.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionsConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub active_connection: Option<String>,
    #[serde(default)]
    pub connections: BTreeMap<String, SavedConnection>,
    #[serde(default)]
    pub settings: SyncSettings,
}

#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SavedConnection {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub version: u32,
}

impl fmt::Debug for SavedConnection {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SavedConnection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("version", &self.version)
            .finish()
    }
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> Result<PathBuf, String> {
    dirs::config_dir()
        .map(|dir| dir.join("erpsync").join(CONFIG_FILE_NAME))
        .ok_or_else(|| "Failed to resolve config directory".to_string())
}

pub fn normalize_connection_name(value: Option<&str>) -> Option<String> {
    let value = value?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl ConnectionsConfig {
    pub fn load() -> Result<Self, String> {
        Self::load_from_path(&default_config_path()?)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let mut config = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, String> {
        let path = default_config_path()?;
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    /// Explicit name, then `ERPSYNC_CONNECTION`, then the active entry, then `default`
    pub fn resolve_connection_name(&self, explicit: Option<&str>) -> String {
        if let Some(name) = normalize_connection_name(explicit) {
            return name;
        }
        if let Some(name) =
            normalize_connection_name(std::env::var("ERPSYNC_CONNECTION").ok().as_deref())
        {
            return name;
        }
        if let Some(name) = normalize_connection_name(self.active_connection.as_deref()) {
            return name;
        }
        "default".to_string()
    }

    pub fn endpoint(&self, name: &str) -> Option<Endpoint> {
        self.connections.get(name).map(|saved| Endpoint {
            name: name.to_string(),
            host: saved.host.clone(),
            port: saved.port,
            database: saved.database.clone(),
            user: saved.user.clone(),
            password: saved.password.clone(),
            version: saved.version,
        })
    }

    fn normalize(&mut self) {
        self.active_connection = normalize_connection_name(self.active_connection.as_deref());
        self.connections = std::mem::take(&mut self.connections)
            .into_iter()
            .filter_map(|(name, mut saved)| {
                let name = normalize_connection_name(Some(&name))?;
                saved.normalize();
                Some((name, saved))
            })
            .collect();
        if self
            .active_connection
            .as_ref()
            .is_some_and(|name| !self.connections.contains_key(name))
        {
            self.active_connection = None;
        }
    }
}

impl SavedConnection {
    fn normalize(&mut self) {
        self.host = normalize_text_option(Some(self.host.clone())).unwrap_or_default();
        self.database = normalize_text_option(Some(self.database.clone())).unwrap_or_default();
        self.user = normalize_text_option(Some(self.user.clone())).unwrap_or_default();
    }
}
