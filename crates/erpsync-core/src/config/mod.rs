//! Run settings shared by the CLI and the sync engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_CHUNK_SIZE: usize = 30;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 720;

/// Persisted defaults for sync runs.
///
/// Every field can be overridden per run from the command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Remote ids fetched per round trip
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Timeout of a single remote call
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Local tax applied to imported lines and products
    #[serde(default)]
    pub default_tax_id: Option<i64>,
    /// Remote company filter
    #[serde(default)]
    pub company_id: Option<i64>,
    /// Company stamped on local records
    #[serde(default)]
    pub local_company_id: Option<i64>,
    /// Stock location for lots and quants
    #[serde(default)]
    pub location_id: Option<i64>,
}

const fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            default_tax_id: None,
            company_id: None,
            local_company_id: None,
            location_id: None,
        }
    }
}

impl SyncSettings {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidInput(
                "chunk size must be greater than zero".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::InvalidInput(
                "request timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
