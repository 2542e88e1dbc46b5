use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] erpsync_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Connection not found: {0}. Run `erpsync connection add {0} ...` first.")]
    ConnectionNotFound(String),
    #[error("Connection test failed: {0}")]
    ConnectionTest(String),
}
