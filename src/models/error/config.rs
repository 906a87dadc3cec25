use serde::Serialize;
use thiserror::Error;

use crate::models::IdParseError;

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ConfigError {
    #[error("Invalid endpoint '{0}': expected <host>:<port>")]
    InvalidEndpoint(String),
    #[error("Invalid id: {0}")]
    InvalidId(#[from] IdParseError),
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("Network configuration contains no nodes")]
    EmptyNetwork,
    #[error("Missing required configuration: {0}")]
    Missing(&'static str),
    #[error("Failed to read config file: {0}")]
    FileRead(String),
    #[error("Failed to parse config file: {0}")]
    FileParse(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::FileRead(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::FileParse(err.to_string())
    }
}
