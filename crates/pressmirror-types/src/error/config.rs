//! Configuration-related errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading, validating or saving configuration.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum ConfigError {
    /// Data directory could not be determined
    #[error("Data directory unavailable: {message}")]
    DataDir { message: String },

    /// Config file parse error
    #[error("Config parse error: {message}")]
    ParseError { message: String },

    /// Config validation error (invalid values)
    #[error("Config validation error for {field}: {message}")]
    ValidationError { field: String, message: String },

    /// Config write error (permission denied, disk full, etc)
    #[error("Config write error: {message}")]
    WriteError { message: String },
}

impl ConfigError {
    /// Create a parse error from a serde_json error.
    pub fn from_json_error(e: &serde_json::Error) -> Self {
        Self::ParseError { message: e.to_string() }
    }

    /// Create a write error from an IO error.
    pub fn from_io_error(e: &std::io::Error) -> Self {
        Self::WriteError { message: e.to_string() }
    }

    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError { field: field.into(), message: message.into() }
    }
}
