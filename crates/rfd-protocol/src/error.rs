//! Error types for AT command construction

use thiserror::Error;

/// Errors that can occur while building an AT command
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Parameter name is empty or contains characters the firmware cannot parse
    #[error("invalid parameter name: {0:?}")]
    InvalidParameterName(String),

    /// Parameter value is empty or contains whitespace/control characters
    #[error("invalid value for parameter {name}: {value:?}")]
    InvalidParameterValue { name: String, value: String },
}
