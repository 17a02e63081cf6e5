//! Error types for the recent-orders bridge

use thiserror::Error;

/// Bridge errors
///
/// Every payload is a plain string so the error can be cloned: a single
/// failed resolution or initial load is shared by all of its waiters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Resolution error: {0}")]
    Resolution(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Refresh error: {0}")]
    Refresh(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl BridgeError {
    /// Whether this error came from the effective-key override policy
    pub fn is_configuration(&self) -> bool {
        matches!(self, BridgeError::Configuration(_))
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        BridgeError::Io(err.to_string())
    }
}

impl From<prometheus::Error> for BridgeError {
    fn from(err: prometheus::Error) -> Self {
        BridgeError::Configuration(format!("metrics registration failed: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
