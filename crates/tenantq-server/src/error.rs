//! Error types for the tenantq client.

use thiserror::Error;

use crate::protocol::ErrorResponse;

/// Errors returned by `TenantqClient` methods.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(serde_json::Error),

    #[error("server disconnected")]
    Disconnected,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("server error: {}: {}", .0.error, .0.message)]
    Server(ErrorResponse),
}

impl ClientError {
    /// The server-reported error kind, if this came back as an error response.
    pub fn server_kind(&self) -> Option<&str> {
        match self {
            ClientError::Server(resp) => Some(&resp.error),
            _ => None,
        }
    }
}

/// Errors raised while loading a seed file.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        source: serde_json::Error,
    },

    #[error("line {line}: {source}")]
    Rejected {
        line: usize,
        source: tenantq_core::error::Error,
    },
}
