use std::io;

use eventstream_types::ActionError;
use thiserror::Error;

/// Errors that can occur in the eventstream SDK
#[derive(Error, Debug)]
pub enum ClientError {
    /// Failed to reach the broker
    #[error("Connection error: failed to connect to {addr}: {source}")]
    Connection {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Request rejected before it was sent (e.g. AFTER mode without an afterId)
    #[error("Invalid request: {0}")]
    Invalid(#[from] ActionError),

    /// Failed to write to the broker
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias for SDK operations
pub type Result<T> = std::result::Result<T, ClientError>;
