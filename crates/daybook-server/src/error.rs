//! Error types for the server crate.

use std::io;

/// Errors raised while bringing the service up.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Storage backend failed to initialise.
    #[error("storage error: {0}")]
    Storage(#[from] daybook_store::StoreError),
}
