//! Error taxonomy for the store.
//!
//! Two of these are benign: [`StoreError::NoData`] and
//! [`StoreError::NoTable`] are expected per-partition outcomes during a
//! fan-out and are swallowed by the query engine's merge logic. Everything
//! else propagates unchanged to the caller.

use daybook_core::FilterSyntaxError;
use thiserror::Error;

/// Result type alias using [`StoreError`].
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Caller input defect, resolved before any storage access. 400-class.
    #[error("validation error: {0}")]
    Validation(String),

    /// Malformed filter string. 400-class.
    #[error(transparent)]
    Filter(#[from] FilterSyntaxError),

    /// Partition schema creation failed. Fatal, aborts the in-flight
    /// ingestion.
    #[error("provisioning error: {0}")]
    Provisioning(String),

    /// A partition's query returned no rows. Benign.
    #[error("no data found in any searched partition")]
    NoData,

    /// A partition's table does not exist yet. Benign.
    #[error("no such partition table: {0}")]
    NoTable(String),

    /// A create ran into a structure that already exists. Tolerated by the
    /// provisioner as a lost creation race, an error anywhere else.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Any other backend-reported fault. Fatal.
    #[error("storage error: {0}")]
    Storage(String),
}

impl StoreError {
    /// Benign errors are partition-local outcomes the fan-out tolerates.
    #[must_use]
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::NoData | Self::NoTable(_))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn provisioning(msg: impl Into<String>) -> Self {
        Self::Provisioning(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}
