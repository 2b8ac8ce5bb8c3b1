//! Daybook server - the HTTP shell around the log store.
//!
//! Exposes ingestion (base64-encoded JSON bodies), filtered retrieval,
//! distinct-value scans and the access-log flow with its geolocation
//! back-fill.

pub mod access;
pub mod api;
pub mod config;
pub mod error;
pub mod geo;

pub use config::DaybookConfig;
pub use error::ServerError;
