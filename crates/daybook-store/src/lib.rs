//! Daybook store - daily-partitioned log storage.
//!
//! Records land in one storage partition per calendar day (a record table
//! plus an attribute table, named after the ISO week date). Ingestion
//! provisions the day's partition on demand and writes one record plus its
//! EAV attribute rows; queries fan a compiled filter out across the last N
//! partitions concurrently and merge the per-partition results under one of
//! two completion policies.
//!
//! The storage seam is the [`LogBackend`] trait with two implementations:
//! an in-memory backend for tests and local development, and a
//! MariaDB/MySQL backend via sqlx.

pub mod backend;
pub mod engine;
pub mod enrich;
pub mod error;
pub mod ingest;
pub mod memory;
pub mod mysql;
pub mod provision;
mod store;

pub use backend::{DistinctColumn, LogBackend, NewRecord, PartitionStatus};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryBackend;
pub use mysql::MySqlBackend;
pub use provision::Provisioner;
pub use store::LogStore;
