//! Daybook core - pure building blocks for the log store.
//!
//! Everything in this crate is I/O-free: partition key derivation,
//! filter-expression compilation, the record/attribute wire types, and the
//! `LIKE` pattern matcher the in-memory backend evaluates predicates with.

pub mod error;
pub mod filter;
pub mod like;
pub mod partition;
pub mod types;

pub use error::FilterSyntaxError;
pub use filter::{compile_filters, Comparator, CompiledQuery, CoreColumn, Predicate};
pub use partition::{derive_partition_key, partition_key_days_ago, PartitionKey};
pub use types::{canonical_datetime, AttributeEntry, LogRecord, Severity};
