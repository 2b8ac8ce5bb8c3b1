//! The storage seam.
//!
//! A [`LogBackend`] exposes whole operations scoped to one partition; the
//! provisioner, ingestion pipeline and query engine compose them. Values
//! always travel as data - a backend may splice *table names* into query
//! text, but only after validating them as derived partition identifiers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use daybook_core::{AttributeEntry, CompiledQuery, LogRecord, PartitionKey};

use crate::error::StoreResult;

/// Core fields of a record about to be written.
#[derive(Debug, Clone)]
pub struct NewRecord<'a> {
    pub timestamp: DateTime<Utc>,
    /// Already normalized to upper case.
    pub severity: &'a str,
    pub application: &'a str,
    pub message: &'a str,
    pub origin_ip: &'a str,
}

/// What the backend's catalog knows about a partition.
#[derive(Debug, Clone, Copy, Default)]
pub struct PartitionStatus {
    pub record_table_exists: bool,
    /// The record table carries the insert-procedure completion sentinel.
    pub procedure_installed: bool,
    pub attribute_table_exists: bool,
}

/// Record-table columns servable by a distinct scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistinctColumn {
    Application,
    Severity,
}

#[async_trait]
pub trait LogBackend: Send + Sync {
    /// Inspect the catalog for this partition's existence markers.
    async fn partition_status(&self, key: &PartitionKey) -> StoreResult<PartitionStatus>;

    /// Create the partition's record table with its secondary indexes.
    async fn create_record_table(&self, key: &PartitionKey) -> StoreResult<()>;

    /// Drop and recreate the stored insert procedure for this partition
    /// generation.
    async fn install_insert_procedure(&self, key: &PartitionKey) -> StoreResult<()>;

    /// Mark the record table with the completion sentinel so subsequent
    /// provisioning calls skip procedure recreation.
    async fn mark_procedure_installed(&self, key: &PartitionKey) -> StoreResult<()>;

    /// Create the partition's attribute table with its secondary indexes.
    ///
    /// Returns [`StoreError::AlreadyExists`](crate::StoreError::AlreadyExists)
    /// when a concurrent provisioner got there first.
    async fn create_attribute_table(&self, key: &PartitionKey) -> StoreResult<()>;

    /// Invoke the insert procedure; returns the generated record id.
    async fn insert_record(&self, key: &PartitionKey, record: NewRecord<'_>) -> StoreResult<i64>;

    /// Batch-insert attribute rows in one statement.
    async fn insert_attributes(
        &self,
        key: &PartitionKey,
        entries: &[AttributeEntry],
    ) -> StoreResult<()>;

    /// Execute a compiled query against this partition's record table,
    /// newest-first (descending by record id). An absent table is
    /// [`StoreError::NoTable`](crate::StoreError::NoTable); an empty result
    /// set is an empty `Vec`.
    async fn fetch_records(
        &self,
        key: &PartitionKey,
        query: &CompiledQuery,
    ) -> StoreResult<Vec<LogRecord>>;

    /// Fetch all attribute rows whose `log_id` is in `log_ids`, within this
    /// partition only.
    async fn fetch_attributes(
        &self,
        key: &PartitionKey,
        log_ids: &[i64],
    ) -> StoreResult<Vec<AttributeEntry>>;

    /// Distinct values of a record-table column.
    async fn distinct_core(
        &self,
        key: &PartitionKey,
        column: DistinctColumn,
    ) -> StoreResult<Vec<String>>;

    /// Distinct attribute values for one attribute key.
    async fn distinct_attribute(
        &self,
        key: &PartitionKey,
        attr_key: &str,
    ) -> StoreResult<Vec<String>>;

    /// Overwrite one attribute value of one record. This is the narrow
    /// corrective path used by geolocation enrichment, not a general
    /// update API.
    async fn update_attribute(
        &self,
        key: &PartitionKey,
        log_id: i64,
        attr_key: &str,
        value: &str,
    ) -> StoreResult<()>;
}
