//! In-memory backend for tests and local development.
//!
//! Evaluates compiled predicates directly, reproducing the SQL backend's
//! `UPPER(..) LIKE UPPER(..)` comparison behaviour so the same queries
//! behave identically against either backend.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use daybook_core::like::like_match;
use daybook_core::types::canonical_datetime;
use daybook_core::{
    AttributeEntry, Comparator, CompiledQuery, CoreColumn, LogRecord, PartitionKey, Predicate,
    Severity,
};

use crate::backend::{DistinctColumn, LogBackend, NewRecord, PartitionStatus};
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone)]
struct StoredRecord {
    id: i64,
    timestamp: chrono::DateTime<chrono::Utc>,
    severity: String,
    application: String,
    message: String,
    origin_ip: String,
}

#[derive(Debug, Default)]
struct Partition {
    record_table_exists: bool,
    attribute_table_exists: bool,
    procedure_installed: bool,
    next_id: i64,
    records: Vec<StoredRecord>,
    attributes: Vec<AttributeEntry>,
    poisoned: bool,
}

#[derive(Debug, Default)]
struct State {
    partitions: HashMap<String, Partition>,
}

/// In-memory [`LogBackend`].
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<RwLock<State>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Force every subsequent access to this partition to fail with a
    /// fatal storage error. Test hook for fatal-error propagation.
    pub async fn poison_partition(&self, record_table: &str) {
        let mut state = self.state.write().await;
        let partition = state.partitions.entry(record_table.to_owned()).or_default();
        partition.record_table_exists = true;
        partition.poisoned = true;
    }
}

fn poisoned_check(partition: &Partition) -> StoreResult<()> {
    if partition.poisoned {
        return Err(StoreError::storage("partition unavailable"));
    }
    Ok(())
}

/// Evaluate one predicate against a record, given the partition's
/// attribute rows.
fn matches(record: &StoredRecord, attributes: &[AttributeEntry], predicate: &Predicate) -> bool {
    match predicate {
        Predicate::Core {
            column,
            comparator,
            value,
            case_insensitive,
        } => {
            let text = match column {
                CoreColumn::Severity => record.severity.clone(),
                CoreColumn::Message => record.message.clone(),
                CoreColumn::Application => record.application.clone(),
                CoreColumn::Id => record.id.to_string(),
                CoreColumn::Timestamp => canonical_datetime(record.timestamp),
            };
            let (text, value) = if *case_insensitive {
                (text.to_uppercase(), value.to_uppercase())
            } else {
                (text, value.clone())
            };
            match comparator {
                Comparator::Like => like_match(&value, &text),
                Comparator::NotLike => !like_match(&value, &text),
                Comparator::Greater => text > value,
                Comparator::Less => text < value,
            }
        }
        Predicate::AttributeExists {
            key,
            value,
            negated,
        } => {
            let pattern = value.to_uppercase();
            let exists = attributes.iter().any(|attr| {
                attr.log_id == record.id
                    && attr.key.eq_ignore_ascii_case(key)
                    && like_match(&pattern, &attr.value.to_uppercase())
            });
            exists != *negated
        }
    }
}

#[async_trait]
impl LogBackend for MemoryBackend {
    async fn partition_status(&self, key: &PartitionKey) -> StoreResult<PartitionStatus> {
        let state = self.state.read().await;
        Ok(state
            .partitions
            .get(key.record_table())
            .map(|partition| PartitionStatus {
                record_table_exists: partition.record_table_exists,
                procedure_installed: partition.procedure_installed,
                attribute_table_exists: partition.attribute_table_exists,
            })
            .unwrap_or_default())
    }

    async fn create_record_table(&self, key: &PartitionKey) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let partition = state
            .partitions
            .entry(key.record_table().to_owned())
            .or_default();
        if partition.record_table_exists {
            return Err(StoreError::AlreadyExists(key.record_table().to_owned()));
        }
        partition.record_table_exists = true;
        Ok(())
    }

    async fn install_insert_procedure(&self, key: &PartitionKey) -> StoreResult<()> {
        let state = self.state.read().await;
        let partition = state
            .partitions
            .get(key.record_table())
            .filter(|p| p.record_table_exists)
            .ok_or_else(|| StoreError::NoTable(key.record_table().to_owned()))?;
        poisoned_check(partition)
    }

    async fn mark_procedure_installed(&self, key: &PartitionKey) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let partition = state
            .partitions
            .get_mut(key.record_table())
            .filter(|p| p.record_table_exists)
            .ok_or_else(|| StoreError::NoTable(key.record_table().to_owned()))?;
        partition.procedure_installed = true;
        Ok(())
    }

    async fn create_attribute_table(&self, key: &PartitionKey) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let partition = state
            .partitions
            .entry(key.record_table().to_owned())
            .or_default();
        if partition.attribute_table_exists {
            return Err(StoreError::AlreadyExists(key.attribute_table().to_owned()));
        }
        partition.attribute_table_exists = true;
        Ok(())
    }

    async fn insert_record(&self, key: &PartitionKey, record: NewRecord<'_>) -> StoreResult<i64> {
        let mut state = self.state.write().await;
        let partition = state
            .partitions
            .get_mut(key.record_table())
            .filter(|p| p.record_table_exists)
            .ok_or_else(|| StoreError::NoTable(key.record_table().to_owned()))?;
        poisoned_check(partition)?;

        partition.next_id += 1;
        let id = partition.next_id;
        partition.records.push(StoredRecord {
            id,
            timestamp: record.timestamp,
            severity: record.severity.to_owned(),
            application: record.application.to_owned(),
            message: record.message.to_owned(),
            origin_ip: record.origin_ip.to_owned(),
        });
        Ok(id)
    }

    async fn insert_attributes(
        &self,
        key: &PartitionKey,
        entries: &[AttributeEntry],
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let partition = state
            .partitions
            .get_mut(key.record_table())
            .filter(|p| p.attribute_table_exists)
            .ok_or_else(|| StoreError::NoTable(key.attribute_table().to_owned()))?;
        poisoned_check(partition)?;
        partition.attributes.extend_from_slice(entries);
        Ok(())
    }

    async fn fetch_records(
        &self,
        key: &PartitionKey,
        query: &CompiledQuery,
    ) -> StoreResult<Vec<LogRecord>> {
        let state = self.state.read().await;
        let partition = state
            .partitions
            .get(key.record_table())
            .filter(|p| p.record_table_exists)
            .ok_or_else(|| StoreError::NoTable(key.record_table().to_owned()))?;
        poisoned_check(partition)?;

        let mut hits: Vec<&StoredRecord> = partition
            .records
            .iter()
            .filter(|record| {
                query
                    .predicates
                    .iter()
                    .all(|predicate| matches(record, &partition.attributes, predicate))
            })
            .collect();
        hits.sort_by_key(|record| std::cmp::Reverse(record.id));

        Ok(hits
            .into_iter()
            .map(|record| LogRecord {
                id: record.id,
                timestamp: record.timestamp,
                severity: Severity::parse(&record.severity),
                application: record.application.clone(),
                message: record.message.clone(),
                origin_ip: record.origin_ip.clone(),
                partition_label: key.record_table().to_owned(),
                attributes: Default::default(),
            })
            .collect())
    }

    async fn fetch_attributes(
        &self,
        key: &PartitionKey,
        log_ids: &[i64],
    ) -> StoreResult<Vec<AttributeEntry>> {
        let state = self.state.read().await;
        let partition = state
            .partitions
            .get(key.record_table())
            .filter(|p| p.attribute_table_exists)
            .ok_or_else(|| StoreError::NoTable(key.attribute_table().to_owned()))?;
        poisoned_check(partition)?;
        Ok(partition
            .attributes
            .iter()
            .filter(|attr| log_ids.contains(&attr.log_id))
            .cloned()
            .collect())
    }

    async fn distinct_core(
        &self,
        key: &PartitionKey,
        column: DistinctColumn,
    ) -> StoreResult<Vec<String>> {
        let state = self.state.read().await;
        let partition = state
            .partitions
            .get(key.record_table())
            .filter(|p| p.record_table_exists)
            .ok_or_else(|| StoreError::NoTable(key.record_table().to_owned()))?;
        poisoned_check(partition)?;

        let mut seen = Vec::new();
        for record in &partition.records {
            let value = match column {
                DistinctColumn::Application => &record.application,
                DistinctColumn::Severity => &record.severity,
            };
            if !seen.contains(value) {
                seen.push(value.clone());
            }
        }
        Ok(seen)
    }

    async fn distinct_attribute(
        &self,
        key: &PartitionKey,
        attr_key: &str,
    ) -> StoreResult<Vec<String>> {
        let state = self.state.read().await;
        let partition = state
            .partitions
            .get(key.record_table())
            .filter(|p| p.attribute_table_exists)
            .ok_or_else(|| StoreError::NoTable(key.attribute_table().to_owned()))?;
        poisoned_check(partition)?;

        let mut seen = Vec::new();
        for attr in &partition.attributes {
            if attr.key == attr_key && !seen.contains(&attr.value) {
                seen.push(attr.value.clone());
            }
        }
        Ok(seen)
    }

    async fn update_attribute(
        &self,
        key: &PartitionKey,
        log_id: i64,
        attr_key: &str,
        value: &str,
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let partition = state
            .partitions
            .get_mut(key.record_table())
            .filter(|p| p.attribute_table_exists)
            .ok_or_else(|| StoreError::NoTable(key.attribute_table().to_owned()))?;
        poisoned_check(partition)?;
        for attr in &mut partition.attributes {
            if attr.log_id == log_id && attr.key == attr_key {
                attr.value = value.to_owned();
            }
        }
        Ok(())
    }
}
