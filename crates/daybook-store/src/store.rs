//! The store facade: one handle owning the backend and the provisioning
//! gate, exposing the operations the HTTP layer needs.

use std::sync::Arc;

use serde_json::{Map, Value};

use daybook_core::{compile_filters, LogRecord, PartitionKey};

use crate::backend::LogBackend;
use crate::engine::{distinct_values, scatter_query};
use crate::error::{StoreError, StoreResult};
use crate::ingest::ingest;
use crate::provision::Provisioner;

/// Shared handle over one storage backend.
///
/// Cheap to clone; all state lives behind the backend and the process-wide
/// provisioning gate.
#[derive(Clone)]
pub struct LogStore {
    backend: Arc<dyn LogBackend>,
    provisioner: Arc<Provisioner>,
}

impl LogStore {
    pub fn new(backend: Arc<dyn LogBackend>) -> Self {
        Self {
            backend,
            provisioner: Arc::new(Provisioner::new()),
        }
    }

    /// Validate and write one record plus its attribute rows into today's
    /// partition, provisioning it first. Returns the generated record id.
    pub async fn ingest(&self, fields: Map<String, Value>) -> StoreResult<i64> {
        ingest(self.backend.as_ref(), &self.provisioner, fields).await
    }

    /// Compile `filters` and run them against the last `partition_days`
    /// partitions.
    ///
    /// An `index=` filter switches to the first-hit race; everything else
    /// merges all partitions newest-first. A merge over nothing but empty
    /// or absent partitions is an empty result, not an error.
    ///
    /// `start_index` is accepted for future pagination and currently has
    /// no effect on the result.
    pub async fn query(
        &self,
        filters: &[String],
        partition_days: u32,
        start_index: Option<u64>,
    ) -> StoreResult<Vec<LogRecord>> {
        let _ = start_index;
        let compiled = compile_filters(filters)?;
        scatter_query(self.backend.as_ref(), &compiled, partition_days).await
    }

    /// De-duplicated values of one column or attribute key across the last
    /// `partition_days` partitions.
    pub async fn distinct(&self, attr_key: &str, partition_days: u32) -> StoreResult<Vec<String>> {
        distinct_values(self.backend.as_ref(), attr_key, partition_days).await
    }

    /// Overwrite one attribute of one record, addressed by the partition
    /// label the record was read from.
    pub async fn patch_attribute(
        &self,
        partition_label: &str,
        log_id: i64,
        attr_key: &str,
        value: &str,
    ) -> StoreResult<()> {
        let key = PartitionKey::from_record_table(partition_label).ok_or_else(|| {
            StoreError::storage(format!("record carries foreign partition label {partition_label:?}"))
        })?;
        self.backend
            .update_attribute(&key, log_id, attr_key, value)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use serde_json::json;

    fn store() -> (Arc<MemoryBackend>, LogStore) {
        let backend = Arc::new(MemoryBackend::new());
        (backend.clone(), LogStore::new(backend))
    }

    fn bag(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn ingest_then_query_by_index() {
        let (_backend, store) = store();
        let id = store
            .ingest(bag(json!({
                "application": "api",
                "severity": "info",
                "message": "hello",
                "custom_tag": "v1",
            })))
            .await
            .unwrap();

        let hits = store.query(&[format!("index={id}")], 7, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, id);
        assert_eq!(
            hits[0].attributes.get("custom_tag").map(String::as_str),
            Some("v1")
        );
    }

    #[tokio::test]
    async fn merge_over_absent_partitions_is_empty() {
        let (_backend, store) = store();
        let hits = store.query(&["severity=INFO".to_owned()], 7, None).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn index_query_over_absent_partitions_is_no_data() {
        let (_backend, store) = store();
        let error = store.query(&["index=42".to_owned()], 7, None).await.unwrap_err();
        assert!(matches!(error, StoreError::NoData));
    }

    #[tokio::test]
    async fn bad_filter_is_rejected_before_any_fan_out() {
        let (_backend, store) = store();
        let error = store.query(&["no operator here".to_owned()], 7, None).await.unwrap_err();
        assert!(matches!(error, StoreError::Filter(_)));
    }

    #[tokio::test]
    async fn patch_attribute_rewrites_one_value() {
        let (_backend, store) = store();
        let id = store
            .ingest(bag(json!({
                "application": "api",
                "severity": "info",
                "message": "geo pending",
                "lat": "0",
            })))
            .await
            .unwrap();

        let hits = store.query(&[format!("index={id}")], 7, None).await.unwrap();
        let label = hits[0].partition_label.clone();
        store.patch_attribute(&label, id, "lat", "51.5").await.unwrap();

        let hits = store.query(&[format!("index={id}")], 7, None).await.unwrap();
        assert_eq!(hits[0].attributes.get("lat").map(String::as_str), Some("51.5"));
    }

    #[tokio::test]
    async fn patch_rejects_foreign_labels() {
        let (_backend, store) = store();
        let error = store
            .patch_attribute("users; DROP TABLE x", 1, "lat", "0")
            .await
            .unwrap_err();
        assert!(matches!(error, StoreError::Storage(_)));
    }
}
