//! Idempotent partition schema provisioning.
//!
//! Safe to call before every write. A process-wide mutex gates the
//! check-and-create sequence: provisioning happens at most once per
//! partition per day, so one coarse gate is enough and the lock is held
//! only for the span of the catalog check and any creation statements.

use tokio::sync::Mutex;

use daybook_core::PartitionKey;

use crate::backend::LogBackend;
use crate::error::{StoreError, StoreResult};

/// Process-wide provisioning gate.
#[derive(Debug, Default)]
pub struct Provisioner {
    gate: Mutex<()>,
}

impl Provisioner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure the partition's storage structures exist.
    ///
    /// While holding the gate: consult the catalog, create the record
    /// table if absent, (re)install the stored insert procedure unless the
    /// record table carries the completion sentinel, and create the
    /// attribute table if absent. A concurrent provisioner in another
    /// process may win the attribute-table creation race; "already exists"
    /// is success there. Any other failure aborts the in-flight ingestion
    /// as a provisioning error.
    pub async fn ensure_partition(
        &self,
        backend: &dyn LogBackend,
        key: &PartitionKey,
    ) -> StoreResult<()> {
        let _guard = self.gate.lock().await;
        provision_locked(backend, key).await.map_err(|e| match e {
            already @ StoreError::Provisioning(_) => already,
            other => StoreError::provisioning(other.to_string()),
        })
    }
}

async fn provision_locked(backend: &dyn LogBackend, key: &PartitionKey) -> StoreResult<()> {
    let status = backend.partition_status(key).await?;

    if !status.record_table_exists {
        tracing::info!(table = key.record_table(), "creating record table");
        backend.create_record_table(key).await?;
    }

    if !status.procedure_installed {
        tracing::info!(table = key.record_table(), "installing insert procedure");
        backend.install_insert_procedure(key).await?;
        backend.mark_procedure_installed(key).await?;
    }

    if !status.attribute_table_exists {
        tracing::info!(table = key.attribute_table(), "creating attribute table");
        match backend.create_attribute_table(key).await {
            Ok(()) | Err(StoreError::AlreadyExists(_)) => {}
            Err(other) => return Err(other),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use daybook_core::partition_key_days_ago;

    #[tokio::test]
    async fn provisions_a_fresh_partition() {
        let backend = MemoryBackend::new();
        let provisioner = Provisioner::new();
        let key = partition_key_days_ago(0);

        provisioner.ensure_partition(&backend, &key).await.unwrap();

        let status = backend.partition_status(&key).await.unwrap();
        assert!(status.record_table_exists);
        assert!(status.procedure_installed);
        assert!(status.attribute_table_exists);
    }

    #[tokio::test]
    async fn second_call_is_a_no_op() {
        let backend = MemoryBackend::new();
        let provisioner = Provisioner::new();
        let key = partition_key_days_ago(0);

        provisioner.ensure_partition(&backend, &key).await.unwrap();
        // Would fail with AlreadyExists if creation re-ran.
        provisioner.ensure_partition(&backend, &key).await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_calls_provision_exactly_once() {
        let backend = MemoryBackend::new();
        let provisioner = Provisioner::new();
        let key = partition_key_days_ago(0);

        let (left, right) = tokio::join!(
            provisioner.ensure_partition(&backend, &key),
            provisioner.ensure_partition(&backend, &key),
        );
        left.unwrap();
        right.unwrap();

        let status = backend.partition_status(&key).await.unwrap();
        assert!(status.record_table_exists);
        assert!(status.procedure_installed);
        assert!(status.attribute_table_exists);
    }

    #[tokio::test]
    async fn lost_attribute_table_race_is_success() {
        let backend = MemoryBackend::new();
        let provisioner = Provisioner::new();
        let key = partition_key_days_ago(0);

        // Another process created the attribute table between our catalog
        // check and our create. Simulate by creating it up front; the
        // catalog check sees it, but force the race by creating the record
        // table only.
        backend.create_attribute_table(&key).await.unwrap();
        provisioner.ensure_partition(&backend, &key).await.unwrap();
    }

    #[tokio::test]
    async fn storage_faults_surface_as_provisioning_errors() {
        let backend = MemoryBackend::new();
        let provisioner = Provisioner::new();
        let key = partition_key_days_ago(0);
        backend.poison_partition(key.record_table()).await;

        let result = provisioner.ensure_partition(&backend, &key).await;
        assert!(matches!(result, Err(StoreError::Provisioning(_))));
    }
}
