//! Attribute enrichment: merge a batch of records' EAV rows back onto the
//! records.

use std::collections::HashMap;

use daybook_core::{LogRecord, PartitionKey};

use crate::backend::LogBackend;
use crate::error::StoreResult;

/// Load and merge attribute rows for `records`, all from the same
/// partition.
///
/// Returns the input unchanged when `records` is empty - no query with an
/// empty parameter list is ever issued. An attribute whose key collides
/// with an existing extra field overwrites it.
pub async fn enrich(
    backend: &dyn LogBackend,
    key: &PartitionKey,
    mut records: Vec<LogRecord>,
) -> StoreResult<Vec<LogRecord>> {
    if records.is_empty() {
        return Ok(records);
    }

    let ids: Vec<i64> = records.iter().map(|record| record.id).collect();
    let attributes = backend.fetch_attributes(key, &ids).await?;

    let mut by_id: HashMap<i64, &mut LogRecord> = records
        .iter_mut()
        .map(|record| (record.id, record))
        .collect();
    for attribute in attributes {
        if let Some(record) = by_id.get_mut(&attribute.log_id) {
            record.attributes.insert(attribute.key, attribute.value);
        }
    }

    Ok(records)
}
