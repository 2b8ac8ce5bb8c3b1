//! The scatter-gather query engine.
//!
//! One compiled query is fanned out across the last N daily partitions.
//! Each partition is an independently scheduled unit of work: run the
//! query, and only if it hit anything, enrich the hits with their
//! attribute rows. Units fail benignly when a partition is empty or its
//! tables do not exist yet; those failures never reach the caller. Any
//! other fault is fatal for the whole query - a partial result set is
//! never silently returned.
//!
//! Two completion policies, chosen before dispatch:
//! - unique-id mode races the units and returns the first non-empty
//!   success, dropping the rest;
//! - merge mode waits for every unit, discards the benign failures and
//!   sorts the concatenation newest-first by timestamp.

use std::cmp::Reverse;

use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};

use daybook_core::{partition_key_days_ago, CompiledQuery, LogRecord, PartitionKey};

use crate::backend::{DistinctColumn, LogBackend};
use crate::enrich::enrich;
use crate::error::{StoreError, StoreResult};

/// Default read fan-out depth.
pub const DEFAULT_PARTITION_DAYS: u32 = 7;

/// Fan-out depth used by the access-log corrective sweep.
pub const ACCESS_SWEEP_PARTITION_DAYS: u32 = 3;

/// One partition's unit of work: query, then enrich any hits.
async fn partition_unit(
    backend: &dyn LogBackend,
    key: PartitionKey,
    query: &CompiledQuery,
) -> StoreResult<Vec<LogRecord>> {
    let records = backend.fetch_records(&key, query).await?;
    if records.is_empty() {
        return Err(StoreError::NoData);
    }
    enrich(backend, &key, records).await
}

/// Run a compiled query against the last `partition_days` partitions.
#[tracing::instrument(skip(backend, query), fields(unique_id = query.targets_unique_id))]
pub async fn scatter_query(
    backend: &dyn LogBackend,
    query: &CompiledQuery,
    partition_days: u32,
) -> StoreResult<Vec<LogRecord>> {
    if query.targets_unique_id {
        first_success(backend, query, partition_days).await
    } else {
        merge_all(backend, query, partition_days).await
    }
}

/// Unique-id mode: first non-empty success wins, the remaining units are
/// dropped. When every unit fails, a fatal error (if any occurred) beats
/// the benign aggregate.
async fn first_success(
    backend: &dyn LogBackend,
    query: &CompiledQuery,
    partition_days: u32,
) -> StoreResult<Vec<LogRecord>> {
    let mut units: FuturesUnordered<_> = (0..partition_days)
        .map(|days_ago| {
            let key = partition_key_days_ago(days_ago);
            async move { partition_unit(backend, key, query).await }
        })
        .collect();

    let mut fatal = None;
    while let Some(result) = units.next().await {
        match result {
            Ok(records) => return Ok(records),
            Err(error) if error.is_benign() => {}
            Err(error) => {
                tracing::warn!(error = %error, "partition unit failed");
                fatal.get_or_insert(error);
            }
        }
    }
    Err(fatal.unwrap_or(StoreError::NoData))
}

/// Merge mode: wait for all units, drop benign failures, fail on any
/// fatal one, and sort the concatenation descending by timestamp. The
/// sort key is cached so it is computed at most once per record.
async fn merge_all(
    backend: &dyn LogBackend,
    query: &CompiledQuery,
    partition_days: u32,
) -> StoreResult<Vec<LogRecord>> {
    let keys: Vec<PartitionKey> = (0..partition_days).map(partition_key_days_ago).collect();
    let units = keys
        .iter()
        .map(|key| partition_unit(backend, key.clone(), query));
    let results = join_all(units).await;

    let mut merged = Vec::new();
    for (key, result) in keys.iter().zip(results) {
        match result {
            Ok(mut records) => merged.append(&mut records),
            Err(error) if error.is_benign() => {
                tracing::debug!(partition = key.record_table(), error = %error, "partition skipped");
            }
            Err(fatal) => return Err(fatal),
        }
    }

    merged.sort_by_cached_key(|record| Reverse(record.timestamp));
    Ok(merged)
}

/// De-duplicated union of one column's values across the partition set.
///
/// `application` and `severity` scan the record table's own column; any
/// other key scans attribute values. No enrichment runs. Benign failures
/// are dropped exactly as in merge mode.
#[tracing::instrument(skip(backend))]
pub async fn distinct_values(
    backend: &dyn LogBackend,
    attr_key: &str,
    partition_days: u32,
) -> StoreResult<Vec<String>> {
    let keys: Vec<PartitionKey> = (0..partition_days).map(partition_key_days_ago).collect();
    let units = keys.iter().map(|key| async move {
        match attr_key {
            "application" => backend.distinct_core(key, DistinctColumn::Application).await,
            "severity" => backend.distinct_core(key, DistinctColumn::Severity).await,
            _ => backend.distinct_attribute(key, attr_key).await,
        }
    });
    let results = join_all(units).await;

    let mut seen = std::collections::HashSet::new();
    let mut unique = Vec::new();
    for result in results {
        match result {
            Ok(values) => {
                for value in values {
                    if seen.insert(value.clone()) {
                        unique.push(value);
                    }
                }
            }
            Err(error) if error.is_benign() => {}
            Err(fatal) => return Err(fatal),
        }
    }
    Ok(unique)
}
