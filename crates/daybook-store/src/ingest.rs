//! The ingestion pipeline.
//!
//! One incoming record is a free-form field bag. The five core fields go
//! into the record row (via the backend's insert procedure); everything
//! else becomes attribute rows in the same partition. Validation happens
//! before any storage access.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};

use daybook_core::types::attribute_value_text;
use daybook_core::{partition_key_days_ago, AttributeEntry, Severity};

use crate::backend::{LogBackend, NewRecord};
use crate::error::{StoreError, StoreResult};
use crate::provision::Provisioner;

/// Core field names stripped from the bag before the remainder is treated
/// as opaque attributes. `Severity` is accepted alongside `severity` for
/// compatibility with older senders.
const CORE_FIELDS: [&str; 6] = [
    "timestamp",
    "severity",
    "Severity",
    "application",
    "message",
    "ip",
];

/// Validate, timestamp, provision and write one record plus its attribute
/// rows. Returns the generated record id.
pub async fn ingest(
    backend: &dyn LogBackend,
    provisioner: &Provisioner,
    mut fields: Map<String, Value>,
) -> StoreResult<i64> {
    let timestamp = match fields.get("timestamp") {
        None | Some(Value::Null) => Utc::now(),
        Some(value) => parse_timestamp(value)?,
    };

    let application = required_field(&fields, "application")?;
    let severity_raw = non_empty_string(fields.get("severity"))
        .or_else(|| non_empty_string(fields.get("Severity")))
        .ok_or_else(|| StoreError::validation("missing key severity"))?;
    let message = required_field(&fields, "message")?;

    let severity = Severity::parse(&severity_raw);
    let origin_ip = non_empty_string(fields.get("ip")).unwrap_or_default();

    tracing::info!(message = %message, application = %application, "new log entry");

    let key = partition_key_days_ago(0);
    provisioner.ensure_partition(backend, &key).await?;

    let id = backend
        .insert_record(
            &key,
            NewRecord {
                timestamp,
                severity: severity.as_str(),
                application: &application,
                message: &message,
                origin_ip: &origin_ip,
            },
        )
        .await?;

    for core in CORE_FIELDS {
        fields.remove(core);
    }

    if !fields.is_empty() {
        let entries: Vec<AttributeEntry> = fields
            .iter()
            .map(|(field, value)| AttributeEntry {
                log_id: id,
                key: field.clone(),
                value: attribute_value_text(value),
            })
            .collect();
        backend.insert_attributes(&key, &entries).await?;
    }

    Ok(id)
}

fn required_field(fields: &Map<String, Value>, name: &str) -> StoreResult<String> {
    non_empty_string(fields.get(name))
        .ok_or_else(|| StoreError::validation(format!("missing key {name}")))
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(text)) if !text.is_empty() => Some(text.clone()),
        _ => None,
    }
}

/// A timestamp supplied as a number is an epoch-milliseconds instant;
/// strings are accepted in RFC 3339 or the canonical date-time form.
fn parse_timestamp(value: &Value) -> StoreResult<DateTime<Utc>> {
    let invalid = || StoreError::validation("invalid date");
    match value {
        Value::Number(number) => {
            let millis = number.as_i64().ok_or_else(invalid)?;
            Utc.timestamp_millis_opt(millis).single().ok_or_else(invalid)
        }
        Value::String(text) => {
            if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
                return Ok(instant.with_timezone(&Utc));
            }
            for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
                if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(text, format) {
                    return Ok(naive.and_utc());
                }
            }
            Err(invalid())
        }
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use daybook_core::compile_filters;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    async fn setup() -> (MemoryBackend, Provisioner) {
        (MemoryBackend::new(), Provisioner::new())
    }

    #[tokio::test]
    async fn writes_record_and_attributes() {
        let (backend, provisioner) = setup().await;
        let id = ingest(
            &backend,
            &provisioner,
            fields(json!({
                "application": "api",
                "severity": "error",
                "message": "boom",
                "ip": "10.0.0.1",
                "custom_tag": "v1",
                "request_ids": ["a", "b"],
            })),
        )
        .await
        .unwrap();

        let key = partition_key_days_ago(0);
        let query = compile_filters(&[format!("index={id}")]).unwrap();
        let hits = backend.fetch_records(&key, &query).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].severity.as_str(), "ERROR");
        assert_eq!(hits[0].origin_ip, "10.0.0.1");

        let attrs = backend.fetch_attributes(&key, &[id]).await.unwrap();
        let mut pairs: Vec<(String, String)> = attrs
            .into_iter()
            .map(|attr| (attr.key, attr.value))
            .collect();
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("custom_tag".to_owned(), "v1".to_owned()),
                ("request_ids".to_owned(), r#"["a","b"]"#.to_owned()),
            ]
        );
    }

    #[tokio::test]
    async fn missing_core_fields_fail_before_storage() {
        let (backend, provisioner) = setup().await;
        for missing in ["application", "severity", "message"] {
            let mut bag = fields(json!({
                "application": "api",
                "severity": "info",
                "message": "hello",
            }));
            bag.remove(missing);
            let error = ingest(&backend, &provisioner, bag).await.unwrap_err();
            match error {
                StoreError::Validation(text) => {
                    assert_eq!(text, format!("missing key {missing}"));
                }
                other => panic!("expected validation error, got {other:?}"),
            }
        }
        // Nothing was provisioned.
        let status = backend
            .partition_status(&partition_key_days_ago(0))
            .await
            .unwrap();
        assert!(!status.record_table_exists);
    }

    #[tokio::test]
    async fn numeric_timestamp_is_epoch_millis() {
        let (backend, provisioner) = setup().await;
        let id = ingest(
            &backend,
            &provisioner,
            fields(json!({
                "application": "api",
                "severity": "info",
                "message": "dated",
                "timestamp": 1_709_708_889_000_i64,
            })),
        )
        .await
        .unwrap();

        let key = partition_key_days_ago(0);
        let query = compile_filters(&[format!("index={id}")]).unwrap();
        let hits = backend.fetch_records(&key, &query).await.unwrap();
        assert_eq!(
            daybook_core::canonical_datetime(hits[0].timestamp),
            "2024-03-06 07:08:09"
        );
    }

    #[tokio::test]
    async fn unparseable_timestamp_is_invalid_date() {
        let (backend, provisioner) = setup().await;
        let error = ingest(
            &backend,
            &provisioner,
            fields(json!({
                "application": "api",
                "severity": "info",
                "message": "dated",
                "timestamp": "yesterday-ish",
            })),
        )
        .await
        .unwrap_err();
        assert!(matches!(error, StoreError::Validation(text) if text == "invalid date"));
    }

    #[tokio::test]
    async fn capitalised_severity_key_is_accepted() {
        let (backend, provisioner) = setup().await;
        let id = ingest(
            &backend,
            &provisioner,
            fields(json!({
                "application": "api",
                "Severity": "warn",
                "message": "legacy sender",
            })),
        )
        .await
        .unwrap();

        let key = partition_key_days_ago(0);
        let query = compile_filters(&[format!("index={id}")]).unwrap();
        let hits = backend.fetch_records(&key, &query).await.unwrap();
        assert_eq!(hits[0].severity.as_str(), "WARN");
        // The alternate key must not leak into the attribute bag.
        assert!(backend.fetch_attributes(&key, &[id]).await.unwrap().is_empty());
    }
}
