//! Access-log flow.
//!
//! An access entry is a log record for the `nginx` application carrying the
//! caller's address in a `data` attribute plus `lat`/`lon` attributes from
//! geolocation. When the resolver cannot place the address at ingest time
//! the marker value is stored instead, and a sweep over the recent
//! partitions patches those entries once resolution works again.

use serde_json::{json, Map, Value};

use daybook_store::engine::ACCESS_SWEEP_PARTITION_DAYS;
use daybook_store::{LogStore, StoreResult};

use crate::geo::GeoLocator;

fn access_fields(ip: &str, severity: &str, message: &str, lat: &str, lon: &str) -> Map<String, Value> {
    let value = json!({
        "application": "nginx",
        "severity": severity,
        "message": message,
        "data": ip,
        "lat": lat,
        "lon": lon,
    });
    match value {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

/// Record one access entry for `ip`, annotated with its resolved location.
///
/// An unresolvable address additionally records an error entry, and the
/// access entry itself carries the marker coordinates for the sweep to fix
/// up later. Returns the access record's id.
pub async fn record_access(
    store: &LogStore,
    geo: &dyn GeoLocator,
    ip: &str,
) -> StoreResult<i64> {
    let location = geo.locate(ip).await;
    if location.is_invalid() {
        tracing::warn!(ip = %ip, "could not geolocate access origin");
        store
            .ingest(access_fields(
                ip,
                "ERROR",
                "error getting ip",
                &location.lat,
                &location.lon,
            ))
            .await?;
    }

    let id = store
        .ingest(access_fields(
            ip,
            "INFO",
            "access",
            &location.lat,
            &location.lon,
        ))
        .await?;

    patch_stale_locations(store, geo).await?;
    Ok(id)
}

/// Sweep the recent partitions for access entries whose location is still
/// the marker pair and retry their geolocation through the corrective
/// attribute path.
pub async fn patch_stale_locations(store: &LogStore, geo: &dyn GeoLocator) -> StoreResult<()> {
    let filters = ["message=access".to_owned(), "severity=INFO".to_owned()];
    let records = store
        .query(&filters, ACCESS_SWEEP_PARTITION_DAYS, None)
        .await?;

    for record in records {
        if record.attributes.get("lon").map(String::as_str) != Some(crate::geo::INVALID_IP_MARKER)
        {
            continue;
        }
        let Some(ip) = record.attributes.get("data") else {
            continue;
        };
        let location = geo.locate(ip).await;
        if location.is_invalid() {
            tracing::warn!(ip = %ip, "address still unresolvable, leaving marker");
            continue;
        }
        store
            .patch_attribute(&record.partition_label, record.id, "lat", &location.lat)
            .await?;
        store
            .patch_attribute(&record.partition_label, record.id, "lon", &location.lon)
            .await?;
    }
    Ok(())
}
