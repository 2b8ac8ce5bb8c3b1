//! IP geolocation seam.
//!
//! The access-log flow annotates entries with the origin's latitude and
//! longitude. Resolution is best-effort: a resolver that cannot place an
//! address answers with the invalid-address marker instead of failing, so
//! ingestion never blocks on geolocation.

use async_trait::async_trait;

/// Marker value a resolver returns for an address it cannot place. Stored
/// verbatim in the `lat`/`lon` attributes and later picked up by the
/// corrective sweep.
pub const INVALID_IP_MARKER: &str = "INVALID_IP_ADDRESS";

/// A resolved coordinate pair, as attribute text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoPoint {
    pub lat: String,
    pub lon: String,
}

impl GeoPoint {
    /// The marker pair for an unresolvable address.
    #[must_use]
    pub fn invalid() -> Self {
        Self {
            lat: INVALID_IP_MARKER.to_owned(),
            lon: INVALID_IP_MARKER.to_owned(),
        }
    }

    #[must_use]
    pub fn is_invalid(&self) -> bool {
        self.lat == INVALID_IP_MARKER
    }
}

#[async_trait]
pub trait GeoLocator: Send + Sync {
    /// Resolve an IP address to coordinates. Never fails; unresolvable
    /// addresses yield the marker pair.
    async fn locate(&self, ip: &str) -> GeoPoint;
}

/// Resolver used when no geolocation database is configured: every lookup
/// answers with the marker pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullGeoLocator;

#[async_trait]
impl GeoLocator for NullGeoLocator {
    async fn locate(&self, _ip: &str) -> GeoPoint {
        GeoPoint::invalid()
    }
}
