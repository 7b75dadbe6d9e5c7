//! Location resolution - free-text place names to coordinates.
//!
//! The live implementation queries the OpenStreetMap Nominatim search API.
//! The [`Geocoder`] trait sits at the seam so the pipeline can be tested
//! without network access.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Public Nominatim endpoint.
pub const NOMINATIM_BASE_URL: &str = "https://nominatim.openstreetmap.org";

/// User agent sent with geocoding requests. Nominatim's usage policy
/// requires an identifying agent string.
const USER_AGENT: &str = concat!("geosnap/", env!("CARGO_PKG_VERSION"));

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// A resolved place: the query that produced it plus its coordinates.
/// Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    /// The free-text query this location was resolved from.
    pub name: String,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

/// Errors raised while resolving a place name.
#[derive(Debug, Clone, Error)]
pub enum GeocodeError {
    /// The service returned no match for the query.
    #[error("location '{query}' not found")]
    NotFound { query: String },

    /// The HTTP request failed or returned a non-success status.
    #[error("geocoding request failed: {0}")]
    Http(String),

    /// The response body could not be interpreted.
    #[error("unexpected geocoding response: {0}")]
    Parse(String),
}

/// Resolves place names to coordinates.
pub trait Geocoder: Send + Sync {
    /// Resolve a non-empty place name. No retries are attempted.
    fn resolve(&self, query: &str) -> Result<Location, GeocodeError>;
}

/// Nominatim-backed geocoder.
pub struct NominatimGeocoder {
    client: reqwest::blocking::Client,
    base_url: String,
}

/// Shape of one entry in a Nominatim `jsonv2` response. Coordinates come
/// back as strings.
#[derive(Debug, Deserialize)]
struct SearchResult {
    lat: String,
    lon: String,
}

impl NominatimGeocoder {
    /// Create a geocoder against the public Nominatim endpoint.
    pub fn new() -> Result<Self, GeocodeError> {
        Self::with_base_url(NOMINATIM_BASE_URL)
    }

    /// Create a geocoder against a custom endpoint (self-hosted instances,
    /// test servers).
    pub fn with_base_url(base_url: &str) -> Result<Self, GeocodeError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| GeocodeError::Http(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl Geocoder for NominatimGeocoder {
    fn resolve(&self, query: &str) -> Result<Location, GeocodeError> {
        let url = format!("{}/search", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("format", "jsonv2"), ("limit", "1")])
            .send()
            .map_err(|e| GeocodeError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GeocodeError::Http(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let results: Vec<SearchResult> = response
            .json()
            .map_err(|e| GeocodeError::Parse(e.to_string()))?;

        let first = results.into_iter().next().ok_or_else(|| GeocodeError::NotFound {
            query: query.to_string(),
        })?;

        let lat = first
            .lat
            .parse::<f64>()
            .map_err(|e| GeocodeError::Parse(format!("bad latitude '{}': {}", first.lat, e)))?;
        let lon = first
            .lon
            .parse::<f64>()
            .map_err(|e| GeocodeError::Parse(format!("bad longitude '{}': {}", first.lon, e)))?;

        debug!(query, lat, lon, "location resolved");

        Ok(Location {
            name: query.to_string(),
            lat,
            lon,
        })
    }
}
