//! Address geocoding collaborators
//!
//! Geocoding is best-effort: a failed lookup degrades accuracy (region
//! default coordinates, `used_real_geocoding = false`) and never aborts an
//! analysis.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use sunplan_common::config::RegionProfile;
use sunplan_common::models::{Address, Coordinates, GeocodeResult};
use thiserror::Error;
use tracing::{debug, warn};

/// Location lookup failure
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LookupError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("No result for query")]
    NotFound,

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Lookup timed out")]
    Timeout,
}

impl From<reqwest::Error> for LookupError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LookupError::Timeout
        } else {
            LookupError::Network(err.to_string())
        }
    }
}

/// Address → coordinates
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &Address) -> Result<GeocodeResult, LookupError>;
}

/// Region centre coordinates for every address
#[derive(Debug, Clone)]
pub struct RegionDefaultGeocoder {
    coordinates: Coordinates,
}

impl RegionDefaultGeocoder {
    pub fn new(region: &RegionProfile) -> Self {
        Self {
            coordinates: Coordinates {
                latitude: region.default_latitude,
                longitude: region.default_longitude,
            },
        }
    }
}

#[async_trait]
impl Geocoder for RegionDefaultGeocoder {
    async fn geocode(&self, _address: &Address) -> Result<GeocodeResult, LookupError> {
        Ok(GeocodeResult {
            coordinates: self.coordinates,
            used_real_geocoding: false,
        })
    }
}

/// Nominatim (OpenStreetMap) search client
pub struct NominatimGeocoder {
    http_client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

impl NominatimGeocoder {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, LookupError> {
        let http_client = Client::builder()
            .user_agent(crate::providers::USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| LookupError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, address: &Address) -> Result<GeocodeResult, LookupError> {
        let query = address.one_line();
        debug!(query = %query, "Querying geocoder");

        let response = self
            .http_client
            .get(&self.base_url)
            .query(&[("q", query.as_str()), ("format", "json"), ("limit", "1")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LookupError::Api(status.as_u16(), error_text));
        }

        let places: Vec<NominatimPlace> = response
            .json()
            .await
            .map_err(|e| LookupError::Parse(e.to_string()))?;
        let place = places.into_iter().next().ok_or(LookupError::NotFound)?;

        let latitude: f64 = place
            .lat
            .parse()
            .map_err(|_| LookupError::Parse(format!("latitude '{}'", place.lat)))?;
        let longitude: f64 = place
            .lon
            .parse()
            .map_err(|_| LookupError::Parse(format!("longitude '{}'", place.lon)))?;

        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(LookupError::Parse(format!(
                "coordinates out of range: {}, {}",
                latitude, longitude
            )));
        }

        Ok(GeocodeResult {
            coordinates: Coordinates {
                latitude,
                longitude,
            },
            used_real_geocoding: true,
        })
    }
}

/// Live geocoder degrading to region coordinates
pub struct FallbackGeocoder {
    primary: Arc<dyn Geocoder>,
    fallback: RegionDefaultGeocoder,
}

impl FallbackGeocoder {
    pub fn new(primary: Arc<dyn Geocoder>, region: &RegionProfile) -> Self {
        Self {
            primary,
            fallback: RegionDefaultGeocoder::new(region),
        }
    }
}

#[async_trait]
impl Geocoder for FallbackGeocoder {
    async fn geocode(&self, address: &Address) -> Result<GeocodeResult, LookupError> {
        match self.primary.geocode(address).await {
            Ok(result) => Ok(result),
            Err(e) => {
                warn!(error = %e, "Geocoding failed, using region default coordinates");
                self.fallback.geocode(address).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingGeocoder;

    #[async_trait]
    impl Geocoder for FailingGeocoder {
        async fn geocode(&self, _address: &Address) -> Result<GeocodeResult, LookupError> {
            Err(LookupError::Timeout)
        }
    }

    fn address() -> Address {
        Address {
            street: "Ilica 1".into(),
            city: "Zagreb".into(),
            country: "Croatia".into(),
            ..Address::default()
        }
    }

    #[tokio::test]
    async fn test_region_default_flags_not_real() {
        let region = RegionProfile::default();
        let result = RegionDefaultGeocoder::new(&region)
            .geocode(&address())
            .await
            .unwrap();
        assert!(!result.used_real_geocoding);
        assert_eq!(result.coordinates.latitude, region.default_latitude);
    }

    #[tokio::test]
    async fn test_fallback_on_failure() {
        let region = RegionProfile::default();
        let geocoder = FallbackGeocoder::new(Arc::new(FailingGeocoder), &region);
        let result = geocoder.geocode(&address()).await.unwrap();
        assert!(!result.used_real_geocoding);
        assert_eq!(result.coordinates.longitude, region.default_longitude);
    }
}
