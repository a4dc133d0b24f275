//! Solar irradiance collaborators
//!
//! Like geocoding, irradiance lookup is best-effort. Live figures outside a
//! sane residential range are discarded in favour of region defaults so a
//! faulty upstream cannot push the engine out of its plausibility band.

use super::geocoder::LookupError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use sunplan_common::config::RegionProfile;
use sunplan_common::models::{Coordinates, DataOrigin, LocationIrradiance};
use tracing::{debug, warn};

/// Peak sun hours accepted from a live source
pub const PEAK_SUN_HOURS_RANGE: (f64, f64) = (1.0, 8.0);

/// Annual kWh per kWp accepted from a live source
pub const PV_POTENTIAL_RANGE: (f64, f64) = (600.0, 2500.0);

/// Coordinates → irradiance
#[async_trait]
pub trait IrradianceSource: Send + Sync {
    async fn irradiance(&self, coordinates: Coordinates) -> Result<LocationIrradiance, LookupError>;
}

/// Region profile figures for every point
#[derive(Debug, Clone)]
pub struct RegionDefaultIrradiance {
    peak_sun_hours: f64,
    pv_potential_kwh_per_kwp: f64,
}

impl RegionDefaultIrradiance {
    pub fn new(region: &RegionProfile) -> Self {
        Self {
            peak_sun_hours: region.peak_sun_hours,
            pv_potential_kwh_per_kwp: region.pv_potential_kwh_per_kwp,
        }
    }

    pub fn figures(&self) -> LocationIrradiance {
        LocationIrradiance {
            peak_sun_hours: self.peak_sun_hours,
            pv_potential_kwh_per_kwp: self.pv_potential_kwh_per_kwp,
            origin: DataOrigin::RegionDefault,
        }
    }
}

#[async_trait]
impl IrradianceSource for RegionDefaultIrradiance {
    async fn irradiance(&self, _coordinates: Coordinates) -> Result<LocationIrradiance, LookupError> {
        Ok(self.figures())
    }
}

/// EU JRC PVGIS `PVcalc` client (1 kWp reference system, optimal angles)
pub struct PvgisIrradiance {
    http_client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct PvgisResponse {
    outputs: PvgisOutputs,
}

#[derive(Debug, Deserialize)]
struct PvgisOutputs {
    totals: PvgisTotals,
}

#[derive(Debug, Deserialize)]
struct PvgisTotals {
    fixed: PvgisFixed,
}

#[derive(Debug, Deserialize)]
struct PvgisFixed {
    /// Annual production of the reference system, kWh
    #[serde(rename = "E_y")]
    e_y: f64,
    /// Annual in-plane irradiation, kWh/m²
    #[serde(rename = "H(i)_y")]
    h_i_y: f64,
}

impl PvgisIrradiance {
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
impl IrradianceSource for PvgisIrradiance {
    async fn irradiance(&self, coordinates: Coordinates) -> Result<LocationIrradiance, LookupError> {
        let lat = coordinates.latitude.to_string();
        let lon = coordinates.longitude.to_string();

        debug!(lat = %lat, lon = %lon, "Querying PVGIS");

        let response = self
            .http_client
            .get(&self.base_url)
            .query(&[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("peakpower", "1"),
                ("loss", "14"),
                ("optimalangles", "1"),
                ("outputformat", "json"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LookupError::Api(status.as_u16(), error_text));
        }

        let parsed: PvgisResponse = response
            .json()
            .await
            .map_err(|e| LookupError::Parse(e.to_string()))?;
        let fixed = parsed.outputs.totals.fixed;

        Ok(LocationIrradiance {
            peak_sun_hours: fixed.h_i_y / 365.0,
            pv_potential_kwh_per_kwp: fixed.e_y,
            origin: DataOrigin::Live,
        })
    }
}

/// Live source degrading to region defaults on failure or implausible figures
pub struct FallbackIrradiance {
    primary: Arc<dyn IrradianceSource>,
    fallback: RegionDefaultIrradiance,
}

impl FallbackIrradiance {
    pub fn new(primary: Arc<dyn IrradianceSource>, region: &RegionProfile) -> Self {
        Self {
            primary,
            fallback: RegionDefaultIrradiance::new(region),
        }
    }
}

fn is_plausible(figures: &LocationIrradiance) -> bool {
    let within = |value: f64, (lo, hi): (f64, f64)| value.is_finite() && value >= lo && value <= hi;
    within(figures.peak_sun_hours, PEAK_SUN_HOURS_RANGE)
        && within(figures.pv_potential_kwh_per_kwp, PV_POTENTIAL_RANGE)
}

#[async_trait]
impl IrradianceSource for FallbackIrradiance {
    async fn irradiance(&self, coordinates: Coordinates) -> Result<LocationIrradiance, LookupError> {
        match self.primary.irradiance(coordinates).await {
            Ok(figures) if is_plausible(&figures) => Ok(figures),
            Ok(figures) => {
                warn!(
                    peak_sun_hours = figures.peak_sun_hours,
                    pv_potential = figures.pv_potential_kwh_per_kwp,
                    "Implausible irradiance figures, using region defaults"
                );
                Ok(self.fallback.figures())
            }
            Err(e) => {
                warn!(error = %e, "Irradiance lookup failed, using region defaults");
                Ok(self.fallback.figures())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSource(Result<LocationIrradiance, LookupError>);

    #[async_trait]
    impl IrradianceSource for FixedSource {
        async fn irradiance(&self, _c: Coordinates) -> Result<LocationIrradiance, LookupError> {
            self.0.clone()
        }
    }

    const POINT: Coordinates = Coordinates {
        latitude: 45.0,
        longitude: 16.0,
    };

    #[tokio::test]
    async fn test_plausible_live_figures_kept() {
        let live = LocationIrradiance {
            peak_sun_hours: 4.4,
            pv_potential_kwh_per_kwp: 1300.0,
            origin: DataOrigin::Live,
        };
        let source = FallbackIrradiance::new(
            Arc::new(FixedSource(Ok(live))),
            &RegionProfile::default(),
        );
        assert_eq!(source.irradiance(POINT).await.unwrap(), live);
    }

    #[tokio::test]
    async fn test_implausible_live_figures_replaced() {
        let live = LocationIrradiance {
            peak_sun_hours: 4.4,
            pv_potential_kwh_per_kwp: 9000.0,
            origin: DataOrigin::Live,
        };
        let source = FallbackIrradiance::new(
            Arc::new(FixedSource(Ok(live))),
            &RegionProfile::default(),
        );
        let figures = source.irradiance(POINT).await.unwrap();
        assert_eq!(figures.origin, DataOrigin::RegionDefault);
        assert_eq!(figures.pv_potential_kwh_per_kwp, 1175.0);
    }

    #[tokio::test]
    async fn test_failure_degrades_to_region_default() {
        let source = FallbackIrradiance::new(
            Arc::new(FixedSource(Err(LookupError::Timeout))),
            &RegionProfile::default(),
        );
        let figures = source.irradiance(POINT).await.unwrap();
        assert_eq!(figures.origin, DataOrigin::RegionDefault);
    }

    #[test]
    fn test_pvgis_payload_parsing() {
        let body = r#"{"inputs":{},"outputs":{"monthly":{},"totals":{"fixed":{"E_d":3.3,"E_m":100.1,"E_y":1201.7,"H(i)_d":4.2,"H(i)_m":128.0,"H(i)_y":1536.1,"SD_m":8.0,"SD_y":40.0,"l_aoi":-2.8,"l_spec":"1.6","l_tg":-6.1,"l_total":-20.3}}}}"#;
        let parsed: PvgisResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.outputs.totals.fixed.e_y, 1201.7);
        assert!((parsed.outputs.totals.fixed.h_i_y / 365.0 - 4.208).abs() < 0.01);
    }
}
