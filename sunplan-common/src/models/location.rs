//! Location records exchanged with the geocoding and irradiance collaborators

use serde::{Deserialize, Serialize};

/// Structured property address supplied by the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    pub country: String,
}

impl Address {
    /// Single-line form used for geocoding queries and narrative text
    pub fn one_line(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(5);
        for part in [
            Some(self.street.as_str()),
            self.postal_code.as_deref(),
            Some(self.city.as_str()),
            self.region.as_deref(),
            Some(self.country.as_str()),
        ]
        .into_iter()
        .flatten()
        {
            let part = part.trim();
            if !part.is_empty() {
                parts.push(part);
            }
        }
        parts.join(", ")
    }

    /// City, or the country when no city was given
    pub fn locality(&self) -> &str {
        if self.city.trim().is_empty() {
            self.country.trim()
        } else {
            self.city.trim()
        }
    }
}

/// WGS84 coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Geocoder output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub coordinates: Coordinates,
    /// False when the coordinates are a region default rather than a real lookup
    pub used_real_geocoding: bool,
}

/// Where a location figure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataOrigin {
    Live,
    RegionDefault,
}

/// Irradiance figures for a geocoded point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationIrradiance {
    /// Peak sun hours per day
    pub peak_sun_hours: f64,
    /// Annual kWh produced per kW installed
    pub pv_potential_kwh_per_kwp: f64,
    pub origin: DataOrigin,
}

/// Location block attached to a finished report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSummary {
    pub address: String,
    pub coordinates: Coordinates,
    pub used_real_geocoding: bool,
    pub irradiance: LocationIrradiance,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_line_skips_empty_parts() {
        let address = Address {
            street: "12 Sunny Lane".to_string(),
            city: "Springfield".to_string(),
            region: None,
            postal_code: Some("  ".to_string()),
            country: "US".to_string(),
        };
        assert_eq!(address.one_line(), "12 Sunny Lane, Springfield, US");
    }

    #[test]
    fn test_locality_falls_back_to_country() {
        let address = Address {
            country: "Croatia".to_string(),
            ..Default::default()
        };
        assert_eq!(address.locality(), "Croatia");
    }
}
