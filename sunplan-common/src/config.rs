//! Configuration loading and config file resolution
//!
//! Bootstrap configuration is a single TOML file. Every section is optional;
//! missing sections and fields fall back to built-in defaults so a bare
//! install starts without any file at all.
//!
//! # Resolution priority
//! 1. Command-line argument (`--config`)
//! 2. `SUNPLAN_CONFIG` environment variable
//! 3. User config file (`~/.config/sunplan/config.toml` on Linux)
//! 4. System config file (`/etc/sunplan/config.toml`, Linux only)
//! 5. Built-in defaults

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "SUNPLAN_CONFIG";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub region: RegionProfile,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub location: LocationConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` overrides
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5790
}

/// Inference provider backend family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Any endpoint speaking the OpenAI chat-completions protocol
    OpenaiCompatible,
    /// Google Gemini `generateContent`
    Gemini,
}

/// One configured inference provider
///
/// Providers are tried in file order; models inside a provider in list order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Display name used in logs and the attempt log
    pub name: String,
    pub kind: ProviderKind,
    /// Override of the provider's public endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Key stored in the file (environment variable wins when both are set)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable holding the key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Vision-capable models for structured analysis, in fallback order
    #[serde(default)]
    pub models: Vec<String>,
    /// Model used for narrative text; first analysis model when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_model: Option<String>,
}

/// Image validator models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Provider the models below belong to. When absent or not usable, the
    /// first usable provider classifies with its own first two models.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub primary_model: String,
    /// Cheaper model tried once after a transient failure
    pub fallback_model: String,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            provider: Some("gemini".to_string()),
            primary_model: "gemini-2.0-flash".to_string(),
            fallback_model: "gemini-1.5-flash-8b".to_string(),
        }
    }
}

/// Retry, timeout and gating constants for the inference orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceConfig {
    #[serde(default = "default_attempts_per_model")]
    pub attempts_per_model: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,
    /// Declared confidence below this rejects the analysis
    #[serde(default = "default_confidence_floor")]
    pub confidence_floor: u8,
    /// Confidence below this adds a low-confidence advisory
    #[serde(default = "default_advisory_threshold")]
    pub low_confidence_advisory_below: u8,
    #[serde(default)]
    pub validator: ValidatorConfig,
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            attempts_per_model: default_attempts_per_model(),
            retry_delay_ms: default_retry_delay_ms(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
            confidence_floor: default_confidence_floor(),
            low_confidence_advisory_below: default_advisory_threshold(),
            validator: ValidatorConfig::default(),
            providers: default_providers(),
        }
    }
}

fn default_attempts_per_model() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_attempt_timeout_secs() -> u64 {
    15
}

fn default_confidence_floor() -> u8 {
    30
}

fn default_advisory_threshold() -> u8 {
    60
}

fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig {
            name: "gemini".to_string(),
            kind: ProviderKind::Gemini,
            base_url: None,
            api_key: None,
            api_key_env: Some("SUNPLAN_GEMINI_API_KEY".to_string()),
            models: vec![
                "gemini-2.0-flash".to_string(),
                "gemini-1.5-flash".to_string(),
            ],
            text_model: Some("gemini-2.0-flash".to_string()),
        },
        ProviderConfig {
            name: "openai".to_string(),
            kind: ProviderKind::OpenaiCompatible,
            base_url: None,
            api_key: None,
            api_key_env: Some("SUNPLAN_OPENAI_API_KEY".to_string()),
            models: vec!["gpt-4o-mini".to_string(), "gpt-4o".to_string()],
            text_model: Some("gpt-4o-mini".to_string()),
        },
    ]
}

/// Residential plausibility band the engine must never leave
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlausibilityBand {
    pub min_panels: u32,
    pub max_panels: u32,
    /// Minimum annual kWh per installed kW
    pub min_specific_yield: f64,
    /// Maximum annual kWh per installed kW
    pub max_specific_yield: f64,
}

impl Default for PlausibilityBand {
    fn default() -> Self {
        Self {
            min_panels: 5,
            max_panels: 30,
            min_specific_yield: 300.0,
            max_specific_yield: 2600.0,
        }
    }
}

/// Region constants feeding the extraction prompt and the recommendation engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionProfile {
    pub name: String,
    pub currency: String,
    /// Fallback coordinates when geocoding is unavailable
    pub default_latitude: f64,
    pub default_longitude: f64,
    /// Typical peak sun hours per day
    pub peak_sun_hours: f64,
    /// Typical annual kWh per installed kW
    pub pv_potential_kwh_per_kwp: f64,
    pub optimal_pitch_deg: f64,
    /// Price per kWh
    pub electricity_rate: f64,
    /// Installed cost per watt
    pub cost_per_watt: f64,
    pub panel_wattage_w: f64,
    pub panel_area_m2: f64,
    /// Effective roof footprint per panel including setbacks and row spacing, m²
    pub effective_panel_footprint_m2: f64,
    /// Annual production loss fraction
    pub degradation_rate: f64,
    /// Annual electricity price increase fraction
    pub rate_escalation: f64,
    /// kg CO₂ per kWh of grid electricity
    pub grid_emission_kg_per_kwh: f64,
    /// kg CO₂ absorbed by one tree per year
    pub tree_absorption_kg_per_year: f64,
    /// Multiplier for heat and seasonal losses
    pub temperature_factor: f64,
    pub plausibility: PlausibilityBand,
}

impl Default for RegionProfile {
    fn default() -> Self {
        Self {
            name: "Central Adriatic".to_string(),
            currency: "EUR".to_string(),
            default_latitude: 45.815,
            default_longitude: 15.982,
            peak_sun_hours: 3.9,
            pv_potential_kwh_per_kwp: 1175.0,
            optimal_pitch_deg: 36.0,
            electricity_rate: 0.16,
            cost_per_watt: 1.10,
            panel_wattage_w: 400.0,
            panel_area_m2: 1.95,
            effective_panel_footprint_m2: 3.9,
            degradation_rate: 0.005,
            rate_escalation: 0.03,
            grid_emission_kg_per_kwh: 0.45,
            tree_absorption_kg_per_year: 21.77,
            temperature_factor: 0.98,
            plausibility: PlausibilityBand::default(),
        }
    }
}

/// Pipeline-level limits and switches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Largest accepted image payload in bytes
    pub max_image_bytes: usize,
    /// Produce a region-default estimate (flagged `used_inference = false`)
    /// when every provider failed operationally
    pub degraded_estimate_on_exhaustion: bool,
    /// Ask a provider for the narrative summary; template only when false
    pub narrative_inference: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_image_bytes: 10 * 1024 * 1024,
            degraded_estimate_on_exhaustion: false,
            narrative_inference: true,
        }
    }
}

/// Geocoding and irradiance lookups
///
/// Live lookups are off by default; the region profile then supplies
/// coordinates and irradiance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub live_lookup: bool,
    /// Nominatim-compatible search endpoint
    pub geocoder_url: String,
    /// PVGIS `PVcalc` endpoint
    pub irradiance_url: String,
    /// Per-lookup timeout
    pub timeout_secs: u64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            live_lookup: false,
            geocoder_url: "https://nominatim.openstreetmap.org/search".to_string(),
            irradiance_url: "https://re.jrc.ec.europa.eu/api/v5_2/PVcalc".to_string(),
            timeout_secs: 5,
        }
    }
}

impl TomlConfig {
    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<()> {
        let inference = &self.inference;
        if inference.attempts_per_model == 0 {
            return Err(Error::Config(
                "inference.attempts_per_model must be at least 1".to_string(),
            ));
        }
        if inference.attempt_timeout_secs == 0 {
            return Err(Error::Config(
                "inference.attempt_timeout_secs must be positive".to_string(),
            ));
        }
        if inference.confidence_floor > 100 || inference.low_confidence_advisory_below > 100 {
            return Err(Error::Config(
                "inference confidence thresholds must be within 0-100".to_string(),
            ));
        }
        for provider in &inference.providers {
            if provider.models.is_empty() {
                return Err(Error::Config(format!(
                    "provider '{}' lists no models",
                    provider.name
                )));
            }
        }

        let region = &self.region;
        let positive = [
            ("pv_potential_kwh_per_kwp", region.pv_potential_kwh_per_kwp),
            ("peak_sun_hours", region.peak_sun_hours),
            ("electricity_rate", region.electricity_rate),
            ("cost_per_watt", region.cost_per_watt),
            ("panel_wattage_w", region.panel_wattage_w),
            ("panel_area_m2", region.panel_area_m2),
            ("effective_panel_footprint_m2", region.effective_panel_footprint_m2),
            ("tree_absorption_kg_per_year", region.tree_absorption_kg_per_year),
            ("temperature_factor", region.temperature_factor),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::Config(format!("region.{} must be positive", field)));
            }
        }
        if !(0.0..1.0).contains(&region.degradation_rate) {
            return Err(Error::Config(
                "region.degradation_rate must be within [0, 1)".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&region.rate_escalation) {
            return Err(Error::Config(
                "region.rate_escalation must be within [0, 1]".to_string(),
            ));
        }
        let band = &region.plausibility;
        if band.min_panels == 0 || band.min_panels > band.max_panels {
            return Err(Error::Config(
                "region.plausibility panel range is empty".to_string(),
            ));
        }
        if band.min_specific_yield >= band.max_specific_yield {
            return Err(Error::Config(
                "region.plausibility specific yield range is empty".to_string(),
            ));
        }
        if self.location.live_lookup && self.location.timeout_secs == 0 {
            return Err(Error::Config(
                "location.timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Locates the config file following the documented priority order
pub struct ConfigResolver {
    app_name: String,
}

impl ConfigResolver {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }

    /// Resolve the config file path, `None` when only defaults apply
    pub fn resolve(&self, cli_arg: Option<&Path>) -> Option<PathBuf> {
        // Priority 1: Command-line argument
        if let Some(path) = cli_arg {
            return Some(path.to_path_buf());
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        // Priority 3: User config file
        if let Some(path) = self.user_config_path() {
            if path.exists() {
                return Some(path);
            }
        }

        // Priority 4: System config file
        if cfg!(target_os = "linux") {
            let system = PathBuf::from("/etc").join(&self.app_name).join("config.toml");
            if system.exists() {
                return Some(system);
            }
        }

        None
    }

    /// `<config dir>/<app>/config.toml` for the current platform
    pub fn user_config_path(&self) -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(&self.app_name).join("config.toml"))
    }
}

/// Load a TOML config from an explicit path
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Load config from a resolved path, degrading to defaults when the file is absent
///
/// A file that exists but fails to parse or validate is an error: silently
/// ignoring a broken config would run the service with unintended constants.
pub fn load_config(resolved: Option<&Path>) -> Result<TomlConfig> {
    match resolved {
        None => {
            info!("No config file found, using built-in defaults");
            Ok(TomlConfig::default())
        }
        Some(path) if !path.exists() => {
            warn!(
                "Config file {} does not exist, using built-in defaults",
                path.display()
            );
            Ok(TomlConfig::default())
        }
        Some(path) => {
            let config = load_toml_config(path)?;
            info!("Configuration loaded from {}", path.display());
            Ok(config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(TomlConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut config = TomlConfig::default();
        config.inference.attempts_per_model = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_inverted_plausibility_band_rejected() {
        let mut config = TomlConfig::default();
        config.region.plausibility.min_panels = 40;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_region_section_keeps_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            [region]
            electricity_rate = 0.25
            "#,
        )
        .unwrap();
        assert_eq!(config.region.electricity_rate, 0.25);
        assert_eq!(config.region.pv_potential_kwh_per_kwp, 1175.0);
        assert_eq!(config.inference.attempts_per_model, 3);
    }
}
