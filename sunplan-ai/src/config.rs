//! Configuration resolution for sunplan-ai
//!
//! Turns the bootstrap `TomlConfig` into the runtime settings handed to the
//! orchestrator, and resolves provider API keys with ENV → TOML priority.

use std::time::Duration;
use sunplan_common::config::{InferenceConfig, ProviderConfig};
use tracing::{info, warn};

/// Retry, timeout and gating constants passed to the orchestrator at construction
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceSettings {
    pub attempts_per_model: u32,
    pub retry_delay: Duration,
    pub attempt_timeout: Duration,
    pub confidence_floor: u8,
    pub low_confidence_advisory_below: u8,
}

impl InferenceSettings {
    pub fn from_config(config: &InferenceConfig) -> Self {
        Self {
            attempts_per_model: config.attempts_per_model.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            attempt_timeout: Duration::from_secs(config.attempt_timeout_secs),
            confidence_floor: config.confidence_floor,
            low_confidence_advisory_below: config.low_confidence_advisory_below,
        }
    }
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self::from_config(&InferenceConfig::default())
    }
}

/// Resolve a provider API key
///
/// **Priority:** ENV (`api_key_env`) → TOML (`api_key`)
///
/// Returns `None` when neither source holds a usable key.
pub fn resolve_api_key(provider: &ProviderConfig) -> Option<String> {
    let env_key = provider
        .api_key_env
        .as_deref()
        .and_then(|var| std::env::var(var).ok())
        .filter(|key| is_valid_key(key));

    let toml_key = provider
        .api_key
        .as_ref()
        .filter(|key| is_valid_key(key))
        .cloned();

    if env_key.is_some() && toml_key.is_some() {
        warn!(
            provider = %provider.name,
            "API key found in both environment and TOML config. Using environment (highest priority)."
        );
    }

    if let Some(key) = env_key {
        info!(provider = %provider.name, "API key loaded from environment variable");
        return Some(key);
    }

    if let Some(key) = toml_key {
        info!(provider = %provider.name, "API key loaded from TOML config");
        return Some(key);
    }

    None
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
