use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::errors::CoreError;
use super::chart::Resolution;
use super::variant::ModelVariant;

/// Base URLs of the HTTP providers. Overridable so tests can point at a mock server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub coingecko_base_url: String,
    pub coincap_base_url: String,
    pub frankfurter_base_url: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            coingecko_base_url: "https://api.coingecko.com/api/v3".to_string(),
            coincap_base_url: "https://api.coincap.io/v2".to_string(),
            frankfurter_base_url: "https://api.frankfurter.dev/v1".to_string(),
        }
    }
}

/// User-configurable settings, loaded from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Display currency for local-currency figures (e.g., "JPY", "USD", "EUR").
    pub local_currency: String,

    /// Rate used when every exchange-rate source fails.
    pub default_exchange_rate: f64,

    /// Variant used for chart model curves.
    pub chart_variant: ModelVariant,

    pub resolution: Resolution,

    /// Per-request timeout for live providers.
    pub provider_timeout_ms: u64,

    pub chart_cache_ttl_secs: u64,

    pub daily_cache_ttl_secs: u64,

    /// When set, caches are persisted here instead of kept in memory.
    pub cache_dir: Option<PathBuf>,

    pub providers: ProviderSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            local_currency: "JPY".to_string(),
            default_exchange_rate: 150.0,
            chart_variant: ModelVariant::Standard,
            resolution: Resolution::Daily,
            provider_timeout_ms: 10_000,
            chart_cache_ttl_secs: 6 * 60 * 60,
            daily_cache_ttl_secs: 60 * 60,
            cache_dir: None,
            providers: ProviderSettings::default(),
        }
    }
}

impl Settings {
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading settings");
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("Failed to read {}: {e}", path.display())))?;
        let settings: Self = serde_json::from_str(&raw)
            .map_err(|e| CoreError::Config(format!("Failed to parse {}: {e}", path.display())))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        let code = self.local_currency.trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CoreError::Config(format!(
                "Invalid currency code '{}': must be exactly 3 ASCII letters (e.g., USD, EUR, JPY)",
                self.local_currency
            )));
        }
        if !(self.default_exchange_rate.is_finite() && self.default_exchange_rate > 0.0) {
            return Err(CoreError::Config(format!(
                "default_exchange_rate must be positive, got {}",
                self.default_exchange_rate
            )));
        }
        if self.provider_timeout_ms == 0 {
            return Err(CoreError::Config("provider_timeout_ms must be > 0".into()));
        }
        if self.chart_cache_ttl_secs == 0 || self.daily_cache_ttl_secs == 0 {
            return Err(CoreError::Config("cache TTLs must be > 0".into()));
        }
        Ok(())
    }

    pub fn currency(&self) -> String {
        self.local_currency.trim().to_uppercase()
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }

    pub fn chart_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.chart_cache_ttl_secs)
    }

    pub fn daily_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.daily_cache_ttl_secs)
    }
}
