//! Environment-driven settings for the resolver.
//!
//! Parsed with clap so every value can come from an env var or a flag.

use crate::error::InferenceError;
use crate::location::cache::SITE_CONFIG_TTL;
use crate::location::gazetteer::LanguageColumns;
use clap::Parser;
use std::time::Duration;

#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "location-inference")]
pub struct InferenceSettings {
    /// Site (tenant) whose configuration drives resolution
    #[arg(long, env = "INFERENCE_SITE_NAME")]
    pub site_name: String,

    /// Base URL of the settings service, e.g. http://settings.internal
    #[arg(long, env = "SETTINGS_SERVICE_HOST")]
    pub settings_host: Option<String>,

    /// How long a fetched site configuration stays fresh
    #[arg(long, env = "SITE_CONFIG_TTL_SECS", default_value_t = SITE_CONFIG_TTL.as_secs())]
    pub site_config_ttl_secs: u64,

    /// Upper bound on every external store call
    #[arg(long, env = "STORE_TIMEOUT_MS", default_value_t = 5000)]
    pub store_timeout_ms: u64,

    /// Language to name-column table, e.g. "en:name,ar:ar_name"
    #[arg(long, env = "LANGUAGE_COLUMNS")]
    pub language_columns: Option<String>,

    /// Default log level when RUST_LOG is unset
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl InferenceSettings {
    /// Read settings from the environment only.
    pub fn from_env() -> Result<Self, InferenceError> {
        Self::try_parse_from(["location-inference"])
            .map_err(|e| InferenceError::configuration(e.to_string()))
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn site_config_ttl(&self) -> Duration {
        Duration::from_secs(self.site_config_ttl_secs)
    }

    pub fn language_columns(&self) -> Result<LanguageColumns, InferenceError> {
        match &self.language_columns {
            Some(table) => LanguageColumns::parse(table),
            None => Ok(LanguageColumns::default()),
        }
    }

    pub fn validate(&self) -> Result<(), InferenceError> {
        if self.site_name.trim().is_empty() {
            return Err(InferenceError::configuration("site name is empty"));
        }
        if self.site_config_ttl_secs == 0 {
            return Err(InferenceError::configuration("SITE_CONFIG_TTL_SECS must be > 0"));
        }
        if self.store_timeout_ms == 0 {
            return Err(InferenceError::configuration("STORE_TIMEOUT_MS must be > 0"));
        }
        if let Some(host) = &self.settings_host {
            if !(host.starts_with("http://") || host.starts_with("https://")) {
                return Err(InferenceError::configuration(format!(
                    "settings host '{}' must be an http(s) URL",
                    host
                )));
            }
        }
        self.language_columns()?;
        Ok(())
    }
}
