//! Immutable run configuration.
//!
//! Configuration is resolved once by the surrounding system (process
//! startup, env handling, CLI) and then passed into core entry points
//! as an explicit [`AppConfig`]. The core never reads environment
//! variables or discovers config files itself; that keeps behaviour
//! consistent across multi-threaded runtimes and test harnesses.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Errors raised by configuration parsing and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config document is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("config.api.baseUrl missing")]
    MissingBaseUrl,
    #[error("config.api.apiKey missing")]
    MissingApiKey,
    #[error("config.api.pageLimit must be at least 1")]
    InvalidPageLimit,
    #[error("config.cache.patientsFilePath missing")]
    MissingPatientsFilePath,
    #[error("config.cache.analysisFilePath missing")]
    MissingAnalysisFilePath,
    #[error("config.cache.rulesFilePath missing")]
    MissingRulesFilePath,
    #[error("config.retry.jitterRatio must be between 0 and 1")]
    InvalidJitterRatio,
}

/// Upstream API connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key: String,
    pub page_limit: u32,
    pub timeouts_ms: u64,
}

/// Local cache locations and whether to prefer them over the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    pub use_local_cache: bool,
    pub patients_file_path: PathBuf,
    pub analysis_file_path: PathBuf,
    pub rules_file_path: PathBuf,
}

/// Retry/backoff policy for upstream requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    /// Additional attempts after the first, so `max_retries + 1` total.
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Symmetric jitter as a fraction of the chosen delay.
    pub jitter_ratio: f64,
}

/// Complete configuration for one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub cache: CacheConfig,
    pub retry: RetryConfig,
}

impl AppConfig {
    /// Parses a config document from JSON and validates it.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Fail-fast presence and sanity checks, applied before any core
    /// entry point trusts the config.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::MissingBaseUrl);
        }
        if self.api.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        if self.api.page_limit == 0 {
            return Err(ConfigError::InvalidPageLimit);
        }
        if self.cache.patients_file_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingPatientsFilePath);
        }
        if self.cache.analysis_file_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingAnalysisFilePath);
        }
        if self.cache.rules_file_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingRulesFilePath);
        }
        if !(0.0..=1.0).contains(&self.retry.jitter_ratio) {
            return Err(ConfigError::InvalidJitterRatio);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> String {
        r#"{
            "api": {
                "baseUrl": "https://upstream.example",
                "apiKey": "k-123",
                "pageLimit": 10,
                "timeoutsMs": 5000
            },
            "cache": {
                "useLocalCache": true,
                "patientsFilePath": "data/patients.json",
                "analysisFilePath": "data/analysis.json",
                "rulesFilePath": "data/rules.json"
            },
            "retry": {
                "maxRetries": 3,
                "baseDelayMs": 500,
                "maxDelayMs": 8000,
                "jitterRatio": 0.2
            }
        }"#
        .to_owned()
    }

    #[test]
    fn parses_camel_case_document() {
        let config = AppConfig::from_json_str(&sample()).unwrap();
        assert_eq!(config.api.page_limit, 10);
        assert_eq!(config.retry.max_retries, 3);
        assert!(config.cache.use_local_cache);
    }

    #[test]
    fn rejects_blank_api_key() {
        let raw = sample().replace("k-123", "   ");
        assert!(matches!(
            AppConfig::from_json_str(&raw),
            Err(ConfigError::MissingApiKey)
        ));
    }

    #[test]
    fn rejects_zero_page_limit() {
        let raw = sample().replace("\"pageLimit\": 10", "\"pageLimit\": 0");
        assert!(matches!(
            AppConfig::from_json_str(&raw),
            Err(ConfigError::InvalidPageLimit)
        ));
    }

    #[test]
    fn rejects_jitter_ratio_above_one() {
        let raw = sample().replace("\"jitterRatio\": 0.2", "\"jitterRatio\": 1.5");
        assert!(matches!(
            AppConfig::from_json_str(&raw),
            Err(ConfigError::InvalidJitterRatio)
        ));
    }

    #[test]
    fn missing_retry_section_is_a_parse_error() {
        let raw = sample().replace("\"retry\"", "\"retry_disabled\"");
        assert!(matches!(
            AppConfig::from_json_str(&raw),
            Err(ConfigError::Parse(_))
        ));
    }
}
