//! Application configuration for client frontends.
//!
//! A JSON profile file supplies endpoints and pipeline directories; a few
//! environment variables override it for development and CI.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pipeline::PipelineConfig;
use crate::scheduler::SchedulerConfig;
use crate::util::{is_http_url, normalize_text_option};

pub const ENV_API_BASE_URL: &str = "LEADLINE_API_BASE_URL";
pub const ENV_API_KEY: &str = "LEADLINE_API_KEY";

const DEFAULT_SYNC_INTERVAL_SECS: u64 = 15 * 60;
const DEFAULT_MAX_RECORDING_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BACKOFF_SECS: u64 = 30;

/// Deployment profile a client runs against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Dev,
    Staging,
    #[default]
    Prod,
}

impl Profile {
    /// Built-in API endpoint for the profile, used when the config file and
    /// environment provide none.
    #[must_use]
    pub const fn default_api_base_url(self) -> &'static str {
        match self {
            Self::Dev => "http://localhost:8787",
            Self::Staging => "https://staging-api.leadline.app",
            Self::Prod => "https://api.leadline.app",
        }
    }
}

impl std::str::FromStr for Profile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "dev" => Ok(Self::Dev),
            "staging" => Ok(Self::Staging),
            "prod" | "production" => Ok(Self::Prod),
            other => Err(Error::InvalidInput(format!("unknown profile: {other}"))),
        }
    }
}

/// Persisted client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(default)]
    pub profile: Profile,
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub recorder_dirs: Vec<PathBuf>,
    #[serde(default)]
    pub media_dirs: Vec<PathBuf>,
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
    #[serde(default)]
    pub sync_interval_secs: Option<u64>,
    #[serde(default)]
    pub max_recording_attempts: Option<u32>,
    #[serde(default)]
    pub retry_backoff_secs: Option<u64>,
}

impl AppConfig {
    /// Parse a config file payload.
    pub fn from_json(payload: &str) -> Result<Self> {
        serde_json::from_str(payload).map_err(|error| {
            Error::InvalidInput(format!("invalid configuration JSON: {error}"))
        })
    }

    /// Apply environment overrides through a lookup, testable without
    /// touching the process environment.
    pub fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(url) = normalize_text_option(lookup(ENV_API_BASE_URL)) {
            if !is_http_url(&url) {
                return Err(Error::InvalidInput(format!(
                    "{ENV_API_BASE_URL} must start with http:// or https://"
                )));
            }
            self.api_base_url = Some(url.trim_end_matches('/').to_string());
        }
        Ok(self)
    }

    /// Apply overrides from the real process environment.
    pub fn with_env(self) -> Result<Self> {
        self.apply_env(|key| std::env::var(key).ok())
    }

    /// The API endpoint to use, falling back to the profile default.
    #[must_use]
    pub fn api_base_url(&self) -> String {
        self.api_base_url
            .clone()
            .unwrap_or_else(|| self.profile.default_api_base_url().to_string())
    }

    /// Pipeline directories, with the scratch dir anchored under `data_dir`
    /// when the config names none.
    #[must_use]
    pub fn pipeline_config(&self, data_dir: &std::path::Path) -> PipelineConfig {
        PipelineConfig {
            recorder_dirs: self.recorder_dirs.clone(),
            media_dirs: self.media_dirs.clone(),
            scratch_dir: self
                .scratch_dir
                .clone()
                .unwrap_or_else(|| data_dir.join("recordings")),
        }
    }

    /// Scheduler knobs from the config, defaults where unset.
    #[must_use]
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            sync_interval: Duration::from_secs(
                self.sync_interval_secs.unwrap_or(DEFAULT_SYNC_INTERVAL_SECS),
            ),
            max_recording_attempts: self
                .max_recording_attempts
                .unwrap_or(DEFAULT_MAX_RECORDING_ATTEMPTS),
            retry_backoff: Duration::from_secs(
                self.retry_backoff_secs.unwrap_or(DEFAULT_RETRY_BACKOFF_SECS),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_profile_defaults_when_config_is_sparse() {
        let config = AppConfig::from_json("{}").unwrap();
        assert_eq!(config.profile, Profile::Prod);
        assert_eq!(config.api_base_url(), "https://api.leadline.app");
        assert_eq!(
            config.scheduler_config().sync_interval,
            Duration::from_secs(900)
        );
    }

    #[test]
    fn test_env_override_wins_over_file() {
        let config = AppConfig::from_json(
            r#"{"profile":"staging","api_base_url":"https://file.example.com"}"#,
        )
        .unwrap();
        let config = config
            .apply_env(|key| {
                (key == ENV_API_BASE_URL).then(|| "https://env.example.com/".to_string())
            })
            .unwrap();
        assert_eq!(config.api_base_url(), "https://env.example.com");
    }

    #[test]
    fn test_env_override_rejects_non_http_url() {
        let err = AppConfig::default()
            .apply_env(|key| (key == ENV_API_BASE_URL).then(|| "not-a-url".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_profile_parsing() {
        assert_eq!("dev".parse::<Profile>().unwrap(), Profile::Dev);
        assert_eq!("Production".parse::<Profile>().unwrap(), Profile::Prod);
        assert!("qa".parse::<Profile>().is_err());
    }

    #[test]
    fn test_scratch_dir_anchors_under_data_dir() {
        let config = AppConfig::default();
        let pipeline = config.pipeline_config(std::path::Path::new("/data"));
        assert_eq!(pipeline.scratch_dir, PathBuf::from("/data/recordings"));
    }
}
