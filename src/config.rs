//! Configuration file support for nut-chat
//!
//! Loads config from ~/.nut-chat/config.toml with env-var fallbacks.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default short-poll interval while a turn is in flight
const DEFAULT_SHORT_POLL_SECS: u64 = 10;

/// Default delay between listen-stream reconnect attempts
const DEFAULT_LISTEN_RETRY_SECS: u64 = 5;

/// Default time to wait for a first response part before emitting telemetry
const DEFAULT_FIRST_RESPONSE_TIMEOUT_SECS: u64 = 20;

/// Configuration for nut-chat
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Backend base URL (e.g. https://api.example.dev)
    pub backend_url: Option<String>,

    /// User id sent as the x-user-id header
    pub user_id: Option<String>,

    /// Bearer token for the Authorization header
    pub api_token: Option<String>,

    /// Short-poll interval in seconds
    pub short_poll_interval_secs: Option<u64>,

    /// Listen reconnect delay in seconds
    pub listen_retry_delay_secs: Option<u64>,

    /// First-response telemetry timeout in seconds
    pub first_response_timeout_secs: Option<u64>,
}

impl Config {
    /// Load config from ~/.nut-chat/config.toml
    ///
    /// Also loads a ~/.nut-chat/.env file (falling back to the current
    /// directory) so env-var lookups via `get_or_env` see it.
    pub fn load() -> Self {
        let env_path = dirs::home_dir()
            .map(|h| h.join(".nut-chat").join(".env"))
            .filter(|p| p.exists());
        if let Some(path) = env_path {
            let _ = dotenvy::from_path(&path);
        } else {
            let _ = dotenvy::dotenv();
        }

        Self::load_from(&config_path())
    }

    /// Load config from an explicit path, degrading to defaults on error
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Get a value with fallback to environment variable
    pub fn get_or_env(&self, field: Option<&String>, env_var: &str) -> Option<String> {
        field.cloned().or_else(|| std::env::var(env_var).ok())
    }

    /// Resolve the backend base URL (config file, then NUT_BACKEND_URL)
    pub fn backend_url(&self) -> Option<String> {
        self.get_or_env(self.backend_url.as_ref(), "NUT_BACKEND_URL")
    }

    /// Resolve the user id (config file, then NUT_USER_ID)
    pub fn user_id(&self) -> Option<String> {
        self.get_or_env(self.user_id.as_ref(), "NUT_USER_ID")
    }

    /// Resolve the API token (config file, then NUT_API_TOKEN)
    pub fn api_token(&self) -> Option<String> {
        self.get_or_env(self.api_token.as_ref(), "NUT_API_TOKEN")
    }
}

/// Get the config file path
pub fn config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".nut-chat")
        .join("config.toml")
}

/// Runtime knobs for chat dispatch
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// How often the short-poll safety net re-queries for missed responses
    pub short_poll_interval: Duration,

    /// Fixed delay between listen-stream reconnect attempts
    pub listen_retry_delay: Duration,

    /// How long to wait for the first response part before emitting a
    /// telemetry warning (the request is never aborted)
    pub first_response_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            short_poll_interval: Duration::from_secs(DEFAULT_SHORT_POLL_SECS),
            listen_retry_delay: Duration::from_secs(DEFAULT_LISTEN_RETRY_SECS),
            first_response_timeout: Duration::from_secs(DEFAULT_FIRST_RESPONSE_TIMEOUT_SECS),
        }
    }
}

impl DispatchConfig {
    /// Build dispatch knobs from a loaded config file
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        Self {
            short_poll_interval: config
                .short_poll_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.short_poll_interval),
            listen_retry_delay: config
                .listen_retry_delay_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.listen_retry_delay),
            first_response_timeout: config
                .first_response_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.first_response_timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.backend_url.is_none());
        assert!(config.user_id.is_none());
        assert!(config.api_token.is_none());
    }

    #[test]
    fn test_config_path() {
        let path = config_path();
        assert!(path.to_string_lossy().contains(".nut-chat"));
        assert!(path.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "backend_url = \"https://backend.test\"\nuser_id = \"u-1\"\nshort_poll_interval_secs = 3"
        )
        .unwrap();

        let config = Config::load_from(file.path());
        assert_eq!(config.backend_url.as_deref(), Some("https://backend.test"));
        assert_eq!(config.user_id.as_deref(), Some("u-1"));

        let dispatch = DispatchConfig::from_config(&config);
        assert_eq!(dispatch.short_poll_interval, Duration::from_secs(3));
        assert_eq!(dispatch.listen_retry_delay, Duration::from_secs(5));
    }

    #[test]
    fn test_load_from_missing_file_defaults() {
        let config = Config::load_from(Path::new("/nonexistent/nut-chat.toml"));
        assert!(config.backend_url.is_none());
    }

    #[test]
    fn test_dispatch_defaults_match_protocol_timings() {
        let dispatch = DispatchConfig::default();
        assert_eq!(dispatch.short_poll_interval, Duration::from_secs(10));
        assert_eq!(dispatch.listen_retry_delay, Duration::from_secs(5));
        assert_eq!(dispatch.first_response_timeout, Duration::from_secs(20));
    }
}
