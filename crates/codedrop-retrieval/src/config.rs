//! Configuration for codedrop retrieval.
//!
//! Settings come from `codedrop.json` in the working directory (or an explicit
//! path), fall back to defaults when the file is absent, and can have the API
//! base URL overridden through the environment.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CodedropError, Result};

/// The default config file name.
const CONFIG_FILE_NAME: &str = "codedrop.json";

/// Environment variable that overrides `apiBaseUrl`.
pub const API_BASE_URL_ENV: &str = "CODEDROP_API_BASE_URL";

/// Default snippet API location.
fn default_api_base_url() -> String {
    "http://localhost:5001".to_string()
}

/// Default page whose `?code=` parameter carries deep links.
fn default_app_url() -> String {
    "http://localhost:3000".to_string()
}

/// Default countdown length before openable content is opened.
const fn default_auto_open_seconds() -> u32 {
    5
}

/// Default countdown tick period in milliseconds.
const fn default_tick_interval_ms() -> u64 {
    1000
}

/// Default HTTP request timeout in seconds.
const fn default_request_timeout_secs() -> u64 {
    30
}

/// Default directory for downloaded documents.
fn default_download_dir() -> String {
    ".".to_string()
}

/// Default time a frame gets before it is declared blocked.
const fn default_block_timeout_ms() -> u64 {
    2000
}

/// Default pause between clearing and restoring a frame on retry.
const fn default_retry_clear_delay_ms() -> u64 {
    100
}

/// Default sandbox flags for the document frame.
fn default_sandbox() -> String {
    "allow-same-origin allow-scripts allow-forms".to_string()
}

/// Main configuration for codedrop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Base URL of the snippet API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Page URL used for share links and deep links.
    #[serde(default = "default_app_url")]
    pub app_url: String,

    /// Seconds counted down before openable content is opened.
    #[serde(default = "default_auto_open_seconds")]
    pub auto_open_seconds: u32,

    /// Countdown tick period in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Directory that receives downloaded documents.
    #[serde(default = "default_download_dir")]
    pub download_dir: String,

    /// Document viewer settings.
    #[serde(default)]
    pub viewer: ViewerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            app_url: default_app_url(),
            auto_open_seconds: default_auto_open_seconds(),
            tick_interval_ms: default_tick_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            download_dir: default_download_dir(),
            viewer: ViewerConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `codedrop.json`; returns defaults if it is missing. The
    /// environment override is applied afterwards.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            CodedropError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        let mut config = Self::load_from_dir(&current_dir)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from `codedrop.json` in a specific directory.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load_from_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads configuration from a specific file path.
    ///
    /// A missing file yields the validated defaults.
    ///
    /// # Errors
    ///
    /// Returns `CodedropError::ConfigParseError` if the file cannot be read or
    /// is not valid JSON, and `CodedropError::ConfigValidationError` if the
    /// values are out of range.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(CodedropError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| CodedropError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Applies environment overrides using `lookup` to read variables.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(API_BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.api_base_url = url;
        }
    }

    /// Validates the configuration values.
    ///
    /// - `apiBaseUrl` and `appUrl` must be absolute http(s) URLs
    /// - `autoOpenSeconds`, `tickIntervalMs` and `requestTimeoutSecs` must be greater than 0
    /// - `downloadDir` must not be empty
    /// - `viewer.blockTimeoutMs` must be greater than 0
    pub fn validate(&self) -> Result<()> {
        validate_http_url("apiBaseUrl", &self.api_base_url)?;
        validate_http_url("appUrl", &self.app_url)?;

        if self.auto_open_seconds == 0 {
            return Err(CodedropError::config_validation(
                "autoOpenSeconds must be greater than 0",
                "Set autoOpenSeconds to at least 1 in your codedrop.json",
            ));
        }

        if self.tick_interval_ms == 0 {
            return Err(CodedropError::config_validation(
                "tickIntervalMs must be greater than 0",
                "Set tickIntervalMs to 1000 for one tick per second",
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(CodedropError::config_validation(
                "requestTimeoutSecs must be greater than 0",
                "Set requestTimeoutSecs to at least 1 second in your codedrop.json",
            ));
        }

        if self.download_dir.trim().is_empty() {
            return Err(CodedropError::config_validation(
                "downloadDir must not be empty",
                "Provide a download directory in your codedrop.json (use '.' for current directory)",
            ));
        }

        if self.viewer.block_timeout_ms == 0 {
            return Err(CodedropError::config_validation(
                "viewer.blockTimeoutMs must be greater than 0",
                "Set viewer.blockTimeoutMs to 2000 or more in your codedrop.json",
            ));
        }

        Ok(())
    }

    /// Countdown tick period.
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// HTTP request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn validate_http_url(field: &str, value: &str) -> Result<()> {
    let parsed = Url::parse(value.trim()).map_err(|e| {
        CodedropError::config_validation(
            format!("{field} '{value}' is not a valid URL: {e}"),
            format!("Set {field} to an absolute http(s) URL in your codedrop.json"),
        )
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(CodedropError::config_validation(
            format!("{field} must use http or https, found '{}'", parsed.scheme()),
            format!("Set {field} to an absolute http(s) URL in your codedrop.json"),
        ));
    }
    Ok(())
}

/// Settings for the embedded document viewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerConfig {
    /// How long the frame may stay silent before it is declared blocked.
    #[serde(default = "default_block_timeout_ms")]
    pub block_timeout_ms: u64,

    /// Pause between clearing and restoring the frame source on retry.
    #[serde(default = "default_retry_clear_delay_ms")]
    pub retry_clear_delay_ms: u64,

    /// Sandbox flags applied to the frame.
    #[serde(default = "default_sandbox")]
    pub sandbox: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            block_timeout_ms: default_block_timeout_ms(),
            retry_clear_delay_ms: default_retry_clear_delay_ms(),
            sandbox: default_sandbox(),
        }
    }
}

impl ViewerConfig {
    /// Blocked-detection timeout.
    #[must_use]
    pub const fn block_timeout(&self) -> Duration {
        Duration::from_millis(self.block_timeout_ms)
    }

    /// Retry clear delay.
    #[must_use]
    pub const fn retry_clear_delay(&self) -> Duration {
        Duration::from_millis(self.retry_clear_delay_ms)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default_values() {
        let config = Config::default();

        assert_eq!(config.api_base_url, "http://localhost:5001");
        assert_eq!(config.app_url, "http://localhost:3000");
        assert_eq!(config.auto_open_seconds, 5);
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.download_dir, ".");
    }

    #[test]
    fn test_viewer_config_default_values() {
        let viewer = ViewerConfig::default();

        assert_eq!(viewer.block_timeout(), Duration::from_secs(2));
        assert_eq!(viewer.retry_clear_delay(), Duration::from_millis(100));
        assert_eq!(viewer.sandbox, "allow-same-origin allow-scripts allow-forms");
    }

    #[test]
    fn test_config_deserialization_with_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();

        assert_eq!(config.api_base_url, "http://localhost:5001");
        assert_eq!(config.auto_open_seconds, 5);
        assert_eq!(config.viewer.block_timeout_ms, 2000);
    }

    #[test]
    fn test_config_deserialization_with_overrides() {
        let json = r#"{
            "apiBaseUrl": "https://api.codedrop.dev",
            "autoOpenSeconds": 3,
            "viewer": { "blockTimeoutMs": 500 }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.api_base_url, "https://api.codedrop.dev");
        assert_eq!(config.auto_open_seconds, 3);
        assert_eq!(config.viewer.block_timeout_ms, 500);
        assert_eq!(config.viewer.retry_clear_delay_ms, 100);
    }

    #[test]
    fn test_env_override() {
        let mut config = Config::default();
        config.apply_env_overrides(|key| {
            (key == API_BASE_URL_ENV).then(|| "https://snips.example.org".to_string())
        });
        assert_eq!(config.api_base_url, "https://snips.example.org");

        let mut config = Config::default();
        config.apply_env_overrides(|_| Some("   ".to_string()));
        assert_eq!(config.api_base_url, "http://localhost:5001");
    }

    #[test]
    fn test_load_from_file_valid_json() {
        let config_path = std::env::temp_dir().join("test_codedrop_valid.json");
        std::fs::write(&config_path, r#"{"autoOpenSeconds": 10}"#).unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.auto_open_seconds, 10);

        std::fs::remove_file(&config_path).ok();
    }

    #[test]
    fn test_load_from_file_invalid_json() {
        let config_path = std::env::temp_dir().join("test_codedrop_invalid.json");
        std::fs::write(&config_path, "{ not json").unwrap();

        let err = Config::load_from_file(&config_path).unwrap_err();
        assert!(matches!(err, CodedropError::ConfigParseError { .. }));

        std::fs::remove_file(&config_path).ok();
    }

    #[test]
    fn test_load_from_file_nonexistent_returns_default() {
        let config =
            Config::load_from_file(Path::new("/nonexistent/codedrop.json")).unwrap();
        assert_eq!(config.auto_open_seconds, 5);
    }

    #[test]
    fn test_load_from_dir_finds_codedrop_json() {
        let dir = std::env::temp_dir().join("test_codedrop_dir");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("codedrop.json"), r#"{"downloadDir": "pdfs"}"#).unwrap();

        let config = Config::load_from_dir(&dir).unwrap();
        assert_eq!(config.download_dir, "pdfs");

        std::fs::remove_file(dir.join("codedrop.json")).ok();
        std::fs::remove_dir(&dir).ok();
    }

    #[test]
    fn test_validation_rejects_zero_countdown() {
        let config = Config {
            auto_open_seconds: 0,
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("autoOpenSeconds"));
    }

    #[test]
    fn test_validation_rejects_bad_urls() {
        let config = Config {
            api_base_url: "ftp://example.com".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            app_url: "localhost".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_block_timeout() {
        let mut config = Config::default();
        config.viewer.block_timeout_ms = 0;
        tokio_test::assert_err!(config.validate());
    }

    #[test]
    fn test_validation_rejects_empty_download_dir() {
        let config = Config {
            download_dir: "  ".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_config_passes() {
        tokio_test::assert_ok!(Config::default().validate());
    }
}
