use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub http: HttpConfig,
    pub y2mate: Y2mateConfig,
    pub yt5s: Yt5sConfig,
    pub push: PushConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// `json` or `pretty`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: "json".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout for every outbound HTTP call
    pub timeout_secs: u64,
    /// Upper bound the CLI puts around a whole resolve + fetch
    pub operation_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            operation_timeout_secs: 180,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Y2mateConfig {
    pub base_url: String,
    pub default_locale: String,
}

impl Default for Y2mateConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.y2mate.com".to_string(),
            default_locale: "en".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Yt5sConfig {
    /// Page whose markup carries the search and convert endpoints
    pub home_url: String,
}

impl Default for Yt5sConfig {
    fn default() -> Self {
        Self {
            home_url: "https://yt5s.com/en32".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PushConfig {
    /// How long a queued conversion may wait for its terminal push message
    pub timeout_secs: u64,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self { timeout_secs: 120 }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn get_logging_format(&self) -> &str {
        &self.logging.format
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.http.operation_timeout_secs)
    }

    pub fn push_timeout(&self) -> Duration {
        Duration::from_secs(self.push.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.get_logging_format(), "json");
        assert_eq!(config.y2mate.base_url, "https://www.y2mate.com");
        assert_eq!(config.y2mate.default_locale, "en");
        assert_eq!(config.yt5s.home_url, "https://yt5s.com/en32");
        assert_eq!(config.push_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [logging]
            format = "pretty"

            [push]
            timeout_secs = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.get_logging_format(), "pretty");
        assert_eq!(config.push_timeout(), Duration::from_secs(5));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.y2mate.default_locale, "en");
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[y2mate]\nbase_url = \"http://127.0.0.1:9999\"\ndefault_locale = \"es\""
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.y2mate.base_url, "http://127.0.0.1:9999");
        assert_eq!(config.y2mate.default_locale, "es");
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_file("/nonexistent/tubegrab.toml").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_invalid_toml() {
        let err = Config::from_toml("[push]\ntimeout_secs = \"soon\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
