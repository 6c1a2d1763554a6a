//! Конфигурация консоли менеджера: TOML-файл плюс переопределения из окружения.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const ENV_BACKEND_URL: &str = "MINIAPP_BACKEND_URL";
pub const ENV_INIT_DATA: &str = "TELEGRAM_INIT_DATA";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Не удалось прочитать конфиг {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Некорректный TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Некорректный backend_url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("backend_url не задан")]
    MissingBackendUrl,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_ticket_poll_secs")]
    pub ticket_poll_secs: u64,
    /// Пускать без init data (локальная разработка).
    #[serde(default = "default_dev_fallback")]
    pub dev_fallback: bool,
    #[serde(default)]
    pub init_data: Option<String>,
    #[serde(default = "default_manager_name")]
    pub manager_name: String,
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_ticket_poll_secs() -> u64 {
    30
}

fn default_dev_fallback() -> bool {
    true
}

fn default_manager_name() -> String {
    "Менеджер".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
            ticket_poll_secs: default_ticket_poll_secs(),
            dev_fallback: default_dev_fallback(),
            init_data: None,
            manager_name: default_manager_name(),
        }
    }
}

impl Config {
    /// Читает файл, если он есть; отсутствующий файл не ошибка, если
    /// backend_url пришёл из окружения.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = match std::fs::read_to_string(path) {
            Ok(raw) => Self::parse(&raw)?,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Config file not found, using defaults");
                Self::default()
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        config.apply_env(
            std::env::var(ENV_BACKEND_URL).ok(),
            std::env::var(ENV_INIT_DATA).ok(),
        );
        config.backend_url()?;
        Ok(config)
    }

    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    fn apply_env(&mut self, backend_url: Option<String>, init_data: Option<String>) {
        if let Some(url) = backend_url.filter(|value| !value.trim().is_empty()) {
            self.backend_url = url;
        }
        if let Some(raw) = init_data {
            self.init_data = Some(raw);
        }
    }

    pub fn backend_url(&self) -> Result<Url, ConfigError> {
        let raw = self.backend_url.trim();
        if raw.is_empty() {
            return Err(ConfigError::MissingBackendUrl);
        }
        Url::parse(raw).map_err(|source| ConfigError::InvalidUrl {
            url: raw.to_string(),
            source,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn ticket_poll_interval(&self) -> Duration {
        Duration::from_secs(self.ticket_poll_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config = Config::parse(r#"backend_url = "https://support.example.com""#)
            .expect("valid config");
        assert_eq!(config.request_timeout_secs, 15);
        assert_eq!(config.ticket_poll_secs, 30);
        assert!(config.dev_fallback);
        assert_eq!(config.manager_name, "Менеджер");
        assert!(config.init_data.is_none());
        assert_eq!(
            config.backend_url().expect("url").as_str(),
            "https://support.example.com/"
        );
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = Config::parse(
            r#"
            backend_url = "https://old.example.com"
            dev_fallback = false
            "#,
        )
        .expect("valid config");
        config.apply_env(
            Some("https://new.example.com".to_string()),
            Some("user=%7B%22id%22%3A1%7D&hash=abc".to_string()),
        );
        assert_eq!(config.backend_url, "https://new.example.com");
        assert_eq!(
            config.init_data.as_deref(),
            Some("user=%7B%22id%22%3A1%7D&hash=abc")
        );
        assert!(!config.dev_fallback);
    }

    #[test]
    fn blank_env_url_keeps_file_value() {
        let mut config = Config::parse(r#"backend_url = "https://old.example.com""#)
            .expect("valid config");
        config.apply_env(Some("  ".to_string()), None);
        assert_eq!(config.backend_url, "https://old.example.com");
    }

    #[test]
    fn missing_or_invalid_url_is_rejected() {
        let config = Config::default();
        assert!(matches!(
            config.backend_url(),
            Err(ConfigError::MissingBackendUrl)
        ));

        let config = Config {
            backend_url: "not a url".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            config.backend_url(),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn zero_intervals_are_clamped() {
        let config = Config {
            request_timeout_secs: 0,
            ticket_poll_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.request_timeout(), Duration::from_secs(1));
        assert_eq!(config.ticket_poll_interval(), Duration::from_secs(1));
    }
}
