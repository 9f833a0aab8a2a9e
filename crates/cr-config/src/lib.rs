//! # cr-config
//!
//! Layered configuration: built-in defaults, then an optional
//! `chip-ranking.toml`, then `CHIP_*` environment variables (a `.env` file
//! is loaded into the environment first).

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use config::{Config, Environment, File};
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_CONFIG_FILE: &str = "chip-ranking.toml";
pub const ENV_PREFIX: &str = "CHIP";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Socket address the HTTP server binds to
    pub bind_addr: String,
    pub database_url: String,
    /// Filesystem root for the local media store; buckets are subdirectories
    pub upload_root: PathBuf,
    /// URL prefix under which `upload_root` is served
    pub public_url_prefix: String,
    pub image_bucket: String,
    pub session_ttl_secs: u64,
    /// Upper bound for every backend call
    pub request_timeout_ms: u64,
    /// Comments shown per chip
    pub comment_limit: usize,
    pub log_format: LogFormat,
    pub max_upload_bytes: usize,
    /// Mixed into stored session keys so raw tokens never sit in memory
    pub session_salt: SecretString,
}

impl AppConfig {
    /// Reads `.env`, then the default file and environment.
    pub fn load() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "loaded .env"),
            Err(_) => debug!("no .env file found"),
        }
        Self::load_from(Some(DEFAULT_CONFIG_FILE), None)
    }

    /// `env` replaces the process environment when given (used by tests).
    pub fn load_from(
        file: Option<&str>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("bind_addr", "127.0.0.1:8080")?
            .set_default("database_url", "sqlite:chip_ranking.db?mode=rwc")?
            .set_default("upload_root", "./data/uploads")?
            .set_default("public_url_prefix", "/static/uploads")?
            .set_default("image_bucket", "chip-images")?
            .set_default("session_ttl_secs", 7 * 24 * 3600_i64)?
            .set_default("request_timeout_ms", 10_000_i64)?
            .set_default("comment_limit", 3_i64)?
            .set_default("log_format", "text")?
            .set_default("max_upload_bytes", 10 * 1024 * 1024_i64)?
            .set_default("session_salt", "change-me")?;

        if let Some(path) = file {
            builder = builder.add_source(File::with_name(path).required(false));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .source(env),
        );

        let cfg: AppConfig = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        info!(bind_addr = %cfg.bind_addr, bucket = %cfg.image_bucket, "configuration loaded");
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.image_bucket.trim().is_empty() {
            return Err(ConfigError::Invalid("image_bucket must not be empty".into()));
        }
        if self.comment_limit == 0 {
            return Err(ConfigError::Invalid("comment_limit must be at least 1".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid("request_timeout_ms must be positive".into()));
        }
        if self.session_ttl_secs == 0 {
            return Err(ConfigError::Invalid("session_ttl_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn env(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn defaults_load() {
        let cfg = AppConfig::load_from(None, env(&[])).unwrap();
        assert_eq!(cfg.bind_addr, "127.0.0.1:8080");
        assert_eq!(cfg.comment_limit, 3);
        assert_eq!(cfg.log_format, LogFormat::Text);
        assert_eq!(cfg.request_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.session_salt.expose_secret(), "change-me");
    }

    #[test]
    fn environment_overrides_defaults() {
        let cfg = AppConfig::load_from(
            None,
            env(&[
                ("CHIP_BIND_ADDR", "0.0.0.0:9000"),
                ("CHIP_COMMENT_LIMIT", "5"),
                ("CHIP_LOG_FORMAT", "json"),
                ("CHIP_SESSION_SALT", "pepper"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:9000");
        assert_eq!(cfg.comment_limit, 5);
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert_eq!(cfg.session_salt.expose_secret(), "pepper");
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = AppConfig::load_from(None, env(&[("CHIP_COMMENT_LIMIT", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
