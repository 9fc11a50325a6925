//! Typed configuration from environment variables or a TOML file.
//!
//! Loads once at startup, fails fast if required values are missing or
//! malformed.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// Initial number of processing slots.
    pub processing_window: i64,
    #[serde(default)]
    pub otel_endpoint: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let window = required_var("ADMITQ_PROCESSING_WINDOW")?;
        Ok(Self {
            processing_window: parse_window(&window)?,
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| default_log_level()),
            service_name: std::env::var("OTEL_SERVICE_NAME")
                .unwrap_or_else(|_| default_service_name()),
        })
    }

    /// Load from `path` when one is given, otherwise from the environment.
    ///
    /// An explicit file that cannot be loaded is an error. An incomplete
    /// environment yields `None`, leaving the fallback to the caller.
    pub fn resolve(path: Option<&Path>) -> Result<Option<Self>> {
        match path {
            Some(path) => Self::from_toml_file(path).map(Some),
            None => Ok(Self::from_env().ok()),
        }
    }

    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        if config.processing_window < 0 {
            return Err(Error::Config(format!(
                "processing_window must be non-negative, got {}",
                config.processing_window
            )));
        }
        Ok(config)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "admitq".to_string()
}

fn parse_window(raw: &str) -> Result<i64> {
    let window: i64 = raw.trim().parse().map_err(|_| {
        Error::Config(format!(
            "ADMITQ_PROCESSING_WINDOW must be an integer, got {raw:?}"
        ))
    })?;
    if window < 0 {
        return Err(Error::Config(format!(
            "ADMITQ_PROCESSING_WINDOW must be non-negative, got {window}"
        )));
    }
    Ok(window)
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::Config(format!("required environment variable {name} is not set")))
}
