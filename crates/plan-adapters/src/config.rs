//! Configuración de servicios externos leída de variables de entorno.
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub generator_url: String,
    pub analysis_url: String,
    pub prompt_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub storage_base_url: String,
    pub storage_signing_secret: String,
    pub storage_url_ttl: Duration,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v.trim().trim_end_matches('/').to_string()),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn secs_or(name: &'static str, default: u64) -> Result<Duration, ConfigError> {
    match std::env::var(name) {
        Ok(v) => v.trim()
                  .parse::<u64>()
                  .ok()
                  .filter(|n| *n > 0)
                  .map(Duration::from_secs)
                  .ok_or_else(|| ConfigError::Invalid { name, value: v.clone() }),
        Err(_) => Ok(Duration::from_secs(default)),
    }
}

impl ServiceConfig {
    /// Lee `GENERATOR_URL`, `ANALYSIS_URL`, `PROMPT_URL`, `SERVICE_API_KEY`,
    /// `SERVICE_TIMEOUT_SECS` (60), `STORAGE_BASE_URL`,
    /// `STORAGE_SIGNING_SECRET` y `STORAGE_URL_TTL_SECS` (3600).
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self { generator_url: required("GENERATOR_URL")?,
                  analysis_url: required("ANALYSIS_URL")?,
                  prompt_url: required("PROMPT_URL")?,
                  api_key: std::env::var("SERVICE_API_KEY").ok().filter(|k| !k.trim().is_empty()),
                  timeout: secs_or("SERVICE_TIMEOUT_SECS", 60)?,
                  storage_base_url: required("STORAGE_BASE_URL")?,
                  storage_signing_secret: required("STORAGE_SIGNING_SECRET")?,
                  storage_url_ttl: secs_or("STORAGE_URL_TTL_SECS", 3600)? })
    }
}
