//! Runtime configuration, read from the environment (after `.env`) and
//! overridable from the command line.

use crate::error::{PipelineError, Result};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/ads.db";
pub const DEFAULT_MODEL: &str = "gpt-4";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub database_url: String,
    /// No key means no model call; every answer comes from a template
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub llm_timeout: Duration,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
    pub query_timeout: Duration,
    /// Row cap for templates that list rows
    pub row_limit: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            llm_timeout: Duration::from_secs(5),
            db_max_connections: 5,
            db_acquire_timeout: Duration::from_secs(10),
            query_timeout: Duration::from_secs(15),
            row_limit: 50,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset or blank values take the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        Ok(Self {
            database_url: get("ADSQL_DATABASE_URL").unwrap_or(defaults.database_url),
            api_key: get("OPENAI_API_KEY"),
            model: get("OPENAI_MODEL").unwrap_or(defaults.model),
            base_url: get("OPENAI_BASE_URL").unwrap_or(defaults.base_url),
            llm_timeout: secs(&get, "ADSQL_LLM_TIMEOUT_SECS", defaults.llm_timeout)?,
            db_max_connections: number(&get, "ADSQL_DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            db_acquire_timeout: secs(&get, "ADSQL_DB_ACQUIRE_TIMEOUT_SECS", defaults.db_acquire_timeout)?,
            query_timeout: secs(&get, "ADSQL_QUERY_TIMEOUT_SECS", defaults.query_timeout)?,
            row_limit: number(&get, "ADSQL_ROW_LIMIT", defaults.row_limit)?,
        })
    }
}

fn number<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T> {
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| PipelineError::Config(format!("{} must be a number, got '{}'", key, raw))),
    }
}

fn secs(get: &impl Fn(&str) -> Option<String>, key: &str, default: Duration) -> Result<Duration> {
    number(get, key, default.as_secs()).map(Duration::from_secs)
}
