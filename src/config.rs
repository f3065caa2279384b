use std::env;
use std::str::FromStr;

use crate::error::{Result, ScraperError};

pub const DEFAULT_SOURCE_URL: &str = "https://www.fundamentus.com.br/resultado.php";
pub const DEFAULT_TABLE_ID: &str = "resultado";

/// Runtime configuration, sourced from the environment (`.env` is loaded by main).
#[derive(Debug, Clone)]
pub struct Config {
    pub source_url: String,
    pub table_element_id: String,
    pub media_dir: String,

    // Probe phase
    pub probe_max_attempts: u32,
    pub probe_base_backoff_secs: f64,
    pub probe_max_backoff_secs: f64,
    pub probe_jitter_secs: f64,

    // Block cooldown
    pub block_base_hours: u64,
    pub block_max_hours: u64,

    // Browser retrieval phase
    pub browser_wait_secs: u64,

    /// Stricter screening mode: adds upper bounds on margin, EV/EBIT and P/L.
    pub strict_filters: bool,

    /// Absent means the cache tier is disabled.
    pub redis_url: Option<String>,
    /// Absent means the remote tier is disabled; not an error.
    pub remote: Option<RemoteConfig>,
}

/// Supabase Storage connection details for the remote object tier.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    pub service_role_key: String,
    pub bucket: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            source_url: env_or("FUNDAMENTUS_URL", DEFAULT_SOURCE_URL.to_string())?,
            table_element_id: env_or("FUNDAMENTUS_TABLE_ID", DEFAULT_TABLE_ID.to_string())?,
            media_dir: env_or("SCRAPER_MEDIA_DIR", "media".to_string())?,
            probe_max_attempts: env_or("PROBE_MAX_ATTEMPTS", 4)?,
            probe_base_backoff_secs: env_or("PROBE_BASE_BACKOFF_SECS", 1.5)?,
            probe_max_backoff_secs: env_or("PROBE_MAX_BACKOFF_SECS", 60.0)?,
            probe_jitter_secs: env_or("PROBE_JITTER_SECS", 1.5)?,
            block_base_hours: env_or("BLOCK_BASE_HOURS", 2)?,
            block_max_hours: env_or("BLOCK_MAX_HOURS", 168)?,
            browser_wait_secs: env_or("BROWSER_WAIT_SECS", 20)?,
            strict_filters: env_flag("SCRAPER_STRICT_FILTERS"),
            redis_url: env::var("REDIS_URL").ok(),
            remote: RemoteConfig::from_env(),
        })
    }
}

impl RemoteConfig {
    /// Returns None (tier disabled) unless the full credential set is present.
    pub fn from_env() -> Option<Self> {
        let base_url = match env::var("SUPABASE_URL") {
            Ok(u) => u,
            Err(_) => {
                let project_ref = env::var("SUPABASE_PROJECT_REF").ok()?;
                format!("https://{}.supabase.co", project_ref)
            }
        };
        let service_role_key = env::var("SUPABASE_SERVICE_ROLE_KEY").ok()?;
        let bucket = env::var("SUPABASE_BUCKET").ok()?;
        Some(Self { base_url, service_role_key, bucket })
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ScraperError::Config(format!("invalid value for {}: '{}'", key, raw))),
        Err(_) => Ok(default),
    }
}

fn env_flag(key: &str) -> bool {
    env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
