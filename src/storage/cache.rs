//! Shared cache tier (Redis, no expiry).
//!
//! Lookups distinguish an empty cache from an unreachable one; the caller
//! decides what to do with each, nothing is silently swallowed here.

use redis::AsyncCommands;
use tracing::debug;

use crate::error::{Result, ScraperError};

#[derive(Debug)]
pub enum CacheLookup {
    Hit(String),
    Miss,
    Unavailable(String),
}

pub struct RedisCache {
    client: redis::Client,
}

impl RedisCache {
    pub fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| ScraperError::Cache {
            message: format!("invalid redis url: {}", e),
        })?;
        Ok(Self { client })
    }

    pub async fn get(&self, key: &str) -> CacheLookup {
        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(e) => return CacheLookup::Unavailable(e.to_string()),
        };
        match conn.get::<_, Option<String>>(key).await {
            Ok(Some(value)) => {
                debug!("cache hit for '{}' ({} bytes)", key, value.len());
                CacheLookup::Hit(value)
            }
            Ok(None) => CacheLookup::Miss,
            Err(e) => CacheLookup::Unavailable(e.to_string()),
        }
    }

    /// Stores without expiry; the cache holds the latest dataset until the
    /// next successful run replaces it.
    pub async fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| ScraperError::Cache { message: e.to_string() })?;
        conn.set::<_, _, ()>(key, value)
            .await
            .map_err(|e| ScraperError::Cache { message: e.to_string() })?;
        Ok(())
    }

    /// Connectivity check for the status report.
    pub async fn ping(&self) -> bool {
        match self.client.get_multiplexed_async_connection().await {
            Ok(mut conn) => redis::cmd("PING")
                .query_async::<_, String>(&mut conn)
                .await
                .is_ok(),
            Err(_) => false,
        }
    }
}
