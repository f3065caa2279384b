//! Remote object-store tier (Supabase Storage over plain HTTP).
//!
//! Artifact file names double as object keys. Uploads are upserts, so
//! re-running a day's scrape is idempotent at this tier.

use crate::config::RemoteConfig;
use crate::error::{Result, ScraperError};

pub struct RemoteStore {
    http: reqwest::Client,
    config: RemoteConfig,
}

impl RemoteStore {
    pub fn new(config: RemoteConfig) -> Self {
        Self { http: reqwest::Client::new(), config }
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.bucket,
            key
        )
    }

    pub async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let resp = self
            .http
            .put(self.object_url(key))
            .header("Authorization", format!("Bearer {}", self.config.service_role_key))
            .header("apikey", self.config.service_role_key.clone())
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .query(&[("upsert", "true")])
            .body(bytes)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ScraperError::Remote {
                message: format!("upload of '{}' failed: {} - {}", key, status, body),
            });
        }
        Ok(())
    }

    /// Fetches an object; a 404 is an absent artifact, not an error.
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let resp = self
            .http
            .get(self.object_url(key))
            .header("Authorization", format!("Bearer {}", self.config.service_role_key))
            .header("apikey", self.config.service_role_key.clone())
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ScraperError::Remote {
                message: format!("download of '{}' failed: {} - {}", key, status, body),
            });
        }
        Ok(Some(resp.bytes().await?.to_vec()))
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }
}
