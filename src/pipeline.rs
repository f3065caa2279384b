//! Pipeline orchestrator: the single "acquire or decline" entry point the
//! external scheduler calls, plus the read-only serve path.

use chrono::{DateTime, Utc};
use chrono_tz::America::Sao_Paulo;
use tracing::{error, info, warn};

use crate::block_state::{self, BlockState};
use crate::config::Config;
use crate::domain::{AcquisitionOutcome, Metadata, ScrapeStatus, ServedTable};
use crate::fetch::{FetchOutcome, Fetcher};
use crate::screener::{self, FilterCriteria};
use crate::storage::{StorageManager, WarmOutcome};

pub struct Pipeline {
    config: Config,
    fetcher: Fetcher,
    storage: StorageManager,
    criteria: FilterCriteria,
}

impl Pipeline {
    pub fn new(config: Config) -> crate::error::Result<Self> {
        let storage = StorageManager::from_config(&config)?;
        let fetcher = Fetcher::new(config.clone());
        let criteria = if config.strict_filters {
            FilterCriteria::strict()
        } else {
            FilterCriteria::default()
        };
        Ok(Self { config, fetcher, storage, criteria })
    }

    /// Constructor with explicit collaborators, used by tests.
    pub fn with_parts(config: Config, fetcher: Fetcher, storage: StorageManager) -> Self {
        let criteria = if config.strict_filters {
            FilterCriteria::strict()
        } else {
            FilterCriteria::default()
        };
        Self { config, fetcher, storage, criteria }
    }

    /// One acquisition run: gate on the block cooldown and daily freshness,
    /// fetch, screen, persist. `force` bypasses the freshness gate only —
    /// the block cooldown is always respected.
    pub async fn run_acquisition(&self, force: bool) -> crate::error::Result<AcquisitionOutcome> {
        let now = Utc::now();
        let prior = self.storage.read_metadata().await;

        let state = BlockState::from_metadata(prior.as_ref());
        if let BlockState::Cooling { next_allowed_at, forbidden_count } = state {
            if !state.may_attempt(now) {
                info!(
                    "source blocked (forbidden_count={}), cooling down until {}",
                    forbidden_count, next_allowed_at
                );
                return Ok(AcquisitionOutcome::SkippedCooling { until: next_allowed_at });
            }
        }

        if !force && scraped_today(prior.as_ref(), now) {
            info!("already scraped today (source-site timezone), skipping");
            return Ok(AcquisitionOutcome::SkippedFresh);
        }

        let mut meta = prior.unwrap_or_default();
        meta.last_attempt = Some(now);
        meta.source_url = Some(self.config.source_url.clone());

        match self.fetcher.fetch(None).await {
            FetchOutcome::Table(raw) => {
                let ranked = screener::rank(&raw, &self.criteria);
                let filtered = screener::filtered_table(&raw, &ranked);

                block_state::clear_block(&mut meta);
                meta.status = ScrapeStatus::Success;
                meta.http_status = Some(200);
                meta.last_scrape = Some(Utc::now());
                meta.rows_raw = Some(raw.len());
                meta.rows_filtered = Some(filtered.len());
                meta.error = None;

                if let Err(e) = self.storage.write_all(&raw, &filtered, &meta).await {
                    // Local-tier failure threatens the read path's last
                    // resort; surface it as the run's status.
                    error!("local persistence failed: {}", e);
                    let detail = format!("persistence failed: {}", e);
                    meta.status = ScrapeStatus::Error;
                    meta.error = Some(detail.clone());
                    if let Err(e2) = self.storage.write_metadata(&meta).await {
                        error!("failed to record persistence failure: {}", e2);
                    }
                    return Ok(AcquisitionOutcome::Error { detail });
                }

                info!(
                    "scrape complete: {} raw rows, {} after screening",
                    raw.len(),
                    filtered.len()
                );
                Ok(AcquisitionOutcome::Success {
                    rows_raw: raw.len(),
                    rows_filtered: filtered.len(),
                })
            }
            FetchOutcome::Blocked { http_status } => {
                block_state::register_block(&mut meta, now, &self.config);
                meta.http_status = Some(http_status);
                meta.error = None;
                let until = meta.next_allowed_attempt.unwrap_or(now);
                warn!(
                    "source is blocking (status {}), cooldown until {} (forbidden_count={})",
                    http_status, until, meta.forbidden_count
                );
                if let Err(e) = self.storage.write_metadata(&meta).await {
                    error!("failed to persist forbidden metadata: {}", e);
                }
                Ok(AcquisitionOutcome::Blocked { http_status: Some(http_status), until })
            }
            FetchOutcome::Failed { detail } => {
                // Transient or parse failure: record it, leave the block
                // state and all prior good data untouched.
                meta.status = ScrapeStatus::Error;
                meta.http_status = None;
                meta.error = Some(detail.clone());
                warn!("acquisition failed: {}", detail);
                if let Err(e) = self.storage.write_metadata(&meta).await {
                    error!("failed to persist error metadata: {}", e);
                }
                Ok(AcquisitionOutcome::Error { detail })
            }
        }
    }

    /// Read-only serve path: nearest tier with data, annotated with the
    /// freshness timestamp and whether the source is currently blocked.
    /// Never fails; an empty system yields an explicit no-data result.
    pub async fn serve(&self) -> ServedTable {
        let (table, metadata, source) = self.storage.read().await;
        let state = BlockState::from_metadata(metadata.as_ref());
        let blocked = !state.may_attempt(Utc::now());
        if blocked {
            info!("serving from {} tier; source currently blocked", source);
        }
        ServedTable { table, metadata, source, blocked }
    }

    /// One-shot startup task: populate an empty cache from durable tiers.
    pub async fn warm_cache(&self) -> crate::error::Result<WarmOutcome> {
        self.storage.warm_cache().await
    }

    pub fn storage(&self) -> &StorageManager {
        &self.storage
    }
}

/// True when the last successful scrape already falls on the current
/// calendar day in the source site's timezone (America/Sao_Paulo).
fn scraped_today(meta: Option<&Metadata>, now: DateTime<Utc>) -> bool {
    let Some(last) = meta.and_then(|m| m.last_scrape) else {
        return false;
    };
    last.with_timezone(&Sao_Paulo).date_naive() >= now.with_timezone(&Sao_Paulo).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn freshness_is_judged_in_sao_paulo_time() {
        // 01:00 UTC is still the previous day in São Paulo (UTC-3).
        let scraped = Utc::now() - Duration::hours(30);
        let meta = Metadata { last_scrape: Some(scraped), ..Default::default() };
        assert!(!scraped_today(Some(&meta), Utc::now()));

        let meta_now = Metadata { last_scrape: Some(Utc::now()), ..Default::default() };
        assert!(scraped_today(Some(&meta_now), Utc::now()));
    }

    #[test]
    fn missing_metadata_is_never_fresh() {
        assert!(!scraped_today(None, Utc::now()));
    }
}
