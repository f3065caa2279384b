//! Tiered persistence: local durable files, shared Redis cache and a remote
//! object store, with a defined read-fallback order.
//!
//! The local tier is primary — its failures abort a write. The cache and
//! remote tiers are best-effort mirrors: their failures are logged and
//! swallowed so a flaky Redis or bucket never fails an acquisition run.

pub mod cache;
pub mod csv;
pub mod local;
pub mod remote;

use tracing::{info, warn};

use crate::config::Config;
use crate::domain::{Metadata, RawTable, ServeSource};
use crate::error::Result;
use cache::{CacheLookup, RedisCache};
use local::LocalStore;
use remote::RemoteStore;

/// Artifact names, shared across all three tiers (file names, object keys
/// and cache keys).
pub const RAW_TABLE_FILE: &str = "acoes_raw.csv";
pub const FILTERED_TABLE_FILE: &str = "acoes_filtradas.csv";
pub const METADATA_FILE: &str = "metadata.json";
pub const CACHE_FILTERED_KEY: &str = "acoes_filtradas";
pub const CACHE_METADATA_KEY: &str = "metadata";

const UTF8_BOM: &str = "\u{feff}";

/// Sole reader/writer gateway for all persisted artifacts.
pub struct StorageManager {
    local: LocalStore,
    cache: Option<RedisCache>,
    remote: Option<RemoteStore>,
}

/// Outcome of the one-shot cache warm-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmOutcome {
    CacheDisabled,
    AlreadyWarm,
    Populated,
    NothingToLoad,
}

impl StorageManager {
    pub fn from_config(config: &Config) -> Result<Self> {
        let cache = match &config.redis_url {
            Some(url) => Some(RedisCache::connect(url)?),
            None => None,
        };
        let remote = config.remote.clone().map(RemoteStore::new);
        Ok(Self { local: LocalStore::new(&config.media_dir)?, cache, remote })
    }

    /// Local tier only; used by tests and minimal deployments.
    pub fn local_only<P: Into<std::path::PathBuf>>(dir: P) -> Result<Self> {
        Ok(Self { local: LocalStore::new(dir)?, cache: None, remote: None })
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache.is_some()
    }

    pub fn remote_enabled(&self) -> bool {
        self.remote.is_some()
    }

    pub fn local(&self) -> &LocalStore {
        &self.local
    }

    pub async fn cache_ping(&self) -> Option<bool> {
        match &self.cache {
            Some(cache) => Some(cache.ping().await),
            None => None,
        }
    }

    /// Writes all three artifacts. Local writes happen first and in a fixed
    /// order (raw, filtered, metadata): a reader that sees fresh metadata
    /// can trust the data files are at least as fresh. Mirror failures are
    /// logged and swallowed.
    pub async fn write_all(
        &self,
        raw: &RawTable,
        filtered: &RawTable,
        meta: &Metadata,
    ) -> Result<()> {
        self.local.write_table(RAW_TABLE_FILE, raw)?;
        self.local.write_table(FILTERED_TABLE_FILE, filtered)?;
        self.local.write_metadata(METADATA_FILE, meta)?;

        self.mirror_to_cache(Some(filtered), meta).await;
        self.mirror_to_remote(Some((raw, filtered)), meta).await;
        Ok(())
    }

    /// Metadata-only write used after failed runs; never touches the data
    /// artifacts of the last successful scrape.
    pub async fn write_metadata(&self, meta: &Metadata) -> Result<()> {
        self.local.write_metadata(METADATA_FILE, meta)?;
        self.mirror_to_cache(None, meta).await;
        self.mirror_to_remote(None, meta).await;
        Ok(())
    }

    async fn mirror_to_cache(&self, filtered: Option<&RawTable>, meta: &Metadata) {
        let Some(cache) = &self.cache else { return };

        if let Some(table) = filtered {
            match serde_json::to_string(table) {
                Ok(json) => {
                    if let Err(e) = cache.put(CACHE_FILTERED_KEY, &json).await {
                        warn!("cache mirror of filtered table failed: {}", e);
                    }
                }
                Err(e) => warn!("cache mirror: filtered table serialization failed: {}", e),
            }
        }
        match serde_json::to_string(meta) {
            Ok(json) => {
                if let Err(e) = cache.put(CACHE_METADATA_KEY, &json).await {
                    warn!("cache mirror of metadata failed: {}", e);
                }
            }
            Err(e) => warn!("cache mirror: metadata serialization failed: {}", e),
        }
    }

    async fn mirror_to_remote(&self, tables: Option<(&RawTable, &RawTable)>, meta: &Metadata) {
        let Some(remote) = &self.remote else { return };

        if let Some((raw, filtered)) = tables {
            for (key, table) in [(RAW_TABLE_FILE, raw), (FILTERED_TABLE_FILE, filtered)] {
                let mut text = String::from(UTF8_BOM);
                text.push_str(&csv::encode_table(table));
                if let Err(e) = remote.put(key, text.into_bytes(), "text/csv").await {
                    warn!("remote mirror of {} failed: {}", key, e);
                }
            }
        }
        match serde_json::to_string_pretty(meta) {
            Ok(json) => {
                if let Err(e) = remote
                    .put(METADATA_FILE, json.into_bytes(), "application/json")
                    .await
                {
                    warn!("remote mirror of {} failed: {}", METADATA_FILE, e);
                }
            }
            Err(e) => warn!("remote mirror: metadata serialization failed: {}", e),
        }
    }

    /// Serving-path read: first tier with usable data wins. Cache needs both
    /// keys; local and remote serve the filtered-table/metadata file pair.
    pub async fn read(&self) -> (Option<RawTable>, Option<Metadata>, ServeSource) {
        if let Some(cache) = &self.cache {
            match (cache.get(CACHE_FILTERED_KEY).await, cache.get(CACHE_METADATA_KEY).await) {
                (CacheLookup::Hit(table_json), CacheLookup::Hit(meta_json)) => {
                    let table: Option<RawTable> = serde_json::from_str(&table_json).ok();
                    let meta: Option<Metadata> = serde_json::from_str(&meta_json).ok();
                    if let Some(table) = table {
                        return (Some(table), meta, ServeSource::Cache);
                    }
                    warn!("cache held an undecodable table, falling through");
                }
                (CacheLookup::Unavailable(e), _) | (_, CacheLookup::Unavailable(e)) => {
                    warn!("cache unavailable, falling through to local tier: {}", e);
                }
                _ => {}
            }
        }

        match self.local.read_table(FILTERED_TABLE_FILE) {
            Ok(Some(table)) => {
                let meta = self.local.read_metadata(METADATA_FILE).unwrap_or(None);
                return (Some(table), meta, ServeSource::Local);
            }
            Ok(None) => {}
            Err(e) => warn!("local tier read failed: {}", e),
        }

        if let Some(remote) = &self.remote {
            match remote.get(FILTERED_TABLE_FILE).await {
                Ok(Some(bytes)) => {
                    let text = String::from_utf8_lossy(&bytes);
                    if let Some(table) = csv::decode_table(text.trim_start_matches(UTF8_BOM)) {
                        let meta = self.remote_metadata(remote).await;
                        return (Some(table), meta, ServeSource::Remote);
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("remote tier read failed: {}", e),
            }
        }

        (None, None, ServeSource::None)
    }

    async fn remote_metadata(&self, remote: &RemoteStore) -> Option<Metadata> {
        match remote.get(METADATA_FILE).await {
            Ok(Some(bytes)) => serde_json::from_slice(&bytes).ok(),
            Ok(None) => None,
            Err(e) => {
                warn!("remote metadata read failed: {}", e);
                None
            }
        }
    }

    /// Metadata for gating decisions: the local file is authoritative (the
    /// acquisition always writes it), cache and remote are fallbacks.
    pub async fn read_metadata(&self) -> Option<Metadata> {
        match self.local.read_metadata(METADATA_FILE) {
            Ok(Some(meta)) => return Some(meta),
            Ok(None) => {}
            Err(e) => warn!("local metadata read failed: {}", e),
        }

        if let Some(cache) = &self.cache {
            if let CacheLookup::Hit(json) = cache.get(CACHE_METADATA_KEY).await {
                if let Ok(meta) = serde_json::from_str(&json) {
                    return Some(meta);
                }
            }
        }

        if let Some(remote) = &self.remote {
            return self.remote_metadata(remote).await;
        }
        None
    }

    /// One-shot startup warm-up: populate an empty cache from the durable
    /// tiers. Reads local/remote, writes cache, touches nothing else.
    pub async fn warm_cache(&self) -> Result<WarmOutcome> {
        let Some(cache) = &self.cache else {
            return Ok(WarmOutcome::CacheDisabled);
        };

        if let (CacheLookup::Hit(_), CacheLookup::Hit(_)) = (
            cache.get(CACHE_FILTERED_KEY).await,
            cache.get(CACHE_METADATA_KEY).await,
        ) {
            info!("cache already warm");
            return Ok(WarmOutcome::AlreadyWarm);
        }

        // Durable tiers only: local first, then remote.
        let mut table = self.local.read_table(FILTERED_TABLE_FILE)?;
        let mut meta = self.local.read_metadata(METADATA_FILE)?;
        if table.is_none() {
            if let Some(remote) = &self.remote {
                if let Ok(Some(bytes)) = remote.get(FILTERED_TABLE_FILE).await {
                    let text = String::from_utf8_lossy(&bytes);
                    table = csv::decode_table(text.trim_start_matches(UTF8_BOM));
                    if meta.is_none() {
                        meta = self.remote_metadata(remote).await;
                    }
                }
            }
        }

        let Some(table) = table else {
            info!("no durable data found, cache left empty");
            return Ok(WarmOutcome::NothingToLoad);
        };

        cache.put(CACHE_FILTERED_KEY, &serde_json::to_string(&table)?).await?;
        if let Some(meta) = &meta {
            cache.put(CACHE_METADATA_KEY, &serde_json::to_string(meta)?).await?;
        }
        info!("cache populated with {} filtered rows", table.len());
        Ok(WarmOutcome::Populated)
    }
}
