//! In-memory site configuration cache.
//!
//! TTL: 1 hour by default. Keyed by site id. Reads within the TTL may be stale;
//! concurrent refreshes race benignly and the last writer wins.

use super::providers::{bounded, SiteConfig, SiteConfigProvider};
use crate::error::InferenceError;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

pub const SITE_CONFIG_TTL: Duration = Duration::from_secs(3600);

#[derive(Clone)]
struct CacheEntry {
    config: SiteConfig,
    timestamp: i64,
}

/// Site configurations owned by a single resolver.
pub struct SiteConfigCache {
    ttl_ms: i64,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl Default for SiteConfigCache {
    fn default() -> Self {
        Self::with_ttl(SITE_CONFIG_TTL)
    }
}

impl SiteConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl_ms: ttl.as_millis() as i64,
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn now_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    /// Look up a site. Returns None if missing or expired.
    pub async fn get(&self, site_id: &str) -> Option<SiteConfig> {
        self.get_at(site_id, Self::now_ms()).await
    }

    async fn get_at(&self, site_id: &str, now_ms: i64) -> Option<SiteConfig> {
        let entries = self.entries.read().await;
        let entry = entries.get(site_id)?;
        if now_ms - entry.timestamp > self.ttl_ms {
            return None; // expired
        }
        Some(entry.config.clone())
    }

    pub async fn put(&self, site_id: &str, config: SiteConfig) {
        self.put_at(site_id, config, Self::now_ms()).await;
    }

    async fn put_at(&self, site_id: &str, config: SiteConfig, timestamp: i64) {
        let mut entries = self.entries.write().await;
        entries.insert(site_id.to_string(), CacheEntry { config, timestamp });
    }

    pub async fn invalidate(&self, site_id: &str) {
        self.entries.write().await.remove(site_id);
    }

    /// Cached config for `site_id`, fetching through `provider` on a miss or expiry.
    pub async fn get_or_fetch(
        &self,
        site_id: &str,
        provider: &dyn SiteConfigProvider,
        timeout: Duration,
    ) -> Result<SiteConfig, InferenceError> {
        if let Some(config) = self.get(site_id).await {
            return Ok(config);
        }

        debug!(site = %site_id, "Site config cache miss");
        let config = bounded(timeout, "site config fetch", provider.fetch_site_config(site_id)).await?;
        self.put(site_id, config.clone()).await;
        Ok(config)
    }

    /// Number of entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
