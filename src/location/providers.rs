//! Collaborator interfaces: site settings service and gazetteer reference store.
//!
//! Every call the resolver makes through these traits is wrapped in [`bounded`],
//! so a stalled dependency surfaces as a `StoreError` instead of hanging.

use super::gazetteer::GazetteerEntry;
use super::types::BoundingBox;
use crate::error::{InferenceError, StoreError};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = "location-inference/0.1";

/// Run a store call with an upper bound on its duration.
pub async fn bounded<T, E, F>(timeout: Duration, operation: &str, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<StoreError>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout {
            operation: operation.to_string(),
            after_ms: timeout.as_millis() as u64,
        }
        .into()),
    }
}

// ─── Site configuration ─────────────────────────────────────────

/// Per-tenant settings as delivered by the settings service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    #[serde(default)]
    pub supported_languages: Option<Vec<String>>,
    /// Handle passed to the [`ReferenceStore`] on every gazetteer query.
    #[serde(default)]
    pub features_connection_string: Option<String>,
    #[serde(default, deserialize_with = "bbox_or_none")]
    pub target_bbox: Option<BoundingBox>,
}

/// A `SiteConfig` with every required field present.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteContext {
    pub supported_languages: Vec<String>,
    pub reference_store: String,
    pub bounding_box: Option<BoundingBox>,
}

impl SiteConfig {
    pub fn new(supported_languages: &[&str], features_connection_string: &str) -> Self {
        Self {
            supported_languages: Some(supported_languages.iter().map(|l| l.to_string()).collect()),
            features_connection_string: Some(features_connection_string.to_string()),
            target_bbox: None,
        }
    }

    /// Check the required fields and return the validated view.
    pub fn require(&self) -> Result<SiteContext, InferenceError> {
        let languages = self
            .supported_languages
            .as_ref()
            .filter(|langs| !langs.is_empty());
        let handle = self
            .features_connection_string
            .as_ref()
            .filter(|h| !h.is_empty());

        match (languages, handle) {
            (Some(langs), Some(handle)) => Ok(SiteContext {
                supported_languages: langs.clone(),
                reference_store: handle.clone(),
                bounding_box: self.target_bbox,
            }),
            (None, _) => Err(InferenceError::configuration(
                "supportedLanguages is undefined for this site",
            )),
            (_, None) => Err(InferenceError::configuration(
                "featuresConnectionString is undefined for this site",
            )),
        }
    }
}

/// The settings service sends `[]` for sites without a target box.
fn bbox_or_none<'de, D: Deserializer<'de>>(d: D) -> Result<Option<BoundingBox>, D::Error> {
    let raw: Option<Vec<f64>> = Option::deserialize(d)?;
    Ok(match raw.as_deref() {
        Some([west, south, east, north]) => Some(BoundingBox(*west, *south, *east, *north)),
        _ => None,
    })
}

#[async_trait]
pub trait SiteConfigProvider: Send + Sync {
    async fn fetch_site_config(&self, site_id: &str) -> Result<SiteConfig, InferenceError>;
}

/// Fixed configurations, keyed by site id.
#[derive(Debug, Clone, Default)]
pub struct StaticSiteConfigProvider {
    sites: HashMap<String, SiteConfig>,
}

impl StaticSiteConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_site(mut self, site_id: &str, config: SiteConfig) -> Self {
        self.sites.insert(site_id.to_string(), config);
        self
    }
}

#[async_trait]
impl SiteConfigProvider for StaticSiteConfigProvider {
    async fn fetch_site_config(&self, site_id: &str) -> Result<SiteConfig, InferenceError> {
        self.sites
            .get(site_id)
            .cloned()
            .ok_or_else(|| missing_site(site_id))
    }
}

fn missing_site(site_id: &str) -> InferenceError {
    InferenceError::configuration(format!("site [{}] does not exist", site_id))
}

const SITE_QUERY: &str = "fragment SiteDefinitionView on SiteCollection {
    sites {
        properties {
            featuresConnectionString
            supportedLanguages
            targetBbox
        }
    }
}
query Sites($siteId: String) {
    siteDefinition: sites(siteId: $siteId) {
        ...SiteDefinitionView
    }
}";

#[derive(Deserialize)]
struct SettingsResponse {
    #[serde(default)]
    data: Option<SettingsData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsData {
    #[serde(default)]
    site_definition: Option<SiteCollection>,
}

#[derive(Deserialize)]
struct SiteCollection {
    #[serde(default)]
    sites: Vec<SiteEntry>,
}

#[derive(Deserialize)]
struct SiteEntry {
    #[serde(default)]
    properties: Option<SiteConfig>,
}

/// GraphQL client for the settings service (`{host}/api/settings`).
#[derive(Debug, Clone)]
pub struct HttpSiteConfigProvider {
    host: String,
    timeout: Duration,
}

impl HttpSiteConfigProvider {
    pub fn new(host: impl Into<String>, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            timeout,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/settings", self.host.trim_end_matches('/'))
    }
}

#[async_trait]
impl SiteConfigProvider for HttpSiteConfigProvider {
    async fn fetch_site_config(&self, site_id: &str) -> Result<SiteConfig, InferenceError> {
        let url = self.endpoint();
        let body = json!({ "query": SITE_QUERY, "variables": { "siteId": site_id } });
        let timeout = self.timeout;
        debug!(site = %site_id, url = %url, "Loading site settings from settings service");

        let response = tokio::task::spawn_blocking(move || post_settings(&url, body, timeout))
            .await
            .map_err(|e| StoreError::Unavailable(format!("settings request task failed: {}", e)))??;

        site_from_response(site_id, response)
    }
}

fn post_settings(
    url: &str,
    body: serde_json::Value,
    timeout: Duration,
) -> Result<SettingsResponse, StoreError> {
    let response = ureq::post(url)
        .set("User-Agent", USER_AGENT)
        .timeout(timeout)
        .send_json(body)
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

    response
        .into_json()
        .map_err(|e| StoreError::Malformed(e.to_string()))
}

/// A response without `data.siteDefinition` is a failed query; an empty site
/// list or a site without properties means the site does not exist.
fn site_from_response(site_id: &str, response: SettingsResponse) -> Result<SiteConfig, InferenceError> {
    let Some(collection) = response.data.and_then(|d| d.site_definition) else {
        let reason = if response.errors.is_empty() {
            "settings response has no siteDefinition".to_string()
        } else {
            response
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ")
        };
        return Err(StoreError::Malformed(format!("site [{}]: {}", site_id, reason)).into());
    };

    collection
        .sites
        .into_iter()
        .next()
        .and_then(|s| s.properties)
        .ok_or_else(|| missing_site(site_id))
}

// ─── Reference store ────────────────────────────────────────────

/// Source of gazetteer rows.
///
/// `handle` is the tenant's `featuresConnectionString`; `name_columns` are the
/// per-language name columns to project. Implementations return one row per
/// distinct `(names..., alternatenames)` tuple.
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    async fn query_localities(
        &self,
        handle: &str,
        name_columns: &[String],
    ) -> Result<Vec<GazetteerEntry>, StoreError>;
}

/// One raw gazetteer row: name columns, comma-delimited alternate names and a
/// serialized GeoJSON geometry. Extra columns of any type are carried along;
/// only string values are used as names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalityRecord {
    #[serde(default)]
    pub alternatenames: Option<String>,
    pub feature: String,
    #[serde(flatten)]
    pub names: BTreeMap<String, Value>,
}

impl LocalityRecord {
    pub fn new(feature: impl Into<String>) -> Self {
        Self {
            feature: feature.into(),
            ..Self::default()
        }
    }

    pub fn name(mut self, column: &str, value: &str) -> Self {
        self.names.insert(column.to_string(), Value::from(value));
        self
    }

    pub fn alternates(mut self, names: &str) -> Self {
        self.alternatenames = Some(names.to_string());
        self
    }
}

/// Project records onto `name_columns` and group them, keeping the greatest
/// geometry string per group. Missing, null and non-string columns read as empty.
pub fn group_localities(records: &[LocalityRecord], name_columns: &[String]) -> Vec<GazetteerEntry> {
    let mut groups: BTreeMap<(Vec<String>, String), String> = BTreeMap::new();
    for record in records {
        let names: Vec<String> = name_columns
            .iter()
            .map(|col| {
                record
                    .names
                    .get(col)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            })
            .collect();
        let alternates = record.alternatenames.clone().unwrap_or_default();
        let geometry = groups.entry((names, alternates)).or_default();
        if record.feature > *geometry {
            *geometry = record.feature.clone();
        }
    }

    groups
        .into_iter()
        .map(|((names, alternate_names), geometry)| GazetteerEntry {
            names,
            alternate_names,
            geometry,
        })
        .collect()
}

/// Records held in memory. The handle is ignored.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLocalityStore {
    records: Vec<LocalityRecord>,
}

impl InMemoryLocalityStore {
    pub fn new(records: Vec<LocalityRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl ReferenceStore for InMemoryLocalityStore {
    async fn query_localities(
        &self,
        _handle: &str,
        name_columns: &[String],
    ) -> Result<Vec<GazetteerEntry>, StoreError> {
        Ok(group_localities(&self.records, name_columns))
    }
}

/// Records read from a JSON array file; the handle is the file path,
/// optionally resolved against a base directory.
#[derive(Debug, Clone, Default)]
pub struct JsonFileLocalityStore {
    base_dir: Option<PathBuf>,
}

impl JsonFileLocalityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative handles against `dir` (for testing).
    pub fn rooted_at(dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(dir.into()),
        }
    }

    fn path_for(&self, handle: &str) -> PathBuf {
        match &self.base_dir {
            Some(dir) => dir.join(handle),
            None => PathBuf::from(handle),
        }
    }
}

#[async_trait]
impl ReferenceStore for JsonFileLocalityStore {
    async fn query_localities(
        &self,
        handle: &str,
        name_columns: &[String],
    ) -> Result<Vec<GazetteerEntry>, StoreError> {
        let path = self.path_for(handle);
        let data = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| StoreError::Unavailable(format!("{}: {}", path.display(), e)))?;
        let records: Vec<LocalityRecord> = serde_json::from_str(&data)
            .map_err(|e| StoreError::Malformed(format!("{}: {}", path.display(), e)))?;
        Ok(group_localities(&records, name_columns))
    }
}
