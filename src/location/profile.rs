//! Author geo-profiles: a previously observed location per author identity.
//!
//! The resolver returns raw profile data. The confidence gate is applied by the
//! orchestrator via [`AuthorGeoProfile::is_confident`].

use super::providers::bounded;
use super::types::{GeoFeature, Position};
use crate::error::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Profiles below this confidence are never used. Fixed policy, not per tenant.
pub const LOCATION_CONFIDENCE_THRESHOLD: f64 = 0.6;

pub const CONFIDENCE_PROPERTY: &str = "confidence";
pub const AUTHOR_REF_PROPERTY: &str = "authorRef";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorGeoProfile {
    pub author_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub confidence: f64,
}

/// Stored record body. Older writers used `lat`/`lon`.
#[derive(Deserialize)]
struct ProfileRecord {
    #[serde(default, alias = "lat")]
    latitude: Option<f64>,
    #[serde(default, alias = "lon")]
    longitude: Option<f64>,
    #[serde(default)]
    confidence: Option<f64>,
}

impl AuthorGeoProfile {
    /// Parse a stored JSON record. A missing confidence reads as 0.
    ///
    /// A record below the confidence threshold that carries no coordinates is
    /// treated as no profile at all. Only a confident record without
    /// coordinates is malformed.
    pub fn from_record(author_id: &str, raw: &str) -> Result<Option<Self>, StoreError> {
        let record: ProfileRecord = serde_json::from_str(raw)
            .map_err(|e| StoreError::Malformed(format!("profile [{}]: {}", author_id, e)))?;
        let confidence = record.confidence.unwrap_or(0.0);
        match (record.latitude, record.longitude) {
            (Some(latitude), Some(longitude)) => Ok(Some(Self {
                author_id: author_id.to_string(),
                latitude,
                longitude,
                confidence,
            })),
            _ if confidence < LOCATION_CONFIDENCE_THRESHOLD => Ok(None),
            _ => Err(StoreError::Malformed(format!(
                "profile [{}] has no coordinates",
                author_id
            ))),
        }
    }

    pub fn is_confident(&self) -> bool {
        self.confidence >= LOCATION_CONFIDENCE_THRESHOLD
    }

    /// Point feature tagged with confidence and author reference.
    pub fn to_feature(&self) -> GeoFeature {
        let mut props = Map::new();
        props.insert(CONFIDENCE_PROPERTY.to_string(), Value::from(self.confidence));
        props.insert(AUTHOR_REF_PROPERTY.to_string(), Value::from(self.author_id.clone()));
        GeoFeature::point(Position::from_lat_lon(self.latitude, self.longitude)).with_properties(props)
    }
}

/// Keyed profile storage. `Ok(None)` is a normal miss, distinct from a store failure.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_author_profile(&self, author_id: &str) -> Result<Option<AuthorGeoProfile>, StoreError>;
}

/// Bounded lookups against a [`ProfileStore`].
#[derive(Clone)]
pub struct AuthorProfileResolver {
    store: Arc<dyn ProfileStore>,
    timeout: Duration,
}

impl AuthorProfileResolver {
    pub fn new(store: Arc<dyn ProfileStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn lookup(&self, author_id: &str) -> Result<Option<AuthorGeoProfile>, StoreError> {
        bounded(self.timeout, "author profile lookup", self.store.get_author_profile(author_id)).await
    }
}

/// Partition of a profile row: the first two characters of the author id.
pub fn partition_key(author_id: &str) -> &str {
    match author_id.char_indices().nth(2) {
        Some((end, _)) => &author_id[..end],
        None => author_id,
    }
}

/// Raw JSON records held in memory, laid out as `(partition, author id)` rows.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProfileStore {
    rows: HashMap<(String, String), String>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(mut self, author_id: &str, raw: &str) -> Self {
        self.insert(author_id, raw);
        self
    }

    pub fn insert(&mut self, author_id: &str, raw: &str) {
        self.rows.insert(
            (partition_key(author_id).to_string(), author_id.to_string()),
            raw.to_string(),
        );
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get_author_profile(&self, author_id: &str) -> Result<Option<AuthorGeoProfile>, StoreError> {
        let key = (partition_key(author_id).to_string(), author_id.to_string());
        self.rows
            .get(&key)
            .map(|raw| AuthorGeoProfile::from_record(author_id, raw))
            .transpose()
            .map(Option::flatten)
    }
}
