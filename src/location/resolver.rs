//! Location resolver: orchestrates the fallback chain.
//!
//! Flow: validate site + language → shared location → author profile → gazetteer.
//! Strategies run strictly in order and the first one that resolves ends the chain.
//! An empty gazetteer result is a valid answer, not an error.

use super::cache::SiteConfigCache;
use super::gazetteer::{GazetteerMatcher, LanguageColumns};
use super::profile::{AuthorProfileResolver, ProfileStore, LOCATION_CONFIDENCE_THRESHOLD};
use super::providers::{ReferenceStore, SiteConfigProvider, SiteContext};
use super::shared;
use super::types::{FeatureCollection, LocationQuery, LocationSource};
use crate::config::InferenceSettings;
use crate::error::InferenceError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// What a strategy decided about a query.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyOutcome {
    Resolved(FeatureCollection),
    Continue,
}

/// Everything a strategy may look at.
pub struct ResolutionContext<'a> {
    pub query: &'a LocationQuery,
    pub site: &'a SiteContext,
}

/// One link in the fallback chain. Errors abort the whole resolution.
#[async_trait]
pub trait ResolutionStrategy: Send + Sync {
    fn source(&self) -> LocationSource;

    async fn attempt(&self, ctx: &ResolutionContext<'_>) -> Result<StrategyOutcome, InferenceError>;
}

/// Uses the location the message origin attached, verbatim.
pub struct SharedLocationStrategy;

#[async_trait]
impl ResolutionStrategy for SharedLocationStrategy {
    fn source(&self) -> LocationSource {
        LocationSource::SharedLocation
    }

    async fn attempt(&self, ctx: &ResolutionContext<'_>) -> Result<StrategyOutcome, InferenceError> {
        Ok(match &ctx.query.shared_location {
            Some(location) => StrategyOutcome::Resolved(shared::normalize(location)),
            None => StrategyOutcome::Continue,
        })
    }
}

/// Uses the author's stored geo-profile when it is confident enough.
pub struct AuthorProfileStrategy {
    profiles: AuthorProfileResolver,
}

impl AuthorProfileStrategy {
    pub fn new(profiles: AuthorProfileResolver) -> Self {
        Self { profiles }
    }
}

#[async_trait]
impl ResolutionStrategy for AuthorProfileStrategy {
    fn source(&self) -> LocationSource {
        LocationSource::AuthorProfile
    }

    async fn attempt(&self, ctx: &ResolutionContext<'_>) -> Result<StrategyOutcome, InferenceError> {
        let Some(author) = ctx.query.author() else {
            return Ok(StrategyOutcome::Continue);
        };

        match self.profiles.lookup(author).await? {
            Some(profile) if profile.is_confident() => {
                Ok(StrategyOutcome::Resolved(FeatureCollection::single(profile.to_feature())))
            }
            Some(profile) => {
                debug!(
                    author = %author,
                    confidence = profile.confidence,
                    threshold = LOCATION_CONFIDENCE_THRESHOLD,
                    "Profile below confidence threshold"
                );
                Ok(StrategyOutcome::Continue)
            }
            None => {
                debug!(author = %author, "No stored profile");
                Ok(StrategyOutcome::Continue)
            }
        }
    }
}

/// Scans the sentence for known place names. Always resolves.
///
/// When the site configures a `targetBbox`, matches outside it are dropped, so
/// a sentence naming exactly one known place can resolve to no features.
pub struct GazetteerStrategy {
    matcher: GazetteerMatcher,
}

impl GazetteerStrategy {
    pub fn new(matcher: GazetteerMatcher) -> Self {
        Self { matcher }
    }
}

#[async_trait]
impl ResolutionStrategy for GazetteerStrategy {
    fn source(&self) -> LocationSource {
        LocationSource::Gazetteer
    }

    async fn attempt(&self, ctx: &ResolutionContext<'_>) -> Result<StrategyOutcome, InferenceError> {
        let mut found = self
            .matcher
            .match_sentence(
                &ctx.query.sentence,
                &ctx.site.supported_languages,
                &ctx.site.reference_store,
            )
            .await?;

        if let Some(bbox) = ctx.site.bounding_box {
            let before = found.len();
            found.features.retain(|f| bbox.contains(&f.coordinates));
            if found.len() < before {
                debug!(dropped = before - found.len(), "Dropped matches outside the site bounding box");
            }
        }
        Ok(StrategyOutcome::Resolved(found))
    }
}

/// Result of a resolution along with the strategy that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub locations: FeatureCollection,
    /// None if every strategy fell through.
    pub source: Option<LocationSource>,
}

/// The location resolver with its fallback pipeline.
pub struct LocationResolver {
    site_id: String,
    sites: Arc<dyn SiteConfigProvider>,
    cache: SiteConfigCache,
    columns: LanguageColumns,
    strategies: Vec<Box<dyn ResolutionStrategy>>,
    timeout: Duration,
}

impl LocationResolver {
    /// A resolver for `site_id` with the default column table and store timeout.
    pub fn new(
        site_id: impl Into<String>,
        sites: Arc<dyn SiteConfigProvider>,
        profiles: Arc<dyn ProfileStore>,
        localities: Arc<dyn ReferenceStore>,
    ) -> Self {
        Self::assemble(
            site_id.into(),
            sites,
            profiles,
            localities,
            LanguageColumns::default(),
            DEFAULT_STORE_TIMEOUT,
            SiteConfigCache::new(),
        )
    }

    /// A resolver configured from validated settings.
    pub fn from_settings(
        settings: &InferenceSettings,
        sites: Arc<dyn SiteConfigProvider>,
        profiles: Arc<dyn ProfileStore>,
        localities: Arc<dyn ReferenceStore>,
    ) -> Result<Self, InferenceError> {
        settings.validate()?;
        Ok(Self::assemble(
            settings.site_name.clone(),
            sites,
            profiles,
            localities,
            settings.language_columns()?,
            settings.store_timeout(),
            SiteConfigCache::with_ttl(settings.site_config_ttl()),
        ))
    }

    fn assemble(
        site_id: String,
        sites: Arc<dyn SiteConfigProvider>,
        profiles: Arc<dyn ProfileStore>,
        localities: Arc<dyn ReferenceStore>,
        columns: LanguageColumns,
        timeout: Duration,
        cache: SiteConfigCache,
    ) -> Self {
        let strategies: Vec<Box<dyn ResolutionStrategy>> = vec![
            Box::new(SharedLocationStrategy),
            Box::new(AuthorProfileStrategy::new(AuthorProfileResolver::new(profiles, timeout))),
            Box::new(GazetteerStrategy::new(GazetteerMatcher::new(
                localities,
                columns.clone(),
                timeout,
            ))),
        ];
        Self {
            site_id,
            sites,
            cache,
            columns,
            strategies,
            timeout,
        }
    }

    /// Replace the site configuration cache (for testing or sharing a TTL policy).
    pub fn with_cache(mut self, cache: SiteConfigCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    pub fn cache(&self) -> &SiteConfigCache {
        &self.cache
    }

    /// Resolve a query for this resolver's site.
    pub async fn resolve(&self, query: &LocationQuery) -> Result<FeatureCollection, InferenceError> {
        self.resolve_for_site(&self.site_id, query).await
    }

    pub async fn resolve_for_site(
        &self,
        site_id: &str,
        query: &LocationQuery,
    ) -> Result<FeatureCollection, InferenceError> {
        Ok(self.resolve_with_source(site_id, query).await?.locations)
    }

    /// Resolve a query and report which strategy answered.
    pub async fn resolve_with_source(
        &self,
        site_id: &str,
        query: &LocationQuery,
    ) -> Result<Resolution, InferenceError> {
        let site = self.validate(site_id, query).await?;
        let ctx = ResolutionContext {
            query,
            site: &site,
        };

        for strategy in &self.strategies {
            match strategy.attempt(&ctx).await? {
                StrategyOutcome::Resolved(locations) => {
                    info!(
                        site = %site_id,
                        strategy = %strategy.source(),
                        features = locations.len(),
                        "Location resolved"
                    );
                    return Ok(Resolution {
                        locations,
                        source: Some(strategy.source()),
                    });
                }
                StrategyOutcome::Continue => {
                    debug!(strategy = %strategy.source(), "Strategy fell through");
                }
            }
        }

        Ok(Resolution {
            locations: FeatureCollection::empty(),
            source: None,
        })
    }

    /// Site config must be present and complete, and the language supported.
    async fn validate(&self, site_id: &str, query: &LocationQuery) -> Result<SiteContext, InferenceError> {
        let config = self
            .cache
            .get_or_fetch(site_id, self.sites.as_ref(), self.timeout)
            .await?;
        let site = config.require()?;

        if let Some(lang) = query.language() {
            if !site.supported_languages.iter().any(|l| l == lang) {
                return Err(InferenceError::UnsupportedLanguage(lang.to_string()));
            }
        }
        self.columns.columns_for(&site.supported_languages)?;

        Ok(site)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::location::gazetteer::GazetteerEntry;
    use crate::location::profile::{AuthorGeoProfile, InMemoryProfileStore, AUTHOR_REF_PROPERTY, CONFIDENCE_PROPERTY};
    use crate::location::providers::{
        InMemoryLocalityStore, LocalityRecord, SiteConfig, StaticSiteConfigProvider,
    };
    use crate::location::shared::SOURCE_PROPERTY;
    use crate::location::types::{BoundingBox, GeoFeature, Position, SharedLocation};
    use approx::assert_relative_eq;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SITE: &str = "libya";
    const TART: &str = r#"{"type":"Point","coordinates":[22.06667,32.8]}"#;
    const TRIPOLI: &str = r#"{"type":"Point","coordinates":[13.18472,32.88972]}"#;
    const QARAT: &str = r#"{"type":"Point","coordinates":[13.07583,32.21194]}"#;

    const ENGLISH_TART: &str = "This is a test message that talks about news in Zāwiyat at Tart";
    const ARABIC_TRIPOLI: &str = "هذه  رسالة  الذي يتحدث عن صحفي في  بنغازي طرابلس";
    const LOW_CONFIDENCE_AUTHOR: &str = "100092769";
    const CONFIDENT_AUTHOR: &str = "100092788";

    struct Counted<T> {
        inner: T,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl<T: ProfileStore> ProfileStore for Counted<T> {
        async fn get_author_profile(&self, author_id: &str) -> Result<Option<AuthorGeoProfile>, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.get_author_profile(author_id).await
        }
    }

    #[async_trait]
    impl<T: ReferenceStore> ReferenceStore for Counted<T> {
        async fn query_localities(
            &self,
            handle: &str,
            name_columns: &[String],
        ) -> Result<Vec<GazetteerEntry>, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.query_localities(handle, name_columns).await
        }
    }

    #[async_trait]
    impl<T: SiteConfigProvider> SiteConfigProvider for Counted<T> {
        async fn fetch_site_config(&self, site_id: &str) -> Result<SiteConfig, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch_site_config(site_id).await
        }
    }

    struct UnreachableProfiles;

    #[async_trait]
    impl ProfileStore for UnreachableProfiles {
        async fn get_author_profile(&self, _author_id: &str) -> Result<Option<AuthorGeoProfile>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    struct Harness {
        resolver: LocationResolver,
        site_calls: Arc<AtomicUsize>,
        profile_calls: Arc<AtomicUsize>,
        locality_calls: Arc<AtomicUsize>,
    }

    impl Harness {
        fn lookups(&self) -> usize {
            self.profile_calls.load(Ordering::SeqCst) + self.locality_calls.load(Ordering::SeqCst)
        }
    }

    fn localities() -> InMemoryLocalityStore {
        InMemoryLocalityStore::new(vec![
            LocalityRecord::new(TART)
                .name("name", "Zāwiyat at Tart")
                .name("ar_name", "Zāwiyat في تارت")
                .alternates("Thintis,Zauiet Tert,Zawiyat at Tarit,Zawiyat at Tart,Zāwiyat at Tarit,Zāwiyat at Tart"),
            LocalityRecord::new(TRIPOLI)
                .name("name", "Tripoli")
                .name("ar_name", "طرابلس")
                .alternates("Baladiyat Tarabulus,District de Tripoli,Tarabulus,Tripoli,trabls,Ţarābulus,شعبية طرابلس,طرابلس"),
            LocalityRecord::new(QARAT)
                .name("name", "Qaryat Qārāt")
                .name("ar_name", "قرية Qārāt")
                .alternates(""),
        ])
    }

    fn profiles() -> InMemoryProfileStore {
        InMemoryProfileStore::new()
            .with_record(
                LOW_CONFIDENCE_AUTHOR,
                r#"{"lat":11.276784455403686,"lon":26.329739168286324,"confidence":0}"#,
            )
            .with_record(CONFIDENT_AUTHOR, r#"{"lat":22.27678445,"lon":33.329739,"confidence":0.8}"#)
    }

    fn harness_with(config: SiteConfig, profile_store: Arc<dyn ProfileStore>) -> Harness {
        let site_calls = Arc::new(AtomicUsize::new(0));
        let profile_calls = Arc::new(AtomicUsize::new(0));
        let locality_calls = Arc::new(AtomicUsize::new(0));

        let sites = Counted {
            inner: StaticSiteConfigProvider::new().with_site(SITE, config),
            calls: site_calls.clone(),
        };
        let profiles = Counted {
            inner: profile_store,
            calls: profile_calls.clone(),
        };
        let localities = Counted {
            inner: localities(),
            calls: locality_calls.clone(),
        };

        Harness {
            resolver: LocationResolver::new(SITE, Arc::new(sites), Arc::new(profiles), Arc::new(localities)),
            site_calls,
            profile_calls,
            locality_calls,
        }
    }

    fn harness() -> Harness {
        harness_with(SiteConfig::new(&["en", "ar"], "postgres://features"), Arc::new(profiles()))
    }

    #[async_trait]
    impl ProfileStore for Arc<dyn ProfileStore> {
        async fn get_author_profile(&self, author_id: &str) -> Result<Option<AuthorGeoProfile>, StoreError> {
            self.as_ref().get_author_profile(author_id).await
        }
    }

    fn only_feature(fc: &FeatureCollection) -> &GeoFeature {
        assert_eq!(fc.len(), 1, "expected exactly one feature, got {:?}", fc);
        &fc.features[0]
    }

    #[tokio::test]
    async fn test_english_primary_name() {
        let h = harness();
        let fc = h.resolver.resolve(&LocationQuery::new(ENGLISH_TART).with_author("no user")).await.unwrap();
        assert_eq!(serde_json::to_string(only_feature(&fc)).unwrap(), TART);
    }

    #[tokio::test]
    async fn test_arabic_alias() {
        let h = harness();
        let fc = h.resolver.resolve(&LocationQuery::new(ARABIC_TRIPOLI)).await.unwrap();
        assert_eq!(serde_json::to_string(only_feature(&fc)).unwrap(), TRIPOLI);
    }

    #[tokio::test]
    async fn test_low_confidence_profile_falls_back() {
        let h = harness();
        let query = LocationQuery::new(ARABIC_TRIPOLI).with_author(LOW_CONFIDENCE_AUTHOR);
        let resolution = h.resolver.resolve_with_source(SITE, &query).await.unwrap();

        assert_eq!(resolution.source, Some(LocationSource::Gazetteer));
        assert_eq!(only_feature(&resolution.locations).coordinates, Position(13.18472, 32.88972));
        assert_eq!(h.profile_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.locality_calls.load(Ordering::SeqCst), 1);

        let fc = h
            .resolver
            .resolve(&LocationQuery::new(ENGLISH_TART).with_author(LOW_CONFIDENCE_AUTHOR))
            .await
            .unwrap();
        assert_eq!(only_feature(&fc).coordinates, Position(22.06667, 32.8));
    }

    #[tokio::test]
    async fn test_low_confidence_profile_without_coordinates_falls_back() {
        let author = "100000001";
        let store = InMemoryProfileStore::new().with_record(author, r#"{"confidence":0}"#);
        let h = harness_with(SiteConfig::new(&["en", "ar"], "postgres://features"), Arc::new(store));

        let query = LocationQuery::new("news from Tripoli").with_author(author);
        let resolution = h.resolver.resolve_with_source(SITE, &query).await.unwrap();

        assert_eq!(resolution.source, Some(LocationSource::Gazetteer));
        assert_eq!(only_feature(&resolution.locations).coordinates, Position(13.18472, 32.88972));
        assert_eq!(h.profile_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_sentence_skips_reference_store() {
        let h = harness();
        let fc = h.resolver.resolve(&LocationQuery::new("")).await.unwrap();
        assert!(fc.is_empty());
        assert_eq!(h.locality_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_confident_profile_wins() {
        let h = harness();
        for sentence in [ENGLISH_TART, "هذه رسالة الاختبار الذي يتحدث عن صحفي في بنغازي وطرابلس"] {
            let query = LocationQuery::new(sentence).with_author(CONFIDENT_AUTHOR);
            let resolution = h.resolver.resolve_with_source(SITE, &query).await.unwrap();

            assert_eq!(resolution.source, Some(LocationSource::AuthorProfile));
            let feature = only_feature(&resolution.locations);
            assert_relative_eq!(feature.coordinates.lon(), 33.329739);
            assert_relative_eq!(feature.coordinates.lat(), 22.27678445);
            assert_eq!(feature.property(CONFIDENCE_PROPERTY), Some(&Value::from(0.8)));
            assert_eq!(feature.property(AUTHOR_REF_PROPERTY), Some(&Value::from(CONFIDENT_AUTHOR)));
        }
        assert_eq!(h.locality_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_shared_raw_pair_skips_lookups() {
        let h = harness();
        let query = LocationQuery::new("This is a test message that talks about things in Benghazi and tripoli")
            .with_author(CONFIDENT_AUTHOR)
            .with_shared_location(SharedLocation::Coordinates(Position(20.06859, 32.11486)));
        let resolution = h.resolver.resolve_with_source(SITE, &query).await.unwrap();

        assert_eq!(resolution.source, Some(LocationSource::SharedLocation));
        let feature = only_feature(&resolution.locations);
        assert_eq!(feature.coordinates, Position(20.06859, 32.11486));
        assert_eq!(feature.property(SOURCE_PROPERTY), Some(&Value::from("sharedLocation")));
        assert_eq!(h.lookups(), 0);
    }

    #[tokio::test]
    async fn test_shared_feature_collection() {
        let h = harness();
        let shared = FeatureCollection::new(vec![
            GeoFeature::point(Position(33.329739, 22.27678445)),
            GeoFeature::point(Position(34.329739, 21.27678445)),
        ]);
        let query = LocationQuery::new("Benghazi and tripoli")
            .with_shared_location(SharedLocation::FeatureCollection(shared.clone()));
        let fc = h.resolver.resolve(&query).await.unwrap();

        assert_eq!(fc.len(), 2);
        assert_eq!(fc.features[0].coordinates, shared.features[0].coordinates);
        assert_eq!(fc.features[1].property(SOURCE_PROPERTY), Some(&Value::from("sharedLocation")));
        assert_eq!(h.lookups(), 0);
    }

    #[tokio::test]
    async fn test_shared_geometry_object() {
        let h = harness();
        let shared: SharedLocation = serde_json::from_str(r#"{"coordinates":[20.06859,32.11486]}"#).unwrap();
        let fc = h
            .resolver
            .resolve(&LocationQuery::new("Benghazi and tripoli").with_shared_location(shared))
            .await
            .unwrap();
        assert_eq!(only_feature(&fc).coordinates, Position(20.06859, 32.11486));
    }

    #[tokio::test]
    async fn test_unsupported_language() {
        let h = harness();
        let query = LocationQuery::new(ENGLISH_TART)
            .with_language("zz")
            .with_shared_location(SharedLocation::Coordinates(Position(1.0, 2.0)));
        let err = h.resolver.resolve(&query).await.unwrap_err();

        assert_eq!(err, InferenceError::UnsupportedLanguage("zz".into()));
        assert!(err.to_string().contains("unsupported language"));
        assert_eq!(h.lookups(), 0);
    }

    #[tokio::test]
    async fn test_supported_language_tag() {
        let h = harness();
        let fc = h.resolver.resolve(&LocationQuery::new(ARABIC_TRIPOLI).with_language("ar")).await.unwrap();
        assert_eq!(fc.len(), 1);
    }

    #[tokio::test]
    async fn test_no_signal_is_empty_not_error() {
        let h = harness();
        let resolution = h
            .resolver
            .resolve_with_source(SITE, &LocationQuery::new("nothing geographic here").with_author("unknown"))
            .await
            .unwrap();
        assert!(resolution.locations.is_empty());
        assert_eq!(resolution.source, Some(LocationSource::Gazetteer));
    }

    #[tokio::test]
    async fn test_repeated_mentions_dedup() {
        let h = harness();
        let fc = h
            .resolver
            .resolve(&LocationQuery::new("Tripoli, tripoli and again Tarabulus"))
            .await
            .unwrap();
        assert_eq!(fc.len(), 1);
    }

    #[tokio::test]
    async fn test_multiple_places_in_mention_order() {
        let h = harness();
        let fc = h
            .resolver
            .resolve(&LocationQuery::new("Convoy from Tripoli reached Zawiyat at Tart"))
            .await
            .unwrap();
        let keys: Vec<String> = fc.features.iter().map(GeoFeature::canonical_key).collect();
        assert_eq!(
            keys,
            vec![
                GeoFeature::point(Position(13.18472, 32.88972)).canonical_key(),
                GeoFeature::point(Position(22.06667, 32.8)).canonical_key(),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_configuration_fails_before_lookups() {
        let config = SiteConfig {
            supported_languages: Some(vec!["en".into()]),
            features_connection_string: None,
            target_bbox: None,
        };
        let h = harness_with(config, Arc::new(profiles()));
        let query = LocationQuery::new(ENGLISH_TART).with_shared_location(SharedLocation::Coordinates(Position(1.0, 2.0)));
        let err = h.resolver.resolve(&query).await.unwrap_err();

        assert!(matches!(err, InferenceError::Configuration(_)));
        assert_eq!(h.lookups(), 0);
    }

    #[tokio::test]
    async fn test_unmapped_site_language_is_configuration_error() {
        let h = harness_with(SiteConfig::new(&["en", "xx"], "conn"), Arc::new(profiles()));
        let err = h.resolver.resolve(&LocationQuery::new(ENGLISH_TART)).await.unwrap_err();
        assert!(matches!(err, InferenceError::Configuration(_)));
        assert_eq!(h.lookups(), 0);
    }

    #[tokio::test]
    async fn test_unknown_site() {
        let h = harness();
        let err = h
            .resolver
            .resolve_for_site("atlantis", &LocationQuery::new(ENGLISH_TART))
            .await
            .unwrap_err();
        assert!(matches!(err, InferenceError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_profile_store_failure_surfaces() {
        let h = harness_with(SiteConfig::new(&["en"], "conn"), Arc::new(UnreachableProfiles));
        let err = h
            .resolver
            .resolve(&LocationQuery::new(ENGLISH_TART).with_author(CONFIDENT_AUTHOR))
            .await
            .unwrap_err();
        assert!(matches!(err, InferenceError::Store(StoreError::Unavailable(_))));
        assert_eq!(h.locality_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_bounding_box_filters_gazetteer() {
        let mut config = SiteConfig::new(&["en"], "conn");
        // covers Tripoli, not Zawiyat at Tart
        config.target_bbox = Some(BoundingBox(9.0, 30.0, 15.0, 34.0));
        let h = harness_with(config, Arc::new(profiles()));

        let fc = h
            .resolver
            .resolve(&LocationQuery::new("Tripoli and Zawiyat at Tart"))
            .await
            .unwrap();
        assert_eq!(only_feature(&fc).coordinates, Position(13.18472, 32.88972));

        // explicit signals are never filtered
        let fc = h
            .resolver
            .resolve(&LocationQuery::new("x").with_author(CONFIDENT_AUTHOR))
            .await
            .unwrap();
        assert_eq!(fc.len(), 1);
    }

    #[tokio::test]
    async fn test_site_config_fetched_once() {
        let h = harness();
        for _ in 0..3 {
            h.resolver.resolve(&LocationQuery::new(ENGLISH_TART)).await.unwrap();
        }
        assert_eq!(h.site_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.resolver.cache().len().await, 1);
    }

    #[tokio::test]
    async fn test_injected_cache_is_used() {
        let h = harness();
        let cache = SiteConfigCache::new();
        cache.put(SITE, SiteConfig::new(&["en"], "conn")).await;
        let resolver = h.resolver.with_cache(cache);

        let err = resolver
            .resolve(&LocationQuery::new(ARABIC_TRIPOLI).with_language("ar"))
            .await
            .unwrap_err();
        assert_eq!(err, InferenceError::UnsupportedLanguage("ar".into()));
        assert_eq!(h.site_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrent_resolutions() {
        let h = harness();
        let english = LocationQuery::new(ENGLISH_TART);
        let arabic = LocationQuery::new(ARABIC_TRIPOLI);
        let profiled = LocationQuery::new(ENGLISH_TART).with_author(CONFIDENT_AUTHOR);

        let (a, b, c) = tokio::join!(
            h.resolver.resolve(&english),
            h.resolver.resolve(&arabic),
            h.resolver.resolve(&profiled),
        );
        assert_eq!(only_feature(&a.unwrap()).coordinates, Position(22.06667, 32.8));
        assert_eq!(only_feature(&b.unwrap()).coordinates, Position(13.18472, 32.88972));
        assert_eq!(only_feature(&c.unwrap()).coordinates, Position(33.329739, 22.27678445));
    }

    #[tokio::test]
    async fn test_strategies_are_independent() {
        let site = SiteConfig::new(&["en"], "conn").require().unwrap();
        let query = LocationQuery::new(ENGLISH_TART);
        let ctx = ResolutionContext {
            query: &query,
            site: &site,
        };
        assert_eq!(SharedLocationStrategy.attempt(&ctx).await.unwrap(), StrategyOutcome::Continue);

        let strategy = AuthorProfileStrategy::new(AuthorProfileResolver::new(
            Arc::new(profiles()),
            Duration::from_secs(1),
        ));
        // no author on the query
        assert_eq!(strategy.attempt(&ctx).await.unwrap(), StrategyOutcome::Continue);
    }
}
