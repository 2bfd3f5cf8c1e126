//! Location inference subsystem.
//!
//! Resolves a message to point geometries through a fallback chain:
//! shared location, author geo-profile, then gazetteer matching over the text.

pub mod cache;
pub mod gazetteer;
pub mod profile;
pub mod providers;
pub mod resolver;
pub mod shared;
pub mod types;

pub use cache::SiteConfigCache;
pub use gazetteer::{GazetteerEntry, GazetteerMatcher, LanguageColumns};
pub use profile::{AuthorGeoProfile, AuthorProfileResolver, InMemoryProfileStore, ProfileStore, LOCATION_CONFIDENCE_THRESHOLD};
pub use providers::{
    HttpSiteConfigProvider, InMemoryLocalityStore, JsonFileLocalityStore, LocalityRecord, ReferenceStore, SiteConfig,
    SiteConfigProvider, StaticSiteConfigProvider,
};
pub use resolver::{LocationResolver, Resolution, ResolutionStrategy, StrategyOutcome};
pub use types::{BoundingBox, FeatureCollection, GeoFeature, LocationQuery, LocationSource, Position, SharedLocation};
