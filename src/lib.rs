//! Location inference for inbound social and news messages.
//!
//! Given a message, [`location::LocationResolver`] picks the best available
//! location signal: a location shared by the origin, a confident author
//! geo-profile, or place names recognized in the text.

pub mod config;
pub mod error;
pub mod location;
pub mod logging;

pub use config::InferenceSettings;
pub use error::{InferenceError, StoreError};
pub use location::{FeatureCollection, GeoFeature, LocationQuery, LocationResolver, SharedLocation};
