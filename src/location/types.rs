//! Core types for the location subsystem.
//!
//! Output follows the flat shape the downstream pipeline consumes: a feature is a
//! GeoJSON Point geometry with an optional `properties` object attached.

use serde::de::{self, IgnoredAny, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

/// `[longitude, latitude]`, in that order on the wire and in memory.
///
/// Trailing elements such as an altitude are accepted and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position(
    /// Longitude
    pub f64,
    /// Latitude
    pub f64,
);

impl Position {
    pub fn from_lat_lon(lat: f64, lon: f64) -> Self {
        Self(lon, lat)
    }

    pub fn lon(&self) -> f64 {
        self.0
    }

    pub fn lat(&self) -> f64 {
        self.1
    }
}

impl<'de> Deserialize<'de> for Position {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PositionVisitor;

        impl<'de> Visitor<'de> for PositionVisitor {
            type Value = Position;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a [longitude, latitude] array")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Position, A::Error> {
                let lon = seq
                    .next_element()?
                    .ok_or_else(|| <A::Error as de::Error>::invalid_length(0, &self))?;
                let lat = seq
                    .next_element()?
                    .ok_or_else(|| <A::Error as de::Error>::invalid_length(1, &self))?;
                while seq.next_element::<IgnoredAny>()?.is_some() {}
                Ok(Position(lon, lat))
            }
        }

        deserializer.deserialize_seq(PositionVisitor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryKind {
    Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureCollectionKind {
    FeatureCollection,
}

/// A point geometry with optional metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoFeature {
    #[serde(rename = "type")]
    pub kind: GeometryKind,
    pub coordinates: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,
}

impl GeoFeature {
    pub fn point(position: Position) -> Self {
        Self {
            kind: GeometryKind::Point,
            coordinates: position,
            properties: None,
        }
    }

    pub fn with_properties(mut self, properties: Map<String, Value>) -> Self {
        self.properties = Some(properties);
        self
    }

    /// Look up a single property value.
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.as_ref()?.get(key)
    }

    /// Serialized geometry, without properties. Two features with the same key
    /// are the same place.
    pub fn canonical_key(&self) -> String {
        json!({
            "type": self.kind,
            "coordinates": self.coordinates,
        })
        .to_string()
    }
}

/// An ordered set of features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: FeatureCollectionKind,
    pub features: Vec<GeoFeature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<GeoFeature>) -> Self {
        Self {
            kind: FeatureCollectionKind::FeatureCollection,
            features,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn single(feature: GeoFeature) -> Self {
        Self::new(vec![feature])
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }
}

/// Location explicitly attached to a message by its origin.
///
/// Variants are tried in order when deserializing: a `FeatureCollection`
/// must carry `"type": "FeatureCollection"`, a geometry is any object with a
/// `coordinates` pair, and a bare two-element array is a raw pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SharedLocation {
    FeatureCollection(FeatureCollection),
    Geometry { coordinates: Position },
    Coordinates(Position),
}

/// A single inbound message to locate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationQuery {
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub language_tag: Option<String>,
    pub sentence: String,
    #[serde(default)]
    pub shared_location: Option<SharedLocation>,
}

impl LocationQuery {
    pub fn new(sentence: impl Into<String>) -> Self {
        Self {
            sentence: sentence.into(),
            ..Self::default()
        }
    }

    pub fn with_author(mut self, author_id: impl Into<String>) -> Self {
        self.author_id = Some(author_id.into());
        self
    }

    pub fn with_language(mut self, language_tag: impl Into<String>) -> Self {
        self.language_tag = Some(language_tag.into());
        self
    }

    pub fn with_shared_location(mut self, shared: SharedLocation) -> Self {
        self.shared_location = Some(shared);
        self
    }

    /// Author id, ignoring empty strings.
    pub fn author(&self) -> Option<&str> {
        self.author_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Language tag, ignoring empty strings.
    pub fn language(&self) -> Option<&str> {
        self.language_tag.as_deref().filter(|lang| !lang.is_empty())
    }
}

/// `[west, south, east, north]` in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox(pub f64, pub f64, pub f64, pub f64);

impl BoundingBox {
    pub fn contains(&self, position: &Position) -> bool {
        let BoundingBox(west, south, east, north) = *self;
        let (lon, lat) = (position.lon(), position.lat());
        let within_lon = if west <= east {
            (west..=east).contains(&lon)
        } else {
            // crosses the antimeridian
            lon >= west || lon <= east
        };
        within_lon && (south..=north).contains(&lat)
    }
}

/// Which strategy produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationSource {
    SharedLocation,
    AuthorProfile,
    Gazetteer,
}

impl fmt::Display for LocationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SharedLocation => write!(f, "sharedLocation"),
            Self::AuthorProfile => write!(f, "authorProfile"),
            Self::Gazetteer => write!(f, "gazetteer"),
        }
    }
}
