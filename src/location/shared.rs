//! Normalizes a caller-supplied location into the canonical output shape.
//!
//! Coordinate ranges are not checked here; that belongs to the ingestion boundary.

use super::types::{FeatureCollection, GeoFeature, LocationSource, Position, SharedLocation};
use serde_json::{Map, Value};

pub const SOURCE_PROPERTY: &str = "source";

fn shared_properties() -> Map<String, Value> {
    let mut props = Map::new();
    props.insert(
        SOURCE_PROPERTY.to_string(),
        Value::from(LocationSource::SharedLocation.to_string()),
    );
    props
}

/// Convert any accepted shared-location shape into a tagged `FeatureCollection`.
///
/// Feature collections keep their features (and order) but every feature's
/// properties are replaced. A geometry or raw pair becomes one Point feature.
pub fn normalize(shared: &SharedLocation) -> FeatureCollection {
    match shared {
        SharedLocation::FeatureCollection(fc) => FeatureCollection::new(
            fc.features
                .iter()
                .map(|f| f.clone().with_properties(shared_properties()))
                .collect(),
        ),
        SharedLocation::Geometry { coordinates } | SharedLocation::Coordinates(coordinates) => {
            point_feature(*coordinates)
        }
    }
}

fn point_feature(position: Position) -> FeatureCollection {
    FeatureCollection::single(GeoFeature::point(position).with_properties(shared_properties()))
}
