use geojson::{Feature, FeatureCollection, Geometry, Value};
use serde_json::{Map, Value as JsonValue};

use crate::coordinates::Coordinates;
use crate::ledger::{AssignmentLedger, PhotoRecord};
use crate::track_store::{Track, TrackSegment, TrackStore};

/// Every loaded track segment as a LineString Feature.
///
/// Segments are never joined, so gaps in recording stay visible.
pub fn tracks_to_feature_collection(store: &TrackStore) -> FeatureCollection {
    let features = store
        .tracks()
        .iter()
        .flat_map(|track| {
            track
                .segments()
                .iter()
                .enumerate()
                .map(move |(index, segment)| segment_to_feature(track, index, segment))
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// Every photo that currently has coordinates as a Point Feature.
pub fn photos_to_feature_collection(ledger: &AssignmentLedger) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: ledger.assigned().map(photo_to_feature).collect(),
        foreign_members: None,
    }
}

fn segment_to_feature(track: &Track, index: usize, segment: &TrackSegment) -> Feature {
    let geometry = match segment.points() {
        [single] => Value::Point(point_coords(&single.coordinates)),
        points => Value::LineString(points.iter().map(|p| point_coords(&p.coordinates)).collect()),
    };

    let mut props = Map::new();
    props.insert("path".to_string(), JsonValue::String(track.path().to_string()));
    if let Some(name) = track.name() {
        props.insert("name".to_string(), JsonValue::String(name.to_string()));
    }
    props.insert("segment".to_string(), JsonValue::Number(index.into()));

    let times: Vec<JsonValue> = segment
        .points()
        .iter()
        .map(|p| JsonValue::String(p.time.to_rfc3339()))
        .collect();
    let mut coord_props = Map::new();
    coord_props.insert("times".to_string(), JsonValue::Array(times));
    props.insert(
        "coordinateProperties".to_string(),
        JsonValue::Object(coord_props),
    );

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(geometry)),
        id: None,
        properties: Some(props),
        foreign_members: None,
    }
}

fn photo_to_feature(photo: &PhotoRecord) -> Feature {
    let geometry = Geometry::new(Value::Point(point_coords(&photo.coordinates())));

    let mut props = Map::new();
    props.insert("path".to_string(), JsonValue::String(photo.path().to_string()));
    props.insert(
        "matchType".to_string(),
        JsonValue::String(photo.match_type().as_str().to_string()),
    );
    props.insert("changed".to_string(), JsonValue::Bool(photo.is_changed()));
    props.insert(
        "captureTime".to_string(),
        JsonValue::String(photo.capture_time().format("%Y-%m-%dT%H:%M:%S").to_string()),
    );

    Feature {
        bbox: None,
        geometry: Some(geometry),
        id: None,
        properties: Some(props),
        foreign_members: None,
    }
}

/// Build [lon, lat] or [lon, lat, ele] coordinate array.
fn point_coords(coordinates: &Coordinates) -> Vec<f64> {
    match coordinates.alt() {
        Some(alt) => vec![coordinates.lon(), coordinates.lat(), alt],
        None => vec![coordinates.lon(), coordinates.lat()],
    }
}
