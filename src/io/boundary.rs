//! GeoJSON boundary polygons

use crate::io::error::{CamtrapError, Result, WithPath, invalid_data};
use crate::spatial::boundary::{BoundarySet, GeoRings};
use crate::spatial::crs::{Crs, GeoPoint};
use serde_json::Value;
use std::path::Path;

// Property keys tried, in order, for a region's name
const NAME_KEYS: [&str; 4] = ["name", "NAME", "Name", "conservancy"];

/// Load a GeoJSON `FeatureCollection` of polygons and project it into `crs`
///
/// Features with other geometry types are skipped.
///
/// # Errors
///
/// Returns an error if the file can't be read or isn't a feature collection
pub fn load_boundaries(path: &Path, crs: Crs) -> Result<BoundarySet> {
    let text = std::fs::read_to_string(path).map_err(|e| CamtrapError::FileSystem {
        path: path.to_path_buf(),
        operation: "read boundaries",
        source: e,
    })?;
    let document: Value = serde_json::from_str(&text).with_path(path)?;
    parse_feature_collection(&document, crs)
}

/// Convert a parsed GeoJSON document into a boundary set
///
/// # Errors
///
/// Returns an error if the document isn't a feature collection or a polygon has
/// malformed coordinates
pub fn parse_feature_collection(document: &Value, crs: Crs) -> Result<BoundarySet> {
    let features = document
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid_data(&"GeoJSON document has no 'features' array"))?;

    let mut regions = Vec::new();
    for (index, feature) in features.iter().enumerate() {
        let Some(geometry) = feature.get("geometry") else {
            continue;
        };
        let coordinates = geometry.get("coordinates");
        let polygons = match (geometry.get("type").and_then(Value::as_str), coordinates) {
            (Some("Polygon"), Some(c)) => vec![parse_polygon(c)?],
            (Some("MultiPolygon"), Some(c)) => c
                .as_array()
                .ok_or_else(|| invalid_data(&"MultiPolygon coordinates must be an array"))?
                .iter()
                .map(parse_polygon)
                .collect::<Result<Vec<_>>>()?,
            _ => continue,
        };
        regions.push((feature_name(feature, index), polygons));
    }

    Ok(BoundarySet::from_geographic(regions, crs))
}

fn feature_name(feature: &Value, index: usize) -> String {
    let properties = feature.get("properties");
    NAME_KEYS
        .iter()
        .find_map(|key| properties?.get(*key)?.as_str())
        .map_or_else(|| format!("region_{}", index + 1), str::to_string)
}

fn parse_polygon(value: &Value) -> Result<GeoRings> {
    value
        .as_array()
        .ok_or_else(|| invalid_data(&"Polygon coordinates must be an array of rings"))?
        .iter()
        .map(|ring| -> Result<Vec<GeoPoint>> {
            ring.as_array()
                .ok_or_else(|| invalid_data(&"polygon ring must be an array"))?
                .iter()
                .map(parse_position)
                .collect()
        })
        .collect()
}

fn parse_position(value: &Value) -> Result<GeoPoint> {
    let pair = value.as_array();
    let lon = pair.and_then(|p| p.first()).and_then(Value::as_f64);
    let lat = pair.and_then(|p| p.get(1)).and_then(Value::as_f64);
    match (lon, lat) {
        (Some(lon), Some(lat)) => Ok(GeoPoint { lon, lat }),
        _ => Err(invalid_data(&format!("invalid GeoJSON position {value}"))),
    }
}
