// src/io/fields.rs
use std::fs;
use std::path::Path;

use geo::{Geometry, MultiPolygon};
use geojson::{Feature, GeoJson};

use crate::error::SourceError;
use crate::geometry::Field;

/// Load field boundaries from a GeoJSON file.
pub fn load_fields(path: &Path) -> Result<Vec<Field>, SourceError> {
    let content = fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_fields(&content)
}

/// Accepts a FeatureCollection, a single Feature or a bare geometry. Field
/// names come from the `name` property, then `id`, then the feature's position.
pub fn parse_fields(text: &str) -> Result<Vec<Field>, SourceError> {
    let geojson: GeoJson = text
        .parse()
        .map_err(|e: geojson::Error| SourceError::Geometry(e.to_string()))?;

    match geojson {
        GeoJson::FeatureCollection(collection) => collection
            .features
            .into_iter()
            .enumerate()
            .map(|(i, feature)| field_from_feature(i, feature))
            .collect(),
        GeoJson::Feature(feature) => Ok(vec![field_from_feature(0, feature)?]),
        GeoJson::Geometry(geometry) => Ok(vec![Field::new("field-0", to_multipolygon(geometry)?)]),
    }
}

fn field_from_feature(index: usize, feature: Feature) -> Result<Field, SourceError> {
    let name = ["name", "id"]
        .iter()
        .find_map(|key| match feature.property(key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| format!("field-{index}"));

    let geometry = feature
        .geometry
        .ok_or_else(|| SourceError::Geometry(format!("feature '{name}' has no geometry")))?;

    Ok(Field::new(name, to_multipolygon(geometry)?))
}

fn to_multipolygon(geometry: geojson::Geometry) -> Result<MultiPolygon<f64>, SourceError> {
    let geometry: Geometry<f64> = geometry
        .try_into()
        .map_err(|e: geojson::Error| SourceError::Geometry(e.to_string()))?;

    match geometry {
        Geometry::Polygon(polygon) => Ok(polygon.into()),
        Geometry::MultiPolygon(multi) => Ok(multi),
        Geometry::Rect(rect) => Ok(rect.to_polygon().into()),
        other => Err(SourceError::Geometry(format!(
            "expected a polygon, got {}",
            geometry_kind(&other)
        ))),
    }
}

fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Triangle(_) => "Triangle",
        _ => "non-polygon geometry",
    }
}
