#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! GeoJSON files as feature sources and sinks.
//!
//! [`GeoJsonSource`] loads a `FeatureCollection`, infers its attribute
//! schema from the feature properties and reads the reference frame from
//! the legacy `crs` member (RFC 7946 files without one are EPSG:4326).
//! [`GeoJsonSink`] streams a `FeatureCollection` back to disk one feature
//! at a time, writing a `crs` member for anything other than EPSG:4326 so
//! projected coordinates stay interpretable. An undefined frame is written
//! as `"crs": null` rather than left to the EPSG:4326 default.

mod sink;
mod source;

pub use sink::GeoJsonSink;
pub use source::GeoJsonSource;

use osm_address_feature_models::AttributeValue;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors reading a GeoJSON source.
#[derive(Debug, Error)]
pub enum GeoJsonError {
    /// Reading the file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid GeoJSON.
    #[error("GeoJSON error: {0}")]
    Parse(#[from] geojson::Error),

    /// The top-level object is a bare geometry or feature.
    #[error("Expected a FeatureCollection")]
    NotAFeatureCollection,
}

/// Converts a JSON property to an attribute value. Arrays and objects are
/// kept as their JSON text.
fn json_to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null,
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => n.as_i64().map_or_else(
            || n.as_f64().map_or(AttributeValue::Null, AttributeValue::Real),
            AttributeValue::Integer,
        ),
        Value::String(s) => AttributeValue::String(s.clone()),
        Value::Array(_) | Value::Object(_) => AttributeValue::String(value.to_string()),
    }
}

fn attribute_to_json(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::Null => Value::Null,
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Integer(i) => Value::from(*i),
        AttributeValue::Real(f) => serde_json::Number::from_f64(*f).map_or(Value::Null, Value::Number),
        AttributeValue::String(s) => Value::String(s.clone()),
    }
}

/// Legacy GeoJSON 2008 named CRS member for `urn`.
fn crs_member(urn: &str) -> Value {
    let mut properties = Map::new();
    properties.insert("name".to_string(), Value::String(urn.to_string()));

    let mut crs = Map::new();
    crs.insert("type".to_string(), Value::String("name".to_string()));
    crs.insert("properties".to_string(), Value::Object(properties));
    Value::Object(crs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_json_numbers() {
        assert_eq!(
            json_to_attribute(&serde_json::json!(7)),
            AttributeValue::Integer(7)
        );
        assert_eq!(
            json_to_attribute(&serde_json::json!(7.5)),
            AttributeValue::Real(7.5)
        );
    }

    #[test]
    fn nested_values_become_text() {
        assert_eq!(
            json_to_attribute(&serde_json::json!({"a": 1})),
            AttributeValue::String(r#"{"a":1}"#.to_string())
        );
    }

    #[test]
    fn non_finite_real_writes_null() {
        assert_eq!(attribute_to_json(&AttributeValue::Real(f64::NAN)), Value::Null);
    }

    #[test]
    fn builds_named_crs_member() {
        let crs = crs_member("urn:ogc:def:crs:EPSG::3116");
        assert_eq!(crs["type"], "name");
        assert_eq!(crs["properties"]["name"], "urn:ogc:def:crs:EPSG::3116");
    }
}
