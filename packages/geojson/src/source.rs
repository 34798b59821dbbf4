//! `FeatureCollection` file reader.

use std::path::Path;

use geojson::GeoJson;
use osm_address_feature_models::{
    AttributeValue, Feature, FeatureSource, Field, FieldType, GeometryType, ReferenceFrame, Schema,
};
use serde_json::{Map, Value};

use crate::{GeoJsonError, json_to_attribute};

/// A GeoJSON `FeatureCollection` loaded into memory.
#[derive(Debug, Clone)]
pub struct GeoJsonSource {
    schema: Schema,
    frame: ReferenceFrame,
    geometry_type: GeometryType,
    features: Vec<Feature>,
}

impl GeoJsonSource {
    /// Reads the file at `path`.
    ///
    /// `frame_override` takes precedence over the file's `crs` member.
    ///
    /// # Errors
    ///
    /// Returns [`GeoJsonError`] if the file cannot be read, is not GeoJSON,
    /// or is not a `FeatureCollection`.
    pub fn open(
        path: impl AsRef<Path>,
        frame_override: Option<ReferenceFrame>,
    ) -> Result<Self, GeoJsonError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let source = Self::from_str_with_frame(&text, frame_override)?;

        log::info!(
            "Loaded {} features from {} ({}, {} fields)",
            source.features.len(),
            path.display(),
            source.frame,
            source.schema.len()
        );

        Ok(source)
    }

    /// Parses GeoJSON text. See [`GeoJsonSource::open`].
    ///
    /// # Errors
    ///
    /// Returns [`GeoJsonError`] if the text is not a GeoJSON
    /// `FeatureCollection`.
    pub fn from_str_with_frame(
        text: &str,
        frame_override: Option<ReferenceFrame>,
    ) -> Result<Self, GeoJsonError> {
        let GeoJson::FeatureCollection(collection) = text.parse::<GeoJson>()? else {
            return Err(GeoJsonError::NotAFeatureCollection);
        };

        let frame = frame_override
            .unwrap_or_else(|| declared_frame(collection.foreign_members.as_ref()));

        let schema = infer_schema(&collection.features);

        let mut geometry_type = None;
        let features = collection
            .features
            .into_iter()
            .enumerate()
            .map(|(i, f)| {
                let geometry = f.geometry.and_then(|g| match geo::Geometry::<f64>::try_from(g) {
                    Ok(geometry) => Some(geometry),
                    Err(e) => {
                        log::warn!("Feature {i}: unreadable geometry: {e}");
                        None
                    }
                });

                if geometry_type.is_none() {
                    geometry_type = geometry.as_ref().map(GeometryType::of);
                }

                let mut feature = Feature::new(geometry);
                if let Some(properties) = f.properties {
                    for (name, value) in &properties {
                        feature.set(name.clone(), json_to_attribute(value));
                    }
                }
                feature
            })
            .collect();

        Ok(Self {
            schema,
            frame,
            geometry_type: geometry_type.unwrap_or(GeometryType::Unknown),
            features,
        })
    }
}

impl FeatureSource for GeoJsonSource {
    fn feature_count(&self) -> u64 {
        self.features.len() as u64
    }

    fn reference_frame(&self) -> ReferenceFrame {
        self.frame
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn geometry_type(&self) -> GeometryType {
        self.geometry_type
    }

    fn features(&mut self) -> Box<dyn Iterator<Item = Feature> + '_> {
        Box::new(std::mem::take(&mut self.features).into_iter())
    }
}

/// Reads the legacy `crs` member; RFC 7946 files without one are WGS84.
/// An explicit `null` means no frame can be assumed.
fn declared_frame(foreign_members: Option<&Map<String, Value>>) -> ReferenceFrame {
    let Some(crs) = foreign_members.and_then(|m| m.get("crs")) else {
        return ReferenceFrame::wgs84();
    };
    if crs.is_null() {
        return ReferenceFrame::Undefined;
    }

    let name = crs
        .get("properties")
        .and_then(|p| p.get("name"))
        .and_then(Value::as_str);

    match name.map(str::parse::<ReferenceFrame>) {
        Some(Ok(frame)) => frame,
        Some(Err(e)) => {
            log::warn!("{e}");
            ReferenceFrame::Undefined
        }
        None => {
            log::warn!("Unsupported crs member: {crs}");
            ReferenceFrame::Undefined
        }
    }
}

fn value_type(value: &AttributeValue) -> Option<FieldType> {
    match value {
        AttributeValue::Null => None,
        AttributeValue::Bool(_) => Some(FieldType::Bool),
        AttributeValue::Integer(_) => Some(FieldType::Integer),
        AttributeValue::Real(_) => Some(FieldType::Real),
        AttributeValue::String(_) => Some(FieldType::String),
    }
}

fn widen(current: FieldType, next: FieldType) -> FieldType {
    match (current, next) {
        (a, b) if a == b => a,
        (FieldType::Integer, FieldType::Real) | (FieldType::Real, FieldType::Integer) => {
            FieldType::Real
        }
        _ => FieldType::String,
    }
}

/// Builds a schema from property names in order of first appearance.
fn infer_schema(features: &[geojson::Feature]) -> Schema {
    let mut columns: Vec<(String, Option<FieldType>)> = Vec::new();

    for properties in features.iter().filter_map(|f| f.properties.as_ref()) {
        for (name, value) in properties {
            let observed = value_type(&json_to_attribute(value));
            match columns.iter_mut().find(|(n, _)| n == name) {
                Some((_, current)) => {
                    *current = match (*current, observed) {
                        (Some(a), Some(b)) => Some(widen(a, b)),
                        (a, b) => a.or(b),
                    };
                }
                None => columns.push((name.clone(), observed)),
            }
        }
    }

    let fields = columns
        .into_iter()
        .map(|(name, ty)| Field::new(name, ty.unwrap_or(FieldType::String)))
        .collect::<Vec<_>>();

    // Names come from JSON object keys, so they are already unique.
    Schema::new(fields).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROJECTED: &str = r#"{
        "type": "FeatureCollection",
        "crs": { "type": "name", "properties": { "name": "urn:ogc:def:crs:EPSG::3116" } },
        "features": [
            { "type": "Feature", "geometry": { "type": "Point", "coordinates": [1000000.0, 1000000.0] },
              "properties": { "id": 1, "altura": 2600, "nombre": "Plaza" } },
            { "type": "Feature", "geometry": { "type": "Point", "coordinates": [1000500.5, 1001200.25] },
              "properties": { "id": 2, "altura": 2610.5, "nombre": null } }
        ]
    }"#;

    #[test]
    fn reads_named_crs_and_features() {
        let mut source = GeoJsonSource::from_str_with_frame(PROJECTED, None).unwrap();

        assert_eq!(source.reference_frame(), ReferenceFrame::Epsg(3116));
        assert_eq!(source.geometry_type(), GeometryType::Point);
        assert_eq!(source.feature_count(), 2);

        let features: Vec<Feature> = source.features().collect();
        assert_eq!(
            features[1].geometry(),
            Some(&geo::Geometry::Point(geo::Point::new(
                1_000_500.5,
                1_001_200.25
            )))
        );
        assert_eq!(features[0].get("nombre"), &AttributeValue::from("Plaza"));
        assert_eq!(features[1].get("nombre"), &AttributeValue::Null);
    }

    #[test]
    fn infers_and_widens_field_types() {
        let source = GeoJsonSource::from_str_with_frame(PROJECTED, None).unwrap();
        let schema = source.schema();

        assert_eq!(schema.len(), 3);
        assert_eq!(schema.field("id").unwrap().field_type, FieldType::Integer);
        assert_eq!(schema.field("altura").unwrap().field_type, FieldType::Real);
        assert_eq!(schema.field("nombre").unwrap().field_type, FieldType::String);
    }

    #[test]
    fn missing_crs_is_wgs84() {
        let text = r#"{"type":"FeatureCollection","features":[]}"#;
        let source = GeoJsonSource::from_str_with_frame(text, None).unwrap();
        assert_eq!(source.reference_frame(), ReferenceFrame::wgs84());
        assert_eq!(source.geometry_type(), GeometryType::Unknown);
        assert!(source.schema().is_empty());
    }

    #[test]
    fn override_wins_over_declared_crs() {
        let source =
            GeoJsonSource::from_str_with_frame(PROJECTED, Some(ReferenceFrame::Epsg(9377)))
                .unwrap();
        assert_eq!(source.reference_frame(), ReferenceFrame::Epsg(9377));
    }

    #[test]
    fn unreadable_crs_is_undefined() {
        let text = r#"{"type":"FeatureCollection",
            "crs":{"type":"name","properties":{"name":"local grid"}},
            "features":[]}"#;
        let source = GeoJsonSource::from_str_with_frame(text, None).unwrap();
        assert_eq!(source.reference_frame(), ReferenceFrame::Undefined);
    }

    #[test]
    fn null_crs_is_undefined() {
        let text = r#"{"type":"FeatureCollection","crs":null,"features":[]}"#;
        let source = GeoJsonSource::from_str_with_frame(text, None).unwrap();
        assert_eq!(source.reference_frame(), ReferenceFrame::Undefined);
    }

    #[test]
    fn conflicting_types_widen_to_string() {
        let text = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","geometry":null,"properties":{"code":1}},
            {"type":"Feature","geometry":null,"properties":{"code":"A1"}}
        ]}"#;
        let source = GeoJsonSource::from_str_with_frame(text, None).unwrap();
        assert_eq!(
            source.schema().field("code").unwrap().field_type,
            FieldType::String
        );
    }

    #[test]
    fn bare_geometry_is_rejected() {
        let text = r#"{"type":"Point","coordinates":[0.0,0.0]}"#;
        assert!(matches!(
            GeoJsonSource::from_str_with_frame(text, None),
            Err(GeoJsonError::NotAFeatureCollection)
        ));
    }

    #[test]
    fn opens_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("puntos.geojson");
        std::fs::write(&path, PROJECTED).unwrap();

        let source = GeoJsonSource::open(&path, None).unwrap();
        assert_eq!(source.feature_count(), 2);
    }
}
