#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Feature, schema, and reference frame types.
//!
//! These types re-express a host GIS object model as a few narrow pieces:
//! a [`FeatureSource`] that yields features with a known [`Schema`] and
//! [`ReferenceFrame`], and a [`FeatureSink`] that is opened once with the
//! output schema and then only appended to.

pub mod memory;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

pub use geo::Geometry;

/// EPSG code of geographic WGS84 (longitude/latitude in degrees).
pub const WGS84_EPSG: u32 = 4326;

/// Coordinate reference system a collection's geometries are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceFrame {
    /// A frame identified by its EPSG code.
    Epsg(u32),
    /// The collection carries no usable frame definition.
    Undefined,
}

impl ReferenceFrame {
    /// Geographic WGS84 (EPSG:4326).
    #[must_use]
    pub const fn wgs84() -> Self {
        Self::Epsg(WGS84_EPSG)
    }

    /// Returns the EPSG code, if the frame is defined.
    #[must_use]
    pub const fn epsg(&self) -> Option<u32> {
        match self {
            Self::Epsg(code) => Some(*code),
            Self::Undefined => None,
        }
    }

    /// Whether this frame is geographic WGS84.
    #[must_use]
    pub const fn is_wgs84(&self) -> bool {
        matches!(self, Self::Epsg(WGS84_EPSG))
    }

    /// Returns the OGC URN form (e.g. `urn:ogc:def:crs:EPSG::3116`).
    #[must_use]
    pub fn to_urn(&self) -> Option<String> {
        self.epsg().map(|code| format!("urn:ogc:def:crs:EPSG::{code}"))
    }
}

impl fmt::Display for ReferenceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Epsg(code) => write!(f, "EPSG:{code}"),
            Self::Undefined => f.write_str("undefined"),
        }
    }
}

/// Error parsing a [`ReferenceFrame`] identifier.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unrecognized reference frame identifier: '{0}'")]
pub struct ParseFrameError(pub String);

impl FromStr for ReferenceFrame {
    type Err = ParseFrameError;

    /// Accepts `EPSG:3116`, `3116`, `urn:ogc:def:crs:EPSG::3116`,
    /// `urn:ogc:def:crs:OGC:1.3:CRS84` and `OGC:CRS84`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let upper = trimmed.to_ascii_uppercase();

        if upper.ends_with("CRS84") {
            return Ok(Self::wgs84());
        }

        let code = upper
            .strip_prefix("URN:OGC:DEF:CRS:EPSG:")
            .map(|rest| rest.trim_start_matches(':'))
            .or_else(|| upper.strip_prefix("EPSG:"))
            .unwrap_or(&upper);

        code.parse::<u32>()
            .map(Self::Epsg)
            .map_err(|_| ParseFrameError(trimmed.to_string()))
    }
}

/// Geometry type declared for a whole collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryType {
    Point,
    MultiPoint,
    Unknown,
}

impl GeometryType {
    /// Classifies a single geometry.
    #[must_use]
    pub const fn of(geometry: &Geometry<f64>) -> Self {
        match geometry {
            Geometry::Point(_) => Self::Point,
            Geometry::MultiPoint(_) => Self::MultiPoint,
            _ => Self::Unknown,
        }
    }
}

/// Type of an attribute column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Bool,
    Integer,
    Real,
    String,
}

/// A named, typed attribute column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Column name, unique within a [`Schema`].
    pub name: String,
    /// Value type.
    pub field_type: FieldType,
    /// Maximum length for string columns, if declared.
    pub length: Option<usize>,
}

impl Field {
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            length: None,
        }
    }

    /// A string column with a declared maximum length.
    #[must_use]
    pub fn string(name: impl Into<String>, length: usize) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::String,
            length: Some(length),
        }
    }
}

/// Errors building a [`Schema`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// Two fields share a name.
    #[error("Duplicate field name: '{0}'")]
    DuplicateField(String),
}

/// Ordered set of uniquely named fields shared by every feature in a
/// collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    /// Builds a schema, rejecting duplicate names.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::DuplicateField`] if two fields share a name.
    pub fn new(fields: Vec<Field>) -> Result<Self, SchemaError> {
        let mut schema = Self::default();
        for field in fields {
            schema.push(field)?;
        }
        Ok(schema)
    }

    fn push(&mut self, field: Field) -> Result<(), SchemaError> {
        if self.contains(&field.name) {
            return Err(SchemaError::DuplicateField(field.name));
        }
        self.fields.push(field);
        Ok(())
    }

    /// Returns a copy of this schema with `field` appended at the end.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::DuplicateField`] if the name is already taken.
    pub fn with_appended(&self, field: Field) -> Result<Self, SchemaError> {
        let mut schema = self.clone();
        schema.push(field)?;
        Ok(schema)
    }

    /// Field names in declared order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A single attribute value.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum AttributeValue {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    String(String),
}

impl AttributeValue {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// A geometry plus attribute values keyed by field name.
///
/// Missing attributes read as [`AttributeValue::Null`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Feature {
    geometry: Option<Geometry<f64>>,
    attributes: BTreeMap<String, AttributeValue>,
}

impl Feature {
    #[must_use]
    pub fn new(geometry: Option<Geometry<f64>>) -> Self {
        Self {
            geometry,
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style attribute setter.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.set(name, value);
        self
    }

    #[must_use]
    pub const fn geometry(&self) -> Option<&Geometry<f64>> {
        self.geometry.as_ref()
    }

    pub fn set_geometry(&mut self, geometry: Option<Geometry<f64>>) {
        self.geometry = geometry;
    }

    /// Returns the value stored under `name`, or `Null` when absent.
    #[must_use]
    pub fn get(&self, name: &str) -> &AttributeValue {
        static NULL: AttributeValue = AttributeValue::Null;
        self.attributes.get(name).unwrap_or(&NULL)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<AttributeValue>) {
        self.attributes.insert(name.into(), value.into());
    }
}

/// A finite, forward-only collection of features with a shared schema and
/// reference frame.
pub trait FeatureSource {
    /// Total number of features the source will yield.
    fn feature_count(&self) -> u64;

    fn reference_frame(&self) -> ReferenceFrame;

    fn schema(&self) -> &Schema;

    fn geometry_type(&self) -> GeometryType;

    /// Yields the features in order. Sources are not restartable, so
    /// calling this twice may yield nothing the second time.
    fn features(&mut self) -> Box<dyn Iterator<Item = Feature> + '_>;
}

/// Errors from a [`FeatureSink`].
#[derive(Debug, Error)]
pub enum SinkError {
    /// Writing to the underlying storage failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `open` was called on a sink that is already open.
    #[error("Sink is already open")]
    AlreadyOpen,

    /// `append` or `finish` was called before `open`.
    #[error("Sink has not been opened")]
    NotOpen,
}

/// Append-only destination for enriched features.
pub trait FeatureSink {
    /// Opens the sink with the output schema, geometry type and frame.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the sink is already open or the underlying
    /// storage cannot be created.
    fn open(
        &mut self,
        schema: &Schema,
        geometry_type: GeometryType,
        frame: ReferenceFrame,
    ) -> Result<(), SinkError>;

    /// Appends one feature.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the sink is not open or the write fails.
    fn append(&mut self, feature: Feature) -> Result<(), SinkError>;

    /// Flushes pending output and returns an identifier for the populated
    /// collection.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the sink is not open or the flush fails.
    fn finish(&mut self) -> Result<String, SinkError>;
}
