//! In-memory [`FeatureSource`] and [`FeatureSink`] implementations.
//!
//! Used by embedding hosts that already hold their features in memory,
//! and by tests.

use crate::{Feature, FeatureSink, FeatureSource, GeometryType, ReferenceFrame, Schema, SinkError};

/// A [`FeatureSource`] over an owned `Vec<Feature>`.
#[derive(Debug, Clone)]
pub struct MemorySource {
    schema: Schema,
    frame: ReferenceFrame,
    geometry_type: GeometryType,
    features: Vec<Feature>,
}

impl MemorySource {
    #[must_use]
    pub const fn new(
        schema: Schema,
        frame: ReferenceFrame,
        geometry_type: GeometryType,
        features: Vec<Feature>,
    ) -> Self {
        Self {
            schema,
            frame,
            geometry_type,
            features,
        }
    }
}

impl FeatureSource for MemorySource {
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

/// Metadata a [`MemorySink`] was opened with.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkLayout {
    pub schema: Schema,
    pub geometry_type: GeometryType,
    pub frame: ReferenceFrame,
}

/// A [`FeatureSink`] that collects features into a `Vec`.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    id: String,
    layout: Option<SinkLayout>,
    features: Vec<Feature>,
    finished: bool,
}

impl MemorySink {
    /// Creates a sink whose [`FeatureSink::finish`] returns `id`.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// What the sink was opened with, if it has been opened.
    #[must_use]
    pub const fn layout(&self) -> Option<&SinkLayout> {
        self.layout.as_ref()
    }

    #[must_use]
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }
}

impl FeatureSink for MemorySink {
    fn open(
        &mut self,
        schema: &Schema,
        geometry_type: GeometryType,
        frame: ReferenceFrame,
    ) -> Result<(), SinkError> {
        if self.layout.is_some() {
            return Err(SinkError::AlreadyOpen);
        }
        self.layout = Some(SinkLayout {
            schema: schema.clone(),
            geometry_type,
            frame,
        });
        Ok(())
    }

    fn append(&mut self, feature: Feature) -> Result<(), SinkError> {
        if self.layout.is_none() {
            return Err(SinkError::NotOpen);
        }
        self.features.push(feature);
        Ok(())
    }

    fn finish(&mut self) -> Result<String, SinkError> {
        if self.layout.is_none() {
            return Err(SinkError::NotOpen);
        }
        self.finished = true;
        Ok(self.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Field, FieldType};

    #[test]
    fn source_is_forward_only() {
        let mut source = MemorySource::new(
            Schema::default(),
            ReferenceFrame::wgs84(),
            GeometryType::Point,
            vec![Feature::new(None), Feature::new(None)],
        );

        assert_eq!(source.feature_count(), 2);
        assert_eq!(source.features().count(), 2);
        assert_eq!(source.features().count(), 0);
    }

    #[test]
    fn sink_requires_open_before_append() {
        let mut sink = MemorySink::new("memory");
        assert!(matches!(
            sink.append(Feature::new(None)),
            Err(SinkError::NotOpen)
        ));
        assert!(matches!(sink.finish(), Err(SinkError::NotOpen)));
    }

    #[test]
    fn sink_rejects_second_open() {
        let schema = Schema::new(vec![Field::new("id", FieldType::Integer)]).unwrap();
        let mut sink = MemorySink::new("memory");

        sink.open(&schema, GeometryType::Point, ReferenceFrame::Epsg(3116))
            .unwrap();
        assert!(matches!(
            sink.open(&schema, GeometryType::Point, ReferenceFrame::Epsg(3116)),
            Err(SinkError::AlreadyOpen)
        ));

        sink.append(Feature::new(None)).unwrap();
        assert_eq!(sink.finish().unwrap(), "memory");
        assert_eq!(sink.features().len(), 1);
        assert_eq!(sink.layout().unwrap().frame, ReferenceFrame::Epsg(3116));
        assert!(sink.is_finished());
    }
}
