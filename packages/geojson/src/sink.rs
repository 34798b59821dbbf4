//! Streaming `FeatureCollection` writer.

use std::fs::File;
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};

use osm_address_feature_models::{
    Feature, FeatureSink, GeometryType, ReferenceFrame, Schema, SinkError,
};
use serde_json::{Map, Value};

use crate::{attribute_to_json, crs_member};

struct OpenFile {
    writer: BufWriter<File>,
    schema: Schema,
    written: u64,
}

/// Writes features to a GeoJSON file as they are appended.
///
/// The header is written on `open` and the closing brackets on `finish`,
/// so a run that stops early still leaves a valid file once finished.
pub struct GeoJsonSink {
    path: PathBuf,
    file: Option<OpenFile>,
}

impl GeoJsonSink {
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: None,
        }
    }
}

impl FeatureSink for GeoJsonSink {
    fn open(
        &mut self,
        schema: &Schema,
        geometry_type: GeometryType,
        frame: ReferenceFrame,
    ) -> Result<(), SinkError> {
        if self.file.is_some() {
            return Err(SinkError::AlreadyOpen);
        }

        let mut writer = BufWriter::new(File::create(&self.path)?);
        writer.write_all(br#"{"type":"FeatureCollection","#)?;

        // A null crs means no frame can be assumed; omitting it would
        // read back as EPSG:4326.
        match frame.to_urn() {
            Some(_) if frame.is_wgs84() => {}
            Some(urn) => {
                writer.write_all(br#""crs":"#)?;
                serde_json::to_writer(&mut writer, &crs_member(&urn))
                    .map_err(std::io::Error::from)?;
                writer.write_all(b",")?;
            }
            None => {
                log::warn!(
                    "Writing {} without a reference frame; coordinates keep the input's units",
                    self.path.display()
                );
                writer.write_all(br#""crs":null,"#)?;
            }
        }

        writer.write_all(b"\"features\":[\n")?;

        log::debug!(
            "Opened {} ({geometry_type:?}, {frame}, {} fields)",
            self.path.display(),
            schema.len()
        );

        self.file = Some(OpenFile {
            writer,
            schema: schema.clone(),
            written: 0,
        });
        Ok(())
    }

    fn append(&mut self, feature: Feature) -> Result<(), SinkError> {
        let file = self.file.as_mut().ok_or(SinkError::NotOpen)?;

        let properties: Map<String, Value> = file
            .schema
            .names()
            .map(|name| (name.to_string(), attribute_to_json(feature.get(name))))
            .collect();

        let out = geojson::Feature {
            bbox: None,
            geometry: feature
                .geometry()
                .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        };

        if file.written > 0 {
            file.writer.write_all(b",\n")?;
        }
        serde_json::to_writer(&mut file.writer, &out).map_err(std::io::Error::from)?;
        file.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<String, SinkError> {
        let mut file = self.file.take().ok_or(SinkError::NotOpen)?;
        file.writer.write_all(b"\n]}\n")?;
        file.writer.flush()?;

        log::debug!("Wrote {} features to {}", file.written, self.path.display());

        Ok(self.path.display().to_string())
    }
}
