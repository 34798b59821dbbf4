#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Reverse geocoding enrichment of point collections.
//!
//! Reads every feature from a [`FeatureSource`], reprojects its point to
//! WGS84, asks a [`ReverseGeocoder`] for the address at that spot,
//! normalizes the street nomenclature, and appends a copy of the feature
//! to a [`FeatureSink`] with one extra string attribute,
//! [`ADDRESS_FIELD`]. The stored geometry and reference frame are the
//! source's own; the WGS84 coordinates only feed the lookup.
//!
//! Features are processed strictly one at a time with a fixed pause
//! after each, to stay within the geocoding service's usage policy.
//! A failure on one feature never aborts the run: the feature is still
//! emitted with `"Error: {message}"` as its address.

pub mod feedback;

use std::time::Duration;

use osm_address_crs::{CoordinateTransform, CrsError};
use osm_address_feature_models::{
    Feature, FeatureSink, FeatureSource, Field, ReferenceFrame, Schema, SchemaError, SinkError,
};
use osm_address_geocoder::ReverseGeocoder;
use osm_address_geocoder::address::resolve_address;
use osm_address_geocoder::nominatim::NominatimClient;
use osm_address_geocoder::service_registry::ReverseService;
use thiserror::Error;

pub use feedback::{Feedback, NullFeedback};

/// Name of the attribute appended to every output feature.
pub const ADDRESS_FIELD: &str = "direccion_osm";

/// Declared maximum length of [`ADDRESS_FIELD`], in characters.
pub const ADDRESS_FIELD_LENGTH: usize = 255;

/// Default pause between successive geocoding requests.
pub const DEFAULT_REQUEST_INTERVAL: Duration = Duration::from_millis(1100);

/// Run-level errors. Per-feature problems never surface here.
#[derive(Debug, Error)]
pub enum EnrichError {
    /// The output schema could not be built (the input already has the
    /// address attribute).
    #[error("Output schema error: {0}")]
    Schema(#[from] SchemaError),

    /// The output sink failed to open, accept a feature, or finish.
    #[error("Output sink error: {0}")]
    Sink(#[from] SinkError),
}

/// Tuning for a pipeline run.
#[derive(Debug, Clone)]
pub struct EnrichOptions {
    /// Pause after each emitted feature.
    pub request_interval: Duration,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            request_interval: DEFAULT_REQUEST_INTERVAL,
        }
    }
}

impl From<&ReverseService> for EnrichOptions {
    fn from(service: &ReverseService) -> Self {
        Self {
            request_interval: service.request_interval(),
        }
    }
}

/// What happened to a single feature's address lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureOutcome {
    /// The lookup completed (possibly with the no-data fallback).
    Resolved(String),
    /// Reprojection or the request failed.
    Failed(String),
}

impl FeatureOutcome {
    /// The value stored in [`ADDRESS_FIELD`].
    #[must_use]
    pub fn into_address(self) -> String {
        match self {
            Self::Resolved(address) => address,
            Self::Failed(message) => format!("Error: {message}"),
        }
    }
}

/// Result of a completed (or canceled) run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichSummary {
    /// Identifier of the populated output collection.
    pub output_id: String,
    /// Feature count announced by the source.
    pub total: u64,
    /// Features appended to the sink.
    pub emitted: u64,
    /// Emitted features whose address is an error marker.
    pub failed: u64,
    /// Whether the run stopped early on request.
    pub canceled: bool,
}

/// Builds the output schema: the input fields followed by
/// [`ADDRESS_FIELD`].
///
/// # Errors
///
/// Returns [`SchemaError::DuplicateField`] if the input already has a
/// field with that name.
pub fn output_schema(input: &Schema) -> Result<Schema, SchemaError> {
    input.with_appended(Field::string(ADDRESS_FIELD, ADDRESS_FIELD_LENGTH))
}

/// Reprojects, looks up and resolves the address of one feature.
async fn resolve_feature(
    feature: &Feature,
    transform: Result<&CoordinateTransform, &CrsError>,
    geocoder: &dyn ReverseGeocoder,
) -> FeatureOutcome {
    let transform = match transform {
        Ok(transform) => transform,
        Err(e) => return FeatureOutcome::Failed(e.to_string()),
    };

    let Some(geometry) = feature.geometry() else {
        return FeatureOutcome::Failed(CrsError::NotAPoint.to_string());
    };

    let (lon, lat) = match transform.transform_point(geometry) {
        Ok(coords) => coords,
        Err(e) => return FeatureOutcome::Failed(e.to_string()),
    };

    match geocoder.reverse(lat, lon).await {
        Ok(result) => FeatureOutcome::Resolved(resolve_address(result.as_ref())),
        Err(e) => FeatureOutcome::Failed(e.to_string()),
    }
}

/// Copies every input attribute by name, the original geometry, and the
/// address into a new feature.
fn build_output(input_schema: &Schema, source: &Feature, address: String) -> Feature {
    let mut out = Feature::new(source.geometry().cloned());
    for name in input_schema.names() {
        out.set(name, source.get(name).clone());
    }
    out.set(ADDRESS_FIELD, truncate_chars(address, ADDRESS_FIELD_LENGTH));
    out
}

fn truncate_chars(mut value: String, max: usize) -> String {
    if let Some((idx, _)) = value.char_indices().nth(max) {
        value.truncate(idx);
    }
    value
}

fn progress_percent(index: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    u8::try_from((index.saturating_mul(100) / total).min(100)).unwrap_or(100)
}

/// Enriches every feature of `source` into `sink`.
///
/// The coordinate transform, output schema and sink are set up once. Then,
/// for each feature in order: poll for cancellation, resolve the address,
/// append the enriched copy, report `floor(i / total * 100)` percent, and
/// pause for `options.request_interval`.
///
/// Cancellation stops before the next feature; features already appended
/// stay in the sink, which is still finished.
///
/// # Errors
///
/// Returns [`EnrichError`] if the output schema cannot be built or the
/// sink fails. Per-feature failures are recorded in the feature itself.
pub async fn enrich(
    source: &mut dyn FeatureSource,
    sink: &mut dyn FeatureSink,
    geocoder: &dyn ReverseGeocoder,
    feedback: &dyn Feedback,
    options: &EnrichOptions,
) -> Result<EnrichSummary, EnrichError> {
    let input_schema = source.schema().clone();
    let frame = source.reference_frame();
    let total = source.feature_count();

    let transform = CoordinateTransform::new(frame, ReferenceFrame::wgs84());
    if let Err(e) = &transform {
        log::warn!("No coordinate transform from {frame}: {e}");
    }

    let schema = output_schema(&input_schema)?;
    sink.open(&schema, source.geometry_type(), frame)?;

    feedback.push_info(&format!("Starting reverse geocoding of {total} points..."));
    log::info!("Reverse geocoding {total} features in {frame}");

    let mut emitted = 0u64;
    let mut failed = 0u64;
    let mut canceled = false;

    for (i, feature) in (0u64..).zip(source.features()) {
        if feedback.is_canceled() {
            log::warn!("Canceled after {emitted} of {total} features");
            canceled = true;
            break;
        }

        let outcome = resolve_feature(&feature, transform.as_ref(), geocoder).await;
        match &outcome {
            FeatureOutcome::Resolved(address) => {
                log::debug!("Feature {i}: {address}");
            }
            FeatureOutcome::Failed(message) => {
                log::warn!("Feature {i} failed: {message}");
                failed += 1;
            }
        }

        sink.append(build_output(&input_schema, &feature, outcome.into_address()))?;
        emitted += 1;

        feedback.set_progress(progress_percent(i, total));
        tokio::time::sleep(options.request_interval).await;
    }

    let output_id = sink.finish()?;

    log::info!("Emitted {emitted} of {total} features ({failed} failed) to {output_id}");

    Ok(EnrichSummary {
        output_id,
        total,
        emitted,
        failed,
        canceled,
    })
}

/// Runs [`enrich`] against the configured Nominatim service.
///
/// If the HTTP client cannot be built the problem is reported once via
/// `feedback` and `Ok(None)` is returned without reading the source or
/// opening the sink.
///
/// # Errors
///
/// See [`enrich`].
pub async fn run(
    source: &mut dyn FeatureSource,
    sink: &mut dyn FeatureSink,
    service: &ReverseService,
    feedback: &dyn Feedback,
) -> Result<Option<EnrichSummary>, EnrichError> {
    let client = match NominatimClient::new(service) {
        Ok(client) => client,
        Err(e) => {
            log::error!("Failed to create HTTP client for {}: {e}", service.name);
            feedback.report_error(&format!("HTTP client unavailable: {e}"));
            return Ok(None);
        }
    };

    enrich(source, sink, &client, feedback, &EnrichOptions::from(service))
        .await
        .map(Some)
}
