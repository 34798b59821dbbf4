#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for adding OpenStreetMap addresses to point layers.
//!
//! Reads a GeoJSON `FeatureCollection`, reverse geocodes every point
//! through Nominatim one request at a time, and writes a copy with a
//! `direccion_osm` attribute. Ctrl-C stops after the current feature and
//! still leaves a readable output file.

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use osm_address_cli_utils::IndicatifFeedback;
use osm_address_feature_models::ReferenceFrame;
use osm_address_geocoder::service_registry::reverse_service;
use osm_address_geojson::{GeoJsonSink, GeoJsonSource};

#[derive(Parser)]
#[command(
    name = "osm_address",
    about = "Add OpenStreetMap street addresses to a GeoJSON point layer"
)]
struct Cli {
    /// Input GeoJSON `FeatureCollection` of points
    #[arg(long, short)]
    input: PathBuf,
    /// Output GeoJSON file (overwritten)
    #[arg(long, short)]
    output: PathBuf,
    /// Reference frame of the input coordinates (e.g., "EPSG:3116").
    /// Overrides the file's `crs` member.
    #[arg(long)]
    crs: Option<ReferenceFrame>,
    /// Nominatim `/reverse` endpoint (overrides `OSM_ADDRESS_NOMINATIM_URL`)
    #[arg(long)]
    base_url: Option<String>,
    /// Minimum pause between requests in milliseconds. The public
    /// Nominatim instance allows one request per second.
    #[arg(long)]
    rate_limit_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = osm_address_cli_utils::init_logger();
    let cli = Cli::parse();

    let mut service = reverse_service()?;
    if let Some(url) = cli.base_url {
        service.base_url = url;
    }
    if let Some(ms) = cli.rate_limit_ms {
        service.rate_limit_ms = ms;
    }
    log::info!(
        "Using {} at {} ({}ms between requests)",
        service.name,
        service.base_url,
        service.rate_limit_ms
    );

    let mut source = GeoJsonSource::open(&cli.input, cli.crs)?;
    let mut sink = GeoJsonSink::new(&cli.output);

    let feedback = IndicatifFeedback::percent_bar(&multi, "Geocoding");
    feedback.cancel_on_ctrl_c();

    let start = Instant::now();
    let summary =
        osm_address_enrich::run(&mut source, &mut sink, &service, feedback.as_ref()).await?;

    let Some(summary) = summary else {
        return Err("Reverse geocoding could not start".into());
    };

    let status = if summary.canceled {
        "canceled"
    } else {
        "done"
    };
    feedback.finish(format!("Geocoding {status}"));

    println!(
        "{status}: {}/{} features written to {} ({} failed) in {:.1}s",
        summary.emitted,
        summary.total,
        summary.output_id,
        summary.failed,
        start.elapsed().as_secs_f64()
    );

    Ok(())
}
