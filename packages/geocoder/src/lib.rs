#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Reverse geocoding against Nominatim / OpenStreetMap.
//!
//! Turns a WGS84 `(lat, lon)` pair into the address details Nominatim
//! knows for that spot, then reduces those details to a single display
//! string in local street nomenclature:
//!
//! 1. [`nominatim`] issues the `/reverse` request. Non-200 responses and
//!    undecodable bodies are an empty result, not an error.
//! 2. [`address`] picks the street (`road`, then `neighbourhood`, then
//!    `suburb`), abbreviates it (`Calle` to `CL`, `Carrera` to `KR`, ...)
//!    and appends the house number.
//!
//! The service endpoint, client identifier and politeness delay live in
//! an embedded TOML file loaded by [`service_registry`].

pub mod address;
pub mod nominatim;
pub mod service_registry;

use async_trait::async_trait;
use thiserror::Error;

/// Address details returned by a reverse lookup.
///
/// Every field is optional; Nominatim omits whatever it does not know.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReverseAddress {
    /// Street name (e.g. `"Carrera 43A"`).
    pub road: Option<String>,
    /// Neighbourhood / barrio.
    pub neighbourhood: Option<String>,
    /// Suburb / comuna.
    pub suburb: Option<String>,
    /// House number on `road`.
    pub house_number: Option<String>,
    /// Full formatted place name (e.g. `"Parque Lleras, El Poblado, Medellín, ..."`).
    pub display_name: Option<String>,
}

/// Errors from geocoding operations.
///
/// Only transport-level failures are errors; a lookup that returns no
/// usable body is `Ok(None)`.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed (timeout, DNS, connection refused, ...).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Service configuration could not be loaded.
    #[error("Invalid service configuration: {message}")]
    Config {
        /// Description of the configuration problem.
        message: String,
    },
}

/// A reverse geocoding backend.
///
/// Implemented by [`nominatim::NominatimClient`]; tests substitute canned
/// responses.
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    /// Looks up the address at `(lat, lon)` (WGS84 degrees).
    ///
    /// Returns `Ok(None)` when the service answered without a usable
    /// result.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the request could not be completed.
    async fn reverse(&self, lat: f64, lon: f64) -> Result<Option<ReverseAddress>, GeocodeError>;
}
