#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Reprojection of point geometries to geographic WGS84.
//!
//! A [`CoordinateTransform`] is built once per run from the collection's
//! [`ReferenceFrame`] and then applied to each feature's geometry. The
//! geometry is only borrowed; callers keep the original untouched.
//!
//! Supported source frames:
//!
//! - EPSG:4326 and EPSG:4686 (MAGNA-SIRGAS geographic): identity
//! - EPSG:3857 / EPSG:900913: spherical Web Mercator
//! - EPSG:326xx / 327xx: WGS84 UTM north / south
//! - EPSG:3114 to 3118 and EPSG:9377: MAGNA-SIRGAS Colombia zones and
//!   Origen-Nacional, Transverse Mercator on GRS80
//!
//! Projection formulas follow Snyder 1987 (USGS Prof. Paper 1395). No
//! external C dependencies (no libproj).

use geo::Geometry;
use osm_address_feature_models::{ReferenceFrame, WGS84_EPSG};
use thiserror::Error;

/// Errors building or applying a [`CoordinateTransform`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CrsError {
    /// The source collection has no reference frame.
    #[error("Source reference frame is undefined")]
    UndefinedSource,

    /// The requested source frame has no inverse projection here.
    #[error("Unsupported source reference frame: {0}")]
    UnsupportedSource(ReferenceFrame),

    /// Only geographic WGS84 is supported as a target.
    #[error("Unsupported target reference frame: {0}")]
    UnsupportedTarget(ReferenceFrame),

    /// The geometry is missing or is not a single point.
    #[error("Geometry is not a point")]
    NotAPoint,

    /// The transformed coordinate is not a valid longitude/latitude.
    #[error("Coordinate ({x}, {y}) is out of range for {frame}")]
    OutOfBounds {
        /// Source x (easting or longitude).
        x: f64,
        /// Source y (northing or latitude).
        y: f64,
        /// Source frame.
        frame: ReferenceFrame,
    },
}

/// Reference ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Ellipsoid {
    /// Semi-major axis (m).
    a: f64,
    /// Flattening.
    f: f64,
}

const WGS84: Ellipsoid = Ellipsoid {
    a: 6_378_137.0,
    f: 1.0 / 298.257_223_563,
};

const GRS80: Ellipsoid = Ellipsoid {
    a: 6_378_137.0,
    f: 1.0 / 298.257_222_101,
};

impl Ellipsoid {
    /// Eccentricity squared.
    fn e2(self) -> f64 {
        2.0f64.mul_add(self.f, -self.f * self.f)
    }

    /// Second eccentricity squared.
    fn ep2(self) -> f64 {
        let e2 = self.e2();
        e2 / (1.0 - e2)
    }

    /// Meridional arc from the equator to `lat` radians (Snyder eq. 3-21).
    fn meridional_arc(self, lat: f64) -> f64 {
        let e2 = self.e2();
        let e4 = e2 * e2;
        let e6 = e4 * e2;

        self.a
            * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
                - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
                + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
                - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
    }
}

/// Transverse Mercator projection parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
struct TransverseMercator {
    ellipsoid: Ellipsoid,
    /// Latitude of origin (degrees).
    lat0: f64,
    /// Central meridian (degrees).
    lon0: f64,
    /// Scale factor on the central meridian.
    k0: f64,
    false_easting: f64,
    false_northing: f64,
}

impl TransverseMercator {
    fn utm(zone: u32, north: bool) -> Self {
        Self {
            ellipsoid: WGS84,
            lat0: 0.0,
            lon0: f64::from(zone).mul_add(6.0, -183.0),
            k0: 0.9996,
            false_easting: 500_000.0,
            false_northing: if north { 0.0 } else { 10_000_000.0 },
        }
    }

    /// MAGNA-SIRGAS Colombia zone (EPSG:3114-3118), 3° apart.
    const fn magna_zone(lon0: f64) -> Self {
        Self {
            ellipsoid: GRS80,
            lat0: 4.596_200_416_666_666,
            lon0,
            k0: 1.0,
            false_easting: 1_000_000.0,
            false_northing: 1_000_000.0,
        }
    }

    /// MAGNA-SIRGAS / Origen-Nacional (EPSG:9377).
    const fn origen_nacional() -> Self {
        Self {
            ellipsoid: GRS80,
            lat0: 4.0,
            lon0: -73.0,
            k0: 0.9992,
            false_easting: 5_000_000.0,
            false_northing: 2_000_000.0,
        }
    }

    /// Inverse projection: (easting, northing) metres to (lon, lat)
    /// degrees. Snyder eqs. 8-12 to 8-25.
    fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let el = self.ellipsoid;
        let a = el.a;
        let e2 = el.e2();
        let ep2 = el.ep2();
        let k0 = self.k0;

        let m0 = el.meridional_arc(self.lat0.to_radians());
        let m = m0 + (y - self.false_northing) / k0;
        let mu = m / (a * (1.0 - e2 / 4.0 - 3.0 * e2 * e2 / 64.0 - 5.0 * e2 * e2 * e2 / 256.0));

        let root = (1.0 - e2).sqrt();
        let e1 = (1.0 - root) / (1.0 + root);
        let e1_2 = e1 * e1;
        let e1_3 = e1_2 * e1;
        let e1_4 = e1_3 * e1;

        // Footpoint latitude
        let phi1 = mu
            + (3.0 * e1 / 2.0 - 27.0 * e1_3 / 32.0) * (2.0 * mu).sin()
            + (21.0 * e1_2 / 16.0 - 55.0 * e1_4 / 32.0) * (4.0 * mu).sin()
            + (151.0 * e1_3 / 96.0) * (6.0 * mu).sin()
            + (1097.0 * e1_4 / 512.0) * (8.0 * mu).sin();

        let sin1 = phi1.sin();
        let cos1 = phi1.cos();
        let tan1 = phi1.tan();

        let c1 = ep2 * cos1 * cos1;
        let t1 = tan1 * tan1;
        let w = e2.mul_add(-sin1 * sin1, 1.0);
        let n1 = a / w.sqrt();
        let r1 = a * (1.0 - e2) / w.powf(1.5);
        let d = (x - self.false_easting) / (n1 * k0);

        let d2 = d * d;
        let d3 = d2 * d;
        let d4 = d2 * d2;
        let d5 = d4 * d;
        let d6 = d4 * d2;

        let lat = phi1
            - (n1 * tan1 / r1)
                * (d2 / 2.0
                    - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d4 / 24.0
                    + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1
                        - 252.0 * ep2
                        - 3.0 * c1 * c1)
                        * d6
                        / 720.0);

        let lon = self.lon0.to_radians()
            + (d - (1.0 + 2.0 * t1 + c1) * d3 / 6.0
                + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1) * d5
                    / 120.0)
                / cos1;

        (lon.to_degrees(), lat.to_degrees())
    }
}

/// Inverse projection selected for a source frame.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Projection {
    Geographic,
    WebMercator,
    TransverseMercator(TransverseMercator),
}

impl Projection {
    fn for_epsg(code: u32) -> Option<Self> {
        match code {
            WGS84_EPSG | 4686 => Some(Self::Geographic),
            3857 | 900_913 => Some(Self::WebMercator),
            32601..=32660 => Some(Self::TransverseMercator(TransverseMercator::utm(
                code - 32600,
                true,
            ))),
            32701..=32760 => Some(Self::TransverseMercator(TransverseMercator::utm(
                code - 32700,
                false,
            ))),
            3114 => Some(Self::TransverseMercator(TransverseMercator::magna_zone(
                -80.077_507_916_666_66,
            ))),
            3115 => Some(Self::TransverseMercator(TransverseMercator::magna_zone(
                -77.077_507_916_666_66,
            ))),
            3116 => Some(Self::TransverseMercator(TransverseMercator::magna_zone(
                -74.077_507_916_666_66,
            ))),
            3117 => Some(Self::TransverseMercator(TransverseMercator::magna_zone(
                -71.077_507_916_666_66,
            ))),
            3118 => Some(Self::TransverseMercator(TransverseMercator::magna_zone(
                -68.077_507_916_666_66,
            ))),
            9377 => Some(Self::TransverseMercator(
                TransverseMercator::origen_nacional(),
            )),
            _ => None,
        }
    }

    fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Self::Geographic => (x, y),
            Self::WebMercator => {
                let lon = (x / WGS84.a).to_degrees();
                let lat = 2.0f64
                    .mul_add((y / WGS84.a).exp().atan(), -std::f64::consts::FRAC_PI_2)
                    .to_degrees();
                (lon, lat)
            }
            Self::TransverseMercator(tm) => tm.inverse(x, y),
        }
    }
}

/// A reusable transform from a source frame to geographic WGS84.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateTransform {
    source: ReferenceFrame,
    projection: Projection,
}

impl CoordinateTransform {
    /// Builds the transform from `source` to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`CrsError`] if `source` is undefined or unsupported, or if
    /// `target` is anything other than EPSG:4326.
    pub fn new(source: ReferenceFrame, target: ReferenceFrame) -> Result<Self, CrsError> {
        if !target.is_wgs84() {
            return Err(CrsError::UnsupportedTarget(target));
        }

        let code = source.epsg().ok_or(CrsError::UndefinedSource)?;
        let projection =
            Projection::for_epsg(code).ok_or(CrsError::UnsupportedSource(source))?;

        log::debug!("Built coordinate transform {source} -> {target}");

        Ok(Self { source, projection })
    }

    /// Shorthand for a transform to EPSG:4326.
    ///
    /// # Errors
    ///
    /// See [`CoordinateTransform::new`].
    pub fn to_wgs84(source: ReferenceFrame) -> Result<Self, CrsError> {
        Self::new(source, ReferenceFrame::wgs84())
    }

    /// Converts a source coordinate to `(longitude, latitude)` degrees.
    ///
    /// # Errors
    ///
    /// Returns [`CrsError::OutOfBounds`] if the result is not a finite,
    /// in-range longitude/latitude.
    pub fn to_lon_lat(&self, x: f64, y: f64) -> Result<(f64, f64), CrsError> {
        let (lon, lat) = self.projection.inverse(x, y);

        if !lon.is_finite() || !lat.is_finite() || lon.abs() > 180.0 || lat.abs() > 90.0 {
            return Err(CrsError::OutOfBounds {
                x,
                y,
                frame: self.source,
            });
        }

        Ok((lon, lat))
    }

    /// Reads a point (or a single-member multipoint) from a borrowed
    /// geometry and returns its `(longitude, latitude)`.
    ///
    /// # Errors
    ///
    /// Returns [`CrsError::NotAPoint`] for any other geometry, or
    /// [`CrsError::OutOfBounds`] if the coordinate cannot be converted.
    pub fn transform_point(&self, geometry: &Geometry<f64>) -> Result<(f64, f64), CrsError> {
        let point = match geometry {
            Geometry::Point(p) => *p,
            Geometry::MultiPoint(mp) if mp.0.len() == 1 => mp.0[0],
            _ => return Err(CrsError::NotAPoint),
        };

        self.to_lon_lat(point.x(), point.y())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{MultiPoint, Point};

    fn assert_close(a: f64, b: f64, tol: f64, msg: &str) {
        let diff = (a - b).abs();
        assert!(
            diff < tol,
            "{msg}: expected {b}, got {a}, diff {diff} exceeds tolerance {tol}"
        );
    }

    #[test]
    fn undefined_source_fails() {
        assert_eq!(
            CoordinateTransform::to_wgs84(ReferenceFrame::Undefined),
            Err(CrsError::UndefinedSource)
        );
    }

    #[test]
    fn unsupported_source_fails() {
        assert_eq!(
            CoordinateTransform::to_wgs84(ReferenceFrame::Epsg(2154)),
            Err(CrsError::UnsupportedSource(ReferenceFrame::Epsg(2154)))
        );
    }

    #[test]
    fn non_geographic_target_fails() {
        assert_eq!(
            CoordinateTransform::new(ReferenceFrame::wgs84(), ReferenceFrame::Epsg(3116)),
            Err(CrsError::UnsupportedTarget(ReferenceFrame::Epsg(3116)))
        );
    }

    #[test]
    fn geographic_is_identity() {
        let t = CoordinateTransform::to_wgs84(ReferenceFrame::wgs84()).unwrap();
        let (lon, lat) = t.to_lon_lat(-75.5636, 6.2518).unwrap();
        assert_close(lon, -75.5636, 1e-12, "lon");
        assert_close(lat, 6.2518, 1e-12, "lat");
    }

    #[test]
    fn geographic_rejects_projected_numbers() {
        let t = CoordinateTransform::to_wgs84(ReferenceFrame::wgs84()).unwrap();
        assert!(matches!(
            t.to_lon_lat(1_000_000.0, 1_000_000.0),
            Err(CrsError::OutOfBounds { .. })
        ));
    }

    // pyproj: Transformer.from_crs(4326, 32630, always_xy=True)
    //   .transform(-3.7037, 40.4168) -> (440298.94, 4474257.31)
    #[test]
    fn madrid_utm30n_to_wgs84() {
        let t = CoordinateTransform::to_wgs84(ReferenceFrame::Epsg(32630)).unwrap();
        let (lon, lat) = t.to_lon_lat(440_298.94, 4_474_257.31).unwrap();
        assert_close(lon, -3.7037, 1e-5, "lon");
        assert_close(lat, 40.4168, 1e-5, "lat");
    }

    // pyproj: Transformer.from_crs(4326, 32721, always_xy=True)
    //   .transform(-58.3816, -34.6037) -> (373317.50, 6170036.17)
    #[test]
    fn buenos_aires_utm21s_to_wgs84() {
        let t = CoordinateTransform::to_wgs84(ReferenceFrame::Epsg(32721)).unwrap();
        let (lon, lat) = t.to_lon_lat(373_317.50, 6_170_036.17).unwrap();
        assert_close(lon, -58.3816, 1e-5, "lon");
        assert_close(lat, -34.6037, 1e-5, "lat");
    }

    #[test]
    fn bogota_zone_origin() {
        let t = CoordinateTransform::to_wgs84(ReferenceFrame::Epsg(3116)).unwrap();
        let (lon, lat) = t.to_lon_lat(1_000_000.0, 1_000_000.0).unwrap();
        assert_close(lon, -74.077_507_916_666_66, 1e-7, "lon");
        assert_close(lat, 4.596_200_416_666_666, 1e-7, "lat");
    }

    #[test]
    fn origen_nacional_origin() {
        let t = CoordinateTransform::to_wgs84(ReferenceFrame::Epsg(9377)).unwrap();
        let (lon, lat) = t.to_lon_lat(5_000_000.0, 2_000_000.0).unwrap();
        assert_close(lon, -73.0, 1e-7, "lon");
        assert_close(lat, 4.0, 1e-7, "lat");
    }

    #[test]
    fn web_mercator_to_wgs84() {
        let t = CoordinateTransform::to_wgs84(ReferenceFrame::Epsg(3857)).unwrap();
        let (lon, lat) = t
            .to_lon_lat(-8_245_668.453_988_439, 525_018.021_817_643_9)
            .unwrap();
        assert_close(lon, -74.0721, 1e-9, "lon");
        assert_close(lat, 4.7110, 1e-9, "lat");
    }

    #[test]
    fn transform_point_borrows_geometry() {
        let t = CoordinateTransform::to_wgs84(ReferenceFrame::Epsg(3116)).unwrap();
        let geometry: Geometry<f64> = Point::new(1_000_000.0, 1_000_000.0).into();
        let before = geometry.clone();

        let (lon, _) = t.transform_point(&geometry).unwrap();

        assert_close(lon, -74.077_507_916_666_66, 1e-7, "lon");
        assert_eq!(geometry, before);
    }

    #[test]
    fn single_member_multipoint_is_a_point() {
        let t = CoordinateTransform::to_wgs84(ReferenceFrame::wgs84()).unwrap();
        let geometry: Geometry<f64> = MultiPoint::from(vec![Point::new(-75.0, 6.0)]).into();
        assert_eq!(t.transform_point(&geometry).unwrap(), (-75.0, 6.0));

        let two: Geometry<f64> =
            MultiPoint::from(vec![Point::new(-75.0, 6.0), Point::new(-74.0, 5.0)]).into();
        assert_eq!(t.transform_point(&two), Err(CrsError::NotAPoint));
    }
}
