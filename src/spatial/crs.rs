//! Coordinate reference systems and point reprojection
//!
//! Supports geographic WGS84 coordinates and the WGS84 UTM zones, which covers
//! the reference systems camera-trap site tables and land-cover rasters ship in.
//! Transverse Mercator uses the series expansions from Snyder (1987), accurate to
//! well under a metre within a zone.

use crate::io::error::{CamtrapError, Result, invalid_parameter};
use std::fmt;

const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;
const UTM_K0: f64 = 0.9996;
const UTM_FALSE_EASTING: f64 = 500_000.0;
const UTM_FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Geographic coordinate in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    /// Longitude (positive east)
    pub lon: f64,
    /// Latitude (positive north)
    pub lat: f64,
}

/// Coordinate in a reference system's native units
///
/// Metres for UTM, degrees for geographic rasters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedPoint {
    /// Easting
    pub x: f64,
    /// Northing
    pub y: f64,
}

impl ProjectedPoint {
    /// Euclidean distance in native units
    pub fn distance(&self, other: &Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Supported reference systems
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crs {
    /// WGS84 longitude/latitude (EPSG:4326)
    Geographic,
    /// WGS84 UTM zone (EPSG:326zz north, EPSG:327zz south)
    Utm {
        /// Zone number 1-60
        zone: u8,
        /// Southern hemisphere variant
        south: bool,
    },
}

impl Crs {
    /// Resolve an EPSG code
    ///
    /// # Errors
    ///
    /// Returns an error for codes other than 4326 and the WGS84 UTM zones
    pub fn from_epsg(code: u32) -> Result<Self> {
        match code {
            4326 => Ok(Self::Geographic),
            32601..=32660 => Ok(Self::Utm {
                zone: (code - 32600) as u8,
                south: false,
            }),
            32701..=32760 => Ok(Self::Utm {
                zone: (code - 32700) as u8,
                south: true,
            }),
            _ => Err(invalid_parameter(
                "crs",
                &code,
                &"only EPSG:4326 and WGS84 UTM zones are supported",
            )),
        }
    }

    /// Parse `EPSG:<code>` (case-insensitive) or a bare code
    ///
    /// # Errors
    ///
    /// Returns an error if the text isn't a supported EPSG code
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        let digits = trimmed
            .get(..5)
            .filter(|prefix| prefix.eq_ignore_ascii_case("epsg:"))
            .and_then(|_| trimmed.get(5..))
            .unwrap_or(trimmed);
        let code = digits
            .parse::<u32>()
            .map_err(|e| invalid_parameter("crs", &text, &e))?;
        Self::from_epsg(code)
    }

    /// UTM zone whose central meridian is nearest to `point`
    pub fn utm_for(point: GeoPoint) -> Self {
        let zone = (((point.lon + 180.0) / 6.0).floor() as i64).clamp(0, 59) + 1;
        Self::Utm {
            zone: zone as u8,
            south: point.lat < 0.0,
        }
    }

    /// EPSG code of this reference system
    pub const fn epsg(&self) -> u32 {
        match self {
            Self::Geographic => 4326,
            Self::Utm { zone, south: false } => 32600 + *zone as u32,
            Self::Utm { zone, south: true } => 32700 + *zone as u32,
        }
    }

    /// Whether native units are metres
    pub const fn is_projected(&self) -> bool {
        matches!(self, Self::Utm { .. })
    }

    /// Convert a geographic coordinate into this reference system
    pub fn project(&self, point: GeoPoint) -> ProjectedPoint {
        match self {
            Self::Geographic => ProjectedPoint {
                x: point.lon,
                y: point.lat,
            },
            Self::Utm { zone, south } => utm_forward(point, *zone, *south),
        }
    }

    /// Convert a coordinate in this reference system back to geographic
    pub fn unproject(&self, point: ProjectedPoint) -> GeoPoint {
        match self {
            Self::Geographic => GeoPoint {
                lon: point.x,
                lat: point.y,
            },
            Self::Utm { zone, south } => utm_inverse(point, *zone, *south),
        }
    }

    /// Fail unless `other` is the same reference system
    ///
    /// # Errors
    ///
    /// Returns `CrsMismatch` when the systems differ
    pub fn ensure_same(&self, other: &Self) -> Result<()> {
        if self == other {
            Ok(())
        } else {
            Err(CamtrapError::CrsMismatch {
                expected: self.to_string(),
                found: other.to_string(),
            })
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

/// Reproject a point between reference systems
pub fn transform(point: ProjectedPoint, from: &Crs, to: &Crs) -> ProjectedPoint {
    if from == to {
        return point;
    }
    to.project(from.unproject(point))
}

fn central_meridian(zone: u8) -> f64 {
    (f64::from(zone) * 6.0 - 183.0).to_radians()
}

fn eccentricity_squared() -> f64 {
    WGS84_F * (2.0 - WGS84_F)
}

// Meridional arc length from the equator to latitude `phi`
fn meridian_arc(phi: f64) -> f64 {
    let e2 = eccentricity_squared();
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    WGS84_A
        * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
            - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
}

fn utm_forward(point: GeoPoint, zone: u8, south: bool) -> ProjectedPoint {
    let e2 = eccentricity_squared();
    let ep2 = e2 / (1.0 - e2);
    let phi = point.lat.to_radians();
    let lambda = point.lon.to_radians();

    let (sin_phi, cos_phi) = phi.sin_cos();
    let n = WGS84_A / (1.0 - e2 * sin_phi * sin_phi).sqrt();
    let t = phi.tan().powi(2);
    let c = ep2 * cos_phi * cos_phi;
    let a = cos_phi * (lambda - central_meridian(zone));
    let m = meridian_arc(phi);

    let x = UTM_K0
        * n
        * (a + (1.0 - t + c) * a.powi(3) / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0)
        + UTM_FALSE_EASTING;
    let mut y = UTM_K0
        * (m + n
            * phi.tan()
            * (a * a / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0));
    if south {
        y += UTM_FALSE_NORTHING_SOUTH;
    }

    ProjectedPoint { x, y }
}

fn utm_inverse(point: ProjectedPoint, zone: u8, south: bool) -> GeoPoint {
    let e2 = eccentricity_squared();
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    let ep2 = e2 / (1.0 - e2);
    let northing = if south {
        point.y - UTM_FALSE_NORTHING_SOUTH
    } else {
        point.y
    };

    let m = northing / UTM_K0;
    let mu = m / (WGS84_A * (1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));
    let root = (1.0 - e2).sqrt();
    let e1 = (1.0 - root) / (1.0 + root);

    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let (sin_phi1, cos_phi1) = phi1.sin_cos();
    let c1 = ep2 * cos_phi1 * cos_phi1;
    let t1 = phi1.tan().powi(2);
    let denom = 1.0 - e2 * sin_phi1 * sin_phi1;
    let n1 = WGS84_A / denom.sqrt();
    let r1 = WGS84_A * (1.0 - e2) / denom.powf(1.5);
    let d = (point.x - UTM_FALSE_EASTING) / (n1 * UTM_K0);

    let phi = phi1
        - (n1 * phi1.tan() / r1)
            * (d * d / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1)
                    * d.powi(6)
                    / 720.0);
    let lambda = central_meridian(zone)
        + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1)
                * d.powi(5)
                / 120.0)
            / cos_phi1;

    GeoPoint {
        lon: lambda.to_degrees(),
        lat: phi.to_degrees(),
    }
}
