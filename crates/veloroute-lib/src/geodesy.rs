//! Great-circle helpers shared by the weight model, search heuristics and the
//! segment planner.
//!
//! All distances are in metres and all angles in degrees. Coordinates are
//! stored as latitude/longitude and converted to `geo` points (x = longitude,
//! y = latitude) only at the boundary with the `geo` crate.

use std::fmt;

use geo::{Bearing, Distance, Haversine, Point};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A WGS84 latitude/longitude pair.
///
/// Serialises as a two-element `[lat, lon]` array, matching the track
/// coordinate lists handed to output renderers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Construct a coordinate, rejecting non-finite or out-of-range values.
    pub fn checked(lat: f64, lon: f64) -> Result<Self> {
        let valid = lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon);
        if valid {
            Ok(Self { lat, lon })
        } else {
            Err(Error::InvalidCoordinate { lat, lon })
        }
    }

    fn to_point(self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((lat, lon): (f64, f64)) -> Self {
        Self { lat, lon }
    }
}

impl From<Coordinate> for (f64, f64) {
    fn from(coord: Coordinate) -> Self {
        (coord.lat, coord.lon)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

/// Great-circle distance between two coordinates in metres.
pub fn haversine_m(a: Coordinate, b: Coordinate) -> f64 {
    Haversine.distance(a.to_point(), b.to_point())
}

/// Initial bearing from `a` towards `b`, normalised to `[0, 360)`.
pub fn bearing_deg(a: Coordinate, b: Coordinate) -> f64 {
    Haversine.bearing(a.to_point(), b.to_point()).rem_euclid(360.0)
}

/// Smallest absolute difference between two bearings, in `[0, 180]`.
pub fn angle_between(a: f64, b: f64) -> f64 {
    ((a - b + 180.0).rem_euclid(360.0) - 180.0).abs()
}

/// Linear interpolation in latitude/longitude space.
///
/// Good enough for waypoint spacing of a few tens of kilometres; the segment
/// planner only needs points that land near the straight line.
pub fn interpolate(a: Coordinate, b: Coordinate, t: f64) -> Coordinate {
    Coordinate {
        lat: a.lat + (b.lat - a.lat) * t,
        lon: a.lon + (b.lon - a.lon) * t,
    }
}

pub fn midpoint(a: Coordinate, b: Coordinate) -> Coordinate {
    interpolate(a, b, 0.5)
}

/// Total great-circle length of a polyline.
pub fn path_length_m(points: &[Coordinate]) -> f64 {
    points.windows(2).map(|pair| haversine_m(pair[0], pair[1])).sum()
}
