//! # Manhunt Geodesy Primitives
//!
//! Pure, synchronous geographic math shared by the proximity engine:
//! validated WGS84 coordinates, great-circle distance and bearing,
//! destination-point projection, circle bounding boxes, and even-odd
//! polygon containment.
//!
//! Everything in this crate is side-effect free. All entry points validate
//! their coordinates and fail with [`GeoError::InvalidCoordinate`] instead
//! of producing NaN-poisoned results downstream.

mod great_circle;
mod polygon;

pub use great_circle::{
    bearing_deg, bounding_box, cardinal_direction, centroid, destination_point, distance_m,
    EARTH_RADIUS_M,
};
pub use polygon::point_in_polygon;

use serde::{Deserialize, Serialize};

/// Errors produced by geodesy operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeoError {
    /// Latitude or longitude outside the valid WGS84 range.
    #[error("invalid coordinate: lat={lat}, lon={lon} (expected -90..=90, -180..=180)")]
    InvalidCoordinate { lat: f64, lon: f64 },
}

/// A WGS84 point in decimal degrees.
///
/// Construction validates the invariant `-90 <= lat <= 90` and
/// `-180 <= lon <= 180`; a `Coordinate` obtained through [`Coordinate::new`]
/// is always finite and in range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees, positive north.
    pub lat: f64,
    /// Longitude in degrees, positive east.
    pub lon: f64,
}

impl Coordinate {
    /// Creates a validated coordinate.
    pub fn new(lat: f64, lon: f64) -> Result<Self, GeoError> {
        if !lat.is_finite()
            || !lon.is_finite()
            || !(-90.0..=90.0).contains(&lat)
            || !(-180.0..=180.0).contains(&lon)
        {
            return Err(GeoError::InvalidCoordinate { lat, lon });
        }
        Ok(Self { lat, lon })
    }

    /// Per-axis comparison within `epsilon_deg` degrees.
    ///
    /// Used for exact-center matches against zero-radius zones, where the
    /// haversine distance of two near-identical points is numerically
    /// unstable.
    pub fn approx_eq(&self, other: Coordinate, epsilon_deg: f64) -> bool {
        (self.lat - other.lat).abs() <= epsilon_deg && (self.lon - other.lon).abs() <= epsilon_deg
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

/// An axis-aligned latitude/longitude box.
///
/// Longitude spans that cross the antimeridian are represented with
/// `south_west.lon > north_east.lon` and handled by [`GeoBounds::contains`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    /// South-western corner.
    pub south_west: Coordinate,
    /// North-eastern corner.
    pub north_east: Coordinate,
}

impl GeoBounds {
    /// Creates a bounding box from its corners.
    pub fn new(south_west: Coordinate, north_east: Coordinate) -> Self {
        Self {
            south_west,
            north_east,
        }
    }

    /// Whether the box contains the point (boundary inclusive).
    pub fn contains(&self, point: Coordinate) -> bool {
        if point.lat < self.south_west.lat || point.lat > self.north_east.lat {
            return false;
        }
        if self.south_west.lon <= self.north_east.lon {
            point.lon >= self.south_west.lon && point.lon <= self.north_east.lon
        } else {
            // Antimeridian crossing: the valid span wraps through 180.
            point.lon >= self.south_west.lon || point.lon <= self.north_east.lon
        }
    }

    /// Midpoint of the box, wrap-aware in longitude.
    ///
    /// For a box that crosses the antimeridian the midpoint lies inside the
    /// wrapped span, not on the far side of the globe.
    pub fn center(&self) -> Coordinate {
        let lat = (self.south_west.lat + self.north_east.lat) / 2.0;
        let lon = if self.south_west.lon <= self.north_east.lon {
            (self.south_west.lon + self.north_east.lon) / 2.0
        } else {
            let mid = (self.south_west.lon + self.north_east.lon + 360.0) / 2.0;
            if mid > 180.0 {
                mid - 360.0
            } else {
                mid
            }
        };
        Coordinate { lat, lon }
    }
}
