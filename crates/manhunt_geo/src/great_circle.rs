//! Great-circle math on the WGS84 sphere approximation.

use crate::{Coordinate, GeoBounds, GeoError};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine great-circle distance between two points, in meters.
///
/// Symmetric in its arguments; zero for identical points.
pub fn distance_m(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + (d_lon / 2.0).sin().powi(2) * lat_a.cos() * lat_b.cos();
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Initial bearing from `a` to `b` in degrees, normalized to `0..360`
/// (0 = north, 90 = east).
pub fn bearing_deg(a: Coordinate, b: Coordinate) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lon = (b.lon - a.lon).to_radians();

    let y = d_lon.sin() * lat_b.cos();
    let x = lat_a.cos() * lat_b.sin() - lat_a.sin() * lat_b.cos() * d_lon.cos();

    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Projects a destination point from `origin` along `bearing_deg` for
/// `distance_m` meters.
pub fn destination_point(
    origin: Coordinate,
    bearing_deg: f64,
    distance_m: f64,
) -> Result<Coordinate, GeoError> {
    let lat1 = origin.lat.to_radians();
    let lon1 = origin.lon.to_radians();
    let brng = bearing_deg.to_radians();
    let d = distance_m / EARTH_RADIUS_M;

    let lat2 = (lat1.sin() * d.cos() + lat1.cos() * d.sin() * brng.cos()).asin();
    let lon2 = lon1
        + (brng.sin() * d.sin() * lat1.cos()).atan2(d.cos() - lat1.sin() * lat2.sin());

    // Normalize longitude back into -180..180.
    let lon2 = ((lon2 + 3.0 * std::f64::consts::PI) % (2.0 * std::f64::consts::PI))
        - std::f64::consts::PI;

    Coordinate::new(lat2.to_degrees(), lon2.to_degrees())
}

/// Bounding box enclosing the circle of `radius_m` meters around `center`.
///
/// Longitude spread widens with latitude; if the circle reaches a pole the
/// box covers all longitudes. Used to pre-filter grid cells before precise
/// haversine checks.
pub fn bounding_box(center: Coordinate, radius_m: f64) -> GeoBounds {
    let rad_dist = radius_m / EARTH_RADIUS_M;
    let rad_lat = center.lat.to_radians();
    let rad_lon = center.lon.to_radians();

    let mut min_lat = rad_lat - rad_dist;
    let mut max_lat = rad_lat + rad_dist;

    let half_pi = std::f64::consts::FRAC_PI_2;
    let delta_lon = if min_lat > -half_pi && max_lat < half_pi {
        // Longitude degrees shrink with latitude; size the span for the
        // widest latitude the circle touches.
        rad_dist / min_lat.cos().min(max_lat.cos())
    } else {
        min_lat = min_lat.max(-half_pi);
        max_lat = max_lat.min(half_pi);
        std::f64::consts::PI
    };

    // A half-turn or more covers every longitude. Emit the full span
    // directly: wrapping `lon ± 180` would collapse the box to a single
    // meridian for any non-zero center longitude.
    let (min_lon, max_lon) = if delta_lon >= std::f64::consts::PI {
        (-180.0, 180.0)
    } else {
        let mut lo = (rad_lon - delta_lon).to_degrees();
        let mut hi = (rad_lon + delta_lon).to_degrees();
        if lo < -180.0 {
            lo += 360.0;
        }
        if hi > 180.0 {
            hi -= 360.0;
        }
        (lo, hi)
    };

    GeoBounds {
        south_west: Coordinate {
            lat: min_lat.to_degrees(),
            lon: min_lon,
        },
        north_east: Coordinate {
            lat: max_lat.to_degrees(),
            lon: max_lon,
        },
    }
}

/// Nearest eight-wind compass label for a bearing in degrees.
///
/// Used for human-facing proximity hints ("target is ~50m NE").
pub fn cardinal_direction(bearing_deg: f64) -> &'static str {
    const WINDS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];
    let normalized = bearing_deg.rem_euclid(360.0);
    let sector = ((normalized + 22.5) / 45.0) as usize % 8;
    WINDS[sector]
}

/// Vertex-average centroid of a polygon.
///
/// A trailing vertex equal to the first is ignored. Good enough for test
/// fixtures and small play areas; not area-weighted.
pub fn centroid(polygon: &[Coordinate]) -> Option<Coordinate> {
    if polygon.is_empty() {
        return None;
    }
    let mut n = polygon.len();
    if n > 1 && polygon[0] == polygon[n - 1] {
        n -= 1;
    }
    let (sum_lat, sum_lon) = polygon[..n]
        .iter()
        .fold((0.0, 0.0), |(la, lo), c| (la + c.lat, lo + c.lon));
    Coordinate::new(sum_lat / n as f64, sum_lon / n as f64).ok()
}
