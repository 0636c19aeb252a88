//! Point-in-polygon containment.

use crate::Coordinate;

/// Even-odd (ray casting) containment test.
///
/// The polygon is treated as implicitly closed; a trailing vertex equal to
/// the first is harmless. Fewer than 3 vertices never contain anything.
pub fn point_in_polygon(point: Coordinate, polygon: &[Coordinate]) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let x = point.lat;
    let y = point.lon;
    let mut inside = false;

    let n = polygon.len();
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = (polygon[i].lat, polygon[i].lon);
        let (xj, yj) = (polygon[j].lat, polygon[j].lon);

        if ((yi > y) != (yj > y)) && (x < (xj - xi) * (y - yi) / (yj - yi) + xi) {
            inside = !inside;
        }
        j = i;
    }

    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    fn unit_square() -> Vec<Coordinate> {
        vec![coord(0.0, 0.0), coord(0.0, 1.0), coord(1.0, 1.0), coord(1.0, 0.0)]
    }

    #[test]
    fn inside_and_outside_square() {
        let square = unit_square();
        assert!(point_in_polygon(coord(0.5, 0.5), &square));
        assert!(!point_in_polygon(coord(1.5, 0.5), &square));
        assert!(!point_in_polygon(coord(-0.5, 0.5), &square));
    }

    #[test]
    fn explicitly_closed_polygon_behaves_identically() {
        let mut closed = unit_square();
        closed.push(closed[0]);
        assert!(point_in_polygon(coord(0.5, 0.5), &closed));
        assert!(!point_in_polygon(coord(2.0, 2.0), &closed));
    }

    #[test]
    fn degenerate_polygon_contains_nothing() {
        assert!(!point_in_polygon(coord(0.0, 0.0), &[]));
        assert!(!point_in_polygon(coord(0.0, 0.0), &[coord(0.0, 0.0), coord(1.0, 1.0)]));
    }

    #[test]
    fn concave_polygon() {
        // L-shaped region: the notch at the upper right is outside.
        let l_shape = vec![
            coord(0.0, 0.0),
            coord(0.0, 2.0),
            coord(1.0, 2.0),
            coord(1.0, 1.0),
            coord(2.0, 1.0),
            coord(2.0, 0.0),
        ];
        assert!(point_in_polygon(coord(0.5, 1.5), &l_shape));
        assert!(point_in_polygon(coord(1.5, 0.5), &l_shape));
        assert!(!point_in_polygon(coord(1.5, 1.5), &l_shape));
    }
}
