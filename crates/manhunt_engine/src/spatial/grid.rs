//! Degree-grid spatial index.
//!
//! Positions live in a flat `DashMap` keyed by player; a second map keys
//! grid cells (latitude/longitude buckets roughly one query radius wide) to
//! their occupant lists. Moves touch at most two cells, and radius queries
//! visit only the cells intersecting the query's bounding box before
//! falling back to precise haversine checks.

use super::query::{PlayerDistance, SpatialIndexStats};
use crate::types::PlayerId;
use dashmap::DashMap;
use manhunt_geo::{bounding_box, distance_m, point_in_polygon, Coordinate, GeoBounds, EARTH_RADIUS_M};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// Meters per degree of latitude (and of longitude at the equator).
const METERS_PER_DEGREE: f64 = 111_320.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CellKey {
    lat: i32,
    lon: i32,
}

/// Grid-partitioned index over live player positions.
#[derive(Debug)]
pub struct GeoGrid {
    cell_size_deg: f64,
    entries: DashMap<PlayerId, Coordinate>,
    cells: DashMap<CellKey, Vec<PlayerId>>,
    insertions: AtomicU64,
    removals: AtomicU64,
    queries: AtomicU64,
}

impl GeoGrid {
    /// Creates a grid with cells roughly `cell_size_m` meters on a side.
    pub fn new(cell_size_m: f64) -> Self {
        Self {
            cell_size_deg: (cell_size_m.max(1.0)) / METERS_PER_DEGREE,
            entries: DashMap::new(),
            cells: DashMap::new(),
            insertions: AtomicU64::new(0),
            removals: AtomicU64::new(0),
            queries: AtomicU64::new(0),
        }
    }

    fn key_for(&self, coord: Coordinate) -> CellKey {
        CellKey {
            lat: (coord.lat / self.cell_size_deg).floor() as i32,
            lon: (coord.lon / self.cell_size_deg).floor() as i32,
        }
    }

    /// Inserts or moves a player. Incremental: a move touches only the two
    /// affected cells, never the whole structure.
    pub fn upsert(&self, player: PlayerId, coord: Coordinate) {
        let new_key = self.key_for(coord);
        let previous = self.entries.insert(player, coord);
        self.insertions.fetch_add(1, Ordering::Relaxed);

        if let Some(old_coord) = previous {
            let old_key = self.key_for(old_coord);
            if old_key == new_key {
                return; // Same cell: occupancy list already holds the player.
            }
            self.evict_from_cell(old_key, player);
        }

        self.cells.entry(new_key).or_default().push(player);
        trace!("Indexed {} at {}", player, coord);
    }

    /// Removes a player from the index. Returns whether it was present.
    pub fn remove(&self, player: PlayerId) -> bool {
        match self.entries.remove(&player) {
            Some((_, coord)) => {
                let key = self.key_for(coord);
                self.evict_from_cell(key, player);
                self.removals.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    fn evict_from_cell(&self, key: CellKey, player: PlayerId) {
        if let Some(mut cell) = self.cells.get_mut(&key) {
            cell.retain(|p| *p != player);
            let emptied = cell.is_empty();
            drop(cell);
            if emptied {
                self.cells.remove_if(&key, |_, v| v.is_empty());
            }
        }
    }

    /// Current indexed position of a player.
    pub fn position(&self, player: PlayerId) -> Option<Coordinate> {
        self.entries.get(&player).map(|c| *c)
    }

    /// Number of indexed players.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All players within `radius_m` meters of `center` (boundary
    /// inclusive), ordered by distance then player id.
    pub fn query_radius(&self, center: Coordinate, radius_m: f64) -> Vec<PlayerDistance> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        let radius_m = radius_m.max(0.0);
        let bounds = bounding_box(center, radius_m);

        let mut results = Vec::new();
        self.for_candidates(&bounds, |player, coord| {
            let d = distance_m(center, coord);
            if d <= radius_m {
                results.push(PlayerDistance {
                    player,
                    coord,
                    distance_m: d,
                });
            }
        });

        sort_by_distance(&mut results);
        results
    }

    /// Up to `k` players nearest to `center`, ordered by distance with ties
    /// broken by player id ascending.
    ///
    /// Expanding-ring search: once at least `k` players fall inside a probe
    /// radius, every closer player was also inside it, so the first `k` of
    /// the sorted hits are exact.
    pub fn query_k_nearest(&self, center: Coordinate, k: usize) -> Vec<PlayerDistance> {
        if k == 0 || self.entries.is_empty() {
            return Vec::new();
        }

        // No two points on the sphere are farther apart than half the
        // circumference.
        let max_radius = std::f64::consts::PI * EARTH_RADIUS_M;
        let mut radius = self.cell_size_deg * METERS_PER_DEGREE;

        loop {
            let mut hits = self.query_radius(center, radius);
            if hits.len() >= k || radius >= max_radius {
                hits.truncate(k);
                return hits;
            }
            radius *= 4.0;
        }
    }

    /// All players inside the box (boundary inclusive).
    pub fn query_bounding_box(&self, bounds: GeoBounds) -> Vec<(PlayerId, Coordinate)> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        let mut results = Vec::new();
        self.for_candidates(&bounds, |player, coord| {
            if bounds.contains(coord) {
                results.push((player, coord));
            }
        });
        results.sort_by_key(|(p, _)| *p);
        results
    }

    /// All players inside the polygon (even-odd rule, implicitly closed).
    pub fn query_polygon(&self, polygon: &[Coordinate]) -> Vec<(PlayerId, Coordinate)> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        if polygon.len() < 3 {
            return Vec::new();
        }

        let bounds = polygon_bounds(polygon);
        let mut results = Vec::new();
        self.for_candidates(&bounds, |player, coord| {
            if point_in_polygon(coord, polygon) {
                results.push((player, coord));
            }
        });
        results.sort_by_key(|(p, _)| *p);
        results
    }

    /// Diagnostic occupancy statistics.
    pub fn stats(&self) -> SpatialIndexStats {
        let mut occupied = 0;
        let mut max_occupancy = 0;
        for cell in self.cells.iter() {
            if !cell.is_empty() {
                occupied += 1;
                max_occupancy = max_occupancy.max(cell.len());
            }
        }
        SpatialIndexStats {
            entries: self.entries.len(),
            occupied_cells: occupied,
            max_cell_occupancy: max_occupancy,
            total_insertions: self.insertions.load(Ordering::Relaxed),
            total_removals: self.removals.load(Ordering::Relaxed),
            total_queries: self.queries.load(Ordering::Relaxed),
        }
    }

    /// Snapshot of every indexed player. Diagnostic and test support.
    pub fn snapshot(&self) -> Vec<(PlayerId, Coordinate)> {
        self.entries.iter().map(|e| (*e.key(), *e.value())).collect()
    }

    /// Visits each indexed player whose cell intersects `bounds`.
    ///
    /// When the box spans more cells than there are occupied ones, walking
    /// the cell range would cost more than a scan; degrade to iterating the
    /// entry map directly. Either path feeds the same precise filter, so
    /// results never differ.
    fn for_candidates(&self, bounds: &GeoBounds, mut visit: impl FnMut(PlayerId, Coordinate)) {
        let lat_min = (bounds.south_west.lat / self.cell_size_deg).floor() as i64;
        let lat_max = (bounds.north_east.lat / self.cell_size_deg).floor() as i64;

        let lon_ranges = lon_cell_ranges(
            bounds.south_west.lon,
            bounds.north_east.lon,
            self.cell_size_deg,
        );
        let lon_cells: i64 = lon_ranges.iter().map(|(lo, hi)| hi - lo + 1).sum();
        let cell_span = (lat_max - lat_min + 1).saturating_mul(lon_cells);

        if cell_span > self.cells.len() as i64 {
            for entry in self.entries.iter() {
                visit(*entry.key(), *entry.value());
            }
            return;
        }

        for lat in lat_min..=lat_max {
            for &(lo, hi) in &lon_ranges {
                for lon in lo..=hi {
                    let key = CellKey {
                        lat: lat as i32,
                        lon: lon as i32,
                    };
                    let occupants = match self.cells.get(&key) {
                        Some(cell) => cell.clone(),
                        None => continue,
                    };
                    for player in occupants {
                        if let Some(coord) = self.entries.get(&player) {
                            visit(player, *coord);
                        }
                    }
                }
            }
        }
    }
}

fn sort_by_distance(results: &mut [PlayerDistance]) {
    results.sort_by(|a, b| {
        a.distance_m
            .total_cmp(&b.distance_m)
            .then_with(|| a.player.cmp(&b.player))
    });
}

/// Longitude cell ranges for a box, split in two when it crosses the
/// antimeridian.
fn lon_cell_ranges(sw_lon: f64, ne_lon: f64, cell_size_deg: f64) -> Vec<(i64, i64)> {
    let cell = |lon: f64| (lon / cell_size_deg).floor() as i64;
    if sw_lon <= ne_lon {
        vec![(cell(sw_lon), cell(ne_lon))]
    } else {
        vec![(cell(sw_lon), cell(180.0)), (cell(-180.0), cell(ne_lon))]
    }
}

/// Degree-extent of a polygon's vertices.
fn polygon_bounds(polygon: &[Coordinate]) -> GeoBounds {
    let mut min_lat = f64::MAX;
    let mut max_lat = f64::MIN;
    let mut min_lon = f64::MAX;
    let mut max_lon = f64::MIN;
    for c in polygon {
        min_lat = min_lat.min(c.lat);
        max_lat = max_lat.max(c.lat);
        min_lon = min_lon.min(c.lon);
        max_lon = max_lon.max(c.lon);
    }
    GeoBounds {
        south_west: Coordinate {
            lat: min_lat,
            lon: min_lon,
        },
        north_east: Coordinate {
            lat: max_lat,
            lon: max_lon,
        },
    }
}
