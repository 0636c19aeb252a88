//! Spatial query result types.

use crate::types::PlayerId;
use manhunt_geo::Coordinate;
use serde::{Deserialize, Serialize};

/// A player returned by a spatial query, annotated with the distance from
/// the query's reference point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerDistance {
    /// Player identifier.
    pub player: PlayerId,
    /// Indexed position at query time.
    pub coord: Coordinate,
    /// Great-circle distance from the query reference point, in meters.
    pub distance_m: f64,
}

/// Diagnostic occupancy and traffic counters for a spatial index.
///
/// Non-semantic: exposed for monitoring only and never consulted by
/// queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpatialIndexStats {
    /// Players currently indexed.
    pub entries: usize,
    /// Grid cells with at least one occupant.
    pub occupied_cells: usize,
    /// Largest single-cell occupancy.
    pub max_cell_occupancy: usize,
    /// Lifetime upsert count.
    pub total_insertions: u64,
    /// Lifetime removal count.
    pub total_removals: u64,
    /// Lifetime query count.
    pub total_queries: u64,
}
