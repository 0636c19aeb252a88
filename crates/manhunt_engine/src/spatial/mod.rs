//! Spatial indexing for live player positions.
//!
//! Answers "which players are near this point or region" faster than a
//! linear scan. The index is a flat entry map plus a degree-grid of cell
//! occupancy lists, both with per-entry/per-cell locking so one player's
//! move never blocks another's query. Partitioning is purely an
//! optimization: every query returns results identical to a brute-force
//! scan.

mod grid;
mod query;

pub use grid::GeoGrid;
pub use query::{PlayerDistance, SpatialIndexStats};
