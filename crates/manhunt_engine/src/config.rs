//! Engine configuration types and defaults.
//!
//! Every tunable lives here and is injected at construction; the engine has
//! no process-wide mutable state. Defaults follow the production values of
//! the game this engine powers.

use serde::{Deserialize, Serialize};

/// Strategy used to derive a smoothed effective location from the retained
/// sample window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SmoothingStrategy {
    /// Linear rank weights: the most recent of N samples has weight N, the
    /// next N−1, down to 1 for the oldest, normalized. The default.
    LinearWeighted,
    /// Weight proportional to `exp(-factor * rank)` where rank 0 is the
    /// newest sample. Higher factors track the newest sample more tightly.
    ExponentialDecay {
        /// Decay factor, > 0.
        factor: f64,
    },
    /// Equal weights for every retained sample.
    SimpleAverage,
}

impl Default for SmoothingStrategy {
    fn default() -> Self {
        Self::LinearWeighted
    }
}

/// Configuration for the proximity engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Samples retained per player.
    pub history_capacity: usize,

    /// Maximum age of a retained sample relative to the newest, in seconds.
    pub max_sample_age_secs: u64,

    /// Idle horizon after which a player's whole history is swept, in
    /// seconds.
    pub history_idle_sweep_secs: u64,

    /// Smoothing strategy for effective locations.
    pub smoothing: SmoothingStrategy,

    /// TTL for cached pairwise distances, in milliseconds.
    pub distance_cache_ttl_ms: u64,

    /// TTL for cached safe-zone membership results, in milliseconds. Zones
    /// change far less often than positions.
    pub zone_cache_ttl_ms: u64,

    /// How long a fetched zone list stays authoritative before the next
    /// `is_protected` call refreshes it, in milliseconds.
    pub zone_refresh_window_ms: u64,

    /// How long a fetched map configuration stays authoritative, in
    /// milliseconds.
    pub map_config_refresh_window_ms: u64,

    /// Global fallback elimination distance when neither weapon, game, nor
    /// map supplies one, in meters.
    pub default_elimination_distance_m: f64,

    /// Buffer added to the resolved elimination distance to compensate for
    /// GPS inaccuracy, in meters. Zero disables the compensation.
    pub gps_accuracy_buffer_m: f64,

    /// Edge length of spatial index grid cells, in meters. Sized near the
    /// common query radii so radius lookups touch few cells.
    pub grid_cell_size_m: f64,

    /// Per-axis tolerance for exact-center matches against zero-radius
    /// zones, in degrees.
    pub zero_radius_epsilon_deg: f64,

    /// Budget for each external fetch (locations, zones, map config,
    /// settings), in milliseconds. On expiry the decision fails explicitly.
    pub fetch_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_capacity: 3,
            max_sample_age_secs: 300,
            history_idle_sweep_secs: 3600,
            smoothing: SmoothingStrategy::default(),
            distance_cache_ttl_ms: 10_000,
            zone_cache_ttl_ms: 60_000,
            zone_refresh_window_ms: 30_000,
            map_config_refresh_window_ms: 60_000,
            default_elimination_distance_m: 10.0,
            gps_accuracy_buffer_m: 5.0,
            grid_cell_size_m: 100.0,
            zero_radius_epsilon_deg: 0.000_000_5,
            fetch_timeout_ms: 3_000,
        }
    }
}
