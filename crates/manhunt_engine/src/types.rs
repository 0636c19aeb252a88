//! # Core Type Definitions
//!
//! Fundamental identifier and data-model types shared across the engine:
//! wrapper ids for players, games, and zones; the location sample retained
//! by the history engine; and the per-game settings consumed from the
//! settings provider.
//!
//! Wrapper types prevent id confusion (a `PlayerId` can never be passed
//! where a `ZoneId` is expected), and all types serialize to JSON for the
//! handler layer above.

use manhunt_geo::Coordinate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a player.
///
/// A wrapper around UUID providing type safety over bare strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    /// Creates a new random player id (UUID v4).
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::str::FromStr for PlayerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GameId(pub Uuid);

impl GameId {
    /// Creates a new random game id (UUID v4).
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GameId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for GameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a safe zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ZoneId(pub Uuid);

impl ZoneId {
    /// Creates a new random zone id (UUID v4).
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ZoneId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ZoneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single accepted location report for one player.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    /// Reported position.
    pub coord: Coordinate,
    /// Reported GPS accuracy in meters (radius of the error circle).
    pub accuracy_m: f64,
    /// Client timestamp, epoch milliseconds.
    pub timestamp_ms: u64,
}

impl LocationSample {
    /// Creates a sample.
    pub fn new(coord: Coordinate, accuracy_m: f64, timestamp_ms: u64) -> Self {
        Self {
            coord,
            accuracy_m,
            timestamp_ms,
        }
    }
}

/// Per-game flags consumed from the settings provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSettings {
    /// Whether elimination checks use smoothed effective locations.
    pub use_smoothed_locations: bool,
    /// Maximum age of a player's newest sample before the engine refuses
    /// to decide with it, in seconds.
    pub location_staleness_threshold_secs: u64,
    /// Optional game-level override of the elimination distance in meters.
    /// Sits between weapon overrides and the map default in precedence.
    pub elimination_distance_m: Option<f64>,
    /// Informational label of the game's kill method; not interpreted by
    /// the engine.
    pub proximity_kill_method: Option<String>,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            use_smoothed_locations: true,
            location_staleness_threshold_secs: 60,
            elimination_distance_m: None,
            proximity_kill_method: None,
        }
    }
}

/// Returns the current time as epoch milliseconds.
///
/// # Panics
///
/// Panics if the system clock is set before the Unix epoch, which does not
/// happen on correctly configured systems.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64
}
