//! # Manhunt Proximity Engine
//!
//! Decision engine for proximity-based eliminations in a live-map pursuit
//! game. Players stream GPS reports in; hunters ask whether they may
//! eliminate their target right now. The engine answers from three inputs:
//!
//! - **Effective locations** — a short per-player window of accepted
//!   samples, optionally smoothed to damp GPS jitter ([`history`]).
//! - **Distance thresholds** — resolved per attempt from weapon overrides,
//!   game settings, and map defaults, padded by a GPS accuracy buffer
//!   ([`map_config`]).
//! - **Safe zones** — public, private, timed, and relocatable protection
//!   circles combined by logical OR ([`zones`]).
//!
//! A per-game spatial index ([`spatial`]) serves radius, k-nearest,
//! bounding-box, and polygon queries over current positions, and a
//! short-TTL cache ([`cache`]) absorbs the repeated checks bursts of
//! hunting produce.
//!
//! The engine fails closed: when the data a decision needs cannot be
//! obtained, the call returns an error, never a permissive `true`.
//!
//! ## Quick start
//!
//! ```no_run
//! use manhunt_engine::{
//!     EngineConfig, GameId, InMemoryGameSettings, InMemoryLocationStore,
//!     InMemoryMapConfigurationStore, InMemorySafeZoneStore, PlayerId,
//!     ProximityEngine,
//! };
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), manhunt_engine::EngineError> {
//! let engine = ProximityEngine::new(
//!     EngineConfig::default(),
//!     Arc::new(InMemoryLocationStore::new()),
//!     Arc::new(InMemorySafeZoneStore::new()),
//!     Arc::new(InMemoryMapConfigurationStore::default()),
//!     Arc::new(InMemoryGameSettings::new()),
//! );
//!
//! let game = GameId::new();
//! let (hunter, target) = (PlayerId::new(), PlayerId::new());
//! engine.record_location(game, hunter, 40.7128, -74.0060, 5.0, 1_700_000_000_000).await?;
//! engine.record_location(game, target, 40.7129, -74.0060, 5.0, 1_700_000_000_000).await?;
//!
//! if engine.can_eliminate_target(game, hunter, target, None).await? {
//!     // Proceed with the elimination.
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod map_config;
pub mod spatial;
pub mod stores;
pub mod types;
pub mod zones;

pub use cache::{CacheStats, ProximityCache};
pub use config::{EngineConfig, SmoothingStrategy};
pub use engine::ProximityEngine;
pub use error::{EngineError, StoreError};
pub use history::LocationHistory;
pub use map_config::{MapConfigProvider, MapConfiguration};
pub use spatial::{GeoGrid, PlayerDistance, SpatialIndexStats};
pub use stores::{
    GameSettingsProvider, InMemoryGameSettings, InMemoryLocationStore,
    InMemoryMapConfigurationStore, InMemorySafeZoneStore, LocationStore, MapConfigurationStore,
    SafeZoneStore,
};
pub use types::{now_millis, GameId, GameSettings, LocationSample, PlayerId, ZoneId};
pub use zones::{SafeZone, ZoneKind, ZoneRegistry};

// Re-exported so callers build coordinates without a direct geo dependency.
pub use manhunt_geo::{Coordinate, GeoBounds};

#[cfg(test)]
mod tests;
