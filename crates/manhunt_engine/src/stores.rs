//! External collaborator interfaces.
//!
//! The engine owns no persistence: locations, safe zones, map
//! configurations, and game settings live in backing stores owned by the
//! surrounding system. These traits are the engine's only view of them.
//! Implementations must be cheap to clone behind `Arc` and safe for
//! concurrent use; the engine wraps every call in its fetch timeout.
//!
//! The in-memory implementations at the bottom back the test suite and
//! single-process deployments.

use crate::error::StoreError;
use crate::map_config::MapConfiguration;
use crate::types::{GameId, GameSettings, LocationSample, PlayerId, ZoneId};
use crate::zones::SafeZone;
use async_trait::async_trait;
use dashmap::DashMap;
use manhunt_geo::Coordinate;

/// Persistent player location records. Seeds history after a restart;
/// `record_location` writes through to it.
#[async_trait]
pub trait LocationStore: Send + Sync {
    /// Latest persisted location for a player, if any.
    async fn latest_location(&self, player: PlayerId)
        -> Result<Option<LocationSample>, StoreError>;

    /// Persists an accepted location update.
    async fn put_location(
        &self,
        player: PlayerId,
        sample: LocationSample,
    ) -> Result<(), StoreError>;
}

/// Authoritative safe-zone records.
#[async_trait]
pub trait SafeZoneStore: Send + Sync {
    /// All zones configured for a game, active or not.
    async fn zones_for_game(&self, game: GameId) -> Result<Vec<SafeZone>, StoreError>;

    /// Persists a relocation already validated by the engine.
    async fn relocate_zone(
        &self,
        zone: ZoneId,
        new_center: Coordinate,
        at_ms: u64,
    ) -> Result<(), StoreError>;
}

/// Per-game/map configuration records.
#[async_trait]
pub trait MapConfigurationStore: Send + Sync {
    /// Effective map configuration for a game.
    async fn configuration(&self, game: GameId) -> Result<MapConfiguration, StoreError>;
}

/// Per-game rule flags.
#[async_trait]
pub trait GameSettingsProvider: Send + Sync {
    /// Settings for a game. Implementations should fall back to defaults
    /// rather than fail for unknown games.
    async fn settings(&self, game: GameId) -> Result<GameSettings, StoreError>;
}

/// Runs a store call under the engine's fetch budget.
///
/// A slow collaborator fails the decision explicitly instead of hanging it;
/// retry policy belongs to the caller.
pub(crate) async fn fetch_with_timeout<T>(
    what: &'static str,
    budget_ms: u64,
    fut: impl std::future::Future<Output = Result<T, StoreError>>,
) -> Result<T, crate::error::EngineError> {
    match tokio::time::timeout(std::time::Duration::from_millis(budget_ms), fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(err.into()),
        Err(_) => Err(crate::error::EngineError::FetchTimeout { what }),
    }
}

// ============================================================================
// In-memory implementations
// ============================================================================

/// A `LocationStore` backed by a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryLocationStore {
    locations: DashMap<PlayerId, LocationSample>,
}

impl InMemoryLocationStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocationStore for InMemoryLocationStore {
    async fn latest_location(
        &self,
        player: PlayerId,
    ) -> Result<Option<LocationSample>, StoreError> {
        Ok(self.locations.get(&player).map(|s| *s))
    }

    async fn put_location(
        &self,
        player: PlayerId,
        sample: LocationSample,
    ) -> Result<(), StoreError> {
        self.locations.insert(player, sample);
        Ok(())
    }
}

/// A `SafeZoneStore` backed by a concurrent map.
#[derive(Debug, Default)]
pub struct InMemorySafeZoneStore {
    zones: DashMap<ZoneId, SafeZone>,
}

impl InMemorySafeZoneStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a zone.
    pub fn put_zone(&self, zone: SafeZone) {
        self.zones.insert(zone.zone_id, zone);
    }

    /// Removes a zone.
    pub fn remove_zone(&self, zone: ZoneId) {
        self.zones.remove(&zone);
    }
}

#[async_trait]
impl SafeZoneStore for InMemorySafeZoneStore {
    async fn zones_for_game(&self, game: GameId) -> Result<Vec<SafeZone>, StoreError> {
        Ok(self
            .zones
            .iter()
            .filter(|z| z.game_id == game)
            .map(|z| z.clone())
            .collect())
    }

    async fn relocate_zone(
        &self,
        zone: ZoneId,
        new_center: Coordinate,
        at_ms: u64,
    ) -> Result<(), StoreError> {
        let mut entry = self
            .zones
            .get_mut(&zone)
            .ok_or_else(|| StoreError::new(format!("unknown zone {zone}")))?;
        entry.center = new_center;
        entry.relocation_count += 1;
        entry.last_relocation_ms = Some(at_ms);
        Ok(())
    }
}

/// A `MapConfigurationStore` serving per-game configurations with a shared
/// fallback.
#[derive(Debug)]
pub struct InMemoryMapConfigurationStore {
    configurations: DashMap<GameId, MapConfiguration>,
    fallback: MapConfiguration,
}

impl InMemoryMapConfigurationStore {
    /// Creates a store that answers `fallback` for unconfigured games.
    pub fn new(fallback: MapConfiguration) -> Self {
        Self {
            configurations: DashMap::new(),
            fallback,
        }
    }

    /// Sets a game-specific configuration.
    pub fn put_configuration(&self, game: GameId, config: MapConfiguration) {
        self.configurations.insert(game, config);
    }
}

impl Default for InMemoryMapConfigurationStore {
    fn default() -> Self {
        Self::new(MapConfiguration::default())
    }
}

#[async_trait]
impl MapConfigurationStore for InMemoryMapConfigurationStore {
    async fn configuration(&self, game: GameId) -> Result<MapConfiguration, StoreError> {
        Ok(self
            .configurations
            .get(&game)
            .map(|c| c.clone())
            .unwrap_or_else(|| self.fallback.clone()))
    }
}

/// A `GameSettingsProvider` serving per-game settings with defaults for
/// unknown games.
#[derive(Debug, Default)]
pub struct InMemoryGameSettings {
    settings: DashMap<GameId, GameSettings>,
}

impl InMemoryGameSettings {
    /// Creates a provider answering `GameSettings::default()` everywhere.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a game's settings.
    pub fn put_settings(&self, game: GameId, settings: GameSettings) {
        self.settings.insert(game, settings);
    }
}

#[async_trait]
impl GameSettingsProvider for InMemoryGameSettings {
    async fn settings(&self, game: GameId) -> Result<GameSettings, StoreError> {
        Ok(self
            .settings
            .get(&game)
            .map(|s| s.clone())
            .unwrap_or_default())
    }
}
