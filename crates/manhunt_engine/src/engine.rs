//! The proximity decision engine.
//!
//! `ProximityEngine` ties the pieces together: location ingestion feeds the
//! per-player history and the per-game spatial index, and elimination
//! checks combine effective locations, the resolved distance threshold, and
//! safe-zone protection into a single boolean decision.
//!
//! Every external fetch runs under a timeout, and any failure to obtain the
//! data a decision needs surfaces as an error rather than a permissive
//! answer. A `false` result means the attempt was judged and denied; an
//! `Err` means no judgment was possible.

use crate::cache::{CacheKey, CacheStats, CachedValue, ProximityCache};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::history::LocationHistory;
use crate::map_config::{resolve_elimination_distance, MapConfigProvider, MapConfiguration};
use crate::spatial::{GeoGrid, PlayerDistance, SpatialIndexStats};
use crate::stores::{
    fetch_with_timeout, GameSettingsProvider, LocationStore, MapConfigurationStore, SafeZoneStore,
};
use crate::types::{now_millis, GameId, GameSettings, LocationSample, PlayerId, ZoneId};
use crate::zones::{SafeZone, ZoneRegistry};
use dashmap::DashMap;
use futures_util::try_join;
use manhunt_geo::{bearing_deg, cardinal_direction, centroid, distance_m, Coordinate, GeoBounds};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Proximity-based elimination decision engine.
///
/// Cheap to share behind an `Arc`; all interior state is concurrent.
pub struct ProximityEngine {
    config: EngineConfig,
    history: LocationHistory,
    indexes: DashMap<GameId, Arc<GeoGrid>>,
    zones: ZoneRegistry,
    map_config: MapConfigProvider,
    cache: ProximityCache,
    location_store: Arc<dyn LocationStore>,
    settings: Arc<dyn GameSettingsProvider>,
}

impl ProximityEngine {
    /// Creates an engine over the given collaborators.
    pub fn new(
        config: EngineConfig,
        location_store: Arc<dyn LocationStore>,
        zone_store: Arc<dyn SafeZoneStore>,
        map_store: Arc<dyn MapConfigurationStore>,
        settings: Arc<dyn GameSettingsProvider>,
    ) -> Self {
        let history = LocationHistory::new(
            config.history_capacity,
            config.max_sample_age_secs,
            config.history_idle_sweep_secs,
        );
        let zones = ZoneRegistry::new(
            zone_store,
            config.zone_refresh_window_ms,
            config.fetch_timeout_ms,
            config.zero_radius_epsilon_deg,
        );
        let map_config = MapConfigProvider::new(
            map_store,
            config.map_config_refresh_window_ms,
            config.fetch_timeout_ms,
        );
        Self {
            config,
            history,
            indexes: DashMap::new(),
            zones,
            map_config,
            cache: ProximityCache::new(),
            location_store,
            settings,
        }
    }

    fn grid(&self, game: GameId) -> Arc<GeoGrid> {
        self.indexes
            .entry(game)
            .or_insert_with(|| Arc::new(GeoGrid::new(self.config.grid_cell_size_m)))
            .clone()
    }

    /// Ingests a location report for a player in a game.
    ///
    /// Validates the coordinate, appends to the sample window, updates the
    /// game's spatial index, and writes through to the location store.
    /// Out-of-order reports are rejected without mutating any state.
    ///
    /// Local state advances before the write-through: if the store call
    /// fails, the sample is already visible locally and the client should
    /// resend. A resend with the same timestamp is accepted (equal
    /// timestamps are not out of order), so the retry converges instead of
    /// being rejected as stale.
    pub async fn record_location(
        &self,
        game: GameId,
        player: PlayerId,
        lat: f64,
        lon: f64,
        accuracy_m: f64,
        timestamp_ms: u64,
    ) -> Result<(), EngineError> {
        let coord = Coordinate::new(lat, lon)?;
        let sample = LocationSample::new(coord, accuracy_m, timestamp_ms);

        self.history.record(player, sample)?;
        self.grid(game).upsert(player, coord);

        fetch_with_timeout(
            "location write",
            self.config.fetch_timeout_ms,
            self.location_store.put_location(player, sample),
        )
        .await?;

        debug!("Recorded location {} for player {} in game {}", coord, player, game);
        Ok(())
    }

    /// Decides whether `killer` may eliminate `target` right now.
    ///
    /// `Ok(true)` means the pair is within the resolved elimination
    /// distance and neither side is protected by a safe zone. `Ok(false)`
    /// is a judged denial; `Err` means the inputs required for a judgment
    /// could not be obtained.
    pub async fn can_eliminate_target(
        &self,
        game: GameId,
        killer: PlayerId,
        target: PlayerId,
        weapon: Option<&str>,
    ) -> Result<bool, EngineError> {
        if killer == target {
            debug!("Denied self-elimination attempt by player {}", killer);
            return Ok(false);
        }
        let now_ms = now_millis();

        let settings = fetch_with_timeout(
            "game settings",
            self.config.fetch_timeout_ms,
            self.settings.settings(game),
        )
        .await?;

        let (killer_at, target_at) = try_join!(
            self.resolve_location(game, killer, &settings, now_ms),
            self.resolve_location(game, target, &settings, now_ms),
        )?;

        let map = self.map_config.configuration(game, now_ms).await?;
        let threshold_m = resolve_elimination_distance(weapon, &settings, &map, &self.config);

        let distance = self.pair_distance(game, killer, target, killer_at, target_at, now_ms);
        if distance > threshold_m {
            debug!(
                "Denied elimination in game {}: {:.1}m exceeds {:.1}m threshold",
                game, distance, threshold_m
            );
            return Ok(false);
        }

        // Either side inside a qualifying zone blocks the attempt.
        if self.protected_cached(game, killer, killer_at, now_ms).await? {
            debug!("Denied elimination in game {}: killer {} is in a safe zone", game, killer);
            return Ok(false);
        }
        if self.protected_cached(game, target, target_at, now_ms).await? {
            debug!("Denied elimination in game {}: target {} is in a safe zone", game, target);
            return Ok(false);
        }

        info!(
            "Approved elimination in game {}: player {} -> {} at {:.1}m {} (threshold {:.1}m)",
            game,
            killer,
            target,
            distance,
            cardinal_direction(bearing_deg(killer_at, target_at)),
            threshold_m
        );
        Ok(true)
    }

    /// Whether a player standing at the given coordinate is protected by
    /// any of the game's zones at `at_ms`.
    ///
    /// The evaluation time is explicit so periodic subsystems (zone damage
    /// ticks, scheduled protection changes) can ask about moments other
    /// than now.
    pub async fn is_location_in_safe_zone(
        &self,
        game: GameId,
        player: PlayerId,
        lat: f64,
        lon: f64,
        at_ms: u64,
    ) -> Result<bool, EngineError> {
        let coord = Coordinate::new(lat, lon)?;
        self.zones.is_protected(game, player, coord, at_ms).await
    }

    /// Indexed players within `radius_m` of `center`, nearest first.
    pub fn find_players_within_radius(
        &self,
        game: GameId,
        center: Coordinate,
        radius_m: f64,
    ) -> Vec<PlayerDistance> {
        match self.indexes.get(&game) {
            Some(grid) => grid.query_radius(center, radius_m),
            None => Vec::new(),
        }
    }

    /// The `k` indexed players nearest to `center`.
    pub fn find_k_nearest_players(&self, game: GameId, center: Coordinate, k: usize) -> Vec<PlayerDistance> {
        match self.indexes.get(&game) {
            Some(grid) => grid.query_k_nearest(center, k),
            None => Vec::new(),
        }
    }

    /// Indexed players inside a bounding box, annotated with the distance
    /// to the box's midpoint.
    pub fn find_players_in_bounds(&self, game: GameId, bounds: GeoBounds) -> Vec<PlayerDistance> {
        let Some(grid) = self.indexes.get(&game) else {
            return Vec::new();
        };
        let reference = Some(bounds.center());
        Self::annotate(grid.query_bounding_box(bounds), reference)
    }

    /// Indexed players inside a polygon, annotated with the distance to
    /// the polygon's centroid.
    pub fn find_players_in_polygon(&self, game: GameId, polygon: &[Coordinate]) -> Vec<PlayerDistance> {
        let Some(grid) = self.indexes.get(&game) else {
            return Vec::new();
        };
        Self::annotate(grid.query_polygon(polygon), centroid(polygon))
    }

    /// Forgets a player: history, index entries, everything. Cache entries
    /// keyed to them lapse on their own TTL.
    pub fn remove_player(&self, game: GameId, player: PlayerId) {
        self.history.clear(player);
        if let Some(grid) = self.indexes.get(&game) {
            grid.remove(player);
        }
        debug!("Removed player {} from game {}", player, game);
    }

    /// Moves a relocatable zone, enforcing cooldown policy.
    pub async fn relocate_zone(&self, zone: ZoneId, new_center: Coordinate) -> Result<SafeZone, EngineError> {
        self.zones.relocate(zone, new_center, now_millis()).await
    }

    /// Makes a newly persisted zone visible without waiting for a refresh.
    pub fn insert_zone(&self, zone: SafeZone) {
        self.zones.insert_zone(zone);
    }

    /// Toggles a zone's active flag in the local view.
    pub fn set_zone_active(&self, zone: ZoneId, active: bool) -> bool {
        self.zones.set_zone_active(zone, active)
    }

    /// The game's zones as currently known, refreshing if the view aged out.
    pub async fn zones_for_game(&self, game: GameId) -> Result<Vec<SafeZone>, EngineError> {
        self.zones.zones_for_game(game, now_millis()).await
    }

    /// The game's map configuration as currently known.
    pub async fn map_configuration(&self, game: GameId) -> Result<MapConfiguration, EngineError> {
        self.map_config.configuration(game, now_millis()).await
    }

    /// Spatial index statistics for a game, if it has one.
    pub fn index_stats(&self, game: GameId) -> Option<SpatialIndexStats> {
        self.indexes.get(&game).map(|grid| grid.stats())
    }

    /// Decision cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drops expired cache entries and idle player histories. Intended for
    /// a periodic maintenance task.
    pub fn sweep(&self) -> (usize, usize) {
        let now_ms = now_millis();
        (self.cache.sweep(now_ms), self.history.sweep_idle(now_ms))
    }

    /// The effective location a decision may rely on.
    ///
    /// Falls back to the location store when the in-memory window is empty
    /// (a restart, typically), then refuses anything older than the game's
    /// staleness threshold.
    async fn resolve_location(
        &self,
        game: GameId,
        player: PlayerId,
        settings: &GameSettings,
        now_ms: u64,
    ) -> Result<Coordinate, EngineError> {
        if self.history.latest(player).is_none() {
            let persisted = fetch_with_timeout(
                "latest location",
                self.config.fetch_timeout_ms,
                self.location_store.latest_location(player),
            )
            .await?;
            match persisted {
                Some(sample) => {
                    warn!("Seeding empty history for player {} from store", player);
                    self.history.record(player, sample)?;
                    self.grid(game).upsert(player, sample.coord);
                }
                None => return Err(EngineError::LocationUnavailable { player }),
            }
        }

        let newest = self
            .history
            .latest(player)
            .ok_or(EngineError::LocationUnavailable { player })?;
        let staleness_ms = settings.location_staleness_threshold_secs * 1_000;
        if now_ms.saturating_sub(newest.timestamp_ms) > staleness_ms {
            return Err(EngineError::StaleLocation { player });
        }

        self.history
            .effective_location(player, settings.use_smoothed_locations, self.config.smoothing)
            .ok_or(EngineError::LocationUnavailable { player })
    }

    fn pair_distance(
        &self,
        game: GameId,
        killer: PlayerId,
        target: PlayerId,
        killer_at: Coordinate,
        target_at: Coordinate,
        now_ms: u64,
    ) -> f64 {
        let key = CacheKey::distance(game, killer, target, killer_at, target_at);
        if let Some(CachedValue::Distance(d)) = self.cache.get(&key, now_ms) {
            return d;
        }
        let d = distance_m(killer_at, target_at);
        self.cache
            .put(key, CachedValue::Distance(d), now_ms, self.config.distance_cache_ttl_ms);
        d
    }

    async fn protected_cached(
        &self,
        game: GameId,
        player: PlayerId,
        at: Coordinate,
        now_ms: u64,
    ) -> Result<bool, EngineError> {
        let key = CacheKey::membership(game, player, at);
        if let Some(CachedValue::Membership(protected)) = self.cache.get(&key, now_ms) {
            return Ok(protected);
        }
        let protected = self.zones.is_protected(game, player, at, now_ms).await?;
        self.cache.put(
            key,
            CachedValue::Membership(protected),
            now_ms,
            self.config.zone_cache_ttl_ms,
        );
        Ok(protected)
    }

    fn annotate(hits: Vec<(PlayerId, Coordinate)>, reference: Option<Coordinate>) -> Vec<PlayerDistance> {
        let mut out: Vec<PlayerDistance> = hits
            .into_iter()
            .map(|(player, coord)| PlayerDistance {
                player,
                coord,
                distance_m: reference.map_or(0.0, |r| distance_m(r, coord)),
            })
            .collect();
        out.sort_by(|a, b| {
            a.distance_m
                .total_cmp(&b.distance_m)
                .then_with(|| a.player.cmp(&b.player))
        });
        out
    }
}
