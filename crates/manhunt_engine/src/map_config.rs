//! Per-game map configuration: default elimination distances, weapon
//! overrides, and the optional play-area boundary polygon.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::stores::{fetch_with_timeout, MapConfigurationStore};
use crate::types::{GameId, GameSettings};
use dashmap::DashMap;
use manhunt_geo::Coordinate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Map-level tuning for a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapConfiguration {
    /// Map identifier.
    pub map_id: String,
    /// Map-wide elimination distance, meters.
    pub elimination_distance_m: Option<f64>,
    /// Per-weapon elimination distances, keyed by upper-case weapon name.
    pub weapon_distances_m: HashMap<String, f64>,
    /// Distance at which targets learn a hunter is near, meters.
    pub proximity_awareness_distance_m: Option<f64>,
    /// Play-area boundary polygon, when the map has one.
    pub boundary: Option<Vec<Coordinate>>,
}

impl Default for MapConfiguration {
    fn default() -> Self {
        Self {
            map_id: "default".to_string(),
            elimination_distance_m: None,
            weapon_distances_m: HashMap::new(),
            proximity_awareness_distance_m: None,
            boundary: None,
        }
    }
}

impl MapConfiguration {
    /// Distance for the given weapon, if the map defines one. Lookup is
    /// case-insensitive.
    pub fn weapon_distance(&self, weapon: &str) -> Option<f64> {
        self.weapon_distances_m.get(&weapon.to_uppercase()).copied()
    }
}

#[derive(Debug, Clone)]
struct CachedConfig {
    config: MapConfiguration,
    fetched_at_ms: u64,
}

/// Store-backed map configuration mirror with a refresh window.
pub struct MapConfigProvider {
    store: Arc<dyn MapConfigurationStore>,
    cache: DashMap<GameId, CachedConfig>,
    refresh_window_ms: u64,
    fetch_timeout_ms: u64,
}

impl MapConfigProvider {
    /// Creates a provider over the given store.
    pub fn new(store: Arc<dyn MapConfigurationStore>, refresh_window_ms: u64, fetch_timeout_ms: u64) -> Self {
        Self {
            store,
            cache: DashMap::new(),
            refresh_window_ms,
            fetch_timeout_ms,
        }
    }

    /// The game's map configuration, refreshed from the store when the
    /// cached copy has aged past the refresh window.
    pub async fn configuration(&self, game: GameId, now_ms: u64) -> Result<MapConfiguration, EngineError> {
        if let Some(cached) = self.cache.get(&game) {
            if now_ms.saturating_sub(cached.fetched_at_ms) <= self.refresh_window_ms {
                return Ok(cached.config.clone());
            }
        }

        let config = fetch_with_timeout(
            "map configuration",
            self.fetch_timeout_ms,
            self.store.configuration(game),
        )
        .await?;

        debug!("Refreshed map configuration '{}' for game {}", config.map_id, game);
        self.cache.insert(
            game,
            CachedConfig {
                config: config.clone(),
                fetched_at_ms: now_ms,
            },
        );
        Ok(config)
    }

    /// Drops the cached configuration for a game.
    pub fn invalidate(&self, game: GameId) {
        self.cache.remove(&game);
    }
}

/// Resolves the elimination threshold for an attempt, in precedence order:
/// weapon override, then game-level override, then the map default, then
/// the engine-wide fallback. The GPS accuracy buffer is added on top.
pub fn resolve_elimination_distance(
    weapon: Option<&str>,
    settings: &GameSettings,
    map: &MapConfiguration,
    engine: &EngineConfig,
) -> f64 {
    let base = weapon
        .and_then(|w| map.weapon_distance(w))
        .or(settings.elimination_distance_m)
        .or(map.elimination_distance_m)
        .unwrap_or(engine.default_elimination_distance_m);
    base + engine.gps_accuracy_buffer_m
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::InMemoryMapConfigurationStore;

    fn engine_config() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn weapon_lookup_is_case_insensitive() {
        let mut config = MapConfiguration::default();
        config.weapon_distances_m.insert("SNIPER".to_string(), 100.0);
        assert_eq!(config.weapon_distance("sniper"), Some(100.0));
        assert_eq!(config.weapon_distance("Sniper"), Some(100.0));
        assert_eq!(config.weapon_distance("melee"), None);
    }

    #[test]
    fn resolution_precedence() {
        let engine = engine_config();
        let mut settings = GameSettings::default();
        let mut map = MapConfiguration::default();

        // Nothing configured: global fallback plus buffer.
        assert_eq!(
            resolve_elimination_distance(None, &settings, &map, &engine),
            10.0 + 5.0
        );

        // Map default beats the fallback.
        map.elimination_distance_m = Some(20.0);
        assert_eq!(
            resolve_elimination_distance(None, &settings, &map, &engine),
            20.0 + 5.0
        );

        // Game-level override beats the map default.
        settings.elimination_distance_m = Some(30.0);
        assert_eq!(
            resolve_elimination_distance(None, &settings, &map, &engine),
            30.0 + 5.0
        );

        // Weapon override beats everything.
        map.weapon_distances_m.insert("SNIPER".to_string(), 100.0);
        assert_eq!(
            resolve_elimination_distance(Some("sniper"), &settings, &map, &engine),
            100.0 + 5.0
        );

        // Unknown weapon falls through to the game-level override.
        assert_eq!(
            resolve_elimination_distance(Some("melee"), &settings, &map, &engine),
            30.0 + 5.0
        );
    }

    #[tokio::test]
    async fn provider_caches_within_refresh_window() {
        let store = Arc::new(InMemoryMapConfigurationStore::default());
        let game = GameId::new();
        let mut config = MapConfiguration::default();
        config.map_id = "campus".to_string();
        store.put_configuration(game, config);

        let provider = MapConfigProvider::new(store.clone(), 60_000, 1_000);
        assert_eq!(provider.configuration(game, 0).await.unwrap().map_id, "campus");

        // A store update within the window is not yet visible.
        let mut updated = MapConfiguration::default();
        updated.map_id = "downtown".to_string();
        store.put_configuration(game, updated);
        assert_eq!(provider.configuration(game, 30_000).await.unwrap().map_id, "campus");

        // Past the window the refresh picks it up.
        assert_eq!(
            provider.configuration(game, 70_000).await.unwrap().map_id,
            "downtown"
        );
    }
}
