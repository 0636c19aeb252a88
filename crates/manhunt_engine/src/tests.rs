//! End-to-end engine tests: full decision scenarios over the in-memory
//! stores, exercising the same paths a live game would.

use crate::config::EngineConfig;
use crate::engine::ProximityEngine;
use crate::error::{EngineError, StoreError};
use crate::stores::{
    GameSettingsProvider, InMemoryGameSettings, InMemoryLocationStore,
    InMemoryMapConfigurationStore, InMemorySafeZoneStore, LocationStore,
};
use crate::types::{now_millis, GameId, GameSettings, LocationSample, PlayerId};
use crate::zones::SafeZone;
use async_trait::async_trait;
use futures_util::future::join_all;
use manhunt_geo::{destination_point, Coordinate, GeoBounds};
use std::sync::Arc;

struct Fixture {
    engine: Arc<ProximityEngine>,
    location_store: Arc<InMemoryLocationStore>,
    zone_store: Arc<InMemorySafeZoneStore>,
    map_store: Arc<InMemoryMapConfigurationStore>,
    settings: Arc<InMemoryGameSettings>,
}

fn fixture_with(config: EngineConfig) -> Fixture {
    let location_store = Arc::new(InMemoryLocationStore::new());
    let zone_store = Arc::new(InMemorySafeZoneStore::new());
    let map_store = Arc::new(InMemoryMapConfigurationStore::default());
    let settings = Arc::new(InMemoryGameSettings::new());
    let engine = Arc::new(ProximityEngine::new(
        config,
        location_store.clone(),
        zone_store.clone(),
        map_store.clone(),
        settings.clone(),
    ));
    Fixture {
        engine,
        location_store,
        zone_store,
        map_store,
        settings,
    }
}

fn fixture() -> Fixture {
    fixture_with(EngineConfig::default())
}

fn coord(lat: f64, lon: f64) -> Coordinate {
    Coordinate::new(lat, lon).unwrap()
}

const ORIGIN_LAT: f64 = 40.7128;
const ORIGIN_LON: f64 = -74.0060;

fn origin() -> Coordinate {
    coord(ORIGIN_LAT, ORIGIN_LON)
}

/// A point `meters` due east of the origin.
fn east_of_origin(meters: f64) -> Coordinate {
    destination_point(origin(), 90.0, meters).unwrap()
}

async fn place(fix: &Fixture, game: GameId, player: PlayerId, at: Coordinate) {
    fix.engine
        .record_location(game, player, at.lat, at.lon, 5.0, now_millis())
        .await
        .unwrap();
}

#[tokio::test]
async fn elimination_approved_within_threshold() {
    let fix = fixture();
    let game = GameId::new();
    let (hunter, target) = (PlayerId::new(), PlayerId::new());

    place(&fix, game, hunter, origin()).await;
    place(&fix, game, target, east_of_origin(5.0)).await;

    assert!(fix
        .engine
        .can_eliminate_target(game, hunter, target, None)
        .await
        .unwrap());
}

#[tokio::test]
async fn elimination_denied_beyond_threshold() {
    let fix = fixture();
    let game = GameId::new();
    let (hunter, target) = (PlayerId::new(), PlayerId::new());

    place(&fix, game, hunter, origin()).await;
    place(&fix, game, target, east_of_origin(500.0)).await;

    assert!(!fix
        .engine
        .can_eliminate_target(game, hunter, target, None)
        .await
        .unwrap());
}

#[tokio::test]
async fn gps_buffer_extends_the_base_threshold() {
    let fix = fixture();
    let game = GameId::new();
    let (hunter, target) = (PlayerId::new(), PlayerId::new());

    // 12m apart: beyond the 10m default but within the 5m accuracy buffer.
    place(&fix, game, hunter, origin()).await;
    place(&fix, game, target, east_of_origin(12.0)).await;

    assert!(fix
        .engine
        .can_eliminate_target(game, hunter, target, None)
        .await
        .unwrap());
}

#[tokio::test]
async fn elimination_denied_inside_public_zone() {
    let fix = fixture();
    let game = GameId::new();
    let (hunter, target) = (PlayerId::new(), PlayerId::new());

    fix.zone_store
        .put_zone(SafeZone::public(game, "plaza", origin(), 50.0));

    place(&fix, game, hunter, origin()).await;
    place(&fix, game, target, east_of_origin(5.0)).await;

    assert!(!fix
        .engine
        .can_eliminate_target(game, hunter, target, None)
        .await
        .unwrap());
}

#[tokio::test]
async fn protected_killer_also_blocks_the_attempt() {
    let fix = fixture();
    let game = GameId::new();
    let (hunter, target) = (PlayerId::new(), PlayerId::new());

    // Zone covers only the hunter's position.
    fix.zone_store
        .put_zone(SafeZone::public(game, "spawn", origin(), 2.0));

    place(&fix, game, hunter, origin()).await;
    place(&fix, game, target, east_of_origin(8.0)).await;

    assert!(!fix
        .engine
        .can_eliminate_target(game, hunter, target, None)
        .await
        .unwrap());
}

#[tokio::test]
async fn weapon_override_beats_game_and_map_defaults() {
    let fix = fixture();
    let game = GameId::new();
    let (hunter, target) = (PlayerId::new(), PlayerId::new());

    let mut map = crate::map_config::MapConfiguration::default();
    map.weapon_distances_m.insert("SNIPER".to_string(), 100.0);
    fix.map_store.put_configuration(game, map);

    place(&fix, game, hunter, origin()).await;
    place(&fix, game, target, east_of_origin(50.0)).await;

    // Out of reach bare-handed, in reach with the long-range weapon.
    assert!(!fix
        .engine
        .can_eliminate_target(game, hunter, target, None)
        .await
        .unwrap());
    assert!(fix
        .engine
        .can_eliminate_target(game, hunter, target, Some("sniper"))
        .await
        .unwrap());
}

#[tokio::test]
async fn game_settings_override_applies() {
    let fix = fixture();
    let game = GameId::new();
    let (hunter, target) = (PlayerId::new(), PlayerId::new());

    fix.settings.put_settings(
        game,
        GameSettings {
            elimination_distance_m: Some(40.0),
            ..GameSettings::default()
        },
    );

    place(&fix, game, hunter, origin()).await;
    place(&fix, game, target, east_of_origin(30.0)).await;

    assert!(fix
        .engine
        .can_eliminate_target(game, hunter, target, None)
        .await
        .unwrap());
}

#[tokio::test]
async fn self_elimination_is_denied() {
    let fix = fixture();
    let game = GameId::new();
    let player = PlayerId::new();
    place(&fix, game, player, origin()).await;

    assert!(!fix
        .engine
        .can_eliminate_target(game, player, player, None)
        .await
        .unwrap());
}

#[tokio::test]
async fn missing_target_location_is_an_error() {
    let fix = fixture();
    let game = GameId::new();
    let (hunter, target) = (PlayerId::new(), PlayerId::new());
    place(&fix, game, hunter, origin()).await;

    let err = fix
        .engine
        .can_eliminate_target(game, hunter, target, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::LocationUnavailable { player } if player == target));
}

#[tokio::test]
async fn stale_location_is_an_error() {
    let fix = fixture();
    let game = GameId::new();
    let (hunter, target) = (PlayerId::new(), PlayerId::new());

    place(&fix, game, hunter, origin()).await;
    // Default staleness threshold is 60s; this report is two minutes old.
    fix.engine
        .record_location(
            game,
            target,
            ORIGIN_LAT,
            ORIGIN_LON,
            5.0,
            now_millis() - 120_000,
        )
        .await
        .unwrap();

    let err = fix
        .engine
        .can_eliminate_target(game, hunter, target, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::StaleLocation { player } if player == target));
}

#[tokio::test]
async fn history_is_seeded_from_the_store_after_restart() {
    let fix = fixture();
    let game = GameId::new();
    let (hunter, target) = (PlayerId::new(), PlayerId::new());

    place(&fix, game, hunter, origin()).await;
    place(&fix, game, target, east_of_origin(5.0)).await;

    // New engine process over the same stores: empty history, same answer.
    let restarted = ProximityEngine::new(
        EngineConfig::default(),
        fix.location_store.clone(),
        fix.zone_store.clone(),
        fix.map_store.clone(),
        fix.settings.clone(),
    );
    assert!(restarted
        .can_eliminate_target(game, hunter, target, None)
        .await
        .unwrap());
}

#[tokio::test]
async fn slow_settings_fetch_times_out() {
    struct HangingSettings;

    #[async_trait]
    impl GameSettingsProvider for HangingSettings {
        async fn settings(&self, _game: GameId) -> Result<GameSettings, StoreError> {
            std::future::pending().await
        }
    }

    let config = EngineConfig {
        fetch_timeout_ms: 20,
        ..EngineConfig::default()
    };
    let engine = ProximityEngine::new(
        config,
        Arc::new(InMemoryLocationStore::new()),
        Arc::new(InMemorySafeZoneStore::new()),
        Arc::new(InMemoryMapConfigurationStore::default()),
        Arc::new(HangingSettings),
    );

    let game = GameId::new();
    let (hunter, target) = (PlayerId::new(), PlayerId::new());
    engine
        .record_location(game, hunter, ORIGIN_LAT, ORIGIN_LON, 5.0, now_millis())
        .await
        .unwrap();
    engine
        .record_location(game, target, ORIGIN_LAT, ORIGIN_LON, 5.0, now_millis())
        .await
        .unwrap();

    let err = engine
        .can_eliminate_target(game, hunter, target, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::FetchTimeout { what: "game settings" }));
}

#[tokio::test]
async fn failing_store_fails_the_decision() {
    struct FailingSettings;

    #[async_trait]
    impl GameSettingsProvider for FailingSettings {
        async fn settings(&self, _game: GameId) -> Result<GameSettings, StoreError> {
            Err(StoreError::new("settings table unavailable"))
        }
    }

    let fix = fixture();
    let engine = ProximityEngine::new(
        EngineConfig::default(),
        fix.location_store.clone(),
        fix.zone_store.clone(),
        fix.map_store.clone(),
        Arc::new(FailingSettings),
    );

    let game = GameId::new();
    let (hunter, target) = (PlayerId::new(), PlayerId::new());
    engine
        .record_location(game, hunter, ORIGIN_LAT, ORIGIN_LON, 5.0, now_millis())
        .await
        .unwrap();
    engine
        .record_location(game, target, ORIGIN_LAT, ORIGIN_LON, 5.0, now_millis())
        .await
        .unwrap();

    let err = engine
        .can_eliminate_target(game, hunter, target, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Store(_)));
}

#[tokio::test]
async fn invalid_coordinates_are_rejected_at_ingestion() {
    let fix = fixture();
    let game = GameId::new();
    let player = PlayerId::new();

    let err = fix
        .engine
        .record_location(game, player, 91.0, 0.0, 5.0, now_millis())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidCoordinate(_)));

    // Nothing was indexed.
    assert!(fix.engine.index_stats(game).is_none());
}

#[tokio::test]
async fn relocation_cooldown_is_enforced_end_to_end() {
    let fix = fixture();
    let game = GameId::new();
    let owner = PlayerId::new();

    let zone = SafeZone::relocatable(game, "camp", origin(), 50.0, owner);
    let zone_id = zone.zone_id;
    fix.zone_store.put_zone(zone);
    fix.engine.zones_for_game(game).await.unwrap();

    let moved = fix
        .engine
        .relocate_zone(zone_id, east_of_origin(200.0))
        .await
        .unwrap();
    assert_eq!(moved.relocation_count, 1);

    let err = fix
        .engine
        .relocate_zone(zone_id, east_of_origin(400.0))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::RelocationCooldown { .. }));
}

#[tokio::test]
async fn spatial_queries_reflect_recorded_locations() {
    let fix = fixture();
    let game = GameId::new();
    let near = PlayerId::new();
    let mid = PlayerId::new();
    let far = PlayerId::new();

    place(&fix, game, near, east_of_origin(10.0)).await;
    place(&fix, game, mid, east_of_origin(80.0)).await;
    place(&fix, game, far, east_of_origin(5_000.0)).await;

    let within = fix.engine.find_players_within_radius(game, origin(), 100.0);
    assert_eq!(
        within.iter().map(|p| p.player).collect::<Vec<_>>(),
        vec![near, mid]
    );
    assert!(within[0].distance_m < within[1].distance_m);

    let nearest = fix.engine.find_k_nearest_players(game, origin(), 2);
    assert_eq!(nearest.iter().map(|p| p.player).collect::<Vec<_>>(), vec![near, mid]);

    let bounds = GeoBounds::new(
        coord(ORIGIN_LAT - 0.01, ORIGIN_LON - 0.01),
        coord(ORIGIN_LAT + 0.01, ORIGIN_LON + 0.01),
    );
    let boxed: Vec<_> = fix
        .engine
        .find_players_in_bounds(game, bounds)
        .into_iter()
        .map(|p| p.player)
        .collect();
    assert!(boxed.contains(&near) && boxed.contains(&mid) && !boxed.contains(&far));

    let polygon = [
        coord(ORIGIN_LAT - 0.01, ORIGIN_LON - 0.01),
        coord(ORIGIN_LAT - 0.01, ORIGIN_LON + 0.01),
        coord(ORIGIN_LAT + 0.01, ORIGIN_LON + 0.01),
        coord(ORIGIN_LAT + 0.01, ORIGIN_LON - 0.01),
    ];
    let polled: Vec<_> = fix
        .engine
        .find_players_in_polygon(game, &polygon)
        .into_iter()
        .map(|p| p.player)
        .collect();
    assert!(polled.contains(&near) && polled.contains(&mid) && !polled.contains(&far));
}

#[tokio::test]
async fn removed_player_disappears_from_queries_and_decisions() {
    let fix = fixture();
    let game = GameId::new();
    let (hunter, target) = (PlayerId::new(), PlayerId::new());

    place(&fix, game, hunter, origin()).await;
    place(&fix, game, target, east_of_origin(5.0)).await;
    fix.engine.remove_player(game, target);
    // A player with no record anywhere, for the decision-path check.
    let ghost = PlayerId::new();

    let within = fix.engine.find_players_within_radius(game, origin(), 100.0);
    assert_eq!(within.iter().map(|p| p.player).collect::<Vec<_>>(), vec![hunter]);

    let err = fix
        .engine
        .can_eliminate_target(game, hunter, ghost, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::LocationUnavailable { .. }));
}

#[tokio::test]
async fn concurrent_location_updates_are_not_lost() {
    let fix = fixture();
    let game = GameId::new();
    let players: Vec<PlayerId> = (0..100).map(|_| PlayerId::new()).collect();

    let tasks = players.iter().enumerate().map(|(i, &player)| {
        let engine = fix.engine.clone();
        let lat = ORIGIN_LAT + (i as f64) * 0.0001;
        tokio::spawn(async move {
            engine
                .record_location(game, player, lat, ORIGIN_LON, 5.0, now_millis())
                .await
        })
    });
    for result in join_all(tasks).await {
        result.unwrap().unwrap();
    }

    let stats = fix.engine.index_stats(game).unwrap();
    assert_eq!(stats.entries, 100);
    assert_eq!(stats.total_insertions, 100);

    let everyone = fix.engine.find_players_within_radius(game, origin(), 10_000.0);
    assert_eq!(everyone.len(), 100);
}

#[tokio::test]
async fn cached_distance_does_not_outlive_target_movement() {
    let fix = fixture();
    let game = GameId::new();
    let (hunter, target) = (PlayerId::new(), PlayerId::new());

    place(&fix, game, hunter, origin()).await;
    place(&fix, game, target, east_of_origin(5.0)).await;
    assert!(fix
        .engine
        .can_eliminate_target(game, hunter, target, None)
        .await
        .unwrap());

    // Target flees well out of range within the distance-cache TTL. The
    // hunter has not moved, so a key that ignored the target's position
    // would keep serving the stale 5m distance.
    place(&fix, game, target, east_of_origin(500.0)).await;
    assert!(!fix
        .engine
        .can_eliminate_target(game, hunter, target, None)
        .await
        .unwrap());
}

#[tokio::test]
async fn zone_membership_is_evaluated_at_the_given_time() {
    let fix = fixture();
    let game = GameId::new();
    let player = PlayerId::new();
    fix.zone_store
        .put_zone(SafeZone::timed(game, "ceasefire", origin(), 100.0, 1_000, 2_000));

    assert!(fix
        .engine
        .is_location_in_safe_zone(game, player, ORIGIN_LAT, ORIGIN_LON, 1_500)
        .await
        .unwrap());
    assert!(!fix
        .engine
        .is_location_in_safe_zone(game, player, ORIGIN_LAT, ORIGIN_LON, 5_000)
        .await
        .unwrap());
}

#[tokio::test]
async fn failed_location_write_surfaces_and_the_resend_converges() {
    struct FailingLocations;

    #[async_trait]
    impl LocationStore for FailingLocations {
        async fn latest_location(
            &self,
            _player: PlayerId,
        ) -> Result<Option<LocationSample>, StoreError> {
            Ok(None)
        }

        async fn put_location(
            &self,
            _player: PlayerId,
            _sample: LocationSample,
        ) -> Result<(), StoreError> {
            Err(StoreError::new("location table unavailable"))
        }
    }

    let engine = ProximityEngine::new(
        EngineConfig::default(),
        Arc::new(FailingLocations),
        Arc::new(InMemorySafeZoneStore::new()),
        Arc::new(InMemoryMapConfigurationStore::default()),
        Arc::new(InMemoryGameSettings::new()),
    );

    let game = GameId::new();
    let player = PlayerId::new();
    let ts = now_millis();

    let err = engine
        .record_location(game, player, ORIGIN_LAT, ORIGIN_LON, 5.0, ts)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Store(_)));
    // Local state advanced despite the failed write-through.
    assert_eq!(engine.find_players_within_radius(game, origin(), 10.0).len(), 1);

    // The client resend carries the same timestamp and must not be
    // rejected as out of order; only the store failure repeats.
    let err = engine
        .record_location(game, player, ORIGIN_LAT, ORIGIN_LON, 5.0, ts)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Store(_)));
}

#[tokio::test]
async fn repeated_checks_hit_the_decision_cache() {
    let fix = fixture();
    let game = GameId::new();
    let (hunter, target) = (PlayerId::new(), PlayerId::new());

    place(&fix, game, hunter, origin()).await;
    place(&fix, game, target, east_of_origin(5.0)).await;

    fix.engine
        .can_eliminate_target(game, hunter, target, None)
        .await
        .unwrap();
    let misses_after_first = fix.engine.cache_stats().misses;

    fix.engine
        .can_eliminate_target(game, hunter, target, None)
        .await
        .unwrap();
    let stats = fix.engine.cache_stats();
    assert_eq!(stats.misses, misses_after_first);
    assert!(stats.hits >= 3);
}
