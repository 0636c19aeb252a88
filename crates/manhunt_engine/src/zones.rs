//! # Safe Zone Registry & Evaluator
//!
//! Safe zones are geographic circles that, while active and applicable,
//! prevent elimination of (or by) a player inside them. Four kinds exist:
//!
//! - `Public` — protects everyone while its active flag is set.
//! - `Private` — protects only its authorized occupants while active.
//! - `Timed` — protects everyone within its `[start, end]` window,
//!   regardless of the active flag.
//! - `Relocatable` — a public-style zone whose owner may move it, limited
//!   by a relocation cooldown.
//!
//! A zone is a single flat record with a kind discriminant; activity is a
//! pure function over the discriminant. Overlapping zones combine by
//! logical OR: any single qualifying zone grants protection, with no
//! precedence between kinds.
//!
//! The registry mirrors the authoritative zone store within a refresh
//! window; its local view is eventually consistent. Creation, relocation,
//! and deactivation are visible to subsequent evaluations without a
//! restart.

use crate::error::EngineError;
use crate::stores::{fetch_with_timeout, SafeZoneStore};
use crate::types::{GameId, PlayerId, ZoneId};
use dashmap::DashMap;
use manhunt_geo::{distance_m, Coordinate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Zone kind discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneKind {
    /// Protects all players while active.
    Public,
    /// Protects only authorized players while active.
    Private,
    /// Protects all players within its time window.
    Timed,
    /// Public protection; the owner may move it subject to a cooldown.
    Relocatable,
}

/// A geographic protection zone.
///
/// Kind-specific fields are optional and ignored for other kinds:
/// `authorized_players` applies to `Private`, `starts_at_ms`/`ends_at_ms`
/// to `Timed`, and the relocation fields to `Relocatable`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafeZone {
    /// Zone identifier.
    pub zone_id: ZoneId,
    /// Owning game.
    pub game_id: GameId,
    /// Display name.
    pub name: String,
    /// Kind discriminant.
    pub kind: ZoneKind,
    /// Center of the protected circle.
    pub center: Coordinate,
    /// Radius of the protected circle in meters; zero protects only the
    /// exact center.
    pub radius_m: f64,
    /// Active flag for `Public`, `Private`, and `Relocatable` zones.
    pub is_active: bool,
    /// Players protected by a `Private` zone. The creator is always
    /// included.
    pub authorized_players: HashSet<PlayerId>,
    /// Window start for `Timed` zones, epoch milliseconds (inclusive).
    pub starts_at_ms: Option<u64>,
    /// Window end for `Timed` zones, epoch milliseconds (inclusive).
    pub ends_at_ms: Option<u64>,
    /// Times a `Relocatable` zone has moved.
    pub relocation_count: u32,
    /// When a `Relocatable` zone last moved, epoch milliseconds.
    pub last_relocation_ms: Option<u64>,
    /// Minimum spacing between relocations, milliseconds.
    pub relocation_cooldown_ms: u64,
    /// Creating player, when created by a player action.
    pub created_by: Option<PlayerId>,
}

/// Default relocation cooldown: one hour.
pub const DEFAULT_RELOCATION_COOLDOWN_MS: u64 = 60 * 60 * 1000;

impl SafeZone {
    fn base(game_id: GameId, name: impl Into<String>, kind: ZoneKind, center: Coordinate, radius_m: f64) -> Self {
        Self {
            zone_id: ZoneId::new(),
            game_id,
            name: name.into(),
            kind,
            center,
            radius_m: radius_m.max(0.0),
            is_active: true,
            authorized_players: HashSet::new(),
            starts_at_ms: None,
            ends_at_ms: None,
            relocation_count: 0,
            last_relocation_ms: None,
            relocation_cooldown_ms: DEFAULT_RELOCATION_COOLDOWN_MS,
            created_by: None,
        }
    }

    /// Creates an active public zone.
    pub fn public(game_id: GameId, name: impl Into<String>, center: Coordinate, radius_m: f64) -> Self {
        Self::base(game_id, name, ZoneKind::Public, center, radius_m)
    }

    /// Creates an active private zone. The creator is always authorized.
    pub fn private(
        game_id: GameId,
        name: impl Into<String>,
        center: Coordinate,
        radius_m: f64,
        created_by: PlayerId,
        authorized: impl IntoIterator<Item = PlayerId>,
    ) -> Self {
        let mut zone = Self::base(game_id, name, ZoneKind::Private, center, radius_m);
        zone.created_by = Some(created_by);
        zone.authorized_players = authorized.into_iter().collect();
        zone.authorized_players.insert(created_by);
        zone
    }

    /// Creates a timed zone protecting within `[starts_at_ms, ends_at_ms]`.
    pub fn timed(
        game_id: GameId,
        name: impl Into<String>,
        center: Coordinate,
        radius_m: f64,
        starts_at_ms: u64,
        ends_at_ms: u64,
    ) -> Self {
        let mut zone = Self::base(game_id, name, ZoneKind::Timed, center, radius_m);
        zone.starts_at_ms = Some(starts_at_ms);
        zone.ends_at_ms = Some(ends_at_ms);
        zone
    }

    /// Creates an active relocatable zone owned by `created_by`.
    pub fn relocatable(
        game_id: GameId,
        name: impl Into<String>,
        center: Coordinate,
        radius_m: f64,
        created_by: PlayerId,
    ) -> Self {
        let mut zone = Self::base(game_id, name, ZoneKind::Relocatable, center, radius_m);
        zone.created_by = Some(created_by);
        zone
    }

    /// Whether the zone is in effect at `at_ms`. Pure over the kind
    /// discriminant: timed zones consult only their window, every other
    /// kind consults only the active flag.
    pub fn is_active_at(&self, at_ms: u64) -> bool {
        match self.kind {
            ZoneKind::Timed => match (self.starts_at_ms, self.ends_at_ms) {
                (Some(start), Some(end)) => start <= at_ms && at_ms <= end,
                // A timed zone without a window can never be in effect.
                _ => false,
            },
            ZoneKind::Public | ZoneKind::Private | ZoneKind::Relocatable => self.is_active,
        }
    }

    /// Whether the coordinate lies inside the zone, boundary inclusive.
    ///
    /// A zero-radius zone protects only an exact-center match within
    /// `epsilon_deg` per axis; haversine noise at sub-meter scale would
    /// otherwise make such zones unusable.
    pub fn contains(&self, coord: Coordinate, epsilon_deg: f64) -> bool {
        if self.radius_m == 0.0 {
            return self.center.approx_eq(coord, epsilon_deg);
        }
        distance_m(coord, self.center) <= self.radius_m
    }

    /// Whether the zone protects `player` standing at `coord` at `at_ms`.
    /// Each zone is evaluated independently; kind never defers to other
    /// zones.
    pub fn protects(&self, player: PlayerId, coord: Coordinate, at_ms: u64, epsilon_deg: f64) -> bool {
        if !self.is_active_at(at_ms) {
            return false;
        }
        if self.kind == ZoneKind::Private && !self.authorized_players.contains(&player) {
            return false;
        }
        self.contains(coord, epsilon_deg)
    }
}

#[derive(Debug, Clone)]
struct GameZones {
    zones: Vec<SafeZone>,
    fetched_at_ms: u64,
}

/// Read-mostly mirror of the safe-zone store with protection evaluation
/// and relocation policy.
pub struct ZoneRegistry {
    store: Arc<dyn SafeZoneStore>,
    games: DashMap<GameId, GameZones>,
    zone_index: DashMap<ZoneId, GameId>,
    refresh_window_ms: u64,
    fetch_timeout_ms: u64,
    zero_radius_epsilon_deg: f64,
}

impl ZoneRegistry {
    /// Creates a registry over the given store.
    pub fn new(
        store: Arc<dyn SafeZoneStore>,
        refresh_window_ms: u64,
        fetch_timeout_ms: u64,
        zero_radius_epsilon_deg: f64,
    ) -> Self {
        Self {
            store,
            games: DashMap::new(),
            zone_index: DashMap::new(),
            refresh_window_ms,
            fetch_timeout_ms,
            zero_radius_epsilon_deg,
        }
    }

    /// The game's zones, refreshed from the store when the cached view has
    /// aged past the refresh window.
    pub async fn zones_for_game(
        &self,
        game: GameId,
        now_ms: u64,
    ) -> Result<Vec<SafeZone>, EngineError> {
        if let Some(cached) = self.games.get(&game) {
            if now_ms.saturating_sub(cached.fetched_at_ms) <= self.refresh_window_ms {
                return Ok(cached.zones.clone());
            }
        }

        let zones = fetch_with_timeout(
            "safe zones",
            self.fetch_timeout_ms,
            self.store.zones_for_game(game),
        )
        .await?;

        debug!("Refreshed {} safe zone(s) for game {}", zones.len(), game);
        for zone in &zones {
            self.zone_index.insert(zone.zone_id, game);
        }
        self.games.insert(
            game,
            GameZones {
                zones: zones.clone(),
                fetched_at_ms: now_ms,
            },
        );
        Ok(zones)
    }

    /// Whether any zone of the game protects `player` at `coord` and
    /// `at_ms`. Short-circuits on the first qualifying zone; overlap is
    /// pure OR.
    pub async fn is_protected(
        &self,
        game: GameId,
        player: PlayerId,
        coord: Coordinate,
        at_ms: u64,
    ) -> Result<bool, EngineError> {
        let zones = self.zones_for_game(game, at_ms).await?;
        for zone in &zones {
            if zone.protects(player, coord, at_ms, self.zero_radius_epsilon_deg) {
                debug!(
                    "Player {} protected by {:?} zone '{}' ({})",
                    player, zone.kind, zone.name, zone.zone_id
                );
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Moves a relocatable zone, enforcing kind and cooldown policy, and
    /// writes through to the store before updating the local view.
    pub async fn relocate(
        &self,
        zone_id: ZoneId,
        new_center: Coordinate,
        at_ms: u64,
    ) -> Result<SafeZone, EngineError> {
        let game = *self
            .zone_index
            .get(&zone_id)
            .ok_or(EngineError::ZoneNotFound { zone: zone_id })?;

        // Validate against the freshest view we can get.
        let zones = self.zones_for_game(game, at_ms).await?;
        let zone = zones
            .iter()
            .find(|z| z.zone_id == zone_id)
            .ok_or(EngineError::ZoneNotFound { zone: zone_id })?;

        if zone.kind != ZoneKind::Relocatable {
            warn!("Rejected relocation of non-relocatable zone {}", zone_id);
            return Err(EngineError::NotRelocatable { zone: zone_id });
        }
        if let Some(last) = zone.last_relocation_ms {
            let ready_at = last.saturating_add(zone.relocation_cooldown_ms);
            if at_ms < ready_at {
                return Err(EngineError::RelocationCooldown {
                    remaining_ms: ready_at - at_ms,
                });
            }
        }

        fetch_with_timeout(
            "zone relocation",
            self.fetch_timeout_ms,
            self.store.relocate_zone(zone_id, new_center, at_ms),
        )
        .await?;

        let mut relocated = zone.clone();
        relocated.center = new_center;
        relocated.relocation_count += 1;
        relocated.last_relocation_ms = Some(at_ms);
        self.apply_local(relocated.clone());

        info!(
            "Relocated zone {} to {} (relocation #{})",
            zone_id, new_center, relocated.relocation_count
        );
        Ok(relocated)
    }

    /// Inserts or replaces a zone in the local view. Used by the handler
    /// layer to make a zone it just persisted visible before the next
    /// refresh.
    pub fn insert_zone(&self, zone: SafeZone) {
        self.zone_index.insert(zone.zone_id, zone.game_id);
        self.apply_local(zone);
    }

    /// Toggles a zone's active flag in the local view. Returns whether the
    /// zone was known.
    pub fn set_zone_active(&self, zone_id: ZoneId, active: bool) -> bool {
        let Some(game) = self.zone_index.get(&zone_id).map(|g| *g) else {
            return false;
        };
        let Some(mut cached) = self.games.get_mut(&game) else {
            return false;
        };
        match cached.zones.iter_mut().find(|z| z.zone_id == zone_id) {
            Some(zone) => {
                zone.is_active = active;
                true
            }
            None => false,
        }
    }

    /// Drops the cached view for a game; the next evaluation refetches.
    pub fn invalidate_game(&self, game: GameId) {
        self.games.remove(&game);
    }

    fn apply_local(&self, zone: SafeZone) {
        let mut cached = self.games.entry(zone.game_id).or_insert_with(|| GameZones {
            zones: Vec::new(),
            fetched_at_ms: 0,
        });
        match cached.zones.iter_mut().find(|z| z.zone_id == zone.zone_id) {
            Some(existing) => *existing = zone,
            None => cached.zones.push(zone),
        }
    }
}
