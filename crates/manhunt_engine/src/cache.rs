//! Short-TTL cache for proximity computations.
//!
//! Elimination checks and zone membership queries repeat rapidly while two
//! players close in on each other. Entries are keyed by game, subject,
//! optional target, and the coordinates of every party to the computation
//! rounded to ~1 meter, so any involved player who really moves invalidates
//! the entry by key drift rather than explicit eviction — a cached pair
//! distance can never outlive either player's movement. Expired entries are
//! dropped on read and by periodic sweeps.

use crate::types::{GameId, PlayerId};
use dashmap::DashMap;
use manhunt_geo::Coordinate;
use std::sync::atomic::{AtomicU64, Ordering};

/// Coordinate rounding scale: 1e-5 degrees is roughly one meter.
const COORD_SCALE: f64 = 100_000.0;

fn quantize(coord: Coordinate) -> (i64, i64) {
    (
        (coord.lat * COORD_SCALE).round() as i64,
        (coord.lon * COORD_SCALE).round() as i64,
    )
}

/// Cache key: identities plus the quantized position of each party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    game: GameId,
    subject: PlayerId,
    target: Option<PlayerId>,
    subject_pos: (i64, i64),
    target_pos: (i64, i64),
}

impl CacheKey {
    /// Key for a pairwise distance. Both positions participate: movement by
    /// either the subject or the target yields a fresh key.
    pub fn distance(
        game: GameId,
        subject: PlayerId,
        target: PlayerId,
        subject_at: Coordinate,
        target_at: Coordinate,
    ) -> Self {
        Self {
            game,
            subject,
            target: Some(target),
            subject_pos: quantize(subject_at),
            target_pos: quantize(target_at),
        }
    }

    /// Key for a subject's zone membership at a position.
    pub fn membership(game: GameId, subject: PlayerId, at: Coordinate) -> Self {
        Self {
            game,
            subject,
            target: None,
            subject_pos: quantize(at),
            target_pos: (0, 0),
        }
    }
}

/// A cached computation result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CachedValue {
    /// Pairwise distance in meters.
    Distance(f64),
    /// Whether the subject was protected by any zone.
    Membership(bool),
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    value: CachedValue,
    expires_at_ms: u64,
}

/// Hit/miss counters for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Concurrent TTL cache for proximity decisions.
pub struct ProximityCache {
    entries: DashMap<CacheKey, Entry>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ProximityCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Looks up a live entry, dropping it if expired.
    pub fn get(&self, key: &CacheKey, now_ms: u64) -> Option<CachedValue> {
        if let Some(entry) = self.entries.get(key) {
            if now_ms < entry.expires_at_ms {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value);
            }
        }
        // Expired or absent; remove lazily so sweeps stay cheap.
        self.entries.remove_if(key, |_, e| now_ms >= e.expires_at_ms);
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Stores a value that expires `ttl_ms` from `now_ms`.
    pub fn put(&self, key: CacheKey, value: CachedValue, now_ms: u64, ttl_ms: u64) {
        self.entries.insert(
            key,
            Entry {
                value,
                expires_at_ms: now_ms.saturating_add(ttl_ms),
            },
        );
    }

    /// Removes every expired entry; returns how many were dropped.
    pub fn sweep(&self, now_ms: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| now_ms < e.expires_at_ms);
        before - self.entries.len()
    }

    /// Drops all entries.
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for ProximityCache {
    fn default() -> Self {
        Self::new()
    }
}
