//! # Location History & Smoothing Engine
//!
//! Tracks a bounded window of recent location samples per player and
//! derives an effective location from it: either the latest raw sample or
//! a smoothed aggregate that damps GPS jitter without multi-second lag.
//!
//! Each player's history lives behind its own map entry, so updates and
//! reads for different players never contend. Updates must arrive in
//! timestamp order per player; out-of-order reports are rejected without
//! mutating state, never silently applied.

use crate::config::SmoothingStrategy;
use crate::error::EngineError;
use crate::types::{LocationSample, PlayerId};
use dashmap::DashMap;
use manhunt_geo::Coordinate;
use smallvec::SmallVec;
use tracing::{debug, trace};

/// Retained samples for one player, newest last.
#[derive(Debug, Default, Clone)]
struct SampleWindow {
    samples: SmallVec<[LocationSample; 3]>,
}

/// Bounded per-player location history with jitter smoothing.
#[derive(Debug)]
pub struct LocationHistory {
    players: DashMap<PlayerId, SampleWindow>,
    capacity: usize,
    max_sample_age_ms: u64,
    idle_sweep_ms: u64,
}

impl LocationHistory {
    /// Creates a history with the given retention policy.
    pub fn new(capacity: usize, max_sample_age_secs: u64, idle_sweep_secs: u64) -> Self {
        Self {
            players: DashMap::new(),
            // A single sample is still a valid history; smoothing needs 2+.
            capacity: capacity.max(1),
            max_sample_age_ms: max_sample_age_secs * 1000,
            idle_sweep_ms: idle_sweep_secs * 1000,
        }
    }

    /// Appends a sample to the player's window.
    ///
    /// Evicts samples beyond capacity or older than the retention horizon
    /// (relative to the newest sample). Fails with
    /// [`EngineError::StaleLocation`] and leaves the window untouched if
    /// the sample is older than the newest stored one.
    pub fn record(&self, player: PlayerId, sample: LocationSample) -> Result<(), EngineError> {
        let mut window = self.players.entry(player).or_default();

        if let Some(newest) = window.samples.last() {
            if sample.timestamp_ms < newest.timestamp_ms {
                debug!(
                    "Rejected out-of-order location for {}: {} < {}",
                    player, sample.timestamp_ms, newest.timestamp_ms
                );
                return Err(EngineError::StaleLocation { player });
            }
        }

        window.samples.push(sample);

        let horizon = sample.timestamp_ms.saturating_sub(self.max_sample_age_ms);
        window.samples.retain(|s| s.timestamp_ms >= horizon);
        while window.samples.len() > self.capacity {
            window.samples.remove(0);
        }

        trace!(
            "Recorded location for {} at {} ({} retained)",
            player,
            sample.coord,
            window.samples.len()
        );
        Ok(())
    }

    /// The newest sample on record, if any.
    pub fn latest(&self, player: PlayerId) -> Option<LocationSample> {
        self.players
            .get(&player)
            .and_then(|w| w.samples.last().copied())
    }

    /// The coordinate used for protection and elimination checks.
    ///
    /// Returns the latest raw sample when `use_smoothed` is false or fewer
    /// than two samples exist; otherwise the weighted aggregate of the
    /// retained window under `strategy`.
    pub fn effective_location(
        &self,
        player: PlayerId,
        use_smoothed: bool,
        strategy: SmoothingStrategy,
    ) -> Option<Coordinate> {
        let window = self.players.get(&player)?;
        let samples = &window.samples;
        let newest = samples.last()?;

        if !use_smoothed || samples.len() < 2 {
            return Some(newest.coord);
        }

        Some(smooth(samples, strategy))
    }

    /// Number of samples retained for a player. Diagnostic only.
    pub fn sample_count(&self, player: PlayerId) -> usize {
        self.players.get(&player).map_or(0, |w| w.samples.len())
    }

    /// Drops one player's history.
    pub fn clear(&self, player: PlayerId) {
        self.players.remove(&player);
    }

    /// Drops all history.
    pub fn clear_all(&self) {
        self.players.clear();
    }

    /// Removes players whose newest sample predates the idle horizon.
    /// Keeps long-running processes from accumulating departed players.
    pub fn sweep_idle(&self, now_ms: u64) -> usize {
        let horizon = now_ms.saturating_sub(self.idle_sweep_ms);
        let before = self.players.len();
        self.players.retain(|_, window| {
            window
                .samples
                .last()
                .is_some_and(|s| s.timestamp_ms >= horizon)
        });
        before - self.players.len()
    }
}

/// Weighted aggregate of a sample window (oldest first, 2+ samples).
fn smooth(samples: &[LocationSample], strategy: SmoothingStrategy) -> Coordinate {
    let n = samples.len();
    let weight_of = |index: usize| -> f64 {
        match strategy {
            // Oldest has weight 1, newest weight N.
            SmoothingStrategy::LinearWeighted => (index + 1) as f64,
            SmoothingStrategy::ExponentialDecay { factor } => {
                let rank = (n - 1 - index) as f64;
                (-factor * rank).exp()
            }
            SmoothingStrategy::SimpleAverage => 1.0,
        }
    };

    let mut total = 0.0;
    let mut lat = 0.0;
    let mut lon = 0.0;
    for (index, sample) in samples.iter().enumerate() {
        let w = weight_of(index);
        total += w;
        lat += sample.coord.lat * w;
        lon += sample.coord.lon * w;
    }

    // Weights are positive and the window non-empty, so total > 0 and the
    // convex combination stays inside the valid coordinate range.
    Coordinate {
        lat: lat / total,
        lon: lon / total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    fn sample(lat: f64, lon: f64, ts: u64) -> LocationSample {
        LocationSample::new(coord(lat, lon), 10.0, ts)
    }

    fn history() -> LocationHistory {
        LocationHistory::new(3, 300, 3600)
    }

    #[test]
    fn raw_location_is_latest_sample() {
        let h = history();
        let p = PlayerId::new();
        h.record(p, sample(40.0, -74.0, 1_000)).unwrap();
        h.record(p, sample(40.0001, -74.0, 2_000)).unwrap();

        let raw = h
            .effective_location(p, false, SmoothingStrategy::LinearWeighted)
            .unwrap();
        assert_eq!(raw, coord(40.0001, -74.0));
    }

    #[test]
    fn single_sample_falls_back_to_raw_even_when_smoothed() {
        let h = history();
        let p = PlayerId::new();
        h.record(p, sample(40.0, -74.0, 1_000)).unwrap();

        let eff = h
            .effective_location(p, true, SmoothingStrategy::LinearWeighted)
            .unwrap();
        assert_eq!(eff, coord(40.0, -74.0));
    }

    #[test]
    fn linear_weighted_smoothing_lies_strictly_inside_the_window() {
        let h = history();
        let p = PlayerId::new();
        h.record(p, sample(40.0000, -74.0000, 1_000)).unwrap();
        h.record(p, sample(40.0002, -74.0002, 2_000)).unwrap();
        h.record(p, sample(40.0004, -74.0004, 3_000)).unwrap();

        let eff = h
            .effective_location(p, true, SmoothingStrategy::LinearWeighted)
            .unwrap();

        // Weights 1,2,3 over lats 40.0000/40.0002/40.0004:
        // (40.0000*1 + 40.0002*2 + 40.0004*3) / 6
        let expected_lat = (40.0000 + 40.0002 * 2.0 + 40.0004 * 3.0) / 6.0;
        assert!((eff.lat - expected_lat).abs() < 1e-12);
        // Strictly interior: not the latest raw sample, not the oldest.
        assert!(eff.lat > 40.0000 && eff.lat < 40.0004);
        assert_ne!(eff, coord(40.0004, -74.0004));
    }

    #[test]
    fn out_of_order_update_rejected_without_mutation() {
        let h = history();
        let p = PlayerId::new();
        h.record(p, sample(40.0, -74.0, 5_000)).unwrap();

        let err = h.record(p, sample(41.0, -75.0, 4_000)).unwrap_err();
        assert!(matches!(err, EngineError::StaleLocation { .. }));

        assert_eq!(h.sample_count(p), 1);
        assert_eq!(h.latest(p).unwrap().timestamp_ms, 5_000);
    }

    #[test]
    fn equal_timestamp_is_not_out_of_order() {
        let h = history();
        let p = PlayerId::new();
        h.record(p, sample(40.0, -74.0, 5_000)).unwrap();
        h.record(p, sample(40.1, -74.1, 5_000)).unwrap();
        assert_eq!(h.sample_count(p), 2);
    }

    #[test]
    fn capacity_evicts_oldest() {
        let h = history();
        let p = PlayerId::new();
        for i in 0..5u64 {
            h.record(p, sample(40.0 + i as f64 * 0.001, -74.0, 1_000 + i))
                .unwrap();
        }
        assert_eq!(h.sample_count(p), 3);
        assert_eq!(h.latest(p).unwrap().timestamp_ms, 1_004);
    }

    #[test]
    fn age_evicts_expired_samples() {
        let h = history();
        let p = PlayerId::new();
        h.record(p, sample(40.0, -74.0, 1_000)).unwrap();
        // 300s later plus a millisecond: the first sample ages out.
        h.record(p, sample(40.1, -74.1, 301_001)).unwrap();
        assert_eq!(h.sample_count(p), 1);
    }

    #[test]
    fn exponential_and_simple_strategies_stay_in_hull() {
        let h = history();
        let p = PlayerId::new();
        h.record(p, sample(40.0, -74.0, 1_000)).unwrap();
        h.record(p, sample(40.001, -74.001, 2_000)).unwrap();
        h.record(p, sample(40.002, -74.002, 3_000)).unwrap();

        for strategy in [
            SmoothingStrategy::ExponentialDecay { factor: 0.5 },
            SmoothingStrategy::SimpleAverage,
        ] {
            let eff = h.effective_location(p, true, strategy).unwrap();
            assert!(eff.lat >= 40.0 && eff.lat <= 40.002, "{strategy:?}");
            assert!(eff.lon >= -74.002 && eff.lon <= -74.0, "{strategy:?}");
        }

        // Simple average is the exact mean.
        let eff = h
            .effective_location(p, true, SmoothingStrategy::SimpleAverage)
            .unwrap();
        assert!((eff.lat - 40.001).abs() < 1e-12);
    }

    #[test]
    fn sweep_drops_idle_players_only() {
        let h = history();
        let idle = PlayerId::new();
        let active = PlayerId::new();
        h.record(idle, sample(40.0, -74.0, 1_000)).unwrap();
        h.record(active, sample(41.0, -75.0, 4_000_000)).unwrap();

        let removed = h.sweep_idle(4_000_000);
        assert_eq!(removed, 1);
        assert!(h.latest(idle).is_none());
        assert!(h.latest(active).is_some());
    }
}
