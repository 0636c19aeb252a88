//! Error types for the proximity engine.
//!
//! The taxonomy lets callers distinguish "denied because far or protected"
//! (an `Ok(false)` decision) from "could not decide" (an error). Collaborator
//! failures are wrapped, never swallowed, and every ambiguous path fails
//! closed.

use crate::types::{PlayerId, ZoneId};

/// Failure reported by an external store implementation.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct StoreError(pub String);

impl StoreError {
    /// Wraps any displayable cause.
    pub fn new(cause: impl std::fmt::Display) -> Self {
        Self(cause.to_string())
    }
}

/// Enumeration of engine errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// Malformed latitude/longitude input. Not retryable.
    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(#[from] manhunt_geo::GeoError),

    /// Location data older than policy allows, or an out-of-order update.
    /// Retryable with fresh data.
    #[error("stale location data for player {player}")]
    StaleLocation { player: PlayerId },

    /// No location on record for the player; the client should send one.
    #[error("no location on record for player {player}")]
    LocationUnavailable { player: PlayerId },

    /// A relocatable zone was moved again before its cooldown elapsed.
    #[error("zone relocation on cooldown: {remaining_ms}ms remaining")]
    RelocationCooldown { remaining_ms: u64 },

    /// Relocation was requested for a zone kind that does not support it.
    #[error("zone {zone} is not relocatable")]
    NotRelocatable { zone: ZoneId },

    /// No zone with the given id is known to the registry or store.
    #[error("zone not found: {zone}")]
    ZoneNotFound { zone: ZoneId },

    /// An external collaborator exceeded the fetch budget. Retryable with
    /// backoff.
    #[error("timed out fetching {what}")]
    FetchTimeout { what: &'static str },

    /// A collaborator failed outright.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        let player = PlayerId::new();
        let err = EngineError::LocationUnavailable { player };
        assert!(err.to_string().contains(&player.to_string()));

        let err = EngineError::RelocationCooldown { remaining_ms: 1500 };
        assert!(err.to_string().contains("1500"));
    }

    #[test]
    fn store_error_converts() {
        let err: EngineError = StoreError::new("dynamo throttled").into();
        assert!(matches!(err, EngineError::Store(_)));
        assert!(err.to_string().contains("dynamo throttled"));
    }

    #[test]
    fn geo_error_converts() {
        let geo = manhunt_geo::Coordinate::new(91.0, 0.0).unwrap_err();
        let err: EngineError = geo.into();
        assert!(matches!(err, EngineError::InvalidCoordinate(_)));
    }
}
