//! Room configuration

use shared::snapshot::MAX_FRAME_RECORDS;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RoomConfigError {
    #[error("players limit must be within 1..={max}, got {got}")]
    PlayersLimit { got: usize, max: usize },
    #[error("tick interval must be non-zero")]
    ZeroTickInterval,
    #[error("spawn placement must be finite")]
    NonFiniteSpawn,
}

/// Tunables for one racing room
#[derive(Debug, Clone, PartialEq)]
pub struct RoomConfig {
    /// Delay between `start()` and the first simulation tick.
    pub countdown: Duration,
    pub players_limit: usize,
    /// Players silent for longer than this are removed from the room.
    pub player_idle_time: Duration,
    pub tick_interval: Duration,
    /// Lateral distance between consecutive spawn points.
    pub spawn_spacing: f32,
    pub spawn_angle: f32,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            countdown: Duration::ZERO,
            players_limit: 4,
            player_idle_time: Duration::from_millis(12_000),
            tick_interval: Duration::from_millis(15),
            spawn_spacing: 4.0,
            spawn_angle: 0.0,
        }
    }
}

impl RoomConfig {
    /// Checks limits the frame format and the timer depend on.
    pub fn validate(&self) -> Result<(), RoomConfigError> {
        if self.players_limit == 0 || self.players_limit > MAX_FRAME_RECORDS {
            return Err(RoomConfigError::PlayersLimit {
                got: self.players_limit,
                max: MAX_FRAME_RECORDS,
            });
        }

        if self.tick_interval.is_zero() {
            return Err(RoomConfigError::ZeroTickInterval);
        }

        if !self.spawn_spacing.is_finite() || !self.spawn_angle.is_finite() {
            return Err(RoomConfigError::NonFiniteSpawn);
        }

        Ok(())
    }
}
