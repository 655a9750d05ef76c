//! Simulation Configuration
//!
//! Timing and size constants for a match. All durations are in ticks.

use std::path::PathBuf;
use serde::{Serialize, Deserialize};

/// Default simulation tick rate (Hz).
pub const DEFAULT_TICK_RATE: u32 = 60;
/// Default tile edge length in world units.
pub const DEFAULT_TILE_SIZE: i32 = 32;
/// Default player box edge length in world units.
pub const DEFAULT_PLAYER_SIZE: i32 = 20;
/// Default movement per command in world units.
pub const DEFAULT_VELOCITY: i32 = 5;
/// Default bomb fuse (1 second at 60 Hz).
pub const DEFAULT_BOMB_TIMER: u32 = 60;
/// Default explosion reach in tiles along each axis.
pub const DEFAULT_EXPLOSION_RADIUS: u32 = 2;
/// Default delay between two bombs from the same player.
pub const DEFAULT_BOMB_COOLDOWN: u32 = 60;
/// Default life pool.
pub const DEFAULT_PLAYER_LIVES: u32 = 3;
/// Default post-hit invincibility window.
pub const DEFAULT_FLASH_DURATION: u32 = 30;

/// Largest accepted explosion reach in tiles.
pub const MAX_EXPLOSION_RADIUS: u32 = 64;
/// Largest accepted tile edge length in world units.
pub const MAX_TILE_SIZE: i32 = 1024;

/// Configuration for match simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Ticks per second driven by the server loop.
    pub tick_rate: u32,
    /// Tile edge length in world units.
    pub tile_size: i32,
    /// Player bounding box edge length.
    pub player_size: i32,
    /// Distance moved by one movement command.
    pub velocity: i32,
    /// Ticks between bomb placement and detonation.
    pub bomb_timer: u32,
    /// Explosion reach in tiles.
    pub explosion_radius: u32,
    /// Ticks a player must wait between bombs.
    pub bomb_cooldown: u32,
    /// Lives each player starts with.
    pub player_lives: u32,
    /// Ticks of invincibility after taking a hit.
    pub flash_duration: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            tile_size: DEFAULT_TILE_SIZE,
            player_size: DEFAULT_PLAYER_SIZE,
            velocity: DEFAULT_VELOCITY,
            bomb_timer: DEFAULT_BOMB_TIMER,
            explosion_radius: DEFAULT_EXPLOSION_RADIUS,
            bomb_cooldown: DEFAULT_BOMB_COOLDOWN,
            player_lives: DEFAULT_PLAYER_LIVES,
            flash_duration: DEFAULT_FLASH_DURATION,
        }
    }
}

impl GameConfig {
    /// Reject values the simulation cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 {
            return Err(ConfigError::Invalid("tick_rate must be positive".into()));
        }
        if self.tile_size <= 0 || self.tile_size > MAX_TILE_SIZE {
            return Err(ConfigError::Invalid(format!(
                "tile_size must be in 1..={}",
                MAX_TILE_SIZE
            )));
        }
        if self.player_size <= 0 || self.player_size > self.tile_size {
            return Err(ConfigError::Invalid(format!(
                "player_size must be in 1..={}",
                self.tile_size
            )));
        }
        if self.velocity <= 0 {
            return Err(ConfigError::Invalid("velocity must be positive".into()));
        }
        if self.bomb_timer == 0 {
            return Err(ConfigError::Invalid("bomb_timer must be at least one tick".into()));
        }
        if self.explosion_radius > MAX_EXPLOSION_RADIUS {
            return Err(ConfigError::Invalid(format!(
                "explosion_radius must be at most {}",
                MAX_EXPLOSION_RADIUS
            )));
        }
        if self.player_lives == 0 {
            return Err(ConfigError::Invalid("player_lives must be positive".into()));
        }
        Ok(())
    }
}

/// Configuration errors. All are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Config file is not valid JSON for the expected shape.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range.
    #[error("Invalid config: {0}")]
    Invalid(String),
}
