//! World State
//!
//! Players, bombs and breakable blocks of one match, plus the command
//! operations that mutate them. Uses BTreeMap/BTreeSet for deterministic
//! iteration order.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use serde::{Serialize, Deserialize};
use uuid::Uuid;

use crate::core::geometry::{Direction, Position, Rect, TileCoord};
use crate::core::hash::{compute_state_hash, StateHash};
use crate::game::collision::rect_hits_blocks;
use crate::game::config::GameConfig;
use crate::game::events::GameEvent;
use crate::game::level::LevelGeometry;

// =============================================================================
// PLAYER ID
// =============================================================================

/// Unique player identifier, allocated per connection.
///
/// Implements Ord for deterministic BTreeMap ordering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub u64);

impl PlayerId {
    /// Create from a raw counter value.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw counter value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// PLAYER STATE
// =============================================================================

/// State of a single player in the match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    /// Unique player ID
    pub id: PlayerId,

    /// Top-left corner of the bounding box
    pub position: Position,

    /// Spawn tile assigned at join (used on restart)
    pub spawn: TileCoord,

    /// Remaining lives
    pub lives: u32,

    /// Ticks until another bomb may be placed (0 = ready)
    pub bomb_cooldown: u32,

    /// Ignores explosion damage while set
    pub invincible: bool,

    /// Ticks left in the post-hit flash
    pub flash_ticks: u32,

    /// Out of lives; no longer accepts commands
    pub eliminated: bool,
}

impl PlayerState {
    /// Create a new player at a spawn position.
    pub fn new(id: PlayerId, spawn: TileCoord, position: Position, lives: u32) -> Self {
        Self {
            id,
            position,
            spawn,
            lives,
            bomb_cooldown: 0,
            invincible: false,
            flash_ticks: 0,
            eliminated: false,
        }
    }

    /// Bounding box for a given player size.
    #[inline]
    pub fn bounds(&self, size: i32) -> Rect {
        Rect::square(self.position, size)
    }

    /// Check if a bomb can be placed now.
    #[inline]
    pub fn bomb_ready(&self) -> bool {
        self.bomb_cooldown == 0
    }

    /// Take one hit. Returns false if the hit was absorbed.
    pub fn take_hit(&mut self, flash_duration: u32) -> bool {
        if self.eliminated || self.invincible {
            return false;
        }
        self.lives = self.lives.saturating_sub(1);
        self.invincible = true;
        self.flash_ticks = flash_duration;
        true
    }
}

// =============================================================================
// BOMB STATE
// =============================================================================

/// An armed or just-exploded bomb.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BombState {
    /// Unique bomb ID (monotonic counter)
    pub id: u64,

    /// Player who placed it (reporting only)
    pub owner: PlayerId,

    /// Tile the bomb sits on
    pub tile: TileCoord,

    /// Ticks until detonation
    pub timer: u32,

    /// Has this bomb detonated?
    pub exploded: bool,

    /// Tick of detonation (if exploded)
    pub exploded_tick: Option<u64>,

    /// Tiles hit by the detonation; empty while armed
    pub explosion: Vec<TileCoord>,
}

impl BombState {
    /// Create an armed bomb.
    pub fn new(id: u64, owner: PlayerId, tile: TileCoord, timer: u32) -> Self {
        Self {
            id,
            owner,
            tile,
            timer,
            exploded: false,
            exploded_tick: None,
            explosion: Vec::new(),
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// World construction errors. Fatal for the match.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    /// The level declares no spawn points.
    #[error("Level has no spawn points")]
    NoSpawnPoints,

    /// A player with this ID is already in the world.
    #[error("Player {0} already exists")]
    PlayerExists(PlayerId),

    /// A spawn point sits on a solid or breakable tile.
    #[error("Spawn point {0} is on a block")]
    SpawnBlocked(TileCoord),

    /// Board size in world units does not fit in an `i32`.
    #[error("Board {width}x{height} is too large for tile size {tile_size}")]
    BoardTooLarge {
        /// Width in tiles.
        width: i32,
        /// Height in tiles.
        height: i32,
        /// Tile edge in world units.
        tile_size: i32,
    },
}

/// Why a command had no effect. Never surfaced to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CommandRejected {
    /// No such player.
    #[error("Unknown player")]
    UnknownPlayer,

    /// Player is out of lives.
    #[error("Player eliminated")]
    PlayerEliminated,

    /// Bomb placement cooldown still running.
    #[error("Bomb cooldown active")]
    CooldownActive,

    /// Target box overlaps a block.
    #[error("Movement blocked")]
    Blocked,

    /// Restart requested while players are still alive.
    #[error("Match in progress")]
    MatchInProgress,
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Player view for presenters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// Player ID.
    pub id: PlayerId,
    /// Top-left corner.
    pub position: Position,
    /// Remaining lives.
    pub lives: u32,
    /// Inside the post-hit flash.
    pub invincible: bool,
    /// Out of the match.
    pub eliminated: bool,
}

/// Bomb view for presenters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BombSnapshot {
    /// Tile of the bomb.
    pub tile: TileCoord,
    /// Ticks until detonation.
    pub timer: u32,
    /// Exploded this tick.
    pub exploded: bool,
    /// Explosion tiles (exploded bombs only).
    pub explosion: Vec<TileCoord>,
}

/// Read-only copy of the world for rendering and logging.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Current tick.
    pub tick: u64,
    /// Every player eliminated.
    pub game_over: bool,
    /// Players in ID order.
    pub players: Vec<PlayerSnapshot>,
    /// Active bombs in placement order.
    pub bombs: Vec<BombSnapshot>,
    /// Breakable blocks still standing.
    pub breakable_remaining: usize,
}

// =============================================================================
// WORLD
// =============================================================================

/// Complete state of a match.
#[derive(Clone, Debug)]
pub struct World {
    /// Match identifier
    pub match_id: Uuid,

    /// Simulation constants
    pub config: GameConfig,

    /// Ticks simulated so far
    pub tick: u64,

    /// Static level data, kept for restarts
    level: LevelGeometry,

    /// Breakable blocks still standing
    pub breakable: BTreeSet<TileCoord>,

    /// All players (BTreeMap for deterministic iteration)
    pub players: BTreeMap<PlayerId, PlayerState>,

    /// Active bombs keyed by placement order
    pub bombs: BTreeMap<u64, BombState>,

    /// Next bomb ID (monotonic counter)
    next_bomb_id: u64,

    /// Game over already announced
    game_over_reported: bool,

    /// Events generated since the last tick collected them
    pending_events: Vec<GameEvent>,
}

impl World {
    /// Create a world for a level.
    ///
    /// Fails with `NoSpawnPoints` if the level has nowhere to put players.
    pub fn new(config: GameConfig, level: LevelGeometry) -> Result<Self, WorldError> {
        if level.spawn_points.is_empty() {
            return Err(WorldError::NoSpawnPoints);
        }
        if let Some(spawn) = level.blocked_spawn() {
            return Err(WorldError::SpawnBlocked(spawn));
        }
        let fits = |edge: i32| edge.checked_mul(config.tile_size).is_some();
        if !fits(level.width) || !fits(level.height) {
            return Err(WorldError::BoardTooLarge {
                width: level.width,
                height: level.height,
                tile_size: config.tile_size,
            });
        }

        Ok(Self {
            match_id: Uuid::new_v4(),
            config,
            tick: 0,
            breakable: level.breakable.clone(),
            level,
            players: BTreeMap::new(),
            bombs: BTreeMap::new(),
            next_bomb_id: 0,
            game_over_reported: false,
            pending_events: Vec::new(),
        })
    }

    /// Static level data.
    pub fn level(&self) -> &LevelGeometry {
        &self.level
    }

    /// Solid blocks (never change).
    pub fn solid(&self) -> &BTreeSet<TileCoord> {
        &self.level.solid
    }

    /// Board size in world units. Fits in `i32`, checked by [`World::new`].
    pub fn world_size(&self) -> (i32, i32) {
        (
            self.level.width * self.config.tile_size,
            self.level.height * self.config.tile_size,
        )
    }

    /// Spawn tile for a player ID: `spawn_points[id mod len]`.
    pub fn spawn_point_for(&self, id: PlayerId) -> TileCoord {
        let spawns = &self.level.spawn_points;
        spawns[(id.get() % spawns.len() as u64) as usize]
    }

    /// Clamp a box position into the board.
    fn clamp_position(&self, pos: Position) -> Position {
        let (width, height) = self.world_size();
        let size = self.config.player_size;
        Position::new(
            pos.x.clamp(0, (width - size).max(0)),
            pos.y.clamp(0, (height - size).max(0)),
        )
    }

    /// Add a player at its assigned spawn with full lives.
    pub fn add_player(&mut self, id: PlayerId) -> Result<&PlayerState, WorldError> {
        if self.players.contains_key(&id) {
            return Err(WorldError::PlayerExists(id));
        }

        let spawn = self.spawn_point_for(id);
        let position = self.clamp_position(spawn.to_world(self.config.tile_size));
        let player = PlayerState::new(id, spawn, position, self.config.player_lives);

        Ok(self.players.entry(id).or_insert(player))
    }

    /// Remove a player. Their bombs stay armed.
    pub fn remove_player(&mut self, id: &PlayerId) -> Option<PlayerState> {
        self.players.remove(id)
    }

    /// Get a player by ID.
    pub fn get_player(&self, id: &PlayerId) -> Option<&PlayerState> {
        self.players.get(id)
    }

    /// Look up a player that may still act.
    fn active_player(&self, id: &PlayerId) -> Result<&PlayerState, CommandRejected> {
        let player = self.players.get(id).ok_or(CommandRejected::UnknownPlayer)?;
        if player.eliminated {
            return Err(CommandRejected::PlayerEliminated);
        }
        Ok(player)
    }

    /// Move a player one step.
    ///
    /// The candidate box is clamped into the board, then rejected if it
    /// overlaps any solid or breakable block. On rejection nothing changes.
    pub fn apply_movement(
        &mut self,
        id: PlayerId,
        direction: Direction,
    ) -> Result<Position, CommandRejected> {
        let player = self.active_player(&id)?;

        let (dx, dy) = direction.delta();
        let velocity = self.config.velocity;
        let candidate = self.clamp_position(Position::new(
            player.position.x + dx * velocity,
            player.position.y + dy * velocity,
        ));

        let rect = Rect::square(candidate, self.config.player_size);
        if rect_hits_blocks(&rect, self.config.tile_size, &self.level.solid, &self.breakable) {
            return Err(CommandRejected::Blocked);
        }

        if let Some(player) = self.players.get_mut(&id) {
            player.position = candidate;
        }
        Ok(candidate)
    }

    /// Arm a bomb on the tile holding the player's top-left corner.
    ///
    /// Stacking on a tile that already holds a bomb is allowed.
    pub fn place_bomb(&mut self, id: PlayerId) -> Result<TileCoord, CommandRejected> {
        let player = self.active_player(&id)?;
        if !player.bomb_ready() {
            return Err(CommandRejected::CooldownActive);
        }

        let tile = player.position.tile(self.config.tile_size);
        let bomb_id = self.next_bomb_id;
        self.next_bomb_id += 1;

        self.bombs.insert(bomb_id, BombState::new(bomb_id, id, tile, self.config.bomb_timer));
        if let Some(player) = self.players.get_mut(&id) {
            player.bomb_cooldown = self.config.bomb_cooldown;
        }

        self.push_event(GameEvent::bomb_placed(self.tick, id, bomb_id, tile));
        Ok(tile)
    }

    /// Check if the match is over: at least one player and all eliminated.
    pub fn is_game_over(&self) -> bool {
        !self.players.is_empty() && self.players.values().all(|p| p.eliminated)
    }

    /// Reset the board after a game over.
    ///
    /// Restores breakable blocks, clears bombs and respawns every player with
    /// full lives. The tick counter keeps running.
    pub fn restart(&mut self) -> Result<(), CommandRejected> {
        if !self.is_game_over() {
            return Err(CommandRejected::MatchInProgress);
        }

        self.breakable = self.level.breakable.clone();
        self.bombs.clear();
        self.game_over_reported = false;

        let tile_size = self.config.tile_size;
        let lives = self.config.player_lives;
        let ids: Vec<PlayerId> = self.players.keys().copied().collect();
        for id in ids {
            let spawn = self.spawn_point_for(id);
            let position = self.clamp_position(spawn.to_world(tile_size));
            self.players.insert(id, PlayerState::new(id, spawn, position, lives));
        }

        self.push_event(GameEvent::match_restarted(self.tick));
        Ok(())
    }

    /// Mark the game over as announced. Returns true the first time.
    pub(crate) fn report_game_over(&mut self) -> bool {
        if self.game_over_reported {
            return false;
        }
        self.game_over_reported = true;
        true
    }

    /// Read-only view for presenters.
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            tick: self.tick,
            game_over: self.is_game_over(),
            players: self.players.values()
                .map(|p| PlayerSnapshot {
                    id: p.id,
                    position: p.position,
                    lives: p.lives,
                    invincible: p.invincible,
                    eliminated: p.eliminated,
                })
                .collect(),
            bombs: self.bombs.values()
                .map(|b| BombSnapshot {
                    tile: b.tile,
                    timer: b.timer,
                    exploded: b.exploded,
                    explosion: b.explosion.clone(),
                })
                .collect(),
            breakable_remaining: self.breakable.len(),
        }
    }

    /// Current position of every player, in ID order.
    pub fn positions(&self) -> Vec<(PlayerId, Position)> {
        self.players.values().map(|p| (p.id, p.position)).collect()
    }

    /// Compute hash of current state for verification.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(self.tick, |hasher| {
            for player in self.players.values() {
                hasher.update_u64(player.id.get());
                hasher.update_position(player.position);
                hasher.update_u32(player.lives);
                hasher.update_u32(player.bomb_cooldown);
                hasher.update_bool(player.invincible);
                hasher.update_u32(player.flash_ticks);
                hasher.update_bool(player.eliminated);
            }

            for bomb in self.bombs.values() {
                hasher.update_u64(bomb.id);
                hasher.update_tile(bomb.tile);
                hasher.update_u32(bomb.timer);
                hasher.update_bool(bomb.exploded);
            }

            for tile in &self.breakable {
                hasher.update_tile(*tile);
            }
        })
    }

    /// Take pending events (consumes them).
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Push a game event.
    pub fn push_event(&mut self, event: GameEvent) {
        self.pending_events.push(event);
    }
}

// =============================================================================
// TESTS
// =============================================================================
