//! Game Events
//!
//! Things that happened during a tick, in the order they happened.
//! The server turns them into protocol lines; tests assert on them.

use serde::{Serialize, Deserialize};
use crate::core::geometry::TileCoord;
use crate::game::state::PlayerId;

/// Game event data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEventData {
    /// A bomb was armed.
    BombPlaced {
        /// Player who placed it.
        owner: PlayerId,
        /// Bomb ID.
        bomb_id: u64,
        /// Bomb tile.
        tile: TileCoord,
    },

    /// A bomb went off.
    BombDetonated {
        /// Player who placed it.
        owner: PlayerId,
        /// Bomb ID.
        bomb_id: u64,
        /// Explosion area, center first.
        tiles: Vec<TileCoord>,
    },

    /// A breakable block was destroyed.
    BlockDestroyed {
        /// Block tile.
        tile: TileCoord,
    },

    /// A player lost a life.
    PlayerDamaged {
        /// Player hit.
        player_id: PlayerId,
        /// Lives left after the hit.
        lives_remaining: u32,
    },

    /// A player ran out of lives.
    PlayerEliminated {
        /// Player out.
        player_id: PlayerId,
    },

    /// Every player is eliminated.
    GameOver,

    /// The board and players were reset after a game over.
    MatchRestarted,
}

/// A game event with the tick it occurred on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Tick when event occurred
    pub tick: u64,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(tick: u64, data: GameEventData) -> Self {
        Self { tick, data }
    }

    /// Create bomb placed event.
    pub fn bomb_placed(tick: u64, owner: PlayerId, bomb_id: u64, tile: TileCoord) -> Self {
        Self::new(tick, GameEventData::BombPlaced { owner, bomb_id, tile })
    }

    /// Create bomb detonated event.
    pub fn bomb_detonated(tick: u64, owner: PlayerId, bomb_id: u64, tiles: Vec<TileCoord>) -> Self {
        Self::new(tick, GameEventData::BombDetonated { owner, bomb_id, tiles })
    }

    /// Create block destroyed event.
    pub fn block_destroyed(tick: u64, tile: TileCoord) -> Self {
        Self::new(tick, GameEventData::BlockDestroyed { tile })
    }

    /// Create player damaged event.
    pub fn player_damaged(tick: u64, player_id: PlayerId, lives_remaining: u32) -> Self {
        Self::new(tick, GameEventData::PlayerDamaged { player_id, lives_remaining })
    }

    /// Create player eliminated event.
    pub fn player_eliminated(tick: u64, player_id: PlayerId) -> Self {
        Self::new(tick, GameEventData::PlayerEliminated { player_id })
    }

    /// Create game over event.
    pub fn game_over(tick: u64) -> Self {
        Self::new(tick, GameEventData::GameOver)
    }

    /// Create match restarted event.
    pub fn match_restarted(tick: u64) -> Self {
        Self::new(tick, GameEventData::MatchRestarted)
    }

    /// Player this event is about, if any.
    pub fn player_id(&self) -> Option<PlayerId> {
        match &self.data {
            GameEventData::BombPlaced { owner, .. } => Some(*owner),
            GameEventData::BombDetonated { owner, .. } => Some(*owner),
            GameEventData::PlayerDamaged { player_id, .. } => Some(*player_id),
            GameEventData::PlayerEliminated { player_id } => Some(*player_id),
            _ => None,
        }
    }
}
