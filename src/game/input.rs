//! Player Commands
//!
//! Transport-independent player actions and their application to the world.
//! Commands take effect immediately; the next tick sees the result.

use serde::{Serialize, Deserialize};
use crate::core::geometry::{Direction, Position, TileCoord};
use crate::game::state::{CommandRejected, PlayerId, World};

/// A single player action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    /// Step one velocity unit in a direction.
    Move(Direction),
    /// Arm a bomb under the player.
    PlaceBomb,
    /// Reset the board after a game over.
    Restart,
}

/// What a successfully applied command changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Player now stands here.
    Moved(Position),
    /// Bomb armed on this tile.
    BombPlaced(TileCoord),
    /// Board and players reset.
    Restarted,
}

/// Apply a command for a player.
///
/// A rejected command leaves the world untouched.
pub fn apply_command(
    world: &mut World,
    player_id: PlayerId,
    command: Command,
) -> Result<CommandOutcome, CommandRejected> {
    match command {
        Command::Move(direction) => world
            .apply_movement(player_id, direction)
            .map(CommandOutcome::Moved),
        Command::PlaceBomb => world.place_bomb(player_id).map(CommandOutcome::BombPlaced),
        Command::Restart => {
            if !world.players.contains_key(&player_id) {
                return Err(CommandRejected::UnknownPlayer);
            }
            world.restart().map(|_| CommandOutcome::Restarted)
        }
    }
}
