//! Protocol Messages
//!
//! Line-oriented text protocol. Every message is one UTF-8 line; over TCP
//! lines end in `\n`, over WebSocket each text frame carries one line.

use std::fmt;
use std::str::FromStr;

use crate::core::geometry::{Direction, Position, TileCoord};
use crate::game::events::{GameEvent, GameEventData};
use crate::game::input::Command;
use crate::game::state::PlayerId;

/// Protocol decoding errors. Never fatal; the offending line is dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Client sent a token that is not a command.
    #[error("Invalid command: {0:?}")]
    InvalidCommand(String),

    /// Server line did not match any message shape.
    #[error("Malformed message: {0:?}")]
    MalformedMessage(String),
}

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Commands sent from client to server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientCommand {
    /// Move towards row 0.
    Up,
    /// Move away from row 0.
    Down,
    /// Move towards column 0.
    Left,
    /// Move away from column 0.
    Right,
    /// Place a bomb.
    Bomb,
    /// Restart after game over.
    Restart,
}

impl ClientCommand {
    /// Wire token.
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientCommand::Up => "UP",
            ClientCommand::Down => "DOWN",
            ClientCommand::Left => "LEFT",
            ClientCommand::Right => "RIGHT",
            ClientCommand::Bomb => "BOMB",
            ClientCommand::Restart => "RESTART",
        }
    }

    /// Convert to a simulation command.
    pub fn to_command(self) -> Command {
        match self {
            ClientCommand::Up => Command::Move(Direction::Up),
            ClientCommand::Down => Command::Move(Direction::Down),
            ClientCommand::Left => Command::Move(Direction::Left),
            ClientCommand::Right => Command::Move(Direction::Right),
            ClientCommand::Bomb => Command::PlaceBomb,
            ClientCommand::Restart => Command::Restart,
        }
    }

    /// Line sent by a client, with the trailing newline.
    pub fn to_line(&self) -> String {
        format!("{}\n", self.as_str())
    }
}

impl FromStr for ClientCommand {
    type Err = ProtocolError;

    /// Parse one line. Surrounding whitespace (including `\r`) is ignored.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        match line.trim() {
            "UP" => Ok(ClientCommand::Up),
            "DOWN" => Ok(ClientCommand::Down),
            "LEFT" => Ok(ClientCommand::Left),
            "RIGHT" => Ok(ClientCommand::Right),
            "BOMB" => Ok(ClientCommand::Bomb),
            "RESTART" => Ok(ClientCommand::Restart),
            other => Err(ProtocolError::InvalidCommand(other.to_string())),
        }
    }
}

impl fmt::Display for ClientCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Sent once after connecting. Spawn is in world units.
    JoinAck {
        /// Assigned player ID.
        player_id: PlayerId,
        /// Top-left of the spawn tile.
        spawn: Position,
    },

    /// Where a player stands.
    Position {
        /// Player.
        player_id: PlayerId,
        /// Top-left of the player box.
        position: Position,
    },

    /// A bomb was armed.
    BombPlaced {
        /// Player who placed it.
        player_id: PlayerId,
        /// Bomb tile.
        tile: TileCoord,
    },

    /// Tiles covered by a detonation.
    Explosion {
        /// Explosion tiles, center first.
        tiles: Vec<TileCoord>,
    },

    /// A breakable block is gone.
    BlockDestroyed {
        /// Block tile.
        tile: TileCoord,
    },

    /// A player's remaining lives after a hit.
    Lives {
        /// Player.
        player_id: PlayerId,
        /// Lives left.
        lives: u32,
    },

    /// A player is out.
    Eliminated {
        /// Player.
        player_id: PlayerId,
    },

    /// A player disconnected.
    PlayerLeft {
        /// Player.
        player_id: PlayerId,
    },

    /// Every player is eliminated.
    GameOver,

    /// Board and players were reset.
    MatchRestarted,
}

impl ServerMessage {
    /// Line as sent over TCP, with the trailing newline.
    pub fn to_line(&self) -> String {
        format!("{self}\n")
    }
}

impl From<&GameEvent> for ServerMessage {
    fn from(event: &GameEvent) -> Self {
        match &event.data {
            GameEventData::BombPlaced { owner, tile, .. } => ServerMessage::BombPlaced {
                player_id: *owner,
                tile: *tile,
            },
            GameEventData::BombDetonated { tiles, .. } => ServerMessage::Explosion {
                tiles: tiles.clone(),
            },
            GameEventData::BlockDestroyed { tile } => ServerMessage::BlockDestroyed { tile: *tile },
            GameEventData::PlayerDamaged { player_id, lives_remaining } => ServerMessage::Lives {
                player_id: *player_id,
                lives: *lives_remaining,
            },
            GameEventData::PlayerEliminated { player_id } => ServerMessage::Eliminated {
                player_id: *player_id,
            },
            GameEventData::GameOver => ServerMessage::GameOver,
            GameEventData::MatchRestarted => ServerMessage::MatchRestarted,
        }
    }
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::JoinAck { player_id, spawn } => {
                write!(f, "Player ID: {player_id}, Spawn Point: {spawn}")
            }
            ServerMessage::Position { player_id, position } => {
                write!(f, "Player ID: {player_id}, Position: {position}")
            }
            ServerMessage::BombPlaced { player_id, tile } => {
                write!(f, "Player ID: {player_id}, Bomb: {tile}")
            }
            ServerMessage::Explosion { tiles } => {
                f.write_str("Explosion:")?;
                for tile in tiles {
                    write!(f, " {tile}")?;
                }
                Ok(())
            }
            ServerMessage::BlockDestroyed { tile } => write!(f, "Block Destroyed: {tile}"),
            ServerMessage::Lives { player_id, lives } => {
                write!(f, "Player ID: {player_id}, Lives: {lives}")
            }
            ServerMessage::Eliminated { player_id } => write!(f, "Player ID: {player_id}, Eliminated"),
            ServerMessage::PlayerLeft { player_id } => write!(f, "Player ID: {player_id}, Left"),
            ServerMessage::GameOver => f.write_str("Game Over"),
            ServerMessage::MatchRestarted => f.write_str("Match Restarted"),
        }
    }
}

impl FromStr for ServerMessage {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let malformed = || ProtocolError::MalformedMessage(line.to_string());

        match line {
            "Game Over" => return Ok(ServerMessage::GameOver),
            "Match Restarted" => return Ok(ServerMessage::MatchRestarted),
            _ => {}
        }

        if let Some(rest) = line.strip_prefix("Explosion:") {
            let tiles = parse_pairs(rest)
                .ok_or_else(malformed)?
                .into_iter()
                .map(|(col, row)| TileCoord::new(col, row))
                .collect();
            return Ok(ServerMessage::Explosion { tiles });
        }

        if let Some(rest) = line.strip_prefix("Block Destroyed:") {
            let (col, row) = parse_pair(rest).ok_or_else(malformed)?;
            return Ok(ServerMessage::BlockDestroyed { tile: TileCoord::new(col, row) });
        }

        let rest = line.strip_prefix("Player ID:").ok_or_else(malformed)?;
        let (id, body) = rest.split_once(',').ok_or_else(malformed)?;
        let player_id = PlayerId::new(id.trim().parse().map_err(|_| malformed())?);
        let body = body.trim();

        if body == "Eliminated" {
            return Ok(ServerMessage::Eliminated { player_id });
        }
        if body == "Left" {
            return Ok(ServerMessage::PlayerLeft { player_id });
        }

        let (key, value) = body.split_once(':').ok_or_else(malformed)?;
        match key {
            "Spawn Point" => {
                let (x, y) = parse_pair(value).ok_or_else(malformed)?;
                Ok(ServerMessage::JoinAck { player_id, spawn: Position::new(x, y) })
            }
            "Position" => {
                let (x, y) = parse_pair(value).ok_or_else(malformed)?;
                Ok(ServerMessage::Position { player_id, position: Position::new(x, y) })
            }
            "Bomb" => {
                let (col, row) = parse_pair(value).ok_or_else(malformed)?;
                Ok(ServerMessage::BombPlaced { player_id, tile: TileCoord::new(col, row) })
            }
            "Lives" => {
                let lives = value.trim().parse().map_err(|_| malformed())?;
                Ok(ServerMessage::Lives { player_id, lives })
            }
            _ => Err(malformed()),
        }
    }
}

/// Parse `(a, b)`.
fn parse_pair(text: &str) -> Option<(i32, i32)> {
    let inner = text.trim().strip_prefix('(')?.strip_suffix(')')?;
    let (a, b) = inner.split_once(',')?;
    Some((a.trim().parse().ok()?, b.trim().parse().ok()?))
}

/// Parse `(a, b) (c, d) ...`.
fn parse_pairs(text: &str) -> Option<Vec<(i32, i32)>> {
    text.split(')')
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| parse_pair(&format!("{chunk})")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!("UP".parse::<ClientCommand>(), Ok(ClientCommand::Up));
        assert_eq!("DOWN\r".parse::<ClientCommand>(), Ok(ClientCommand::Down));
        assert_eq!(" LEFT ".parse::<ClientCommand>(), Ok(ClientCommand::Left));
        assert_eq!("RIGHT\n".parse::<ClientCommand>(), Ok(ClientCommand::Right));
        assert_eq!("BOMB".parse::<ClientCommand>(), Ok(ClientCommand::Bomb));
        assert_eq!("RESTART".parse::<ClientCommand>(), Ok(ClientCommand::Restart));
    }

    #[test]
    fn test_unknown_command_is_invalid() {
        for line in ["", "JUMP", "up", "BOMB BOMB"] {
            assert!(matches!(
                line.parse::<ClientCommand>(),
                Err(ProtocolError::InvalidCommand(_))
            ));
        }
    }

    #[test]
    fn test_command_mapping() {
        assert_eq!(ClientCommand::Left.to_command(), Command::Move(Direction::Left));
        assert_eq!(ClientCommand::Bomb.to_command(), Command::PlaceBomb);
        assert_eq!(ClientCommand::Restart.to_line(), "RESTART\n");
    }

    #[test]
    fn test_server_line_formats() {
        let id = PlayerId::new(3);
        assert_eq!(
            ServerMessage::JoinAck { player_id: id, spawn: Position::new(32, 32) }.to_line(),
            "Player ID: 3, Spawn Point: (32, 32)\n"
        );
        assert_eq!(
            ServerMessage::Position { player_id: id, position: Position::new(37, 32) }.to_string(),
            "Player ID: 3, Position: (37, 32)"
        );
        assert_eq!(
            ServerMessage::Explosion { tiles: vec![TileCoord::new(5, 5), TileCoord::new(5, 4)] }.to_string(),
            "Explosion: (5, 5) (5, 4)"
        );
        assert_eq!(ServerMessage::Eliminated { player_id: id }.to_string(), "Player ID: 3, Eliminated");
        assert_eq!(ServerMessage::GameOver.to_string(), "Game Over");
    }

    #[test]
    fn test_parse_server_lines() {
        let id = PlayerId::new(12);
        let cases = [
            ("Player ID: 12, Spawn Point: (736, 480)", ServerMessage::JoinAck { player_id: id, spawn: Position::new(736, 480) }),
            ("Player ID: 12, Position: (-5, 0)\n", ServerMessage::Position { player_id: id, position: Position::new(-5, 0) }),
            ("Player ID: 12, Bomb: (1, 2)", ServerMessage::BombPlaced { player_id: id, tile: TileCoord::new(1, 2) }),
            ("Player ID: 12, Lives: 2", ServerMessage::Lives { player_id: id, lives: 2 }),
            ("Player ID: 12, Left", ServerMessage::PlayerLeft { player_id: id }),
            ("Block Destroyed: (7, 5)", ServerMessage::BlockDestroyed { tile: TileCoord::new(7, 5) }),
            ("Explosion: (1, 1) (1, 0)", ServerMessage::Explosion { tiles: vec![TileCoord::new(1, 1), TileCoord::new(1, 0)] }),
            ("Match Restarted", ServerMessage::MatchRestarted),
        ];

        for (line, expected) in cases {
            assert_eq!(line.parse::<ServerMessage>(), Ok(expected), "line {line:?}");
        }
    }

    #[test]
    fn test_malformed_server_lines() {
        for line in [
            "Hello",
            "Player ID: x, Position: (1, 2)",
            "Player ID: 1, Position: (1 2)",
            "Player ID: 1, Teleport: (1, 2)",
            "Explosion: (1, 1) (zz)",
        ] {
            assert!(matches!(
                line.parse::<ServerMessage>(),
                Err(ProtocolError::MalformedMessage(_))
            ), "line {line:?}");
        }
    }

    #[test]
    fn test_event_conversion() {
        let id = PlayerId::new(1);
        let damaged = GameEvent::player_damaged(10, id, 1);
        assert_eq!(ServerMessage::from(&damaged), ServerMessage::Lives { player_id: id, lives: 1 });

        let placed = GameEvent::bomb_placed(3, id, 0, TileCoord::new(4, 4));
        assert_eq!(ServerMessage::from(&placed).to_string(), "Player ID: 1, Bomb: (4, 4)");

        assert_eq!(ServerMessage::from(&GameEvent::game_over(5)), ServerMessage::GameOver);
    }
}
