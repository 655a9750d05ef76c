//! Network Layer
//!
//! Connections, sessions and the text protocol. All game logic runs
//! through `game/`.

pub mod protocol;
pub mod session;
pub mod server;

pub use protocol::{ClientCommand, ProtocolError, ServerMessage};
pub use session::{CommandStatus, Session, SessionManager};
pub use server::{ConnectionError, GameServer, GameServerError, ServerConfig, Transport};
