//! Session Management
//!
//! One session per connected client. Owns the shared world, routes decoded
//! commands into it and fans tick output out to every client.
//!
//! Lock discipline: the world lock is only held while the simulation runs.
//! Messages are built under it, the guard is dropped, and only then are they
//! pushed into per-session queues with `try_send`.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use crate::game::input::{apply_command, CommandOutcome};
use crate::game::state::{CommandRejected, PlayerId, World, WorldError};
use crate::game::tick::{tick, TickResult};
use crate::network::protocol::{ClientCommand, ProtocolError, ServerMessage};

/// Default outbound queue capacity per session.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Server-side half of a connected client.
#[derive(Debug)]
struct SessionHandle {
    /// Remote address, if known.
    peer: Option<SocketAddr>,
    /// When the client joined.
    connected_at: Instant,
    /// Outbound queue to the client's writer task.
    sender: mpsc::Sender<ServerMessage>,
}

/// Transport-facing half of a connected client.
///
/// The connection's writer task drains `outbound` onto the socket.
#[derive(Debug)]
pub struct Session {
    /// Player this connection controls.
    pub player_id: PlayerId,
    /// Messages to write to the client, in order.
    pub outbound: mpsc::Receiver<ServerMessage>,
}

/// Result of handling one command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandStatus {
    /// Command took effect.
    Applied(CommandOutcome),
    /// Command was valid but had no effect.
    Rejected(CommandRejected),
    /// Line was not a command.
    Invalid(ProtocolError),
}

/// Tracks connected clients and the world they share.
pub struct SessionManager {
    /// Shared world state.
    world: Arc<RwLock<World>>,
    /// Connected sessions.
    sessions: RwLock<BTreeMap<PlayerId, SessionHandle>>,
    /// Next player ID (monotonic, never reused).
    next_id: AtomicU64,
    /// Outbound queue capacity per session.
    queue_capacity: usize,
}

impl SessionManager {
    /// Create a manager around a world.
    pub fn new(world: World, queue_capacity: usize) -> Self {
        Self {
            world: Arc::new(RwLock::new(world)),
            sessions: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(0),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Shared world handle.
    pub fn world(&self) -> &Arc<RwLock<World>> {
        &self.world
    }

    /// Register a new client.
    ///
    /// Allocates the next player ID, spawns the player and queues the
    /// Join-Ack as the session's first message.
    pub async fn on_connect(&self, peer: Option<SocketAddr>) -> Result<Session, WorldError> {
        let player_id = PlayerId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, outbound) = mpsc::channel(self.queue_capacity);

        let spawn = {
            let mut world = self.world.write().await;
            let tile_size = world.config.tile_size;
            world.add_player(player_id)?.spawn.to_world(tile_size)
        };

        // Queue is empty, cannot be full
        let _ = sender.try_send(ServerMessage::JoinAck { player_id, spawn });

        self.sessions.write().await.insert(player_id, SessionHandle {
            peer,
            connected_at: Instant::now(),
            sender,
        });

        info!(player = %player_id, ?peer, spawn = %spawn, "Player joined");
        Ok(Session { player_id, outbound })
    }

    /// Handle one raw line from a client.
    ///
    /// Invalid lines are logged and ignored.
    pub async fn on_command(&self, player_id: PlayerId, line: &str) -> CommandStatus {
        match line.parse::<ClientCommand>() {
            Ok(command) => self.handle_command(player_id, command).await,
            Err(e) => {
                debug!(player = %player_id, "Ignoring line: {}", e);
                CommandStatus::Invalid(e)
            }
        }
    }

    /// Apply a decoded command.
    ///
    /// A successful move is echoed to the mover right away; everything else
    /// reaches clients through the next tick's events.
    pub async fn handle_command(&self, player_id: PlayerId, command: ClientCommand) -> CommandStatus {
        let result = {
            let mut world = self.world.write().await;
            apply_command(&mut world, player_id, command.to_command())
        };

        match result {
            Ok(outcome) => {
                if let CommandOutcome::Moved(position) = outcome {
                    self.send_to(player_id, ServerMessage::Position { player_id, position }).await;
                }
                CommandStatus::Applied(outcome)
            }
            Err(reason) => {
                debug!(player = %player_id, %command, "Command rejected: {}", reason);
                CommandStatus::Rejected(reason)
            }
        }
    }

    /// Remove a client and its player. Remaining clients are told.
    pub async fn on_disconnect(&self, player_id: PlayerId) {
        let handle = self.sessions.write().await.remove(&player_id);
        let removed = self.world.write().await.remove_player(&player_id).is_some();

        if handle.is_none() && !removed {
            return;
        }

        info!(
            player = %player_id,
            peer = ?handle.as_ref().and_then(|h| h.peer),
            session_secs = handle.as_ref().map(|h| h.connected_at.elapsed().as_secs()),
            "Player left"
        );
        self.broadcast(&[ServerMessage::PlayerLeft { player_id }]).await;
    }

    /// How long a client has been connected.
    pub async fn connected_for(&self, player_id: PlayerId) -> Option<Duration> {
        self.sessions
            .read()
            .await
            .get(&player_id)
            .map(|h| h.connected_at.elapsed())
    }

    /// Queue messages for every session.
    ///
    /// Never waits: a full queue drops the message for that session only.
    pub async fn broadcast(&self, messages: &[ServerMessage]) {
        if messages.is_empty() {
            return;
        }

        let sessions = self.sessions.read().await;
        for (player_id, handle) in sessions.iter() {
            for message in messages {
                if !Self::push(*player_id, handle, message.clone()) {
                    break;
                }
            }
        }
    }

    /// Queue a message for one session.
    pub async fn send_to(&self, player_id: PlayerId, message: ServerMessage) {
        let sessions = self.sessions.read().await;
        if let Some(handle) = sessions.get(&player_id) {
            Self::push(player_id, handle, message);
        }
    }

    /// Push without waiting. Returns false once the receiver is gone.
    fn push(player_id: PlayerId, handle: &SessionHandle, message: ServerMessage) -> bool {
        match handle.sender.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(message)) => {
                warn!(player = %player_id, "Outbound queue full, dropping: {}", message);
                true
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Advance the world one tick and broadcast the outcome.
    ///
    /// Sends the tick's event lines, then one position line per player.
    pub async fn run_tick(&self) -> TickResult {
        let (result, messages) = {
            let mut world = self.world.write().await;
            let result = tick(&mut world);

            let mut messages: Vec<ServerMessage> = result.events.iter()
                .map(ServerMessage::from)
                .collect();
            messages.extend(
                world.positions()
                    .into_iter()
                    .map(|(player_id, position)| ServerMessage::Position { player_id, position }),
            );

            if messages.iter().any(|m| *m == ServerMessage::GameOver) {
                info!(
                    tick = world.tick,
                    hash = %hex::encode(world.compute_hash()),
                    "Game over"
                );
            }

            (result, messages)
        };

        for message in &messages {
            match message {
                ServerMessage::Eliminated { player_id } => info!(player = %player_id, "Player eliminated"),
                ServerMessage::MatchRestarted => info!("Match restarted"),
                _ => {}
            }
        }

        self.broadcast(&messages).await;
        result
    }

    /// Number of connected sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// IDs of connected players, ascending.
    pub async fn player_ids(&self) -> Vec<PlayerId> {
        self.sessions.read().await.keys().copied().collect()
    }
}
