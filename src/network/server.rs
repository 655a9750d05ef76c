//! Game Server
//!
//! Accepts client connections over raw TCP (newline framed) or WebSocket
//! (one line per text frame) and drives the fixed-rate tick loop.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use serde::{Serialize, Deserialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn, error, debug, instrument};

use crate::game::config::{ConfigError, GameConfig};
use crate::game::level::{LevelProvider, MapLoadError};
use crate::game::state::{PlayerId, World, WorldError};
use crate::network::session::{SessionManager, DEFAULT_QUEUE_CAPACITY};

/// Default listening port.
pub const DEFAULT_PORT: u16 = 5555;

/// Longest TCP command line accepted, excluding the newline.
pub const MAX_LINE_BYTES: usize = 1024;

/// Environment variable naming a JSON config file.
pub const CONFIG_ENV: &str = "BOMBGRID_CONFIG";
/// Environment variable overriding the bind address.
pub const BIND_ENV: &str = "BOMBGRID_BIND";
/// Environment variable overriding the level identifier.
pub const LEVEL_ENV: &str = "BOMBGRID_LEVEL";

/// Client transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Raw TCP, one line per `\n`.
    #[default]
    Tcp,
    /// WebSocket, one line per text frame.
    WebSocket,
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Client transport.
    pub transport: Transport,
    /// Level identifier passed to the level provider.
    pub level: String,
    /// Directory searched for `<level>.json`.
    pub levels_dir: Option<PathBuf>,
    /// Outbound message queue capacity per client.
    pub queue_capacity: usize,
    /// Simulation constants.
    pub game: GameConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_connections: 64,
            transport: Transport::Tcp,
            level: "arena".to_string(),
            levels_dir: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            game: GameConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load from the environment.
    ///
    /// Reads the JSON file named by `BOMBGRID_CONFIG` (if set), then applies
    /// `BOMBGRID_BIND` and `BOMBGRID_LEVEL`.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Apply single-field overrides from a key lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup(BIND_ENV) {
            self.bind_addr = bind.parse().map_err(|_| {
                ConfigError::Invalid(format!("{BIND_ENV}={bind:?} is not a socket address"))
            })?;
        }
        if let Some(level) = lookup(LEVEL_ENV) {
            self.level = level;
        }
        Ok(())
    }

    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.game.validate()?;
        if self.max_connections == 0 {
            return Err(ConfigError::Invalid("max_connections must be positive".into()));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue_capacity must be positive".into()));
        }
        if self.level.is_empty() {
            return Err(ConfigError::Invalid("level must not be empty".into()));
        }
        Ok(())
    }
}

/// Game server errors. Fatal for the server.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// Configuration rejected.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Level could not be loaded.
    #[error("Level error: {0}")]
    Level(#[from] MapLoadError),

    /// World could not be built from the level.
    #[error("World error: {0}")]
    World(#[from] WorldError),
}

/// Per-connection errors. Close that connection only.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Socket I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket handshake or framing failed.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Player could not be added to the world.
    #[error("Join failed: {0}")]
    Join(#[from] WorldError),
}

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// Sessions and the shared world.
    sessions: Arc<SessionManager>,
    /// Open connections.
    connections: Arc<AtomicUsize>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a server, loading its level through `levels`.
    pub fn new(config: ServerConfig, levels: &dyn LevelProvider) -> Result<Self, GameServerError> {
        config.validate()?;
        let level = levels.load(&config.level)?;
        info!(
            level = %config.level,
            width = level.width,
            height = level.height,
            spawns = level.spawn_points.len(),
            breakable = level.breakable.len(),
            "Level loaded"
        );

        let world = World::new(config.game, level)?;
        info!(match_id = %world.match_id, "Match created");
        Ok(Self::with_world(config, world))
    }

    /// Create a server around an existing world.
    ///
    /// The world's game constants win over `config.game`, so the tick loop
    /// runs at the rate the simulation was built for.
    pub fn with_world(mut config: ServerConfig, world: World) -> Self {
        if config.game != world.config {
            debug!("Server game config replaced by the world's");
            config.game = world.config;
        }
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            sessions: Arc::new(SessionManager::new(world, config.queue_capacity)),
            config,
            connections: Arc::new(AtomicUsize::new(0)),
            shutdown_tx,
        }
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until shutdown.
    #[instrument(skip(self, listener))]
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        let local_addr = listener.local_addr()?;
        info!(
            "Game server listening on {} ({:?}, {} Hz)",
            local_addr, self.config.transport, self.config.game.tick_rate
        );

        let tick_handle = tokio::spawn(Self::run_tick_loop(
            self.sessions.clone(),
            self.config.game.tick_rate,
            self.shutdown_tx.subscribe(),
        ));

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.connections.load(Ordering::SeqCst) >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        tick_handle.abort();
        Ok(())
    }

    /// Spawn the task serving one client.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let sessions = self.sessions.clone();
        let connections = self.connections.clone();
        let transport = self.config.transport;
        let shutdown_rx = self.shutdown_tx.subscribe();

        connections.fetch_add(1, Ordering::SeqCst);

        tokio::spawn(async move {
            let result = match transport {
                Transport::Tcp => Self::serve_tcp(stream, addr, &sessions, shutdown_rx).await,
                Transport::WebSocket => Self::serve_websocket(stream, addr, &sessions, shutdown_rx).await,
            };

            if let Err(e) = result {
                warn!("Connection {} closed with error: {}", addr, e);
            }

            connections.fetch_sub(1, Ordering::SeqCst);
            info!("Client {} cleaned up", addr);
        });
    }

    /// Serve a newline-framed TCP client.
    async fn serve_tcp(
        stream: TcpStream,
        addr: SocketAddr,
        sessions: &Arc<SessionManager>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), ConnectionError> {
        let session = sessions.on_connect(Some(addr)).await?;
        let player_id = session.player_id;
        let mut outbound = session.outbound;

        let (reader, mut writer) = stream.into_split();

        // Spawn message sender task
        let sender_task = tokio::spawn(async move {
            while let Some(msg) = outbound.recv().await {
                if let Err(e) = writer.write_all(msg.to_line().as_bytes()).await {
                    debug!("Write to {} failed: {}", addr, e);
                    break;
                }
            }
        });

        let mut reader = BufReader::new(reader);
        let mut buf = Vec::with_capacity(64);
        let result = loop {
            tokio::select! {
                line = read_command_line(&mut reader, &mut buf) => {
                    match line {
                        Ok(LineRead::Line(line)) => {
                            sessions.on_command(player_id, &line).await;
                        }
                        Ok(LineRead::TooLong) => {
                            warn!("Dropped line over {} bytes from {}", MAX_LINE_BYTES, addr);
                        }
                        Ok(LineRead::Eof) => {
                            debug!("Client {} disconnected", addr);
                            break Ok(());
                        }
                        Err(e) => break Err(ConnectionError::Io(e)),
                    }
                }
                _ = shutdown_rx.recv() => break Ok(()),
            }
        };

        sender_task.abort();
        sessions.on_disconnect(player_id).await;
        result
    }

    /// Serve a WebSocket client.
    async fn serve_websocket(
        stream: TcpStream,
        addr: SocketAddr,
        sessions: &Arc<SessionManager>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), ConnectionError> {
        let ws_stream = accept_async(stream).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        let session = sessions.on_connect(Some(addr)).await?;
        let player_id = session.player_id;
        let mut outbound = session.outbound;

        // Spawn message sender task
        let sender_task = tokio::spawn(async move {
            while let Some(msg) = outbound.recv().await {
                if let Err(e) = ws_sender.send(Message::Text(msg.to_string())).await {
                    debug!("Write to {} failed: {}", addr, e);
                    break;
                }
            }
        });

        let result = loop {
            tokio::select! {
                msg = ws_receiver.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            Self::dispatch_lines(sessions, player_id, &text).await;
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            debug!("Client {} disconnected", addr);
                            break Ok(());
                        }
                        Some(Err(e)) => break Err(ConnectionError::WebSocket(e)),
                        // Pings are answered by tungstenite; binary frames carry no commands
                        Some(Ok(_)) => {}
                    }
                }
                _ = shutdown_rx.recv() => break Ok(()),
            }
        };

        sender_task.abort();
        sessions.on_disconnect(player_id).await;
        result
    }

    /// Feed every line of a frame to the session manager.
    async fn dispatch_lines(sessions: &SessionManager, player_id: PlayerId, text: &str) {
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            sessions.on_command(player_id, line).await;
        }
    }

    /// Run the fixed-rate tick loop until shutdown.
    async fn run_tick_loop(
        sessions: Arc<SessionManager>,
        tick_rate: u32,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        let period = Duration::from_nanos(1_000_000_000 / u64::from(tick_rate.max(1)));
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Hash checkpoint every ten seconds of simulated time
        let checkpoint = u64::from(tick_rate.max(1)) * 10;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    sessions.run_tick().await;

                    let world = sessions.world().read().await;
                    if world.tick % checkpoint == 0 {
                        debug!(
                            tick = world.tick,
                            players = world.players.len(),
                            bombs = world.bombs.len(),
                            hash = %hex::encode(world.compute_hash()),
                            "Checkpoint"
                        );
                    }
                }
                _ = shutdown_rx.recv() => break,
            }
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Get connected session count.
    pub async fn session_count(&self) -> usize {
        self.sessions.session_count().await
    }

    /// Session manager, for inspecting the shared world.
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// One framed read from a TCP client.
#[derive(Debug, PartialEq)]
enum LineRead {
    Line(String),
    TooLong,
    Eof,
}

/// Read up to the next `\n` without trusting the bytes to be UTF-8.
///
/// Invalid sequences are replaced so the line still reaches the command
/// parser. A line longer than [`MAX_LINE_BYTES`] is consumed and dropped
/// without being buffered.
async fn read_command_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let mut too_long = false;

    loop {
        let (used, done) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                if too_long {
                    return Ok(LineRead::TooLong);
                }
                if buf.is_empty() {
                    return Ok(LineRead::Eof);
                }
                break;
            }
            let (chunk, used, done) = match available.iter().position(|&b| b == b'\n') {
                Some(i) => (&available[..i], i + 1, true),
                None => (available, available.len(), false),
            };
            if !too_long && buf.len() + chunk.len() <= MAX_LINE_BYTES {
                buf.extend_from_slice(chunk);
            } else {
                too_long = true;
                buf.clear();
            }
            (used, done)
        };
        reader.consume(used);
        if done {
            break;
        }
    }

    if too_long {
        return Ok(LineRead::TooLong);
    }
    Ok(LineRead::Line(String::from_utf8_lossy(buf).into_owned()))
}
