//! Bombgrid Game Server
//!
//! Loads configuration from the environment, builds the level and serves
//! clients until Ctrl-C.

use std::sync::Arc;
use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use bombgrid::{
    VERSION,
    game::level::LevelCatalog,
    network::server::{GameServer, ServerConfig},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Bombgrid Server v{}", VERSION);

    let config = ServerConfig::load().context("Failed to load configuration")?;
    info!(
        "Tick Rate: {} Hz, bomb timer {} ticks, radius {}",
        config.game.tick_rate, config.game.bomb_timer, config.game.explosion_radius
    );

    let levels = LevelCatalog::new(config.levels_dir.clone());
    let server = GameServer::new(config, &levels).context("Failed to start match")?;
    let server = Arc::new(server);

    let signal_server = server.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, shutting down");
                signal_server.shutdown();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    server.run().await.context("Server failed")?;

    let world = server.sessions().world().read().await;
    info!(
        "Stopped at tick {}, state hash {}",
        world.tick,
        hex::encode(world.compute_hash())
    );

    Ok(())
}
