//! Game Logic Module
//!
//! The simulation engine. No knowledge of networking.
//!
//! ## Module Structure
//!
//! - `config`: Simulation constants
//! - `level`: Static level geometry and level providers
//! - `state`: World, player and bomb state
//! - `input`: Player commands
//! - `tick`: Fixed-timestep simulation loop
//! - `collision`: Box-vs-tile tests and explosion shapes
//! - `events`: Game events reported by ticks

pub mod config;
pub mod level;
pub mod state;
pub mod input;
pub mod tick;
pub mod collision;
pub mod events;

// Re-export key types
pub use config::{ConfigError, GameConfig};
pub use level::{BuiltinLevels, JsonLevelProvider, LevelCatalog, LevelGeometry, LevelProvider, MapLoadError, TileKind};
pub use state::{BombState, CommandRejected, PlayerId, PlayerState, World, WorldError, WorldSnapshot};
pub use input::{apply_command, Command, CommandOutcome};
pub use tick::{tick, TickResult};
pub use events::{GameEvent, GameEventData};
