//! # Bombgrid Server
//!
//! Authoritative server for a tile-based multiplayer bombing game. Clients
//! send movement and bomb commands as text lines; the server simulates the
//! board at a fixed tick rate and streams the results back.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      BOMBGRID SERVER                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── geometry.rs - Tiles, positions, boxes, directions       │
//! │  ├── rng.rs      - Deterministic Xorshift128+ PRNG           │
//! │  └── hash.rs     - State hashing for verification            │
//! │                                                              │
//! │  game/           - Simulation engine (no networking)         │
//! │  ├── config.rs   - Simulation constants                      │
//! │  ├── level.rs    - Level geometry and providers              │
//! │  ├── state.rs    - World, player and bomb state              │
//! │  ├── input.rs    - Player commands                           │
//! │  ├── tick.rs     - Fixed-timestep simulation loop            │
//! │  ├── collision.rs- Box-vs-tile tests, explosion shapes       │
//! │  └── events.rs   - Tick events                               │
//! │                                                              │
//! │  network/        - Networking (non-deterministic)            │
//! │  ├── server.rs   - TCP/WebSocket server, tick loop           │
//! │  ├── protocol.rs - Text line protocol                        │
//! │  └── session.rs  - Per-client sessions, broadcast            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism
//!
//! `core/` and `game/` use integer math and BTreeMap/BTreeSet only. The same
//! commands applied between the same ticks produce the same state hash.
//!
//! ```
//! use bombgrid::{GameConfig, LevelGeometry, PlayerId, World};
//! use bombgrid::core::TileCoord;
//!
//! let level = LevelGeometry::new(9, 9).with_spawns([TileCoord::new(1, 1)]);
//! let mut world = World::new(GameConfig::default(), level).unwrap();
//! world.add_player(PlayerId::new(0)).unwrap();
//! world.place_bomb(PlayerId::new(0)).unwrap();
//!
//! for _ in 0..60 {
//!     bombgrid::game::tick(&mut world);
//! }
//! assert_eq!(world.get_player(&PlayerId::new(0)).unwrap().lives, 2);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use crate::core::rng::DeterministicRng;
pub use crate::game::config::GameConfig;
pub use crate::game::level::{LevelGeometry, LevelProvider};
pub use crate::game::state::{PlayerId, PlayerState, World};
pub use crate::network::server::{GameServer, ServerConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
