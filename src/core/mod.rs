//! Core deterministic primitives.
//!
//! Integer grid geometry, a seeded PRNG and state hashing. Nothing in
//! here knows about players, bombs or sockets.

pub mod geometry;
pub mod rng;
pub mod hash;

// Re-export core types
pub use geometry::{Direction, Position, Rect, TileCoord};
pub use rng::DeterministicRng;
pub use hash::{compute_state_hash, StateHash, StateHasher};
