//! State Hashing
//!
//! SHA-256 digests of world state. Two worlds fed the same commands in
//! the same order must hash identically; logs print the digest so runs
//! can be compared.

use sha2::{Sha256, Digest};
use super::geometry::{Position, TileCoord};

/// Hash output type (256 bits / 32 bytes)
pub type StateHash = [u8; 32];

/// Deterministic hasher for world state.
///
/// Order of updates is significant.
pub struct StateHasher {
    hasher: Sha256,
}

impl StateHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Create hasher for world state.
    pub fn for_world_state() -> Self {
        Self::new(b"BOMBGRID_WORLD_V1")
    }

    /// Update with a u8 value.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a u64 value (little-endian).
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with an i32 value (little-endian).
    #[inline]
    pub fn update_i32(&mut self, value: i32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a boolean.
    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// Update with a tile coordinate.
    #[inline]
    pub fn update_tile(&mut self, tile: TileCoord) {
        self.update_i32(tile.col);
        self.update_i32(tile.row);
    }

    /// Update with a world position.
    #[inline]
    pub fn update_position(&mut self, pos: Position) {
        self.update_i32(pos.x);
        self.update_i32(pos.y);
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> StateHash {
        self.hasher.finalize().into()
    }
}

/// Compute a world state hash.
///
/// Called by `World::compute_hash()`; the closure feeds world-specific data
/// after the tick counter.
pub fn compute_state_hash<F>(tick: u64, add_state: F) -> StateHash
where
    F: FnOnce(&mut StateHasher),
{
    let mut hasher = StateHasher::for_world_state();
    hasher.update_u64(tick);
    add_state(&mut hasher);
    hasher.finalize()
}
