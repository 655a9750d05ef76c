//! Level Geometry
//!
//! Static level data: solid tiles, breakable tiles, spawn points and the
//! board size. Providers turn a level identifier into a `LevelGeometry`;
//! the simulation never sees where the data came from.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use serde::{Serialize, Deserialize};

use crate::core::geometry::TileCoord;
use crate::core::rng::DeterministicRng;

/// Largest accepted board edge in tiles.
pub const MAX_BOARD_TILES: i32 = 1024;

/// Kind of a static tile, resolved from the layer it was declared in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileKind {
    /// Indestructible wall.
    Solid,
    /// Wall destroyed by explosions.
    Breakable,
}

impl TileKind {
    /// Map a layer name to a tile kind. Unknown layers are decoration.
    pub fn from_layer_name(name: &str) -> Option<Self> {
        match name {
            "Solid" => Some(TileKind::Solid),
            "Breakable" => Some(TileKind::Breakable),
            _ => None,
        }
    }
}

/// Static geometry of one level, in tile coordinates.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelGeometry {
    /// Board width in tiles.
    pub width: i32,
    /// Board height in tiles.
    pub height: i32,
    /// Indestructible tiles.
    pub solid: BTreeSet<TileCoord>,
    /// Destructible tiles.
    pub breakable: BTreeSet<TileCoord>,
    /// Spawn points, in assignment order.
    pub spawn_points: Vec<TileCoord>,
}

impl LevelGeometry {
    /// Empty board of the given size.
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Add a tile of the given kind. Solid wins over breakable.
    pub fn place(&mut self, kind: TileKind, tile: TileCoord) {
        match kind {
            TileKind::Solid => {
                self.breakable.remove(&tile);
                self.solid.insert(tile);
            }
            TileKind::Breakable => {
                if !self.solid.contains(&tile) {
                    self.breakable.insert(tile);
                }
            }
        }
    }

    /// Builder: add solid tiles.
    pub fn with_solid(mut self, tiles: impl IntoIterator<Item = TileCoord>) -> Self {
        for tile in tiles {
            self.place(TileKind::Solid, tile);
        }
        self
    }

    /// Builder: add breakable tiles.
    pub fn with_breakable(mut self, tiles: impl IntoIterator<Item = TileCoord>) -> Self {
        for tile in tiles {
            self.place(TileKind::Breakable, tile);
        }
        self
    }

    /// Builder: append spawn points.
    pub fn with_spawns(mut self, tiles: impl IntoIterator<Item = TileCoord>) -> Self {
        self.spawn_points.extend(tiles);
        self
    }

    /// Check if a tile lies on the board.
    pub fn contains(&self, tile: TileCoord) -> bool {
        tile.col >= 0 && tile.row >= 0 && tile.col < self.width && tile.row < self.height
    }

    /// Reject empty boards and tiles or spawns outside the board.
    ///
    /// An empty spawn list is not a load error; the world refuses it when
    /// the match starts.
    pub fn validate(&self) -> Result<(), MapLoadError> {
        if self.width <= 0 || self.height <= 0 {
            return Err(MapLoadError::Invalid(format!(
                "board size {}x{} is empty",
                self.width, self.height
            )));
        }
        if self.width > MAX_BOARD_TILES || self.height > MAX_BOARD_TILES {
            return Err(MapLoadError::Invalid(format!(
                "board size {}x{} exceeds {} tiles per side",
                self.width, self.height, MAX_BOARD_TILES
            )));
        }

        let stray = self.solid.iter()
            .chain(self.breakable.iter())
            .chain(self.spawn_points.iter())
            .find(|tile| !self.contains(**tile));

        if let Some(tile) = stray {
            return Err(MapLoadError::Invalid(format!(
                "tile {} lies outside the {}x{} board",
                tile, self.width, self.height
            )));
        }

        if let Some(spawn) = self.blocked_spawn() {
            return Err(MapLoadError::Invalid(format!("spawn point {} is on a block", spawn)));
        }

        Ok(())
    }

    /// First spawn point sitting on a solid or breakable tile.
    pub fn blocked_spawn(&self) -> Option<TileCoord> {
        self.spawn_points
            .iter()
            .find(|spawn| self.solid.contains(*spawn) || self.breakable.contains(*spawn))
            .copied()
    }
}

/// Level loading errors. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum MapLoadError {
    /// No level with this identifier.
    #[error("Level not found: {0}")]
    NotFound(String),

    /// Level file could not be read.
    #[error("Failed to read level {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Level file is not valid JSON for the level format.
    #[error("Malformed level {path}: {source}")]
    Malformed {
        /// File that failed.
        path: PathBuf,
        /// Parse error.
        source: serde_json::Error,
    },

    /// Level parsed but its contents are inconsistent.
    #[error("Invalid level: {0}")]
    Invalid(String),
}

/// Source of level geometry.
pub trait LevelProvider: Send + Sync {
    /// Load the level with the given identifier.
    fn load(&self, level_id: &str) -> Result<LevelGeometry, MapLoadError>;
}

// =============================================================================
// BUILT-IN LEVELS
// =============================================================================

/// Procedurally generated boards.
///
/// - `arena` / `arena:<seed>`: bordered 25x17 board with pillars on even
///   tiles and seeded breakable fill.
/// - `open`: the same board without breakables.
#[derive(Clone, Debug)]
pub struct BuiltinLevels {
    /// Seed used by plain `arena`.
    pub seed: u64,
    /// Chance (percent) that a free tile becomes breakable.
    pub breakable_density: u32,
}

impl Default for BuiltinLevels {
    fn default() -> Self {
        Self {
            seed: 0x5EED,
            breakable_density: 60,
        }
    }
}

impl BuiltinLevels {
    /// Board width in tiles.
    pub const WIDTH: i32 = 25;
    /// Board height in tiles.
    pub const HEIGHT: i32 = 17;

    /// Generate the bordered pillar board, filling free tiles at `density`.
    pub fn arena(seed: u64, density: u32) -> LevelGeometry {
        let (w, h) = (Self::WIDTH, Self::HEIGHT);
        let mut level = LevelGeometry::new(w, h);

        // Opposite corners first so two players start far apart
        let spawns = [
            TileCoord::new(1, 1),
            TileCoord::new(w - 2, h - 2),
            TileCoord::new(w - 2, 1),
            TileCoord::new(1, h - 2),
        ];
        level.spawn_points.extend(spawns);

        let near_spawn = |tile: TileCoord| {
            spawns.iter().any(|s| (s.col - tile.col).abs() + (s.row - tile.row).abs() <= 1)
        };

        let mut rng = DeterministicRng::new(seed);
        for row in 0..h {
            for col in 0..w {
                let tile = TileCoord::new(col, row);
                let border = col == 0 || row == 0 || col == w - 1 || row == h - 1;
                let pillar = col % 2 == 0 && row % 2 == 0;

                if border || pillar {
                    level.place(TileKind::Solid, tile);
                } else if !near_spawn(tile) && rng.chance(density) {
                    level.place(TileKind::Breakable, tile);
                }
            }
        }

        level
    }
}

impl LevelProvider for BuiltinLevels {
    fn load(&self, level_id: &str) -> Result<LevelGeometry, MapLoadError> {
        match level_id {
            "arena" => Ok(Self::arena(self.seed, self.breakable_density)),
            "open" => Ok(Self::arena(self.seed, 0)),
            other => {
                let seed = other
                    .strip_prefix("arena:")
                    .and_then(|s| s.parse::<u64>().ok())
                    .ok_or_else(|| MapLoadError::NotFound(other.to_string()))?;
                Ok(Self::arena(seed, self.breakable_density))
            }
        }
    }
}

// =============================================================================
// JSON LEVEL FILES
// =============================================================================

/// On-disk level format.
///
/// ```json
/// {
///   "width": 15, "height": 13,
///   "layers": [
///     { "name": "Solid", "tiles": [[0, 0], [1, 0]] },
///     { "name": "Breakable", "tiles": [[3, 3]] }
///   ],
///   "spawns": [[1, 1], [13, 11]]
/// }
/// ```
#[derive(Debug, Deserialize)]
struct LevelFile {
    width: i32,
    height: i32,
    #[serde(default)]
    layers: Vec<LayerFile>,
    #[serde(default)]
    spawns: Vec<[i32; 2]>,
}

#[derive(Debug, Deserialize)]
struct LayerFile {
    name: String,
    #[serde(default)]
    tiles: Vec<[i32; 2]>,
}

/// Loads `<dir>/<level_id>.json`.
#[derive(Clone, Debug)]
pub struct JsonLevelProvider {
    dir: PathBuf,
}

impl JsonLevelProvider {
    /// Provider rooted at a level directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Load a level file from an explicit path.
    pub fn load_file(path: &Path) -> Result<LevelGeometry, MapLoadError> {
        let contents = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                MapLoadError::NotFound(path.display().to_string())
            } else {
                MapLoadError::Io { path: path.to_path_buf(), source }
            }
        })?;

        Self::parse(&contents).map_err(|source| MapLoadError::Malformed {
            path: path.to_path_buf(),
            source,
        })?
    }

    /// Parse level JSON. The outer error is syntax, the inner is content.
    pub fn parse(json: &str) -> Result<Result<LevelGeometry, MapLoadError>, serde_json::Error> {
        let file: LevelFile = serde_json::from_str(json)?;

        let mut level = LevelGeometry::new(file.width, file.height);
        for layer in &file.layers {
            let Some(kind) = TileKind::from_layer_name(&layer.name) else {
                continue;
            };
            for [col, row] in &layer.tiles {
                level.place(kind, TileCoord::new(*col, *row));
            }
        }
        level.spawn_points = file.spawns.iter()
            .map(|[col, row]| TileCoord::new(*col, *row))
            .collect();

        Ok(level.validate().map(|_| level))
    }
}

impl LevelProvider for JsonLevelProvider {
    fn load(&self, level_id: &str) -> Result<LevelGeometry, MapLoadError> {
        // Identifiers are names, not paths
        if level_id.is_empty() || level_id.contains(['/', '\\']) || level_id.contains("..") {
            return Err(MapLoadError::NotFound(level_id.to_string()));
        }
        Self::load_file(&self.dir.join(format!("{level_id}.json")))
    }
}

// =============================================================================
// CATALOG
// =============================================================================

/// Resolves identifiers across all sources.
///
/// `file:<path>` loads that file, built-in names come next, then the
/// optional level directory.
#[derive(Clone, Debug, Default)]
pub struct LevelCatalog {
    builtin: BuiltinLevels,
    directory: Option<JsonLevelProvider>,
}

impl LevelCatalog {
    /// Catalog with built-ins and an optional level directory.
    pub fn new(levels_dir: Option<PathBuf>) -> Self {
        Self {
            builtin: BuiltinLevels::default(),
            directory: levels_dir.map(JsonLevelProvider::new),
        }
    }
}

impl LevelProvider for LevelCatalog {
    fn load(&self, level_id: &str) -> Result<LevelGeometry, MapLoadError> {
        if let Some(path) = level_id.strip_prefix("file:") {
            return JsonLevelProvider::load_file(Path::new(path));
        }

        match self.builtin.load(level_id) {
            Err(MapLoadError::NotFound(_)) => match &self.directory {
                Some(dir) => dir.load(level_id),
                None => Err(MapLoadError::NotFound(level_id.to_string())),
            },
            result => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL_LEVEL: &str = r#"{
        "width": 5, "height": 4,
        "layers": [
            { "name": "Solid", "tiles": [[0, 0], [1, 0]] },
            { "name": "Breakable", "tiles": [[2, 2], [0, 0]] },
            { "name": "Background", "tiles": [[3, 3]] }
        ],
        "spawns": [[1, 1], [3, 2]]
    }"#;

    #[test]
    fn test_layer_names() {
        assert_eq!(TileKind::from_layer_name("Solid"), Some(TileKind::Solid));
        assert_eq!(TileKind::from_layer_name("Breakable"), Some(TileKind::Breakable));
        assert_eq!(TileKind::from_layer_name("Ground"), None);
    }

    #[test]
    fn test_parse_level_file() {
        let level = JsonLevelProvider::parse(SMALL_LEVEL).unwrap().unwrap();

        assert_eq!((level.width, level.height), (5, 4));
        assert_eq!(level.solid.len(), 2);
        // (0, 0) is declared solid, so the breakable copy is dropped
        assert_eq!(level.breakable.len(), 1);
        assert!(level.breakable.contains(&TileCoord::new(2, 2)));
        assert_eq!(level.spawn_points, vec![TileCoord::new(1, 1), TileCoord::new(3, 2)]);
    }

    #[test]
    fn test_malformed_json_is_syntax_error() {
        assert!(JsonLevelProvider::parse("{ not json").is_err());
        assert!(JsonLevelProvider::parse(r#"{"layers": []}"#).is_err());
    }

    #[test]
    fn test_tile_outside_board_is_invalid() {
        let json = r#"{"width": 2, "height": 2, "layers": [{"name": "Solid", "tiles": [[5, 0]]}]}"#;
        let result = JsonLevelProvider::parse(json).unwrap();
        assert!(matches!(result, Err(MapLoadError::Invalid(_))));
    }

    #[test]
    fn test_spawn_on_block_is_invalid() {
        for layer in ["Solid", "Breakable"] {
            let json = format!(
                r#"{{"width": 4, "height": 4,
                    "layers": [{{"name": "{layer}", "tiles": [[1, 1]]}}],
                    "spawns": [[1, 1], [2, 2]]}}"#
            );
            let result = JsonLevelProvider::parse(&json).unwrap();
            assert!(matches!(result, Err(MapLoadError::Invalid(_))), "{layer} under spawn accepted");
        }

        let level = LevelGeometry::new(4, 4)
            .with_breakable([TileCoord::new(2, 2)])
            .with_spawns([TileCoord::new(1, 1), TileCoord::new(2, 2)]);
        assert_eq!(level.blocked_spawn(), Some(TileCoord::new(2, 2)));
    }

    #[test]
    fn test_oversized_board_is_invalid() {
        let json = r#"{"width": 2147483647, "height": 3, "layers": [], "spawns": [[0, 0]]}"#;
        let result = JsonLevelProvider::parse(json).unwrap();
        assert!(matches!(result, Err(MapLoadError::Invalid(_))));
        assert!(LevelGeometry::new(MAX_BOARD_TILES, MAX_BOARD_TILES).validate().is_ok());
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let provider = JsonLevelProvider::new("/definitely/not/here");
        assert!(matches!(provider.load("level1"), Err(MapLoadError::NotFound(_))));
        assert!(matches!(provider.load("../etc"), Err(MapLoadError::NotFound(_))));
    }

    #[test]
    fn test_load_file_from_disk() {
        let path = std::env::temp_dir().join(format!("bombgrid-level-{}.json", std::process::id()));
        std::fs::write(&path, SMALL_LEVEL).unwrap();

        let catalog = LevelCatalog::default();
        let level = catalog.load(&format!("file:{}", path.display())).unwrap();
        assert_eq!(level.spawn_points.len(), 2);

        std::fs::write(&path, "[1, 2").unwrap();
        let err = JsonLevelProvider::load_file(&path).unwrap_err();
        assert!(matches!(err, MapLoadError::Malformed { .. }));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_arena_layout() {
        let level = BuiltinLevels::arena(1, 100);
        assert!(level.validate().is_ok());
        assert_eq!(level.spawn_points.len(), 4);

        // Border is solid
        for col in 0..BuiltinLevels::WIDTH {
            assert!(level.solid.contains(&TileCoord::new(col, 0)));
            assert!(level.solid.contains(&TileCoord::new(col, BuiltinLevels::HEIGHT - 1)));
        }
        // Pillars on even tiles
        assert!(level.solid.contains(&TileCoord::new(2, 2)));
        assert!(level.solid.contains(&TileCoord::new(4, 6)));

        // Spawns and their neighbours stay clear even at full density
        for spawn in &level.spawn_points {
            for (dc, dr) in [(0, 0), (1, 0), (-1, 0), (0, 1), (0, -1)] {
                let tile = spawn.offset(dc, dr);
                assert!(!level.breakable.contains(&tile), "breakable next to spawn at {}", tile);
            }
            assert!(!level.solid.contains(spawn));
        }
        assert!(!level.breakable.is_empty());
    }

    #[test]
    fn test_arena_is_seeded() {
        let levels = BuiltinLevels::default();
        assert_eq!(levels.load("arena:7").unwrap(), levels.load("arena:7").unwrap());
        assert!(levels.load("open").unwrap().breakable.is_empty());
        assert!(matches!(levels.load("castle"), Err(MapLoadError::NotFound(_))));
    }

    #[test]
    fn test_catalog_falls_back_to_not_found() {
        let catalog = LevelCatalog::new(None);
        assert!(catalog.load("arena").is_ok());
        assert!(matches!(catalog.load("custom"), Err(MapLoadError::NotFound(_))));
    }
}
