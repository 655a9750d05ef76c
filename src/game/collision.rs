//! Collision Detection
//!
//! Box-vs-tile tests and explosion shapes. Tiles are looked up by
//! coordinate instead of scanning every block, so a test costs at most
//! the handful of tiles a box spans.

use std::collections::BTreeSet;

use crate::core::geometry::{Direction, Rect, TileCoord};
use crate::game::config::MAX_EXPLOSION_RADIUS;

/// Check if a box overlaps any solid or breakable block.
pub fn rect_hits_blocks(
    rect: &Rect,
    tile_size: i32,
    solid: &BTreeSet<TileCoord>,
    breakable: &BTreeSet<TileCoord>,
) -> bool {
    rect.tiles(tile_size)
        .any(|tile| solid.contains(&tile) || breakable.contains(&tile))
}

/// Tiles covered by a detonation at `center`.
///
/// A plus shape: the center plus `radius` tiles along each cardinal
/// direction, 4 * radius + 1 tiles in total. Rays are fixed length and are
/// not stopped by walls; tiles may fall outside the board. `radius` is
/// capped at [`MAX_EXPLOSION_RADIUS`].
pub fn explosion_area(center: TileCoord, radius: u32) -> Vec<TileCoord> {
    let reach = radius.min(MAX_EXPLOSION_RADIUS);
    let mut tiles = Vec::with_capacity(4 * reach as usize + 1);
    let radius = i32::try_from(reach).unwrap_or(0);
    tiles.push(center);

    for distance in 1..=radius {
        for direction in Direction::ALL {
            let (dx, dy) = direction.delta();
            tiles.push(center.offset(dx * distance, dy * distance));
        }
    }

    tiles
}

/// Check if a box overlaps any tile of an explosion.
pub fn rect_in_explosion(rect: &Rect, tile_size: i32, area: &[TileCoord]) -> bool {
    area.iter().any(|tile| rect.intersects(&tile.rect(tile_size)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_explosion_plus_shape() {
        let area = explosion_area(TileCoord::new(5, 5), 2);
        assert_eq!(area.len(), 9);

        let expected: BTreeSet<TileCoord> = [
            (5, 5),
            (5, 3), (5, 4), (5, 6), (5, 7),
            (3, 5), (4, 5), (6, 5), (7, 5),
        ]
        .into_iter()
        .map(|(c, r)| TileCoord::new(c, r))
        .collect();

        assert_eq!(area.into_iter().collect::<BTreeSet<_>>(), expected);
    }

    #[test]
    fn test_zero_radius_is_single_tile() {
        assert_eq!(explosion_area(TileCoord::new(0, 0), 0), vec![TileCoord::new(0, 0)]);
    }

    #[test]
    fn test_radius_is_capped() {
        let area = explosion_area(TileCoord::new(1, 1), u32::MAX);
        assert_eq!(area.len(), 4 * MAX_EXPLOSION_RADIUS as usize + 1);
        assert!(area.contains(&TileCoord::new(1, 1 + MAX_EXPLOSION_RADIUS as i32)));
    }

    #[test]
    fn test_rect_hits_blocks() {
        let solid: BTreeSet<_> = [TileCoord::new(1, 0)].into_iter().collect();
        let breakable: BTreeSet<_> = [TileCoord::new(0, 1)].into_iter().collect();

        // Fully inside tile (0, 0)
        assert!(!rect_hits_blocks(&Rect::new(4, 4, 20, 20), 32, &solid, &breakable));
        // Pokes into the solid tile to the right
        assert!(rect_hits_blocks(&Rect::new(13, 4, 20, 20), 32, &solid, &breakable));
        // Pokes into the breakable tile below
        assert!(rect_hits_blocks(&Rect::new(4, 13, 20, 20), 32, &solid, &breakable));
        // Touching the edge is not a hit
        assert!(!rect_hits_blocks(&Rect::new(12, 12, 20, 20), 32, &solid, &breakable));
    }

    #[test]
    fn test_rect_in_explosion() {
        let area = explosion_area(TileCoord::new(5, 5), 2);

        // Player box straddling (5, 7) and (5, 8)
        assert!(rect_in_explosion(&Rect::new(165, 230, 20, 20), 32, &area));
        // Diagonal neighbour is outside the plus
        assert!(!rect_in_explosion(&Rect::new(6 * 32 + 2, 6 * 32 + 2, 20, 20), 32, &area));
    }

    proptest! {
        #[test]
        fn prop_explosion_has_4r_plus_1_distinct_tiles(
            col in -50i32..50,
            row in -50i32..50,
            radius in 0u32..10,
        ) {
            let center = TileCoord::new(col, row);
            let area = explosion_area(center, radius);
            let distinct: BTreeSet<_> = area.iter().copied().collect();

            prop_assert_eq!(area.len(), 4 * radius as usize + 1);
            prop_assert_eq!(distinct.len(), area.len());

            for tile in &area {
                let dc = (tile.col - col).abs();
                let dr = (tile.row - row).abs();
                // On one axis and within reach
                prop_assert!(dc == 0 || dr == 0);
                prop_assert!(dc + dr <= radius as i32);
            }
        }
    }
}
