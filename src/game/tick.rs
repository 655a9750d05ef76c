//! Authoritative Simulation Tick
//!
//! Advances the world by one fixed timestep. Commands are applied between
//! ticks through `World`; this module only runs the timers.

use crate::core::geometry::TileCoord;
use crate::game::collision::{explosion_area, rect_in_explosion};
use crate::game::events::GameEvent;
use crate::game::state::World;

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Events generated since the previous tick, in order
    pub events: Vec<GameEvent>,
    /// Every player is eliminated
    pub game_over: bool,
}

/// Run one simulation tick.
///
/// Order within a tick:
/// 1. cooldown and flash counters count down
/// 2. bomb fuses count down; expired bombs detonate
/// 3. bombs that detonated on an earlier tick are removed
/// 4. players out of lives are eliminated
///
/// Events pushed by commands since the last tick come first in the result.
pub fn tick(world: &mut World) -> TickResult {
    world.tick += 1;

    update_timers(world);
    process_bombs(world);
    remove_spent_bombs(world);
    process_eliminations(world);

    let game_over = world.is_game_over();
    if game_over && world.report_game_over() {
        let event = GameEvent::game_over(world.tick);
        world.push_event(event);
    }

    TickResult {
        events: world.take_events(),
        game_over,
    }
}

/// Count down per-player timers.
fn update_timers(world: &mut World) {
    for player in world.players.values_mut() {
        player.bomb_cooldown = player.bomb_cooldown.saturating_sub(1);

        if player.invincible {
            player.flash_ticks = player.flash_ticks.saturating_sub(1);
            if player.flash_ticks == 0 {
                player.invincible = false;
            }
        }
    }
}

/// Count down fuses and detonate expired bombs.
///
/// Bombs detonate in placement order. Each detonation sees the blocks and
/// invincibility left by the ones before it, so stacked bombs on the same
/// tick hit a player once.
fn process_bombs(world: &mut World) {
    let tick = world.tick;
    let mut detonations: Vec<u64> = Vec::new();

    for bomb in world.bombs.values_mut() {
        if bomb.exploded {
            continue;
        }
        bomb.timer = bomb.timer.saturating_sub(1);
        if bomb.timer == 0 {
            detonations.push(bomb.id);
        }
    }

    for bomb_id in detonations {
        let Some(bomb) = world.bombs.get(&bomb_id) else {
            continue;
        };
        let (owner, center) = (bomb.owner, bomb.tile);
        let area = explosion_area(center, world.config.explosion_radius);

        world.push_event(GameEvent::bomb_detonated(tick, owner, bomb_id, area.clone()));
        destroy_blocks(world, &area);
        damage_players(world, &area);

        if let Some(bomb) = world.bombs.get_mut(&bomb_id) {
            bomb.exploded = true;
            bomb.exploded_tick = Some(tick);
            bomb.explosion = area;
        }
    }
}

/// Remove breakable blocks caught in an explosion.
fn destroy_blocks(world: &mut World, area: &[TileCoord]) {
    let tick = world.tick;

    // Explosion tiles are grid-aligned, so overlap means the same tile
    for tile in area {
        if world.breakable.remove(tile) {
            world.push_event(GameEvent::block_destroyed(tick, *tile));
        }
    }
}

/// Apply one hit to every vulnerable player touching the explosion.
fn damage_players(world: &mut World, area: &[TileCoord]) {
    let tick = world.tick;
    let tile_size = world.config.tile_size;
    let size = world.config.player_size;
    let flash = world.config.flash_duration;

    let mut events = Vec::new();
    for player in world.players.values_mut() {
        if !rect_in_explosion(&player.bounds(size), tile_size, area) {
            continue;
        }
        if player.take_hit(flash) {
            events.push(GameEvent::player_damaged(tick, player.id, player.lives));
        }
    }

    for event in events {
        world.push_event(event);
    }
}

/// Drop bombs whose explosion has been visible for one tick.
fn remove_spent_bombs(world: &mut World) {
    let tick = world.tick;
    world.bombs.retain(|_, bomb| match bomb.exploded_tick {
        Some(exploded_at) => exploded_at >= tick,
        None => true,
    });
}

/// Eliminate players whose lives reached zero.
fn process_eliminations(world: &mut World) {
    let tick = world.tick;

    let mut events = Vec::new();
    for player in world.players.values_mut() {
        if player.lives == 0 && !player.eliminated {
            player.eliminated = true;
            events.push(GameEvent::player_eliminated(tick, player.id));
        }
    }

    for event in events {
        world.push_event(event);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::{Direction, Position};
    use crate::game::config::GameConfig;
    use crate::game::events::GameEventData;
    use crate::game::level::LevelGeometry;
    use crate::game::state::PlayerId;

    /// Breakables in the radius-2 plus around (5, 5).
    const PLUS_BREAKABLES: [TileCoord; 8] = [
        TileCoord::new(5, 3),
        TileCoord::new(5, 4),
        TileCoord::new(5, 6),
        TileCoord::new(5, 7),
        TileCoord::new(3, 5),
        TileCoord::new(4, 5),
        TileCoord::new(6, 5),
        TileCoord::new(7, 5),
    ];

    /// Open 15x15 board with spawns at (5, 5) and (12, 12). Breakables fill the
    /// plus around (5, 5), plus (8, 5) out of reach and (6, 6) on the diagonal.
    fn test_world() -> World {
        let level = LevelGeometry::new(15, 15)
            .with_breakable(PLUS_BREAKABLES)
            .with_breakable([TileCoord::new(8, 5), TileCoord::new(6, 6)])
            .with_spawns([TileCoord::new(5, 5), TileCoord::new(12, 12)]);
        World::new(GameConfig::default(), level).unwrap()
    }

    fn run_ticks(world: &mut World, count: u32) -> Vec<GameEvent> {
        (0..count).flat_map(|_| tick(world).events).collect()
    }

    fn detonations(events: &[GameEvent]) -> usize {
        events.iter()
            .filter(|e| matches!(e.data, GameEventData::BombDetonated { .. }))
            .count()
    }

    #[test]
    fn test_tick_counter_advances_without_input() {
        let mut world = test_world();
        run_ticks(&mut world, 10);
        assert_eq!(world.tick, 10);
    }

    #[test]
    fn test_bomb_detonates_after_exactly_timer_ticks() {
        let mut world = test_world();
        let id = PlayerId::new(1);
        world.add_player(id).unwrap();
        world.place_bomb(id).unwrap();

        let before = run_ticks(&mut world, 59);
        assert_eq!(detonations(&before), 0);
        assert_eq!(world.bombs.values().next().unwrap().timer, 1);

        let result = tick(&mut world);
        assert_eq!(detonations(&result.events), 1);
        let bomb = world.bombs.values().next().unwrap();
        assert!(bomb.exploded);
        assert_eq!(bomb.exploded_tick, Some(60));
        assert_eq!(bomb.explosion.len(), 9);

        // Gone one tick later, never detonates twice
        let after = run_ticks(&mut world, 5);
        assert!(world.bombs.is_empty());
        assert_eq!(detonations(&after), 0);
    }

    #[test]
    fn test_explosion_around_five_five() {
        let mut world = test_world();
        let bomber = PlayerId::new(0); // spawns on (5, 5)
        world.add_player(bomber).unwrap();
        world.place_bomb(bomber).unwrap();
        assert_eq!(world.bombs.values().next().unwrap().tile, TileCoord::new(5, 5));

        // Second player standing exactly on (5, 7)
        let victim = PlayerId::new(1);
        world.add_player(victim).unwrap();
        world.players.get_mut(&victim).unwrap().position = Position::new(160, 224);

        let events = run_ticks(&mut world, 60);

        for tile in PLUS_BREAKABLES {
            assert!(!world.breakable.contains(&tile), "{} survived", tile);
        }
        assert!(world.breakable.contains(&TileCoord::new(8, 5)));
        assert!(world.breakable.contains(&TileCoord::new(6, 6)));

        let destroyed: Vec<_> = events.iter()
            .filter_map(|e| match e.data {
                GameEventData::BlockDestroyed { tile } => Some(tile),
                _ => None,
            })
            .collect();
        assert_eq!(destroyed.len(), 8);

        // Both players took exactly one hit
        for id in [bomber, victim] {
            let player = world.get_player(&id).unwrap();
            assert_eq!(player.lives, 2);
            assert!(player.invincible);
            assert_eq!(player.flash_ticks, 30);
        }
    }

    #[test]
    fn test_player_spanning_many_tiles_hit_once() {
        let mut world = test_world();
        let id = PlayerId::new(0);
        world.add_player(id).unwrap();

        // Straddle (5, 5) and (6, 5), both in the plus
        world.players.get_mut(&id).unwrap().position = Position::new(180, 170);
        world.place_bomb(id).unwrap();

        let events = run_ticks(&mut world, 60);
        let hits = events.iter()
            .filter(|e| matches!(e.data, GameEventData::PlayerDamaged { .. }))
            .count();
        assert_eq!(hits, 1);
        assert_eq!(world.get_player(&id).unwrap().lives, 2);
    }

    #[test]
    fn test_stacked_bombs_hit_once() {
        let config = GameConfig {
            bomb_cooldown: 0,
            ..Default::default()
        };
        let level = LevelGeometry::new(10, 10).with_spawns([TileCoord::new(2, 2)]);
        let mut world = World::new(config, level).unwrap();
        let id = PlayerId::new(0);
        world.add_player(id).unwrap();

        world.place_bomb(id).unwrap();
        world.place_bomb(id).unwrap();
        assert_eq!(world.bombs.len(), 2);

        let events = run_ticks(&mut world, 60);
        assert_eq!(detonations(&events), 2);
        assert_eq!(world.get_player(&id).unwrap().lives, 2);
    }

    #[test]
    fn test_invincibility_window() {
        let config = GameConfig {
            bomb_cooldown: 0,
            ..Default::default()
        };
        let level = LevelGeometry::new(10, 10).with_spawns([TileCoord::new(2, 2)]);
        let mut world = World::new(config, level).unwrap();
        let id = PlayerId::new(0);
        world.add_player(id).unwrap();

        // First bomb hits at tick 60
        world.place_bomb(id).unwrap();
        run_ticks(&mut world, 10);
        // Second bomb goes off at tick 70, inside the flash window
        world.place_bomb(id).unwrap();
        run_ticks(&mut world, 60);
        assert_eq!(world.get_player(&id).unwrap().lives, 2);
        assert!(world.get_player(&id).unwrap().invincible);

        // Window closes 30 ticks after the hit
        run_ticks(&mut world, 20);
        assert_eq!(world.tick, 90);
        assert!(!world.get_player(&id).unwrap().invincible);

        world.place_bomb(id).unwrap();
        run_ticks(&mut world, 60);
        assert_eq!(world.get_player(&id).unwrap().lives, 1);
    }

    #[test]
    fn test_flash_counter_expires() {
        let mut world = test_world();
        let id = PlayerId::new(0);
        world.add_player(id).unwrap();
        {
            let player = world.players.get_mut(&id).unwrap();
            player.invincible = true;
            player.flash_ticks = 3;
        }

        run_ticks(&mut world, 2);
        assert!(world.get_player(&id).unwrap().invincible);
        run_ticks(&mut world, 1);
        let player = world.get_player(&id).unwrap();
        assert!(!player.invincible);
        assert_eq!(player.flash_ticks, 0);
    }

    #[test]
    fn test_bomb_cooldown_expires() {
        let mut world = test_world();
        let id = PlayerId::new(0);
        world.add_player(id).unwrap();
        world.place_bomb(id).unwrap();

        run_ticks(&mut world, 59);
        assert!(world.place_bomb(id).is_err());
        run_ticks(&mut world, 1);
        assert!(world.place_bomb(id).is_ok());
    }

    #[test]
    fn test_elimination_and_game_over() {
        let mut world = test_world();
        let id = PlayerId::new(0);
        world.add_player(id).unwrap();
        world.players.get_mut(&id).unwrap().lives = 1;
        world.place_bomb(id).unwrap();

        let events = run_ticks(&mut world, 60);
        let player = world.get_player(&id).unwrap();
        assert_eq!(player.lives, 0);
        assert!(player.eliminated);
        assert!(world.is_game_over());

        let kinds: Vec<_> = events.iter().map(|e| &e.data).collect();
        assert!(kinds.contains(&&GameEventData::PlayerEliminated { player_id: id }));
        assert_eq!(kinds.last(), Some(&&GameEventData::GameOver));

        // Eliminated players stay in the world and ignore commands
        assert!(world.apply_movement(id, Direction::Up).is_err());

        // Game over is announced once
        let later = run_ticks(&mut world, 10);
        assert!(later.iter().all(|e| e.data != GameEventData::GameOver));
        assert!(tick(&mut world).game_over);
    }

    #[test]
    fn test_restart_after_game_over() {
        let mut world = test_world();
        let id = PlayerId::new(0);
        world.add_player(id).unwrap();
        world.players.get_mut(&id).unwrap().lives = 1;
        world.place_bomb(id).unwrap();
        run_ticks(&mut world, 61);
        assert!(world.is_game_over());

        world.restart().unwrap();
        let result = tick(&mut world);
        assert!(!result.game_over);
        assert!(result.events.iter().any(|e| e.data == GameEventData::MatchRestarted));
        assert_eq!(world.breakable.len(), 10);
        assert_eq!(world.get_player(&id).unwrap().lives, 3);
    }

    #[test]
    fn test_tick_determinism() {
        let script = |world: &mut World| {
            let a = PlayerId::new(0);
            let b = PlayerId::new(1);
            world.add_player(a).unwrap();
            world.add_player(b).unwrap();
            for i in 0..200u32 {
                match i % 7 {
                    0 => { let _ = world.place_bomb(a); }
                    1 => { let _ = world.apply_movement(a, Direction::Right); }
                    2 => { let _ = world.apply_movement(b, Direction::Up); }
                    3 => { let _ = world.place_bomb(b); }
                    _ => {}
                }
                tick(world);
            }
            world.compute_hash()
        };

        let mut w1 = test_world();
        let mut w2 = test_world();
        assert_eq!(script(&mut w1), script(&mut w2));
    }
}
