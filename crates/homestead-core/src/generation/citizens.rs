//! Starting roster generation

use hecs::{Entity, World};
use homestead_logic::grid::{TileGrid, TilePos};
use homestead_logic::skills::WorkSkills;
use rand::Rng;

use super::names::generate_name;
use crate::components::{Citizen, CitizenId, CitizenState, Position, WorkPreferences};

/// Spawn the starting citizens on walkable tiles near `around`.
///
/// Ids are handed out from `first_id` upward; returns the spawned entities
/// paired with the next unused id.
pub fn generate_citizens(
    world: &mut World,
    grid: &TileGrid,
    count: u32,
    around: TilePos,
    first_id: u32,
    rng: &mut impl Rng,
) -> (Vec<Entity>, u32) {
    let spawn_tiles = walkable_near(grid, around, 6);
    let mut entities = Vec::with_capacity(count as usize);
    let mut next_id = first_id;

    for _ in 0..count {
        let tile = if spawn_tiles.is_empty() {
            around
        } else {
            spawn_tiles[rng.gen_range(0..spawn_tiles.len())]
        };

        let skills = WorkSkills::new(
            rng.gen_range(0..=10),
            rng.gen_range(0..=10),
            rng.gen_range(0..=10),
        );

        let entity = world.spawn((
            Citizen::new(CitizenId(next_id)),
            generate_name(rng),
            Position::at_tile(tile),
            CitizenState::Idle,
            skills,
            WorkPreferences::default(),
        ));
        entities.push(entity);
        next_id += 1;
    }

    (entities, next_id)
}

/// Walkable tiles within a square radius, in scan order for determinism.
fn walkable_near(grid: &TileGrid, around: TilePos, radius: i32) -> Vec<TilePos> {
    let mut tiles = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let pos = TilePos::new(around.x + dx, around.y + dy);
            if grid.is_walkable(pos) {
                tiles.push(pos);
            }
        }
    }
    tiles
}
