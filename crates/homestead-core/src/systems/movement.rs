//! Movement system - walks entities along their paths one waypoint at a time.

use std::collections::HashMap;

use hecs::World;
use homestead_logic::grid::{TileGrid, TilePos};
use homestead_logic::pathfinding::PathPlanner;
use log::debug;

use crate::components::{Movement, Position, Vec2};

/// Ticks an agent waits at a blocked waypoint before re-planning.
pub const BLOCKED_WAIT_TICKS: u32 = 3;

/// Speed factor while stepping onto a tile occupied by another citizen.
pub const OCCUPIED_SLOWDOWN: f32 = 0.5;

/// Count citizens per tile; movement through occupied tiles is allowed but
/// slowed.
pub fn occupancy_map(world: &World) -> HashMap<TilePos, u32> {
    let mut map = HashMap::new();
    for (_, pos) in world.query::<&Position>().iter() {
        *map.entry(pos.tile()).or_insert(0) += 1;
    }
    map
}

/// Advance every moving entity. Consumes at most one waypoint per entity per
/// tick. Waypoints that lost walkability mid-route cause a short wait, then a
/// re-plan; a failed re-plan flags the movement for cancellation.
pub fn movement_system(
    world: &mut World,
    grid: &TileGrid,
    planner: &mut PathPlanner,
    occupancy: &HashMap<TilePos, u32>,
    delta_seconds: f32,
) {
    let mut updates: Vec<(hecs::Entity, Position, Option<Movement>)> = Vec::with_capacity(64);

    for (entity, (pos, movement)) in world.query::<(&Position, &Movement)>().iter() {
        let (new_pos, new_movement) =
            process_movement(pos, movement, grid, planner, occupancy, delta_seconds);
        updates.push((entity, new_pos, new_movement));
    }

    for (entity, new_pos, new_movement) in updates {
        if let Ok(mut pos) = world.get::<&mut Position>(entity) {
            *pos = new_pos;
        }
        match new_movement {
            Some(m) => {
                if let Ok(mut movement) = world.get::<&mut Movement>(entity) {
                    *movement = m;
                }
            }
            None => {
                // Arrived - the controller picks the entity up next phase.
                let _ = world.remove_one::<Movement>(entity);
            }
        }
    }
}

/// Step one entity. Returns the new position and `None` once the path is
/// fully consumed.
fn process_movement(
    pos: &Position,
    movement: &Movement,
    grid: &TileGrid,
    planner: &mut PathPlanner,
    occupancy: &HashMap<TilePos, u32>,
    delta_seconds: f32,
) -> (Position, Option<Movement>) {
    let mut movement = movement.clone();
    if movement.failed {
        return (*pos, Some(movement));
    }

    // Skip waypoints already reached (the first is the source tile).
    while let Some(wp) = movement.path.current() {
        if pos.tile() == wp && pos.0.distance(&Vec2::from_tile(wp)) < 0.01 {
            movement.path.advance();
        } else {
            break;
        }
    }

    let Some(waypoint) = movement.path.current() else {
        return (*pos, None);
    };

    if !grid.is_walkable(waypoint) {
        movement.blocked_ticks += 1;
        if movement.blocked_ticks > BLOCKED_WAIT_TICKS {
            // Waiting did not help; plan a fresh route around the blockage.
            let destination = movement.path.destination();
            match planner.find_path(grid, pos.tile(), destination) {
                Some(path) => {
                    debug!("re-planned around blocked tile {:?}", waypoint);
                    movement.path = path;
                    movement.blocked_ticks = 0;
                }
                None => {
                    movement.failed = true;
                }
            }
        }
        return (*pos, Some(movement));
    }

    let target = Vec2::from_tile(waypoint);
    let distance = pos.0.distance(&target);

    // Another citizen on the tile slows passage but never forbids it.
    let others_there = {
        let count = occupancy.get(&waypoint).copied().unwrap_or(0);
        let own = u32::from(pos.tile() == waypoint);
        count.saturating_sub(own)
    };
    let speed = if others_there > 0 {
        movement.speed * OCCUPIED_SLOWDOWN
    } else {
        movement.speed
    };

    let step = speed * delta_seconds;
    if step >= distance {
        // One waypoint per tick, even if the step had distance to spare.
        movement.path.advance();
        movement.blocked_ticks = 0;
        let arrived = movement.path.is_finished();
        let new_pos = Position(target);
        if arrived {
            (new_pos, None)
        } else {
            (new_pos, Some(movement))
        }
    } else {
        let direction = (target - pos.0).normalize();
        (Position(pos.0 + direction * step), Some(movement))
    }
}
