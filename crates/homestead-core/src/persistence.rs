//! Save/Load functionality for persisting simulation state
//!
//! Uses bincode for efficient binary serialization of the entire simulation:
//! the grid, the planner's component cache, all three ledgers, and every
//! citizen with its components. A load resumes the run deterministically.

use std::io::{Read, Write};

use hecs::World;
use homestead_logic::grid::TileGrid;
use homestead_logic::pathfinding::PathPlanner;
use homestead_logic::skills::WorkSkills;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::components::{
    Assignment, Carried, Citizen, CitizenState, Movement, Name, Position, WorkPreferences,
};
use crate::engine::SimulationEngine;

/// Version number for save file format (increment when format changes)
const SAVE_VERSION: u32 = 1;

/// Errors that can occur during save/load
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Encoding(#[from] Box<bincode::ErrorKind>),
    #[error("save version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Serializable snapshot of the full simulation state
#[derive(Serialize, Deserialize)]
struct SaveData {
    version: u32,
    seed: u64,
    sim_time: f64,
    time_scale: f32,
    paused: bool,
    next_citizen_id: u32,
    grid: TileGrid,
    planner: PathPlanner,
    ledger: crate::systems::ConstructionLedger,
    registry: crate::systems::ResourceRegistry,
    stockpile: crate::systems::Stockpile,
    citizens: Vec<SerializableCitizen>,
}

/// All possible components of a citizen entity, serialized as optionals
#[derive(Serialize, Deserialize, Default)]
struct SerializableCitizen {
    citizen: Option<Citizen>,
    name: Option<Name>,
    position: Option<Position>,
    state: Option<CitizenState>,
    skills: Option<WorkSkills>,
    preferences: Option<WorkPreferences>,
    carried: Option<Carried>,
    movement: Option<Movement>,
    assignment: Option<Assignment>,
}

/// Extract all citizens from a world into serializable form, in id order.
fn serialize_entities(world: &World) -> Vec<SerializableCitizen> {
    let mut citizens = Vec::new();

    for entity_ref in world.iter() {
        let mut sc = SerializableCitizen::default();

        if let Some(c) = entity_ref.get::<&Citizen>() {
            sc.citizen = Some(*c);
        }
        if let Some(c) = entity_ref.get::<&Name>() {
            sc.name = Some((*c).clone());
        }
        if let Some(c) = entity_ref.get::<&Position>() {
            sc.position = Some(*c);
        }
        if let Some(c) = entity_ref.get::<&CitizenState>() {
            sc.state = Some(*c);
        }
        if let Some(c) = entity_ref.get::<&WorkSkills>() {
            sc.skills = Some(*c);
        }
        if let Some(c) = entity_ref.get::<&WorkPreferences>() {
            sc.preferences = Some(*c);
        }
        if let Some(c) = entity_ref.get::<&Carried>() {
            sc.carried = Some(*c);
        }
        if let Some(c) = entity_ref.get::<&Movement>() {
            sc.movement = Some((*c).clone());
        }
        if let Some(c) = entity_ref.get::<&Assignment>() {
            sc.assignment = Some(*c);
        }

        citizens.push(sc);
    }

    citizens.sort_by_key(|sc| sc.citizen.map(|c| c.id));
    citizens
}

/// Spawn a citizen entity with all its saved components
fn spawn_entity(world: &mut World, sc: SerializableCitizen) {
    let entity = world.spawn(());

    if let Some(c) = sc.citizen {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = sc.name {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = sc.position {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = sc.state {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = sc.skills {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = sc.preferences {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = sc.carried {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = sc.movement {
        let _ = world.insert_one(entity, c);
    }
    if let Some(c) = sc.assignment {
        let _ = world.insert_one(entity, c);
    }
}

/// Save the complete simulation to a writer
pub fn save_simulation<W: Write>(writer: W, engine: &SimulationEngine) -> Result<(), SaveError> {
    let save_data = SaveData {
        version: SAVE_VERSION,
        seed: engine.seed,
        sim_time: engine.sim_time,
        time_scale: engine.time_scale,
        paused: engine.paused,
        next_citizen_id: engine.next_citizen_id,
        grid: engine.grid.clone(),
        planner: engine.planner.clone(),
        ledger: engine.ledger.clone(),
        registry: engine.registry.clone(),
        stockpile: engine.stockpile.clone(),
        citizens: serialize_entities(&engine.world),
    };

    bincode::serialize_into(writer, &save_data)?;
    Ok(())
}

/// Load a simulation from a reader
pub fn load_simulation<R: Read>(reader: R) -> Result<SimulationEngine, SaveError> {
    let save_data: SaveData = bincode::deserialize_from(reader)?;

    if save_data.version != SAVE_VERSION {
        return Err(SaveError::VersionMismatch {
            expected: SAVE_VERSION,
            found: save_data.version,
        });
    }

    let mut world = World::new();
    for sc in save_data.citizens {
        spawn_entity(&mut world, sc);
    }

    Ok(SimulationEngine {
        world,
        grid: save_data.grid,
        planner: save_data.planner,
        ledger: save_data.ledger,
        registry: save_data.registry,
        stockpile: save_data.stockpile,
        sim_time: save_data.sim_time,
        time_scale: save_data.time_scale,
        paused: save_data.paused,
        next_citizen_id: save_data.next_citizen_id,
        seed: save_data.seed,
    })
}
