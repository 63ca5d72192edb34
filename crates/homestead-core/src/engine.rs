//! Simulation engine - main entry point for running the colony simulation.

use hecs::World;
use homestead_logic::catalog::{BuildingKind, Material, ResourceKind};
use homestead_logic::grid::{Rect, TerrainKind, TileGrid, TilePos};
use homestead_logic::pathfinding::PathPlanner;
use homestead_logic::skills::WorkSkills;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;

use crate::components::{
    Assignment, BuildingId, Citizen, CitizenId, CitizenState, Name, NodeId, Position,
    WorkPreferences,
};
use crate::generation::{
    generate_citizens, generate_nodes, generate_terrain, map_center, wagon_footprint, WorldConfig,
};
use crate::persistence::{self, SaveError};
use crate::snapshot::WorldSnapshot;
use crate::systems::{
    assign_work, movement_system, occupancy_map, perform_actions, release_task_claims,
    validate_targets, ConstructionLedger, ResourceRegistry, Stockpile, TickContext,
};

/// Why a building could not be placed. No simulation state changes when
/// placement fails.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlacementError {
    #[error("footprint extends outside the map")]
    OutOfBounds,
    #[error("terrain at {0:?} cannot support a building")]
    UnbuildableTerrain(TilePos),
    #[error("footprint overlaps an existing structure at {0:?}")]
    Occupied(TilePos),
}

/// Main simulation engine.
///
/// Owns the citizen world, the terrain grid, the path planner's connectivity
/// cache, and the three shared ledgers. All player/UI commands and the tick
/// loop go through here - there is no ambient global state.
pub struct SimulationEngine {
    /// ECS world containing the citizens
    pub world: World,
    pub(crate) grid: TileGrid,
    pub(crate) planner: PathPlanner,
    pub(crate) ledger: ConstructionLedger,
    pub(crate) registry: ResourceRegistry,
    pub(crate) stockpile: Stockpile,
    pub(crate) sim_time: f64,
    pub(crate) time_scale: f32,
    pub(crate) paused: bool,
    pub(crate) next_citizen_id: u32,
    pub(crate) seed: u64,
}

impl SimulationEngine {
    /// Generate a fresh world from `config`. Equal configs produce equal
    /// worlds, tick for tick.
    pub fn new(config: WorldConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);

        let mut grid = generate_terrain(&config, &mut rng);

        let wagon_rect = wagon_footprint(&config);
        let mut ledger = ConstructionLedger::new();
        ledger.register(BuildingKind::Wagon, TilePos::new(wagon_rect.x, wagon_rect.y));
        grid.set_blocked(wagon_rect, true);

        let mut registry = ResourceRegistry::new();
        for (kind, pos) in generate_nodes(&config, &grid, &mut rng) {
            registry.insert(kind, pos);
        }

        let planner = PathPlanner::new(&grid);

        let mut stockpile = Stockpile::new(wagon_rect);
        stockpile.set_stock(Material::Wood, config.starting_wood);
        stockpile.set_stock(Material::Stone, config.starting_stone);
        stockpile.set_stock(Material::Food, config.starting_food);

        let mut world = World::new();
        let (_, next_citizen_id) = generate_citizens(
            &mut world,
            &grid,
            config.starting_citizens,
            map_center(&config),
            1,
            &mut rng,
        );

        info!(
            "world generated: {}x{}, seed {}, {} citizens, {} nodes",
            config.width,
            config.height,
            config.seed,
            config.starting_citizens,
            registry.len()
        );

        Self {
            world,
            grid,
            planner,
            ledger,
            registry,
            stockpile,
            sim_time: 0.0,
            time_scale: 1.0,
            paused: false,
            next_citizen_id,
            seed: config.seed,
        }
    }

    /// Advance the simulation by `delta_seconds` of wall time.
    ///
    /// Phase order is fixed and mutations run in ascending citizen id, so a
    /// run is reproducible from its seed: cancel invalidated work, assign
    /// new work, move, act.
    pub fn update(&mut self, delta_seconds: f32) {
        if self.paused {
            return;
        }
        let dt = delta_seconds * self.time_scale;
        if dt <= 0.0 {
            return;
        }
        self.sim_time += dt as f64;

        let Self {
            world,
            grid,
            planner,
            ledger,
            registry,
            stockpile,
            ..
        } = self;
        let mut ctx = TickContext {
            grid: &*grid,
            planner,
            ledger,
            registry,
            stockpile,
        };

        validate_targets(world, &mut ctx);
        assign_work(world, &mut ctx);
        let occupancy = occupancy_map(world);
        movement_system(world, ctx.grid, &mut *ctx.planner, &occupancy, dt);
        perform_actions(world, &mut ctx, dt);
    }

    // ---- player / UI commands -------------------------------------------

    /// Place a building plan. The footprint must be fully on buildable,
    /// unoccupied terrain; on success the tiles are blocked and the
    /// planner's connectivity cache is refreshed before the next tick.
    pub fn place_building(
        &mut self,
        kind: BuildingKind,
        origin: TilePos,
    ) -> Result<BuildingId, PlacementError> {
        let spec = kind.spec();
        let footprint = Rect::new(origin.x, origin.y, spec.width, spec.height);

        for pos in footprint.tiles() {
            let tile = self.grid.tile(pos).ok_or(PlacementError::OutOfBounds)?;
            if tile.blocked {
                return Err(PlacementError::Occupied(pos));
            }
            if !tile.terrain.is_buildable() {
                return Err(PlacementError::UnbuildableTerrain(pos));
            }
        }

        let id = self.ledger.register(kind, origin);
        self.grid.set_blocked(footprint, true);
        self.planner.update_region(&self.grid, footprint);
        Ok(id)
    }

    /// Tear down a building (or cancel a plan). Frees its tiles and lets
    /// any citizen working on it cancel on the next tick.
    pub fn remove_building(&mut self, id: BuildingId) -> bool {
        match self.ledger.remove(id) {
            Some(site) => {
                let footprint = site.footprint();
                self.grid.set_blocked(footprint, false);
                self.planner.update_region(&self.grid, footprint);
                true
            }
            None => false,
        }
    }

    /// Mark every matching node in `area` for gathering.
    pub fn designate_region(&mut self, area: Rect, kind: Option<ResourceKind>) -> usize {
        self.registry.designate_region(area, kind)
    }

    /// Clear gathering designations over `area`.
    pub fn cancel_designation(&mut self, area: Rect) {
        self.registry.undesignate_region(area)
    }

    /// Clear one node's designation.
    pub fn cancel_node_designation(&mut self, id: NodeId) {
        self.registry.undesignate(id)
    }

    /// Change terrain (the terrain collaborator's mutation entry point).
    /// The planner cache is updated synchronously.
    pub fn set_terrain(&mut self, pos: TilePos, terrain: TerrainKind) {
        self.grid.set_terrain(pos, terrain);
        self.planner.update_region(&self.grid, Rect::single(pos));
    }

    /// Notification that an external collaborator mutated tiles in `area`.
    pub fn notify_terrain_changed(&mut self, area: Rect) {
        self.planner.update_region(&self.grid, area);
    }

    /// Add a citizen to the colony.
    pub fn spawn_citizen(&mut self, name: Name, skills: WorkSkills, tile: TilePos) -> CitizenId {
        let id = CitizenId(self.next_citizen_id);
        self.next_citizen_id += 1;
        info!("{} ({}) joined the colony", id, name.full_name());
        self.world.spawn((
            Citizen::new(id),
            name,
            Position::at_tile(tile),
            CitizenState::Idle,
            skills,
            WorkPreferences::default(),
        ));
        id
    }

    /// Remove a citizen, releasing any lock or claim it held.
    pub fn remove_citizen(&mut self, id: CitizenId) -> bool {
        let entity = {
            let mut query = self.world.query::<&Citizen>();
            query.iter().find(|(_, c)| c.id == id).map(|(e, _)| e)
        };
        let Some(entity) = entity else {
            return false;
        };

        let task = self.world.get::<&Assignment>(entity).ok().map(|a| a.task);
        if let Some(task) = task {
            let Self {
                grid,
                planner,
                ledger,
                registry,
                stockpile,
                ..
            } = self;
            let mut ctx = TickContext {
                grid: &*grid,
                planner,
                ledger,
                registry,
                stockpile,
            };
            release_task_claims(&mut ctx, id, task);
        }

        let _ = self.world.despawn(entity);
        info!("{} left the colony", id);
        true
    }

    // ---- read access -----------------------------------------------------

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn planner(&self) -> &PathPlanner {
        &self.planner
    }

    pub fn ledger(&self) -> &ConstructionLedger {
        &self.ledger
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn stockpile(&self) -> &Stockpile {
        &self.stockpile
    }

    /// Simulation time in seconds.
    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn citizen_count(&self) -> usize {
        self.world.query::<&Citizen>().iter().count()
    }

    /// Read-only view of the whole simulation for renderers and UI.
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot::capture(self)
    }

    // ---- pacing ----------------------------------------------------------

    /// Set time scale (1.0 = real-time, 2.0 = 2x speed, etc.)
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    // ---- persistence -----------------------------------------------------

    /// Save the complete simulation state to a writer.
    pub fn save<W: std::io::Write>(&self, writer: W) -> Result<(), SaveError> {
        persistence::save_simulation(writer, self)
    }

    /// Restore a simulation previously written with [`save`](Self::save).
    pub fn load<R: std::io::Read>(reader: R) -> Result<Self, SaveError> {
        persistence::load_simulation(reader)
    }
}
