//! Agent controller - target validation, arrival transitions, and action work.
//!
//! Runs in two phases per tick: `validate_targets` at the very start of the
//! tick (before scheduling and movement) cancels any assignment whose target
//! was invalidated externally; `perform_actions` after movement handles
//! arrivals and accumulates action progress.

use hecs::{Entity, World};
use homestead_logic::skills::{WorkCategory, WorkSkills};
use log::{debug, info, warn};

use super::TickContext;
use crate::components::{
    Assignment, Carried, Citizen, CitizenState, Movement, Position, Task,
};

/// Construction work units applied per second at skill level 0.
pub const BUILD_RATE: f32 = 10.0;

/// Practice granted per completed harvest.
const GATHER_XP: f32 = 10.0;

struct CitizenRow {
    entity: Entity,
    citizen: Citizen,
    state: CitizenState,
    assignment: Assignment,
    position: Position,
    skills: WorkSkills,
    carried: Option<Carried>,
    moving: bool,
    movement_failed: bool,
}

/// Snapshot every assigned citizen, in ascending id order so mutations apply
/// deterministically.
fn collect_rows(world: &World) -> Vec<CitizenRow> {
    let mut rows: Vec<CitizenRow> = world
        .query::<(
            &Citizen,
            &CitizenState,
            &Assignment,
            &Position,
            &WorkSkills,
            Option<&Carried>,
            Option<&Movement>,
        )>()
        .iter()
        .map(
            |(entity, (citizen, state, assignment, position, skills, carried, movement))| {
                CitizenRow {
                    entity,
                    citizen: *citizen,
                    state: *state,
                    assignment: *assignment,
                    position: *position,
                    skills: *skills,
                    carried: carried.copied(),
                    moving: movement.is_some(),
                    movement_failed: movement.map(|m| m.failed).unwrap_or(false),
                }
            },
        )
        .collect();
    rows.sort_by_key(|row| row.citizen.id);
    rows
}

/// Deferred world mutations for one citizen, applied after the scan.
enum Apply {
    State(CitizenState),
    Assignment(Assignment),
    ClearAssignment,
    Carried(Carried),
    ClearCarried,
    Movement(Movement),
    Skills(WorkSkills),
}

fn apply_ops(world: &mut World, entity: Entity, ops: Vec<Apply>) {
    for op in ops {
        match op {
            Apply::State(state) => {
                if let Ok(mut slot) = world.get::<&mut CitizenState>(entity) {
                    *slot = state;
                }
            }
            Apply::Assignment(assignment) => {
                let _ = world.insert_one(entity, assignment);
            }
            Apply::ClearAssignment => {
                let _ = world.remove_one::<Assignment>(entity);
            }
            Apply::Carried(carried) => {
                let _ = world.insert_one(entity, carried);
            }
            Apply::ClearCarried => {
                let _ = world.remove_one::<Carried>(entity);
            }
            Apply::Movement(movement) => {
                let _ = world.insert_one(entity, movement);
            }
            Apply::Skills(skills) => {
                let _ = world.insert_one(entity, skills);
            }
        }
    }
}

/// Cancel at the start of every tick any assignment whose target was
/// invalidated since it was taken: node depleted or undesignated by someone
/// else, building removed or finished by other hands, or a route that could
/// not be re-planned. Carried goods are dropped where the citizen stands;
/// locks and claims are released. The citizen is back to Idle this tick.
pub fn validate_targets(world: &mut World, ctx: &mut TickContext) {
    let mut cancels: Vec<Entity> = Vec::new();

    for row in collect_rows(world) {
        let valid = !row.movement_failed && target_valid(&row, ctx);
        if !valid {
            release_task_claims(ctx, row.citizen.id, row.assignment.task);
            if let Some(carried) = row.carried {
                info!(
                    "{} dropped {} {:?} at {:?}",
                    row.citizen.id,
                    carried.amount,
                    carried.material,
                    row.position.tile()
                );
            }
            debug!("{} assignment cancelled", row.citizen.id);
            cancels.push(row.entity);
        }
    }

    for entity in cancels {
        let _ = world.remove_one::<Carried>(entity);
        let _ = world.remove_one::<Movement>(entity);
        let _ = world.remove_one::<Assignment>(entity);
        if let Ok(mut state) = world.get::<&mut CitizenState>(entity) {
            *state = CitizenState::Idle;
        }
    }
}

fn target_valid(row: &CitizenRow, ctx: &TickContext) -> bool {
    let me = row.citizen.id;
    match row.assignment.task {
        Task::Gather {
            node,
            returning: false,
        } => ctx
            .registry
            .node(node)
            .map(|n| n.designated && !n.depleted && n.locked_by == Some(me))
            .unwrap_or(false),
        // The return leg only needs the stockpile, which always exists.
        Task::Gather { returning: true, .. } => true,
        Task::Haul { site, material, .. } => ctx
            .ledger
            .site(site)
            .map(|s| {
                s.state == super::BuildingState::Planned && s.hauler(material) == Some(me)
            })
            .unwrap_or(false),
        Task::Build { site } => ctx
            .ledger
            .site(site)
            .map(|s| s.state == super::BuildingState::UnderConstruction && s.has_builder(me))
            .unwrap_or(false),
    }
}

/// Release whatever lock, haul slot, or builder slot a task holds for `me`.
/// Safe to call on tasks that no longer hold anything.
pub(crate) fn release_task_claims(
    ctx: &mut TickContext,
    me: crate::components::CitizenId,
    task: Task,
) {
    match task {
        Task::Gather { node, returning } => {
            if !returning
                && ctx
                    .registry
                    .node(node)
                    .map(|n| n.locked_by == Some(me))
                    .unwrap_or(false)
            {
                ctx.registry.release(node);
            }
        }
        Task::Haul { site, material, .. } => ctx.ledger.release_haul(site, material, me),
        Task::Build { site } => ctx.ledger.remove_builder(site, me),
    }
}

/// Handle arrivals and accumulate action work. Runs after the movement
/// system, so a citizen whose path finished this tick transitions into its
/// action state here.
pub fn perform_actions(world: &mut World, ctx: &mut TickContext, delta_seconds: f32) {
    let mut applies: Vec<(Entity, Vec<Apply>)> = Vec::new();

    for row in collect_rows(world) {
        let mut ops = Vec::new();
        if row.state == CitizenState::MovingToTarget && !row.moving {
            handle_arrival(&row, ctx, &mut ops);
        } else {
            match row.state {
                CitizenState::Gathering => gather_work(&row, ctx, delta_seconds, &mut ops),
                CitizenState::Building => build_work(&row, ctx, delta_seconds, &mut ops),
                CitizenState::Hauling => deliver(&row, ctx, &mut ops),
                _ => {}
            }
        }
        if !ops.is_empty() {
            applies.push((row.entity, ops));
        }
    }

    for (entity, ops) in applies {
        apply_ops(world, entity, ops);
    }
}

fn handle_arrival(row: &CitizenRow, ctx: &mut TickContext, ops: &mut Vec<Apply>) {
    match row.assignment.task {
        Task::Gather {
            returning: false, ..
        } => {
            ops.push(Apply::Assignment(Assignment {
                task: row.assignment.task,
                work_timer: 0.0,
            }));
            ops.push(Apply::State(CitizenState::Gathering));
        }
        Task::Gather {
            returning: true, ..
        } => {
            if let Some(carried) = row.carried {
                if ctx.stockpile.deposit(carried.material, carried.amount) {
                    info!(
                        "{} deposited {} {:?} (stored {}/{})",
                        row.citizen.id,
                        carried.amount,
                        carried.material,
                        ctx.stockpile.total_stored(),
                        ctx.stockpile.capacity()
                    );
                } else {
                    // Storage full: the load is dropped where the citizen
                    // stands and the task ends.
                    warn!(
                        "{} dropped {} {:?} at {:?} - storage full",
                        row.citizen.id,
                        carried.amount,
                        carried.material,
                        row.position.tile()
                    );
                }
                ops.push(Apply::ClearCarried);
            }
            ops.push(Apply::ClearAssignment);
            ops.push(Apply::State(CitizenState::Idle));
        }
        Task::Haul {
            site,
            material,
            picked_up: false,
        } => pick_up(row, site, material, ctx, ops),
        Task::Haul {
            picked_up: true, ..
        } => {
            ops.push(Apply::State(CitizenState::Hauling));
        }
        Task::Build { .. } => {
            ops.push(Apply::State(CitizenState::Building));
        }
    }
}

/// At the stockpile: load up and head for the construction site.
fn pick_up(
    row: &CitizenRow,
    site: crate::components::BuildingId,
    material: homestead_logic::catalog::Material,
    ctx: &mut TickContext,
    ops: &mut Vec<Apply>,
) {
    let me = row.citizen.id;
    let outstanding = ctx
        .ledger
        .site(site)
        .map(|s| s.outstanding(material))
        .unwrap_or(0);
    let want = row.citizen.carry_capacity.min(outstanding);
    let taken = ctx.stockpile.withdraw(material, want);

    if taken == 0 {
        ctx.ledger.release_haul(site, material, me);
        ops.push(Apply::ClearAssignment);
        ops.push(Apply::State(CitizenState::Idle));
        return;
    }

    let Some(footprint) = ctx.ledger.site(site).map(|s| s.footprint()) else {
        let _ = ctx.stockpile.deposit(material, taken);
        ops.push(Apply::ClearAssignment);
        ops.push(Apply::State(CitizenState::Idle));
        return;
    };
    match ctx
        .planner
        .find_path_to_rect(ctx.grid, row.position.tile(), footprint)
    {
        Some(path) => {
            debug!("{} picked up {} {:?} for {}", me, taken, material, site);
            ops.push(Apply::Carried(Carried {
                material,
                amount: taken,
            }));
            ops.push(Apply::Assignment(Assignment::new(Task::Haul {
                site,
                material,
                picked_up: true,
            })));
            ops.push(Apply::Movement(Movement::new(path, row.citizen.move_speed)));
        }
        None => {
            // The site became unreachable between scheduling and pickup.
            let _ = ctx.stockpile.deposit(material, taken);
            ctx.ledger.release_haul(site, material, me);
            ops.push(Apply::ClearAssignment);
            ops.push(Apply::State(CitizenState::Idle));
        }
    }
}

/// At the site with a load: deliver, release the slot, go idle.
fn deliver(row: &CitizenRow, ctx: &mut TickContext, ops: &mut Vec<Apply>) {
    let Task::Haul { site, material, .. } = row.assignment.task else {
        return;
    };
    let me = row.citizen.id;

    let Some(carried) = row.carried else {
        ctx.ledger.release_haul(site, material, me);
        ops.push(Apply::ClearAssignment);
        ops.push(Apply::State(CitizenState::Idle));
        return;
    };

    let accepted = ctx.ledger.deliver(site, material, carried.amount);
    if accepted < carried.amount {
        let _ = ctx.stockpile.deposit(material, carried.amount - accepted);
    }
    info!("{} delivered {} {:?} to {}", me, accepted, material, site);

    ctx.ledger.release_haul(site, material, me);

    let mut skills = row.skills;
    skills.practice(WorkCategory::Hauling, accepted as f32);
    ops.push(Apply::Skills(skills));
    ops.push(Apply::ClearCarried);
    ops.push(Apply::ClearAssignment);
    ops.push(Apply::State(CitizenState::Idle));
}

/// Stationary at the node: run the harvest timer, then carry the yield home.
fn gather_work(row: &CitizenRow, ctx: &mut TickContext, delta_seconds: f32, ops: &mut Vec<Apply>) {
    let Task::Gather {
        node,
        returning: false,
    } = row.assignment.task
    else {
        return;
    };
    let me = row.citizen.id;

    let harvest_secs = match ctx.registry.node(node) {
        Some(n) => n.kind.spec().harvest_secs,
        None => return,
    };

    let mut assignment = row.assignment;
    assignment.work_timer +=
        delta_seconds * row.skills.speed_multiplier(WorkCategory::Gathering);

    if assignment.work_timer < harvest_secs {
        ops.push(Apply::Assignment(assignment));
        return;
    }

    match ctx.registry.harvest(node) {
        Some((material, amount)) => {
            // Depletion already released the lock; otherwise the trip is
            // over and the node goes back on the market.
            if ctx
                .registry
                .node(node)
                .map(|n| n.locked_by == Some(me))
                .unwrap_or(false)
            {
                ctx.registry.release(node);
            }

            let mut skills = row.skills;
            skills.practice(WorkCategory::Gathering, GATHER_XP);
            ops.push(Apply::Skills(skills));

            info!("{} harvested {} {:?} from {}", me, amount, material, node);

            let dropoff = ctx.stockpile.dropoff();
            match ctx
                .planner
                .find_path_to_rect(ctx.grid, row.position.tile(), dropoff)
            {
                Some(path) => {
                    ops.push(Apply::Carried(Carried { material, amount }));
                    ops.push(Apply::Assignment(Assignment::new(Task::Gather {
                        node,
                        returning: true,
                    })));
                    ops.push(Apply::Movement(Movement::new(path, row.citizen.move_speed)));
                    ops.push(Apply::State(CitizenState::MovingToTarget));
                }
                None => {
                    warn!(
                        "{} cannot reach the stockpile, dropped {} {:?}",
                        me, amount, material
                    );
                    ops.push(Apply::ClearAssignment);
                    ops.push(Apply::State(CitizenState::Idle));
                }
            }
        }
        None => {
            ops.push(Apply::ClearAssignment);
            ops.push(Apply::State(CitizenState::Idle));
        }
    }
}

/// Stationary at the site: apply skill-weighted construction work.
fn build_work(row: &CitizenRow, ctx: &mut TickContext, delta_seconds: f32, ops: &mut Vec<Apply>) {
    let Task::Build { site } = row.assignment.task else {
        return;
    };

    let storage_bonus = match ctx.ledger.site(site) {
        Some(s) => s.kind.spec().storage_bonus,
        None => return,
    };

    let work = BUILD_RATE * row.skills.speed_multiplier(WorkCategory::Building) * delta_seconds;
    let completed = ctx.ledger.apply_work(site, work);

    let mut skills = row.skills;
    skills.practice(WorkCategory::Building, work);
    ops.push(Apply::Skills(skills));

    if completed {
        if storage_bonus > 0 {
            ctx.stockpile.add_capacity_bonus(storage_bonus);
            info!("storage capacity raised to {}", ctx.stockpile.capacity());
        }
        ops.push(Apply::ClearAssignment);
        ops.push(Apply::State(CitizenState::Idle));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{CitizenId, Name, WorkPreferences};
    use crate::systems::{ConstructionLedger, ResourceRegistry, Stockpile};
    use homestead_logic::catalog::{BuildingKind, Material, ResourceKind};
    use homestead_logic::grid::{Rect, TerrainKind, TileGrid, TilePos};
    use homestead_logic::pathfinding::PathPlanner;

    struct Fixture {
        world: World,
        grid: TileGrid,
        planner: PathPlanner,
        ledger: ConstructionLedger,
        registry: ResourceRegistry,
        stockpile: Stockpile,
    }

    impl Fixture {
        fn new() -> Self {
            let mut grid = TileGrid::filled(20, 20, TerrainKind::Grass);
            let dropoff = Rect::new(0, 0, 2, 2);
            grid.set_blocked(dropoff, true);
            let planner = PathPlanner::new(&grid);
            Self {
                world: World::new(),
                grid,
                planner,
                ledger: ConstructionLedger::new(),
                registry: ResourceRegistry::new(),
                stockpile: Stockpile::new(dropoff),
            }
        }

        fn spawn_citizen(&mut self, id: u32, tile: TilePos) -> Entity {
            self.world.spawn((
                Citizen::new(CitizenId(id)),
                Name::new("Test", "Citizen"),
                Position::at_tile(tile),
                CitizenState::Idle,
                WorkSkills::default(),
                WorkPreferences::default(),
            ))
        }
    }

    fn set_state(world: &mut World, entity: Entity, state: CitizenState) {
        *world.get::<&mut CitizenState>(entity).unwrap() = state;
    }

    #[test]
    fn test_gathering_harvests_then_returns() {
        let mut fx = Fixture::new();
        let node_pos = TilePos::new(8, 8);
        let node = fx.registry.insert(ResourceKind::BerryBush, node_pos);
        fx.registry.designate(node);
        assert!(fx.registry.try_lock(node, CitizenId(1)));

        let entity = fx.spawn_citizen(1, node_pos);
        set_state(&mut fx.world, entity, CitizenState::Gathering);
        let task = Task::Gather {
            node,
            returning: false,
        };
        fx.world.insert_one(entity, Assignment::new(task)).unwrap();

        // Berry bushes take 2 seconds at level 0.
        let Fixture {
            world,
            grid,
            planner,
            ledger,
            registry,
            stockpile,
        } = &mut fx;
        let mut ctx = TickContext {
            grid,
            planner,
            ledger,
            registry,
            stockpile,
        };
        perform_actions(world, &mut ctx, 1.0);
        assert_eq!(
            *world.get::<&CitizenState>(entity).unwrap(),
            CitizenState::Gathering
        );
        perform_actions(world, &mut ctx, 1.5);

        let node_ref = ctx.registry.node(node).unwrap();
        assert_eq!(node_ref.amount_remaining, 20);
        assert_eq!(node_ref.locked_by, None);

        let carried = world.get::<&Carried>(entity).unwrap();
        assert_eq!(carried.material, Material::Food);
        assert_eq!(carried.amount, 5);
        drop(carried);
        assert_eq!(
            *world.get::<&CitizenState>(entity).unwrap(),
            CitizenState::MovingToTarget
        );
        assert!(world.get::<&Movement>(entity).is_ok());
    }

    #[test]
    fn test_mid_route_depletion_cancels_cleanly() {
        let mut fx = Fixture::new();
        let node = fx.registry.insert(ResourceKind::Tree, TilePos::new(9, 9));
        fx.registry.designate(node);

        // Citizen 1 is walking toward the node it locked.
        assert!(fx.registry.try_lock(node, CitizenId(1)));
        let entity = fx.spawn_citizen(1, TilePos::new(5, 5));
        set_state(&mut fx.world, entity, CitizenState::MovingToTarget);
        fx.world
            .insert_one(
                entity,
                Assignment::new(Task::Gather {
                    node,
                    returning: false,
                }),
            )
            .unwrap();

        // Another actor depletes the node before arrival.
        fx.registry.release(node);
        fx.registry.try_lock(node, CitizenId(2));
        fx.registry.harvest(node);
        assert!(fx.registry.node(node).unwrap().depleted);

        let Fixture {
            world,
            grid,
            planner,
            ledger,
            registry,
            stockpile,
        } = &mut fx;
        let mut ctx = TickContext {
            grid,
            planner,
            ledger,
            registry,
            stockpile,
        };
        validate_targets(world, &mut ctx);

        // Cancelled: idle, no assignment, nothing dropped (never harvested).
        assert_eq!(
            *world.get::<&CitizenState>(entity).unwrap(),
            CitizenState::Idle
        );
        assert!(world.get::<&Assignment>(entity).is_err());
        assert!(world.get::<&Carried>(entity).is_err());
    }

    #[test]
    fn test_delivery_feeds_the_ledger() {
        let mut fx = Fixture::new();
        let site = fx.ledger.register(BuildingKind::Well, TilePos::new(10, 10));
        fx.ledger.deliver(site, Material::Stone, 5);
        assert!(fx.ledger.claim_haul(site, Material::Stone, CitizenId(1)));

        let entity = fx.spawn_citizen(1, TilePos::new(10, 9));
        set_state(&mut fx.world, entity, CitizenState::Hauling);
        fx.world
            .insert_one(
                entity,
                Assignment::new(Task::Haul {
                    site,
                    material: Material::Stone,
                    picked_up: true,
                }),
            )
            .unwrap();
        fx.world
            .insert_one(
                entity,
                Carried {
                    material: Material::Stone,
                    amount: 5,
                },
            )
            .unwrap();

        let Fixture {
            world,
            grid,
            planner,
            ledger,
            registry,
            stockpile,
        } = &mut fx;
        let mut ctx = TickContext {
            grid,
            planner,
            ledger,
            registry,
            stockpile,
        };
        perform_actions(world, &mut ctx, 0.1);

        // Wells need 20 stone; 5 + 5 delivered leaves it planned.
        let site_ref = ctx.ledger.site(site).unwrap();
        assert_eq!(site_ref.delivered(Material::Stone), 10);
        assert_eq!(site_ref.state, super::super::BuildingState::Planned);
        assert_eq!(site_ref.hauler(Material::Stone), None);

        assert_eq!(
            *world.get::<&CitizenState>(entity).unwrap(),
            CitizenState::Idle
        );
        assert!(world.get::<&Carried>(entity).is_err());
    }

    #[test]
    fn test_building_completes_and_grants_storage_bonus() {
        let mut fx = Fixture::new();
        let site = fx
            .ledger
            .register(BuildingKind::StorageShed, TilePos::new(10, 10));
        fx.ledger.deliver(site, Material::Wood, 30);
        assert!(fx.ledger.add_builder(site, CitizenId(1)));

        let entity = fx.spawn_citizen(1, TilePos::new(9, 10));
        set_state(&mut fx.world, entity, CitizenState::Building);
        fx.world
            .insert_one(entity, Assignment::new(Task::Build { site }))
            .unwrap();

        let base_capacity = fx.stockpile.capacity();
        let Fixture {
            world,
            grid,
            planner,
            ledger,
            registry,
            stockpile,
        } = &mut fx;
        let mut ctx = TickContext {
            grid,
            planner,
            ledger,
            registry,
            stockpile,
        };

        // 80 work at 10/sec, level 0: done within 8 seconds of ticks.
        for _ in 0..10 {
            perform_actions(world, &mut ctx, 1.0);
        }

        assert_eq!(
            ctx.ledger.state(site),
            Some(super::super::BuildingState::Complete)
        );
        assert_eq!(ctx.stockpile.capacity(), base_capacity + 500);
        assert_eq!(
            *world.get::<&CitizenState>(entity).unwrap(),
            CitizenState::Idle
        );
    }

    #[test]
    fn test_storage_full_drops_the_load() {
        let mut fx = Fixture::new();
        fx.stockpile.set_stock(Material::Stone, 500);
        let node = fx.registry.insert(ResourceKind::Tree, TilePos::new(9, 9));

        // Returning gatherer arrives at the stockpile with a full hold.
        let entity = fx.spawn_citizen(1, TilePos::new(2, 2));
        set_state(&mut fx.world, entity, CitizenState::MovingToTarget);
        fx.world
            .insert_one(
                entity,
                Assignment::new(Task::Gather {
                    node,
                    returning: true,
                }),
            )
            .unwrap();
        fx.world
            .insert_one(
                entity,
                Carried {
                    material: Material::Wood,
                    amount: 4,
                },
            )
            .unwrap();

        let Fixture {
            world,
            grid,
            planner,
            ledger,
            registry,
            stockpile,
        } = &mut fx;
        let mut ctx = TickContext {
            grid,
            planner,
            ledger,
            registry,
            stockpile,
        };
        perform_actions(world, &mut ctx, 0.1);

        assert_eq!(ctx.stockpile.stock(Material::Wood), 0);
        assert!(world.get::<&Carried>(entity).is_err());
        assert_eq!(
            *world.get::<&CitizenState>(entity).unwrap(),
            CitizenState::Idle
        );
    }
}
