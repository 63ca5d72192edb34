//! Task scheduler - matches idle citizens to the highest-priority open work.
//!
//! Priority is fixed: hauling materials to a planned building beats
//! construction work, which beats gathering. Within a tier the nearest item
//! by path cost wins. Claims (haul slots, builder slots, node locks) are
//! taken at assignment time, and citizens are processed in ascending id
//! order, so two citizens can never claim the same work in one tick.
//!
//! An item that is unreachable for a citizen is skipped without blocking the
//! fall-through to the next tier; a citizen with no reachable work at all
//! simply stays idle - the expected steady state once work runs out.

use hecs::{Entity, World};
use homestead_logic::catalog::Material;
use homestead_logic::grid::{Rect, TilePos};
use homestead_logic::pathfinding::Path;
use log::debug;

use super::{BuildingState, TickContext};
use crate::components::{
    Assignment, BuildingId, Citizen, CitizenState, Movement, NodeId, Position, Task,
    WorkPreferences,
};

/// Assign work to every idle citizen.
pub fn assign_work(world: &mut World, ctx: &mut TickContext) {
    let mut idle: Vec<(Entity, Citizen, TilePos, WorkPreferences)> = world
        .query::<(&Citizen, &CitizenState, &Position, &WorkPreferences)>()
        .without::<&Assignment>()
        .iter()
        .filter(|(_, (_, state, _, _))| **state == CitizenState::Idle)
        .map(|(entity, (citizen, _, pos, prefs))| (entity, *citizen, pos.tile(), *prefs))
        .collect();
    idle.sort_by_key(|(_, citizen, _, _)| citizen.id);

    for (entity, citizen, from, prefs) in idle {
        let assignment = find_haul(ctx, citizen.id, from, &prefs)
            .or_else(|| find_build(ctx, citizen.id, from, &prefs))
            .or_else(|| find_gather(ctx, citizen.id, from, &prefs));

        if let Some((task, path)) = assignment {
            debug!("{} assigned {:?}", citizen.id, task);
            let _ = world.insert_one(entity, Assignment::new(task));
            let _ = world.insert_one(entity, Movement::new(path, citizen.move_speed));
            if let Ok(mut state) = world.get::<&mut CitizenState>(entity) {
                *state = CitizenState::MovingToTarget;
            }
        }
    }
}

/// Tier 1: haul a material the stockpile can supply to a planned building
/// with a free haul slot. Ranked by path cost to the site; the issued route
/// leads to the stockpile for pickup.
fn find_haul(
    ctx: &mut TickContext,
    me: crate::components::CitizenId,
    from: TilePos,
    prefs: &WorkPreferences,
) -> Option<(Task, Path)> {
    if !prefs.haul {
        return None;
    }

    let candidates: Vec<(BuildingId, Material, Rect)> = ctx
        .ledger
        .sites()
        .filter(|site| site.state == BuildingState::Planned)
        .flat_map(|site| {
            site.missing_materials()
                .into_iter()
                .filter(|(material, _)| {
                    site.hauler(*material).is_none() && ctx.stockpile.stock(*material) > 0
                })
                .map(|(material, _)| (site.id, material, site.footprint()))
                .collect::<Vec<_>>()
        })
        .collect();

    let mut best: Option<(BuildingId, Material, f32)> = None;
    for (site, material, footprint) in candidates {
        if let Some(path) = ctx.planner.find_path_to_rect(ctx.grid, from, footprint) {
            if best.map(|(_, _, cost)| path.cost() < cost).unwrap_or(true) {
                best = Some((site, material, path.cost()));
            }
        }
    }

    let (site, material, _) = best?;
    let pickup = ctx
        .planner
        .find_path_to_rect(ctx.grid, from, ctx.stockpile.dropoff())?;
    if !ctx.ledger.claim_haul(site, material, me) {
        return None;
    }
    Some((
        Task::Haul {
            site,
            material,
            picked_up: false,
        },
        pickup,
    ))
}

/// Tier 2: construction work at the nearest site with all materials, open
/// progress, and a free builder slot.
fn find_build(
    ctx: &mut TickContext,
    me: crate::components::CitizenId,
    from: TilePos,
    prefs: &WorkPreferences,
) -> Option<(Task, Path)> {
    if !prefs.build {
        return None;
    }

    let candidates: Vec<(BuildingId, Rect)> = ctx
        .ledger
        .sites()
        .filter(|site| site.wants_builders())
        .map(|site| (site.id, site.footprint()))
        .collect();

    let mut best: Option<(BuildingId, Path)> = None;
    for (site, footprint) in candidates {
        if let Some(path) = ctx.planner.find_path_to_rect(ctx.grid, from, footprint) {
            if best
                .as_ref()
                .map(|(_, b)| path.cost() < b.cost())
                .unwrap_or(true)
            {
                best = Some((site, path));
            }
        }
    }

    let (site, path) = best?;
    if !ctx.ledger.add_builder(site, me) {
        return None;
    }
    Some((Task::Build { site }, path))
}

/// Tier 3: gather from the nearest designated, unclaimed, non-depleted node.
fn find_gather(
    ctx: &mut TickContext,
    me: crate::components::CitizenId,
    from: TilePos,
    prefs: &WorkPreferences,
) -> Option<(Task, Path)> {
    if !prefs.gather {
        return None;
    }

    let candidates: Vec<(NodeId, TilePos)> = ctx
        .registry
        .nodes()
        .filter(|node| node.available())
        .map(|node| (node.id, node.pos))
        .collect();

    let mut best: Option<(NodeId, Path)> = None;
    for (node, pos) in candidates {
        if let Some(path) = ctx.planner.find_path(ctx.grid, from, pos) {
            if best
                .as_ref()
                .map(|(_, b)| path.cost() < b.cost())
                .unwrap_or(true)
            {
                best = Some((node, path));
            }
        }
    }

    let (node, path) = best?;
    if !ctx.registry.try_lock(node, me) {
        return None;
    }
    Some((
        Task::Gather {
            node,
            returning: false,
        },
        path,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{CitizenId, Name};
    use crate::systems::{ConstructionLedger, ResourceRegistry, Stockpile};
    use homestead_logic::catalog::{BuildingKind, ResourceKind};
    use homestead_logic::grid::{TerrainKind, TileGrid};
    use homestead_logic::pathfinding::PathPlanner;
    use homestead_logic::skills::WorkSkills;

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
            let mut grid = TileGrid::filled(24, 24, TerrainKind::Grass);
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

        /// Carve an island in the corner: tiles inside are unreachable.
        fn isolate(&mut self, area: Rect) {
            for pos in area.dilated().tiles() {
                if !area.contains(pos) {
                    self.grid.set_terrain(pos, TerrainKind::Water);
                }
            }
            self.planner.rebuild(&self.grid);
        }

        fn run(&mut self) {
            let Fixture {
                world,
                grid,
                planner,
                ledger,
                registry,
                stockpile,
            } = self;
            let mut ctx = TickContext {
                grid,
                planner,
                ledger,
                registry,
                stockpile,
            };
            assign_work(world, &mut ctx);
        }

        fn task_of(&self, entity: Entity) -> Option<Task> {
            self.world.get::<&Assignment>(entity).ok().map(|a| a.task)
        }
    }

    #[test]
    fn test_priority_order() {
        let mut fx = Fixture::new();
        fx.stockpile.set_stock(Material::Wood, 100);

        // Tier 1 candidate: a planned house missing wood.
        let house = fx.ledger.register(BuildingKind::House, TilePos::new(10, 10));
        // Tier 2 candidate: a shed with all materials delivered.
        let shed = fx
            .ledger
            .register(BuildingKind::StorageShed, TilePos::new(16, 16));
        fx.ledger.deliver(shed, Material::Wood, 30);
        // Tier 3 candidate: a designated bush.
        let bush = fx.registry.insert(ResourceKind::BerryBush, TilePos::new(5, 20));
        fx.registry.designate(bush);

        let worker = fx.spawn_citizen(1, TilePos::new(8, 8));
        fx.run();

        match fx.task_of(worker) {
            Some(Task::Haul { site, .. }) => assert_eq!(site, house),
            other => panic!("expected a haul task, got {:?}", other),
        }
        assert_eq!(
            *fx.world.get::<&CitizenState>(worker).unwrap(),
            CitizenState::MovingToTarget
        );
        assert!(fx.world.get::<&Movement>(worker).is_ok());
    }

    #[test]
    fn test_tier_fallthrough_without_stock() {
        let mut fx = Fixture::new();
        // A planned house but an empty stockpile: hauling is unavailable.
        fx.ledger.register(BuildingKind::House, TilePos::new(10, 10));
        let shed = fx
            .ledger
            .register(BuildingKind::StorageShed, TilePos::new(16, 16));
        fx.ledger.deliver(shed, Material::Wood, 30);

        let worker = fx.spawn_citizen(1, TilePos::new(8, 8));
        fx.run();

        match fx.task_of(worker) {
            Some(Task::Build { site }) => assert_eq!(site, shed),
            other => panic!("expected a build task, got {:?}", other),
        }
    }

    #[test]
    fn test_same_tick_claims_are_exclusive() {
        let mut fx = Fixture::new();
        let bush = fx.registry.insert(ResourceKind::BerryBush, TilePos::new(12, 12));
        fx.registry.designate(bush);

        let first = fx.spawn_citizen(1, TilePos::new(10, 12));
        let second = fx.spawn_citizen(2, TilePos::new(14, 12));
        fx.run();

        // Lowest id wins the only node; the other stays idle.
        assert!(matches!(fx.task_of(first), Some(Task::Gather { .. })));
        assert!(fx.task_of(second).is_none());
        assert_eq!(
            *fx.world.get::<&CitizenState>(second).unwrap(),
            CitizenState::Idle
        );
        assert_eq!(
            fx.registry.node(bush).unwrap().locked_by,
            Some(CitizenId(1))
        );
    }

    #[test]
    fn test_nearest_node_wins() {
        let mut fx = Fixture::new();
        let near = fx.registry.insert(ResourceKind::Tree, TilePos::new(9, 8));
        let far = fx.registry.insert(ResourceKind::Tree, TilePos::new(20, 20));
        fx.registry.designate(near);
        fx.registry.designate(far);

        let worker = fx.spawn_citizen(1, TilePos::new(8, 8));
        fx.run();

        assert_eq!(
            fx.task_of(worker),
            Some(Task::Gather {
                node: near,
                returning: false
            })
        );
    }

    #[test]
    fn test_unreachable_item_skipped_within_tier() {
        let mut fx = Fixture::new();
        let island = Rect::new(18, 18, 3, 3);
        let stranded = fx.registry.insert(ResourceKind::Tree, TilePos::new(19, 19));
        let reachable = fx.registry.insert(ResourceKind::Tree, TilePos::new(4, 8));
        fx.registry.designate(stranded);
        fx.registry.designate(reachable);
        fx.isolate(island);

        // The stranded tree is closer as the crow flies, but has no route.
        let worker = fx.spawn_citizen(1, TilePos::new(14, 14));
        fx.run();

        assert_eq!(
            fx.task_of(worker),
            Some(Task::Gather {
                node: reachable,
                returning: false
            })
        );
    }

    #[test]
    fn test_unreachable_tier_falls_through() {
        let mut fx = Fixture::new();
        fx.stockpile.set_stock(Material::Wood, 100);

        // The only haul target sits on an island.
        let island = Rect::new(16, 16, 6, 6);
        fx.ledger.register(BuildingKind::House, TilePos::new(18, 18));
        let bush = fx.registry.insert(ResourceKind::BerryBush, TilePos::new(6, 6));
        fx.registry.designate(bush);
        fx.isolate(island);

        let worker = fx.spawn_citizen(1, TilePos::new(10, 10));
        fx.run();

        assert!(matches!(fx.task_of(worker), Some(Task::Gather { .. })));
    }

    #[test]
    fn test_preferences_gate_tiers() {
        let mut fx = Fixture::new();
        let bush = fx.registry.insert(ResourceKind::BerryBush, TilePos::new(12, 12));
        fx.registry.designate(bush);

        let worker = fx.spawn_citizen(1, TilePos::new(10, 10));
        {
            let mut prefs = fx.world.get::<&mut WorkPreferences>(worker).unwrap();
            prefs.gather = false;
        }
        fx.run();

        assert!(fx.task_of(worker).is_none());
        assert!(fx.registry.node(bush).unwrap().locked_by.is_none());
    }

    #[test]
    fn test_no_work_is_not_an_error() {
        let mut fx = Fixture::new();
        let worker = fx.spawn_citizen(1, TilePos::new(10, 10));
        fx.run();
        assert!(fx.task_of(worker).is_none());
        assert_eq!(
            *fx.world.get::<&CitizenState>(worker).unwrap(),
            CitizenState::Idle
        );
    }
}
