//! End-to-end properties of the colony simulation: full work cycles,
//! claim exclusivity, reachability pruning, determinism, and save/load.

use homestead_core::generation::WorldConfig;
use homestead_core::prelude::*;
use homestead_logic::catalog::{BuildingKind, Material};
use homestead_logic::grid::{Rect, TerrainKind, TilePos};

fn config(seed: u64, citizens: u32) -> WorldConfig {
    WorldConfig {
        width: 32,
        height: 32,
        seed,
        starting_citizens: citizens,
        ..Default::default()
    }
}

/// Level every tile to grass so routes are fully under the test's control.
/// Structure footprints stay blocked.
fn flatten(engine: &mut SimulationEngine) {
    let (w, h) = (engine.grid().width() as i32, engine.grid().height() as i32);
    for y in 0..h {
        for x in 0..w {
            engine.set_terrain(TilePos::new(x, y), TerrainKind::Grass);
        }
    }
}

fn run(engine: &mut SimulationEngine, ticks: u32) {
    for _ in 0..ticks {
        engine.update(0.25);
    }
}

#[test]
fn gathering_fills_the_stockpile_and_depletes_nodes() {
    let mut engine = SimulationEngine::new(config(7, 3));
    flatten(&mut engine);

    let before = engine.stockpile().total_stored();
    let marked = engine.designate_region(Rect::new(0, 0, 32, 32), None);
    assert!(marked > 0, "generation produced no nodes");

    run(&mut engine, 2000);

    assert!(
        engine.stockpile().total_stored() > before,
        "no goods reached the stockpile"
    );
    assert!(
        engine.registry().nodes().any(|n| n.depleted),
        "no node was worked to depletion"
    );
    // Depleted nodes never keep a lock.
    for node in engine.registry().nodes() {
        if node.depleted {
            assert_eq!(node.locked_by, None);
        }
    }
}

#[test]
fn node_locks_are_exclusive_across_all_ticks() {
    let mut engine = SimulationEngine::new(config(11, 5));
    flatten(&mut engine);
    engine.designate_region(Rect::new(0, 0, 32, 32), None);

    for _ in 0..500 {
        engine.update(0.25);

        // No citizen may hold more than one node, and every holder is real.
        let mut holders = Vec::new();
        for node in engine.registry().nodes() {
            if let Some(holder) = node.locked_by {
                assert!(
                    !holders.contains(&holder),
                    "{} holds two nodes at once",
                    holder
                );
                holders.push(holder);
            }
        }
    }
}

#[test]
fn house_is_built_materials_first() {
    let mut engine = SimulationEngine::new(config(3, 4));
    flatten(&mut engine);

    let house = engine
        .place_building(BuildingKind::House, TilePos::new(19, 17))
        .unwrap();
    assert_eq!(engine.ledger().state(house), Some(BuildingState::Planned));

    let mut saw_construction = false;
    for _ in 0..4000 {
        engine.update(0.25);

        let site = engine.ledger().site(house).unwrap();
        if site.progress() > 0.0 {
            // Work can only ever follow complete deliveries.
            assert!(site.has_all_materials());
            saw_construction = true;
        }
        if site.state == BuildingState::Complete {
            break;
        }
    }

    let site = engine.ledger().site(house).unwrap();
    assert!(saw_construction);
    assert_eq!(site.state, BuildingState::Complete);
    assert_eq!(site.delivered(Material::Wood), 20);
    assert_eq!(site.delivered(Material::Stone), 10);
    assert_eq!(site.progress(), site.work_total());

    // The finished house occupies its tiles.
    assert!(!engine.grid().is_walkable(TilePos::new(20, 18)));

    // Stock was actually withdrawn from the pile.
    assert_eq!(engine.stockpile().stock(Material::Wood), 80);
    assert_eq!(engine.stockpile().stock(Material::Stone), 40);
}

#[test]
fn unreachable_work_never_triggers_a_search() {
    let mut engine = SimulationEngine::new(config(13, 2));
    flatten(&mut engine);

    // Wall off the north-west corner with water, leaving nodes inside.
    for x in 0..8 {
        engine.set_terrain(TilePos::new(x, 8), TerrainKind::Water);
    }
    for y in 0..8 {
        engine.set_terrain(TilePos::new(8, y), TerrainKind::Water);
    }
    let marked = engine.designate_region(Rect::new(0, 0, 8, 8), None);

    let expansions_before = engine.planner().nodes_expanded();
    run(&mut engine, 50);

    // The scheduler consulted the planner every tick, but the component
    // pre-check rejected the island without expanding a single node.
    if marked > 0 {
        assert_eq!(engine.planner().nodes_expanded(), expansions_before);
        for node in engine.registry().nodes() {
            assert_eq!(node.locked_by, None);
        }
    }
    // Citizens idle peacefully; nothing crashes, nothing is claimed.
    for citizen in engine.snapshot().citizens {
        assert_eq!(citizen.state, CitizenState::Idle);
    }
}

#[test]
fn same_seed_runs_are_identical() {
    let mut a = SimulationEngine::new(config(99, 4));
    let mut b = SimulationEngine::new(config(99, 4));
    a.designate_region(Rect::new(0, 0, 32, 32), None);
    b.designate_region(Rect::new(0, 0, 32, 32), None);

    run(&mut a, 300);
    run(&mut b, 300);

    assert_eq!(
        a.snapshot().to_json().unwrap(),
        b.snapshot().to_json().unwrap()
    );
}

#[test]
fn resume_from_save_matches_uninterrupted_run() {
    let mut engine = SimulationEngine::new(config(42, 4));
    engine.designate_region(Rect::new(0, 0, 32, 32), None);
    run(&mut engine, 100);

    let mut buffer = Vec::new();
    engine.save(&mut buffer).unwrap();

    run(&mut engine, 150);
    let uninterrupted = engine.snapshot().to_json().unwrap();

    let mut resumed = SimulationEngine::load(buffer.as_slice()).unwrap();
    run(&mut resumed, 150);
    let restored = resumed.snapshot().to_json().unwrap();

    assert_eq!(uninterrupted, restored);
}

#[test]
fn cancelled_designation_stops_the_work() {
    let mut engine = SimulationEngine::new(config(21, 2));
    flatten(&mut engine);

    let marked = engine.designate_region(Rect::new(0, 0, 32, 32), None);
    assert!(marked > 0);
    run(&mut engine, 5);

    engine.cancel_designation(Rect::new(0, 0, 32, 32));
    run(&mut engine, 5);

    // Locks are gone and everyone winds down to idle.
    for node in engine.registry().nodes() {
        assert!(!node.designated);
        assert_eq!(node.locked_by, None);
    }
    run(&mut engine, 200);
    for citizen in engine.snapshot().citizens {
        assert_eq!(citizen.state, CitizenState::Idle);
    }
}

#[test]
fn removing_a_planned_building_releases_haulers() {
    let mut engine = SimulationEngine::new(config(17, 3));
    flatten(&mut engine);

    let house = engine
        .place_building(BuildingKind::House, TilePos::new(20, 20))
        .unwrap();
    run(&mut engine, 10);

    assert!(engine.remove_building(house));
    assert!(engine.ledger().site(house).is_none());
    run(&mut engine, 100);

    // Tiles are free again and nobody is stuck mid-haul toward a ghost.
    assert!(engine.grid().is_walkable(TilePos::new(21, 21)));
    for citizen in engine.snapshot().citizens {
        assert_eq!(citizen.state, CitizenState::Idle);
    }
}
