//! Read-only per-tick snapshot of the simulation for renderers and UI.
//!
//! The snapshot is a plain serializable value: no entity handles, no borrows
//! into the world. External tooling can take the JSON export.

use homestead_logic::catalog::{BuildingKind, Material, ResourceKind};
use homestead_logic::grid::TilePos;
use serde::Serialize;

use crate::components::{Carried, Citizen, CitizenId, CitizenState, Name, Position};
use crate::components::{BuildingId, NodeId};
use crate::engine::SimulationEngine;
use crate::systems::BuildingState;

#[derive(Debug, Clone, Serialize)]
pub struct CitizenView {
    pub id: CitizenId,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub state: CitizenState,
    pub carried: Option<(Material, u32)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildingView {
    pub id: BuildingId,
    pub kind: BuildingKind,
    pub origin: TilePos,
    pub state: BuildingState,
    pub progress: f32,
    pub work_total: f32,
    /// (material, delivered, required) per catalog cost entry.
    pub materials: Vec<(Material, u32, u32)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeView {
    pub id: NodeId,
    pub kind: ResourceKind,
    pub pos: TilePos,
    pub designated: bool,
    pub depleted: bool,
    pub amount_remaining: u32,
    pub max_amount: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct StockpileView {
    pub stored: Vec<(Material, u32)>,
    pub total_stored: u32,
    pub capacity: u32,
}

/// One tick's complete public state.
#[derive(Debug, Clone, Serialize)]
pub struct WorldSnapshot {
    pub sim_time: f64,
    pub citizens: Vec<CitizenView>,
    pub buildings: Vec<BuildingView>,
    pub nodes: Vec<NodeView>,
    pub stockpile: StockpileView,
}

impl WorldSnapshot {
    pub(crate) fn capture(engine: &SimulationEngine) -> Self {
        let mut citizens: Vec<CitizenView> = engine
            .world
            .query::<(&Citizen, &Name, &Position, &CitizenState, Option<&Carried>)>()
            .iter()
            .map(|(_, (citizen, name, pos, state, carried))| CitizenView {
                id: citizen.id,
                name: name.full_name(),
                x: pos.0.x,
                y: pos.0.y,
                state: *state,
                carried: carried.map(|c| (c.material, c.amount)),
            })
            .collect();
        citizens.sort_by_key(|c| c.id);

        let buildings = engine
            .ledger()
            .sites()
            .map(|site| BuildingView {
                id: site.id,
                kind: site.kind,
                origin: site.origin,
                state: site.state,
                progress: site.progress(),
                work_total: site.work_total(),
                materials: site
                    .kind
                    .spec()
                    .costs
                    .iter()
                    .map(|(material, required)| (*material, site.delivered(*material), *required))
                    .collect(),
            })
            .collect();

        let nodes = engine
            .registry()
            .nodes()
            .map(|node| NodeView {
                id: node.id,
                kind: node.kind,
                pos: node.pos,
                designated: node.designated,
                depleted: node.depleted,
                amount_remaining: node.amount_remaining,
                max_amount: node.max_amount,
            })
            .collect();

        let stockpile = StockpileView {
            stored: Material::ALL
                .iter()
                .map(|m| (*m, engine.stockpile().stock(*m)))
                .collect(),
            total_stored: engine.stockpile().total_stored(),
            capacity: engine.stockpile().capacity(),
        };

        Self {
            sim_time: engine.sim_time(),
            citizens,
            buildings,
            nodes,
            stockpile,
        }
    }

    /// JSON export for external tooling.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
