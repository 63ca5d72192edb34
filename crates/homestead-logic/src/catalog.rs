//! Static definitions for materials, resource nodes, and buildings.
//!
//! Everything a kind implies (footprint, costs, yields, timings) lives in a
//! closed enum plus a `spec()` lookup, so behavior is data-driven without any
//! dynamic typing.

use serde::{Deserialize, Serialize};

/// Stockpileable material kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Material {
    Wood,
    Stone,
    Food,
    Iron,
}

impl Material {
    pub const ALL: [Material; 4] = [Material::Wood, Material::Stone, Material::Food, Material::Iron];
}

/// Kinds of harvestable resource nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Tree,
    StoneOutcrop,
    BerryBush,
    IronVein,
}

/// Static properties of a resource-node kind.
#[derive(Debug, Clone, Copy)]
pub struct ResourceSpec {
    pub name: &'static str,
    /// Material produced per harvest.
    pub yields: Material,
    /// Units removed from the node (and carried away) per harvest.
    pub per_harvest: u32,
    /// Total units a fresh node holds.
    pub max_amount: u32,
    /// Seconds of work per harvest at skill level 0.
    pub harvest_secs: f32,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Tree,
        ResourceKind::StoneOutcrop,
        ResourceKind::BerryBush,
        ResourceKind::IronVein,
    ];

    pub fn spec(&self) -> &'static ResourceSpec {
        match self {
            ResourceKind::Tree => &ResourceSpec {
                name: "Tree",
                yields: Material::Wood,
                per_harvest: 4,
                max_amount: 4,
                harvest_secs: 3.0,
            },
            ResourceKind::StoneOutcrop => &ResourceSpec {
                name: "Stone Outcrop",
                yields: Material::Stone,
                per_harvest: 8,
                max_amount: 24,
                harvest_secs: 5.0,
            },
            ResourceKind::BerryBush => &ResourceSpec {
                name: "Berry Bush",
                yields: Material::Food,
                per_harvest: 5,
                max_amount: 25,
                harvest_secs: 2.0,
            },
            ResourceKind::IronVein => &ResourceSpec {
                name: "Iron Vein",
                yields: Material::Iron,
                per_harvest: 5,
                max_amount: 60,
                harvest_secs: 6.0,
            },
        }
    }
}

/// Kinds of placeable buildings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildingKind {
    House,
    StorageShed,
    Warehouse,
    Workshop,
    Farm,
    Mine,
    LumberCamp,
    Well,
    Market,
    /// The settlers' starting wagon - pre-built stockpile drop-off.
    Wagon,
}

/// Static properties of a building kind.
#[derive(Debug, Clone, Copy)]
pub struct BuildingSpec {
    pub name: &'static str,
    /// Footprint in tiles.
    pub width: u32,
    pub height: u32,
    /// Materials that must be hauled to the site before construction starts.
    pub costs: &'static [(Material, u32)],
    /// Work units to complete construction.
    pub work: f32,
    /// Upper bound on citizens constructing the building at once.
    pub max_builders: u32,
    /// Storage capacity added to the colony stockpile when complete.
    pub storage_bonus: u32,
}

impl BuildingKind {
    pub const ALL: [BuildingKind; 10] = [
        BuildingKind::House,
        BuildingKind::StorageShed,
        BuildingKind::Warehouse,
        BuildingKind::Workshop,
        BuildingKind::Farm,
        BuildingKind::Mine,
        BuildingKind::LumberCamp,
        BuildingKind::Well,
        BuildingKind::Market,
        BuildingKind::Wagon,
    ];

    pub fn spec(&self) -> &'static BuildingSpec {
        match self {
            BuildingKind::House => &BuildingSpec {
                name: "House",
                width: 3,
                height: 3,
                costs: &[(Material::Wood, 20), (Material::Stone, 10)],
                work: 100.0,
                max_builders: 3,
                storage_bonus: 0,
            },
            BuildingKind::StorageShed => &BuildingSpec {
                name: "Storage Shed",
                width: 4,
                height: 4,
                costs: &[(Material::Wood, 30)],
                work: 80.0,
                max_builders: 3,
                storage_bonus: 500,
            },
            BuildingKind::Warehouse => &BuildingSpec {
                name: "Warehouse",
                width: 5,
                height: 5,
                costs: &[(Material::Wood, 50), (Material::Stone, 30)],
                work: 150.0,
                max_builders: 4,
                storage_bonus: 2000,
            },
            BuildingKind::Workshop => &BuildingSpec {
                name: "Workshop",
                width: 3,
                height: 3,
                costs: &[(Material::Wood, 25), (Material::Stone, 15)],
                work: 120.0,
                max_builders: 3,
                storage_bonus: 0,
            },
            BuildingKind::Farm => &BuildingSpec {
                name: "Farm",
                width: 5,
                height: 5,
                costs: &[(Material::Wood, 10)],
                work: 60.0,
                max_builders: 4,
                storage_bonus: 0,
            },
            BuildingKind::Mine => &BuildingSpec {
                name: "Mine",
                width: 2,
                height: 2,
                costs: &[(Material::Wood, 15), (Material::Stone, 5)],
                work: 150.0,
                max_builders: 2,
                storage_bonus: 0,
            },
            BuildingKind::LumberCamp => &BuildingSpec {
                name: "Lumber Camp",
                width: 3,
                height: 2,
                costs: &[(Material::Wood, 15)],
                work: 70.0,
                max_builders: 3,
                storage_bonus: 0,
            },
            BuildingKind::Well => &BuildingSpec {
                name: "Well",
                width: 1,
                height: 1,
                costs: &[(Material::Stone, 20)],
                work: 100.0,
                max_builders: 1,
                storage_bonus: 0,
            },
            BuildingKind::Market => &BuildingSpec {
                name: "Market",
                width: 4,
                height: 3,
                costs: &[(Material::Wood, 40), (Material::Stone, 20)],
                work: 140.0,
                max_builders: 4,
                storage_bonus: 0,
            },
            BuildingKind::Wagon => &BuildingSpec {
                name: "Wagon",
                width: 2,
                height: 2,
                costs: &[],
                work: 0.0,
                max_builders: 0,
                storage_bonus: 0,
            },
        }
    }

    /// The wagon arrives built; everything else starts as a plan.
    pub fn prebuilt(&self) -> bool {
        matches!(self, BuildingKind::Wagon)
    }
}
