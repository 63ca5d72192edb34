//! World generation - terrain, resource nodes, and the starting clearing.
//!
//! Everything is driven by a seeded rng so the same config always produces
//! the same world.

use homestead_logic::catalog::ResourceKind;
use homestead_logic::grid::{Rect, TerrainKind, TileGrid, TilePos};
use rand::Rng;

/// Configuration for world generation.
#[derive(Debug, Clone)]
pub struct WorldConfig {
    pub width: u32,
    pub height: u32,
    /// Seed for all procedural decisions; equal seeds yield equal worlds.
    pub seed: u64,
    pub starting_citizens: u32,
    /// Per-tile node probabilities on eligible terrain.
    pub tree_density: f32,
    pub stone_density: f32,
    pub berry_density: f32,
    pub iron_density: f32,
    /// Starting stockpile contents.
    pub starting_wood: u32,
    pub starting_stone: u32,
    pub starting_food: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 96,
            height: 96,
            seed: 0,
            starting_citizens: 5,
            tree_density: 0.05,
            stone_density: 0.015,
            berry_density: 0.02,
            iron_density: 0.008,
            starting_wood: 100,
            starting_stone: 50,
            starting_food: 100,
        }
    }
}

/// Radius of the guaranteed-grass clearing around the wagon.
const CLEARING_RADIUS: i32 = 8;

/// Generate terrain: grass base, water and forest patches, a stone ridge or
/// two, and a cleared settlement area in the middle.
pub fn generate_terrain(config: &WorldConfig, rng: &mut impl Rng) -> TileGrid {
    let mut grid = TileGrid::filled(config.width, config.height, TerrainKind::Grass);
    let area = (config.width * config.height) as usize;

    scatter_patches(&mut grid, rng, TerrainKind::Water, area / 900, 40);
    scatter_patches(&mut grid, rng, TerrainKind::Forest, area / 500, 60);
    scatter_patches(&mut grid, rng, TerrainKind::Stone, area / 1200, 25);
    scatter_patches(&mut grid, rng, TerrainKind::Dirt, area / 1200, 20);

    // The settlers always land on open ground.
    let center = map_center(config);
    for dy in -CLEARING_RADIUS..=CLEARING_RADIUS {
        for dx in -CLEARING_RADIUS..=CLEARING_RADIUS {
            let pos = TilePos::new(center.x + dx, center.y + dy);
            if grid.in_bounds(pos) {
                grid.set_terrain(pos, TerrainKind::Grass);
            }
        }
    }
    grid
}

/// Random-walk blobs of a terrain kind.
fn scatter_patches(
    grid: &mut TileGrid,
    rng: &mut impl Rng,
    terrain: TerrainKind,
    patches: usize,
    patch_size: usize,
) {
    for _ in 0..patches {
        let mut pos = TilePos::new(
            rng.gen_range(0..grid.width() as i32),
            rng.gen_range(0..grid.height() as i32),
        );
        for _ in 0..patch_size {
            if grid.in_bounds(pos) {
                grid.set_terrain(pos, terrain);
            }
            pos = match rng.gen_range(0..4) {
                0 => TilePos::new(pos.x + 1, pos.y),
                1 => TilePos::new(pos.x - 1, pos.y),
                2 => TilePos::new(pos.x, pos.y + 1),
                _ => TilePos::new(pos.x, pos.y - 1),
            };
        }
    }
}

pub fn map_center(config: &WorldConfig) -> TilePos {
    TilePos::new(config.width as i32 / 2, config.height as i32 / 2)
}

/// The wagon's 2x2 footprint at the map center.
pub fn wagon_footprint(config: &WorldConfig) -> Rect {
    let center = map_center(config);
    Rect::new(center.x - 1, center.y - 1, 2, 2)
}

/// Roll resource nodes over the generated terrain. Returns kind/position
/// pairs for the registry; blocked tiles (the wagon) never get a node.
pub fn generate_nodes(
    config: &WorldConfig,
    grid: &TileGrid,
    rng: &mut impl Rng,
) -> Vec<(ResourceKind, TilePos)> {
    let mut nodes = Vec::new();
    for y in 0..grid.height() as i32 {
        for x in 0..grid.width() as i32 {
            let pos = TilePos::new(x, y);
            if !grid.is_walkable(pos) {
                continue;
            }
            let terrain = match grid.tile(pos) {
                Some(tile) => tile.terrain,
                None => continue,
            };
            let roll: f32 = rng.gen();
            let kind = match terrain {
                TerrainKind::Forest if roll < 0.3 => Some(ResourceKind::Tree),
                TerrainKind::Grass if roll < config.tree_density => Some(ResourceKind::Tree),
                TerrainKind::Grass if roll < config.tree_density + config.berry_density => {
                    Some(ResourceKind::BerryBush)
                }
                TerrainKind::Stone if roll < 0.25 => Some(ResourceKind::StoneOutcrop),
                TerrainKind::Dirt if roll < config.iron_density => Some(ResourceKind::IronVein),
                TerrainKind::Grass | TerrainKind::Dirt if roll > 1.0 - config.stone_density => {
                    Some(ResourceKind::StoneOutcrop)
                }
                _ => None,
            };
            if let Some(kind) = kind {
                nodes.push((kind, pos));
            }
        }
    }
    nodes
}
