//! Terrain grid - tiles, walkability, and traffic cost.
//!
//! `TileGrid` is the terrain collaborator's data model: the simulation core
//! reads walkability and traffic cost from it and is notified when tiles
//! change so the path planner can refresh its connectivity cache.

use serde::{Deserialize, Serialize};

/// An integer tile coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The 8 neighboring coordinates (may be out of bounds).
    pub fn neighbors8(&self) -> [TilePos; 8] {
        [
            TilePos::new(self.x - 1, self.y),
            TilePos::new(self.x + 1, self.y),
            TilePos::new(self.x, self.y - 1),
            TilePos::new(self.x, self.y + 1),
            TilePos::new(self.x - 1, self.y - 1),
            TilePos::new(self.x - 1, self.y + 1),
            TilePos::new(self.x + 1, self.y - 1),
            TilePos::new(self.x + 1, self.y + 1),
        ]
    }
}

/// An axis-aligned rectangle of tiles, inclusive of its min corner and
/// exclusive of `min + size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// A 1x1 rect covering a single tile.
    pub fn single(pos: TilePos) -> Self {
        Self::new(pos.x, pos.y, 1, 1)
    }

    pub fn contains(&self, pos: TilePos) -> bool {
        pos.x >= self.x
            && pos.y >= self.y
            && pos.x < self.x + self.width as i32
            && pos.y < self.y + self.height as i32
    }

    /// Iterate over every tile coordinate in the rect.
    pub fn tiles(&self) -> impl Iterator<Item = TilePos> + '_ {
        let (x0, y0) = (self.x, self.y);
        let (w, h) = (self.width as i32, self.height as i32);
        (0..h).flat_map(move |dy| (0..w).map(move |dx| TilePos::new(x0 + dx, y0 + dy)))
    }

    /// The rect grown by one tile on every side.
    pub fn dilated(&self) -> Rect {
        Rect::new(self.x - 1, self.y - 1, self.width + 2, self.height + 2)
    }
}

/// Terrain classification of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerrainKind {
    Grass,
    Dirt,
    Sand,
    Forest,
    Stone,
    Water,
}

impl TerrainKind {
    /// Water is the only impassable terrain.
    pub fn is_walkable(&self) -> bool {
        !matches!(self, TerrainKind::Water)
    }

    /// Terrain that accepts building foundations.
    pub fn is_buildable(&self) -> bool {
        matches!(self, TerrainKind::Grass | TerrainKind::Dirt | TerrainKind::Sand)
    }

    /// Default movement weight added to pathfinding edge cost.
    pub fn base_traffic_cost(&self) -> f32 {
        match self {
            TerrainKind::Grass | TerrainKind::Dirt => 0.0,
            TerrainKind::Sand => 0.2,
            TerrainKind::Stone => 0.3,
            TerrainKind::Forest => 0.5,
            TerrainKind::Water => 0.0,
        }
    }
}

/// A single tile of terrain.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Tile {
    pub terrain: TerrainKind,
    /// Extra pathfinding weight for this tile (restricted zones, mud, etc.).
    pub traffic_cost: f32,
    /// True while a structure footprint occupies the tile.
    pub blocked: bool,
}

impl Tile {
    pub fn new(terrain: TerrainKind) -> Self {
        Self {
            terrain,
            traffic_cost: terrain.base_traffic_cost(),
            blocked: false,
        }
    }
}

/// The terrain grid. Row-major storage, indexed by `TilePos`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileGrid {
    width: u32,
    height: u32,
    tiles: Vec<Tile>,
}

impl TileGrid {
    /// Create a grid filled with a uniform terrain kind.
    pub fn filled(width: u32, height: u32, terrain: TerrainKind) -> Self {
        Self {
            width,
            height,
            tiles: vec![Tile::new(terrain); (width * height) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn in_bounds(&self, pos: TilePos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    fn index(&self, pos: TilePos) -> usize {
        pos.y as usize * self.width as usize + pos.x as usize
    }

    pub fn tile(&self, pos: TilePos) -> Option<&Tile> {
        if self.in_bounds(pos) {
            Some(&self.tiles[self.index(pos)])
        } else {
            None
        }
    }

    /// Whether an agent may stand on / pass through this tile.
    pub fn is_walkable(&self, pos: TilePos) -> bool {
        self.tile(pos)
            .map(|t| t.terrain.is_walkable() && !t.blocked)
            .unwrap_or(false)
    }

    /// Whether a building foundation may cover this tile.
    pub fn is_buildable(&self, pos: TilePos) -> bool {
        self.tile(pos)
            .map(|t| t.terrain.is_buildable() && !t.blocked)
            .unwrap_or(false)
    }

    /// Traffic weight for pathfinding. Out-of-bounds tiles are never walked.
    pub fn traffic_cost(&self, pos: TilePos) -> f32 {
        self.tile(pos).map(|t| t.traffic_cost).unwrap_or(0.0)
    }

    pub fn set_terrain(&mut self, pos: TilePos, terrain: TerrainKind) {
        if self.in_bounds(pos) {
            let idx = self.index(pos);
            let tile = &mut self.tiles[idx];
            tile.terrain = terrain;
            tile.traffic_cost = terrain.base_traffic_cost();
        }
    }

    pub fn set_traffic_cost(&mut self, pos: TilePos, cost: f32) {
        if self.in_bounds(pos) {
            let idx = self.index(pos);
            self.tiles[idx].traffic_cost = cost.max(0.0);
        }
    }

    /// Mark or clear a structure footprint over a rect of tiles.
    pub fn set_blocked(&mut self, rect: Rect, blocked: bool) {
        for pos in rect.tiles() {
            if self.in_bounds(pos) {
                let idx = self.index(pos);
                self.tiles[idx].blocked = blocked;
            }
        }
    }
}
