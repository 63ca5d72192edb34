//! Grid pathfinding - connected-component pruning plus weighted A*.
//!
//! `PathPlanner` keeps a per-tile connected-component cache so that requests
//! between disconnected regions are rejected in O(1) without expanding a
//! single search node. The cache is rebuilt incrementally via flood fill when
//! tiles change walkability, and fully at world creation or load.

use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap, HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::grid::{Rect, TileGrid, TilePos};

/// Component id of tiles that cannot be walked on.
pub const NO_COMPONENT: u32 = 0;

const SQRT_2: f32 = std::f32::consts::SQRT_2;

/// An immutable waypoint sequence plus a cursor, consumed one waypoint per
/// movement step. The first waypoint is the source tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    waypoints: Vec<TilePos>,
    cursor: usize,
    /// Total g-cost of the route, used for nearest-work tie-breaking.
    cost: f32,
}

impl Path {
    fn new(waypoints: Vec<TilePos>, cost: f32) -> Self {
        Self {
            waypoints,
            cursor: 0,
            cost,
        }
    }

    /// The waypoint the agent is currently heading for.
    pub fn current(&self) -> Option<TilePos> {
        self.waypoints.get(self.cursor).copied()
    }

    /// Step the cursor past the current waypoint.
    pub fn advance(&mut self) {
        if self.cursor < self.waypoints.len() {
            self.cursor += 1;
        }
    }

    /// True once every waypoint has been consumed.
    pub fn is_finished(&self) -> bool {
        self.cursor >= self.waypoints.len()
    }

    /// Final waypoint of the route.
    pub fn destination(&self) -> TilePos {
        *self.waypoints.last().expect("paths are never empty")
    }

    pub fn cost(&self) -> f32 {
        self.cost
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn waypoints(&self) -> &[TilePos] {
        &self.waypoints
    }
}

/// Frontier entry: min-ordered by f, ties broken toward the lower heuristic
/// (closer to goal).
#[derive(Debug, Clone, Copy)]
struct FrontierNode {
    f: f32,
    h: f32,
    pos: TilePos,
}

impl PartialEq for FrontierNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FrontierNode {}

impl PartialOrd for FrontierNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FrontierNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, we want the smallest f first.
        other
            .f
            .partial_cmp(&self.f)
            .unwrap_or(Ordering::Equal)
            .then(other.h.partial_cmp(&self.h).unwrap_or(Ordering::Equal))
            .then_with(|| other.pos.cmp(&self.pos))
    }
}

/// Pathfinder with a connected-component cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathPlanner {
    width: u32,
    height: u32,
    /// Per-tile component id; `NO_COMPONENT` for unwalkable tiles.
    components: Vec<u32>,
    next_component: u32,
    /// Search abandons and reports unreachable past this many expansions.
    max_expanded: usize,
    /// Cumulative expansion counter across all searches.
    #[serde(skip)]
    nodes_expanded: u64,
}

impl PathPlanner {
    pub const DEFAULT_NODE_BUDGET: usize = 4096;

    /// Build a planner for `grid` with the default node budget.
    pub fn new(grid: &TileGrid) -> Self {
        Self::with_budget(grid, Self::DEFAULT_NODE_BUDGET)
    }

    /// Build a planner with a specific per-search expansion ceiling.
    pub fn with_budget(grid: &TileGrid, max_expanded: usize) -> Self {
        let mut planner = Self {
            width: grid.width(),
            height: grid.height(),
            components: vec![NO_COMPONENT; (grid.width() * grid.height()) as usize],
            next_component: 1,
            max_expanded,
            nodes_expanded: 0,
        };
        planner.rebuild(grid);
        planner
    }

    /// Component id at a position, or `None` off-grid / on unwalkable tiles.
    pub fn component_at(&self, pos: TilePos) -> Option<u32> {
        if pos.x < 0 || pos.y < 0 || pos.x as u32 >= self.width || pos.y as u32 >= self.height {
            return None;
        }
        let id = self.components[self.index(pos)];
        if id == NO_COMPONENT {
            None
        } else {
            Some(id)
        }
    }

    /// Whether a route between the two tiles can possibly exist.
    pub fn same_component(&self, a: TilePos, b: TilePos) -> bool {
        match (self.component_at(a), self.component_at(b)) {
            (Some(ca), Some(cb)) => ca == cb,
            _ => false,
        }
    }

    /// Total A* nodes expanded since the planner was created.
    pub fn nodes_expanded(&self) -> u64 {
        self.nodes_expanded
    }

    fn index(&self, pos: TilePos) -> usize {
        pos.y as usize * self.width as usize + pos.x as usize
    }

    /// Recompute every component id from scratch.
    pub fn rebuild(&mut self, grid: &TileGrid) {
        self.components.iter_mut().for_each(|c| *c = NO_COMPONENT);
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                let pos = TilePos::new(x, y);
                if grid.is_walkable(pos) && self.components[self.index(pos)] == NO_COMPONENT {
                    let id = self.next_component;
                    self.next_component += 1;
                    self.flood(grid, pos, id);
                }
            }
        }
    }

    /// Refresh component ids after tiles inside `changed` altered walkability.
    ///
    /// Every component touching the dilated rect is cleared and re-filled, so
    /// both splits (a wall dividing a region) and merges (a wall removed
    /// between regions) resolve without a global rebuild.
    pub fn update_region(&mut self, grid: &TileGrid, changed: Rect) {
        let mut affected: BTreeSet<u32> = BTreeSet::new();
        for pos in changed.dilated().tiles() {
            if let Some(id) = self.component_at(pos) {
                affected.insert(id);
            }
        }

        if !affected.is_empty() {
            for c in self.components.iter_mut() {
                if affected.contains(c) {
                    *c = NO_COMPONENT;
                }
            }
        }

        // Re-fill cleared regions and any tiles that just became walkable.
        // Distinct surviving components are never adjacent, so flooding only
        // through unassigned tiles cannot leak into an untouched component.
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                let pos = TilePos::new(x, y);
                if grid.is_walkable(pos) && self.components[self.index(pos)] == NO_COMPONENT {
                    let id = self.next_component;
                    self.next_component += 1;
                    self.flood(grid, pos, id);
                }
            }
        }
    }

    /// 4-connected flood fill. With the diagonal corner-cut rule in `find_path`,
    /// a diagonal step always has an equivalent orthogonal route, so
    /// 4-connected components are exactly the A*-reachable regions.
    fn flood(&mut self, grid: &TileGrid, start: TilePos, id: u32) {
        let mut queue = VecDeque::new();
        let start_idx = self.index(start);
        self.components[start_idx] = id;
        queue.push_back(start);

        while let Some(pos) = queue.pop_front() {
            let orthogonal = [
                TilePos::new(pos.x - 1, pos.y),
                TilePos::new(pos.x + 1, pos.y),
                TilePos::new(pos.x, pos.y - 1),
                TilePos::new(pos.x, pos.y + 1),
            ];
            for next in orthogonal {
                if grid.is_walkable(next) && self.components[self.index(next)] == NO_COMPONENT {
                    let next_idx = self.index(next);
                    self.components[next_idx] = id;
                    queue.push_back(next);
                }
            }
        }
    }

    /// Find a route from `from` to `to`.
    ///
    /// Returns `None` when the tiles are in different components (checked
    /// before any node is expanded), when the node budget runs out, or when
    /// the search exhausts the frontier. `None` is an expected outcome -
    /// callers try other work, they do not treat it as an error.
    pub fn find_path(&mut self, grid: &TileGrid, from: TilePos, to: TilePos) -> Option<Path> {
        if !self.same_component(from, to) {
            return None;
        }
        if from == to {
            return Some(Path::new(vec![from], 0.0));
        }

        let mut frontier = BinaryHeap::new();
        let mut came_from: HashMap<TilePos, TilePos> = HashMap::new();
        let mut g_score: HashMap<TilePos, f32> = HashMap::new();

        g_score.insert(from, 0.0);
        frontier.push(FrontierNode {
            f: octile(from, to),
            h: octile(from, to),
            pos: from,
        });

        let mut expanded = 0usize;

        while let Some(node) = frontier.pop() {
            let current = node.pos;
            let current_g = g_score[&current];

            // Stale frontier entry from a better route found later.
            if node.f > current_g + octile(current, to) + 1e-3 {
                continue;
            }

            if current == to {
                self.nodes_expanded += expanded as u64;
                return Some(Path::new(reconstruct(&came_from, current), current_g));
            }

            expanded += 1;
            if expanded > self.max_expanded {
                self.nodes_expanded += expanded as u64;
                return None;
            }

            for next in current.neighbors8() {
                if !grid.is_walkable(next) {
                    continue;
                }
                let dx = next.x - current.x;
                let dy = next.y - current.y;
                let diagonal = dx != 0 && dy != 0;
                // No cutting corners past a blocked orthogonal tile.
                if diagonal
                    && (!grid.is_walkable(TilePos::new(current.x + dx, current.y))
                        || !grid.is_walkable(TilePos::new(current.x, current.y + dy)))
                {
                    continue;
                }

                let step = if diagonal { SQRT_2 } else { 1.0 };
                let tentative = current_g + step + grid.traffic_cost(next);
                if tentative < *g_score.get(&next).unwrap_or(&f32::INFINITY) {
                    g_score.insert(next, tentative);
                    came_from.insert(next, current);
                    let h = octile(next, to);
                    frontier.push(FrontierNode {
                        f: tentative + h,
                        h,
                        pos: next,
                    });
                }
            }
        }

        self.nodes_expanded += expanded as u64;
        None
    }

    /// Find a route to any walkable tile on the ring surrounding `area`
    /// (structure footprints are blocked, so agents stop at the perimeter).
    ///
    /// Ring tiles are tried nearest-first by octile distance; the component
    /// pre-check keeps unreachable candidates cheap to reject.
    pub fn find_path_to_rect(
        &mut self,
        grid: &TileGrid,
        from: TilePos,
        area: Rect,
    ) -> Option<Path> {
        if area.contains(from) && grid.is_walkable(from) {
            return Some(Path::new(vec![from], 0.0));
        }

        let mut ring: Vec<TilePos> = area
            .dilated()
            .tiles()
            .filter(|pos| !area.contains(*pos) && grid.is_walkable(*pos))
            .collect();
        ring.sort_by(|a, b| {
            octile(from, *a)
                .partial_cmp(&octile(from, *b))
                .unwrap_or(Ordering::Equal)
                .then(a.cmp(b))
        });

        for target in ring {
            if let Some(path) = self.find_path(grid, from, target) {
                return Some(path);
            }
        }
        None
    }
}

/// Octile distance: admissible for 8-directional movement with unit step cost
/// and non-negative traffic weights.
fn octile(a: TilePos, b: TilePos) -> f32 {
    let dx = (a.x - b.x).abs() as f32;
    let dy = (a.y - b.y).abs() as f32;
    dx.max(dy) + (SQRT_2 - 1.0) * dx.min(dy)
}

fn reconstruct(came_from: &HashMap<TilePos, TilePos>, goal: TilePos) -> Vec<TilePos> {
    let mut waypoints = vec![goal];
    let mut current = goal;
    while let Some(&prev) = came_from.get(&current) {
        waypoints.push(prev);
        current = prev;
    }
    waypoints.reverse();
    waypoints
}
