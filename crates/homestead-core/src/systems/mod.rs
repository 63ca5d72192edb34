//! Systems - logic that operates on components and the shared ledgers.

mod agents;
mod construction;
mod gathering;
mod movement;
mod scheduler;
mod stockpile;

pub use agents::*;
pub use construction::*;
pub use gathering::*;
pub use movement::*;
pub use scheduler::*;
pub use stockpile::*;

use homestead_logic::grid::TileGrid;
use homestead_logic::pathfinding::PathPlanner;

/// Mutable view of the shared simulation state, passed to each system for
/// one tick. No system reaches for globals; everything flows through here.
pub struct TickContext<'a> {
    pub grid: &'a TileGrid,
    pub planner: &'a mut PathPlanner,
    pub ledger: &'a mut ConstructionLedger,
    pub registry: &'a mut ResourceRegistry,
    pub stockpile: &'a mut Stockpile,
}
