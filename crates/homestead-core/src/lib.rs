//! Homestead Core - Colony Simulation Engine
//!
//! An ECS-based simulation of a grid colony: autonomous citizens gather
//! designated resources, haul materials, and raise buildings through a
//! materials-gated construction lifecycle, routed by an A* planner with
//! connected-component pruning.
//!
//! # Architecture
//!
//! The simulation uses an Entity Component System (ECS) architecture via
//! `hecs` for the citizen population, while buildings, resource nodes, and
//! the stockpile live in flat id-keyed ledgers:
//! - **Components**: Pure data attached to citizens (Position, Movement,
//!   Assignment, WorkSkills, ...)
//! - **Systems**: Scheduler, movement, and the agent controller, run in a
//!   fixed order each tick
//! - **Ledgers**: `ConstructionLedger`, `ResourceRegistry`, `Stockpile`
//!
//! # Example
//!
//! ```rust,no_run
//! use homestead_core::prelude::*;
//! use homestead_core::generation::WorldConfig;
//!
//! let mut engine = SimulationEngine::new(WorldConfig::default());
//!
//! // Mark everything near the settlement for gathering.
//! use homestead_logic::grid::Rect;
//! engine.designate_region(Rect::new(30, 30, 36, 36), None);
//!
//! // Run simulation
//! loop {
//!     engine.update(1.0 / 60.0); // 60 FPS
//! }
//! ```

pub mod components;
pub mod engine;
pub mod generation;
pub mod persistence;
pub mod snapshot;
pub mod systems;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::engine::{PlacementError, SimulationEngine};
    pub use crate::generation::WorldConfig;
    pub use crate::snapshot::WorldSnapshot;
    pub use crate::systems::{BuildingState, ConstructionLedger, ResourceRegistry, Stockpile};
}
