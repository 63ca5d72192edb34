//! Component definitions for the ECS simulation.
//!
//! Components are pure data structs attached to entities.
//! They have no behavior - that lives in systems.

mod citizens;
mod common;

pub use citizens::*;
pub use common::*;
