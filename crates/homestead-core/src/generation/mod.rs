//! Generation - procedural creation of the world, nodes, and citizens.

mod citizens;
mod names;
mod world;

pub use citizens::*;
pub use names::*;
pub use world::*;
