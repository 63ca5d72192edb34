//! Citizen components: identity, state machine, work assignment, carrying.

use homestead_logic::catalog::Material;
use homestead_logic::skills::WorkCategory;
use serde::{Deserialize, Serialize};

use super::common::{BuildingId, CitizenId, NodeId};

/// Core citizen component - identity plus movement/carry stats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Citizen {
    pub id: CitizenId,
    /// Tiles per second on open ground.
    pub move_speed: f32,
    /// Most material units the citizen can carry at once.
    pub carry_capacity: u32,
}

impl Citizen {
    pub fn new(id: CitizenId) -> Self {
        Self {
            id,
            move_speed: 5.0,
            carry_capacity: 10,
        }
    }
}

/// The agent state machine. `Idle` is both the initial and the terminal
/// state of every assignment; the three action states are stationary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CitizenState {
    Idle,
    MovingToTarget,
    Gathering,
    Hauling,
    Building,
}

/// Which work categories a citizen will accept.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WorkPreferences {
    pub haul: bool,
    pub build: bool,
    pub gather: bool,
}

impl Default for WorkPreferences {
    fn default() -> Self {
        Self {
            haul: true,
            build: true,
            gather: true,
        }
    }
}

impl WorkPreferences {
    pub fn allows(&self, category: WorkCategory) -> bool {
        match category {
            WorkCategory::Hauling => self.haul,
            WorkCategory::Building => self.build,
            WorkCategory::Gathering => self.gather,
        }
    }
}

/// Carried goods - present only while the citizen holds something.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Carried {
    pub material: Material,
    pub amount: u32,
}

/// The work item a citizen is committed to.
///
/// Targets are ids into the ledger/registry, never references, so claims
/// serialize trivially and survive save/load.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Task {
    /// Fetch `material` from the stockpile and deliver it to `site`.
    Haul {
        site: BuildingId,
        material: Material,
        /// False while heading to the stockpile, true once loaded.
        picked_up: bool,
    },
    /// Apply construction work at `site`.
    Build { site: BuildingId },
    /// Harvest `node`, then carry the yield back to the stockpile.
    Gather {
        node: NodeId,
        /// True on the return leg to the stockpile.
        returning: bool,
    },
}

impl Task {
    pub fn category(&self) -> WorkCategory {
        match self {
            Task::Haul { .. } => WorkCategory::Hauling,
            Task::Build { .. } => WorkCategory::Building,
            Task::Gather { .. } => WorkCategory::Gathering,
        }
    }
}

/// Assignment component - present from scheduling until the task completes
/// or cancels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Assignment {
    pub task: Task,
    /// Seconds of action work accumulated (harvest timer).
    pub work_timer: f32,
}

impl Assignment {
    pub fn new(task: Task) -> Self {
        Self {
            task,
            work_timer: 0.0,
        }
    }
}
