//! Work skills and progression.
//!
//! Citizens carry an integer skill level (0–20) per work category. The level
//! feeds a work-speed multiplier, and practice slowly raises it.

use serde::{Deserialize, Serialize};

/// Maximum attainable skill level.
pub const MAX_LEVEL: u8 = 20;

/// Experience required to advance one level.
pub const XP_PER_LEVEL: f32 = 100.0;

/// The work categories the scheduler assigns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkCategory {
    Hauling,
    Building,
    Gathering,
}

impl WorkCategory {
    /// All categories in scheduler priority order.
    pub const ALL: [WorkCategory; 3] = [
        WorkCategory::Hauling,
        WorkCategory::Building,
        WorkCategory::Gathering,
    ];
}

/// A citizen's skill levels and accumulated practice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkSkills {
    pub hauling: u8,
    pub building: u8,
    pub gathering: u8,
    xp_hauling: f32,
    xp_building: f32,
    xp_gathering: f32,
}

impl WorkSkills {
    pub fn new(hauling: u8, building: u8, gathering: u8) -> Self {
        Self {
            hauling: hauling.min(MAX_LEVEL),
            building: building.min(MAX_LEVEL),
            gathering: gathering.min(MAX_LEVEL),
            xp_hauling: 0.0,
            xp_building: 0.0,
            xp_gathering: 0.0,
        }
    }

    pub fn level(&self, category: WorkCategory) -> u8 {
        match category {
            WorkCategory::Hauling => self.hauling,
            WorkCategory::Building => self.building,
            WorkCategory::Gathering => self.gathering,
        }
    }

    /// Work-speed multiplier: level 0 works at base rate, level 20 at 2x.
    pub fn speed_multiplier(&self, category: WorkCategory) -> f32 {
        1.0 + self.level(category) as f32 / MAX_LEVEL as f32
    }

    /// Accumulate practice; levels up every [`XP_PER_LEVEL`] until [`MAX_LEVEL`].
    pub fn practice(&mut self, category: WorkCategory, xp: f32) {
        let (level, pool) = match category {
            WorkCategory::Hauling => (&mut self.hauling, &mut self.xp_hauling),
            WorkCategory::Building => (&mut self.building, &mut self.xp_building),
            WorkCategory::Gathering => (&mut self.gathering, &mut self.xp_gathering),
        };
        if *level >= MAX_LEVEL {
            return;
        }
        *pool += xp;
        while *pool >= XP_PER_LEVEL && *level < MAX_LEVEL {
            *pool -= XP_PER_LEVEL;
            *level += 1;
        }
    }
}
