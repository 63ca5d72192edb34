//! Colony stockpile - material totals with bounded storage capacity.

use std::collections::BTreeMap;

use homestead_logic::catalog::Material;
use homestead_logic::grid::Rect;
use log::warn;
use serde::{Deserialize, Serialize};

/// Base capacity the settlers' wagon provides.
pub const BASE_CAPACITY: u32 = 500;

/// The shared stockpile every gatherer deposits into and every hauler
/// withdraws from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stockpile {
    stored: BTreeMap<Material, u32>,
    base_capacity: u32,
    /// Capacity added by completed storage buildings.
    bonus_capacity: u32,
    /// Footprint of the drop-off structure (the wagon); citizens stop on
    /// the surrounding ring.
    dropoff: Rect,
}

impl Stockpile {
    pub fn new(dropoff: Rect) -> Self {
        Self {
            stored: BTreeMap::new(),
            base_capacity: BASE_CAPACITY,
            bonus_capacity: 0,
            dropoff,
        }
    }

    pub fn dropoff(&self) -> Rect {
        self.dropoff
    }

    pub fn stock(&self, material: Material) -> u32 {
        self.stored.get(&material).copied().unwrap_or(0)
    }

    pub fn total_stored(&self) -> u32 {
        self.stored.values().sum()
    }

    pub fn capacity(&self) -> u32 {
        self.base_capacity + self.bonus_capacity
    }

    pub fn remaining_space(&self) -> u32 {
        self.capacity().saturating_sub(self.total_stored())
    }

    pub fn can_accept(&self, amount: u32) -> bool {
        self.remaining_space() >= amount
    }

    /// Deposit goods. Returns false (and stores nothing) when the stockpile
    /// cannot hold the full amount - partial deposits would strand carriers
    /// with a remainder they have nowhere to put.
    pub fn deposit(&mut self, material: Material, amount: u32) -> bool {
        if !self.can_accept(amount) {
            warn!(
                "stockpile full ({}/{}), rejecting {} {:?}",
                self.total_stored(),
                self.capacity(),
                amount,
                material
            );
            return false;
        }
        *self.stored.entry(material).or_insert(0) += amount;
        true
    }

    /// Withdraw up to `amount`, returning what was actually available.
    pub fn withdraw(&mut self, material: Material, amount: u32) -> u32 {
        let available = self.stock(material);
        let taken = amount.min(available);
        if taken > 0 {
            self.stored.insert(material, available - taken);
        }
        taken
    }

    /// Grant extra capacity from a completed storage building.
    pub fn add_capacity_bonus(&mut self, bonus: u32) {
        self.bonus_capacity += bonus;
    }

    /// Seed starting stocks at world generation.
    pub fn set_stock(&mut self, material: Material, amount: u32) {
        self.stored.insert(material, amount);
    }
}
