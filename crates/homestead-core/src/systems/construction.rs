//! Construction ledger - building sites, material deliveries, and progress.

use std::collections::{BTreeMap, BTreeSet};

use homestead_logic::catalog::{BuildingKind, Material};
use homestead_logic::grid::{Rect, TilePos};
use log::info;
use serde::{Deserialize, Serialize};

use crate::components::{BuildingId, CitizenId};

/// Construction lifecycle. `Complete` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildingState {
    /// Placed, waiting for materials.
    Planned,
    /// All materials delivered, accumulating work.
    UnderConstruction,
    Complete,
}

/// A building instance and its construction bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingSite {
    pub id: BuildingId,
    pub kind: BuildingKind,
    /// Top-left corner of the footprint.
    pub origin: TilePos,
    pub state: BuildingState,
    delivered: BTreeMap<Material, u32>,
    /// At most one hauler per material slot.
    haul_claims: BTreeMap<Material, CitizenId>,
    progress: f32,
    builders: BTreeSet<CitizenId>,
}

impl BuildingSite {
    fn new(id: BuildingId, kind: BuildingKind, origin: TilePos) -> Self {
        let state = if kind.prebuilt() {
            BuildingState::Complete
        } else {
            BuildingState::Planned
        };
        Self {
            id,
            kind,
            origin,
            state,
            delivered: BTreeMap::new(),
            haul_claims: BTreeMap::new(),
            progress: 0.0,
            builders: BTreeSet::new(),
        }
    }

    pub fn footprint(&self) -> Rect {
        let spec = self.kind.spec();
        Rect::new(self.origin.x, self.origin.y, spec.width, spec.height)
    }

    pub fn required(&self, material: Material) -> u32 {
        self.kind
            .spec()
            .costs
            .iter()
            .find(|(m, _)| *m == material)
            .map(|(_, amount)| *amount)
            .unwrap_or(0)
    }

    pub fn delivered(&self, material: Material) -> u32 {
        self.delivered.get(&material).copied().unwrap_or(0)
    }

    /// Units of `material` still to be hauled in.
    pub fn outstanding(&self, material: Material) -> u32 {
        self.required(material).saturating_sub(self.delivered(material))
    }

    /// Materials still missing, in catalog cost order.
    pub fn missing_materials(&self) -> Vec<(Material, u32)> {
        self.kind
            .spec()
            .costs
            .iter()
            .filter_map(|(m, _)| {
                let left = self.outstanding(*m);
                (left > 0).then_some((*m, left))
            })
            .collect()
    }

    pub fn has_all_materials(&self) -> bool {
        self.missing_materials().is_empty()
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn work_total(&self) -> f32 {
        self.kind.spec().work
    }

    pub fn hauler(&self, material: Material) -> Option<CitizenId> {
        self.haul_claims.get(&material).copied()
    }

    pub fn builder_count(&self) -> u32 {
        self.builders.len() as u32
    }

    pub fn has_builder(&self, citizen: CitizenId) -> bool {
        self.builders.contains(&citizen)
    }

    /// True when the scheduler may send another builder here.
    pub fn wants_builders(&self) -> bool {
        self.state == BuildingState::UnderConstruction
            && self.builder_count() < self.kind.spec().max_builders
    }
}

/// All building sites, keyed by id. BTreeMap for deterministic iteration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstructionLedger {
    sites: BTreeMap<BuildingId, BuildingSite>,
    next_id: u32,
}

impl ConstructionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new site. Prebuilt kinds (the wagon) start `Complete`;
    /// kinds with no material costs skip straight to `UnderConstruction`.
    pub fn register(&mut self, kind: BuildingKind, origin: TilePos) -> BuildingId {
        let id = BuildingId(self.next_id);
        self.next_id += 1;
        let mut site = BuildingSite::new(id, kind, origin);
        if site.state == BuildingState::Planned && site.has_all_materials() {
            site.state = BuildingState::UnderConstruction;
        }
        info!("{} {} registered at {:?}", id, kind.spec().name, origin);
        self.sites.insert(id, site);
        id
    }

    pub fn site(&self, id: BuildingId) -> Option<&BuildingSite> {
        self.sites.get(&id)
    }

    /// Sites in ascending id order.
    pub fn sites(&self) -> impl Iterator<Item = &BuildingSite> {
        self.sites.values()
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn state(&self, id: BuildingId) -> Option<BuildingState> {
        self.sites.get(&id).map(|s| s.state)
    }

    /// Deliver materials to a site, clamped to what is still required.
    /// Returns the accepted amount. The delivery that satisfies the last
    /// requirement flips the site to `UnderConstruction` on the same tick.
    pub fn deliver(&mut self, id: BuildingId, material: Material, amount: u32) -> u32 {
        let Some(site) = self.sites.get_mut(&id) else {
            return 0;
        };
        if site.state != BuildingState::Planned {
            return 0;
        }

        let accepted = amount.min(site.outstanding(material));
        if accepted > 0 {
            *site.delivered.entry(material).or_insert(0) += accepted;
        }

        if site.has_all_materials() {
            site.state = BuildingState::UnderConstruction;
            info!("{} {} has all materials, construction can begin", site.id, site.kind.spec().name);
        }
        accepted
    }

    /// Apply construction work. A no-op unless the site is under
    /// construction. Returns true on the call that completes the building.
    pub fn apply_work(&mut self, id: BuildingId, amount: f32) -> bool {
        let Some(site) = self.sites.get_mut(&id) else {
            return false;
        };
        if site.state != BuildingState::UnderConstruction {
            return false;
        }

        site.progress += amount;
        if site.progress >= site.work_total() {
            site.progress = site.work_total();
            site.state = BuildingState::Complete;
            site.builders.clear();
            site.haul_claims.clear();
            info!("{} {} complete", site.id, site.kind.spec().name);
            return true;
        }
        false
    }

    /// Claim the haul slot for one material of one site. At most one hauler
    /// per (site, material) at a time.
    pub fn claim_haul(&mut self, id: BuildingId, material: Material, citizen: CitizenId) -> bool {
        let Some(site) = self.sites.get_mut(&id) else {
            return false;
        };
        if site.state != BuildingState::Planned
            || site.outstanding(material) == 0
            || site.haul_claims.contains_key(&material)
        {
            return false;
        }
        site.haul_claims.insert(material, citizen);
        true
    }

    /// Release a haul claim if `citizen` still holds it. Idempotent.
    pub fn release_haul(&mut self, id: BuildingId, material: Material, citizen: CitizenId) {
        if let Some(site) = self.sites.get_mut(&id) {
            if site.haul_claims.get(&material) == Some(&citizen) {
                site.haul_claims.remove(&material);
            }
        }
    }

    /// Take a builder slot. Bounded by the kind's `max_builders`.
    pub fn add_builder(&mut self, id: BuildingId, citizen: CitizenId) -> bool {
        let Some(site) = self.sites.get_mut(&id) else {
            return false;
        };
        if !site.wants_builders() {
            return false;
        }
        site.builders.insert(citizen)
    }

    /// Free a builder slot. Idempotent.
    pub fn remove_builder(&mut self, id: BuildingId, citizen: CitizenId) {
        if let Some(site) = self.sites.get_mut(&id) {
            site.builders.remove(&citizen);
        }
    }

    /// Tear a site down, returning it so the caller can free its tiles.
    pub fn remove(&mut self, id: BuildingId) -> Option<BuildingSite> {
        let site = self.sites.remove(&id);
        if let Some(ref site) = site {
            info!("{} {} removed", site.id, site.kind.spec().name);
        }
        site
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn house_site() -> (ConstructionLedger, BuildingId) {
        let mut ledger = ConstructionLedger::new();
        let id = ledger.register(BuildingKind::House, TilePos::new(4, 4));
        (ledger, id)
    }

    #[test]
    fn test_registration_states() {
        let mut ledger = ConstructionLedger::new();
        let house = ledger.register(BuildingKind::House, TilePos::new(0, 0));
        let wagon = ledger.register(BuildingKind::Wagon, TilePos::new(10, 10));

        assert_eq!(ledger.state(house), Some(BuildingState::Planned));
        assert_eq!(ledger.state(wagon), Some(BuildingState::Complete));
    }

    #[test]
    fn test_delivery_flips_state_on_final_delivery() {
        // House requires wood 20, stone 10.
        let (mut ledger, id) = house_site();

        assert_eq!(ledger.deliver(id, Material::Wood, 20), 20);
        assert_eq!(ledger.deliver(id, Material::Stone, 5), 5);
        assert_eq!(ledger.state(id), Some(BuildingState::Planned));

        assert_eq!(ledger.deliver(id, Material::Stone, 5), 5);
        assert_eq!(ledger.state(id), Some(BuildingState::UnderConstruction));
    }

    #[test]
    fn test_delivery_clamps_to_required() {
        let (mut ledger, id) = house_site();
        assert_eq!(ledger.deliver(id, Material::Wood, 50), 20);
        assert_eq!(ledger.site(id).unwrap().delivered(Material::Wood), 20);
        // Materials the kind never asked for are rejected outright.
        assert_eq!(ledger.deliver(id, Material::Iron, 5), 0);
    }

    #[test]
    fn test_work_gated_on_state() {
        let (mut ledger, id) = house_site();

        // Still planned - work is a no-op.
        assert!(!ledger.apply_work(id, 1000.0));
        assert_eq!(ledger.site(id).unwrap().progress(), 0.0);

        ledger.deliver(id, Material::Wood, 20);
        ledger.deliver(id, Material::Stone, 10);

        assert!(!ledger.apply_work(id, 60.0));
        assert!(ledger.apply_work(id, 60.0));
        assert_eq!(ledger.state(id), Some(BuildingState::Complete));

        // Complete is terminal.
        assert!(!ledger.apply_work(id, 60.0));
        assert_eq!(ledger.deliver(id, Material::Wood, 5), 0);
    }

    #[test]
    fn test_progress_capped_at_total() {
        let (mut ledger, id) = house_site();
        ledger.deliver(id, Material::Wood, 20);
        ledger.deliver(id, Material::Stone, 10);
        ledger.apply_work(id, 1e6);
        let site = ledger.site(id).unwrap();
        assert_eq!(site.progress(), site.work_total());
    }

    #[test]
    fn test_haul_claims_exclusive_per_material() {
        let (mut ledger, id) = house_site();

        assert!(ledger.claim_haul(id, Material::Wood, CitizenId(1)));
        assert!(!ledger.claim_haul(id, Material::Wood, CitizenId(2)));
        // A different material of the same site is a different slot.
        assert!(ledger.claim_haul(id, Material::Stone, CitizenId(2)));

        // Only the holder can release.
        ledger.release_haul(id, Material::Wood, CitizenId(2));
        assert_eq!(ledger.site(id).unwrap().hauler(Material::Wood), Some(CitizenId(1)));
        ledger.release_haul(id, Material::Wood, CitizenId(1));
        assert!(ledger.claim_haul(id, Material::Wood, CitizenId(2)));
    }

    #[test]
    fn test_haul_claim_rejected_when_satisfied() {
        let (mut ledger, id) = house_site();
        ledger.deliver(id, Material::Wood, 20);
        assert!(!ledger.claim_haul(id, Material::Wood, CitizenId(1)));
    }

    #[test]
    fn test_builder_slots_bounded() {
        let (mut ledger, id) = house_site();
        ledger.deliver(id, Material::Wood, 20);
        ledger.deliver(id, Material::Stone, 10);

        let max = BuildingKind::House.spec().max_builders;
        for i in 0..max {
            assert!(ledger.add_builder(id, CitizenId(i)));
        }
        assert!(!ledger.add_builder(id, CitizenId(99)));

        ledger.remove_builder(id, CitizenId(0));
        assert!(ledger.add_builder(id, CitizenId(99)));
    }

    #[test]
    fn test_builders_rejected_before_materials() {
        let (mut ledger, id) = house_site();
        assert!(!ledger.add_builder(id, CitizenId(0)));
    }

    #[test]
    fn test_footprint() {
        let (ledger, id) = house_site();
        let fp = ledger.site(id).unwrap().footprint();
        assert!(fp.contains(TilePos::new(4, 4)));
        assert!(fp.contains(TilePos::new(6, 6)));
        assert!(!fp.contains(TilePos::new(7, 4)));
    }
}
