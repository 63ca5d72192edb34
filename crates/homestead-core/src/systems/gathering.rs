//! Resource registry - designated, harvestable nodes and their depletion.

use std::collections::BTreeMap;

use homestead_logic::catalog::{Material, ResourceKind};
use homestead_logic::grid::{Rect, TilePos};
use log::info;
use serde::{Deserialize, Serialize};

use crate::components::{CitizenId, NodeId};

/// A harvestable node in the world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceNode {
    pub id: NodeId,
    pub kind: ResourceKind,
    pub pos: TilePos,
    pub amount_remaining: u32,
    pub max_amount: u32,
    /// Player intent: eligible for automatic gathering work.
    pub designated: bool,
    /// Exclusive claim by the one citizen currently gathering here.
    pub locked_by: Option<CitizenId>,
    pub depleted: bool,
}

impl ResourceNode {
    fn new(id: NodeId, kind: ResourceKind, pos: TilePos) -> Self {
        let max = kind.spec().max_amount;
        Self {
            id,
            kind,
            pos,
            amount_remaining: max,
            max_amount: max,
            designated: false,
            locked_by: None,
            depleted: false,
        }
    }

    /// True when the scheduler may hand this node to a citizen.
    pub fn available(&self) -> bool {
        self.designated && !self.depleted && self.locked_by.is_none()
    }
}

/// All resource nodes, keyed by id. BTreeMap for deterministic iteration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceRegistry {
    nodes: BTreeMap<NodeId, ResourceNode>,
    next_id: u32,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: ResourceKind, pos: TilePos) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, ResourceNode::new(id, kind, pos));
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&ResourceNode> {
        self.nodes.get(&id)
    }

    /// Nodes in ascending id order.
    pub fn nodes(&self) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Mark a node for gathering. Depleted nodes cannot be designated.
    pub fn designate(&mut self, id: NodeId) -> bool {
        match self.nodes.get_mut(&id) {
            Some(node) if !node.depleted => {
                node.designated = true;
                true
            }
            _ => false,
        }
    }

    /// Clear the designation. Any in-flight gather cancels on its next tick.
    pub fn undesignate(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.designated = false;
        }
    }

    /// Designate every node in `area`, optionally filtered by kind.
    /// Returns how many nodes were marked.
    pub fn designate_region(&mut self, area: Rect, kind: Option<ResourceKind>) -> usize {
        let mut marked = 0;
        for node in self.nodes.values_mut() {
            if node.depleted || !area.contains(node.pos) {
                continue;
            }
            if kind.map(|k| k == node.kind).unwrap_or(true) && !node.designated {
                node.designated = true;
                marked += 1;
            }
        }
        if marked > 0 {
            info!("designated {} nodes in {:?}", marked, area);
        }
        marked
    }

    /// Clear designations over `area`.
    pub fn undesignate_region(&mut self, area: Rect) {
        for node in self.nodes.values_mut() {
            if area.contains(node.pos) {
                node.designated = false;
            }
        }
    }

    /// Claim a node for `citizen`. Succeeds only if the node is designated,
    /// not depleted, and unclaimed - at most one citizen per node, ever.
    pub fn try_lock(&mut self, id: NodeId, citizen: CitizenId) -> bool {
        match self.nodes.get_mut(&id) {
            Some(node) if node.available() => {
                node.locked_by = Some(citizen);
                true
            }
            _ => false,
        }
    }

    /// Release a node's claim. A no-op on unlocked nodes.
    pub fn release(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.locked_by = None;
        }
    }

    /// Harvest one load from a locked node.
    ///
    /// Only valid while locked; removes `min(per_harvest, remaining)` units.
    /// Reaching zero marks the node depleted and releases the lock
    /// unconditionally, so depleted nodes can never leak a claim.
    pub fn harvest(&mut self, id: NodeId) -> Option<(Material, u32)> {
        let node = self.nodes.get_mut(&id)?;
        if node.locked_by.is_none() || node.depleted {
            return None;
        }

        let spec = node.kind.spec();
        let amount = spec.per_harvest.min(node.amount_remaining);
        node.amount_remaining -= amount;

        if node.amount_remaining == 0 {
            node.depleted = true;
            node.locked_by = None;
            info!("{} {} depleted at {:?}", node.id, spec.name, node.pos);
        }

        if amount == 0 {
            None
        } else {
            Some((spec.yields, amount))
        }
    }
}
