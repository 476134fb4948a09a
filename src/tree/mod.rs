//! The Feature arena and its operations.
//!
//! Every Feature of every tree lives in one [`FeatureTree`]. A parent owns
//! its subfeatures and a Feature owns the placement expressions and values
//! in its sequences; everything else (parent links, owner links, active
//! placements, references inside expressions) is a handle that the arena
//! validates on use.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`names`] | Name and path validation, case-insensitive lookup, full names |
//! | [`navigator`] | Ancestor walks, youngest common ancestor, cross-tree correspondence |
//! | [`resolver`] | Owner computation and placement registration |
//! | [`cloner`] | Reference-clean subtree copies and atomic subfeature insertion |
//! | [`consistency`] | Recursive invariant checker |
//! | [`hooks`] | Per-kind follow-up after insertions and placements |
//! | [`realize`] | Stage realization ordering |

pub mod cloner;
pub mod consistency;
pub mod hooks;
pub mod names;
pub mod navigator;
pub mod realize;
pub mod resolver;

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::config::TreeConfig;
use crate::error::TreeError;
use crate::models::*;

pub use cloner::CloneMap;
pub use hooks::FeatureHooks;
pub use names::{case_insensitive_compare, is_legal_name, is_legal_path, parse_path};
pub use realize::{Stage, StageRealizer};

/// Back-reference from a Feature to the parent holding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentLink {
    pub feature: FeatureId,
    pub index: usize,
}

/// A node of the tree. Only reachable through the [`FeatureTree`] that owns
/// it.
#[derive(Debug, Clone)]
pub struct FeatureNode {
    pub(crate) id: FeatureId,
    pub(crate) uuid: Uuid,
    pub(crate) name: String,
    pub(crate) kind: FeatureKind,
    pub(crate) parent: Option<ParentLink>,
    pub(crate) subfeatures: Vec<FeatureId>,
    pub(crate) placements: Vec<Placement>,
    pub(crate) values: Vec<PlacementValue>,
    pub(crate) placement: Option<PlacementId>,
}

impl FeatureNode {
    fn new(id: FeatureId, name: &str, kind: FeatureKind) -> Self {
        Self {
            id,
            uuid: Uuid::new_v4(),
            name: name.to_string(),
            kind,
            parent: None,
            subfeatures: Vec::new(),
            placements: Vec::new(),
            values: Vec::new(),
            placement: None,
        }
    }

    pub fn id(&self) -> FeatureId {
        self.id
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FeatureKind {
        self.kind
    }

    pub fn parent(&self) -> Option<ParentLink> {
        self.parent
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn subfeatures(&self) -> &[FeatureId] {
        &self.subfeatures
    }

    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    pub fn values(&self) -> &[PlacementValue] {
        &self.values
    }

    /// The placement assigned to this Feature, possibly owned by an ancestor.
    pub fn active_placement(&self) -> Option<PlacementId> {
        self.placement
    }
}

#[derive(Debug, Clone, Default)]
struct Slot {
    generation: u32,
    node: Option<FeatureNode>,
}

/// Arena holding any number of Feature trees.
#[derive(Debug, Clone, Default)]
pub struct FeatureTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    config: TreeConfig,
    hooks: HashMap<FeatureKind, Arc<dyn FeatureHooks>>,
}

impl FeatureTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TreeConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Create a parentless Feature to serve as a prototype or model root.
    pub fn new_prototype(&mut self, name: &str, kind: FeatureKind) -> Result<FeatureId, TreeError> {
        if !is_legal_name(name) {
            return Err(TreeError::IllegalFeatureName(name.to_string()));
        }
        let id = self.allocate(|id| FeatureNode::new(id, name, kind));
        tracing::debug!("Created {} prototype {} ({})", kind, name, id);
        Ok(id)
    }

    /// Destroy a whole tree. Handles into it become stale.
    pub fn destroy_tree(&mut self, root: FeatureId) -> Result<(), TreeError> {
        let node = self.feature(root)?;
        if !node.is_root() {
            return Err(TreeError::NotARoot(self.full_name(root)?));
        }
        let doomed = self.subtree(root)?;
        tracing::debug!("Destroying tree {} ({} features)", root, doomed.len());
        for id in doomed {
            self.release(id);
        }
        Ok(())
    }

    pub fn contains(&self, id: FeatureId) -> bool {
        self.slot_node(id).is_some()
    }

    /// Number of live Features across all trees.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn feature(&self, id: FeatureId) -> Result<&FeatureNode, TreeError> {
        self.slot_node(id).ok_or(TreeError::UnknownFeature(id))
    }

    pub(crate) fn feature_mut(&mut self, id: FeatureId) -> Result<&mut FeatureNode, TreeError> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(TreeError::UnknownFeature(id))
    }

    pub fn name(&self, id: FeatureId) -> Result<&str, TreeError> {
        Ok(self.feature(id)?.name())
    }

    pub fn kind(&self, id: FeatureId) -> Result<FeatureKind, TreeError> {
        Ok(self.feature(id)?.kind)
    }

    pub fn parent(&self, id: FeatureId) -> Result<Option<FeatureId>, TreeError> {
        Ok(self.feature(id)?.parent.map(|link| link.feature))
    }

    pub fn subfeatures(&self, id: FeatureId) -> Result<&[FeatureId], TreeError> {
        Ok(self.feature(id)?.subfeatures())
    }

    pub fn subfeature(&self, id: FeatureId, index: usize) -> Result<FeatureId, TreeError> {
        self.feature(id)?
            .subfeatures
            .get(index)
            .copied()
            .ok_or(TreeError::UnknownFeature(id))
    }

    pub fn active_placement(&self, id: FeatureId) -> Result<Option<PlacementId>, TreeError> {
        Ok(self.feature(id)?.placement)
    }

    pub fn placement(&self, id: PlacementId) -> Result<&Placement, TreeError> {
        let owner = self.feature(id.owner)?;
        owner
            .placements
            .get(id.index)
            .ok_or_else(|| TreeError::UnknownPlacement {
                owner: self.display_name(id.owner),
                index: id.index,
            })
    }

    pub fn placement_value(&self, id: ValueId) -> Result<&PlacementValue, TreeError> {
        let owner = self.feature(id.owner)?;
        owner
            .values
            .get(id.index)
            .ok_or_else(|| TreeError::UnknownPlacement {
                owner: self.display_name(id.owner),
                index: id.index,
            })
    }

    /// `id` and all its descendants, parents before children.
    pub fn subtree(&self, id: FeatureId) -> Result<Vec<FeatureId>, TreeError> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let node = self.feature(next)?;
            out.push(next);
            stack.extend(node.subfeatures.iter().rev());
        }
        Ok(out)
    }

    /// Serializable copy of the subtree rooted at `id`.
    pub fn snapshot(&self, id: FeatureId) -> Result<FeatureSnapshot, TreeError> {
        let node = self.feature(id)?;
        let (placement_owner, placement) = match node.placement {
            Some(pid) => (
                Some(self.full_name(pid.owner)?),
                Some(self.describe_expr(self.placement(pid)?.expr())),
            ),
            None => (None, None),
        };
        let children = node
            .subfeatures
            .iter()
            .map(|child| self.snapshot(*child))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FeatureSnapshot {
            id: node.uuid,
            name: node.name.clone(),
            full_name: self.full_name(id)?,
            kind: node.kind,
            placement_owner,
            placement,
            placement_count: node.placements.len(),
            value_count: node.values.len(),
            children,
        })
    }

    /// Printable form of an expression with Feature references spelled as
    /// full names.
    pub fn describe_expr(&self, expr: &PlacementExpr) -> String {
        match expr {
            PlacementExpr::Constant(c) => c.to_string(),
            PlacementExpr::Feature { feature, category } => {
                format!("{}:{}", self.display_name(*feature), category)
            }
            PlacementExpr::Op { op, operands, .. } => {
                let args: Vec<_> = operands.iter().map(|o| self.describe_expr(o)).collect();
                format!("{}({})", op, args.join(", "))
            }
        }
    }

    /// Full name for messages; falls back to the handle when it is stale.
    pub(crate) fn display_name(&self, id: FeatureId) -> String {
        self.full_name(id).unwrap_or_else(|_| id.to_string())
    }

    /// Run the consistency checker on the tree holding `id` when configured
    /// to do so.
    pub(crate) fn verify_if_configured(&self, id: FeatureId) -> Result<(), TreeError> {
        if !self.config.verify_after_mutation {
            return Ok(());
        }
        let root = self.find_root(id)?;
        match self.check_tree(root).into_iter().next() {
            Some(violation) => Err(violation.into()),
            None => Ok(()),
        }
    }

    fn slot_node(&self, id: FeatureId) -> Option<&FeatureNode> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    pub(crate) fn allocate(&mut self, build: impl FnOnce(FeatureId) -> FeatureNode) -> FeatureId {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        let id = FeatureId::new(index, slot.generation);
        slot.node = Some(build(id));
        id
    }

    pub(crate) fn release(&mut self, id: FeatureId) {
        if let Some(slot) = self.slots.get_mut(id.index as usize) {
            if slot.generation == id.generation && slot.node.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(id.index);
            }
        }
    }
}
