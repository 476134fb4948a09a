//! Ancestor walks and cross-tree correspondence.
//!
//! Every walk here is O(depth). Correspondence lookups replay a descent
//! trace, so they are only meaningful while the two trees are still
//! structurally identical (right after a clone).

use super::FeatureTree;
use crate::error::TreeError;
use crate::models::{FeatureId, PlacementId, ValueId};

impl FeatureTree {
    /// `id` followed by each of its ancestors, ending at the root.
    pub fn path_to_root(&self, id: FeatureId) -> Result<Vec<FeatureId>, TreeError> {
        let mut path = vec![id];
        let mut current = self.feature(id)?;
        while let Some(link) = current.parent {
            path.push(link.feature);
            current = self.feature(link.feature)?;
        }
        Ok(path)
    }

    pub fn find_root(&self, id: FeatureId) -> Result<FeatureId, TreeError> {
        let mut current = id;
        while let Some(link) = self.feature(current)?.parent {
            current = link.feature;
        }
        Ok(current)
    }

    pub fn is_root(&self, id: FeatureId) -> Result<bool, TreeError> {
        Ok(self.feature(id)?.is_root())
    }

    /// Is `f` in the tree rooted at `root` (ancestor-or-self)?
    pub fn is_in_tree(&self, root: FeatureId, f: FeatureId) -> Result<bool, TreeError> {
        Ok(self.trace_from(root, f)?.is_some())
    }

    /// The child indices leading from `root` down to `f`, or `None` when
    /// `f` is not under `root`.
    pub fn trace_from(
        &self,
        root: FeatureId,
        f: FeatureId,
    ) -> Result<Option<Vec<usize>>, TreeError> {
        let mut trace = Vec::new();
        let mut current = f;
        while current != root {
            match self.feature(current)?.parent {
                Some(link) => {
                    trace.push(link.index);
                    current = link.feature;
                }
                None => return Ok(None),
            }
        }
        trace.reverse();
        Ok(Some(trace))
    }

    /// Follow `trace` downward from `start`.
    pub fn descend(&self, start: FeatureId, trace: &[usize]) -> Result<FeatureId, TreeError> {
        trace
            .iter()
            .try_fold(start, |node, &ix| self.subfeature(node, ix))
    }

    /// The Feature of `new_root`'s tree at the same position that `f`
    /// occupies under `old_root`.
    pub fn find_corresponding(
        &self,
        old_root: FeatureId,
        f: FeatureId,
        new_root: FeatureId,
    ) -> Result<Option<FeatureId>, TreeError> {
        match self.trace_from(old_root, f)? {
            Some(trace) => self.descend(new_root, &trace).map(Some),
            None => Ok(None),
        }
    }

    /// The placement at the same index of the owner corresponding to `p`'s
    /// owner.
    pub fn find_corresponding_placement(
        &self,
        old_root: FeatureId,
        p: PlacementId,
        new_root: FeatureId,
    ) -> Result<Option<PlacementId>, TreeError> {
        let Some(owner) = self.find_corresponding(old_root, p.owner, new_root)? else {
            return Ok(None);
        };
        let found = PlacementId {
            owner,
            index: p.index,
        };
        self.placement(found)?;
        Ok(Some(found))
    }

    pub fn find_corresponding_value(
        &self,
        old_root: FeatureId,
        v: ValueId,
        new_root: FeatureId,
    ) -> Result<Option<ValueId>, TreeError> {
        let Some(owner) = self.find_corresponding(old_root, v.owner, new_root)? else {
            return Ok(None);
        };
        let found = ValueId {
            owner,
            index: v.index,
        };
        self.placement_value(found)?;
        Ok(Some(found))
    }

    /// Is placement `p` owned by a Feature in the tree rooted at `root`?
    pub fn is_placement_in_tree(&self, root: FeatureId, p: PlacementId) -> Result<bool, TreeError> {
        match self.placement(p)?.owner() {
            Some(owner) => self.is_in_tree(root, owner),
            None => Ok(false),
        }
    }

    /// The deepest Feature that is an ancestor-or-self of both `f1` and
    /// `f2`, or `None` when they are on different trees.
    pub fn youngest_common_ancestor(
        &self,
        f1: FeatureId,
        f2: FeatureId,
    ) -> Result<Option<FeatureId>, TreeError> {
        let p1 = self.path_to_root(f1)?;
        let p2 = self.path_to_root(f2)?;

        // Walk down from the root ends until the paths diverge.
        let ancestor = p1
            .iter()
            .rev()
            .zip(p2.iter().rev())
            .take_while(|(a, b)| a == b)
            .last()
            .map(|(a, _)| *a);
        Ok(ancestor)
    }
}
