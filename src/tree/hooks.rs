//! Kind-specific follow-up after structural edits.
//!
//! Inserting a subfeature ends with the hook of the parent's kind; placing a
//! Feature ends with the hook of the placed Feature's kind. Both run before
//! the edit's final checks, so a failing hook fails the edit and the edit
//! is rolled back.
//!
//! Built in: a constant Direction placement has its value slot normalized,
//! and a zero-length one is rejected. Further behavior per kind can be
//! added with [`FeatureTree::register_hooks`].

use std::fmt;
use std::sync::Arc;

use super::FeatureTree;
use crate::error::TreeError;
use crate::models::{FeatureId, FeatureKind, PlacementConstant};

/// Extra per-kind work run after insertions and placements.
///
/// On error the edit is undone, but only the edit itself: a hook that
/// changes other parts of the tree before failing must undo that itself.
pub trait FeatureHooks: fmt::Debug + Send + Sync {
    /// `child` was just attached as the last subfeature of `parent`.
    fn post_process_new_subfeature(
        &self,
        _tree: &mut FeatureTree,
        _parent: FeatureId,
        _child: FeatureId,
    ) -> Result<(), TreeError> {
        Ok(())
    }

    /// `feature` just received a new active placement.
    fn post_process_new_placement(
        &self,
        _tree: &mut FeatureTree,
        _feature: FeatureId,
    ) -> Result<(), TreeError> {
        Ok(())
    }
}

impl FeatureTree {
    /// Install `hooks` for Features of `kind`, replacing any earlier ones.
    pub fn register_hooks(&mut self, kind: FeatureKind, hooks: Arc<dyn FeatureHooks>) {
        tracing::debug!("Registered hooks for {}: {:?}", kind, hooks);
        self.hooks.insert(kind, hooks);
    }

    pub(crate) fn post_process_new_subfeature(
        &mut self,
        parent: FeatureId,
        child: FeatureId,
    ) -> Result<(), TreeError> {
        let kind = self.kind(parent)?;
        match self.hooks.get(&kind).cloned() {
            Some(hooks) => hooks.post_process_new_subfeature(self, parent, child),
            None => Ok(()),
        }
    }

    pub(crate) fn post_process_new_placement(&mut self, f: FeatureId) -> Result<(), TreeError> {
        let kind = self.kind(f)?;
        if kind == FeatureKind::Direction {
            self.normalize_direction_value(f)?;
        }
        match self.hooks.get(&kind).cloned() {
            Some(hooks) => hooks.post_process_new_placement(self, f),
            None => Ok(()),
        }
    }

    fn normalize_direction_value(&mut self, f: FeatureId) -> Result<(), TreeError> {
        let Some(pid) = self.active_placement(f)? else {
            return Ok(());
        };
        let Some(vid) = self.placement(pid)?.value() else {
            return Ok(());
        };
        let PlacementConstant::Direction { unit } = *self.placement_value(vid)?.value() else {
            return Ok(());
        };

        let norm = unit.iter().map(|c| c * c).sum::<f64>().sqrt();
        if !norm.is_normal() {
            return Err(TreeError::ZeroLengthDirection {
                feature: self.full_name(f)?,
            });
        }
        // Index checked by `placement_value` above.
        self.feature_mut(vid.owner)?.values[vid.index].value = PlacementConstant::Direction {
            unit: [unit[0] / norm, unit[1] / norm, unit[2] / norm],
        };
        Ok(())
    }
}
