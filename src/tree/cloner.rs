//! Subtree copies.
//!
//! A copy is built in three passes over freshly allocated slots: a verbatim
//! structural copy (internal handles still name the source), a reparent
//! pass that points every parent and owner link at the new nodes, and a
//! repair pass that remaps references through the old-to-new table. The
//! repair pass only starts once the whole subtree is reparented. References
//! that leave the source subtree have no entry in the table and come out as
//! none, which is how placements owned above the source are dropped.

use std::collections::HashMap;

use uuid::Uuid;

use super::{is_legal_name, FeatureNode, FeatureTree, ParentLink};
use crate::config::DuplicateNamePolicy;
use crate::error::{InvariantViolation, TreeError};
use crate::models::*;

/// Result of a subtree copy: the new free-standing root and the table from
/// every source Feature to its copy.
#[derive(Debug, Clone)]
pub struct CloneMap {
    root: FeatureId,
    features: HashMap<FeatureId, FeatureId>,
}

impl CloneMap {
    pub fn root(&self) -> FeatureId {
        self.root
    }

    /// The copy of source Feature `old`, if it was part of the copied subtree.
    pub fn get(&self, old: FeatureId) -> Option<FeatureId> {
        self.features.get(&old).copied()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FeatureId, FeatureId)> + '_ {
        self.features.iter().map(|(old, new)| (*old, *new))
    }
}

impl FeatureTree {
    /// Copy `source` and its descendants into a new parentless tree that
    /// holds no reference to anything outside itself.
    pub fn clone_subtree(&mut self, source: FeatureId) -> Result<CloneMap, TreeError> {
        let originals = self.subtree(source)?;
        let mut features = HashMap::with_capacity(originals.len());

        match self.copy_subtree(source, &originals, &mut features) {
            Ok(root) => {
                tracing::debug!(
                    "Cloned {} ({} features) as {}",
                    self.display_name(source),
                    features.len(),
                    root
                );
                Ok(CloneMap { root, features })
            }
            Err(e) => {
                for new in features.values() {
                    self.release(*new);
                }
                Err(e)
            }
        }
    }

    /// Clone `prototype` and insert the copy as the last subfeature of
    /// `parent` under `name`.
    ///
    /// Everything that can fail is checked before the tree changes; on
    /// error the tree is left exactly as it was.
    pub fn add_subfeature_like(
        &mut self,
        parent: FeatureId,
        prototype: FeatureId,
        name: &str,
    ) -> Result<FeatureId, TreeError> {
        if !is_legal_name(name) {
            return Err(TreeError::IllegalFeatureName(name.to_string()));
        }
        let parent_kind = self.kind(parent)?;
        let child_kind = self.kind(prototype)?;
        if !parent_kind.admits_subfeatures() {
            return Err(TreeError::SubfeatureNotAllowed {
                parent: self.full_name(parent)?,
                kind: parent_kind.to_string(),
                child_kind: child_kind.to_string(),
            });
        }
        if self.config().duplicate_names == DuplicateNamePolicy::Reject
            && self.find_subfeature_index(parent, name)?.is_some()
        {
            return Err(TreeError::DuplicateSubfeatureName {
                parent: self.full_name(parent)?,
                name: name.to_string(),
            });
        }

        let copy = self.clone_subtree(prototype)?.root();

        let index = self.feature(parent)?.subfeatures.len();
        self.feature_mut(parent)?.subfeatures.push(copy);
        let node = self.feature_mut(copy)?;
        node.parent = Some(ParentLink {
            feature: parent,
            index,
        });
        node.name = name.to_string();

        let finished = match self.post_process_new_subfeature(parent, copy) {
            Ok(()) => self.verify_if_configured(copy),
            Err(e) => Err(e),
        };
        if let Err(e) = finished {
            tracing::debug!(
                "Rolling back insertion of {} under {}: {}",
                name,
                self.display_name(parent),
                e
            );
            self.feature_mut(parent)?.subfeatures.truncate(index);
            for id in self.subtree(copy)? {
                self.release(id);
            }
            return Err(e);
        }

        tracing::debug!("Added {} {}", child_kind, self.display_name(copy));
        Ok(copy)
    }

    fn copy_subtree(
        &mut self,
        source: FeatureId,
        originals: &[FeatureId],
        features: &mut HashMap<FeatureId, FeatureId>,
    ) -> Result<FeatureId, TreeError> {
        self.structural_copy(originals, features)?;
        let root = features[&source];
        self.feature_mut(root)?.parent = None;
        self.reparent(originals, features)?;
        self.repair_references(originals, features)?;
        Ok(root)
    }

    fn structural_copy(
        &mut self,
        originals: &[FeatureId],
        features: &mut HashMap<FeatureId, FeatureId>,
    ) -> Result<(), TreeError> {
        for old in originals {
            let source = self.feature(*old)?.clone();
            let new = self.allocate(|id| FeatureNode {
                id,
                uuid: Uuid::new_v4(),
                ..source
            });
            features.insert(*old, new);
        }
        Ok(())
    }

    fn reparent(
        &mut self,
        originals: &[FeatureId],
        features: &HashMap<FeatureId, FeatureId>,
    ) -> Result<(), TreeError> {
        for old in originals {
            let new = features[old];
            let node = self.feature_mut(new)?;
            let children = std::mem::take(&mut node.subfeatures);
            for (i, placement) in node.placements.iter_mut().enumerate() {
                placement.owner = Some(new);
                placement.index_in_owner = i;
            }
            for (i, value) in node.values.iter_mut().enumerate() {
                value.owner = Some(new);
                value.index_in_owner = i;
            }

            let mut copies = Vec::with_capacity(children.len());
            for (i, child) in children.iter().enumerate() {
                let copy = *features.get(child).ok_or_else(|| unmapped(self, *old, *child))?;
                let child_node = self.feature_mut(copy)?;
                let found = child_node.parent.map(|link| link.index);
                if found != Some(i) {
                    return Err(InvariantViolation::WrongIndex {
                        feature: self.display_name(*child),
                        expected: i,
                        found: found.unwrap_or(usize::MAX),
                    }
                    .into());
                }
                child_node.parent = Some(ParentLink {
                    feature: new,
                    index: i,
                });
                copies.push(copy);
            }
            self.feature_mut(new)?.subfeatures = copies;
        }
        Ok(())
    }

    fn repair_references(
        &mut self,
        originals: &[FeatureId],
        features: &HashMap<FeatureId, FeatureId>,
    ) -> Result<(), TreeError> {
        for old in originals {
            let new = features[old];
            let mut placements = std::mem::take(&mut self.feature_mut(new)?.placements);
            let remapped = placements.iter_mut().try_for_each(|placement| -> Result<(), FeatureId> {
                placement.expr.remap_features(features)?;
                placement.value = placement.value.and_then(|v| {
                    features.get(&v.owner).map(|owner| ValueId {
                        owner: *owner,
                        index: v.index,
                    })
                });
                Ok(())
            });
            if let Err(offender) = remapped {
                return Err(unmapped(self, *old, offender).into());
            }

            let node = self.feature_mut(new)?;
            node.placements = placements;
            node.placement = node.placement.and_then(|p| {
                features.get(&p.owner).map(|owner| PlacementId {
                    owner: *owner,
                    index: p.index,
                })
            });
        }
        Ok(())
    }
}

fn unmapped(tree: &FeatureTree, feature: FeatureId, offender: FeatureId) -> InvariantViolation {
    InvariantViolation::UnmappedReference {
        feature: tree.display_name(feature),
        offender: tree.display_name(offender),
    }
}
