//! Read-only invariant checker, for diagnostics and tests.

use std::collections::HashSet;

use super::{FeatureTree, ParentLink};
use crate::error::{InvariantViolation, TreeError};
use crate::models::FeatureId;

impl FeatureTree {
    /// Verify the whole tree rooted at `root`, returning every violation.
    pub fn check_tree(&self, root: FeatureId) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();
        self.check_feature_consistency(root, None, root, &mut violations);
        for violation in &violations {
            tracing::warn!("Consistency check failed: {}", violation);
        }
        violations
    }

    /// Check `f` against the parent link and root it is expected to have,
    /// then recurse into its subfeatures, placements and values.
    pub fn check_feature_consistency(
        &self,
        f: FeatureId,
        expected_parent: Option<ParentLink>,
        root: FeatureId,
        violations: &mut Vec<InvariantViolation>,
    ) {
        let Ok(node) = self.feature(f) else {
            violations.push(InvariantViolation::DanglingHandle(f));
            return;
        };
        let name = self.display_name(f);

        if node.id != f {
            violations.push(InvariantViolation::WrongHandle {
                feature: name.clone(),
                expected: f,
                found: node.id,
            });
        }

        let parent = node.parent.map(|link| link.feature);
        if parent != expected_parent.map(|link| link.feature) {
            violations.push(InvariantViolation::WrongParent {
                feature: name.clone(),
                expected: expected_parent.map(|link| self.display_name(link.feature)),
                found: parent.map(|p| self.display_name(p)),
            });
        }
        if let (Some(found), Some(expected)) = (node.parent, expected_parent) {
            if found.index != expected.index {
                violations.push(InvariantViolation::WrongIndex {
                    feature: name.clone(),
                    expected: expected.index,
                    found: found.index,
                });
            }
        }

        match self.find_root(f) {
            Ok(found) if found == root => {}
            Ok(found) => violations.push(InvariantViolation::WrongRoot {
                feature: name.clone(),
                expected: self.display_name(root),
                found: self.display_name(found),
            }),
            Err(_) => violations.push(InvariantViolation::DanglingHandle(f)),
        }

        for (index, child) in node.subfeatures.iter().enumerate() {
            self.check_feature_consistency(
                *child,
                Some(ParentLink { feature: f, index }),
                root,
                violations,
            );
        }

        for (index, placement) in node.placements.iter().enumerate() {
            if placement.owner != Some(f) {
                violations.push(InvariantViolation::WrongOwner {
                    feature: name.clone(),
                    item: "placement",
                    index,
                    found: placement.owner.map(|o| self.display_name(o)),
                });
            }
            if placement.index_in_owner != index {
                violations.push(InvariantViolation::WrongOwnerIndex {
                    feature: name.clone(),
                    item: "placement",
                    index,
                    found: placement.index_in_owner,
                });
            }
            match placement.expr.first_reference_outside(self, f) {
                Ok(None) => {}
                Ok(Some(offender)) => violations.push(InvariantViolation::NonLocalReference {
                    owner: name.clone(),
                    index,
                    offender: self.display_name(offender),
                }),
                Err(TreeError::UnknownFeature(id)) => {
                    violations.push(InvariantViolation::DanglingHandle(id))
                }
                Err(_) => violations.push(InvariantViolation::DanglingHandle(f)),
            }
            if let Some(value) = placement.value {
                if self.placement_value(value).is_err() {
                    violations.push(InvariantViolation::DanglingValue {
                        owner: name.clone(),
                        index,
                    });
                }
            }
        }

        for (index, value) in node.values.iter().enumerate() {
            if value.owner != Some(f) {
                violations.push(InvariantViolation::WrongOwner {
                    feature: name.clone(),
                    item: "value",
                    index,
                    found: value.owner.map(|o| self.display_name(o)),
                });
            }
            if value.index_in_owner != index {
                violations.push(InvariantViolation::WrongOwnerIndex {
                    feature: name.clone(),
                    item: "value",
                    index,
                    found: value.index_in_owner,
                });
            }
        }

        if let Some(pid) = node.placement {
            if self.placement(pid).is_err() {
                violations.push(InvariantViolation::DanglingPlacement {
                    feature: name.clone(),
                    owner: self.display_name(pid.owner),
                    index: pid.index,
                });
            } else if !self
                .path_to_root(f)
                .is_ok_and(|path| path.contains(&pid.owner))
            {
                violations.push(InvariantViolation::PlacementNotOnRootPath { feature: name });
            }
        }
    }

    /// Every link held inside the subtree of `root` that points outside it,
    /// described as `"<holder>: <what> -> <target>"`. Empty for a freshly
    /// cloned subtree.
    pub fn references_outside(&self, root: FeatureId) -> Result<Vec<String>, TreeError> {
        let members: HashSet<FeatureId> = self.subtree(root)?.into_iter().collect();
        let mut found = Vec::new();
        let mut note = |holder: FeatureId, what: &str, target: FeatureId| {
            if !members.contains(&target) {
                found.push(format!(
                    "{}: {} -> {}",
                    self.display_name(holder),
                    what,
                    self.display_name(target)
                ));
            }
        };

        for id in &members {
            let node = self.feature(*id)?;
            if *id != root {
                if let Some(link) = node.parent {
                    note(*id, "parent", link.feature);
                }
            }
            for placement in &node.placements {
                if let Some(owner) = placement.owner {
                    note(*id, "placement owner", owner);
                }
                for feature in placement.expr.referenced_features() {
                    note(*id, "feature reference", feature);
                }
                if let Some(value) = placement.value {
                    note(*id, "value reference", value.owner);
                }
            }
            for value in &node.values {
                if let Some(owner) = value.owner {
                    note(*id, "value owner", owner);
                }
            }
            if let Some(pid) = node.placement {
                note(*id, "active placement", pid.owner);
            }
        }
        found.sort();
        Ok(found)
    }
}
