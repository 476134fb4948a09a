//! Placement ownership.
//!
//! A placement is hoisted to the youngest Feature that dominates both the
//! Feature it is placed on and every Feature it mentions, so it can never
//! outlive anything it needs. A constant placed on a non-root Feature goes
//! to the parent: such "external" placements are dropped when their Feature
//! is cloned, while a constant locked into a prototype root travels with it.

use std::collections::HashSet;

use super::FeatureTree;
use crate::error::{InvariantViolation, TreeError};
use crate::models::*;

impl PlacementExpr {
    /// First Feature referenced by this expression that is not in the tree
    /// rooted at `root`.
    pub fn first_reference_outside(
        &self,
        tree: &FeatureTree,
        root: FeatureId,
    ) -> Result<Option<FeatureId>, TreeError> {
        for feature in self.referenced_features() {
            if !tree.is_in_tree(root, feature)? {
                return Ok(Some(feature));
            }
        }
        Ok(None)
    }

    /// Youngest common ancestor of `bound` and every referenced Feature.
    pub fn find_ancestor(
        &self,
        tree: &FeatureTree,
        bound: FeatureId,
    ) -> Result<Option<FeatureId>, TreeError> {
        let mut ancestor = bound;
        for feature in self.referenced_features() {
            match tree.youngest_common_ancestor(ancestor, feature)? {
                Some(next) => ancestor = next,
                None => return Ok(None),
            }
        }
        Ok(Some(ancestor))
    }

    /// Does this expression depend on `f`, directly or through the active
    /// placements of the Features it references?
    pub fn depends_on(&self, tree: &FeatureTree, f: FeatureId) -> Result<bool, TreeError> {
        Ok(self.dependency_via(tree, f)?.is_some())
    }

    /// The directly referenced Feature through which this expression
    /// depends on `f`, if any.
    pub fn dependency_via(
        &self,
        tree: &FeatureTree,
        f: FeatureId,
    ) -> Result<Option<FeatureId>, TreeError> {
        let mut visited = HashSet::new();
        for feature in self.referenced_features() {
            if reaches(tree, feature, f, &mut visited)? {
                return Ok(Some(feature));
            }
        }
        Ok(None)
    }

    /// A copy of this expression producing `target`, when a conversion
    /// exists.
    pub fn convert_to(
        &self,
        tree: &FeatureTree,
        target: PlacementCategory,
    ) -> Result<Option<PlacementExpr>, TreeError> {
        if self.category() == target {
            return Ok(Some(self.clone()));
        }
        Ok(match self {
            Self::Constant(c) => c.convert_to(target).map(Self::Constant),
            Self::Feature { feature, .. } => tree.kind(*feature)?.use_as(target).then(|| {
                Self::Feature {
                    feature: *feature,
                    category: target,
                }
            }),
            Self::Op { .. } => None,
        })
    }
}

fn reaches(
    tree: &FeatureTree,
    from: FeatureId,
    target: FeatureId,
    visited: &mut HashSet<FeatureId>,
) -> Result<bool, TreeError> {
    if from == target {
        return Ok(true);
    }
    if !visited.insert(from) {
        return Ok(false);
    }
    let Some(pid) = tree.active_placement(from)? else {
        return Ok(false);
    };
    for next in tree.placement(pid)?.expr().referenced_features() {
        if reaches(tree, next, target, visited)? {
            return Ok(true);
        }
    }
    Ok(false)
}

impl FeatureTree {
    /// Reference Feature `f` as a placement of `category`.
    pub fn feature_placement(
        &self,
        f: FeatureId,
        category: PlacementCategory,
    ) -> Result<PlacementExpr, TreeError> {
        let kind = self.kind(f)?;
        if !kind.use_as(category) {
            return Err(TreeError::FeatureCantBeUsedAsPlacement {
                feature: self.full_name(f)?,
                kind: kind.to_string(),
                category: category.to_string(),
            });
        }
        Ok(PlacementExpr::Feature {
            feature: f,
            category,
        })
    }

    /// Reference Feature `f` as a placement of its own category.
    pub fn feature_ref(&self, f: FeatureId) -> Result<PlacementExpr, TreeError> {
        let kind = self.kind(f)?;
        match kind.required_category() {
            Some(category) => self.feature_placement(f, category),
            None => Err(TreeError::FeatureCantBeUsedAsPlacement {
                feature: self.full_name(f)?,
                kind: kind.to_string(),
                category: "any".to_string(),
            }),
        }
    }

    /// Place Feature `f` with (a converted copy of) `p`.
    ///
    /// The stored copy is owned by the youngest common ancestor of `f`'s
    /// bound (its parent, or `f` itself when it is a root) and every
    /// Feature `p` references. A constant also gets a value slot on the same
    /// owner. On error the tree is left as it was.
    pub fn place(&mut self, f: FeatureId, p: &PlacementExpr) -> Result<PlacementId, TreeError> {
        let kind = self.kind(f)?;
        let unusable = |tree: &FeatureTree| TreeError::PlacementCantBeUsedForThisFeature {
            provided: p.category().to_string(),
            feature: tree.display_name(f),
            kind: kind.to_string(),
            required: kind
                .required_category()
                .map_or("no placement".to_string(), |c| c.to_string()),
        };

        let required = kind.required_category().ok_or_else(|| unusable(self))?;
        let tweaked = match p.convert_to(self, required)? {
            Some(expr) => expr,
            None => return Err(unusable(self)),
        };

        // Every reference has to be on this tree, though not necessarily
        // below `f`.
        let root = self.find_root(f)?;
        if let Some(offender) = tweaked.first_reference_outside(self, root)? {
            return Err(TreeError::FeatureAndPlacementOnDifferentTrees {
                feature: self.full_name(f)?,
                offender: self.display_name(offender),
            });
        }

        if let Some(via) = tweaked.dependency_via(self, f)? {
            return Err(TreeError::CircularPlacement {
                feature: self.full_name(f)?,
                via: self.full_name(via)?,
            });
        }

        let bound = self.parent(f)?.unwrap_or(f);
        let owner = tweaked.find_ancestor(self, bound)?.ok_or_else(|| {
            InvariantViolation::NoCommonAncestor(self.display_name(bound), self.display_name(f))
        })?;
        // Only a root can own its own placement, and only a constant one.
        if owner == f && !tweaked.is_constant() {
            return Err(TreeError::PlacementOwnedByItsFeature {
                feature: self.full_name(f)?,
            });
        }

        let previous = self.feature(f)?.placement;
        let owner_node = self.feature(owner)?;
        let (placements_before, values_before) =
            (owner_node.placements.len(), owner_node.values.len());

        let stored = self.register_placement(owner, &tweaked)?;
        if let Err(e) = self.commit_placement(f, stored, &tweaked) {
            tracing::debug!(
                "Rolling back placement of {}: {}",
                self.display_name(f),
                e
            );
            if let Ok(node) = self.feature_mut(owner) {
                node.placements.truncate(placements_before);
                node.values.truncate(values_before);
            }
            if let Ok(node) = self.feature_mut(f) {
                node.placement = previous;
            }
            return Err(e);
        }
        Ok(stored)
    }

    /// Everything after registration that can still fail: value slot,
    /// activation, the kind's hook and the checks.
    fn commit_placement(
        &mut self,
        f: FeatureId,
        stored: PlacementId,
        tweaked: &PlacementExpr,
    ) -> Result<(), TreeError> {
        let owner = stored.owner;
        if let Some(constant) = tweaked.as_constant() {
            let value = self.register_placement_value(owner, &PlacementValue::new(*constant))?;
            self.placement(stored)?;
            self.feature_mut(owner)?.placements[stored.index].value = Some(value);
        }
        self.feature_mut(f)?.placement = Some(stored);

        tracing::debug!(
            "Placed {} with {} owned by {}",
            self.display_name(f),
            self.describe_expr(tweaked),
            self.display_name(owner)
        );

        self.post_process_new_placement(f)?;
        self.check_placement_invariants(f, stored)?;
        self.verify_if_configured(f)
    }

    fn check_placement_invariants(
        &self,
        f: FeatureId,
        stored: PlacementId,
    ) -> Result<(), InvariantViolation> {
        let feature = self.display_name(f);
        let placement = self
            .placement(stored)
            .map_err(|_| InvariantViolation::DanglingPlacement {
                feature: feature.clone(),
                owner: self.display_name(stored.owner),
                index: stored.index,
            })?;

        let Some(owner) = placement.owner() else {
            return Err(InvariantViolation::WrongOwner {
                feature,
                item: "placement",
                index: stored.index,
                found: None,
            });
        };
        let is_root = self
            .is_root(f)
            .map_err(|_| InvariantViolation::DanglingHandle(f))?;
        if owner == f && (!is_root || !placement.is_constant()) {
            return Err(InvariantViolation::SelfOwnedPlacement { feature });
        }
        let on_path = self
            .path_to_root(f)
            .map_err(|_| InvariantViolation::DanglingHandle(f))?
            .contains(&owner);
        if !on_path {
            return Err(InvariantViolation::PlacementNotOnRootPath { feature });
        }
        if placement
            .expr()
            .depends_on(self, f)
            .map_err(|_| InvariantViolation::DanglingHandle(f))?
        {
            return Err(InvariantViolation::SelfDependency { feature });
        }
        Ok(())
    }

    /// Store a structural copy of `p` in `owner`'s placement sequence.
    ///
    /// Every Feature `p` references must be in `owner`'s own subtree,
    /// otherwise someone further up the tree should own it.
    pub fn register_placement(
        &mut self,
        owner: FeatureId,
        p: &PlacementExpr,
    ) -> Result<PlacementId, TreeError> {
        if let Some(offender) = p.first_reference_outside(self, owner)? {
            return Err(TreeError::PlacementMustBeLocal {
                owner: self.full_name(owner)?,
                offender: self.display_name(offender),
            });
        }

        let node = self.feature_mut(owner)?;
        let index = node.placements.len();
        let mut stored = Placement::unowned(p.clone());
        stored.owner = Some(owner);
        stored.index_in_owner = index;
        node.placements.push(stored);
        Ok(PlacementId { owner, index })
    }

    /// Store a copy of `v` in `owner`'s value sequence.
    pub fn register_placement_value(
        &mut self,
        owner: FeatureId,
        v: &PlacementValue,
    ) -> Result<ValueId, TreeError> {
        let node = self.feature_mut(owner)?;
        let index = node.values.len();
        node.values.push(PlacementValue {
            value: v.value,
            owner: Some(owner),
            index_in_owner: index,
        });
        Ok(ValueId { owner, index })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Root{A{X}, B}
    fn sample() -> (FeatureTree, [FeatureId; 4]) {
        let mut tree = FeatureTree::new();
        let root = tree.new_prototype("Root", FeatureKind::Frame).unwrap();
        let frame = tree.new_prototype("F", FeatureKind::Frame).unwrap();
        let station = tree.new_prototype("S", FeatureKind::Station).unwrap();
        let a = tree.add_subfeature_like(root, frame, "A").unwrap();
        let b = tree.add_subfeature_like(root, station, "B").unwrap();
        let x = tree.add_subfeature_like(a, station, "X").unwrap();
        (tree, [root, a, b, x])
    }

    /// Body{len, offset, tip, base, axis, tilt, mount}: one leaf per kind.
    fn kinds_sample() -> (FeatureTree, FeatureId, [FeatureId; 7]) {
        let mut tree = FeatureTree::new();
        let body = tree.new_prototype("Body", FeatureKind::Frame).unwrap();
        let leaves = [
            ("len", FeatureKind::RealParameter),
            ("offset", FeatureKind::Vec3Parameter),
            ("tip", FeatureKind::Station),
            ("base", FeatureKind::Station),
            ("axis", FeatureKind::Direction),
            ("tilt", FeatureKind::Orientation),
            ("mount", FeatureKind::Frame),
        ]
        .map(|(name, kind)| {
            let proto = tree.new_prototype("Proto", kind).unwrap();
            let leaf = tree.add_subfeature_like(body, proto, name).unwrap();
            tree.destroy_tree(proto).unwrap();
            leaf
        });
        (tree, body, leaves)
    }

    #[test]
    fn test_reference_owned_by_common_ancestor() {
        let (mut tree, [root, _, b, x]) = sample();
        let expr = tree.feature_ref(b).unwrap();
        let pid = tree.place(x, &expr).unwrap();
        assert_eq!(pid.owner, root);
        assert_eq!(tree.active_placement(x).unwrap(), Some(pid));
        assert!(tree.placement(pid).unwrap().value().is_none());
    }

    #[test]
    fn test_constant_owner_depends_on_rootness() {
        let (mut tree, [root, a, _, _]) = sample();
        let on_root = tree
            .place(root, &PlacementExpr::constant(PlacementConstant::Frame {
                orientation: IDENTITY,
                origin: [0.0; 3],
            }))
            .unwrap();
        assert_eq!(on_root.owner, root);

        let on_child = tree
            .place(a, &PlacementExpr::constant(PlacementConstant::Orientation { axes: IDENTITY }))
            .unwrap();
        assert_eq!(on_child.owner, root);
        let stored = tree.placement(on_child).unwrap();
        assert_eq!(stored.category(), PlacementCategory::Frame);
        let value = stored.value().expect("constants get a value slot");
        assert_eq!(value.owner, root);
        assert_eq!(
            tree.placement_value(value).unwrap().category(),
            PlacementCategory::Frame
        );
    }

    #[test]
    fn test_reference_below_owner_stays_local() {
        let (mut tree, [_, a, _, x]) = sample();
        let station = tree.new_prototype("S2", FeatureKind::Station).unwrap();
        let y = tree.add_subfeature_like(a, station, "Y").unwrap();
        let expr = tree.feature_ref(x).unwrap();
        let pid = tree.place(y, &expr).unwrap();
        assert_eq!(pid.owner, a);
    }

    #[test]
    fn test_category_mismatch() {
        let (mut tree, [_, _, b, _]) = sample();
        let err = tree.place(b, &PlacementExpr::real(2.0)).unwrap_err();
        assert_eq!(
            err,
            TreeError::PlacementCantBeUsedForThisFeature {
                provided: "Real".to_string(),
                feature: "Root/B".to_string(),
                kind: "Station".to_string(),
                required: "Station".to_string(),
            }
        );
        assert_eq!(tree.active_placement(b).unwrap(), None);
    }

    #[test]
    fn test_subsystem_cannot_be_placed() {
        let mut tree = FeatureTree::new();
        let group = tree.new_prototype("G", FeatureKind::Subsystem).unwrap();
        let err = tree.place(group, &PlacementExpr::real(1.0)).unwrap_err();
        assert!(matches!(err, TreeError::PlacementCantBeUsedForThisFeature { .. }));
        assert!(tree.feature_ref(group).is_err());
    }

    #[test]
    fn test_frame_reference_converts_to_station() {
        let (mut tree, [_, a, b, _]) = sample();
        let expr = tree.feature_ref(a).unwrap();
        assert_eq!(expr.category(), PlacementCategory::Frame);
        let pid = tree.place(b, &expr).unwrap();
        assert_eq!(
            tree.placement(pid).unwrap().expr(),
            &PlacementExpr::Feature {
                feature: a,
                category: PlacementCategory::Station
            }
        );
    }

    #[test]
    fn test_station_cannot_serve_as_orientation() {
        let (tree, [_, _, b, _]) = sample();
        let err = tree
            .feature_placement(b, PlacementCategory::Orientation)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "feature Root/B of kind Station can't be used as a Orientation placement"
        );
    }

    #[test]
    fn test_reference_to_other_tree_rejected() {
        let (mut tree, [_, _, _, x]) = sample();
        let loner = tree.new_prototype("Loner", FeatureKind::Station).unwrap();
        let expr = tree.feature_ref(loner).unwrap();
        let err = tree.place(x, &expr).unwrap_err();
        assert_eq!(
            err,
            TreeError::FeatureAndPlacementOnDifferentTrees {
                feature: "Root/A/X".to_string(),
                offender: "Loner".to_string(),
            }
        );
    }

    #[test]
    fn test_self_reference_rejected() {
        let (mut tree, [_, _, b, x]) = sample();
        let expr = tree.feature_ref(x).unwrap();
        let err = tree.place(x, &expr).unwrap_err();
        assert!(matches!(err, TreeError::CircularPlacement { .. }));

        let expr = tree.feature_ref(x).unwrap();

        tree.place(b, &expr).unwrap();
        let expr = tree.feature_ref(b).unwrap();
        let err = tree.place(x, &expr).unwrap_err();
        assert_eq!(
            err,
            TreeError::CircularPlacement {
                feature: "Root/A/X".to_string(),
                via: "Root/B".to_string(),
            }
        );
    }

    #[test]
    fn test_register_rejects_non_local_reference() {
        let (mut tree, [_, a, b, _]) = sample();
        let expr = tree.feature_ref(b).unwrap();
        let err = tree.register_placement(a, &expr).unwrap_err();
        assert_eq!(
            err,
            TreeError::PlacementMustBeLocal {
                owner: "Root/A".to_string(),
                offender: "Root/B".to_string(),
            }
        );
        assert!(tree.feature(a).unwrap().placements().is_empty());
    }

    #[test]
    fn test_registration_stamps_owner_and_index() {
        let (mut tree, [root, _, _, _]) = sample();
        let first = tree.register_placement(root, &PlacementExpr::real(1.0)).unwrap();
        let second = tree.register_placement(root, &PlacementExpr::real(2.0)).unwrap();
        assert_eq!((first.index, second.index), (0, 1));
        let stored = tree.placement(second).unwrap();
        assert_eq!(stored.owner(), Some(root));
        assert_eq!(stored.index_in_owner(), 1);

        let v = tree
            .register_placement_value(root, &PlacementValue::new(PlacementConstant::Real { value: 3.0 }))
            .unwrap();
        assert_eq!(tree.placement_value(v).unwrap().index_in_owner(), 0);
    }

    #[test]
    fn test_root_cannot_own_reference_to_its_subfeature() {
        let (mut tree, body, [_, _, tip, ..]) = kinds_sample();
        let axes = PlacementExpr::constant(PlacementConstant::Orientation { axes: IDENTITY });
        let expr =
            PlacementExpr::apply(PlacementOp::FrameOf, vec![axes, tree.feature_ref(tip).unwrap()])
                .unwrap();

        let err = tree.place(body, &expr).unwrap_err();
        assert_eq!(
            err,
            TreeError::PlacementOwnedByItsFeature {
                feature: "Body".to_string()
            }
        );
        assert_eq!(tree.active_placement(body).unwrap(), None);
        assert!(tree.feature(body).unwrap().placements().is_empty());
    }

    #[test]
    fn test_failed_verification_restores_previous_placement() {
        let (mut tree, [root, a, b, x]) = sample();
        let first = tree.place(x, &PlacementExpr::station([0.0; 3])).unwrap();
        tree.config.verify_after_mutation = true;
        tree.feature_mut(b).unwrap().parent = Some(crate::tree::ParentLink {
            feature: root,
            index: 9,
        });

        let expr = tree.feature_ref(b).unwrap();
        let err = tree.place(x, &expr).unwrap_err();
        assert!(matches!(
            err,
            TreeError::Invariant(InvariantViolation::WrongIndex { found: 9, .. })
        ));
        assert_eq!(tree.active_placement(x).unwrap(), Some(first));
        assert!(tree.feature(root).unwrap().placements().is_empty());
        assert_eq!(tree.feature(a).unwrap().placements().len(), 1);
        assert_eq!(tree.feature(a).unwrap().values().len(), 1);
    }

    #[test]
    fn test_real_parameter_from_distance() {
        let (mut tree, body, [len, _, tip, base, ..]) = kinds_sample();
        let expr = PlacementExpr::apply(
            PlacementOp::Distance,
            vec![tree.feature_ref(tip).unwrap(), tree.feature_ref(base).unwrap()],
        )
        .unwrap();
        let pid = tree.place(len, &expr).unwrap();
        assert_eq!(pid.owner, body);
        let stored = tree.placement(pid).unwrap();
        assert_eq!(stored.category(), PlacementCategory::Real);
        assert!(!stored.is_constant());
        assert!(stored.value().is_none());
    }

    #[test]
    fn test_vec3_parameter_conversions() {
        let (mut tree, _, [_, offset, _, _, axis, ..]) = kinds_sample();
        let pid = tree.place(offset, &PlacementExpr::station([1.0, 2.0, 3.0])).unwrap();
        assert_eq!(
            tree.placement(pid).unwrap().expr(),
            &PlacementExpr::vec3([1.0, 2.0, 3.0])
        );

        let expr = tree.feature_ref(axis).unwrap();
        let pid = tree.place(offset, &expr).unwrap();
        assert_eq!(
            tree.placement(pid).unwrap().expr(),
            &PlacementExpr::Feature {
                feature: axis,
                category: PlacementCategory::Vec3
            }
        );
    }

    #[test]
    fn test_direction_conversions() {
        let (mut tree, _, [_, offset, tip, _, axis, ..]) = kinds_sample();
        let pid = tree.place(axis, &PlacementExpr::vec3([0.0, 0.0, -3.0])).unwrap();
        let value = tree.placement(pid).unwrap().value().unwrap();
        assert_eq!(
            tree.placement_value(value).unwrap().value(),
            &PlacementConstant::Direction { unit: [0.0, 0.0, -1.0] }
        );

        let err = tree.place(axis, &PlacementExpr::vec3([0.0; 3])).unwrap_err();
        assert!(matches!(err, TreeError::PlacementCantBeUsedForThisFeature { .. }));
        assert_eq!(tree.active_placement(axis).unwrap(), Some(pid));

        let normalized =
            PlacementExpr::apply(PlacementOp::Normalize, vec![tree.feature_ref(offset).unwrap()])
                .unwrap();
        let pid = tree.place(axis, &normalized).unwrap();
        assert_eq!(tree.placement(pid).unwrap().category(), PlacementCategory::Direction);

        // A Station is not a direction.
        assert!(tree.feature_placement(tip, PlacementCategory::Direction).is_err());
        assert!(!FeatureKind::Station.use_as(PlacementCategory::Direction));
        assert!(FeatureKind::Direction.use_as(PlacementCategory::Vec3));
    }

    #[test]
    fn test_orientation_conversions() {
        let (mut tree, _, [.., tilt, mount]) = kinds_sample();
        let expr = tree.feature_ref(mount).unwrap();
        let pid = tree.place(tilt, &expr).unwrap();
        assert_eq!(
            tree.placement(pid).unwrap().expr(),
            &PlacementExpr::Feature {
                feature: mount,
                category: PlacementCategory::Orientation
            }
        );

        let frame = PlacementExpr::constant(PlacementConstant::Frame {
            orientation: IDENTITY,
            origin: [1.0, 0.0, 0.0],
        });
        let pid = tree.place(tilt, &frame).unwrap();
        assert_eq!(
            tree.placement(pid).unwrap().expr(),
            &PlacementExpr::constant(PlacementConstant::Orientation { axes: IDENTITY })
        );
    }
}
