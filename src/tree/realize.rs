//! Stage realization order.
//!
//! The tree does no stage work itself; it only decides the order in which
//! a [`StageRealizer`] sees placements: every subfeature first, in
//! declaration order, then the Feature's own active placement.

use serde::{Deserialize, Serialize};

use super::FeatureTree;
use crate::error::TreeError;
use crate::models::{FeatureId, PlacementId};

/// Ordered computation phases.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Built,
    Topology,
    Model,
    Instance,
    Time,
    Position,
    Velocity,
    Dynamics,
    Acceleration,
    Report,
}

/// Performs stage-specific work for individual placements.
pub trait StageRealizer {
    fn realize_placement(
        &mut self,
        tree: &FeatureTree,
        feature: FeatureId,
        placement: PlacementId,
        stage: Stage,
    ) -> Result<(), TreeError>;
}

impl FeatureTree {
    pub fn realize(
        &self,
        f: FeatureId,
        stage: Stage,
        realizer: &mut dyn StageRealizer,
    ) -> Result<(), TreeError> {
        let node = self.feature(f)?;
        for child in &node.subfeatures {
            self.realize(*child, stage, realizer)?;
        }
        if let Some(placement) = node.placement {
            realizer.realize_placement(self, f, placement, stage)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FeatureKind, PlacementConstant, PlacementExpr, PlacementOp, IDENTITY};

    #[derive(Default)]
    struct Recorder {
        seen: Vec<(String, Stage)>,
    }

    impl StageRealizer for Recorder {
        fn realize_placement(
            &mut self,
            tree: &FeatureTree,
            feature: FeatureId,
            _placement: PlacementId,
            stage: Stage,
        ) -> Result<(), TreeError> {
            self.seen.push((tree.full_name(feature)?, stage));
            Ok(())
        }
    }

    #[test]
    fn test_children_before_own_placement() {
        let mut tree = FeatureTree::new();
        let root = tree.new_prototype("Root", FeatureKind::Frame).unwrap();
        let frame = tree.new_prototype("F", FeatureKind::Frame).unwrap();
        let station = tree.new_prototype("S", FeatureKind::Station).unwrap();
        let arm = tree.add_subfeature_like(root, frame, "arm").unwrap();
        let tip = tree.add_subfeature_like(arm, station, "tip").unwrap();
        let base = tree.add_subfeature_like(root, station, "base").unwrap();
        tree.add_subfeature_like(root, station, "unplaced").unwrap();

        tree.place(tip, &PlacementExpr::station([0.0; 3])).unwrap();
        tree.place(base, &PlacementExpr::station([1.0; 3])).unwrap();
        let axes = PlacementExpr::constant(PlacementConstant::Orientation { axes: IDENTITY });
        let expr = PlacementExpr::apply(
            PlacementOp::FrameOf,
            vec![axes.clone(), tree.feature_ref(base).unwrap()],
        )
        .unwrap();
        tree.place(arm, &expr).unwrap();
        tree.place(root, &axes).unwrap();

        let mut recorder = Recorder::default();
        tree.realize(root, Stage::Position, &mut recorder).unwrap();
        let order: Vec<_> = recorder.seen.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(order, vec!["Root/arm/tip", "Root/arm", "Root/base", "Root"]);
        assert!(recorder.seen.iter().all(|(_, s)| *s == Stage::Position));
        assert!(Stage::Topology < Stage::Acceleration);
    }
}
