//! JSON outlines: a nested description of a model used by the CLI to build
//! a tree through the regular prototype-and-clone API.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::*;
use crate::tree::FeatureTree;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureOutline {
    pub name: String,
    pub kind: FeatureKind,
    #[serde(default)]
    pub placement: Option<OutlinePlacement>,
    #[serde(default)]
    pub subfeatures: Vec<FeatureOutline>,
}

/// Placement of an outlined Feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlinePlacement {
    Constant(PlacementConstant),
    /// Another Feature, by path relative to the outline root. Without a
    /// category the referenced Feature's own category is used.
    Feature {
        path: String,
        #[serde(default)]
        category: Option<PlacementCategory>,
    },
}

impl FeatureOutline {
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse outline")
    }

    /// Build the outlined tree, then apply placements in declaration order.
    pub fn build(&self, tree: &mut FeatureTree) -> Result<FeatureId> {
        let root = self.build_structure(tree)?;
        self.apply_placements(tree, root, root)?;
        Ok(root)
    }

    fn build_structure(&self, tree: &mut FeatureTree) -> Result<FeatureId> {
        let feature = tree
            .new_prototype(&self.name, self.kind)
            .with_context(|| format!("Failed to create {}", self.name))?;
        for sub in &self.subfeatures {
            let prototype = sub.build_structure(tree)?;
            tree.add_subfeature_like(feature, prototype, &sub.name)
                .with_context(|| format!("Failed to add {} to {}", sub.name, self.name))?;
            tree.destroy_tree(prototype)?;
        }
        Ok(feature)
    }

    fn apply_placements(&self, tree: &mut FeatureTree, root: FeatureId, feature: FeatureId) -> Result<()> {
        if let Some(placement) = &self.placement {
            let expr = match placement {
                OutlinePlacement::Constant(c) => PlacementExpr::Constant(*c),
                OutlinePlacement::Feature { path, category } => {
                    let target = tree
                        .find_by_path(root, path)?
                        .ok_or_else(|| anyhow::anyhow!("No feature at {} under {}", path, self.name))?;
                    match category {
                        Some(category) => tree.feature_placement(target, *category)?,
                        None => tree.feature_ref(target)?,
                    }
                }
            };
            tree.place(feature, &expr)
                .with_context(|| format!("Failed to place {}", tree.display_name(feature)))?;
        }
        for (i, sub) in self.subfeatures.iter().enumerate() {
            let child = tree.subfeature(feature, i)?;
            sub.apply_placements(tree, root, child)?;
        }
        Ok(())
    }
}
