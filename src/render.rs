//! ASCII tree rendering for feature hierarchies.

use crate::error::TreeError;
use crate::models::{FeatureId, FeatureKind};
use crate::tree::FeatureTree;

const REAL: char = '#';
const VEC3: char = '^';
const STATION: char = '●';
const DIRECTION: char = '→';
const ORIENTATION: char = '↻';
const FRAME: char = '◎';
const SUBSYSTEM: char = '□';

/// Get the symbol for a feature kind.
fn kind_symbol(kind: FeatureKind) -> char {
    match kind {
        FeatureKind::RealParameter => REAL,
        FeatureKind::Vec3Parameter => VEC3,
        FeatureKind::Station => STATION,
        FeatureKind::Direction => DIRECTION,
        FeatureKind::Orientation => ORIENTATION,
        FeatureKind::Frame => FRAME,
        FeatureKind::Subsystem => SUBSYSTEM,
    }
}

/// Render a feature tree as ASCII art with kind symbols. Placed features
/// are suffixed with the full name of their placement's owner.
///
/// Example output:
/// ```text
/// Pendulum
/// ├── ◎ pivot
/// │   └── ● origin @Pendulum/pivot
/// └── ● bob @Pendulum
/// ```
pub fn render_tree(tree: &FeatureTree, root: FeatureId) -> Result<String, TreeError> {
    let mut output = String::new();
    render_node(tree, &mut output, root, "", true, true)?;
    Ok(output)
}

/// Recursively render a node and its children.
fn render_node(
    tree: &FeatureTree,
    output: &mut String,
    id: FeatureId,
    prefix: &str,
    is_last: bool,
    is_root: bool,
) -> Result<(), TreeError> {
    let node = tree.feature(id)?;

    if is_root {
        // Root nodes: just the name (no branch characters)
        output.push_str(node.name());
    } else {
        let branch = if is_last { "└── " } else { "├── " };
        output.push_str(prefix);
        output.push_str(branch);
        output.push(kind_symbol(node.kind()));
        output.push(' ');
        output.push_str(node.name());
    }
    if let Some(placement) = node.active_placement() {
        output.push_str(" @");
        output.push_str(&tree.full_name(placement.owner)?);
    }
    output.push('\n');

    let child_prefix = if is_root {
        String::new()
    } else {
        let continuation = if is_last { "    " } else { "│   " };
        format!("{}{}", prefix, continuation)
    };

    let children = node.subfeatures();
    for (i, child) in children.iter().enumerate() {
        let child_is_last = i == children.len() - 1;
        render_node(tree, output, *child, &child_prefix, child_is_last, false)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlacementExpr;

    #[test]
    fn test_single_root() {
        let mut tree = FeatureTree::new();
        let root = tree.new_prototype("Pendulum", FeatureKind::Subsystem).unwrap();
        assert_eq!(render_tree(&tree, root).unwrap(), "Pendulum\n");
    }

    #[test]
    fn test_nested_children() {
        let mut tree = FeatureTree::new();
        let frame = tree.new_prototype("F", FeatureKind::Frame).unwrap();
        let station = tree.new_prototype("S", FeatureKind::Station).unwrap();
        let root = tree.new_prototype("Pendulum", FeatureKind::Subsystem).unwrap();
        let pivot = tree.add_subfeature_like(root, frame, "pivot").unwrap();
        let origin = tree.add_subfeature_like(pivot, station, "origin").unwrap();
        let bob = tree.add_subfeature_like(root, station, "bob").unwrap();
        tree.place(origin, &PlacementExpr::station([0.0; 3])).unwrap();
        tree.place(bob, &PlacementExpr::station([0.0, -1.0, 0.0])).unwrap();

        let expected = "Pendulum\n├── ◎ pivot\n│   └── ● origin @Pendulum/pivot\n└── ● bob @Pendulum\n";
        assert_eq!(render_tree(&tree, root).unwrap(), expected);
    }
}
