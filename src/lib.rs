//! Feature/placement trees.
//!
//! A model is a tree of named Features, each optionally placed by a typed
//! expression that may mention other Features of the same tree. The crate
//! decides which Feature owns each expression, so no placement outlives
//! anything it depends on, and copies subtrees for reuse as prototypes
//! while repairing or dropping the references a copy carries.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`models`] | Kinds, categories, expressions, values, handles, snapshots |
//! | [`tree`] | The Feature arena and every tree operation |
//! | [`error`] | Usage errors and invariant violations |
//! | [`config`] | Tree behavior settings loaded from JSON |
//! | [`render`] | ASCII rendering of a tree |
//! | [`outline`] | JSON outlines used by the `ptree` binary |
//!
//! # Quick Start
//!
//! ```
//! use placement_tree::{FeatureKind, FeatureTree};
//!
//! let mut tree = FeatureTree::new();
//! let station = tree.new_prototype("Station", FeatureKind::Station).unwrap();
//! let root = tree.new_prototype("Root", FeatureKind::Frame).unwrap();
//! let a = tree.add_subfeature_like(root, station, "a").unwrap();
//! let b = tree.add_subfeature_like(root, station, "b").unwrap();
//!
//! // `a` sits on `b`, so the placement is hoisted to their common ancestor.
//! let on_b = tree.feature_ref(b).unwrap();
//! let placement = tree.place(a, &on_b).unwrap();
//! assert_eq!(placement.owner, root);
//!
//! // A copy of `a` alone cannot keep a placement owned above it.
//! let copy = tree.clone_subtree(a).unwrap();
//! assert_eq!(tree.active_placement(copy.root()).unwrap(), None);
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod outline;
pub mod render;
pub mod tree;

pub use config::{DuplicateNamePolicy, TreeConfig};
pub use error::{InvariantViolation, TreeError};
pub use models::*;
pub use render::render_tree;
pub use tree::{CloneMap, FeatureHooks, FeatureNode, FeatureTree, ParentLink, Stage, StageRealizer};
