//! Domain models for the feature/placement tree.
//!
//! # Core Concepts
//!
//! - [`FeatureKind`]: what a Feature is, which placement category it needs,
//!   and which categories it can stand in for.
//! - [`PlacementExpr`]: a typed expression that may reference other Features.
//! - [`Placement`]: an expression registered under exactly one owner Feature.
//! - [`PlacementValue`]: an owned slot holding an evaluated value.
//! - [`FeatureId`], [`PlacementId`], [`ValueId`]: handles. Only the arena owns
//!   anything; every handle is a non-owning reference.
//! - [`FeatureSnapshot`]: a detached, serializable view of a subtree.

mod feature;
mod id;
mod placement;

pub use feature::*;
pub use id::*;
pub use placement::*;
