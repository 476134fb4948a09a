//! Error taxonomy for tree operations.
//!
//! Structural and usage errors are [`TreeError`] variants carrying full path
//! names so callers can report them without reaching back into the tree.
//! Corruption of the tree's own bookkeeping is an [`InvariantViolation`],
//! surfaced through [`TreeError::Invariant`] and never as a panic.

use thiserror::Error;

use crate::models::FeatureId;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TreeError {
    #[error("placement of category {provided} can't be used for feature {feature} of kind {kind} (requires {required})")]
    PlacementCantBeUsedForThisFeature {
        provided: String,
        feature: String,
        kind: String,
        required: String,
    },

    #[error("feature {feature} and feature {offender} referenced by its placement are on different trees")]
    FeatureAndPlacementOnDifferentTrees { feature: String, offender: String },

    #[error("placement owned by {owner} must be local, but references {offender}")]
    PlacementMustBeLocal { owner: String, offender: String },

    #[error("feature {feature} of kind {kind} can't be used as a {category} placement")]
    FeatureCantBeUsedAsPlacement {
        feature: String,
        kind: String,
        category: String,
    },

    #[error("placement for {feature} depends on {feature} itself (through {via})")]
    CircularPlacement { feature: String, via: String },

    #[error("placement for root {feature} references its own subfeatures and would be owned by {feature} itself")]
    PlacementOwnedByItsFeature { feature: String },

    #[error("direction placement for {feature} has zero length")]
    ZeroLengthDirection { feature: String },

    #[error("illegal feature name {0:?}: use letters, digits and underscore only")]
    IllegalFeatureName(String),

    #[error("illegal feature path {path:?}: bad segment {segment:?}")]
    IllegalFeaturePath { path: String, segment: String },

    #[error("feature {parent} already has a subfeature named {name:?}")]
    DuplicateSubfeatureName { parent: String, name: String },

    #[error("feature {parent} of kind {kind} can't have subfeatures (tried to add a {child_kind})")]
    SubfeatureNotAllowed {
        parent: String,
        kind: String,
        child_kind: String,
    },

    #[error("feature {0} is not the root of its tree")]
    NotARoot(String),

    #[error("unknown feature handle {0}")]
    UnknownFeature(FeatureId),

    #[error("feature {owner} has no placement at index {index}")]
    UnknownPlacement { owner: String, index: usize },

    #[error("operator {op} is not defined for operands ({operands})")]
    IllegalOperands { op: String, operands: String },

    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

/// Broken bookkeeping inside a tree. Seeing one of these means a defect in
/// this crate or a caller going around its API.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvariantViolation {
    #[error("feature {feature}: slot holds handle {found} instead of {expected}")]
    WrongHandle {
        feature: String,
        expected: FeatureId,
        found: FeatureId,
    },

    #[error("feature {feature}: parent is {found:?}, expected {expected:?}")]
    WrongParent {
        feature: String,
        expected: Option<String>,
        found: Option<String>,
    },

    #[error("feature {feature}: index in parent is {found}, expected {expected}")]
    WrongIndex {
        feature: String,
        expected: usize,
        found: usize,
    },

    #[error("feature {feature}: root is {found}, expected {expected}")]
    WrongRoot {
        feature: String,
        expected: String,
        found: String,
    },

    #[error("{item} {index} of {feature}: owner is {found:?}")]
    WrongOwner {
        feature: String,
        item: &'static str,
        index: usize,
        found: Option<String>,
    },

    #[error("{item} {index} of {feature}: recorded index {found}")]
    WrongOwnerIndex {
        feature: String,
        item: &'static str,
        index: usize,
        found: usize,
    },

    #[error("placement {index} of {owner} references {offender} outside its owner")]
    NonLocalReference {
        owner: String,
        index: usize,
        offender: String,
    },

    #[error("placement {index} of {owner} refers to a missing value slot")]
    DanglingValue { owner: String, index: usize },

    #[error("feature {feature}: active placement is not owned on its path to the root")]
    PlacementNotOnRootPath { feature: String },

    #[error("feature {feature}: active placement {index} of {owner} does not exist")]
    DanglingPlacement {
        feature: String,
        owner: String,
        index: usize,
    },

    #[error("feature {feature}: placement is owned by the feature itself")]
    SelfOwnedPlacement { feature: String },

    #[error("feature {feature}: placement depends on the feature it is attached to")]
    SelfDependency { feature: String },

    #[error("handle {0} does not name a live feature")]
    DanglingHandle(FeatureId),

    #[error("features have no common root: {0} and {1}")]
    NoCommonAncestor(String, String),

    #[error("clone of {feature} lost reference to {offender}")]
    UnmappedReference { feature: String, offender: String },
}
