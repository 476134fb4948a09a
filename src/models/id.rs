use serde::{Deserialize, Serialize};

/// Generation-checked handle to a Feature slot in a [`FeatureTree`].
///
/// A handle stays valid until the tree holding the Feature is destroyed;
/// after that the slot's generation moves on and every lookup through the
/// old handle fails instead of reaching a recycled Feature.
///
/// [`FeatureTree`]: crate::tree::FeatureTree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl FeatureId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl std::fmt::Display for FeatureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Non-owning reference to a placement expression: the owner plus the
/// position inside the owner's placement sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlacementId {
    pub owner: FeatureId,
    pub index: usize,
}

/// Non-owning reference to a placement value slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueId {
    pub owner: FeatureId,
    pub index: usize,
}
