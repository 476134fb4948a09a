use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PlacementCategory;

/// The concrete kind of a Feature.
///
/// A kind decides which placement category the Feature must be placed with,
/// which other categories it can stand in for when referenced from a
/// placement expression, and whether it may own subfeatures.
///
/// - `RealParameter`, `Vec3Parameter`: scalar and vector parameters
/// - `Station`: a point
/// - `Direction`: a unit vector
/// - `Orientation`: a set of axes
/// - `Frame`: axes plus origin; may own subfeatures
/// - `Subsystem`: a grouping node; never placed, may own subfeatures
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    RealParameter,
    Vec3Parameter,
    Station,
    Direction,
    Orientation,
    Frame,
    Subsystem,
}

impl FeatureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RealParameter => "RealParameter",
            Self::Vec3Parameter => "Vec3Parameter",
            Self::Station => "Station",
            Self::Direction => "Direction",
            Self::Orientation => "Orientation",
            Self::Frame => "Frame",
            Self::Subsystem => "Subsystem",
        }
    }

    /// The category a placement must produce to be used for this kind.
    pub fn required_category(&self) -> Option<PlacementCategory> {
        match self {
            Self::RealParameter => Some(PlacementCategory::Real),
            Self::Vec3Parameter => Some(PlacementCategory::Vec3),
            Self::Station => Some(PlacementCategory::Station),
            Self::Direction => Some(PlacementCategory::Direction),
            Self::Orientation => Some(PlacementCategory::Orientation),
            Self::Frame => Some(PlacementCategory::Frame),
            Self::Subsystem => None,
        }
    }

    /// Whether a Feature of this kind can be referenced as a placement of
    /// the given category.
    pub fn use_as(&self, category: PlacementCategory) -> bool {
        use PlacementCategory as C;
        if self.required_category() == Some(category) {
            return true;
        }
        matches!(
            (self, category),
            (Self::Station, C::Vec3)
                | (Self::Direction, C::Vec3)
                | (Self::Frame, C::Station)
                | (Self::Frame, C::Orientation)
        )
    }

    /// Whether this kind may own subfeatures.
    pub fn admits_subfeatures(&self) -> bool {
        matches!(self, Self::Frame | Self::Subsystem)
    }
}

impl std::fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A Feature with its nested subfeatures, used for serialized views of a tree.
///
/// Snapshots are detached copies: they carry names, kinds and a printable
/// description of the active placement, never handles into the arena.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureSnapshot {
    pub id: Uuid,
    pub name: String,
    pub full_name: String,
    pub kind: FeatureKind,
    /// Full name of the Feature owning the active placement, if placed.
    pub placement_owner: Option<String>,
    pub placement: Option<String>,
    pub placement_count: usize,
    pub value_count: usize,
    pub children: Vec<FeatureSnapshot>,
}
