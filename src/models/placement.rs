use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{FeatureId, ValueId};
use crate::error::TreeError;

/// The result category a placement expression produces.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PlacementCategory {
    Real,
    Vec3,
    Station,
    Direction,
    Orientation,
    Frame,
}

impl PlacementCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Real => "Real",
            Self::Vec3 => "Vec3",
            Self::Station => "Station",
            Self::Direction => "Direction",
            Self::Orientation => "Orientation",
            Self::Frame => "Frame",
        }
    }
}

impl std::fmt::Display for PlacementCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type Vec3 = [f64; 3];
pub type Mat33 = [[f64; 3]; 3];

pub const IDENTITY: Mat33 = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// A literal value of one of the placement categories.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlacementConstant {
    Real { value: f64 },
    Vec3 { value: Vec3 },
    Station { location: Vec3 },
    Direction { unit: Vec3 },
    Orientation { axes: Mat33 },
    Frame { orientation: Mat33, origin: Vec3 },
}

impl PlacementConstant {
    pub fn category(&self) -> PlacementCategory {
        match self {
            Self::Real { .. } => PlacementCategory::Real,
            Self::Vec3 { .. } => PlacementCategory::Vec3,
            Self::Station { .. } => PlacementCategory::Station,
            Self::Direction { .. } => PlacementCategory::Direction,
            Self::Orientation { .. } => PlacementCategory::Orientation,
            Self::Frame { .. } => PlacementCategory::Frame,
        }
    }

    /// Reinterpret this constant as another category, if a conversion exists.
    pub fn convert_to(&self, target: PlacementCategory) -> Option<Self> {
        use PlacementCategory as C;
        if self.category() == target {
            return Some(*self);
        }
        match (*self, target) {
            (Self::Station { location }, C::Vec3) => Some(Self::Vec3 { value: location }),
            (Self::Vec3 { value }, C::Station) => Some(Self::Station { location: value }),
            (Self::Direction { unit }, C::Vec3) => Some(Self::Vec3 { value: unit }),
            (Self::Vec3 { value }, C::Direction) => {
                let norm = value.iter().map(|c| c * c).sum::<f64>().sqrt();
                (norm > 0.0).then(|| Self::Direction {
                    unit: [value[0] / norm, value[1] / norm, value[2] / norm],
                })
            }
            (Self::Orientation { axes }, C::Frame) => Some(Self::Frame {
                orientation: axes,
                origin: [0.0; 3],
            }),
            (Self::Frame { origin, .. }, C::Station) => Some(Self::Station { location: origin }),
            (Self::Frame { orientation, .. }, C::Orientation) => {
                Some(Self::Orientation { axes: orientation })
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for PlacementConstant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Real { value } => write!(f, "{}", value),
            Self::Vec3 { value } => write!(f, "Vec3{:?}", value),
            Self::Station { location } => write!(f, "Station{:?}", location),
            Self::Direction { unit } => write!(f, "Direction{:?}", unit),
            Self::Orientation { axes } => write!(f, "Orientation{:?}", axes),
            Self::Frame {
                orientation,
                origin,
            } => write!(f, "Frame{{{:?}, {:?}}}", orientation, origin),
        }
    }
}

/// Operators that combine placement expressions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PlacementOp {
    Add,
    Sub,
    Distance,
    Normalize,
    FrameOf,
}

impl PlacementOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Distance => "distance",
            Self::Normalize => "normalize",
            Self::FrameOf => "frame_of",
        }
    }

    /// Result category for the given operand categories, or `None` when the
    /// operator is not defined for them.
    pub fn result_category(&self, operands: &[PlacementCategory]) -> Option<PlacementCategory> {
        use PlacementCategory as C;
        match (self, operands) {
            (Self::Add, [C::Real, C::Real]) => Some(C::Real),
            (Self::Add, [C::Vec3, C::Vec3]) => Some(C::Vec3),
            (Self::Add, [C::Station, C::Vec3]) => Some(C::Station),
            (Self::Sub, [C::Real, C::Real]) => Some(C::Real),
            (Self::Sub, [C::Vec3, C::Vec3]) => Some(C::Vec3),
            (Self::Sub, [C::Station, C::Station]) => Some(C::Vec3),
            (Self::Distance, [C::Station, C::Station]) => Some(C::Real),
            (Self::Normalize, [C::Vec3]) => Some(C::Direction),
            (Self::FrameOf, [C::Orientation, C::Station]) => Some(C::Frame),
            _ => None,
        }
    }
}

impl std::fmt::Display for PlacementOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed placement expression.
///
/// Expressions are plain values until registered: a `Feature` variant holds
/// a handle into the arena but owns nothing. Registration makes a structural
/// copy and stores it in the owner's placement sequence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum PlacementExpr {
    Constant(PlacementConstant),
    /// Use another Feature as a placement of the given category.
    Feature {
        feature: FeatureId,
        category: PlacementCategory,
    },
    Op {
        op: PlacementOp,
        operands: Vec<PlacementExpr>,
        category: PlacementCategory,
    },
}

impl PlacementExpr {
    pub fn constant(value: PlacementConstant) -> Self {
        Self::Constant(value)
    }

    pub fn real(value: f64) -> Self {
        Self::Constant(PlacementConstant::Real { value })
    }

    pub fn vec3(value: Vec3) -> Self {
        Self::Constant(PlacementConstant::Vec3 { value })
    }

    pub fn station(location: Vec3) -> Self {
        Self::Constant(PlacementConstant::Station { location })
    }

    /// Combine operands with `op`, checking the operand categories.
    pub fn apply(op: PlacementOp, operands: Vec<PlacementExpr>) -> Result<Self, TreeError> {
        let categories: Vec<_> = operands.iter().map(|e| e.category()).collect();
        let category = op
            .result_category(&categories)
            .ok_or_else(|| TreeError::IllegalOperands {
                op: op.as_str().to_string(),
                operands: categories
                    .iter()
                    .map(|c| c.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })?;
        Ok(Self::Op {
            op,
            operands,
            category,
        })
    }

    pub fn category(&self) -> PlacementCategory {
        match self {
            Self::Constant(c) => c.category(),
            Self::Feature { category, .. } | Self::Op { category, .. } => *category,
        }
    }

    /// Features referenced directly by this expression, in first-mention
    /// order without duplicates. Placements of those Features are not
    /// followed.
    pub fn referenced_features(&self) -> Vec<FeatureId> {
        let mut out = Vec::new();
        self.collect_features(&mut out);
        out
    }

    fn collect_features(&self, out: &mut Vec<FeatureId>) {
        match self {
            Self::Constant(_) => {}
            Self::Feature { feature, .. } => {
                if !out.contains(feature) {
                    out.push(*feature);
                }
            }
            Self::Op { operands, .. } => {
                for operand in operands {
                    operand.collect_features(out);
                }
            }
        }
    }

    /// True when the expression mentions no Feature at all.
    pub fn is_constant(&self) -> bool {
        match self {
            Self::Constant(_) => true,
            Self::Feature { .. } => false,
            Self::Op { operands, .. } => operands.iter().all(|o| o.is_constant()),
        }
    }

    /// Rewrite every Feature reference through `map`. References missing
    /// from the map are returned as the first offender and nothing is
    /// rewritten past it.
    pub fn remap_features(
        &mut self,
        map: &HashMap<FeatureId, FeatureId>,
    ) -> Result<(), FeatureId> {
        match self {
            Self::Constant(_) => Ok(()),
            Self::Feature { feature, .. } => {
                *feature = *map.get(feature).ok_or(*feature)?;
                Ok(())
            }
            Self::Op { operands, .. } => {
                for operand in operands.iter_mut() {
                    operand.remap_features(map)?;
                }
                Ok(())
            }
        }
    }

    /// The literal value of a top-level constant expression.
    pub fn as_constant(&self) -> Option<&PlacementConstant> {
        match self {
            Self::Constant(c) => Some(c),
            _ => None,
        }
    }
}

impl From<PlacementConstant> for PlacementExpr {
    fn from(value: PlacementConstant) -> Self {
        Self::Constant(value)
    }
}

/// A placement expression registered under its owner.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub(crate) expr: PlacementExpr,
    pub(crate) owner: Option<FeatureId>,
    pub(crate) index_in_owner: usize,
    pub(crate) value: Option<ValueId>,
}

impl Placement {
    pub(crate) fn unowned(expr: PlacementExpr) -> Self {
        Self {
            expr,
            owner: None,
            index_in_owner: 0,
            value: None,
        }
    }

    pub fn expr(&self) -> &PlacementExpr {
        &self.expr
    }

    pub fn category(&self) -> PlacementCategory {
        self.expr.category()
    }

    pub fn owner(&self) -> Option<FeatureId> {
        self.owner
    }

    pub fn index_in_owner(&self) -> usize {
        self.index_in_owner
    }

    /// The value slot holding this placement's evaluated value, if any.
    pub fn value(&self) -> Option<ValueId> {
        self.value
    }

    pub fn is_constant(&self) -> bool {
        self.expr.is_constant()
    }
}

/// An owned slot holding an evaluated placement value.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementValue {
    pub(crate) value: PlacementConstant,
    pub(crate) owner: Option<FeatureId>,
    pub(crate) index_in_owner: usize,
}

impl PlacementValue {
    pub fn new(value: PlacementConstant) -> Self {
        Self {
            value,
            owner: None,
            index_in_owner: 0,
        }
    }

    pub fn value(&self) -> &PlacementConstant {
        &self.value
    }

    pub fn category(&self) -> PlacementCategory {
        self.value.category()
    }

    pub fn owner(&self) -> Option<FeatureId> {
        self.owner
    }

    pub fn index_in_owner(&self) -> usize {
        self.index_in_owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_typing() {
        let sum = PlacementExpr::apply(
            PlacementOp::Add,
            vec![PlacementExpr::station([1.0, 0.0, 0.0]), PlacementExpr::vec3([0.0, 1.0, 0.0])],
        )
        .expect("station + vec3 is a station");
        assert_eq!(sum.category(), PlacementCategory::Station);
        assert!(sum.is_constant());

        let err = PlacementExpr::apply(
            PlacementOp::Distance,
            vec![PlacementExpr::real(1.0), PlacementExpr::real(2.0)],
        )
        .unwrap_err();
        assert!(matches!(err, TreeError::IllegalOperands { .. }));
        assert!(err.to_string().contains("Real, Real"));
    }

    #[test]
    fn test_referenced_features_are_deduplicated() {
        let a = FeatureId::new(1, 0);
        let b = FeatureId::new(2, 0);
        let expr = PlacementExpr::apply(
            PlacementOp::Distance,
            vec![
                PlacementExpr::Feature {
                    feature: a,
                    category: PlacementCategory::Station,
                },
                PlacementExpr::apply(
                    PlacementOp::Add,
                    vec![
                        PlacementExpr::Feature {
                            feature: b,
                            category: PlacementCategory::Station,
                        },
                        PlacementExpr::Feature {
                            feature: a,
                            category: PlacementCategory::Vec3,
                        },
                    ],
                )
                .unwrap(),
            ],
        )
        .unwrap();

        assert_eq!(expr.referenced_features(), vec![a, b]);
        assert!(!expr.is_constant());
    }

    #[test]
    fn test_remap_reports_unmapped_reference() {
        let a = FeatureId::new(1, 0);
        let b = FeatureId::new(2, 0);
        let mut expr = PlacementExpr::Feature {
            feature: a,
            category: PlacementCategory::Station,
        };
        let mut map = HashMap::new();
        assert_eq!(expr.remap_features(&map), Err(a));

        map.insert(a, b);
        assert_eq!(expr.remap_features(&map), Ok(()));
        assert_eq!(expr.referenced_features(), vec![b]);
    }

    #[test]
    fn test_constant_conversions() {
        let v = PlacementConstant::Vec3 {
            value: [3.0, 0.0, 4.0],
        };
        assert_eq!(
            v.convert_to(PlacementCategory::Direction),
            Some(PlacementConstant::Direction {
                unit: [0.6, 0.0, 0.8]
            })
        );
        let zero = PlacementConstant::Vec3 { value: [0.0; 3] };
        assert_eq!(zero.convert_to(PlacementCategory::Direction), None);

        let frame = PlacementConstant::Orientation { axes: IDENTITY }
            .convert_to(PlacementCategory::Frame)
            .unwrap();
        assert_eq!(
            frame.convert_to(PlacementCategory::Station),
            Some(PlacementConstant::Station { location: [0.0; 3] })
        );
        assert_eq!(
            PlacementConstant::Real { value: 1.0 }.convert_to(PlacementCategory::Vec3),
            None
        );
    }
}
