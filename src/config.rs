use std::f64::consts::PI;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Unit in which trigonometric operators interpret their arguments and in which inverse
/// trigonometric operators return their results.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Default, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum AngleUnit {
    #[default]
    Radians,
    Degrees,
    Gradians,
}

impl AngleUnit {
    fn full_turn(&self) -> f64 {
        match self {
            AngleUnit::Radians => 2.0 * PI,
            AngleUnit::Degrees => 360.0,
            AngleUnit::Gradians => 400.0,
        }
    }

    pub fn to_radians(&self, x: f64) -> f64 {
        match self {
            AngleUnit::Radians => x,
            _ => x * 2.0 * PI / self.full_turn(),
        }
    }

    pub fn from_radians(&self, x: f64) -> f64 {
        match self {
            AngleUnit::Radians => x,
            _ => x * self.full_turn() / (2.0 * PI),
        }
    }
}

/// Settings of an [`Evaluator`](crate::Evaluator).
///
/// With the feature `serde` the configuration can be read from any serde format, missing
/// fields are taken from the default.
/// ```rust
/// use calcex::{AngleUnit, EvalConfig};
/// let config = EvalConfig {
///     angle_unit: AngleUnit::Degrees,
///     ..EvalConfig::default()
/// };
/// assert_eq!(config.max_depth, 256);
/// ```
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EvalConfig {
    /// Initial angle unit of the environment.
    pub angle_unit: AngleUnit,
    /// Maximal depth of nested calls of user-defined functions during evaluation.
    pub max_depth: usize,
    /// Tolerance of the continued fraction expansion used by `rational(x)`.
    pub rational_epsilon: f64,
    /// Maximal number of terms of the continued fraction expansion used by `rational(x)`.
    pub rational_max_terms: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig {
            angle_unit: AngleUnit::Radians,
            max_depth: 256,
            rational_epsilon: 1e-10,
            rational_max_terms: 32,
        }
    }
}

#[test]
fn test_angle_units() {
    let eps = 1e-12;
    assert!((AngleUnit::Degrees.to_radians(180.0) - PI).abs() < eps);
    assert!((AngleUnit::Gradians.to_radians(100.0) - PI / 2.0).abs() < eps);
    assert!((AngleUnit::Degrees.from_radians(PI / 2.0) - 90.0).abs() < eps);
    assert_eq!(AngleUnit::Radians.to_radians(1.5), 1.5);
    assert_eq!(AngleUnit::default(), AngleUnit::Radians);
}
