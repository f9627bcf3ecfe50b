//! Mass ratio and phase-space state of the third body in the rotating frame

use crate::error::{SynodicError, SynodicResult};
use crate::physics::math::{Point, Scalar, Vector};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized secondary-to-total mass fraction μ = m₂ / (m₁ + m₂).
///
/// Always lies in (0, 0.5]; construction through [`MassRatio::new`] is the
/// only way to obtain one, so every consumer can rely on the range.
///
/// The barycenter sits at the origin. The primary (mass 1 − μ) is fixed at
/// (μ, 0) and the secondary (mass μ) at (μ − 1, 0).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Scalar", into = "Scalar")]
pub struct MassRatio(Scalar);

impl MassRatio {
    /// Two bodies of equal mass
    pub const EQUAL_MASSES: Self = Self(0.5);

    /// Approximate Earth–Moon system
    pub const EARTH_MOON: Self = Self(0.01215);

    /// Validate `value` as a mass ratio.
    ///
    /// # Errors
    /// Returns [`SynodicError::InvalidParameter`] unless `0 < value <= 0.5`.
    pub fn new(value: Scalar) -> SynodicResult<Self> {
        if value.is_finite() && value > 0.0 && value <= 0.5 {
            Ok(Self(value))
        } else {
            Err(SynodicError::invalid(
                "mass_ratio",
                format!("must lie in (0, 0.5], got {value}"),
            ))
        }
    }

    #[inline]
    pub fn value(self) -> Scalar {
        self.0
    }

    /// Mass of the primary body, 1 − μ
    #[inline]
    pub fn primary_mass(self) -> Scalar {
        1.0 - self.0
    }

    /// Mass of the secondary body, μ
    #[inline]
    pub fn secondary_mass(self) -> Scalar {
        self.0
    }

    #[inline]
    pub fn primary_position(self) -> Point {
        Point::new(self.0, 0.0)
    }

    #[inline]
    pub fn secondary_position(self) -> Point {
        Point::new(self.0 - 1.0, 0.0)
    }
}

impl TryFrom<Scalar> for MassRatio {
    type Error = SynodicError;

    fn try_from(value: Scalar) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MassRatio> for Scalar {
    fn from(mass_ratio: MassRatio) -> Self {
        mass_ratio.0
    }
}

impl fmt::Display for MassRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "μ = {}", self.0)
    }
}

/// Position (x, y) and velocity (u, v) of the third body in the rotating
/// frame, in dimensionless units.
///
/// The same layout doubles as the state derivative (ẋ, ẏ, u̇, v̇).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct State {
    pub x: Scalar,
    pub y: Scalar,
    pub u: Scalar,
    pub v: Scalar,
}

impl State {
    pub const fn new(x: Scalar, y: Scalar, u: Scalar, v: Scalar) -> Self {
        Self { x, y, u, v }
    }

    pub const fn from_array(values: [Scalar; 4]) -> Self {
        Self::new(values[0], values[1], values[2], values[3])
    }

    pub const fn to_array(self) -> [Scalar; 4] {
        [self.x, self.y, self.u, self.v]
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn velocity(&self) -> Vector {
        Vector::new(self.u, self.v)
    }

    pub fn speed_squared(&self) -> Scalar {
        self.u * self.u + self.v * self.v
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.u.is_finite() && self.v.is_finite()
    }

    /// Largest componentwise difference from `other`.
    pub fn max_abs_difference(&self, other: &State) -> Scalar {
        self.to_array()
            .iter()
            .zip(other.to_array())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, Scalar::max)
    }
}

impl From<[Scalar; 4]> for State {
    fn from(values: [Scalar; 4]) -> Self {
        Self::from_array(values)
    }
}

impl From<State> for [Scalar; 4] {
    fn from(state: State) -> Self {
        state.to_array()
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(x = {}, y = {}, u = {}, v = {})",
            self.x, self.y, self.u, self.v
        )
    }
}
