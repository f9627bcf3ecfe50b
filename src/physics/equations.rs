//! Equations of motion of the circular restricted three-body problem in the
//! rotating frame.
//!
//! Everything here is a pure function of its arguments. `t` is accepted for
//! integrator compatibility even though the system is autonomous.

use crate::physics::integrators::OdeSystem;
use crate::physics::math::Scalar;
use crate::physics::state::{MassRatio, State};

/// Distances (r1, r2) from (x, y) to the primary at (μ, 0) and the secondary
/// at (μ − 1, 0).
#[inline]
pub fn body_distances(x: Scalar, y: Scalar, mass_ratio: MassRatio) -> (Scalar, Scalar) {
    let mu = mass_ratio.value();
    let dx1 = x - mu;
    let dx2 = x - mu + 1.0;
    let y2 = y * y;
    (libm::sqrt(dx1 * dx1 + y2), libm::sqrt(dx2 * dx2 + y2))
}

/// State derivative (ẋ, ẏ, u̇, v̇) at `state`.
///
/// Not guarded against r1 = 0 or r2 = 0; a trajectory through a body yields a
/// non-finite derivative, which the integrators report as a failure.
pub fn derivative(_t: Scalar, state: &State, mass_ratio: MassRatio) -> State {
    let mu = mass_ratio.value();
    let m1 = 1.0 - mu;
    let State { x, y, u, v } = *state;

    let (r1, r2) = body_distances(x, y, mass_ratio);
    let r1_cubed = r1 * r1 * r1;
    let r2_cubed = r2 * r2 * r2;

    let du = 2.0 * v + m1 * (x - mu) + mu * (x + 1.0 - mu)
        - m1 * (x - mu) / r1_cubed
        - mu * (x - mu + 1.0) / r2_cubed;
    let dv = -2.0 * u + m1 * y + mu * y - m1 * y / r1_cubed - mu * y / r2_cubed;

    State::new(u, v, du, dv)
}

/// Effective potential Ω = (x² + y²)/2 + (1 − μ)/r1 + μ/r2.
pub fn effective_potential(x: Scalar, y: Scalar, mass_ratio: MassRatio) -> Scalar {
    let mu = mass_ratio.value();
    let (r1, r2) = body_distances(x, y, mass_ratio);
    0.5 * (x * x + y * y) + (1.0 - mu) / r1 + mu / r2
}

/// Jacobi constant C = 2Ω − (u² + v²), the first integral of the motion.
pub fn jacobi_constant(state: &State, mass_ratio: MassRatio) -> Scalar {
    2.0 * effective_potential(state.x, state.y, mass_ratio) - state.speed_squared()
}

/// The restricted problem as a four-dimensional ODE system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cr3bp {
    pub mass_ratio: MassRatio,
}

impl Cr3bp {
    pub fn new(mass_ratio: MassRatio) -> Self {
        Self { mass_ratio }
    }
}

impl OdeSystem<4> for Cr3bp {
    #[inline]
    fn derivative(&self, t: Scalar, y: &[Scalar; 4]) -> [Scalar; 4] {
        derivative(t, &State::from_array(*y), self.mass_ratio).to_array()
    }
}
