//! Reference problems with known solutions, shared by unit tests,
//! integration tests and benchmarks

use crate::physics::integrators::OdeSystem;
use crate::physics::math::Scalar;
use crate::physics::state::State;

/// Reference orbit: equal masses, started just outside the primary
pub const REFERENCE_MASS_RATIO: Scalar = 0.5;
pub const REFERENCE_STATE: State = State::new(0.65, 0.0, 0.0, 2.07);

/// x'' = −ω²x as a first-order system
///
/// With x(0) = A, v(0) = 0: x(t) = A cos(ωt), v(t) = −Aω sin(ωt)
#[derive(Debug, Clone, Copy)]
pub struct HarmonicOscillator {
    pub omega: Scalar,
    pub amplitude: Scalar,
}

impl HarmonicOscillator {
    pub fn new(omega: Scalar, amplitude: Scalar) -> Self {
        Self { omega, amplitude }
    }

    pub fn initial_state(&self) -> [Scalar; 2] {
        [self.amplitude, 0.0]
    }

    pub fn exact(&self, t: Scalar) -> [Scalar; 2] {
        let phase = self.omega * t;
        [
            self.amplitude * phase.cos(),
            -self.amplitude * self.omega * phase.sin(),
        ]
    }

    /// Total energy (should be conserved)
    pub fn energy(&self, y: &[Scalar; 2]) -> Scalar {
        0.5 * y[1] * y[1] + 0.5 * self.omega * self.omega * y[0] * y[0]
    }
}

impl OdeSystem<2> for HarmonicOscillator {
    fn derivative(&self, _t: Scalar, y: &[Scalar; 2]) -> [Scalar; 2] {
        [y[1], -self.omega * self.omega * y[0]]
    }
}

/// y' = −λ(y − cos t) − sin t, exact solution y = cos t from y(0) = 1.
///
/// Stiff for large λ: any perturbation decays at rate λ while the solution
/// itself varies on a unit time scale.
#[derive(Debug, Clone, Copy)]
pub struct StiffRelaxation {
    pub lambda: Scalar,
}

impl StiffRelaxation {
    pub fn exact(&self, t: Scalar) -> Scalar {
        t.cos()
    }
}

impl OdeSystem<1> for StiffRelaxation {
    fn derivative(&self, t: Scalar, y: &[Scalar; 1]) -> [Scalar; 1] {
        [-self.lambda * (y[0] - t.cos()) - t.sin()]
    }
}

/// y' = y², which from y(0) = 1 blows up at t = 1
#[derive(Debug, Clone, Copy, Default)]
pub struct FiniteTimeBlowUp;

impl OdeSystem<1> for FiniteTimeBlowUp {
    fn derivative(&self, _t: Scalar, y: &[Scalar; 1]) -> [Scalar; 1] {
        [y[0] * y[0]]
    }
}

/// Largest componentwise difference between two trajectories' states
pub fn max_state_difference<'a>(
    a: impl IntoIterator<Item = &'a State>,
    b: impl IntoIterator<Item = &'a State>,
) -> Scalar {
    a.into_iter()
        .zip(b)
        .map(|(x, y)| x.max_abs_difference(y))
        .fold(0.0, Scalar::max)
}

/// Assert two scalars agree within `tolerance`, with a readable message
#[track_caller]
pub fn assert_close(actual: Scalar, expected: Scalar, tolerance: Scalar, what: &str) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "{what}: expected {expected}, got {actual} (difference {:e}, tolerance {tolerance:e})",
        (actual - expected).abs()
    );
}
