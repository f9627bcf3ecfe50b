//! Automatic stiff/non-stiff switching
//!
//! Integration starts on Dormand–Prince. After every accepted explicit step
//! the stepper's estimate of h·λ is compared with the boundary of the
//! method's stability region; fifteen accepted steps beyond it (without six
//! consecutive calm steps in between) move the run onto the Rosenbrock
//! stepper. In stiff mode h·‖J‖∞ is tracked instead and fifteen consecutive
//! steps inside the explicit stability region switch back.

use super::adaptive::{self, Attempt, Stepper};
use super::dormand_prince::DormandPrinceStepper;
use super::rosenbrock::RosenbrockStepper;
use super::{Integrator, OdeSystem, Output, SolveError, Solution, SolverOptions, SolverStats, TimeSpan};
use crate::physics::math::Scalar;
use tracing::debug;

/// Approximate extent of the Dormand–Prince stability region on the
/// negative real axis
const STABILITY_BOUND: Scalar = 3.25;
const STIFF_STEPS_TO_SWITCH: u32 = 15;
const CALM_STEPS_TO_RESET: u32 = 6;
const CALM_STEPS_TO_RETURN: u32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Explicit,
    Implicit,
}

#[derive(Debug, Clone)]
pub(crate) struct SwitchingStepper {
    mode: Mode,
    stiff_steps: u32,
    calm_steps: u32,
}

impl Default for SwitchingStepper {
    fn default() -> Self {
        Self {
            mode: Mode::Explicit,
            stiff_steps: 0,
            calm_steps: 0,
        }
    }
}

impl SwitchingStepper {
    fn switch_to(&mut self, mode: Mode, h: Scalar, stats: &mut SolverStats) {
        debug!("switching to {mode:?} stepping at |h| = {:e}", h.abs());
        self.mode = mode;
        self.stiff_steps = 0;
        self.calm_steps = 0;
        stats.stiffness_switches += 1;
    }
}

impl<const N: usize> Stepper<N> for SwitchingStepper {
    fn error_order(&self) -> usize {
        DormandPrinceStepper::ERROR_ORDER
    }

    fn attempt(
        &mut self,
        system: &dyn OdeSystem<N>,
        t: Scalar,
        y: &[Scalar; N],
        f: &[Scalar; N],
        h: Scalar,
        stats: &mut SolverStats,
    ) -> Attempt<N> {
        match self.mode {
            Mode::Explicit => DormandPrinceStepper.attempt(system, t, y, f, h, stats),
            Mode::Implicit => RosenbrockStepper.attempt(system, t, y, f, h, stats),
        }
    }

    fn on_accept(&mut self, attempt: &Attempt<N>, h: Scalar, stats: &mut SolverStats) {
        let Some(stiffness) = attempt.stiffness else {
            return;
        };

        match self.mode {
            Mode::Explicit => {
                if stiffness > STABILITY_BOUND {
                    self.calm_steps = 0;
                    self.stiff_steps += 1;
                    if self.stiff_steps >= STIFF_STEPS_TO_SWITCH {
                        self.switch_to(Mode::Implicit, h, stats);
                    }
                } else {
                    self.calm_steps += 1;
                    if self.calm_steps >= CALM_STEPS_TO_RESET {
                        self.stiff_steps = 0;
                    }
                }
            }
            Mode::Implicit => {
                if stiffness < STABILITY_BOUND {
                    self.calm_steps += 1;
                    if self.calm_steps >= CALM_STEPS_TO_RETURN {
                        self.switch_to(Mode::Explicit, h, stats);
                    }
                } else {
                    self.calm_steps = 0;
                }
            }
        }
    }
}

/// Dormand–Prince 5(4) that hands over to Rosenbrock 2(3) while the problem
/// is stiff
#[derive(Debug, Clone, Copy, Default)]
pub struct StiffnessSwitching;

impl<const N: usize> Integrator<N> for StiffnessSwitching {
    fn clone_box(&self) -> Box<dyn Integrator<N>> {
        Box::new(*self)
    }

    fn name(&self) -> &'static str {
        "auto"
    }

    fn aliases(&self) -> Vec<&'static str> {
        vec!["LSODA", "lsoda"]
    }

    /// Order in non-stiff stretches
    fn convergence_order(&self) -> usize {
        5
    }

    fn solve(
        &self,
        system: &dyn OdeSystem<N>,
        span: TimeSpan,
        y0: &[Scalar; N],
        output: Output<'_>,
        options: &SolverOptions,
    ) -> Result<Solution<N>, SolveError<N>> {
        adaptive::integrate(
            <Self as Integrator<N>>::name(self),
            &mut SwitchingStepper::default(),
            system,
            span,
            y0,
            output,
            options,
        )
    }
}
