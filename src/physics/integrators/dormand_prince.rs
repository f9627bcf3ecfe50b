//! Dormand–Prince 5(4)
//!
//! Seven-stage embedded pair with first-same-as-last evaluation: the last
//! stage of an accepted step is f(t + h, y_new) and starts the next step, so
//! each attempt costs six new evaluations. The fifth-order solution is
//! propagated and sampled through the method's quartic continuous extension.

use super::adaptive::{self, Attempt, Stepper};
use super::dense::Interpolant;
use super::{Integrator, OdeSystem, Output, SolveError, Solution, SolverOptions, SolverStats, TimeSpan};
use crate::physics::math::{Scalar, combine_stages, distance};

const C: [Scalar; 6] = [0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0];

const A: [&[Scalar]; 5] = [
    &[1.0 / 5.0],
    &[3.0 / 40.0, 9.0 / 40.0],
    &[44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0],
    &[
        19372.0 / 6561.0,
        -25360.0 / 2187.0,
        64448.0 / 6561.0,
        -212.0 / 729.0,
    ],
    &[
        9017.0 / 3168.0,
        -355.0 / 33.0,
        46732.0 / 5247.0,
        49.0 / 176.0,
        -5103.0 / 18656.0,
    ],
];

const B: [Scalar; 6] = [
    35.0 / 384.0,
    0.0,
    500.0 / 1113.0,
    125.0 / 192.0,
    -2187.0 / 6784.0,
    11.0 / 84.0,
];

/// Difference between the fifth- and fourth-order weights
const E: [Scalar; 7] = [
    -71.0 / 57600.0,
    0.0,
    71.0 / 16695.0,
    -71.0 / 1920.0,
    17253.0 / 339200.0,
    -22.0 / 525.0,
    1.0 / 40.0,
];

/// Coefficients of θ, θ², θ³, θ⁴ in the continuous extension, per stage
const P: [[Scalar; 4]; 7] = [
    [
        1.0,
        -8048581381.0 / 2820520608.0,
        8663915743.0 / 2820520608.0,
        -12715105075.0 / 11282082432.0,
    ],
    [0.0, 0.0, 0.0, 0.0],
    [
        0.0,
        131558114200.0 / 32700410799.0,
        -68118460800.0 / 10900136933.0,
        87487479700.0 / 32700410799.0,
    ],
    [
        0.0,
        -1754552775.0 / 470086768.0,
        14199869525.0 / 1410260304.0,
        -10690763975.0 / 1880347072.0,
    ],
    [
        0.0,
        127303824393.0 / 49829197408.0,
        -318862633887.0 / 49829197408.0,
        701980252875.0 / 199316789632.0,
    ],
    [
        0.0,
        -282668133.0 / 205662961.0,
        2019193451.0 / 616988883.0,
        -1453857185.0 / 822651844.0,
    ],
    [
        0.0,
        40617522.0 / 29380423.0,
        -110615467.0 / 29380423.0,
        69997945.0 / 29380423.0,
    ],
];

/// Dormand–Prince step. Also reports Hairer's stiffness estimate
/// h·‖k7 − k6‖ / ‖y_new − y6‖, where y6 is the argument of the sixth stage.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DormandPrinceStepper;

impl DormandPrinceStepper {
    pub(crate) const ERROR_ORDER: usize = 4;
}

impl<const N: usize> Stepper<N> for DormandPrinceStepper {
    fn error_order(&self) -> usize {
        Self::ERROR_ORDER
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
        let mut k = [[0.0; N]; 7];
        k[0] = *f;

        let mut last_stage_argument = *y;
        for stage in 1..6 {
            let argument = combine_stages(y, h, A[stage - 1], &k[..stage]);
            k[stage] = system.derivative(t + C[stage] * h, &argument);
            last_stage_argument = argument;
        }

        let y_new = combine_stages(y, h, &B, &k[..6]);
        k[6] = system.derivative(t + h, &y_new);
        stats.function_evaluations += 6;

        let error: [Scalar; N] = std::array::from_fn(|i| {
            h * E.iter().zip(&k).map(|(e, stage)| e * stage[i]).sum::<Scalar>()
        });

        let q: [[Scalar; 4]; N] = std::array::from_fn(|i| {
            std::array::from_fn(|m| P.iter().zip(&k).map(|(p, stage)| p[m] * stage[i]).sum())
        });

        let spread = distance(&y_new, &last_stage_argument);
        let stiffness = if spread > 0.0 {
            h.abs() * distance(&k[6], &k[5]) / spread
        } else {
            0.0
        };

        Attempt {
            y_new,
            f_new: k[6],
            error,
            error_order: Self::ERROR_ORDER,
            interpolant: Some(Interpolant::Quartic { y0: *y, h, q }),
            stiffness: Some(stiffness),
            singular: false,
        }
    }
}

/// Dormand–Prince 5(4) with quartic dense output
#[derive(Debug, Clone, Copy, Default)]
pub struct DormandPrince45;

impl<const N: usize> Integrator<N> for DormandPrince45 {
    fn clone_box(&self) -> Box<dyn Integrator<N>> {
        Box::new(*self)
    }

    fn name(&self) -> &'static str {
        "rk45"
    }

    fn aliases(&self) -> Vec<&'static str> {
        vec!["RK45", "dopri5"]
    }

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
            &mut DormandPrinceStepper,
            system,
            span,
            y0,
            output,
            options,
        )
    }
}
