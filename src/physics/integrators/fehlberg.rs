//! Runge–Kutta–Fehlberg 7(8)
//!
//! Thirteen stages, propagating the eighth-order solution (local
//! extrapolation). The embedded seventh-order weights differ from the
//! eighth-order ones in only four stages, which gives the compact error
//! estimate h·41/840·(k₀ + k₁₀ − k₁₁ − k₁₂).
//!
//! The pair has no continuous extension. Output times inside a step are
//! reached by a shortened step from its start, so every sample carries the
//! full eighth order.

use super::adaptive::{self, Attempt, Stepper};
use super::{Integrator, OdeSystem, Output, SolveError, Solution, SolverOptions, SolverStats, TimeSpan};
use crate::physics::math::{Scalar, combine_stages};

const STAGES: usize = 13;

const C: [Scalar; STAGES] = [
    0.0,
    2.0 / 27.0,
    1.0 / 9.0,
    1.0 / 6.0,
    5.0 / 12.0,
    1.0 / 2.0,
    5.0 / 6.0,
    1.0 / 6.0,
    2.0 / 3.0,
    1.0 / 3.0,
    1.0,
    0.0,
    1.0,
];

const A: [&[Scalar]; STAGES - 1] = [
    &[2.0 / 27.0],
    &[1.0 / 36.0, 1.0 / 12.0],
    &[1.0 / 24.0, 0.0, 1.0 / 8.0],
    &[5.0 / 12.0, 0.0, -25.0 / 16.0, 25.0 / 16.0],
    &[1.0 / 20.0, 0.0, 0.0, 1.0 / 4.0, 1.0 / 5.0],
    &[-25.0 / 108.0, 0.0, 0.0, 125.0 / 108.0, -65.0 / 27.0, 125.0 / 54.0],
    &[31.0 / 300.0, 0.0, 0.0, 0.0, 61.0 / 225.0, -2.0 / 9.0, 13.0 / 900.0],
    &[2.0, 0.0, 0.0, -53.0 / 6.0, 704.0 / 45.0, -107.0 / 9.0, 67.0 / 90.0, 3.0],
    &[
        -91.0 / 108.0,
        0.0,
        0.0,
        23.0 / 108.0,
        -976.0 / 135.0,
        311.0 / 54.0,
        -19.0 / 60.0,
        17.0 / 6.0,
        -1.0 / 12.0,
    ],
    &[
        2383.0 / 4100.0,
        0.0,
        0.0,
        -341.0 / 164.0,
        4496.0 / 1025.0,
        -301.0 / 82.0,
        2133.0 / 4100.0,
        45.0 / 82.0,
        45.0 / 164.0,
        18.0 / 41.0,
    ],
    &[
        3.0 / 205.0,
        0.0,
        0.0,
        0.0,
        0.0,
        -6.0 / 41.0,
        -3.0 / 205.0,
        -3.0 / 41.0,
        3.0 / 41.0,
        6.0 / 41.0,
        0.0,
    ],
    &[
        -1777.0 / 4100.0,
        0.0,
        0.0,
        -341.0 / 164.0,
        4496.0 / 1025.0,
        -289.0 / 82.0,
        2193.0 / 4100.0,
        51.0 / 82.0,
        33.0 / 164.0,
        12.0 / 41.0,
        0.0,
        1.0,
    ],
];

/// Eighth-order weights
const B: [Scalar; STAGES] = [
    0.0,
    0.0,
    0.0,
    0.0,
    0.0,
    34.0 / 105.0,
    9.0 / 35.0,
    9.0 / 35.0,
    9.0 / 280.0,
    9.0 / 280.0,
    0.0,
    41.0 / 840.0,
    41.0 / 840.0,
];

const ERROR_WEIGHT: Scalar = 41.0 / 840.0;

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FehlbergStepper;

impl FehlbergStepper {
    const ERROR_ORDER: usize = 7;
}

impl<const N: usize> Stepper<N> for FehlbergStepper {
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
        let mut k = [[0.0; N]; STAGES];
        k[0] = *f;
        for stage in 1..STAGES {
            let argument = combine_stages(y, h, A[stage - 1], &k[..stage]);
            k[stage] = system.derivative(t + C[stage] * h, &argument);
        }

        let y_new = combine_stages(y, h, &B, &k);
        let f_new = system.derivative(t + h, &y_new);
        stats.function_evaluations += STAGES;

        let error: [Scalar; N] =
            std::array::from_fn(|i| h * ERROR_WEIGHT * (k[0][i] + k[10][i] - k[11][i] - k[12][i]));

        Attempt {
            y_new,
            f_new,
            error,
            error_order: Self::ERROR_ORDER,
            interpolant: None,
            stiffness: None,
            singular: false,
        }
    }
}

/// Fehlberg 7(8)
#[derive(Debug, Clone, Copy, Default)]
pub struct Fehlberg78;

impl<const N: usize> Integrator<N> for Fehlberg78 {
    fn clone_box(&self) -> Box<dyn Integrator<N>> {
        Box::new(*self)
    }

    fn name(&self) -> &'static str {
        "rkf78"
    }

    fn aliases(&self) -> Vec<&'static str> {
        vec!["RKF78", "rk8", "DOP853"]
    }

    fn convergence_order(&self) -> usize {
        8
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
            &mut FehlbergStepper,
            system,
            span,
            y0,
            output,
            options,
        )
    }
}
