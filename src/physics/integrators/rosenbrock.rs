//! Linearly implicit Rosenbrock 2(3) stepper for stiff stretches.
//!
//! Each attempt forms W = I − h·γ·J from a finite-difference Jacobian and
//! reuses its LU factorization for all three stages. The second-order
//! solution is propagated; the third stage only feeds the error estimate.

use super::OdeSystem;
use super::SolverStats;
use super::adaptive::{Attempt, Stepper};
use super::dense::Interpolant;
use crate::physics::math::{Scalar, add_scaled, all_finite};
use nalgebra::{DMatrix, DVector, Dyn, LU};
use std::f64::consts::SQRT_2;

const GAMMA: Scalar = 1.0 / (2.0 + SQRT_2);
const E32: Scalar = 6.0 + SQRT_2;

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct RosenbrockStepper;

impl RosenbrockStepper {
    pub(crate) const ERROR_ORDER: usize = 2;
}

/// Forward-difference Jacobian ∂f/∂y at (t, y).
fn jacobian<const N: usize>(
    system: &dyn OdeSystem<N>,
    t: Scalar,
    y: &[Scalar; N],
    f: &[Scalar; N],
    stats: &mut SolverStats,
) -> DMatrix<Scalar> {
    let mut jac = DMatrix::zeros(N, N);
    let root_eps = Scalar::EPSILON.sqrt();
    for j in 0..N {
        let mut shifted = *y;
        shifted[j] += root_eps * y[j].abs().max(1.0);
        let delta = shifted[j] - y[j];
        let column = system.derivative(t, &shifted);
        for i in 0..N {
            jac[(i, j)] = (column[i] - f[i]) / delta;
        }
    }
    stats.function_evaluations += N;
    stats.jacobian_evaluations += 1;
    jac
}

/// Forward-difference ∂f/∂t at (t, y), stepping in the direction of `h`.
fn time_derivative<const N: usize>(
    system: &dyn OdeSystem<N>,
    t: Scalar,
    y: &[Scalar; N],
    f: &[Scalar; N],
    h: Scalar,
    stats: &mut SolverStats,
) -> [Scalar; N] {
    let shifted = t + h.signum() * Scalar::EPSILON.sqrt() * t.abs().max(1.0);
    let delta = shifted - t;
    let f_shifted = system.derivative(shifted, y);
    stats.function_evaluations += 1;
    std::array::from_fn(|i| (f_shifted[i] - f[i]) / delta)
}

/// Max absolute row sum.
fn infinity_norm(matrix: &DMatrix<Scalar>) -> Scalar {
    matrix
        .row_iter()
        .map(|row| row.iter().map(|v| v.abs()).sum::<Scalar>())
        .fold(0.0, Scalar::max)
}

fn solve_stage<const N: usize>(
    lu: &LU<Scalar, Dyn, Dyn>,
    rhs: [Scalar; N],
) -> Option<[Scalar; N]> {
    let solution = lu.solve(&DVector::from_column_slice(&rhs))?;
    let stage: [Scalar; N] = std::array::from_fn(|i| solution[i]);
    all_finite(&stage).then_some(stage)
}

impl<const N: usize> Stepper<N> for RosenbrockStepper {
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
        let jac = jacobian(system, t, y, f, stats);
        let dfdt = time_derivative(system, t, y, f, h, stats);
        let stiffness = h.abs() * infinity_norm(&jac);

        let w = DMatrix::identity(N, N) - &jac * (h * GAMMA);
        let lu = w.lu();
        stats.lu_decompositions += 1;

        let hd_t: [Scalar; N] = std::array::from_fn(|i| h * GAMMA * dfdt[i]);

        let singular = || Attempt::singular(y, f, Self::ERROR_ORDER);

        let Some(k1) = solve_stage::<N>(&lu, std::array::from_fn(|i| f[i] + hd_t[i])) else {
            return singular();
        };

        let f1 = system.derivative(t + 0.5 * h, &add_scaled(y, 0.5 * h, &k1));
        let Some(k2) = solve_stage::<N>(&lu, std::array::from_fn(|i| f1[i] - k1[i])) else {
            return singular();
        };
        let k2: [Scalar; N] = std::array::from_fn(|i| k2[i] + k1[i]);

        let y_new = add_scaled(y, h, &k2);
        let f2 = system.derivative(t + h, &y_new);
        stats.function_evaluations += 2;

        let Some(k3) = solve_stage::<N>(
            &lu,
            std::array::from_fn(|i| {
                f2[i] - E32 * (k2[i] - f1[i]) - 2.0 * (k1[i] - f[i]) + hd_t[i]
            }),
        ) else {
            return singular();
        };

        let error: [Scalar; N] =
            std::array::from_fn(|i| h / 6.0 * (k1[i] - 2.0 * k2[i] + k3[i]));

        // A non-finite derivative must surface as such, not as a singular matrix
        let y_new = if all_finite(&f1) && all_finite(&f2) {
            y_new
        } else {
            [Scalar::NAN; N]
        };

        Attempt {
            y_new,
            f_new: f2,
            error,
            error_order: Self::ERROR_ORDER,
            interpolant: Some(Interpolant::Rosenbrock {
                y0: *y,
                h,
                k1,
                k2,
                gamma: GAMMA,
            }),
            stiffness: Some(stiffness),
            singular: false,
        }
    }
}
