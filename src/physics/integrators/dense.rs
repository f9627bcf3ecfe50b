//! Continuous extensions of a single accepted step.
//!
//! `theta` is the normalized position inside the step, 0 at the start and
//! 1 at the end. All forms reproduce both endpoints.

use crate::physics::math::Scalar;

#[derive(Debug, Clone)]
pub(crate) enum Interpolant<const N: usize> {
    /// y(θ) = y0 + h Σ_m q[i][m] θ^(m+1)
    Quartic {
        y0: [Scalar; N],
        h: Scalar,
        q: [[Scalar; 4]; N],
    },
    /// Second-order Rosenbrock extension using the first two stages
    Rosenbrock {
        y0: [Scalar; N],
        h: Scalar,
        k1: [Scalar; N],
        k2: [Scalar; N],
        gamma: Scalar,
    },
}

impl<const N: usize> Interpolant<N> {
    pub(crate) fn evaluate(&self, theta: Scalar) -> [Scalar; N] {
        match self {
            Self::Quartic { y0, h, q } => std::array::from_fn(|i| {
                let [q1, q2, q3, q4] = q[i];
                y0[i] + h * theta * (q1 + theta * (q2 + theta * (q3 + theta * q4)))
            }),
            Self::Rosenbrock {
                y0,
                h,
                k1,
                k2,
                gamma,
            } => {
                let denominator = 1.0 - 2.0 * gamma;
                let w1 = theta * (1.0 - theta) / denominator;
                let w2 = theta * (theta - 2.0 * gamma) / denominator;
                std::array::from_fn(|i| y0[i] + h * (w1 * k1[i] + w2 * k2[i]))
            }
        }
    }
}
