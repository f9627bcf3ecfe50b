//! Trajectory propagation for the restricted problem
//!
//! Thin layer over the generic solvers: validates the physical inputs, wires
//! the equations of motion in as the ODE system and converts solver output
//! into [`Sample`]s.

use crate::error::{SynodicError, SynodicResult};
use crate::physics::equations::{Cr3bp, jacobi_constant};
use crate::physics::integrators::{
    FailureReason, Integrator, Method, Output, SolveError, Solution, SolverFailure, SolverOptions,
    SolverStats,
};
use crate::physics::math::{Point, Scalar};
use crate::physics::state::{MassRatio, State};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub use crate::physics::integrators::TimeSpan;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub t: Scalar,
    pub state: State,
}

/// Time-ordered states from one integration call.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    samples: Vec<Sample>,
    method: &'static str,
    stats: SolverStats,
}

impl Trajectory {
    fn from_solution(solution: Solution<4>, method: &'static str) -> Self {
        let samples = solution
            .iter()
            .map(|(t, y)| Sample {
                t,
                state: State::from_array(*y),
            })
            .collect();
        Self {
            samples,
            method,
            stats: solution.stats,
        }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn first(&self) -> Option<&Sample> {
        self.samples.first()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    pub fn times(&self) -> impl Iterator<Item = Scalar> + '_ {
        self.samples.iter().map(|sample| sample.t)
    }

    pub fn states(&self) -> impl Iterator<Item = &State> {
        self.samples.iter().map(|sample| &sample.state)
    }

    pub fn positions(&self) -> Vec<Point> {
        self.states().map(State::position).collect()
    }

    /// Canonical name of the integrator that produced this trajectory
    pub fn method(&self) -> &'static str {
        self.method
    }

    pub fn stats(&self) -> &SolverStats {
        &self.stats
    }

    /// Largest deviation of the Jacobi constant from its initial value.
    pub fn jacobi_drift(&self, mass_ratio: MassRatio) -> Option<Scalar> {
        let initial = jacobi_constant(&self.first()?.state, mass_ratio);
        Some(
            self.states()
                .map(|state| (jacobi_constant(state, mass_ratio) - initial).abs())
                .fold(0.0, Scalar::max),
        )
    }
}

impl<'a> IntoIterator for &'a Trajectory {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

/// Integration that stopped before the end of its span.
#[derive(Debug, Clone, Error)]
#[error(
    "integration failed at t = {time}: {reason} (last valid sample at t = {})",
    .last_sample.t
)]
pub struct IntegrationFailure {
    pub reason: FailureReason,
    /// Time at which divergence was detected
    pub time: Scalar,
    /// Last accepted state before the failure
    pub last_sample: Sample,
    /// Output produced before the failure
    pub partial: Trajectory,
}

/// Method and solver options for one run.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IntegrationSettings {
    pub method: Method,
    pub options: SolverOptions,
}

impl IntegrationSettings {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            options: SolverOptions::default(),
        }
    }

    pub fn with_tolerances(mut self, rtol: Scalar, atol: Scalar) -> Self {
        self.options.tolerances.rtol = rtol;
        self.options.tolerances.atol = atol;
        self
    }
}

/// Integrate from `initial_state` across `time_span`, reporting the state at
/// each time in `output_times`, with the default tolerances of `method`.
///
/// # Errors
/// `InvalidParameter` for a mass ratio outside (0, 0.5], a degenerate span,
/// fewer than two output times, or output times outside the span or out of
/// order. `IntegrationFailure` when the derivative becomes non-finite or the
/// solver cannot continue.
pub fn integrate(
    initial_state: State,
    method: Method,
    time_span: TimeSpan,
    output_times: &[Scalar],
    mass_ratio: Scalar,
) -> SynodicResult<Trajectory> {
    integrate_with(
        initial_state,
        &IntegrationSettings::new(method),
        time_span,
        output_times,
        mass_ratio,
    )
}

pub fn integrate_with(
    initial_state: State,
    settings: &IntegrationSettings,
    time_span: TimeSpan,
    output_times: &[Scalar],
    mass_ratio: Scalar,
) -> SynodicResult<Trajectory> {
    let mass_ratio = MassRatio::new(mass_ratio)?;
    time_span.validate()?;
    if output_times.len() < 2 {
        return Err(SynodicError::invalid(
            "output_times",
            format!(
                "at least 2 output times are required, got {}",
                output_times.len()
            ),
        ));
    }

    let integrator = settings.method.integrator::<4>();
    propagate(
        integrator.as_ref(),
        &settings.options,
        initial_state,
        time_span,
        Output::At(output_times),
        mass_ratio,
    )
}

/// Like [`integrate_with`], but reports every accepted step instead of
/// pinned output times.
pub fn integrate_adaptive(
    initial_state: State,
    settings: &IntegrationSettings,
    time_span: TimeSpan,
    mass_ratio: Scalar,
) -> SynodicResult<Trajectory> {
    let mass_ratio = MassRatio::new(mass_ratio)?;
    let integrator = settings.method.integrator::<4>();
    propagate(
        integrator.as_ref(),
        &settings.options,
        initial_state,
        time_span,
        Output::Steps,
        mass_ratio,
    )
}

/// Run any [`Integrator`] on the restricted problem.
pub fn propagate(
    integrator: &dyn Integrator<4>,
    options: &SolverOptions,
    initial_state: State,
    time_span: TimeSpan,
    output: Output<'_>,
    mass_ratio: MassRatio,
) -> SynodicResult<Trajectory> {
    let system = Cr3bp::new(mass_ratio);
    let method = integrator.name();

    match integrator.solve(
        &system,
        time_span,
        &initial_state.to_array(),
        output,
        options,
    ) {
        Ok(solution) => {
            debug!(
                "{method}: {} samples for {mass_ratio} from {initial_state}",
                solution.len()
            );
            Ok(Trajectory::from_solution(solution, method))
        }
        Err(SolveError::Invalid(err)) => Err(err),
        Err(SolveError::Failed(failure)) => {
            let SolverFailure {
                reason,
                time,
                last_t,
                last_y,
                partial,
            } = *failure;
            warn!("{method}: integration for {mass_ratio} failed at t = {time}: {reason}");
            Err(IntegrationFailure {
                reason,
                time,
                last_sample: Sample {
                    t: last_t,
                    state: State::from_array(last_y),
                },
                partial: Trajectory::from_solution(partial, method),
            }
            .into())
        }
    }
}

/// `count` evenly spaced times from `span.start` to `span.end`, both
/// endpoints exact.
pub fn uniform_output_times(span: TimeSpan, count: usize) -> SynodicResult<Vec<Scalar>> {
    span.validate()?;
    if count < 2 {
        return Err(SynodicError::invalid(
            "points",
            format!("at least 2 output points are required, got {count}"),
        ));
    }

    let last = count - 1;
    let step = (span.end - span.start) / last as Scalar;
    Ok((0..count)
        .map(|i| {
            if i == last {
                span.end
            } else {
                span.start + i as Scalar * step
            }
        })
        .collect())
}
