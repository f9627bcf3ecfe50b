//! Error-controlled step loop shared by every integrator.

use super::dense::Interpolant;
use super::{
    FailureReason, OdeSystem, Output, SolveError, Solution, SolverFailure, SolverOptions,
    SolverStats, TimeSpan, Tolerances,
};
use crate::error::SynodicError;
use crate::physics::math::{Scalar, add_scaled, all_finite, rms_norm, spacing};
use tracing::debug;

const SAFETY: Scalar = 0.9;
const MIN_FACTOR: Scalar = 0.2;
const MAX_FACTOR: Scalar = 10.0;

/// Result of one attempted step from (t, y) with signed size h.
pub(crate) struct Attempt<const N: usize> {
    pub y_new: [Scalar; N],
    /// f(t + h, y_new)
    pub f_new: [Scalar; N],
    /// Local error estimate
    pub error: [Scalar; N],
    /// Order of the error estimate; the step exponent is −1/(order + 1)
    pub error_order: usize,
    /// `None` when the method has no continuous extension
    pub interpolant: Option<Interpolant<N>>,
    /// Stiffness measure: h·λ estimate for explicit stages, h·‖J‖∞ for
    /// implicit ones
    pub stiffness: Option<Scalar>,
    /// The implicit stage matrix could not be factored at this step size
    pub singular: bool,
}

impl<const N: usize> Attempt<N> {
    /// Attempt that must be retried with a smaller step.
    pub(crate) fn singular(y: &[Scalar; N], f: &[Scalar; N], error_order: usize) -> Self {
        Self {
            y_new: *y,
            f_new: *f,
            error: [0.0; N],
            error_order,
            interpolant: None,
            stiffness: None,
            singular: true,
        }
    }

    fn is_finite(&self) -> bool {
        all_finite(&self.y_new) && all_finite(&self.f_new) && all_finite(&self.error)
    }
}

/// One embedded pair.
pub(crate) trait Stepper<const N: usize> {
    /// Order used by the automatic first-step estimate.
    fn error_order(&self) -> usize;

    /// Try a step of signed size `h`. `f` is f(t, y).
    fn attempt(
        &mut self,
        system: &dyn OdeSystem<N>,
        t: Scalar,
        y: &[Scalar; N],
        f: &[Scalar; N],
        h: Scalar,
        stats: &mut SolverStats,
    ) -> Attempt<N>;

    /// State at `te`, strictly inside the accepted step of size `h` from
    /// (t, y). Without an interpolant, a shortened step from (t, y) lands on
    /// `te` at the full order of the method.
    #[allow(clippy::too_many_arguments)]
    fn sample(
        &mut self,
        system: &dyn OdeSystem<N>,
        t: Scalar,
        y: &[Scalar; N],
        f: &[Scalar; N],
        h: Scalar,
        te: Scalar,
        attempt: &Attempt<N>,
        stats: &mut SolverStats,
    ) -> [Scalar; N] {
        match &attempt.interpolant {
            Some(interpolant) => interpolant.evaluate((te - t) / h),
            None => self.attempt(system, t, y, f, te - t, stats).y_new,
        }
    }

    /// Called once for every accepted step.
    fn on_accept(&mut self, _attempt: &Attempt<N>, _h: Scalar, _stats: &mut SolverStats) {}
}

/// Scaled RMS norm of the local error.
fn error_norm<const N: usize>(
    error: &[Scalar; N],
    y: &[Scalar; N],
    y_new: &[Scalar; N],
    tolerances: &Tolerances,
) -> Scalar {
    let scaled: [Scalar; N] = std::array::from_fn(|i| {
        let scale = tolerances.atol + tolerances.rtol * y[i].abs().max(y_new[i].abs());
        error[i] / scale
    });
    rms_norm(&scaled)
}

/// Hairer–Wanner starting step estimate.
#[allow(clippy::too_many_arguments)]
fn initial_step<const N: usize>(
    system: &dyn OdeSystem<N>,
    t0: Scalar,
    y0: &[Scalar; N],
    f0: &[Scalar; N],
    direction: Scalar,
    interval: Scalar,
    error_order: usize,
    tolerances: &Tolerances,
    stats: &mut SolverStats,
) -> Scalar {
    let scale: [Scalar; N] =
        std::array::from_fn(|i| tolerances.atol + y0[i].abs() * tolerances.rtol);
    let d0 = rms_norm::<N>(&std::array::from_fn(|i| y0[i] / scale[i]));
    let d1 = rms_norm::<N>(&std::array::from_fn(|i| f0[i] / scale[i]));

    let h0 = if d0 < 1e-5 || d1 < 1e-5 {
        1e-6
    } else {
        0.01 * d0 / d1
    }
    .min(interval);

    let y1 = add_scaled(y0, h0 * direction, f0);
    let f1 = system.derivative(t0 + h0 * direction, &y1);
    stats.function_evaluations += 1;
    let d2 = rms_norm::<N>(&std::array::from_fn(|i| (f1[i] - f0[i]) / scale[i])) / h0;

    let h1 = if d1 <= 1e-15 && d2 <= 1e-15 {
        (h0 * 1e-3).max(1e-6)
    } else {
        (0.01 / d1.max(d2)).powf(1.0 / (error_order as Scalar + 1.0))
    };

    // NaN from a non-finite trial step falls through to the other bounds
    (100.0 * h0).min(h1).min(interval)
}

fn validate_output_times(span: &TimeSpan, times: &[Scalar]) -> Result<(), SynodicError> {
    let direction = span.direction();
    for (i, &t) in times.iter().enumerate() {
        if !t.is_finite() || !span.contains(t) {
            return Err(SynodicError::invalid(
                "output_times",
                format!(
                    "time {t} at index {i} lies outside [{}, {}]",
                    span.start, span.end
                ),
            ));
        }
        if i > 0 && direction * (t - times[i - 1]) <= 0.0 {
            return Err(SynodicError::invalid(
                "output_times",
                format!("times must be strictly monotone along the span; index {i} is not"),
            ));
        }
    }
    Ok(())
}

/// Run `stepper` across `span`, sampling output times through
/// [`Stepper::sample`].
pub(crate) fn integrate<const N: usize, S: Stepper<N>>(
    name: &'static str,
    stepper: &mut S,
    system: &dyn OdeSystem<N>,
    span: TimeSpan,
    y0: &[Scalar; N],
    output: Output<'_>,
    options: &SolverOptions,
) -> Result<Solution<N>, SolveError<N>> {
    span.validate()?;
    options.validate(&span)?;
    if !all_finite(y0) {
        return Err(SynodicError::invalid("initial_state", "components must be finite").into());
    }
    if let Output::At(times) = output {
        validate_output_times(&span, times)?;
    }

    let TimeSpan { start: t0, end: tf } = span;
    let direction = span.direction();
    let tolerances = options.tolerances;
    let max_step = options.max_step.unwrap_or(Scalar::INFINITY);

    debug!(
        "{name}: integrating over [{t0}, {tf}] with rtol = {:e}, atol = {:e}",
        tolerances.rtol, tolerances.atol
    );

    let mut stats = SolverStats::default();
    let mut solution = match output {
        Output::At(times) => Solution::with_capacity(times.len()),
        Output::Steps => Solution::with_capacity(64),
    };
    let mut next_output = 0;

    let fail = |reason: FailureReason,
                time: Scalar,
                last_t: Scalar,
                last_y: [Scalar; N],
                mut partial: Solution<N>,
                stats: SolverStats| {
        partial.stats = stats;
        debug!("{name}: stopped at t = {time}: {reason} ({stats})");
        SolveError::Failed(Box::new(SolverFailure {
            reason,
            time,
            last_t,
            last_y,
            partial,
        }))
    };

    let mut t = t0;
    let mut y = *y0;
    let mut f = system.derivative(t, &y);
    stats.function_evaluations += 1;

    match output {
        Output::At(times) => {
            while next_output < times.len() && times[next_output] == t0 {
                solution.push(t0, y);
                next_output += 1;
            }
        }
        Output::Steps => solution.push(t0, y),
    }

    if !all_finite(&f) {
        return Err(fail(FailureReason::NonFiniteDerivative, t0, t, y, solution, stats));
    }

    let mut h_abs = match options.first_step {
        Some(h) => h,
        None => initial_step(
            system,
            t0,
            &y,
            &f,
            direction,
            span.duration(),
            stepper.error_order(),
            &tolerances,
            &mut stats,
        ),
    };

    let mut attempts = 0;

    while direction * (tf - t) > 0.0 {
        let min_step = 10.0 * spacing(t);
        h_abs = h_abs.min(max_step).max(min_step);

        let mut rejected = false;
        let (attempt, t_new, h) = loop {
            if h_abs < min_step {
                return Err(fail(FailureReason::StepSizeTooSmall, t, t, y, solution, stats));
            }
            if attempts >= options.max_steps {
                return Err(fail(FailureReason::MaxStepsExceeded, t, t, y, solution, stats));
            }
            attempts += 1;

            let mut t_new = t + direction * h_abs;
            if direction * (t_new - tf) > 0.0 {
                t_new = tf;
            }
            let h = t_new - t;
            h_abs = h.abs();

            let attempt = stepper.attempt(system, t, &y, &f, h, &mut stats);

            let norm = if attempt.singular {
                Scalar::INFINITY
            } else if !attempt.is_finite() {
                return Err(fail(
                    FailureReason::NonFiniteDerivative,
                    t_new,
                    t,
                    y,
                    solution,
                    stats,
                ));
            } else {
                error_norm(&attempt.error, &y, &attempt.y_new, &tolerances)
            };
            let exponent = -1.0 / (attempt.error_order as Scalar + 1.0);

            if norm < 1.0 {
                let mut factor = if norm == 0.0 {
                    MAX_FACTOR
                } else {
                    (SAFETY * norm.powf(exponent)).min(MAX_FACTOR)
                };
                if rejected {
                    factor = factor.min(1.0);
                }
                h_abs *= factor;
                stats.accepted_steps += 1;
                break (attempt, t_new, h);
            }

            h_abs *= (SAFETY * norm.powf(exponent)).max(MIN_FACTOR);
            stats.rejected_steps += 1;
            rejected = true;
        };

        match output {
            Output::At(times) => {
                while next_output < times.len() && direction * (times[next_output] - t_new) <= 0.0
                {
                    let te = times[next_output];
                    let state = if te == t_new {
                        attempt.y_new
                    } else {
                        stepper.sample(system, t, &y, &f, h, te, &attempt, &mut stats)
                    };
                    solution.push(te, state);
                    next_output += 1;
                }
            }
            Output::Steps => solution.push(t_new, attempt.y_new),
        }

        stepper.on_accept(&attempt, h, &mut stats);

        t = t_new;
        y = attempt.y_new;
        f = attempt.f_new;
    }

    solution.stats = stats;
    debug!("{name}: reached t = {tf} ({stats})");
    Ok(solution)
}
