//! Adaptive ODE solvers
//!
//! Every built-in method is an embedded pair driven by one shared
//! error-controlled step loop. Solutions are reported at caller-chosen times
//! through each method's dense output, so the requested grid never constrains
//! the internal step sizes.
//!
//! The solvers know nothing about the restricted problem: they integrate any
//! [`OdeSystem`] of fixed dimension `N`.

use crate::error::{SynodicError, SynodicResult};
use crate::physics::math::Scalar;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

mod adaptive;
mod dense;
pub mod dormand_prince;
pub mod fehlberg;
pub mod registry;
mod rosenbrock;
pub mod switching;

pub use dormand_prince::DormandPrince45;
pub use fehlberg::Fehlberg78;
pub use registry::IntegratorRegistry;
pub use switching::StiffnessSwitching;

/// Right-hand side of an autonomous or time-dependent system y' = f(t, y).
pub trait OdeSystem<const N: usize> {
    fn derivative(&self, t: Scalar, y: &[Scalar; N]) -> [Scalar; N];
}

impl<const N: usize, F> OdeSystem<N> for F
where
    F: Fn(Scalar, &[Scalar; N]) -> [Scalar; N],
{
    fn derivative(&self, t: Scalar, y: &[Scalar; N]) -> [Scalar; N] {
        self(t, y)
    }
}

/// Base trait for all integrators
pub trait Integrator<const N: usize>: Send + Sync {
    fn clone_box(&self) -> Box<dyn Integrator<N>>;

    /// Canonical lookup name
    fn name(&self) -> &'static str;

    /// Alternate lookup names
    fn aliases(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Order of the propagated solution
    fn convergence_order(&self) -> usize;

    /// Integrate `system` from `y0` across `span`.
    ///
    /// # Errors
    /// [`SolveError::Invalid`] for rejected inputs, before any derivative is
    /// evaluated; [`SolveError::Failed`] when the run cannot be completed.
    fn solve(
        &self,
        system: &dyn OdeSystem<N>,
        span: TimeSpan,
        y0: &[Scalar; N],
        output: Output<'_>,
        options: &SolverOptions,
    ) -> Result<Solution<N>, SolveError<N>>;
}

/// Integration interval. `end < start` integrates backward in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start: Scalar,
    pub end: Scalar,
}

impl TimeSpan {
    pub const fn new(start: Scalar, end: Scalar) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> Scalar {
        (self.end - self.start).abs()
    }

    /// +1 forward, −1 backward
    pub fn direction(&self) -> Scalar {
        if self.end >= self.start { 1.0 } else { -1.0 }
    }

    pub fn reversed(&self) -> Self {
        Self::new(self.end, self.start)
    }

    /// Whether `t` lies in the closed interval.
    pub fn contains(&self, t: Scalar) -> bool {
        let (lo, hi) = if self.start <= self.end {
            (self.start, self.end)
        } else {
            (self.end, self.start)
        };
        (lo..=hi).contains(&t)
    }

    pub fn validate(&self) -> SynodicResult<()> {
        if !(self.start.is_finite() && self.end.is_finite()) {
            return Err(SynodicError::invalid(
                "time_span",
                format!("endpoints must be finite, got [{}, {}]", self.start, self.end),
            ));
        }
        if self.start == self.end {
            return Err(SynodicError::invalid(
                "time_span",
                format!("degenerate span: t0 = tf = {}", self.start),
            ));
        }
        Ok(())
    }
}

/// Where the solution is reported.
#[derive(Debug, Clone, Copy)]
pub enum Output<'a> {
    /// Interpolated at exactly these times
    At(&'a [Scalar]),
    /// At the start and after every accepted step
    Steps,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerances {
    pub rtol: Scalar,
    pub atol: Scalar,
}

impl Tolerances {
    /// Smallest accepted relative tolerance
    pub const MIN_RTOL: Scalar = 100.0 * Scalar::EPSILON;

    pub const fn new(rtol: Scalar, atol: Scalar) -> Self {
        Self { rtol, atol }
    }

    pub fn validate(&self) -> SynodicResult<()> {
        if !(self.rtol.is_finite() && self.rtol >= Self::MIN_RTOL) {
            return Err(SynodicError::invalid(
                "rtol",
                format!(
                    "must be finite and at least {:e}, got {}",
                    Self::MIN_RTOL,
                    self.rtol
                ),
            ));
        }
        if !(self.atol.is_finite() && self.atol >= 0.0) {
            return Err(SynodicError::invalid(
                "atol",
                format!("must be finite and non-negative, got {}", self.atol),
            ));
        }
        Ok(())
    }
}

impl Default for Tolerances {
    fn default() -> Self {
        Self::new(1e-12, 1e-12)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverOptions {
    pub tolerances: Tolerances,
    /// Size of the first attempted step; chosen automatically when `None`
    pub first_step: Option<Scalar>,
    /// Upper bound on |h|
    pub max_step: Option<Scalar>,
    /// Budget of step attempts, accepted and rejected
    pub max_steps: usize,
}

impl SolverOptions {
    pub const DEFAULT_MAX_STEPS: usize = 10_000_000;

    pub fn with_tolerances(rtol: Scalar, atol: Scalar) -> Self {
        Self {
            tolerances: Tolerances::new(rtol, atol),
            ..Self::default()
        }
    }

    pub fn validate(&self, span: &TimeSpan) -> SynodicResult<()> {
        self.tolerances.validate()?;
        if let Some(h) = self.first_step
            && !(h.is_finite() && h > 0.0 && h <= span.duration())
        {
            return Err(SynodicError::invalid(
                "first_step",
                format!("must lie in (0, {}], got {h}", span.duration()),
            ));
        }
        if let Some(h) = self.max_step
            && (h.is_nan() || h <= 0.0)
        {
            return Err(SynodicError::invalid(
                "max_step",
                format!("must be positive, got {h}"),
            ));
        }
        if self.max_steps == 0 {
            return Err(SynodicError::invalid(
                "max_steps",
                "at least one step attempt is required",
            ));
        }
        Ok(())
    }
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            tolerances: Tolerances::default(),
            first_step: None,
            max_step: None,
            max_steps: Self::DEFAULT_MAX_STEPS,
        }
    }
}

/// Work counters for one solve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverStats {
    pub function_evaluations: usize,
    pub jacobian_evaluations: usize,
    pub lu_decompositions: usize,
    pub accepted_steps: usize,
    pub rejected_steps: usize,
    pub stiffness_switches: usize,
}

impl fmt::Display for SolverStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} accepted, {} rejected, {} evaluations, {} jacobians, {} LU, {} switches",
            self.accepted_steps,
            self.rejected_steps,
            self.function_evaluations,
            self.jacobian_evaluations,
            self.lu_decompositions,
            self.stiffness_switches
        )
    }
}

/// Sampled solution, `t` strictly monotone in the direction of integration.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution<const N: usize> {
    pub t: Vec<Scalar>,
    pub y: Vec<[Scalar; N]>,
    pub stats: SolverStats,
}

impl<const N: usize> Solution<N> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            t: Vec::with_capacity(capacity),
            y: Vec::with_capacity(capacity),
            stats: SolverStats::default(),
        }
    }

    pub fn push(&mut self, t: Scalar, y: [Scalar; N]) {
        self.t.push(t);
        self.y.push(y);
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    pub fn last(&self) -> Option<(Scalar, &[Scalar; N])> {
        Some((*self.t.last()?, self.y.last()?))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Scalar, &[Scalar; N])> {
        self.t.iter().copied().zip(self.y.iter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    NonFiniteDerivative,
    StepSizeTooSmall,
    MaxStepsExceeded,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::NonFiniteDerivative => "state derivative became non-finite",
            Self::StepSizeTooSmall => "required step size fell below floating-point spacing",
            Self::MaxStepsExceeded => "step attempt budget exhausted",
        };
        f.write_str(message)
    }
}

/// A run that stopped before reaching the end of its span.
#[derive(Debug, Clone, Error)]
#[error("solver stopped at t = {time}: {reason} (last accepted t = {last_t})")]
pub struct SolverFailure<const N: usize> {
    pub reason: FailureReason,
    /// Time at which the failure was detected
    pub time: Scalar,
    /// Last accepted time and state
    pub last_t: Scalar,
    pub last_y: [Scalar; N],
    /// Output produced before the failure
    pub partial: Solution<N>,
}

#[derive(Debug, Error)]
pub enum SolveError<const N: usize> {
    #[error(transparent)]
    Invalid(#[from] SynodicError),

    #[error(transparent)]
    Failed(Box<SolverFailure<N>>),
}

/// Integration method selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Dormand–Prince 5(4)
    #[default]
    #[serde(alias = "RK45", alias = "dopri5")]
    Rk45,

    /// Fehlberg 7(8), propagating the eighth-order solution
    #[serde(alias = "RKF78", alias = "rk8", alias = "DOP853")]
    Rkf78,

    /// Dormand–Prince with automatic switching to Rosenbrock 2(3) on stiffness
    #[serde(alias = "LSODA", alias = "lsoda")]
    Auto,
}

impl Method {
    pub const ALL: [Method; 3] = [Self::Rk45, Self::Rkf78, Self::Auto];

    pub fn name(self) -> &'static str {
        match self {
            Self::Rk45 => "rk45",
            Self::Rkf78 => "rkf78",
            Self::Auto => "auto",
        }
    }

    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::Rk45 => &["RK45", "dopri5"],
            Self::Rkf78 => &["RKF78", "rk8", "DOP853"],
            Self::Auto => &["LSODA", "lsoda"],
        }
    }

    /// Case-sensitive lookup by canonical name or alias.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|method| method.name() == name || method.aliases().contains(&name))
    }

    pub fn integrator<const N: usize>(self) -> Box<dyn Integrator<N>> {
        match self {
            Self::Rk45 => Box::new(DormandPrince45),
            Self::Rkf78 => Box::new(Fehlberg78),
            Self::Auto => Box::new(StiffnessSwitching),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Method {
    type Err = SynodicError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::from_name(name).ok_or_else(|| SynodicError::UnknownMethod {
            name: name.to_string(),
            available: Self::ALL.map(Method::name).join(", "),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_span_validation() {
        assert!(TimeSpan::new(0.0, 30.0).validate().is_ok());
        assert!(TimeSpan::new(30.0, 0.0).validate().is_ok());
        assert!(TimeSpan::new(1.0, 1.0).validate().is_err());
        assert!(TimeSpan::new(0.0, Scalar::INFINITY).validate().is_err());
        assert!(TimeSpan::new(Scalar::NAN, 1.0).validate().is_err());
    }

    #[test]
    fn test_time_span_direction_and_contains() {
        let backward = TimeSpan::new(5.0, -1.0);
        assert_eq!(backward.direction(), -1.0);
        assert_eq!(backward.duration(), 6.0);
        assert!(backward.contains(0.0));
        assert!(backward.contains(5.0));
        assert!(!backward.contains(5.5));
        assert_eq!(backward.reversed(), TimeSpan::new(-1.0, 5.0));
    }

    #[test]
    fn test_tolerance_validation() {
        assert!(Tolerances::default().validate().is_ok());
        assert!(Tolerances::new(1e-15, 1e-12).validate().is_err());
        assert!(Tolerances::new(1e-6, -1.0).validate().is_err());
        assert!(Tolerances::new(Scalar::NAN, 1e-6).validate().is_err());
        assert!(Tolerances::new(1e-6, 0.0).validate().is_ok());
    }

    #[test]
    fn test_solver_option_validation() {
        let span = TimeSpan::new(0.0, 1.0);
        assert!(SolverOptions::default().validate(&span).is_ok());

        let too_long = SolverOptions {
            first_step: Some(2.0),
            ..Default::default()
        };
        assert!(too_long.validate(&span).is_err());

        let no_budget = SolverOptions {
            max_steps: 0,
            ..Default::default()
        };
        assert!(no_budget.validate(&span).is_err());

        let bad_max_step = SolverOptions {
            max_step: Some(Scalar::NAN),
            ..Default::default()
        };
        assert!(bad_max_step.validate(&span).is_err());
    }

    #[test]
    fn test_method_names_and_aliases() {
        assert_eq!(Method::from_name("rk45"), Some(Method::Rk45));
        assert_eq!(Method::from_name("dopri5"), Some(Method::Rk45));
        assert_eq!(Method::from_name("DOP853"), Some(Method::Rkf78));
        assert_eq!(Method::from_name("LSODA"), Some(Method::Auto));
        assert_eq!(Method::from_name("Rk45"), None);

        let err = "euler".parse::<Method>().unwrap_err();
        assert!(err.to_string().contains("rk45, rkf78, auto"));
    }

    #[test]
    fn test_method_serde_aliases() {
        #[derive(Deserialize)]
        struct Wrapper {
            method: Method,
        }

        let parsed: Wrapper = toml::from_str("method = \"RK45\"").unwrap();
        assert_eq!(parsed.method, Method::Rk45);
        let parsed: Wrapper = toml::from_str("method = \"rkf78\"").unwrap();
        assert_eq!(parsed.method, Method::Rkf78);
        let parsed: Wrapper = toml::from_str("method = \"lsoda\"").unwrap();
        assert_eq!(parsed.method, Method::Auto);
    }

    #[test]
    fn test_method_integrators_match_names() {
        for method in Method::ALL {
            let integrator = method.integrator::<4>();
            assert_eq!(integrator.name(), method.name());
            let aliases = integrator.aliases();
            assert_eq!(aliases.as_slice(), method.aliases());
        }
    }

    #[test]
    fn test_closures_are_ode_systems() {
        let decay = |_t: Scalar, y: &[Scalar; 1]| [-y[0]];
        assert_eq!(decay.derivative(0.0, &[2.0]), [-2.0]);
    }
}
