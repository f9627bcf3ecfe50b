//! Synodic prelude module
//!
//! Re-exports the types and functions most callers need.

pub use crate::config::SimulationConfig;
pub use crate::error::{SynodicError, SynodicResult};

pub use crate::physics::equations::{Cr3bp, derivative, effective_potential, jacobi_constant};
pub use crate::physics::integrators::{
    FailureReason, Integrator, IntegratorRegistry, Method, OdeSystem, Output, SolverOptions,
    SolverStats, Tolerances,
};
pub use crate::physics::lagrange::{
    BisectionConfig, LagrangePoint, LagrangePointSet, locate_lagrange_points,
    locate_lagrange_points_with,
};
pub use crate::physics::math::{Point, Scalar};
pub use crate::physics::state::{MassRatio, State};
pub use crate::physics::trajectory::{
    IntegrationFailure, IntegrationSettings, Sample, TimeSpan, Trajectory, integrate,
    integrate_adaptive, integrate_with, uniform_output_times,
};
