//! Parameter sweeps over independent runs
//!
//! Every job is a pure function of its own inputs, so jobs run on the rayon
//! pool without coordination. Results come back in input order and each
//! failure stays attached to its own job.

use crate::error::SynodicResult;
use crate::physics::lagrange::{BisectionConfig, LagrangePointSet, locate_lagrange_points_with};
use crate::physics::math::Scalar;
use crate::physics::state::State;
use crate::physics::trajectory::{IntegrationSettings, TimeSpan, Trajectory, integrate_with};
use rayon::prelude::*;
use tracing::debug;

/// One trajectory to integrate.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepJob {
    pub initial_state: State,
    pub mass_ratio: Scalar,
    pub time_span: TimeSpan,
    pub output_times: Vec<Scalar>,
}

/// Lagrange points for each mass ratio.
pub fn locate_lagrange_points_many(
    mass_ratios: &[Scalar],
    config: &BisectionConfig,
) -> Vec<SynodicResult<LagrangePointSet>> {
    debug!("locating Lagrange points for {} mass ratios", mass_ratios.len());
    mass_ratios
        .par_iter()
        .map(|&mass_ratio| locate_lagrange_points_with(mass_ratio, config))
        .collect()
}

/// Integrate every job with the same method and tolerances.
pub fn integrate_many(
    jobs: &[SweepJob],
    settings: &IntegrationSettings,
) -> Vec<SynodicResult<Trajectory>> {
    debug!("integrating {} trajectories with {}", jobs.len(), settings.method);
    jobs.par_iter()
        .map(|job| {
            integrate_with(
                job.initial_state,
                settings,
                job.time_span,
                &job.output_times,
                job.mass_ratio,
            )
        })
        .collect()
}
