//! Command line interface for synodic

use clap::Parser;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

use crate::config::SimulationConfig;
use crate::error::{SynodicError, SynodicResult};
use crate::physics::integrators::IntegratorRegistry;
use crate::physics::integrators::Method;
use crate::physics::lagrange::{LagrangePoint, LagrangePointSet, locate_lagrange_points_with};
use crate::physics::math::Scalar;
use crate::physics::state::State;
use crate::physics::trajectory::{Sample, Trajectory, integrate_with};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (built ",
    env!("BUILD_DATE"),
    ")"
);

/// Synodic - restricted three-body trajectories and Lagrange points
#[derive(Parser, Debug)]
#[command(version, long_version = LONG_VERSION, about, long_about = None)]
pub struct Args {
    /// Path to configuration file (TOML format)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Mass ratio μ in (0, 0.5] (overrides config file)
    #[arg(short = 'm', long, value_name = "MU")]
    pub mass_ratio: Option<f64>,

    /// Initial state in the rotating frame (overrides config file)
    #[arg(
        short = 's',
        long,
        value_name = "X,Y,U,V",
        value_parser = parse_state,
        allow_hyphen_values = true
    )]
    pub state: Option<State>,

    /// Integration method (e.g., rk45, rkf78, auto)
    #[arg(short = 'i', long, value_name = "METHOD")]
    pub method: Option<String>,

    /// Start of the time span (overrides config file)
    #[arg(long, value_name = "T", allow_hyphen_values = true)]
    pub t_start: Option<f64>,

    /// End of the time span (overrides config file)
    #[arg(long, value_name = "T", allow_hyphen_values = true)]
    pub t_end: Option<f64>,

    /// Number of uniformly spaced output points (overrides config file)
    #[arg(short = 'n', long, value_name = "COUNT")]
    pub points: Option<usize>,

    /// Relative tolerance (overrides config file)
    #[arg(long, value_name = "TOL")]
    pub rtol: Option<f64>,

    /// Absolute tolerance (overrides config file)
    #[arg(long, value_name = "TOL")]
    pub atol: Option<f64>,

    /// Only print the Lagrange points
    #[arg(long)]
    pub lagrange_only: bool,

    /// List available integrators and exit
    #[arg(long)]
    pub list_integrators: bool,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

fn parse_state(value: &str) -> Result<State, String> {
    let components = value
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|e| format!("invalid component '{part}': {e}"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let components: [f64; 4] = components
        .try_into()
        .map_err(|parts: Vec<f64>| format!("expected 4 components x,y,u,v, got {}", parts.len()))?;
    Ok(State::from_array(components))
}

/// Handles the --list-integrators flag by printing available integrators
pub fn handle_list_integrators(out: &mut impl Write) -> SynodicResult<()> {
    let registry = IntegratorRegistry::<4>::default();
    writeln!(out, "Available integrators:")?;
    for name in registry.list_available() {
        writeln!(out, "  - {name}")?;
    }

    let aliases = registry.list_aliases();
    if !aliases.is_empty() {
        writeln!(out, "\nAliases:")?;
        for (alias, target) in aliases {
            writeln!(out, "  - {alias} -> {target}")?;
        }
    }
    Ok(())
}

/// Loads configuration from file or defaults, then applies command-line overrides
pub fn load_and_apply_config(args: &Args) -> SynodicResult<SimulationConfig> {
    let mut config = if let Some(config_path) = &args.config {
        info!("Loading configuration from: {}", config_path.display());
        SimulationConfig::load_or_default(config_path)
    } else {
        SimulationConfig::load_from_user_config()
    };

    if let Some(mass_ratio) = args.mass_ratio {
        info!("Overriding mass ratio to: {mass_ratio}");
        config.physics.mass_ratio = mass_ratio;
    }

    if let Some(state) = args.state {
        info!("Overriding initial state to: {state}");
        config.physics.initial_state = state.to_array();
    }

    if let Some(name) = &args.method {
        let registry = IntegratorRegistry::<4>::default();
        let integrator = registry.create(name)?;
        let method = Method::from_name(integrator.name()).ok_or_else(|| {
            SynodicError::invalid("method", format!("'{name}' has no method selector"))
        })?;
        info!("Using integrator: {method}");
        config.integrator.method = method;
    }

    if let Some(t_start) = args.t_start {
        config.output.t_start = t_start;
    }
    if let Some(t_end) = args.t_end {
        config.output.t_end = t_end;
    }
    if let Some(points) = args.points {
        config.output.points = points;
    }
    if let Some(rtol) = args.rtol {
        config.integrator.rtol = rtol;
    }
    if let Some(atol) = args.atol {
        config.integrator.atol = atol;
    }

    config.validate()?;
    Ok(config)
}

#[derive(Debug, Serialize)]
struct LagrangeRecord {
    mass_ratio: Scalar,
    point: LagrangePoint,
    x: Scalar,
    y: Scalar,
}

#[derive(Debug, Serialize)]
struct TrajectoryRecord {
    t: Scalar,
    x: Scalar,
    y: Scalar,
    u: Scalar,
    v: Scalar,
}

impl From<&Sample> for TrajectoryRecord {
    fn from(sample: &Sample) -> Self {
        let State { x, y, u, v } = sample.state;
        Self { t: sample.t, x, y, u, v }
    }
}

/// Lagrange points as a `mass_ratio,point,x,y` CSV table.
pub fn write_lagrange_table(out: &mut impl Write, points: &LagrangePointSet) -> SynodicResult<()> {
    let mass_ratio = points.mass_ratio().value();
    let mut writer = csv::Writer::from_writer(out);
    for (point, position) in points.iter() {
        writer.serialize(LagrangeRecord {
            mass_ratio,
            point,
            x: position.x,
            y: position.y,
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// Trajectory samples as a `t,x,y,u,v` CSV table.
pub fn write_trajectory_csv(out: &mut impl Write, trajectory: &Trajectory) -> SynodicResult<()> {
    let mut writer = csv::Writer::from_writer(out);
    for sample in trajectory {
        writer.serialize(TrajectoryRecord::from(sample))?;
    }
    writer.flush()?;
    Ok(())
}

/// Compute everything the arguments ask for and write it to `out`.
pub fn run(args: &Args, out: &mut impl Write) -> SynodicResult<()> {
    let config = load_and_apply_config(args)?;
    let mass_ratio = config.mass_ratio()?;

    let points = locate_lagrange_points_with(mass_ratio.value(), &config.lagrange)?;
    write_lagrange_table(out, &points)?;
    if args.lagrange_only {
        return Ok(());
    }
    // Blank line between the two tables
    writeln!(out)?;

    let output_times = config.output_times()?;
    let trajectory = integrate_with(
        config.initial_state(),
        &config.integration_settings(),
        config.time_span(),
        &output_times,
        mass_ratio.value(),
    )?;
    write_trajectory_csv(out, &trajectory)?;

    info!(
        "{}: {} samples, {}",
        trajectory.method(),
        trajectory.len(),
        trajectory.stats()
    );
    if let Some(drift) = trajectory.jacobi_drift(mass_ratio) {
        info!("Jacobi constant drift: {drift:e}");
    }
    Ok(())
}
