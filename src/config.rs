//! Layered run configuration
//!
//! Defaults come from the `ConfigDefaults` derive on each section. A TOML
//! file may override any subset of keys, and the user-level loader
//! additionally reads `SYNODIC__<SECTION>__<KEY>` environment variables.

use crate::error::SynodicResult;
use crate::physics::integrators::{Method, SolverOptions, Tolerances};
use crate::physics::lagrange::BisectionConfig;
use crate::physics::math::Scalar;
use crate::physics::state::{MassRatio, State};
use crate::physics::trajectory::{IntegrationSettings, TimeSpan, uniform_output_times};
use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use synodic_macros::ConfigDefaults;
use tracing::{info, warn};

const CONFIG_FILE_NAME: &str = "config.toml";
const ENV_PREFIX: &str = "SYNODIC";
const ENV_SEPARATOR: &str = "__";

#[derive(ConfigDefaults, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    #[default(PhysicsConfig::default())]
    pub physics: PhysicsConfig,

    #[default(IntegratorConfig::default())]
    pub integrator: IntegratorConfig,

    #[default(OutputConfig::default())]
    pub output: OutputConfig,

    #[default(BisectionConfig::default())]
    pub lagrange: BisectionConfig,
}

#[derive(ConfigDefaults, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PhysicsConfig {
    /// μ, in (0, 0.5]
    #[default(0.5)]
    pub mass_ratio: Scalar,

    /// Initial (x, y, u, v) in the rotating frame
    #[default([0.65, 0.0, 0.0, 2.07])]
    pub initial_state: [Scalar; 4],
}

#[derive(ConfigDefaults, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct IntegratorConfig {
    #[default(Method::Rk45)]
    pub method: Method,

    #[default(1e-12)]
    pub rtol: Scalar,

    #[default(1e-12)]
    pub atol: Scalar,

    #[default(None)]
    pub first_step: Option<Scalar>,

    #[default(None)]
    pub max_step: Option<Scalar>,

    #[default(SolverOptions::DEFAULT_MAX_STEPS)]
    pub max_steps: usize,
}

#[derive(ConfigDefaults, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    #[default(0.0)]
    pub t_start: Scalar,

    #[default(30.0)]
    pub t_end: Scalar,

    /// Uniformly spaced output times, endpoints included
    #[default(200)]
    pub points: usize,
}

impl IntegratorConfig {
    pub fn solver_options(&self) -> SolverOptions {
        SolverOptions {
            tolerances: Tolerances::new(self.rtol, self.atol),
            first_step: self.first_step,
            max_step: self.max_step,
            max_steps: self.max_steps,
        }
    }
}

impl SimulationConfig {
    pub fn mass_ratio(&self) -> SynodicResult<MassRatio> {
        MassRatio::new(self.physics.mass_ratio)
    }

    pub fn initial_state(&self) -> State {
        State::from_array(self.physics.initial_state)
    }

    pub fn time_span(&self) -> TimeSpan {
        TimeSpan::new(self.output.t_start, self.output.t_end)
    }

    pub fn output_times(&self) -> SynodicResult<Vec<Scalar>> {
        uniform_output_times(self.time_span(), self.output.points)
    }

    pub fn integration_settings(&self) -> IntegrationSettings {
        IntegrationSettings {
            method: self.integrator.method,
            options: self.integrator.solver_options(),
        }
    }

    /// Check every section without running anything.
    pub fn validate(&self) -> SynodicResult<()> {
        self.mass_ratio()?;
        let span = self.time_span();
        span.validate()?;
        self.integrator.solver_options().validate(&span)?;
        self.output_times()?;
        self.lagrange.validate()
    }

    /// Parse TOML text, warning about keys no section recognizes.
    pub fn from_toml_str(content: &str) -> SynodicResult<Self> {
        let table: toml::Table = toml::from_str(content)?;
        report_unknown_keys(&table);
        Ok(toml::Value::Table(table).try_into()?)
    }

    /// Load a TOML file.
    ///
    /// # Errors
    /// `Io` when the file cannot be read, `Config` when it does not parse.
    pub fn load(path: impl AsRef<Path>) -> SynodicResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from a file, falling back to defaults if the file
    /// is missing or invalid
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => match Self::from_toml_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    warn!(
                        "Failed to parse config file {}: {e}. Using defaults.",
                        path.display()
                    );
                    Self::default()
                }
            },
            Err(_) => {
                info!("Config file {} not found. Using defaults.", path.display());
                Self::default()
            }
        }
    }

    /// Platform configuration file, e.g. `~/.config/synodic/config.toml`
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "synodic").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Defaults, overlaid with the user configuration file when present and
    /// then with `SYNODIC__*` environment variables
    pub fn load_from_user_config() -> Self {
        let environment = Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true);
        match Self::load_layered(Self::user_config_path().as_deref(), environment) {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load user configuration: {e}. Using defaults.");
                Self::default()
            }
        }
    }

    fn load_layered(file: Option<&Path>, environment: Environment) -> SynodicResult<Self> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            info!("Reading user configuration from {}", path.display());
            file_unknown_keys(path)?;
            builder = builder.add_source(File::from(path).required(false));
        }
        let config = builder.add_source(environment).build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to a file
    pub fn save(&self, path: impl AsRef<Path>) -> SynodicResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Warn about each unknown key and return them.
fn report_unknown_keys(table: &toml::Table) -> Vec<String> {
    let unknown = unknown_keys(table);
    for key in &unknown {
        warn!("Ignoring unknown configuration key '{key}'");
    }
    unknown
}

/// Unknown keys of an optional TOML file; a missing file has none.
fn file_unknown_keys(path: &Path) -> SynodicResult<Vec<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(report_unknown_keys(&toml::from_str::<toml::Table>(&content)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Dotted paths of keys in `table` that no section declares.
fn unknown_keys(table: &toml::Table) -> Vec<String> {
    let mut unknown = Vec::new();
    for (section, value) in table {
        let fields = match section.as_str() {
            "physics" => PhysicsConfig::FIELDS,
            "integrator" => IntegratorConfig::FIELDS,
            "output" => OutputConfig::FIELDS,
            "lagrange" => BisectionConfig::FIELDS,
            _ => {
                debug_assert!(!SimulationConfig::FIELDS.contains(&section.as_str()));
                unknown.push(section.clone());
                continue;
            }
        };
        if let Some(keys) = value.as_table() {
            unknown.extend(
                keys.keys()
                    .filter(|key| !fields.contains(&key.as_str()))
                    .map(|key| format!("{section}.{key}")),
            );
        }
    }
    unknown
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_reference_scenario() {
        let config = SimulationConfig::default();
        assert_eq!(config.physics.mass_ratio, 0.5);
        assert_eq!(config.physics.initial_state, [0.65, 0.0, 0.0, 2.07]);
        assert_eq!(config.integrator.method, Method::Rk45);
        assert_eq!(config.integrator.rtol, 1e-12);
        assert_eq!(config.integrator.atol, 1e-12);
        assert_eq!(config.integrator.max_steps, 10_000_000);
        assert_eq!(config.output.points, 200);
        assert_eq!(config.time_span(), TimeSpan::new(0.0, 30.0));
        assert_eq!(config.lagrange, BisectionConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = SimulationConfig::from_toml_str(
            r#"
            [physics]
            mass_ratio = 0.01215

            [integrator]
            method = "DOP853"
            rtol = 1e-10
            "#,
        )
        .unwrap();
        assert_eq!(config.physics.mass_ratio, 0.01215);
        assert_eq!(config.physics.initial_state, [0.65, 0.0, 0.0, 2.07]);
        assert_eq!(config.integrator.method, Method::Rkf78);
        assert_eq!(config.integrator.rtol, 1e-10);
        assert_eq!(config.integrator.atol, 1e-12);
        assert_eq!(config.output, OutputConfig::default());
    }

    #[test]
    fn test_unknown_keys_are_reported() {
        let table: toml::Table = toml::from_str(
            r#"
            colour = "blue"
            [physics]
            mass_ratio = 0.2
            gravity = 9.81
            [lagrange]
            max_iterations = 10
            "#,
        )
        .unwrap();
        let mut unknown = unknown_keys(&table);
        unknown.sort();
        assert_eq!(unknown, vec!["colour", "physics.gravity"]);
    }

    #[test]
    fn test_validate_catches_bad_sections() {
        let mut config = SimulationConfig::default();
        config.physics.mass_ratio = 0.75;
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::default();
        config.output.points = 1;
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::default();
        config.integrator.rtol = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let path = std::env::temp_dir().join(format!("synodic-config-{}.toml", std::process::id()));
        let mut config = SimulationConfig::default();
        config.integrator.method = Method::Auto;
        config.integrator.max_step = Some(0.1);
        config.output.points = 17;

        config.save(&path).unwrap();
        let loaded = SimulationConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = SimulationConfig::load_or_default("/nonexistent/synodic/config.toml");
        assert_eq!(config, SimulationConfig::default());
        assert!(SimulationConfig::load("/nonexistent/synodic/config.toml").is_err());
    }

    #[test]
    fn test_environment_overrides() {
        let variables = HashMap::from([
            ("SYNODIC__PHYSICS__MASS_RATIO".to_string(), "0.3".to_string()),
            ("SYNODIC__INTEGRATOR__METHOD".to_string(), "rkf78".to_string()),
            ("SYNODIC__OUTPUT__POINTS".to_string(), "50".to_string()),
        ]);
        let environment = Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .source(Some(variables));

        let config = SimulationConfig::load_layered(None, environment).unwrap();
        assert_eq!(config.physics.mass_ratio, 0.3);
        assert_eq!(config.integrator.method, Method::Rkf78);
        assert_eq!(config.output.points, 50);
        assert_eq!(config.output.t_end, 30.0);
    }

    #[test]
    fn test_user_config_file_typos_are_reported() {
        let path = std::env::temp_dir().join(format!("synodic-user-{}.toml", std::process::id()));
        std::fs::write(&path, "[integrator]\nmethod = \"auto\"\nrtoll = 1e-9\n").unwrap();

        let unknown = file_unknown_keys(&path).unwrap();
        let environment = Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .source(Some(HashMap::new()));
        let config = SimulationConfig::load_layered(Some(path.as_path()), environment).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(unknown, vec!["integrator.rtoll"]);
        assert_eq!(config.integrator.method, Method::Auto);
        assert_eq!(config.integrator.rtol, 1e-12);
        assert!(file_unknown_keys(Path::new("/nonexistent/synodic/config.toml"))
            .unwrap()
            .is_empty());
    }
}
