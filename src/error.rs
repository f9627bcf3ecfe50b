//! Error taxonomy shared by the library and the binary

use crate::physics::lagrange::LagrangePoint;
use crate::physics::math::Scalar;
use crate::physics::trajectory::IntegrationFailure;
use thiserror::Error;

pub type SynodicResult<T> = Result<T, SynodicError>;

#[derive(Debug, Error)]
pub enum SynodicError {
    /// Input rejected before any numerical work was done
    #[error("invalid parameter `{parameter}`: {reason}")]
    InvalidParameter {
        parameter: &'static str,
        reason: String,
    },

    /// The solver stopped partway; the payload carries the partial trajectory
    #[error(transparent)]
    IntegrationFailure(Box<IntegrationFailure>),

    /// Only raised when the locator runs in strict mode
    #[error(
        "{point} did not converge within {iterations} iterations \
         (best estimate x = {estimate}, |f| = {residual:e})"
    )]
    RootNotConverged {
        point: LagrangePoint,
        iterations: usize,
        estimate: Scalar,
        residual: Scalar,
    },

    #[error("unknown integration method '{name}'. Available methods: {available}")]
    UnknownMethod { name: String, available: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("CSV output error: {0}")]
    Csv(#[from] csv::Error),
}

impl SynodicError {
    pub fn invalid(parameter: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter,
            reason: reason.into(),
        }
    }

    /// The failure payload, when the error came from a diverging integration.
    pub fn as_integration_failure(&self) -> Option<&IntegrationFailure> {
        match self {
            Self::IntegrationFailure(failure) => Some(failure),
            _ => None,
        }
    }
}

impl From<IntegrationFailure> for SynodicError {
    fn from(failure: IntegrationFailure) -> Self {
        Self::IntegrationFailure(Box::new(failure))
    }
}

impl From<config::ConfigError> for SynodicError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<toml::de::Error> for SynodicError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for SynodicError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameter_message() {
        let err = SynodicError::invalid("points", "at least 2 output times are required");
        assert_eq!(
            err.to_string(),
            "invalid parameter `points`: at least 2 output times are required"
        );
        assert!(err.as_integration_failure().is_none());
    }

    #[test]
    fn test_root_not_converged_message_names_point() {
        let err = SynodicError::RootNotConverged {
            point: LagrangePoint::L2,
            iterations: 3,
            estimate: -1.2,
            residual: 0.5,
        };
        let message = err.to_string();
        assert!(message.starts_with("L2 did not converge within 3 iterations"));
    }

    #[test]
    fn test_config_errors_convert() {
        let parse = toml::from_str::<toml::Table>("mass_ratio = [").unwrap_err();
        let err: SynodicError = parse.into();
        assert!(matches!(err, SynodicError::Config(_)));
    }
}
