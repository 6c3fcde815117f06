//! Error types for configuration, agent construction and ticking

use crate::components::LocationId;

/// Invalid configuration, raised when a simulation or one of its parts is built
#[derive(Debug)]
pub enum ConfigError {
    /// A numeric parameter is outside its allowed range
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },
    /// More agents requested as infected/recovered than the population holds
    SeedingExceedsPopulation {
        population: usize,
        infected: usize,
        recovered: usize,
    },
    /// The initial population could not be placed
    Population(SimulationError),
    Json(serde_json::Error),
    Io(std::io::Error),
}

impl ConfigError {
    pub(crate) fn invalid(name: &'static str, value: f64, reason: &'static str) -> Self {
        ConfigError::InvalidParameter {
            name,
            value,
            reason,
        }
    }
}

/// Fails unless `value` is finite and strictly positive
pub(crate) fn require_positive(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::invalid(name, value, "must be finite and > 0"))
    }
}

/// Fails unless `value` is finite and within `[0, 1]`
pub(crate) fn require_unit(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::invalid(name, value, "must be within [0, 1]"))
    }
}

/// Fails unless `value` is finite and non-negative
pub(crate) fn require_non_negative(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::invalid(name, value, "must be finite and >= 0"))
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Json(e)
    }
}

impl From<SimulationError> for ConfigError {
    fn from(e: SimulationError) -> Self {
        ConfigError::Population(e)
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidParameter {
                name,
                value,
                reason,
            } => write!(f, "Invalid {}: {} ({})", name, value, reason),
            ConfigError::SeedingExceedsPopulation {
                population,
                infected,
                recovered,
            } => write!(
                f,
                "Cannot seed {} infected and {} recovered in a population of {}",
                infected, recovered, population
            ),
            ConfigError::Population(e) => write!(f, "Cannot seed population: {}", e),
            ConfigError::Json(e) => write!(f, "Config parse error: {}", e),
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Json(e) => Some(e),
            ConfigError::Io(e) => Some(e),
            ConfigError::Population(e) => Some(e),
            _ => None,
        }
    }
}

/// A human could not be constructed from the given kinematics
#[derive(Debug, Clone, PartialEq)]
pub enum FactoryError {
    NonFinite { field: &'static str, value: f64 },
}

impl std::fmt::Display for FactoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FactoryError::NonFinite { field, value } => {
                write!(f, "Human construction declined: {} is {}", field, value)
            }
        }
    }
}

impl std::error::Error for FactoryError {}

/// A tick or a population change could not be applied
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationError {
    /// Elapsed time must be finite and non-negative
    InvalidElapsed(f64),
    /// The entity is not a live human of this world
    UnknownHuman(hecs::Entity),
    UnknownLocation(LocationId),
    /// The human's recorded location does not list it as a member
    MembershipMismatch {
        human: hecs::Entity,
        location: LocationId,
    },
    Factory(FactoryError),
}

impl From<FactoryError> for SimulationError {
    fn from(e: FactoryError) -> Self {
        SimulationError::Factory(e)
    }
}

impl std::fmt::Display for SimulationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimulationError::InvalidElapsed(dt) => {
                write!(f, "Elapsed time must be finite and >= 0, got {}", dt)
            }
            SimulationError::UnknownHuman(entity) => write!(f, "Unknown human {:?}", entity),
            SimulationError::UnknownLocation(id) => write!(f, "Unknown location {}", id),
            SimulationError::MembershipMismatch { human, location } => {
                write!(f, "Human {:?} is not a member of {}", human, location)
            }
            SimulationError::Factory(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SimulationError {}
