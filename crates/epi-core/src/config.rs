//! Simulation configuration.
//!
//! Everything the presentation layer (or the headless harness) needs to build
//! a [`Simulator`](crate::simulator::Simulator): world geometry, the pathogen
//! prototype, immune parameters, behaviour weights and the transmission rule.
//! Configurations deserialize from JSON; missing fields take their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::components::{ImmuneConfig, Pathogen};
use crate::error::{require_non_negative, require_positive, ConfigError};
use crate::generation::BehaviourDistribution;
use crate::world::WorldConfig;

/// Plain pathogen parameters, validated into a [`Pathogen`] prototype
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathogenConfig {
    pub incubation: f64,
    pub transmission_probability: f64,
    pub severity: f64,
    pub mortality: f64,
    pub infectious_duration: f64,
}

impl Default for PathogenConfig {
    fn default() -> Self {
        Self {
            incubation: 5.0,
            transmission_probability: 0.05,
            severity: 0.5,
            mortality: 0.8,
            infectious_duration: 12.0,
        }
    }
}

impl PathogenConfig {
    pub fn prototype(&self) -> Result<Pathogen, ConfigError> {
        Pathogen::new(
            self.incubation,
            self.transmission_probability,
            self.severity,
            self.mortality,
            self.infectious_duration,
        )
    }
}

/// Relative weights of the behaviour archetypes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviourWeights {
    pub normal: f64,
    pub cautious: f64,
    pub reckless: f64,
}

impl Default for BehaviourWeights {
    fn default() -> Self {
        Self {
            normal: 0.6,
            cautious: 0.3,
            reckless: 0.1,
        }
    }
}

impl BehaviourWeights {
    pub fn distribution(&self) -> Result<BehaviourDistribution, ConfigError> {
        BehaviourDistribution::new(self.normal, self.cautious, self.reckless)
    }
}

/// Which pairs of humans count as contacts during a tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransmissionRule {
    /// Everyone infectious in the same Location, weight 1
    SharedLocation,
    /// Infectious humans within `radius` (scaled by the target's contact factor), weight 1
    Proximity { radius: f64 },
    /// As `Proximity`, weight falling linearly from 1 at distance 0 to 0 at the radius
    DistanceDecay { radius: f64 },
}

impl Default for TransmissionRule {
    fn default() -> Self {
        TransmissionRule::Proximity { radius: 15.0 }
    }
}

impl TransmissionRule {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            TransmissionRule::SharedLocation => Ok(()),
            TransmissionRule::Proximity { radius } | TransmissionRule::DistanceDecay { radius } => {
                require_positive("transmission.radius", radius).map(|_| ())
            }
        }
    }

    /// Largest distance at which any contact can occur, if distance matters
    pub fn reach(&self) -> Option<f64> {
        let max_factor = crate::components::Behaviour::ALL
            .iter()
            .map(|b| b.contact_factor())
            .fold(0.0, f64::max);
        match *self {
            TransmissionRule::SharedLocation => None,
            TransmissionRule::Proximity { radius } | TransmissionRule::DistanceDecay { radius } => {
                Some(radius * max_factor)
            }
        }
    }
}

/// Tick-loop settings the simulator keeps after construction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulatorSettings {
    pub seed: u64,
    pub transmission: TransmissionRule,
    pub immunity: ImmuneConfig,
    pub base_speed: f64,
    /// Remove humans who die when their infection ends
    pub deaths_enabled: bool,
    /// Number of published count snapshots kept for live charting
    pub history_len: usize,
}

impl SimulatorSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.immunity.validate()?;
        self.transmission.validate()?;
        require_non_negative("base_speed", self.base_speed)?;
        Ok(())
    }
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        let config = SimulationConfig::default();
        config.settings()
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub seed: u64,
    pub world: WorldConfig,
    pub pathogen: PathogenConfig,
    pub immunity: ImmuneConfig,
    pub behaviour: BehaviourWeights,
    pub transmission: TransmissionRule,
    pub initial_infected: usize,
    pub initial_recovered: usize,
    /// Walking speed of a `Normal` human in arena units per second
    pub base_speed: f64,
    pub deaths_enabled: bool,
    pub history_len: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            world: WorldConfig::default(),
            pathogen: PathogenConfig::default(),
            immunity: ImmuneConfig::default(),
            behaviour: BehaviourWeights::default(),
            transmission: TransmissionRule::default(),
            initial_infected: 20,
            initial_recovered: 0,
            base_speed: 10.0,
            deaths_enabled: false,
            history_len: 2048,
        }
    }
}

impl SimulationConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: SimulationConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Check every parameter; the first problem found is returned
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.world.validate()?;
        self.pathogen.prototype()?;
        self.behaviour.distribution()?;
        self.settings().validate()?;

        let seeded = self.initial_infected.saturating_add(self.initial_recovered);
        if seeded > self.world.population_size {
            return Err(ConfigError::SeedingExceedsPopulation {
                population: self.world.population_size,
                infected: self.initial_infected,
                recovered: self.initial_recovered,
            });
        }
        Ok(())
    }

    pub fn settings(&self) -> SimulatorSettings {
        SimulatorSettings {
            seed: self.seed,
            transmission: self.transmission,
            immunity: self.immunity,
            base_speed: self.base_speed,
            deaths_enabled: self.deaths_enabled,
            history_len: self.history_len,
        }
    }
}
