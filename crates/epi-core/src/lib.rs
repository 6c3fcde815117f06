//! Epi Core - Agent-Based Epidemic Simulation Engine
//!
//! A population of humans wanders a rectangular arena divided into
//! Locations. Each infected human carries its own copy of a pathogen that
//! incubates, becomes infectious and is eventually cleared by the host's
//! immune system. Contacts between infectious and susceptible humans spread
//! the infection.
//!
//! # Architecture
//!
//! The population is stored in an Entity Component System (ECS) via `hecs`:
//! - **Entities**: Humans
//! - **Components**: Pure data attached to entities (Human, Position, Velocity, LocationId)
//! - **Systems**: Per-tick passes that read the world and stage their results
//!
//! A tick runs exposure, disease, movement and mortality against the pre-tick
//! state, then commits everything at once and publishes the status counts.
//!
//! # Example
//!
//! ```rust,no_run
//! use epi_core::prelude::*;
//!
//! let mut sim = Simulator::from_config(&SimulationConfig::default()).unwrap();
//!
//! while !sim.is_extinct() {
//!     let counts = sim.tick(1.0 / 60.0).unwrap();
//!     println!("{} infected", counts.infected);
//! }
//! ```

pub mod components;
pub mod config;
pub mod error;
pub mod generation;
pub mod persistence;
pub mod simulator;
pub mod systems;
pub mod world;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::config::{SimulationConfig, SimulatorSettings, TransmissionRule};
    pub use crate::error::{ConfigError, FactoryError, SimulationError};
    pub use crate::generation::{BehaviourDistribution, HumanFactory};
    pub use crate::simulator::Simulator;
    pub use crate::world::{StatusCounts, World, WorldConfig};
}
