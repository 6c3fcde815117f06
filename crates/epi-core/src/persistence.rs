//! Save/Load functionality for checkpointing a simulation
//!
//! Uses bincode for a compact binary snapshot of a whole simulation between
//! ticks. Humans are stored with their kinematics and rebuilt into a fresh
//! world on load; Location membership is derived from their positions.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::{Read, Write};

use crate::components::*;
use crate::config::SimulatorSettings;
use crate::error::{require_non_negative, ConfigError};
use crate::generation::BehaviourDistribution;
use crate::simulator::Simulator;
use crate::world::{StatusCounts, World, WorldConfig};

/// Version number for save file format (increment when format changes)
const SAVE_VERSION: u32 = 1;

/// Serializable snapshot of the simulation state
#[derive(Serialize, Deserialize)]
pub struct SaveData {
    /// Save format version
    pub version: u32,
    pub settings: SimulatorSettings,
    pub world: WorldConfig,
    /// Prototype new infections are cloned from
    pub pathogen: Pathogen,
    pub behaviours: BehaviourDistribution,
    /// Simulated seconds since the start
    pub elapsed: f64,
    pub tick_count: u64,
    /// Counts published by the last completed tick
    pub counts: StatusCounts,
    /// Next id to hand out, so ids of removed humans are never reused
    pub next_id: u32,
    /// Every live human, ordered by id
    pub humans: Vec<SerializableHuman>,
}

/// One human and its kinematics
#[derive(Serialize, Deserialize, Clone)]
pub struct SerializableHuman {
    pub human: Human,
    pub position: Position,
    pub velocity: Velocity,
}

/// Extract all humans from a world into serializable form
fn serialize_humans(world: &World) -> Vec<SerializableHuman> {
    let mut humans: Vec<SerializableHuman> = world
        .ecs()
        .query::<(&Human, &Position, &Velocity)>()
        .iter()
        .map(|(_, (human, position, velocity))| SerializableHuman {
            human: human.clone(),
            position: *position,
            velocity: *velocity,
        })
        .collect();
    humans.sort_by_key(|h| h.human.id());
    humans
}

/// Save the complete simulation to a writer
pub fn save_simulation<W: Write>(writer: W, sim: &Simulator) -> Result<(), SaveError> {
    let save_data = SaveData {
        version: SAVE_VERSION,
        settings: *sim.settings(),
        world: *sim.world().config(),
        pathogen: sim.pathogen().clone(),
        behaviours: *sim.behaviour_distribution(),
        elapsed: sim.elapsed(),
        tick_count: sim.tick_count(),
        counts: sim.counts(),
        next_id: sim.world().next_id(),
        humans: serialize_humans(sim.world()),
    };

    bincode::serialize_into(writer, &save_data)?;
    Ok(())
}

/// Load a simulation from a reader.
///
/// Every parameter and human is re-validated; the published counts are
/// recounted from the restored humans. Only the deceased and new-infection
/// tallies are taken as saved.
pub fn load_simulation<R: Read>(reader: R) -> Result<Simulator, SaveError> {
    let save_data: SaveData = bincode::deserialize_from(reader)?;

    if save_data.version != SAVE_VERSION {
        return Err(SaveError::VersionMismatch {
            expected: SAVE_VERSION,
            found: save_data.version,
        });
    }
    save_data.settings.validate()?;
    save_data.pathogen.validate()?;
    require_non_negative("elapsed", save_data.elapsed)?;
    let weights = save_data.behaviours;
    let behaviours = BehaviourDistribution::new(
        weights.weight(Behaviour::Normal),
        weights.weight(Behaviour::Cautious),
        weights.weight(Behaviour::Reckless),
    )?;

    let mut world = World::new(&save_data.world)?;
    let mut seen = HashSet::with_capacity(save_data.humans.len());
    let mut next_id = save_data.next_id;
    for saved in save_data.humans {
        let id = saved.human.id();
        if !seen.insert(id) {
            return Err(SaveError::Corrupt(format!("duplicate human id {:?}", id)));
        }
        let successor = id
            .0
            .checked_add(1)
            .ok_or_else(|| SaveError::Corrupt(format!("human id {:?} leaves no room for new ids", id)))?;
        next_id = next_id.max(successor);
        saved.human.validate()?;
        if !saved.human.status_consistent() {
            return Err(SaveError::Corrupt(format!("human {:?} has an inconsistent status", id)));
        }
        if !saved.position.0.is_finite() || !saved.velocity.0.is_finite() {
            return Err(SaveError::Corrupt(format!("human {:?} has non-finite kinematics", id)));
        }
        world.restore_human(saved.human, saved.position, saved.velocity);
    }
    if next_id == u32::MAX {
        return Err(SaveError::Corrupt("human id space exhausted".into()));
    }
    world.set_next_id(next_id);

    let counts = StatusCounts {
        tick: save_data.tick_count,
        time: save_data.elapsed,
        deceased: save_data.counts.deceased,
        new_infections: save_data.counts.new_infections,
        ..world.recount()
    };
    world.publish(counts);

    let sim = Simulator::restore(
        world,
        behaviours,
        save_data.pathogen,
        save_data.settings,
        save_data.elapsed,
        save_data.tick_count,
    )?;
    Ok(sim)
}

/// Errors that can occur during save/load
#[derive(Debug)]
pub enum SaveError {
    Io(std::io::Error),
    Bincode(Box<bincode::ErrorKind>),
    VersionMismatch { expected: u32, found: u32 },
    /// The snapshot holds parameters a simulation cannot be built from
    Config(ConfigError),
    /// The snapshot's humans contradict each other or themselves
    Corrupt(String),
}

impl From<std::io::Error> for SaveError {
    fn from(e: std::io::Error) -> Self {
        SaveError::Io(e)
    }
}

impl From<Box<bincode::ErrorKind>> for SaveError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        SaveError::Bincode(e)
    }
}

impl From<ConfigError> for SaveError {
    fn from(e: ConfigError) -> Self {
        SaveError::Config(e)
    }
}

impl std::fmt::Display for SaveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaveError::Io(e) => write!(f, "IO error: {}", e),
            SaveError::Bincode(e) => write!(f, "Serialization error: {}", e),
            SaveError::VersionMismatch { expected, found } => {
                write!(
                    f,
                    "Save version mismatch: expected {}, found {}",
                    expected, found
                )
            }
            SaveError::Config(e) => write!(f, "Invalid checkpoint: {}", e),
            SaveError::Corrupt(reason) => write!(f, "Corrupt checkpoint: {}", reason),
        }
    }
}

impl std::error::Error for SaveError {}
