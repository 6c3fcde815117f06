//! People-related components: Human, Status, Behaviour.

use serde::{Deserialize, Serialize};

use super::{ImmuneSystem, Pathogen};
use crate::error::ConfigError;

/// Stable identity of a human, unique within a world
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct HumanId(pub u32);

/// Health status, derived from infection and immunity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Healthy,
    Infected,
    Recovered,
}

impl Status {
    /// Immunity takes precedence over an attached pathogen, so a host that
    /// crossed the threshold never flickers back to infected.
    pub fn derive(is_infected: bool, is_immune: bool) -> Self {
        if is_immune {
            Status::Recovered
        } else if is_infected {
            Status::Infected
        } else {
            Status::Healthy
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Status::Healthy => "HEALTHY",
            Status::Infected => "INFECTED",
            Status::Recovered => "RECOVERED",
        };
        f.write_str(name)
    }
}

/// Movement and contact archetype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Behaviour {
    Normal,
    Cautious,
    Reckless,
}

impl Behaviour {
    pub const ALL: [Behaviour; 3] = [Behaviour::Normal, Behaviour::Cautious, Behaviour::Reckless];

    /// Multiplier on the base walking speed
    pub fn speed_factor(&self) -> f64 {
        match self {
            Behaviour::Normal => 1.0,
            Behaviour::Cautious => 0.5,
            Behaviour::Reckless => 1.5,
        }
    }

    /// Multiplier on the transmission contact radius
    pub fn contact_factor(&self) -> f64 {
        match self {
            Behaviour::Normal => 1.0,
            Behaviour::Cautious => 0.5,
            Behaviour::Reckless => 1.5,
        }
    }
}

/// What a single tick did to a human's infection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Outcome {
    /// The pathogen clone was discarded this tick
    pub cleared: bool,
    pub status_changed: bool,
}

/// The epidemiological state of one person.
///
/// Position, velocity and location live in their own components so the
/// motion pass never touches disease state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Human {
    id: HumanId,
    behaviour: Behaviour,
    immune_system: ImmuneSystem,
    pathogen: Option<Pathogen>,
    status: Status,
}

impl Human {
    pub(crate) fn new(
        behaviour: Behaviour,
        immune_system: ImmuneSystem,
        pathogen: Option<Pathogen>,
    ) -> Self {
        let status = Status::derive(pathogen.is_some(), immune_system.is_immune());
        Self {
            id: HumanId::default(),
            behaviour,
            immune_system,
            pathogen,
            status,
        }
    }

    pub(crate) fn assign_id(&mut self, id: HumanId) {
        self.id = id;
    }

    /// Attach a fresh clone of `prototype`. Returns false (and does nothing)
    /// unless the host is susceptible. Status follows at the next [`Human::model`].
    pub fn infect(&mut self, prototype: &Pathogen) -> bool {
        if !self.is_susceptible() {
            return false;
        }
        self.pathogen = Some(prototype.infect());
        true
    }

    /// Advance the attached pathogen. Runs before the immune response so the
    /// immune system sees this step's phase.
    pub fn pathogen(&mut self, elapsed_seconds: f64) {
        if let Some(pathogen) = self.pathogen.as_mut() {
            pathogen.live(elapsed_seconds);
        }
    }

    pub fn immune_system(&mut self, elapsed_seconds: f64) {
        self.immune_system.live(elapsed_seconds);

        if let Some(pathogen) = self.pathogen.as_ref() {
            self.immune_system.defend(pathogen);
        }
    }

    /// Recompute status; the only place it changes after construction.
    /// Discards the pathogen once it is cleared by immunity or has run its course.
    pub fn model(&mut self, _elapsed_seconds: f64) -> Outcome {
        let mut outcome = Outcome::default();

        let clear = match self.pathogen.as_ref() {
            Some(pathogen) => self.immune_system.is_immune() || pathogen.is_spent(),
            None => false,
        };
        if clear {
            self.pathogen = None;
            self.immune_system.end_episode();
            outcome.cleared = true;
        }

        let status = Status::derive(self.is_infected(), self.is_immune());
        outcome.status_changed = status != self.status;
        self.status = status;
        outcome
    }

    pub fn id(&self) -> HumanId {
        self.id
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn behaviour(&self) -> Behaviour {
        self.behaviour
    }

    pub fn immune(&self) -> &ImmuneSystem {
        &self.immune_system
    }

    pub fn active_pathogen(&self) -> Option<&Pathogen> {
        self.pathogen.as_ref()
    }

    pub fn is_infected(&self) -> bool {
        self.pathogen.is_some()
    }

    pub fn is_immune(&self) -> bool {
        self.immune_system.is_immune()
    }

    /// Can catch the pathogen: nothing attached and not immune
    pub fn is_susceptible(&self) -> bool {
        !self.is_infected() && !self.is_immune()
    }

    /// Can pass the pathogen on this tick
    pub fn is_infectious(&self) -> bool {
        self.status == Status::Infected
            && self.pathogen.as_ref().is_some_and(Pathogen::is_infectious)
    }

    /// Parameters of the immune system and any attached pathogen are in range
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.immune_system.validate()?;
        if let Some(pathogen) = &self.pathogen {
            pathogen.validate()?;
        }
        Ok(())
    }

    /// Whether the cached status agrees with the two predicates
    pub fn status_consistent(&self) -> bool {
        self.status == Status::derive(self.is_infected(), self.is_immune())
    }
}
