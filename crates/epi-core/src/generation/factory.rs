//! Human construction

use crate::components::*;
use crate::error::{ConfigError, FactoryError};

/// A constructed human that has not been placed in a world yet
#[derive(Debug, Clone, PartialEq)]
pub struct HumanBlueprint {
    pub(crate) human: Human,
    pub(crate) position: Position,
    pub(crate) velocity: Velocity,
}

impl HumanBlueprint {
    pub fn status(&self) -> Status {
        self.human.status()
    }

    pub fn human(&self) -> &Human {
        &self.human
    }

    pub fn position(&self) -> Vec2 {
        self.position.0
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity.0
    }
}

/// Builds humans in a requested status from the simulation's pathogen prototype
#[derive(Debug, Clone)]
pub struct HumanFactory {
    prototype: Pathogen,
    immunity: ImmuneConfig,
}

impl HumanFactory {
    pub fn new(prototype: Pathogen, immunity: ImmuneConfig) -> Result<Self, ConfigError> {
        prototype.validate()?;
        immunity.validate()?;
        Ok(Self {
            prototype,
            immunity,
        })
    }

    /// Create a human of `status` at `(center_x, center_y)` moving with
    /// `(velocity_x, velocity_y)` units per second.
    ///
    /// Non-finite kinematics decline construction; the caller decides what a
    /// declined human means for the population.
    pub fn create(
        &self,
        status: Status,
        behaviour: Behaviour,
        center_x: f64,
        center_y: f64,
        velocity_x: f64,
        velocity_y: f64,
    ) -> Result<HumanBlueprint, FactoryError> {
        for (field, value) in [
            ("center_x", center_x),
            ("center_y", center_y),
            ("velocity_x", velocity_x),
            ("velocity_y", velocity_y),
        ] {
            if !value.is_finite() {
                return Err(FactoryError::NonFinite { field, value });
            }
        }

        let human = match status {
            Status::Healthy => Human::new(behaviour, ImmuneSystem::new(&self.immunity), None),
            Status::Infected => Human::new(
                behaviour,
                ImmuneSystem::new(&self.immunity),
                Some(self.prototype.infect()),
            ),
            Status::Recovered => Human::new(behaviour, ImmuneSystem::immune(&self.immunity), None),
        };
        debug_assert_eq!(human.status(), status);

        Ok(HumanBlueprint {
            human,
            position: Position::new(center_x, center_y),
            velocity: Velocity::new(velocity_x, velocity_y),
        })
    }

    pub fn prototype(&self) -> &Pathogen {
        &self.prototype
    }
}
