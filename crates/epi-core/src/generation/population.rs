//! Initial population seeding

use std::f64::consts::TAU;

use hecs::Entity;
use log::debug;
use rand::Rng;

use super::{BehaviourDistribution, HumanFactory};
use crate::components::Status;
use crate::error::SimulationError;
use crate::world::World;

/// How many humans to create and in which initial status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seeding {
    pub population: usize,
    pub infected: usize,
    pub recovered: usize,
}

impl Seeding {
    fn status_of(&self, index: usize) -> Status {
        if index < self.infected {
            Status::Infected
        } else if index < self.infected + self.recovered {
            Status::Recovered
        } else {
            Status::Healthy
        }
    }
}

/// Fill `world` with humans at uniform random positions, each walking in a
/// random direction at `base_speed` scaled by its sampled behaviour.
pub fn populate(
    world: &mut World,
    factory: &HumanFactory,
    behaviours: &BehaviourDistribution,
    seeding: Seeding,
    base_speed: f64,
    rng: &mut impl Rng,
) -> Result<Vec<Entity>, SimulationError> {
    let area = world.movement_bounds();
    let mut entities = Vec::with_capacity(seeding.population);

    for i in 0..seeding.population {
        let behaviour = behaviours.sample(rng);
        let x = rng.gen_range(area.min.x..area.max.x);
        let y = rng.gen_range(area.min.y..area.max.y);

        let heading = rng.gen_range(0.0..TAU);
        let speed = base_speed * behaviour.speed_factor();

        let blueprint = factory.create(
            seeding.status_of(i),
            behaviour,
            x,
            y,
            speed * heading.cos(),
            speed * heading.sin(),
        )?;
        entities.push(world.add_human(blueprint));
    }

    debug!(
        "Seeded {} humans ({} infected, {} recovered)",
        seeding.population, seeding.infected, seeding.recovered
    );
    Ok(entities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{ImmuneConfig, Pathogen};
    use crate::world::WorldConfig;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_populate_seeds_requested_statuses() {
        let config = WorldConfig::default();
        let mut world = World::new(&config).unwrap();
        let factory = HumanFactory::new(
            Pathogen::new(5.0, 0.05, 0.5, 0.8, 12.0).unwrap(),
            ImmuneConfig::default(),
        ).unwrap();
        let seeding = Seeding {
            population: 100,
            infected: 7,
            recovered: 3,
        };
        let mut rng = StdRng::seed_from_u64(1);

        let entities = populate(
            &mut world,
            &factory,
            &BehaviourDistribution::default(),
            seeding,
            10.0,
            &mut rng,
        )
        .unwrap();

        assert_eq!(entities.len(), 100);
        let counts = world.recount();
        assert_eq!(counts.infected, 7);
        assert_eq!(counts.recovered, 3);
        assert_eq!(counts.healthy, 90);
        assert!(world.check_partition().is_ok());

        let area = world.movement_bounds();
        for view in world.humans() {
            assert!(view.position.x >= area.min.x && view.position.x <= area.max.x);
            assert!((view.velocity.length() - 10.0).abs() < 1e-9);
        }
    }
}
