//! Disease system - pathogen, immune response and status for every human

use std::collections::HashSet;

use hecs::Entity;

use crate::components::{Human, Outcome, Pathogen};
use crate::world::World;

/// The next state of one human, staged until the tick commits
#[derive(Debug, Clone)]
pub struct DiseaseUpdate {
    pub entity: Entity,
    pub human: Human,
    pub outcome: Outcome,
    /// Caught the pathogen at the start of this tick
    pub newly_infected: bool,
}

/// Run the per-human hooks in their fixed order (`pathogen`, `immune_system`,
/// `model`) on a copy of every human. `exposed` humans receive a fresh clone
/// of `prototype` first. The world itself is not modified.
pub fn disease_system(
    world: &World,
    exposed: &[Entity],
    prototype: &Pathogen,
    elapsed_seconds: f64,
) -> Vec<DiseaseUpdate> {
    let exposed: HashSet<Entity> = exposed.iter().copied().collect();
    let mut updates = Vec::with_capacity(world.population_size());

    for (entity, human) in world.ecs().query::<&Human>().iter() {
        let mut next = human.clone();
        let newly_infected = exposed.contains(&entity) && next.infect(prototype);

        next.pathogen(elapsed_seconds);
        next.immune_system(elapsed_seconds);
        let outcome = next.model(elapsed_seconds);
        debug_assert!(next.status_consistent());

        updates.push(DiseaseUpdate {
            entity,
            human: next,
            outcome,
            newly_infected,
        });
    }

    updates.sort_by_key(|u| u.human.id());
    updates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Behaviour, ImmuneConfig, Status};
    use crate::generation::HumanFactory;
    use crate::world::WorldConfig;

    #[test]
    fn test_disease_system_stages_without_mutating() {
        let mut world = World::new(&WorldConfig::default()).unwrap();
        let prototype = Pathogen::new(5.0, 0.05, 0.5, 0.8, 12.0).unwrap();
        let factory = HumanFactory::new(prototype.clone(), ImmuneConfig::default()).unwrap();

        let infected = world.add_human(
            factory
                .create(Status::Infected, Behaviour::Normal, 10.0, 10.0, 0.0, 0.0)
                .unwrap(),
        );
        let exposed = world.add_human(
            factory
                .create(Status::Healthy, Behaviour::Normal, 11.0, 10.0, 0.0, 0.0)
                .unwrap(),
        );
        let bystander = world.add_human(
            factory
                .create(Status::Healthy, Behaviour::Normal, 200.0, 10.0, 0.0, 0.0)
                .unwrap(),
        );

        let updates = disease_system(&world, &[exposed], &prototype, 1.0);
        assert_eq!(updates.len(), 3);

        let find = |e: Entity| updates.iter().find(|u| u.entity == e).unwrap();
        assert_eq!(find(infected).human.active_pathogen().unwrap().elapsed(), 1.0);
        assert!(find(exposed).newly_infected);
        assert_eq!(find(exposed).human.status(), Status::Infected);
        assert!(find(exposed).outcome.status_changed);
        assert_eq!(find(bystander).human.status(), Status::Healthy);

        // Staged only
        assert_eq!(world.status(exposed), Some(Status::Healthy));
    }
}
