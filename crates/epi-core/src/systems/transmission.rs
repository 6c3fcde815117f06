//! Exposure system - decides who catches the pathogen this tick

use hecs::Entity;
use log::trace;
use rand::Rng;

use crate::components::*;
use crate::config::TransmissionRule;
use crate::world::World;

/// An infectious human as seen by potential targets
struct Source<'a> {
    position: Vec2,
    pathogen: &'a Pathogen,
    /// Seconds of this tick the source spends infectious
    exposure: f64,
}

/// Contact weight between a target and a source under `rule`, `None` if out of reach
fn contact_weight(rule: TransmissionRule, target: &Vec2, contact_factor: f64, source: &Vec2) -> Option<f64> {
    match rule {
        TransmissionRule::SharedLocation => Some(1.0),
        TransmissionRule::Proximity { radius } => {
            let r = radius * contact_factor;
            (target.distance_squared(source) <= r * r).then_some(1.0)
        }
        TransmissionRule::DistanceDecay { radius } => {
            let r = radius * contact_factor;
            if r <= 0.0 {
                return None;
            }
            let d = target.distance(source);
            (d < r).then(|| 1.0 - d / r)
        }
    }
}

/// Find the susceptible humans infected during the coming `elapsed_seconds`.
///
/// Reads only the pre-tick state, so the result does not depend on the order
/// in which humans are updated afterwards. Targets are visited in id order,
/// keeping the random stream reproducible for a given seed.
pub fn exposure_system(
    world: &World,
    rule: TransmissionRule,
    elapsed_seconds: f64,
    rng: &mut impl Rng,
) -> Vec<Entity> {
    if elapsed_seconds <= 0.0 {
        return Vec::new();
    }

    let mut query = world
        .ecs()
        .query::<(&Human, &Position, &LocationId)>();
    let mut rows: Vec<(Entity, (&Human, &Position, &LocationId))> = query.iter().collect();
    // Storage order differs between a live world and a restored one
    rows.sort_by_key(|(_, (human, _, _))| human.id());

    // Infectious sources bucketed by Location
    let mut sources: Vec<Vec<Source>> = (0..world.locations().len()).map(|_| Vec::new()).collect();
    let mut targets = Vec::new();
    for &(entity, (human, pos, location)) in &rows {
        if let Some(pathogen) = human.active_pathogen() {
            let exposure = pathogen.infectious_overlap(elapsed_seconds);
            if exposure > 0.0 {
                sources[location.0 as usize].push(Source {
                    position: pos.0,
                    pathogen,
                    exposure,
                });
            }
        } else if human.is_susceptible() {
            targets.push((human.id(), entity, pos.0, *location, human.behaviour()));
        }
    }
    if sources.iter().all(Vec::is_empty) {
        return Vec::new();
    }

    let location_size = world.config().location_size;
    let max_rings = world.columns().max(world.rows());
    let mut exposed = Vec::new();
    for (id, entity, position, location, behaviour) in targets {
        let contact_factor = behaviour.contact_factor();
        let neighbourhood = match rule.reach() {
            None => vec![location],
            Some(reach) => {
                // Beyond this many rings the whole grid is already covered
                let rings = ((reach / location_size).ceil() as u32).min(max_rings);
                world.neighbourhood(location, rings)
            }
        };

        let mut log_escape = 0.0;
        for cell in neighbourhood {
            for source in &sources[cell.0 as usize] {
                if let Some(weight) = contact_weight(rule, &position, contact_factor, &source.position) {
                    log_escape += source.pathogen.log_escape(weight, source.exposure);
                }
            }
        }
        if log_escape == 0.0 {
            continue;
        }

        let probability = 1.0 - log_escape.exp();
        if rng.gen::<f64>() < probability {
            trace!("Human {:?} exposed in {}", id, location);
            exposed.push(entity);
        }
    }
    exposed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::HumanFactory;
    use crate::world::WorldConfig;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn world() -> World {
        World::new(&WorldConfig {
            population_size: 0,
            width: 100.0,
            height: 100.0,
            location_size: 10.0,
            human_radius: 0.5,
        })
        .unwrap()
    }

    fn factory(probability: f64) -> HumanFactory {
        HumanFactory::new(
            Pathogen::new(1.0, probability, 0.5, 0.0, 10.0).unwrap(),
            ImmuneConfig::default(),
        ).unwrap()
    }

    /// An infected human already past incubation
    fn spawn_infectious(world: &mut World, f: &HumanFactory, x: f64, y: f64) -> Entity {
        let entity = world.add_human(
            f.create(Status::Infected, Behaviour::Normal, x, y, 0.0, 0.0)
                .unwrap(),
        );
        let mut human = world.ecs().get::<&mut Human>(entity).unwrap();
        human.pathogen(2.0);
        human.immune_system(2.0);
        human.model(2.0);
        drop(human);
        entity
    }

    fn spawn_healthy(world: &mut World, f: &HumanFactory, behaviour: Behaviour, x: f64, y: f64) -> Entity {
        world.add_human(f.create(Status::Healthy, behaviour, x, y, 0.0, 0.0).unwrap())
    }

    #[test]
    fn test_certain_transmission_within_radius() {
        let mut w = world();
        let f = factory(1.0);
        spawn_infectious(&mut w, &f, 50.0, 50.0);
        let near = spawn_healthy(&mut w, &f, Behaviour::Normal, 53.0, 50.0);
        let far = spawn_healthy(&mut w, &f, Behaviour::Normal, 70.0, 50.0);

        let mut rng = StdRng::seed_from_u64(0);
        let exposed = exposure_system(&w, TransmissionRule::Proximity { radius: 5.0 }, 1.0, &mut rng);
        assert_eq!(exposed, vec![near]);
        assert!(!exposed.contains(&far));
    }

    #[test]
    fn test_huge_radius_reaches_across_the_grid() {
        let mut w = world();
        let f = factory(1.0);
        spawn_infectious(&mut w, &f, 95.0, 95.0);
        let corner = spawn_healthy(&mut w, &f, Behaviour::Normal, 1.0, 1.0);
        let beside = spawn_healthy(&mut w, &f, Behaviour::Normal, 96.0, 95.0);

        let mut rng = StdRng::seed_from_u64(0);
        let mut exposed = exposure_system(&w, TransmissionRule::Proximity { radius: 1e12 }, 1.0, &mut rng);
        exposed.sort();
        let mut expected = vec![corner, beside];
        expected.sort();
        assert_eq!(exposed, expected);
    }

    #[test]
    fn test_cautious_contact_radius_is_smaller() {
        let mut w = world();
        let f = factory(1.0);
        spawn_infectious(&mut w, &f, 50.0, 50.0);
        let cautious = spawn_healthy(&mut w, &f, Behaviour::Cautious, 54.0, 50.0);
        let reckless = spawn_healthy(&mut w, &f, Behaviour::Reckless, 50.0, 57.0);

        let mut rng = StdRng::seed_from_u64(0);
        let exposed = exposure_system(&w, TransmissionRule::Proximity { radius: 5.0 }, 1.0, &mut rng);
        assert_eq!(exposed, vec![reckless]);
        assert!(!exposed.contains(&cautious));
    }

    #[test]
    fn test_shared_location_ignores_distance_but_not_cells() {
        let mut w = world();
        let f = factory(1.0);
        spawn_infectious(&mut w, &f, 11.0, 11.0);
        let same_cell = spawn_healthy(&mut w, &f, Behaviour::Normal, 19.0, 19.0);
        let next_cell = spawn_healthy(&mut w, &f, Behaviour::Normal, 21.0, 11.0);

        let mut rng = StdRng::seed_from_u64(0);
        let exposed = exposure_system(&w, TransmissionRule::SharedLocation, 1.0, &mut rng);
        assert_eq!(exposed, vec![same_cell]);
        assert!(!exposed.contains(&next_cell));
    }

    #[test]
    fn test_incubating_hosts_do_not_transmit() {
        let mut w = world();
        let f = factory(1.0);
        w.add_human(f.create(Status::Infected, Behaviour::Normal, 50.0, 50.0, 0.0, 0.0).unwrap());
        spawn_healthy(&mut w, &f, Behaviour::Normal, 51.0, 50.0);

        let mut rng = StdRng::seed_from_u64(0);
        assert!(exposure_system(&w, TransmissionRule::SharedLocation, 1.0, &mut rng).is_empty());
    }

    #[test]
    fn test_source_turning_infectious_mid_tick_transmits() {
        let mut w = world();
        let f = factory(1.0);
        let source = w.add_human(
            f.create(Status::Infected, Behaviour::Normal, 50.0, 50.0, 0.0, 0.0)
                .unwrap(),
        );
        let mut human = w.ecs().get::<&mut Human>(source).unwrap();
        human.pathogen(0.5);
        human.immune_system(0.5);
        human.model(0.5);
        drop(human);
        let target = spawn_healthy(&mut w, &f, Behaviour::Normal, 51.0, 50.0);

        // Incubation ends half way through the tick
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(exposure_system(&w, TransmissionRule::SharedLocation, 1.0, &mut rng), vec![target]);
        assert!(exposure_system(&w, TransmissionRule::SharedLocation, 0.5, &mut rng).is_empty());
    }

    #[test]
    fn test_recovered_are_not_targets() {
        let mut w = world();
        let f = factory(1.0);
        spawn_infectious(&mut w, &f, 50.0, 50.0);
        w.add_human(f.create(Status::Recovered, Behaviour::Normal, 50.5, 50.0, 0.0, 0.0).unwrap());

        let mut rng = StdRng::seed_from_u64(0);
        assert!(exposure_system(&w, TransmissionRule::DistanceDecay { radius: 5.0 }, 1.0, &mut rng).is_empty());
    }

    #[test]
    fn test_zero_elapsed_exposes_nobody() {
        let mut w = world();
        let f = factory(1.0);
        spawn_infectious(&mut w, &f, 50.0, 50.0);
        spawn_healthy(&mut w, &f, Behaviour::Normal, 50.5, 50.0);

        let mut rng = StdRng::seed_from_u64(0);
        assert!(exposure_system(&w, TransmissionRule::SharedLocation, 0.0, &mut rng).is_empty());
    }

    #[test]
    fn test_exposure_rate_matches_probability() {
        let mut w = world();
        let f = factory(0.2);
        spawn_infectious(&mut w, &f, 55.0, 55.0);
        for i in 0..50 {
            spawn_healthy(&mut w, &f, Behaviour::Normal, 51.0 + (i % 8) as f64, 51.0 + (i / 8) as f64);
        }

        let mut rng = StdRng::seed_from_u64(11);
        let mut hits = 0;
        for _ in 0..100 {
            hits += exposure_system(&w, TransmissionRule::SharedLocation, 1.0, &mut rng).len();
        }
        // 5000 independent trials at p = 0.2
        assert!((900..1100).contains(&hits), "hits = {}", hits);
    }
}
