//! Mortality system - decides who does not survive the end of an infection

use hecs::Entity;
use log::trace;
use rand::Rng;

use super::DiseaseUpdate;
use crate::components::Pathogen;

/// Each human whose infection ended this tick dies with the pathogen's
/// mortality. Rolls happen in id order (the order of `updates`).
pub fn mortality_system(
    updates: &[DiseaseUpdate],
    prototype: &Pathogen,
    rng: &mut impl Rng,
) -> Vec<Entity> {
    let mortality = prototype.mortality();
    if mortality <= 0.0 {
        return Vec::new();
    }

    let mut deaths = Vec::new();
    for update in updates.iter().filter(|u| u.outcome.cleared) {
        if rng.gen::<f64>() < mortality {
            trace!("Human {:?} died", update.human.id());
            deaths.push(update.entity);
        }
    }
    deaths
}
