//! Component definitions for the ECS population.
//!
//! Components are data attached to human entities. Behaviour that spans the
//! whole population lives in systems; per-human rules live on the components.

mod common;
mod immunity;
mod pathogen;
mod people;

pub use common::*;
pub use immunity::*;
pub use pathogen::*;
pub use people::*;
