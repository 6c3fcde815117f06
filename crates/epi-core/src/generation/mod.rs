//! Population generation: behaviour sampling, human construction, seeding

mod behaviour;
mod factory;
mod population;

pub use behaviour::*;
pub use factory::*;
pub use population::*;
