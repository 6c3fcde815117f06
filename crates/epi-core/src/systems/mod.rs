//! Systems - per-tick passes over the whole population.
//!
//! Every system reads the world and returns staged results; the simulator
//! commits them once all passes of a tick have succeeded.

mod disease;
mod mortality;
mod movement;
mod transmission;

pub use disease::*;
pub use mortality::*;
pub use movement::*;
pub use transmission::*;
