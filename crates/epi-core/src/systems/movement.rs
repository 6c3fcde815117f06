//! Movement system - integrates velocity and bounces off the walls

use hecs::Entity;

use crate::components::{LocationId, Position, Vec2, Velocity};
use crate::world::World;

/// Staged kinematics for one human
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionUpdate {
    pub entity: Entity,
    pub position: Position,
    pub velocity: Velocity,
    /// Location covering the new position
    pub location: LocationId,
}

/// Fold a coordinate back into `[min, max]`, mirroring it at each wall it
/// passed and flipping the velocity once per wall hit.
fn reflect(x: f64, v: f64, min: f64, max: f64) -> (f64, f64) {
    let span = max - min;
    if span <= 0.0 {
        return (min, 0.0);
    }
    let hits = ((x - min) / span).floor();
    let offset = (x - min).rem_euclid(2.0 * span);
    let x = if offset <= span {
        min + offset
    } else {
        min + 2.0 * span - offset
    };
    let v = if hits.rem_euclid(2.0) == 1.0 { -v } else { v };
    (x, v)
}

/// Explicit Euler step `x += v * dt` with reflection at the movement bounds.
/// Returns the staged result for every human; the world is not modified.
pub fn movement_system(world: &World, elapsed_seconds: f64) -> Vec<MotionUpdate> {
    let area = world.movement_bounds();
    let mut updates = Vec::with_capacity(world.population_size());

    for (entity, (pos, vel)) in world.ecs().query::<(&Position, &Velocity)>().iter() {
        let moved = pos.0 + vel.0 * elapsed_seconds;
        let (x, vx) = reflect(moved.x, vel.0.x, area.min.x, area.max.x);
        let (y, vy) = reflect(moved.y, vel.0.y, area.min.y, area.max.y);
        let position = Vec2::new(x, y);

        updates.push(MotionUpdate {
            entity,
            position: Position(position),
            velocity: Velocity::new(vx, vy),
            location: world.location_at(&position),
        });
    }
    updates
}
