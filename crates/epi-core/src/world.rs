//! The arena: bounds, the Location grid and the population.
//!
//! Humans are `hecs` entities. Every human carries a [`LocationId`] component
//! and is listed in exactly that Location's membership set; the two are only
//! ever changed together, by [`World::add_human`], [`World::relocate`] and
//! [`World::remove_human`].

use std::collections::BTreeSet;

use hecs::Entity;
use log::{trace, warn};
use serde::{Deserialize, Serialize};

use crate::components::*;
use crate::error::{require_non_negative, require_positive, ConfigError, SimulationError};
use crate::generation::HumanBlueprint;

/// World geometry and size
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub population_size: usize,
    pub width: f64,
    pub height: f64,
    /// Edge length of a square Location; edge Locations are clipped to the bounds
    pub location_size: f64,
    /// Radius of a human's body; keeps them this far from the walls
    pub human_radius: f64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            population_size: 500,
            width: 300.0,
            height: 300.0,
            location_size: 30.0,
            human_radius: 2.0,
        }
    }
}

impl WorldConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("world.width", self.width)?;
        require_positive("world.height", self.height)?;
        require_positive("world.location_size", self.location_size)?;
        require_non_negative("world.human_radius", self.human_radius)?;
        if self.human_radius * 2.0 >= self.width.min(self.height) {
            return Err(ConfigError::invalid(
                "world.human_radius",
                self.human_radius,
                "must be less than half the smallest world extent",
            ));
        }
        let cells = (self.width / self.location_size).ceil() * (self.height / self.location_size).ceil();
        if cells > u32::MAX as f64 {
            return Err(ConfigError::invalid(
                "world.location_size",
                self.location_size,
                "produces too many locations",
            ));
        }
        Ok(())
    }
}

/// One cell of the world grid and the humans currently inside it
#[derive(Debug, Clone)]
pub struct Location {
    id: LocationId,
    bounds: Bounds,
    population: BTreeSet<Entity>,
}

impl Location {
    pub fn id(&self) -> LocationId {
        self.id
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Non-owning membership; the humans themselves live in the World
    pub fn population(&self) -> &BTreeSet<Entity> {
        &self.population
    }

    pub fn len(&self) -> usize {
        self.population.len()
    }

    pub fn is_empty(&self) -> bool {
        self.population.is_empty()
    }

    pub fn contains(&self, point: &Vec2) -> bool {
        self.bounds.contains(point)
    }
}

/// Aggregate counts per status, published once per completed tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub tick: u64,
    /// Simulated seconds since the start
    pub time: f64,
    pub healthy: usize,
    pub infected: usize,
    pub recovered: usize,
    /// Removed from the population by the disease (only when deaths are enabled)
    pub deceased: usize,
    /// Humans infected during the tick that produced this snapshot
    pub new_infections: usize,
}

impl StatusCounts {
    /// Living population
    pub fn total(&self) -> usize {
        self.healthy + self.infected + self.recovered
    }

    pub fn get(&self, status: Status) -> usize {
        match status {
            Status::Healthy => self.healthy,
            Status::Infected => self.infected,
            Status::Recovered => self.recovered,
        }
    }
}

/// Read-only view of one human for rendering
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HumanView {
    pub entity: Entity,
    pub id: HumanId,
    pub status: Status,
    pub behaviour: Behaviour,
    pub position: Vec2,
    pub velocity: Vec2,
    pub location: LocationId,
}

pub struct World {
    config: WorldConfig,
    bounds: Bounds,
    columns: u32,
    rows: u32,
    locations: Vec<Location>,
    population: hecs::World,
    next_id: u32,
    counts: StatusCounts,
}

impl World {
    /// Create an empty world partitioned into Locations
    pub fn new(config: &WorldConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let bounds = Bounds::from_size(config.width, config.height);
        let columns = (config.width / config.location_size).ceil() as u32;
        let rows = (config.height / config.location_size).ceil() as u32;

        let mut locations = Vec::with_capacity((columns * rows) as usize);
        for row in 0..rows {
            for col in 0..columns {
                let min = Vec2::new(col as f64 * config.location_size, row as f64 * config.location_size);
                let max = Vec2::new(
                    ((col + 1) as f64 * config.location_size).min(config.width),
                    ((row + 1) as f64 * config.location_size).min(config.height),
                );
                locations.push(Location {
                    id: LocationId(row * columns + col),
                    bounds: Bounds::new(min, max),
                    population: BTreeSet::new(),
                });
            }
        }

        Ok(Self {
            config: *config,
            bounds,
            columns,
            rows,
            locations,
            population: hecs::World::new(),
            next_id: 0,
            counts: StatusCounts::default(),
        })
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Region a human's centre may occupy
    pub fn movement_bounds(&self) -> Bounds {
        self.bounds.shrink(self.config.human_radius)
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn location(&self, id: LocationId) -> Option<&Location> {
        self.locations.get(id.0 as usize)
    }

    fn cell_of(&self, point: &Vec2) -> (u32, u32) {
        let size = self.config.location_size;
        let col = ((point.x - self.bounds.min.x) / size).floor();
        let row = ((point.y - self.bounds.min.y) / size).floor();
        let col = col.clamp(0.0, (self.columns - 1) as f64) as u32;
        let row = row.clamp(0.0, (self.rows - 1) as f64) as u32;
        (col, row)
    }

    /// The Location covering `point`; points outside the bounds map to the nearest edge cell
    pub fn location_at(&self, point: &Vec2) -> LocationId {
        let (col, row) = self.cell_of(point);
        LocationId(row * self.columns + col)
    }

    /// `id` and every Location within `rings` cells of it (Chebyshev distance)
    pub fn neighbourhood(&self, id: LocationId, rings: u32) -> Vec<LocationId> {
        let col = id.0 % self.columns;
        let row = id.0 / self.columns;
        let col_range = col.saturating_sub(rings)..=col.saturating_add(rings).min(self.columns - 1);
        let row_range = row.saturating_sub(rings)..=row.saturating_add(rings).min(self.rows - 1);

        let mut ids = Vec::new();
        for r in row_range {
            for c in col_range.clone() {
                ids.push(LocationId(r * self.columns + c));
            }
        }
        ids
    }

    /// Place a constructed human in the Location covering its position.
    /// Positions outside the movement bounds are clamped onto them.
    pub fn add_human(&mut self, blueprint: HumanBlueprint) -> Entity {
        let HumanBlueprint {
            mut human,
            position,
            velocity,
        } = blueprint;

        let area = self.movement_bounds();
        let point = Vec2::new(
            position.0.x.clamp(area.min.x, area.max.x),
            position.0.y.clamp(area.min.y, area.max.y),
        );

        let id = HumanId(self.next_id);
        self.next_id += 1;
        human.assign_id(id);

        let location = self.location_at(&point);
        let entity = self
            .population
            .spawn((human, Position(point), velocity, location));
        self.locations[location.0 as usize].population.insert(entity);
        trace!("Placed human {:?} in {}", id, location);
        entity
    }

    /// Remove a human from the population and from its Location
    pub fn remove_human(&mut self, entity: Entity) -> Result<Human, SimulationError> {
        let location = self.location_of(entity).ok_or(SimulationError::UnknownHuman(entity))?;
        let human = self
            .population
            .remove_one::<Human>(entity)
            .map_err(|_| SimulationError::UnknownHuman(entity))?;
        self.population
            .despawn(entity)
            .map_err(|_| SimulationError::UnknownHuman(entity))?;
        self.locations[location.0 as usize].population.remove(&entity);
        Ok(human)
    }

    /// Move a human into Location `to` in one step: membership in the old set,
    /// the new set and the human's own `LocationId` change together or not at all.
    /// Returns `Ok(false)` when the human is already there.
    pub fn relocate(&mut self, entity: Entity, to: LocationId) -> Result<bool, SimulationError> {
        let from = self.check_relocation(entity, to)?;
        if from == to {
            return Ok(false);
        }

        // Validated above; nothing below can fail
        self.locations[from.0 as usize].population.remove(&entity);
        self.locations[to.0 as usize].population.insert(entity);
        if let Ok(mut location) = self.population.get::<&mut LocationId>(entity) {
            *location = to;
        }
        Ok(true)
    }

    /// Everything [`World::relocate`] verifies, without moving anyone.
    /// Returns the human's current Location.
    pub fn check_relocation(&self, entity: Entity, to: LocationId) -> Result<LocationId, SimulationError> {
        let from = self.location_of(entity).ok_or(SimulationError::UnknownHuman(entity))?;
        if to.0 as usize >= self.locations.len() {
            warn!("Rejected relocation of {:?} to unknown {}", entity, to);
            return Err(SimulationError::UnknownLocation(to));
        }
        if !self.locations[from.0 as usize].population.contains(&entity) {
            warn!("Rejected relocation of {:?}: not a member of {}", entity, from);
            return Err(SimulationError::MembershipMismatch {
                human: entity,
                location: from,
            });
        }
        Ok(from)
    }

    pub fn population_size(&self) -> usize {
        self.population.len() as usize
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.population.get::<&Human>(entity).is_ok()
    }

    pub fn human(&self, entity: Entity) -> Option<hecs::Ref<'_, Human>> {
        self.population.get::<&Human>(entity).ok()
    }

    pub fn status(&self, entity: Entity) -> Option<Status> {
        self.human(entity).map(|h| h.status())
    }

    pub fn position(&self, entity: Entity) -> Option<Vec2> {
        self.population.get::<&Position>(entity).ok().map(|p| p.0)
    }

    pub fn velocity(&self, entity: Entity) -> Option<Vec2> {
        self.population.get::<&Velocity>(entity).ok().map(|v| v.0)
    }

    pub fn location_of(&self, entity: Entity) -> Option<LocationId> {
        self.population.get::<&LocationId>(entity).ok().map(|l| *l)
    }

    /// Every human, ordered by id
    pub fn humans(&self) -> Vec<HumanView> {
        let mut views: Vec<HumanView> = self
            .population
            .query::<(&Human, &Position, &Velocity, &LocationId)>()
            .iter()
            .map(|(entity, (human, pos, vel, location))| HumanView {
                entity,
                id: human.id(),
                status: human.status(),
                behaviour: human.behaviour(),
                position: pos.0,
                velocity: vel.0,
                location: *location,
            })
            .collect();
        views.sort_by_key(|v| v.id);
        views
    }

    /// Full population scan
    pub fn recount(&self) -> StatusCounts {
        let mut counts = StatusCounts {
            deceased: self.counts.deceased,
            ..Default::default()
        };
        for (_, human) in self.population.query::<&Human>().iter() {
            match human.status() {
                Status::Healthy => counts.healthy += 1,
                Status::Infected => counts.infected += 1,
                Status::Recovered => counts.recovered += 1,
            }
        }
        counts
    }

    /// Snapshot published after the last completed tick
    pub fn counts(&self) -> StatusCounts {
        self.counts
    }

    pub(crate) fn publish(&mut self, counts: StatusCounts) {
        self.counts = counts;
    }

    /// Every live human is in exactly the Location its component names, and
    /// the Locations hold nobody else.
    pub fn check_partition(&self) -> Result<(), SimulationError> {
        for (entity, location) in self.population.query::<&LocationId>().iter() {
            let member = self
                .location(*location)
                .is_some_and(|l| l.population.contains(&entity));
            if !member {
                return Err(SimulationError::MembershipMismatch {
                    human: entity,
                    location: *location,
                });
            }
        }
        let listed: usize = self.locations.iter().map(Location::len).sum();
        if listed != self.population_size() {
            // Someone is listed twice or a stale entity is left behind
            for location in &self.locations {
                for &entity in &location.population {
                    if self.location_of(entity) != Some(location.id) {
                        return Err(SimulationError::MembershipMismatch {
                            human: entity,
                            location: location.id,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    pub(crate) fn ecs(&self) -> &hecs::World {
        &self.population
    }

    pub(crate) fn ecs_mut(&mut self) -> &mut hecs::World {
        &mut self.population
    }

    pub(crate) fn next_id(&self) -> u32 {
        self.next_id
    }

    pub(crate) fn set_next_id(&mut self, next_id: u32) {
        self.next_id = self.next_id.max(next_id);
    }

    /// Restore a human exactly as checkpointed, id included. The caller sets
    /// the next id afterwards with [`World::set_next_id`].
    pub(crate) fn restore_human(
        &mut self,
        human: Human,
        position: Position,
        velocity: Velocity,
    ) -> Entity {
        let location = self.location_at(&position.0);
        let entity = self.population.spawn((human, position, velocity, location));
        self.locations[location.0 as usize].population.insert(entity);
        entity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::HumanFactory;

    fn factory() -> HumanFactory {
        HumanFactory::new(
            Pathogen::new(5.0, 0.05, 0.5, 0.8, 12.0).unwrap(),
            ImmuneConfig::default(),
        ).unwrap()
    }

    fn small_world() -> World {
        World::new(&WorldConfig {
            population_size: 10,
            width: 100.0,
            height: 50.0,
            location_size: 30.0,
            human_radius: 1.0,
        })
        .unwrap()
    }

    fn spawn(world: &mut World, x: f64, y: f64) -> Entity {
        let blueprint = factory()
            .create(Status::Healthy, Behaviour::Normal, x, y, 0.0, 0.0)
            .unwrap();
        world.add_human(blueprint)
    }

    #[test]
    fn test_grid_covers_bounds() {
        let world = small_world();
        assert_eq!(world.columns(), 4);
        assert_eq!(world.rows(), 2);
        assert_eq!(world.locations().len(), 8);

        let area: f64 = world
            .locations()
            .iter()
            .map(|l| l.bounds().width() * l.bounds().height())
            .sum();
        assert!((area - 100.0 * 50.0).abs() < 1e-9);

        // Clipped edge cell
        let last = world.location(LocationId(7)).unwrap();
        assert_eq!(last.bounds().max, Vec2::new(100.0, 50.0));
    }

    #[test]
    fn test_location_at() {
        let world = small_world();
        assert_eq!(world.location_at(&Vec2::new(0.0, 0.0)), LocationId(0));
        assert_eq!(world.location_at(&Vec2::new(30.0, 0.0)), LocationId(1));
        assert_eq!(world.location_at(&Vec2::new(95.0, 45.0)), LocationId(7));
        assert_eq!(world.location_at(&Vec2::new(500.0, -3.0)), LocationId(3));
        for location in world.locations() {
            let b = location.bounds();
            let centre = Vec2::new((b.min.x + b.max.x) / 2.0, (b.min.y + b.max.y) / 2.0);
            assert_eq!(world.location_at(&centre), location.id());
            assert!(location.contains(&centre));
        }
    }

    #[test]
    fn test_neighbourhood() {
        let world = small_world();
        let mut around_corner = world.neighbourhood(LocationId(0), 1);
        around_corner.sort();
        assert_eq!(
            around_corner,
            vec![LocationId(0), LocationId(1), LocationId(4), LocationId(5)]
        );
        assert_eq!(world.neighbourhood(LocationId(5), 1).len(), 6);
        assert_eq!(world.neighbourhood(LocationId(5), 10).len(), 8);
    }

    #[test]
    fn test_neighbourhood_saturates_huge_rings() {
        let world = small_world();
        let mut everything = world.neighbourhood(LocationId(5), u32::MAX);
        everything.sort();
        assert_eq!(everything, (0..8).map(LocationId).collect::<Vec<_>>());
    }

    #[test]
    fn test_add_human_places_in_covering_location() {
        let mut world = small_world();
        let entity = spawn(&mut world, 45.0, 40.0);
        assert_eq!(world.location_of(entity), Some(LocationId(5)));
        assert!(world.location(LocationId(5)).unwrap().population().contains(&entity));
        assert_eq!(world.population_size(), 1);
        assert!(world.check_partition().is_ok());
    }

    #[test]
    fn test_add_human_clamps_into_bounds() {
        let mut world = small_world();
        let entity = spawn(&mut world, -20.0, 80.0);
        assert_eq!(world.position(entity), Some(Vec2::new(1.0, 49.0)));
    }

    #[test]
    fn test_ids_are_unique() {
        let mut world = small_world();
        let a = spawn(&mut world, 10.0, 10.0);
        let b = spawn(&mut world, 10.0, 10.0);
        assert_ne!(world.human(a).unwrap().id(), world.human(b).unwrap().id());
    }

    #[test]
    fn test_relocate_is_atomic() {
        let mut world = small_world();
        let entity = spawn(&mut world, 10.0, 10.0);

        assert_eq!(world.relocate(entity, LocationId(0)), Ok(false));
        assert_eq!(world.relocate(entity, LocationId(6)), Ok(true));
        assert_eq!(world.location_of(entity), Some(LocationId(6)));
        assert!(world.location(LocationId(0)).unwrap().is_empty());
        assert_eq!(world.location(LocationId(6)).unwrap().len(), 1);

        // Rejected moves leave everything untouched
        assert_eq!(
            world.relocate(entity, LocationId(99)),
            Err(SimulationError::UnknownLocation(LocationId(99)))
        );
        assert_eq!(world.location_of(entity), Some(LocationId(6)));
        assert!(world.check_partition().is_ok());
    }

    #[test]
    fn test_remove_human() {
        let mut world = small_world();
        let a = spawn(&mut world, 10.0, 10.0);
        let b = spawn(&mut world, 12.0, 10.0);

        let removed = world.remove_human(a).unwrap();
        assert_eq!(removed.status(), Status::Healthy);
        assert!(!world.contains(a));
        assert_eq!(world.population_size(), 1);
        assert_eq!(world.location(LocationId(0)).unwrap().len(), 1);
        assert!(world.check_partition().is_ok());

        assert_eq!(world.remove_human(a), Err(SimulationError::UnknownHuman(a)));
        assert!(world.relocate(a, LocationId(1)).is_err());
        assert!(world.contains(b));
    }

    #[test]
    fn test_recount() {
        let mut world = small_world();
        let f = factory();
        for status in [Status::Healthy, Status::Infected, Status::Infected, Status::Recovered] {
            world.add_human(f.create(status, Behaviour::Normal, 5.0, 5.0, 0.0, 0.0).unwrap());
        }
        let counts = world.recount();
        assert_eq!(counts.healthy, 1);
        assert_eq!(counts.infected, 2);
        assert_eq!(counts.recovered, 1);
        assert_eq!(counts.total(), 4);
    }

    #[test]
    fn test_world_config_validation() {
        assert!(WorldConfig::default().validate().is_ok());
        let bad = WorldConfig {
            location_size: 0.0,
            ..Default::default()
        };
        assert!(World::new(&bad).is_err());
        let bad = WorldConfig {
            human_radius: 200.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
