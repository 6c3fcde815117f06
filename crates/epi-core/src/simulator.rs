//! Simulator - main entry point for running an epidemic

use std::collections::VecDeque;

use hecs::Entity;
use log::{debug, info, trace};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::components::*;
use crate::config::{SimulationConfig, SimulatorSettings};
use crate::error::{ConfigError, SimulationError};
use crate::generation::{populate, BehaviourDistribution, HumanFactory, Seeding};
use crate::systems::*;
use crate::world::{StatusCounts, World};

/// Mixes the tick number into the seed so every tick has its own stream
const TICK_STREAM: u64 = 0x9E37_79B9_7F4A_7C15;

/// Owns the world and advances it one tick at a time
pub struct Simulator {
    world: World,
    behaviours: BehaviourDistribution,
    pathogen: Pathogen,
    settings: SimulatorSettings,
    factory: HumanFactory,

    /// Simulated seconds since the start
    elapsed: f64,
    tick_count: u64,
    history: VecDeque<StatusCounts>,
    extinct: bool,
}

impl Simulator {
    /// Wrap an already populated world. `pathogen` is the prototype that new
    /// infections are cloned from. Fails if any setting is out of range.
    pub fn new(
        world: World,
        behaviours: BehaviourDistribution,
        pathogen: Pathogen,
        settings: SimulatorSettings,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        let pathogen = pathogen.infect();
        let factory = HumanFactory::new(pathogen.clone(), settings.immunity)?;
        let mut sim = Self {
            world,
            behaviours,
            pathogen,
            settings,
            factory,
            elapsed: 0.0,
            tick_count: 0,
            history: VecDeque::with_capacity(settings.history_len.min(4096)),
            extinct: false,
        };
        sim.refresh_counts();
        info!(
            "Simulation ready: {} humans in {} locations, {} infected",
            sim.world.population_size(),
            sim.world.locations().len(),
            sim.counts().infected
        );
        Ok(sim)
    }

    /// Build the world, seed the population and wrap it
    pub fn from_config(config: &SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut world = World::new(&config.world)?;
        let pathogen = config.pathogen.prototype()?;
        let behaviours = config.behaviour.distribution()?;
        let factory = HumanFactory::new(pathogen.clone(), config.immunity)?;

        let mut rng = StdRng::seed_from_u64(config.seed);
        populate(
            &mut world,
            &factory,
            &behaviours,
            Seeding {
                population: config.world.population_size,
                infected: config.initial_infected,
                recovered: config.initial_recovered,
            },
            config.base_speed,
            &mut rng,
        )?;

        Self::new(world, behaviours, pathogen, config.settings())
    }

    /// Rebuild a simulator at a checkpointed clock
    pub(crate) fn restore(
        world: World,
        behaviours: BehaviourDistribution,
        pathogen: Pathogen,
        settings: SimulatorSettings,
        elapsed: f64,
        tick_count: u64,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        let counts = world.counts();
        let factory = HumanFactory::new(pathogen.clone(), settings.immunity)?;
        let mut sim = Self {
            world,
            behaviours,
            pathogen,
            settings,
            factory,
            elapsed,
            tick_count,
            history: VecDeque::new(),
            extinct: counts.infected == 0,
        };
        sim.record(counts);
        Ok(sim)
    }

    /// RNG for the tick about to run. Depends only on the seed and the tick
    /// number, so a restored simulator draws the same numbers.
    fn tick_rng(&self) -> StdRng {
        let stream = self.tick_count.wrapping_add(1).wrapping_mul(TICK_STREAM);
        StdRng::seed_from_u64(self.settings.seed ^ stream)
    }

    /// Advance the simulation by `elapsed_seconds`.
    ///
    /// Every pass reads the pre-tick world and stages its results; nothing is
    /// written until all of them succeed. On error the world is unchanged.
    pub fn tick(&mut self, elapsed_seconds: f64) -> Result<StatusCounts, SimulationError> {
        if !elapsed_seconds.is_finite() || elapsed_seconds < 0.0 {
            return Err(SimulationError::InvalidElapsed(elapsed_seconds));
        }
        let mut rng = self.tick_rng();

        let exposed = exposure_system(&self.world, self.settings.transmission, elapsed_seconds, &mut rng);
        let disease = disease_system(&self.world, &exposed, &self.pathogen, elapsed_seconds);
        let motion = movement_system(&self.world, elapsed_seconds);
        let deaths = if self.settings.deaths_enabled {
            mortality_system(&disease, &self.pathogen, &mut rng)
        } else {
            Vec::new()
        };

        // Overflowing kinematics (a huge step) must not reach the world
        if motion
            .iter()
            .any(|m| !m.position.0.is_finite() || !m.velocity.0.is_finite())
        {
            return Err(SimulationError::InvalidElapsed(elapsed_seconds));
        }
        for update in &motion {
            self.world.check_relocation(update.entity, update.location)?;
        }

        // Commit
        let new_infections = disease.iter().filter(|u| u.newly_infected).count();
        for update in disease {
            if update.outcome.status_changed {
                trace!("Human {:?} is now {}", update.human.id(), update.human.status());
            }
            if let Ok(mut human) = self.world.ecs().get::<&mut Human>(update.entity) {
                *human = update.human;
            }
        }
        for update in &motion {
            if let Ok(mut position) = self.world.ecs().get::<&mut Position>(update.entity) {
                *position = update.position;
            }
            if let Ok(mut velocity) = self.world.ecs().get::<&mut Velocity>(update.entity) {
                *velocity = update.velocity;
            }
            self.world.relocate(update.entity, update.location)?;
        }
        let mut died = 0;
        for entity in deaths {
            self.world.remove_human(entity)?;
            died += 1;
        }

        self.tick_count += 1;
        self.elapsed += elapsed_seconds;

        let mut counts = self.world.recount();
        counts.tick = self.tick_count;
        counts.time = self.elapsed;
        counts.deceased += died;
        counts.new_infections = new_infections;
        self.world.publish(counts);
        self.record(counts);
        debug_assert!(self.world.check_partition().is_ok());

        debug!(
            "Tick {} t={:.2}s: healthy={} infected={} recovered={} deceased={} new={}",
            counts.tick,
            counts.time,
            counts.healthy,
            counts.infected,
            counts.recovered,
            counts.deceased,
            counts.new_infections
        );
        if counts.infected == 0 && !self.extinct {
            info!(
                "Epidemic over after {:.1}s: {} recovered, {} never infected",
                counts.time, counts.recovered, counts.healthy
            );
        }
        self.extinct = counts.infected == 0;

        Ok(counts)
    }

    /// Tick with a fixed step until `simulated_seconds` have elapsed in total
    pub fn run_until(
        &mut self,
        simulated_seconds: f64,
        elapsed_seconds: f64,
    ) -> Result<StatusCounts, SimulationError> {
        if !elapsed_seconds.is_finite() || elapsed_seconds <= 0.0 {
            return Err(SimulationError::InvalidElapsed(elapsed_seconds));
        }
        if !simulated_seconds.is_finite() {
            return Err(SimulationError::InvalidElapsed(simulated_seconds));
        }
        let ticks = ((simulated_seconds - self.elapsed) / elapsed_seconds).round();
        for _ in 0..ticks.max(0.0) as u64 {
            self.tick(elapsed_seconds)?;
        }
        Ok(self.counts())
    }

    /// Add a human between ticks
    pub fn add_human(
        &mut self,
        status: Status,
        behaviour: Behaviour,
        center_x: f64,
        center_y: f64,
        velocity_x: f64,
        velocity_y: f64,
    ) -> Result<Entity, SimulationError> {
        let blueprint = self
            .factory
            .create(status, behaviour, center_x, center_y, velocity_x, velocity_y)?;
        let entity = self.world.add_human(blueprint);
        self.refresh_counts();
        Ok(entity)
    }

    /// Remove a human between ticks
    pub fn remove_human(&mut self, entity: Entity) -> Result<Human, SimulationError> {
        let human = self.world.remove_human(entity)?;
        self.refresh_counts();
        Ok(human)
    }

    /// Republish counts for the current clock after a population change
    fn refresh_counts(&mut self) {
        let published = self.world.counts();
        let mut counts = self.world.recount();
        counts.tick = self.tick_count;
        counts.time = self.elapsed;
        if published.tick == self.tick_count {
            counts.new_infections = published.new_infections;
        }
        self.world.publish(counts);
        self.extinct = counts.infected == 0;
        match self.history.back_mut() {
            Some(last) if last.tick == self.tick_count => *last = counts,
            _ => self.record(counts),
        }
    }

    fn record(&mut self, counts: StatusCounts) {
        if self.settings.history_len == 0 {
            return;
        }
        while self.history.len() >= self.settings.history_len {
            self.history.pop_front();
        }
        self.history.push_back(counts);
    }

    /// Counts published by the last completed tick
    pub fn counts(&self) -> StatusCounts {
        self.world.counts()
    }

    /// Recent snapshots, oldest first
    pub fn history(&self) -> &VecDeque<StatusCounts> {
        &self.history
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// The prototype new infections are cloned from
    pub fn pathogen(&self) -> &Pathogen {
        &self.pathogen
    }

    pub fn behaviour_distribution(&self) -> &BehaviourDistribution {
        &self.behaviours
    }

    pub fn settings(&self) -> &SimulatorSettings {
        &self.settings
    }

    /// No infected humans are left
    pub fn is_extinct(&self) -> bool {
        self.counts().infected == 0
    }

    /// Save the complete simulation to a writer
    pub fn save<W: std::io::Write>(&self, writer: W) -> Result<(), crate::persistence::SaveError> {
        crate::persistence::save_simulation(writer, self)
    }

    /// Load a simulation saved with [`Simulator::save`]
    pub fn load<R: std::io::Read>(reader: R) -> Result<Self, crate::persistence::SaveError> {
        crate::persistence::load_simulation(reader)
    }
}
