//! Tick Scheduler
//!
//! `Simulation` owns the app that holds the world and drives the fixed system
//! pipeline once per tick:
//!
//! ```text
//! IDLE --step--> RUNNING --(max ticks | rotations exhausted | stop | fault)--> DONE
//! ```
//!
//! Before each update the scheduler writes the `TickContext` resource: the tick
//! number and whether buffered condition damage commits on this tick. Systems only
//! ever read it.

use bevy::ecs::schedule::ExecutorKind;
use bevy::prelude::*;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::actors::spawn_actors;
use super::attributes::{derive_effective_attributes, Attributes};
use super::components::{EffectiveAttributes, Rotation};
use super::config::{ActorSeed, SimulationConfig, SkillCatalog};
use super::constants::DEFAULT_TICK_RATE_MS;
use super::error::{Result, SimulationError};
use super::log::{CombatLog, CombatLogEventType};
use super::snapshot::TickSnapshot;
use super::store;
use super::SimulationPlugin;

/// One discrete simulation step.
pub type Tick = u64;

/// Read-only view of the clock for the systems of the current tick.
#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickContext {
    pub tick: Tick,
    pub tick_rate_ms: u64,
    /// Damage gate: buffered condition damage commits on this tick.
    pub apply_condition_damage: bool,
}

impl Default for TickContext {
    fn default() -> Self {
        Self {
            tick: 0,
            tick_rate_ms: DEFAULT_TICK_RATE_MS,
            apply_condition_damage: false,
        }
    }
}

/// Whether buffered damage commits on `tick` given the gate spacing in ticks.
pub fn damage_gate_open(tick: Tick, interval_ticks: Tick) -> bool {
    interval_ticks > 0 && tick % interval_ticks == 0
}

/// First fatal error raised by a system during the current tick.
#[derive(Resource, Debug, Default)]
pub struct SimulationFault(pub Option<SimulationError>);

impl SimulationFault {
    /// Keep the first error; later ones are consequences of it.
    pub fn raise(&mut self, err: SimulationError) {
        if self.0.is_none() {
            self.0 = Some(err);
        }
    }
}

/// Run condition: skip remaining systems once a fault has been raised.
pub fn simulation_healthy(fault: Res<SimulationFault>) -> bool {
    fault.0.is_none()
}

/// Requests a stop from outside the tick loop. Honoured between ticks only.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SimulationState {
    Idle,
    Running,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TerminationReason {
    /// Every rotation in the world was exhausted.
    RotationsComplete,
    MaxTicks,
    Stopped,
    Fault,
}

pub struct Simulation {
    app: App,
    config: SimulationConfig,
    state: SimulationState,
    termination: Option<TerminationReason>,
    stop: StopHandle,
}

impl Simulation {
    pub fn new(config: SimulationConfig, catalog: SkillCatalog) -> Result<Self> {
        Self::with_app(App::new(), config, catalog)
    }

    /// Build on top of an existing app, e.g. one that already has logging installed.
    pub fn with_app(mut app: App, config: SimulationConfig, catalog: SkillCatalog) -> Result<Self> {
        config.validate()?;
        catalog.validate()?;

        app.add_plugins(SimulationPlugin)
            .insert_resource(catalog)
            .insert_resource(TickContext {
                tick: 0,
                tick_rate_ms: config.tick_rate_ms,
                apply_condition_damage: false,
            });
        app.edit_schedule(Update, |schedule| {
            schedule.set_executor_kind(ExecutorKind::SingleThreaded);
        });
        app.finish();
        app.cleanup();

        Ok(Self {
            app,
            config,
            state: SimulationState::Idle,
            termination: None,
            stop: StopHandle::default(),
        })
    }

    /// Validate and spawn a batch of actors. Nothing is spawned if any seed is invalid.
    pub fn add_actors(&mut self, seeds: &[ActorSeed]) -> Result<Vec<Entity>> {
        if self.state == SimulationState::Done {
            return Err(SimulationError::InvalidConfig(
                "cannot add actors to a finished simulation".to_string(),
            ));
        }
        spawn_actors(self.app.world_mut(), seeds)
    }

    pub fn tick(&self) -> Tick {
        self.app.world().resource::<TickContext>().tick
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    pub fn termination(&self) -> Option<TerminationReason> {
        self.termination
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Share a stop flag owned by the caller.
    pub fn set_stop_handle(&mut self, stop: StopHandle) {
        self.stop = stop;
    }

    pub fn world(&self) -> &World {
        self.app.world()
    }

    pub fn world_mut(&mut self) -> &mut World {
        self.app.world_mut()
    }

    pub fn combat_log(&self) -> &CombatLog {
        self.app.world().resource::<CombatLog>()
    }

    pub fn actor(&self, name: &str) -> Option<Entity> {
        store::find_actor(self.app.world(), name)
    }

    /// Effective attributes of `actor`, computed and cached if no tick has resolved them yet.
    pub fn effective_attributes(&mut self, actor: Entity) -> Result<Attributes> {
        let tick = self.tick();
        let world = self.app.world_mut();
        let effective = world
            .get::<EffectiveAttributes>(actor)
            .ok_or(SimulationError::MissingComponent {
                entity: actor,
                component: "EffectiveAttributes",
            })?;
        if effective.computed_at.is_some() {
            return Ok(effective.values.clone());
        }

        let values = derive_effective_attributes(world, actor)?;
        if let Some(mut effective) = world.get_mut::<EffectiveAttributes>(actor) {
            effective.values = values.clone();
            effective.computed_at = Some(tick);
        }
        Ok(values)
    }

    pub fn snapshot(&self) -> TickSnapshot {
        TickSnapshot::capture(self.app.world())
    }

    /// Advance one tick and run the full pipeline once.
    pub fn step(&mut self) -> Result<SimulationState> {
        if self.state == SimulationState::Done {
            return Ok(self.state);
        }
        if self.state == SimulationState::Idle {
            self.state = SimulationState::Running;
            self.app
                .world_mut()
                .resource_mut::<CombatLog>()
                .log(CombatLogEventType::SimulationEvent, "Simulation started".to_string());
        }

        let tick = self.tick() + 1;
        let context = TickContext {
            tick,
            tick_rate_ms: self.config.tick_rate_ms,
            apply_condition_damage: damage_gate_open(tick, self.config.gate_interval_ticks()),
        };
        let world = self.app.world_mut();
        world.insert_resource(context);
        world.resource_mut::<CombatLog>().tick = tick;

        self.app.update();

        let fault = self.app.world_mut().resource_mut::<SimulationFault>().0.take();
        if let Some(err) = fault {
            error!("Simulation aborted at tick {}: {}", tick, err);
            self.app
                .world_mut()
                .resource_mut::<CombatLog>()
                .log(CombatLogEventType::Fault, err.to_string());
            self.finish(TerminationReason::Fault);
            return Err(err);
        }

        if self.config.max_ticks.is_some_and(|max| tick >= max) {
            self.finish(TerminationReason::MaxTicks);
        } else if self.rotations_exhausted() {
            self.finish(TerminationReason::RotationsComplete);
        }
        Ok(self.state)
    }

    /// Step until the simulation is done or a stop is requested.
    ///
    /// Without `max_ticks` the run can only end through rotations, so at least one
    /// actor must carry one.
    pub fn run(&mut self) -> Result<TerminationReason> {
        if self.termination.is_none()
            && self.config.max_ticks.is_none()
            && !self.has_rotations()
        {
            return Err(SimulationError::InvalidConfig(
                "max_ticks is required when no actor has a rotation".to_string(),
            ));
        }
        loop {
            if let Some(reason) = self.termination {
                return Ok(reason);
            }
            if self.stop.is_stop_requested() {
                self.finish(TerminationReason::Stopped);
                continue;
            }
            self.step()?;
        }
    }

    fn has_rotations(&mut self) -> bool {
        let world = self.app.world_mut();
        world.query::<&Rotation>().iter(world).next().is_some()
    }

    /// At least one rotation exists and none has entries left.
    fn rotations_exhausted(&mut self) -> bool {
        let world = self.app.world_mut();
        let mut rotations = world.query::<&Rotation>();
        let mut any = false;
        for rotation in rotations.iter(world) {
            if !rotation.is_exhausted() {
                return false;
            }
            any = true;
        }
        any
    }

    fn finish(&mut self, reason: TerminationReason) {
        self.state = SimulationState::Done;
        self.termination = Some(reason);
        let tick = self.tick();
        info!("Simulation finished at tick {}: {:?}", tick, reason);
        self.app.world_mut().resource_mut::<CombatLog>().log(
            CombatLogEventType::SimulationEvent,
            format!("Simulation finished: {reason:?}"),
        );
    }
}
