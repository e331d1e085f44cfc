//! Top-level control: one installed world, stepped either on demand or by a
//! background thread.
//!
//! The world sits behind a mutex shared with the step thread, so a direct
//! mutation through [`Simulator::with_world_mut`] or a manual
//! [`Simulator::step`] is serialized against a running loop: each waits for
//! the other's full step. A panic while the world is locked (a broken
//! registration pairing) poisons the mutex; the world is then considered
//! halted until it is replaced.

use crate::error::{SimulationError, SimulatorError};
use crate::world::World;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

pub type RecipeError = Box<dyn std::error::Error + Send + Sync>;

/// Rebuilds a world from the source it was originally constructed from.
pub trait WorldRecipe: Send + Sync {
    fn build(&self) -> Result<World, RecipeError>;

    /// Human-readable origin, e.g. a file path.
    fn describe(&self) -> String;
}

/// Stepping parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulatorConfig {
    /// Seconds per step unless the world overrides it.
    pub time_step: f32,
    /// Pause between background steps.
    pub step_interval_ms: u64,
    /// Background steps per `start()` before the loop ends by itself.
    pub max_steps: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            time_step: 1.0,
            step_interval_ms: 0,
            max_steps: None,
        }
    }
}

struct Shared {
    world: Mutex<Option<World>>,
    failure: Mutex<Option<SimulationError>>,
    running: AtomicBool,
    stop: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears the running flag when the loop exits, unwinding included.
struct RunningFlag<'a>(&'a AtomicBool);

impl Drop for RunningFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct Simulator {
    config: SimulatorConfig,
    shared: Arc<Shared>,
    recipe: Option<Arc<dyn WorldRecipe>>,
    worker: Option<JoinHandle<()>>,
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Shared {
                world: Mutex::new(None),
                failure: Mutex::new(None),
                running: AtomicBool::new(false),
                stop: AtomicBool::new(false),
            }),
            recipe: None,
            worker: None,
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Install `world` without a reconstruction recipe; `reset` will fail.
    pub fn set_world(&mut self, world: World) {
        self.stop_for_replacement();
        self.recipe = None;
        self.replace_world(Some(world));
    }

    pub fn set_world_with_recipe(&mut self, world: World, recipe: Arc<dyn WorldRecipe>) {
        self.stop_for_replacement();
        self.recipe = Some(recipe);
        self.replace_world(Some(world));
    }

    /// Build a world from `recipe` and install it. On failure the current
    /// world stays installed.
    pub fn install(&mut self, recipe: Arc<dyn WorldRecipe>) -> Result<(), SimulatorError> {
        let world = recipe.build().map_err(SimulatorError::Rebuild)?;
        self.set_world_with_recipe(world, recipe);
        Ok(())
    }

    /// Remove the installed world, if any.
    pub fn clear_world(&mut self) {
        self.stop_for_replacement();
        self.recipe = None;
        self.replace_world(None);
    }

    pub fn has_world(&self) -> bool {
        lock(&self.shared.world).is_some()
    }

    pub fn recipe(&self) -> Option<&dyn WorldRecipe> {
        self.recipe.as_deref()
    }

    /// Launch the background step loop. A no-op when already running or when
    /// no world is installed.
    pub fn start(&mut self) -> Result<(), SimulatorError> {
        if self.worker.is_some() && self.is_running() {
            return Ok(());
        }
        self.reap()?;
        self.check_steppable()?;
        if !self.has_world() {
            tracing::debug!("start ignored: no world installed");
            return Ok(());
        }

        self.shared.stop.store(false, Ordering::SeqCst);
        self.shared.running.store(true, Ordering::SeqCst);
        let shared = Arc::clone(&self.shared);
        let config = self.config.clone();
        let spawned = std::thread::Builder::new()
            .name("cellsim-step".into())
            .spawn(move || run_loop(&shared, &config));
        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                tracing::info!(time_step = self.time_step(), "simulation started");
                Ok(())
            }
            Err(err) => {
                self.shared.running.store(false, Ordering::SeqCst);
                Err(SimulatorError::Spawn(err))
            }
        }
    }

    /// Ask the loop to finish its current step and wait for the thread to exit.
    pub fn stop(&mut self) -> Result<(), SimulatorError> {
        self.shared.stop.store(true, Ordering::SeqCst);
        let was_running = self.worker.is_some();
        let joined = self.reap();
        if was_running {
            tracing::info!("simulation stopped");
        }
        joined
    }

    /// Advance the installed world by one time step on the calling thread.
    /// Returns `Ok(false)` when no world is installed.
    pub fn step(&self) -> Result<bool, SimulatorError> {
        self.check_steppable()?;
        let mut guard = lock(&self.shared.world);
        let Some(world) = guard.as_mut() else {
            return Ok(false);
        };
        let dt = world.settings().time_step.unwrap_or(self.config.time_step);
        match world.update(dt) {
            Ok(()) => Ok(true),
            Err(err) => {
                tracing::error!(%err, "simulation step failed");
                *lock(&self.shared.failure) = Some(err.clone());
                Err(SimulatorError::Simulation(err))
            }
        }
    }

    /// Stop, then rebuild the world from its recipe. Simulation time restarts
    /// at zero. The loop is not restarted.
    pub fn reset(&mut self) -> Result<(), SimulatorError> {
        let recipe = self.recipe.clone().ok_or_else(|| {
            SimulatorError::Configuration("no reconstruction recipe for the installed world".into())
        })?;
        self.stop_for_replacement();
        let world = recipe.build().map_err(SimulatorError::Rebuild)?;
        self.replace_world(Some(world));
        tracing::info!(source = %recipe.describe(), "simulation reset");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// The error that ended stepping of the installed world, if any.
    pub fn last_error(&self) -> Option<SimulationError> {
        lock(&self.shared.failure).clone()
    }

    /// True after a panic while the world was locked.
    pub fn is_halted(&self) -> bool {
        self.shared.world.is_poisoned()
    }

    /// Effective step length for the installed world.
    pub fn time_step(&self) -> f32 {
        lock(&self.shared.world)
            .as_ref()
            .and_then(|w| w.settings().time_step)
            .unwrap_or(self.config.time_step)
    }

    /// Read the world, waiting for any in-flight step.
    pub fn with_world<R>(&self, f: impl FnOnce(&World) -> R) -> Option<R> {
        lock(&self.shared.world).as_ref().map(f)
    }

    /// Mutate the world, excluding the step loop for the duration of `f`.
    pub fn with_world_mut<R>(&self, f: impl FnOnce(&mut World) -> R) -> Option<R> {
        lock(&self.shared.world).as_mut().map(f)
    }

    fn check_steppable(&self) -> Result<(), SimulatorError> {
        if self.is_halted() {
            return Err(SimulatorError::Halted);
        }
        match lock(&self.shared.failure).clone() {
            Some(err) => Err(SimulatorError::Simulation(err)),
            None => Ok(()),
        }
    }

    /// Join a worker that is stopping or already finished.
    fn reap(&mut self) -> Result<(), SimulatorError> {
        let Some(handle) = self.worker.take() else {
            return Ok(());
        };
        let joined = handle.join();
        self.shared.running.store(false, Ordering::SeqCst);
        joined.map_err(|payload| {
            let message = panic_message(payload.as_ref());
            tracing::error!(%message, "step thread panicked");
            SimulatorError::WorkerPanicked(message)
        })
    }

    fn stop_for_replacement(&mut self) {
        if let Err(err) = self.stop() {
            tracing::warn!(%err, "previous step loop ended abnormally");
        }
    }

    fn replace_world(&mut self, world: Option<World>) {
        let halted = self.is_halted();
        let old = {
            let mut guard = lock(&self.shared.world);
            std::mem::replace(&mut *guard, world)
        };
        self.shared.world.clear_poison();
        *lock(&self.shared.failure) = None;
        if let Some(old) = old {
            if halted {
                // Its registrations cannot be trusted; do not unbind them.
                tracing::warn!(world = %old.id(), "leaking halted world");
                std::mem::forget(old);
            } else {
                drop(old);
            }
        }
        if let Some(world) = lock(&self.shared.world).as_ref() {
            tracing::info!(world = %world.id(), objects = world.object_count(), "world installed");
        }
    }
}

impl Drop for Simulator {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            tracing::warn!(%err, "step loop ended abnormally");
        }
    }
}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .field("has_recipe", &self.recipe.is_some())
            .finish_non_exhaustive()
    }
}

fn run_loop(shared: &Shared, config: &SimulatorConfig) {
    let _running = RunningFlag(&shared.running);
    let interval = Duration::from_millis(config.step_interval_ms);
    let mut steps: u64 = 0;
    loop {
        if shared.stop.load(Ordering::SeqCst) {
            break;
        }
        if config.max_steps.is_some_and(|max| steps >= max) {
            tracing::debug!(steps, "step budget reached");
            break;
        }
        {
            let mut guard = lock(&shared.world);
            let Some(world) = guard.as_mut() else {
                break;
            };
            if let Some(limit) = world.settings().iterations {
                if world.step_number() >= limit {
                    tracing::info!(limit, "iteration limit reached");
                    break;
                }
            }
            let dt = world.settings().time_step.unwrap_or(config.time_step);
            if let Err(err) = world.update(dt) {
                tracing::error!(%err, "simulation failed; step loop stopping");
                *lock(&shared.failure) = Some(err);
                break;
            }
        }
        steps += 1;
        if !interval.is_zero() {
            std::thread::sleep(interval);
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
