use crate::error::{ObjectError, SimulationError, WorldError};
use crate::kinds::{ObjectArgs, ObjectKindRegistry};
use crate::module::{CreateRequest, ModuleArgs, ModuleContext, WorldModule};
use crate::object::{Object, ObjectBehavior, SpawnRequest};
use crate::rng::{SimRng, seeded};
use cellsim_common::{ObjectId, Transform, WorldId};
use cellsim_physics::{BodyKind, NativePhysics, NativePhysicsConfig, PhysicsBackend, PhysicsError, Shape};
use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Builds a fresh physics backend for each new world.
pub type PhysicsProvider = Arc<dyn Fn() -> Box<dyn PhysicsBackend> + Send + Sync>;

pub fn native_physics_provider(config: NativePhysicsConfig) -> PhysicsProvider {
    Arc::new(move || Box::new(NativePhysics::new(config)))
}

/// Scenario-level world parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldSettings {
    /// Extent of the simulated volume in µm, centred on the origin. Dynamic
    /// objects that leave it are removed at the end of a step.
    pub size: Vec3,
    /// Seed of the world's random generator.
    pub seed: u64,
    /// Overrides the simulator's time step when set.
    pub time_step: Option<f32>,
    /// Background stepping stops by itself at this step number.
    pub iterations: Option<u64>,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            size: Vec3::new(400.0, 400.0, 50.0),
            seed: 0,
            time_step: None,
            iterations: None,
        }
    }
}

/// A record produced by every structural change and completed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorldEvent {
    ObjectCreated { id: ObjectId, kind: String },
    ObjectDestroyed { id: ObjectId, kind: String },
    Stepped { step: u64, dt: f32 },
}

struct Slot {
    generation: u32,
    object: Option<Object>,
}

/// Logical state captured before a step so a failed step can be undone.
struct Checkpoint {
    rng: SimRng,
    events: usize,
    objects: Vec<(usize, Box<dyn ObjectBehavior>, Shape)>,
    modules: Vec<Box<dyn WorldModule>>,
}

/// The live set of objects and the physics world that moves them.
///
/// Objects live in a generational arena: an [`ObjectId`] names a slot and the
/// generation it was created in, so a stale id never reaches a reused slot.
/// Iteration follows slot order, which is stable for the lifetime of a world.
pub struct World {
    id: WorldId,
    settings: WorldSettings,
    kinds: Arc<ObjectKindRegistry>,
    physics: Box<dyn PhysicsBackend>,
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    step: u64,
    elapsed: f64,
    rng: SimRng,
    modules: Vec<Box<dyn WorldModule>>,
    event_log: Vec<WorldEvent>,
}

impl World {
    pub fn new(settings: WorldSettings, kinds: Arc<ObjectKindRegistry>, physics: Box<dyn PhysicsBackend>) -> Self {
        let id = WorldId::new();
        tracing::debug!(%id, seed = settings.seed, "world created");
        Self {
            id,
            rng: seeded(settings.seed),
            settings,
            kinds,
            physics,
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            step: 0,
            elapsed: 0.0,
            modules: Vec::new(),
            event_log: Vec::new(),
        }
    }

    pub fn id(&self) -> WorldId {
        self.id
    }

    pub fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    pub fn seed(&self) -> u64 {
        self.settings.seed
    }

    pub fn kinds(&self) -> &ObjectKindRegistry {
        &self.kinds
    }

    /// Number of completed steps.
    pub fn step_number(&self) -> u64 {
        self.step
    }

    /// Simulated seconds.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn object_count(&self) -> usize {
        self.live
    }

    /// Bodies registered in the dynamics world. Equals [`World::object_count`]
    /// whenever no operation is in flight.
    pub fn registered_body_count(&self) -> usize {
        self.physics.registered_count()
    }

    pub fn physics(&self) -> &dyn PhysicsBackend {
        self.physics.as_ref()
    }

    pub fn events(&self) -> &[WorldEvent] {
        &self.event_log
    }

    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.event_log)
    }

    /// Construct an object of a registered kind. On failure the world is unchanged.
    pub fn create_object(&mut self, kind: &str, args: &ObjectArgs) -> Result<ObjectId, ObjectError> {
        let behavior = self.kinds.create(kind, args)?;
        self.add_object(behavior, args.transform, args.velocity)
    }

    /// Bind an already-built behaviour to a new body.
    pub fn add_object(
        &mut self,
        behavior: Box<dyn ObjectBehavior>,
        transform: Transform,
        velocity: Vec3,
    ) -> Result<ObjectId, ObjectError> {
        let id = match self.free.last() {
            Some(&index) => ObjectId::new(index, self.slots[index as usize].generation),
            None => ObjectId::new(self.slots.len() as u32, 0),
        };
        let object = Object::bind(id, behavior, transform, velocity, self.physics.as_mut())?;
        let kind = object.kind().to_string();
        if id.index as usize == self.slots.len() {
            self.slots.push(Slot {
                generation: id.generation,
                object: Some(object),
            });
        } else {
            self.free.pop();
            self.slots[id.index as usize].object = Some(object);
        }
        self.live += 1;
        self.event_log.push(WorldEvent::ObjectCreated { id, kind });
        Ok(id)
    }

    /// Unregister and drop an object. Returns false if `id` is not live.
    pub fn destroy_object(&mut self, id: ObjectId) -> bool {
        let Some(object) = self.take(id) else {
            return false;
        };
        let kind = object.kind().to_string();
        object.unbind(self.physics.as_mut());
        self.event_log.push(WorldEvent::ObjectDestroyed { id, kind });
        true
    }

    fn take(&mut self, id: ObjectId) -> Option<Object> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let object = slot.object.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(object)
    }

    fn get(&self, id: ObjectId) -> Option<&Object> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.object.as_ref())
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.get(id).is_some()
    }

    pub fn object(&self, id: ObjectId) -> Option<ObjectRef<'_>> {
        self.get(id).map(|object| ObjectRef {
            object,
            physics: self.physics.as_ref(),
        })
    }

    /// Read-only view of the live objects. Can be iterated again by cloning
    /// or by calling `objects()` once more.
    pub fn objects(&self) -> impl Iterator<Item = ObjectRef<'_>> + Clone + '_ {
        let physics = self.physics.as_ref();
        self.slots
            .iter()
            .filter_map(|slot| slot.object.as_ref())
            .map(move |object| ObjectRef { object, physics })
    }

    /// Install a module; it runs from the next step on, after the modules
    /// already installed.
    pub fn add_module(&mut self, module: Box<dyn WorldModule>) -> Result<(), ObjectError> {
        module.validate(&self.kinds)?;
        tracing::debug!(world = %self.id, module = module.name(), "module added");
        self.modules.push(module);
        Ok(())
    }

    /// Construct a registered module and install it.
    pub fn create_module(&mut self, name: &str, args: &ModuleArgs) -> Result<(), ObjectError> {
        let module = self.kinds.create_module(name, args)?;
        self.add_module(module)
    }

    pub fn modules(&self) -> impl Iterator<Item = &dyn WorldModule> + '_ {
        self.modules.iter().map(|m| m.as_ref())
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn position(&self, id: ObjectId) -> Result<Vec3, WorldError> {
        let object = self.get(id).ok_or(WorldError::NotFound(id))?;
        object
            .position(self.physics.as_ref())
            .map_err(|source| WorldError::Physics { id, source })
    }

    pub fn set_position(&mut self, id: ObjectId, position: Vec3) -> Result<(), WorldError> {
        let object = self
            .slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.object.as_ref())
            .ok_or(WorldError::NotFound(id))?;
        object
            .set_position(self.physics.as_mut(), position)
            .map_err(|source| WorldError::Physics { id, source })
    }

    pub fn set_velocity(&mut self, id: ObjectId, velocity: Vec3) -> Result<(), WorldError> {
        let body = self.get(id).ok_or(WorldError::NotFound(id))?.body();
        self.physics
            .set_velocity(body, velocity)
            .map_err(|source| WorldError::Physics { id, source })
    }

    /// Advance the world by `dt` seconds.
    ///
    /// Modules run first and the objects they ask for are created right away.
    /// Every object then updates; objects they spawn are created next and the
    /// physics solve runs last. A failure anywhere undoes the whole step.
    /// Destruction requested by modules and removal of dynamic objects that
    /// left the world volume happen only once the step has succeeded.
    pub fn update(&mut self, dt: f32) -> Result<(), SimulationError> {
        if !(dt.is_finite() && dt >= 0.0) {
            return Err(SimulationError::InvalidTimeStep(dt));
        }
        let step = self.step + 1;
        let _span = tracing::info_span!("world_update", world = %self.id, step, dt).entered();
        let checkpoint = self.checkpoint();

        let (creates, destroys) = self.run_modules(dt, step);
        let mut spawned = Vec::with_capacity(creates.len());
        for request in creates {
            match self.create_object(&request.kind, &request.args) {
                Ok(id) => spawned.push(id),
                Err(source) => {
                    self.rollback(checkpoint, &spawned);
                    return Err(SimulationError::Spawn { step, source });
                }
            }
        }

        let mut spawns: Vec<SpawnRequest> = Vec::new();
        for slot in &mut self.slots {
            let Some(object) = slot.object.as_mut() else {
                continue;
            };
            if let Err(source) = object.update(dt, &mut self.rng, &mut spawns, self.physics.as_mut()) {
                let id = object.id();
                self.rollback(checkpoint, &spawned);
                return Err(SimulationError::Object { id, step, source });
            }
        }

        spawned.reserve(spawns.len());
        for request in spawns {
            match self.add_object(request.behavior, request.transform, request.velocity) {
                Ok(id) => spawned.push(id),
                Err(source) => {
                    self.rollback(checkpoint, &spawned);
                    return Err(SimulationError::Spawn { step, source });
                }
            }
        }

        if let Err(source) = self.physics.step(dt) {
            self.rollback(checkpoint, &spawned);
            return Err(SimulationError::Physics { step, source });
        }

        for id in destroys {
            self.destroy_object(id);
        }
        let deserters = self.remove_deserters();
        self.step = step;
        self.elapsed += f64::from(dt);
        self.event_log.push(WorldEvent::Stepped { step, dt });
        tracing::trace!(objects = self.live, spawned = spawned.len(), deserters, "step complete");
        Ok(())
    }

    /// Run every module against the world as it stands at the start of the
    /// step. Returns the objects they asked to create and to destroy.
    fn run_modules(&mut self, dt: f32, step: u64) -> (Vec<CreateRequest>, Vec<ObjectId>) {
        let mut creates = Vec::new();
        let mut destroys = Vec::new();
        if self.modules.is_empty() {
            return (creates, destroys);
        }
        let mut modules = std::mem::take(&mut self.modules);
        let mut rng = self.rng.clone();
        for module in &mut modules {
            let mut ctx = ModuleContext::new(dt, step, self, &mut rng, &mut creates, &mut destroys);
            module.update(&mut ctx);
        }
        self.modules = modules;
        self.rng = rng;
        (creates, destroys)
    }

    /// Destroy dynamic objects whose position lies outside the world volume.
    /// Static objects stay wherever they were placed.
    fn remove_deserters(&mut self) -> usize {
        let half = self.settings.size * 0.5;
        let deserters: Vec<ObjectId> = self
            .objects()
            .filter(|o| o.object().behavior().body_kind() == BodyKind::Dynamic)
            .filter(|o| o.position().is_ok_and(|p| p.abs().cmpgt(half).any()))
            .map(|o| o.id())
            .collect();
        for &id in &deserters {
            tracing::debug!(world = %self.id, %id, "object left the world volume");
            self.destroy_object(id);
        }
        deserters.len()
    }

    fn checkpoint(&self) -> Checkpoint {
        let objects = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                let (behavior, shape) = slot.object.as_ref()?.snapshot();
                Some((index, behavior, shape))
            })
            .collect();
        Checkpoint {
            rng: self.rng.clone(),
            events: self.event_log.len(),
            objects,
            modules: self.modules.clone(),
        }
    }

    fn rollback(&mut self, checkpoint: Checkpoint, spawned: &[ObjectId]) {
        for &id in spawned.iter().rev() {
            if let Some(object) = self.take(id) {
                object.unbind(self.physics.as_mut());
            }
        }
        for (index, behavior, shape) in checkpoint.objects {
            if let Some(object) = self.slots[index].object.as_mut() {
                object.restore(behavior, shape, self.physics.as_mut());
            }
        }
        self.rng = checkpoint.rng;
        self.modules = checkpoint.modules;
        self.event_log.truncate(checkpoint.events);
        tracing::warn!(world = %self.id, step = self.step + 1, "step rolled back");
    }

    /// Deterministic fingerprint of the simulation state: step number, random
    /// state, and every live object's kind and transform in slot order.
    pub fn state_hash(&self) -> u64 {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325; // FNV offset basis
        let mix = |h: &mut u64, bytes: &[u8]| {
            for &b in bytes {
                *h ^= b as u64;
                *h = h.wrapping_mul(0x0100_0000_01b3);
            }
        };
        mix(&mut h, &self.step.to_le_bytes());
        mix(&mut h, &self.rng.clone().random::<u64>().to_le_bytes());
        for (index, slot) in self.slots.iter().enumerate() {
            let Some(object) = &slot.object else {
                continue;
            };
            mix(&mut h, &(index as u64).to_le_bytes());
            mix(&mut h, object.kind().as_bytes());
            if let Ok(t) = object.transform(self.physics.as_ref()) {
                for v in t.position.to_array().into_iter().chain(t.rotation.to_array()) {
                    mix(&mut h, &v.to_le_bytes());
                }
            }
        }
        h
    }
}

impl Drop for World {
    fn drop(&mut self) {
        // Unwinding from a pairing violation: the registrations are untrusted.
        if std::thread::panicking() {
            return;
        }
        for slot in &mut self.slots {
            if let Some(object) = slot.object.take() {
                object.unbind(self.physics.as_mut());
            }
        }
        self.live = 0;
        tracing::debug!(id = %self.id, "world dropped");
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("id", &self.id)
            .field("step", &self.step)
            .field("objects", &self.live)
            .field("modules", &self.modules.len())
            .finish_non_exhaustive()
    }
}

/// Borrowed view of one live object.
#[derive(Clone, Copy)]
pub struct ObjectRef<'a> {
    object: &'a Object,
    physics: &'a dyn PhysicsBackend,
}

impl<'a> ObjectRef<'a> {
    pub fn id(&self) -> ObjectId {
        self.object.id()
    }

    pub fn kind(&self) -> &'a str {
        self.object.kind()
    }

    pub fn object(&self) -> &'a Object {
        self.object
    }

    pub fn shape(&self) -> &'a Shape {
        self.object.shape()
    }

    pub fn behavior_as<T: 'static>(&self) -> Option<&'a T> {
        self.object.behavior_as::<T>()
    }

    pub fn transform(&self) -> Result<Transform, PhysicsError> {
        self.object.transform(self.physics)
    }

    pub fn position(&self) -> Result<Vec3, PhysicsError> {
        self.object.position(self.physics)
    }

    pub fn velocity(&self) -> Result<Vec3, PhysicsError> {
        self.physics.velocity(self.object.body())
    }
}
