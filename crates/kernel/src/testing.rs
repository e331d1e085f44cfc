//! Test doubles shared by the kernel's unit tests.

use crate::kinds::{ObjectArgs, ObjectKindRegistry};
use crate::module::{ModuleArgs, ModuleContext, WorldModule};
use crate::object::{ObjectBehavior, UpdateContext};
use crate::world::{World, WorldSettings};
use cellsim_common::Transform;
use cellsim_physics::{BodyDesc, BodyHandle, PhysicsBackend, PhysicsError, Shape};
use glam::Vec3;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Default)]
struct ControlState {
    reject_bodies: AtomicBool,
    fail_steps: AtomicBool,
    shape_updates: AtomicUsize,
    steps: AtomicUsize,
    bodies: AtomicUsize,
    step_delay_ms: AtomicU64,
}

/// Knobs and counters of a [`FakePhysics`], usable after the backend moved
/// into a world or onto the step thread.
#[derive(Clone, Default)]
pub(crate) struct FakeControl {
    state: Arc<ControlState>,
}

impl FakeControl {
    pub fn reject_bodies(&self, on: bool) {
        self.state.reject_bodies.store(on, Ordering::SeqCst);
    }

    pub fn fail_steps(&self, on: bool) {
        self.state.fail_steps.store(on, Ordering::SeqCst);
    }

    pub fn step_delay(&self, delay: Duration) {
        self.state
            .step_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn shape_updates(&self) -> usize {
        self.state.shape_updates.load(Ordering::SeqCst)
    }

    pub fn steps(&self) -> usize {
        self.state.steps.load(Ordering::SeqCst)
    }

    /// Allocated bodies, readable after the backend was dropped.
    pub fn bodies(&self) -> usize {
        self.state.bodies.load(Ordering::SeqCst)
    }
}

struct FakeBody {
    transform: Transform,
    velocity: Vec3,
    registered: bool,
}

/// Minimal backend: bodies move by `velocity * dt`, no contacts.
pub(crate) struct FakePhysics {
    bodies: BTreeMap<BodyHandle, FakeBody>,
    next: u64,
    control: FakeControl,
}

impl FakePhysics {
    pub fn new() -> (Self, FakeControl) {
        let control = FakeControl::default();
        let physics = Self {
            bodies: BTreeMap::new(),
            next: 0,
            control: control.clone(),
        };
        (physics, control)
    }

    fn body(&self, handle: BodyHandle) -> Result<&FakeBody, PhysicsError> {
        self.bodies.get(&handle).ok_or(PhysicsError::UnknownBody(handle))
    }

    fn body_mut(&mut self, handle: BodyHandle) -> Result<&mut FakeBody, PhysicsError> {
        self.bodies
            .get_mut(&handle)
            .ok_or(PhysicsError::UnknownBody(handle))
    }
}

impl PhysicsBackend for FakePhysics {
    fn create_body(&mut self, desc: BodyDesc) -> Result<BodyHandle, PhysicsError> {
        if self.control.state.reject_bodies.load(Ordering::SeqCst) {
            return Err(PhysicsError::InvalidBody("rejected by fake".into()));
        }
        self.next += 1;
        let handle = BodyHandle(self.next);
        self.bodies.insert(
            handle,
            FakeBody {
                transform: desc.transform,
                velocity: desc.velocity,
                registered: false,
            },
        );
        self.control.state.bodies.fetch_add(1, Ordering::SeqCst);
        Ok(handle)
    }

    fn register_body(&mut self, handle: BodyHandle) -> Result<(), PhysicsError> {
        let body = self.body_mut(handle)?;
        if body.registered {
            return Err(PhysicsError::AlreadyRegistered(handle));
        }
        body.registered = true;
        Ok(())
    }

    fn unregister_body(&mut self, handle: BodyHandle) -> Result<(), PhysicsError> {
        let body = self.body_mut(handle)?;
        if !body.registered {
            return Err(PhysicsError::NotRegistered(handle));
        }
        body.registered = false;
        Ok(())
    }

    fn release_body(&mut self, handle: BodyHandle) -> Result<(), PhysicsError> {
        if self.body(handle)?.registered {
            return Err(PhysicsError::StillRegistered(handle));
        }
        self.bodies.remove(&handle);
        self.control.state.bodies.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    fn transform(&self, handle: BodyHandle) -> Result<Transform, PhysicsError> {
        Ok(self.body(handle)?.transform)
    }

    fn set_transform(&mut self, handle: BodyHandle, transform: Transform) -> Result<(), PhysicsError> {
        self.body_mut(handle)?.transform = transform;
        Ok(())
    }

    fn velocity(&self, handle: BodyHandle) -> Result<Vec3, PhysicsError> {
        Ok(self.body(handle)?.velocity)
    }

    fn set_velocity(&mut self, handle: BodyHandle, velocity: Vec3) -> Result<(), PhysicsError> {
        self.body_mut(handle)?.velocity = velocity;
        Ok(())
    }

    fn set_shape(&mut self, handle: BodyHandle, _shape: &Shape, _density: f32) -> Result<(), PhysicsError> {
        self.body(handle)?;
        self.control.state.shape_updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn step(&mut self, dt: f32) -> Result<(), PhysicsError> {
        let delay = self.control.state.step_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }
        if self.control.state.fail_steps.load(Ordering::SeqCst) {
            return Err(PhysicsError::Backend("injected step failure".into()));
        }
        for body in self.bodies.values_mut().filter(|b| b.registered) {
            body.transform.position += body.velocity * dt;
        }
        self.control.state.steps.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_registered(&self, handle: BodyHandle) -> bool {
        self.bodies.get(&handle).is_some_and(|b| b.registered)
    }

    fn registered_count(&self) -> usize {
        self.bodies.values().filter(|b| b.registered).count()
    }

    fn body_count(&self) -> usize {
        self.bodies.len()
    }
}

/// Sphere whose radius grows by `dt` every update.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Probe {
    pub radius: f32,
}

impl Probe {
    pub const KIND: &'static str = "probe";

    pub fn new(radius: f32) -> Self {
        Self { radius }
    }
}

impl ObjectBehavior for Probe {
    fn kind(&self) -> &str {
        Self::KIND
    }

    fn shape(&self) -> Shape {
        Shape::sphere(self.radius)
    }

    fn update(&mut self, ctx: &mut UpdateContext<'_>) {
        self.radius += ctx.dt;
    }

    fn clone_box(&self) -> Box<dyn ObjectBehavior> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Spawns one probe next to itself on every update.
#[derive(Debug, Clone)]
pub(crate) struct Spawner;

impl Spawner {
    pub const KIND: &'static str = "spawner";
}

impl ObjectBehavior for Spawner {
    fn kind(&self) -> &str {
        Self::KIND
    }

    fn shape(&self) -> Shape {
        Shape::sphere(1.0)
    }

    fn update(&mut self, ctx: &mut UpdateContext<'_>) {
        let at = Transform::from_position(ctx.transform.position + Vec3::X * 3.0);
        ctx.spawn(Box::new(Probe::new(1.0)), at, Vec3::ZERO);
    }

    fn clone_box(&self) -> Box<dyn ObjectBehavior> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Panics on its first update.
#[derive(Debug, Clone)]
pub(crate) struct Bomb;

impl ObjectBehavior for Bomb {
    fn kind(&self) -> &str {
        "bomb"
    }

    fn shape(&self) -> Shape {
        Shape::sphere(1.0)
    }

    fn update(&mut self, _ctx: &mut UpdateContext<'_>) {
        panic!("bomb went off");
    }

    fn clone_box(&self) -> Box<dyn ObjectBehavior> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Module creating one object of its kind per step, lined up along -x.
#[derive(Debug, Clone)]
pub(crate) struct Feeder {
    pub kind: String,
    pub created: u32,
}

impl Feeder {
    pub const NAME: &'static str = "feeder";

    pub fn of(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            created: 0,
        }
    }
}

impl WorldModule for Feeder {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn validate(&self, kinds: &ObjectKindRegistry) -> Result<(), crate::ObjectError> {
        if kinds.contains(&self.kind) {
            Ok(())
        } else {
            Err(crate::ObjectError::UnknownKind(self.kind.clone()))
        }
    }

    fn update(&mut self, ctx: &mut ModuleContext<'_>) {
        self.created += 1;
        let x = -(self.created as f32) * 3.0;
        ctx.create(self.kind.clone(), ObjectArgs::at(Vec3::new(x, 0.0, 0.0)));
    }

    fn clone_box(&self) -> Box<dyn WorldModule> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Module asking for every object of one kind to be destroyed.
#[derive(Debug, Clone)]
pub(crate) struct Culler {
    pub kind: String,
}

impl WorldModule for Culler {
    fn name(&self) -> &str {
        "culler"
    }

    fn update(&mut self, ctx: &mut ModuleContext<'_>) {
        let doomed: Vec<_> = ctx.objects().filter(|o| o.kind() == self.kind).map(|o| o.id()).collect();
        for id in doomed {
            ctx.destroy(id);
        }
    }

    fn clone_box(&self) -> Box<dyn WorldModule> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Kinds `probe` (param `radius`) and `spawner`; module `feeder`.
pub(crate) fn test_kinds() -> Arc<ObjectKindRegistry> {
    let mut kinds = ObjectKindRegistry::new();
    kinds.register(Probe::KIND, |args: &ObjectArgs| {
        let mut params = args.reader(Probe::KIND);
        let radius = params.positive("radius", 1.0)?;
        params.finish()?;
        Ok(Box::new(Probe::new(radius)))
    });
    kinds.register(Spawner::KIND, |args: &ObjectArgs| {
        args.reader(Spawner::KIND).finish()?;
        Ok(Box::new(Spawner))
    });
    kinds.register_module(Feeder::NAME, |args: &ModuleArgs| {
        let kind = args.object_kind.as_deref().unwrap_or(Probe::KIND);
        args.reader(Feeder::NAME).finish()?;
        Ok(Box::new(Feeder::of(kind)))
    });
    Arc::new(kinds)
}

/// Empty world over a fresh [`FakePhysics`].
pub(crate) fn fake_world(settings: WorldSettings) -> (World, FakeControl) {
    let (physics, control) = FakePhysics::new();
    (World::new(settings, test_kinds(), Box::new(physics)), control)
}
