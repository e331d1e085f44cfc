//! Physics-bound objects.
//!
//! An [`Object`] owns exactly one rigid body. Binding creates the body and
//! registers it; unbinding unregisters it and only then releases it. There is
//! no state in between: an object that exists is bound and registered.

use crate::rng::SimRng;
use cellsim_common::{ObjectId, Transform};
use cellsim_physics::{BodyDesc, BodyHandle, BodyKind, PhysicsBackend, PhysicsError, Shape};
use glam::Vec3;
use std::any::Any;
use std::fmt;

/// Domain behaviour of an object kind (a cell, a barrier, ...).
///
/// Behaviours never touch the physics backend. They evolve their own state in
/// [`ObjectBehavior::update`] and describe the resulting collision shape; the
/// owning [`Object`] pushes shape changes to the body.
pub trait ObjectBehavior: Send + fmt::Debug {
    /// Registered kind name.
    fn kind(&self) -> &str;

    fn body_kind(&self) -> BodyKind {
        BodyKind::Dynamic
    }

    fn density(&self) -> f32 {
        1.0
    }

    /// Collision shape matching the current logical state.
    fn shape(&self) -> Shape;

    /// Evolve logical state by `ctx.dt`.
    fn update(&mut self, _ctx: &mut UpdateContext<'_>) {}

    fn clone_box(&self) -> Box<dyn ObjectBehavior>;

    fn as_any(&self) -> &dyn Any;
}

impl Clone for Box<dyn ObjectBehavior> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// A new object requested by a behaviour during the object phase.
#[derive(Debug)]
pub struct SpawnRequest {
    pub behavior: Box<dyn ObjectBehavior>,
    pub transform: Transform,
    pub velocity: Vec3,
}

/// What a behaviour sees while it updates.
pub struct UpdateContext<'a> {
    pub dt: f32,
    /// Body transform at the start of the step.
    pub transform: Transform,
    pub velocity: Vec3,
    rng: &'a mut SimRng,
    spawns: &'a mut Vec<SpawnRequest>,
}

impl<'a> UpdateContext<'a> {
    pub fn new(
        dt: f32,
        transform: Transform,
        velocity: Vec3,
        rng: &'a mut SimRng,
        spawns: &'a mut Vec<SpawnRequest>,
    ) -> Self {
        Self {
            dt,
            transform,
            velocity,
            rng,
            spawns,
        }
    }

    pub fn rng(&mut self) -> &mut SimRng {
        &mut *self.rng
    }

    /// Queue a new object. It is created after every object has updated and
    /// before the physics solve of the same step.
    pub fn spawn(&mut self, behavior: Box<dyn ObjectBehavior>, transform: Transform, velocity: Vec3) {
        self.spawns.push(SpawnRequest {
            behavior,
            transform,
            velocity,
        });
    }
}

/// A simulated entity bound 1:1 to a registered rigid body.
#[derive(Debug)]
pub struct Object {
    id: ObjectId,
    body: BodyHandle,
    shape: Shape,
    behavior: Box<dyn ObjectBehavior>,
}

impl Object {
    /// Create the body, register it and wrap it. On failure nothing stays
    /// allocated in the backend.
    pub(crate) fn bind(
        id: ObjectId,
        behavior: Box<dyn ObjectBehavior>,
        transform: Transform,
        velocity: Vec3,
        physics: &mut dyn PhysicsBackend,
    ) -> Result<Self, PhysicsError> {
        let shape = behavior.shape();
        let desc = BodyDesc::new(behavior.body_kind(), transform, shape.clone())
            .with_velocity(velocity)
            .with_density(behavior.density());
        let body = physics.create_body(desc)?;
        if let Err(err) = physics.register_body(body) {
            halt_on_violation(&err, body, "register");
            require_paired(physics.release_body(body), body, "release");
            return Err(err);
        }
        tracing::debug!(%id, %body, kind = behavior.kind(), "object bound");
        Ok(Self {
            id,
            body,
            shape,
            behavior,
        })
    }

    /// Unregister the body, then release it.
    pub(crate) fn unbind(self, physics: &mut dyn PhysicsBackend) {
        require_paired(physics.unregister_body(self.body), self.body, "unregister");
        require_paired(physics.release_body(self.body), self.body, "release");
        tracing::debug!(id = %self.id, body = %self.body, kind = self.behavior.kind(), "object unbound");
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn kind(&self) -> &str {
        self.behavior.kind()
    }

    pub fn body(&self) -> BodyHandle {
        self.body
    }

    /// Shape last pushed to the body.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn behavior(&self) -> &dyn ObjectBehavior {
        self.behavior.as_ref()
    }

    /// Downcast the behaviour to a concrete kind.
    pub fn behavior_as<T: 'static>(&self) -> Option<&T> {
        self.behavior.as_any().downcast_ref::<T>()
    }

    pub fn transform(&self, physics: &dyn PhysicsBackend) -> Result<Transform, PhysicsError> {
        physics.transform(self.body)
    }

    pub fn position(&self, physics: &dyn PhysicsBackend) -> Result<Vec3, PhysicsError> {
        Ok(physics.transform(self.body)?.position)
    }

    /// Overwrite the translation only; orientation and velocity are kept.
    pub fn set_position(&self, physics: &mut dyn PhysicsBackend, position: Vec3) -> Result<(), PhysicsError> {
        let mut transform = physics.transform(self.body)?;
        transform.position = position;
        physics.set_transform(self.body, transform)
    }

    /// Run the behaviour, then resize the body to its new shape. The body is
    /// not moved; motion belongs to the physics solve.
    pub(crate) fn update(
        &mut self,
        dt: f32,
        rng: &mut SimRng,
        spawns: &mut Vec<SpawnRequest>,
        physics: &mut dyn PhysicsBackend,
    ) -> Result<(), PhysicsError> {
        let transform = physics.transform(self.body)?;
        let velocity = physics.velocity(self.body)?;
        let mut ctx = UpdateContext::new(dt, transform, velocity, rng, spawns);
        self.behavior.update(&mut ctx);
        self.sync_shape(physics)
    }

    fn sync_shape(&mut self, physics: &mut dyn PhysicsBackend) -> Result<(), PhysicsError> {
        let shape = self.behavior.shape();
        if shape != self.shape {
            physics.set_shape(self.body, &shape, self.behavior.density())?;
            self.shape = shape;
        }
        Ok(())
    }

    /// Snapshot of the logical state, for rolling back a failed step.
    pub(crate) fn snapshot(&self) -> (Box<dyn ObjectBehavior>, Shape) {
        (self.behavior.clone_box(), self.shape.clone())
    }

    pub(crate) fn restore(
        &mut self,
        behavior: Box<dyn ObjectBehavior>,
        shape: Shape,
        physics: &mut dyn PhysicsBackend,
    ) {
        if shape != self.shape {
            if let Err(err) = physics.set_shape(self.body, &shape, behavior.density()) {
                tracing::warn!(id = %self.id, %err, "could not restore shape");
            }
            self.shape = shape;
        }
        self.behavior = behavior;
    }
}

/// Registration state can no longer be trusted: stop here.
fn halt_on_violation(err: &PhysicsError, body: BodyHandle, op: &str) {
    if err.is_invariant_violation() {
        tracing::error!(%body, %err, op, "registration invariant violated");
        panic!("registration invariant violated during {op} of {body}: {err}");
    }
}

/// An owned body must always unregister and release cleanly.
fn require_paired(result: Result<(), PhysicsError>, body: BodyHandle, op: &str) {
    if let Err(err) = result {
        tracing::error!(%body, %err, op, "registration invariant violated");
        panic!("registration invariant violated during {op} of {body}: {err}");
    }
}
