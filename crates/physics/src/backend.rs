use crate::shape::Shape;
use cellsim_common::Transform;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque reference to a rigid body owned by a backend.
///
/// Handles are never reused while the body they name is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyHandle(pub u64);

impl fmt::Display for BodyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "body:{}", self.0)
    }
}

/// How the solver treats a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BodyKind {
    /// Integrated and pushed by contacts.
    #[default]
    Dynamic,
    /// Never moved by the solver; infinite mass in contacts.
    Static,
}

/// Everything a backend needs to create a body.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyDesc {
    pub kind: BodyKind,
    pub transform: Transform,
    pub velocity: Vec3,
    pub shape: Shape,
    pub density: f32,
}

impl BodyDesc {
    pub fn new(kind: BodyKind, transform: Transform, shape: Shape) -> Self {
        Self {
            kind,
            transform,
            velocity: Vec3::ZERO,
            shape,
            density: 1.0,
        }
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }
}

/// Errors reported by a physics backend.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PhysicsError {
    #[error("unknown {0}")]
    UnknownBody(BodyHandle),
    #[error("{0} is already registered in the dynamics world")]
    AlreadyRegistered(BodyHandle),
    #[error("{0} is not registered in the dynamics world")]
    NotRegistered(BodyHandle),
    #[error("{0} released while still registered")]
    StillRegistered(BodyHandle),
    #[error("invalid shape: {0}")]
    InvalidShape(String),
    #[error("invalid body: {0}")]
    InvalidBody(String),
    #[error("solver diverged on {0}")]
    Diverged(BodyHandle),
    #[error("backend failure: {0}")]
    Backend(String),
}

impl PhysicsError {
    /// Registration pairing was broken by the caller. The registration state
    /// can no longer be trusted once one of these is observed.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Self::AlreadyRegistered(_) | Self::NotRegistered(_) | Self::StillRegistered(_)
        )
    }
}

/// Rigid-body capability injected into a world.
///
/// The world and its objects only talk to physics through this trait, so an
/// adapter over any solver (or a fake in tests) can be plugged in.
pub trait PhysicsBackend: Send {
    /// Allocate a body. It does not take part in the solve until registered.
    fn create_body(&mut self, desc: BodyDesc) -> Result<BodyHandle, PhysicsError>;

    /// Add a body to the dynamics world.
    fn register_body(&mut self, body: BodyHandle) -> Result<(), PhysicsError>;

    /// Remove a body from the dynamics world. The body stays allocated.
    fn unregister_body(&mut self, body: BodyHandle) -> Result<(), PhysicsError>;

    /// Free an unregistered body.
    fn release_body(&mut self, body: BodyHandle) -> Result<(), PhysicsError>;

    fn transform(&self, body: BodyHandle) -> Result<Transform, PhysicsError>;

    fn set_transform(&mut self, body: BodyHandle, transform: Transform) -> Result<(), PhysicsError>;

    fn velocity(&self, body: BodyHandle) -> Result<Vec3, PhysicsError>;

    fn set_velocity(&mut self, body: BodyHandle, velocity: Vec3) -> Result<(), PhysicsError>;

    /// Replace the collision shape. Does not move the body.
    fn set_shape(&mut self, body: BodyHandle, shape: &Shape, density: f32) -> Result<(), PhysicsError>;

    /// Advance every registered body by `dt` seconds.
    fn step(&mut self, dt: f32) -> Result<(), PhysicsError>;

    fn is_registered(&self, body: BodyHandle) -> bool;

    /// Number of bodies currently registered in the dynamics world.
    fn registered_count(&self) -> usize;

    /// Number of allocated bodies, registered or not.
    fn body_count(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairing_errors_are_invariant_violations() {
        let h = BodyHandle(1);
        assert!(PhysicsError::AlreadyRegistered(h).is_invariant_violation());
        assert!(PhysicsError::NotRegistered(h).is_invariant_violation());
        assert!(PhysicsError::StillRegistered(h).is_invariant_violation());
        assert!(!PhysicsError::Diverged(h).is_invariant_violation());
        assert!(!PhysicsError::UnknownBody(h).is_invariant_violation());
    }

    #[test]
    fn body_desc_builder() {
        let desc = BodyDesc::new(BodyKind::Static, Transform::default(), Shape::sphere(1.0))
            .with_velocity(Vec3::X)
            .with_density(2.0);
        assert_eq!(desc.kind, BodyKind::Static);
        assert_eq!(desc.velocity, Vec3::X);
        assert_eq!(desc.density, 2.0);
    }
}
