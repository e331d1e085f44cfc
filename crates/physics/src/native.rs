use crate::backend::{BodyDesc, BodyHandle, BodyKind, PhysicsBackend, PhysicsError};
use crate::shape::{Shape, ShapePrimitive};
use cellsim_common::Transform;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const EPSILON: f32 = 1e-6;

/// Solver parameters for [`NativePhysics`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NativePhysicsConfig {
    /// Constant acceleration applied to dynamic bodies (µm/s²).
    pub gravity: Vec3,
    /// Velocity decay per second, modelling drag of the surrounding medium.
    pub linear_damping: f32,
    /// Overlap resolution passes per step.
    pub contact_iterations: u32,
}

impl Default for NativePhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::ZERO,
            linear_damping: 0.0,
            contact_iterations: 4,
        }
    }
}

#[derive(Debug, Clone)]
struct Body {
    kind: BodyKind,
    transform: Transform,
    velocity: Vec3,
    shape: Shape,
    inv_mass: f32,
    registered: bool,
}

impl Body {
    fn new(desc: BodyDesc) -> Self {
        let inv_mass = inverse_mass(desc.kind, &desc.shape, desc.density);
        Self {
            kind: desc.kind,
            transform: desc.transform,
            velocity: desc.velocity,
            shape: desc.shape,
            inv_mass,
            registered: false,
        }
    }
}

fn inverse_mass(kind: BodyKind, shape: &Shape, density: f32) -> f32 {
    match kind {
        BodyKind::Static => 0.0,
        BodyKind::Dynamic => {
            let mass = density * shape.volume();
            if mass > 0.0 { 1.0 / mass } else { 0.0 }
        }
    }
}

/// Rigid-body adapter over a small built-in solver.
///
/// Registered dynamic bodies are integrated with semi-implicit Euler and then
/// pushed apart where their shapes overlap. Bodies that never receive a
/// velocity, gravity or a contact stay exactly where they are.
#[derive(Debug, Default)]
pub struct NativePhysics {
    config: NativePhysicsConfig,
    bodies: BTreeMap<BodyHandle, Body>,
    next_handle: u64,
    registered: usize,
}

impl NativePhysics {
    pub fn new(config: NativePhysicsConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &NativePhysicsConfig {
        &self.config
    }

    fn body(&self, handle: BodyHandle) -> Result<&Body, PhysicsError> {
        self.bodies.get(&handle).ok_or(PhysicsError::UnknownBody(handle))
    }

    fn body_mut(&mut self, handle: BodyHandle) -> Result<&mut Body, PhysicsError> {
        self.bodies
            .get_mut(&handle)
            .ok_or(PhysicsError::UnknownBody(handle))
    }
}

/// Working copy of one registered body during a step.
struct Staged {
    handle: BodyHandle,
    transform: Transform,
    velocity: Vec3,
    inv_mass: f32,
}

impl PhysicsBackend for NativePhysics {
    fn create_body(&mut self, desc: BodyDesc) -> Result<BodyHandle, PhysicsError> {
        desc.shape.validate().map_err(PhysicsError::InvalidShape)?;
        if !desc.transform.is_finite() || !desc.velocity.is_finite() {
            return Err(PhysicsError::InvalidBody("transform and velocity must be finite".into()));
        }
        if !(desc.density.is_finite() && desc.density > 0.0) {
            return Err(PhysicsError::InvalidBody(format!(
                "density must be positive, got {}",
                desc.density
            )));
        }
        self.next_handle += 1;
        let handle = BodyHandle(self.next_handle);
        self.bodies.insert(handle, Body::new(desc));
        tracing::trace!(%handle, "body created");
        Ok(handle)
    }

    fn register_body(&mut self, handle: BodyHandle) -> Result<(), PhysicsError> {
        let body = self.body_mut(handle)?;
        if body.registered {
            return Err(PhysicsError::AlreadyRegistered(handle));
        }
        body.registered = true;
        self.registered += 1;
        Ok(())
    }

    fn unregister_body(&mut self, handle: BodyHandle) -> Result<(), PhysicsError> {
        let body = self.body_mut(handle)?;
        if !body.registered {
            return Err(PhysicsError::NotRegistered(handle));
        }
        body.registered = false;
        self.registered -= 1;
        Ok(())
    }

    fn release_body(&mut self, handle: BodyHandle) -> Result<(), PhysicsError> {
        if self.body(handle)?.registered {
            return Err(PhysicsError::StillRegistered(handle));
        }
        self.bodies.remove(&handle);
        tracing::trace!(%handle, "body released");
        Ok(())
    }

    fn transform(&self, handle: BodyHandle) -> Result<Transform, PhysicsError> {
        Ok(self.body(handle)?.transform)
    }

    fn set_transform(&mut self, handle: BodyHandle, transform: Transform) -> Result<(), PhysicsError> {
        if !transform.is_finite() {
            return Err(PhysicsError::InvalidBody("transform must be finite".into()));
        }
        self.body_mut(handle)?.transform = transform;
        Ok(())
    }

    fn velocity(&self, handle: BodyHandle) -> Result<Vec3, PhysicsError> {
        Ok(self.body(handle)?.velocity)
    }

    fn set_velocity(&mut self, handle: BodyHandle, velocity: Vec3) -> Result<(), PhysicsError> {
        if !velocity.is_finite() {
            return Err(PhysicsError::InvalidBody("velocity must be finite".into()));
        }
        self.body_mut(handle)?.velocity = velocity;
        Ok(())
    }

    fn set_shape(&mut self, handle: BodyHandle, shape: &Shape, density: f32) -> Result<(), PhysicsError> {
        shape.validate().map_err(PhysicsError::InvalidShape)?;
        if !(density.is_finite() && density > 0.0) {
            return Err(PhysicsError::InvalidBody(format!(
                "density must be positive, got {density}"
            )));
        }
        let body = self.body_mut(handle)?;
        body.inv_mass = inverse_mass(body.kind, shape, density);
        body.shape = shape.clone();
        Ok(())
    }

    fn step(&mut self, dt: f32) -> Result<(), PhysicsError> {
        if !(dt.is_finite() && dt >= 0.0) {
            return Err(PhysicsError::Backend(format!("invalid time step {dt}")));
        }

        let mut staged: Vec<Staged> = self
            .bodies
            .iter()
            .filter(|(_, b)| b.registered)
            .map(|(&handle, b)| Staged {
                handle,
                transform: b.transform,
                velocity: b.velocity,
                inv_mass: b.inv_mass,
            })
            .collect();

        let damping = 1.0 / (1.0 + self.config.linear_damping.max(0.0) * dt);
        for s in staged.iter_mut().filter(|s| s.inv_mass > 0.0) {
            s.velocity = (s.velocity + self.config.gravity * dt) * damping;
            s.transform.position += s.velocity * dt;
        }

        for _ in 0..self.config.contact_iterations {
            resolve_contacts(&mut staged, &self.bodies);
        }

        // Commit only a fully finite state.
        if let Some(bad) = staged
            .iter()
            .find(|s| !s.transform.is_finite() || !s.velocity.is_finite())
        {
            return Err(PhysicsError::Diverged(bad.handle));
        }
        for s in staged {
            if let Some(body) = self.bodies.get_mut(&s.handle) {
                body.transform = s.transform;
                body.velocity = s.velocity;
            }
        }
        tracing::trace!(dt, bodies = self.registered, "physics step");
        Ok(())
    }

    fn is_registered(&self, handle: BodyHandle) -> bool {
        self.bodies.get(&handle).is_some_and(|b| b.registered)
    }

    fn registered_count(&self) -> usize {
        self.registered
    }

    fn body_count(&self) -> usize {
        self.bodies.len()
    }
}

/// A shape part resolved into world space.
#[derive(Clone, Copy)]
struct WorldPart {
    center: Vec3,
    rotation: Quat,
    primitive: ShapePrimitive,
}

fn world_parts(transform: &Transform, shape: &Shape) -> Vec<WorldPart> {
    shape
        .parts()
        .iter()
        .map(|p| WorldPart {
            center: transform.apply(p.offset),
            rotation: transform.rotation,
            primitive: p.primitive,
        })
        .collect()
}

fn resolve_contacts(staged: &mut [Staged], bodies: &BTreeMap<BodyHandle, Body>) {
    for i in 0..staged.len() {
        for j in (i + 1)..staged.len() {
            let inv_total = staged[i].inv_mass + staged[j].inv_mass;
            if inv_total <= 0.0 {
                continue;
            }
            let (Some(body_a), Some(body_b)) =
                (bodies.get(&staged[i].handle), bodies.get(&staged[j].handle))
            else {
                continue;
            };
            let reach = body_a.shape.bounding_radius() + body_b.shape.bounding_radius();
            let gap = staged[j].transform.position - staged[i].transform.position;
            if gap.length_squared() > reach * reach {
                continue;
            }

            let parts_a = world_parts(&staged[i].transform, &body_a.shape);
            let parts_b = world_parts(&staged[j].transform, &body_b.shape);
            let mut push = Vec3::ZERO;
            for a in &parts_a {
                for b in &parts_b {
                    if let Some((normal, depth)) = contact(a, b) {
                        push += normal * depth;
                    }
                }
            }
            if push == Vec3::ZERO {
                continue;
            }
            let share_a = staged[i].inv_mass / inv_total;
            let share_b = staged[j].inv_mass / inv_total;
            staged[i].transform.position -= push * share_a;
            staged[j].transform.position += push * share_b;
        }
    }
}

/// Penetration between two parts as (normal from `a` to `b`, depth).
fn contact(a: &WorldPart, b: &WorldPart) -> Option<(Vec3, f32)> {
    match (a.primitive, b.primitive) {
        (ShapePrimitive::Sphere { radius: ra }, ShapePrimitive::Sphere { radius: rb }) => {
            let d = b.center - a.center;
            let dist = d.length();
            let depth = ra + rb - dist;
            if depth <= 0.0 {
                return None;
            }
            let normal = if dist > EPSILON { d / dist } else { Vec3::X };
            Some((normal, depth))
        }
        (ShapePrimitive::Sphere { radius }, ShapePrimitive::Cuboid { half_extents }) => {
            sphere_box(a.center, radius, b.center, b.rotation, half_extents).map(|(n, d)| (-n, d))
        }
        (ShapePrimitive::Cuboid { half_extents }, ShapePrimitive::Sphere { radius }) => {
            sphere_box(b.center, radius, a.center, a.rotation, half_extents)
        }
        // Boxes are barriers; barrier-barrier contacts are not resolved.
        (ShapePrimitive::Cuboid { .. }, ShapePrimitive::Cuboid { .. }) => None,
    }
}

/// Sphere against oriented box; the normal points from the box to the sphere.
fn sphere_box(
    sphere: Vec3,
    radius: f32,
    center: Vec3,
    rotation: Quat,
    half: Vec3,
) -> Option<(Vec3, f32)> {
    let local = rotation.inverse() * (sphere - center);
    let closest = local.clamp(-half, half);
    let diff = local - closest;
    let dist = diff.length();
    if dist > EPSILON {
        if dist >= radius {
            return None;
        }
        return Some((rotation * (diff / dist), radius - dist));
    }

    // Centre inside the box: leave through the nearest face.
    let room = half - local.abs();
    let (axis, depth) = if room.x <= room.y && room.x <= room.z {
        (Vec3::X * local.x.signum(), room.x)
    } else if room.y <= room.z {
        (Vec3::Y * local.y.signum(), room.y)
    } else {
        (Vec3::Z * local.z.signum(), room.z)
    };
    Some((rotation * axis, radius + depth))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere_at(physics: &mut NativePhysics, x: f32, radius: f32) -> BodyHandle {
        let desc = BodyDesc::new(
            BodyKind::Dynamic,
            Transform::from_position(Vec3::new(x, 0.0, 0.0)),
            Shape::sphere(radius),
        );
        let h = physics.create_body(desc).unwrap();
        physics.register_body(h).unwrap();
        h
    }

    #[test]
    fn registration_is_paired() {
        let mut physics = NativePhysics::default();
        let h = physics
            .create_body(BodyDesc::new(BodyKind::Dynamic, Transform::default(), Shape::sphere(1.0)))
            .unwrap();
        assert_eq!(physics.registered_count(), 0);
        physics.register_body(h).unwrap();
        assert_eq!(
            physics.register_body(h),
            Err(PhysicsError::AlreadyRegistered(h))
        );
        assert_eq!(physics.release_body(h), Err(PhysicsError::StillRegistered(h)));
        physics.unregister_body(h).unwrap();
        assert_eq!(physics.unregister_body(h), Err(PhysicsError::NotRegistered(h)));
        physics.release_body(h).unwrap();
        assert_eq!(physics.body_count(), 0);
        assert_eq!(physics.transform(h), Err(PhysicsError::UnknownBody(h)));
    }

    #[test]
    fn resting_body_does_not_move() {
        let mut physics = NativePhysics::default();
        let h = sphere_at(&mut physics, 0.0, 1.0);
        physics.step(1.0).unwrap();
        assert_eq!(physics.transform(h).unwrap().position, Vec3::ZERO);
    }

    #[test]
    fn velocity_integrates_position() {
        let mut physics = NativePhysics::default();
        let h = sphere_at(&mut physics, 0.0, 1.0);
        physics.set_velocity(h, Vec3::new(2.0, 0.0, 0.0)).unwrap();
        physics.step(0.5).unwrap();
        assert!((physics.transform(h).unwrap().position.x - 1.0).abs() < 1e-6);
    }

    #[test]
    fn unregistered_body_is_not_integrated() {
        let mut physics = NativePhysics::default();
        let h = physics
            .create_body(
                BodyDesc::new(BodyKind::Dynamic, Transform::default(), Shape::sphere(1.0))
                    .with_velocity(Vec3::X),
            )
            .unwrap();
        physics.step(1.0).unwrap();
        assert_eq!(physics.transform(h).unwrap().position, Vec3::ZERO);
    }

    #[test]
    fn overlapping_spheres_are_pushed_apart() {
        let mut physics = NativePhysics::default();
        let a = sphere_at(&mut physics, 0.0, 1.0);
        let b = sphere_at(&mut physics, 1.0, 1.0);
        physics.step(0.1).unwrap();
        let pa = physics.transform(a).unwrap().position;
        let pb = physics.transform(b).unwrap().position;
        assert!(pb.x - pa.x > 1.5);
        // Equal masses move symmetrically.
        assert!((pa.x + pb.x - 1.0).abs() < 1e-4);
    }

    #[test]
    fn static_box_holds_its_place() {
        let mut physics = NativePhysics::default();
        let wall = physics
            .create_body(BodyDesc::new(
                BodyKind::Static,
                Transform::default(),
                Shape::cuboid(Vec3::new(1.0, 5.0, 5.0)),
            ))
            .unwrap();
        physics.register_body(wall).unwrap();
        let ball = sphere_at(&mut physics, 1.5, 1.0);
        physics.step(0.1).unwrap();
        assert_eq!(physics.transform(wall).unwrap().position, Vec3::ZERO);
        assert!(physics.transform(ball).unwrap().position.x >= 2.0 - 1e-4);
    }

    #[test]
    fn gravity_and_damping() {
        let mut physics = NativePhysics::new(NativePhysicsConfig {
            gravity: Vec3::new(0.0, -1.0, 0.0),
            linear_damping: 1.0,
            contact_iterations: 1,
        });
        let h = sphere_at(&mut physics, 0.0, 1.0);
        physics.step(1.0).unwrap();
        // v = (0 - 1) / 2, p = v * dt
        assert!((physics.velocity(h).unwrap().y + 0.5).abs() < 1e-6);
        assert!((physics.transform(h).unwrap().position.y + 0.5).abs() < 1e-6);
    }

    #[test]
    fn diverged_step_commits_nothing() {
        let mut physics = NativePhysics::default();
        let slow = sphere_at(&mut physics, 100.0, 1.0);
        let fast = sphere_at(&mut physics, 0.0, 1.0);
        physics.set_velocity(slow, Vec3::X).unwrap();
        physics.set_velocity(fast, Vec3::splat(f32::MAX)).unwrap();
        let err = physics.step(10.0).unwrap_err();
        assert_eq!(err, PhysicsError::Diverged(fast));
        assert_eq!(physics.transform(slow).unwrap().position.x, 100.0);
    }

    #[test]
    fn invalid_inputs_rejected() {
        let mut physics = NativePhysics::default();
        assert!(matches!(
            physics.create_body(BodyDesc::new(BodyKind::Dynamic, Transform::default(), Shape::default())),
            Err(PhysicsError::InvalidShape(_))
        ));
        assert!(matches!(
            physics.create_body(
                BodyDesc::new(BodyKind::Dynamic, Transform::default(), Shape::sphere(1.0))
                    .with_density(0.0)
            ),
            Err(PhysicsError::InvalidBody(_))
        ));
        assert!(physics.step(f32::NAN).is_err());
    }

    #[test]
    fn set_shape_keeps_position() {
        let mut physics = NativePhysics::default();
        let h = sphere_at(&mut physics, 3.0, 1.0);
        physics.set_shape(h, &Shape::sphere(2.0), 1.0).unwrap();
        assert_eq!(physics.transform(h).unwrap().position.x, 3.0);
        assert!(physics.set_shape(h, &Shape::sphere(-1.0), 1.0).is_err());
    }
}
