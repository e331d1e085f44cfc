use cellsim_common::units::sphere_volume;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// A single collision primitive in body-local space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ShapePrimitive {
    Sphere { radius: f32 },
    Cuboid { half_extents: Vec3 },
}

impl ShapePrimitive {
    pub fn volume(&self) -> f32 {
        match *self {
            Self::Sphere { radius } => sphere_volume(radius),
            Self::Cuboid { half_extents } => 8.0 * half_extents.x * half_extents.y * half_extents.z,
        }
    }
}

/// A primitive placed at an offset from the body origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapePart {
    pub offset: Vec3,
    pub primitive: ShapePrimitive,
}

/// Compound collision shape of a rigid body.
///
/// A yeast cell with a bud is two spheres; a barrier is one cuboid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    parts: Vec<ShapePart>,
}

impl Shape {
    pub fn sphere(radius: f32) -> Self {
        Self::default().with_part(Vec3::ZERO, ShapePrimitive::Sphere { radius })
    }

    pub fn cuboid(half_extents: Vec3) -> Self {
        Self::default().with_part(Vec3::ZERO, ShapePrimitive::Cuboid { half_extents })
    }

    pub fn with_part(mut self, offset: Vec3, primitive: ShapePrimitive) -> Self {
        self.parts.push(ShapePart { offset, primitive });
        self
    }

    pub fn parts(&self) -> &[ShapePart] {
        &self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Total volume, ignoring overlap between parts.
    pub fn volume(&self) -> f32 {
        self.parts.iter().map(|p| p.primitive.volume()).sum()
    }

    /// Radius of a sphere around the body origin enclosing every part.
    pub fn bounding_radius(&self) -> f32 {
        self.parts
            .iter()
            .map(|p| {
                let extent = match p.primitive {
                    ShapePrimitive::Sphere { radius } => radius,
                    ShapePrimitive::Cuboid { half_extents } => half_extents.length(),
                };
                p.offset.length() + extent
            })
            .fold(0.0, f32::max)
    }

    /// Check that every part has finite, strictly positive dimensions.
    pub fn validate(&self) -> Result<(), String> {
        if self.parts.is_empty() {
            return Err("shape has no parts".into());
        }
        for (i, part) in self.parts.iter().enumerate() {
            if !part.offset.is_finite() {
                return Err(format!("part {i}: offset is not finite"));
            }
            let ok = match part.primitive {
                ShapePrimitive::Sphere { radius } => radius.is_finite() && radius > 0.0,
                ShapePrimitive::Cuboid { half_extents } => {
                    half_extents.is_finite() && half_extents.min_element() > 0.0
                }
            };
            if !ok {
                return Err(format!("part {i}: dimensions must be finite and positive"));
            }
        }
        Ok(())
    }
}
