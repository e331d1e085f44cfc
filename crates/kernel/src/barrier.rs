//! Static obstacles.

use crate::error::ObjectError;
use crate::kinds::{ObjectArgs, ObjectKindRegistry};
use crate::object::ObjectBehavior;
use cellsim_physics::{BodyKind, Shape};
use glam::Vec3;
use std::any::Any;

/// Immovable box, e.g. a channel wall. Dimensions in µm.
#[derive(Debug, Clone, PartialEq)]
pub struct Barrier {
    pub width: f32,
    pub height: f32,
    pub depth: f32,
}

impl Barrier {
    pub const KIND: &'static str = "barrier";

    pub fn from_args(args: &ObjectArgs) -> Result<Self, ObjectError> {
        let mut params = args.reader(Self::KIND);
        let barrier = Self {
            width: params.positive("width", 10.0)?,
            height: params.positive("height", 10.0)?,
            depth: params.positive("depth", 10.0)?,
        };
        params.finish()?;
        Ok(barrier)
    }

    pub fn register(kinds: &mut ObjectKindRegistry) {
        kinds.register(Self::KIND, |args: &ObjectArgs| {
            Ok(Box::new(Self::from_args(args)?))
        });
    }
}

impl ObjectBehavior for Barrier {
    fn kind(&self) -> &str {
        Self::KIND
    }

    fn body_kind(&self) -> BodyKind {
        BodyKind::Static
    }

    fn shape(&self) -> Shape {
        Shape::cuboid(Vec3::new(self.width, self.height, self.depth) * 0.5)
    }

    fn clone_box(&self) -> Box<dyn ObjectBehavior> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn barrier_is_a_static_box() {
        let args = ObjectArgs::default()
            .with_param("width", 100.0)
            .with_param("height", 4.0)
            .with_param("depth", 2.0);
        let barrier = Barrier::from_args(&args).unwrap();
        assert_eq!(barrier.body_kind(), BodyKind::Static);
        assert_eq!(barrier.shape(), Shape::cuboid(Vec3::new(50.0, 2.0, 1.0)));
    }

    #[test]
    fn zero_width_rejected() {
        let args = ObjectArgs::default().with_param("width", 0.0);
        assert!(Barrier::from_args(&args).is_err());
    }
}
