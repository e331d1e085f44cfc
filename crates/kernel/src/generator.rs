//! `object-generator` module: feeds new objects into the world.
//!
//! Each step it creates one object of its kind with the given probability,
//! at a uniformly random point of a box. Without an explicit box it uses a
//! slab along the world's -x face, so new objects enter from that side.

use crate::error::ObjectError;
use crate::kinds::{ObjectArgs, ObjectKindRegistry};
use crate::module::{ModuleArgs, ModuleContext, WorldModule};
use glam::Vec3;
use rand::Rng;
use std::any::Any;

const BOX_PARAMS: [&str; 6] = ["min_x", "min_y", "min_z", "max_x", "max_y", "max_z"];

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectGenerator {
    pub object_kind: String,
    /// Chance of creating an object in one step.
    pub probability: f32,
    /// Spawn box; `None` derives it from the world size at update time.
    pub region: Option<(Vec3, Vec3)>,
}

impl ObjectGenerator {
    pub const NAME: &'static str = "object-generator";

    pub fn new(object_kind: impl Into<String>, probability: f32) -> Self {
        Self {
            object_kind: object_kind.into(),
            probability,
            region: None,
        }
    }

    pub fn from_args(args: &ModuleArgs) -> Result<Self, ObjectError> {
        let object_kind = args.require_object_kind(Self::NAME)?.to_string();
        let mut params = args.reader(Self::NAME);
        let probability = params.non_negative("probability", 1.0)?;
        if probability > 1.0 {
            return Err(invalid("probability", format!("must not exceed 1, got {probability}")));
        }

        let given = BOX_PARAMS.iter().filter(|p| args.params.contains_key(**p)).count();
        let region = match given {
            0 => None,
            6 => {
                let mut c = [0.0f32; 6];
                for (value, name) in c.iter_mut().zip(BOX_PARAMS) {
                    *value = params.finite(name, 0.0)?;
                }
                let (min, max) = (Vec3::new(c[0], c[1], c[2]), Vec3::new(c[3], c[4], c[5]));
                if min.cmpgt(max).any() {
                    return Err(invalid("min_x", format!("box minimum {min} exceeds maximum {max}")));
                }
                Some((min, max))
            }
            _ => return Err(invalid("min_x", "box needs all of min_x..max_z or none")),
        };
        params.finish()?;

        Ok(Self {
            object_kind,
            probability,
            region,
        })
    }

    pub fn with_region(mut self, min: Vec3, max: Vec3) -> Self {
        self.region = Some((min, max));
        self
    }

    /// Slab just inside the -x face, covering the inner 80% of y, at z = 0.
    pub fn default_region(size: Vec3) -> (Vec3, Vec3) {
        let half = size * 0.5;
        (
            Vec3::new(-half.x, -0.8 * half.y, 0.0),
            Vec3::new(-0.95 * half.x, 0.8 * half.y, 0.0),
        )
    }

    pub fn register(kinds: &mut ObjectKindRegistry) {
        kinds.register_module(Self::NAME, |args: &ModuleArgs| {
            Ok(Box::new(Self::from_args(args)?))
        });
    }
}

fn invalid(param: &str, reason: impl Into<String>) -> ObjectError {
    ObjectError::InvalidParameter {
        kind: ObjectGenerator::NAME.to_string(),
        param: param.to_string(),
        reason: reason.into(),
    }
}

fn uniform(rng: &mut impl Rng, min: f32, max: f32) -> f32 {
    if min < max { rng.random_range(min..=max) } else { min }
}

impl WorldModule for ObjectGenerator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn validate(&self, kinds: &ObjectKindRegistry) -> Result<(), ObjectError> {
        if kinds.contains(&self.object_kind) {
            Ok(())
        } else {
            Err(ObjectError::UnknownKind(self.object_kind.clone()))
        }
    }

    fn update(&mut self, ctx: &mut ModuleContext<'_>) {
        if !(self.probability > 0.0) {
            return;
        }
        let chance = f64::from(self.probability.min(1.0));
        if !ctx.rng().random_bool(chance) {
            return;
        }
        let (min, max) = self
            .region
            .unwrap_or_else(|| Self::default_region(ctx.settings().size));
        let rng = ctx.rng();
        let position = Vec3::new(
            uniform(rng, min.x, max.x),
            uniform(rng, min.y, max.y),
            uniform(rng, min.z, max.z),
        );
        tracing::trace!(kind = %self.object_kind, %position, "generating object");
        ctx.create(self.object_kind.clone(), ObjectArgs::at(position));
    }

    fn clone_box(&self) -> Box<dyn WorldModule> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
