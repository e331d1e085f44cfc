//! Budding yeast cell.

use crate::error::ObjectError;
use crate::kinds::{ObjectArgs, ObjectKindRegistry};
use crate::object::{ObjectBehavior, UpdateContext};
use cellsim_common::Transform;
use cellsim_common::units::sphere_radius;
use cellsim_physics::{Shape, ShapePrimitive};
use glam::Vec3;
use rand::Rng;
use std::any::Any;
use std::f32::consts::TAU;

/// A bud growing on the mother cell's surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bud {
    /// µm³
    pub volume: f32,
    /// Radians around the mother's local z axis.
    pub angle: f32,
}

impl Bud {
    /// Bud centre in the mother's local frame.
    pub fn offset(&self, mother_volume: f32) -> Vec3 {
        let distance = sphere_radius(mother_volume) + sphere_radius(self.volume);
        Vec3::new(self.angle.sin(), self.angle.cos(), 0.0) * distance
    }
}

/// Yeast cell: grows every step, buds once big enough and releases the bud
/// as a new cell when the bud is mature.
#[derive(Debug, Clone, PartialEq)]
pub struct Yeast {
    /// µm³
    pub volume: f32,
    /// kg/m³
    pub density: f32,
    /// µm³/s, scaled by a random factor each step.
    pub growth_rate: f32,
    pub bud_create_volume: f32,
    pub bud_release_volume: f32,
    pub bud: Option<Bud>,
}

impl Default for Yeast {
    fn default() -> Self {
        Self {
            volume: 37.0,
            density: 1200.0,
            growth_rate: 5.0,
            bud_create_volume: 42.0,
            bud_release_volume: 35.0,
            bud: None,
        }
    }
}

impl Yeast {
    pub const KIND: &'static str = "yeast";

    /// Budding probability per second once the cell is large enough.
    const BUD_CHANCE: f32 = 0.1;

    pub fn from_args(args: &ObjectArgs) -> Result<Self, ObjectError> {
        let base = Self::default();
        let mut params = args.reader(Self::KIND);
        let yeast = Self {
            volume: params.positive("volume", base.volume)?,
            density: params.positive("density", base.density)?,
            growth_rate: params.non_negative("growth_rate", base.growth_rate)?,
            bud_create_volume: params.positive("bud_create_volume", base.bud_create_volume)?,
            bud_release_volume: params.positive("bud_release_volume", base.bud_release_volume)?,
            bud: None,
        };
        params.finish()?;
        Ok(yeast)
    }

    pub fn register(kinds: &mut ObjectKindRegistry) {
        kinds.register(Self::KIND, |args: &ObjectArgs| {
            Ok(Box::new(Self::from_args(args)?))
        });
    }

    pub fn radius(&self) -> f32 {
        sphere_radius(self.volume)
    }

    fn release_bud(&mut self, ctx: &mut UpdateContext<'_>) {
        let Some(bud) = self.bud.take() else {
            return;
        };
        let position = ctx.transform.apply(bud.offset(self.volume));
        let daughter = Self {
            volume: bud.volume,
            bud: None,
            ..self.clone()
        };
        tracing::debug!(volume = bud.volume, ?position, "bud released");
        ctx.spawn(Box::new(daughter), Transform::from_position(position), ctx.velocity);
    }
}

impl ObjectBehavior for Yeast {
    fn kind(&self) -> &str {
        Self::KIND
    }

    fn density(&self) -> f32 {
        self.density
    }

    fn shape(&self) -> Shape {
        let shape = Shape::sphere(self.radius());
        match self.bud {
            Some(bud) if bud.volume > 0.0 => shape.with_part(
                bud.offset(self.volume),
                ShapePrimitive::Sphere {
                    radius: sphere_radius(bud.volume),
                },
            ),
            _ => shape,
        }
    }

    fn update(&mut self, ctx: &mut UpdateContext<'_>) {
        let dt = ctx.dt;
        let growth = dt * self.growth_rate * ctx.rng().random_range(0.1..4.0);
        let release = match self.bud.as_mut() {
            Some(bud) => {
                bud.volume += growth;
                bud.volume >= self.bud_release_volume
            }
            None => {
                self.volume += growth;
                let chance = f64::from((Self::BUD_CHANCE * dt).min(1.0));
                if self.volume >= self.bud_create_volume && ctx.rng().random_bool(chance) {
                    let angle = ctx.rng().random_range(0.0..TAU);
                    self.bud = Some(Bud { volume: 0.0, angle });
                }
                false
            }
        };
        if release {
            self.release_bud(ctx);
        }
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
    use crate::object::SpawnRequest;
    use crate::rng::{SimRng, seeded};

    fn step(yeast: &mut Yeast, dt: f32, rng: &mut SimRng, spawns: &mut Vec<SpawnRequest>) {
        let mut ctx = UpdateContext::new(dt, Transform::default(), Vec3::ZERO, rng, spawns);
        yeast.update(&mut ctx);
    }

    #[test]
    fn defaults_from_empty_args() {
        let yeast = Yeast::from_args(&ObjectArgs::default()).unwrap();
        assert_eq!(yeast, Yeast::default());
        assert!((yeast.radius() - 0.62035 * 37f32.powf(1.0 / 3.0)).abs() < 1e-5);
    }

    #[test]
    fn unknown_param_rejected() {
        let args = ObjectArgs::default().with_param("colour", 1.0);
        assert!(matches!(
            Yeast::from_args(&args),
            Err(ObjectError::UnknownParameter { .. })
        ));
    }

    #[test]
    fn growth_stays_within_bounds() {
        let mut yeast = Yeast::default();
        let mut rng = seeded(11);
        let mut spawns = Vec::new();
        step(&mut yeast, 1.0, &mut rng, &mut spawns);
        let grown = yeast.volume - 37.0;
        assert!(grown >= 0.5 - 1e-4 && grown <= 20.0 + 1e-4, "grew {grown}");
    }

    #[test]
    fn small_cell_never_buds() {
        let mut yeast = Yeast {
            growth_rate: 0.0,
            ..Yeast::default()
        };
        let mut rng = seeded(1);
        let mut spawns = Vec::new();
        for _ in 0..200 {
            step(&mut yeast, 1.0, &mut rng, &mut spawns);
        }
        assert!(yeast.bud.is_none());
        assert_eq!(yeast.volume, 37.0);
    }

    #[test]
    fn large_cell_buds_then_releases() {
        let mut yeast = Yeast {
            volume: 50.0,
            ..Yeast::default()
        };
        let mut rng = seeded(5);
        let mut spawns = Vec::new();
        // dt = 10 makes budding certain on the first step.
        step(&mut yeast, 10.0, &mut rng, &mut spawns);
        assert_eq!(yeast.bud.expect("bud created").volume, 0.0);
        assert_eq!(yeast.shape().parts().len(), 1);

        let mut steps = 0;
        while spawns.is_empty() {
            step(&mut yeast, 1.0, &mut rng, &mut spawns);
            steps += 1;
            assert!(steps < 100, "bud never released");
            if let Some(bud) = yeast.bud {
                assert_eq!(yeast.shape().parts().len(), 2);
                assert!(bud.volume < yeast.bud_release_volume);
            }
        }
        assert!(yeast.bud.is_none());
        assert_eq!(spawns.len(), 1);
        let daughter = spawns[0].behavior.as_any().downcast_ref::<Yeast>().unwrap();
        assert!(daughter.volume >= 35.0);
        assert!(daughter.bud.is_none());
        let placed = spawns[0].transform.position.length();
        let touching = yeast.radius() + daughter.volume.powf(1.0 / 3.0) * 0.62035;
        assert!((placed - touching).abs() < 1e-3, "{placed} vs {touching}");
    }

    #[test]
    fn bud_sits_on_the_surface() {
        let bud = Bud {
            volume: 37.0,
            angle: 0.0,
        };
        let offset = bud.offset(37.0);
        let r = sphere_radius(37.0);
        assert!((offset - Vec3::new(0.0, 2.0 * r, 0.0)).length() < 1e-5);
    }
}
