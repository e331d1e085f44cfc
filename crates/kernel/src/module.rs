//! World modules: world-level behaviour that runs once per step before any
//! object updates, such as feeding new cells into the world.
//!
//! Modules do not own objects. They ask for objects to be created, which
//! happens right after the module phase so the new objects take part in the
//! same step, or destroyed, which happens when the step commits.

use crate::error::ObjectError;
use crate::kinds::{ObjectArgs, ObjectKindRegistry, ParamReader};
use crate::rng::SimRng;
use crate::world::{ObjectRef, World, WorldSettings};
use cellsim_common::ObjectId;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

pub trait WorldModule: Send + fmt::Debug {
    /// Registered module name.
    fn name(&self) -> &str;

    /// Check references to other registrations, e.g. the object kind a
    /// module creates. Called once when the module is added to a world.
    fn validate(&self, _kinds: &ObjectKindRegistry) -> Result<(), ObjectError> {
        Ok(())
    }

    fn update(&mut self, ctx: &mut ModuleContext<'_>);

    fn clone_box(&self) -> Box<dyn WorldModule>;

    fn as_any(&self) -> &dyn Any;
}

impl Clone for Box<dyn WorldModule> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Construction arguments for a module: the object kind it works with, if
/// any, plus numeric parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleArgs {
    pub object_kind: Option<String>,
    pub params: BTreeMap<String, f64>,
}

impl ModuleArgs {
    pub fn of(object_kind: impl Into<String>) -> Self {
        Self {
            object_kind: Some(object_kind.into()),
            ..Self::default()
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: f64) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    pub fn reader<'a>(&'a self, module: &'a str) -> ParamReader<'a> {
        ParamReader::new(module, &self.params)
    }

    pub fn require_object_kind(&self, module: &str) -> Result<&str, ObjectError> {
        self.object_kind.as_deref().ok_or_else(|| ObjectError::InvalidParameter {
            kind: module.to_string(),
            param: "kind".to_string(),
            reason: "is required".to_string(),
        })
    }
}

/// An object a module wants created.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateRequest {
    pub kind: String,
    pub args: ObjectArgs,
}

/// What a module sees while it updates: the world as it was at the start of
/// the step, the world's random source and the request queues.
pub struct ModuleContext<'a> {
    pub dt: f32,
    /// Number of the step being computed.
    pub step: u64,
    world: &'a World,
    rng: &'a mut SimRng,
    creates: &'a mut Vec<CreateRequest>,
    destroys: &'a mut Vec<ObjectId>,
}

impl<'a> ModuleContext<'a> {
    pub(crate) fn new(
        dt: f32,
        step: u64,
        world: &'a World,
        rng: &'a mut SimRng,
        creates: &'a mut Vec<CreateRequest>,
        destroys: &'a mut Vec<ObjectId>,
    ) -> Self {
        Self {
            dt,
            step,
            world,
            rng,
            creates,
            destroys,
        }
    }

    pub fn settings(&self) -> &WorldSettings {
        self.world.settings()
    }

    pub fn objects(&self) -> impl Iterator<Item = ObjectRef<'a>> + Clone + 'a {
        self.world.objects()
    }

    pub fn object_count(&self) -> usize {
        self.world.object_count()
    }

    pub fn rng(&mut self) -> &mut SimRng {
        &mut *self.rng
    }

    /// Queue a new object of a registered kind.
    pub fn create(&mut self, kind: impl Into<String>, args: ObjectArgs) {
        self.creates.push(CreateRequest {
            kind: kind.into(),
            args,
        });
    }

    /// Queue an object for removal when the step commits.
    pub fn destroy(&mut self, id: ObjectId) {
        self.destroys.push(id);
    }
}
