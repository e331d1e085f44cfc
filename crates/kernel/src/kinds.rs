//! Object kinds by name.
//!
//! Plugins register constructors here; factories and scripts create objects
//! through [`crate::World::create_object`] using the registered names.

use crate::error::ObjectError;
use crate::module::{ModuleArgs, WorldModule};
use crate::object::ObjectBehavior;
use cellsim_common::Transform;
use glam::Vec3;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Constructor of one object kind.
pub type KindConstructor =
    Arc<dyn Fn(&ObjectArgs) -> Result<Box<dyn ObjectBehavior>, ObjectError> + Send + Sync>;

/// Constructor of one world module.
pub type ModuleConstructor =
    Arc<dyn Fn(&ModuleArgs) -> Result<Box<dyn WorldModule>, ObjectError> + Send + Sync>;

/// Construction arguments for an object: placement plus kind-specific
/// numeric parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectArgs {
    pub transform: Transform,
    pub velocity: Vec3,
    pub params: BTreeMap<String, f64>,
}

impl ObjectArgs {
    pub fn at(position: Vec3) -> Self {
        Self {
            transform: Transform::from_position(position),
            ..Default::default()
        }
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: f64) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    /// Fill in parameters the caller did not set.
    pub fn with_defaults(mut self, defaults: &BTreeMap<String, f64>) -> Self {
        for (name, value) in defaults {
            self.params.entry(name.clone()).or_insert(*value);
        }
        self
    }

    pub fn reader<'a>(&'a self, kind: &'a str) -> ParamReader<'a> {
        ParamReader::new(kind, &self.params)
    }
}

/// Validating reader over [`ObjectArgs::params`]. Call [`ParamReader::finish`]
/// once every known parameter was read so typos are reported.
pub struct ParamReader<'a> {
    kind: &'a str,
    params: &'a BTreeMap<String, f64>,
    seen: BTreeSet<&'a str>,
}

impl<'a> ParamReader<'a> {
    /// `kind` names the owner in error messages.
    pub fn new(kind: &'a str, params: &'a BTreeMap<String, f64>) -> Self {
        Self {
            kind,
            params,
            seen: BTreeSet::new(),
        }
    }

    fn raw(&mut self, name: &'a str) -> Option<f64> {
        self.seen.insert(name);
        self.params.get(name).copied()
    }

    fn invalid(&self, name: &str, reason: impl Into<String>) -> ObjectError {
        ObjectError::InvalidParameter {
            kind: self.kind.to_string(),
            param: name.to_string(),
            reason: reason.into(),
        }
    }

    /// Finite value strictly greater than zero.
    pub fn positive(&mut self, name: &'a str, default: f32) -> Result<f32, ObjectError> {
        let value = self.single(name, default)?;
        if value <= 0.0 {
            return Err(self.invalid(name, format!("must be positive, got {value}")));
        }
        Ok(value)
    }

    /// Finite value, zero allowed.
    pub fn non_negative(&mut self, name: &'a str, default: f32) -> Result<f32, ObjectError> {
        let value = self.single(name, default)?;
        if value < 0.0 {
            return Err(self.invalid(name, format!("must not be negative, got {value}")));
        }
        Ok(value)
    }

    /// Any finite value.
    pub fn finite(&mut self, name: &'a str, default: f32) -> Result<f32, ObjectError> {
        self.single(name, default)
    }

    /// The value narrowed to `f32`; out-of-range values are rejected here
    /// rather than surfacing as infinities later.
    fn single(&mut self, name: &'a str, default: f32) -> Result<f32, ObjectError> {
        let raw = self.raw(name).unwrap_or(f64::from(default));
        let value = raw as f32;
        if !value.is_finite() {
            return Err(self.invalid(name, format!("must be a finite single-precision number, got {raw}")));
        }
        Ok(value)
    }

    /// Reject every parameter that was never read.
    pub fn finish(self) -> Result<(), ObjectError> {
        match self.params.keys().find(|k| !self.seen.contains(k.as_str())) {
            Some(unknown) => Err(ObjectError::UnknownParameter {
                kind: self.kind.to_string(),
                param: unknown.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Name → constructor tables shared by every world built from them: object
/// kinds and world modules live in separate namespaces.
#[derive(Clone, Default)]
pub struct ObjectKindRegistry {
    kinds: BTreeMap<String, KindConstructor>,
    modules: BTreeMap<String, ModuleConstructor>,
}

impl ObjectKindRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a kind.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn(&ObjectArgs) -> Result<Box<dyn ObjectBehavior>, ObjectError> + Send + Sync + 'static,
    {
        let name = name.into();
        tracing::debug!(kind = %name, "object kind registered");
        self.kinds.insert(name, Arc::new(constructor));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kinds.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn constructor(&self, name: &str) -> Option<KindConstructor> {
        self.kinds.get(name).cloned()
    }

    /// Build the behaviour of `kind`. No physics is touched here.
    pub fn create(&self, kind: &str, args: &ObjectArgs) -> Result<Box<dyn ObjectBehavior>, ObjectError> {
        let constructor = self
            .kinds
            .get(kind)
            .ok_or_else(|| ObjectError::UnknownKind(kind.to_string()))?;
        constructor(args)
    }

    /// Register (or replace) a world module.
    pub fn register_module<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn(&ModuleArgs) -> Result<Box<dyn WorldModule>, ObjectError> + Send + Sync + 'static,
    {
        let name = name.into();
        tracing::debug!(module = %name, "world module registered");
        self.modules.insert(name, Arc::new(constructor));
    }

    pub fn contains_module(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub fn create_module(&self, name: &str, args: &ModuleArgs) -> Result<Box<dyn WorldModule>, ObjectError> {
        let constructor = self
            .modules
            .get(name)
            .ok_or_else(|| ObjectError::UnknownModule(name.to_string()))?;
        constructor(args)
    }
}

impl fmt::Debug for ObjectKindRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectKindRegistry")
            .field("kinds", &self.kinds.keys().collect::<Vec<_>>())
            .field("modules", &self.modules.keys().collect::<Vec<_>>())
            .finish()
    }
}
