//! Native scenario documents in JSON or YAML.
//!
//! ```yaml
//! world:
//!   seed: 7
//!   time_step: 0.5
//! objects:
//!   - kind: yeast
//!     position: [0, 0, 0]
//!     params: { volume: 40 }
//!   - kind: barrier
//!     position: [0, -30, 0]
//!     rotation: [0, 0, 15]
//!     params: { width: 200, height: 4, depth: 50 }
//! modules:
//!   - name: object-generator
//!     kind: yeast
//!     params: { probability: 0.05 }
//! ```

use crate::error::SourceError;
use crate::factory::{BuildEnv, WorldFactory};
use cellsim_kernel::{ModuleArgs, ObjectArgs, World, WorldSettings};
use glam::{EulerRot, Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One object to place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectSpec {
    pub kind: String,
    pub position: Vec3,
    /// Euler angles in degrees, applied X then Y then Z.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity: Option<Vec3>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, f64>,
}

impl ObjectSpec {
    pub fn args(&self) -> ObjectArgs {
        let mut args = ObjectArgs::at(self.position);
        if let Some(deg) = self.rotation {
            args.transform.rotation = Quat::from_euler(
                EulerRot::XYZ,
                deg.x.to_radians(),
                deg.y.to_radians(),
                deg.z.to_radians(),
            );
        }
        args.velocity = self.velocity.unwrap_or(Vec3::ZERO);
        args.params = self.params.clone();
        args
    }
}

/// One world module to install.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleSpec {
    pub name: String,
    /// Object kind the module works with, for modules that need one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, f64>,
}

impl ModuleSpec {
    pub fn args(&self) -> ModuleArgs {
        ModuleArgs {
            object_kind: self.kind.clone(),
            params: self.params.clone(),
        }
    }
}

/// A complete scenario document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default)]
    pub world: WorldSettings,
    #[serde(default)]
    pub objects: Vec<ObjectSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modules: Vec<ModuleSpec>,
}

impl Scenario {
    /// Create the world and every object in document order, then install the
    /// modules.
    pub fn build(&self, env: &BuildEnv) -> Result<World, SourceError> {
        let mut world = env.new_world(self.world.clone());
        for (index, spec) in self.objects.iter().enumerate() {
            world
                .create_object(&spec.kind, &spec.args())
                .map_err(|source| SourceError::Object {
                    context: format!("object #{index} ({})", spec.kind),
                    source,
                })?;
        }
        for (index, spec) in self.modules.iter().enumerate() {
            world
                .create_module(&spec.name, &spec.args())
                .map_err(|source| SourceError::Object {
                    context: format!("module #{index} ({})", spec.name),
                    source,
                })?;
        }
        Ok(world)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

/// Factory for [`Scenario`] documents.
#[derive(Debug, Clone, Copy)]
pub struct ScenarioFactory {
    format: Format,
}

impl ScenarioFactory {
    pub fn json() -> Self {
        Self { format: Format::Json }
    }

    pub fn yaml() -> Self {
        Self { format: Format::Yaml }
    }

    pub fn parse(&self, source: &str) -> Result<Scenario, SourceError> {
        match self.format {
            Format::Json => serde_json::from_str(source).map_err(|e| SourceError::parse(self.name(), e)),
            Format::Yaml => serde_yaml::from_str(source).map_err(|e| SourceError::parse(self.name(), e)),
        }
    }
}

impl WorldFactory for ScenarioFactory {
    fn name(&self) -> &str {
        match self.format {
            Format::Json => "json",
            Format::Yaml => "yaml",
        }
    }

    fn extensions(&self) -> &[&str] {
        match self.format {
            Format::Json => &["json"],
            Format::Yaml => &["yaml", "yml"],
        }
    }

    fn create_world_from_source(&self, source: &str, env: &BuildEnv) -> Result<World, SourceError> {
        let text = env.substitute(source)?;
        let scenario = self.parse(&text)?;
        let world = scenario.build(env)?;
        tracing::debug!(
            factory = self.name(),
            objects = world.object_count(),
            modules = world.module_count(),
            "scenario built"
        );
        Ok(world)
    }
}
