//! Plugin discovery and loading.
//!
//! Plugins extend a front end with object kinds, world modules and world
//! factories. Built-in plugins ship with this crate; external ones are
//! manifest files found in an ordered list of search directories. A
//! [`PluginRegistry`] finds and loads them, a [`PluginContext`] imports them
//! and collects what they register.

pub mod context;
mod error;
pub mod manifest;
pub mod plugin;
pub mod registry;

pub use context::PluginContext;
pub use error::PluginError;
pub use manifest::{KindPreset, Manifest, ManifestPlugin};
pub use plugin::{
    BUILTIN_PLUGINS, CellPlugin, GeneratorPlugin, ObstaclePlugin, Plugin, Registrar, ScenarioPlugin, ScriptPlugin,
};
pub use registry::PluginRegistry;

pub fn crate_info() -> &'static str {
    "cellsim-plugin v0.1.0"
}
