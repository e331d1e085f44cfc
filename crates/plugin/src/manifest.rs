//! Plugins described by a manifest file instead of compiled code.
//!
//! A manifest named `plugin-<name>.yaml` (or `.yml`, `.json`) declares object
//! kind presets: a new kind name built from an existing kind with different
//! default parameters.
//!
//! ```yaml
//! api_version: 1
//! requires: [cell]
//! kinds:
//!   - name: giant-yeast
//!     base: yeast
//!     defaults: { volume: 60, growth_rate: 2 }
//! ```

use crate::error::PluginError;
use crate::plugin::{Plugin, Registrar};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const API_VERSION: u32 = 1;

pub(crate) const FILE_PREFIX: &str = "plugin-";
pub(crate) const FILE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KindPreset {
    pub name: String,
    pub base: String,
    #[serde(default)]
    pub defaults: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub api_version: u32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub kinds: Vec<KindPreset>,
}

/// Plugin name encoded in a manifest file name, if it is one.
pub(crate) fn plugin_name(path: &Path) -> Option<&str> {
    let ext = path.extension()?.to_str()?;
    if !FILE_EXTENSIONS.contains(&ext) {
        return None;
    }
    let name = path.file_stem()?.to_str()?.strip_prefix(FILE_PREFIX)?;
    (!name.is_empty()).then_some(name)
}

#[derive(Debug, Clone)]
pub struct ManifestPlugin {
    name: String,
    path: PathBuf,
    manifest: Manifest,
}

impl ManifestPlugin {
    pub fn from_file(name: &str, path: &Path) -> Result<Self, PluginError> {
        let text = std::fs::read_to_string(path).map_err(|source| PluginError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let invalid = |message: String| PluginError::Manifest {
            path: path.to_path_buf(),
            message,
        };
        let manifest: Manifest = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&text).map_err(|e| invalid(e.to_string()))?,
            _ => serde_yaml::from_str(&text).map_err(|e| invalid(e.to_string()))?,
        };
        if manifest.api_version != API_VERSION {
            return Err(PluginError::UnsupportedApi {
                name: name.to_string(),
                version: manifest.api_version,
                expected: API_VERSION,
            });
        }
        Ok(Self {
            name: name.to_string(),
            path: path.to_path_buf(),
            manifest,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }
}

impl Plugin for ManifestPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_plugins(&self) -> Vec<String> {
        self.manifest.requires.clone()
    }

    fn on_load(&self, registrar: &mut Registrar<'_>) -> Result<(), PluginError> {
        for preset in &self.manifest.kinds {
            let base = registrar
                .kinds()
                .constructor(&preset.base)
                .ok_or_else(|| PluginError::UnknownBaseKind {
                    plugin: self.name.clone(),
                    kind: preset.name.clone(),
                    base: preset.base.clone(),
                })?;
            let defaults = preset.defaults.clone();
            registrar.register_kind(preset.name.clone(), move |args| {
                base(&args.clone().with_defaults(&defaults))
            });
        }
        Ok(())
    }
}
