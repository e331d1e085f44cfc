use crate::error::PluginError;
use crate::manifest::{self, ManifestPlugin};
use crate::plugin::{BUILTIN_PLUGINS, Plugin, builtin};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// Discovers plugins by name across an ordered list of search directories.
///
/// The directory scan runs on the first query and is cached until the
/// search path changes or [`rescan`](Self::rescan) is called. Built-in plugins
/// are always available and shadow a discovered plugin of the same name.
#[derive(Default)]
pub struct PluginRegistry {
    directories: Vec<PathBuf>,
    scanned: OnceLock<BTreeMap<String, PathBuf>>,
    loaded: BTreeMap<String, Arc<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new(directories: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            directories: directories.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn add_directory(&mut self, directory: impl Into<PathBuf>) {
        self.directories.push(directory.into());
        self.scanned = OnceLock::new();
    }

    /// Search path in priority order.
    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    pub fn primary_directory(&self) -> Option<&Path> {
        self.directories.first().map(PathBuf::as_path)
    }

    /// Plugins discovered in the search directories, sorted by name.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.scan().keys().map(String::as_str)
    }

    pub fn builtin_names(&self) -> impl Iterator<Item = &'static str> {
        BUILTIN_PLUGINS.iter().copied()
    }

    /// Manifest path a discovered plugin would load from.
    pub fn location(&self, name: &str) -> Option<&Path> {
        self.scan().get(name).map(PathBuf::as_path)
    }

    pub fn is_available(&self, name: &str) -> bool {
        BUILTIN_PLUGINS.contains(&name) || self.scan().contains_key(name)
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.contains_key(name)
    }

    /// Look a plugin up by exact name and load it, or return the copy loaded
    /// earlier.
    pub fn load(&mut self, name: &str) -> Result<Arc<dyn Plugin>, PluginError> {
        if let Some(plugin) = self.loaded.get(name) {
            return Ok(Arc::clone(plugin));
        }
        let plugin: Arc<dyn Plugin> = match builtin(name) {
            Some(plugin) => plugin,
            None => {
                let path = self
                    .location(name)
                    .ok_or_else(|| PluginError::NotFound(name.to_string()))?
                    .to_path_buf();
                Arc::new(ManifestPlugin::from_file(name, &path)?)
            }
        };
        tracing::debug!(plugin = name, "plugin loaded");
        self.loaded.insert(name.to_string(), Arc::clone(&plugin));
        Ok(plugin)
    }

    /// Forget the cached scan; the next query reads the directories again.
    pub fn rescan(&mut self) {
        self.scanned = OnceLock::new();
    }

    /// Drop every loaded plugin and the scan cache.
    pub fn unload_all(&mut self) {
        if !self.loaded.is_empty() {
            tracing::debug!(count = self.loaded.len(), "plugins unloaded");
        }
        self.loaded.clear();
        self.rescan();
    }

    fn scan(&self) -> &BTreeMap<String, PathBuf> {
        self.scanned.get_or_init(|| {
            let mut found = BTreeMap::new();
            for dir in &self.directories {
                scan_directory(dir, &mut found);
            }
            tracing::debug!(directories = self.directories.len(), plugins = found.len(), "plugin directories scanned");
            found
        })
    }
}

fn scan_directory(dir: &Path, found: &mut BTreeMap<String, PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!(directory = %dir.display(), error = %err, "plugin directory skipped");
            return;
        }
    };
    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    paths.sort();
    for path in paths {
        let Some(name) = manifest::plugin_name(&path) else {
            continue;
        };
        if let Some(first) = found.get(name) {
            tracing::debug!(plugin = name, kept = %first.display(), skipped = %path.display(), "plugin shadowed");
            continue;
        }
        found.insert(name.to_string(), path.clone());
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("directories", &self.directories)
            .field("scanned", &self.scanned.get().is_some())
            .field("loaded", &self.loaded.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = "api_version: 1\n";

    fn plugin_dir(files: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for file in files {
            std::fs::write(dir.path().join(file), MANIFEST).unwrap();
        }
        dir
    }

    #[test]
    fn no_directories_means_no_names() {
        let registry = PluginRegistry::default();
        assert_eq!(registry.names().count(), 0);
        assert!(registry.directories().is_empty());
        assert!(registry.primary_directory().is_none());
    }

    #[test]
    fn scan_finds_manifests_only() {
        let dir = plugin_dir(&["plugin-giants.yaml", "plugin-tiny.json", "notes.txt", "plugin-.yaml"]);
        let registry = PluginRegistry::new([dir.path()]);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["giants", "tiny"]);
        assert_eq!(registry.primary_directory(), Some(dir.path()));
    }

    #[test]
    fn first_directory_wins() {
        let first = plugin_dir(&["plugin-giants.yaml"]);
        let second = plugin_dir(&["plugin-giants.yaml", "plugin-tiny.yaml"]);
        let registry = PluginRegistry::new([first.path(), second.path()]);
        assert_eq!(
            registry.location("giants"),
            Some(first.path().join("plugin-giants.yaml").as_path())
        );
        assert_eq!(
            registry.location("tiny"),
            Some(second.path().join("plugin-tiny.yaml").as_path())
        );
    }

    #[test]
    fn missing_directory_is_skipped() {
        let dir = plugin_dir(&["plugin-giants.yaml"]);
        let registry = PluginRegistry::new([dir.path().join("absent"), dir.path().to_path_buf()]);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["giants"]);
    }

    #[test]
    fn scan_is_cached_until_rescan() {
        let dir = plugin_dir(&["plugin-giants.yaml"]);
        let mut registry = PluginRegistry::new([dir.path()]);
        assert_eq!(registry.names().count(), 1);
        std::fs::write(dir.path().join("plugin-tiny.yaml"), MANIFEST).unwrap();
        assert_eq!(registry.names().count(), 1);
        registry.rescan();
        assert_eq!(registry.names().count(), 2);
    }

    #[test]
    fn adding_a_directory_invalidates_the_scan() {
        let first = plugin_dir(&[]);
        let second = plugin_dir(&["plugin-tiny.yaml"]);
        let mut registry = PluginRegistry::new([first.path()]);
        assert_eq!(registry.names().count(), 0);
        registry.add_directory(second.path());
        assert!(registry.is_available("tiny"));
    }

    #[test]
    fn unknown_plugin_is_not_found() {
        let mut registry = PluginRegistry::default();
        assert!(matches!(
            registry.load("diffusion"),
            Err(PluginError::NotFound(name)) if name == "diffusion"
        ));
    }

    #[test]
    fn loads_are_cached_by_name() {
        let dir = plugin_dir(&["plugin-giants.yaml"]);
        let mut registry = PluginRegistry::new([dir.path()]);
        let a = registry.load("giants").unwrap();
        let b = registry.load("giants").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(registry.is_loaded("giants"));
        registry.unload_all();
        assert!(!registry.is_loaded("giants"));
    }

    #[test]
    fn builtins_shadow_discovered_plugins() {
        let dir = plugin_dir(&["plugin-cell.yaml"]);
        let mut registry = PluginRegistry::new([dir.path()]);
        assert!(registry.names().any(|n| n == "cell"));
        let plugin = registry.load("cell").unwrap();
        assert!(plugin.required_plugins().is_empty());
        assert_eq!(registry.builtin_names().count(), BUILTIN_PLUGINS.len());
    }
}
