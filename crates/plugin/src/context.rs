use crate::error::PluginError;
use crate::plugin::{Plugin, Registrar};
use crate::registry::PluginRegistry;
use cellsim_kernel::{ObjectKindRegistry, PhysicsProvider};
use cellsim_loader::{FactoryRegistry, Loader};
use std::fmt;
use std::sync::Arc;

/// The set of plugins imported into one front end, and what they registered.
pub struct PluginContext {
    registry: PluginRegistry,
    kinds: ObjectKindRegistry,
    factories: FactoryRegistry,
    imported: Vec<Arc<dyn Plugin>>,
}

impl PluginContext {
    pub fn new(registry: PluginRegistry) -> Self {
        Self {
            registry,
            kinds: ObjectKindRegistry::new(),
            factories: FactoryRegistry::new(),
            imported: Vec::new(),
        }
    }

    /// Load `name` and its required plugins, then let each register its
    /// kinds and factories. A plugin is imported at most once. On failure
    /// nothing from the failing plugin stays registered.
    pub fn import(&mut self, name: &str) -> Result<(), PluginError> {
        self.import_with(name, &mut Vec::new())
    }

    fn import_with(&mut self, name: &str, pending: &mut Vec<String>) -> Result<(), PluginError> {
        if self.is_imported(name) {
            return Ok(());
        }
        if pending.iter().any(|p| p == name) {
            return Err(PluginError::DependencyCycle(name.to_string()));
        }
        let plugin = self.registry.load(name)?;
        pending.push(name.to_string());
        for required in plugin.required_plugins() {
            self.import_with(&required, pending)?;
        }
        pending.pop();

        let mut kinds = self.kinds.clone();
        let mut factories = self.factories.clone();
        plugin.on_load(&mut Registrar::new(&mut kinds, &mut factories))?;
        self.kinds = kinds;
        self.factories = factories;
        self.imported.push(plugin);
        tracing::info!(plugin = name, "plugin imported");
        Ok(())
    }

    pub fn import_builtins(&mut self) -> Result<(), PluginError> {
        let names: Vec<&str> = self.registry.builtin_names().collect();
        names.into_iter().try_for_each(|name| self.import(name))
    }

    /// Import every built-in and every discovered plugin.
    pub fn import_all(&mut self) -> Result<(), PluginError> {
        self.import_builtins()?;
        let names: Vec<String> = self.registry.names().map(str::to_string).collect();
        names.iter().try_for_each(|name| self.import(name))
    }

    pub fn is_imported(&self, name: &str) -> bool {
        self.imported.iter().any(|p| p.name() == name)
    }

    /// Imported plugin names in load order.
    pub fn imported(&self) -> impl Iterator<Item = &str> {
        self.imported.iter().map(|p| p.name())
    }

    pub fn kinds(&self) -> &ObjectKindRegistry {
        &self.kinds
    }

    pub fn factories(&self) -> &FactoryRegistry {
        &self.factories
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut PluginRegistry {
        &mut self.registry
    }

    /// A loader over everything imported so far.
    pub fn loader(&self, physics: PhysicsProvider) -> Loader {
        Loader::new(self.factories.clone(), self.kinds.clone(), physics)
    }

    /// Unload in reverse import order and forget what the plugins registered.
    /// Loaders and worlds built earlier keep their own copies.
    pub fn unload_all(&mut self) {
        for plugin in self.imported.drain(..).rev() {
            tracing::debug!(plugin = plugin.name(), "plugin unloading");
            plugin.on_unload();
        }
        self.kinds = ObjectKindRegistry::new();
        self.factories = FactoryRegistry::new();
        self.registry.unload_all();
    }
}

impl Drop for PluginContext {
    fn drop(&mut self) {
        self.unload_all();
    }
}

impl fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginContext")
            .field("registry", &self.registry)
            .field("kinds", &self.kinds)
            .field("factories", &self.factories)
            .field("imported", &self.imported().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellsim_kernel::native_physics_provider;
    use cellsim_physics::NativePhysicsConfig;
    use std::path::Path;

    fn write(dir: &Path, file: &str, text: &str) {
        std::fs::write(dir.join(file), text).unwrap();
    }

    #[test]
    fn builtins_cover_every_backend() {
        let mut ctx = PluginContext::new(PluginRegistry::default());
        ctx.import_builtins().unwrap();
        assert_eq!(
            ctx.imported().collect::<Vec<_>>(),
            vec!["cell", "object-generator", "obstacle", "scenario", "script"]
        );
        assert!(ctx.kinds().contains("yeast"));
        assert!(ctx.kinds().contains_module("object-generator"));
        assert!(ctx.factories().contains("script"));
    }

    #[test]
    fn importing_twice_is_a_no_op() {
        let mut ctx = PluginContext::new(PluginRegistry::default());
        ctx.import("cell").unwrap();
        ctx.import("cell").unwrap();
        assert_eq!(ctx.imported().count(), 1);
    }

    #[test]
    fn unknown_plugin_leaves_context_untouched() {
        let mut ctx = PluginContext::new(PluginRegistry::default());
        assert!(matches!(ctx.import("diffusion"), Err(PluginError::NotFound(_))));
        assert_eq!(ctx.imported().count(), 0);
        assert!(ctx.kinds().is_empty());
    }

    #[test]
    fn required_plugins_load_first() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "plugin-giants.yaml",
            "api_version: 1\nrequires: [cell]\nkinds:\n  - name: giant-yeast\n    base: yeast\n    defaults: { volume: 60 }\n",
        );
        let mut ctx = PluginContext::new(PluginRegistry::new([dir.path()]));
        ctx.import("giants").unwrap();
        assert_eq!(ctx.imported().collect::<Vec<_>>(), vec!["cell", "giants"]);
        assert!(ctx.kinds().contains("giant-yeast"));
    }

    #[test]
    fn dependency_cycle_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "plugin-a.yaml", "api_version: 1\nrequires: [b]\n");
        write(dir.path(), "plugin-b.yaml", "api_version: 1\nrequires: [a]\n");
        let mut ctx = PluginContext::new(PluginRegistry::new([dir.path()]));
        assert!(matches!(ctx.import("a"), Err(PluginError::DependencyCycle(name)) if name == "a"));
        assert_eq!(ctx.imported().count(), 0);
    }

    #[test]
    fn failed_plugin_registers_nothing() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "plugin-half.yaml",
            "api_version: 1\nrequires: [cell]\nkinds:\n  - name: big\n    base: yeast\n  - name: odd\n    base: amoeba\n",
        );
        let mut ctx = PluginContext::new(PluginRegistry::new([dir.path()]));
        assert!(matches!(ctx.import("half"), Err(PluginError::UnknownBaseKind { .. })));
        assert!(!ctx.kinds().contains("big"));
        assert!(ctx.is_imported("cell"));
    }

    #[test]
    fn loader_builds_worlds_with_imported_kinds() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "plugin-giants.yaml",
            "api_version: 1\nrequires: [cell]\nkinds:\n  - name: giant-yeast\n    base: yeast\n    defaults: { volume: 60 }\n",
        );
        let mut ctx = PluginContext::new(PluginRegistry::new([dir.path()]));
        ctx.import_all().unwrap();
        let loader = ctx.loader(native_physics_provider(NativePhysicsConfig::default()));
        let (world, _) = loader
            .load_source("script", "create giant-yeast at 0 0 0\ncreate barrier at 20 0 0\n")
            .unwrap();
        assert_eq!(world.object_count(), 2);
    }

    #[test]
    fn unload_clears_registrations() {
        let mut ctx = PluginContext::new(PluginRegistry::default());
        ctx.import_builtins().unwrap();
        ctx.unload_all();
        assert_eq!(ctx.imported().count(), 0);
        assert!(ctx.kinds().is_empty());
        assert!(ctx.factories().is_empty());
        assert!(!ctx.registry().is_loaded("cell"));
    }
}
