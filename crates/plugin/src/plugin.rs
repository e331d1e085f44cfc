use crate::error::PluginError;
use cellsim_kernel::{
    Barrier, ModuleArgs, ObjectArgs, ObjectBehavior, ObjectError, ObjectGenerator, ObjectKindRegistry, WorldModule,
    Yeast,
};
use cellsim_loader::{FactoryRegistry, ScenarioFactory, ScriptFactory, WorldFactory};
use std::sync::Arc;

/// Extension points a plugin may fill while it loads.
pub struct Registrar<'a> {
    kinds: &'a mut ObjectKindRegistry,
    factories: &'a mut FactoryRegistry,
}

impl<'a> Registrar<'a> {
    pub(crate) fn new(kinds: &'a mut ObjectKindRegistry, factories: &'a mut FactoryRegistry) -> Self {
        Self { kinds, factories }
    }

    pub fn register_kind<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn(&ObjectArgs) -> Result<Box<dyn ObjectBehavior>, ObjectError> + Send + Sync + 'static,
    {
        self.kinds.register(name, constructor);
    }

    pub fn register_module<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn(&ModuleArgs) -> Result<Box<dyn WorldModule>, ObjectError> + Send + Sync + 'static,
    {
        self.kinds.register_module(name, constructor);
    }

    pub fn register_factory(&mut self, factory: Arc<dyn WorldFactory>) {
        self.factories.register(factory);
    }

    /// Kinds registered so far, including those of earlier plugins.
    pub fn kinds(&self) -> &ObjectKindRegistry {
        self.kinds
    }

    pub fn kinds_mut(&mut self) -> &mut ObjectKindRegistry {
        self.kinds
    }
}

/// A loadable extension module.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// Plugins that must be loaded first.
    fn required_plugins(&self) -> Vec<String> {
        Vec::new()
    }

    fn on_load(&self, registrar: &mut Registrar<'_>) -> Result<(), PluginError>;

    fn on_unload(&self) {}
}

/// Yeast cells.
#[derive(Debug, Clone, Copy, Default)]
pub struct CellPlugin;

impl Plugin for CellPlugin {
    fn name(&self) -> &str {
        "cell"
    }

    fn on_load(&self, registrar: &mut Registrar<'_>) -> Result<(), PluginError> {
        Yeast::register(registrar.kinds_mut());
        Ok(())
    }
}

/// Static barriers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObstaclePlugin;

impl Plugin for ObstaclePlugin {
    fn name(&self) -> &str {
        "obstacle"
    }

    fn on_load(&self, registrar: &mut Registrar<'_>) -> Result<(), PluginError> {
        Barrier::register(registrar.kinds_mut());
        Ok(())
    }
}

/// The `object-generator` world module.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeneratorPlugin;

impl Plugin for GeneratorPlugin {
    fn name(&self) -> &str {
        ObjectGenerator::NAME
    }

    fn on_load(&self, registrar: &mut Registrar<'_>) -> Result<(), PluginError> {
        registrar.register_module(ObjectGenerator::NAME, |args: &ModuleArgs| {
            Ok(Box::new(ObjectGenerator::from_args(args)?))
        });
        Ok(())
    }
}

/// JSON and YAML scenario documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScenarioPlugin;

impl Plugin for ScenarioPlugin {
    fn name(&self) -> &str {
        "scenario"
    }

    fn on_load(&self, registrar: &mut Registrar<'_>) -> Result<(), PluginError> {
        registrar.register_factory(Arc::new(ScenarioFactory::json()));
        registrar.register_factory(Arc::new(ScenarioFactory::yaml()));
        Ok(())
    }
}

/// The `.cells` line-script backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptPlugin;

impl Plugin for ScriptPlugin {
    fn name(&self) -> &str {
        "script"
    }

    fn on_load(&self, registrar: &mut Registrar<'_>) -> Result<(), PluginError> {
        registrar.register_factory(Arc::new(ScriptFactory));
        Ok(())
    }
}

/// Names of the plugins compiled into this crate.
pub const BUILTIN_PLUGINS: &[&str] = &["cell", "object-generator", "obstacle", "scenario", "script"];

pub(crate) fn builtin(name: &str) -> Option<Arc<dyn Plugin>> {
    let plugin: Arc<dyn Plugin> = match name {
        "cell" => Arc::new(CellPlugin),
        "object-generator" => Arc::new(GeneratorPlugin),
        "obstacle" => Arc::new(ObstaclePlugin),
        "scenario" => Arc::new(ScenarioPlugin),
        "script" => Arc::new(ScriptPlugin),
        _ => return None,
    };
    Some(plugin)
}
