use crate::factory::BuildEnv;
use crate::loader::Loader;
use crate::registry::FactoryRegistry;
use crate::scenario::ScenarioFactory;
use crate::script::ScriptFactory;
use cellsim_kernel::{Barrier, ObjectGenerator, ObjectKindRegistry, Yeast, native_physics_provider};
use cellsim_physics::NativePhysicsConfig;
use std::sync::Arc;

pub(crate) fn kinds() -> ObjectKindRegistry {
    let mut kinds = ObjectKindRegistry::new();
    Yeast::register(&mut kinds);
    Barrier::register(&mut kinds);
    ObjectGenerator::register(&mut kinds);
    kinds
}

pub(crate) fn env() -> BuildEnv {
    BuildEnv::new(
        Arc::new(kinds()),
        native_physics_provider(NativePhysicsConfig::default()),
    )
}

pub(crate) fn loader() -> Loader {
    let mut factories = FactoryRegistry::new();
    factories.register(Arc::new(ScenarioFactory::json()));
    factories.register(Arc::new(ScenarioFactory::yaml()));
    factories.register(Arc::new(ScriptFactory));
    Loader::new(
        factories,
        kinds(),
        native_physics_provider(NativePhysicsConfig::default()),
    )
}
