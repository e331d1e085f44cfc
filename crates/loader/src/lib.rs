//! World construction from scenario sources.
//!
//! # Invariants
//! - A factory returns either a complete world or a [`SourceError`], never both.
//! - Factories are stateless; everything a build needs arrives in a [`BuildEnv`].

mod error;
pub mod factory;
mod loader;
pub mod registry;
pub mod scenario;
pub mod script;
#[cfg(test)]
mod testing;

pub use error::SourceError;
pub use factory::{BuildEnv, WorldFactory};
pub use loader::{Loader, LoaderRecipe, WorldSource};
pub use registry::FactoryRegistry;
pub use scenario::{ObjectSpec, Scenario, ScenarioFactory};
pub use script::{Script, ScriptFactory};

pub fn crate_info() -> &'static str {
    "cellsim-loader v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("loader"));
    }
}
