//! Simulation kernel: physics-bound objects, the world that owns them, and the
//! simulator that steps a world on a background thread.
//!
//! # Invariants
//! - Every body registered in a world's dynamics world belongs to exactly one live object.
//! - Registration and unregistration are strictly paired; a broken pairing halts.
//! - A world step is all-or-nothing: a failed step leaves no partial state behind.
//! - At most one world is installed in a simulator at a time.

pub mod barrier;
pub mod cell;
mod error;
pub mod generator;
pub mod kinds;
pub mod module;
pub mod object;
pub mod rng;
pub mod simulator;
#[cfg(test)]
mod testing;
pub mod world;

pub use barrier::Barrier;
pub use cell::{Bud, Yeast};
pub use error::{ObjectError, SimulationError, SimulatorError, WorldError};
pub use generator::ObjectGenerator;
pub use kinds::{KindConstructor, ModuleConstructor, ObjectArgs, ObjectKindRegistry, ParamReader};
pub use module::{CreateRequest, ModuleArgs, ModuleContext, WorldModule};
pub use object::{Object, ObjectBehavior, SpawnRequest, UpdateContext};
pub use rng::SimRng;
pub use simulator::{RecipeError, Simulator, SimulatorConfig, WorldRecipe};
pub use world::{ObjectRef, PhysicsProvider, World, WorldEvent, WorldSettings, native_physics_provider};

pub fn crate_info() -> &'static str {
    "cellsim-kernel v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("kernel"));
    }
}
