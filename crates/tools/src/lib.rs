//! Front-end tooling over a live world.
//!
//! # Invariants
//! - Tools only read; nothing here mutates a world.

pub mod inspector;

pub use inspector::{ObjectInfo, WorldInspector, WorldSummary};

pub fn crate_info() -> &'static str {
    "cellsim-tools v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("tools"));
    }
}
