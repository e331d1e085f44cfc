//! Physics engine binding: the capability the world drives its rigid bodies through.
//!
//! # Invariants
//! - A body is registered into the dynamics world at most once at a time.
//! - A body is released only after it has been unregistered.
//! - `step` is all-or-nothing: either every registered body advances or none does.

mod backend;
mod native;
mod shape;

pub use backend::{BodyDesc, BodyHandle, BodyKind, PhysicsBackend, PhysicsError};
pub use native::{NativePhysics, NativePhysicsConfig};
pub use shape::{Shape, ShapePart, ShapePrimitive};

pub fn crate_info() -> &'static str {
    "cellsim-physics v0.1.0"
}
