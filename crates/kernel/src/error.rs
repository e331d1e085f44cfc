use cellsim_common::ObjectId;
use cellsim_physics::PhysicsError;

/// Errors constructing an object. The world is left unmodified.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ObjectError {
    #[error("unknown object kind `{0}`")]
    UnknownKind(String),
    #[error("unknown world module `{0}`")]
    UnknownModule(String),
    #[error("{kind}: parameter `{param}` {reason}")]
    InvalidParameter {
        kind: String,
        param: String,
        reason: String,
    },
    #[error("{kind}: unknown parameter `{param}`")]
    UnknownParameter { kind: String, param: String },
    #[error("physics rejected the body: {0}")]
    Physics(#[from] PhysicsError),
}

/// Errors from direct world mutations and queries.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorldError {
    #[error(transparent)]
    Object(#[from] ObjectError),
    #[error("object {0} is not live")]
    NotFound(ObjectId),
    #[error("physics error on object {id}: {source}")]
    Physics {
        id: ObjectId,
        #[source]
        source: PhysicsError,
    },
}

/// Fatal failure inside a world step. The world keeps its last complete state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimulationError {
    #[error("invalid time step {0}")]
    InvalidTimeStep(f32),
    #[error("object {id} failed in step {step}: {source}")]
    Object {
        id: ObjectId,
        step: u64,
        #[source]
        source: PhysicsError,
    },
    #[error("spawning an object failed in step {step}: {source}")]
    Spawn {
        step: u64,
        #[source]
        source: ObjectError,
    },
    #[error("physics solve failed in step {step}: {source}")]
    Physics {
        step: u64,
        #[source]
        source: PhysicsError,
    },
}

/// Errors from simulator control operations.
#[derive(Debug, thiserror::Error)]
pub enum SimulatorError {
    /// The simulator lacks what the operation needs, e.g. a reconstruction recipe.
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Simulation(#[from] SimulationError),
    #[error("rebuilding the world failed: {0}")]
    Rebuild(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("failed to spawn the step thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("step thread panicked: {0}")]
    WorkerPanicked(String),
    #[error("world halted after an invariant violation; install or reset a world")]
    Halted,
}
