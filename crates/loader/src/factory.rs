use crate::error::SourceError;
use cellsim_kernel::{ObjectKindRegistry, PhysicsProvider, World, WorldSettings};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// What a factory needs besides the source: the object kinds it may create,
/// a physics backend for the new world, and scenario parameters.
#[derive(Clone)]
pub struct BuildEnv {
    pub kinds: Arc<ObjectKindRegistry>,
    pub physics: PhysicsProvider,
    pub parameters: BTreeMap<String, String>,
}

impl BuildEnv {
    pub fn new(kinds: Arc<ObjectKindRegistry>, physics: PhysicsProvider) -> Self {
        Self {
            kinds,
            physics,
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: BTreeMap<String, String>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Empty world backed by a fresh physics instance.
    pub fn new_world(&self, settings: WorldSettings) -> World {
        World::new(settings, Arc::clone(&self.kinds), (self.physics)())
    }

    /// Replace every `${name}` in `text` with its parameter value.
    pub fn substitute(&self, text: &str) -> Result<String, SourceError> {
        substitute(text, |name| self.parameters.get(name).cloned())
    }
}

impl std::fmt::Debug for BuildEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildEnv")
            .field("kinds", &self.kinds)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// Expand `${name}` references through `lookup`.
pub fn substitute(text: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<String, SourceError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or(SourceError::UnterminatedParameter)?;
        let name = after[..end].trim();
        let value = lookup(name).ok_or_else(|| SourceError::UndefinedParameter(name.to_string()))?;
        out.push_str(&value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Builds worlds from one source dialect.
///
/// Implementations must either return a fully constructed world or an error;
/// a half-built world is dropped (and its bodies released) before returning.
pub trait WorldFactory: Send + Sync {
    /// Registry name, e.g. `yaml`.
    fn name(&self) -> &str;

    /// File extensions (without the dot) this factory reads.
    fn extensions(&self) -> &[&str];

    fn create_world_from_source(&self, source: &str, env: &BuildEnv) -> Result<World, SourceError>;

    /// Reads the whole file, then defers to [`WorldFactory::create_world_from_source`].
    fn create_world_from_file(&self, path: &Path, env: &BuildEnv) -> Result<World, SourceError> {
        let text = std::fs::read_to_string(path).map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(factory = self.name(), path = %path.display(), bytes = text.len(), "source read");
        self.create_world_from_source(&text, env)
    }
}
