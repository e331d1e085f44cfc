use crate::error::SourceError;
use crate::factory::BuildEnv;
use crate::registry::FactoryRegistry;
use cellsim_kernel::{ObjectKindRegistry, PhysicsProvider, RecipeError, World, WorldRecipe};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Where a world comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorldSource {
    /// A scenario file; the factory is chosen by extension.
    File(PathBuf),
    /// Source text for a named factory.
    Text { factory: String, text: String },
}

impl fmt::Display for WorldSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Text { factory, text } => write!(f, "<{factory} source, {} bytes>", text.len()),
        }
    }
}

/// Front door for world construction: factories, object kinds, physics and
/// scenario parameters bundled together.
#[derive(Clone)]
pub struct Loader {
    factories: Arc<FactoryRegistry>,
    env: BuildEnv,
}

impl Loader {
    pub fn new(factories: FactoryRegistry, kinds: ObjectKindRegistry, physics: PhysicsProvider) -> Self {
        Self {
            factories: Arc::new(factories),
            env: BuildEnv::new(Arc::new(kinds), physics),
        }
    }

    pub fn with_parameters(mut self, parameters: BTreeMap<String, String>) -> Self {
        self.env.parameters = parameters;
        self
    }

    pub fn factories(&self) -> &FactoryRegistry {
        &self.factories
    }

    pub fn kinds(&self) -> &ObjectKindRegistry {
        &self.env.kinds
    }

    pub fn env(&self) -> &BuildEnv {
        &self.env
    }

    pub fn build(&self, source: &WorldSource) -> Result<World, SourceError> {
        let _span = tracing::debug_span!("build_world", %source).entered();
        match source {
            WorldSource::File(path) => {
                let factory = self.factories.for_path(path)?;
                factory.create_world_from_file(path, &self.env)
            }
            WorldSource::Text { factory, text } => {
                let factory = self.factories.get(factory)?;
                factory.create_world_from_source(text, &self.env)
            }
        }
    }

    /// Build a world and keep a recipe that rebuilds it from the same source.
    /// A file is read again on every rebuild.
    pub fn load(&self, source: WorldSource) -> Result<(World, Arc<LoaderRecipe>), SourceError> {
        let world = self.build(&source)?;
        tracing::info!(%source, objects = world.object_count(), "world loaded");
        let recipe = Arc::new(LoaderRecipe {
            loader: self.clone(),
            source,
        });
        Ok((world, recipe))
    }

    pub fn load_file(&self, path: impl Into<PathBuf>) -> Result<(World, Arc<LoaderRecipe>), SourceError> {
        self.load(WorldSource::File(path.into()))
    }

    pub fn load_source(
        &self,
        factory: &str,
        text: impl Into<String>,
    ) -> Result<(World, Arc<LoaderRecipe>), SourceError> {
        self.load(WorldSource::Text {
            factory: factory.to_string(),
            text: text.into(),
        })
    }
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("factories", &self.factories)
            .field("env", &self.env)
            .finish()
    }
}

/// [`WorldRecipe`] over a [`Loader`] and a [`WorldSource`].
#[derive(Debug, Clone)]
pub struct LoaderRecipe {
    loader: Loader,
    source: WorldSource,
}

impl LoaderRecipe {
    pub fn source(&self) -> &WorldSource {
        &self.source
    }
}

impl WorldRecipe for LoaderRecipe {
    fn build(&self) -> Result<World, RecipeError> {
        Ok(self.loader.build(&self.source)?)
    }

    fn describe(&self) -> String {
        self.source.to_string()
    }
}
