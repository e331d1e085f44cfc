use crate::error::SourceError;
use crate::factory::WorldFactory;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// World factories by name and by file extension.
#[derive(Clone, Default)]
pub struct FactoryRegistry {
    factories: BTreeMap<String, Arc<dyn WorldFactory>>,
    extensions: BTreeMap<String, String>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a factory. A later registration takes over the name and any
    /// extension it claims.
    pub fn register(&mut self, factory: Arc<dyn WorldFactory>) {
        let name = factory.name().to_string();
        for ext in factory.extensions() {
            self.extensions.insert(ext.to_ascii_lowercase(), name.clone());
        }
        tracing::debug!(factory = %name, extensions = ?factory.extensions(), "world factory registered");
        self.factories.insert(name, factory);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn WorldFactory>, SourceError> {
        self.factories
            .get(name)
            .cloned()
            .ok_or_else(|| SourceError::UnknownFactory(name.to_string()))
    }

    /// Factory for a file, chosen by its extension (case-insensitive).
    pub fn for_path(&self, path: &Path) -> Result<Arc<dyn WorldFactory>, SourceError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| SourceError::NoExtension(path.to_path_buf()))?
            .to_ascii_lowercase();
        let name = self
            .extensions
            .get(&ext)
            .ok_or_else(|| SourceError::UnknownExtension(ext.clone()))?;
        self.get(name)
    }
}

impl fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryRegistry")
            .field("factories", &self.factories.keys().collect::<Vec<_>>())
            .field("extensions", &self.extensions)
            .finish()
    }
}
