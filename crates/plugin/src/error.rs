use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("plugin `{0}` not found")]
    NotFound(String),
    #[error("cannot read plugin manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid plugin manifest {path}: {message}")]
    Manifest { path: PathBuf, message: String },
    #[error("plugin `{name}` targets api version {version}, expected {expected}")]
    UnsupportedApi { name: String, version: u32, expected: u32 },
    #[error("plugin `{plugin}`: kind `{kind}` is based on unknown kind `{base}`")]
    UnknownBaseKind { plugin: String, kind: String, base: String },
    #[error("plugin dependency cycle through `{0}`")]
    DependencyCycle(String),
}
