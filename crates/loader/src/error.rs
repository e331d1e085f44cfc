use cellsim_kernel::ObjectError;
use std::path::PathBuf;

/// A scenario source could not be turned into a world.
///
/// No partially-populated world ever escapes alongside one of these.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{factory} scenario: {message}")]
    Parse { factory: String, message: String },
    #[error("line {line}: {message}")]
    Script { line: usize, message: String },
    #[error("{context}: {source}")]
    Object {
        context: String,
        #[source]
        source: ObjectError,
    },
    #[error("undefined scenario parameter `${{{0}}}`")]
    UndefinedParameter(String),
    #[error("unterminated parameter reference")]
    UnterminatedParameter,
    #[error("no world factory named `{0}`")]
    UnknownFactory(String),
    #[error("no world factory handles `.{0}` files")]
    UnknownExtension(String),
    #[error("cannot pick a world factory for {0}: no file extension")]
    NoExtension(PathBuf),
}

impl SourceError {
    pub(crate) fn parse(factory: &str, message: impl ToString) -> Self {
        Self::Parse {
            factory: factory.to_string(),
            message: message.to_string(),
        }
    }

    pub(crate) fn script(line: usize, message: impl Into<String>) -> Self {
        Self::Script {
            line,
            message: message.into(),
        }
    }
}
