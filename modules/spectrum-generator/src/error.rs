use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GeneratorError>;

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Template error: {0}")]
    Template(String),

    #[error("Invalid article id: {0}")]
    InvalidId(String),
}

impl GeneratorError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| GeneratorError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
