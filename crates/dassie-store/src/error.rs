use std::path::PathBuf;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The database location cannot be opened at all.
    #[error("cannot open term database at {path}: {reason}")]
    Unreachable { path: PathBuf, reason: String },

    /// The database opened, but its contents cannot be queried.
    #[error("term database at {path} is unusable: {reason}")]
    Unavailable { path: PathBuf, reason: String },

    #[error("term {0} already exists")]
    DuplicateId(String),

    #[error("term {0} does not exist")]
    MissingTerm(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Codec(String),
}

impl From<bincode::Error> for StoreError {
    fn from(value: bincode::Error) -> Self {
        StoreError::Codec(value.to_string())
    }
}
