use std::path::PathBuf;

use thiserror::Error;

use mutkb_core::{CodecError, SourceError, TableError};
use mutkb_join::JoinError;
use mutkb_lift::LiftError;

#[derive(Error, Debug)]
pub enum KbError {
    #[error("Table '{0}' is already registered")]
    DuplicateRegistration(String),

    #[error("Cyclic derivation: {}", chain.join(" -> "))]
    CyclicDerivation { chain: Vec<String> },

    #[error("Unknown table '{0}'")]
    UnknownTable(String),

    #[error("Invalid schema for table '{name}': {source}")]
    InvalidSchema {
        name: String,
        #[source]
        source: TableError,
    },

    #[error("Table '{name}' does not match its declared schema: {reason}")]
    SchemaMismatch { name: String, reason: String },

    #[error("External service failed: {0}")]
    ExternalService(String),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Join(#[from] JoinError),

    #[error("Store error at {path:?}: {source}")]
    Store {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Can't serialize persisted table {path:?}: {source}")]
    Serialization {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<LiftError> for KbError {
    fn from(err: LiftError) -> Self {
        KbError::ExternalService(err.to_string())
    }
}

impl KbError {
    pub(crate) fn store(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        KbError::Store {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, KbError>;
