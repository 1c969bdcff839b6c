use std::path::PathBuf;

use thiserror::Error;

use mutkb_core::TableError;
use mutkb_kb::KbError;

#[derive(Error, Debug)]
pub enum CooccurError {
    #[error(transparent)]
    Kb(#[from] KbError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error("{lookup} lookup failed: {source}")]
    Service {
        lookup: &'static str,
        #[source]
        source: KbError,
    },

    #[error("Can't write matrix to {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CooccurError {
    pub(crate) fn service(lookup: &'static str) -> impl FnOnce(KbError) -> Self {
        move |source| CooccurError::Service { lookup, source }
    }
}

pub type Result<T> = std::result::Result<T, CooccurError>;
