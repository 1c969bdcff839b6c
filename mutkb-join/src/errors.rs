use mutkb_core::TableError;
use thiserror::Error;

/// Error type for join and aggregation operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JoinError {
    /// Parallel arrays under one key differ in length.
    #[error("Malformed row '{key}': parallel fields have lengths {lengths:?}")]
    MalformedRow { key: String, lengths: Vec<usize> },

    #[error(transparent)]
    Table(#[from] TableError),
}

/// Result type alias for join operations.
pub type Result<T> = std::result::Result<T, JoinError>;
