use thiserror::Error;

/// Reasons a raw catalog row cannot be turned into a [`GenomicMutationId`](crate::models::GenomicMutationId).
///
/// All of these are row-level: callers skip the row and keep going.
#[derive(Error, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CodecError {
    #[error("Mutation has no genome position")]
    UnlocalizedMutation,

    #[error("Invalid chromosome: {0}")]
    InvalidChromosome(String),

    #[error("Invalid genome position: {0}")]
    InvalidPosition(String),

    #[error("Mutation at {0} has no coding-sequence change")]
    MissingChange(String),
}

impl CodecError {
    /// Short, stable label used when tallying skipped rows.
    pub fn reason(&self) -> &'static str {
        match self {
            CodecError::UnlocalizedMutation => "unlocalized",
            CodecError::InvalidChromosome(_) => "invalid chromosome",
            CodecError::InvalidPosition(_) => "invalid position",
            CodecError::MissingChange(_) => "missing change",
        }
    }
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Missing column in catalog header: {0}")]
    MissingColumn(String),

    #[error("Catalog file has no header line: {0}")]
    MissingHeader(String),

    #[error("Malformed catalog line {line}: expected {expected} fields, found {found}")]
    MalformedLine {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("Invalid table schema: {0}")]
    InvalidSchema(String),

    #[error("Row '{key}' does not fit the table shape: {reason}")]
    ShapeMismatch { key: String, reason: String },

    #[error("Unknown field: {0}")]
    UnknownField(String),
}
