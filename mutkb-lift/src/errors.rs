use thiserror::Error;

#[derive(Error, Debug)]
pub enum LiftError {
    #[error("Liftover service failed: {0}")]
    Service(String),

    #[error("Liftover from {from} to {to} is not supported by this service")]
    UnsupportedBuilds { from: String, to: String },

    #[error("Invalid liftover mapping at line {line}: {reason}")]
    InvalidMapping { line: usize, reason: String },

    #[error("Can't read liftover mapping: {0}")]
    MappingRead(String),
}
