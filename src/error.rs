//! Run-level errors.
//!
//! Only these abort a batch. Every one of them is raised before the first
//! filesystem mutation; per-file failures are recorded as
//! [`ResolutionOutcome`](crate::rename::ResolutionOutcome)s instead.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenameError {
    /// A prerequisite is missing (credentials, directory, budget, consent)
    #[error("{0}")]
    Fatal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RenameError {
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }
}

impl From<RenameError> for String {
    fn from(err: RenameError) -> Self {
        err.to_string()
    }
}

pub type Result<T> = std::result::Result<T, RenameError>;
