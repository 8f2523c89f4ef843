// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Job {0} is deleted")]
    JobDeleted(i64),

    #[error("Invalid frequency: {0:?}")]
    InvalidFrequency(String),

    #[error("Invalid checkpoint state: {0}")]
    InvalidState(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
