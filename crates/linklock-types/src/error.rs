use thiserror::Error;

#[derive(Error, Debug)]
pub enum LinklockError {
    #[error("Locker not found: {0}")]
    LockerNotFound(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Visit not found: {0}")]
    VisitNotFound(String),

    #[error("Invalid task transition: {0}")]
    InvalidTransition(String),

    #[error("Task has no ad URL configured: {0}")]
    MissingAdUrl(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl From<serde_json::Error> for LinklockError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LinklockError>;
