use thiserror::Error;

use crate::app::builder::BuildError;
use crate::app::registry::RegistryError;
use crate::config::ConfigError;
use crate::domain::{DomainError, JobId, UnknownWorkflow};
use crate::ports::{QueueError, StorageError};

/// How a caller should react to an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Backing store hiccup: log and try again at the next tick.
    Transient,
    /// The request itself is wrong; retrying does not help.
    Permanent,
    /// Startup / submission configuration problem: abort.
    Configuration,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    UnknownWorkflow(#[from] UnknownWorkflow),

    #[error("job {0} not found")]
    JobNotFound(JobId),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Queue(QueueError::Encode(_)) => ErrorKind::Permanent,
            EngineError::Queue(_) => ErrorKind::Transient,
            EngineError::Storage(StorageError::Unavailable(_)) => ErrorKind::Transient,
            EngineError::Storage(_) => ErrorKind::Permanent,
            EngineError::Domain(_) | EngineError::JobNotFound(_) => ErrorKind::Permanent,
            EngineError::Config(_)
            | EngineError::Registry(_)
            | EngineError::Build(_)
            | EngineError::UnknownWorkflow(_) => ErrorKind::Configuration,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}
