//! Domain errors

use thiserror::Error;

/// Domain result type
pub type Result<T> = std::result::Result<T, DomainError>;

/// Failure kinds surfaced by the registry.
///
/// Each variant maps to exactly one transport status, so callers can branch on
/// the kind rather than on the message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The backing store is unavailable. Always safe to retry.
    #[error("Not ready: {0}")]
    NotReady(String),

    /// Malformed or referentially invalid input. Never retry unmodified.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Missing id, or no dispatch route for a call.
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Entity already exists: {0}")]
    AlreadyExists(String),

    /// The operation is valid but the current state forbids it.
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// Operation intentionally not supported yet.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    /// Stable machine-readable name of the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::NotReady(_) => "not_ready",
            DomainError::InvalidArgument(_) => "invalid_argument",
            DomainError::NotFound(_) => "not_found",
            DomainError::AlreadyExists(_) => "already_exists",
            DomainError::FailedPrecondition(_) => "failed_precondition",
            DomainError::Unimplemented(_) => "unimplemented",
            DomainError::DeadlineExceeded(_) => "deadline_exceeded",
            DomainError::Internal(_) => "internal",
        }
    }

    /// Prefix the message with where the error happened, keeping the kind.
    pub fn context(self, ctx: impl std::fmt::Display) -> Self {
        match self {
            DomainError::NotReady(m) => DomainError::NotReady(format!("{}: {}", ctx, m)),
            DomainError::InvalidArgument(m) => {
                DomainError::InvalidArgument(format!("{}: {}", ctx, m))
            }
            DomainError::NotFound(m) => DomainError::NotFound(format!("{}: {}", ctx, m)),
            DomainError::AlreadyExists(m) => DomainError::AlreadyExists(format!("{}: {}", ctx, m)),
            DomainError::FailedPrecondition(m) => {
                DomainError::FailedPrecondition(format!("{}: {}", ctx, m))
            }
            DomainError::Unimplemented(m) => DomainError::Unimplemented(format!("{}: {}", ctx, m)),
            DomainError::DeadlineExceeded(m) => {
                DomainError::DeadlineExceeded(format!("{}: {}", ctx, m))
            }
            DomainError::Internal(m) => DomainError::Internal(format!("{}: {}", ctx, m)),
        }
    }
}
