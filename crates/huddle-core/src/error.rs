//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Name is empty
    #[error("Invalid {kind} name: name is empty")]
    EmptyName { kind: &'static str },

    /// Name contains something other than ASCII letters and digits
    #[error("Invalid {kind} name: {value:?} (expected letters and digits only)")]
    NotAlphanumeric { kind: &'static str, value: String },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
