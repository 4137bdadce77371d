//! Validated client and group names.
//!
//! Client names and group names share one namespace on the server, but are
//! kept as distinct types so that a group can never be handed to code that
//! expects a connected client. Both borrow as `str`, which lets the registry
//! check collisions across the two maps without allocating.

use std::borrow::Borrow;
use std::fmt;

use crate::error::{DomainError, DomainResult};

// ============================================================================
// Validation
// ============================================================================

/// Returns true if `name` is non-empty and consists only of ASCII letters and digits.
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric())
}

fn validate(kind: &'static str, name: &str) -> DomainResult<()> {
    if name.is_empty() {
        return Err(DomainError::EmptyName { kind });
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(DomainError::NotAlphanumeric {
            kind,
            value: name.to_string(),
        });
    }
    Ok(())
}

// ============================================================================
// Type-Safe Names
// ============================================================================

/// Name of a connected client (e.g., "alice").
///
/// Ordering is plain byte-wise lexicographic order, which is the order the
/// `who` roster is reported in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientName(String);

impl ClientName {
    /// Parses and validates a client name.
    pub fn parse(name: &str) -> DomainResult<Self> {
        validate("client", name)?;
        Ok(Self(name.to_string()))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Name of a group of clients (e.g., "team").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupName(String);

impl GroupName {
    /// Parses and validates a group name.
    pub fn parse(name: &str) -> DomainResult<Self> {
        validate("group", name)?;
        Ok(Self(name.to_string()))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Borrow<str> for ClientName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for GroupName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ClientName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for GroupName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for ClientName {
    type Error = DomainError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for GroupName {
    type Error = DomainError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}
