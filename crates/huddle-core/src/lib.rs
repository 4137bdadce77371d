//! Huddle Core - Shared types for the huddle chat relay
//!
//! This crate provides the domain types shared between
//! the relay server (huddled) and the peer client (huddle).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod name;

// Re-exports for convenience
pub use error::{DomainError, DomainResult};
pub use name::{is_valid_name, ClientName, GroupName};
