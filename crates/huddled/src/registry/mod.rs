//! Client and group registry.
//!
//! The registry is the server's source of truth for who is connected and
//! which groups exist. It is plain owned state with no interior locking:
//! the [`Dispatcher`](crate::dispatcher::Dispatcher) holds the only
//! instance and mutates it one event at a time.
//!
//! # Architecture
//!
//! ```text
//!              clients (BTreeMap)             connections (HashMap)
//!   ClientName ─────────────────▶ id ─────────────────▶ (ClientName, ConnectionHandle)
//!       ▲                                                         │
//!       └──────────────────────── bijection ──────────────────────┘
//!
//!   groups (BTreeMap): GroupName ──▶ BTreeSet<ClientName>
//! ```
//!
//! Client names and group names live in one namespace: a name is refused
//! for either purpose while the other map holds it.
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - Lookups return `Option`, mutations return `Result`

mod errors;
mod store;

pub use errors::RegistryError;
pub use store::{Registry, Rejected};
