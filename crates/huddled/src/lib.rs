//! huddled - Chat relay server
//!
//! This crate provides the server side of huddle:
//! - `registry` - Connected client names, their connections, and groups
//! - `router` - Resolves a destination to recipients and queues relays
//! - `dispatcher` - Applies one event at a time to the registry
//! - `server` - TCP listener, operator console, per-connection I/O tasks
//! - `config` - Server configuration (defaults, TOML file, environment)
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         huddled                              │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  TcpListener ──┐                                             │
//! │  console ──────┼──▶ ChatServer::run (select!) ──▶ Dispatcher │
//! │  signals ──────┤                                    │        │
//! │                │                                    ▼        │
//! │  reader tasks ─┘  ConnectionEvent          Registry + Router │
//! │  (FramedRead)                                       │        │
//! │                                                     │ outbox │
//! │  writer tasks ◀─────────────────────────────────────┘        │
//! │  (FramedWrite)                                               │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The dispatcher is the single owner of registry state. Every mutation
//! happens inside one task, one event at a time, so no locks are needed.
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod config;
pub mod dispatcher;
pub mod display;
pub mod registry;
pub mod router;
pub mod server;
