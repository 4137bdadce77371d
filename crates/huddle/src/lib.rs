//! huddle client - Library modules
//!
//! This library provides the peer side of the huddle relay.
//!
//! # Architecture
//!
//! A session runs one loop over two sources:
//!
//! 1. **Console**: lines typed by the user, validated locally by [`input`]
//!    and sent as requests, one in flight at a time
//! 2. **Server connection**: relayed messages and the shutdown notice
//!
//! Everything the user sees is rendered through [`display`].

pub mod config;
pub mod display;
pub mod error;
pub mod input;
pub mod session;

// Re-export commonly used types
pub use config::SessionConfig;
pub use error::{Result, SessionError};
pub use session::{Session, SessionEnd};
