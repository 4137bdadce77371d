//! Huddle Protocol - Wire protocol for relay communication
//!
//! This crate provides the framing, command grammar, and reserved
//! payloads exchanged between huddle clients and the relay server.
//!
//! - [`frame`] turns a byte stream into discrete frames: a 4-digit
//!   zero-padded decimal length followed by that many payload bytes.
//! - [`command`] parses one frame's text into a [`Command`].
//! - [`message`] holds the sentinels (acks, duplicate-name rejection,
//!   shutdown notice) and the relay payload format.

pub mod command;
pub mod frame;
pub mod message;

pub use command::Command;
pub use frame::{FrameCodec, FrameError, HEADER_LEN, MAX_FRAME_LEN};
pub use message::{Ack, HandshakeReply, ServerPush};
