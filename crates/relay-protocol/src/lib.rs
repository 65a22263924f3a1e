//! Relay Protocol - Line protocol for relay clients
//!
//! This crate provides the pieces of the wire protocol that sit between
//! raw bytes and the daemon's session logic:
//! - `command` - interpretation of the login line
//! - `reply` - the fixed server replies and their exact wording
//! - `codec` - delimiter-based line framing for tokio streams

pub mod codec;
pub mod command;
pub mod reply;

pub use codec::{CodecError, LineCodec, DEFAULT_DELIMITER, DEFAULT_MAX_LINE_LENGTH};
pub use command::{ClientCommand, LOGIN_PREFIX};
pub use reply::ServerReply;
