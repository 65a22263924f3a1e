//! Relay Core - Shared domain types for the line relay
//!
//! This crate provides the domain types shared between the protocol
//! layer (relay-protocol) and the daemon (relayd).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod history;
pub mod message;
pub mod session;

// Re-exports for convenience
pub use error::{DomainError, DomainResult};
pub use history::{HistoryBuffer, DEFAULT_HISTORY_CAPACITY};
pub use message::ChatMessage;
pub use session::{Login, SessionId};
