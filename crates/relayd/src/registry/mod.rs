//! Session registry using Actor pattern.
//!
//! The registry is the central state manager for all connected clients.
//! It receives commands via a tokio mpsc channel and is the single owner of
//! the active session set and the message history.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │     Session     │────▶│  RegistryActor  │────▶│ per-session      │
//! │  (per client)   │     │                 │     │ outbox (mpsc)    │
//! └─────────────────┘     └─────────────────┘     └──────────────────┘
//!         │                       │                        │
//!         │   RegistryCommand     │  HashMap<SessionId,    │ writer task
//!         │   (mpsc channel)      │  SessionEntry>         │ drains to socket
//!         ▼                       │  + HistoryBuffer       ▼
//!    Connect/Login/               │                   TCP clients
//!    Publish/Disconnect           ▼
//!                           SessionEvent (broadcast)
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

use tokio::sync::{broadcast, mpsc};

use relay_core::HistoryBuffer;

mod actor;
mod commands;
mod handle;

pub use actor::RegistryActor;
pub use commands::{LoginOutcome, Outbox, RegistryCommand, RegistryError, SessionEvent, SessionView};
pub use handle::RegistryHandle;

/// Channel buffer sizes
const COMMAND_BUFFER: usize = 100;
const EVENT_BUFFER: usize = 100;

/// Spawn a registry actor with the default history capacity.
///
/// # Example
///
/// ```no_run
/// use relayd::registry::spawn_registry;
///
/// #[tokio::main]
/// async fn main() {
///     let handle = spawn_registry();
///     let sessions = handle.get_all_sessions().await;
///     assert!(sessions.is_empty());
/// }
/// ```
pub fn spawn_registry() -> RegistryHandle {
    spawn_registry_with_history(HistoryBuffer::default())
}

/// Spawn a registry actor that owns the given history buffer.
///
/// This function:
/// 1. Creates command and event channels
/// 2. Spawns the RegistryActor on a tokio task
/// 3. Returns a RegistryHandle for client use
///
/// The actor stops once every handle has been dropped.
pub fn spawn_registry_with_history(history: HistoryBuffer) -> RegistryHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, _) = broadcast::channel(EVENT_BUFFER);

    let actor = RegistryActor::new(cmd_rx, event_tx.clone(), history);
    tokio::spawn(actor.run());

    RegistryHandle::new(cmd_tx, event_tx)
}
