//! Registry actor commands, errors, and events.
//!
//! This module defines the message types for communicating with the `RegistryActor`:
//! - `RegistryCommand`: Commands sent to the actor
//! - `RegistryError`: Errors that can occur during registry operations
//! - `SessionEvent`: Events published by the registry for subscribers
//!
//! All types are designed for async message passing and follow the panic-free policy.

use chrono::{DateTime, Utc};
use relay_core::{Login, SessionId};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Sending side of a session's outbound line queue.
///
/// The registry keeps one per active session and pushes broadcast, welcome
/// and replay lines into it without waiting for the socket.
pub type Outbox = mpsc::UnboundedSender<String>;

// ============================================================================
// Registry Commands
// ============================================================================

/// Commands sent to the registry actor.
///
/// Each command uses a oneshot channel for the response, enabling
/// request-response patterns in async code without blocking.
#[derive(Debug)]
pub enum RegistryCommand {
    /// Add a freshly connected, unauthenticated session to the active set.
    ///
    /// # Errors
    /// - `RegistryError::SessionAlreadyExists` if the ID is already active
    Connect {
        /// ID assigned to the connection by the server
        session_id: SessionId,
        /// Queue the registry pushes lines for this session into
        outbox: Outbox,
        /// Channel to send the result
        respond_to: oneshot::Sender<Result<(), RegistryError>>,
    },

    /// Remove a session from the active set.
    ///
    /// Responds `false` if the session was not present (no-op).
    Disconnect {
        /// ID of the session to remove
        session_id: SessionId,
        /// Channel to send whether a session was removed
        respond_to: oneshot::Sender<bool>,
    },

    /// Attempt to authenticate a session under a login.
    ///
    /// Checks uniqueness, records the login, sends the welcome line and
    /// replays history as a single step. On conflict the "taken" reply is
    /// queued to the session instead.
    ///
    /// # Errors
    /// - `RegistryError::SessionNotFound` if the session is not connected
    /// - `RegistryError::AlreadyAuthenticated` if the session already logged in
    Login {
        /// ID of the session logging in
        session_id: SessionId,
        /// Requested login
        login: Login,
        /// Channel to send the result
        respond_to: oneshot::Sender<Result<LoginOutcome, RegistryError>>,
    },

    /// Record a line from an authenticated session in history and
    /// broadcast it to every other active session.
    ///
    /// Responds with the number of sessions the line was delivered to.
    ///
    /// # Errors
    /// - `RegistryError::SessionNotFound` if the session is not connected
    /// - `RegistryError::NotAuthenticated` if the session has no login yet
    Publish {
        /// ID of the sending session
        session_id: SessionId,
        /// Raw line text received from the client
        body: String,
        /// Channel to send the result
        respond_to: oneshot::Sender<Result<usize, RegistryError>>,
    },

    /// Check whether a login is held by any session other than `excluding`.
    IsLoginTaken {
        /// Login to look up (exact match)
        login: Login,
        /// Session to ignore during the lookup
        excluding: Option<SessionId>,
        /// Channel to send the result
        respond_to: oneshot::Sender<bool>,
    },

    /// Get a single session by ID.
    GetSession {
        /// ID of the session to retrieve
        session_id: SessionId,
        /// Channel to send the result
        respond_to: oneshot::Sender<Option<SessionView>>,
    },

    /// Get all active sessions as views.
    GetAllSessions {
        /// Channel to send the results
        respond_to: oneshot::Sender<Vec<SessionView>>,
    },

    /// Get the stored history, oldest first.
    GetHistory {
        /// Channel to send the results
        respond_to: oneshot::Sender<Vec<String>>,
    },
}

/// Result of a login attempt that reached the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Login recorded; welcome and history were queued to the session.
    Accepted,

    /// Another active session holds this login; the rejection was queued
    /// and the session must be closed.
    Taken,
}

// ============================================================================
// Session View
// ============================================================================

/// Read-only snapshot of one active session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    /// Connection identifier
    pub id: SessionId,

    /// Login, once the session has authenticated
    pub login: Option<Login>,

    /// When the session was added to the registry
    pub connected_at: DateTime<Utc>,
}

impl SessionView {
    pub fn is_authenticated(&self) -> bool {
        self.login.is_some()
    }
}

// ============================================================================
// Registry Errors
// ============================================================================

/// Errors that can occur during registry operations.
///
/// Uses `thiserror` for ergonomic error handling and Display implementations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The requested session was not found.
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// A session with this ID already exists.
    #[error("session already exists: {0}")]
    SessionAlreadyExists(SessionId),

    /// The session tried to send a message before logging in.
    #[error("session not authenticated: {0}")]
    NotAuthenticated(SessionId),

    /// The session tried to log in a second time.
    #[error("session already authenticated: {0}")]
    AlreadyAuthenticated(SessionId),

    /// The response channel was closed before receiving a response.
    ///
    /// This typically indicates the actor was shut down.
    #[error("response channel closed")]
    ChannelClosed,
}

// ============================================================================
// Session Events
// ============================================================================

/// Lifecycle notifications published by the registry to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A session joined the active set.
    Connected { session_id: SessionId },

    /// A session logged in.
    Authenticated { session_id: SessionId, login: Login },

    /// A login attempt was refused because the name is in use.
    LoginRejected { session_id: SessionId, login: Login },

    /// An authenticated session sent a message.
    Published {
        session_id: SessionId,
        message: String,
        recipients: usize,
    },

    /// A session left the active set.
    Disconnected {
        session_id: SessionId,
        login: Option<Login>,
    },
}
