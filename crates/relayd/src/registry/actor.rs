//! Registry actor - owns all session state and processes commands.
//!
//! The RegistryActor is the single owner of the active session set and the
//! message history. It receives commands via an mpsc channel and publishes
//! lifecycle events via broadcast.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Channel send failures are logged but don't panic

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use relay_core::{ChatMessage, HistoryBuffer, Login, SessionId};
use relay_protocol::ServerReply;

use super::commands::{
    LoginOutcome, Outbox, RegistryCommand, RegistryError, SessionEvent, SessionView,
};

/// Registry-side state for one connected session.
#[derive(Debug)]
struct SessionEntry {
    login: Option<Login>,
    outbox: Outbox,
    connected_at: DateTime<Utc>,
}

impl SessionEntry {
    fn view(&self, id: SessionId) -> SessionView {
        SessionView {
            id,
            login: self.login.clone(),
            connected_at: self.connected_at,
        }
    }
}

// ============================================================================
// Registry Actor
// ============================================================================

/// The registry actor - owns all session state.
///
/// Implements the actor pattern: receives commands via mpsc channel,
/// processes them sequentially, and publishes events to subscribers.
///
/// # Ownership
///
/// The actor owns:
/// - `sessions`: active sessions keyed by connection ID, with their outboxes
/// - `history`: the bounded log of broadcast messages
///
/// # Ordering
///
/// Commands run to completion one at a time, so a message's history append
/// and its broadcast can never interleave with another message's, and a
/// login's welcome + replay always reflects a consistent history snapshot.
pub struct RegistryActor {
    /// Command receiver
    receiver: mpsc::Receiver<RegistryCommand>,

    /// Active sessions, authenticated or not
    sessions: HashMap<SessionId, SessionEntry>,

    /// Recently broadcast messages, oldest first
    history: HistoryBuffer,

    /// Event publisher for lifecycle notifications
    event_publisher: broadcast::Sender<SessionEvent>,
}

impl RegistryActor {
    /// Creates a new registry actor with an empty session set.
    ///
    /// # Arguments
    ///
    /// * `receiver` - Channel for receiving commands
    /// * `event_publisher` - Broadcast channel for publishing events
    /// * `history` - History buffer owned by this registry instance
    pub fn new(
        receiver: mpsc::Receiver<RegistryCommand>,
        event_publisher: broadcast::Sender<SessionEvent>,
        history: HistoryBuffer,
    ) -> Self {
        Self {
            receiver,
            sessions: HashMap::new(),
            history,
            event_publisher,
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes commands until the channel closes (all senders dropped).
    /// This is the main entry point - call this in a spawned task.
    pub async fn run(mut self) {
        info!(
            history_capacity = self.history.capacity(),
            "Registry actor starting"
        );

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(
            "Registry actor stopped (sessions: {}, history: {})",
            self.sessions.len(),
            self.history.len()
        );
    }

    /// Dispatches a command to the appropriate handler.
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Connect {
                session_id,
                outbox,
                respond_to,
            } => {
                let result = self.handle_connect(session_id, outbox);
                // Ignore send error - client may have dropped the receiver
                let _ = respond_to.send(result);
            }
            RegistryCommand::Disconnect {
                session_id,
                respond_to,
            } => {
                let removed = self.handle_disconnect(session_id);
                let _ = respond_to.send(removed);
            }
            RegistryCommand::Login {
                session_id,
                login,
                respond_to,
            } => {
                let result = self.handle_login(session_id, login);
                let _ = respond_to.send(result);
            }
            RegistryCommand::Publish {
                session_id,
                body,
                respond_to,
            } => {
                let result = self.handle_publish(session_id, body);
                let _ = respond_to.send(result);
            }
            RegistryCommand::IsLoginTaken {
                login,
                excluding,
                respond_to,
            } => {
                let taken = self.is_login_taken(&login, excluding);
                let _ = respond_to.send(taken);
            }
            RegistryCommand::GetSession {
                session_id,
                respond_to,
            } => {
                let view = self
                    .sessions
                    .get(&session_id)
                    .map(|entry| entry.view(session_id));
                let _ = respond_to.send(view);
            }
            RegistryCommand::GetAllSessions { respond_to } => {
                let views = self
                    .sessions
                    .iter()
                    .map(|(id, entry)| entry.view(*id))
                    .collect();
                let _ = respond_to.send(views);
            }
            RegistryCommand::GetHistory { respond_to } => {
                let _ = respond_to.send(self.history.to_vec());
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    fn handle_connect(
        &mut self,
        session_id: SessionId,
        outbox: Outbox,
    ) -> Result<(), RegistryError> {
        if self.sessions.contains_key(&session_id) {
            return Err(RegistryError::SessionAlreadyExists(session_id));
        }

        self.sessions.insert(
            session_id,
            SessionEntry {
                login: None,
                outbox,
                connected_at: Utc::now(),
            },
        );

        debug!(
            session_id = %session_id,
            active_sessions = self.sessions.len(),
            "Session added"
        );

        let _ = self
            .event_publisher
            .send(SessionEvent::Connected { session_id });

        Ok(())
    }

    /// Removes a session. Unknown IDs are a no-op.
    fn handle_disconnect(&mut self, session_id: SessionId) -> bool {
        let Some(entry) = self.sessions.remove(&session_id) else {
            debug!(session_id = %session_id, "Disconnect for unknown session, ignoring");
            return false;
        };

        debug!(
            session_id = %session_id,
            login = ?entry.login,
            remaining_sessions = self.sessions.len(),
            "Session removed"
        );

        let _ = self.event_publisher.send(SessionEvent::Disconnected {
            session_id,
            login: entry.login,
        });

        true
    }

    fn handle_login(
        &mut self,
        session_id: SessionId,
        login: Login,
    ) -> Result<LoginOutcome, RegistryError> {
        match self.sessions.get(&session_id) {
            None => return Err(RegistryError::SessionNotFound(session_id)),
            Some(entry) if entry.login.is_some() => {
                return Err(RegistryError::AlreadyAuthenticated(session_id));
            }
            Some(_) => {}
        }

        if self.is_login_taken(&login, Some(session_id)) {
            warn!(
                session_id = %session_id,
                login = %login,
                "Login already in use, rejecting"
            );
            self.send_to(session_id, ServerReply::LoginTaken(login.clone()).to_string());
            let _ = self
                .event_publisher
                .send(SessionEvent::LoginRejected { session_id, login });
            return Ok(LoginOutcome::Taken);
        }

        if let Some(entry) = self.sessions.get_mut(&session_id) {
            entry.login = Some(login.clone());
        }

        info!(session_id = %session_id, login = %login, "New user");

        self.send_to(session_id, ServerReply::Welcome.to_string());
        self.replay_history(session_id);

        let _ = self
            .event_publisher
            .send(SessionEvent::Authenticated { session_id, login });

        Ok(LoginOutcome::Accepted)
    }

    fn handle_publish(
        &mut self,
        session_id: SessionId,
        body: String,
    ) -> Result<usize, RegistryError> {
        let login = match self.sessions.get(&session_id) {
            None => return Err(RegistryError::SessionNotFound(session_id)),
            Some(SessionEntry { login: None, .. }) => {
                return Err(RegistryError::NotAuthenticated(session_id));
            }
            Some(SessionEntry {
                login: Some(login), ..
            }) => login.clone(),
        };

        let message = ChatMessage::new(login, body).to_string();

        self.history.push(message.clone());
        let recipients = self.broadcast(session_id, &message);

        debug!(
            session_id = %session_id,
            recipients = recipients,
            history_len = self.history.len(),
            "Message broadcast"
        );

        let _ = self.event_publisher.send(SessionEvent::Published {
            session_id,
            message,
            recipients,
        });

        Ok(recipients)
    }

    // ========================================================================
    // Delivery
    // ========================================================================

    /// True iff a session other than `excluding` holds exactly `login`.
    fn is_login_taken(&self, login: &Login, excluding: Option<SessionId>) -> bool {
        self.sessions.iter().any(|(id, entry)| {
            Some(*id) != excluding && entry.login.as_ref() == Some(login)
        })
    }

    /// Queues `line` to every active session except `sender`.
    ///
    /// A recipient whose connection is already gone is skipped; it will be
    /// removed by its own disconnect. Returns the number of deliveries.
    fn broadcast(&self, sender: SessionId, line: &str) -> usize {
        let mut delivered = 0;

        for (id, entry) in &self.sessions {
            if *id == sender {
                continue;
            }

            if entry.outbox.send(line.to_string()).is_ok() {
                delivered += 1;
            } else {
                debug!(session_id = %id, "Failed to deliver to session, skipping");
            }
        }

        delivered
    }

    /// Sends the whole history as one newline-joined line; nothing if empty.
    fn replay_history(&self, session_id: SessionId) {
        if let Some(replay) = self.history.replay() {
            debug!(
                session_id = %session_id,
                messages = self.history.len(),
                "Replaying history"
            );
            self.send_to(session_id, replay);
        }
    }

    fn send_to(&self, session_id: SessionId, line: String) -> bool {
        let Some(entry) = self.sessions.get(&session_id) else {
            return false;
        };

        if entry.outbox.send(line).is_err() {
            debug!(session_id = %session_id, "Failed to deliver to session");
            return false;
        }

        true
    }

    // ========================================================================
    // Accessors (for testing)
    // ========================================================================

    /// Returns the number of sessions currently registered.
    #[cfg(test)]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
