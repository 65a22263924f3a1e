//! Client interface for interacting with the RegistryActor.
//!
//! The `RegistryHandle` provides a cheap-to-clone interface for sending commands
//! to the registry actor and subscribing to session events.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Channel errors are mapped to `RegistryError::ChannelClosed`

use tokio::sync::{broadcast, mpsc, oneshot};

use relay_core::{Login, SessionId};

use super::commands::{
    LoginOutcome, Outbox, RegistryCommand, RegistryError, SessionEvent, SessionView,
};

// ============================================================================
// Registry Handle
// ============================================================================

/// Handle for interacting with the registry actor.
///
/// This is a cheap-to-clone handle that can be shared across tasks.
/// All methods are async and communicate with the actor via channels.
///
/// # Usage
///
/// ```ignore
/// let handle = registry_handle.clone();
///
/// handle.connect(session_id, outbox).await?;
/// match handle.login(session_id, Login::new("bob")).await? {
///     LoginOutcome::Accepted => { /* welcome + history already queued */ }
///     LoginOutcome::Taken => { /* close the connection */ }
/// }
/// handle.publish(session_id, "hello".to_string()).await?;
/// handle.disconnect(session_id).await;
/// ```
#[derive(Clone)]
pub struct RegistryHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<RegistryCommand>,

    /// Event broadcaster for subscribing to updates
    event_sender: broadcast::Sender<SessionEvent>,
}

impl RegistryHandle {
    /// Create a new registry handle.
    ///
    /// # Arguments
    ///
    /// * `sender` - The command channel sender for communicating with the actor
    /// * `event_sender` - The broadcast sender for subscribing to events
    pub fn new(
        sender: mpsc::Sender<RegistryCommand>,
        event_sender: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            sender,
            event_sender,
        }
    }

    /// Add a newly connected session to the active set.
    ///
    /// # Errors
    ///
    /// - `RegistryError::SessionAlreadyExists` if the ID is already active
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn connect(
        &self,
        session_id: SessionId,
        outbox: Outbox,
    ) -> Result<(), RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Connect {
                session_id,
                outbox,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)?
    }

    /// Remove a session from the active set.
    ///
    /// Returns `false` if the session was not present or the actor has
    /// shut down; removing twice is harmless.
    pub async fn disconnect(&self, session_id: SessionId) -> bool {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Disconnect {
                session_id,
                respond_to: tx,
            })
            .await
            .is_err()
        {
            return false;
        }

        rx.await.unwrap_or(false)
    }

    /// Try to authenticate a session.
    ///
    /// On `Accepted` the welcome line and history replay have already been
    /// queued to the session; on `Taken` the rejection has been queued.
    ///
    /// # Errors
    ///
    /// - `RegistryError::SessionNotFound` if the session is not connected
    /// - `RegistryError::AlreadyAuthenticated` if it already logged in
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn login(
        &self,
        session_id: SessionId,
        login: Login,
    ) -> Result<LoginOutcome, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Login {
                session_id,
                login,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)?
    }

    /// Append a message from an authenticated session to history and
    /// broadcast it to every other session.
    ///
    /// Returns the number of sessions the message was delivered to.
    ///
    /// # Errors
    ///
    /// - `RegistryError::SessionNotFound` if the session is not connected
    /// - `RegistryError::NotAuthenticated` if the session has not logged in
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn publish(
        &self,
        session_id: SessionId,
        body: String,
    ) -> Result<usize, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Publish {
                session_id,
                body,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)?
    }

    /// Check whether `login` is held by an active session other than `excluding`.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn is_login_taken(
        &self,
        login: Login,
        excluding: Option<SessionId>,
    ) -> Result<bool, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::IsLoginTaken {
                login,
                excluding,
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)
    }

    /// Get a single session by ID.
    ///
    /// Returns `None` if the session doesn't exist or if communication
    /// with the actor fails.
    pub async fn get_session(&self, session_id: SessionId) -> Option<SessionView> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::GetSession {
                session_id,
                respond_to: tx,
            })
            .await
            .ok()?;

        rx.await.ok()?
    }

    /// Get all active sessions as views.
    ///
    /// Returns an empty vector if no sessions are registered or if
    /// communication with the actor fails.
    pub async fn get_all_sessions(&self) -> Vec<SessionView> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::GetAllSessions { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// Get the stored history, oldest first.
    ///
    /// Returns an empty vector if communication with the actor fails.
    pub async fn history(&self) -> Vec<String> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::GetHistory { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// Subscribe to session lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_sender.subscribe()
    }

    /// Check if the registry actor is still running.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handle_reports_channel_closed() {
        let (cmd_tx, cmd_rx) = mpsc::channel(1);
        let (event_tx, _) = broadcast::channel(1);
        let handle = RegistryHandle::new(cmd_tx, event_tx);
        drop(cmd_rx);

        assert!(!handle.is_connected());

        let (outbox, _inbox) = mpsc::unbounded_channel();
        assert_eq!(
            handle.connect(SessionId::new(1), outbox).await,
            Err(RegistryError::ChannelClosed)
        );
        assert_eq!(
            handle.login(SessionId::new(1), Login::new("a")).await,
            Err(RegistryError::ChannelClosed)
        );
        assert!(!handle.disconnect(SessionId::new(1)).await);
        assert!(handle.get_all_sessions().await.is_empty());
        assert!(handle.history().await.is_empty());
        assert!(handle.get_session(SessionId::new(1)).await.is_none());
    }
}
