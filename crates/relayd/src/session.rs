//! Per-connection session state machine.
//!
//! A `Session` starts unauthenticated. The only line it accepts in that
//! state is `login:<name>`; anything else gets the invalid-login reply and
//! the client may try again. A successful login is final: every later line
//! is published to the registry as a chat message.
//!
//! ```text
//!   Unauthenticated ──login:<free name>──▶ Authenticated
//!        │    ▲                                  │
//!        │    └── other line (error reply)       └── line → publish
//!        └── login:<taken name> → reply, close
//! ```

use async_trait::async_trait;
use tracing::{debug, info, warn};

use relay_core::{Login, SessionId};
use relay_protocol::{ClientCommand, ServerReply};

use crate::registry::{LoginOutcome, Outbox, RegistryHandle};
use crate::server::{Flow, LineProtocol};

/// Server-side state of one connected client.
pub struct Session {
    id: SessionId,
    registry: RegistryHandle,
    outbox: Outbox,
    login: Option<Login>,
    registered: bool,
}

impl Session {
    /// Creates an unauthenticated session.
    ///
    /// `outbox` is the queue this session's outbound lines are written from;
    /// a clone is handed to the registry on connect.
    pub fn new(id: SessionId, registry: RegistryHandle, outbox: Outbox) -> Self {
        Self {
            id,
            registry,
            outbox,
            login: None,
            registered: false,
        }
    }

    /// Login this session authenticated with, if any.
    pub fn login(&self) -> Option<&Login> {
        self.login.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.login.is_some()
    }

    fn reply(&self, reply: ServerReply) {
        if self.outbox.send(reply.to_string()).is_err() {
            debug!(session_id = %self.id, "Failed to queue reply");
        }
    }

    async fn handle_login_line(&mut self, line: &str) -> Flow {
        let login = match ClientCommand::parse(line) {
            ClientCommand::Login(login) => login,
            ClientCommand::Invalid => {
                debug!(session_id = %self.id, "Invalid login command");
                self.reply(ServerReply::InvalidLogin);
                return Flow::Continue;
            }
        };

        match self.registry.login(self.id, login.clone()).await {
            Ok(LoginOutcome::Accepted) => {
                self.login = Some(login);
                Flow::Continue
            }
            Ok(LoginOutcome::Taken) => Flow::Close,
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "Login failed");
                Flow::Close
            }
        }
    }

    async fn handle_chat_line(&mut self, line: String) -> Flow {
        match self.registry.publish(self.id, line).await {
            Ok(recipients) => {
                debug!(session_id = %self.id, recipients, "Message published");
                Flow::Continue
            }
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "Publish failed");
                Flow::Close
            }
        }
    }
}

#[async_trait]
impl LineProtocol for Session {
    async fn on_connect(&mut self) -> Flow {
        if let Err(e) = self.registry.connect(self.id, self.outbox.clone()).await {
            warn!(session_id = %self.id, error = %e, "Failed to register session");
            return Flow::Close;
        }

        self.registered = true;
        info!(session_id = %self.id, "Client connected");
        Flow::Continue
    }

    async fn on_line(&mut self, line: String) -> Flow {
        if self.is_authenticated() {
            self.handle_chat_line(line).await
        } else {
            self.handle_login_line(&line).await
        }
    }

    async fn on_disconnect(&mut self) {
        if !self.registered {
            return;
        }

        self.registry.disconnect(self.id).await;
        self.registered = false;

        info!(session_id = %self.id, login = ?self.login, "Client disconnected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::spawn_registry;
    use tokio::sync::mpsc;

    fn new_session(
        registry: &RegistryHandle,
        id: u64,
    ) -> (Session, mpsc::UnboundedReceiver<String>) {
        let (outbox, inbox) = mpsc::unbounded_channel();
        (Session::new(SessionId::new(id), registry.clone(), outbox), inbox)
    }

    fn drain(inbox: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = inbox.try_recv() {
            lines.push(line);
        }
        lines
    }

    #[tokio::test]
    async fn test_connect_registers_session() {
        let registry = spawn_registry();
        let (mut session, _inbox) = new_session(&registry, 1);

        assert_eq!(session.on_connect().await, Flow::Continue);

        let view = registry.get_session(SessionId::new(1)).await.unwrap();
        assert!(!view.is_authenticated());
    }

    #[tokio::test]
    async fn test_invalid_login_keeps_connection_open() {
        let registry = spawn_registry();
        let (mut session, mut inbox) = new_session(&registry, 1);
        session.on_connect().await;

        assert_eq!(session.on_line("hello".into()).await, Flow::Continue);
        assert!(!session.is_authenticated());
        assert_eq!(drain(&mut inbox), vec!["Неверный логин"]);

        assert_eq!(session.on_line("login:x".into()).await, Flow::Continue);
        assert_eq!(session.login(), Some(&Login::new("x")));
        assert_eq!(drain(&mut inbox), vec!["Welcome!!!"]);
    }

    #[tokio::test]
    async fn test_empty_line_is_invalid_login() {
        let registry = spawn_registry();
        let (mut session, mut inbox) = new_session(&registry, 1);
        session.on_connect().await;

        assert_eq!(session.on_line(String::new()).await, Flow::Continue);
        assert_eq!(drain(&mut inbox), vec!["Неверный логин"]);
    }

    #[tokio::test]
    async fn test_taken_login_closes_session() {
        let registry = spawn_registry();
        let (mut first, _first_inbox) = new_session(&registry, 1);
        let (mut second, mut second_inbox) = new_session(&registry, 2);
        first.on_connect().await;
        second.on_connect().await;

        first.on_line("login:bob".into()).await;
        assert_eq!(second.on_line("login:bob".into()).await, Flow::Close);
        assert!(!second.is_authenticated());
        assert_eq!(
            drain(&mut second_inbox),
            vec!["Логин bob занят, попробуйте другой"]
        );

        second.on_disconnect().await;
        assert!(registry.get_session(SessionId::new(2)).await.is_none());
        assert!(registry.get_session(SessionId::new(1)).await.is_some());
    }

    #[tokio::test]
    async fn test_authenticated_lines_are_published() {
        let registry = spawn_registry();
        let (mut alice, mut alice_inbox) = new_session(&registry, 1);
        let (mut bob, mut bob_inbox) = new_session(&registry, 2);
        alice.on_connect().await;
        bob.on_connect().await;
        alice.on_line("login:a".into()).await;
        bob.on_line("login:b".into()).await;
        drain(&mut alice_inbox);
        drain(&mut bob_inbox);

        assert_eq!(alice.on_line("hi".into()).await, Flow::Continue);

        assert_eq!(drain(&mut bob_inbox), vec!["<a>: hi"]);
        assert!(drain(&mut alice_inbox).is_empty());
        assert_eq!(registry.history().await, vec!["<a>: hi"]);
    }

    #[tokio::test]
    async fn test_login_line_after_authentication_is_a_message() {
        let registry = spawn_registry();
        let (mut session, _inbox) = new_session(&registry, 1);
        session.on_connect().await;
        session.on_line("login:a".into()).await;

        session.on_line("login:b".into()).await;

        assert_eq!(session.login(), Some(&Login::new("a")));
        assert_eq!(registry.history().await, vec!["<a>: login:b"]);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let registry = spawn_registry();
        let (mut session, _inbox) = new_session(&registry, 1);
        session.on_connect().await;

        session.on_disconnect().await;
        session.on_disconnect().await;

        assert!(registry.get_all_sessions().await.is_empty());
    }
}
