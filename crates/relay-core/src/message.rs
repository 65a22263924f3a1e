//! Chat message formatting.

use std::fmt;

use crate::session::Login;

/// A line sent by an authenticated client, tagged with its author.
///
/// Renders as `<login>: body`, which is both what other clients receive
/// and what is stored in history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub login: Login,
    pub body: String,
}

impl ChatMessage {
    pub fn new(login: Login, body: impl Into<String>) -> Self {
        Self {
            login,
            body: body.into(),
        }
    }
}

impl fmt::Display for ChatMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>: {}", self.login, self.body)
    }
}
