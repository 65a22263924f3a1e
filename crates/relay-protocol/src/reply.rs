//! Fixed replies the server sends to clients.

use std::fmt;

use relay_core::Login;

/// Replies sent by the server in response to a client's login attempt.
///
/// The `Display` impl yields the exact line put on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerReply {
    /// Login accepted.
    Welcome,

    /// First line was not a `login:` command.
    InvalidLogin,

    /// Another connected client already uses this login.
    LoginTaken(Login),
}

impl fmt::Display for ServerReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Welcome => write!(f, "Welcome!!!"),
            Self::InvalidLogin => write!(f, "Неверный логин"),
            Self::LoginTaken(login) => write!(f, "Логин {login} занят, попробуйте другой"),
        }
    }
}
