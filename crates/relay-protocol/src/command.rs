//! Parsing of the line sent by a client before it has logged in.

use relay_core::Login;

/// Literal prefix of the login command.
pub const LOGIN_PREFIX: &str = "login:";

/// Interpretation of a line received from an unauthenticated client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// `login:<name>`; the name is everything after the prefix, untrimmed.
    Login(Login),

    /// Anything that is not a login command.
    Invalid,
}

impl ClientCommand {
    /// Parses a line received from an unauthenticated client.
    ///
    /// The prefix match is exact and case-sensitive; `Login:bob` and
    /// ` login:bob` are both invalid. `login:` with nothing after it yields
    /// an empty login.
    pub fn parse(line: &str) -> Self {
        match line.strip_prefix(LOGIN_PREFIX) {
            Some(name) => Self::Login(Login::new(name)),
            None => Self::Invalid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_login() {
        assert_eq!(
            ClientCommand::parse("login:bob"),
            ClientCommand::Login(Login::new("bob"))
        );
    }

    #[test]
    fn test_parse_login_keeps_whitespace() {
        assert_eq!(
            ClientCommand::parse("login: bob "),
            ClientCommand::Login(Login::new(" bob "))
        );
    }

    #[test]
    fn test_parse_login_only_strips_first_prefix() {
        assert_eq!(
            ClientCommand::parse("login:login:x"),
            ClientCommand::Login(Login::new("login:x"))
        );
    }

    #[test]
    fn test_parse_empty_login() {
        assert_eq!(
            ClientCommand::parse("login:"),
            ClientCommand::Login(Login::new(""))
        );
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!(ClientCommand::parse("hello"), ClientCommand::Invalid);
        assert_eq!(ClientCommand::parse(""), ClientCommand::Invalid);
        assert_eq!(ClientCommand::parse("Login:bob"), ClientCommand::Invalid);
        assert_eq!(ClientCommand::parse(" login:bob"), ClientCommand::Invalid);
        assert_eq!(ClientCommand::parse("login"), ClientCommand::Invalid);
    }
}
