//! Chat identity and the replies a transport owes the server.
//!
//! These are the parts of a chat session that do not depend on the wire
//! protocol: who we are, how to pick another nick when ours is taken, and
//! answering keepalive pings. A transport feeds inbound server traffic to
//! [`Session::handle`] and writes out whatever [`Reply`] comes back.

use crate::config::Config;

/// Nicks shorter than this get an underscore appended when taken.
const MAX_NICK_LEN: usize = 16;

/// Length a nick is cut to once appending would make it too long.
const TRIMMED_NICK_LEN: usize = 12;

/// Who the relay is on the chat server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub nick: String,
    /// Real name / display name.
    pub name: String,
    /// `host:port`.
    pub server: String,
    pub tls: bool,
}

impl Identity {
    pub fn from_config(config: &Config) -> Self {
        Self {
            nick: config.nick.clone(),
            name: config.name.clone(),
            server: config.server.clone(),
            tls: config.tls,
        }
    }
}

/// Nick to try after `nick` was rejected as taken.
///
/// Short nicks get an underscore appended. Once a nick reaches 16
/// characters, trailing underscores are stripped and anything longer than 12
/// characters is cut to 12 plus one underscore, so repeated collisions cycle
/// instead of growing without bound.
pub fn next_nick(nick: &str) -> String {
    if nick.chars().count() < MAX_NICK_LEN {
        return format!("{nick}_");
    }

    let trimmed = nick.trim_end_matches('_');
    if trimmed.chars().count() > TRIMMED_NICK_LEN {
        let mut cut: String = trimmed.chars().take(TRIMMED_NICK_LEN).collect();
        cut.push('_');
        cut
    } else {
        trimmed.to_string()
    }
}

/// Inbound server traffic a transport hands to its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// Keepalive from the server, carrying its token.
    Ping(String),
    /// The nick we asked for is in use.
    NickInUse,
    /// Anything else. Only counts as liveness evidence.
    Message,
}

/// What the transport must send back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Pong(String),
    Nick(String),
}

/// Session state owned by a transport.
#[derive(Debug, Clone)]
pub struct Session {
    identity: Identity,
}

impl Session {
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn nick(&self) -> &str {
        &self.identity.nick
    }

    /// React to one inbound event. A taken nick is replaced for the rest of
    /// the session, including later reconnects.
    pub fn handle(&mut self, event: &ServerEvent) -> Option<Reply> {
        match event {
            ServerEvent::Ping(token) => Some(Reply::Pong(token.clone())),
            ServerEvent::NickInUse => {
                let nick = next_nick(&self.identity.nick);
                tracing::info!(old = %self.identity.nick, new = %nick, "Nick taken, changing nick");
                self.identity.nick = nick.clone();
                Some(Reply::Nick(nick))
            }
            ServerEvent::Message => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn identity(nick: &str) -> Identity {
        Identity {
            nick: nick.to_string(),
            name: "Relay".to_string(),
            server: "irc.example.net:6697".to_string(),
            tls: true,
        }
    }

    #[test]
    fn test_short_nick_gets_underscore() {
        assert_eq!(next_nick("relay"), "relay_");
        assert_eq!(next_nick("relay_"), "relay__");
        // 15 characters is still below the limit.
        assert_eq!(next_nick("abcdefghijklmno"), "abcdefghijklmno_");
    }

    #[test]
    fn test_long_nick_is_cut_to_twelve() {
        assert_eq!(next_nick("abcdefghijklmnop"), "abcdefghijkl_");
        assert_eq!(next_nick("abcdefghijklmn__"), "abcdefghijkl_");
    }

    #[test]
    fn test_long_nick_of_underscores_is_trimmed_only() {
        // Trimming leaves 12 characters, which is not cut further.
        assert_eq!(next_nick("abcdefghijkl____"), "abcdefghijkl");
    }

    #[test]
    fn test_repeated_collisions_stay_bounded() {
        let mut nick = "feedrelay".to_string();
        for _ in 0..50 {
            nick = next_nick(&nick);
            assert!(nick.chars().count() <= MAX_NICK_LEN, "{nick}");
        }
    }

    #[test]
    fn test_ping_is_answered_with_token() {
        let mut session = Session::new(identity("relay"));
        assert_eq!(
            session.handle(&ServerEvent::Ping("irc.example.net".into())),
            Some(Reply::Pong("irc.example.net".into()))
        );
        assert_eq!(session.nick(), "relay");
    }

    #[test]
    fn test_nick_in_use_rotates_and_persists() {
        let mut session = Session::new(identity("relay"));
        assert_eq!(
            session.handle(&ServerEvent::NickInUse),
            Some(Reply::Nick("relay_".into()))
        );
        assert_eq!(
            session.handle(&ServerEvent::NickInUse),
            Some(Reply::Nick("relay__".into()))
        );
        assert_eq!(session.identity().nick, "relay__");
    }

    #[test]
    fn test_other_traffic_needs_no_reply() {
        let mut session = Session::new(identity("relay"));
        assert_eq!(session.handle(&ServerEvent::Message), None);
    }

    #[test]
    fn test_identity_from_config() {
        let config = Config {
            nick: "bot".into(),
            name: "Bot".into(),
            server: "irc.example.net:6667".into(),
            tls: false,
            ..Config::default()
        };
        assert_eq!(
            Identity::from_config(&config),
            Identity {
                nick: "bot".into(),
                name: "Bot".into(),
                server: "irc.example.net:6667".into(),
                tls: false,
            }
        );
    }
}
