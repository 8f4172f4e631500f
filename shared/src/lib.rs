//! Wire protocol shared by the chat server, messenger and viewer.
//!
//! Every payload is a single `\n`-terminated UTF-8 line (see [`frame`]). The
//! first line a client sends is its handshake: either [`VIEWER_TOKEN`] or
//! [`NAME_PREFIX`] followed by a display name.

pub mod frame;

pub use frame::{write_frame, write_frames, FrameReader};

use std::io;
use thiserror::Error;

/// Handshake sent by read-only clients
pub const VIEWER_TOKEN: &str = "viewer";
/// Prefix of the handshake sent by messenger clients
pub const NAME_PREFIX: &str = "name:";
/// Longest frame handed out before an unterminated line is split
pub const MAX_FRAME_LEN: usize = 2 * 1024;
/// Longest messenger name accepted in a handshake, in bytes
pub const MAX_NAME_LEN: usize = 64;
/// Longest line a viewer can receive: a full frame behind `"name: "`
pub const MAX_BROADCAST_LEN: usize = MAX_NAME_LEN + 2 + MAX_FRAME_LEN;
pub const DEFAULT_PORT: u16 = 8080;

/// Address the clients connect to when none is given
pub fn default_server_addr() -> String {
    format!("127.0.0.1:{}", DEFAULT_PORT)
}

/// Classified first frame of a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handshake {
    Viewer,
    Messenger(String),
}

impl Handshake {
    /// Parses a handshake frame.
    ///
    /// The name of a messenger handshake is taken verbatim after the prefix;
    /// it must contain at least one non-whitespace character and be at most
    /// [`MAX_NAME_LEN`] bytes long.
    pub fn parse(frame: &str) -> Result<Self, HandshakeError> {
        if frame == VIEWER_TOKEN {
            return Ok(Handshake::Viewer);
        }

        match frame.strip_prefix(NAME_PREFIX) {
            Some(name) if name.trim().is_empty() => Err(HandshakeError::EmptyName),
            Some(name) if name.len() > MAX_NAME_LEN => {
                Err(HandshakeError::NameTooLong(name.len()))
            }
            Some(name) => Ok(Handshake::Messenger(name.to_string())),
            None => Err(HandshakeError::Unrecognized(frame.to_string())),
        }
    }

    /// Renders the frame a client sends to announce itself
    pub fn to_frame(&self) -> String {
        match self {
            Handshake::Viewer => VIEWER_TOKEN.to_string(),
            Handshake::Messenger(name) => format!("{}{}", NAME_PREFIX, name),
        }
    }
}

/// Reasons a connection fails to register
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("no handshake received before the timeout")]
    Timeout,

    #[error("connection closed before a handshake was received")]
    Closed,

    #[error("unrecognized handshake: {0:?}")]
    Unrecognized(String),

    #[error("messenger name is empty")]
    EmptyName,

    #[error("messenger name is {0} bytes, longer than {MAX_NAME_LEN}")]
    NameTooLong(usize),

    #[error("name {0:?} is already taken")]
    NameTaken(String),

    #[error("connection is already registered")]
    AlreadyRegistered,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub fn welcome_line(chat_name: &str) -> String {
    format!("Welcome to the \"{}\" Chat Server!", chat_name)
}

pub fn join_notice(name: &str) -> String {
    format!("{} has joined the chat.", name)
}

pub fn leave_notice(name: &str) -> String {
    format!("{} has left the chat", name)
}

/// Formats a messenger's text as it is broadcast to viewers
pub fn chat_line(name: &str, text: &str) -> String {
    format!("{}: {}", name, text)
}

/// Returns true if a messenger's input line asks to end the session
pub fn is_quit_command(line: &str) -> bool {
    let line = line.trim();
    line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_viewer() {
        assert_eq!(Handshake::parse("viewer").unwrap(), Handshake::Viewer);
    }

    #[test]
    fn test_parse_messenger() {
        assert_eq!(
            Handshake::parse("name:alice").unwrap(),
            Handshake::Messenger("alice".to_string())
        );
    }

    #[test]
    fn test_parse_keeps_colons_in_name() {
        assert_eq!(
            Handshake::parse("name:a:b").unwrap(),
            Handshake::Messenger("a:b".to_string())
        );
    }

    #[test]
    fn test_parse_empty_name() {
        assert!(matches!(
            Handshake::parse("name:"),
            Err(HandshakeError::EmptyName)
        ));
        assert!(matches!(
            Handshake::parse("name:   "),
            Err(HandshakeError::EmptyName)
        ));
    }

    #[test]
    fn test_parse_name_length_limit() {
        let longest = "n".repeat(MAX_NAME_LEN);
        assert_eq!(
            Handshake::parse(&format!("name:{}", longest)).unwrap(),
            Handshake::Messenger(longest)
        );

        let too_long = "n".repeat(MAX_NAME_LEN + 1);
        assert!(matches!(
            Handshake::parse(&format!("name:{}", too_long)),
            Err(HandshakeError::NameTooLong(len)) if len == MAX_NAME_LEN + 1
        ));
    }

    #[test]
    fn test_longest_chat_line_fits_broadcast_limit() {
        let line = chat_line(&"n".repeat(MAX_NAME_LEN), &"t".repeat(MAX_FRAME_LEN));
        assert_eq!(line.len(), MAX_BROADCAST_LEN);
    }

    #[test]
    fn test_default_server_addr_uses_default_port() {
        assert_eq!(default_server_addr(), format!("127.0.0.1:{}", DEFAULT_PORT));
    }

    #[test]
    fn test_parse_unrecognized() {
        for frame in ["", "Viewer", "viewers", "hello", "nam:bob"] {
            match Handshake::parse(frame) {
                Err(HandshakeError::Unrecognized(payload)) => assert_eq!(payload, frame),
                other => panic!("Expected rejection for {:?}, got {:?}", frame, other),
            }
        }
    }

    #[test]
    fn test_handshake_frames() {
        assert_eq!(Handshake::Viewer.to_frame(), "viewer");
        assert_eq!(
            Handshake::Messenger("bob".to_string()).to_frame(),
            "name:bob"
        );
    }

    #[test]
    fn test_notice_formatting() {
        assert_eq!(join_notice("alice"), "alice has joined the chat.");
        assert_eq!(leave_notice("carol"), "carol has left the chat");
        assert_eq!(chat_line("alice", "hi"), "alice: hi");
        assert_eq!(
            welcome_line("Chat App"),
            "Welcome to the \"Chat App\" Chat Server!"
        );
    }

    #[test]
    fn test_quit_commands() {
        assert!(is_quit_command("quit"));
        assert!(is_quit_command("EXIT"));
        assert!(is_quit_command(" Quit "));
        assert!(!is_quit_command("quitting"));
        assert!(!is_quit_command(""));
    }
}
