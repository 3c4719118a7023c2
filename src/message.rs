//! Message protocol definitions
//!
//! Plain text in both directions. Client messages are classified by
//! [`ClientMessage::parse`]; server messages render through `Display`.

use std::fmt;

/// Prefix that marks a nickname command, trailing space included
pub const NICKNAME_PREFIX: &str = "NICKNAME ";

/// Literal that ends a session
pub const EXIT_COMMAND: &str = "exit";

/// Client → Server message
///
/// Borrowed from the received text; checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMessage<'a> {
    /// `NICKNAME <name>`, carrying the untrimmed remainder
    Nickname(&'a str),
    /// Exactly `exit`
    Exit,
    /// Anything else
    Chat(&'a str),
}

impl<'a> ClientMessage<'a> {
    /// Classify one received message
    ///
    /// Matching is case-sensitive and does not trim, so ` exit` is chat text.
    /// Inputs shorter than the nickname prefix simply fail the prefix match.
    pub fn parse(text: &'a str) -> Self {
        if let Some(rest) = text.strip_prefix(NICKNAME_PREFIX) {
            ClientMessage::Nickname(rest)
        } else if text == EXIT_COMMAND {
            ClientMessage::Exit
        } else {
            ClientMessage::Chat(text)
        }
    }

    /// Build the wire form of a nickname command
    pub fn nickname_command(nickname: &str) -> String {
        format!("{NICKNAME_PREFIX}{nickname}")
    }
}

/// Server → Client message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Confirmation sent back to whoever set a nickname
    NicknameSet { nickname: String },
    /// Someone joined
    Joined { nickname: String },
    /// Someone left, by `exit` or by dropping the connection
    Left { nickname: String },
    /// Attributed chat line
    Chat { from: String, content: String },
    /// Receipt reply of the echo handler
    Received { content: String },
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::NicknameSet { nickname } => write!(f, "Nickname set to: {nickname}"),
            ServerMessage::Joined { nickname } => write!(f, "SYSTEM: {nickname} joined the chat"),
            ServerMessage::Left { nickname } => write!(f, "SYSTEM: {nickname} left the chat"),
            ServerMessage::Chat { from, content } => write!(f, "[{from}]: {content}"),
            ServerMessage::Received { content } => write!(f, "Received: {content}"),
        }
    }
}
