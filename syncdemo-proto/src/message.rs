//! Wire format message types for the `SyncDemo` chat protocol.
//!
//! A [`ChatMessage`] is the application payload published under a peer's
//! prefix and fetched by the other members of the room. The sync layer
//! treats the encoded bytes as opaque.

use serde::{Deserialize, Serialize};

/// Maximum allowed encoded message size in bytes (64 KB).
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Second-precision UTC timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Creates a timestamp for the current instant.
    #[must_use]
    pub fn now() -> Self {
        let secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self(secs)
    }

    /// Creates a timestamp from seconds since the UNIX epoch.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// Returns the timestamp as seconds since the UNIX epoch.
    #[must_use]
    pub const fn as_secs(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// Kind of a chat message.
///
/// Only [`MessageType::Chat`] carries text meant for the transcript. The
/// other kinds travel on the wire but are never displayed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// A line of chat text.
    #[default]
    Chat,
    /// A peer announcing itself to the room.
    Hello,
    /// A peer leaving the room.
    Leave,
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chat => write!(f, "chat"),
            Self::Hello => write!(f, "hello"),
            Self::Leave => write!(f, "leave"),
        }
    }
}

/// A chat message exchanged between room members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Nick of the sender.
    pub from: String,
    /// Room the message was written in.
    pub to: String,
    /// Message text.
    pub data: String,
    /// When the message was authored.
    pub timestamp: Timestamp,
    /// Kind of message.
    pub msg_type: MessageType,
}

/// A required field of a [`ChatMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// The sender nick.
    From,
    /// The destination room.
    To,
    /// The message text.
    Data,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::From => write!(f, "from"),
            Self::To => write!(f, "to"),
            Self::Data => write!(f, "data"),
        }
    }
}

impl ChatMessage {
    /// Builds a chat-type message stamped with the current time.
    #[must_use]
    pub fn chat(from: impl Into<String>, to: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            data: data.into(),
            timestamp: Timestamp::now(),
            msg_type: MessageType::Chat,
        }
    }

    /// Returns the first required field that is empty, if any.
    #[must_use]
    pub fn missing_field(&self) -> Option<Field> {
        if self.from.is_empty() {
            Some(Field::From)
        } else if self.to.is_empty() {
            Some(Field::To)
        } else if self.data.is_empty() {
            Some(Field::Data)
        } else {
            None
        }
    }

    /// Whether this message may be handed to the transcript.
    ///
    /// Requires a chat-type message with a non-empty sender and text.
    #[must_use]
    pub fn is_displayable(&self) -> bool {
        self.msg_type == MessageType::Chat && !self.from.is_empty() && !self.data.is_empty()
    }
}
