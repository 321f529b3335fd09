//! Serialization and deserialization of [`ChatMessage`] payloads.
//!
//! The wire form is the postcard encoding of the message. Encoding checks
//! the required fields first and sizes the output buffer exactly; decoding
//! rejects anything that is not one complete, well-formed message.

use crate::message::{ChatMessage, Field, MAX_MESSAGE_SIZE};

/// Error returned when a message cannot be encoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// A required field is empty.
    #[error("required field `{0}` is not set")]
    MissingField(Field),
    /// The encoded message exceeds [`MAX_MESSAGE_SIZE`].
    #[error("message too large ({size} bytes, max {max} bytes)")]
    TooLarge {
        /// Encoded size in bytes.
        size: usize,
        /// Maximum allowed size in bytes.
        max: usize,
    },
    /// The serializer failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Error returned when bytes do not decode to a well-formed message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The bytes are not a postcard-encoded message.
    #[error("malformed message ({size} bytes): {reason}")]
    Malformed {
        /// Length of the rejected input.
        size: usize,
        /// Deserializer error text.
        reason: String,
    },
    /// A complete message was followed by extra bytes.
    #[error("{trailing} trailing bytes after message")]
    TrailingBytes {
        /// Number of unconsumed bytes.
        trailing: usize,
    },
    /// The message parsed but a required field is empty.
    #[error("required field `{0}` is not set")]
    MissingField(Field),
}

/// Returns the exact encoded size of `msg` without allocating the output.
///
/// # Errors
///
/// Returns [`EncodeError::Serialization`] if the serializer fails.
pub fn encoded_len(msg: &ChatMessage) -> Result<usize, EncodeError> {
    postcard::experimental::serialized_size(msg)
        .map_err(|e| EncodeError::Serialization(e.to_string()))
}

/// Encodes a [`ChatMessage`] into its wire form.
///
/// # Errors
///
/// Returns [`EncodeError::MissingField`] if `from`, `to` or `data` is
/// empty, [`EncodeError::TooLarge`] if the encoding exceeds
/// [`MAX_MESSAGE_SIZE`], or [`EncodeError::Serialization`] if the
/// serializer fails.
pub fn encode(msg: &ChatMessage) -> Result<Vec<u8>, EncodeError> {
    if let Some(field) = msg.missing_field() {
        return Err(EncodeError::MissingField(field));
    }

    let size = encoded_len(msg)?;
    if size > MAX_MESSAGE_SIZE {
        return Err(EncodeError::TooLarge {
            size,
            max: MAX_MESSAGE_SIZE,
        });
    }

    let mut buf = vec![0u8; size];
    let used = postcard::to_slice(msg, &mut buf)
        .map_err(|e| EncodeError::Serialization(e.to_string()))?
        .len();
    buf.truncate(used);
    Ok(buf)
}

/// Decodes a [`ChatMessage`] from its wire form.
///
/// # Errors
///
/// Returns [`DecodeError::Malformed`] if the bytes cannot be parsed,
/// [`DecodeError::TrailingBytes`] if input remains after the message, or
/// [`DecodeError::MissingField`] if a required field is empty.
pub fn decode(bytes: &[u8]) -> Result<ChatMessage, DecodeError> {
    let (msg, rest) =
        postcard::take_from_bytes::<ChatMessage>(bytes).map_err(|e| DecodeError::Malformed {
            size: bytes.len(),
            reason: e.to_string(),
        })?;

    if !rest.is_empty() {
        return Err(DecodeError::TrailingBytes {
            trailing: rest.len(),
        });
    }

    if let Some(field) = msg.missing_field() {
        return Err(DecodeError::MissingField(field));
    }

    Ok(msg)
}
