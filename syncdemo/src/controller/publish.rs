//! Publishing locally authored messages.

use syncdemo_proto::codec;
use syncdemo_proto::message::ChatMessage;

use crate::sync::{SeqNo, SocketFactory, SyncSocket};

use super::{ControllerError, IntegrityError, SyncController, ViewEvent};

impl<F: SocketFactory> SyncController<F> {
    /// Publish `text` to the current room.
    ///
    /// The message is shown locally before the transport sees it and is not
    /// withdrawn if publishing fails. Empty text is ignored.
    ///
    /// Returns the sequence number the transport assigned.
    ///
    /// # Errors
    ///
    /// - [`ControllerError::NotBound`] if settings are incomplete.
    /// - [`ControllerError::Integrity`] if the message cannot be encoded.
    /// - [`ControllerError::Transport`] if the transport refuses the item.
    pub fn publish(&self, text: &str) -> Result<Option<SeqNo>, ControllerError> {
        if text.is_empty() {
            return Ok(None);
        }
        let (Some(socket), Some(nick), Some(room), Some(prefix)) = (
            self.socket.as_ref(),
            self.settings.nick(),
            self.settings.chatroom(),
            self.settings.prefix(),
        ) else {
            return Err(ControllerError::NotBound);
        };

        let message = ChatMessage::chat(nick, room, text);
        self.emit(ViewEvent::Message(message.clone()));

        let payload = codec::encode(&message).map_err(|e| {
            ControllerError::integrity(prefix, text.as_bytes(), IntegrityError::Encode(e))
        })?;

        let seq = socket.publish(prefix, self.session, &payload, self.config.freshness)?;
        tracing::debug!(prefix, seq = %seq, size = payload.len(), "message published");
        Ok(Some(seq))
    }
}
