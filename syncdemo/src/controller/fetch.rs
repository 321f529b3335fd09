//! Completion of individual fetches.

use syncdemo_proto::codec;
use syncdemo_proto::message::ChatMessage;

use crate::sync::{DataName, SocketFactory};

use super::{ControllerError, IntegrityError, SyncController, ViewEvent};

impl<F: SocketFactory> SyncController<F> {
    /// Handle a fetched payload.
    ///
    /// Returns the decoded message when it is displayable, `None` for
    /// well-formed messages that are not shown (hello/leave, empty text).
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Integrity`] if the payload does not decode.
    /// Nothing is recorded for the prefix in that case.
    pub(crate) fn on_fetch_complete(
        &mut self,
        name: &str,
        payload: &[u8],
    ) -> Result<Option<ChatMessage>, ControllerError> {
        self.pending.remove(name);

        let message = codec::decode(payload)
            .map_err(|e| ControllerError::integrity(name, payload, IntegrityError::Decode(e)))?;

        let (prefix, seq) = DataName::split(name);
        if let Some(seq) = seq {
            self.peers.observe(prefix, seq);
        }
        self.peers.label(prefix, &message.from);
        self.emit_peer(prefix);

        if !message.is_displayable() {
            tracing::debug!(
                name,
                msg_type = %message.msg_type,
                "fetched message not displayable"
            );
            return Ok(None);
        }

        tracing::debug!(name, from = %message.from, "message received");
        self.emit(ViewEvent::Message(message.clone()));
        Ok(Some(message))
    }

    /// The transport gave up on `name` after its retry budget.
    pub(crate) fn on_fetch_failed(&mut self, name: &str, reason: &str) {
        self.pending.remove(name);
        tracing::warn!(name, reason, "fetch failed, peer may be unreachable");
        self.emit(ViewEvent::PeerUnreachable {
            name: name.to_string(),
            reason: reason.to_string(),
        });
    }

    /// A prefix left the group. Its tree node is kept.
    pub(crate) fn on_peer_removed(&self, prefix: &str) {
        tracing::info!(prefix, "peer left the group");
        self.emit(ViewEvent::PeerRemoved {
            prefix: prefix.to_string(),
        });
    }
}
