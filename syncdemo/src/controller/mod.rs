//! Sync controller for `SyncDemo`.
//!
//! Contains the [`SyncController`] which keeps the local view of a room in
//! step with the group: it reacts to missing-data notifications by
//! fetching (or deliberately skipping) the missing items, decodes fetched
//! payloads, tracks per-prefix progress in a [`PeerSequenceTable`], and
//! publishes locally authored messages.
//!
//! The controller is single-threaded. Sockets report to it through the
//! [`TaggedEvent`] queue returned by [`SyncController::new`]; it reports to
//! the UI through the [`ViewEvent`] queue. Nothing else touches its state.

mod fetch;
mod publish;
mod reconcile;

use std::collections::HashSet;

use tokio::sync::mpsc;

use syncdemo_proto::codec::{DecodeError, EncodeError};
use syncdemo_proto::message::ChatMessage;

use crate::config::{Settings, SyncConfig};
use crate::peers::{PeerEntry, PeerSequenceTable};
use crate::sync::{
    BindingId, EventSink, MissingDataInfo, SocketFactory, SyncEvent, SyncSocket, TaggedEvent,
    TransportError, topic_for,
};

/// Number of payload bytes included (hex encoded) in integrity errors.
const PREVIEW_BYTES: usize = 32;

/// A locally trusted payload failed to encode or decode.
#[derive(Debug, thiserror::Error)]
pub enum IntegrityError {
    /// A fetched payload is not a well-formed message.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// A locally built message could not be encoded.
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Errors surfaced by the controller.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// Data that should be structurally valid was not.
    #[error("integrity error on {name} ({size} bytes, starts {preview}): {source}")]
    Integrity {
        /// Name of the item (or prefix, for outgoing messages).
        name: String,
        /// Size of the offending payload.
        size: usize,
        /// Hex encoding of the first bytes of the payload.
        preview: String,
        /// What went wrong.
        source: IntegrityError,
    },

    /// The sync transport refused an operation.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Nick, chatroom or prefix is missing, so there is no binding.
    #[error("not bound to a room: settings incomplete")]
    NotBound,
}

impl ControllerError {
    fn integrity(name: &str, payload: &[u8], source: IntegrityError) -> Self {
        Self::Integrity {
            name: name.to_string(),
            size: payload.len(),
            preview: hex::encode(&payload[..payload.len().min(PREVIEW_BYTES)]),
            source,
        }
    }
}

/// Events emitted by the [`SyncController`] for the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    /// A message to append to the transcript.
    Message(ChatMessage),
    /// Missing ranges and the new root digest, for the digest tree.
    TreeUpdated {
        /// The ranges reported missing.
        ranges: Vec<MissingDataInfo>,
        /// Root digest after the change.
        digest: String,
    },
    /// The peer table entry for `prefix` changed. Carries the whole entry,
    /// so the view follows the table even when it moves backwards.
    PeerUpdated {
        /// Publishing prefix.
        prefix: String,
        /// Entry after the change.
        entry: PeerEntry,
    },
    /// The user settings changed.
    SettingsChanged(Settings),
    /// A prefix left the group.
    PeerRemoved {
        /// Prefix of the departed peer.
        prefix: String,
    },
    /// An item could not be fetched; the peer may be unreachable.
    PeerUnreachable {
        /// Name of the item.
        name: String,
        /// Transport-reported reason.
        reason: String,
    },
    /// A fetched payload failed integrity checks.
    IntegrityError {
        /// Name of the item.
        name: String,
        /// Error description.
        detail: String,
    },
    /// A batch was too large to fetch.
    FetchSkipped {
        /// Number of items in the batch.
        total: u64,
    },
    /// A local operation failed.
    Error(String),
    /// Refit the digest tree to the available space.
    Refit,
    /// Clear the transcript's tree view (room switch).
    Reset,
    /// The controller joined a room topic.
    Bound {
        /// Topic joined.
        topic: String,
        /// Session used for publishing.
        session: u64,
    },
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// No ranges were reported; nothing happened.
    Empty,
    /// There is no binding; nothing happened.
    Unbound,
    /// Every missing item was requested.
    Fetched {
        /// Fetches accepted by the transport.
        issued: u64,
        /// Fetches the transport rejected outright.
        failed: u64,
    },
    /// The batch was at or above the fetch threshold and was not fetched.
    Skipped {
        /// Number of missing items in the batch.
        total: u64,
    },
}

/// Whether fetches are outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// No fetch is awaiting completion.
    Idle,
    /// At least one fetch is awaiting completion.
    Fetching,
}

/// Which settings an update changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsChange {
    /// The nick changed.
    pub nick: bool,
    /// The chatroom changed.
    pub chatroom: bool,
    /// The publish prefix changed.
    pub prefix: bool,
    /// A new transport binding was created.
    pub rebound: bool,
}

impl SettingsChange {
    /// Whether anything changed (settings should be persisted).
    #[must_use]
    pub const fn any(&self) -> bool {
        self.nick || self.chatroom || self.prefix
    }
}

/// Keeps the local view of a room consistent with the sync group.
pub struct SyncController<F: SocketFactory> {
    /// Creates transport bindings.
    factory: F,
    /// Sync policy.
    config: SyncConfig,
    /// Current user settings.
    settings: Settings,
    /// Session attached to every published item.
    session: u64,
    /// Current transport binding, if settings are complete.
    socket: Option<F::Socket>,
    /// Identifier of the current binding.
    binding: Option<BindingId>,
    /// Last identifier handed out.
    last_binding: BindingId,
    /// Per-prefix progress for the digest tree.
    peers: PeerSequenceTable,
    /// Names of fetches awaiting completion.
    pending: HashSet<String>,
    /// Last root digest reported by the transport.
    digest: Option<String>,
    /// Queue handed to sockets for their events.
    event_tx: mpsc::Sender<TaggedEvent>,
    /// Queue for UI notifications. Unbounded: the UI drains it every frame
    /// and a dropped `Message` would never be shown.
    view_tx: mpsc::UnboundedSender<ViewEvent>,
}

impl<F: SocketFactory> SyncController<F> {
    /// Creates a controller and binds it to the configured room if the
    /// settings are complete.
    ///
    /// Returns the controller, the receiver for transport events (to be fed
    /// back through [`handle_event`](Self::handle_event)), and the receiver
    /// for [`ViewEvent`]s that the UI layer should consume. A configured
    /// channel capacity of zero is treated as one.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Transport`] if the initial binding fails.
    pub fn new(
        factory: F,
        config: SyncConfig,
        settings: Settings,
    ) -> Result<
        (
            Self,
            mpsc::Receiver<TaggedEvent>,
            mpsc::UnboundedReceiver<ViewEvent>,
        ),
        ControllerError,
    > {
        let (event_tx, event_rx) = mpsc::channel(config.channel_capacity.max(1));
        let (view_tx, view_rx) = mpsc::unbounded_channel();
        let mut controller = Self {
            factory,
            config,
            settings,
            session: now_secs(),
            socket: None,
            binding: None,
            last_binding: BindingId::new(0),
            peers: PeerSequenceTable::new(),
            pending: HashSet::new(),
            digest: None,
            event_tx,
            view_tx,
        };

        if controller.settings.is_complete() {
            controller.bind()?;
        } else {
            tracing::info!("settings incomplete, deferring sync binding");
        }

        Ok((controller, event_rx, view_rx))
    }

    /// Dispatch one event delivered by a socket.
    ///
    /// Events from a binding other than the current one are dropped.
    /// Integrity errors are logged and reported to the UI; they never stop
    /// the controller.
    pub fn handle_event(&mut self, tagged: TaggedEvent) {
        if self.binding != Some(tagged.binding) {
            tracing::debug!(
                binding = %tagged.binding,
                current = ?self.binding,
                "dropping event from stale binding"
            );
            return;
        }

        match tagged.event {
            SyncEvent::MissingData { ranges, digest } => {
                self.on_missing_data(&ranges, &digest);
            }
            SyncEvent::Data { name, payload } => {
                if let Err(e) = self.on_fetch_complete(&name, &payload) {
                    tracing::error!(name = %name, error = %e, "dropping fetched payload");
                    self.emit(ViewEvent::IntegrityError {
                        name,
                        detail: e.to_string(),
                    });
                }
            }
            SyncEvent::FetchFailed { name, reason } => self.on_fetch_failed(&name, &reason),
            SyncEvent::PeerRemoved { prefix } => self.on_peer_removed(&prefix),
        }
    }

    /// Apply a settings update.
    ///
    /// Absent or unchanged values are ignored. A new chatroom resets the
    /// peer table, tears down the current binding, starts a new session and
    /// binds to the new room's topic. Completing previously incomplete
    /// settings creates the first binding.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Transport`] if the new binding fails; the
    /// controller is left unbound in that case.
    pub fn update_settings(&mut self, update: Settings) -> Result<SettingsChange, ControllerError> {
        let mut change = SettingsChange::default();

        if let Some(nick) = update.nick.filter(|v| !v.is_empty())
            && self.settings.nick.as_ref() != Some(&nick)
        {
            self.settings.nick = Some(nick);
            change.nick = true;
        }
        if let Some(prefix) = update.prefix.filter(|v| !v.is_empty())
            && self.settings.prefix.as_ref() != Some(&prefix)
        {
            self.settings.prefix = Some(prefix);
            change.prefix = true;
        }
        if let Some(room) = update.chatroom.filter(|v| !v.is_empty())
            && self.settings.chatroom.as_ref() != Some(&room)
        {
            self.settings.chatroom = Some(room);
            change.chatroom = true;
        }
        if change.any() {
            self.emit(ViewEvent::SettingsChanged(self.settings.clone()));
        }

        if change.chatroom {
            self.switch_room()?;
            change.rebound = self.binding.is_some();
        } else if self.socket.is_none() && self.settings.is_complete() {
            self.bind()?;
            change.rebound = true;
        }

        if change.any() {
            tracing::info!(
                nick = ?self.settings.nick,
                chatroom = ?self.settings.chatroom,
                prefix = ?self.settings.prefix,
                "settings updated"
            );
        }
        Ok(change)
    }

    /// Ask the view to refit the digest tree (resize/show).
    pub fn refit(&self) {
        self.emit(ViewEvent::Refit);
    }

    /// Tear down the current binding, if any.
    pub fn shutdown(&mut self) {
        self.unbind();
    }

    /// Per-prefix progress for rendering.
    #[must_use]
    pub const fn peers(&self) -> &PeerSequenceTable {
        &self.peers
    }

    /// Current user settings.
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Session attached to published items.
    #[must_use]
    pub const fn session(&self) -> u64 {
        self.session
    }

    /// Identifier of the current binding.
    #[must_use]
    pub const fn binding(&self) -> Option<BindingId> {
        self.binding
    }

    /// Topic of the current binding.
    #[must_use]
    pub fn topic(&self) -> Option<&str> {
        self.socket.as_ref().map(SyncSocket::topic)
    }

    /// Root digest: the transport's current view, or the last one reported.
    #[must_use]
    pub fn digest(&self) -> Option<String> {
        self.socket
            .as_ref()
            .map(SyncSocket::root_digest)
            .or_else(|| self.digest.clone())
    }

    /// Whether fetches are outstanding.
    #[must_use]
    pub fn state(&self) -> ControllerState {
        if self.pending.is_empty() {
            ControllerState::Idle
        } else {
            ControllerState::Fetching
        }
    }

    /// Number of fetches awaiting completion.
    #[must_use]
    pub fn pending_fetches(&self) -> usize {
        self.pending.len()
    }

    fn bind(&mut self) -> Result<(), ControllerError> {
        let Some(room) = self.settings.chatroom() else {
            return Err(ControllerError::NotBound);
        };
        let topic = topic_for(&self.config.broadcast_root, room);
        let binding = self.last_binding.next();
        self.last_binding = binding;

        let socket = self
            .factory
            .bind(&topic, EventSink::new(binding, self.event_tx.clone()))?;
        self.socket = Some(socket);
        self.binding = Some(binding);

        tracing::info!(topic = %topic, binding = %binding, session = self.session, "bound to room");
        self.emit(ViewEvent::Bound {
            topic,
            session: self.session,
        });
        Ok(())
    }

    fn unbind(&mut self) {
        if let Some(socket) = self.socket.take() {
            tracing::info!(topic = %socket.topic(), "closing sync binding");
            socket.close();
        }
        self.binding = None;
        self.pending.clear();
    }

    fn switch_room(&mut self) -> Result<(), ControllerError> {
        self.emit(ViewEvent::Reset);
        self.peers.reset();
        self.digest = None;
        self.unbind();
        self.session = next_session(self.session);

        let result = if self.settings.is_complete() {
            self.bind()
        } else {
            Ok(())
        };
        self.emit(ViewEvent::Refit);
        result
    }

    /// Report the current table entry for `prefix` to the view.
    fn emit_peer(&self, prefix: &str) {
        if let Some(entry) = self.peers.get(prefix) {
            self.emit(ViewEvent::PeerUpdated {
                prefix: prefix.to_string(),
                entry: entry.clone(),
            });
        }
    }

    pub(crate) fn emit(&self, event: ViewEvent) {
        if self.view_tx.send(event).is_err() {
            tracing::debug!("view receiver dropped, event discarded");
        }
    }
}

/// Wall-clock seconds since the UNIX epoch.
fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// A fresh session that never repeats the previous one.
fn next_session(previous: u64) -> u64 {
    now_secs().max(previous.saturating_add(1))
}

#[cfg(test)]
pub(crate) mod testing;
