//! Sync layer abstraction for `SyncDemo`.
//!
//! Defines the [`SyncSocket`] and [`SocketFactory`] traits the controller
//! drives, together with the values that cross the boundary: sequence
//! numbers, missing-data ranges and the events a socket delivers.
//! Concrete implementations include:
//! - [`loopback::LoopbackHub`]: in-process sync group for tests and the demo
//!
//! A socket never calls back into the controller directly. Everything it
//! has to report (digest changes, fetched payloads, fetch failures) is
//! pushed through an [`EventSink`] and consumed by the controller task.

pub mod loopback;

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;

/// Default root under which room topics are derived.
pub const DEFAULT_BROADCAST_ROOT: &str = "/ndn/broadcast/sync-demo";

/// Builds the sync topic for a room: `<broadcast-root>/<room>`.
#[must_use]
pub fn topic_for(root: &str, room: &str) -> String {
    format!("{}/{room}", root.trim_end_matches('/'))
}

/// A per-prefix sequence number.
///
/// The session distinguishes restarts of the same publisher; the sequence
/// counts items published within that session. Ordering is by session,
/// then sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeqNo {
    /// Publisher session the sequence belongs to.
    pub session: u64,
    /// Sequence number within the session.
    pub seq: u64,
}

impl SeqNo {
    /// Creates a sequence number.
    #[must_use]
    pub const fn new(session: u64, seq: u64) -> Self {
        Self { session, seq }
    }

    /// Returns the following sequence number in the same session.
    #[must_use]
    pub const fn next(self) -> Self {
        Self {
            session: self.session,
            seq: self.seq.saturating_add(1),
        }
    }
}

impl fmt::Display for SeqNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.session, self.seq)
    }
}

/// An inclusive range of sequence numbers not yet fetched for one prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingDataInfo {
    /// Name prefix of the publishing peer.
    pub prefix: String,
    /// First missing sequence number.
    pub low: SeqNo,
    /// Last missing sequence number.
    pub high: SeqNo,
}

impl MissingDataInfo {
    /// Creates a range for `prefix`.
    pub fn new(prefix: impl Into<String>, low: SeqNo, high: SeqNo) -> Self {
        Self {
            prefix: prefix.into(),
            low,
            high,
        }
    }

    /// Number of sequence numbers covered (`high - low + 1`, zero if inverted).
    #[must_use]
    pub fn len(&self) -> u64 {
        self.high
            .seq
            .checked_sub(self.low.seq)
            .map_or(0, |d| d.saturating_add(1))
    }

    /// Whether the range covers nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates every sequence number in the range, in order.
    ///
    /// Both ends of a range share a session; the session of `high` is used.
    pub fn sequences(&self) -> impl Iterator<Item = SeqNo> + '_ {
        let session = self.high.session;
        (self.low.seq..=self.high.seq).map(move |seq| SeqNo::new(session, seq))
    }
}

/// Total number of missing items across a batch of ranges.
#[must_use]
pub fn total_missing(ranges: &[MissingDataInfo]) -> u64 {
    ranges
        .iter()
        .fold(0u64, |acc, range| acc.saturating_add(range.len()))
}

/// Name of a published item: `<prefix>/<session>:<seq>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataName {
    /// Publishing prefix.
    pub prefix: String,
    /// Sequence number of the item.
    pub seq: SeqNo,
}

impl DataName {
    /// Creates the name of item `seq` published under `prefix`.
    pub fn new(prefix: impl Into<String>, seq: SeqNo) -> Self {
        Self {
            prefix: prefix.into(),
            seq,
        }
    }

    /// Splits a full name into its prefix and, when the last component has
    /// the `<session>:<seq>` form, the sequence number.
    ///
    /// The prefix is the name with its last path component stripped; a
    /// name without any `/` is its own prefix.
    #[must_use]
    pub fn split(name: &str) -> (&str, Option<SeqNo>) {
        let Some((prefix, last)) = name.rsplit_once('/') else {
            return (name, None);
        };
        let seq = last.split_once(':').and_then(|(session, seq)| {
            Some(SeqNo::new(session.parse().ok()?, seq.parse().ok()?))
        });
        (prefix, seq)
    }
}

impl fmt::Display for DataName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.prefix, self.seq)
    }
}

/// Identifies one attachment of the controller to a room topic.
///
/// Every event a socket delivers carries the binding it belongs to, so
/// completions that arrive after a room switch can be recognised as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BindingId(u64);

impl BindingId {
    /// Creates a binding identifier.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the identifier following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Something a socket reports to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// The group digest changed and these ranges are now missing locally.
    MissingData {
        /// Missing ranges, one per prefix.
        ranges: Vec<MissingDataInfo>,
        /// Root digest after the change.
        digest: String,
    },
    /// A fetch completed with a payload.
    Data {
        /// Full name of the fetched item.
        name: String,
        /// Raw payload bytes.
        payload: Vec<u8>,
    },
    /// A fetch gave up after exhausting its retry budget.
    FetchFailed {
        /// Full name of the item that could not be fetched.
        name: String,
        /// Human-readable failure reason.
        reason: String,
    },
    /// A prefix left the group.
    PeerRemoved {
        /// Prefix of the departed peer.
        prefix: String,
    },
}

/// A [`SyncEvent`] stamped with the binding that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedEvent {
    /// Binding the event belongs to.
    pub binding: BindingId,
    /// The event itself.
    pub event: SyncEvent,
}

/// Sending half handed to a socket when it is bound.
///
/// Stamps each event with the binding id and forwards it to the
/// controller's event queue without blocking.
#[derive(Debug, Clone)]
pub struct EventSink {
    binding: BindingId,
    tx: mpsc::Sender<TaggedEvent>,
}

impl EventSink {
    /// Creates a sink that tags events with `binding`.
    #[must_use]
    pub const fn new(binding: BindingId, tx: mpsc::Sender<TaggedEvent>) -> Self {
        Self { binding, tx }
    }

    /// The binding this sink stamps on events.
    #[must_use]
    pub const fn binding(&self) -> BindingId {
        self.binding
    }

    /// Queues an event for the controller.
    ///
    /// Returns `false` if the queue is full or the controller is gone; the
    /// event is dropped in that case.
    pub fn emit(&self, event: SyncEvent) -> bool {
        match self.tx.try_send(TaggedEvent {
            binding: self.binding,
            event,
        }) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                tracing::warn!(
                    binding = %self.binding,
                    event = ?dropped.event,
                    "controller event queue full, dropping sync event"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Whether the controller side of the queue has gone away.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Errors that can occur during sync operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The socket has been torn down.
    #[error("sync socket closed")]
    Closed,

    /// The transport refused the request.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The topic could not be joined.
    #[error("cannot bind topic {topic}: {reason}")]
    Bind {
        /// Topic that was requested.
        topic: String,
        /// Why binding failed.
        reason: String,
    },
}

/// A binding of the local node to one room topic.
///
/// Operations are issued synchronously and complete through the
/// [`EventSink`] the socket was bound with. Retry and backoff beyond the
/// requested budget are the socket's business.
pub trait SyncSocket: Send {
    /// Topic this socket is bound to.
    fn topic(&self) -> &str;

    /// Current root digest of the group state as seen by this socket.
    fn root_digest(&self) -> String;

    /// Request item `seq` published under `prefix`.
    ///
    /// The payload arrives later as [`SyncEvent::Data`], or
    /// [`SyncEvent::FetchFailed`] once `retries` further attempts have
    /// failed.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the request cannot be issued at all.
    fn fetch(&self, prefix: &str, seq: SeqNo, retries: u32) -> Result<(), TransportError>;

    /// Publish `payload` as the next item under `prefix` in `session`.
    ///
    /// Returns the sequence number assigned to the item. No delivery
    /// acknowledgement is awaited.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the item cannot be published.
    fn publish(
        &self,
        prefix: &str,
        session: u64,
        payload: &[u8],
        freshness: Duration,
    ) -> Result<SeqNo, TransportError>;

    /// Tear the binding down.
    fn close(self)
    where
        Self: Sized;
}

/// Creates [`SyncSocket`]s bound to room topics.
pub trait SocketFactory: Send {
    /// The socket type produced by this factory.
    type Socket: SyncSocket;

    /// Bind a new socket to `topic`, delivering its events through `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the topic cannot be joined.
    fn bind(&self, topic: &str, sink: EventSink) -> Result<Self::Socket, TransportError>;
}
