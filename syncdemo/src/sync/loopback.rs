//! Loopback sync group for testing.
//!
//! [`LoopbackHub`] keeps every room topic of a simulated group in process.
//! Sockets bound through it see each other's publications as missing-data
//! notifications and fetch payloads from the shared store, with all
//! results delivered through their [`EventSink`]. There is no digest
//! exchange protocol here: the hub knows the full group state and tells
//! each member exactly what it has not been told yet.
//!
//! Published items live as long as the hub so that late joiners can fetch
//! history; the freshness window is recorded but not enforced.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use super::{
    DataName, EventSink, MissingDataInfo, SeqNo, SocketFactory, SyncEvent, SyncSocket,
    TransportError,
};

/// Number of fetch requests the hub remembers; older ones are dropped.
pub const FETCH_LOG_LIMIT: usize = 1024;

/// A fetch request observed by the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRecord {
    /// Topic of the requesting socket.
    pub topic: String,
    /// Requested prefix.
    pub prefix: String,
    /// Requested sequence number.
    pub seq: SeqNo,
    /// Retry budget passed with the request.
    pub retries: u32,
}

/// A published item held by the hub.
#[derive(Debug, Clone)]
struct StoredItem {
    payload: Vec<u8>,
    freshness: Duration,
}

/// A socket attached to a topic.
#[derive(Debug)]
struct Member {
    id: u64,
    sink: EventSink,
    /// Head per prefix this member has already been notified about.
    known: HashMap<String, SeqNo>,
    /// Prefixes this member has published under.
    published: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct TopicState {
    data: HashMap<String, StoredItem>,
    heads: BTreeMap<String, SeqNo>,
    members: Vec<Member>,
}

impl TopicState {
    /// SHA-256 over the sorted `(prefix, session, seq)` heads, hex encoded.
    fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for (prefix, head) in &self.heads {
            hasher.update(prefix.as_bytes());
            hasher.update(head.session.to_be_bytes());
            hasher.update(head.seq.to_be_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

#[derive(Debug, Default)]
struct HubState {
    topics: HashMap<String, TopicState>,
    next_member: u64,
    fetch_log: VecDeque<FetchRecord>,
    reject_fetches: bool,
}

/// In-process sync group shared by any number of sockets.
///
/// Cloning the hub is cheap; all clones share the same group state.
///
/// # Example
///
/// ```rust,no_run
/// use syncdemo::sync::loopback::LoopbackHub;
/// use syncdemo::sync::{BindingId, EventSink, SocketFactory, SyncSocket};
/// use std::time::Duration;
/// use tokio::sync::mpsc;
///
/// # fn example() {
/// let hub = LoopbackHub::new();
/// let (tx, _rx) = mpsc::channel(16);
/// let socket = hub
///     .bind("/ndn/broadcast/sync-demo/lobby", EventSink::new(BindingId::new(1), tx))
///     .unwrap();
/// let seq = socket
///     .publish("/ndn/alice", 1, b"payload", Duration::from_secs(60))
///     .unwrap();
/// assert_eq!(seq.seq, 0);
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct LoopbackHub {
    state: Arc<Mutex<HubState>>,
}

impl LoopbackHub {
    /// Creates an empty group.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent fetch fail synchronously (or succeed again).
    pub fn set_reject_fetches(&self, reject: bool) {
        self.state.lock().reject_fetches = reject;
    }

    /// The last [`FETCH_LOG_LIMIT`] fetch requests the hub has accepted,
    /// oldest first.
    #[must_use]
    pub fn fetch_log(&self) -> Vec<FetchRecord> {
        self.state.lock().fetch_log.iter().cloned().collect()
    }

    /// Number of sockets currently bound to `topic`.
    #[must_use]
    pub fn member_count(&self, topic: &str) -> usize {
        self.state
            .lock()
            .topics
            .get(topic)
            .map_or(0, |t| t.members.len())
    }

    /// Latest sequence number published under `prefix` in `topic`.
    #[must_use]
    pub fn head(&self, topic: &str, prefix: &str) -> Option<SeqNo> {
        self.state
            .lock()
            .topics
            .get(topic)
            .and_then(|t| t.heads.get(prefix).copied())
    }

    /// Freshness window the named item was published with.
    #[must_use]
    pub fn freshness(&self, topic: &str, name: &str) -> Option<Duration> {
        self.state
            .lock()
            .topics
            .get(topic)
            .and_then(|t| t.data.get(name).map(|item| item.freshness))
    }

    /// Stores `payload` under an arbitrary `name` in `topic`.
    ///
    /// Bypasses sequencing and notifications; used to plant items a
    /// well-behaved publisher would never produce.
    pub fn insert_raw(&self, topic: &str, name: &str, payload: Vec<u8>) {
        self.state
            .lock()
            .topics
            .entry(topic.to_string())
            .or_default()
            .data
            .insert(
                name.to_string(),
                StoredItem {
                    payload,
                    freshness: Duration::ZERO,
                },
            );
    }

    fn detach(&self, topic: &str, member_id: u64) {
        let mut state = self.state.lock();
        let Some(topic_state) = state.topics.get_mut(topic) else {
            return;
        };
        let Some(pos) = topic_state.members.iter().position(|m| m.id == member_id) else {
            return;
        };
        let member = topic_state.members.remove(pos);
        for prefix in &member.published {
            for other in &topic_state.members {
                other.sink.emit(SyncEvent::PeerRemoved {
                    prefix: prefix.clone(),
                });
            }
        }
        tracing::debug!(topic, member = member_id, "loopback member detached");
    }
}

impl SocketFactory for LoopbackHub {
    type Socket = LoopbackSocket;

    fn bind(&self, topic: &str, sink: EventSink) -> Result<LoopbackSocket, TransportError> {
        if topic.is_empty() {
            return Err(TransportError::Bind {
                topic: topic.to_string(),
                reason: "empty topic".into(),
            });
        }

        let mut state = self.state.lock();
        let id = state.next_member;
        state.next_member += 1;
        let topic_state = state.topics.entry(topic.to_string()).or_default();

        // A newcomer is missing everything the group already holds.
        let ranges: Vec<MissingDataInfo> = topic_state
            .heads
            .iter()
            .map(|(prefix, head)| {
                MissingDataInfo::new(prefix.clone(), SeqNo::new(head.session, 0), *head)
            })
            .collect();
        if !ranges.is_empty() {
            sink.emit(SyncEvent::MissingData {
                ranges,
                digest: topic_state.digest(),
            });
        }

        topic_state.members.push(Member {
            id,
            sink,
            known: topic_state.heads.clone().into_iter().collect(),
            published: BTreeSet::new(),
        });
        drop(state);

        tracing::debug!(topic, member = id, "loopback member attached");
        Ok(LoopbackSocket {
            hub: self.clone(),
            topic: topic.to_string(),
            member_id: id,
        })
    }
}

/// One member's binding to a topic of a [`LoopbackHub`].
///
/// Dropping the socket detaches it from the group.
#[derive(Debug)]
pub struct LoopbackSocket {
    hub: LoopbackHub,
    topic: String,
    member_id: u64,
}

impl SyncSocket for LoopbackSocket {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn root_digest(&self) -> String {
        self.hub
            .state
            .lock()
            .topics
            .get(&self.topic)
            .map(TopicState::digest)
            .unwrap_or_default()
    }

    fn fetch(&self, prefix: &str, seq: SeqNo, retries: u32) -> Result<(), TransportError> {
        let mut state = self.hub.state.lock();
        if state.reject_fetches {
            return Err(TransportError::Rejected("fetches disabled".into()));
        }
        if state.fetch_log.len() == FETCH_LOG_LIMIT {
            state.fetch_log.pop_front();
        }
        state.fetch_log.push_back(FetchRecord {
            topic: self.topic.clone(),
            prefix: prefix.to_string(),
            seq,
            retries,
        });

        let topic_state = state.topics.get(&self.topic).ok_or(TransportError::Closed)?;
        let member = topic_state
            .members
            .iter()
            .find(|m| m.id == self.member_id)
            .ok_or(TransportError::Closed)?;

        let name = DataName::new(prefix, seq).to_string();
        let event = match topic_state.data.get(&name) {
            Some(item) => SyncEvent::Data {
                name,
                payload: item.payload.clone(),
            },
            None => SyncEvent::FetchFailed {
                reason: format!("no data after {} attempts", u64::from(retries) + 1),
                name,
            },
        };
        member.sink.emit(event);
        Ok(())
    }

    fn publish(
        &self,
        prefix: &str,
        session: u64,
        payload: &[u8],
        freshness: Duration,
    ) -> Result<SeqNo, TransportError> {
        let mut state = self.hub.state.lock();
        let topic_state = state
            .topics
            .get_mut(&self.topic)
            .ok_or(TransportError::Closed)?;
        if !topic_state.members.iter().any(|m| m.id == self.member_id) {
            return Err(TransportError::Closed);
        }

        let seq = match topic_state.heads.get(prefix) {
            Some(head) if head.session == session => head.next(),
            _ => SeqNo::new(session, 0),
        };
        topic_state.data.insert(
            DataName::new(prefix, seq).to_string(),
            StoredItem {
                payload: payload.to_vec(),
                freshness,
            },
        );
        topic_state.heads.insert(prefix.to_string(), seq);
        let digest = topic_state.digest();

        for member in &mut topic_state.members {
            let low = match member.known.get(prefix) {
                Some(known) if known.session == session => known.next(),
                _ => SeqNo::new(session, 0),
            };
            member.known.insert(prefix.to_string(), seq);
            if member.id == self.member_id {
                member.published.insert(prefix.to_string());
                continue;
            }
            member.sink.emit(SyncEvent::MissingData {
                ranges: vec![MissingDataInfo::new(prefix, low, seq)],
                digest: digest.clone(),
            });
        }

        tracing::trace!(topic = %self.topic, prefix, %seq, "loopback publish");
        Ok(seq)
    }

    fn close(self) {
        drop(self);
    }
}

impl Drop for LoopbackSocket {
    fn drop(&mut self) {
        self.hub.detach(&self.topic, self.member_id);
    }
}
