//! Recording sync factory shared by the controller unit tests.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{SyncController, ViewEvent};
use crate::config::{Settings, SyncConfig};
use crate::sync::{EventSink, SeqNo, SocketFactory, SyncSocket, TaggedEvent, TransportError};

/// A call made by the controller on the recording transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Bind {
        topic: String,
    },
    Fetch {
        prefix: String,
        seq: SeqNo,
        retries: u32,
    },
    Publish {
        prefix: String,
        session: u64,
        payload: Vec<u8>,
        freshness: Duration,
        /// View events that had been emitted when publish was called.
        displayed_before: Vec<ViewEvent>,
    },
    Close {
        topic: String,
    },
}

#[derive(Debug, Default)]
pub struct Recorder {
    pub calls: Vec<Call>,
    /// Sequence numbers whose fetch is rejected synchronously.
    pub reject_fetch: HashSet<u64>,
    pub reject_publish: bool,
    pub reject_bind: bool,
    /// When set, publish drains this receiver to capture what was displayed.
    pub view_rx: Option<mpsc::UnboundedReceiver<ViewEvent>>,
    pub sinks: Vec<EventSink>,
    next_seq: u64,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingFactory {
    pub log: Arc<Mutex<Recorder>>,
}

impl RecordingFactory {
    pub fn calls(&self) -> Vec<Call> {
        self.log.lock().calls.clone()
    }

    pub fn fetches(&self) -> Vec<(String, SeqNo)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Fetch { prefix, seq, .. } => Some((prefix, seq)),
                _ => None,
            })
            .collect()
    }

    /// Sink of the most recent binding.
    pub fn last_sink(&self) -> EventSink {
        self.log.lock().sinks.last().cloned().unwrap()
    }
}

#[derive(Debug)]
pub struct RecordingSocket {
    topic: String,
    log: Arc<Mutex<Recorder>>,
}

impl SocketFactory for RecordingFactory {
    type Socket = RecordingSocket;

    fn bind(&self, topic: &str, sink: EventSink) -> Result<RecordingSocket, TransportError> {
        let mut log = self.log.lock();
        if log.reject_bind {
            return Err(TransportError::Bind {
                topic: topic.to_string(),
                reason: "rejected".into(),
            });
        }
        log.calls.push(Call::Bind {
            topic: topic.to_string(),
        });
        log.sinks.push(sink);
        Ok(RecordingSocket {
            topic: topic.to_string(),
            log: Arc::clone(&self.log),
        })
    }
}

impl SyncSocket for RecordingSocket {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn root_digest(&self) -> String {
        "recorded".to_string()
    }

    fn fetch(&self, prefix: &str, seq: SeqNo, retries: u32) -> Result<(), TransportError> {
        let mut log = self.log.lock();
        if log.reject_fetch.contains(&seq.seq) {
            return Err(TransportError::Rejected("rejected".into()));
        }
        log.calls.push(Call::Fetch {
            prefix: prefix.to_string(),
            seq,
            retries,
        });
        Ok(())
    }

    fn publish(
        &self,
        prefix: &str,
        session: u64,
        payload: &[u8],
        freshness: Duration,
    ) -> Result<SeqNo, TransportError> {
        let mut log = self.log.lock();
        if log.reject_publish {
            return Err(TransportError::Rejected("rejected".into()));
        }
        let mut displayed_before = Vec::new();
        if let Some(rx) = log.view_rx.as_mut() {
            while let Ok(event) = rx.try_recv() {
                displayed_before.push(event);
            }
        }
        log.calls.push(Call::Publish {
            prefix: prefix.to_string(),
            session,
            payload: payload.to_vec(),
            freshness,
            displayed_before,
        });
        let seq = SeqNo::new(session, log.next_seq);
        log.next_seq += 1;
        Ok(seq)
    }

    fn close(self) {
        self.log.lock().calls.push(Call::Close { topic: self.topic });
    }
}

pub fn alice() -> Settings {
    Settings::new(
        "alice".to_string(),
        "r1".to_string(),
        "/ndn/alice".to_string(),
    )
}

pub type Harness = (
    SyncController<RecordingFactory>,
    RecordingFactory,
    mpsc::Receiver<TaggedEvent>,
    mpsc::UnboundedReceiver<ViewEvent>,
);

pub fn harness_with(settings: Settings, config: SyncConfig) -> Harness {
    let factory = RecordingFactory::default();
    let (controller, events, views) =
        SyncController::new(factory.clone(), config, settings).unwrap();
    (controller, factory, events, views)
}

/// A controller bound as alice in room `r1`, with the `Bound` event drained.
pub fn harness() -> Harness {
    let (controller, factory, events, mut views) = harness_with(alice(), SyncConfig::default());
    let _ = drain(&mut views);
    (controller, factory, events, views)
}

pub fn drain(rx: &mut mpsc::UnboundedReceiver<ViewEvent>) -> Vec<ViewEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}
