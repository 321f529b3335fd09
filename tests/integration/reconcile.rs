//! Integration tests for missing-data reconciliation over the loopback
//! sync group.
//!
//! These tests validate:
//! - Small batches are fetched item by item with the configured retry budget
//! - Batches at or above the threshold are skipped entirely but still drawn
//! - Fetch failures and malformed payloads are reported, not fatal
//! - Empty notifications have no effect

use std::time::Duration;

use tokio::sync::mpsc;

use syncdemo::config::{Settings, SyncConfig};
use syncdemo::controller::{SyncController, ViewEvent};
use syncdemo::sync::loopback::{LoopbackHub, LoopbackSocket};
use syncdemo::sync::{
    BindingId, EventSink, MissingDataInfo, SeqNo, SocketFactory, SyncEvent, SyncSocket,
    TaggedEvent,
};
use syncdemo_proto::codec;
use syncdemo_proto::message::ChatMessage;

const TOPIC: &str = "/ndn/broadcast/sync-demo/r1";
const FRESH: Duration = Duration::from_secs(60);

type Controller = SyncController<LoopbackHub>;

fn join(
    hub: &LoopbackHub,
) -> (
    Controller,
    mpsc::Receiver<TaggedEvent>,
    mpsc::UnboundedReceiver<ViewEvent>,
) {
    let settings = Settings::new(
        "alice".to_string(),
        "r1".to_string(),
        "/ndn/alice".to_string(),
    );
    SyncController::new(hub.clone(), SyncConfig::default(), settings)
        .expect("controller should bind")
}

/// A bare socket publishing under `/ndn/bob`, bypassing any controller.
fn publisher(hub: &LoopbackHub) -> (LoopbackSocket, mpsc::Receiver<TaggedEvent>) {
    let (tx, rx) = mpsc::channel(64);
    let socket = hub
        .bind(TOPIC, EventSink::new(BindingId::new(1000), tx))
        .expect("publisher should bind");
    (socket, rx)
}

fn publish_chat(socket: &LoopbackSocket, text: &str) -> SeqNo {
    let payload = codec::encode(&ChatMessage::chat("bob", "r1", text)).expect("encode");
    socket
        .publish("/ndn/bob", 5, &payload, FRESH)
        .expect("publish")
}

/// Feed queued transport events to the controller until none are left.
fn pump(ctl: &mut Controller, events: &mut mpsc::Receiver<TaggedEvent>) {
    while let Ok(event) = events.try_recv() {
        ctl.handle_event(event);
    }
}

fn drain(views: &mut mpsc::UnboundedReceiver<ViewEvent>) -> Vec<ViewEvent> {
    let mut out = Vec::new();
    while let Ok(event) = views.try_recv() {
        out.push(event);
    }
    out
}

fn messages(events: &[ViewEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            ViewEvent::Message(m) => Some(m.data.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn three_missing_items_are_fetched_and_shown() {
    let hub = LoopbackHub::new();
    let (mut ctl, mut events, mut views) = join(&hub);
    let (bob, _bob_rx) = publisher(&hub);

    for text in ["one", "two", "three"] {
        publish_chat(&bob, text);
        pump(&mut ctl, &mut events);
    }

    let log = hub.fetch_log();
    let fetched: Vec<_> = log.iter().map(|r| (r.prefix.as_str(), r.seq)).collect();
    assert_eq!(
        fetched,
        vec![
            ("/ndn/bob", SeqNo::new(5, 0)),
            ("/ndn/bob", SeqNo::new(5, 1)),
            ("/ndn/bob", SeqNo::new(5, 2)),
        ]
    );
    assert!(log.iter().all(|r| r.retries == 2));

    assert_eq!(messages(&drain(&mut views)), vec!["one", "two", "three"]);
    let entry = ctl.peers().get("/ndn/bob").expect("bob should be tracked");
    assert_eq!(entry.sequence, Some(SeqNo::new(5, 2)));
    assert_eq!(entry.label.as_deref(), Some("bob"));
}

#[test]
fn history_of_twenty_one_items_is_not_fetched() {
    let hub = LoopbackHub::new();
    let (bob, _bob_rx) = publisher(&hub);
    for i in 0..=20 {
        publish_chat(&bob, &format!("old {i}"));
    }

    let (mut ctl, mut events, mut views) = join(&hub);
    pump(&mut ctl, &mut events);

    assert!(hub.fetch_log().is_empty());
    let seen = drain(&mut views);
    assert!(seen.contains(&ViewEvent::TreeUpdated {
        ranges: vec![MissingDataInfo::new(
            "/ndn/bob",
            SeqNo::new(5, 0),
            SeqNo::new(5, 20)
        )],
        digest: ctl.digest().expect("digest"),
    }));
    assert!(seen.contains(&ViewEvent::FetchSkipped { total: 21 }));
    assert_eq!(seen.last(), Some(&ViewEvent::Refit));
    assert!(messages(&seen).is_empty());

    // The tree still shows how far bob has got.
    assert_eq!(
        ctl.peers().get("/ndn/bob").and_then(|e| e.sequence),
        Some(SeqNo::new(5, 20))
    );
}

#[test]
fn short_history_is_fetched_on_join() {
    let hub = LoopbackHub::new();
    let (bob, _bob_rx) = publisher(&hub);
    for i in 0..9 {
        publish_chat(&bob, &format!("msg {i}"));
    }

    let (mut ctl, mut events, mut views) = join(&hub);
    pump(&mut ctl, &mut events);

    assert_eq!(hub.fetch_log().len(), 9);
    assert_eq!(messages(&drain(&mut views)).len(), 9);
}

#[test]
fn unknown_items_surface_as_unreachable() {
    let hub = LoopbackHub::new();
    let (mut ctl, mut events, mut views) = join(&hub);
    let binding = ctl.binding().expect("bound");
    let _ = drain(&mut views);

    ctl.handle_event(TaggedEvent {
        binding,
        event: SyncEvent::MissingData {
            ranges: vec![MissingDataInfo::new(
                "/ndn/ghost",
                SeqNo::new(1, 0),
                SeqNo::new(1, 0),
            )],
            digest: "d".into(),
        },
    });
    pump(&mut ctl, &mut events);

    let seen = drain(&mut views);
    assert!(seen.iter().any(|e| matches!(
        e,
        ViewEvent::PeerUnreachable { name, reason }
            if name == "/ndn/ghost/1:0" && reason.contains("3 attempts")
    )));
    assert!(!seen.iter().any(|e| matches!(e, ViewEvent::IntegrityError { .. })));
    assert_eq!(ctl.pending_fetches(), 0);
}

#[test]
fn malformed_payload_is_reported_and_sync_continues() {
    let hub = LoopbackHub::new();
    let (mut ctl, mut events, mut views) = join(&hub);
    let (bob, _bob_rx) = publisher(&hub);

    bob.publish("/ndn/bob", 5, &[0xff, 0xff, 0xff], FRESH)
        .expect("publish");
    pump(&mut ctl, &mut events);
    publish_chat(&bob, "after garbage");
    pump(&mut ctl, &mut events);

    let seen = drain(&mut views);
    assert!(seen.iter().any(|e| matches!(
        e,
        ViewEvent::IntegrityError { name, .. } if name == "/ndn/bob/5:0"
    )));
    assert_eq!(messages(&seen), vec!["after garbage"]);
}

#[test]
fn planted_garbage_is_an_integrity_error() {
    let hub = LoopbackHub::new();
    let (mut ctl, mut events, mut views) = join(&hub);
    let binding = ctl.binding().expect("bound");
    hub.insert_raw(TOPIC, "/ndn/mallory/3:0", vec![0xde, 0xad, 0xbe, 0xef]);
    let _ = drain(&mut views);

    ctl.handle_event(TaggedEvent {
        binding,
        event: SyncEvent::MissingData {
            ranges: vec![MissingDataInfo::new(
                "/ndn/mallory",
                SeqNo::new(3, 0),
                SeqNo::new(3, 0),
            )],
            digest: "d".into(),
        },
    });
    pump(&mut ctl, &mut events);

    let seen = drain(&mut views);
    assert!(seen.iter().any(|e| matches!(
        e,
        ViewEvent::IntegrityError { name, detail }
            if name == "/ndn/mallory/3:0" && detail.contains("deadbeef")
    )));
    assert!(messages(&seen).is_empty());
    let entry = ctl.peers().get("/ndn/mallory").expect("range head recorded");
    assert_eq!(entry.label, None);
    assert_eq!(ctl.pending_fetches(), 0);
}

#[test]
fn rejected_fetches_are_not_retried() {
    let hub = LoopbackHub::new();
    let (mut ctl, mut events, mut views) = join(&hub);
    let (bob, _bob_rx) = publisher(&hub);
    hub.set_reject_fetches(true);

    publish_chat(&bob, "unreachable");
    pump(&mut ctl, &mut events);
    hub.set_reject_fetches(false);
    pump(&mut ctl, &mut events);

    assert!(hub.fetch_log().is_empty());
    assert!(messages(&drain(&mut views)).is_empty());
}

#[test]
fn empty_notification_is_ignored() {
    let hub = LoopbackHub::new();
    let (mut ctl, mut events, mut views) = join(&hub);
    let binding = ctl.binding().expect("bound");
    let _ = drain(&mut views);

    ctl.handle_event(TaggedEvent {
        binding,
        event: SyncEvent::MissingData {
            ranges: Vec::new(),
            digest: "ignored".into(),
        },
    });
    pump(&mut ctl, &mut events);

    assert!(drain(&mut views).is_empty());
    assert!(hub.fetch_log().is_empty());
    assert!(ctl.peers().is_empty());
}
