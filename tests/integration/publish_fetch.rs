//! Integration tests for the publish path and fetch completion between two
//! controllers sharing a loopback sync group.
//!
//! These tests validate:
//! - The author sees its own message before the transport receives it
//! - Other members fetch, decode and display the message
//! - Items are published with the configured freshness under the author's
//!   prefix and session
//! - Non-chat messages update the peer table and the tree without being
//!   displayed

use std::time::Duration;

use tokio::sync::mpsc;

use syncdemo::config::{Settings, SyncConfig};
use syncdemo::controller::{SyncController, ViewEvent};
use syncdemo::sync::loopback::LoopbackHub;
use syncdemo::sync::{BindingId, EventSink, SeqNo, SocketFactory, SyncSocket, TaggedEvent};
use syncdemo_proto::codec;
use syncdemo_proto::message::{ChatMessage, MessageType, Timestamp};

const TOPIC: &str = "/ndn/broadcast/sync-demo/r1";

/// A controller together with its two queues.
struct Member {
    ctl: SyncController<LoopbackHub>,
    events: mpsc::Receiver<TaggedEvent>,
    views: mpsc::UnboundedReceiver<ViewEvent>,
}

impl Member {
    fn join(hub: &LoopbackHub, nick: &str) -> Self {
        let settings = Settings::new(nick.to_string(), "r1".to_string(), format!("/ndn/{nick}"));
        let (ctl, events, views) =
            SyncController::new(hub.clone(), SyncConfig::default(), settings)
                .expect("controller should bind");
        Self { ctl, events, views }
    }

    fn pump(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.ctl.handle_event(event);
        }
    }

    fn drain(&mut self) -> Vec<ViewEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.views.try_recv() {
            out.push(event);
        }
        out
    }
}

fn shown(events: &[ViewEvent]) -> Vec<(String, String)> {
    events
        .iter()
        .filter_map(|e| match e {
            ViewEvent::Message(m) => Some((m.from.clone(), m.data.clone())),
            _ => None,
        })
        .collect()
}

// =============================================================================
// Publish
// =============================================================================

#[test]
fn author_sees_message_first_and_peer_receives_it() {
    let hub = LoopbackHub::new();
    let mut alice = Member::join(&hub, "alice");
    let mut bob = Member::join(&hub, "bob");
    let _ = alice.drain();
    let _ = bob.drain();

    let seq = alice
        .ctl
        .publish("hello bob")
        .expect("publish")
        .expect("non-empty text");

    let own = alice.drain();
    assert_eq!(shown(&own), vec![("alice".into(), "hello bob".into())]);
    assert!(matches!(own.first(), Some(ViewEvent::Message(_))));

    bob.pump();
    let seen = bob.drain();
    assert_eq!(shown(&seen), vec![("alice".into(), "hello bob".into())]);
    let entry = bob.ctl.peers().get("/ndn/alice").expect("alice tracked");
    assert!(seen.contains(&ViewEvent::PeerUpdated {
        prefix: "/ndn/alice".into(),
        entry: entry.clone(),
    }));
    assert_eq!(entry.sequence, Some(seq));
    assert_eq!(entry.label.as_deref(), Some("alice"));
    assert_eq!(bob.ctl.pending_fetches(), 0);
}

#[test]
fn published_item_carries_session_and_freshness() {
    let hub = LoopbackHub::new();
    let alice = Member::join(&hub, "alice");

    let seq = alice.ctl.publish("first").expect("publish");

    let expected = SeqNo::new(alice.ctl.session(), 0);
    assert_eq!(seq, Some(expected));
    assert_eq!(hub.head(TOPIC, "/ndn/alice"), Some(expected));
    let name = format!("/ndn/alice/{}:0", alice.ctl.session());
    assert_eq!(hub.freshness(TOPIC, &name), Some(Duration::from_secs(60)));
}

#[test]
fn consecutive_messages_advance_the_sequence() {
    let hub = LoopbackHub::new();
    let alice = Member::join(&hub, "alice");
    let mut bob = Member::join(&hub, "bob");

    for text in ["a", "b", "c"] {
        alice.ctl.publish(text).expect("publish");
    }
    bob.pump();

    let session = alice.ctl.session();
    assert_eq!(hub.head(TOPIC, "/ndn/alice"), Some(SeqNo::new(session, 2)));
    let texts: Vec<String> = shown(&bob.drain()).into_iter().map(|(_, t)| t).collect();
    assert_eq!(texts, vec!["a", "b", "c"]);
}

#[test]
fn conversation_in_both_directions() {
    let hub = LoopbackHub::new();
    let mut alice = Member::join(&hub, "alice");
    let mut bob = Member::join(&hub, "bob");

    alice.ctl.publish("ping").expect("publish");
    bob.pump();
    bob.ctl.publish("pong").expect("publish");
    alice.pump();

    let alice_view = shown(&alice.drain());
    assert_eq!(
        alice_view,
        vec![
            ("alice".into(), "ping".into()),
            ("bob".into(), "pong".into())
        ]
    );
    assert_eq!(alice.ctl.peers().len(), 1);
    assert_eq!(bob.ctl.peers().len(), 1);
}

// =============================================================================
// Fetch completion
// =============================================================================

#[test]
fn hello_message_labels_peer_without_display() {
    let hub = LoopbackHub::new();
    let mut alice = Member::join(&hub, "alice");
    let _ = alice.drain();

    let (tx, _rx) = mpsc::channel(16);
    let carol = hub
        .bind(TOPIC, EventSink::new(BindingId::new(500), tx))
        .expect("bind");
    let hello = ChatMessage {
        from: "carol".into(),
        to: "r1".into(),
        data: "joined".into(),
        timestamp: Timestamp::now(),
        msg_type: MessageType::Hello,
    };
    carol
        .publish(
            "/ndn/carol",
            9,
            &codec::encode(&hello).expect("encode"),
            Duration::from_secs(60),
        )
        .expect("publish");
    alice.pump();

    let seen = alice.drain();
    assert!(shown(&seen).is_empty());
    let entry = alice.ctl.peers().get("/ndn/carol").expect("carol tracked");
    assert_eq!(entry.sequence, Some(SeqNo::new(9, 0)));
    assert_eq!(entry.label.as_deref(), Some("carol"));
    // The tree learns the label even though nothing is displayed.
    assert_eq!(
        seen.last(),
        Some(&ViewEvent::PeerUpdated {
            prefix: "/ndn/carol".into(),
            entry: entry.clone(),
        })
    );
}

#[test]
fn departing_member_is_reported_but_kept_in_tree() {
    let hub = LoopbackHub::new();
    let mut alice = Member::join(&hub, "alice");
    let mut bob = Member::join(&hub, "bob");

    bob.ctl.publish("bye").expect("publish");
    alice.pump();
    bob.ctl.shutdown();
    alice.pump();

    let seen = alice.drain();
    assert!(seen.contains(&ViewEvent::PeerRemoved {
        prefix: "/ndn/bob".into()
    }));
    assert!(alice.ctl.peers().get("/ndn/bob").is_some());
    assert_eq!(hub.member_count(TOPIC), 1);
}
