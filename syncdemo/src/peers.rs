//! Per-prefix sequence progress of the peers in the current room.
//!
//! The [`PeerSequenceTable`] is the model behind the digest tree view: one
//! node per publishing prefix, carrying the last sequence number observed
//! for it and the nick last seen on a message from it.
//!
//! Updates are last-write-wins. Notifications and fetch completions can
//! arrive out of order, so a later `observe` with a smaller sequence number
//! moves the entry backwards; readers must tolerate that.

use std::collections::BTreeMap;

use crate::sync::SeqNo;

/// What is known about one prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerEntry {
    /// Last sequence number observed for the prefix.
    pub sequence: Option<SeqNo>,
    /// Nick last seen on a message from the prefix.
    pub label: Option<String>,
}

/// Mapping from peer prefix to its observed progress.
#[derive(Debug, Clone, Default)]
pub struct PeerSequenceTable {
    entries: BTreeMap<String, PeerEntry>,
}

impl PeerSequenceTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `prefix` has reached `sequence`, overwriting any
    /// previous value.
    pub fn observe(&mut self, prefix: &str, sequence: SeqNo) {
        self.entry(prefix).sequence = Some(sequence);
    }

    /// Records the display label for `prefix`.
    pub fn label(&mut self, prefix: &str, nick: &str) {
        self.entry(prefix).label = Some(nick.to_string());
    }

    /// Entry for `prefix`, if any.
    #[must_use]
    pub fn get(&self, prefix: &str) -> Option<&PeerEntry> {
        self.entries.get(prefix)
    }

    /// Current contents, sorted by prefix.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, PeerEntry)> {
        self.entries
            .iter()
            .map(|(prefix, entry)| (prefix.clone(), entry.clone()))
            .collect()
    }

    /// Clears every entry.
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// Number of known prefixes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no prefix is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&mut self, prefix: &str) -> &mut PeerEntry {
        self.entries.entry(prefix.to_string()).or_default()
    }
}
