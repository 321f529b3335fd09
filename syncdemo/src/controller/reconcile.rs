//! Reaction to missing-data notifications.
//!
//! A batch is either fetched in full or skipped in full. Large batches (a
//! fresh join, a healed partition) are left alone; they show up in the tree
//! view but are not worth pulling item by item.

use crate::sync::{DataName, MissingDataInfo, SocketFactory, SyncSocket, total_missing};

use super::{ReconcileOutcome, SyncController, ViewEvent};

impl<F: SocketFactory> SyncController<F> {
    /// Run one reconciliation pass for a digest change.
    pub(crate) fn on_missing_data(
        &mut self,
        ranges: &[MissingDataInfo],
        digest: &str,
    ) -> ReconcileOutcome {
        if ranges.is_empty() {
            return ReconcileOutcome::Empty;
        }
        if self.socket.is_none() {
            tracing::debug!("missing-data notification without binding");
            return ReconcileOutcome::Unbound;
        }

        for range in ranges {
            self.peers.observe(&range.prefix, range.high);
        }
        self.digest = Some(digest.to_string());
        self.emit(ViewEvent::TreeUpdated {
            ranges: ranges.to_vec(),
            digest: digest.to_string(),
        });
        for range in ranges {
            self.emit_peer(&range.prefix);
        }

        let total = total_missing(ranges);
        let outcome = if total < self.config.fetch_threshold {
            let (issued, failed) = self.fetch_all(ranges);
            tracing::debug!(total, issued, failed, "fetching missing items");
            ReconcileOutcome::Fetched { issued, failed }
        } else {
            tracing::info!(
                total,
                threshold = self.config.fetch_threshold,
                "too many missing items, skipping fetch"
            );
            self.emit(ViewEvent::FetchSkipped { total });
            ReconcileOutcome::Skipped { total }
        };

        self.emit(ViewEvent::Refit);
        outcome
    }

    fn fetch_all(&mut self, ranges: &[MissingDataInfo]) -> (u64, u64) {
        let Some(socket) = self.socket.as_ref() else {
            return (0, 0);
        };
        let retries = self.config.fetch_retries;
        let mut issued = 0u64;
        let mut failed = 0u64;

        for range in ranges {
            for seq in range.sequences() {
                match socket.fetch(&range.prefix, seq, retries) {
                    Ok(()) => {
                        self.pending
                            .insert(DataName::new(range.prefix.as_str(), seq).to_string());
                        issued += 1;
                    }
                    Err(e) => {
                        tracing::warn!(
                            prefix = %range.prefix,
                            seq = %seq,
                            error = %e,
                            "fetch not issued"
                        );
                        failed += 1;
                    }
                }
            }
        }
        (issued, failed)
    }
}
