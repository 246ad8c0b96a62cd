use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{Pending, Shared};
use crate::domain::QueueEntry;
use crate::transport::{InboundMessage, KeySet, Transport, WriteResults};

/// The long-running consumer loop: applies each inbound message to the
/// in-flight accounting, the correlation caches, and the control-plane
/// state. Runs until the server closes the inbound stream.
pub(crate) struct ResponseReconciler<T> {
    shared: Arc<Shared>,
    transport: Arc<T>,
}

impl<T: Transport> ResponseReconciler<T> {
    pub(crate) fn new(shared: Arc<Shared>, transport: Arc<T>) -> Self {
        Self { shared, transport }
    }

    pub(crate) async fn run(self) {
        while let Some(message) = self.transport.recv().await {
            self.apply(message);
        }
        debug!("inbound stream ended");
    }

    /// Message parts are independent and handled in isolation; one message
    /// may carry several.
    fn apply(&self, message: InboundMessage) {
        if message.started {
            debug!("server started; accepting frames");
            self.shared.state.mark_started();
        }

        if let Some(ack) = message.ack {
            self.apply_ack(&ack);
        }

        if let Some(batch_size) = message.backoff {
            if self.shared.state.apply_backoff(batch_size) {
                info!(batch_size, "server backoff adopted");
            } else {
                debug!(batch_size, "server backoff ignored while unhealthy");
            }
        }

        if let Some(rejected) = message.out_of_memory {
            self.replay_rejected(&rejected);
        }

        if message.shutting_down {
            info!("server shutting down; halting frame production");
            self.shared.state.mark_shutting_down();
        }

        if message.shutdown {
            info!("server shut the stream down");
            self.shared.state.mark_shutdown();
        }

        if let Some(results) = message.results {
            self.apply_results(results);
        }
    }

    /// Acknowledged keys leave the in-flight window; their outcome arrives
    /// separately in a results part.
    fn apply_ack(&self, ack: &KeySet) {
        for key in &ack.object_keys {
            self.shared.object_window.remove(key);
        }
        for key in &ack.reference_keys {
            self.shared.reference_window.remove(key);
        }
    }

    /// Every key the server rejected for lack of memory is re-pushed onto
    /// the queue from its cache entry, original submission index preserved.
    /// A key with no cache entry was already resolved through another path
    /// and is skipped.
    fn replay_rejected(&self, rejected: &KeySet) {
        self.shared.state.mark_out_of_memory();
        let mut replayed = 0usize;
        for key in &rejected.object_keys {
            if let Some(entry) = self.shared.objects.remove(key) {
                self.shared
                    .queue
                    .push(Pending::replay(QueueEntry::Object(entry.item), entry.index));
                replayed += 1;
            }
            self.shared.object_window.remove(key);
        }
        for key in &rejected.reference_keys {
            if let Some(entry) = self.shared.references.remove(key) {
                self.shared.queue.push(Pending::replay(
                    QueueEntry::Reference(entry.item),
                    entry.index,
                ));
                replayed += 1;
            }
            self.shared.reference_window.remove(key);
        }
        warn!(replayed, "server out of memory; rejected entries requeued");
    }

    /// Resolves outcomes through the correlation caches. A key missing from
    /// both caches was already reconciled or superseded by an out-of-memory
    /// replay; dropping it is the idempotence guard, not an error.
    fn apply_results(&self, results: WriteResults) {
        for error in results.errors {
            if let Some(entry) = self.shared.objects.remove(&error.key) {
                self.shared.object_window.remove(&error.key);
                self.shared
                    .results
                    .record_object_error(entry.index, error.message, entry.item);
            } else if let Some(entry) = self.shared.references.remove(&error.key) {
                self.shared.reference_window.remove(&error.key);
                self.shared
                    .results
                    .record_reference_error(entry.index, error.message, entry.item);
            } else {
                debug!(key = %error.key, "error result for unknown key dropped");
            }
        }

        for key in results.successes {
            if let Some(entry) = self.shared.objects.remove(&key) {
                self.shared.object_window.remove(&key);
                self.shared.results.record_object_success(entry.index, key);
            } else if let Some(entry) = self.shared.references.remove(&key) {
                self.shared.reference_window.remove(&key);
                self.shared
                    .results
                    .record_reference_success(entry.index, key);
            } else {
                debug!(key = %key, "success result for unknown key dropped");
            }
        }
    }
}
