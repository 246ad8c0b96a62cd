use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Pending, Shared};
use crate::domain::{QueueEntry, StreamError};
use crate::transport::{Codec, EncodedItem, OutboundFrame, Transport};

/// Why the producer loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BuilderExit {
    /// User stop observed with an empty queue; final frame flushed and the
    /// stop control frame sent. The sole clean-termination path.
    Drained,
    /// Maximum stream lifetime elapsed; stop control frame sent so the
    /// session can re-establish the stream. Proactive, not a failure.
    Renewal,
    /// Lifecycle signal or epoch cancellation; unsent work was returned to
    /// the queue for the next connection epoch.
    Interrupted,
}

/// The long-running producer loop: drains the queue, encodes entries, and
/// accumulates them into frames bounded by the transport's byte ceiling and
/// the server-adjustable batch size.
pub(crate) struct FrameBuilder<T, C> {
    shared: Arc<Shared>,
    transport: Arc<T>,
    codec: Arc<C>,
    max_frame_bytes: usize,
    cancel: CancellationToken,
}

#[derive(Default)]
struct FrameInProgress {
    objects: Vec<Bytes>,
    references: Vec<Bytes>,
    object_keys: Vec<String>,
    reference_keys: Vec<String>,
    bytes: usize,
}

impl FrameInProgress {
    fn item_count(&self) -> usize {
        self.objects.len() + self.references.len()
    }

    fn is_empty(&self) -> bool {
        self.item_count() == 0
    }

    fn push(&mut self, encoded: EncodedItem, is_object: bool, weight: usize) {
        if is_object {
            self.objects.push(encoded.payload);
            self.object_keys.push(encoded.key);
        } else {
            self.references.push(encoded.payload);
            self.reference_keys.push(encoded.key);
        }
        self.bytes += weight;
    }

    fn take(&mut self) -> (OutboundFrame, Vec<String>, Vec<String>) {
        let frame = OutboundFrame::data(
            std::mem::take(&mut self.objects),
            std::mem::take(&mut self.references),
        );
        let object_keys = std::mem::take(&mut self.object_keys);
        let reference_keys = std::mem::take(&mut self.reference_keys);
        self.bytes = 0;
        (frame, object_keys, reference_keys)
    }
}

impl<T: Transport, C: Codec> FrameBuilder<T, C> {
    pub(crate) fn new(
        shared: Arc<Shared>,
        transport: Arc<T>,
        codec: Arc<C>,
        max_frame_bytes: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            shared,
            transport,
            codec,
            max_frame_bytes,
            cancel,
        }
    }

    pub(crate) async fn run(self) -> Result<BuilderExit, StreamError> {
        if !self.wait_until_started().await {
            return Ok(BuilderExit::Interrupted);
        }
        debug!("server ready; draining queue into frames");

        let deadline = self
            .shared
            .config
            .max_stream_lifetime
            .map(|lifetime| Instant::now() + lifetime);
        let mut frame = FrameInProgress::default();

        loop {
            if self.interrupted() {
                let returned = self.requeue_frame(&mut frame);
                debug!(returned, "frame builder interrupted");
                return Ok(BuilderExit::Interrupted);
            }

            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    self.requeue_frame(&mut frame);
                    self.shared.state.mark_renewal();
                    self.transport.send(OutboundFrame::stop()).await?;
                    info!("stream lifetime reached; renewing stream");
                    return Ok(BuilderExit::Renewal);
                }
            }

            let pulled = self
                .shared
                .queue
                .pull(Some(self.shared.config.pull_timeout))
                .await;
            let Some(pending) = pulled else {
                if !self.shared.state.is_user_stopped() {
                    // No work yet; keep watching for signals.
                    continue;
                }
                if !frame.is_empty() && !self.dispatch(&mut frame).await? {
                    self.requeue_frame(&mut frame);
                    return Ok(BuilderExit::Interrupted);
                }
                self.transport.send(OutboundFrame::stop()).await?;
                debug!("queue drained after stop request; closing stream");
                return Ok(BuilderExit::Drained);
            };

            let is_object = pending.entry.is_object();
            let index = pending.replay_index.unwrap_or_else(|| {
                let counter = if is_object {
                    &self.shared.object_index
                } else {
                    &self.shared.reference_index
                };
                counter.fetch_add(1, Ordering::Relaxed)
            });

            let encoded = match self.codec.encode(&pending.entry) {
                Ok(encoded) => encoded,
                Err(err) => {
                    warn!(index, "entry failed to encode: {err}");
                    self.fail_locally(pending.entry, index, err.to_string());
                    continue;
                }
            };

            let weight = encoded.size + self.shared.config.per_item_overhead;
            if weight > self.max_frame_bytes {
                warn!(index, size = encoded.size, "entry exceeds maximum message size");
                self.fail_locally(
                    pending.entry,
                    index,
                    format!(
                        "encoded size {} exceeds maximum message size {}",
                        encoded.size, self.max_frame_bytes
                    ),
                );
                continue;
            }

            // Cache before the boundary check so the entry is replayable
            // from the moment it can appear on the wire.
            match &pending.entry {
                QueueEntry::Object(object) => {
                    self.shared
                        .objects
                        .insert(encoded.key.clone(), object.clone(), index);
                }
                QueueEntry::Reference(reference) => {
                    self.shared
                        .references
                        .insert(encoded.key.clone(), reference.clone(), index);
                }
            }

            let batch_size = self.shared.state.batch_size();
            let closes_frame = !frame.is_empty()
                && (frame.bytes + weight > self.max_frame_bytes
                    || frame.item_count() + 1 > batch_size);
            if closes_frame && !self.dispatch(&mut frame).await? {
                self.requeue_frame(&mut frame);
                self.requeue_key(&encoded.key, is_object);
                return Ok(BuilderExit::Interrupted);
            }

            frame.push(encoded, is_object, weight);
        }
    }

    /// First suspension point: the server must report `started` before any
    /// frame goes out. Exits early if the epoch is cancelled or the session
    /// failed, so a silent server cannot leak this task.
    async fn wait_until_started(&self) -> bool {
        loop {
            if self.shared.state.is_started() {
                return true;
            }
            if self.cancel.is_cancelled() || self.shared.state.is_failed() {
                return false;
            }
            sleep(self.shared.config.poll_interval).await;
        }
    }

    fn interrupted(&self) -> bool {
        self.cancel.is_cancelled()
            || self.shared.state.is_shutting_down()
            || self.shared.state.is_shutdown()
            || self.shared.state.is_out_of_memory()
            || self.shared.state.is_failed()
    }

    /// Waits for in-flight window room, snapshots the frame's keys into the
    /// windows, and emits the frame. Returns `false` if a lifecycle signal
    /// arrived mid-wait (the frame is left intact for the caller to requeue).
    async fn dispatch(&self, frame: &mut FrameInProgress) -> Result<bool, StreamError> {
        loop {
            if self.interrupted() {
                return Ok(false);
            }
            let batch_size = self.shared.state.batch_size();
            // A frame built before a backoff shrank the batch size may alone
            // exceed the new ceiling; it goes out once the window is clear.
            let objects_ok = frame.object_keys.is_empty() || {
                let in_flight = self.shared.object_window.len();
                in_flight == 0 || in_flight + frame.object_keys.len() <= batch_size
            };
            let references_ok = frame.reference_keys.is_empty() || {
                let in_flight = self.shared.reference_window.len();
                in_flight == 0 || in_flight + frame.reference_keys.len() <= batch_size
            };
            if objects_ok && references_ok {
                break;
            }
            sleep(self.shared.config.poll_interval).await;
        }

        let (outbound, object_keys, reference_keys) = frame.take();
        self.shared.object_window.insert_all(&object_keys);
        self.shared.reference_window.insert_all(&reference_keys);
        debug!(
            objects = outbound.objects.len(),
            references = outbound.references.len(),
            bytes = outbound.payload_size(),
            "emitting frame"
        );

        if let Err(err) = self.transport.send(outbound).await {
            warn!(
                entries = object_keys.len() + reference_keys.len(),
                "frame send failed: {err}; returning entries to queue"
            );
            for key in &object_keys {
                self.shared.object_window.remove(key);
                self.requeue_key(key, true);
            }
            for key in &reference_keys {
                self.shared.reference_window.remove(key);
                self.requeue_key(key, false);
            }
            return Err(err.into());
        }
        Ok(true)
    }

    /// Returns the partial frame's entries to the queue, indices preserved.
    fn requeue_frame(&self, frame: &mut FrameInProgress) -> usize {
        let (_, object_keys, reference_keys) = frame.take();
        let returned = object_keys.len() + reference_keys.len();
        for key in &object_keys {
            self.requeue_key(key, true);
        }
        for key in &reference_keys {
            self.requeue_key(key, false);
        }
        returned
    }

    fn requeue_key(&self, key: &str, is_object: bool) {
        if is_object {
            if let Some(entry) = self.shared.objects.remove(key) {
                self.shared
                    .queue
                    .push(Pending::replay(QueueEntry::Object(entry.item), entry.index));
            }
        } else if let Some(entry) = self.shared.references.remove(key) {
            self.shared.queue.push(Pending::replay(
                QueueEntry::Reference(entry.item),
                entry.index,
            ));
        }
    }

    fn fail_locally(&self, entry: QueueEntry, index: usize, message: String) {
        match entry {
            QueueEntry::Object(object) => {
                self.shared.results.record_object_error(index, message, object);
            }
            QueueEntry::Reference(reference) => {
                self.shared
                    .results
                    .record_reference_error(index, message, reference);
            }
        }
    }
}
