use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::builder::{BuilderExit, FrameBuilder};
use super::reconciler::ResponseReconciler;
use super::results::{FailedObject, FailedReference};
use super::state::SessionPhase;
use super::{Pending, Shared};
use crate::config::StreamConfig;
use crate::domain::{Object, QueueEntry, Reference, StreamError};
use crate::reliability::ReconnectPolicy;
use crate::transport::{Codec, Connection, Transport};

/// One streaming batch-write session: accepts objects and references from
/// any number of caller tasks, frames them onto the transport, and tracks
/// every item until the server reports its outcome.
///
/// Created per logical batch-write operation via [`StreamSession::open`]
/// (requires a tokio runtime); owns one queue and one pair of correlation
/// caches for its lifetime.
pub struct StreamSession {
    shared: Arc<Shared>,
    driver: Mutex<Option<JoinHandle<Result<(), StreamError>>>>,
    issued_ids: Mutex<HashSet<String>>,
}

impl StreamSession {
    /// Validates the configuration and starts the frame-building and
    /// response-reconciliation loops as concurrently progressing tasks.
    pub fn open<T, C, N>(
        transport: T,
        codec: C,
        connection: N,
        config: StreamConfig,
    ) -> Result<Self, StreamError>
    where
        T: Transport,
        C: Codec,
        N: Connection,
    {
        config.validate()?;
        let shared = Arc::new(Shared::new(config));
        let driver = tokio::spawn(drive(
            shared.clone(),
            Arc::new(transport),
            Arc::new(codec),
            Arc::new(connection),
        ));
        info!(
            batch_size = shared.config.initial_batch_size,
            "streaming session opened"
        );
        Ok(Self {
            shared,
            driver: Mutex::new(Some(driver)),
            issued_ids: Mutex::new(HashSet::new()),
        })
    }

    /// Enqueues one object, assigning an identifier if the caller did not
    /// supply one, and returns that identifier once the object is enqueued.
    /// Acknowledgement is reported asynchronously via [`Self::uuids`] and
    /// [`Self::object_errors`].
    ///
    /// Suspends cooperatively while the object in-flight window is full or
    /// the session is unhealthy. Identifiers must be unique within the
    /// session's submission; duplicates are rejected.
    pub async fn add_object(&self, mut object: Object) -> Result<String, StreamError> {
        let id = object.ensure_id();
        if !self.issued_ids.lock().insert(id.clone()) {
            return Err(StreamError::DuplicateObjectId(id));
        }
        if let Err(err) = self.admit(true).await {
            // The object was never submitted; free the id for a retry.
            self.issued_ids.lock().remove(&id);
            return Err(err);
        }
        self.shared
            .queue
            .push(Pending::new(QueueEntry::Object(object)));
        Ok(id)
    }

    /// Enqueues one reference and returns its beacon. Suspends while the
    /// reference in-flight window is full or the session is unhealthy.
    pub async fn add_reference(&self, reference: Reference) -> Result<String, StreamError> {
        let beacon = reference.beacon();
        self.admit(false).await?;
        self.shared
            .queue
            .push(Pending::new(QueueEntry::Reference(reference)));
        Ok(beacon)
    }

    /// Marks the session user-stopped. Already-enqueued items are still
    /// sent; the frame builder drains the queue and closes the stream on
    /// its own schedule. Subsequent add calls are rejected.
    pub fn stop(&self) {
        info!("session stop requested");
        self.shared.state.request_stop();
    }

    /// Awaits session completion, surfacing permanent connection failure.
    /// Call after [`Self::stop`]; safe to call once per session (later
    /// calls report the terminal state without re-joining).
    pub async fn finish(&self) -> Result<(), StreamError> {
        let handle = self.driver.lock().take();
        match handle {
            Some(handle) => handle
                .await
                .map_err(|err| StreamError::Task(err.to_string()))?,
            None => {
                if self.shared.state.is_failed() {
                    Err(StreamError::ReconnectExhausted {
                        attempts: self.shared.config.retry.max_attempts,
                    })
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Successfully persisted object ids, by object submission index.
    pub fn uuids(&self) -> HashMap<usize, String> {
        self.shared.results.uuids()
    }

    /// Successfully persisted reference beacons, by reference submission
    /// index.
    pub fn beacons(&self) -> HashMap<usize, String> {
        self.shared.results.beacons()
    }

    /// Server-rejected objects, by object submission index.
    pub fn object_errors(&self) -> HashMap<usize, FailedObject> {
        self.shared.results.object_errors()
    }

    /// Server-rejected references, by reference submission index.
    pub fn reference_errors(&self) -> HashMap<usize, FailedReference> {
        self.shared.results.reference_errors()
    }

    pub fn has_errors(&self) -> bool {
        self.shared.results.has_errors()
    }

    pub fn phase(&self) -> SessionPhase {
        self.shared.state.phase()
    }

    /// Current item-count ceiling, as adjusted by server backoff messages.
    pub fn batch_size(&self) -> usize {
        self.shared.state.batch_size()
    }

    /// Admission gate for add calls: suspends while the per-kind in-flight
    /// window is at the batch-size ceiling or the session is unhealthy.
    async fn admit(&self, is_object: bool) -> Result<(), StreamError> {
        loop {
            if self.shared.state.is_user_stopped() || self.shared.state.is_stopped() {
                return Err(StreamError::SessionStopped);
            }
            if self.shared.state.is_failed() {
                return Err(StreamError::ReconnectExhausted {
                    attempts: self.shared.config.retry.max_attempts,
                });
            }
            let window = if is_object {
                &self.shared.object_window
            } else {
                &self.shared.reference_window
            };
            if self.shared.state.is_healthy() && window.has_room(self.shared.state.batch_size()) {
                return Ok(());
            }
            sleep(self.shared.config.poll_interval).await;
        }
    }
}

/// The reconnect-and-resume state machine: one iteration per connection
/// epoch, looping (never recursing) until the session reaches a terminal
/// state.
async fn drive<T, C, N>(
    shared: Arc<Shared>,
    transport: Arc<T>,
    codec: Arc<C>,
    connection: Arc<N>,
) -> Result<(), StreamError>
where
    T: Transport,
    C: Codec,
    N: Connection,
{
    let max_frame_bytes = connection.max_message_size();
    let mut policy = ReconnectPolicy::new(shared.config.retry.clone());

    loop {
        let cancel = CancellationToken::new();
        let builder = FrameBuilder::new(
            shared.clone(),
            transport.clone(),
            codec.clone(),
            max_frame_bytes,
            cancel.clone(),
        );
        let reconciler = ResponseReconciler::new(shared.clone(), transport.clone());

        let builder_task = tokio::spawn(builder.run());
        let reconciler_task = tokio::spawn(reconciler.run());

        // The inbound stream ending is the epoch's terminal event; the
        // builder is cancelled afterwards if it has not exited on its own.
        if reconciler_task.await.is_err() {
            warn!("reconciler task panicked");
        }
        cancel.cancel();
        let exit = match builder_task.await {
            Ok(Ok(exit)) => exit,
            Ok(Err(err)) => {
                debug!("frame builder ended with error: {err}");
                BuilderExit::Interrupted
            }
            Err(_) => {
                warn!("frame builder task panicked");
                BuilderExit::Interrupted
            }
        };

        // Shutdown wins over a concurrent clean drain: an out-of-memory
        // replay may have landed in the queue after the builder drained,
        // and only a fresh epoch can deliver it.
        if shared.state.is_shutdown() {
            reconnect(&shared, connection.as_ref(), &mut policy).await?;
            shared.state.reset_for_reconnect();
            continue;
        }

        if shared.state.take_renewal() {
            debug!("restarting loops after stream renewal");
            shared.state.reset_for_reconnect();
            continue;
        }

        if shared.state.is_user_stopped() && exit == BuilderExit::Drained {
            shared.state.mark_stopped();
            info!(
                successes = shared.results.success_count(),
                errors = shared.results.error_count(),
                "session stopped cleanly"
            );
            return Ok(());
        }

        // Inbound stream ended with no shutdown, renewal, or stop request.
        let leftover = shared.queue.len();
        if leftover > 0 {
            warn!(leftover, "inbound stream ended with unresolved entries");
        }
        shared.state.mark_stopped();
        info!("inbound stream ended; session closed");
        return Ok(());
    }
}

/// Re-establishes the connection with capped, jittered backoff. Exhausting
/// the attempt budget is fatal to the session.
async fn reconnect<N: Connection>(
    shared: &Arc<Shared>,
    connection: &N,
    policy: &mut ReconnectPolicy,
) -> Result<(), StreamError> {
    loop {
        let Some(delay) = policy.next_delay() else {
            shared.state.mark_failed();
            error!(
                attempts = policy.max_attempts(),
                "reconnect attempts exhausted; failing session"
            );
            return Err(StreamError::ReconnectExhausted {
                attempts: policy.max_attempts(),
            });
        };
        debug!(
            attempt = policy.attempt(),
            max_attempts = policy.max_attempts(),
            "reconnecting after {delay:?}"
        );
        sleep(delay).await;
        match connection.reconnect().await {
            Ok(()) => {
                info!(attempt = policy.attempt(), "reconnected");
                policy.reset();
                return Ok(());
            }
            Err(err) => warn!("reconnect attempt failed: {err}"),
        }
    }
}
