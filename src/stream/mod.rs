mod builder;
mod cache;
mod reconciler;
pub mod results;
mod session;
pub mod state;

pub use results::{FailedObject, FailedReference};
pub use session::StreamSession;
pub use state::SessionPhase;

use std::sync::atomic::AtomicUsize;

use crate::buffer::AsyncQueue;
use crate::config::StreamConfig;
use crate::domain::{Object, QueueEntry, Reference};
use cache::{CorrelationCache, InFlightSet};
use results::ResultSink;
use state::SessionState;

/// One queued submission: the caller's entry plus, for items replayed after
/// an out-of-memory rejection or a truncated frame, the submission index
/// they were originally assigned.
#[derive(Debug)]
pub(crate) struct Pending {
    pub entry: QueueEntry,
    pub replay_index: Option<usize>,
}

impl Pending {
    pub fn new(entry: QueueEntry) -> Self {
        Self {
            entry,
            replay_index: None,
        }
    }

    pub fn replay(entry: QueueEntry, index: usize) -> Self {
        Self {
            entry,
            replay_index: Some(index),
        }
    }
}

/// Session-owned aggregate shared by the frame builder, the response
/// reconciler, and the caller-facing controller. Passed explicitly to both
/// loops; nothing here is ambient or global.
pub(crate) struct Shared {
    pub state: SessionState,
    pub queue: AsyncQueue<Pending>,
    pub objects: CorrelationCache<Object>,
    pub references: CorrelationCache<Reference>,
    pub object_window: InFlightSet,
    pub reference_window: InFlightSet,
    pub results: ResultSink,
    pub object_index: AtomicUsize,
    pub reference_index: AtomicUsize,
    pub config: StreamConfig,
}

impl Shared {
    pub(crate) fn new(config: StreamConfig) -> Self {
        Self {
            state: SessionState::new(config.initial_batch_size),
            queue: AsyncQueue::new(),
            objects: CorrelationCache::new(),
            references: CorrelationCache::new(),
            object_window: InFlightSet::new(),
            reference_window: InFlightSet::new(),
            results: ResultSink::new(),
            object_index: AtomicUsize::new(0),
            reference_index: AtomicUsize::new(0),
            config,
        }
    }
}
