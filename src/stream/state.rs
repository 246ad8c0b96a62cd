use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Caller-visible session lifecycle phase, derived from the atomic flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    NotStarted,
    Healthy,
    ShuttingDown,
    OutOfMemory,
    Shutdown,
    Stopped,
    Failed,
}

/// Lifecycle flags and the server-adjustable batch size, shared by the
/// producer loop, the consumer loop, and the caller-facing controller.
///
/// `batch_size` is the only state mutated from untrusted server input, and
/// adoption is gated on session health so a backoff message cannot starve
/// progress during a recovery window.
#[derive(Debug)]
pub struct SessionState {
    started: AtomicBool,
    shutting_down: AtomicBool,
    shutdown: AtomicBool,
    out_of_memory: AtomicBool,
    user_stopped: AtomicBool,
    renewal_pending: AtomicBool,
    failed: AtomicBool,
    stopped: AtomicBool,
    batch_size: AtomicUsize,
}

impl SessionState {
    pub fn new(initial_batch_size: usize) -> Self {
        Self {
            started: AtomicBool::new(false),
            shutting_down: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            out_of_memory: AtomicBool::new(false),
            user_stopped: AtomicBool::new(false),
            renewal_pending: AtomicBool::new(false),
            failed: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            batch_size: AtomicUsize::new(initial_batch_size),
        }
    }

    pub fn mark_started(&self) {
        self.started.store(true, Ordering::Release);
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Shutdown takes precedence over an out-of-memory condition.
    pub fn mark_shutting_down(&self) {
        self.shutting_down.store(true, Ordering::Release);
        self.out_of_memory.store(false, Ordering::Release);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    pub fn mark_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub fn mark_out_of_memory(&self) {
        self.out_of_memory.store(true, Ordering::Release);
    }

    pub fn is_out_of_memory(&self) -> bool {
        self.out_of_memory.load(Ordering::Acquire)
    }

    pub fn request_stop(&self) {
        self.user_stopped.store(true, Ordering::Release);
    }

    pub fn is_user_stopped(&self) -> bool {
        self.user_stopped.load(Ordering::Acquire)
    }

    pub fn mark_renewal(&self) {
        self.renewal_pending.store(true, Ordering::Release);
    }

    pub fn take_renewal(&self) -> bool {
        self.renewal_pending.swap(false, Ordering::AcqRel)
    }

    pub fn mark_failed(&self) {
        self.failed.store(true, Ordering::Release);
    }

    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    pub fn mark_stopped(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub fn is_healthy(&self) -> bool {
        self.is_started()
            && !self.is_shutting_down()
            && !self.is_shutdown()
            && !self.is_out_of_memory()
            && !self.is_failed()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size.load(Ordering::Acquire)
    }

    /// Adopts a server-suggested batch size; ignored while unhealthy or
    /// user-stopped. Returns whether the suggestion was adopted.
    pub fn apply_backoff(&self, batch_size: usize) -> bool {
        if batch_size == 0 || !self.is_healthy() || self.is_user_stopped() {
            return false;
        }
        self.batch_size.store(batch_size, Ordering::Release);
        true
    }

    /// Clears per-connection flags ahead of a fresh stream; the user-stop
    /// request, failure flag, and adopted batch size survive reconnects.
    pub fn reset_for_reconnect(&self) {
        self.started.store(false, Ordering::Release);
        self.shutting_down.store(false, Ordering::Release);
        self.shutdown.store(false, Ordering::Release);
        self.out_of_memory.store(false, Ordering::Release);
    }

    pub fn phase(&self) -> SessionPhase {
        if self.is_stopped() {
            SessionPhase::Stopped
        } else if self.is_failed() {
            SessionPhase::Failed
        } else if !self.is_started() {
            SessionPhase::NotStarted
        } else if self.is_shutdown() {
            SessionPhase::Shutdown
        } else if self.is_shutting_down() {
            SessionPhase::ShuttingDown
        } else if self.is_out_of_memory() {
            SessionPhase::OutOfMemory
        } else {
            SessionPhase::Healthy
        }
    }
}
