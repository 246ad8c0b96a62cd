use bytes::Bytes;

/// One discrete outbound message: a bounded batch of encoded items, a stop
/// control signal, or both (a final flush carries data and stop in turn).
#[derive(Debug, Clone, Default)]
pub struct OutboundFrame {
    pub objects: Vec<Bytes>,
    pub references: Vec<Bytes>,
    pub stop: bool,
}

impl OutboundFrame {
    pub fn data(objects: Vec<Bytes>, references: Vec<Bytes>) -> Self {
        Self {
            objects,
            references,
            stop: false,
        }
    }

    pub fn stop() -> Self {
        Self {
            objects: Vec::new(),
            references: Vec::new(),
            stop: true,
        }
    }

    pub fn item_count(&self) -> usize {
        self.objects.len() + self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.references.is_empty() && !self.stop
    }

    /// Total encoded payload size in bytes.
    pub fn payload_size(&self) -> usize {
        self.objects.iter().map(Bytes::len).sum::<usize>()
            + self.references.iter().map(Bytes::len).sum::<usize>()
    }
}

/// Correlation keys grouped by item kind.
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    pub object_keys: Vec<String>,
    pub reference_keys: Vec<String>,
}

impl KeySet {
    pub fn objects(keys: Vec<String>) -> Self {
        Self {
            object_keys: keys,
            reference_keys: Vec::new(),
        }
    }

    pub fn references(keys: Vec<String>) -> Self {
        Self {
            object_keys: Vec::new(),
            reference_keys: keys,
        }
    }
}

/// Per-item outcomes reported by the server.
#[derive(Debug, Clone, Default)]
pub struct WriteResults {
    /// Correlation keys of successfully persisted items.
    pub successes: Vec<String>,
    /// Correlation keys of rejected items, with the server's message.
    pub errors: Vec<WriteError>,
}

#[derive(Debug, Clone)]
pub struct WriteError {
    pub key: String,
    pub message: String,
}

/// One discrete inbound message. The parts are independent and not mutually
/// exclusive within a single message; each is handled on its own.
#[derive(Debug, Clone, Default)]
pub struct InboundMessage {
    /// Server is ready to accept frames.
    pub started: bool,
    /// Server began a graceful shutdown; stop sending.
    pub shutting_down: bool,
    /// Server shut the stream down; reconnect once the stream ends.
    pub shutdown: bool,
    /// Keys received by the server but not yet resolved.
    pub ack: Option<KeySet>,
    /// Server-suggested batch size.
    pub backoff: Option<usize>,
    /// Keys the server rejected for lack of memory; they will be replayed.
    pub out_of_memory: Option<KeySet>,
    /// Final per-item outcomes.
    pub results: Option<WriteResults>,
}

impl InboundMessage {
    pub fn started() -> Self {
        Self {
            started: true,
            ..Self::default()
        }
    }

    pub fn shutting_down() -> Self {
        Self {
            shutting_down: true,
            ..Self::default()
        }
    }

    pub fn shutdown() -> Self {
        Self {
            shutdown: true,
            ..Self::default()
        }
    }

    pub fn ack(keys: KeySet) -> Self {
        Self {
            ack: Some(keys),
            ..Self::default()
        }
    }

    pub fn backoff(batch_size: usize) -> Self {
        Self {
            backoff: Some(batch_size),
            ..Self::default()
        }
    }

    pub fn out_of_memory(keys: KeySet) -> Self {
        Self {
            out_of_memory: Some(keys),
            ..Self::default()
        }
    }

    pub fn results(results: WriteResults) -> Self {
        Self {
            results: Some(results),
            ..Self::default()
        }
    }
}
