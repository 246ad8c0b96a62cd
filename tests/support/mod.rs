// Shared test harness: channel-backed fakes for the transport collaborators.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::time::{Instant, timeout};

use bulkstream::reliability::{RetryConfig, RetryStrategy};
use bulkstream::transport::{
    Connection, InboundMessage, OutboundFrame, Transport, TransportError,
};
use bulkstream::{Object, Reference, StreamConfig};

pub enum InboundEvent {
    Message(InboundMessage),
    EndOfStream,
}

/// Duplex fake: outbound frames land in a channel the test reads, inbound
/// messages come from a channel the test writes. `EndOfStream` makes `recv`
/// yield `None` once, modelling one stream teardown; later events model the
/// stream that exists after a reconnect.
pub struct FakeTransport {
    outbound: mpsc::UnboundedSender<OutboundFrame>,
    inbound: Mutex<mpsc::UnboundedReceiver<InboundEvent>>,
}

impl Transport for FakeTransport {
    async fn send(&self, frame: OutboundFrame) -> Result<(), TransportError> {
        self.outbound
            .send(frame)
            .map_err(|_| TransportError::SendFailed("test harness closed".to_string()))
    }

    async fn recv(&self) -> Option<InboundMessage> {
        let mut inbound = self.inbound.lock().await;
        match inbound.recv().await {
            Some(InboundEvent::Message(message)) => Some(message),
            Some(InboundEvent::EndOfStream) | None => None,
        }
    }
}

/// The test's side of the fake stream: acts as the server.
pub struct ServerEnd {
    outbound: mpsc::UnboundedReceiver<OutboundFrame>,
    inbound: mpsc::UnboundedSender<InboundEvent>,
}

impl ServerEnd {
    pub fn send(&self, message: InboundMessage) {
        self.inbound
            .send(InboundEvent::Message(message))
            .expect("session closed its inbound stream");
    }

    pub fn end_stream(&self) {
        self.inbound
            .send(InboundEvent::EndOfStream)
            .expect("session closed its inbound stream");
    }

    pub async fn next_frame(&mut self) -> OutboundFrame {
        timeout(Duration::from_secs(5), self.outbound.recv())
            .await
            .expect("timed out waiting for an outbound frame")
            .expect("session dropped its transport")
    }

    /// Collects data frames until the stop control frame arrives.
    pub async fn frames_until_stop(&mut self) -> Vec<OutboundFrame> {
        let mut frames = Vec::new();
        loop {
            let frame = self.next_frame().await;
            if frame.stop {
                return frames;
            }
            frames.push(frame);
        }
    }
}

pub fn fake_transport() -> (FakeTransport, ServerEnd) {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    (
        FakeTransport {
            outbound: outbound_tx,
            inbound: Mutex::new(inbound_rx),
        },
        ServerEnd {
            outbound: outbound_rx,
            inbound: inbound_tx,
        },
    )
}

pub struct FakeConnection {
    max_message_size: usize,
    reconnects: Arc<AtomicUsize>,
    fail_reconnects: bool,
}

impl FakeConnection {
    pub fn reliable(max_message_size: usize) -> (Self, Arc<AtomicUsize>) {
        let reconnects = Arc::new(AtomicUsize::new(0));
        (
            Self {
                max_message_size,
                reconnects: reconnects.clone(),
                fail_reconnects: false,
            },
            reconnects,
        )
    }

    pub fn refusing(max_message_size: usize) -> (Self, Arc<AtomicUsize>) {
        let reconnects = Arc::new(AtomicUsize::new(0));
        (
            Self {
                max_message_size,
                reconnects: reconnects.clone(),
                fail_reconnects: true,
            },
            reconnects,
        )
    }
}

impl Connection for FakeConnection {
    async fn reconnect(&self) -> Result<(), TransportError> {
        self.reconnects.fetch_add(1, Ordering::SeqCst);
        if self.fail_reconnects {
            Err(TransportError::ConnectionFailed(
                "connection refused".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    fn max_message_size(&self) -> usize {
        self.max_message_size
    }
}

/// Tight intervals so the cooperative polling loops settle quickly in tests.
pub fn fast_config() -> StreamConfig {
    StreamConfig {
        initial_batch_size: 100,
        pull_timeout: Duration::from_millis(10),
        poll_interval: Duration::from_millis(2),
        per_item_overhead: 8,
        max_stream_lifetime: None,
        retry: RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            strategy: RetryStrategy::FixedDelay,
            jitter: false,
        },
    }
}

pub async fn wait_until<F: Fn() -> bool>(what: &str, condition: F) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub fn object_keys(frame: &OutboundFrame) -> Vec<String> {
    frame
        .objects
        .iter()
        .map(|payload| {
            let object: Object =
                serde_json::from_slice(payload).expect("object payload is JSON");
            object.id.expect("encoded object carries an id")
        })
        .collect()
}

pub fn reference_keys(frame: &OutboundFrame) -> Vec<String> {
    frame
        .references
        .iter()
        .map(|payload| {
            let reference: Reference =
                serde_json::from_slice(payload).expect("reference payload is JSON");
            reference.beacon()
        })
        .collect()
}
