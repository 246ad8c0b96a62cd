pub mod codec;
pub mod message;

pub use codec::{Codec, CodecError, EncodedItem, JsonCodec};
pub use message::{InboundMessage, KeySet, OutboundFrame, WriteError, WriteResults};

use thiserror::Error;

#[cfg(test)]
use mockall::automock;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Send failed: {0}")]
    SendFailed(String),
    #[error("Frame of {size} bytes exceeds maximum message size {limit}")]
    FrameTooLarge { size: usize, limit: usize },
    #[error("Stream closed")]
    StreamClosed,
}

/// Duplex message stream to the ingestion endpoint.
///
/// `recv` yields the server's next inbound message and returns `None` once
/// the server closes the stream; after a successful [`Connection::reconnect`]
/// a fresh stream begins and `recv` yields messages again.
pub trait Transport: Send + Sync + 'static {
    fn send(
        &self,
        frame: OutboundFrame,
    ) -> impl std::future::Future<Output = Result<(), TransportError>> + Send;

    fn recv(&self) -> impl std::future::Future<Output = Option<InboundMessage>> + Send;
}

/// Underlying connection owning the stream's lifecycle limits.
#[cfg_attr(test, automock)]
pub trait Connection: Send + Sync + 'static {
    fn reconnect(&self) -> impl std::future::Future<Output = Result<(), TransportError>> + Send;

    /// Hard upper bound on one outbound frame's encoded size, in bytes.
    fn max_message_size(&self) -> usize;
}
