use async_trait::async_trait;
use ferry_core::{MalformedMessage, Message, RpcError};
use thiserror::Error;

use crate::codec::CodecError;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection closed")]
    ConnectionClosed,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
    /// One rejected message. The connection stays usable.
    #[error("{0}")]
    Malformed(MalformedMessage),
}

impl From<TransportError> for RpcError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Malformed(bad) => RpcError::protocol(bad.to_string()),
            other => RpcError::transport(other.to_string()),
        }
    }
}

/// The two channel primitives a connection is built from.
///
/// Both ends may be used concurrently: many tasks push replies and requests
/// while a single receive loop pops.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn push(&self, msg: Message) -> Result<(), TransportError>;

    /// The next message, or `None` once the peer has gone away.
    /// `Malformed` is the only error after which popping may continue.
    async fn pop(&self) -> Result<Option<Message>, TransportError>;

    /// Stop both directions. A pending `pop` returns `None`.
    async fn close(&self) -> Result<(), TransportError>;
}
