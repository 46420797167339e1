use async_trait::async_trait;
use ferry_core::Message;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::codec::NewlineDelimitedCodec;
use crate::transport::{Transport, TransportError};

/// Newline-delimited JSON over a byte stream pair.
#[derive(Debug)]
pub struct FramedTransport<R, W> {
    reader: Mutex<FramedRead<R, NewlineDelimitedCodec>>,
    writer: Mutex<FramedWrite<W, NewlineDelimitedCodec>>,
    shutdown: CancellationToken,
}

impl<R, W> FramedTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W, max_line_length: usize) -> Self {
        let codec = NewlineDelimitedCodec::with_max_line_length(max_line_length);
        FramedTransport {
            reader: Mutex::new(FramedRead::new(reader, codec.clone())),
            writer: Mutex::new(FramedWrite::new(writer, codec)),
            shutdown: CancellationToken::new(),
        }
    }
}

impl<S> FramedTransport<ReadHalf<S>, WriteHalf<S>>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Frame a single bidirectional stream such as a socket.
    pub fn from_stream(stream: S, max_line_length: usize) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self::new(reader, writer, max_line_length)
    }
}

#[async_trait]
impl<R, W> Transport for FramedTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn push(&self, msg: Message) -> Result<(), TransportError> {
        if self.shutdown.is_cancelled() {
            return Err(TransportError::ConnectionClosed);
        }
        trace!("framed push: {}", msg.tag());
        self.writer.lock().await.send(msg).await?;
        Ok(())
    }

    async fn pop(&self) -> Result<Option<Message>, TransportError> {
        let mut reader = self.reader.lock().await;
        tokio::select! {
            _ = self.shutdown.cancelled() => Ok(None),
            frame = reader.next() => match frame {
                Some(Ok(Ok(msg))) => Ok(Some(msg)),
                Some(Ok(Err(bad))) => {
                    warn!("framed pop rejected a line: {}", bad);
                    Err(TransportError::Malformed(bad))
                }
                Some(Err(err)) => Err(err.into()),
                None => {
                    debug!("framed stream reached end of input");
                    Ok(None)
                }
            },
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.shutdown.cancel();
        self.writer.lock().await.close().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodecError;
    use ferry_core::protocol::{Literal, WireValue};
    use ferry_core::CallId;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_duplex_exchange() {
        let (left, right) = tokio::io::duplex(4096);
        let a = FramedTransport::from_stream(left, 1024);
        let b = FramedTransport::from_stream(right, 1024);

        let msg = Message::Finished {
            id: CallId::new(7),
            result: WireValue::Literal(Literal::Str("done".into())),
        };
        a.push(msg.clone()).await.unwrap();
        assert_eq!(b.pop().await.unwrap(), Some(msg));
    }

    #[tokio::test]
    async fn test_close_signals_end_of_stream() {
        let (left, right) = tokio::io::duplex(4096);
        let a = FramedTransport::from_stream(left, 1024);
        let b = FramedTransport::from_stream(right, 1024);

        a.close().await.unwrap();
        assert_eq!(b.pop().await.unwrap(), None);
        assert!(matches!(
            a.push(Message::GetExportNames { id: CallId::new(1) }).await,
            Err(TransportError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_malformed_line_leaves_stream_open() {
        let (mut raw, right) = tokio::io::duplex(4096);
        let b = FramedTransport::from_stream(right, 1024);

        raw.write_all(b"[\"teleport\", 1]\n[\"get_export_names\", 2]\n")
            .await
            .unwrap();
        match b.pop().await {
            Err(TransportError::Malformed(bad)) => {
                assert_eq!(bad.tag.as_deref(), Some("teleport"));
                assert_eq!(bad.id, Some(CallId::new(1)));
            }
            other => panic!("Expected malformed line, got {:?}", other),
        }
        assert_eq!(
            b.pop().await.unwrap(),
            Some(Message::GetExportNames { id: CallId::new(2) })
        );
    }

    #[tokio::test]
    async fn test_oversized_line_is_fatal() {
        let (mut raw, right) = tokio::io::duplex(4096);
        let b = FramedTransport::from_stream(right, 16);

        raw.write_all(&[b'x'; 64]).await.unwrap();
        assert!(matches!(
            b.pop().await,
            Err(TransportError::Codec(CodecError::LineTooLong(_)))
        ));
    }
}
