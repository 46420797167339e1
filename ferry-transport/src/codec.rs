use bytes::{Buf, BufMut, BytesMut};
use ferry_core::protocol::Message;
use ferry_core::{decode_frame, encode_message, MalformedMessage};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

/// Newline-delimited JSON codec.
///
/// A line that is not a valid message decodes to `Some(Err(_))` and the
/// stream goes on. Only oversized lines and I/O failures end it.
#[derive(Debug, Clone)]
pub struct NewlineDelimitedCodec {
    max_line_length: usize,
}

impl NewlineDelimitedCodec {
    pub fn new() -> Self {
        Self {
            max_line_length: 1024 * 1024, // 1MB default
        }
    }

    pub fn with_max_line_length(max_line_length: usize) -> Self {
        Self { max_line_length }
    }

    pub fn max_line_length(&self) -> usize {
        self.max_line_length
    }
}

impl Default for NewlineDelimitedCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for NewlineDelimitedCodec {
    type Item = Result<Message, MalformedMessage>;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(pos) = src.iter().position(|&b| b == b'\n') else {
            if src.len() > self.max_line_length {
                return Err(CodecError::LineTooLong(src.len()));
            }
            return Ok(None);
        };

        if pos > self.max_line_length {
            return Err(CodecError::LineTooLong(pos));
        }

        let line = src.split_to(pos);
        src.advance(1);

        Ok(Some(decode_frame(&line)))
    }
}

impl Encoder<Message> for NewlineDelimitedCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json_bytes =
            encode_message(&item).map_err(|e| CodecError::JsonError(e.to_string()))?;

        if json_bytes.len() > self.max_line_length {
            return Err(CodecError::LineTooLong(json_bytes.len()));
        }

        dst.reserve(json_bytes.len() + 1);
        dst.put_slice(&json_bytes);
        dst.put_u8(b'\n');

        Ok(())
    }
}

/// Codec errors
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Line too long: {0} bytes")]
    LineTooLong(usize),

    #[error("JSON error: {0}")]
    JsonError(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}
