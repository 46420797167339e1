//! One message per JSON document. Framing lives in the transport crate.

use std::fmt;

use bytes::Bytes;
use serde_json::Value as JsonValue;

use crate::error::RpcError;
use crate::ids::CallId;
use crate::protocol::Message;

pub fn encode_message(msg: &Message) -> Result<Bytes, RpcError> {
    let json = serde_json::to_vec(msg)?;
    Ok(Bytes::from(json))
}

pub fn decode_message(data: &[u8]) -> Result<Message, RpcError> {
    let msg = serde_json::from_slice(data)?;
    Ok(msg)
}

/// A document that is not a valid message, with whatever could still be
/// read from its header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedMessage {
    pub tag: Option<String>,
    pub id: Option<CallId>,
    pub reason: String,
}

impl MalformedMessage {
    /// Recover the tag and call id of a rejected document when its outer
    /// array still parses.
    pub fn inspect(data: &[u8], reason: impl Into<String>) -> Self {
        let header = serde_json::from_slice::<JsonValue>(data).ok();
        let items = header.as_ref().and_then(JsonValue::as_array);
        MalformedMessage {
            tag: items
                .and_then(|items| items.first())
                .and_then(JsonValue::as_str)
                .map(str::to_string),
            id: items
                .and_then(|items| items.get(1))
                .and_then(JsonValue::as_u64)
                .map(CallId::new),
            reason: reason.into(),
        }
    }

    /// Whether the document claimed to answer one of our calls.
    pub fn is_reply(&self) -> bool {
        matches!(self.tag.as_deref(), Some("finished") | Some("failed"))
    }
}

impl fmt::Display for MalformedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed {}", self.tag.as_deref().unwrap_or("message"))?;
        match self.id {
            Some(id) => write!(f, " for {}", id)?,
            None => write!(f, " for unknown call")?,
        }
        write!(f, ": {}", self.reason)
    }
}

impl std::error::Error for MalformedMessage {}

/// Decode one document, keeping what is salvageable when it is rejected.
pub fn decode_frame(data: &[u8]) -> Result<Message, MalformedMessage> {
    decode_message(data).map_err(|err| MalformedMessage::inspect(data, err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let msg = Message::GetExportNames { id: CallId::new(9) };
        let bytes = encode_message(&msg).unwrap();
        assert_eq!(&bytes[..], br#"["get_export_names",9]"#);
        assert_eq!(decode_message(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_decode_garbage_is_protocol_error() {
        let err = decode_message(b"[\"finished\"").unwrap_err();
        assert!(matches!(err, RpcError::Protocol(_)));

        let err = decode_message(br#"["unknown", 1]"#).unwrap_err();
        assert!(matches!(err, RpcError::Protocol(_)));
    }

    #[test]
    fn test_rejected_frame_keeps_header() {
        let bad = decode_frame(br#"["teleport", 4]"#).unwrap_err();
        assert_eq!(bad.tag.as_deref(), Some("teleport"));
        assert_eq!(bad.id, Some(CallId::new(4)));
        assert!(!bad.is_reply());

        let bad = decode_frame(br#"["failed", 7, "NoSuchError", []]"#).unwrap_err();
        assert_eq!(bad.id, Some(CallId::new(7)));
        assert!(bad.is_reply());

        let bad =
            decode_frame(br#"["finished", 2, ["long", "340282366920938463463374607431768211456"]]"#)
                .unwrap_err();
        assert_eq!(bad.id, Some(CallId::new(2)));
        assert!(bad.is_reply());
    }

    #[test]
    fn test_unreadable_frame_has_no_header() {
        let bad = decode_frame(b"{not json").unwrap_err();
        assert_eq!(bad.tag, None);
        assert_eq!(bad.id, None);
        assert!(bad.to_string().contains("unknown call"));
    }
}
