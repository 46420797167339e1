use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};

use super::wire::{reference_id_from_json, values_from_json, WireError, WireException, WireValue};
use crate::ids::{CallId, ReferenceId};

/// Protocol messages.
/// Each message is a JSON array whose first element is the message type.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// ["call", id, target, [args], {kwargs}]
    Call {
        id: CallId,
        target: ReferenceId,
        args: Vec<WireValue>,
        kwargs: IndexMap<String, WireValue>,
    },

    /// ["call_method", id, target, name, [args], {kwargs}]
    CallMethod {
        id: CallId,
        target: ReferenceId,
        method: String,
        args: Vec<WireValue>,
        kwargs: IndexMap<String, WireValue>,
    },

    /// ["get_attr", id, target, name]
    GetAttr {
        id: CallId,
        target: ReferenceId,
        name: String,
    },

    /// ["set_attr", id, target, name, value]
    SetAttr {
        id: CallId,
        target: ReferenceId,
        name: String,
        value: WireValue,
    },

    /// ["instantiate", id, class, [args], {kwargs}]
    Instantiate {
        id: CallId,
        class: ReferenceId,
        args: Vec<WireValue>,
        kwargs: IndexMap<String, WireValue>,
    },

    /// ["get_export", id, name]
    GetExport { id: CallId, name: String },

    /// ["get_export_names", id]
    GetExportNames { id: CallId },

    /// ["finished", id, result]
    Finished { id: CallId, result: WireValue },

    /// ["failed", id, class, [args]]
    Failed { id: CallId, error: WireException },
}

impl Message {
    pub fn id(&self) -> CallId {
        match self {
            Message::Call { id, .. }
            | Message::CallMethod { id, .. }
            | Message::GetAttr { id, .. }
            | Message::SetAttr { id, .. }
            | Message::Instantiate { id, .. }
            | Message::GetExport { id, .. }
            | Message::GetExportNames { id }
            | Message::Finished { id, .. }
            | Message::Failed { id, .. } => *id,
        }
    }

    /// Requests expect a `finished` or `failed` reply carrying the same id.
    pub fn is_request(&self) -> bool {
        !matches!(self, Message::Finished { .. } | Message::Failed { .. })
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Message::Call { .. } => "call",
            Message::CallMethod { .. } => "call_method",
            Message::GetAttr { .. } => "get_attr",
            Message::SetAttr { .. } => "set_attr",
            Message::Instantiate { .. } => "instantiate",
            Message::GetExport { .. } => "get_export",
            Message::GetExportNames { .. } => "get_export_names",
            Message::Finished { .. } => "finished",
            Message::Failed { .. } => "failed",
        }
    }

    /// Parse a message from a JSON value
    pub fn from_json(value: &JsonValue) -> Result<Self, MessageError> {
        let arr = value.as_array().ok_or(MessageError::NotAnArray)?;

        if arr.is_empty() {
            return Err(MessageError::EmptyMessage);
        }

        let msg_type = arr[0].as_str().ok_or(MessageError::InvalidMessageType)?;
        let expect_len = |len: usize| {
            if arr.len() == len {
                Ok(())
            } else {
                Err(MessageError::InvalidFormat(msg_type.to_string()))
            }
        };

        match msg_type {
            "call" => {
                expect_len(5)?;
                Ok(Message::Call {
                    id: call_id(&arr[1])?,
                    target: reference_id_from_json(&arr[2])?,
                    args: values_from_json(&arr[3], "args")?,
                    kwargs: kwargs_from_json(&arr[4])?,
                })
            }

            "call_method" => {
                expect_len(6)?;
                Ok(Message::CallMethod {
                    id: call_id(&arr[1])?,
                    target: reference_id_from_json(&arr[2])?,
                    method: name(&arr[3])?,
                    args: values_from_json(&arr[4], "args")?,
                    kwargs: kwargs_from_json(&arr[5])?,
                })
            }

            "get_attr" => {
                expect_len(4)?;
                Ok(Message::GetAttr {
                    id: call_id(&arr[1])?,
                    target: reference_id_from_json(&arr[2])?,
                    name: name(&arr[3])?,
                })
            }

            "set_attr" => {
                expect_len(5)?;
                Ok(Message::SetAttr {
                    id: call_id(&arr[1])?,
                    target: reference_id_from_json(&arr[2])?,
                    name: name(&arr[3])?,
                    value: WireValue::from_json(&arr[4])?,
                })
            }

            "instantiate" => {
                expect_len(5)?;
                Ok(Message::Instantiate {
                    id: call_id(&arr[1])?,
                    class: reference_id_from_json(&arr[2])?,
                    args: values_from_json(&arr[3], "args")?,
                    kwargs: kwargs_from_json(&arr[4])?,
                })
            }

            "get_export" => {
                expect_len(3)?;
                Ok(Message::GetExport {
                    id: call_id(&arr[1])?,
                    name: name(&arr[2])?,
                })
            }

            "get_export_names" => {
                expect_len(2)?;
                Ok(Message::GetExportNames {
                    id: call_id(&arr[1])?,
                })
            }

            "finished" => {
                expect_len(3)?;
                Ok(Message::Finished {
                    id: call_id(&arr[1])?,
                    result: WireValue::from_json(&arr[2])?,
                })
            }

            "failed" => {
                expect_len(4)?;
                Ok(Message::Failed {
                    id: call_id(&arr[1])?,
                    error: WireException::from_parts(&arr[2], &arr[3])?,
                })
            }

            _ => Err(MessageError::UnknownMessageType(msg_type.to_string())),
        }
    }

    /// Convert the message to a JSON value
    pub fn to_json(&self) -> JsonValue {
        match self {
            Message::Call {
                id,
                target,
                args,
                kwargs,
            } => json!([
                "call",
                id.as_u64(),
                target.as_u64(),
                args_to_json(args),
                kwargs_to_json(kwargs)
            ]),
            Message::CallMethod {
                id,
                target,
                method,
                args,
                kwargs,
            } => json!([
                "call_method",
                id.as_u64(),
                target.as_u64(),
                method,
                args_to_json(args),
                kwargs_to_json(kwargs)
            ]),
            Message::GetAttr { id, target, name } => {
                json!(["get_attr", id.as_u64(), target.as_u64(), name])
            }
            Message::SetAttr {
                id,
                target,
                name,
                value,
            } => json!(["set_attr", id.as_u64(), target.as_u64(), name, value.to_json()]),
            Message::Instantiate {
                id,
                class,
                args,
                kwargs,
            } => json!([
                "instantiate",
                id.as_u64(),
                class.as_u64(),
                args_to_json(args),
                kwargs_to_json(kwargs)
            ]),
            Message::GetExport { id, name } => json!(["get_export", id.as_u64(), name]),
            Message::GetExportNames { id } => json!(["get_export_names", id.as_u64()]),
            Message::Finished { id, result } => json!(["finished", id.as_u64(), result.to_json()]),
            Message::Failed { id, error } => {
                let [class, args] = error.to_parts();
                json!(["failed", id.as_u64(), class, args])
            }
        }
    }
}

fn call_id(value: &JsonValue) -> Result<CallId, MessageError> {
    value
        .as_u64()
        .map(CallId::new)
        .ok_or(MessageError::InvalidCallId)
}

fn name(value: &JsonValue) -> Result<String, MessageError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or(MessageError::InvalidName)
}

fn kwargs_from_json(value: &JsonValue) -> Result<IndexMap<String, WireValue>, MessageError> {
    value
        .as_object()
        .ok_or(MessageError::InvalidKwargs)?
        .iter()
        .map(|(key, value)| -> Result<_, MessageError> {
            Ok((key.clone(), WireValue::from_json(value)?))
        })
        .collect()
}

fn args_to_json(args: &[WireValue]) -> JsonValue {
    JsonValue::Array(args.iter().map(WireValue::to_json).collect())
}

fn kwargs_to_json(kwargs: &IndexMap<String, WireValue>) -> JsonValue {
    JsonValue::Object(
        kwargs
            .iter()
            .map(|(key, value)| (key.clone(), value.to_json()))
            .collect::<Map<_, _>>(),
    )
}

/// Custom serialization for Message
impl Serialize for Message {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

/// Custom deserialization for Message
impl<'de> Deserialize<'de> for Message {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = JsonValue::deserialize(deserializer)?;
        Message::from_json(&value).map_err(|e| serde::de::Error::custom(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("Message must be a JSON array")]
    NotAnArray,

    #[error("Message array cannot be empty")]
    EmptyMessage,

    #[error("Message type must be a string")]
    InvalidMessageType,

    #[error("Invalid {0} message format")]
    InvalidFormat(String),

    #[error("Invalid call ID")]
    InvalidCallId,

    #[error("Attribute, method and export names must be strings")]
    InvalidName,

    #[error("Keyword arguments must be a JSON object")]
    InvalidKwargs,

    #[error("Unknown message type: {0}")]
    UnknownMessageType(String),

    #[error("Value error: {0}")]
    Value(#[from] WireError),
}

impl From<MessageError> for crate::error::RpcError {
    fn from(err: MessageError) -> Self {
        crate::error::RpcError::protocol(err.to_string())
    }
}
