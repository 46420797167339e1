use thiserror::Error;

use crate::exception::{Builtin, Exception};
use crate::ids::CallId;
use crate::value::Value;

/// Error taxonomy shared by every side of a connection.
///
/// `Raised` covers both exceptions raised by local code and exceptions
/// rebuilt from a peer's `failed` reply, so a failing remote call surfaces
/// exactly like a failing local one.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RpcError {
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("{0}")]
    Raised(Exception),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("call timed out: {0}")]
    Timeout(CallId),
}

impl RpcError {
    pub fn raise(class: Builtin, message: impl Into<String>) -> Self {
        RpcError::Raised(Exception::with_message(class, message))
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::raise(Builtin::TypeError, message)
    }

    pub fn value_error(message: impl Into<String>) -> Self {
        Self::raise(Builtin::ValueError, message)
    }

    pub fn attribute_error(type_name: &str, attribute: &str) -> Self {
        Self::raise(
            Builtin::AttributeError,
            format!("'{}' object has no attribute '{}'", type_name, attribute),
        )
    }

    pub fn index_error(message: impl Into<String>) -> Self {
        Self::raise(Builtin::IndexError, message)
    }

    pub fn key_error(key: Value) -> Self {
        RpcError::Raised(Exception::builtin(Builtin::KeyError, vec![key]))
    }

    pub fn zero_division(message: impl Into<String>) -> Self {
        Self::raise(Builtin::ZeroDivisionError, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        RpcError::Protocol(message.into())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        RpcError::Transport(message.into())
    }

    pub fn exception(&self) -> Option<&Exception> {
        match self {
            RpcError::Raised(exc) => Some(exc),
            _ => None,
        }
    }

    /// True when this error would be caught by an `except class:` clause.
    pub fn is_a(&self, class: Builtin) -> bool {
        match self {
            RpcError::Raised(exc) => exc.is_a(class),
            other => other.clone().into_exception().is_a(class),
        }
    }

    /// Render the error as the exception carried by a `failed` reply.
    pub fn into_exception(self) -> Exception {
        match self {
            RpcError::Raised(exc) => exc,
            RpcError::ObjectNotFound(name) => {
                Exception::builtin(Builtin::ObjectNotFound, vec![Value::Str(name)])
            }
            RpcError::Protocol(message) => Exception::with_message(Builtin::ProtocolError, message),
            RpcError::Transport(message) => {
                Exception::with_message(Builtin::TransportFailure, message)
            }
            RpcError::Timeout(id) => {
                Exception::with_message(Builtin::TransportFailure, format!("{} timed out", id))
            }
        }
    }

    /// Inverse of [`RpcError::into_exception`] for the taxonomy builtins.
    pub fn from_exception(exc: Exception) -> Self {
        match exc.builtin_class() {
            Some(Builtin::ObjectNotFound) => RpcError::ObjectNotFound(exc.message()),
            Some(Builtin::ProtocolError) => RpcError::Protocol(exc.message()),
            Some(Builtin::TransportFailure) => RpcError::Transport(exc.message()),
            _ => RpcError::Raised(exc),
        }
    }
}

impl From<Exception> for RpcError {
    fn from(exc: Exception) -> Self {
        RpcError::from_exception(exc)
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(err: serde_json::Error) -> Self {
        RpcError::protocol(format!("JSON error: {}", err))
    }
}

impl From<std::io::Error> for RpcError {
    fn from(err: std::io::Error) -> Self {
        RpcError::transport(format!("IO error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convenience_constructors() {
        assert!(RpcError::type_error("bad").is_a(Builtin::TypeError));
        assert!(RpcError::zero_division("division by zero").is_a(Builtin::ArithmeticError));
        assert!(RpcError::key_error(Value::Str("k".into())).is_a(Builtin::LookupError));
        assert!(RpcError::attribute_error("list", "foo").is_a(Builtin::AttributeError));
    }

    #[test]
    fn test_taxonomy_survives_exception_form() {
        let cases = vec![
            RpcError::ObjectNotFound("missing".into()),
            RpcError::Protocol("bad tag".into()),
            RpcError::Transport("closed".into()),
        ];
        for err in cases {
            let back = RpcError::from_exception(err.clone().into_exception());
            assert_eq!(back, err);
        }
    }

    #[test]
    fn test_raised_passthrough() {
        let err = RpcError::zero_division("division by zero");
        let back = RpcError::from_exception(err.clone().into_exception());
        assert_eq!(back, err);
        assert_eq!(err.to_string(), "ZeroDivisionError: division by zero");
    }

    #[test]
    fn test_timeout_is_transport_failure_on_the_wire() {
        let exc = RpcError::Timeout(CallId::new(3)).into_exception();
        assert_eq!(exc.builtin_class(), Some(Builtin::TransportFailure));
    }

    #[test]
    fn test_json_error_is_protocol_error() {
        let err: RpcError = serde_json::from_str::<serde_json::Value>("[").unwrap_err().into();
        assert!(matches!(err, RpcError::Protocol(_)));
    }
}
