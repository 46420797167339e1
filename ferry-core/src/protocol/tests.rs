#[cfg(test)]
mod protocol_tests {
    use super::super::*;
    use crate::exception::Builtin;
    use crate::ids::CallId;
    use crate::object::{Class, Function, Object};
    use crate::proxy::ProxyFactory;
    use crate::value::{Args, Value};
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_wrapped_call_serializes() {
        let codec = ValueCodec::new(ProxyFactory::detached());
        let args = Args::new(vec![Value::Int(2), Value::from("x")]).with_keyword("big", Value::Long(1));
        let (positional, kwargs) = codec.wrap_args(&args).unwrap();

        let msg = Message::Call {
            id: CallId::new(1),
            target: crate::ids::ReferenceId::new(4),
            args: positional,
            kwargs,
        };
        assert_eq!(
            msg.to_json(),
            json!(["call", 1, 4, [2, "x"], {"big": ["long", "1"]}])
        );

        let text = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&text).unwrap();
        match back {
            Message::Call { args, kwargs, .. } => {
                let unwrapped = codec.unwrap_args(&args, &kwargs).unwrap();
                assert_eq!(unwrapped, Args::new(vec![Value::Int(2), Value::from("x")]).with_keyword("big", Value::Long(1)));
            }
            other => panic!("Expected Call message, got {:?}", other),
        }
    }

    #[test]
    fn test_function_reference_json() {
        let codec = ValueCodec::new(ProxyFactory::detached());
        let f = Value::from(Function::sync("add", |_| Ok(Value::None)));
        let wire = codec.wrap(&f).unwrap();
        assert_eq!(wire.to_json(), json!(["ref", 1, "function", ["named", "add"]]));
    }

    #[test]
    fn test_instance_reference_json() {
        let codec = ValueCodec::new(ProxyFactory::detached());
        let class = Class::builder("Point").doc("a point").build();
        let instance = Value::Object(Object::Instance(Arc::new(crate::object::Instance::new(
            Arc::clone(&class),
        ))));

        let wire = codec.wrap(&instance).unwrap();
        assert_eq!(
            wire.to_json(),
            json!(["ref", 1, "instance", ["instance", ["ref", 2, "class", ["class", "Point", "a point", []]]]])
        );
    }

    #[test]
    fn test_user_exception_class_travels_by_reference() {
        let owner = ValueCodec::new(ProxyFactory::detached());
        let receiver = ValueCodec::new(ProxyFactory::detached());
        let class = Class::builder("AppError").build();
        let err = crate::error::RpcError::Raised(crate::exception::Exception::of_class(
            Value::from(Arc::clone(&class)),
            vec![Value::from("boom")],
        ));

        let failed = Message::Failed {
            id: CallId::new(8),
            error: owner.wrap_error(err),
        };
        let parsed = Message::from_json(&failed.to_json()).unwrap();
        let rebuilt = match parsed {
            Message::Failed { error, .. } => receiver.unwrap_error(&error),
            other => panic!("Expected Failed message, got {:?}", other),
        };

        let exc = rebuilt.exception().unwrap();
        assert_eq!(exc.class_name(), "AppError");
        assert_eq!(exc.message(), "boom");
        assert!(rebuilt.is_a(Builtin::Exception));
        assert!(!rebuilt.is_a(Builtin::TypeError));
    }

    #[test]
    fn test_exception_value_roundtrip() {
        let codec = ValueCodec::new(ProxyFactory::detached());
        let exc = Value::from(crate::exception::Exception::with_message(
            Builtin::ValueError,
            "bad value",
        ));
        let wire = codec.wrap(&exc).unwrap();
        assert_eq!(wire.to_json(), json!(["exception", "ValueError", ["bad value"]]));
        assert_eq!(codec.unwrap(&wire).unwrap(), exc);
    }
}
