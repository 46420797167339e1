// Value model tests: literal round trips through the JSON wire form and the
// structural capabilities of by-reference values.

use ferry_core::{
    decode_message, encode_message, Args, Builtin, CallId, Capability, Class, DictKey, Function,
    Message, Object, ProxyFactory, ReferenceId, Value, ValueCodec, WireValue,
};
use std::sync::Arc;

fn through_json(codec: &ValueCodec, value: &Value) -> Value {
    let msg = Message::Finished {
        id: CallId::new(1),
        result: codec.wrap(value).unwrap(),
    };
    let bytes = encode_message(&msg).unwrap();
    match decode_message(&bytes).unwrap() {
        Message::Finished { result, .. } => codec.unwrap(&result).unwrap(),
        other => panic!("Expected Finished message, got {:?}", other),
    }
}

#[cfg(test)]
mod literal_roundtrip_tests {
    use super::*;
    use proptest::prelude::*;

    fn literal() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::None),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Int),
            any::<i128>().prop_map(Value::Long),
            any::<f64>()
                .prop_filter("NaN never equals itself", |f| !f.is_nan())
                .prop_map(Value::Float),
            ".*".prop_map(Value::Str),
        ];
        leaf.prop_recursive(3, 16, 4, |inner| {
            prop::collection::vec(inner, 0..4).prop_map(Value::Tuple)
        })
    }

    proptest! {
        #[test]
        fn test_literal_roundtrip_keeps_value_and_type(value in literal()) {
            let codec = ValueCodec::new(ProxyFactory::detached());
            let back = through_json(&codec, &value);
            prop_assert_eq!(&back, &value);
            prop_assert_eq!(back.type_name(), value.type_name());
            prop_assert_eq!(std::mem::discriminant(&back), std::mem::discriminant(&value));
        }
    }

    #[test]
    fn test_named_literals() {
        let codec = ValueCodec::new(ProxyFactory::detached());
        for value in [
            Value::from("plain"),
            Value::from("ユニコード ✓"),
            Value::Int(i64::MIN),
            Value::Long(-(1_i128 << 100)),
            Value::Float(f64::INFINITY),
            Value::tuple([Value::Int(1), Value::tuple([Value::from("nested")])]),
        ] {
            assert_eq!(through_json(&codec, &value), value);
        }
    }

    #[test]
    fn test_nan_stays_nan() {
        let codec = ValueCodec::new(ProxyFactory::detached());
        match through_json(&codec, &Value::Float(f64::NAN)) {
            Value::Float(f) => assert!(f.is_nan()),
            other => panic!("Expected float, got {:?}", other),
        }
    }
}

#[cfg(test)]
mod reference_capability_tests {
    use super::*;

    fn peers() -> (ValueCodec, ValueCodec) {
        (
            ValueCodec::new(ProxyFactory::detached()),
            ValueCodec::new(ProxyFactory::detached()),
        )
    }

    #[test]
    fn test_references_expose_capabilities() {
        let (owner, receiver) = peers();
        let class = Class::builder("C").build();
        let cases = vec![
            (Value::Object(Object::list(vec![Value::Int(1)])), Capability::ListLike),
            (
                Value::Object(Object::dict([(DictKey::Str("k".into()), Value::Int(1))])),
                Capability::DictLike,
            ),
            (
                Value::from(Function::sync("f", |_| Ok(Value::None))),
                Capability::Callable,
            ),
            (Value::from(Arc::clone(&class)), Capability::Instantiable),
            (
                Value::Object(Object::Instance(Arc::new(ferry_core::Instance::new(class)))),
                Capability::HasAttributes,
            ),
        ];

        for (value, capability) in cases {
            assert!(value.supports(capability));
            let proxy = through_json_between(&owner, &receiver, &value);
            assert!(proxy.as_proxy().is_some(), "{:?} should arrive as a proxy", value);
            assert!(proxy.supports(capability));
            assert_eq!(proxy.kind(), value.kind());
        }
    }

    fn through_json_between(owner: &ValueCodec, receiver: &ValueCodec, value: &Value) -> Value {
        let json = owner.wrap(value).unwrap().to_json();
        receiver.unwrap(&WireValue::from_json(&json).unwrap()).unwrap()
    }

    #[test]
    fn test_reverse_mapping_for_classes_and_instances() {
        let (owner, receiver) = peers();
        let class = Class::builder("C").build();
        let class_value = Value::from(Arc::clone(&class));

        let first = through_json_between(&owner, &receiver, &class_value);
        let second = through_json_between(&owner, &receiver, &class_value);
        assert!(first.same(&second));

        let instance = Value::Object(Object::Instance(Arc::new(ferry_core::Instance::new(class))));
        let received = through_json_between(&owner, &receiver, &instance);
        assert!(received.isinstance(&first));
    }

    #[test]
    fn test_unknown_import_is_object_not_found() {
        let (owner, _) = peers();
        let err = owner.unwrap(&WireValue::Import(ReferenceId::new(77))).unwrap_err();
        assert!(err.is_a(Builtin::ObjectNotFound));
    }

    #[tokio::test]
    async fn test_local_values_answer_operations() {
        let dict = Value::Object(Object::Dict(Arc::new(ferry_core::Dict::new())));
        dict.call_method("__setitem__", Args::new(vec![Value::from("a"), Value::Int(1)]))
            .await
            .unwrap();
        assert_eq!(dict.get_item("a").await.unwrap(), Value::Int(1));
        assert_eq!(dict.len().await.unwrap(), 1);
    }
}
