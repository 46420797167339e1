//! Classification of values into literals and references.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, warn};
use uuid::Uuid;

use super::class_registry::ClassRegistry;
use super::tables::ReferenceTable;
use super::wire::{Descriptor, Literal, Reference, WireException, WireExceptionClass, WireValue};
use crate::error::RpcError;
use crate::exception::{Builtin, Exception, ExceptionClass};
use crate::kind::Kind;
use crate::object::Object;
use crate::proxy::{ProxyFactory, Shape};
use crate::value::{Args, Value};

/// Converts between values and their wire form for one protocol instance.
#[derive(Debug)]
pub struct ValueCodec {
    table: Arc<ReferenceTable>,
    classes: ClassRegistry,
    factory: ProxyFactory,
}

impl ValueCodec {
    pub fn new(factory: ProxyFactory) -> Self {
        let table = Arc::new(ReferenceTable::new());
        ValueCodec {
            classes: ClassRegistry::new(Arc::clone(&table), factory.clone()),
            table,
            factory,
        }
    }

    pub fn table(&self) -> &ReferenceTable {
        &self.table
    }

    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    pub fn session(&self) -> Uuid {
        self.factory.session()
    }

    pub fn wrap(&self, value: &Value) -> Result<WireValue, RpcError> {
        let wire = match value {
            Value::None => WireValue::Literal(Literal::None),
            Value::Bool(b) => WireValue::Literal(Literal::Bool(*b)),
            Value::Int(i) => WireValue::Literal(Literal::Int(*i)),
            Value::Long(l) => WireValue::Literal(Literal::Long(*l)),
            Value::Float(f) => WireValue::Literal(Literal::Float(*f)),
            Value::Str(s) => WireValue::Literal(Literal::Str(s.clone())),
            Value::Tuple(items) => WireValue::Tuple(
                items
                    .iter()
                    .map(|item| self.wrap(item))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Exception(exc) => WireValue::Exception(self.wrap_exception(exc)?),
            Value::Object(Object::Class(class)) => self.classes.wrap_class(class),
            Value::Object(object @ Object::Instance(instance)) => {
                WireValue::Reference(Reference {
                    id: self.table.id_for(object),
                    kind: Kind::Instance,
                    descriptor: Descriptor::Instance(Box::new(
                        self.classes.wrap_class(instance.class()),
                    )),
                })
            }
            Value::Object(object) => WireValue::Reference(Reference {
                id: self.table.id_for(object),
                kind: object.kind(),
                descriptor: object.name().map_or(Descriptor::None, Descriptor::Named),
            }),
            Value::Proxy(proxy) if proxy.session() == self.session() => WireValue::Import(proxy.id()),
            Value::Proxy(proxy) => {
                return Err(RpcError::type_error(format!(
                    "cannot send a proxy for {} belonging to another connection",
                    proxy.id()
                )))
            }
        };
        Ok(wire)
    }

    pub fn unwrap(&self, wire: &WireValue) -> Result<Value, RpcError> {
        match wire {
            WireValue::Literal(literal) => Ok(match literal {
                Literal::None => Value::None,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Int(i) => Value::Int(*i),
                Literal::Long(l) => Value::Long(*l),
                Literal::Float(f) => Value::Float(*f),
                Literal::Str(s) => Value::Str(s.clone()),
            }),
            WireValue::Tuple(items) => items
                .iter()
                .map(|item| self.unwrap(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Tuple),
            WireValue::Exception(exc) => Ok(Value::from(self.unwrap_exception(exc)?)),
            WireValue::Import(id) => Ok(Value::Object(self.table.object_for(*id)?)),
            WireValue::Reference(reference) => self.unwrap_reference(reference),
        }
    }

    fn unwrap_reference(&self, reference: &Reference) -> Result<Value, RpcError> {
        if let Some(proxy) = self.table.cached_proxy(reference.id) {
            return Ok(Value::Proxy(proxy));
        }

        let shape = match (&reference.descriptor, reference.kind) {
            (Descriptor::Class(descriptor), Kind::Class) => {
                return self.classes.unwrap_class(reference.id, descriptor);
            }
            (Descriptor::Class(_), kind) => {
                return Err(RpcError::protocol(format!(
                    "class descriptor on a {} reference",
                    kind
                )));
            }
            (Descriptor::Instance(class), _) => Shape::Instance {
                class: self.unwrap(class)?,
            },
            (Descriptor::Named(name), _) => Shape::Opaque {
                name: Some(name.clone()),
            },
            (Descriptor::None, _) => Shape::Opaque { name: None },
        };

        debug!("New {} proxy for {}", reference.kind, reference.id);
        let proxy = self.factory.make(reference.id, reference.kind, shape);
        Ok(Value::Proxy(self.table.insert_proxy(proxy)))
    }

    pub fn wrap_exception(&self, exc: &Exception) -> Result<WireException, RpcError> {
        let class = match &exc.class {
            ExceptionClass::Builtin(builtin) => WireExceptionClass::Builtin(*builtin),
            ExceptionClass::Class(class) => WireExceptionClass::Class(Box::new(self.wrap(class)?)),
        };
        let args = exc
            .args
            .iter()
            .map(|arg| self.wrap(arg))
            .collect::<Result<_, _>>()?;
        Ok(WireException { class, args })
    }

    pub fn unwrap_exception(&self, exc: &WireException) -> Result<Exception, RpcError> {
        let class = match &exc.class {
            WireExceptionClass::Builtin(builtin) => ExceptionClass::Builtin(*builtin),
            WireExceptionClass::Class(class) => ExceptionClass::Class(self.unwrap(class)?),
        };
        let args = exc
            .args
            .iter()
            .map(|arg| self.unwrap(arg))
            .collect::<Result<_, _>>()?;
        Ok(Exception::new(class, args))
    }

    /// Encode an error for a `failed` reply. Arguments that cannot be sent
    /// are replaced by their text.
    pub fn wrap_error(&self, err: RpcError) -> WireException {
        let exc = err.into_exception();
        self.wrap_exception(&exc).unwrap_or_else(|codec_err| {
            warn!("Sending {} by text: {}", exc.class_name(), codec_err);
            let class = match &exc.class {
                ExceptionClass::Builtin(builtin) => *builtin,
                ExceptionClass::Class(_) => Builtin::Exception,
            };
            WireException {
                class: WireExceptionClass::Builtin(class),
                args: vec![WireValue::Literal(Literal::Str(exc.to_string()))],
            }
        })
    }

    /// Rebuild the error carried by a `failed` reply.
    pub fn unwrap_error(&self, exc: &WireException) -> RpcError {
        match self.unwrap_exception(exc) {
            Ok(exc) => RpcError::from_exception(exc),
            Err(err) => RpcError::protocol(format!("undecodable failure: {}", err)),
        }
    }

    pub fn wrap_args(
        &self,
        args: &Args,
    ) -> Result<(Vec<WireValue>, IndexMap<String, WireValue>), RpcError> {
        let positional = args
            .positional
            .iter()
            .map(|arg| self.wrap(arg))
            .collect::<Result<_, _>>()?;
        let keywords = args
            .keywords
            .iter()
            .map(|(name, arg)| -> Result<_, RpcError> { Ok((name.clone(), self.wrap(arg)?)) })
            .collect::<Result<_, _>>()?;
        Ok((positional, keywords))
    }

    pub fn unwrap_args(
        &self,
        positional: &[WireValue],
        keywords: &IndexMap<String, WireValue>,
    ) -> Result<Args, RpcError> {
        let positional = positional
            .iter()
            .map(|arg| self.unwrap(arg))
            .collect::<Result<_, _>>()?;
        let keywords = keywords
            .iter()
            .map(|(name, arg)| -> Result<_, RpcError> { Ok((name.clone(), self.unwrap(arg)?)) })
            .collect::<Result<_, _>>()?;
        Ok(Args {
            positional,
            keywords,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::Capability;
    use crate::object::{Class, Function};

    #[test]
    fn test_literals_keep_type() {
        let codec = ValueCodec::new(ProxyFactory::detached());
        for value in [
            Value::Int(3),
            Value::Long(3),
            Value::Float(0.5),
            Value::from("ünïcode"),
            Value::tuple([Value::None, Value::Bool(false)]),
        ] {
            let back = codec.unwrap(&codec.wrap(&value).unwrap()).unwrap();
            assert_eq!(back, value);
            assert_eq!(back.type_name(), value.type_name());
            assert_eq!(std::mem::discriminant(&back), std::mem::discriminant(&value));
        }
    }

    #[test]
    fn test_object_wraps_once_and_comes_home() {
        let codec = ValueCodec::new(ProxyFactory::detached());
        let f = Value::from(Function::sync("f", |_| Ok(Value::None)));

        let first = codec.wrap(&f).unwrap();
        assert_eq!(codec.wrap(&f).unwrap(), first);

        let id = match &first {
            WireValue::Reference(reference) => {
                assert_eq!(reference.descriptor, Descriptor::Named("f".into()));
                reference.id
            }
            other => panic!("Expected reference, got {:?}", other),
        };
        assert!(codec.unwrap(&WireValue::Import(id)).unwrap().same(&f));
    }

    #[test]
    fn test_reference_becomes_cached_proxy() {
        let owner = ValueCodec::new(ProxyFactory::detached());
        let receiver = ValueCodec::new(ProxyFactory::detached());
        let list = Value::Object(Object::list(vec![Value::Int(1)]));

        let wire = owner.wrap(&list).unwrap();
        let first = receiver.unwrap(&wire).unwrap();
        let second = receiver.unwrap(&wire).unwrap();
        assert!(first.same(&second));
        assert!(first.supports(Capability::ListLike));

        // Sending the proxy back names the original object.
        let back = receiver.wrap(&first).unwrap();
        assert!(owner.unwrap(&back).unwrap().same(&list));
    }

    #[test]
    fn test_instance_carries_class() {
        let owner = ValueCodec::new(ProxyFactory::detached());
        let receiver = ValueCodec::new(ProxyFactory::detached());
        let class = Class::builder("C").build();
        let instance = Value::Object(Object::Instance(Arc::new(crate::object::Instance::new(
            Arc::clone(&class),
        ))));

        let class_proxy = receiver.unwrap(&owner.wrap(&Value::from(class)).unwrap()).unwrap();
        let instance_proxy = receiver.unwrap(&owner.wrap(&instance).unwrap()).unwrap();
        assert!(instance_proxy.isinstance(&class_proxy));
    }

    #[test]
    fn test_foreign_proxy_is_rejected() {
        let owner = ValueCodec::new(ProxyFactory::detached());
        let receiver = ValueCodec::new(ProxyFactory::detached());
        let other = ValueCodec::new(ProxyFactory::detached());

        let wire = owner.wrap(&Value::Object(Object::list(vec![]))).unwrap();
        let proxy = receiver.unwrap(&wire).unwrap();
        let err = other.wrap(&proxy).unwrap_err();
        assert!(err.is_a(Builtin::TypeError));
    }

    #[test]
    fn test_error_symmetry() {
        let codec = ValueCodec::new(ProxyFactory::detached());
        let cases = vec![
            RpcError::zero_division("division by zero"),
            RpcError::ObjectNotFound("missing".into()),
            RpcError::key_error(Value::tuple([Value::Int(1), Value::from("a")])),
        ];
        for err in cases {
            let wire = codec.wrap_error(err.clone());
            assert_eq!(codec.unwrap_error(&wire), err);
        }
    }
}
