//! Stand-ins for objects owned by a peer.
//!
//! A proxy supports a fixed operation vocabulary. Each operation is handed to
//! the proxy's [`Invoker`], which renders it as exactly one request to the
//! owner; nothing is resolved by reflection on this side.

use std::fmt;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::RpcError;
use crate::ids::ReferenceId;
use crate::kind::{Capability, Kind};
use crate::value::{Args, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    GetAttr(String),
    SetAttr(String, Value),
    Call(Args),
    CallMethod(String, Args),
    Len,
    GetItem(Value),
    Iterate,
    GetClass,
    Instantiate(Args),
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::GetAttr(_) => "get_attr",
            Operation::SetAttr(..) => "set_attr",
            Operation::Call(_) => "call",
            Operation::CallMethod(..) => "call_method",
            Operation::Len => "len",
            Operation::GetItem(_) => "get_item",
            Operation::Iterate => "iterate",
            Operation::GetClass => "get_class",
            Operation::Instantiate(_) => "instantiate",
        }
    }
}

/// Forwards a proxy operation to the owner of `target`.
#[async_trait]
pub trait Invoker: Send + Sync {
    async fn invoke(&self, target: ReferenceId, op: Operation) -> Result<Value, RpcError>;
}

#[derive(Debug, Clone)]
pub struct ClassShape {
    pub name: String,
    pub doc: Option<String>,
    pub bases: Vec<Value>,
}

/// What the receiving side knows about a reference without asking its owner.
#[derive(Debug, Clone)]
pub enum Shape {
    Opaque { name: Option<String> },
    Class(ClassShape),
    /// Instances carry their class so `isinstance` resolves locally.
    Instance { class: Value },
}

struct ProxyInner {
    id: ReferenceId,
    kind: Kind,
    session: Uuid,
    shape: Shape,
    invoker: Option<Weak<dyn Invoker>>,
}

#[derive(Clone)]
pub struct Proxy {
    inner: Arc<ProxyInner>,
}

impl Proxy {
    pub fn id(&self) -> ReferenceId {
        self.inner.id
    }

    pub fn kind(&self) -> Kind {
        self.inner.kind
    }

    /// The protocol instance that created this proxy.
    pub fn session(&self) -> Uuid {
        self.inner.session
    }

    pub fn shape(&self) -> &Shape {
        &self.inner.shape
    }

    pub fn name(&self) -> Option<&str> {
        match &self.inner.shape {
            Shape::Opaque { name } => name.as_deref(),
            Shape::Class(class) => Some(&class.name),
            Shape::Instance { .. } => None,
        }
    }

    pub fn doc(&self) -> Option<&str> {
        match &self.inner.shape {
            Shape::Class(class) => class.doc.as_deref(),
            _ => None,
        }
    }

    pub fn bases(&self) -> &[Value] {
        match &self.inner.shape {
            Shape::Class(class) => &class.bases,
            _ => &[],
        }
    }

    pub fn class(&self) -> Option<&Value> {
        match &self.inner.shape {
            Shape::Instance { class } => Some(class),
            _ => None,
        }
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.inner.kind.supports(capability)
    }

    pub fn same(&self, other: &Proxy) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub async fn perform(&self, op: Operation) -> Result<Value, RpcError> {
        if let (Operation::GetClass, Shape::Instance { class }) = (&op, &self.inner.shape) {
            return Ok(class.clone());
        }
        let invoker = self
            .inner
            .invoker
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or_else(|| RpcError::transport("no transport attached to proxy"))?;
        invoker.invoke(self.inner.id, op).await
    }

    pub async fn get_attr(&self, name: &str) -> Result<Value, RpcError> {
        self.perform(Operation::GetAttr(name.to_string())).await
    }

    pub async fn set_attr(&self, name: &str, value: Value) -> Result<(), RpcError> {
        self.perform(Operation::SetAttr(name.to_string(), value))
            .await
            .map(|_| ())
    }

    pub async fn call(&self, args: impl Into<Args>) -> Result<Value, RpcError> {
        self.perform(Operation::Call(args.into())).await
    }

    pub async fn call_method(&self, name: &str, args: impl Into<Args>) -> Result<Value, RpcError> {
        self.perform(Operation::CallMethod(name.to_string(), args.into()))
            .await
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("session", &self.inner.session)
            .field("shape", &self.inner.shape)
            .finish()
    }
}

/// Builds proxies bound to one protocol instance.
#[derive(Clone)]
pub struct ProxyFactory {
    session: Uuid,
    invoker: Option<Weak<dyn Invoker>>,
}

impl ProxyFactory {
    pub fn new(invoker: Weak<dyn Invoker>) -> Self {
        ProxyFactory {
            session: Uuid::new_v4(),
            invoker: Some(invoker),
        }
    }

    /// Proxies from a detached factory fail every forwarded operation.
    pub fn detached() -> Self {
        ProxyFactory {
            session: Uuid::new_v4(),
            invoker: None,
        }
    }

    pub fn session(&self) -> Uuid {
        self.session
    }

    pub fn make(&self, id: ReferenceId, kind: Kind, shape: Shape) -> Proxy {
        Proxy {
            inner: Arc::new(ProxyInner {
                id,
                kind,
                session: self.session,
                shape,
                invoker: self.invoker.clone(),
            }),
        }
    }
}

impl fmt::Debug for ProxyFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyFactory")
            .field("session", &self.session)
            .field("attached", &self.invoker.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(ReferenceId, &'static str)>>,
    }

    #[async_trait]
    impl Invoker for Recorder {
        async fn invoke(&self, target: ReferenceId, op: Operation) -> Result<Value, RpcError> {
            self.seen.lock().unwrap().push((target, op.name()));
            Ok(Value::Int(7))
        }
    }

    #[tokio::test]
    async fn test_operations_forward_to_invoker() {
        let recorder = Arc::new(Recorder::default());
        let weak: Weak<dyn Invoker> = Arc::downgrade(&recorder) as Weak<dyn Invoker>;
        let factory = ProxyFactory::new(weak);
        let proxy = factory.make(
            ReferenceId::new(4),
            Kind::Function,
            Shape::Opaque {
                name: Some("f".into()),
            },
        );

        assert_eq!(proxy.call(vec![Value::Int(1)]).await.unwrap(), Value::Int(7));
        assert_eq!(proxy.get_attr("__doc__").await.unwrap(), Value::Int(7));
        assert_eq!(
            *recorder.seen.lock().unwrap(),
            vec![(ReferenceId::new(4), "call"), (ReferenceId::new(4), "get_attr")]
        );
        assert_eq!(proxy.name(), Some("f"));
        assert!(proxy.supports(Capability::Callable));
    }

    #[tokio::test]
    async fn test_instance_class_is_local() {
        let factory = ProxyFactory::detached();
        let class = Value::Proxy(factory.make(
            ReferenceId::new(1),
            Kind::Class,
            Shape::Class(ClassShape {
                name: "A".into(),
                doc: None,
                bases: vec![],
            }),
        ));
        let instance = factory.make(
            ReferenceId::new(2),
            Kind::Instance,
            Shape::Instance {
                class: class.clone(),
            },
        );
        assert_eq!(instance.perform(Operation::GetClass).await.unwrap(), class);
    }

    #[tokio::test]
    async fn test_detached_proxy_fails() {
        let proxy = ProxyFactory::detached().make(
            ReferenceId::new(1),
            Kind::List,
            Shape::Opaque { name: None },
        );
        let err = proxy.perform(Operation::Len).await.unwrap_err();
        assert!(matches!(err, RpcError::Transport(_)));
    }

    #[test]
    fn test_identity_is_per_allocation() {
        let factory = ProxyFactory::detached();
        let a = factory.make(ReferenceId::new(1), Kind::Dict, Shape::Opaque { name: None });
        let b = factory.make(ReferenceId::new(1), Kind::Dict, Shape::Opaque { name: None });
        assert!(a.same(&a.clone()));
        assert!(!a.same(&b));
        assert_eq!(a.session(), b.session());
    }
}
