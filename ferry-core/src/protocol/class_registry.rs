//! Classes by reference.
//!
//! A class travels with its name, doc and the references of its bases, so the
//! receiver can rebuild the inheritance chain out of proxies. Because proxies
//! are cached per id, every instance that later arrives against the same class
//! points at the very same class proxy, which is what keeps `isinstance`
//! meaningful across the connection.

use std::sync::Arc;

use tracing::debug;

use super::tables::ReferenceTable;
use super::wire::{ClassDescriptor, Descriptor, Reference, WireValue};
use crate::error::RpcError;
use crate::ids::ReferenceId;
use crate::kind::Kind;
use crate::object::{Class, Object};
use crate::proxy::{ClassShape, ProxyFactory, Shape};
use crate::value::Value;

#[derive(Debug)]
pub struct ClassRegistry {
    table: Arc<ReferenceTable>,
    factory: ProxyFactory,
}

impl ClassRegistry {
    pub fn new(table: Arc<ReferenceTable>, factory: ProxyFactory) -> Self {
        ClassRegistry { table, factory }
    }

    pub fn wrap_class(&self, class: &Arc<Class>) -> WireValue {
        let id = self.table.id_for(&Object::Class(Arc::clone(class)));
        let bases = class.bases().iter().map(|base| self.wrap_class(base)).collect();
        WireValue::Reference(Reference {
            id,
            kind: Kind::Class,
            descriptor: Descriptor::Class(ClassDescriptor {
                name: class.name().to_string(),
                doc: class.doc().map(str::to_string),
                bases,
            }),
        })
    }

    /// The class proxy for `id`, built with its bases on first sight.
    pub fn unwrap_class(
        &self,
        id: ReferenceId,
        descriptor: &ClassDescriptor,
    ) -> Result<Value, RpcError> {
        if let Some(proxy) = self.table.cached_proxy(id) {
            return Ok(Value::Proxy(proxy));
        }

        let bases = descriptor
            .bases
            .iter()
            .map(|base| self.unwrap_base(base))
            .collect::<Result<Vec<_>, _>>()?;

        debug!("Materializing class proxy {} for {}", descriptor.name, id);
        let proxy = self.factory.make(
            id,
            Kind::Class,
            Shape::Class(ClassShape {
                name: descriptor.name.clone(),
                doc: descriptor.doc.clone(),
                bases,
            }),
        );
        Ok(Value::Proxy(self.table.insert_proxy(proxy)))
    }

    fn unwrap_base(&self, base: &WireValue) -> Result<Value, RpcError> {
        match base {
            WireValue::Reference(Reference {
                id,
                kind: Kind::Class,
                descriptor: Descriptor::Class(descriptor),
            }) => self.unwrap_class(*id, descriptor),
            // A base the peer got from us in the first place.
            WireValue::Import(id) => match self.table.object_for(*id)? {
                class @ Object::Class(_) => Ok(Value::Object(class)),
                other => Err(RpcError::protocol(format!(
                    "base {} is a {}, not a class",
                    id,
                    other.kind()
                ))),
            },
            other => Err(RpcError::protocol(format!(
                "class base must be a class reference, got {:?}",
                other
            ))),
        }
    }
}
