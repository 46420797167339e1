use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info};

use crate::error::RpcError;
use crate::ids::{ReferenceId, ReferenceIdAllocator};
use crate::kind::Kind;
use crate::object::Object;
use crate::proxy::Proxy;
use crate::value::Value;

/// Objects this side has exported by reference, and proxies it has built for
/// references received from the peer.
///
/// Exported objects are held strongly for the table's lifetime, so an
/// allocation address is never reused while its id is live.
#[derive(Debug, Default)]
pub struct ReferenceTable {
    allocator: ReferenceIdAllocator,
    objects: DashMap<ReferenceId, Object>,
    /// Reverse map from object identity to its id
    ids: DashMap<(usize, Kind), ReferenceId>,
    proxies: DashMap<ReferenceId, Proxy>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableStats {
    pub exported: usize,
    pub proxies: usize,
}

impl ReferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The id under which `object` is known to the peer, assigned on first use.
    pub fn id_for(&self, object: &Object) -> ReferenceId {
        match self.ids.entry(object.identity()) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                let id = self.allocator.allocate();
                self.objects.insert(id, object.clone());
                entry.insert(id);
                debug!("Exported {} as {}", object.kind(), id);
                id
            }
        }
    }

    pub fn object_for(&self, id: ReferenceId) -> Result<Object, TableError> {
        self.objects
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(TableError::UnknownReference(id))
    }

    pub fn contains(&self, id: ReferenceId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn cached_proxy(&self, id: ReferenceId) -> Option<Proxy> {
        self.proxies.get(&id).map(|entry| entry.value().clone())
    }

    /// Cache `proxy` unless another task cached one for the same id first;
    /// either way the cached proxy is returned.
    pub fn insert_proxy(&self, proxy: Proxy) -> Proxy {
        self.proxies
            .entry(proxy.id())
            .or_insert(proxy)
            .value()
            .clone()
    }

    pub fn stats(&self) -> TableStats {
        TableStats {
            exported: self.objects.len(),
            proxies: self.proxies.len(),
        }
    }
}

/// Root namespace a peer can reach by name.
#[derive(Debug, Default)]
pub struct ExportTable {
    entries: DashMap<String, Value>,
}

impl ExportTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Export `value` under `name`, returning the value it replaces.
    pub fn insert(&self, name: impl Into<String>, value: Value) -> Option<Value> {
        let name = name.into();
        info!("Exporting {} ({})", name, value.type_name());
        self.entries.insert(name, value)
    }

    pub fn get(&self, name: &str) -> Result<Value, TableError> {
        self.entries
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| TableError::UnknownExport(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Exported names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("unknown reference {0}")]
    UnknownReference(ReferenceId),

    #[error("{0}")]
    UnknownExport(String),
}

impl From<TableError> for RpcError {
    fn from(err: TableError) -> Self {
        RpcError::ObjectNotFound(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Function;
    use crate::proxy::{ProxyFactory, Shape};

    #[test]
    fn test_id_for_is_stable() {
        let table = ReferenceTable::new();
        let f = Object::function(Function::sync("f", |_| Ok(Value::None)));
        let g = Object::function(Function::sync("g", |_| Ok(Value::None)));

        let first = table.id_for(&f);
        assert_eq!(table.id_for(&f.clone()), first);
        assert_ne!(table.id_for(&g), first);
        assert!(table.object_for(first).unwrap().same(&f));
        assert_eq!(table.stats(), TableStats { exported: 2, proxies: 0 });
    }

    #[test]
    fn test_unknown_reference() {
        let table = ReferenceTable::new();
        let err: RpcError = table.object_for(ReferenceId::new(99)).unwrap_err().into();
        assert!(matches!(err, RpcError::ObjectNotFound(_)));
    }

    #[test]
    fn test_proxy_cache_keeps_first() {
        let table = ReferenceTable::new();
        let factory = ProxyFactory::detached();
        let id = ReferenceId::new(3);
        let first = table.insert_proxy(factory.make(id, Kind::List, Shape::Opaque { name: None }));
        let second = table.insert_proxy(factory.make(id, Kind::List, Shape::Opaque { name: None }));
        assert!(first.same(&second));
        assert!(table.cached_proxy(id).unwrap().same(&first));
    }

    #[test]
    fn test_export_table() {
        let exports = ExportTable::new();
        assert!(exports.insert("b", Value::Int(2)).is_none());
        exports.insert("a", Value::Int(1));
        assert_eq!(exports.names(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(exports.get("a").unwrap(), Value::Int(1));

        let err: RpcError = exports.get("missing").unwrap_err().into();
        assert_eq!(err, RpcError::ObjectNotFound("missing".into()));
    }
}
