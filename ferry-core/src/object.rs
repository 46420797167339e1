//! Host objects: the things a side exports by reference.
//!
//! Every object is a shared handle; its identity is the address of the
//! allocation, which is what the reference table keys on.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt};
use indexmap::IndexMap;

use crate::error::RpcError;
use crate::kind::Kind;
use crate::proxy::Operation;
use crate::value::{normalize_index, Args, DictKey, Value};

pub type NativeFn =
    Arc<dyn Fn(Args) -> BoxFuture<'static, Result<Value, RpcError>> + Send + Sync>;

/// A callable implemented natively. The body may await proxies, which is
/// how callbacks into the peer happen.
pub struct Function {
    name: String,
    doc: Option<String>,
    body: NativeFn,
}

impl Function {
    pub fn new<F, Fut>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, RpcError>> + Send + 'static,
    {
        Function {
            name: name.into(),
            doc: None,
            body: Arc::new(move |args| body(args).boxed()),
        }
    }

    /// A function whose body never suspends.
    pub fn sync<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(Args) -> Result<Value, RpcError> + Send + Sync + 'static,
    {
        Self::new(name, move |args| std::future::ready(body(args)))
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn invoke(&self, args: Args) -> BoxFuture<'static, Result<Value, RpcError>> {
        (self.body)(args)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function").field("name", &self.name).finish()
    }
}

#[derive(Debug)]
pub struct BoundMethod {
    pub receiver: Value,
    pub function: Arc<Function>,
}

/// A user class. Attribute lookup searches the class, then its bases depth
/// first.
#[derive(Debug)]
pub struct Class {
    name: String,
    doc: Option<String>,
    bases: Vec<Arc<Class>>,
    namespace: DashMap<String, Value>,
}

pub struct ClassBuilder {
    name: String,
    doc: Option<String>,
    bases: Vec<Arc<Class>>,
    namespace: Vec<(String, Value)>,
}

impl ClassBuilder {
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn base(mut self, base: &Arc<Class>) -> Self {
        self.bases.push(Arc::clone(base));
        self
    }

    pub fn method(mut self, name: impl Into<String>, function: Function) -> Self {
        self.namespace
            .push((name.into(), Value::Object(Object::Function(Arc::new(function)))));
        self
    }

    /// A method whose implicit first argument is the class itself.
    pub fn class_method(mut self, name: impl Into<String>, function: Function) -> Self {
        self.namespace
            .push((name.into(), Value::Object(Object::ClassMethod(Arc::new(function)))));
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.namespace.push((name.into(), value.into()));
        self
    }

    pub fn build(self) -> Arc<Class> {
        Arc::new(Class {
            name: self.name,
            doc: self.doc,
            bases: self.bases,
            namespace: self.namespace.into_iter().collect(),
        })
    }
}

impl Class {
    pub fn builder(name: impl Into<String>) -> ClassBuilder {
        ClassBuilder {
            name: name.into(),
            doc: None,
            bases: Vec::new(),
            namespace: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    pub fn bases(&self) -> &[Arc<Class>] {
        &self.bases
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.namespace.get(name) {
            return Some(value.clone());
        }
        self.bases.iter().find_map(|base| base.lookup(name))
    }

    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.namespace.insert(name.into(), value);
    }

    pub fn is_subclass_of(self: &Arc<Self>, other: &Arc<Class>) -> bool {
        Arc::ptr_eq(self, other) || self.bases.iter().any(|base| base.is_subclass_of(other))
    }

    pub fn attribute_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.namespace.iter().map(|e| e.key().clone()).collect();
        for base in &self.bases {
            for name in base.attribute_names() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }
}

#[derive(Debug)]
pub struct Instance {
    class: Arc<Class>,
    attrs: DashMap<String, Value>,
}

impl Instance {
    pub fn new(class: Arc<Class>) -> Self {
        Instance {
            class,
            attrs: DashMap::new(),
        }
    }

    pub fn class(&self) -> &Arc<Class> {
        &self.class
    }
}

#[derive(Debug)]
pub struct Module {
    name: String,
    attrs: DashMap<String, Value>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            attrs: DashMap::new(),
        }
    }

    pub fn with_attr(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Insertion-ordered mapping with hashable literal keys.
#[derive(Debug, Default)]
pub struct Dict {
    entries: RwLock<IndexMap<DictKey, Value>>,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (DictKey, Value)>) -> Self {
        Dict {
            entries: RwLock::new(entries.into_iter().collect()),
        }
    }

    pub fn insert(&self, key: &Value, value: Value) -> Result<(), RpcError> {
        let key = DictKey::try_from(key)?;
        write(&self.entries).insert(key, value);
        Ok(())
    }

    pub fn get(&self, key: &Value) -> Result<Option<Value>, RpcError> {
        let key = DictKey::try_from(key)?;
        Ok(read(&self.entries).get(&key).cloned())
    }

    pub fn contains(&self, key: &Value) -> Result<bool, RpcError> {
        let key = DictKey::try_from(key)?;
        Ok(read(&self.entries).contains_key(&key))
    }

    pub fn len(&self) -> usize {
        read(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<Value> {
        read(&self.entries).keys().cloned().map(Value::from).collect()
    }

    pub fn values(&self) -> Vec<Value> {
        read(&self.entries).values().cloned().collect()
    }

    pub fn items(&self) -> Vec<(Value, Value)> {
        read(&self.entries)
            .iter()
            .map(|(k, v)| (Value::from(k.clone()), v.clone()))
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct List {
    items: RwLock<Vec<Value>>,
}

impl List {
    pub fn new(items: Vec<Value>) -> Self {
        List {
            items: RwLock::new(items),
        }
    }

    pub fn push(&self, value: Value) {
        write(&self.items).push(value);
    }

    pub fn pop(&self) -> Option<Value> {
        write(&self.items).pop()
    }

    pub fn get(&self, index: i64) -> Option<Value> {
        let items = read(&self.items);
        normalize_index(index, items.len()).map(|i| items[i].clone())
    }

    pub fn set(&self, index: i64, value: Value) -> Result<(), RpcError> {
        let mut items = write(&self.items);
        let slot = normalize_index(index, items.len())
            .ok_or_else(|| RpcError::index_error("list assignment index out of range"))?;
        items[slot] = value;
        Ok(())
    }

    pub fn contains(&self, value: &Value) -> bool {
        read(&self.items).contains(value)
    }

    pub fn len(&self) -> usize {
        read(&self.items).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<Value> {
        read(&self.items).clone()
    }
}

/// A host handle with no structure beyond an attribute namespace, such as an
/// execution frame.
#[derive(Debug)]
pub struct Opaque {
    type_name: String,
    kind: Kind,
    attrs: DashMap<String, Value>,
}

impl Opaque {
    /// Only `Kind::Frame` and `Kind::Other` describe opaque handles; any
    /// other kind is recorded as `Other`.
    pub fn new(type_name: impl Into<String>, kind: Kind) -> Self {
        let kind = match kind {
            Kind::Frame => Kind::Frame,
            _ => Kind::Other,
        };
        Opaque {
            type_name: type_name.into(),
            kind,
            attrs: DashMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Object {
    Function(Arc<Function>),
    BoundMethod(Arc<BoundMethod>),
    ClassMethod(Arc<Function>),
    Class(Arc<Class>),
    Instance(Arc<Instance>),
    Module(Arc<Module>),
    Dict(Arc<Dict>),
    List(Arc<List>),
    Opaque(Arc<Opaque>),
}

impl Object {
    pub fn function(function: Function) -> Self {
        Object::Function(Arc::new(function))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Object::List(Arc::new(List::new(items)))
    }

    pub fn dict(entries: impl IntoIterator<Item = (DictKey, Value)>) -> Self {
        Object::Dict(Arc::new(Dict::from_entries(entries)))
    }

    pub fn module(module: Module) -> Self {
        Object::Module(Arc::new(module))
    }

    pub fn opaque(type_name: impl Into<String>, kind: Kind) -> Self {
        Object::Opaque(Arc::new(Opaque::new(type_name, kind)))
    }

    pub fn kind(&self) -> Kind {
        match self {
            Object::Function(_) => Kind::Function,
            Object::BoundMethod(_) => Kind::BoundMethod,
            Object::ClassMethod(_) => Kind::ClassMethod,
            Object::Class(_) => Kind::Class,
            Object::Instance(_) => Kind::Instance,
            Object::Module(_) => Kind::Module,
            Object::Dict(_) => Kind::Dict,
            Object::List(_) => Kind::List,
            Object::Opaque(o) => o.kind,
        }
    }

    /// Address of the shared allocation.
    pub fn addr(&self) -> usize {
        match self {
            Object::Function(f) | Object::ClassMethod(f) => Arc::as_ptr(f) as *const () as usize,
            Object::BoundMethod(m) => Arc::as_ptr(m) as *const () as usize,
            Object::Class(c) => Arc::as_ptr(c) as *const () as usize,
            Object::Instance(i) => Arc::as_ptr(i) as *const () as usize,
            Object::Module(m) => Arc::as_ptr(m) as *const () as usize,
            Object::Dict(d) => Arc::as_ptr(d) as *const () as usize,
            Object::List(l) => Arc::as_ptr(l) as *const () as usize,
            Object::Opaque(o) => Arc::as_ptr(o) as *const () as usize,
        }
    }

    /// Identity key: a function and a classmethod may share an allocation.
    pub fn identity(&self) -> (usize, Kind) {
        (self.addr(), self.kind())
    }

    pub fn same(&self, other: &Object) -> bool {
        self.identity() == other.identity()
    }

    pub fn type_name(&self) -> String {
        match self {
            Object::Function(_) => "function".to_string(),
            Object::BoundMethod(_) => "method".to_string(),
            Object::ClassMethod(_) => "classmethod".to_string(),
            Object::Class(_) => "type".to_string(),
            Object::Instance(i) => i.class.name.clone(),
            Object::Module(_) => "module".to_string(),
            Object::Dict(_) => "dict".to_string(),
            Object::List(_) => "list".to_string(),
            Object::Opaque(o) => o.type_name.clone(),
        }
    }

    pub fn name(&self) -> Option<String> {
        match self {
            Object::Function(f) | Object::ClassMethod(f) => Some(f.name.clone()),
            Object::BoundMethod(m) => Some(m.function.name.clone()),
            Object::Class(c) => Some(c.name.clone()),
            Object::Module(m) => Some(m.name.clone()),
            _ => None,
        }
    }

    pub fn doc(&self) -> Option<String> {
        match self {
            Object::Function(f) | Object::ClassMethod(f) => f.doc.clone(),
            Object::Class(c) => c.doc.clone(),
            _ => None,
        }
    }

    pub fn class_of(&self) -> Option<Value> {
        match self {
            Object::Instance(i) => Some(Value::Object(Object::Class(Arc::clone(&i.class)))),
            _ => None,
        }
    }

    pub fn bases(&self) -> Vec<Value> {
        match self {
            Object::Class(c) => c
                .bases
                .iter()
                .map(|base| Value::Object(Object::Class(Arc::clone(base))))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn repr(&self) -> String {
        match self {
            Object::Function(f) => format!("<function {}>", f.name),
            Object::BoundMethod(m) => {
                format!("<bound method {} of {}>", m.function.name, m.receiver.repr())
            }
            Object::ClassMethod(f) => format!("<classmethod {}>", f.name),
            Object::Class(c) => format!("<class '{}'>", c.name),
            Object::Instance(i) => format!("<{} object>", i.class.name),
            Object::Module(m) => format!("<module '{}'>", m.name),
            Object::Dict(d) => format!(
                "{{{}}}",
                d.items()
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.repr(), v.repr()))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Object::List(l) => format!(
                "[{}]",
                l.snapshot().iter().map(Value::repr).collect::<Vec<_>>().join(", ")
            ),
            Object::Opaque(o) => format!("<{} object>", o.type_name),
        }
    }

    /// Attribute names visible on this object.
    pub fn attributes(&self) -> Vec<String> {
        let keys = |attrs: &DashMap<String, Value>| -> Vec<String> {
            attrs.iter().map(|e| e.key().clone()).collect()
        };
        match self {
            Object::Function(_) | Object::ClassMethod(_) => {
                vec!["__name__".to_string(), "__doc__".to_string()]
            }
            Object::BoundMethod(_) => {
                vec!["__name__".to_string(), "__self__".to_string(), "__func__".to_string()]
            }
            Object::Class(c) => c.attribute_names(),
            Object::Instance(i) => {
                let mut names = keys(&i.attrs);
                for name in i.class.attribute_names() {
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
                names
            }
            Object::Module(m) => keys(&m.attrs),
            Object::Dict(_) => DICT_METHODS.iter().map(|s| s.to_string()).collect(),
            Object::List(_) => LIST_METHODS.iter().map(|s| s.to_string()).collect(),
            Object::Opaque(o) => keys(&o.attrs),
        }
    }

    pub fn get_attr(&self, name: &str) -> Result<Value, RpcError> {
        let missing = || RpcError::attribute_error(&self.type_name(), name);
        match self {
            Object::Function(f) | Object::ClassMethod(f) => match name {
                "__name__" => Ok(Value::Str(f.name.clone())),
                "__doc__" => Ok(f.doc.clone().map_or(Value::None, Value::Str)),
                _ => Err(missing()),
            },
            Object::BoundMethod(m) => match name {
                "__name__" => Ok(Value::Str(m.function.name.clone())),
                "__self__" => Ok(m.receiver.clone()),
                "__func__" => Ok(Value::Object(Object::Function(Arc::clone(&m.function)))),
                _ => Err(missing()),
            },
            Object::Class(c) => match name {
                "__name__" => Ok(Value::Str(c.name.clone())),
                "__doc__" => Ok(c.doc.clone().map_or(Value::None, Value::Str)),
                "__bases__" => Ok(Value::Tuple(self.bases())),
                _ => {
                    let found = c
                        .lookup(name)
                        .ok_or_else(|| RpcError::attribute_error(&c.name, name))?;
                    Ok(bind_to_class(found, c))
                }
            },
            Object::Instance(i) => {
                if name == "__class__" {
                    return Ok(Value::Object(Object::Class(Arc::clone(&i.class))));
                }
                if let Some(value) = i.attrs.get(name) {
                    return Ok(value.clone());
                }
                let found = i.class.lookup(name).ok_or_else(missing)?;
                Ok(bind_to_instance(found, self, &i.class))
            }
            Object::Module(m) => match name {
                "__name__" => Ok(Value::Str(m.name.clone())),
                _ => m.attrs.get(name).map(|v| v.clone()).ok_or_else(missing),
            },
            Object::Dict(d) => dict_method(d, name)
                .map(|f| Value::Object(Object::function(f)))
                .ok_or_else(missing),
            Object::List(l) => list_method(l, name)
                .map(|f| Value::Object(Object::function(f)))
                .ok_or_else(missing),
            Object::Opaque(o) => o.attrs.get(name).map(|v| v.clone()).ok_or_else(missing),
        }
    }

    pub fn set_attr(&self, name: &str, value: Value) -> Result<(), RpcError> {
        match self {
            Object::Instance(i) => {
                i.attrs.insert(name.to_string(), value);
            }
            Object::Class(c) => c.set(name, value),
            Object::Module(m) => {
                m.attrs.insert(name.to_string(), value);
            }
            Object::Opaque(o) => {
                o.attrs.insert(name.to_string(), value);
            }
            _ => {
                return Err(RpcError::attribute_error(&self.type_name(), name));
            }
        }
        Ok(())
    }

    /// Execute one operation against this object in place.
    pub fn perform(&self, op: Operation) -> BoxFuture<'static, Result<Value, RpcError>> {
        let this = self.clone();
        async move {
            match op {
                Operation::GetAttr(name) => this.get_attr(&name),
                Operation::SetAttr(name, value) => this.set_attr(&name, value).map(|_| Value::None),
                Operation::Call(args) => this.call(args).await,
                Operation::CallMethod(name, args) => {
                    let method = this.get_attr(&name)?;
                    method.call(args).await
                }
                Operation::Len => this.call_method("__len__", Args::empty()).await,
                Operation::GetItem(key) => {
                    this.call_method("__getitem__", Args::new(vec![key])).await
                }
                Operation::Iterate => this.call_method("__iter__", Args::empty()).await,
                Operation::GetClass => this.class_of().ok_or_else(|| {
                    RpcError::type_error(format!("'{}' object has no user class", this.type_name()))
                }),
                Operation::Instantiate(args) => match &this {
                    Object::Class(class) => instantiate(Arc::clone(class), args).await,
                    other => Err(RpcError::type_error(format!(
                        "cannot instantiate '{}' object",
                        other.type_name()
                    ))),
                },
            }
        }
        .boxed()
    }

    fn call_method(&self, name: &str, args: Args) -> BoxFuture<'static, Result<Value, RpcError>> {
        self.perform(Operation::CallMethod(name.to_string(), args))
    }

    pub fn call(&self, args: Args) -> BoxFuture<'static, Result<Value, RpcError>> {
        match self {
            Object::Function(f) => f.invoke(args),
            Object::BoundMethod(m) => m.function.invoke(args.prepend(m.receiver.clone())),
            Object::Class(class) => instantiate(Arc::clone(class), args),
            Object::Instance(_) => {
                let this = self.clone();
                async move {
                    let call = this.get_attr("__call__").map_err(|_| {
                        RpcError::type_error(format!("'{}' object is not callable", this.type_name()))
                    })?;
                    call.call(args).await
                }
                .boxed()
            }
            other => {
                let err = RpcError::type_error(format!(
                    "'{}' object is not callable",
                    other.type_name()
                ));
                async move { Err(err) }.boxed()
            }
        }
    }
}

fn instantiate(class: Arc<Class>, args: Args) -> BoxFuture<'static, Result<Value, RpcError>> {
    async move {
        let instance = Object::Instance(Arc::new(Instance::new(Arc::clone(&class))));
        match class.lookup("__init__") {
            Some(init) => {
                bind_to_instance(init, &instance, &class).call(args).await?;
            }
            None if !args.is_empty() => {
                return Err(RpcError::type_error(format!("{}() takes no arguments", class.name)));
            }
            None => {}
        }
        Ok(Value::Object(instance))
    }
    .boxed()
}

fn bind_to_instance(found: Value, instance: &Object, class: &Arc<Class>) -> Value {
    match found {
        Value::Object(Object::Function(function)) => bound(Value::Object(instance.clone()), function),
        Value::Object(Object::ClassMethod(function)) => {
            bound(Value::Object(Object::Class(Arc::clone(class))), function)
        }
        other => other,
    }
}

fn bind_to_class(found: Value, class: &Arc<Class>) -> Value {
    match found {
        Value::Object(Object::ClassMethod(function)) => {
            bound(Value::Object(Object::Class(Arc::clone(class))), function)
        }
        other => other,
    }
}

fn bound(receiver: Value, function: Arc<Function>) -> Value {
    Value::Object(Object::BoundMethod(Arc::new(BoundMethod { receiver, function })))
}

const LIST_METHODS: [&str; 7] = [
    "__len__",
    "__getitem__",
    "__setitem__",
    "__contains__",
    "__iter__",
    "append",
    "pop",
];

const DICT_METHODS: [&str; 9] = [
    "__len__",
    "__getitem__",
    "__setitem__",
    "__contains__",
    "__iter__",
    "keys",
    "values",
    "items",
    "get",
];

fn index_arg(args: &Args, function: &str) -> Result<i64, RpcError> {
    args.arg(0, function)?
        .as_int()
        .ok_or_else(|| RpcError::type_error("list indices must be integers"))
}

fn list_method(list: &Arc<List>, name: &str) -> Option<Function> {
    let list = Arc::clone(list);
    let method = match name {
        "__len__" => Function::sync(name, move |args| {
            args.expect_arity("__len__", 0)?;
            Ok(Value::Int(list.len() as i64))
        }),
        "__getitem__" => Function::sync(name, move |args| {
            args.expect_arity("__getitem__", 1)?;
            let index = index_arg(&args, "__getitem__")?;
            list.get(index)
                .ok_or_else(|| RpcError::index_error("list index out of range"))
        }),
        "__setitem__" => Function::sync(name, move |args| {
            args.expect_arity("__setitem__", 2)?;
            let index = index_arg(&args, "__setitem__")?;
            list.set(index, args.positional[1].clone())?;
            Ok(Value::None)
        }),
        "__contains__" => Function::sync(name, move |args| {
            args.expect_arity("__contains__", 1)?;
            Ok(Value::Bool(list.contains(&args.positional[0])))
        }),
        "__iter__" => Function::sync(name, move |args| {
            args.expect_arity("__iter__", 0)?;
            Ok(Value::Tuple(list.snapshot()))
        }),
        "append" => Function::sync(name, move |args| {
            args.expect_arity("append", 1)?;
            list.push(args.positional[0].clone());
            Ok(Value::None)
        }),
        "pop" => Function::sync(name, move |args| {
            args.expect_arity("pop", 0)?;
            list.pop()
                .ok_or_else(|| RpcError::index_error("pop from empty list"))
        }),
        _ => return None,
    };
    Some(method)
}

fn dict_method(dict: &Arc<Dict>, name: &str) -> Option<Function> {
    let dict = Arc::clone(dict);
    let method = match name {
        "__len__" => Function::sync(name, move |args| {
            args.expect_arity("__len__", 0)?;
            Ok(Value::Int(dict.len() as i64))
        }),
        "__getitem__" => Function::sync(name, move |args| {
            args.expect_arity("__getitem__", 1)?;
            let key = &args.positional[0];
            dict.get(key)?
                .ok_or_else(|| RpcError::key_error(key.clone()))
        }),
        "__setitem__" => Function::sync(name, move |args| {
            args.expect_arity("__setitem__", 2)?;
            dict.insert(&args.positional[0], args.positional[1].clone())?;
            Ok(Value::None)
        }),
        "__contains__" => Function::sync(name, move |args| {
            args.expect_arity("__contains__", 1)?;
            Ok(Value::Bool(dict.contains(&args.positional[0])?))
        }),
        "__iter__" | "keys" => Function::sync(name, move |args| {
            args.expect_arity("keys", 0)?;
            Ok(Value::Tuple(dict.keys()))
        }),
        "values" => Function::sync(name, move |args| {
            args.expect_arity("values", 0)?;
            Ok(Value::Tuple(dict.values()))
        }),
        "items" => Function::sync(name, move |args| {
            args.expect_arity("items", 0)?;
            Ok(Value::tuple(
                dict.items()
                    .into_iter()
                    .map(|(k, v)| Value::tuple([k, v])),
            ))
        }),
        "get" => Function::sync(name, move |args| {
            let key = args.arg(0, "get")?;
            let default = args.get(1).cloned().unwrap_or(Value::None);
            Ok(dict.get(key)?.unwrap_or(default))
        }),
        _ => return None,
    };
    Some(method)
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl From<Function> for Value {
    fn from(function: Function) -> Self {
        Value::Object(Object::function(function))
    }
}

impl From<Arc<Class>> for Value {
    fn from(class: Arc<Class>) -> Self {
        Value::Object(Object::Class(class))
    }
}

impl From<Module> for Value {
    fn from(module: Module) -> Self {
        Value::Object(Object::module(module))
    }
}
