//! Values as seen by code on either side of a connection.
//!
//! Literals are plain data and compare by value. `Object`s are host objects
//! owned by this side and `Proxy`s stand in for objects owned by a peer; both
//! compare by identity.

use std::fmt;

use futures::future::{BoxFuture, FutureExt};
use indexmap::IndexMap;

use crate::error::RpcError;
use crate::exception::{Exception, ExceptionClass};
use crate::kind::{Capability, Kind};
use crate::object::Object;
use crate::proxy::{Operation, Proxy};

#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    /// Integers beyond `i64`. Bounded by `i128`: a wider `long` on the wire
    /// is rejected as a malformed message and fails only its call.
    Long(i128),
    Float(f64),
    Str(String),
    Tuple(Vec<Value>),
    Exception(Box<Exception>),
    Object(Object),
    Proxy(Proxy),
}

impl Value {
    pub fn tuple(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Tuple(items.into_iter().collect())
    }

    pub fn is_literal(&self) -> bool {
        match self {
            Value::None
            | Value::Bool(_)
            | Value::Int(_)
            | Value::Long(_)
            | Value::Float(_)
            | Value::Str(_) => true,
            Value::Tuple(items) => items.iter().all(Value::is_literal),
            _ => false,
        }
    }

    /// Reference kind, or `None` for by-value data.
    pub fn kind(&self) -> Option<Kind> {
        match self {
            Value::Object(obj) => Some(obj.kind()),
            Value::Proxy(proxy) => Some(proxy.kind()),
            Value::Exception(_) => Some(Kind::Exception),
            _ => None,
        }
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.kind().is_some_and(|kind| kind.supports(capability))
    }

    pub fn type_name(&self) -> String {
        match self {
            Value::None => "NoneType".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Int(_) | Value::Long(_) => "int".to_string(),
            Value::Float(_) => "float".to_string(),
            Value::Str(_) => "str".to_string(),
            Value::Tuple(_) => "tuple".to_string(),
            Value::Exception(exc) => exc.class_name(),
            Value::Object(obj) => obj.type_name(),
            Value::Proxy(proxy) => format!("proxy<{}>", proxy.kind()),
        }
    }

    /// `__name__` of classes, functions and modules, local or proxied.
    pub fn name(&self) -> Option<String> {
        match self {
            Value::Object(obj) => obj.name(),
            Value::Proxy(proxy) => proxy.name().map(str::to_string),
            _ => None,
        }
    }

    /// Identity comparison; literals fall back to value equality.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Object(a), Value::Object(b)) => a.same(b),
            (Value::Proxy(a), Value::Proxy(b)) => a.same(b),
            (Value::Object(_), _) | (Value::Proxy(_), _) => false,
            (a, b) => a == b,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Long(l) => i64::try_from(*l).ok(),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[Value]> {
        match self {
            Value::Tuple(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_proxy(&self) -> Option<&Proxy> {
        match self {
            Value::Proxy(proxy) => Some(proxy),
            _ => None,
        }
    }

    pub fn is_exception(&self) -> bool {
        matches!(self, Value::Exception(_))
    }

    pub fn as_exception(&self) -> Option<&Exception> {
        match self {
            Value::Exception(exc) => Some(exc),
            _ => None,
        }
    }

    /// The class of an instance, local or proxied, or of a user exception.
    pub fn class_of(&self) -> Option<Value> {
        match self {
            Value::Object(obj) => obj.class_of(),
            Value::Proxy(proxy) => proxy.class().cloned(),
            Value::Exception(exc) => match &exc.class {
                ExceptionClass::Class(class) => Some(class.clone()),
                ExceptionClass::Builtin(_) => None,
            },
            _ => None,
        }
    }

    /// Direct bases of a class value (local class or class proxy).
    pub fn bases(&self) -> Vec<Value> {
        match self {
            Value::Object(obj) => obj.bases(),
            Value::Proxy(proxy) => proxy.bases().to_vec(),
            _ => Vec::new(),
        }
    }

    pub fn is_subclass(&self, class: &Value) -> bool {
        self.same(class) || self.bases().iter().any(|base| base.is_subclass(class))
    }

    /// `isinstance` across the wire: the value's class (carried by every
    /// instance reference) is walked against `class` by identity.
    pub fn isinstance(&self, class: &Value) -> bool {
        self.class_of()
            .is_some_and(|own_class| own_class.is_subclass(class))
    }

    pub fn repr(&self) -> String {
        match self {
            Value::None => "None".to_string(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Int(i) => i.to_string(),
            Value::Long(l) => l.to_string(),
            Value::Float(f) if f.is_finite() && f.fract() == 0.0 => format!("{:.1}", f),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => format!("'{}'", s),
            Value::Tuple(items) if items.len() == 1 => format!("({},)", items[0].repr()),
            Value::Tuple(items) => format!(
                "({})",
                items.iter().map(Value::repr).collect::<Vec<_>>().join(", ")
            ),
            Value::Exception(exc) => format!(
                "{}({})",
                exc.class_name(),
                exc.args.iter().map(Value::repr).collect::<Vec<_>>().join(", ")
            ),
            Value::Object(obj) => obj.repr(),
            Value::Proxy(proxy) => format!("<proxy {} {}>", proxy.kind(), proxy.id()),
        }
    }

    /// Apply one operation of the proxy vocabulary to this value, wherever
    /// it lives: local objects execute in place, proxies forward to their
    /// owner, literals support the read-only sequence operations.
    pub fn perform(&self, op: Operation) -> BoxFuture<'static, Result<Value, RpcError>> {
        match self {
            Value::Object(obj) => obj.perform(op),
            Value::Proxy(proxy) => {
                let proxy = proxy.clone();
                async move { proxy.perform(op).await }.boxed()
            }
            literal => {
                let result = perform_literal(literal, op);
                async move { result }.boxed()
            }
        }
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

    pub async fn len(&self) -> Result<usize, RpcError> {
        let len = self.perform(Operation::Len).await?;
        len.as_int()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| RpcError::type_error("__len__ should return a non-negative int"))
    }

    pub async fn get_item(&self, key: impl Into<Value>) -> Result<Value, RpcError> {
        self.perform(Operation::GetItem(key.into())).await
    }

    pub async fn iterate(&self) -> Result<Vec<Value>, RpcError> {
        match self.perform(Operation::Iterate).await? {
            Value::Tuple(items) => Ok(items),
            other => Err(RpcError::type_error(format!(
                "__iter__ returned non-sequence of type '{}'",
                other.type_name()
            ))),
        }
    }

    pub async fn get_class(&self) -> Result<Value, RpcError> {
        self.perform(Operation::GetClass).await
    }

    pub async fn instantiate(&self, args: impl Into<Args>) -> Result<Value, RpcError> {
        self.perform(Operation::Instantiate(args.into())).await
    }
}

fn perform_literal(value: &Value, op: Operation) -> Result<Value, RpcError> {
    let type_name = value.type_name();
    match op {
        Operation::Len => literal_len(value),
        Operation::GetItem(key) => literal_item(value, &key),
        Operation::Iterate => literal_items(value),
        Operation::CallMethod(name, args) => match name.as_str() {
            "__len__" => literal_len(value),
            "__getitem__" => literal_item(value, args.arg(0, "__getitem__")?),
            "__iter__" => literal_items(value),
            _ => Err(RpcError::attribute_error(&type_name, &name)),
        },
        Operation::GetAttr(name) => match (value, name.as_str()) {
            (Value::Exception(exc), "args") => Ok(Value::Tuple(exc.args.clone())),
            (Value::Exception(exc), "__class__") => value
                .class_of()
                .ok_or_else(|| RpcError::attribute_error(&exc.class_name(), "__class__")),
            _ => Err(RpcError::attribute_error(&type_name, &name)),
        },
        Operation::GetClass => value
            .class_of()
            .ok_or_else(|| RpcError::type_error(format!("'{}' has no user class", type_name))),
        Operation::SetAttr(name, _) => Err(RpcError::raise(
            crate::exception::Builtin::AttributeError,
            format!("'{}' object attribute '{}' is read-only", type_name, name),
        )),
        Operation::Call(_) | Operation::Instantiate(_) => Err(RpcError::type_error(format!(
            "'{}' object is not callable",
            type_name
        ))),
    }
}

fn literal_len(value: &Value) -> Result<Value, RpcError> {
    match value {
        Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
        Value::Tuple(items) => Ok(Value::Int(items.len() as i64)),
        other => Err(RpcError::type_error(format!(
            "object of type '{}' has no len()",
            other.type_name()
        ))),
    }
}

fn literal_item(value: &Value, key: &Value) -> Result<Value, RpcError> {
    let index = |len: usize| {
        key.as_int()
            .ok_or_else(|| RpcError::type_error("indices must be integers"))
            .and_then(|i| {
                normalize_index(i, len)
                    .ok_or_else(|| RpcError::index_error(format!("{} index out of range", value.type_name())))
            })
    };
    match value {
        Value::Tuple(items) => Ok(items[index(items.len())?].clone()),
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(Value::Str(chars[index(chars.len())?].to_string()))
        }
        other => Err(RpcError::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn literal_items(value: &Value) -> Result<Value, RpcError> {
    match value {
        Value::Tuple(items) => Ok(Value::Tuple(items.clone())),
        Value::Str(s) => Ok(Value::tuple(s.chars().map(|c| Value::Str(c.to_string())))),
        other => Err(RpcError::type_error(format!(
            "'{}' object is not iterable",
            other.type_name()
        ))),
    }
}

/// Resolve a possibly negative sequence index against `len`.
pub(crate) fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let resolved = if index < 0 { index + len } else { index };
    if (0..len).contains(&resolved) {
        usize::try_from(resolved).ok()
    } else {
        None
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Int(a), Value::Long(b)) | (Value::Long(b), Value::Int(a)) => {
                i128::from(*a) == *b
            }
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Exception(a), Value::Exception(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.same(b),
            (Value::Proxy(a), Value::Proxy(b)) => a.same(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            other => f.write_str(&other.repr()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Exception> for Value {
    fn from(exc: Exception) -> Self {
        Value::Exception(Box::new(exc))
    }
}

impl From<Object> for Value {
    fn from(obj: Object) -> Self {
        Value::Object(obj)
    }
}

impl From<Proxy> for Value {
    fn from(proxy: Proxy) -> Self {
        Value::Proxy(proxy)
    }
}

impl From<DictKey> for Value {
    fn from(key: DictKey) -> Self {
        match key {
            DictKey::None => Value::None,
            DictKey::Bool(b) => Value::Bool(b),
            DictKey::Int(i) => Value::Int(i),
            DictKey::Long(l) => Value::Long(l),
            DictKey::Str(s) => Value::Str(s),
            DictKey::Tuple(items) => Value::tuple(items.into_iter().map(Value::from)),
        }
    }
}

/// Hashable subset of literal values usable as dict keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DictKey {
    None,
    Bool(bool),
    Int(i64),
    Long(i128),
    Str(String),
    Tuple(Vec<DictKey>),
}

impl TryFrom<&Value> for DictKey {
    type Error = RpcError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::None => Ok(DictKey::None),
            Value::Bool(b) => Ok(DictKey::Bool(*b)),
            Value::Int(i) => Ok(DictKey::Int(*i)),
            // Longs that fit collapse so `1` and `1L` name the same slot.
            Value::Long(l) => Ok(i64::try_from(*l).map_or(DictKey::Long(*l), DictKey::Int)),
            Value::Str(s) => Ok(DictKey::Str(s.clone())),
            Value::Tuple(items) => items
                .iter()
                .map(DictKey::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map(DictKey::Tuple),
            other => Err(RpcError::type_error(format!(
                "unhashable type: '{}'",
                other.type_name()
            ))),
        }
    }
}

/// Positional and keyword arguments of a call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    pub positional: Vec<Value>,
    pub keywords: IndexMap<String, Value>,
}

impl Args {
    pub fn new(positional: Vec<Value>) -> Self {
        Args {
            positional,
            keywords: IndexMap::new(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_keyword(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keywords.insert(name.into(), value.into());
        self
    }

    /// Bind an implicit first argument (`self` or `cls`).
    pub fn prepend(mut self, receiver: Value) -> Self {
        self.positional.insert(0, receiver);
        self
    }

    pub fn len(&self) -> usize {
        self.positional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keywords.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    pub fn keyword(&self, name: &str) -> Option<&Value> {
        self.keywords.get(name)
    }

    /// Positional argument `index`, or a `TypeError` naming `function`.
    pub fn arg(&self, index: usize, function: &str) -> Result<&Value, RpcError> {
        self.positional.get(index).ok_or_else(|| {
            RpcError::type_error(format!(
                "{}() missing required positional argument {}",
                function,
                index + 1
            ))
        })
    }

    pub fn expect_arity(&self, function: &str, expected: usize) -> Result<(), RpcError> {
        if self.positional.len() == expected && self.keywords.is_empty() {
            Ok(())
        } else {
            Err(RpcError::type_error(format!(
                "{}() takes {} positional arguments but {} were given",
                function,
                expected,
                self.positional.len() + self.keywords.len()
            )))
        }
    }
}

impl From<Vec<Value>> for Args {
    fn from(positional: Vec<Value>) -> Self {
        Args::new(positional)
    }
}

impl<const N: usize> From<[Value; N]> for Args {
    fn from(positional: [Value; N]) -> Self {
        Args::new(positional.into())
    }
}

impl From<()> for Args {
    fn from(_: ()) -> Self {
        Args::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::Builtin;

    #[test]
    fn test_literal_equality_and_type() {
        assert_eq!(Value::Int(3), Value::Long(3));
        assert_ne!(Value::Int(3), Value::Float(3.0));
        assert_eq!(Value::from("x"), Value::Str("x".into()));
        assert_eq!(Value::tuple([Value::Int(1), Value::None]).repr(), "(1, None)");
        assert_eq!(Value::tuple([Value::Int(1)]).repr(), "(1,)");
        assert_eq!(Value::Float(2.0).repr(), "2.0");
    }

    #[test]
    fn test_is_literal() {
        assert!(Value::tuple([Value::Int(1), Value::from("a")]).is_literal());
        assert!(!Value::from(Exception::with_message(Builtin::TypeError, "x")).is_literal());
    }

    #[test]
    fn test_dict_key_conversion() {
        assert_eq!(DictKey::try_from(&Value::Long(5)).unwrap(), DictKey::Int(5));
        assert_eq!(
            DictKey::try_from(&Value::Long(i128::MAX)).unwrap(),
            DictKey::Long(i128::MAX)
        );
        let err = DictKey::try_from(&Value::Float(1.5)).unwrap_err();
        assert!(err.is_a(Builtin::TypeError));
    }

    #[test]
    fn test_normalize_index() {
        assert_eq!(normalize_index(0, 3), Some(0));
        assert_eq!(normalize_index(-1, 3), Some(2));
        assert_eq!(normalize_index(3, 3), None);
        assert_eq!(normalize_index(-4, 3), None);
    }

    #[test]
    fn test_args_arity() {
        let args = Args::new(vec![Value::Int(1)]).with_keyword("flag", true);
        assert_eq!(args.keyword("flag"), Some(&Value::Bool(true)));
        assert!(args.expect_arity("f", 1).is_err());
        assert!(Args::new(vec![Value::Int(1)]).expect_arity("f", 1).is_ok());
        assert_eq!(args.prepend(Value::None).get(0), Some(&Value::None));
    }

    #[tokio::test]
    async fn test_literal_sequence_operations() {
        let tuple = Value::tuple([Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(tuple.len().await.unwrap(), 3);
        assert_eq!(tuple.get_item(-1).await.unwrap(), Value::Int(3));
        assert_eq!(tuple.iterate().await.unwrap().len(), 3);

        let err = Value::Int(1).call(()).await.unwrap_err();
        assert!(err.is_a(Builtin::TypeError));

        let err = tuple.get_item(7).await.unwrap_err();
        assert!(err.is_a(Builtin::IndexError));
    }
}
