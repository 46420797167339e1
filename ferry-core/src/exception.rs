//! Exception values.
//!
//! An exception is its class plus its arguments. Builtin classes travel by
//! name and are rebuilt as the same builtin on the other side; user classes
//! travel as class references. Tracebacks are not carried.

use std::fmt;

use crate::value::Value;

/// Exception classes every side knows without a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Exception,
    ArithmeticError,
    ZeroDivisionError,
    TypeError,
    ValueError,
    LookupError,
    KeyError,
    IndexError,
    AttributeError,
    StopIteration,
    RuntimeError,
    NotImplementedError,
    ObjectNotFound,
    ProtocolError,
    TransportFailure,
}

impl Builtin {
    pub const ALL: [Builtin; 15] = [
        Builtin::Exception,
        Builtin::ArithmeticError,
        Builtin::ZeroDivisionError,
        Builtin::TypeError,
        Builtin::ValueError,
        Builtin::LookupError,
        Builtin::KeyError,
        Builtin::IndexError,
        Builtin::AttributeError,
        Builtin::StopIteration,
        Builtin::RuntimeError,
        Builtin::NotImplementedError,
        Builtin::ObjectNotFound,
        Builtin::ProtocolError,
        Builtin::TransportFailure,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Exception => "Exception",
            Builtin::ArithmeticError => "ArithmeticError",
            Builtin::ZeroDivisionError => "ZeroDivisionError",
            Builtin::TypeError => "TypeError",
            Builtin::ValueError => "ValueError",
            Builtin::LookupError => "LookupError",
            Builtin::KeyError => "KeyError",
            Builtin::IndexError => "IndexError",
            Builtin::AttributeError => "AttributeError",
            Builtin::StopIteration => "StopIteration",
            Builtin::RuntimeError => "RuntimeError",
            Builtin::NotImplementedError => "NotImplementedError",
            Builtin::ObjectNotFound => "ObjectNotFound",
            Builtin::ProtocolError => "ProtocolError",
            Builtin::TransportFailure => "TransportFailure",
        }
    }

    pub fn from_name(name: &str) -> Option<Builtin> {
        Builtin::ALL.iter().copied().find(|b| b.name() == name)
    }

    pub fn parent(self) -> Option<Builtin> {
        match self {
            Builtin::Exception => None,
            Builtin::ZeroDivisionError => Some(Builtin::ArithmeticError),
            Builtin::KeyError | Builtin::IndexError => Some(Builtin::LookupError),
            Builtin::NotImplementedError => Some(Builtin::RuntimeError),
            _ => Some(Builtin::Exception),
        }
    }

    /// True when `self` is `other` or derives from it.
    pub fn is_subclass_of(self, other: Builtin) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if class == other {
                return true;
            }
            current = class.parent();
        }
        false
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExceptionClass {
    Builtin(Builtin),
    /// A user class: a local `Class` object or a class proxy.
    Class(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Exception {
    pub class: ExceptionClass,
    pub args: Vec<Value>,
}

impl Exception {
    pub fn new(class: ExceptionClass, args: Vec<Value>) -> Self {
        Exception { class, args }
    }

    pub fn builtin(class: Builtin, args: Vec<Value>) -> Self {
        Self::new(ExceptionClass::Builtin(class), args)
    }

    pub fn with_message(class: Builtin, message: impl Into<String>) -> Self {
        Self::builtin(class, vec![Value::Str(message.into())])
    }

    /// An exception whose class is a user-defined class (local or proxied).
    pub fn of_class(class: Value, args: Vec<Value>) -> Self {
        Self::new(ExceptionClass::Class(class), args)
    }

    pub fn class_name(&self) -> String {
        match &self.class {
            ExceptionClass::Builtin(b) => b.name().to_string(),
            ExceptionClass::Class(class) => class
                .name()
                .unwrap_or_else(|| class.type_name()),
        }
    }

    pub fn builtin_class(&self) -> Option<Builtin> {
        match &self.class {
            ExceptionClass::Builtin(b) => Some(*b),
            ExceptionClass::Class(_) => None,
        }
    }

    /// Builtin-hierarchy test; user classes only match `Builtin::Exception`.
    pub fn is_a(&self, class: Builtin) -> bool {
        match &self.class {
            ExceptionClass::Builtin(b) => b.is_subclass_of(class),
            ExceptionClass::Class(_) => class == Builtin::Exception,
        }
    }

    /// Rendered argument text: the lone string argument, or the tuple of args.
    pub fn message(&self) -> String {
        match self.args.as_slice() {
            [] => String::new(),
            [Value::Str(s)] => s.clone(),
            [single] => single.repr(),
            many => many.iter().map(Value::repr).collect::<Vec<_>>().join(", "),
        }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = self.message();
        if message.is_empty() {
            write!(f, "{}", self.class_name())
        } else {
            write!(f, "{}: {}", self.class_name(), message)
        }
    }
}
