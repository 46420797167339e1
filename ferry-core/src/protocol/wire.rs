//! Wire form of values.
//!
//! Every value crosses the channel either as a literal (copied) or as a
//! reference (id plus kind). References are tagged arrays so that a literal
//! can never be mistaken for one:
//!
//! - `null`, `true`, `42`, `1.5`, `"text"`
//! - `["long", "<decimal>"]` and `["float", "nan" | "inf" | "-inf"]`
//! - `["tuple", [items...]]`
//! - `["exception", "<BuiltinName>" | <class wire>, [args...]]`
//! - `["ref", id, "<kind>", descriptor]`: owned by the sender
//! - `["import", id]`: owned by the receiver, a reference it sent earlier

use serde_json::{json, Number, Value as JsonValue};

use crate::exception::Builtin;
use crate::ids::ReferenceId;
use crate::kind::Kind;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Long(i128),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    Literal(Literal),
    Tuple(Vec<WireValue>),
    Exception(WireException),
    Reference(Reference),
    Import(ReferenceId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub id: ReferenceId,
    pub kind: Kind,
    pub descriptor: Descriptor,
}

/// Metadata the receiver needs to build a faithful proxy.
#[derive(Debug, Clone, PartialEq)]
pub enum Descriptor {
    None,
    /// `__name__` of functions and modules.
    Named(String),
    Class(ClassDescriptor),
    /// The class of an instance.
    Instance(Box<WireValue>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDescriptor {
    pub name: String,
    pub doc: Option<String>,
    pub bases: Vec<WireValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WireExceptionClass {
    Builtin(Builtin),
    Class(Box<WireValue>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WireException {
    pub class: WireExceptionClass,
    pub args: Vec<WireValue>,
}

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("Unrecognized wire value: {0}")]
    Unrecognized(String),

    #[error("Unknown value tag: {0}")]
    UnknownTag(String),

    #[error("Invalid {0} value format")]
    InvalidFormat(&'static str),

    #[error("Invalid reference ID")]
    InvalidReferenceId,

    #[error("Unknown reference kind: {0}")]
    UnknownKind(String),

    #[error("Unknown exception class: {0}")]
    UnknownException(String),
}

impl WireValue {
    pub fn none() -> Self {
        WireValue::Literal(Literal::None)
    }

    pub fn from_json(value: &JsonValue) -> Result<Self, WireError> {
        match value {
            JsonValue::Null => Ok(WireValue::Literal(Literal::None)),
            JsonValue::Bool(b) => Ok(WireValue::Literal(Literal::Bool(*b))),
            JsonValue::Number(n) => number_from_json(n),
            JsonValue::String(s) => Ok(WireValue::Literal(Literal::Str(s.clone()))),
            JsonValue::Array(arr) => Self::tagged_from_json(arr),
            JsonValue::Object(_) => Err(WireError::Unrecognized(value.to_string())),
        }
    }

    fn tagged_from_json(arr: &[JsonValue]) -> Result<Self, WireError> {
        let tag = arr
            .first()
            .and_then(JsonValue::as_str)
            .ok_or_else(|| WireError::Unrecognized(JsonValue::from(arr.to_vec()).to_string()))?;

        match tag {
            "long" => {
                let digits = arr
                    .get(1)
                    .and_then(JsonValue::as_str)
                    .filter(|_| arr.len() == 2)
                    .ok_or(WireError::InvalidFormat("long"))?;
                let long = digits
                    .parse::<i128>()
                    .map_err(|_| WireError::InvalidFormat("long"))?;
                Ok(WireValue::Literal(Literal::Long(long)))
            }

            "float" => {
                let special = match arr.get(1).and_then(JsonValue::as_str) {
                    Some("nan") => f64::NAN,
                    Some("inf") => f64::INFINITY,
                    Some("-inf") => f64::NEG_INFINITY,
                    _ => return Err(WireError::InvalidFormat("float")),
                };
                Ok(WireValue::Literal(Literal::Float(special)))
            }

            "tuple" => {
                if arr.len() != 2 {
                    return Err(WireError::InvalidFormat("tuple"));
                }
                Ok(WireValue::Tuple(values_from_json(&arr[1], "tuple")?))
            }

            "exception" => {
                if arr.len() != 3 {
                    return Err(WireError::InvalidFormat("exception"));
                }
                WireException::from_parts(&arr[1], &arr[2]).map(WireValue::Exception)
            }

            "ref" => {
                if arr.len() != 4 {
                    return Err(WireError::InvalidFormat("ref"));
                }
                let id = reference_id_from_json(&arr[1])?;
                let kind_name = arr[2].as_str().ok_or(WireError::InvalidFormat("ref"))?;
                let kind = Kind::from_name(kind_name)
                    .ok_or_else(|| WireError::UnknownKind(kind_name.to_string()))?;
                let descriptor = Descriptor::from_json(&arr[3])?;
                Ok(WireValue::Reference(Reference {
                    id,
                    kind,
                    descriptor,
                }))
            }

            "import" => {
                if arr.len() != 2 {
                    return Err(WireError::InvalidFormat("import"));
                }
                Ok(WireValue::Import(reference_id_from_json(&arr[1])?))
            }

            _ => Err(WireError::UnknownTag(tag.to_string())),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            WireValue::Literal(literal) => literal.to_json(),
            WireValue::Tuple(items) => {
                json!(["tuple", items.iter().map(WireValue::to_json).collect::<Vec<_>>()])
            }
            WireValue::Exception(exc) => {
                let mut parts = vec![JsonValue::from("exception")];
                parts.extend(exc.to_parts());
                JsonValue::Array(parts)
            }
            WireValue::Reference(reference) => json!([
                "ref",
                reference.id.as_u64(),
                reference.kind.name(),
                reference.descriptor.to_json()
            ]),
            WireValue::Import(id) => json!(["import", id.as_u64()]),
        }
    }
}

impl Literal {
    fn to_json(&self) -> JsonValue {
        match self {
            Literal::None => JsonValue::Null,
            Literal::Bool(b) => JsonValue::Bool(*b),
            Literal::Int(i) => JsonValue::from(*i),
            Literal::Long(l) => json!(["long", l.to_string()]),
            Literal::Float(f) => match Number::from_f64(*f) {
                Some(n) => JsonValue::Number(n),
                None if f.is_nan() => json!(["float", "nan"]),
                None if *f > 0.0 => json!(["float", "inf"]),
                None => json!(["float", "-inf"]),
            },
            Literal::Str(s) => JsonValue::String(s.clone()),
        }
    }
}

impl Descriptor {
    fn from_json(value: &JsonValue) -> Result<Self, WireError> {
        let arr = match value {
            JsonValue::Null => return Ok(Descriptor::None),
            JsonValue::Array(arr) => arr,
            _ => return Err(WireError::InvalidFormat("descriptor")),
        };

        match arr.first().and_then(JsonValue::as_str) {
            Some("named") if arr.len() == 2 => {
                let name = arr[1].as_str().ok_or(WireError::InvalidFormat("descriptor"))?;
                Ok(Descriptor::Named(name.to_string()))
            }
            Some("class") if arr.len() == 4 => {
                let name = arr[1].as_str().ok_or(WireError::InvalidFormat("class"))?;
                let doc = match &arr[2] {
                    JsonValue::Null => None,
                    JsonValue::String(doc) => Some(doc.clone()),
                    _ => return Err(WireError::InvalidFormat("class")),
                };
                let bases = values_from_json(&arr[3], "class")?;
                Ok(Descriptor::Class(ClassDescriptor {
                    name: name.to_string(),
                    doc,
                    bases,
                }))
            }
            Some("instance") if arr.len() == 2 => Ok(Descriptor::Instance(Box::new(
                WireValue::from_json(&arr[1])?,
            ))),
            _ => Err(WireError::InvalidFormat("descriptor")),
        }
    }

    fn to_json(&self) -> JsonValue {
        match self {
            Descriptor::None => JsonValue::Null,
            Descriptor::Named(name) => json!(["named", name]),
            Descriptor::Class(class) => json!([
                "class",
                class.name,
                class.doc,
                class.bases.iter().map(WireValue::to_json).collect::<Vec<_>>()
            ]),
            Descriptor::Instance(class) => json!(["instance", class.to_json()]),
        }
    }
}

impl WireException {
    /// Parse the `(class, args)` pair shared by exception values and
    /// `failed` messages.
    pub fn from_parts(class: &JsonValue, args: &JsonValue) -> Result<Self, WireError> {
        let class = match class {
            JsonValue::String(name) => WireExceptionClass::Builtin(
                Builtin::from_name(name).ok_or_else(|| WireError::UnknownException(name.clone()))?,
            ),
            other => WireExceptionClass::Class(Box::new(WireValue::from_json(other)?)),
        };
        let args = values_from_json(args, "exception")?;
        Ok(WireException { class, args })
    }

    pub fn to_parts(&self) -> [JsonValue; 2] {
        let class = match &self.class {
            WireExceptionClass::Builtin(builtin) => JsonValue::from(builtin.name()),
            WireExceptionClass::Class(class) => class.to_json(),
        };
        let args = self.args.iter().map(WireValue::to_json).collect::<Vec<_>>();
        [class, JsonValue::Array(args)]
    }
}

fn number_from_json(n: &Number) -> Result<WireValue, WireError> {
    if let Some(i) = n.as_i64() {
        Ok(WireValue::Literal(Literal::Int(i)))
    } else if let Some(u) = n.as_u64() {
        Ok(WireValue::Literal(Literal::Long(i128::from(u))))
    } else {
        n.as_f64()
            .map(|f| WireValue::Literal(Literal::Float(f)))
            .ok_or_else(|| WireError::Unrecognized(n.to_string()))
    }
}

pub(crate) fn values_from_json(
    value: &JsonValue,
    what: &'static str,
) -> Result<Vec<WireValue>, WireError> {
    value
        .as_array()
        .ok_or(WireError::InvalidFormat(what))?
        .iter()
        .map(WireValue::from_json)
        .collect()
}

pub(crate) fn reference_id_from_json(value: &JsonValue) -> Result<ReferenceId, WireError> {
    value
        .as_u64()
        .map(ReferenceId::new)
        .ok_or(WireError::InvalidReferenceId)
}
