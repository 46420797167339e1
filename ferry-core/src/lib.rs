//! Core of the ferry object-proxying protocol: values, host objects, proxies
//! and the wire encoding that lets one side operate on the other's objects.

pub mod codec;
pub mod error;
pub mod exception;
pub mod ids;
pub mod kind;
pub mod object;
pub mod protocol;
pub mod proxy;
pub mod value;

pub use codec::{decode_frame, decode_message, encode_message, MalformedMessage};
pub use error::RpcError;
pub use exception::{Builtin, Exception, ExceptionClass};
pub use ids::{CallId, CallIdAllocator, ReferenceId, ReferenceIdAllocator};
pub use kind::{Capability, Kind};
pub use object::{Class, ClassBuilder, Dict, Function, Instance, List, Module, Object, Opaque};
pub use protocol::{
    ClassRegistry, ExportTable, Message, MessageError, ReferenceTable, TableError, TableStats,
    ValueCodec, WireException, WireValue,
};
pub use proxy::{Invoker, Operation, Proxy, ProxyFactory, Shape};
pub use value::{Args, DictKey, Value};
