pub mod config;
pub mod dispatcher;
pub mod logging;
pub mod protocol;
pub mod request;

pub use config::ProtocolConfig;
pub use dispatcher::{CallState, Dispatcher};
pub use logging::{init_logging, init_test_logging, LogFormat};
pub use protocol::{AbstractProtocol, LocalProtocol, Protocol, RemoteProtocol};
pub use request::Request;

pub use ferry_core::{
    Args, Builtin, Capability, Class, Exception, Function, Object, Operation, Proxy, RpcError,
    Value,
};
