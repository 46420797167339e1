//! Protocol facades: what an embedder holds to export values and reach the
//! peer's exports.

use std::fmt;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use ferry_core::{
    CallIdAllocator, ExportTable, Invoker, Message, Operation, ProxyFactory, ReferenceId,
    RpcError, TableStats, Value, ValueCodec, WireValue,
};
use ferry_transport::{FramedTransport, MemoryTransport, Transport};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::ProtocolConfig;
use crate::dispatcher::Dispatcher;
use crate::request;

#[async_trait]
pub trait Protocol: Send + Sync {
    fn codec(&self) -> &ValueCodec;

    fn exports(&self) -> &ExportTable;

    fn wrap(&self, value: &Value) -> Result<WireValue, RpcError> {
        self.codec().wrap(value)
    }

    fn unwrap(&self, wire: &WireValue) -> Result<Value, RpcError> {
        self.codec().unwrap(wire)
    }

    /// Make `value` reachable by the peer under `name`.
    fn export(&self, name: &str, value: Value) -> Option<Value> {
        self.exports().insert(name, value)
    }

    /// Names this side exports.
    fn exported_names(&self) -> Vec<String> {
        self.exports().names()
    }

    fn stats(&self) -> TableStats {
        self.codec().table().stats()
    }

    /// The peer's export `name`, usually as a proxy.
    async fn get_remote(&self, name: &str) -> Result<Value, RpcError>;

    /// The names the peer exports, in no particular order.
    async fn remote_keys(&self) -> Result<Vec<String>, RpcError>;
}

/// Value model only: no transport, and the export table is its own peer.
#[derive(Debug)]
pub struct AbstractProtocol {
    codec: ValueCodec,
    exports: ExportTable,
}

impl AbstractProtocol {
    pub fn new() -> Self {
        AbstractProtocol {
            codec: ValueCodec::new(ProxyFactory::detached()),
            exports: ExportTable::new(),
        }
    }
}

impl Default for AbstractProtocol {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Protocol for AbstractProtocol {
    fn codec(&self) -> &ValueCodec {
        &self.codec
    }

    fn exports(&self) -> &ExportTable {
        &self.exports
    }

    async fn get_remote(&self, name: &str) -> Result<Value, RpcError> {
        Ok(self.exports.get(name)?)
    }

    async fn remote_keys(&self) -> Result<Vec<String>, RpcError> {
        Ok(self.exports.names())
    }
}

/// In-process executor behind a local protocol's proxies.
struct Loopback {
    codec: ValueCodec,
    exports: ExportTable,
    call_ids: CallIdAllocator,
}

#[async_trait]
impl Invoker for Loopback {
    async fn invoke(&self, target: ReferenceId, op: Operation) -> Result<Value, RpcError> {
        let id = self.call_ids.allocate();
        debug!("Loopback {} {} on {}", id, op.name(), target);
        let msg = request::encode(&self.codec, id, target, op)?;
        let request = request::decode(&self.codec, msg)?;
        let reply = request::execute(&self.codec, &self.exports, request)
            .await
            .and_then(|value| self.codec.wrap(&value));
        match reply {
            Ok(result) => self.codec.unwrap(&result),
            Err(err) => Err(self.codec.unwrap_error(&self.codec.wrap_error(err))),
        }
    }
}

/// Proxies backed by a direct in-process call instead of a channel. Every
/// value still crosses the codec in both directions.
pub struct LocalProtocol {
    inner: Arc<Loopback>,
}

impl LocalProtocol {
    pub fn new() -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<Loopback>| {
            let invoker: Weak<dyn Invoker> = weak.clone();
            Loopback {
                codec: ValueCodec::new(ProxyFactory::new(invoker)),
                exports: ExportTable::new(),
                call_ids: CallIdAllocator::new(),
            }
        });
        LocalProtocol { inner }
    }
}

impl Default for LocalProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LocalProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalProtocol")
            .field("session", &self.inner.codec.session())
            .field("exports", &self.inner.exports.len())
            .finish()
    }
}

#[async_trait]
impl Protocol for LocalProtocol {
    fn codec(&self) -> &ValueCodec {
        &self.inner.codec
    }

    fn exports(&self) -> &ExportTable {
        &self.inner.exports
    }

    async fn get_remote(&self, name: &str) -> Result<Value, RpcError> {
        let value = self.inner.exports.get(name)?;
        self.inner.codec.unwrap(&self.inner.codec.wrap(&value)?)
    }

    async fn remote_keys(&self) -> Result<Vec<String>, RpcError> {
        Ok(self.inner.exports.names())
    }
}

/// One side of a real connection.
#[derive(Debug)]
pub struct RemoteProtocol {
    dispatcher: Arc<Dispatcher>,
    receiver: JoinHandle<()>,
}

impl RemoteProtocol {
    /// Start serving `transport`. Must be called within a tokio runtime.
    pub fn new(transport: Arc<dyn Transport>, config: ProtocolConfig) -> Self {
        info!("[{}] Protocol started", config.name);
        let dispatcher = Dispatcher::new(transport, config);
        let receiver = dispatcher.spawn_receiver();
        RemoteProtocol {
            dispatcher,
            receiver,
        }
    }

    pub fn with_defaults(transport: Arc<dyn Transport>) -> Self {
        Self::new(transport, ProtocolConfig::default())
    }

    /// Build from the two channel primitives: where outgoing messages go and
    /// where incoming ones come from.
    pub fn from_channels(
        push: mpsc::UnboundedSender<Message>,
        pop: mpsc::UnboundedReceiver<Message>,
        config: ProtocolConfig,
    ) -> Self {
        Self::new(Arc::new(MemoryTransport::from_channels(push, pop)), config)
    }

    /// Newline-delimited JSON over a byte stream.
    pub fn framed<S>(stream: S, config: ProtocolConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let transport = FramedTransport::from_stream(stream, config.max_frame_len);
        Self::new(Arc::new(transport), config)
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn config(&self) -> &ProtocolConfig {
        self.dispatcher.config()
    }

    pub fn pending_calls(&self) -> usize {
        self.dispatcher.pending_calls()
    }

    pub fn is_closed(&self) -> bool {
        self.dispatcher.is_closed()
    }

    /// Close the channel. Pending and later calls fail.
    pub async fn close(&self) -> Result<(), RpcError> {
        info!("[{}] Protocol closing", self.dispatcher.config().name);
        self.dispatcher.close().await
    }
}

impl Drop for RemoteProtocol {
    fn drop(&mut self) {
        self.dispatcher.shutdown("protocol dropped");
        self.receiver.abort();
    }
}

#[async_trait]
impl Protocol for RemoteProtocol {
    fn codec(&self) -> &ValueCodec {
        self.dispatcher.codec()
    }

    fn exports(&self) -> &ExportTable {
        self.dispatcher.exports()
    }

    async fn get_remote(&self, name: &str) -> Result<Value, RpcError> {
        self.dispatcher.get_remote(name).await
    }

    async fn remote_keys(&self) -> Result<Vec<String>, RpcError> {
        self.dispatcher.remote_keys().await
    }
}
