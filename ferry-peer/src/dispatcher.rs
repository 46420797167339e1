//! Correlates outbound requests with their replies and serves inbound
//! requests while outbound calls are still waiting.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use dashmap::DashMap;
use ferry_core::protocol::{Literal, WireExceptionClass};
use ferry_core::{
    Builtin, CallId, CallIdAllocator, ExportTable, Invoker, MalformedMessage, Message, Operation,
    ProxyFactory, ReferenceId, RpcError, Value, ValueCodec, WireException, WireValue,
};
use ferry_transport::{CodecError, Transport, TransportError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::config::ProtocolConfig;
use crate::request;

type Reply = Result<WireValue, RpcError>;

/// Lifecycle of one outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    New,
    Sent,
    Waiting,
    Finished,
    Failed,
}

#[derive(Debug)]
struct PendingCall {
    state: CallState,
    reply: oneshot::Sender<Reply>,
}

pub struct Dispatcher {
    config: ProtocolConfig,
    codec: ValueCodec,
    exports: ExportTable,
    transport: Arc<dyn Transport>,
    call_ids: CallIdAllocator,
    pending: DashMap<CallId, PendingCall>,
    closed: AtomicBool,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>, config: ProtocolConfig) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Dispatcher>| {
            let invoker: Weak<dyn Invoker> = weak.clone();
            Dispatcher {
                config,
                codec: ValueCodec::new(ProxyFactory::new(invoker)),
                exports: ExportTable::new(),
                transport,
                call_ids: CallIdAllocator::new(),
                pending: DashMap::new(),
                closed: AtomicBool::new(false),
            }
        })
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn codec(&self) -> &ValueCodec {
        &self.codec
    }

    pub fn exports(&self) -> &ExportTable {
        &self.exports
    }

    pub fn pending_calls(&self) -> usize {
        self.pending.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Start the receive loop. It stops when the channel ends or the
    /// dispatcher is dropped.
    pub fn spawn_receiver(self: &Arc<Self>) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let transport = Arc::clone(&self.transport);
        let name = self.config.name.clone();
        info!("[{}] Receive loop started", name);

        tokio::spawn(async move {
            loop {
                let popped = transport.pop().await;
                let Some(dispatcher) = weak.upgrade() else {
                    break;
                };
                match popped {
                    Ok(Some(msg)) => dispatcher.handle(msg),
                    Err(TransportError::Malformed(bad)) => dispatcher.reject(bad),
                    Ok(None) => {
                        dispatcher.shutdown("connection closed by peer");
                        break;
                    }
                    Err(err) => {
                        dispatcher.shutdown(&err.to_string());
                        break;
                    }
                }
            }
            info!("[{}] Receive loop stopped", name);
        })
    }

    fn handle(self: &Arc<Self>, msg: Message) {
        debug!("[{}] Received {} for {}", self.config.name, msg.tag(), msg.id());
        match msg {
            Message::Finished { id, result } => self.complete(id, CallState::Finished, Ok(result)),
            Message::Failed { id, error } => {
                let err = self.codec.unwrap_error(&error);
                self.complete(id, CallState::Failed, Err(err));
            }
            request => {
                let dispatcher = Arc::clone(self);
                tokio::spawn(async move { dispatcher.serve(request).await });
            }
        }
    }

    /// A message that could not be decoded fails only the call it names.
    fn reject(self: &Arc<Self>, bad: MalformedMessage) {
        warn!("[{}] Rejected {}", self.config.name, bad);
        let Some(id) = bad.id else {
            return;
        };
        let err = RpcError::protocol(bad.to_string());
        if bad.is_reply() {
            self.complete(id, CallState::Failed, Err(err));
        } else {
            let dispatcher = Arc::clone(self);
            tokio::spawn(async move {
                let reply = Message::Failed {
                    id,
                    error: dispatcher.codec.wrap_error(err),
                };
                dispatcher.send_reply(id, reply).await;
            });
        }
    }

    /// Execute an inbound request and send back its outcome.
    async fn serve(&self, msg: Message) {
        let id = msg.id();
        let outcome = match request::decode(&self.codec, msg) {
            Ok(request) => request::execute(&self.codec, &self.exports, request).await,
            Err(err) => Err(err),
        };
        let reply = match outcome.and_then(|value| self.codec.wrap(&value)) {
            Ok(result) => Message::Finished { id, result },
            Err(err) => {
                debug!("[{}] Request {} failed: {}", self.config.name, id, err);
                Message::Failed {
                    id,
                    error: self.codec.wrap_error(err),
                }
            }
        };
        self.send_reply(id, reply).await;
    }

    /// Push a reply. One the codec refuses, such as a result over the frame
    /// limit, is replaced by a `failed` reply so the caller still hears back.
    async fn send_reply(&self, id: CallId, reply: Message) {
        let refused = match self.transport.push(reply).await {
            Ok(()) => return,
            Err(TransportError::Codec(err)) if !matches!(err, CodecError::IoError(_)) => err,
            Err(err) => {
                warn!("[{}] Dropping reply to {}: {}", self.config.name, id, err);
                return;
            }
        };
        warn!("[{}] Reply to {} refused: {}", self.config.name, id, refused);

        let failure = RpcError::protocol(format!("reply to {} could not be sent: {}", id, refused));
        let fallback = Message::Failed {
            id,
            error: self.codec.wrap_error(failure),
        };
        if self.transport.push(fallback).await.is_ok() {
            return;
        }
        let bare = Message::Failed {
            id,
            error: WireException {
                class: WireExceptionClass::Builtin(Builtin::ProtocolError),
                args: vec![WireValue::Literal(Literal::Str("reply could not be sent".into()))],
            },
        };
        if let Err(err) = self.transport.push(bare).await {
            warn!("[{}] Dropping reply to {}: {}", self.config.name, id, err);
        }
    }

    fn complete(&self, id: CallId, state: CallState, reply: Reply) {
        match self.pending.remove(&id) {
            Some((_, pending)) => {
                debug!("[{}] {} {:?} -> {:?}", self.config.name, id, pending.state, state);
                // The caller may have timed out in between.
                let _ = pending.reply.send(reply);
            }
            None => warn!("[{}] Reply for unknown call {}", self.config.name, id),
        }
    }

    fn set_state(&self, id: CallId, state: CallState) {
        if let Some(mut pending) = self.pending.get_mut(&id) {
            debug!("[{}] {} {:?} -> {:?}", self.config.name, id, pending.state, state);
            pending.state = state;
        }
    }

    /// Send `msg` and wait for the reply carrying its id.
    ///
    /// The pending entry exists before the message is pushed, so a reply
    /// can never arrive ahead of its registration.
    async fn round_trip(&self, msg: Message) -> Reply {
        let id = msg.id();
        if self.is_closed() {
            return Err(RpcError::transport("connection is closed"));
        }

        let (tx, rx) = oneshot::channel();
        self.pending.insert(
            id,
            PendingCall {
                state: CallState::New,
                reply: tx,
            },
        );
        debug!("[{}] {} -> {:?}", self.config.name, id, CallState::New);
        if self.is_closed() {
            self.pending.remove(&id);
            return Err(RpcError::transport("connection is closed"));
        }

        trace!("[{}] Sending {}", self.config.name, msg.to_json());
        if let Err(err) = self.transport.push(msg).await {
            self.pending.remove(&id);
            return Err(err.into());
        }
        self.set_state(id, CallState::Sent);
        self.set_state(id, CallState::Waiting);

        let received = match self.config.call_timeout() {
            Some(deadline) => match tokio::time::timeout(deadline, rx).await {
                Ok(received) => received,
                Err(_) => {
                    self.pending.remove(&id);
                    warn!("[{}] {} timed out after {:?}", self.config.name, id, deadline);
                    return Err(RpcError::Timeout(id));
                }
            },
            None => rx.await,
        };
        received.unwrap_or_else(|_| Err(RpcError::transport("reply channel dropped")))
    }

    /// Look up `name` in the peer's exports.
    pub async fn get_remote(&self, name: &str) -> Result<Value, RpcError> {
        let id = self.call_ids.allocate();
        let result = self
            .round_trip(Message::GetExport {
                id,
                name: name.to_string(),
            })
            .await?;
        self.codec.unwrap(&result)
    }

    pub async fn remote_keys(&self) -> Result<Vec<String>, RpcError> {
        let id = self.call_ids.allocate();
        let result = self.round_trip(Message::GetExportNames { id }).await?;
        match self.codec.unwrap(&result)? {
            Value::Tuple(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Str(name) => Ok(name),
                    other => Err(RpcError::protocol(format!(
                        "export name must be a str, got {}",
                        other.type_name()
                    ))),
                })
                .collect(),
            other => Err(RpcError::protocol(format!(
                "export names must be a tuple, got {}",
                other.type_name()
            ))),
        }
    }

    /// Fail every pending call and refuse new ones.
    pub fn shutdown(&self, reason: &str) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("[{}] Shutting down: {}", self.config.name, reason);
        let ids: Vec<CallId> = self.pending.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            if let Some((_, pending)) = self.pending.remove(&id) {
                debug!("[{}] {} {:?} -> {:?}", self.config.name, id, pending.state, CallState::Failed);
                let _ = pending.reply.send(Err(RpcError::transport(reason)));
            }
        }
    }

    pub async fn close(&self) -> Result<(), RpcError> {
        self.shutdown("closed locally");
        self.transport.close().await?;
        Ok(())
    }
}

#[async_trait]
impl Invoker for Dispatcher {
    async fn invoke(&self, target: ReferenceId, op: Operation) -> Result<Value, RpcError> {
        let id = self.call_ids.allocate();
        debug!("[{}] {} {} on {}", self.config.name, id, op.name(), target);
        let msg = request::encode(&self.codec, id, target, op)?;
        let result = self.round_trip(msg).await?;
        self.codec.unwrap(&result)
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("name", &self.config.name)
            .field("session", &self.codec.session())
            .field("pending", &self.pending.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
