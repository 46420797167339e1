//! Translation between proxy operations and request messages, and execution
//! of received requests against local objects.

use ferry_core::{
    Args, CallId, ExportTable, Message, Operation, ReferenceId, RpcError, Value, ValueCodec,
};
use tracing::trace;

/// A decoded inbound request.
#[derive(Debug)]
pub enum Request {
    Operation { target: ReferenceId, op: Operation },
    GetExport(String),
    GetExportNames,
}

/// Render `op` on `target` as a request message.
///
/// Operations without a message of their own travel as the dunder method the
/// owner would run for them anyway.
pub fn encode(
    codec: &ValueCodec,
    id: CallId,
    target: ReferenceId,
    op: Operation,
) -> Result<Message, RpcError> {
    let msg = match op {
        Operation::GetAttr(name) => Message::GetAttr { id, target, name },
        Operation::SetAttr(name, value) => Message::SetAttr {
            id,
            target,
            name,
            value: codec.wrap(&value)?,
        },
        Operation::Call(args) => {
            let (args, kwargs) = codec.wrap_args(&args)?;
            Message::Call {
                id,
                target,
                args,
                kwargs,
            }
        }
        Operation::CallMethod(method, args) => method_call(codec, id, target, method, &args)?,
        Operation::Len => method_call(codec, id, target, "__len__".into(), &Args::empty())?,
        Operation::GetItem(key) => {
            method_call(codec, id, target, "__getitem__".into(), &Args::new(vec![key]))?
        }
        Operation::Iterate => method_call(codec, id, target, "__iter__".into(), &Args::empty())?,
        Operation::GetClass => Message::GetAttr {
            id,
            target,
            name: "__class__".into(),
        },
        Operation::Instantiate(args) => {
            let (args, kwargs) = codec.wrap_args(&args)?;
            Message::Instantiate {
                id,
                class: target,
                args,
                kwargs,
            }
        }
    };
    Ok(msg)
}

fn method_call(
    codec: &ValueCodec,
    id: CallId,
    target: ReferenceId,
    method: String,
    args: &Args,
) -> Result<Message, RpcError> {
    let (args, kwargs) = codec.wrap_args(args)?;
    Ok(Message::CallMethod {
        id,
        target,
        method,
        args,
        kwargs,
    })
}

/// Unwrap a request message. Replies are not requests.
pub fn decode(codec: &ValueCodec, msg: Message) -> Result<Request, RpcError> {
    let request = match msg {
        Message::Call {
            target,
            args,
            kwargs,
            ..
        } => Request::Operation {
            target,
            op: Operation::Call(codec.unwrap_args(&args, &kwargs)?),
        },
        Message::CallMethod {
            target,
            method,
            args,
            kwargs,
            ..
        } => Request::Operation {
            target,
            op: Operation::CallMethod(method, codec.unwrap_args(&args, &kwargs)?),
        },
        Message::GetAttr { target, name, .. } if name == "__class__" => Request::Operation {
            target,
            op: Operation::GetClass,
        },
        Message::GetAttr { target, name, .. } => Request::Operation {
            target,
            op: Operation::GetAttr(name),
        },
        Message::SetAttr {
            target,
            name,
            value,
            ..
        } => Request::Operation {
            target,
            op: Operation::SetAttr(name, codec.unwrap(&value)?),
        },
        Message::Instantiate {
            class,
            args,
            kwargs,
            ..
        } => Request::Operation {
            target: class,
            op: Operation::Instantiate(codec.unwrap_args(&args, &kwargs)?),
        },
        Message::GetExport { name, .. } => Request::GetExport(name),
        Message::GetExportNames { .. } => Request::GetExportNames,
        reply @ (Message::Finished { .. } | Message::Failed { .. }) => {
            return Err(RpcError::protocol(format!(
                "{} is a reply, not a request",
                reply.tag()
            )))
        }
    };
    Ok(request)
}

/// Run a request against this side's objects and exports.
pub async fn execute(
    codec: &ValueCodec,
    exports: &ExportTable,
    request: Request,
) -> Result<Value, RpcError> {
    match request {
        Request::Operation { target, op } => {
            let object = codec.table().object_for(target)?;
            trace!("Executing {} on {}", op.name(), target);
            Value::Object(object).perform(op).await
        }
        Request::GetExport(name) => Ok(exports.get(&name)?),
        Request::GetExportNames => Ok(Value::tuple(exports.names().into_iter().map(Value::Str))),
    }
}
