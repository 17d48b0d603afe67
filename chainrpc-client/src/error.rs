use chainrpc_core::{DispatchError, InvocationError, Message, RpcError, TypeError, ValueError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Method not found: {interface}.{method}")]
    MethodNotFound { interface: String, method: String },
    #[error("{method} is not a {expected} method")]
    WrongMethodKind {
        method: String,
        expected: &'static str,
    },
    /// A declared application exception raised by the service.
    #[error("Remote exception: {0}")]
    Exception(Message),
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),
    #[error("Empty response from server")]
    EmptyResponse,
    #[error("Transport error: {0:#}")]
    Transport(#[from] anyhow::Error),
    #[error(transparent)]
    Invocation(#[from] InvocationError),
    #[error(transparent)]
    Type(#[from] TypeError),
    #[error(transparent)]
    Value(#[from] ValueError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl ClientError {
    /// The raised exception, if this error carries one.
    pub fn exception(&self) -> Option<&Message> {
        match self {
            ClientError::Exception(exc) => Some(exc),
            _ => None,
        }
    }
}
