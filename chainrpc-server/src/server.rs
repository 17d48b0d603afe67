use bytes::Bytes;
use chainrpc_core::{
    decode_chain, encode_result, Dispatcher, RpcError, RpcResponse, ServiceFactory, TypeId,
    TypeRegistry,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, trace, warn};

const INTERNAL_ERROR_BODY: &[u8] =
    br#"{"status":"error","result":{"code":"internal","message":"Internal server error"}}"#;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Transport-independent request handler.
///
/// Decodes a chain against the root interface, replays it on a fresh root
/// service and encodes the outcome. Never fails: every problem becomes an
/// `error` envelope.
pub struct RpcServer {
    root: TypeId,
    factory: Arc<dyn ServiceFactory>,
    dispatcher: Dispatcher,
}

impl RpcServer {
    pub fn new(registry: Arc<TypeRegistry>, root: TypeId, factory: Arc<dyn ServiceFactory>) -> Self {
        RpcServer {
            root,
            factory,
            dispatcher: Dispatcher::new(registry),
        }
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        self.dispatcher.registry()
    }

    pub fn root(&self) -> TypeId {
        self.root
    }

    pub async fn handle(&self, body: &[u8]) -> RpcResponse {
        trace!(body = %String::from_utf8_lossy(body), "Incoming request");
        let registry = self.dispatcher.registry();

        let invocation = match decode_chain(body, self.root, registry) {
            Ok(invocation) => invocation,
            Err(err) => {
                warn!(code = %err.code, message = %err.message, "Rejected request");
                return RpcResponse::error(err);
            }
        };

        let service = self.factory.create();
        let result = match self.dispatcher.dispatch(&invocation, service).await {
            Ok(result) => result,
            Err(err) => {
                error!(chain = %invocation, error = %err, "Unrecoverable dispatch failure");
                return RpcResponse::error(RpcError::internal("Internal server error"));
            }
        };

        match encode_result(&result, &invocation, registry) {
            Ok(response) => {
                debug!(chain = %invocation, status = ?response.status, "Handled request");
                response
            }
            Err(err) => {
                error!(chain = %invocation, error = %err, "Failed to encode result");
                RpcResponse::error(RpcError::internal("Internal server error"))
            }
        }
    }

    /// [`RpcServer::handle`] plus the HTTP status and serialized body.
    pub async fn handle_bytes(&self, body: &[u8]) -> (u16, Bytes) {
        let response = self.handle(body).await;
        let status = response.http_status();
        match response.to_bytes() {
            Ok(bytes) => (status, bytes),
            Err(err) => {
                error!(error = %err, "Failed to serialize response");
                (500, Bytes::from_static(INTERNAL_ERROR_BODY))
            }
        }
    }
}
