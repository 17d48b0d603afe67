use async_trait::async_trait;
use bytes::Bytes;
use chainrpc_client::{ClientError, RpcSender};
use chainrpc_server::RpcServer;
use std::sync::{Arc, Mutex};
use tracing::trace;

/// Sender that hands request bodies straight to an in-process [`RpcServer`]
/// and keeps a copy of every body it sent.
#[derive(Clone)]
pub struct LoopbackSender {
    server: Arc<RpcServer>,
    sent: Arc<Mutex<Vec<Bytes>>>,
}

impl LoopbackSender {
    pub fn new(server: Arc<RpcServer>) -> Self {
        LoopbackSender {
            server,
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Request bodies in the order they were sent.
    pub fn sent(&self) -> Vec<Bytes> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    pub fn send_count(&self) -> usize {
        self.sent.lock().map(|sent| sent.len()).unwrap_or_default()
    }
}

#[async_trait]
impl RpcSender for LoopbackSender {
    async fn send(&self, body: Bytes) -> Result<Bytes, ClientError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(body.clone());
        }
        let (status, reply) = self.server.handle_bytes(&body).await;
        trace!(status, bytes = reply.len(), "Loopback reply");
        Ok(reply)
    }
}
