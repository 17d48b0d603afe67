// HTTP client for chainrpc.
// Each remote call is one POST carrying the whole recorded chain; the reply is
// a status envelope decoded against the tail method's result or exception type.

use crate::error::ClientError;
use crate::proxy::{ClientProxy, InvocationHandler};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use bytes::Bytes;
use chainrpc_core::{
    decode_result, encode_request_bytes, Invocation, InvocationResult, RpcResponse, TypeId,
    TypeRegistry,
};
use reqwest::Client as HttpClient;
use std::sync::Arc;
use tracing::{debug, trace};

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Endpoint accepting chained calls
    pub url: String,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080/rpc".to_string(),
            timeout_ms: 30000,
        }
    }
}

/// Moves one encoded request to the server and returns the raw reply body.
#[async_trait]
pub trait RpcSender: Send + Sync {
    async fn send(&self, body: Bytes) -> Result<Bytes, ClientError>;
}

/// [`RpcSender`] over HTTP POST.
pub struct HttpSender {
    config: ClientConfig,
    http_client: HttpClient,
}

impl HttpSender {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http_client = HttpClient::builder()
            .timeout(std::time::Duration::from_millis(config.timeout_ms))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn new_with_url(url: &str) -> Result<Self, ClientError> {
        Self::new(ClientConfig {
            url: url.to_string(),
            ..Default::default()
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

#[async_trait]
impl RpcSender for HttpSender {
    async fn send(&self, body: Bytes) -> Result<Bytes, ClientError> {
        debug!(url = %self.config.url, bytes = body.len(), "Sending request");

        let response = self
            .http_client
            .post(&self.config.url)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .context("Failed to read response body")?;
        trace!(status = %status, bytes = bytes.len(), "Received response");

        // Error envelopes arrive with non-2xx codes; only a bare failure is a transport error.
        if !status.is_success() && bytes.is_empty() {
            return Err(ClientError::Transport(anyhow!("HTTP {}", status)));
        }
        Ok(bytes)
    }
}

/// Sends finished chains through an [`RpcSender`] and decodes the replies.
pub struct RpcClient<S> {
    registry: Arc<TypeRegistry>,
    sender: S,
}

impl RpcClient<HttpSender> {
    pub fn http(registry: Arc<TypeRegistry>, config: ClientConfig) -> Result<Self, ClientError> {
        Ok(RpcClient::new(registry, HttpSender::new(config)?))
    }
}

impl<S: RpcSender + 'static> RpcClient<S> {
    pub fn new(registry: Arc<TypeRegistry>, sender: S) -> Self {
        RpcClient { registry, sender }
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn sender(&self) -> &S {
        &self.sender
    }

    /// A proxy for `root` whose remote calls go through this client.
    pub fn proxy(self, root: TypeId) -> ClientProxy {
        let registry = Arc::clone(&self.registry);
        ClientProxy::new(registry, root, Arc::new(self))
    }
}

#[async_trait]
impl<S: RpcSender> InvocationHandler for RpcClient<S> {
    async fn handle(&self, invocation: Invocation) -> Result<InvocationResult, ClientError> {
        let body = encode_request_bytes(&invocation, &self.registry)?;
        debug!(chain = %invocation, "Invoking remote chain");

        let reply = self.sender.send(body).await?;
        if reply.is_empty() {
            return Err(ClientError::EmptyResponse);
        }

        let response = RpcResponse::from_bytes(&reply)
            .map_err(|err| anyhow!(err.message))
            .context("Malformed response from server")?;
        Ok(decode_result(response, &invocation, &self.registry)?)
    }
}
