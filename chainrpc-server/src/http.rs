use crate::server::{RpcServer, ServerError};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Path accepting POSTed call chains
    pub rpc_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            rpc_path: "/rpc".to_string(),
        }
    }
}

/// Router with the chain endpoint at `rpc_path` and `GET /health`.
pub fn router(server: Arc<RpcServer>, rpc_path: &str) -> Router {
    let endpoints = serde_json::json!({
        "rpc": rpc_path,
        "health": "/health",
    });

    Router::new()
        .route(rpc_path, post(handle_rpc))
        .route(
            "/health",
            get(move || {
                let endpoints = endpoints.clone();
                async move {
                    Json(serde_json::json!({
                        "status": "healthy",
                        "server": "chainrpc",
                        "endpoints": endpoints,
                    }))
                }
            }),
        )
        .with_state(server)
}

async fn handle_rpc(State(server): State<Arc<RpcServer>>, body: Bytes) -> impl IntoResponse {
    tracing::debug!(bytes = body.len(), "Incoming RPC request");
    let (status, body) = server.handle_bytes(&body).await;
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, [(header::CONTENT_TYPE, "application/json")], body)
}

pub struct HttpServer {
    config: ServerConfig,
    server: Arc<RpcServer>,
}

impl HttpServer {
    pub fn new(config: ServerConfig, server: RpcServer) -> Self {
        HttpServer {
            config,
            server: Arc::new(server),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn router(&self) -> Router {
        router(Arc::clone(&self.server), &self.config.rpc_path)
    }

    /// Binds `host:port` and serves until the process stops.
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        self.serve(listener).await
    }

    /// Serves on an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        info!("Server listening on {}", addr);
        info!("  RPC endpoint: http://{}{}", addr, self.config.rpc_path);
        info!("  Health endpoint: http://{}/health", addr);

        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use chainrpc_core::{
        InterfaceDescriptor, MethodDescriptor, Service, ServiceError, Step, TypeRef, TypeRegistry,
        Value,
    };
    use tower::ServiceExt;

    struct Echo;

    #[async_trait]
    impl Service for Echo {
        async fn invoke(&self, _method: &MethodDescriptor, args: Vec<Value>) -> Result<Step, ServiceError> {
            Ok(Step::Return(args.into_iter().next().unwrap_or_default()))
        }
    }

    fn http_server(config: ServerConfig) -> HttpServer {
        let registry = TypeRegistry::new();
        registry
            .register_interface(
                InterfaceDescriptor::builder("Echo")
                    .method("echo", &[("text", TypeRef::STRING)], TypeRef::STRING)
                    .build(),
            )
            .unwrap();
        registry.link().unwrap();
        let root = registry.resolve("Echo").unwrap();
        let factory = || -> Arc<dyn Service> { Arc::new(Echo) };
        HttpServer::new(config, RpcServer::new(Arc::new(registry), root, Arc::new(factory)))
    }

    async fn post(router: Router, uri: &str, body: &'static str) -> (StatusCode, String) {
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("Content-Type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.rpc_path, "/rpc");
    }

    #[tokio::test]
    async fn test_rpc_endpoint() {
        let server = http_server(ServerConfig::default());
        let (status, body) = post(server.router(), "/rpc", r#"{"echo":{"text":"hi"}}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"status":"ok","result":"hi"}"#);
    }

    #[tokio::test]
    async fn test_error_status_codes() {
        let server = http_server(ServerConfig::default());

        let (status, _) = post(server.router(), "/rpc", "{").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = post(server.router(), "/rpc", r#"{"shout":{}}"#).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains(r#""code":"not_found""#));
    }

    #[tokio::test]
    async fn test_custom_rpc_path_and_health() {
        let server = http_server(ServerConfig {
            rpc_path: "/api/chain".to_string(),
            ..Default::default()
        });

        let (status, _) = post(server.router(), "/api/chain", r#"{"echo":{"text":"x"}}"#).await;
        assert_eq!(status, StatusCode::OK);

        let response = server
            .router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let health: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["endpoints"]["rpc"], "/api/chain");
    }
}
