//! chainrpc demo server
//!
//! Serves an `App` root interface with a chained `Calc` interface:
//! `POST /rpc {"calc": {}, "sum": {"i0": 10, "i1": 11}}`.

use anyhow::Result;
use async_trait::async_trait;
use chainrpc_core::{
    InterfaceDescriptor, Message, MessageDescriptor, MethodDescriptor, Service, ServiceError, Step,
    TypeId, TypeRef, TypeRegistry, Value,
};
use chainrpc_server::{init_logging, HttpServer, RpcServer, ServerConfig};
use std::sync::Arc;
use tracing::{error, info};

struct AppService {
    exc: TypeId,
}

#[async_trait]
impl Service for AppService {
    async fn invoke(&self, method: &MethodDescriptor, _args: Vec<Value>) -> Result<Step, ServiceError> {
        match method.name() {
            "calc" => Ok(Step::chain(CalcService { exc: self.exc })),
            other => Err(anyhow::anyhow!("Unknown method: {}", other).into()),
        }
    }
}

struct CalcService {
    exc: TypeId,
}

#[async_trait]
impl Service for CalcService {
    async fn invoke(&self, method: &MethodDescriptor, args: Vec<Value>) -> Result<Step, ServiceError> {
        let a = args.first().and_then(Value::as_i64).unwrap_or_default();
        let b = args.get(1).and_then(Value::as_i64).unwrap_or_default();
        let result = match method.name() {
            "sum" => a.checked_add(b),
            "product" => a.checked_mul(b),
            other => return Err(anyhow::anyhow!("Unknown method: {}", other).into()),
        };
        match result.and_then(|n| i32::try_from(n).ok()) {
            Some(n) => Ok(Step::value(n)),
            None => Err(ServiceError::raise(
                Message::new(self.exc).with("message", format!("{} overflowed", method.name())),
            )),
        }
    }
}

fn contract() -> Result<(TypeRegistry, TypeId, TypeId)> {
    let registry = TypeRegistry::new();
    registry.register_message(
        MessageDescriptor::builder("AppException")
            .field("message", TypeRef::STRING)
            .build(),
    )?;
    registry.register_interface(
        InterfaceDescriptor::builder("App")
            .exc(TypeRef::named("AppException"))
            .method("calc", &[], TypeRef::named("Calc"))
            .build(),
    )?;
    registry.register_interface(
        InterfaceDescriptor::builder("Calc")
            .method("sum", &[("i0", TypeRef::INT32), ("i1", TypeRef::INT32)], TypeRef::INT32)
            .method("product", &[("i0", TypeRef::INT32), ("i1", TypeRef::INT32)], TypeRef::INT32)
            .build(),
    )?;
    registry.link()?;

    let root = registry.resolve("App")?;
    let exc = registry.resolve("AppException")?;
    Ok((registry, root, exc))
}

#[tokio::main]
async fn main() -> Result<()> {
    let log_dir = std::env::var("CHAINRPC_LOG_DIR").unwrap_or_else(|_| "logs".to_string());
    let _log_guard = init_logging(&log_dir, "chainrpc-server")?;

    let (registry, root, exc) = contract()?;
    let factory = move || -> Arc<dyn Service> { Arc::new(AppService { exc }) };
    let rpc = RpcServer::new(Arc::new(registry), root, Arc::new(factory));

    let mut config = ServerConfig::default();
    if let Ok(port) = std::env::var("CHAINRPC_PORT") {
        config.port = port.parse()?;
    }

    info!("Starting chainrpc server");
    if let Err(e) = HttpServer::new(config, rpc).run().await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}
