use crate::error::ClientError;
use crate::proxy::{ClientProxy, InvocationHandler};
use async_trait::async_trait;
use chainrpc_core::{Dispatcher, Invocation, InvocationResult, ServiceFactory, TypeId};
use std::sync::Arc;

/// Dispatches chains in-process, without encoding them.
pub struct LocalHandler {
    dispatcher: Dispatcher,
    factory: Arc<dyn ServiceFactory>,
}

impl LocalHandler {
    pub fn new(dispatcher: Dispatcher, factory: Arc<dyn ServiceFactory>) -> Self {
        LocalHandler {
            dispatcher,
            factory,
        }
    }

    pub fn proxy(self, root: TypeId) -> ClientProxy {
        let registry = Arc::clone(self.dispatcher.registry());
        ClientProxy::new(registry, root, Arc::new(self))
    }
}

#[async_trait]
impl InvocationHandler for LocalHandler {
    async fn handle(&self, invocation: Invocation) -> Result<InvocationResult, ClientError> {
        let service = self.factory.create();
        Ok(self.dispatcher.dispatch(&invocation, service).await?)
    }
}
