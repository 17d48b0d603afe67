use crate::error::ClientError;
use async_trait::async_trait;
use chainrpc_core::{
    FromValue, Invocation, InvocationResult, MethodDescriptor, TypeId, TypeRegistry, Value,
};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Receives a finished chain and produces its outcome, usually over the wire.
#[async_trait]
pub trait InvocationHandler: Send + Sync {
    async fn handle(&self, invocation: Invocation) -> Result<InvocationResult, ClientError>;
}

/// Local stand-in for a remote interface.
///
/// [`ClientProxy::chain`] calls chaining methods and only records them.
/// [`ClientProxy::invoke`] calls a remote method, handing the whole chain
/// to the handler in a single round trip.
#[derive(Clone)]
pub struct ClientProxy {
    registry: Arc<TypeRegistry>,
    interface: TypeId,
    handler: Arc<dyn InvocationHandler>,
    parent: Invocation,
}

impl ClientProxy {
    pub fn new(
        registry: Arc<TypeRegistry>,
        interface: TypeId,
        handler: Arc<dyn InvocationHandler>,
    ) -> Self {
        ClientProxy {
            registry,
            interface,
            handler,
            parent: Invocation::root(),
        }
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn interface(&self) -> TypeId {
        self.interface
    }

    /// The chain recorded so far.
    pub fn invocation(&self) -> &Invocation {
        &self.parent
    }

    /// Records a chaining call and returns a proxy for the interface it yields.
    pub fn chain(&self, name: &str, args: Vec<Value>) -> Result<ClientProxy, ClientError> {
        let method = self.method(name)?;
        if method.is_remote() {
            return Err(ClientError::WrongMethodKind {
                method: name.to_string(),
                expected: "chaining",
            });
        }

        let invocation = self.parent.next(Arc::clone(&method), args)?;
        trace!(chain = %invocation, "Recorded chaining call");
        Ok(ClientProxy {
            registry: Arc::clone(&self.registry),
            interface: method.result(),
            handler: Arc::clone(&self.handler),
            parent: invocation,
        })
    }

    /// Calls a remote method, sending the recorded chain.
    ///
    /// A declared exception comes back as [`ClientError::Exception`].
    pub async fn invoke(&self, name: &str, args: Vec<Value>) -> Result<Value, ClientError> {
        let method = self.method(name)?;
        if !method.is_remote() {
            return Err(ClientError::WrongMethodKind {
                method: name.to_string(),
                expected: "remote",
            });
        }

        let invocation = self.parent.next(method, args)?;
        match self.handler.handle(invocation).await? {
            InvocationResult::Success(value) => Ok(value),
            InvocationResult::Fault(exc) => Err(ClientError::Exception(exc)),
        }
    }

    pub async fn invoke_as<T: FromValue>(&self, name: &str, args: Vec<Value>) -> Result<T, ClientError> {
        let value = self.invoke(name, args).await?;
        Ok(T::from_value(value)?)
    }

    fn method(&self, name: &str) -> Result<Arc<MethodDescriptor>, ClientError> {
        self.registry
            .find_method(self.interface, name)?
            .ok_or_else(|| ClientError::MethodNotFound {
                interface: self.registry.type_name(self.interface),
                method: name.to_string(),
            })
    }
}

impl PartialEq for ClientProxy {
    fn eq(&self, other: &Self) -> bool {
        self.interface == other.interface && self.parent == other.parent
    }
}

impl fmt::Debug for ClientProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientProxy({}", self.registry.type_name(self.interface))?;
        if !self.parent.is_root() {
            write!(f, ", {}", self.parent)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use chainrpc_core::{InterfaceDescriptor, InvocationError, Message, MessageDescriptor, TypeRef};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        calls: AtomicUsize,
        last: Mutex<Option<Invocation>>,
        fault: Option<Message>,
    }

    #[async_trait]
    impl InvocationHandler for Recording {
        async fn handle(&self, invocation: Invocation) -> Result<InvocationResult, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(invocation);
            Ok(match &self.fault {
                Some(exc) => InvocationResult::Fault(exc.clone()),
                None => InvocationResult::Success(Value::Int32(21)),
            })
        }
    }

    fn registry() -> Arc<TypeRegistry> {
        let registry = TypeRegistry::new();
        registry
            .register_message(MessageDescriptor::builder("AppError").build())
            .unwrap();
        registry
            .register_interface(
                InterfaceDescriptor::builder("App")
                    .exc(TypeRef::named("AppError"))
                    .method("calc", &[], TypeRef::named("Calc"))
                    .build(),
            )
            .unwrap();
        registry
            .register_interface(
                InterfaceDescriptor::builder("Calc")
                    .method("sum", &[("i0", TypeRef::INT32), ("i1", TypeRef::INT32)], TypeRef::INT32)
                    .method("scaled", &[("factor", TypeRef::INT32)], TypeRef::named("Calc"))
                    .build(),
            )
            .unwrap();
        registry.link().unwrap();
        Arc::new(registry)
    }

    fn proxy(handler: Arc<Recording>) -> ClientProxy {
        let registry = registry();
        let app = registry.resolve("App").unwrap();
        ClientProxy::new(registry, app, handler)
    }

    #[test]
    fn test_chaining_calls_never_reach_handler() {
        let handler = Arc::new(Recording::default());
        let app = proxy(Arc::clone(&handler));

        let calc = app.chain("calc", args![]).unwrap();
        let scaled = calc.chain("scaled", args![2]).unwrap().chain("scaled", args![3]).unwrap();

        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
        assert_eq!(scaled.invocation().len(), 3);
        assert_eq!(
            format!("{:?}", scaled),
            "ClientProxy(Calc, calc().scaled(2).scaled(3))"
        );
        assert_eq!(format!("{:?}", app), "ClientProxy(App)");
    }

    #[tokio::test]
    async fn test_invoke_hands_over_full_chain() {
        let handler = Arc::new(Recording::default());
        let app = proxy(Arc::clone(&handler));

        let result: i32 = app
            .chain("calc", args![])
            .unwrap()
            .invoke_as("sum", args![10, 11])
            .await
            .unwrap();
        assert_eq!(result, 21);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);

        let last = handler.last.lock().unwrap().clone().unwrap();
        assert_eq!(last.to_string(), "calc().sum(10, 11)");
    }

    #[tokio::test]
    async fn test_fault_becomes_exception() {
        let registry = registry();
        let app_error = registry.resolve("AppError").unwrap();
        let handler = Arc::new(Recording {
            fault: Some(Message::new(app_error)),
            ..Default::default()
        });
        let app = ClientProxy::new(Arc::clone(&registry), registry.resolve("App").unwrap(), handler);

        let err = app
            .chain("calc", args![])
            .unwrap()
            .invoke("sum", args![1, 2])
            .await
            .unwrap_err();
        assert_eq!(err.exception().map(|e| e.type_id()), Some(app_error));
    }

    #[tokio::test]
    async fn test_method_errors() {
        let handler = Arc::new(Recording::default());
        let app = proxy(Arc::clone(&handler));

        assert!(matches!(
            app.chain("nope", args![]),
            Err(ClientError::MethodNotFound { ref interface, .. }) if interface == "App"
        ));
        assert!(matches!(
            app.invoke("calc", args![]).await,
            Err(ClientError::WrongMethodKind { expected: "remote", .. })
        ));

        let calc = app.chain("calc", args![]).unwrap();
        assert!(matches!(
            calc.chain("sum", args![1, 2]),
            Err(ClientError::WrongMethodKind { expected: "chaining", .. })
        ));
        assert!(matches!(
            calc.invoke("sum", args![1]).await,
            Err(ClientError::Invocation(InvocationError::ArgumentCount { expected: 2, actual: 1, .. }))
        ));
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_proxy_equality_is_structural() {
        let handler = Arc::new(Recording::default());
        let app = proxy(handler);

        let a = app.chain("calc", args![]).unwrap().chain("scaled", args![2]).unwrap();
        let b = app.chain("calc", args![]).unwrap().chain("scaled", args![2]).unwrap();
        let c = app.chain("calc", args![]).unwrap().chain("scaled", args![5]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
