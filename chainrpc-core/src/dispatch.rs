use crate::invocation::{Invocation, InvocationResult};
use crate::types::{MethodDescriptor, TypeRegistry};
use crate::value::{IntoValue, Message, Value};
use anyhow::anyhow;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// What a service produced for one link of a chain.
pub enum Step {
    /// Receiver for the next link.
    Chain(Arc<dyn Service>),
    /// Result of the terminal link.
    Return(Value),
}

impl Step {
    pub fn chain(service: impl Service + 'static) -> Self {
        Step::Chain(Arc::new(service))
    }

    pub fn value(value: impl IntoValue) -> Self {
        Step::Return(value.into_value())
    }

    fn kind(&self) -> &'static str {
        match self {
            Step::Chain(_) => "interface",
            Step::Return(_) => "value",
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Chain(_) => write!(f, "Step::Chain(..)"),
            Step::Return(value) => write!(f, "Step::Return({:?})", value),
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    /// An application exception; becomes a fault if the interface declares it.
    #[error("Raised {0}")]
    Raise(Message),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn raise(exc: Message) -> Self {
        ServiceError::Raise(exc)
    }
}

/// Server-side implementation of an interface.
///
/// `invoke` receives the linked method descriptor and its arguments in
/// declared order. Chaining methods return [`Step::Chain`], remote methods
/// return [`Step::Return`].
#[async_trait]
pub trait Service: Send + Sync {
    async fn invoke(&self, method: &MethodDescriptor, args: Vec<Value>) -> Result<Step, ServiceError>;
}

/// Creates the root service for each request.
pub trait ServiceFactory: Send + Sync {
    fn create(&self) -> Arc<dyn Service>;
}

impl<F> ServiceFactory for F
where
    F: Fn() -> Arc<dyn Service> + Send + Sync,
{
    fn create(&self) -> Arc<dyn Service> {
        self()
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Chain does not end in a remote method: {0}")]
    NotRemote(String),
    #[error("{method} returned a {found}, expected a {expected}")]
    StepMismatch {
        method: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("Unrecoverable error in {method}: {source}")]
    Unrecoverable {
        method: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Replays invocation chains against service objects.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<TypeRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Dispatcher { registry }
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Invokes each link of the chain in order, starting at `root`.
    ///
    /// A raised message that is an instance of the exception type reachable
    /// from the tail becomes [`InvocationResult::Fault`] and stops the walk.
    /// Any other failure is unrecoverable.
    pub async fn dispatch(
        &self,
        invocation: &Invocation,
        root: Arc<dyn Service>,
    ) -> Result<InvocationResult, DispatchError> {
        if !invocation.is_remote() {
            return Err(DispatchError::NotRemote(invocation.to_string()));
        }

        let exc = invocation.exc();
        let chain = invocation.to_chain();
        let last = chain.len().saturating_sub(1);
        let mut target = root;

        for (position, link) in chain.iter().enumerate() {
            let Some(method) = link.method() else {
                continue;
            };
            debug!(method = %method.name(), position, "Dispatching call");

            let step = match target.invoke(method, link.args().to_vec()).await {
                Ok(step) => step,
                Err(ServiceError::Raise(raised)) => {
                    if exc.is_some_and(|exc| self.registry.is_subtype(raised.type_id(), exc)) {
                        debug!(method = %method.name(), "Captured declared exception");
                        return Ok(InvocationResult::Fault(raised));
                    }
                    warn!(
                        method = %method.name(),
                        exception = %self.registry.type_name(raised.type_id()),
                        "Undeclared exception raised"
                    );
                    return Err(DispatchError::Unrecoverable {
                        method: method.name().to_string(),
                        source: anyhow!(
                            "undeclared exception {}",
                            self.registry.type_name(raised.type_id())
                        ),
                    });
                }
                Err(ServiceError::Internal(source)) => {
                    return Err(DispatchError::Unrecoverable {
                        method: method.name().to_string(),
                        source,
                    });
                }
            };

            let is_tail = position == last;
            match step {
                Step::Return(value) if is_tail => return Ok(InvocationResult::Success(value)),
                Step::Chain(next) if !is_tail => target = next,
                other => {
                    return Err(DispatchError::StepMismatch {
                        method: method.name().to_string(),
                        expected: if is_tail { "value" } else { "interface" },
                        found: other.kind(),
                    });
                }
            }
        }

        Err(DispatchError::NotRemote(invocation.to_string()))
    }
}
