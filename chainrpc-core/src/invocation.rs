use crate::ids::TypeId;
use crate::types::MethodDescriptor;
use crate::value::{Message, Value};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvocationError {
    #[error("Wrong number of arguments for {method}: expected {expected}, got {actual}")]
    ArgumentCount {
        method: String,
        expected: usize,
        actual: usize,
    },
    #[error("Cannot call {method} after remote method {terminal}")]
    AfterRemote { method: String, terminal: String },
}

struct Node {
    method: Option<Arc<MethodDescriptor>>,
    args: Vec<Value>,
    parent: Option<Invocation>,
}

/// One link of a call chain.
///
/// Invocations are immutable and cheap to clone; each holds its parent, so
/// a tail invocation carries the whole chain back to the root sentinel.
#[derive(Clone)]
pub struct Invocation(Arc<Node>);

impl Invocation {
    /// The sentinel every chain starts from.
    pub fn root() -> Self {
        Invocation(Arc::new(Node {
            method: None,
            args: Vec::new(),
            parent: None,
        }))
    }

    /// Appends a call to this chain.
    pub fn next(
        &self,
        method: Arc<MethodDescriptor>,
        args: Vec<Value>,
    ) -> Result<Invocation, InvocationError> {
        if args.len() != method.args().len() {
            return Err(InvocationError::ArgumentCount {
                method: method.name().to_string(),
                expected: method.args().len(),
                actual: args.len(),
            });
        }
        if let Some(terminal) = self.method().filter(|m| m.is_remote()) {
            return Err(InvocationError::AfterRemote {
                method: method.name().to_string(),
                terminal: terminal.name().to_string(),
            });
        }

        Ok(Invocation(Arc::new(Node {
            method: Some(method),
            args,
            parent: Some(self.clone()),
        })))
    }

    pub fn is_root(&self) -> bool {
        self.0.method.is_none()
    }

    /// True if this link calls a remote method, which ends the chain.
    pub fn is_remote(&self) -> bool {
        self.0.method.as_ref().is_some_and(|m| m.is_remote())
    }

    pub fn method(&self) -> Option<&Arc<MethodDescriptor>> {
        self.0.method.as_ref()
    }

    pub fn args(&self) -> &[Value] {
        &self.0.args
    }

    pub fn parent(&self) -> Option<&Invocation> {
        self.0.parent.as_ref()
    }

    pub fn result(&self) -> Option<TypeId> {
        self.0.method.as_ref().map(|m| m.result())
    }

    /// Exception declared by this link's interface, or the nearest one up the chain.
    pub fn exc(&self) -> Option<TypeId> {
        let mut current = Some(self);
        while let Some(invocation) = current {
            if let Some(exc) = invocation.method().and_then(|m| m.exc()) {
                return Some(exc);
            }
            current = invocation.parent();
        }
        None
    }

    /// Links from the first call after the root to this one.
    pub fn to_chain(&self) -> Vec<Invocation> {
        let mut chain = Vec::new();
        let mut current = Some(self);
        while let Some(invocation) = current {
            if !invocation.is_root() {
                chain.push(invocation.clone());
            }
            current = invocation.parent();
        }
        chain.reverse();
        chain
    }

    /// Number of calls in the chain.
    pub fn len(&self) -> usize {
        let mut len = 0;
        let mut current = Some(self);
        while let Some(invocation) = current {
            if !invocation.is_root() {
                len += 1;
            }
            current = invocation.parent();
        }
        len
    }

    pub fn is_empty(&self) -> bool {
        self.is_root()
    }
}

impl PartialEq for Invocation {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        let same_method = match (&self.0.method, &other.0.method) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        same_method && self.0.args == other.0.args && self.0.parent == other.0.parent
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, link) in self.to_chain().iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            let name = link.method().map(|m| m.name()).unwrap_or_default();
            write!(f, "{}(", name)?;
            for (j, arg) in link.args().iter().enumerate() {
                if j > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", arg)?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "Invocation(<root>)")
        } else {
            write!(f, "Invocation({})", self)
        }
    }
}

/// Outcome of dispatching a chain.
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationResult {
    Success(Value),
    /// A declared application exception.
    Fault(Message),
}

impl InvocationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, InvocationResult::Success(_))
    }

    pub fn into_result(self) -> Result<Value, Message> {
        match self {
            InvocationResult::Success(value) => Ok(value),
            InvocationResult::Fault(exc) => Err(exc),
        }
    }
}
