pub mod client;
pub mod error;
pub mod local;
pub mod macros;
pub mod proxy;

pub use client::{ClientConfig, HttpSender, RpcClient, RpcSender};
pub use error::ClientError;
pub use local::LocalHandler;
pub use proxy::{ClientProxy, InvocationHandler};

pub use chainrpc_core::{FromValue, IntoValue, Message, Value};
