//! Core of chainrpc: type descriptors, the message codec, invocation chains,
//! the dispatcher and the wire protocol.

pub mod codec;
pub mod dispatch;
pub mod error;
pub mod ids;
pub mod invocation;
pub mod protocol;
pub mod types;
pub mod value;

pub use codec::{CodecError, CodecOptions, MessageCodec};
pub use dispatch::{DispatchError, Dispatcher, Service, ServiceError, ServiceFactory, Step};
pub use error::{ErrorCode, RpcError};
pub use ids::TypeId;
pub use invocation::{Invocation, InvocationError, InvocationResult};
pub use protocol::{
    decode_chain, decode_request, decode_result, encode_request, encode_request_bytes,
    encode_result, ResponseStatus, RpcResponse,
};
pub use types::{
    EnumDescriptor, InterfaceDescriptor, MessageDescriptor, MethodDescriptor, PrimitiveKind,
    TypeDescriptor, TypeError, TypeKind, TypeRef, TypeRegistry,
};
pub use value::{FromValue, IntoValue, Message, Value, ValueError};

pub use async_trait::async_trait;
