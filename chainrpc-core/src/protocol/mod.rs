// Wire protocol for invocation chains.
// A request is a JSON object whose keys are method names in call order and
// whose values map argument names to serialized arguments. A response is a
// status envelope carrying a result, a declared exception or an error.

pub mod request;
pub mod response;

#[cfg(test)]
mod tests;

pub use request::*;
pub use response::*;

use crate::error::{ErrorCode, RpcError};
use serde_json::json;

/// Protocol error attributed to a position in the chain, e.g. `calc.sum`.
pub(crate) fn error_at(code: ErrorCode, path: &str, message: impl std::fmt::Display) -> RpcError {
    RpcError::with_data(code, message.to_string(), json!({ "path": path }))
}
