use crate::codec::MessageCodec;
use crate::error::RpcError;
use crate::invocation::{Invocation, InvocationResult};
use crate::types::TypeRegistry;
use crate::value::Value;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Ok,
    Exception,
    Error,
}

/// Response envelope: `{"status": ..., "result": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub status: ResponseStatus,
    #[serde(default)]
    pub result: JsonValue,
}

impl RpcResponse {
    pub fn ok(result: JsonValue) -> Self {
        RpcResponse {
            status: ResponseStatus::Ok,
            result,
        }
    }

    pub fn exception(result: JsonValue) -> Self {
        RpcResponse {
            status: ResponseStatus::Exception,
            result,
        }
    }

    pub fn error(err: RpcError) -> Self {
        let mut result = Map::new();
        result.insert("code".to_string(), JsonValue::String(err.code.to_string()));
        result.insert("message".to_string(), JsonValue::String(err.message));
        if let Some(data) = err.data {
            result.insert("data".to_string(), data);
        }
        RpcResponse {
            status: ResponseStatus::Error,
            result: JsonValue::Object(result),
        }
    }

    /// The carried protocol error, for `error` responses.
    pub fn rpc_error(&self) -> Option<RpcError> {
        match self.status {
            ResponseStatus::Error => serde_json::from_value(self.result.clone()).ok(),
            _ => None,
        }
    }

    /// `ok` and `exception` are both successful exchanges.
    pub fn http_status(&self) -> u16 {
        match self.status {
            ResponseStatus::Ok | ResponseStatus::Exception => 200,
            ResponseStatus::Error => self.rpc_error().map(|e| e.http_status()).unwrap_or(500),
        }
    }

    pub fn to_bytes(&self) -> Result<Bytes, RpcError> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, RpcError> {
        if data.is_empty() {
            return Err(RpcError::bad_request("Empty response body"));
        }
        Ok(serde_json::from_slice(data)?)
    }
}

/// Serializes a dispatch outcome against the tail's result or exception type.
pub fn encode_result(
    result: &InvocationResult,
    invocation: &Invocation,
    registry: &TypeRegistry,
) -> Result<RpcResponse, RpcError> {
    let codec = MessageCodec::new(registry);
    match result {
        InvocationResult::Success(value) => {
            let ty = invocation
                .result()
                .ok_or_else(|| RpcError::internal("Cannot encode a result for the root invocation"))?;
            let json = codec
                .serialize(value, ty)
                .map_err(|e| RpcError::internal(format!("Cannot serialize result of {}: {}", invocation, e)))?;
            Ok(RpcResponse::ok(json))
        }
        InvocationResult::Fault(exc) => {
            let ty = invocation
                .exc()
                .ok_or_else(|| RpcError::internal(format!("{} declares no exception", invocation)))?;
            let json = codec
                .serialize(&Value::Message(exc.clone()), ty)
                .map_err(|e| RpcError::internal(format!("Cannot serialize exception of {}: {}", invocation, e)))?;
            Ok(RpcResponse::exception(json))
        }
    }
}

/// Client side of [`encode_result`]; `error` responses come back as `Err`.
pub fn decode_result(
    response: RpcResponse,
    invocation: &Invocation,
    registry: &TypeRegistry,
) -> Result<InvocationResult, RpcError> {
    let codec = MessageCodec::new(registry);
    match response.status {
        ResponseStatus::Ok => {
            let ty = invocation
                .result()
                .ok_or_else(|| RpcError::internal("Received a result for the root invocation"))?;
            codec
                .parse(&response.result, ty)
                .map(InvocationResult::Success)
                .map_err(|e| RpcError::internal(format!("Cannot parse result of {}: {}", invocation, e)))
        }
        ResponseStatus::Exception => {
            let ty = invocation
                .exc()
                .ok_or_else(|| RpcError::internal(format!("{} declares no exception", invocation)))?;
            let value = codec
                .parse(&response.result, ty)
                .map_err(|e| RpcError::internal(format!("Cannot parse exception of {}: {}", invocation, e)))?;
            value
                .into_message()
                .map(InvocationResult::Fault)
                .ok_or_else(|| RpcError::internal("Exception response carries no exception"))
        }
        ResponseStatus::Error => Err(response
            .rpc_error()
            .unwrap_or_else(|| RpcError::internal(format!("Malformed error response: {}", response.result)))),
    }
}
