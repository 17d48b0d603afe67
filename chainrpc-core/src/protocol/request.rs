use super::error_at;
use crate::codec::MessageCodec;
use crate::error::{ErrorCode, RpcError};
use crate::ids::TypeId;
use crate::invocation::Invocation;
use crate::types::{MethodDescriptor, TypeRegistry};
use crate::value::Value;
use bytes::Bytes;
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;
use tracing::{debug, trace};

/// Encodes a chain as a request object, one key per call.
///
/// Method names are object keys, so a chain cannot call the same method
/// twice. Null arguments are omitted.
pub fn encode_request(invocation: &Invocation, registry: &TypeRegistry) -> Result<JsonValue, RpcError> {
    let codec = MessageCodec::new(registry);
    let mut calls = Map::new();
    let mut path = String::new();

    for link in invocation.to_chain() {
        let Some(method) = link.method() else {
            continue;
        };
        push_path(&mut path, method.name());

        if calls.contains_key(method.name()) {
            return Err(error_at(
                ErrorCode::BadRequest,
                &path,
                format!("Method {} called twice in one chain", method.name()),
            ));
        }

        let mut args = Map::new();
        for (arg, value) in method.args().iter().zip(link.args()) {
            let json = codec.serialize(value, arg.ty).map_err(|e| {
                error_at(
                    ErrorCode::BadRequest,
                    &path,
                    format!("Wrong method arguments: {}: {}", arg.name, e),
                )
            })?;
            if !json.is_null() {
                args.insert(arg.name.clone(), json);
            }
        }
        calls.insert(method.name().to_string(), JsonValue::Object(args));
    }

    Ok(JsonValue::Object(calls))
}

pub fn encode_request_bytes(invocation: &Invocation, registry: &TypeRegistry) -> Result<Bytes, RpcError> {
    let json = encode_request(invocation, registry)?;
    Ok(Bytes::from(serde_json::to_vec(&json)?))
}

/// Decodes a request body against the root interface.
pub fn decode_chain(data: &[u8], root: TypeId, registry: &TypeRegistry) -> Result<Invocation, RpcError> {
    let json: JsonValue = serde_json::from_slice(data)
        .map_err(|e| RpcError::bad_request(format!("Malformed request: {}", e)))?;
    trace!(request = %json, "Decoding request");
    decode_request(&json, root, registry)
}

/// Walks the request keys in order, resolving each against the interface
/// the previous call returned.
pub fn decode_request(json: &JsonValue, root: TypeId, registry: &TypeRegistry) -> Result<Invocation, RpcError> {
    let calls = json
        .as_object()
        .ok_or_else(|| RpcError::bad_request("Request must be an object of method calls"))?;
    if calls.is_empty() {
        return Err(RpcError::bad_request("Method calls required"));
    }

    let codec = MessageCodec::new(registry);
    let mut interface = root;
    let mut invocation = Invocation::root();
    let mut path = String::new();

    for (name, raw_args) in calls {
        push_path(&mut path, name);

        if let Some(terminal) = invocation.method().filter(|m| m.is_remote()) {
            return Err(error_at(
                ErrorCode::BadRequest,
                &path,
                format!("Call after remote method {}", terminal.name()),
            ));
        }

        let method = registry
            .find_method(interface, name)
            .map_err(|e| error_at(ErrorCode::Internal, &path, e))?
            .ok_or_else(|| error_at(ErrorCode::NotFound, &path, format!("Method not found: {}", path)))?;

        let args = decode_args(&codec, &method, raw_args, &path)?;
        invocation = invocation
            .next(Arc::clone(&method), args)
            .map_err(|e| error_at(ErrorCode::BadRequest, &path, format!("Wrong method arguments: {}", e)))?;

        if !method.is_remote() {
            interface = method.result();
        }
    }

    if !invocation.is_remote() {
        return Err(error_at(
            ErrorCode::BadRequest,
            &path,
            format!("Not a remote method: {}", path),
        ));
    }

    debug!(chain = %invocation, "Decoded request");
    Ok(invocation)
}

// Missing arguments read as null, unknown argument names are rejected.
fn decode_args(
    codec: &MessageCodec<'_>,
    method: &MethodDescriptor,
    raw: &JsonValue,
    path: &str,
) -> Result<Vec<Value>, RpcError> {
    let empty = Map::new();
    let object = match raw {
        JsonValue::Object(object) => object,
        JsonValue::Null => &empty,
        _ => {
            return Err(error_at(
                ErrorCode::BadRequest,
                path,
                "Wrong method arguments: expected an object",
            ))
        }
    };

    if let Some(unknown) = object
        .keys()
        .find(|key| !method.args().iter().any(|arg| &arg.name == *key))
    {
        return Err(error_at(
            ErrorCode::BadRequest,
            path,
            format!("Wrong method arguments: unknown argument {}", unknown),
        ));
    }

    method
        .args()
        .iter()
        .map(|arg| {
            let raw = object.get(&arg.name).unwrap_or(&JsonValue::Null);
            codec.parse(raw, arg.ty).map_err(|e| {
                error_at(
                    ErrorCode::BadRequest,
                    path,
                    format!("Wrong method arguments: {}: {}", arg.name, e),
                )
            })
        })
        .collect()
}

fn push_path(path: &mut String, name: &str) {
    if !path.is_empty() {
        path.push('.');
    }
    path.push_str(name);
}
