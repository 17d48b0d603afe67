#[cfg(test)]
mod protocol_tests {
    use super::super::*;
    use crate::error::{ErrorCode, RpcError};
    use crate::invocation::{Invocation, InvocationResult};
    use crate::types::{InterfaceDescriptor, MessageDescriptor, TypeRef, TypeRegistry};
    use crate::value::{Message, Value};
    use crate::ids::TypeId;
    use serde_json::json;
    use std::sync::Arc;

    fn registry() -> (TypeRegistry, TypeId) {
        let registry = TypeRegistry::new();
        registry
            .register_message(
                MessageDescriptor::builder("AppError")
                    .field("text", TypeRef::STRING)
                    .build(),
            )
            .unwrap();
        registry
            .register_interface(
                InterfaceDescriptor::builder("App")
                    .exc(TypeRef::named("AppError"))
                    .method("calc", &[], TypeRef::named("Calc"))
                    .method("sub", &[], TypeRef::named("App"))
                    .method("echo", &[("text", TypeRef::STRING)], TypeRef::STRING)
                    .build(),
            )
            .unwrap();
        registry
            .register_interface(
                InterfaceDescriptor::builder("Calc")
                    .method("sum", &[("i0", TypeRef::INT32), ("i1", TypeRef::INT32)], TypeRef::INT32)
                    .method("reset", &[], TypeRef::VOID)
                    .build(),
            )
            .unwrap();
        registry.link().unwrap();
        let app = registry.resolve("App").unwrap();
        (registry, app)
    }

    fn build(registry: &TypeRegistry, root: TypeId, path: &[(&str, Vec<Value>)]) -> Invocation {
        let mut interface = root;
        let mut invocation = Invocation::root();
        for (name, args) in path {
            let method = registry.find_method(interface, name).unwrap().unwrap();
            interface = method.result();
            invocation = invocation.next(method, args.clone()).unwrap();
        }
        invocation
    }

    fn sum(registry: &TypeRegistry, root: TypeId) -> Invocation {
        build(
            registry,
            root,
            &[("calc", vec![]), ("sum", vec![Value::Int32(10), Value::Int32(11)])],
        )
    }

    fn path_of(err: &RpcError) -> Option<&str> {
        err.data.as_ref()?.get("path")?.as_str()
    }

    #[test]
    fn test_encode_request() {
        let (registry, app) = registry();
        let bytes = encode_request_bytes(&sum(&registry, app), &registry).unwrap();
        assert_eq!(&bytes[..], br#"{"calc":{},"sum":{"i0":10,"i1":11}}"#);
    }

    #[test]
    fn test_encode_rejects_repeated_method() {
        let (registry, app) = registry();
        let chain = build(
            &registry,
            app,
            &[("sub", vec![]), ("sub", vec![]), ("echo", vec![Value::String("x".into())])],
        );

        let err = encode_request(&chain, &registry).unwrap_err();
        assert_eq!(err.code, ErrorCode::BadRequest);
        assert_eq!(path_of(&err), Some("sub.sub"));
    }

    #[test]
    fn test_decode_round_trip() {
        let (registry, app) = registry();
        let chain = sum(&registry, app);

        let bytes = encode_request_bytes(&chain, &registry).unwrap();
        let decoded = decode_chain(&bytes, app, &registry).unwrap();
        assert_eq!(decoded, chain);
        assert!(Arc::ptr_eq(
            decoded.method().unwrap(),
            chain.method().unwrap()
        ));
    }

    #[test]
    fn test_decode_missing_argument_is_zero() {
        let (registry, app) = registry();
        let decoded = decode_request(&json!({"calc": {}, "sum": {"i1": 5}}), app, &registry).unwrap();
        assert_eq!(decoded.args(), &[Value::Int32(0), Value::Int32(5)]);

        let decoded = decode_request(&json!({"calc": null, "reset": null}), app, &registry).unwrap();
        assert!(decoded.is_remote());
    }

    #[test]
    fn test_decode_unknown_method() {
        let (registry, app) = registry();
        let err = decode_request(&json!({"calc": {}, "nope": {}}), app, &registry).unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
        assert_eq!(err.message, "Method not found: calc.nope");
        assert_eq!(path_of(&err), Some("calc.nope"));
    }

    #[test]
    fn test_decode_not_remote() {
        let (registry, app) = registry();
        let err = decode_request(&json!({"calc": {}}), app, &registry).unwrap_err();
        assert_eq!(err.code, ErrorCode::BadRequest);
        assert_eq!(err.message, "Not a remote method: calc");
    }

    #[test]
    fn test_decode_call_after_remote() {
        let (registry, app) = registry();
        let err = decode_request(&json!({"echo": {"text": "hi"}, "calc": {}}), app, &registry)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::BadRequest);
        assert_eq!(path_of(&err), Some("echo.calc"));
    }

    #[test]
    fn test_decode_bad_arguments() {
        let (registry, app) = registry();

        let err = decode_request(&json!({"calc": {}, "sum": {"i0": 1, "i2": 2}}), app, &registry)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::BadRequest);
        assert!(err.message.contains("unknown argument i2"));

        let err = decode_request(&json!({"calc": {}, "sum": {"i0": "one"}}), app, &registry)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::BadRequest);
        assert_eq!(path_of(&err), Some("calc.sum"));

        let err = decode_request(&json!({"calc": [], "sum": {}}), app, &registry).unwrap_err();
        assert_eq!(path_of(&err), Some("calc"));
    }

    #[test]
    fn test_decode_malformed_requests() {
        let (registry, app) = registry();

        let err = decode_chain(b"{not json", app, &registry).unwrap_err();
        assert_eq!(err.code, ErrorCode::BadRequest);
        assert!(err.message.starts_with("Malformed request"));

        let err = decode_chain(b"[1, 2]", app, &registry).unwrap_err();
        assert_eq!(err.code, ErrorCode::BadRequest);

        let err = decode_chain(b"{}", app, &registry).unwrap_err();
        assert_eq!(err.message, "Method calls required");
    }

    #[test]
    fn test_success_response() {
        let (registry, app) = registry();
        let chain = sum(&registry, app);

        let response =
            encode_result(&InvocationResult::Success(Value::Int32(21)), &chain, &registry).unwrap();
        assert_eq!(response.http_status(), 200);
        let bytes = response.to_bytes().unwrap();
        assert_eq!(&bytes[..], br#"{"status":"ok","result":21}"#);

        let decoded = RpcResponse::from_bytes(&bytes).unwrap();
        assert_eq!(
            decode_result(decoded, &chain, &registry).unwrap(),
            InvocationResult::Success(Value::Int32(21))
        );
    }

    #[test]
    fn test_void_result_is_null() {
        let (registry, app) = registry();
        let chain = build(&registry, app, &[("calc", vec![]), ("reset", vec![])]);

        let response = encode_result(&InvocationResult::Success(Value::Null), &chain, &registry).unwrap();
        assert_eq!(response, RpcResponse::ok(json!(null)));
    }

    #[test]
    fn test_exception_response() {
        let (registry, app) = registry();
        let chain = sum(&registry, app);
        let app_error = registry.resolve("AppError").unwrap();
        let exc = Message::new(app_error).with("text", "overflow");

        let response =
            encode_result(&InvocationResult::Fault(exc.clone()), &chain, &registry).unwrap();
        assert_eq!(response.status, ResponseStatus::Exception);
        assert_eq!(response.result, json!({"text": "overflow"}));
        assert_eq!(response.http_status(), 200);

        assert_eq!(
            decode_result(response, &chain, &registry).unwrap(),
            InvocationResult::Fault(exc)
        );
    }

    #[test]
    fn test_error_response() {
        let (registry, app) = registry();
        let response = RpcResponse::error(RpcError::not_found("Method not found: calc.nope"));

        assert_eq!(response.http_status(), 404);
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "status": "error",
                "result": {"code": "not_found", "message": "Method not found: calc.nope"}
            })
        );

        let err = decode_result(response, &sum(&registry, app), &registry).unwrap_err();
        assert_eq!(err, RpcError::not_found("Method not found: calc.nope"));
    }

    #[test]
    fn test_response_from_bytes() {
        assert!(RpcResponse::from_bytes(b"").is_err());
        assert!(RpcResponse::from_bytes(br#"{"status":"maybe"}"#).is_err());

        let response = RpcResponse::from_bytes(br#"{"status":"ok"}"#).unwrap();
        assert_eq!(response.result, json!(null));
    }
}
