use chainrpc_core::{
    decode_chain, decode_result, encode_request_bytes, encode_result, EnumDescriptor,
    InterfaceDescriptor, Invocation, InvocationResult, Message, MessageDescriptor, RpcResponse,
    TypeId, TypeRef, TypeRegistry, Value,
};

fn contract() -> (TypeRegistry, TypeId) {
    let registry = TypeRegistry::new();
    registry
        .register_enum(EnumDescriptor::new("Level", ["Low", "High"]))
        .unwrap();
    registry
        .register_message(
            MessageDescriptor::builder("Alert")
                .field("level", TypeRef::named("Level"))
                .field("tags", TypeRef::map(TypeRef::INT32, TypeRef::STRING))
                .build(),
        )
        .unwrap();
    registry
        .register_message(
            MessageDescriptor::builder("Failure")
                .field("reason", TypeRef::STRING)
                .build(),
        )
        .unwrap();
    registry
        .register_interface(
            InterfaceDescriptor::builder("Root")
                .exc(TypeRef::named("Failure"))
                .method("calc", &[], TypeRef::named("Calc"))
                .method("alerts", &[("region", TypeRef::STRING)], TypeRef::named("Alerts"))
                .build(),
        )
        .unwrap();
    registry
        .register_interface(
            InterfaceDescriptor::builder("Calc")
                .method("sum", &[("i0", TypeRef::INT32), ("i1", TypeRef::INT32)], TypeRef::INT32)
                .build(),
        )
        .unwrap();
    registry
        .register_interface(
            InterfaceDescriptor::builder("Alerts")
                .method("raise", &[("alert", TypeRef::named("Alert"))], TypeRef::list(TypeRef::named("Alert")))
                .build(),
        )
        .unwrap();
    registry.link().unwrap();
    let root = registry.resolve("Root").unwrap();
    (registry, root)
}

fn call(registry: &TypeRegistry, root: TypeId, path: &[(&str, Vec<Value>)]) -> Invocation {
    let mut interface = root;
    let mut invocation = Invocation::root();
    for (name, args) in path {
        let method = registry.find_method(interface, name).unwrap().unwrap();
        interface = method.result();
        invocation = invocation.next(method, args.clone()).unwrap();
    }
    invocation
}

#[test]
fn test_sum_request_snapshot() {
    let (registry, root) = contract();
    let chain = call(
        &registry,
        root,
        &[("calc", vec![]), ("sum", vec![Value::Int32(10), Value::Int32(11)])],
    );

    let bytes = encode_request_bytes(&chain, &registry).unwrap();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    insta::assert_snapshot!(body, @r#"{"calc":{},"sum":{"i0":10,"i1":11}}"#);
}

#[test]
fn test_nested_arguments_snapshot() {
    let (registry, root) = contract();
    let alert_type = registry.resolve("Alert").unwrap();
    let alert = Message::new(alert_type)
        .with("level", Value::enumeration("High"))
        .with(
            "tags",
            Value::Map(vec![(Value::Int32(7), Value::String("disk".into()))]),
        );
    let chain = call(
        &registry,
        root,
        &[
            ("alerts", vec![Value::String("eu".into())]),
            ("raise", vec![Value::Message(alert.clone())]),
        ],
    );

    let bytes = encode_request_bytes(&chain, &registry).unwrap();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    insta::assert_snapshot!(
        body,
        @r#"{"alerts":{"region":"eu"},"raise":{"alert":{"level":"high","tags":{"7":"disk"}}}}"#
    );

    let decoded = decode_chain(&bytes, root, &registry).unwrap();
    assert_eq!(decoded, chain);
    assert_eq!(decoded.to_string(), format!("alerts(\"eu\").raise({})", alert));
}

#[test]
fn test_response_round_trip_through_bytes() {
    let (registry, root) = contract();
    let chain = call(
        &registry,
        root,
        &[("calc", vec![]), ("sum", vec![Value::Int32(1), Value::Int32(2)])],
    );

    let failure = Message::new(registry.resolve("Failure").unwrap()).with("reason", "overflow");
    let response = encode_result(&InvocationResult::Fault(failure.clone()), &chain, &registry).unwrap();
    let bytes = response.to_bytes().unwrap();
    insta::assert_snapshot!(
        String::from_utf8(bytes.to_vec()).unwrap(),
        @r#"{"status":"exception","result":{"reason":"overflow"}}"#
    );

    let response = RpcResponse::from_bytes(&bytes).unwrap();
    assert_eq!(
        decode_result(response, &chain, &registry).unwrap(),
        InvocationResult::Fault(failure)
    );
}
