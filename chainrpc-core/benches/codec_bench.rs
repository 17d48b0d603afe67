use chainrpc_core::{
    decode_chain, encode_request_bytes, InterfaceDescriptor, Invocation, Message, MessageCodec,
    MessageDescriptor, TypeRef, TypeRegistry, Value,
};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

fn registry() -> TypeRegistry {
    let registry = TypeRegistry::new();
    registry
        .register_message(
            MessageDescriptor::builder("Row")
                .field("id", TypeRef::INT64)
                .field("name", TypeRef::STRING)
                .field("scores", TypeRef::list(TypeRef::DOUBLE))
                .build(),
        )
        .unwrap();
    registry
        .register_interface(
            InterfaceDescriptor::builder("Root")
                .method("table", &[("name", TypeRef::STRING)], TypeRef::named("Table"))
                .build(),
        )
        .unwrap();
    registry
        .register_interface(
            InterfaceDescriptor::builder("Table")
                .method("insert", &[("rows", TypeRef::list(TypeRef::named("Row")))], TypeRef::INT32)
                .build(),
        )
        .unwrap();
    registry.link().unwrap();
    registry
}

fn rows(registry: &TypeRegistry, count: usize) -> Value {
    let row = registry.resolve("Row").unwrap();
    Value::List(
        (0..count)
            .map(|i| {
                Value::Message(
                    Message::new(row)
                        .with("id", i as i64)
                        .with("name", format!("row-{}", i))
                        .with("scores", vec![1.5f64, 2.5, 3.5]),
                )
            })
            .collect(),
    )
}

fn bench_message_codec(c: &mut Criterion) {
    let registry = registry();
    let codec = MessageCodec::new(&registry);
    let list = registry.resolve_ref(&TypeRef::list(TypeRef::named("Row"))).unwrap();

    let mut group = c.benchmark_group("message_codec");
    for size in [1, 10, 100, 1000].iter() {
        let value = rows(&registry, *size);
        let json = codec.serialize(&value, list).unwrap();

        group.bench_with_input(BenchmarkId::new("serialize", size), &value, |b, value| {
            b.iter(|| black_box(codec.serialize(value, list).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("parse", size), &json, |b, json| {
            b.iter(|| black_box(codec.parse(json, list).unwrap()))
        });
    }
    group.finish();
}

fn bench_request_codec(c: &mut Criterion) {
    let registry = registry();
    let root = registry.resolve("Root").unwrap();
    let table = registry.find_method(root, "table").unwrap().unwrap();
    let insert = registry
        .find_method(table.result(), "insert")
        .unwrap()
        .unwrap();

    let chain = Invocation::root()
        .next(table, vec![Value::String("scores".into())])
        .unwrap()
        .next(insert, vec![rows(&registry, 100)])
        .unwrap();
    let bytes = encode_request_bytes(&chain, &registry).unwrap();

    let mut group = c.benchmark_group("request_codec");
    group.bench_function("encode", |b| {
        b.iter(|| black_box(encode_request_bytes(&chain, &registry).unwrap()))
    });
    group.bench_function("decode", |b| {
        b.iter(|| black_box(decode_chain(&bytes, root, &registry).unwrap()))
    });
    group.finish();
}

criterion_group!(benches, bench_message_codec, bench_request_codec);
criterion_main!(benches);
