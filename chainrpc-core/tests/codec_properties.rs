use chainrpc_core::{
    EnumDescriptor, Message, MessageCodec, MessageDescriptor, TypeId, TypeRef, TypeRegistry, Value,
};
use proptest::prelude::*;
use serde_json::json;

fn registry() -> TypeRegistry {
    let registry = TypeRegistry::new();
    registry
        .register_enum(EnumDescriptor::new("Number", ["ONE", "TWO", "THREE"]))
        .unwrap();
    registry
        .register_message(
            MessageDescriptor::builder("Item")
                .field("name", TypeRef::STRING)
                .field("count", TypeRef::INT32)
                .field("price", TypeRef::DOUBLE)
                .field("tags", TypeRef::set(TypeRef::STRING))
                .field("number", TypeRef::named("Number"))
                .field("child", TypeRef::named("Item"))
                .build(),
        )
        .unwrap();
    registry.link().unwrap();
    registry
}

fn ty(registry: &TypeRegistry, type_ref: TypeRef) -> TypeId {
    registry.resolve_ref(&type_ref).unwrap()
}

fn round_trip(registry: &TypeRegistry, value: &Value, ty: TypeId) -> Value {
    let codec = MessageCodec::new(registry);
    let json = codec.serialize(value, ty).unwrap();
    codec.parse(&json, ty).unwrap()
}

fn number() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("ONE"), Just("TWO"), Just("THREE")]
}

fn distinct_strings() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set("[a-z]{1,6}", 0..5).prop_map(|set| set.into_iter().collect())
}

proptest! {
    #[test]
    fn test_integers_round_trip(a in any::<i16>(), b in any::<i32>(), c in any::<i64>()) {
        let registry = registry();
        for (value, ty_ref) in [
            (Value::Int16(a), TypeRef::INT16),
            (Value::Int32(b), TypeRef::INT32),
            (Value::Int64(c), TypeRef::INT64),
        ] {
            let id = ty(&registry, ty_ref);
            prop_assert_eq!(round_trip(&registry, &value, id), value);
        }
    }

    #[test]
    fn test_doubles_round_trip(n in proptest::num::f64::NORMAL | proptest::num::f64::ZERO) {
        let registry = registry();
        let value = Value::Float64(n);
        prop_assert_eq!(round_trip(&registry, &value, ty(&registry, TypeRef::DOUBLE)), value);
    }

    #[test]
    fn test_doubles_round_trip_through_bytes(n in any::<f64>().prop_filter("finite", |n| n.is_finite())) {
        let registry = registry();
        let codec = MessageCodec::new(&registry);
        let double = ty(&registry, TypeRef::DOUBLE);
        let value = Value::Float64(n);
        let bytes = codec.to_bytes(&value, double).unwrap();
        prop_assert_eq!(codec.from_bytes(&bytes, double).unwrap(), value);
    }

    #[test]
    fn test_strings_round_trip(s in ".*") {
        let registry = registry();
        let value = Value::String(s);
        prop_assert_eq!(round_trip(&registry, &value, ty(&registry, TypeRef::STRING)), value);
    }

    #[test]
    fn test_lists_and_maps_round_trip(
        items in prop::collection::vec(any::<i32>(), 0..16),
        entries in prop::collection::btree_map(any::<i64>(), "[a-z]{0,8}", 0..8),
    ) {
        let registry = registry();

        let list = Value::List(items.into_iter().map(Value::Int32).collect());
        prop_assert_eq!(round_trip(&registry, &list, ty(&registry, TypeRef::list(TypeRef::INT32))), list);

        let map = Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (Value::Int64(k), Value::String(v)))
                .collect(),
        );
        let map_ty = ty(&registry, TypeRef::map(TypeRef::INT64, TypeRef::STRING));
        prop_assert_eq!(round_trip(&registry, &map, map_ty), map);
    }

    #[test]
    fn test_enum_accepts_any_case(name in number(), upper in any::<bool>()) {
        let registry = registry();
        let codec = MessageCodec::new(&registry);
        let id = ty(&registry, TypeRef::named("Number"));

        let wire = if upper { name.to_uppercase() } else { name.to_lowercase() };
        let parsed = codec.parse(&json!(wire), id).unwrap();
        prop_assert_eq!(&parsed, &Value::Enum(name.to_string()));
        prop_assert_eq!(codec.serialize(&parsed, id).unwrap(), json!(name.to_lowercase()));
    }

    #[test]
    fn test_messages_round_trip(
        name in proptest::option::of("[a-z ]{0,12}"),
        count in any::<i32>(),
        price in proptest::num::f64::NORMAL,
        tags in distinct_strings(),
        number in proptest::option::of(number()),
        nested in any::<bool>(),
    ) {
        let registry = registry();
        let item = registry.resolve("Item").unwrap();

        let mut message = Message::new(item)
            .with("name", name)
            .with("count", count)
            .with("price", price)
            .with("tags", Value::Set(tags.into_iter().map(Value::String).collect()))
            .with("number", number.map(Value::enumeration));
        if nested {
            message.set("child", Message::new(item).with("count", 1i32));
        }

        let value = Value::Message(message);
        prop_assert_eq!(round_trip(&registry, &value, item), value);
    }
}

#[test]
fn test_null_round_trips_at_every_non_primitive_type() {
    let registry = registry();
    for type_ref in [
        TypeRef::list(TypeRef::INT32),
        TypeRef::set(TypeRef::STRING),
        TypeRef::map(TypeRef::STRING, TypeRef::BOOL),
        TypeRef::named("Number"),
        TypeRef::named("Item"),
        TypeRef::VOID,
    ] {
        let id = ty(&registry, type_ref);
        assert_eq!(round_trip(&registry, &Value::Null, id), Value::Null);
    }
}
