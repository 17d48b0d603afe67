use crate::ids::TypeId;
use indexmap::IndexMap;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use thiserror::Error;

/// Dynamically typed data value, interpreted against a type descriptor.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    List(Vec<Value>),
    Set(Vec<Value>),
    /// Ordered key/value pairs; keys may be any data value.
    Map(Vec<(Value, Value)>),
    /// Declared name of an enum value.
    Enum(String),
    Message(Message),
}

impl Value {
    pub fn enumeration(name: impl Into<String>) -> Self {
        Value::Enum(name.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int16(_) => "int16",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Float32(_) => "float",
            Value::Float64(_) => "double",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::Map(_) => "map",
            Value::Enum(_) => "enum",
            Value::Message(_) => "message",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Any integer variant widened to `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int16(n) => Some(i64::from(*n)),
            Value::Int32(n) => Some(i64::from(*n)),
            Value::Int64(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float32(n) => Some(f64::from(*n)),
            Value::Float64(n) => Some(*n),
            _ => self.as_i64().map(|n| n as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Set(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Value::Message(message) => Some(message),
            _ => None,
        }
    }

    pub fn into_message(self) -> Option<Message> {
        match self {
            Value::Message(message) => Some(message),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int16(n) => write!(f, "{}", n),
            Value::Int32(n) => write!(f, "{}", n),
            Value::Int64(n) => write!(f, "{}", n),
            Value::Float32(n) => write!(f, "{}", n),
            Value::Float64(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Enum(name) => write!(f, "{}", name),
            Value::List(items) => write_seq(f, "[", items, "]"),
            Value::Set(items) => write_seq(f, "{", items, "}"),
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            Value::Message(message) => write!(f, "{}", message),
        }
    }
}

fn write_seq(f: &mut fmt::Formatter<'_>, open: &str, items: &[Value], close: &str) -> fmt::Result {
    write!(f, "{}", open)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    write!(f, "{}", close)
}

/// Instance of a message type.
///
/// `type_id` is the concrete runtime type, which may be a subtype of the
/// type a field or argument declares. Discriminator fields are implied by
/// that type and are not stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    type_id: TypeId,
    fields: IndexMap<String, Value>,
}

impl Message {
    pub fn new(type_id: TypeId) -> Self {
        Message {
            type_id,
            fields: IndexMap::new(),
        }
    }

    /// Builder-style setter.
    pub fn with(mut self, name: impl Into<String>, value: impl IntoValue) -> Self {
        self.set(name, value);
        self
    }

    /// Sets a field; setting `Null` removes it.
    pub fn set(&mut self, name: impl Into<String>, value: impl IntoValue) {
        let name = name.into();
        match value.into_value() {
            Value::Null => {
                self.fields.shift_remove(&name);
            }
            value => {
                self.fields.insert(name, value);
            }
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Reads a field, applying the zero-value rule to absent fields.
    pub fn get_as<T: FromValue>(&self, name: &str) -> Result<T, ValueError> {
        T::from_value(self.fields.get(name).cloned().unwrap_or_default())
    }

    pub fn fields(&self) -> &IndexMap<String, Value> {
        &self.fields
    }

    pub fn into_fields(self) -> IndexMap<String, Value> {
        self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{", self.type_id)?;
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, value)?;
        }
        write!(f, "}}")
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    #[error("Expected {expected}, got {found}")]
    Mismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("Value {value} out of range for {target}")]
    OutOfRange { value: String, target: &'static str },
}

impl ValueError {
    fn mismatch(expected: &'static str, found: &Value) -> Self {
        ValueError::Mismatch {
            expected,
            found: found.kind_name(),
        }
    }
}

pub trait IntoValue {
    fn into_value(self) -> Value;
}

/// Conversion out of a [`Value`].
///
/// Primitives and collections read `Null` as their zero value, so absent
/// fields and null results never fail.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, ValueError>;
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        Ok(value)
    }
}

impl IntoValue for Message {
    fn into_value(self) -> Value {
        Value::Message(self)
    }
}

impl FromValue for Message {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Message(message) => Ok(message),
            other => Err(ValueError::mismatch("message", &other)),
        }
    }
}

impl IntoValue for () {
    fn into_value(self) -> Value {
        Value::Null
    }
}

impl FromValue for () {
    fn from_value(_: Value) -> Result<Self, ValueError> {
        Ok(())
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Bool(b) => Ok(b),
            Value::Null => Ok(false),
            other => Err(ValueError::mismatch("bool", &other)),
        }
    }
}

macro_rules! integer_value {
    ($($ty:ty => $variant:ident, $name:literal);* $(;)?) => {
        $(
            impl IntoValue for $ty {
                fn into_value(self) -> Value {
                    Value::$variant(self)
                }
            }

            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self, ValueError> {
                    if value.is_null() {
                        return Ok(0);
                    }
                    let n = value
                        .as_i64()
                        .ok_or_else(|| ValueError::mismatch($name, &value))?;
                    <$ty>::try_from(n).map_err(|_| ValueError::OutOfRange {
                        value: n.to_string(),
                        target: $name,
                    })
                }
            }
        )*
    };
}

integer_value! {
    i16 => Int16, "int16";
    i32 => Int32, "int32";
    i64 => Int64, "int64";
}

impl IntoValue for f32 {
    fn into_value(self) -> Value {
        Value::Float32(self)
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(0.0),
            Value::Float32(n) => Ok(n),
            other => other
                .as_f64()
                .map(|n| n as f32)
                .ok_or_else(|| ValueError::mismatch("float", &other)),
        }
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Float64(self)
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        if value.is_null() {
            return Ok(0.0);
        }
        value
            .as_f64()
            .ok_or_else(|| ValueError::mismatch("double", &value))
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::String(self)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::String(self.to_string())
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::String(s) | Value::Enum(s) => Ok(s),
            Value::Null => Ok(String::new()),
            other => Err(ValueError::mismatch("string", &other)),
        }
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        match self {
            Some(value) => value.into_value(),
            None => Value::Null,
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(IntoValue::into_value).collect())
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::List(items) | Value::Set(items) => items.into_iter().map(T::from_value).collect(),
            Value::Null => Ok(Vec::new()),
            other => Err(ValueError::mismatch("list", &other)),
        }
    }
}

fn set_items(value: Value) -> Result<Vec<Value>, ValueError> {
    match value {
        Value::Set(items) | Value::List(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        other => Err(ValueError::mismatch("set", &other)),
    }
}

fn map_entries(value: Value) -> Result<Vec<(Value, Value)>, ValueError> {
    match value {
        Value::Map(entries) => Ok(entries),
        Value::Null => Ok(Vec::new()),
        other => Err(ValueError::mismatch("map", &other)),
    }
}

impl<T: IntoValue> IntoValue for HashSet<T> {
    fn into_value(self) -> Value {
        Value::Set(self.into_iter().map(IntoValue::into_value).collect())
    }
}

impl<T: FromValue + Eq + Hash> FromValue for HashSet<T> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        set_items(value)?.into_iter().map(T::from_value).collect()
    }
}

impl<T: IntoValue> IntoValue for BTreeSet<T> {
    fn into_value(self) -> Value {
        Value::Set(self.into_iter().map(IntoValue::into_value).collect())
    }
}

impl<T: FromValue + Ord> FromValue for BTreeSet<T> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        set_items(value)?.into_iter().map(T::from_value).collect()
    }
}

impl<K: IntoValue, V: IntoValue> IntoValue for HashMap<K, V> {
    fn into_value(self) -> Value {
        Value::Map(
            self.into_iter()
                .map(|(k, v)| (k.into_value(), v.into_value()))
                .collect(),
        )
    }
}

impl<K: FromValue + Eq + Hash, V: FromValue> FromValue for HashMap<K, V> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        map_entries(value)?
            .into_iter()
            .map(|(k, v)| Ok((K::from_value(k)?, V::from_value(v)?)))
            .collect()
    }
}

impl<K: IntoValue, V: IntoValue> IntoValue for BTreeMap<K, V> {
    fn into_value(self) -> Value {
        Value::Map(
            self.into_iter()
                .map(|(k, v)| (k.into_value(), v.into_value()))
                .collect(),
        )
    }
}

impl<K: FromValue + Ord, V: FromValue> FromValue for BTreeMap<K, V> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        map_entries(value)?
            .into_iter()
            .map(|(k, v)| Ok((K::from_value(k)?, V::from_value(v)?)))
            .collect()
    }
}
