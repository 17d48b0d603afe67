use crate::ids::TypeId;
use crate::types::{PrimitiveKind, TypeDescriptor, TypeError, TypeKind, TypeRegistry};
use crate::value::{Message, Value};
use bytes::Bytes;
use serde_json::{Map, Number, Value as JsonValue};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    #[error("Cannot parse {found} as {expected}")]
    Parse { expected: String, found: String },
    #[error("Unknown value {value:?} for enum {enum_name}")]
    UnknownEnumValue { enum_name: String, value: String },
    #[error("Cannot serialize non-finite number {0}")]
    NonFiniteFloat(f64),
    #[error("Expected {expected}, got {found}")]
    TypeMismatch { expected: String, found: String },
    #[error("{0} is not a data type")]
    NotData(String),
    #[error("Unbound type variable {0}")]
    UnboundVariable(String),
    #[error("JSON error: {0}")]
    Json(String),
    #[error(transparent)]
    Type(#[from] TypeError),
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        CodecError::Json(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CodecOptions {
    /// Parse unknown enum names as null instead of failing.
    pub permissive_enums: bool,
}

/// Converts values to and from JSON trees, guided by type descriptors.
#[derive(Debug, Clone, Copy)]
pub struct MessageCodec<'a> {
    registry: &'a TypeRegistry,
    options: CodecOptions,
}

impl<'a> MessageCodec<'a> {
    pub fn new(registry: &'a TypeRegistry) -> Self {
        Self::with_options(registry, CodecOptions::default())
    }

    pub fn with_options(registry: &'a TypeRegistry, options: CodecOptions) -> Self {
        MessageCodec { registry, options }
    }

    pub fn registry(&self) -> &'a TypeRegistry {
        self.registry
    }

    pub fn serialize(&self, value: &Value, ty: TypeId) -> Result<JsonValue, CodecError> {
        let descriptor = self.registry.descriptor(ty)?;
        match &*descriptor {
            TypeDescriptor::Interface(d) => Err(CodecError::NotData(d.name().to_string())),
            TypeDescriptor::Variable(name) => Err(CodecError::UnboundVariable(name.clone())),
            _ if value.is_null() => Ok(JsonValue::Null),
            TypeDescriptor::Primitive(kind) => serialize_primitive(value, *kind),
            TypeDescriptor::Void => Err(self.mismatch(ty, value)),
            TypeDescriptor::List(element) | TypeDescriptor::Set(element) => match value {
                Value::List(items) | Value::Set(items) => items
                    .iter()
                    .map(|item| self.serialize(item, *element))
                    .collect::<Result<Vec<_>, _>>()
                    .map(JsonValue::Array),
                other => Err(self.mismatch(ty, other)),
            },
            TypeDescriptor::Map(key_ty, value_ty) => match value {
                Value::Map(entries) => {
                    let mut object = Map::with_capacity(entries.len());
                    for (key, item) in entries {
                        let key = self.serialize_key(key, *key_ty)?;
                        object.insert(key, self.serialize(item, *value_ty)?);
                    }
                    Ok(JsonValue::Object(object))
                }
                other => Err(self.mismatch(ty, other)),
            },
            TypeDescriptor::Enum(d) => match value {
                Value::Enum(name) | Value::String(name) => {
                    let canonical = d.find(name).ok_or_else(|| CodecError::UnknownEnumValue {
                        enum_name: d.name().to_string(),
                        value: name.clone(),
                    })?;
                    Ok(JsonValue::String(canonical.to_ascii_lowercase()))
                }
                other => Err(self.mismatch(ty, other)),
            },
            TypeDescriptor::Message(_) => self.serialize_message(value, ty),
        }
    }

    pub fn parse(&self, json: &JsonValue, ty: TypeId) -> Result<Value, CodecError> {
        let descriptor = self.registry.descriptor(ty)?;
        match &*descriptor {
            TypeDescriptor::Primitive(kind) => parse_primitive(json, *kind),
            TypeDescriptor::Interface(d) => Err(CodecError::NotData(d.name().to_string())),
            TypeDescriptor::Variable(name) => Err(CodecError::UnboundVariable(name.clone())),
            TypeDescriptor::Void => Ok(Value::Null),
            _ if json.is_null() => Ok(Value::Null),
            TypeDescriptor::List(element) => {
                let items = self.expect_array(json, ty)?;
                items
                    .iter()
                    .map(|item| self.parse(item, *element))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::List)
            }
            TypeDescriptor::Set(element) => {
                let items = self.expect_array(json, ty)?;
                let mut unique: Vec<Value> = Vec::with_capacity(items.len());
                for item in items {
                    let value = self.parse(item, *element)?;
                    if !unique.contains(&value) {
                        unique.push(value);
                    }
                }
                Ok(Value::Set(unique))
            }
            TypeDescriptor::Map(key_ty, value_ty) => {
                let object = json
                    .as_object()
                    .ok_or_else(|| parse_error(self.registry.type_name(ty), json))?;
                let mut entries = Vec::with_capacity(object.len());
                for (key, item) in object {
                    // Keys travel as strings; numeric and bool keys parse back from them.
                    let key = self.parse(&JsonValue::String(key.clone()), *key_ty)?;
                    entries.push((key, self.parse(item, *value_ty)?));
                }
                Ok(Value::Map(entries))
            }
            TypeDescriptor::Enum(d) => {
                let name = json
                    .as_str()
                    .ok_or_else(|| parse_error(d.name(), json))?;
                match d.find(name) {
                    Some(canonical) => Ok(Value::Enum(canonical.to_string())),
                    None if self.options.permissive_enums => Ok(Value::Null),
                    None => Err(CodecError::UnknownEnumValue {
                        enum_name: d.name().to_string(),
                        value: name.to_string(),
                    }),
                }
            }
            TypeDescriptor::Message(_) => self.parse_message(json, ty),
        }
    }

    pub fn to_bytes(&self, value: &Value, ty: TypeId) -> Result<Bytes, CodecError> {
        let json = self.serialize(value, ty)?;
        Ok(Bytes::from(serde_json::to_vec(&json)?))
    }

    pub fn from_bytes(&self, data: &[u8], ty: TypeId) -> Result<Value, CodecError> {
        let json: JsonValue = serde_json::from_slice(data)?;
        self.parse(&json, ty)
    }

    fn serialize_message(&self, value: &Value, declared: TypeId) -> Result<JsonValue, CodecError> {
        let message = match value {
            Value::Message(message) => message,
            other => return Err(self.mismatch(declared, other)),
        };

        let concrete = message.type_id();
        if !self.registry.is_subtype(concrete, declared) {
            return Err(CodecError::TypeMismatch {
                expected: self.registry.type_name(declared),
                found: self.registry.type_name(concrete),
            });
        }

        let layout = self.registry.message_layout(concrete)?;
        let mut object = Map::with_capacity(layout.fields().len());

        if let (Some(field), Some(tag)) = (layout.discriminator(), layout.discriminator_value()) {
            let tag = self.serialize(&Value::String(tag.to_string()), field.ty)?;
            object.insert(field.name.clone(), tag);
        }

        for field in layout.fields() {
            if field.discriminator {
                continue;
            }
            match message.get(&field.name) {
                None | Some(Value::Null) => {}
                Some(item) => {
                    object.insert(field.name.clone(), self.serialize(item, field.ty)?);
                }
            }
        }

        Ok(JsonValue::Object(object))
    }

    fn parse_message(&self, json: &JsonValue, declared: TypeId) -> Result<Value, CodecError> {
        let object = json
            .as_object()
            .ok_or_else(|| parse_error(self.registry.type_name(declared), json))?;
        let layout = self.registry.message_layout(declared)?;

        // Unmapped or missing discriminators fall back to the declared type.
        let concrete = match layout.discriminator().and_then(|field| object.get(&field.name)) {
            Some(JsonValue::String(tag)) => layout.subtype(tag).unwrap_or(declared),
            Some(JsonValue::Null) | None => declared,
            Some(other) => layout.subtype(&other.to_string()).unwrap_or(declared),
        };
        let layout = if concrete == declared {
            layout
        } else {
            self.registry.message_layout(concrete)?
        };

        let mut message = Message::new(concrete);
        for field in layout.fields() {
            if field.discriminator {
                continue;
            }
            if let Some(raw) = object.get(&field.name) {
                message.set(field.name.clone(), self.parse(raw, field.ty)?);
            }
        }

        Ok(Value::Message(message))
    }

    fn serialize_key(&self, key: &Value, ty: TypeId) -> Result<String, CodecError> {
        match self.serialize(key, ty)? {
            JsonValue::String(s) => Ok(s),
            JsonValue::Number(n) => Ok(n.to_string()),
            JsonValue::Bool(b) => Ok(b.to_string()),
            _ => Err(CodecError::TypeMismatch {
                expected: "map key".to_string(),
                found: self.registry.type_name(ty),
            }),
        }
    }

    fn expect_array<'j>(&self, json: &'j JsonValue, ty: TypeId) -> Result<&'j Vec<JsonValue>, CodecError> {
        json.as_array()
            .ok_or_else(|| parse_error(self.registry.type_name(ty), json))
    }

    fn mismatch(&self, ty: TypeId, value: &Value) -> CodecError {
        CodecError::TypeMismatch {
            expected: self.registry.type_name(ty),
            found: value.kind_name().to_string(),
        }
    }
}

fn serialize_primitive(value: &Value, kind: PrimitiveKind) -> Result<JsonValue, CodecError> {
    let mismatch = || CodecError::TypeMismatch {
        expected: kind.name().to_string(),
        found: value.kind_name().to_string(),
    };

    match kind {
        PrimitiveKind::Bool => value.as_bool().map(JsonValue::Bool).ok_or_else(mismatch),
        PrimitiveKind::Int16 | PrimitiveKind::Int32 | PrimitiveKind::Int64 => {
            let n = value.as_i64().ok_or_else(mismatch)?;
            check_range(n, kind)?;
            Ok(JsonValue::Number(n.into()))
        }
        PrimitiveKind::Float32 | PrimitiveKind::Float64 => {
            let n = match value {
                // Shortest decimal form of the f32, so 0.1f32 is written as 0.1.
                Value::Float32(f) => f.to_string().parse::<f64>().unwrap_or(f64::from(*f)),
                other => other.as_f64().ok_or_else(mismatch)?,
            };
            Number::from_f64(n)
                .map(JsonValue::Number)
                .ok_or(CodecError::NonFiniteFloat(n))
        }
        PrimitiveKind::String => match value {
            Value::String(s) => Ok(JsonValue::String(s.clone())),
            _ => Err(mismatch()),
        },
    }
}

fn parse_primitive(json: &JsonValue, kind: PrimitiveKind) -> Result<Value, CodecError> {
    if json.is_null() {
        return Ok(zero_value(kind));
    }

    match kind {
        PrimitiveKind::Bool => match json {
            JsonValue::Bool(b) => Ok(Value::Bool(*b)),
            JsonValue::String(s) if s.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
            JsonValue::String(s) if s.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
            _ => Err(parse_error(kind, json)),
        },
        PrimitiveKind::Int16 | PrimitiveKind::Int32 | PrimitiveKind::Int64 => {
            let n = match json {
                JsonValue::Number(n) => n.as_i64(),
                JsonValue::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            }
            .ok_or_else(|| parse_error(kind, json))?;
            check_range(n, kind)?;
            Ok(match kind {
                PrimitiveKind::Int16 => Value::Int16(n as i16),
                PrimitiveKind::Int32 => Value::Int32(n as i32),
                _ => Value::Int64(n),
            })
        }
        PrimitiveKind::Float32 | PrimitiveKind::Float64 => {
            let n = match json {
                JsonValue::Number(n) => n.as_f64(),
                JsonValue::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
                _ => None,
            }
            .ok_or_else(|| parse_error(kind, json))?;
            if kind == PrimitiveKind::Float32 && (n as f32).is_infinite() {
                return Err(parse_error(kind, json));
            }
            Ok(match kind {
                PrimitiveKind::Float32 => Value::Float32(n as f32),
                _ => Value::Float64(n),
            })
        }
        PrimitiveKind::String => match json {
            JsonValue::String(s) => Ok(Value::String(s.clone())),
            _ => Err(parse_error(kind, json)),
        },
    }
}

/// Value a primitive takes when the wire carries null.
pub fn zero_value(kind: PrimitiveKind) -> Value {
    match kind {
        PrimitiveKind::Bool => Value::Bool(false),
        PrimitiveKind::Int16 => Value::Int16(0),
        PrimitiveKind::Int32 => Value::Int32(0),
        PrimitiveKind::Int64 => Value::Int64(0),
        PrimitiveKind::Float32 => Value::Float32(0.0),
        PrimitiveKind::Float64 => Value::Float64(0.0),
        PrimitiveKind::String => Value::String(String::new()),
    }
}

fn check_range(n: i64, kind: PrimitiveKind) -> Result<(), CodecError> {
    let fits = match kind {
        PrimitiveKind::Int16 => i16::try_from(n).is_ok(),
        PrimitiveKind::Int32 => i32::try_from(n).is_ok(),
        _ => true,
    };
    if fits {
        Ok(())
    } else {
        Err(CodecError::Parse {
            expected: kind.name().to_string(),
            found: n.to_string(),
        })
    }
}

fn parse_error(expected: impl ToString, json: &JsonValue) -> CodecError {
    let found: String = json.to_string().chars().take(64).collect();
    CodecError::Parse {
        expected: expected.to_string(),
        found,
    }
}

/// True if values of this kind can cross the wire.
pub fn is_data(registry: &TypeRegistry, ty: TypeId) -> bool {
    registry
        .kind(ty)
        .map(|kind| kind.is_data() && kind != TypeKind::Void)
        .unwrap_or(false)
}
