//! Runtime type descriptors.
//!
//! Descriptors are built with unresolved [`TypeRef`]s, registered in a
//! [`TypeRegistry`] and linked once all of them are known, which allows
//! forward and cyclic references between types.

pub mod descriptors;
pub mod registry;


pub use descriptors::*;
pub use registry::TypeRegistry;

use crate::ids::TypeId;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    #[error("Type already registered: {0}")]
    DuplicateType(String),
    #[error("Unknown type: {0}")]
    UnknownType(String),
    #[error("Unknown type id: {0}")]
    UnknownId(TypeId),
    #[error("Only enums, messages and interfaces can be registered, got {0}")]
    NotRegistrable(String),
    #[error("{name} expects {expected} type arguments, got {actual}")]
    Arity {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("Cyclic inheritance through {0}")]
    CyclicInheritance(String),
    #[error("{name} cannot inherit from {base}")]
    InvalidBase { name: String, base: String },
    #[error("{name} declares subtype {subtype} without a discriminator value")]
    InvalidSubtype { name: String, subtype: String },
    #[error("Exception type of {interface} is not a message: {exc}")]
    InvalidException { interface: String, exc: String },
    #[error("{name} is not {expected}")]
    WrongKind { name: String, expected: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Bool,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 7] = [
        PrimitiveKind::Bool,
        PrimitiveKind::Int16,
        PrimitiveKind::Int32,
        PrimitiveKind::Int64,
        PrimitiveKind::Float32,
        PrimitiveKind::Float64,
        PrimitiveKind::String,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Int16 => "int16",
            PrimitiveKind::Int32 => "int32",
            PrimitiveKind::Int64 => "int64",
            PrimitiveKind::Float32 => "float",
            PrimitiveKind::Float64 => "double",
            PrimitiveKind::String => "string",
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            PrimitiveKind::Int16 | PrimitiveKind::Int32 | PrimitiveKind::Int64
        )
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Primitive,
    Void,
    List,
    Set,
    Map,
    Enum,
    Message,
    Interface,
    Variable,
}

impl TypeKind {
    /// Data types can be serialized; interfaces and unbound variables cannot.
    pub fn is_data(&self) -> bool {
        !matches!(self, TypeKind::Interface | TypeKind::Variable)
    }
}

/// Unresolved reference to a type, used while building descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Primitive(PrimitiveKind),
    Void,
    List(Box<TypeRef>),
    Set(Box<TypeRef>),
    Map(Box<TypeRef>, Box<TypeRef>),
    /// A registered enum, message or interface.
    Named(String),
    /// A registered generic type applied to arguments.
    Generic(String, Vec<TypeRef>),
    /// A type variable of the enclosing generic declaration.
    Var(String),
    Id(TypeId),
}

impl TypeRef {
    pub const BOOL: TypeRef = TypeRef::Primitive(PrimitiveKind::Bool);
    pub const INT16: TypeRef = TypeRef::Primitive(PrimitiveKind::Int16);
    pub const INT32: TypeRef = TypeRef::Primitive(PrimitiveKind::Int32);
    pub const INT64: TypeRef = TypeRef::Primitive(PrimitiveKind::Int64);
    pub const FLOAT: TypeRef = TypeRef::Primitive(PrimitiveKind::Float32);
    pub const DOUBLE: TypeRef = TypeRef::Primitive(PrimitiveKind::Float64);
    pub const STRING: TypeRef = TypeRef::Primitive(PrimitiveKind::String);
    pub const VOID: TypeRef = TypeRef::Void;

    pub fn list(element: TypeRef) -> Self {
        TypeRef::List(Box::new(element))
    }

    pub fn set(element: TypeRef) -> Self {
        TypeRef::Set(Box::new(element))
    }

    pub fn map(key: TypeRef, value: TypeRef) -> Self {
        TypeRef::Map(Box::new(key), Box::new(value))
    }

    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named(name.into())
    }

    pub fn generic(name: impl Into<String>, args: Vec<TypeRef>) -> Self {
        TypeRef::Generic(name.into(), args)
    }

    pub fn var(name: impl Into<String>) -> Self {
        TypeRef::Var(name.into())
    }

    /// Replaces bound type variables with the types they are bound to.
    pub(crate) fn substitute(&self, bindings: &HashMap<String, TypeId>) -> TypeRef {
        match self {
            TypeRef::Var(name) => match bindings.get(name) {
                Some(id) => TypeRef::Id(*id),
                None => self.clone(),
            },
            TypeRef::List(element) => TypeRef::list(element.substitute(bindings)),
            TypeRef::Set(element) => TypeRef::set(element.substitute(bindings)),
            TypeRef::Map(key, value) => {
                TypeRef::map(key.substitute(bindings), value.substitute(bindings))
            }
            TypeRef::Generic(name, args) => TypeRef::Generic(
                name.clone(),
                args.iter().map(|arg| arg.substitute(bindings)).collect(),
            ),
            TypeRef::Primitive(_) | TypeRef::Void | TypeRef::Named(_) | TypeRef::Id(_) => {
                self.clone()
            }
        }
    }
}

impl From<PrimitiveKind> for TypeRef {
    fn from(kind: PrimitiveKind) -> Self {
        TypeRef::Primitive(kind)
    }
}

impl From<TypeId> for TypeRef {
    fn from(id: TypeId) -> Self {
        TypeRef::Id(id)
    }
}

#[derive(Debug)]
pub enum TypeDescriptor {
    Primitive(PrimitiveKind),
    Void,
    List(TypeId),
    Set(TypeId),
    Map(TypeId, TypeId),
    Enum(EnumDescriptor),
    Message(MessageDescriptor),
    Interface(InterfaceDescriptor),
    Variable(String),
}

impl TypeDescriptor {
    pub fn kind(&self) -> TypeKind {
        match self {
            TypeDescriptor::Primitive(_) => TypeKind::Primitive,
            TypeDescriptor::Void => TypeKind::Void,
            TypeDescriptor::List(_) => TypeKind::List,
            TypeDescriptor::Set(_) => TypeKind::Set,
            TypeDescriptor::Map(_, _) => TypeKind::Map,
            TypeDescriptor::Enum(_) => TypeKind::Enum,
            TypeDescriptor::Message(_) => TypeKind::Message,
            TypeDescriptor::Interface(_) => TypeKind::Interface,
            TypeDescriptor::Variable(_) => TypeKind::Variable,
        }
    }

    /// Registration identity of user-declared types.
    pub fn name(&self) -> Option<&str> {
        match self {
            TypeDescriptor::Enum(d) => Some(d.name()),
            TypeDescriptor::Message(d) => Some(d.name()),
            TypeDescriptor::Interface(d) => Some(d.name()),
            _ => None,
        }
    }

    pub fn type_params(&self) -> &[String] {
        match self {
            TypeDescriptor::Message(d) => d.type_params(),
            TypeDescriptor::Interface(d) => d.type_params(),
            _ => &[],
        }
    }

    pub fn as_enum(&self) -> Option<&EnumDescriptor> {
        match self {
            TypeDescriptor::Enum(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&MessageDescriptor> {
        match self {
            TypeDescriptor::Message(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_interface(&self) -> Option<&InterfaceDescriptor> {
        match self {
            TypeDescriptor::Interface(d) => Some(d),
            _ => None,
        }
    }

    fn substitute(&self, name: &str, bindings: &HashMap<String, TypeId>) -> TypeDescriptor {
        match self {
            TypeDescriptor::Message(d) => TypeDescriptor::Message(d.substitute(name, bindings)),
            TypeDescriptor::Interface(d) => {
                TypeDescriptor::Interface(d.substitute(name, bindings))
            }
            TypeDescriptor::Enum(d) => TypeDescriptor::Enum(d.clone()),
            TypeDescriptor::Primitive(kind) => TypeDescriptor::Primitive(*kind),
            TypeDescriptor::Void => TypeDescriptor::Void,
            TypeDescriptor::List(e) => TypeDescriptor::List(*e),
            TypeDescriptor::Set(e) => TypeDescriptor::Set(*e),
            TypeDescriptor::Map(k, v) => TypeDescriptor::Map(*k, *v),
            TypeDescriptor::Variable(v) => TypeDescriptor::Variable(v.clone()),
        }
    }
}

impl From<EnumDescriptor> for TypeDescriptor {
    fn from(d: EnumDescriptor) -> Self {
        TypeDescriptor::Enum(d)
    }
}

impl From<MessageDescriptor> for TypeDescriptor {
    fn from(d: MessageDescriptor) -> Self {
        TypeDescriptor::Message(d)
    }
}

impl From<InterfaceDescriptor> for TypeDescriptor {
    fn from(d: InterfaceDescriptor) -> Self {
        TypeDescriptor::Interface(d)
    }
}
