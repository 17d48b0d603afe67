use super::TypeRef;
use crate::ids::TypeId;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDescriptor {
    name: String,
    values: Vec<String>,
}

impl EnumDescriptor {
    pub fn new<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        EnumDescriptor {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Case-insensitive lookup returning the declared spelling.
    pub fn find(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|value| value.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeRef,
    pub discriminator: bool,
}

/// Linked field: name, resolved type and discriminator flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: TypeId,
    pub discriminator: bool,
}

#[derive(Debug)]
pub struct MessageDescriptor {
    name: String,
    type_params: Vec<String>,
    base: Option<TypeRef>,
    fields: Vec<FieldDecl>,
    discriminator_value: Option<String>,
    subtypes: Vec<TypeRef>,
    is_abstract: bool,
    pub(crate) layout: OnceLock<Arc<MessageLayout>>,
}

impl MessageDescriptor {
    pub fn builder(name: impl Into<String>) -> MessageBuilder {
        MessageBuilder {
            name: name.into(),
            type_params: Vec::new(),
            base: None,
            fields: Vec::new(),
            discriminator_value: None,
            subtypes: Vec::new(),
            is_abstract: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_params(&self) -> &[String] {
        &self.type_params
    }

    /// Polymorphic roots are usually abstract: only their subtypes travel.
    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn base(&self) -> Option<&TypeRef> {
        self.base.as_ref()
    }

    pub fn declared_fields(&self) -> &[FieldDecl] {
        &self.fields
    }

    pub fn discriminator_value(&self) -> Option<&str> {
        self.discriminator_value.as_deref()
    }

    pub fn declared_subtypes(&self) -> &[TypeRef] {
        &self.subtypes
    }

    pub fn is_linked(&self) -> bool {
        self.layout.get().is_some()
    }

    pub(crate) fn substitute(&self, name: &str, bindings: &HashMap<String, TypeId>) -> Self {
        MessageDescriptor {
            name: name.to_string(),
            type_params: Vec::new(),
            base: self.base.as_ref().map(|base| base.substitute(bindings)),
            fields: self
                .fields
                .iter()
                .map(|field| FieldDecl {
                    name: field.name.clone(),
                    ty: field.ty.substitute(bindings),
                    discriminator: field.discriminator,
                })
                .collect(),
            discriminator_value: self.discriminator_value.clone(),
            subtypes: self
                .subtypes
                .iter()
                .map(|subtype| subtype.substitute(bindings))
                .collect(),
            is_abstract: self.is_abstract,
            layout: OnceLock::new(),
        }
    }
}

pub struct MessageBuilder {
    name: String,
    type_params: Vec<String>,
    base: Option<TypeRef>,
    fields: Vec<FieldDecl>,
    discriminator_value: Option<String>,
    subtypes: Vec<TypeRef>,
    is_abstract: bool,
}

impl MessageBuilder {
    pub fn type_param(mut self, name: impl Into<String>) -> Self {
        self.type_params.push(name.into());
        self
    }

    pub fn base(mut self, base: TypeRef) -> Self {
        self.base = Some(base);
        self
    }

    pub fn field(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.fields.push(FieldDecl {
            name: name.into(),
            ty,
            discriminator: false,
        });
        self
    }

    /// Declares the field whose value selects the concrete subtype.
    pub fn discriminator(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.fields.push(FieldDecl {
            name: name.into(),
            ty,
            discriminator: true,
        });
        self
    }

    pub fn discriminator_value(mut self, value: impl Into<String>) -> Self {
        self.discriminator_value = Some(value.into());
        self
    }

    pub fn subtype(mut self, subtype: TypeRef) -> Self {
        self.subtypes.push(subtype);
        self
    }

    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn build(self) -> MessageDescriptor {
        MessageDescriptor {
            name: self.name,
            type_params: self.type_params,
            base: self.base,
            fields: self.fields,
            discriminator_value: self.discriminator_value,
            subtypes: self.subtypes,
            is_abstract: self.is_abstract,
            layout: OnceLock::new(),
        }
    }
}

/// Fully resolved shape of a message, computed once by the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageLayout {
    pub(crate) base: Option<TypeId>,
    pub(crate) fields: Vec<Field>,
    pub(crate) discriminator: Option<usize>,
    pub(crate) discriminator_value: Option<String>,
    pub(crate) subtypes: IndexMap<String, TypeId>,
}

impl MessageLayout {
    pub fn base(&self) -> Option<TypeId> {
        self.base
    }

    /// Inherited fields first, then declared ones.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn discriminator(&self) -> Option<&Field> {
        self.discriminator.map(|index| &self.fields[index])
    }

    pub fn discriminator_value(&self) -> Option<&str> {
        self.discriminator_value.as_deref()
    }

    pub fn is_polymorphic(&self) -> bool {
        self.discriminator.is_some()
    }

    /// Subtype registered for a discriminator value, compared case-insensitively.
    pub fn subtype(&self, value: &str) -> Option<TypeId> {
        self.subtypes.get(&value.to_ascii_lowercase()).copied()
    }

    pub fn subtypes(&self) -> &IndexMap<String, TypeId> {
        &self.subtypes
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDecl {
    pub name: String,
    pub args: Vec<(String, TypeRef)>,
    pub result: TypeRef,
}

#[derive(Debug)]
pub struct InterfaceDescriptor {
    name: String,
    type_params: Vec<String>,
    bases: Vec<TypeRef>,
    exc: Option<TypeRef>,
    methods: Vec<MethodDecl>,
    pub(crate) layout: OnceLock<Arc<InterfaceLayout>>,
}

impl InterfaceDescriptor {
    pub fn builder(name: impl Into<String>) -> InterfaceBuilder {
        InterfaceBuilder {
            name: name.into(),
            type_params: Vec::new(),
            bases: Vec::new(),
            exc: None,
            methods: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_params(&self) -> &[String] {
        &self.type_params
    }

    pub fn bases(&self) -> &[TypeRef] {
        &self.bases
    }

    pub fn exc(&self) -> Option<&TypeRef> {
        self.exc.as_ref()
    }

    pub fn declared_methods(&self) -> &[MethodDecl] {
        &self.methods
    }

    pub fn is_linked(&self) -> bool {
        self.layout.get().is_some()
    }

    pub(crate) fn substitute(&self, name: &str, bindings: &HashMap<String, TypeId>) -> Self {
        InterfaceDescriptor {
            name: name.to_string(),
            type_params: Vec::new(),
            bases: self.bases.iter().map(|b| b.substitute(bindings)).collect(),
            exc: self.exc.as_ref().map(|e| e.substitute(bindings)),
            methods: self
                .methods
                .iter()
                .map(|method| MethodDecl {
                    name: method.name.clone(),
                    args: method
                        .args
                        .iter()
                        .map(|(arg, ty)| (arg.clone(), ty.substitute(bindings)))
                        .collect(),
                    result: method.result.substitute(bindings),
                })
                .collect(),
            layout: OnceLock::new(),
        }
    }
}

pub struct InterfaceBuilder {
    name: String,
    type_params: Vec<String>,
    bases: Vec<TypeRef>,
    exc: Option<TypeRef>,
    methods: Vec<MethodDecl>,
}

impl InterfaceBuilder {
    pub fn type_param(mut self, name: impl Into<String>) -> Self {
        self.type_params.push(name.into());
        self
    }

    pub fn base(mut self, base: TypeRef) -> Self {
        self.bases.push(base);
        self
    }

    pub fn exc(mut self, exc: TypeRef) -> Self {
        self.exc = Some(exc);
        self
    }

    /// Adds a method; argument order is the positional wire contract.
    pub fn method(mut self, name: impl Into<String>, args: &[(&str, TypeRef)], result: TypeRef) -> Self {
        self.methods.push(MethodDecl {
            name: name.into(),
            args: args
                .iter()
                .map(|(arg, ty)| (arg.to_string(), ty.clone()))
                .collect(),
            result,
        });
        self
    }

    pub fn build(self) -> InterfaceDescriptor {
        InterfaceDescriptor {
            name: self.name,
            type_params: self.type_params,
            bases: self.bases,
            exc: self.exc,
            methods: self.methods,
            layout: OnceLock::new(),
        }
    }
}

/// Flattened method table of a linked interface.
#[derive(Debug, Clone)]
pub struct InterfaceLayout {
    pub(crate) exc: Option<TypeId>,
    pub(crate) methods: IndexMap<String, Arc<MethodDescriptor>>,
}

impl InterfaceLayout {
    pub fn exc(&self) -> Option<TypeId> {
        self.exc
    }

    pub fn methods(&self) -> impl Iterator<Item = &Arc<MethodDescriptor>> {
        self.methods.values()
    }

    pub fn method(&self, name: &str) -> Option<&Arc<MethodDescriptor>> {
        self.methods.get(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgDescriptor {
    pub name: String,
    pub ty: TypeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub(crate) name: String,
    pub(crate) args: Vec<ArgDescriptor>,
    pub(crate) result: TypeId,
    pub(crate) remote: bool,
    pub(crate) exc: Option<TypeId>,
    pub(crate) interface: TypeId,
}

impl MethodDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[ArgDescriptor] {
        &self.args
    }

    pub fn result(&self) -> TypeId {
        self.result
    }

    /// True iff the result is a data type, i.e. calling it ends a chain.
    pub fn is_remote(&self) -> bool {
        self.remote
    }

    /// Exception declared by the interface this method belongs to.
    pub fn exc(&self) -> Option<TypeId> {
        self.exc
    }

    pub fn interface(&self) -> TypeId {
        self.interface
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", arg.name)?;
        }
        write!(f, ")")
    }
}
