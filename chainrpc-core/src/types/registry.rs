use super::{
    ArgDescriptor, EnumDescriptor, Field, InterfaceDescriptor, InterfaceLayout, MessageDescriptor,
    MessageLayout, MethodDescriptor, PrimitiveKind, TypeDescriptor, TypeError, TypeKind, TypeRef,
};
use crate::ids::{TypeId, TypeIdAllocator};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Keys of structurally identified types, which are created on first use.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TypeKey {
    List(TypeId),
    Set(TypeId),
    Map(TypeId, TypeId),
    Var(String),
    Parameterized(TypeId, Vec<TypeId>),
}

/// Owner of every descriptor known to a process.
///
/// Registration and [`TypeRegistry::link`] normally run once at start-up.
/// Afterwards lookups are lock-free reads on sharded maps; the only mutation
/// is interning of collection and parameterized types, which goes through
/// map entry locks so that concurrent callers always agree on one `TypeId`.
pub struct TypeRegistry {
    allocator: TypeIdAllocator,
    types: DashMap<TypeId, Arc<TypeDescriptor>>,
    names: DashMap<String, TypeId>,
    interned: DashMap<TypeKey, TypeId>,
    primitives: Vec<TypeId>,
    void: TypeId,
}

impl TypeRegistry {
    pub fn new() -> Self {
        let allocator = TypeIdAllocator::new();
        let types = DashMap::new();
        let names = DashMap::new();

        let mut primitives = Vec::with_capacity(PrimitiveKind::ALL.len());
        for kind in PrimitiveKind::ALL {
            let id = allocator.allocate();
            types.insert(id, Arc::new(TypeDescriptor::Primitive(kind)));
            names.insert(kind.name().to_string(), id);
            primitives.push(id);
        }

        let void = allocator.allocate();
        types.insert(void, Arc::new(TypeDescriptor::Void));
        names.insert("void".to_string(), void);

        TypeRegistry {
            allocator,
            types,
            names,
            interned: DashMap::new(),
            primitives,
            void,
        }
    }

    /// Registers an enum, message or interface under its name.
    ///
    /// Registering the same instance twice returns the existing id.
    pub fn register(&self, descriptor: Arc<TypeDescriptor>) -> Result<TypeId, TypeError> {
        let name = match descriptor.name() {
            Some(name) => name.to_string(),
            None => return Err(TypeError::NotRegistrable(format!("{:?}", descriptor.kind()))),
        };

        match self.names.entry(name) {
            Entry::Occupied(entry) => {
                let id = *entry.get();
                match self.types.get(&id) {
                    Some(existing) if Arc::ptr_eq(existing.value(), &descriptor) => Ok(id),
                    _ => Err(TypeError::DuplicateType(entry.key().clone())),
                }
            }
            Entry::Vacant(entry) => {
                let id = self.allocator.allocate();
                tracing::debug!(name = %entry.key(), kind = ?descriptor.kind(), %id, "Registered type");
                self.types.insert(id, descriptor);
                entry.insert(id);
                Ok(id)
            }
        }
    }

    pub fn register_enum(&self, descriptor: EnumDescriptor) -> Result<TypeId, TypeError> {
        self.register(Arc::new(descriptor.into()))
    }

    pub fn register_message(&self, descriptor: MessageDescriptor) -> Result<TypeId, TypeError> {
        self.register(Arc::new(descriptor.into()))
    }

    pub fn register_interface(&self, descriptor: InterfaceDescriptor) -> Result<TypeId, TypeError> {
        self.register(Arc::new(descriptor.into()))
    }

    /// Resolves the references of every registered message and interface.
    ///
    /// Safe to call repeatedly: descriptors that are already linked are
    /// skipped. Parameterized types created afterwards link on first use.
    pub fn link(&self) -> Result<(), TypeError> {
        let mut ids: Vec<TypeId> = self.names.iter().map(|entry| *entry.value()).collect();
        ids.sort();

        for id in ids {
            match self.descriptor(id)?.kind() {
                TypeKind::Message => {
                    self.message_layout(id)?;
                }
                TypeKind::Interface => {
                    self.interface_layout(id)?;
                }
                _ => {}
            }
        }

        tracing::debug!(types = self.types.len(), "Linked type registry");
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<TypeId, TypeError> {
        self.names
            .get(name)
            .map(|entry| *entry.value())
            .ok_or_else(|| TypeError::UnknownType(name.to_string()))
    }

    pub fn descriptor(&self, id: TypeId) -> Result<Arc<TypeDescriptor>, TypeError> {
        self.types
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(TypeError::UnknownId(id))
    }

    pub fn kind(&self, id: TypeId) -> Result<TypeKind, TypeError> {
        Ok(self.descriptor(id)?.kind())
    }

    pub fn primitive(&self, kind: PrimitiveKind) -> TypeId {
        self.primitives[kind as usize]
    }

    pub fn void(&self) -> TypeId {
        self.void
    }

    pub fn list_of(&self, element: TypeId) -> TypeId {
        self.intern(TypeKey::List(element), || TypeDescriptor::List(element))
    }

    pub fn set_of(&self, element: TypeId) -> TypeId {
        self.intern(TypeKey::Set(element), || TypeDescriptor::Set(element))
    }

    pub fn map_of(&self, key: TypeId, value: TypeId) -> TypeId {
        self.intern(TypeKey::Map(key, value), || TypeDescriptor::Map(key, value))
    }

    pub fn variable(&self, name: &str) -> TypeId {
        let owned = name.to_string();
        self.intern(TypeKey::Var(owned.clone()), || TypeDescriptor::Variable(owned))
    }

    // `make` runs under the entry lock and must not touch `interned`.
    fn intern(&self, key: TypeKey, make: impl FnOnce() -> TypeDescriptor) -> TypeId {
        if let Some(id) = self.interned.get(&key) {
            return *id;
        }

        match self.interned.entry(key) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                let id = self.allocator.allocate();
                self.types.insert(id, Arc::new(make()));
                *entry.insert(id)
            }
        }
    }

    /// Binds the type variables of a generic message or interface.
    ///
    /// Identical arguments always yield the identical `TypeId`. The result
    /// is registered as `Name<Arg1, Arg2>` and linked lazily.
    pub fn parameterize(&self, generic: TypeId, args: &[TypeId]) -> Result<TypeId, TypeError> {
        let descriptor = self.descriptor(generic)?;
        let params = descriptor.type_params();
        let name = descriptor
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| self.type_name(generic));

        if params.len() != args.len() {
            return Err(TypeError::Arity {
                name,
                expected: params.len(),
                actual: args.len(),
            });
        }
        if params.is_empty() {
            return Ok(generic);
        }
        // Self-references inside a generic declaration, e.g. `Node<T>` in `Node<T>`.
        if params
            .iter()
            .zip(args)
            .all(|(param, arg)| self.variable(param) == *arg)
        {
            return Ok(generic);
        }

        let key = TypeKey::Parameterized(generic, args.to_vec());
        if let Some(id) = self.interned.get(&key) {
            return Ok(*id);
        }

        let bindings: HashMap<String, TypeId> =
            params.iter().cloned().zip(args.iter().copied()).collect();
        let arg_names: Vec<String> = args.iter().map(|arg| self.type_name(*arg)).collect();
        let qualified = format!("{}<{}>", name, arg_names.join(", "));
        let substituted = Arc::new(descriptor.substitute(&qualified, &bindings));

        let id = match self.interned.entry(key) {
            Entry::Occupied(entry) => return Ok(*entry.get()),
            Entry::Vacant(entry) => {
                let id = self.allocator.allocate();
                self.types.insert(id, substituted);
                *entry.insert(id)
            }
        };
        self.names.entry(qualified.clone()).or_insert(id);

        tracing::debug!(generic = %name, parameterized = %qualified, %id, "Parameterized type");
        Ok(id)
    }

    /// Resolves a build-time reference to a registered or interned type.
    pub fn resolve_ref(&self, type_ref: &TypeRef) -> Result<TypeId, TypeError> {
        match type_ref {
            TypeRef::Primitive(kind) => Ok(self.primitive(*kind)),
            TypeRef::Void => Ok(self.void),
            TypeRef::List(element) => Ok(self.list_of(self.resolve_ref(element)?)),
            TypeRef::Set(element) => Ok(self.set_of(self.resolve_ref(element)?)),
            TypeRef::Map(key, value) => {
                let key = self.resolve_ref(key)?;
                let value = self.resolve_ref(value)?;
                Ok(self.map_of(key, value))
            }
            TypeRef::Named(name) => {
                let id = self.resolve(name)?;
                let params = self.descriptor(id)?.type_params().len();
                if params != 0 {
                    return Err(TypeError::Arity {
                        name: name.clone(),
                        expected: params,
                        actual: 0,
                    });
                }
                Ok(id)
            }
            TypeRef::Generic(name, args) => {
                let generic = self.resolve(name)?;
                let args = args
                    .iter()
                    .map(|arg| self.resolve_ref(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                self.parameterize(generic, &args)
            }
            TypeRef::Var(name) => Ok(self.variable(name)),
            TypeRef::Id(id) => {
                self.descriptor(*id)?;
                Ok(*id)
            }
        }
    }

    /// Human readable name, e.g. `list<int32>` or `Page<string>`.
    pub fn type_name(&self, id: TypeId) -> String {
        let descriptor = match self.descriptor(id) {
            Ok(descriptor) => descriptor,
            Err(_) => return id.to_string(),
        };

        match &*descriptor {
            TypeDescriptor::Primitive(kind) => kind.name().to_string(),
            TypeDescriptor::Void => "void".to_string(),
            TypeDescriptor::List(element) => format!("list<{}>", self.type_name(*element)),
            TypeDescriptor::Set(element) => format!("set<{}>", self.type_name(*element)),
            TypeDescriptor::Map(key, value) => {
                format!("map<{}, {}>", self.type_name(*key), self.type_name(*value))
            }
            TypeDescriptor::Enum(d) => d.name().to_string(),
            TypeDescriptor::Message(d) => d.name().to_string(),
            TypeDescriptor::Interface(d) => d.name().to_string(),
            TypeDescriptor::Variable(name) => name.clone(),
        }
    }

    /// Linked layout of a message, linking it first if needed.
    pub fn message_layout(&self, id: TypeId) -> Result<Arc<MessageLayout>, TypeError> {
        self.link_message(id, &mut Vec::new())
    }

    /// Linked layout of an interface, linking it first if needed.
    pub fn interface_layout(&self, id: TypeId) -> Result<Arc<InterfaceLayout>, TypeError> {
        self.link_interface(id, &mut Vec::new())
    }

    pub fn find_method(
        &self,
        interface: TypeId,
        name: &str,
    ) -> Result<Option<Arc<MethodDescriptor>>, TypeError> {
        Ok(self.interface_layout(interface)?.method(name).cloned())
    }

    /// True if `sub` is `sup` or inherits from it.
    pub fn is_subtype(&self, sub: TypeId, sup: TypeId) -> bool {
        let mut current = Some(sub);
        while let Some(id) = current {
            if id == sup {
                return true;
            }
            current = match self.message_layout(id) {
                Ok(layout) => layout.base,
                Err(_) => None,
            };
        }
        false
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    fn link_message(
        &self,
        id: TypeId,
        stack: &mut Vec<TypeId>,
    ) -> Result<Arc<MessageLayout>, TypeError> {
        let descriptor = self.descriptor(id)?;
        let message = descriptor.as_message().ok_or_else(|| TypeError::WrongKind {
            name: self.type_name(id),
            expected: "a message",
        })?;

        if let Some(layout) = message.layout.get() {
            return Ok(Arc::clone(layout));
        }
        if stack.contains(&id) {
            return Err(TypeError::CyclicInheritance(message.name().to_string()));
        }

        stack.push(id);
        let result = self.build_message_layout(id, message, stack);
        stack.pop();

        // A concurrent link may have won the race; keep the published layout.
        let layout = result?;
        Ok(Arc::clone(message.layout.get_or_init(|| Arc::new(layout))))
    }

    fn build_message_layout(
        &self,
        id: TypeId,
        message: &MessageDescriptor,
        stack: &mut Vec<TypeId>,
    ) -> Result<MessageLayout, TypeError> {
        let (base, mut fields) = match message.base() {
            None => (None, Vec::new()),
            Some(base_ref) => {
                let base_id = self.resolve_ref(base_ref)?;
                if self.kind(base_id)? != TypeKind::Message {
                    return Err(TypeError::InvalidBase {
                        name: message.name().to_string(),
                        base: self.type_name(base_id),
                    });
                }
                let base_layout = self.link_message(base_id, stack)?;
                (Some(base_id), base_layout.fields.clone())
            }
        };

        for decl in message.declared_fields() {
            fields.push(Field {
                name: decl.name.clone(),
                ty: self.resolve_ref(&decl.ty)?,
                discriminator: decl.discriminator,
            });
        }
        let discriminator = fields.iter().position(|field| field.discriminator);

        let mut subtypes = IndexMap::new();
        if discriminator.is_some() {
            if let Some(value) = message.discriminator_value() {
                subtypes.insert(value.to_ascii_lowercase(), id);
            }
        }
        let mut visited = vec![id];
        self.collect_subtypes(message, &mut subtypes, &mut visited)?;

        tracing::trace!(
            message = %message.name(),
            fields = fields.len(),
            subtypes = subtypes.len(),
            "Linked message"
        );

        Ok(MessageLayout {
            base,
            fields,
            discriminator,
            discriminator_value: message.discriminator_value().map(str::to_string),
            subtypes,
        })
    }

    // Subtypes are resolved without linking them, since they link through
    // this message as their base.
    fn collect_subtypes(
        &self,
        message: &MessageDescriptor,
        subtypes: &mut IndexMap<String, TypeId>,
        visited: &mut Vec<TypeId>,
    ) -> Result<(), TypeError> {
        for subtype_ref in message.declared_subtypes() {
            let subtype_id = self.resolve_ref(subtype_ref)?;
            if visited.contains(&subtype_id) {
                continue;
            }
            visited.push(subtype_id);

            let descriptor = self.descriptor(subtype_id)?;
            let subtype = descriptor.as_message().ok_or_else(|| TypeError::InvalidSubtype {
                name: message.name().to_string(),
                subtype: self.type_name(subtype_id),
            })?;
            let value = subtype
                .discriminator_value()
                .ok_or_else(|| TypeError::InvalidSubtype {
                    name: message.name().to_string(),
                    subtype: subtype.name().to_string(),
                })?;

            subtypes.insert(value.to_ascii_lowercase(), subtype_id);
            self.collect_subtypes(subtype, subtypes, visited)?;
        }
        Ok(())
    }

    fn link_interface(
        &self,
        id: TypeId,
        stack: &mut Vec<TypeId>,
    ) -> Result<Arc<InterfaceLayout>, TypeError> {
        let descriptor = self.descriptor(id)?;
        let interface = descriptor.as_interface().ok_or_else(|| TypeError::WrongKind {
            name: self.type_name(id),
            expected: "an interface",
        })?;

        if let Some(layout) = interface.layout.get() {
            return Ok(Arc::clone(layout));
        }
        if stack.contains(&id) {
            return Err(TypeError::CyclicInheritance(interface.name().to_string()));
        }

        stack.push(id);
        let result = self.build_interface_layout(id, interface, stack);
        stack.pop();

        let layout = result?;
        Ok(Arc::clone(interface.layout.get_or_init(|| Arc::new(layout))))
    }

    fn build_interface_layout(
        &self,
        id: TypeId,
        interface: &InterfaceDescriptor,
        stack: &mut Vec<TypeId>,
    ) -> Result<InterfaceLayout, TypeError> {
        let mut methods: IndexMap<String, Arc<MethodDescriptor>> = IndexMap::new();
        let mut inherited_exc = None;

        for (index, base_ref) in interface.bases().iter().enumerate() {
            let base_id = self.resolve_ref(base_ref)?;
            if self.kind(base_id)? != TypeKind::Interface {
                return Err(TypeError::InvalidBase {
                    name: interface.name().to_string(),
                    base: self.type_name(base_id),
                });
            }

            let base_layout = self.link_interface(base_id, stack)?;
            if index == 0 {
                inherited_exc = base_layout.exc;
            }
            for method in base_layout.methods() {
                methods.insert(method.name.clone(), Arc::clone(method));
            }
        }

        let exc = match interface.exc() {
            Some(exc_ref) => {
                let exc_id = self.resolve_ref(exc_ref)?;
                if self.kind(exc_id)? != TypeKind::Message {
                    return Err(TypeError::InvalidException {
                        interface: interface.name().to_string(),
                        exc: self.type_name(exc_id),
                    });
                }
                Some(exc_id)
            }
            None => inherited_exc,
        };

        for decl in interface.declared_methods() {
            let args = decl
                .args
                .iter()
                .map(|(name, ty)| {
                    Ok(ArgDescriptor {
                        name: name.clone(),
                        ty: self.resolve_ref(ty)?,
                    })
                })
                .collect::<Result<Vec<_>, TypeError>>()?;
            let result = self.resolve_ref(&decl.result)?;
            let remote = self.kind(result)? != TypeKind::Interface;

            methods.insert(
                decl.name.clone(),
                Arc::new(MethodDescriptor {
                    name: decl.name.clone(),
                    args,
                    result,
                    remote,
                    exc,
                    interface: id,
                }),
            );
        }

        tracing::trace!(interface = %interface.name(), methods = methods.len(), "Linked interface");
        Ok(InterfaceLayout { exc, methods })
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.types.len())
            .field("names", &self.names.len())
            .field("interned", &self.interned.len())
            .finish()
    }
}
