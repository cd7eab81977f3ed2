//! Type metadata supplied by the host
//!
//! Rust carries no runtime reflection, so a host describes the types it wants
//! wrapped: which compiled unit declares them, their generic arguments, and
//! the methods and properties they expose. Generated types describe
//! themselves with the same structures, which is what lets one generation
//! wrap the output of another.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::HostResult;
use crate::value::{ObjectRef, Value};

/// Factory producing a fresh instance of a type from constructor arguments.
///
/// Host types usually accept only the empty argument list.
pub type Activator = Arc<dyn Fn(&[Value]) -> HostResult<ObjectRef> + Send + Sync>;

// ============================================================================
// Units
// ============================================================================

/// Name and version identifying a compiled unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnitRef {
    /// Unit name
    pub name: String,
    /// Unit version
    pub version: String,
}

impl fmt::Display for UnitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, Version={}", self.name, self.version)
    }
}

/// A compiled unit: the binary origin of a set of types.
pub struct UnitDescriptor {
    name: String,
    version: String,
    /// On-disk (or otherwise stable) location. `None` for in-memory units.
    location: Option<String>,
    dependencies: RwLock<Vec<Arc<UnitDescriptor>>>,
    types: RwLock<Vec<Arc<TypeDescriptor>>>,
}

impl UnitDescriptor {
    /// Create a unit with no stable location.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Self::create(name.into(), "1.0.0".to_string(), None)
    }

    /// Create a unit that lives at `location`.
    pub fn located(name: impl Into<String>, location: impl Into<String>) -> Arc<Self> {
        Self::create(name.into(), "1.0.0".to_string(), Some(location.into()))
    }

    /// Create a unit with every identity field spelled out.
    pub fn create(name: String, version: String, location: Option<String>) -> Arc<Self> {
        Arc::new(Self {
            name,
            version,
            location,
            dependencies: RwLock::new(Vec::new()),
            types: RwLock::new(Vec::new()),
        })
    }

    /// Unit name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unit version
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Stable location, if the unit has one
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Name/version pair for this unit
    pub fn unit_ref(&self) -> UnitRef {
        UnitRef {
            name: self.name.clone(),
            version: self.version.clone(),
        }
    }

    /// Declare that this unit references `unit`.
    pub fn add_dependency(&self, unit: Arc<UnitDescriptor>) {
        let mut deps = self.dependencies.write();
        if !deps.iter().any(|d| d.name == unit.name) {
            deps.push(unit);
        }
    }

    /// Units this unit references
    pub fn dependencies(&self) -> Vec<Arc<UnitDescriptor>> {
        self.dependencies.read().clone()
    }

    /// Record a type definition exported by this unit.
    ///
    /// The unit owns its exports for as long as it lives, so a host may keep
    /// only the unit. Registering a second definition under the same full
    /// name replaces the first.
    pub fn register_type(&self, ty: &Arc<TypeDescriptor>) {
        let mut types = self.types.write();
        types.retain(|t| t.full_name() != ty.full_name());
        types.push(ty.clone());
    }

    /// Look up an exported type definition by full name (arity marker included).
    pub fn find_type(&self, full_name: &str) -> Option<Arc<TypeDescriptor>> {
        self.types
            .read()
            .iter()
            .find(|t| t.full_name() == full_name)
            .cloned()
    }

    /// All exported type definitions, in registration order
    pub fn types(&self) -> Vec<Arc<TypeDescriptor>> {
        self.types.read().clone()
    }
}

impl fmt::Debug for UnitDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitDescriptor")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("location", &self.location)
            .finish()
    }
}

// ============================================================================
// Types
// ============================================================================

/// Primitive value categories understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 64-bit float
    Double,
    /// Boolean
    Boolean,
    /// UTF-8 string
    String,
    /// Any value
    Object,
    /// Ordered list of values
    List,
}

/// What sort of type a descriptor names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Instantiable class
    Class,
    /// Interface (method contract only)
    Interface,
    /// Primitive value type
    Primitive(PrimitiveKind),
    /// "No value"
    Void,
    /// Unbound generic parameter such as `T`
    GenericParameter,
    /// Static support type whose methods are engine intrinsics
    Runtime,
}

/// Descriptor of one method parameter.
#[derive(Clone)]
pub struct ParameterDescriptor {
    /// Declared name, when the host knows it
    pub name: Option<String>,
    /// Parameter type
    pub ty: Arc<TypeDescriptor>,
    /// Zero-based position
    pub position: usize,
}

impl fmt::Debug for ParameterDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.ty, self.name.as_deref().unwrap_or("_"))
    }
}

/// Descriptor of a method.
#[derive(Clone)]
pub struct MethodDescriptor {
    /// Method name
    pub name: String,
    /// Parameters in declaration order
    pub parameters: Vec<ParameterDescriptor>,
    /// Return type (`core.Void` for none)
    pub return_type: Arc<TypeDescriptor>,
    /// Full name of the type that declares the method
    pub declaring_type: String,
    /// Publicly callable
    pub is_public: bool,
    /// Static (no receiver)
    pub is_static: bool,
    /// Generic method definition
    pub is_generic: bool,
    /// Compiler-generated accessor or operator
    pub is_special: bool,
    /// Has no body
    pub is_abstract: bool,
}

impl MethodDescriptor {
    /// Public instance method with no parameters yet.
    pub fn new(name: impl Into<String>, return_type: Arc<TypeDescriptor>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            return_type,
            declaring_type: String::new(),
            is_public: true,
            is_static: false,
            is_generic: false,
            is_special: false,
            is_abstract: false,
        }
    }

    /// Append a named parameter.
    pub fn param(mut self, name: impl Into<String>, ty: Arc<TypeDescriptor>) -> Self {
        let position = self.parameters.len();
        self.parameters.push(ParameterDescriptor {
            name: Some(name.into()),
            ty,
            position,
        });
        self
    }

    /// Append a parameter the host has no name for.
    pub fn unnamed_param(mut self, ty: Arc<TypeDescriptor>) -> Self {
        let position = self.parameters.len();
        self.parameters.push(ParameterDescriptor { name: None, ty, position });
        self
    }

    /// Set the declaring type explicitly (inherited members).
    pub fn declared_on(mut self, full_name: impl Into<String>) -> Self {
        self.declaring_type = full_name.into();
        self
    }

    /// Mark the method static.
    pub fn static_(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Mark the method non-public.
    pub fn private(mut self) -> Self {
        self.is_public = false;
        self
    }

    /// Mark the method as a generic definition.
    pub fn generic(mut self) -> Self {
        self.is_generic = true;
        self
    }

    /// Mark the method as compiler-generated.
    pub fn special(mut self) -> Self {
        self.is_special = true;
        self
    }

    /// Mark the method abstract.
    pub fn abstract_(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// True when the method returns no value
    pub fn returns_void(&self) -> bool {
        self.return_type.is_void()
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}({:?})", self.return_type, self.name, self.parameters)
    }
}

/// Descriptor of a property.
#[derive(Clone)]
pub struct PropertyDescriptor {
    /// Property name
    pub name: String,
    /// Property type
    pub ty: Arc<TypeDescriptor>,
    /// Has a public getter
    pub can_read: bool,
    /// Has a public setter
    pub can_write: bool,
    /// Visible outside the type
    pub is_public: bool,
}

impl PropertyDescriptor {
    /// Public read/write property.
    pub fn new(name: impl Into<String>, ty: Arc<TypeDescriptor>) -> Self {
        Self {
            name: name.into(),
            ty,
            can_read: true,
            can_write: true,
            is_public: true,
        }
    }

    /// Drop the setter.
    pub fn read_only(mut self) -> Self {
        self.can_write = false;
        self
    }

    /// Hide the property.
    pub fn private(mut self) -> Self {
        self.is_public = false;
        self
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {{{}{}}}",
            self.ty,
            self.name,
            if self.can_read { " get;" } else { "" },
            if self.can_write { " set;" } else { "" }
        )
    }
}

/// Immutable description of a type.
pub struct TypeDescriptor {
    namespace: String,
    name: String,
    kind: TypeKind,
    generic_args: Vec<Arc<TypeDescriptor>>,
    definition: Option<Arc<TypeDescriptor>>,
    base: Option<Arc<TypeDescriptor>>,
    interfaces: Vec<Arc<TypeDescriptor>>,
    methods: Vec<MethodDescriptor>,
    properties: Vec<PropertyDescriptor>,
    unit: Arc<UnitDescriptor>,
    activator: Option<Activator>,
}

impl TypeDescriptor {
    /// Start describing a class.
    pub fn class(namespace: impl Into<String>, name: impl Into<String>) -> TypeBuilder {
        TypeBuilder::new(namespace.into(), name.into(), TypeKind::Class)
    }

    /// Start describing an interface.
    pub fn interface(namespace: impl Into<String>, name: impl Into<String>) -> TypeBuilder {
        TypeBuilder::new(namespace.into(), name.into(), TypeKind::Interface)
    }

    /// Start describing a type of any kind.
    pub fn of_kind(namespace: impl Into<String>, name: impl Into<String>, kind: TypeKind) -> TypeBuilder {
        TypeBuilder::new(namespace.into(), name.into(), kind)
    }

    /// Close a generic definition over concrete arguments.
    ///
    /// The result shares the definition's unit and members but is not
    /// registered as an export of that unit.
    pub fn instantiate(definition: &Arc<TypeDescriptor>, args: Vec<Arc<TypeDescriptor>>) -> Arc<TypeDescriptor> {
        Arc::new(TypeDescriptor {
            namespace: definition.namespace.clone(),
            name: definition.name.clone(),
            kind: definition.kind,
            generic_args: args,
            definition: Some(definition.clone()),
            base: definition.base.clone(),
            interfaces: definition.interfaces.clone(),
            methods: definition.methods.clone(),
            properties: definition.properties.clone(),
            unit: definition.unit.clone(),
            activator: definition.activator.clone(),
        })
    }

    /// Namespace (may be empty)
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Simple name, arity marker included for generic types
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace-qualified name, arity marker included, no arguments
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// Identity key: declaring unit plus full name and arguments.
    pub fn key(&self) -> String {
        format!("{}!{}", self.unit.name(), self)
    }

    /// Type kind
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Generic arguments (empty for non-generic and open definitions)
    pub fn generic_args(&self) -> &[Arc<TypeDescriptor>] {
        &self.generic_args
    }

    /// Definition this type was instantiated from
    pub fn definition(&self) -> Option<&Arc<TypeDescriptor>> {
        self.definition.as_ref()
    }

    /// True for generic definitions and their instantiations
    pub fn is_generic(&self) -> bool {
        !self.generic_args.is_empty() || self.name.contains('`')
    }

    /// True for the "no value" type
    pub fn is_void(&self) -> bool {
        self.kind == TypeKind::Void
    }

    /// True for interfaces
    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    /// Base class
    pub fn base(&self) -> Option<&Arc<TypeDescriptor>> {
        self.base.as_ref()
    }

    /// Implemented interfaces
    pub fn interfaces(&self) -> &[Arc<TypeDescriptor>] {
        &self.interfaces
    }

    /// Methods, inherited ones included
    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    /// Properties
    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    /// First method with the given name and arity
    pub fn find_method(&self, name: &str, arity: usize) -> Option<&MethodDescriptor> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.parameters.len() == arity)
    }

    /// First method with the given name
    pub fn find_method_named(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Property by name
    pub fn find_property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Declaring unit
    pub fn unit(&self) -> &Arc<UnitDescriptor> {
        &self.unit
    }

    /// Instance factory, if the type has one
    pub fn activator(&self) -> Option<&Activator> {
        self.activator.as_ref()
    }

    /// Whether a value of this type may be used where `target` is expected.
    pub fn is_assignable_to(&self, target: &TypeDescriptor) -> bool {
        if self.key() == target.key() || target.kind == TypeKind::Primitive(PrimitiveKind::Object) {
            return true;
        }
        if self.interfaces.iter().any(|i| i.is_assignable_to(target)) {
            return true;
        }
        match &self.base {
            Some(base) => base.is_assignable_to(target),
            None => false,
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name())?;
        if !self.generic_args.is_empty() {
            write!(f, "[")?;
            for (i, arg) in self.generic_args.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{}", arg)?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.to_string())
            .field("kind", &self.kind)
            .field("unit", &self.unit.name())
            .finish()
    }
}

/// Builder for [`TypeDescriptor`].
pub struct TypeBuilder {
    namespace: String,
    name: String,
    kind: TypeKind,
    base: Option<Arc<TypeDescriptor>>,
    interfaces: Vec<Arc<TypeDescriptor>>,
    methods: Vec<MethodDescriptor>,
    properties: Vec<PropertyDescriptor>,
    activator: Option<Activator>,
}

impl TypeBuilder {
    fn new(namespace: String, name: String, kind: TypeKind) -> Self {
        Self {
            namespace,
            name,
            kind,
            base: None,
            interfaces: Vec::new(),
            methods: Vec::new(),
            properties: Vec::new(),
            activator: None,
        }
    }

    /// Set the base class; its methods are inherited.
    pub fn base(mut self, base: Arc<TypeDescriptor>) -> Self {
        self.base = Some(base);
        self
    }

    /// Add an implemented interface.
    pub fn implements(mut self, iface: Arc<TypeDescriptor>) -> Self {
        self.interfaces.push(iface);
        self
    }

    /// Add a method. Methods without a declaring type are declared here.
    pub fn method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    /// Add a property.
    pub fn property(mut self, property: PropertyDescriptor) -> Self {
        self.properties.push(property);
        self
    }

    /// Set the instance factory.
    pub fn activator<F>(mut self, f: F) -> Self
    where
        F: Fn(&[Value]) -> HostResult<ObjectRef> + Send + Sync + 'static,
    {
        self.activator = Some(Arc::new(f));
        self
    }

    /// Set an already shared factory.
    pub fn shared_activator(mut self, activator: Activator) -> Self {
        self.activator = Some(activator);
        self
    }

    /// Finish the descriptor and register it as an export of `unit`.
    pub fn build(self, unit: &Arc<UnitDescriptor>) -> Arc<TypeDescriptor> {
        let ty = self.build_detached(unit);
        unit.register_type(&ty);
        ty
    }

    /// Finish the descriptor without registering it with `unit`.
    ///
    /// Used for forward references to a type that is still being built.
    pub fn build_detached(self, unit: &Arc<UnitDescriptor>) -> Arc<TypeDescriptor> {
        let full_name = if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        };

        let mut methods: Vec<MethodDescriptor> = self
            .methods
            .into_iter()
            .map(|mut m| {
                if m.declaring_type.is_empty() {
                    m.declaring_type = full_name.clone();
                }
                m
            })
            .collect();

        // Inherited members come after declared ones, overridden names excluded.
        if let Some(base) = &self.base {
            for inherited in base.methods() {
                let shadowed = methods
                    .iter()
                    .any(|m| m.name == inherited.name && m.parameters.len() == inherited.parameters.len());
                if !shadowed {
                    methods.push(inherited.clone());
                }
            }
        }

        let mut properties = self.properties;
        if let Some(base) = &self.base {
            for inherited in base.properties() {
                if !properties.iter().any(|p| p.name == inherited.name) {
                    properties.push(inherited.clone());
                }
            }
        }

        Arc::new(TypeDescriptor {
            namespace: self.namespace,
            name: self.name,
            kind: self.kind,
            generic_args: Vec::new(),
            definition: None,
            base: self.base,
            interfaces: self.interfaces,
            methods,
            properties,
            unit: unit.clone(),
            activator: self.activator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::core_types;

    #[test]
    fn test_unit_find_type() {
        let unit = UnitDescriptor::located("app", "/opt/app/app.lmod");
        let ty = TypeDescriptor::class("App.Models", "Product").build(&unit);

        let found = unit.find_type("App.Models.Product").unwrap();
        assert!(Arc::ptr_eq(&found, &ty));
        assert!(unit.find_type("App.Models.Missing").is_none());
    }

    #[test]
    fn test_unit_keeps_types_the_host_dropped() {
        let unit = UnitDescriptor::new("scratch");
        {
            let _ty = TypeDescriptor::class("", "Temp").build(&unit);
        }
        let found = unit.find_type("Temp").unwrap();
        assert_eq!(found.full_name(), "Temp");
        assert_eq!(unit.types().len(), 1);
    }

    #[test]
    fn test_reregistering_a_name_replaces_it() {
        let unit = UnitDescriptor::new("scratch");
        TypeDescriptor::class("App", "Thing").build(&unit);
        let second = TypeDescriptor::class("App", "Thing")
            .method(MethodDescriptor::new("Run", core_types().void.clone()))
            .build(&unit);

        assert_eq!(unit.types().len(), 1);
        assert!(Arc::ptr_eq(&unit.find_type("App.Thing").unwrap(), &second));
    }

    #[test]
    fn test_generic_display_and_key() {
        let list = TypeDescriptor::instantiate(&core_types().list, vec![core_types().int32.clone()]);
        assert_eq!(list.to_string(), "core.List`1[core.Int32]");
        assert_eq!(list.key(), "core!core.List`1[core.Int32]");
        assert!(list.is_generic());
        assert!(!core_types().int32.is_generic());
    }

    #[test]
    fn test_inherited_methods_keep_declaring_type() {
        let unit = UnitDescriptor::new("app");
        let base = TypeDescriptor::class("App", "Base")
            .method(MethodDescriptor::new("DoWork", core_types().string.clone()))
            .build(&unit);
        let derived = TypeDescriptor::class("App", "Derived")
            .base(base.clone())
            .method(MethodDescriptor::new("Run", core_types().void.clone()))
            .build(&unit);

        assert_eq!(derived.methods().len(), 2);
        assert_eq!(derived.find_method_named("Run").unwrap().declaring_type, "App.Derived");
        assert_eq!(derived.find_method_named("DoWork").unwrap().declaring_type, "App.Base");
        assert!(derived.is_assignable_to(&base));
        assert!(!base.is_assignable_to(&derived));
    }
}
