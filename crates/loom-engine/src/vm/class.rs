//! Loaded classes and modules

use std::sync::{Arc, Weak};

use loom_sdk::{
    core_types, MethodDescriptor, ObjectRef, PropertyDescriptor, TypeDescriptor, UnitDescriptor, Value,
    ValueSource,
};
use rustc_hash::FxHashMap;

use super::{VmError, VmResult};
use crate::compiler::ir::*;
use crate::compiler::Module;

/// Name of the field carrying a generated class's own source.
pub const SOURCE_FIELD: &str = "_source";

/// A type reference after binding.
#[derive(Clone, Debug)]
pub(crate) enum ResolvedType {
    Host(Arc<TypeDescriptor>),
    /// The class defined by the module itself
    Own,
}

/// A class loaded from a module.
pub struct GeneratedType {
    pub(super) class: IrClass,
    pub(super) descriptor: Arc<TypeDescriptor>,
    pub(super) unit: Arc<UnitDescriptor>,
    pub(super) base: Option<Arc<TypeDescriptor>>,
    pub(super) interfaces: Vec<Arc<TypeDescriptor>>,
    pub(super) types: FxHashMap<IrType, ResolvedType>,
    pub(super) slot_types: Vec<ResolvedType>,
    pub(super) source: Arc<dyn ValueSource>,
    pub(super) this: Weak<GeneratedType>,
}

impl GeneratedType {
    pub(crate) fn load(
        module: &Module,
        unit: &Arc<UnitDescriptor>,
        bound: &FxHashMap<String, Arc<UnitDescriptor>>,
        source: Arc<dyn ValueSource>,
    ) -> VmResult<Arc<Self>> {
        let class = module.class.clone();
        let own_placeholder = TypeDescriptor::class(class.namespace.clone(), class.name.clone()).build_detached(unit);
        let binder = TypeBinder {
            module: &module.name,
            own_name: class.full_name(),
            placeholder: own_placeholder,
            bound,
        };

        let mut types = FxHashMap::default();
        for ty in collect_types(&class) {
            if !types.contains_key(ty) {
                types.insert(ty.clone(), binder.resolve(ty)?);
            }
        }
        let lookup = |ty: &IrType| -> Arc<TypeDescriptor> {
            match types.get(ty) {
                Some(ResolvedType::Host(d)) => d.clone(),
                _ => binder.placeholder.clone(),
            }
        };

        let base = class.base.as_ref().map(&lookup);
        let interfaces: Vec<_> = class.interfaces.iter().map(&lookup).collect();

        let mut slot_types = vec![ResolvedType::Host(core_types().object.clone()); class.slots];
        for field in &class.fields {
            if let (Some(slot), Some(ty)) = (slot_types.get_mut(field.slot), types.get(&field.ty)) {
                *slot = ty.clone();
            }
        }
        for prop in &class.properties {
            if let Some(IrAccessor::Auto { slot: index }) = &prop.getter {
                if let (Some(slot), Some(ty)) = (slot_types.get_mut(*index), types.get(&prop.ty)) {
                    *slot = ty.clone();
                }
            }
        }

        let mut builder = TypeDescriptor::class(class.namespace.clone(), class.name.clone());
        if let Some(b) = &base {
            builder = builder.base(b.clone());
        }
        for iface in &interfaces {
            builder = builder.implements(iface.clone());
        }
        for method in &class.methods {
            let ret = method
                .return_type
                .as_ref()
                .map(&lookup)
                .unwrap_or_else(|| core_types().void.clone());
            let mut desc = MethodDescriptor::new(method.name.clone(), ret);
            for param in &method.params {
                desc = desc.param(param.name.clone(), lookup(&param.ty));
            }
            if !method.public {
                desc = desc.private();
            }
            builder = builder.method(desc);
        }
        for prop in &class.properties {
            let mut desc = PropertyDescriptor::new(prop.name.clone(), lookup(&prop.ty));
            desc.can_read = prop.getter.is_some();
            desc.can_write = prop.setter.is_some();
            if !prop.public {
                desc = desc.private();
            }
            builder = builder.property(desc);
        }

        let ty = Arc::new_cyclic(|this: &Weak<GeneratedType>| {
            let weak = this.clone();
            let descriptor = builder
                .activator(move |args: &[Value]| {
                    let class = weak.upgrade().ok_or("Generated type has been unloaded")?;
                    class.create_instance(args).map_err(Into::into)
                })
                .build_detached(unit);
            GeneratedType {
                class,
                descriptor,
                unit: unit.clone(),
                base,
                interfaces,
                types,
                slot_types,
                source,
                this: this.clone(),
            }
        });
        unit.register_type(&ty.descriptor);
        Ok(ty)
    }

    /// Simple name
    pub fn name(&self) -> &str {
        &self.class.name
    }

    /// Namespace (may be empty)
    pub fn namespace(&self) -> &str {
        &self.class.namespace
    }

    /// Namespace-qualified name
    pub fn full_name(&self) -> String {
        self.class.full_name()
    }

    pub fn base(&self) -> Option<&Arc<TypeDescriptor>> {
        self.base.as_ref()
    }

    pub fn interfaces(&self) -> &[Arc<TypeDescriptor>] {
        &self.interfaces
    }

    /// Declared constructors. Empty means an implicit parameterless one.
    pub fn constructors(&self) -> &[IrFunction] {
        &self.class.constructors
    }

    pub fn methods(&self) -> &[IrFunction] {
        &self.class.methods
    }

    pub fn properties(&self) -> &[IrProperty] {
        &self.class.properties
    }

    pub fn fields(&self) -> &[IrField] {
        &self.class.fields
    }

    /// Method by name and arity
    pub fn method(&self, name: &str, arity: usize) -> Option<&IrFunction> {
        self.class.find_method(name, arity)
    }

    /// Property by name
    pub fn property(&self, name: &str) -> Option<&IrProperty> {
        self.class.find_property(name)
    }

    /// Descriptor for referencing this type from later compilations.
    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.descriptor
    }

    /// Unit the type was loaded into
    pub fn unit(&self) -> &Arc<UnitDescriptor> {
        &self.unit
    }

    pub fn module_name(&self) -> &str {
        self.unit.name()
    }

    pub fn module_version(&self) -> &str {
        self.unit.version()
    }

    /// File the module was loaded from; `None` for in-memory modules
    pub fn module_location(&self) -> Option<&str> {
        self.unit.location()
    }

    /// Source text stored in the class's `_source` field, when present.
    pub fn embedded_source(&self) -> Option<String> {
        match &self.class.find_field(SOURCE_FIELD)?.initializer {
            Some(IrExpr::Const(IrConst::Str(text))) => Some(text.clone()),
            _ => None,
        }
    }

    /// Construct an instance, running field initializers and the
    /// constructor matching `args`.
    pub fn create_instance(&self, args: &[Value]) -> VmResult<ObjectRef> {
        let class = self
            .this
            .upgrade()
            .ok_or_else(|| VmError::TypeError(format!("Type '{}' has been unloaded", self.full_name())))?;
        let instance = super::instance::Instance::construct(&class, args)?;
        Ok(instance)
    }

    pub(super) fn resolved(&self, ty: &IrType) -> VmResult<&ResolvedType> {
        self.types.get(ty).ok_or_else(|| VmError::UnresolvedType {
            name: ty.to_string(),
            unit: ty.unit.clone(),
        })
    }
}

impl std::fmt::Debug for GeneratedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedType")
            .field("name", &self.full_name())
            .field("module", &self.unit.name())
            .finish()
    }
}

/// A module loaded into an execution context. Always defines exactly one
/// type.
#[derive(Debug)]
pub struct LoadedModule {
    pub(super) name: String,
    pub(super) checksum: String,
    pub(super) source_hash: String,
    pub(super) references: Vec<Arc<UnitDescriptor>>,
    pub(super) ty: Arc<GeneratedType>,
}

impl LoadedModule {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        self.ty.module_version()
    }

    pub fn location(&self) -> Option<&str> {
        self.ty.module_location()
    }

    /// SHA-256 of the encoded module (hex)
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    /// SHA-256 of the source the module was compiled from (hex)
    pub fn source_hash(&self) -> &str {
        &self.source_hash
    }

    /// Units the module was bound against
    pub fn references(&self) -> &[Arc<UnitDescriptor>] {
        &self.references
    }

    pub fn unit(&self) -> &Arc<UnitDescriptor> {
        self.ty.unit()
    }

    /// The single type the module defines
    pub fn generated_type(&self) -> &Arc<GeneratedType> {
        &self.ty
    }
}

struct TypeBinder<'a> {
    module: &'a str,
    own_name: String,
    placeholder: Arc<TypeDescriptor>,
    bound: &'a FxHashMap<String, Arc<UnitDescriptor>>,
}

impl TypeBinder<'_> {
    fn resolve(&self, ty: &IrType) -> VmResult<ResolvedType> {
        if ty.unit == self.module {
            if ty.name == self.own_name && ty.args.is_empty() {
                return Ok(ResolvedType::Own);
            }
            return Err(VmError::UnresolvedType {
                name: ty.to_string(),
                unit: ty.unit.clone(),
            });
        }

        let core = core_types();
        let unit = if ty.unit == core.unit.name() {
            &core.unit
        } else {
            self.bound.get(&ty.unit).ok_or_else(|| VmError::UnresolvedReference {
                module: self.module.to_string(),
                unit: ty.unit.clone(),
            })?
        };
        let definition = unit.find_type(&ty.name).ok_or_else(|| VmError::UnresolvedType {
            name: ty.name.clone(),
            unit: ty.unit.clone(),
        })?;
        if ty.args.is_empty() {
            return Ok(ResolvedType::Host(definition));
        }

        let mut args = Vec::with_capacity(ty.args.len());
        for arg in &ty.args {
            args.push(match self.resolve(arg)? {
                ResolvedType::Host(d) => d,
                ResolvedType::Own => self.placeholder.clone(),
            });
        }
        Ok(ResolvedType::Host(TypeDescriptor::instantiate(&definition, args)))
    }
}

/// Every type reference appearing anywhere in the class.
fn collect_types(class: &IrClass) -> Vec<&IrType> {
    let mut out = Vec::new();
    out.extend(class.base.iter());
    out.extend(class.interfaces.iter());
    for field in &class.fields {
        out.push(&field.ty);
        if let Some(init) = &field.initializer {
            expr_types(init, &mut out);
        }
    }
    for prop in &class.properties {
        out.push(&prop.ty);
        for accessor in [&prop.getter, &prop.setter].into_iter().flatten() {
            if let IrAccessor::Body(f) = accessor {
                function_types(f, &mut out);
            }
        }
    }
    for f in class.constructors.iter().chain(&class.methods) {
        function_types(f, &mut out);
    }
    out
}

fn function_types<'a>(f: &'a IrFunction, out: &mut Vec<&'a IrType>) {
    out.extend(f.params.iter().map(|p| &p.ty));
    out.extend(f.return_type.iter());
    for stmt in &f.body {
        stmt_types(stmt, out);
    }
}

fn stmt_types<'a>(stmt: &'a IrStmt, out: &mut Vec<&'a IrType>) {
    match stmt {
        IrStmt::Let { value, .. } | IrStmt::Expr(value) | IrStmt::Return(Some(value)) => expr_types(value, out),
        IrStmt::Return(None) => {}
        IrStmt::If {
            condition,
            then_branch,
            else_branch,
        } => {
            expr_types(condition, out);
            for s in then_branch.iter().chain(else_branch) {
                stmt_types(s, out);
            }
        }
        IrStmt::Block(stmts) => {
            for s in stmts {
                stmt_types(s, out);
            }
        }
    }
}

fn expr_types<'a>(expr: &'a IrExpr, out: &mut Vec<&'a IrType>) {
    match expr {
        IrExpr::Const(_)
        | IrExpr::Local(_)
        | IrExpr::This
        | IrExpr::Slot(_)
        | IrExpr::SelfProperty(_)
        | IrExpr::BaseProperty(_) => {}
        IrExpr::GetMember { object, .. } => expr_types(object, out),
        IrExpr::CallSelf { args, .. } | IrExpr::CallBase { args, .. } | IrExpr::Intrinsic { args, .. } => {
            for a in args {
                expr_types(a, out);
            }
        }
        IrExpr::CallMember { object, args, .. } => {
            expr_types(object, out);
            for a in args {
                expr_types(a, out);
            }
        }
        IrExpr::New { ty, args } => {
            out.push(ty);
            for a in args {
                expr_types(a, out);
            }
        }
        IrExpr::Cast { value, ty } => {
            out.push(ty);
            expr_types(value, out);
        }
        IrExpr::Unary { operand, .. } => expr_types(operand, out),
        IrExpr::Binary { left, right, .. } => {
            expr_types(left, out);
            expr_types(right, out);
        }
        IrExpr::Assign { target, value } => {
            if let IrPlace::Member { object, .. } = target {
                expr_types(object, out);
            }
            expr_types(value, out);
        }
    }
}
