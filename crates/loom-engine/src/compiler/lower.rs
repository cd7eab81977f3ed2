//! AST to IR lowering
//!
//! Lowering runs in two passes over the single class of a unit. The first
//! pass resolves every member signature and assigns instance slots; the
//! second lowers bodies, resolving each name against locals, members, the
//! base type and finally type paths. All semantic errors are reported here.

use std::sync::Arc;

use loom_sdk::{core_types, PrimitiveKind, TypeDescriptor, TypeKind};
use rustc_hash::FxHashSet;

use super::binder::{ir_type, is_instantiable, TypeScope};
use super::diagnostic::{Diagnostic, DiagnosticCode};
use super::ir::*;
use crate::parser::ast::*;
use crate::parser::token::Span;

type TypeArc = Arc<TypeDescriptor>;

/// Lower a parsed unit. Returns `None` when no class could be lowered;
/// callers must still check `diags` for errors.
pub fn lower_unit(unit: &CompilationUnit, scope: &mut TypeScope, diags: &mut Vec<Diagnostic>) -> Option<IrClass> {
    lower_imports(unit, scope, diags);

    let class = select_class(unit, diags)?;
    let info = collect_class(class, scope, diags)?;
    check_interfaces(class, &info, diags);

    let mut lowerer = Lowerer {
        scope,
        info: &info,
        diags,
        fs: FnState::default(),
    };
    Some(lowerer.lower_class(class))
}

fn lower_imports(unit: &CompilationUnit, scope: &mut TypeScope, diags: &mut Vec<Diagnostic>) {
    let mut seen = FxHashSet::default();
    for import in &unit.imports {
        let ns = import.path.dotted();
        if !seen.insert(ns.clone()) {
            diags.push(Diagnostic::new(
                DiagnosticCode::DuplicateImport,
                format!("The import of '{}' appears more than once", ns),
                import.span,
            ));
            continue;
        }
        if !scope.namespace_exists(&ns) {
            diags.push(Diagnostic::new(
                DiagnosticCode::UnknownNamespace,
                format!("The namespace '{}' does not exist (are you missing a reference?)", ns),
                import.path.span,
            ));
            continue;
        }
        scope.add_import(ns);
    }
}

fn select_class<'u>(unit: &'u CompilationUnit, diags: &mut Vec<Diagnostic>) -> Option<&'u ClassDecl> {
    match unit.classes.as_slice() {
        [] => {
            diags.push(Diagnostic::new(
                DiagnosticCode::ClassCount,
                "The unit must declare exactly one public class, found none",
                unit.span,
            ));
            None
        }
        [class] => {
            if class.visibility != Visibility::Public {
                diags.push(Diagnostic::new(
                    DiagnosticCode::ClassCount,
                    format!("Class '{}' must be public", class.name.name),
                    class.name.span,
                ));
            }
            Some(class)
        }
        [first, rest @ ..] => {
            for extra in rest {
                diags.push(Diagnostic::new(
                    DiagnosticCode::ClassCount,
                    format!(
                        "The unit must declare exactly one public class; '{}' is extra",
                        extra.name.name
                    ),
                    extra.name.span,
                ));
            }
            Some(first)
        }
    }
}

// ============================================================================
// Member tables
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AccessorKind {
    Missing,
    Auto,
    Body,
}

struct FieldInfo {
    name: String,
    ty: TypeArc,
    slot: usize,
}

struct PropInfo {
    name: String,
    ty: TypeArc,
    public: bool,
    slot: Option<usize>,
    getter: AccessorKind,
    setter: AccessorKind,
}

struct MethodInfo {
    name: String,
    params: Vec<TypeArc>,
    ret: Option<TypeArc>,
    public: bool,
}

struct ClassInfo {
    name: String,
    namespace: String,
    base: Option<TypeArc>,
    interfaces: Vec<TypeArc>,
    fields: Vec<FieldInfo>,
    properties: Vec<PropInfo>,
    methods: Vec<MethodInfo>,
    constructors: Vec<Vec<TypeArc>>,
    slots: usize,
}

impl ClassInfo {
    fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }

    fn property(&self, name: &str) -> Option<&PropInfo> {
        self.properties.iter().find(|p| p.name == name)
    }

    fn method(&self, name: &str, arity: usize) -> Option<&MethodInfo> {
        self.methods.iter().find(|m| m.name == name && m.params.len() == arity)
    }

    fn has_method_named(&self, name: &str) -> bool {
        self.methods.iter().any(|m| m.name == name)
    }

    fn base_property(&self, name: &str) -> Option<&loom_sdk::PropertyDescriptor> {
        self.base.as_ref()?.find_property(name).filter(|p| p.is_public)
    }

    fn accepts_constructor_args(&self, arity: usize) -> bool {
        if self.constructors.is_empty() {
            arity == 0
        } else {
            self.constructors.iter().any(|c| c.len() == arity)
        }
    }
}

fn resolve_value_type(scope: &TypeScope, ty: &TypeRef, diags: &mut Vec<Diagnostic>) -> Option<TypeArc> {
    match scope.resolve(ty) {
        Ok(resolved) if resolved.is_void() => {
            diags.push(Diagnostic::new(
                DiagnosticCode::UnknownType,
                "Keyword 'void' cannot be used in this context",
                ty.span,
            ));
            None
        }
        Ok(resolved) => Some(resolved),
        Err(d) => {
            diags.push(d);
            None
        }
    }
}

fn resolve_return_type(scope: &TypeScope, ty: &TypeRef, diags: &mut Vec<Diagnostic>) -> Result<Option<TypeArc>, ()> {
    if ty.is_void() {
        return Ok(None);
    }
    match scope.resolve(ty) {
        Ok(resolved) if resolved.is_void() => Ok(None),
        Ok(resolved) => Ok(Some(resolved)),
        Err(d) => {
            diags.push(d);
            Err(())
        }
    }
}

/// Resolve supertypes and member signatures, assign slots and install the
/// self descriptor in the scope.
fn collect_class(class: &ClassDecl, scope: &mut TypeScope, diags: &mut Vec<Diagnostic>) -> Option<ClassInfo> {
    let namespace = scope.namespace().to_string();
    let mut base: Option<TypeArc> = None;
    let mut interfaces = Vec::new();

    for (i, st) in class.supertypes.iter().enumerate() {
        let resolved = match scope.resolve(st) {
            Ok(t) => t,
            Err(d) => {
                diags.push(d);
                continue;
            }
        };
        match resolved.kind() {
            TypeKind::Interface => interfaces.push(resolved),
            TypeKind::Class if i == 0 => {
                if resolved.activator().is_none() {
                    diags.push(Diagnostic::new(
                        DiagnosticCode::InvalidBase,
                        format!("'{}' cannot be used as a base class because it has no activator", resolved),
                        st.span,
                    ));
                }
                base = Some(resolved);
            }
            TypeKind::Class => diags.push(Diagnostic::new(
                DiagnosticCode::InvalidBase,
                format!(
                    "Class '{}' cannot have multiple base classes or a base class after an interface: '{}'",
                    class.name.name, resolved
                ),
                st.span,
            )),
            _ if i == 0 => diags.push(Diagnostic::new(
                DiagnosticCode::InvalidBase,
                format!("Cannot derive from '{}'", resolved),
                st.span,
            )),
            _ => diags.push(Diagnostic::new(
                DiagnosticCode::NotAnInterface,
                format!("Type '{}' in the interface list is not an interface", resolved),
                st.span,
            )),
        }
    }

    let mut builder = TypeDescriptor::class(namespace.clone(), class.name.name.clone());
    if let Some(b) = &base {
        builder = builder.base(b.clone());
    }
    for iface in &interfaces {
        builder = builder.implements(iface.clone());
    }
    let own_unit = scope.own_unit().clone();
    scope.set_self_type(builder.build_detached(&own_unit));

    let mut info = ClassInfo {
        name: class.name.name.clone(),
        namespace,
        base,
        interfaces,
        fields: Vec::new(),
        properties: Vec::new(),
        methods: Vec::new(),
        constructors: Vec::new(),
        slots: 0,
    };

    // Fields and properties share one member namespace with methods; methods
    // may overload by arity.
    let mut value_names: FxHashSet<String> = FxHashSet::default();
    let duplicate = |diags: &mut Vec<Diagnostic>, name: &Identifier| {
        diags.push(Diagnostic::new(
            DiagnosticCode::DuplicateMember,
            format!("The type '{}' already contains a definition for '{}'", class.name.name, name.name),
            name.span,
        ));
    };

    for member in &class.members {
        match member {
            Member::Field(f) => {
                if info.has_method_named(&f.name.name) || !value_names.insert(f.name.name.clone()) {
                    duplicate(diags, &f.name);
                    continue;
                }
                let ty = resolve_value_type(scope, &f.ty, diags).unwrap_or_else(|| core_types().object.clone());
                info.fields.push(FieldInfo {
                    name: f.name.name.clone(),
                    ty,
                    slot: info.slots,
                });
                info.slots += 1;
            }
            Member::Property(p) => {
                if info.has_method_named(&p.name.name) || !value_names.insert(p.name.name.clone()) {
                    duplicate(diags, &p.name);
                    continue;
                }
                let ty = resolve_value_type(scope, &p.ty, diags).unwrap_or_else(|| core_types().object.clone());
                let kind = |a: &Option<Accessor>| match a {
                    None => AccessorKind::Missing,
                    Some(Accessor { body: None, .. }) => AccessorKind::Auto,
                    Some(_) => AccessorKind::Body,
                };
                let getter = kind(&p.getter);
                let setter = kind(&p.setter);
                let slot = if p.is_auto() {
                    if getter == AccessorKind::Missing {
                        diags.push(Diagnostic::new(
                            DiagnosticCode::InvalidAssignment,
                            format!("Auto-implemented property '{}' must have a get accessor", p.name.name),
                            p.name.span,
                        ));
                    }
                    info.slots += 1;
                    Some(info.slots - 1)
                } else {
                    if getter == AccessorKind::Auto || setter == AccessorKind::Auto {
                        diags.push(Diagnostic::new(
                            DiagnosticCode::Syntax,
                            format!("Property '{}' mixes an auto accessor with an accessor body", p.name.name),
                            p.name.span,
                        ));
                    }
                    None
                };
                info.properties.push(PropInfo {
                    name: p.name.name.clone(),
                    ty,
                    public: p.visibility == Visibility::Public,
                    slot,
                    getter,
                    setter,
                });
            }
            Member::Method(m) => {
                if value_names.contains(&m.name.name) || info.method(&m.name.name, m.params.len()).is_some() {
                    duplicate(diags, &m.name);
                    continue;
                }
                let params = m
                    .params
                    .iter()
                    .map(|p| resolve_value_type(scope, &p.ty, diags).unwrap_or_else(|| core_types().object.clone()))
                    .collect();
                let ret = resolve_return_type(scope, &m.return_type, diags).unwrap_or(None);
                info.methods.push(MethodInfo {
                    name: m.name.name.clone(),
                    params,
                    ret,
                    public: m.visibility == Visibility::Public,
                });
            }
            Member::Constructor(c) => {
                if c.name.name != class.name.name {
                    diags.push(Diagnostic::new(
                        DiagnosticCode::ConstructorName,
                        format!("Method '{}' must have a return type", c.name.name),
                        c.name.span,
                    ));
                    continue;
                }
                if info.constructors.iter().any(|p| p.len() == c.params.len()) {
                    diags.push(Diagnostic::new(
                        DiagnosticCode::DuplicateMember,
                        format!(
                            "Type '{}' already defines a constructor with {} parameter(s)",
                            class.name.name,
                            c.params.len()
                        ),
                        c.name.span,
                    ));
                    continue;
                }
                let params = c
                    .params
                    .iter()
                    .map(|p| resolve_value_type(scope, &p.ty, diags).unwrap_or_else(|| core_types().object.clone()))
                    .collect();
                info.constructors.push(params);
            }
        }
    }

    Some(info)
}

fn check_interfaces(class: &ClassDecl, info: &ClassInfo, diags: &mut Vec<Diagnostic>) {
    for iface in &info.interfaces {
        for required in iface.methods() {
            let arity = required.parameters.len();
            let own = info
                .method(&required.name, arity)
                .is_some_and(|m| m.public);
            let inherited = info
                .base
                .as_ref()
                .and_then(|b| b.find_method(&required.name, arity))
                .is_some_and(|m| m.is_public);
            if !own && !inherited {
                diags.push(Diagnostic::new(
                    DiagnosticCode::MissingImplementation,
                    format!(
                        "'{}' does not implement interface member '{}.{}'",
                        class.name.name,
                        iface.full_name(),
                        required.name
                    ),
                    class.name.span,
                ));
            }
        }
        for required in iface.properties() {
            let own = info.property(&required.name).is_some_and(|p| {
                p.public
                    && (!required.can_read || p.getter != AccessorKind::Missing)
                    && (!required.can_write || p.setter != AccessorKind::Missing)
            });
            if !own && info.base_property(&required.name).is_none() {
                diags.push(Diagnostic::new(
                    DiagnosticCode::MissingImplementation,
                    format!(
                        "'{}' does not implement interface member '{}.{}'",
                        class.name.name,
                        iface.full_name(),
                        required.name
                    ),
                    class.name.span,
                ));
            }
        }
    }
}

// ============================================================================
// Bodies
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum FnKind {
    #[default]
    Initializer,
    Constructor,
    Method,
    Getter,
    Setter,
}

struct LocalInfo {
    name: String,
    span: Span,
    ty: Option<TypeArc>,
    used: bool,
    param: bool,
}

#[derive(Default)]
struct FnState {
    kind: FnKind,
    name: String,
    return_type: Option<TypeArc>,
    locals: Vec<LocalInfo>,
    scopes: Vec<Vec<usize>>,
}

/// A lowered expression with its statically known type, when there is one.
struct Typed {
    expr: IrExpr,
    ty: Option<TypeArc>,
}

impl Typed {
    fn new(expr: IrExpr, ty: Option<TypeArc>) -> Self {
        Self { expr, ty }
    }

    fn error() -> Self {
        Self::new(IrExpr::null(), None)
    }
}

struct Lowerer<'a> {
    scope: &'a TypeScope,
    info: &'a ClassInfo,
    diags: &'a mut Vec<Diagnostic>,
    fs: FnState,
}

impl<'a> Lowerer<'a> {
    /// Member tables, borrowed independently of `self`.
    fn info(&self) -> &'a ClassInfo {
        self.info
    }

    fn error(&mut self, code: DiagnosticCode, message: impl Into<String>, span: Span) {
        self.diags.push(Diagnostic::new(code, message, span));
    }

    fn lower_class(&mut self, class: &ClassDecl) -> IrClass {
        let mut fields = Vec::new();
        let mut properties = Vec::new();
        let mut constructors = Vec::new();
        let mut methods = Vec::new();

        for member in &class.members {
            match member {
                Member::Field(f) => {
                    let Some(info) = self.info().field(&f.name.name) else { continue };
                    if fields.iter().any(|x: &IrField| x.name == f.name.name) {
                        continue;
                    }
                    self.begin(FnKind::Initializer, &f.name.name, None, &[]);
                    let initializer = f.initializer.as_ref().map(|e| self.lower_expr(e).expr);
                    self.finish();
                    fields.push(IrField {
                        name: f.name.name.clone(),
                        ty: ir_type(&info.ty),
                        public: f.visibility == Visibility::Public,
                        slot: info.slot,
                        initializer,
                    });
                }
                Member::Property(p) => {
                    let Some(info) = self.info().property(&p.name.name) else { continue };
                    if properties.iter().any(|x: &IrProperty| x.name == p.name.name) {
                        continue;
                    }
                    let ty = info.ty.clone();
                    let slot = info.slot;
                    let getter = p.getter.as_ref().map(|a| match (&a.body, slot) {
                        (Some(body), _) => IrAccessor::Body(self.lower_accessor(FnKind::Getter, p, &ty, body)),
                        (None, slot) => IrAccessor::Auto { slot: slot.unwrap_or(0) },
                    });
                    let setter = p.setter.as_ref().map(|a| match (&a.body, slot) {
                        (Some(body), _) => IrAccessor::Body(self.lower_accessor(FnKind::Setter, p, &ty, body)),
                        (None, slot) => IrAccessor::Auto { slot: slot.unwrap_or(0) },
                    });
                    properties.push(IrProperty {
                        name: p.name.name.clone(),
                        ty: ir_type(&ty),
                        public: p.visibility == Visibility::Public,
                        getter,
                        setter,
                    });
                }
                Member::Constructor(c) => {
                    if c.name.name != self.info().name {
                        continue;
                    }
                    let Some(types) = self.info().constructors.iter().find(|p| p.len() == c.params.len()) else {
                        continue;
                    };
                    if constructors.iter().any(|x: &IrFunction| x.params.len() == c.params.len()) {
                        continue;
                    }
                    let params = named_params(&c.params, types);
                    constructors.push(self.lower_function(
                        FnKind::Constructor,
                        &c.name,
                        c.visibility == Visibility::Public,
                        params,
                        None,
                        &c.body,
                    ));
                }
                Member::Method(m) => {
                    let Some(info) = self.info().method(&m.name.name, m.params.len()) else { continue };
                    if methods
                        .iter()
                        .any(|x: &IrFunction| x.name == m.name.name && x.params.len() == m.params.len())
                    {
                        continue;
                    }
                    let params = named_params(&m.params, &info.params);
                    let ret = info.ret.clone();
                    let public = info.public;
                    methods.push(self.lower_function(FnKind::Method, &m.name, public, params, ret, &m.body));
                }
            }
        }

        IrClass {
            namespace: self.info().namespace.clone(),
            name: self.info().name.clone(),
            public: class.visibility == Visibility::Public,
            base: self.info().base.as_deref().map(ir_type),
            interfaces: self.info().interfaces.iter().map(|i| ir_type(i)).collect(),
            slots: self.info().slots,
            fields,
            properties,
            constructors,
            methods,
        }
    }

    fn lower_accessor(&mut self, kind: FnKind, prop: &PropertyDecl, ty: &TypeArc, body: &Block) -> IrFunction {
        let (params, ret, name) = match kind {
            FnKind::Getter => (Vec::new(), Some(ty.clone()), format!("get_{}", prop.name.name)),
            _ => (
                vec![("value".to_string(), prop.name.span, ty.clone())],
                None,
                format!("set_{}", prop.name.name),
            ),
        };
        let ident = Identifier {
            name,
            span: prop.name.span,
        };
        self.lower_function(kind, &ident, prop.visibility == Visibility::Public, params, ret, body)
    }

    fn lower_function(
        &mut self,
        kind: FnKind,
        name: &Identifier,
        public: bool,
        params: Vec<(String, Span, TypeArc)>,
        ret: Option<TypeArc>,
        body: &Block,
    ) -> IrFunction {
        self.begin(kind, &name.name, ret.clone(), &params);
        let ir_body = self.lower_block(body);

        if ret.is_some() && !always_returns(&body.statements) {
            self.error(
                DiagnosticCode::MissingReturnValue,
                format!("'{}': not all code paths return a value", name.name),
                name.span,
            );
        }
        let locals = self.finish();

        IrFunction {
            name: name.name.clone(),
            public,
            params: params
                .iter()
                .map(|(n, _, t)| IrParam {
                    name: n.clone(),
                    ty: ir_type(t),
                })
                .collect(),
            return_type: ret.as_deref().map(ir_type),
            locals,
            body: ir_body,
        }
    }

    fn begin(&mut self, kind: FnKind, name: &str, ret: Option<TypeArc>, params: &[(String, Span, TypeArc)]) {
        self.fs = FnState {
            kind,
            name: name.to_string(),
            return_type: ret,
            locals: Vec::new(),
            scopes: vec![Vec::new()],
        };
        for (pname, span, ty) in params {
            if self.find_local(pname).is_some() {
                self.error(
                    DiagnosticCode::DuplicateLocal,
                    format!("The parameter name '{}' is a duplicate", pname),
                    *span,
                );
            }
            self.declare(pname.clone(), *span, Some(ty.clone()), true);
        }
    }

    /// Close the current function; reports unused locals and returns the
    /// number of local slots.
    fn finish(&mut self) -> usize {
        let state = std::mem::take(&mut self.fs);
        for local in &state.locals {
            if !local.used && !local.param {
                self.error(
                    DiagnosticCode::UnusedLocal,
                    format!("The variable '{}' is assigned but its value is never used", local.name),
                    local.span,
                );
            }
        }
        state.locals.len()
    }

    fn declare(&mut self, name: String, span: Span, ty: Option<TypeArc>, param: bool) -> usize {
        let index = self.fs.locals.len();
        self.fs.locals.push(LocalInfo {
            name,
            span,
            ty,
            used: false,
            param,
        });
        if let Some(scope) = self.fs.scopes.last_mut() {
            scope.push(index);
        }
        index
    }

    /// Innermost visible local with this name.
    fn find_local(&self, name: &str) -> Option<usize> {
        self.fs
            .scopes
            .iter()
            .rev()
            .flat_map(|s| s.iter().rev())
            .copied()
            .find(|&i| self.fs.locals[i].name == name)
    }

    fn lower_block(&mut self, block: &Block) -> Vec<IrStmt> {
        self.fs.scopes.push(Vec::new());
        let stmts = block.statements.iter().filter_map(|s| self.lower_stmt(s)).collect();
        self.fs.scopes.pop();
        stmts
    }

    fn lower_stmt(&mut self, stmt: &Statement) -> Option<IrStmt> {
        match stmt {
            Statement::Var { name, initializer, .. } => {
                let value = self.lower_expr(initializer);
                if self.find_local(&name.name).is_some() {
                    self.error(
                        DiagnosticCode::DuplicateLocal,
                        format!(
                            "A local variable named '{}' cannot be declared in this scope because it is already defined",
                            name.name
                        ),
                        name.span,
                    );
                }
                let local = self.declare(name.name.clone(), name.span, value.ty, false);
                Some(IrStmt::Let {
                    local,
                    value: value.expr,
                })
            }
            Statement::Return { value, span } => {
                let lowered = value.as_ref().map(|v| self.lower_expr(v).expr);
                match (&self.fs.return_type, &lowered) {
                    (None, Some(_)) => {
                        let message = match self.fs.kind {
                            FnKind::Constructor | FnKind::Setter | FnKind::Initializer => {
                                "A constructor or setter cannot return a value".to_string()
                            }
                            _ => format!(
                                "Since '{}' returns void, a return keyword must not be followed by an object expression",
                                self.fs.name
                            ),
                        };
                        self.error(DiagnosticCode::UnexpectedReturnValue, message, *span);
                    }
                    (Some(ty), None) => {
                        let message = format!("An object of a type convertible to '{}' is required", ty);
                        self.error(DiagnosticCode::MissingReturnValue, message, *span);
                    }
                    _ => {}
                }
                Some(IrStmt::Return(lowered))
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                let condition = self.lower_expr(condition).expr;
                let then_branch = self.lower_block(then_branch);
                let else_branch = else_branch.as_ref().map(|b| self.lower_block(b)).unwrap_or_default();
                Some(IrStmt::If {
                    condition,
                    then_branch,
                    else_branch,
                })
            }
            Statement::Expression(e) => Some(IrStmt::Expr(self.lower_expr(e).expr)),
            Statement::Block(b) => Some(IrStmt::Block(self.lower_block(b))),
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn lower_expr(&mut self, expr: &Expression) -> Typed {
        let core = core_types();
        match &expr.kind {
            ExprKind::Int(n) => {
                let ty = if i32::try_from(*n).is_ok() { &core.int32 } else { &core.int64 };
                Typed::new(IrExpr::Const(IrConst::Int(*n)), Some(ty.clone()))
            }
            ExprKind::Float(x) => Typed::new(IrExpr::Const(IrConst::Float(*x)), Some(core.double.clone())),
            ExprKind::Str(s) => Typed::new(IrExpr::Const(IrConst::Str(s.clone())), Some(core.string.clone())),
            ExprKind::Bool(b) => Typed::new(IrExpr::Const(IrConst::Bool(*b)), Some(core.boolean.clone())),
            ExprKind::Null => Typed::new(IrExpr::null(), None),
            ExprKind::This => {
                if self.fs.kind == FnKind::Initializer {
                    self.error(
                        DiagnosticCode::UnknownName,
                        "Keyword 'this' is not available in a field initializer",
                        expr.span,
                    );
                }
                Typed::new(IrExpr::This, self.scope.self_type().cloned())
            }
            ExprKind::Name(name) => self.lower_name(name, expr.span, true),
            ExprKind::Member { object, name } => self.lower_member(object, name),
            ExprKind::Call { callee, args } => self.lower_call(callee, args, expr.span),
            ExprKind::New { ty, args } => self.lower_new(ty, args),
            ExprKind::As { expr: inner, ty } => {
                let value = self.lower_expr(inner);
                let Some(target) = resolve_value_type(self.scope, ty, self.diags) else {
                    return Typed::error();
                };
                Typed::new(
                    IrExpr::Cast {
                        value: Box::new(value.expr),
                        ty: ir_type(&target),
                    },
                    Some(target),
                )
            }
            ExprKind::Unary { op, operand } => {
                let operand = self.lower_expr(operand);
                let ty = match op {
                    UnaryOp::Not => Some(core.boolean.clone()),
                    UnaryOp::Negate => operand.ty,
                };
                Typed::new(
                    IrExpr::Unary {
                        op: *op,
                        operand: Box::new(operand.expr),
                    },
                    ty,
                )
            }
            ExprKind::Binary { op, left, right } => {
                let left = self.lower_expr(left);
                let right = self.lower_expr(right);
                let ty = match op {
                    BinaryOp::Eq
                    | BinaryOp::Ne
                    | BinaryOp::Lt
                    | BinaryOp::Le
                    | BinaryOp::Gt
                    | BinaryOp::Ge
                    | BinaryOp::And
                    | BinaryOp::Or => Some(core.boolean.clone()),
                    BinaryOp::Add if is_primitive(&left.ty, PrimitiveKind::String) || is_primitive(&right.ty, PrimitiveKind::String) => {
                        Some(core.string.clone())
                    }
                    _ => None,
                };
                Typed::new(
                    IrExpr::Binary {
                        op: *op,
                        left: Box::new(left.expr),
                        right: Box::new(right.expr),
                    },
                    ty,
                )
            }
            ExprKind::Assign { target, value } => self.lower_assign(target, value, expr.span),
        }
    }

    /// Whether a bare name denotes a value rather than the start of a type path.
    fn is_value_name(&self, name: &str) -> bool {
        self.find_local(name).is_some()
            || self.info().field(name).is_some()
            || self.info().property(name).is_some()
            || self.info().base_property(name).is_some()
    }

    fn lower_name(&mut self, name: &str, span: Span, allow_locals: bool) -> Typed {
        if allow_locals {
            if let Some(index) = self.find_local(name) {
                self.fs.locals[index].used = true;
                return Typed::new(IrExpr::Local(index), self.fs.locals[index].ty.clone());
            }
        }
        if let Some(field) = self.info().field(name) {
            if self.fs.kind == FnKind::Initializer {
                self.error(
                    DiagnosticCode::UnknownName,
                    format!("A field initializer cannot reference the non-static field '{}'", name),
                    span,
                );
            }
            return Typed::new(IrExpr::Slot(field.slot), Some(field.ty.clone()));
        }
        if let Some(prop) = self.info().property(name) {
            let ty = Some(prop.ty.clone());
            return match (prop.getter, prop.slot) {
                (AccessorKind::Missing, _) => {
                    self.error(
                        DiagnosticCode::UnknownMember,
                        format!(
                            "The property '{}' cannot be used in this context because it lacks the get accessor",
                            name
                        ),
                        span,
                    );
                    Typed::error()
                }
                (AccessorKind::Auto, Some(slot)) => Typed::new(IrExpr::Slot(slot), ty),
                _ => Typed::new(IrExpr::SelfProperty(name.to_string()), ty),
            };
        }
        if self.info().has_method_named(name) {
            self.error(
                DiagnosticCode::UnknownMember,
                format!("Method '{}' cannot be used as a value", name),
                span,
            );
            return Typed::error();
        }
        if let Some(prop) = self.info().base_property(name) {
            if !prop.can_read {
                self.error(
                    DiagnosticCode::UnknownMember,
                    format!(
                        "The property '{}' cannot be used in this context because it lacks the get accessor",
                        name
                    ),
                    span,
                );
                return Typed::error();
            }
            let ty = prop.ty.clone();
            return Typed::new(IrExpr::BaseProperty(name.to_string()), Some(ty));
        }
        self.error(
            DiagnosticCode::UnknownName,
            format!("The name '{}' does not exist in the current context", name),
            span,
        );
        Typed::error()
    }

    /// Type named by a member access object like `core.ValueCache`, when the
    /// path does not start with a value.
    fn static_target(&self, object: &Expression) -> Option<TypeArc> {
        let path = object.as_path()?;
        if self.is_value_name(&path[0]) {
            return None;
        }
        self.scope.resolve_path(&path)
    }

    fn lower_member(&mut self, object: &Expression, name: &Identifier) -> Typed {
        if matches!(object.kind, ExprKind::This) {
            self.lower_expr(object);
            return self.lower_name(&name.name, name.span, false);
        }
        if let Some(ty) = self.static_target(object) {
            self.error(
                DiagnosticCode::UnknownMember,
                format!("'{}' does not contain a static property '{}'", ty, name.name),
                name.span,
            );
            return Typed::error();
        }

        let obj = self.lower_expr(object);
        let ty = self.check_property(&obj.ty, name, false);
        Typed::new(
            IrExpr::GetMember {
                object: Box::new(obj.expr),
                name: name.name.clone(),
            },
            ty,
        )
    }

    /// Check a property access against the object's static type. Returns the
    /// property type when known.
    fn check_property(&mut self, object_ty: &Option<TypeArc>, name: &Identifier, write: bool) -> Option<TypeArc> {
        let ty = object_ty.as_ref()?;
        let core = core_types();
        match ty.kind() {
            TypeKind::Primitive(PrimitiveKind::String) | TypeKind::Primitive(PrimitiveKind::List) => {
                let known = match ty.kind() {
                    TypeKind::Primitive(PrimitiveKind::String) => "Length",
                    _ => "Count",
                };
                if name.name != known {
                    self.error(
                        DiagnosticCode::UnknownMember,
                        format!("'{}' does not contain a definition for '{}'", ty, name.name),
                        name.span,
                    );
                } else if write {
                    self.error(
                        DiagnosticCode::ReadOnlyProperty,
                        format!("Property '{}.{}' cannot be assigned to -- it is read only", ty, name.name),
                        name.span,
                    );
                }
                Some(core.int32.clone())
            }
            TypeKind::Class | TypeKind::Interface if self.scope.is_self(ty) => {
                let Some(prop) = self.info().property(&name.name) else {
                    if self.info().field(&name.name).is_some() {
                        return self.info().field(&name.name).map(|f| f.ty.clone());
                    }
                    if let Some(prop) = self.info().base_property(&name.name) {
                        return Some(prop.ty.clone());
                    }
                    self.error(
                        DiagnosticCode::UnknownMember,
                        format!("'{}' does not contain a definition for '{}'", ty, name.name),
                        name.span,
                    );
                    return None;
                };
                let accessor = if write { prop.setter } else { prop.getter };
                if accessor == AccessorKind::Missing {
                    let code = if write {
                        DiagnosticCode::ReadOnlyProperty
                    } else {
                        DiagnosticCode::UnknownMember
                    };
                    let message = format!(
                        "The property '{}' lacks the {} accessor",
                        name.name,
                        if write { "set" } else { "get" }
                    );
                    self.error(code, message, name.span);
                }
                Some(prop.ty.clone())
            }
            TypeKind::Class | TypeKind::Interface => {
                let Some(prop) = ty.find_property(&name.name).filter(|p| p.is_public) else {
                    self.error(
                        DiagnosticCode::UnknownMember,
                        format!("'{}' does not contain a definition for '{}'", ty, name.name),
                        name.span,
                    );
                    return None;
                };
                if write && !prop.can_write {
                    self.error(
                        DiagnosticCode::ReadOnlyProperty,
                        format!("Property '{}.{}' cannot be assigned to -- it is read only", ty, name.name),
                        name.span,
                    );
                } else if !write && !prop.can_read {
                    self.error(
                        DiagnosticCode::UnknownMember,
                        format!("The property '{}.{}' lacks the get accessor", ty, name.name),
                        name.span,
                    );
                }
                Some(prop.ty.clone())
            }
            _ => None,
        }
    }

    fn lower_args(&mut self, args: &[Expression]) -> Vec<IrExpr> {
        args.iter().map(|a| self.lower_expr(a).expr).collect()
    }

    fn arity_error(&mut self, name: &str, arity: usize, span: Span) {
        self.error(
            DiagnosticCode::ArgumentCount,
            format!("No overload for method '{}' takes {} arguments", name, arity),
            span,
        );
    }

    fn lower_call(&mut self, callee: &Expression, args: &[Expression], span: Span) -> Typed {
        match &callee.kind {
            ExprKind::Name(name) => self.lower_self_call(name, args, callee.span),
            ExprKind::Member { object, name } if matches!(object.kind, ExprKind::This) => {
                self.lower_self_call(&name.name, args, name.span)
            }
            ExprKind::Member { object, name } => {
                if let Some(ty) = self.static_target(object) {
                    return self.lower_static_call(&ty, name, args);
                }
                let obj = self.lower_expr(object);
                let ret = self.check_method(&obj.ty, name, args.len());
                let args = self.lower_args(args);
                Typed::new(
                    IrExpr::CallMember {
                        object: Box::new(obj.expr),
                        name: name.name.clone(),
                        args,
                    },
                    ret,
                )
            }
            _ => {
                self.error(DiagnosticCode::UnknownMember, "Method name expected", span);
                Typed::error()
            }
        }
    }

    fn lower_self_call(&mut self, name: &str, args: &[Expression], span: Span) -> Typed {
        let arity = args.len();
        if let Some(method) = self.info().method(name, arity) {
            let ret = method.ret.clone();
            let args = self.lower_args(args);
            return Typed::new(
                IrExpr::CallSelf {
                    name: name.to_string(),
                    args,
                },
                ret,
            );
        }
        if self.info().has_method_named(name) {
            self.arity_error(name, arity, span);
            return Typed::error();
        }
        if let Some(base) = self.info().base.clone() {
            if let Some(method) = base.find_method(name, arity).filter(|m| m.is_public && !m.is_static) {
                let ret = (!method.returns_void()).then(|| method.return_type.clone());
                let args = self.lower_args(args);
                return Typed::new(
                    IrExpr::CallBase {
                        name: name.to_string(),
                        args,
                    },
                    ret,
                );
            }
            if base.find_method_named(name).is_some() {
                self.arity_error(name, arity, span);
                return Typed::error();
            }
        }
        if self.is_value_name(name) {
            self.error(
                DiagnosticCode::UnknownMember,
                format!("'{}' is a value but is used like a method; call its 'invoke' member", name),
                span,
            );
        } else {
            self.error(
                DiagnosticCode::UnknownName,
                format!("The name '{}' does not exist in the current context", name),
                span,
            );
        }
        Typed::error()
    }

    fn lower_static_call(&mut self, ty: &TypeArc, name: &Identifier, args: &[Expression]) -> Typed {
        let intrinsic = if ty.kind() == TypeKind::Runtime {
            Intrinsic::lookup(&ty.full_name(), &name.name)
        } else {
            None
        };
        let Some(op) = intrinsic else {
            self.error(
                DiagnosticCode::UnknownMember,
                format!("'{}' does not contain a static method '{}'", ty, name.name),
                name.span,
            );
            return Typed::error();
        };
        if op.arity() != args.len() {
            self.arity_error(&name.name, args.len(), name.span);
            return Typed::error();
        }
        let ret = ty.find_method(&name.name, op.arity()).map(|m| m.return_type.clone());
        let args = self.lower_args(args);
        Typed::new(IrExpr::Intrinsic { op, args }, ret)
    }

    /// Check a method call against the object's static type. Returns the
    /// return type when known.
    fn check_method(&mut self, object_ty: &Option<TypeArc>, name: &Identifier, arity: usize) -> Option<TypeArc> {
        let ty = object_ty.as_ref()?;
        if !matches!(ty.kind(), TypeKind::Class | TypeKind::Interface) {
            return None;
        }
        if self.scope.is_self(ty) {
            if let Some(m) = self.info().method(&name.name, arity) {
                return m.ret.clone();
            }
            if let Some(m) = self.info().base.as_ref().and_then(|b| b.find_method(&name.name, arity)) {
                return (!m.returns_void()).then(|| m.return_type.clone());
            }
            if self.info().has_method_named(&name.name) {
                self.arity_error(&name.name, arity, name.span);
            } else {
                self.error(
                    DiagnosticCode::UnknownMember,
                    format!("'{}' does not contain a definition for '{}'", ty, name.name),
                    name.span,
                );
            }
            return None;
        }
        match ty.find_method(&name.name, arity).filter(|m| m.is_public) {
            Some(m) => (!m.returns_void()).then(|| m.return_type.clone()),
            None => {
                if ty.find_method_named(&name.name).is_some() {
                    self.arity_error(&name.name, arity, name.span);
                } else {
                    self.error(
                        DiagnosticCode::UnknownMember,
                        format!("'{}' does not contain a definition for '{}'", ty, name.name),
                        name.span,
                    );
                }
                None
            }
        }
    }

    fn lower_new(&mut self, ty: &TypeRef, args: &[Expression]) -> Typed {
        let Some(target) = resolve_value_type(self.scope, ty, self.diags) else {
            self.lower_args(args);
            return Typed::error();
        };
        if self.scope.is_self(&target) {
            if !self.info().accepts_constructor_args(args.len()) {
                self.error(
                    DiagnosticCode::ArgumentCount,
                    format!("'{}' does not contain a constructor that takes {} arguments", target, args.len()),
                    ty.span,
                );
            }
        } else if !is_instantiable(&target) {
            self.error(
                DiagnosticCode::NotInstantiable,
                format!("Cannot create an instance of '{}'", target),
                ty.span,
            );
        } else if target.activator().is_none() {
            self.error(
                DiagnosticCode::NotInstantiable,
                format!("'{}' has no activator", target),
                ty.span,
            );
        }
        let args = self.lower_args(args);
        Typed::new(
            IrExpr::New {
                ty: ir_type(&target),
                args,
            },
            Some(target),
        )
    }

    fn lower_assign(&mut self, target: &Expression, value: &Expression, span: Span) -> Typed {
        let value = self.lower_expr(value);
        let ty = value.ty.clone();
        let place = match &target.kind {
            ExprKind::Name(name) => self.self_place(name, target.span, true),
            ExprKind::Member { object, name } if matches!(object.kind, ExprKind::This) => {
                self.self_place(&name.name, name.span, false)
            }
            ExprKind::Member { object, name } => {
                if let Some(ty) = self.static_target(object) {
                    self.error(
                        DiagnosticCode::InvalidAssignment,
                        format!("'{}' does not contain a static property '{}'", ty, name.name),
                        name.span,
                    );
                    None
                } else {
                    let obj = self.lower_expr(object);
                    self.check_property(&obj.ty, name, true);
                    Some(IrPlace::Member {
                        object: Box::new(obj.expr),
                        name: name.name.clone(),
                    })
                }
            }
            _ => {
                self.error(
                    DiagnosticCode::InvalidAssignment,
                    "The left-hand side of an assignment must be a variable, field or property",
                    span,
                );
                None
            }
        };
        match place {
            Some(target) => Typed::new(
                IrExpr::Assign {
                    target,
                    value: Box::new(value.expr),
                },
                ty,
            ),
            None => Typed::error(),
        }
    }

    fn self_place(&mut self, name: &str, span: Span, allow_locals: bool) -> Option<IrPlace> {
        if allow_locals {
            if let Some(index) = self.find_local(name) {
                return Some(IrPlace::Local(index));
            }
        }
        if let Some(field) = self.info().field(name) {
            return Some(IrPlace::Slot(field.slot));
        }
        if let Some(prop) = self.info().property(name) {
            let in_constructor = matches!(self.fs.kind, FnKind::Constructor | FnKind::Initializer);
            return match (prop.setter, prop.slot) {
                (AccessorKind::Body, _) => Some(IrPlace::SelfProperty(name.to_string())),
                (AccessorKind::Auto, Some(slot)) => Some(IrPlace::Slot(slot)),
                (AccessorKind::Missing, Some(slot)) if in_constructor => Some(IrPlace::Slot(slot)),
                _ => {
                    self.error(
                        DiagnosticCode::ReadOnlyProperty,
                        format!("Property '{}' cannot be assigned to -- it is read only", name),
                        span,
                    );
                    None
                }
            };
        }
        if self.info().has_method_named(name) {
            self.error(
                DiagnosticCode::InvalidAssignment,
                format!("Cannot assign to '{}' because it is a method", name),
                span,
            );
            return None;
        }
        if let Some(prop) = self.info().base_property(name) {
            if !prop.can_write {
                self.error(
                    DiagnosticCode::ReadOnlyProperty,
                    format!("Property '{}' cannot be assigned to -- it is read only", name),
                    span,
                );
                return None;
            }
            return Some(IrPlace::BaseProperty(name.to_string()));
        }
        self.error(
            DiagnosticCode::UnknownName,
            format!("The name '{}' does not exist in the current context", name),
            span,
        );
        None
    }
}

fn named_params(params: &[Parameter], types: &[TypeArc]) -> Vec<(String, Span, TypeArc)> {
    params
        .iter()
        .zip(types)
        .map(|(p, t)| (p.name.name.clone(), p.name.span, t.clone()))
        .collect()
}

fn is_primitive(ty: &Option<TypeArc>, kind: PrimitiveKind) -> bool {
    ty.as_ref().is_some_and(|t| t.kind() == TypeKind::Primitive(kind))
}

/// Whether control cannot fall off the end of these statements.
fn always_returns(stmts: &[Statement]) -> bool {
    stmts.iter().any(|s| match s {
        Statement::Return { .. } => true,
        Statement::Block(b) => always_returns(&b.statements),
        Statement::If {
            then_branch,
            else_branch: Some(else_branch),
            ..
        } => always_returns(&then_branch.statements) && always_returns(&else_branch.statements),
        _ => false,
    })
}
