//! Type name resolution
//!
//! A [`TypeScope`] answers "which type does this name denote" for one
//! compilation unit. It sees the core unit, the referenced units, the
//! unit's imports and namespace, and the class being compiled.

use std::sync::Arc;

use loom_sdk::{core_types, TypeDescriptor, TypeKind, UnitDescriptor};

use super::diagnostic::{Diagnostic, DiagnosticCode};
use super::ir::IrType;
use crate::parser::ast::TypeRef;

pub struct TypeScope {
    /// Core first, then references in the order given
    units: Vec<Arc<UnitDescriptor>>,
    imports: Vec<String>,
    namespace: String,
    own_unit: Arc<UnitDescriptor>,
    self_type: Option<Arc<TypeDescriptor>>,
}

impl TypeScope {
    pub fn new(references: &[Arc<UnitDescriptor>], own_unit: Arc<UnitDescriptor>, namespace: String) -> Self {
        let core = core_types().unit.clone();
        let mut units = vec![core];
        for unit in references {
            if !units.iter().any(|u| u.name() == unit.name()) {
                units.push(unit.clone());
            }
        }
        Self {
            units,
            imports: Vec::new(),
            namespace,
            own_unit,
            self_type: None,
        }
    }

    /// Every unit visible to the compilation, core included.
    pub fn units(&self) -> &[Arc<UnitDescriptor>] {
        &self.units
    }

    pub fn own_unit(&self) -> &Arc<UnitDescriptor> {
        &self.own_unit
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn add_import(&mut self, namespace: String) {
        self.imports.push(namespace);
    }

    /// Install the descriptor standing in for the class being compiled.
    pub fn set_self_type(&mut self, ty: Arc<TypeDescriptor>) {
        self.self_type = Some(ty);
    }

    pub fn self_type(&self) -> Option<&Arc<TypeDescriptor>> {
        self.self_type.as_ref()
    }

    pub fn is_self(&self, ty: &TypeDescriptor) -> bool {
        self.self_type.as_ref().is_some_and(|s| s.key() == ty.key())
    }

    /// Whether some visible type lives in `namespace` or below it.
    pub fn namespace_exists(&self, namespace: &str) -> bool {
        if namespace == self.namespace {
            return true;
        }
        let nested = format!("{}.", namespace);
        self.units.iter().any(|unit| {
            unit.types()
                .iter()
                .any(|t| t.namespace() == namespace || t.namespace().starts_with(&nested))
        })
    }

    /// Resolve a type written in source.
    pub fn resolve(&self, ty: &TypeRef) -> Result<Arc<TypeDescriptor>, Diagnostic> {
        let mut args = Vec::with_capacity(ty.args.len());
        for arg in &ty.args {
            let resolved = self.resolve(arg)?;
            if resolved.is_void() {
                return Err(Diagnostic::new(
                    DiagnosticCode::UnknownType,
                    "Keyword 'void' cannot be used as a type argument",
                    arg.span,
                ));
            }
            args.push(resolved);
        }

        let definition = self.lookup(ty)?;
        if args.is_empty() {
            return Ok(definition);
        }
        Ok(TypeDescriptor::instantiate(&definition, args))
    }

    /// Resolve a path expression such as `core.ValueCache` as a type, if it
    /// names one. Used where a member access could denote a static member.
    pub fn resolve_path(&self, path: &[String]) -> Option<Arc<TypeDescriptor>> {
        let dotted = path.join(".");
        let matches = self.candidates(&dotted, 0);
        match matches.as_slice() {
            [single] => Some(single.clone()),
            _ => None,
        }
    }

    fn lookup(&self, ty: &TypeRef) -> Result<Arc<TypeDescriptor>, Diagnostic> {
        let dotted = ty.dotted();
        let arity = ty.args.len();

        if ty.path.len() == 1 && arity == 0 {
            if let Some(alias) = core_types().alias(&dotted) {
                return Ok(alias.clone());
            }
        }

        let matches = self.candidates(&dotted, arity);
        match matches.len() {
            1 => Ok(matches[0].clone()),
            0 => {
                // Same name under a different arity gives a better message
                for other in 0..=4 {
                    if other != arity && !self.candidates(&dotted, other).is_empty() {
                        return Err(Diagnostic::new(
                            DiagnosticCode::GenericArity,
                            format!(
                                "Using the type '{}' requires {} type argument(s), found {}",
                                dotted, other, arity
                            ),
                            ty.span,
                        ));
                    }
                }
                Err(Diagnostic::new(
                    DiagnosticCode::UnknownType,
                    format!("The type or namespace name '{}' could not be found", ty),
                    ty.span,
                ))
            }
            _ => {
                let names: Vec<String> = matches.iter().map(|t| t.key()).collect();
                Err(Diagnostic::new(
                    DiagnosticCode::UnknownType,
                    format!("'{}' is ambiguous between {}", dotted, names.join(" and ")),
                    ty.span,
                ))
            }
        }
    }

    /// Every distinct type the name may denote: exact, through an import, or
    /// relative to the unit's own namespace.
    fn candidates(&self, dotted: &str, arity: usize) -> Vec<Arc<TypeDescriptor>> {
        let mut names = vec![dotted.to_string()];
        for import in &self.imports {
            names.push(format!("{}.{}", import, dotted));
        }
        if !self.namespace.is_empty() {
            names.push(format!("{}.{}", self.namespace, dotted));
        }

        let mut found: Vec<Arc<TypeDescriptor>> = Vec::new();
        for name in names {
            if arity == 0 {
                if let Some(own) = &self.self_type {
                    if own.full_name() == name && !found.iter().any(|t| t.key() == own.key()) {
                        found.push(own.clone());
                    }
                }
            }
            let lookup = if arity > 0 { format!("{}`{}", name, arity) } else { name };
            for unit in &self.units {
                if let Some(t) = unit.find_type(&lookup) {
                    if !found.iter().any(|f| f.key() == t.key()) {
                        found.push(t);
                    }
                }
            }
        }
        found
    }
}

/// Serializable reference for a resolved type.
pub fn ir_type(ty: &TypeDescriptor) -> IrType {
    IrType {
        unit: ty.unit().name().to_string(),
        name: ty.full_name(),
        args: ty.generic_args().iter().map(|a| ir_type(a)).collect(),
    }
}

/// Whether values of this type may be constructed with `new`.
pub fn is_instantiable(ty: &TypeDescriptor) -> bool {
    ty.kind() == TypeKind::Class
}
