//! Loom compiler
//!
//! Turns one source unit into an encoded [`Module`]. Compilation never
//! panics on bad input: syntax and semantic problems come back as
//! [`Diagnostic`]s and the output carries no image.

pub mod binder;
pub mod diagnostic;
pub mod ir;
pub mod lower;
pub mod module;

use std::sync::Arc;

use loom_sdk::{core_types, UnitDescriptor};
use thiserror::Error;

pub use diagnostic::{Diagnostic, DiagnosticCode, Severity};
pub use module::{Module, ModuleError, ModuleReference};

use crate::parser::{parse_source, SourceErrors};
use binder::TypeScope;

/// Version stamped on every compiled module.
pub const MODULE_VERSION: &str = "1.0.0";

/// Optimization profile. Only unoptimized output is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptimizationLevel {
    #[default]
    Debug,
}

/// Compiler settings.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Name of the produced module
    pub module_name: String,
    /// Escalate warnings to errors
    pub warnings_as_errors: bool,
    pub optimization: OptimizationLevel,
}

impl CompileOptions {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            warnings_as_errors: false,
            optimization: OptimizationLevel::Debug,
        }
    }
}

/// Failures that are not problems with the source itself.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Invalid module name '{0}'")]
    InvalidModuleName(String),

    #[error("Module error: {0}")]
    Module(#[from] ModuleError),
}

/// Diagnostics plus, on success, the encoded module.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub diagnostics: Vec<Diagnostic>,
    pub module: Option<Module>,
    pub image: Option<Vec<u8>>,
}

impl CompileOutput {
    pub fn is_success(&self) -> bool {
        self.image.is_some()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }
}

/// Compile `source` against `references`. The core unit is always visible.
pub fn compile(
    source: &str,
    references: &[Arc<UnitDescriptor>],
    options: &CompileOptions,
) -> Result<CompileOutput, CompileError> {
    if options.module_name.is_empty() || options.module_name == loom_sdk::CORE_UNIT {
        return Err(CompileError::InvalidModuleName(options.module_name.clone()));
    }

    let mut diagnostics = Vec::new();
    let ast = match parse_source(source) {
        Ok(ast) => ast,
        Err(SourceErrors::Lex(errors)) => {
            diagnostics.extend(errors.iter().map(Diagnostic::from));
            return Ok(failed(diagnostics));
        }
        Err(SourceErrors::Parse(errors)) => {
            diagnostics.extend(errors.iter().map(Diagnostic::from));
            return Ok(failed(diagnostics));
        }
    };

    let namespace = ast.namespace.as_ref().map(|n| n.dotted()).unwrap_or_default();
    let own_unit = UnitDescriptor::new(options.module_name.clone());
    let mut scope = TypeScope::new(references, own_unit, namespace);
    let class = lower::lower_unit(&ast, &mut scope, &mut diagnostics);

    if options.warnings_as_errors {
        for d in diagnostics.iter_mut() {
            d.escalate();
        }
    }
    for d in diagnostics.iter().filter(|d| d.escalated) {
        tracing::warn!(code = %d.code, "{}", d);
    }

    let class = match class {
        Some(class) if !diagnostics.iter().any(|d| d.is_error()) => class,
        _ => return Ok(failed(diagnostics)),
    };

    let core_name = core_types().unit.name();
    let module = Module {
        name: options.module_name.clone(),
        version: MODULE_VERSION.to_string(),
        references: scope
            .units()
            .iter()
            .filter(|u| u.name() != core_name)
            .map(|u| ModuleReference {
                name: u.name().to_string(),
                version: u.version().to_string(),
                location: u.location().map(String::from),
            })
            .collect(),
        source_hash: Module::hash_source(source),
        class,
    };
    let image = module.encode()?;
    tracing::debug!(module = %module.name, bytes = image.len(), "compiled module");

    Ok(CompileOutput {
        diagnostics,
        module: Some(module),
        image: Some(image),
    })
}

fn failed(diagnostics: Vec<Diagnostic>) -> CompileOutput {
    CompileOutput {
        diagnostics,
        module: None,
        image: None,
    }
}
