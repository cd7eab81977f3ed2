//! Runtime error types.

use loom_engine::{CompileError, ModuleError, VmError};
use uuid::Uuid;

use crate::config::ConfigError;

/// Errors that can occur while resolving, generating, compiling or loading.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Generated source was rejected by the compiler
    ///
    /// The message lists every error diagnostic and the source verbatim.
    #[error("{message}")]
    Compilation { message: String },

    /// A referenced type has no stable origin
    #[error("Cannot reference type '{type_name}': unit '{unit}' has no location")]
    UnresolvedReference { type_name: String, unit: String },

    /// Cache lookup for an identifier that was never issued
    #[error("No cached value with identifier {0}")]
    NotFound(Uuid),

    /// File I/O error (persisted modules)
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// The compiler refused the request itself
    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    /// Module encoding or decoding error
    #[error("Module error: {0}")]
    Module(#[from] ModuleError),

    /// Loading into the execution context failed
    #[error("Runtime error: {0}")]
    Vm(#[from] VmError),

    /// The execution context resolves identifiers against another store
    ///
    /// Values registered by generators would be unreachable from the
    /// generated code.
    #[error("Execution context '{context}' does not read from the service cache")]
    ForeignContext { context: String },

    /// Invalid generator configuration
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// The wrapper could not be generated from the given type and options
    #[error("Generation failed: {0}")]
    Generation(String),
}
