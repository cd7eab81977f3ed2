//! Loom execution runtime
//!
//! - [`ExecutionContext`]: isolated module registry plus the value source and
//!   reference binder used while loading
//! - [`GeneratedType`] / [`LoadedModule`]: a loaded class and its unit
//! - `Instance`: live objects of generated classes, usable as host objects
//! - a tree-walking interpreter over the lowered IR

mod class;
mod context;
mod instance;
mod interp;

use loom_sdk::HostError;
use thiserror::Error;

use crate::compiler::ModuleError;

pub use class::{GeneratedType, LoadedModule};
pub use context::{DefaultBinder, ExecutionContext, ReferenceBinder};
pub use instance::Instance;

/// Maximum nesting of generated method calls on one thread
pub const MAX_CALL_DEPTH: usize = 256;

/// VM errors
#[derive(Debug, Error)]
pub enum VmError {
    /// Module could not be decoded
    #[error("Module error: {0}")]
    Module(#[from] ModuleError),

    /// Module file could not be read
    #[error("Failed to read module {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A different module with the same name is already loaded
    #[error("Module '{0}' is already loaded in this context")]
    DuplicateModule(String),

    /// A referenced unit could not be bound
    #[error("Module '{module}' references unit '{unit}' which could not be resolved")]
    UnresolvedReference { module: String, unit: String },

    /// A type named by the module does not exist in its unit
    #[error("Type '{name}' not found in unit '{unit}'")]
    UnresolvedType { name: String, unit: String },

    /// Value does not fit the declared type
    #[error("Type error: {0}")]
    TypeError(String),

    /// Member access on null
    #[error("Null reference: {0}")]
    NullReference(String),

    /// No such member on a value
    #[error("'{type_name}' has no member '{member}'")]
    MissingMember { type_name: String, member: String },

    /// No constructor with the given arity
    #[error("'{type_name}' has no constructor taking {arity} argument(s)")]
    NoConstructor { type_name: String, arity: usize },

    /// Integer division by zero
    #[error("Division by zero")]
    DivideByZero,

    /// Call nesting exceeded [`MAX_CALL_DEPTH`]
    #[error("Stack overflow")]
    StackOverflow,

    /// Failure reported by a host callback or object
    #[error(transparent)]
    Host(#[from] HostError),
}

/// VM execution result
pub type VmResult<T> = Result<T, VmError>;

impl From<VmError> for HostError {
    fn from(err: VmError) -> Self {
        match err {
            VmError::Host(inner) => inner,
            VmError::MissingMember { type_name, member } => HostError::MissingMember { type_name, member },
            other => HostError::Failed(other.to_string()),
        }
    }
}
