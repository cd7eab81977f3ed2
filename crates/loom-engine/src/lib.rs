//! Loom Engine
//!
//! The language half of runtime type synthesis:
//! - **Parser**: lexer and parser for Loom source (`parser` module)
//! - **Compiler**: name binding, lowering and the module image format (`compiler` module)
//! - **VM**: execution contexts, loaded types and the interpreter (`vm` module)
//! - **Formatter**: whitespace normalization for generated source (`fmt` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use loom_engine::{compile, CompileOptions, ExecutionContext};
//! use loom_sdk::EmptySource;
//!
//! let source = r#"
//!     public class Greeter {
//!         public string Greet(string name) { return "Hello " + name; }
//!     }
//! "#;
//!
//! let out = compile(source, &[], &CompileOptions::new("greeter")).unwrap();
//! let ctx = ExecutionContext::new("demo", Arc::new(EmptySource));
//! let module = ctx.load_bytes(out.image.as_deref().unwrap(), &[]).unwrap();
//! let greeter = module.generated_type().create_instance(&[]).unwrap();
//! ```

#![warn(rust_2018_idioms)]
#![allow(clippy::redundant_closure)]
#![allow(ambiguous_wide_pointer_comparisons)]

/// Lexer and parser
pub mod parser;

/// Binding, lowering and module encoding
pub mod compiler;

/// Execution contexts and the interpreter
pub mod vm;

/// Source formatter
pub mod fmt;

pub use compiler::{
    compile, CompileError, CompileOptions, CompileOutput, Diagnostic, DiagnosticCode, Module, ModuleError,
    ModuleReference, OptimizationLevel, Severity, MODULE_VERSION,
};
pub use fmt::format_source;
pub use vm::{
    DefaultBinder, ExecutionContext, GeneratedType, Instance, LoadedModule, ReferenceBinder, VmError, VmResult,
    MAX_CALL_DEPTH,
};
