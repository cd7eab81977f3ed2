//! Loom Runtime
//!
//! Host-facing half of runtime type synthesis:
//! - **Value cache**: process-wide store that generated code reads values from (`cache`)
//! - **Reference resolution**: the units a compilation must reference (`resolver`)
//! - **Compilation service**: compile, optionally persist, and load generated source (`compilation`)
//! - **Parameter conversion**: routing wrapped parameters to constructor, property or method (`conversion`)
//! - **Generators**: callable wrappers (`callable`) and instance wrappers (`instance`)
//!
//! # Example
//!
//! ```rust,ignore
//! use loom_runtime::{CallableWrapper, CallableWrapperOptions};
//! use loom_sdk::{core_types, Callable, Signature, Value};
//!
//! let sig = Signature::new(core_types().boolean.clone())
//!     .param("age", core_types().int32.clone());
//! let adult = Callable::new(sig, |args| Ok(Value::Bool(args[0].expect_i64()? >= 18)));
//!
//! let ty = CallableWrapper::default().create_type(adult, &CallableWrapperOptions::default())?;
//! let checker = ty.create_instance(&[])?;
//! assert_eq!(checker.invoke("Run", &[Value::Int(21)])?, Value::Bool(true));
//! ```

#![warn(rust_2018_idioms)]

pub mod cache;
pub mod callable;
pub mod compilation;
pub mod config;
pub mod conversion;
pub mod error;
pub mod instance;
pub mod resolver;
pub mod source;

pub use cache::ValueCache;
pub use callable::{CallableWrapper, CallableWrapperOptions, MethodName};
pub use compilation::{
    default_context_factory, default_working_dir, set_default_context_factory, CompilationOptions,
    CompilationService, ContextFactory, DefaultContextFactory,
};
pub use config::{ConfigError, GeneratorConfig};
pub use conversion::{property_name, ConversionRule, ParameterConversion, Route, RoutedMembers};
pub use error::RuntimeError;
pub use instance::{default_include_method, AdditionalParameter, InstanceWrapper, InstanceWrapperOptions};
pub use resolver::ReferenceSet;
