//! Loom SDK - host-facing data model for runtime type synthesis
//!
//! This crate carries the pieces shared by the host, the engine that runs
//! generated code, and the generators:
//!
//! - [`UnitDescriptor`] / [`TypeDescriptor`]: type metadata the host supplies
//!   (and generated types publish about themselves)
//! - [`Value`] / [`HostObject`]: runtime values crossing the boundary
//! - [`Callable`] / [`Hook`]: function values and interception callbacks
//! - [`CachedValue`] / [`ValueSource`]: values generated code recovers by id
//!
//! # Example
//!
//! ```ignore
//! use loom_sdk::{core_types, Callable, Signature, Value};
//!
//! let sig = Signature::new(core_types().boolean.clone())
//!     .param("age", core_types().int32.clone());
//! let adult = Callable::new(sig, |args| Ok(Value::Bool(args[0].expect_i64()? >= 18)));
//! ```

#![warn(missing_docs)]

pub mod builtin;
pub mod cache;
pub mod error;
pub mod types;
pub mod value;

pub use builtin::{core_types, CoreTypes, CORE_LOCATION, CORE_UNIT};
pub use cache::{CachedValue, EmptySource, ValueSource};
pub use error::{HostError, HostResult};
pub use types::{
    Activator, MethodDescriptor, ParameterDescriptor, PrimitiveKind, PropertyDescriptor, TypeBuilder,
    TypeDescriptor, TypeKind, UnitDescriptor, UnitRef,
};
pub use value::{
    Callable, CallableFn, ConstructHookFn, Hook, HostObject, MethodHookFn, ObjectRef, Signature, Value,
};
