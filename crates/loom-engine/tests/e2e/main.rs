//! End-to-end tests for the Loom engine
//!
//! These tests compile Loom source, load the module into an execution
//! context and drive the generated type through the host object interface.

mod harness;

mod classes;
mod host_interop;
mod operators;

pub use harness::*;
