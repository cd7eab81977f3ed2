//! End-to-end tests for the Loom runtime
//!
//! These tests generate wrapper types from host descriptors and callables,
//! compile them through a compilation service and drive the results
//! through the host object interface.

mod harness;

mod callable;
mod compilation;
mod instance;

pub use harness::*;
