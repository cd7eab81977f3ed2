//! Values generated code can recover by identifier

use std::fmt;

use uuid::Uuid;

use crate::error::HostResult;
use crate::types::Activator;
use crate::value::{Callable, Hook, ObjectRef};

/// A live value stored under an identifier.
#[derive(Clone)]
pub enum CachedValue {
    /// Function value
    Callable(Callable),
    /// One shared instance
    Instance(ObjectRef),
    /// Produces a fresh instance on every retrieval
    Factory(Activator),
    /// Hook callback
    Hook(Hook),
}

impl CachedValue {
    /// Short name of the stored category
    pub fn kind(&self) -> &'static str {
        match self {
            CachedValue::Callable(_) => "callable",
            CachedValue::Instance(_) => "instance",
            CachedValue::Factory(_) => "factory",
            CachedValue::Hook(_) => "hook",
        }
    }
}

impl fmt::Debug for CachedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CachedValue::{}", self.kind())
    }
}

/// Read access to stored values, as seen by generated code.
pub trait ValueSource: Send + Sync {
    /// Fetch the value stored under `id`.
    ///
    /// Fails with [`HostError::NotFound`](crate::HostError::NotFound) for
    /// identifiers that were never issued.
    fn lookup(&self, id: &Uuid) -> HostResult<CachedValue>;
}

/// A source that holds nothing. Every lookup fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptySource;

impl ValueSource for EmptySource {
    fn lookup(&self, id: &Uuid) -> HostResult<CachedValue> {
        Err(crate::HostError::NotFound(*id))
    }
}
