//! Error types for host callbacks and value conversions

/// Result type for host-side operations
pub type HostResult<T> = Result<T, HostError>;

/// Errors raised by host objects, callables and hooks
#[derive(Debug, Clone, thiserror::Error)]
pub enum HostError {
    /// Type mismatch during conversion
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected type name
        expected: String,
        /// Actual type name
        got: String,
    },

    /// Wrong number of arguments
    #[error("Argument count mismatch: expected {expected}, got {got}")]
    ArityMismatch {
        /// Declared parameter count
        expected: usize,
        /// Supplied argument count
        got: usize,
    },

    /// Member not found on a host object
    #[error("Member '{member}' not found on {type_name}")]
    MissingMember {
        /// Type the lookup ran against
        type_name: String,
        /// Member name
        member: String,
    },

    /// Property exists but cannot be written
    #[error("Property '{0}' is read-only")]
    ReadOnly(String),

    /// Type cannot be instantiated without a factory
    #[error("Type {0} has no activator")]
    NoActivator(String),

    /// Cache identifier not present
    #[error("No cached value with identifier {0}")]
    NotFound(uuid::Uuid),

    /// Error reported by user code
    #[error("{0}")]
    Failed(String),
}

impl From<String> for HostError {
    fn from(s: String) -> Self {
        HostError::Failed(s)
    }
}

impl From<&str> for HostError {
    fn from(s: &str) -> Self {
        HostError::Failed(s.to_string())
    }
}
