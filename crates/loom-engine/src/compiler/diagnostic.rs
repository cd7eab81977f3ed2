//! Compiler diagnostics
//!
//! Every diagnostic carries a stable id. Errors are `LM0xxx`, warnings are
//! `LM1xxx`.

use std::fmt;

use crate::parser::{LexError, ParseError, Span};

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Informational, never fails a compilation
    Warning,
    /// Fails the compilation
    Error,
}

/// Diagnostic identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    /// Malformed source (LM0001)
    Syntax,
    /// Invalid character, string or number (LM0002)
    Lexical,
    /// Type name does not resolve (LM0101)
    UnknownType,
    /// Imported namespace does not exist (LM0102)
    UnknownNamespace,
    /// Name does not exist in the current context (LM0103)
    UnknownName,
    /// Member declared twice (LM0104)
    DuplicateMember,
    /// Constructor name differs from the class (LM0105)
    ConstructorName,
    /// Unit must declare exactly one class (LM0106)
    ClassCount,
    /// Invalid base type (LM0107)
    InvalidBase,
    /// Supertype is not an interface (LM0108)
    NotAnInterface,
    /// Interface member not implemented (LM0109)
    MissingImplementation,
    /// `return` with a value from a void method (LM0110)
    UnexpectedReturnValue,
    /// `return` without a value from a non-void method (LM0111)
    MissingReturnValue,
    /// Write to a property without a setter (LM0112)
    ReadOnlyProperty,
    /// Member of a support type does not exist or is misused (LM0113)
    UnknownMember,
    /// Target of an assignment is not assignable (LM0114)
    InvalidAssignment,
    /// Wrong number of generic arguments (LM0115)
    GenericArity,
    /// Local declared twice in the same body (LM0116)
    DuplicateLocal,
    /// Type cannot be instantiated (LM0117)
    NotInstantiable,
    /// Wrong number of arguments (LM0118)
    ArgumentCount,
    /// Local declared but never read (LM1001)
    UnusedLocal,
    /// Namespace imported twice (LM1002)
    DuplicateImport,
}

impl DiagnosticCode {
    /// Get the code string (e.g., "LM0101")
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::Syntax => "LM0001",
            DiagnosticCode::Lexical => "LM0002",
            DiagnosticCode::UnknownType => "LM0101",
            DiagnosticCode::UnknownNamespace => "LM0102",
            DiagnosticCode::UnknownName => "LM0103",
            DiagnosticCode::DuplicateMember => "LM0104",
            DiagnosticCode::ConstructorName => "LM0105",
            DiagnosticCode::ClassCount => "LM0106",
            DiagnosticCode::InvalidBase => "LM0107",
            DiagnosticCode::NotAnInterface => "LM0108",
            DiagnosticCode::MissingImplementation => "LM0109",
            DiagnosticCode::UnexpectedReturnValue => "LM0110",
            DiagnosticCode::MissingReturnValue => "LM0111",
            DiagnosticCode::ReadOnlyProperty => "LM0112",
            DiagnosticCode::UnknownMember => "LM0113",
            DiagnosticCode::InvalidAssignment => "LM0114",
            DiagnosticCode::GenericArity => "LM0115",
            DiagnosticCode::DuplicateLocal => "LM0116",
            DiagnosticCode::NotInstantiable => "LM0117",
            DiagnosticCode::ArgumentCount => "LM0118",
            DiagnosticCode::UnusedLocal => "LM1001",
            DiagnosticCode::DuplicateImport => "LM1002",
        }
    }

    /// Severity the code is reported with by default
    pub fn default_severity(&self) -> Severity {
        match self {
            DiagnosticCode::UnusedLocal | DiagnosticCode::DuplicateImport => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One compiler message.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// Identifier
    pub code: DiagnosticCode,
    /// Effective severity
    pub severity: Severity,
    /// Human-readable message
    pub message: String,
    /// Source location
    pub span: Span,
    /// Warning escalated to an error by configuration
    pub escalated: bool,
}

impl Diagnostic {
    /// Diagnostic with its code's default severity.
    pub fn new(code: DiagnosticCode, message: impl Into<String>, span: Span) -> Self {
        Self {
            code,
            severity: code.default_severity(),
            message: message.into(),
            span,
            escalated: false,
        }
    }

    /// Whether the diagnostic fails the compilation
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Turn a warning into an error.
    pub fn escalate(&mut self) {
        if self.severity == Severity::Warning {
            self.severity = Severity::Error;
            self.escalated = true;
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match (self.severity, self.escalated) {
            (Severity::Error, true) => "error (warning as error)",
            (Severity::Error, false) => "error",
            (Severity::Warning, _) => "warning",
        };
        write!(
            f,
            "({},{}): {} {}: {}",
            self.span.line, self.span.column, level, self.code, self.message
        )
    }
}

impl From<&LexError> for Diagnostic {
    fn from(err: &LexError) -> Self {
        Diagnostic::new(DiagnosticCode::Lexical, err.to_string(), err.span())
    }
}

impl From<&ParseError> for Diagnostic {
    fn from(err: &ParseError) -> Self {
        let message = match &err.suggestion {
            Some(s) => format!("{} ({})", err.message, s),
            None => err.message.clone(),
        };
        Diagnostic::new(DiagnosticCode::Syntax, message, err.span)
    }
}
