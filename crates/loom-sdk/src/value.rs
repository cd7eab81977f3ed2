//! Runtime values exchanged between the host and generated code

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::{HostError, HostResult};
use crate::types::{MethodDescriptor, ParameterDescriptor, TypeDescriptor};

/// A live object: either a host object or an instance of a generated class.
pub trait HostObject: Send + Sync {
    /// Runtime type of the object
    fn type_descriptor(&self) -> Arc<TypeDescriptor>;

    /// Call a public method by name.
    fn invoke(&self, method: &str, args: &[Value]) -> HostResult<Value>;

    /// Read a property.
    fn get_property(&self, name: &str) -> HostResult<Value> {
        Err(HostError::MissingMember {
            type_name: self.type_descriptor().full_name(),
            member: name.to_string(),
        })
    }

    /// Write a property.
    fn set_property(&self, name: &str, _value: Value) -> HostResult<()> {
        Err(HostError::MissingMember {
            type_name: self.type_descriptor().full_name(),
            member: name.to_string(),
        })
    }

    /// Downcast support
    fn as_any(&self) -> &dyn Any;
}

/// Shared handle to a live object.
pub type ObjectRef = Arc<dyn HostObject>;

/// Parameter list and return type of a callable.
#[derive(Clone)]
pub struct Signature {
    /// Parameters in declaration order
    pub parameters: Vec<ParameterDescriptor>,
    /// Return type (`core.Void` for none)
    pub return_type: Arc<TypeDescriptor>,
}

impl Signature {
    /// Signature with no parameters.
    pub fn new(return_type: Arc<TypeDescriptor>) -> Self {
        Self {
            parameters: Vec::new(),
            return_type,
        }
    }

    /// Append a named parameter.
    pub fn param(mut self, name: impl Into<String>, ty: Arc<TypeDescriptor>) -> Self {
        let position = self.parameters.len();
        self.parameters.push(ParameterDescriptor {
            name: Some(name.into()),
            ty,
            position,
        });
        self
    }

    /// Append an unnamed parameter.
    pub fn unnamed_param(mut self, ty: Arc<TypeDescriptor>) -> Self {
        let position = self.parameters.len();
        self.parameters.push(ParameterDescriptor { name: None, ty, position });
        self
    }
}

/// Body of a callable.
pub type CallableFn = dyn Fn(&[Value]) -> HostResult<Value> + Send + Sync;

/// A function value with a described signature.
#[derive(Clone)]
pub struct Callable {
    signature: Arc<Signature>,
    func: Arc<CallableFn>,
}

impl Callable {
    /// Wrap a closure.
    pub fn new<F>(signature: Signature, func: F) -> Self
    where
        F: Fn(&[Value]) -> HostResult<Value> + Send + Sync + 'static,
    {
        Self {
            signature: Arc::new(signature),
            func: Arc::new(func),
        }
    }

    /// Declared signature
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Call with exactly as many arguments as the signature declares.
    pub fn invoke(&self, args: &[Value]) -> HostResult<Value> {
        if args.len() != self.signature.parameters.len() {
            return Err(HostError::ArityMismatch {
                expected: self.signature.parameters.len(),
                got: args.len(),
            });
        }
        (self.func)(args)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Callable({} params -> {})",
            self.signature.parameters.len(),
            self.signature.return_type
        )
    }
}

/// Hook run before or after a wrapped method.
pub type MethodHookFn = dyn Fn(&ObjectRef, &MethodDescriptor) -> HostResult<()> + Send + Sync;

/// Hook run once a wrapper has obtained its instance.
pub type ConstructHookFn = dyn Fn(&ObjectRef) -> HostResult<()> + Send + Sync;

/// A caller-supplied callback generated code invokes at a fixed point.
#[derive(Clone)]
pub enum Hook {
    /// Invoked with `(instance, method)`
    Method(Arc<MethodHookFn>),
    /// Invoked with `(instance)`
    Construct(Arc<ConstructHookFn>),
}

impl Hook {
    /// Before/after method hook.
    pub fn method<F>(f: F) -> Self
    where
        F: Fn(&ObjectRef, &MethodDescriptor) -> HostResult<()> + Send + Sync + 'static,
    {
        Hook::Method(Arc::new(f))
    }

    /// On-construct hook.
    pub fn construct<F>(f: F) -> Self
    where
        F: Fn(&ObjectRef) -> HostResult<()> + Send + Sync + 'static,
    {
        Hook::Construct(Arc::new(f))
    }

    /// Invoke from generated code, checking the argument shape.
    pub fn invoke(&self, args: &[Value]) -> HostResult<()> {
        match (self, args) {
            (Hook::Method(f), [Value::Object(obj), Value::Method(m)]) => f(obj, m),
            (Hook::Construct(f), [Value::Object(obj)]) => f(obj),
            (Hook::Method(_), _) => Err(HostError::TypeMismatch {
                expected: "(Object, MethodInfo)".to_string(),
                got: describe_args(args),
            }),
            (Hook::Construct(_), _) => Err(HostError::TypeMismatch {
                expected: "(Object)".to_string(),
                got: describe_args(args),
            }),
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hook::Method(_) => write!(f, "Hook::Method"),
            Hook::Construct(_) => write!(f, "Hook::Construct"),
        }
    }
}

fn describe_args(args: &[Value]) -> String {
    let names: Vec<&str> = args.iter().map(Value::type_name).collect();
    format!("({})", names.join(", "))
}

/// A dynamically typed value.
#[derive(Clone)]
pub enum Value {
    /// Absence of a value
    Null,
    /// Boolean
    Bool(bool),
    /// Integer (both `Int32` and `Int64`)
    Int(i64),
    /// Float
    Float(f64),
    /// Immutable string
    Str(Arc<str>),
    /// Immutable list
    List(Arc<Vec<Value>>),
    /// Live object
    Object(ObjectRef),
    /// Function value
    Callable(Callable),
    /// Hook callback
    Hook(Hook),
    /// Method descriptor handed to hooks
    Method(Arc<MethodDescriptor>),
}

impl Value {
    /// Short name of the value's category
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "double",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Object(_) => "object",
            Value::Callable(_) => "callable",
            Value::Hook(_) => "hook",
            Value::Method(_) => "method",
        }
    }

    /// Build a string value.
    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Arc::from(s.as_ref()))
    }

    /// True for `Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integer payload
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Float payload, widening integers
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Boolean payload
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// String payload
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Object payload
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Integer payload or a type mismatch error
    pub fn expect_i64(&self) -> HostResult<i64> {
        self.as_i64().ok_or_else(|| self.mismatch("int"))
    }

    /// String payload or a type mismatch error
    pub fn expect_str(&self) -> HostResult<&str> {
        self.as_str().ok_or_else(|| self.mismatch("string"))
    }

    /// Boolean payload or a type mismatch error
    pub fn expect_bool(&self) -> HostResult<bool> {
        self.as_bool().ok_or_else(|| self.mismatch("bool"))
    }

    fn mismatch(&self, expected: &str) -> HostError {
        HostError::TypeMismatch {
            expected: expected.to_string(),
            got: self.type_name().to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => (*a as f64) == *b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Method(a), Value::Method(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::List(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Object(o) => write!(f, "<{}>", o.type_descriptor()),
            Value::Callable(c) => write!(f, "{:?}", c),
            Value::Hook(h) => write!(f, "{:?}", h),
            Value::Method(m) => write!(f, "<method {}>", m.name),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{}", s),
            other => write!(f, "{:?}", other),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(Arc::new(items))
    }
}

impl From<ObjectRef> for Value {
    fn from(o: ObjectRef) -> Self {
        Value::Object(o)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::core_types;

    #[test]
    fn test_callable_arity_is_checked() {
        let sig = Signature::new(core_types().int32.clone())
            .param("a", core_types().int32.clone())
            .param("b", core_types().int32.clone());
        let add = Callable::new(sig, |args| Ok(Value::Int(args[0].expect_i64()? + args[1].expect_i64()?)));

        assert_eq!(add.invoke(&[Value::Int(2), Value::Int(3)]).unwrap(), Value::Int(5));
        assert!(matches!(
            add.invoke(&[Value::Int(2)]),
            Err(HostError::ArityMismatch { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn test_hook_rejects_wrong_shape() {
        let hook = Hook::construct(|_| Ok(()));
        let err = hook.invoke(&[Value::Int(1)]).unwrap_err();
        assert!(err.to_string().contains("(Object)"));
    }

    #[test]
    fn test_numeric_equality() {
        assert_eq!(Value::Int(2), Value::Float(2.0));
        assert_ne!(Value::str("2"), Value::Int(2));
        assert_eq!(Value::from("abc").to_string(), "abc");
    }
}
