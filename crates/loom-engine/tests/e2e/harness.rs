//! Test harness for end-to-end compilation and execution
//!
//! Compiles Loom source against a small host unit, loads the module into a
//! fresh execution context and drives the generated type.

use std::any::Any;
use std::sync::Arc;

use loom_engine::{compile, CompileError, CompileOptions, Diagnostic, ExecutionContext, LoadedModule, VmError};
use loom_sdk::{
    core_types, CachedValue, HostError, HostObject, HostResult, MethodDescriptor, ObjectRef, PropertyDescriptor,
    TypeDescriptor, UnitDescriptor, Value, ValueSource,
};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use uuid::Uuid;

/// Error type for e2e tests
#[derive(Debug)]
pub enum E2EError {
    /// Source was rejected; carries every diagnostic
    Compile(Vec<Diagnostic>),
    /// Compiler refused the request itself
    Setup(CompileError),
    /// Module could not be loaded or code failed while running
    Vm(VmError),
    /// Failure surfaced through the host object interface
    Host(HostError),
}

impl std::fmt::Display for E2EError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            E2EError::Compile(diags) => {
                write!(f, "Compile error:")?;
                for d in diags {
                    write!(f, " {}", d)?;
                }
                Ok(())
            }
            E2EError::Setup(e) => write!(f, "Setup error: {}", e),
            E2EError::Vm(e) => write!(f, "VM error: {}", e),
            E2EError::Host(e) => write!(f, "Host error: {}", e),
        }
    }
}

impl std::error::Error for E2EError {}

/// Result type for e2e tests
pub type E2EResult<T> = Result<T, E2EError>;

// ============================================================================
// Host unit
// ============================================================================

/// Host-side person object exposed through `App.Models.Person`.
pub struct HostPerson {
    unit: Arc<UnitDescriptor>,
    name: Mutex<String>,
    id: i64,
}

impl HostPerson {
    pub fn new(unit: &Arc<UnitDescriptor>, name: &str, id: i64) -> Arc<Self> {
        Arc::new(Self {
            unit: unit.clone(),
            name: Mutex::new(name.to_string()),
            id,
        })
    }
}

impl HostObject for HostPerson {
    fn type_descriptor(&self) -> Arc<TypeDescriptor> {
        self.unit.find_type("App.Models.Person").expect("Person registered")
    }

    fn invoke(&self, method: &str, args: &[Value]) -> HostResult<Value> {
        match (method, args) {
            ("Greet", [other]) => Ok(Value::from(format!(
                "Hello {}, I am {}",
                other.expect_str()?,
                self.name.lock()
            ))),
            _ => Err(HostError::MissingMember {
                type_name: "App.Models.Person".to_string(),
                member: method.to_string(),
            }),
        }
    }

    fn get_property(&self, name: &str) -> HostResult<Value> {
        match name {
            "Name" => Ok(Value::str(self.name.lock().as_str())),
            "Id" => Ok(Value::Int(self.id)),
            _ => Err(HostError::MissingMember {
                type_name: "App.Models.Person".to_string(),
                member: name.to_string(),
            }),
        }
    }

    fn set_property(&self, name: &str, value: Value) -> HostResult<()> {
        match name {
            "Name" => {
                *self.name.lock() = value.expect_str()?.to_string();
                Ok(())
            }
            "Id" => Err(HostError::ReadOnly("Id".to_string())),
            _ => Err(HostError::MissingMember {
                type_name: "App.Models.Person".to_string(),
                member: name.to_string(),
            }),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A fresh `app` unit exporting `App.Models.Person` and `App.Models.INamed`.
pub fn app_unit() -> Arc<UnitDescriptor> {
    let core = core_types();
    let app = UnitDescriptor::located("app", "/virtual/app.dll");
    let activator_unit = app.clone();
    TypeDescriptor::class("App.Models", "Person")
        .property(PropertyDescriptor::new("Name", core.string.clone()))
        .property(PropertyDescriptor::new("Id", core.int32.clone()).read_only())
        .method(MethodDescriptor::new("Greet", core.string.clone()).param("other", core.string.clone()))
        .activator(move |_| {
            let person: ObjectRef = HostPerson::new(&activator_unit, "Ann", 7);
            Ok(person)
        })
        .build(&app);
    TypeDescriptor::interface("App.Models", "INamed")
        .method(MethodDescriptor::new("Describe", core.string.clone()))
        .build(&app);
    app
}

// ============================================================================
// Value source
// ============================================================================

/// In-memory value source for tests.
#[derive(Default)]
pub struct TestSource {
    values: RwLock<FxHashMap<Uuid, CachedValue>>,
}

impl TestSource {
    pub fn insert(&self, value: CachedValue) -> Uuid {
        let id = Uuid::new_v4();
        self.values.write().insert(id, value);
        id
    }
}

impl ValueSource for TestSource {
    fn lookup(&self, id: &Uuid) -> HostResult<CachedValue> {
        self.values.read().get(id).cloned().ok_or(HostError::NotFound(*id))
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Compile and load `source` into a new context backed by `source_values`.
pub fn load_with(
    source: &str,
    references: &[Arc<UnitDescriptor>],
    values: Arc<TestSource>,
) -> E2EResult<(ExecutionContext, Arc<LoadedModule>)> {
    let out = compile(source, references, &CompileOptions::new("e2e")).map_err(E2EError::Setup)?;
    let Some(image) = out.image else {
        return Err(E2EError::Compile(out.diagnostics));
    };
    let ctx = ExecutionContext::new("e2e", values);
    let module = ctx.load_bytes(&image, references).map_err(E2EError::Vm)?;
    Ok((ctx, module))
}

/// Compile, load, construct with no arguments and invoke `method`.
pub fn run(source: &str, method: &str, args: &[Value]) -> E2EResult<Value> {
    run_with(source, &[app_unit()], Arc::new(TestSource::default()), method, args)
}

pub fn run_with(
    source: &str,
    references: &[Arc<UnitDescriptor>],
    values: Arc<TestSource>,
    method: &str,
    args: &[Value],
) -> E2EResult<Value> {
    let (_ctx, module) = load_with(source, references, values)?;
    let obj = module.generated_type().create_instance(&[]).map_err(E2EError::Vm)?;
    obj.invoke(method, args).map_err(E2EError::Host)
}

/// Run `method` and compare its result.
pub fn expect_value(source: &str, method: &str, args: &[Value], expected: Value) {
    match run(source, method, args) {
        Ok(value) => assert_eq!(value, expected, "Source:\n{}", source),
        Err(e) => panic!("Execution failed: {}\nSource:\n{}", e, source),
    }
}

/// Expect compilation to fail with a diagnostic of the given code.
pub fn expect_compile_error(source: &str, code: &str) {
    match run(source, "Run", &[]) {
        Err(E2EError::Compile(diags)) => {
            assert!(
                diags.iter().any(|d| d.code.as_str() == code),
                "Expected {}, got {:?}\nSource:\n{}",
                code,
                diags,
                source
            );
        }
        Ok(value) => panic!("Expected {} but got {:?}\nSource:\n{}", code, value, source),
        Err(e) => panic!("Expected compile error {}, got {}\nSource:\n{}", code, e, source),
    }
}

/// Expect `method` to fail at run time with a message containing `pattern`.
pub fn expect_runtime_error(source: &str, method: &str, pattern: &str) {
    match run(source, method, &[]) {
        Ok(value) => panic!(
            "Expected runtime error containing '{}', but got {:?}\nSource:\n{}",
            pattern, value, source
        ),
        Err(E2EError::Compile(diags)) => panic!("Unexpected compile errors {:?}\nSource:\n{}", diags, source),
        Err(e) => {
            let message = e.to_string();
            assert!(
                message.contains(pattern),
                "Expected runtime error containing '{}', got: {}\nSource:\n{}",
                pattern,
                message,
                source
            );
        }
    }
}
