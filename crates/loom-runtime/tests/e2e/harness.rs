//! Test harness for generator end-to-end tests
//!
//! Supplies a host unit with a person type, host objects that record the
//! calls they receive, and compilation services isolated from the global
//! cache.

use std::any::Any;
use std::path::Path;
use std::sync::Arc;

use loom_runtime::{CompilationOptions, CompilationService, ValueCache};
use loom_sdk::{
    core_types, HostError, HostObject, HostResult, MethodDescriptor, ObjectRef, PropertyDescriptor, TypeDescriptor,
    UnitDescriptor, Value,
};
use parking_lot::Mutex;

/// Shared call log.
pub type Log = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

// ============================================================================
// Host objects
// ============================================================================

/// Host-side object behind `App.Models.Person`.
pub struct HostPerson {
    unit: Arc<UnitDescriptor>,
    name: Mutex<String>,
    id: i64,
    log: Log,
}

impl HostPerson {
    pub fn new(unit: &Arc<UnitDescriptor>, name: &str, id: i64, log: Log) -> Arc<Self> {
        Arc::new(Self {
            unit: unit.clone(),
            name: Mutex::new(name.to_string()),
            id,
            log,
        })
    }

    pub fn name(&self) -> String {
        self.name.lock().clone()
    }

    fn missing(&self, member: &str) -> HostError {
        HostError::MissingMember {
            type_name: "App.Models.Person".to_string(),
            member: member.to_string(),
        }
    }
}

impl HostObject for HostPerson {
    fn type_descriptor(&self) -> Arc<TypeDescriptor> {
        self.unit.find_type("App.Models.Person").expect("Person registered")
    }

    fn invoke(&self, method: &str, args: &[Value]) -> HostResult<Value> {
        self.log.lock().push(method.to_string());
        match (method, args) {
            ("Greet", [other]) => Ok(Value::from(format!(
                "Hello {}, I am {}",
                other.expect_str()?,
                self.name.lock()
            ))),
            ("Rename", [name]) => {
                *self.name.lock() = name.expect_str()?.to_string();
                Ok(Value::Null)
            }
            ("Describe", []) => Ok(Value::from(format!("Person #{}", self.id))),
            _ => Err(self.missing(method)),
        }
    }

    fn get_property(&self, name: &str) -> HostResult<Value> {
        match name {
            "Name" => Ok(Value::str(self.name.lock().as_str())),
            "Id" => Ok(Value::Int(self.id)),
            _ => Err(self.missing(name)),
        }
    }

    fn set_property(&self, name: &str, value: Value) -> HostResult<()> {
        match name {
            "Name" => {
                *self.name.lock() = value.expect_str()?.to_string();
                Ok(())
            }
            "Id" => Err(HostError::ReadOnly("Id".to_string())),
            _ => Err(self.missing(name)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Host-side object behind `App.Models.Entity`.
pub struct HostEntity {
    unit: Arc<UnitDescriptor>,
}

impl HostObject for HostEntity {
    fn type_descriptor(&self) -> Arc<TypeDescriptor> {
        self.unit.find_type("App.Models.Entity").expect("Entity registered")
    }

    fn invoke(&self, method: &str, _args: &[Value]) -> HostResult<Value> {
        Err(HostError::MissingMember {
            type_name: "App.Models.Entity".to_string(),
            member: method.to_string(),
        })
    }

    fn get_property(&self, name: &str) -> HostResult<Value> {
        match name {
            "Kind" => Ok(Value::str("entity")),
            _ => Err(HostError::MissingMember {
                type_name: "App.Models.Entity".to_string(),
                member: name.to_string(),
            }),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Host unit
// ============================================================================

/// The `app` unit and the log every activated person writes to.
pub struct App {
    pub unit: Arc<UnitDescriptor>,
    pub log: Log,
}

impl App {
    pub fn person(&self) -> Arc<TypeDescriptor> {
        self.unit.find_type("App.Models.Person").expect("Person registered")
    }

    pub fn named(&self) -> Arc<TypeDescriptor> {
        self.unit.find_type("App.Models.INamed").expect("INamed registered")
    }

    pub fn entity(&self) -> Arc<TypeDescriptor> {
        self.unit.find_type("App.Models.Entity").expect("Entity registered")
    }

    /// A person activated outside the type's own activator.
    pub fn new_person(&self, name: &str, id: i64) -> Arc<HostPerson> {
        HostPerson::new(&self.unit, name, id, self.log.clone())
    }
}

/// A fresh `app` unit exporting `Person`, `Entity` and `INamed` under
/// `App.Models`.
pub fn app() -> App {
    let core = core_types();
    let log = new_log();
    let unit = UnitDescriptor::located("app", "/virtual/app.dll");

    let activator_unit = unit.clone();
    let activator_log = log.clone();
    TypeDescriptor::class("App.Models", "Person")
        .property(PropertyDescriptor::new("Name", core.string.clone()))
        .property(PropertyDescriptor::new("Id", core.int32.clone()).read_only())
        .method(MethodDescriptor::new("Greet", core.string.clone()).param("other", core.string.clone()))
        .method(MethodDescriptor::new("Rename", core.void.clone()).param("name", core.string.clone()))
        .method(MethodDescriptor::new("Describe", core.string.clone()))
        .method(MethodDescriptor::new("Forget", core.void.clone()).private())
        .method(MethodDescriptor::new("Create", core.object.clone()).static_())
        .activator(move |_| {
            let person: ObjectRef = HostPerson::new(&activator_unit, "Ann", 7, activator_log.clone());
            Ok(person)
        })
        .build(&unit);

    let entity_unit = unit.clone();
    TypeDescriptor::class("App.Models", "Entity")
        .property(PropertyDescriptor::new("Kind", core.string.clone()).read_only())
        .activator(move |_| {
            let entity: ObjectRef = Arc::new(HostEntity {
                unit: entity_unit.clone(),
            });
            Ok(entity)
        })
        .build(&unit);

    TypeDescriptor::interface("App.Models", "INamed")
        .method(MethodDescriptor::new("Describe", core.string.clone()).abstract_())
        .build(&unit);

    App { unit, log }
}

// ============================================================================
// Services
// ============================================================================

/// In-memory service with its own cache.
pub fn ephemeral() -> Arc<CompilationService> {
    let options = CompilationOptions::ephemeral().with_cache(Arc::new(ValueCache::new()));
    Arc::new(CompilationService::new(options).expect("service"))
}

/// Service persisting modules under `dir`, with its own cache.
pub fn persisted(dir: &Path) -> Arc<CompilationService> {
    let options = CompilationOptions {
        working_dir: Some(dir.to_path_buf()),
        ..CompilationOptions::default()
    }
    .with_cache(Arc::new(ValueCache::new()));
    Arc::new(CompilationService::new(options).expect("service"))
}

/// The host person behind an object handed to a hook.
pub fn as_person(obj: &ObjectRef) -> &HostPerson {
    obj.as_any().downcast_ref::<HostPerson>().expect("a host person")
}
