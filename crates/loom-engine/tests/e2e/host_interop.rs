//! Host interop tests
//!
//! Inheritance from host classes, interface implementation, cached values
//! and chaining one generated type into the next.

use std::sync::Arc;

use loom_engine::{compile, CompileOptions, ExecutionContext};
use loom_sdk::{core_types, Activator, CachedValue, Callable, Hook, ObjectRef, Signature, Value};
use parking_lot::Mutex;

use super::harness::*;

// ============================================================================
// Host types
// ============================================================================

#[test]
fn test_inherits_host_class_and_implements_interface() {
    let app = app_unit();
    let source = "import App.Models;
         namespace Generated;
         public class Student : Person, INamed {
             public string Describe() { return \"Student \" + Name; }
             public string Run() { Name = \"Zed\"; return Greet(\"Bob\"); }
         }";
    let (_ctx, module) = load_with(source, &[app.clone()], Arc::new(TestSource::default())).unwrap();
    let obj = module.generated_type().create_instance(&[]).unwrap();

    assert_eq!(obj.invoke("Describe", &[]).unwrap(), Value::str("Student Ann"));
    assert_eq!(obj.invoke("Run", &[]).unwrap(), Value::str("Hello Bob, I am Zed"));
    // Inherited members resolve through the base object
    assert_eq!(obj.get_property("Id").unwrap(), Value::Int(7));
    assert_eq!(obj.invoke("Greet", &[Value::str("Al")]).unwrap(), Value::str("Hello Al, I am Zed"));

    let ty = obj.type_descriptor();
    assert!(ty.is_assignable_to(&app.find_type("App.Models.Person").unwrap()));
    assert!(ty.is_assignable_to(&app.find_type("App.Models.INamed").unwrap()));
    assert_eq!(module.references().len(), 1);
    assert_eq!(module.unit().dependencies()[0].name(), "app");
}

#[test]
fn test_host_object_fields() {
    let app = app_unit();
    let source = "import App.Models;
         public class Holder {
             private Person p = new Person();
             public int Run() { p.Name = \"Kim\"; return p.Id; }
             public string Who() { return p.Name; }
         }";
    let (_ctx, module) = load_with(source, &[app], Arc::new(TestSource::default())).unwrap();
    let obj = module.generated_type().create_instance(&[]).unwrap();
    assert_eq!(obj.invoke("Run", &[]).unwrap(), Value::Int(7));
    assert_eq!(obj.invoke("Who", &[]).unwrap(), Value::str("Kim"));
}

#[test]
fn test_cast_to_incompatible_host_type_fails() {
    expect_runtime_error(
        "import App.Models;
         public class Caster {
             public Person Run() { var o = \"text\" as object; return o as Person; }
         }",
        "Run",
        "Cannot convert string to App.Models.Person",
    );
}

// ============================================================================
// Cached values
// ============================================================================

#[test]
fn test_cached_callable() {
    let core = core_types();
    let values = Arc::new(TestSource::default());
    let sig = Signature::new(core.int32.clone()).param("x", core.int32.clone());
    let id = values.insert(CachedValue::Callable(Callable::new(sig, |args| {
        Ok(Value::Int(args[0].expect_i64()? * 2))
    })));

    let source = format!(
        "public class Doubler {{
             public int Run(int x) {{
                 var deleg = core.ValueCache.callable(\"{}\");
                 var result = deleg.invoke(x) as int;
                 return result;
             }}
         }}",
        id
    );
    let value = run_with(&source, &[], values, "Run", &[Value::Int(21)]).unwrap();
    assert_eq!(value, Value::Int(42));
}

#[test]
fn test_cached_instance_with_method_hook() {
    let app = app_unit();
    let values = Arc::new(TestSource::default());
    let person: ObjectRef = HostPerson::new(&app, "Lee", 1);
    let instance_id = values.insert(CachedValue::Instance(person));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();
    let hook_id = values.insert(CachedValue::Hook(Hook::method(move |obj, method| {
        recorder.lock().push(format!("{}:{}", obj.type_descriptor().name(), method.name));
        Ok(())
    })));

    let source = format!(
        "import App.Models;
         public class Wrapper {{
             private Person _instance = core.ValueCache.instance(\"{}\") as Person;
             public string Greet(string other) {{
                 core.ValueCache.hook(\"{}\").invoke(_instance, core.Reflect.method(_instance, \"Greet\"));
                 return _instance.Greet(other);
             }}
         }}",
        instance_id, hook_id
    );
    let value = run_with(&source, &[app], values, "Greet", &[Value::str("Max")]).unwrap();
    assert_eq!(value, Value::str("Hello Max, I am Lee"));
    assert_eq!(*seen.lock(), vec!["Person:Greet".to_string()]);
}

#[test]
fn test_factory_produces_fresh_instances() {
    let app = app_unit();
    let values = Arc::new(TestSource::default());
    let factory_unit = app.clone();
    let factory: Activator = Arc::new(move |_: &[Value]| {
        let person: ObjectRef = HostPerson::new(&factory_unit, "Fresh", 2);
        Ok(person)
    });
    let id = values.insert(CachedValue::Factory(factory));

    let source = format!(
        "public class Fresh {{
             public bool Run() {{
                 var a = core.ValueCache.instance(\"{0}\");
                 var b = core.ValueCache.instance(\"{0}\");
                 return a == b;
             }}
         }}",
        id
    );
    assert_eq!(run_with(&source, &[app], values, "Run", &[]).unwrap(), Value::Bool(false));
}

#[test]
fn test_unknown_cache_identifier() {
    let source = format!(
        "public class Lost {{ public object Run() {{ return core.ValueCache.callable(\"{}\"); }} }}",
        uuid::Uuid::new_v4()
    );
    let err = run_with(&source, &[], Arc::new(TestSource::default()), "Run", &[]).unwrap_err();
    assert!(err.to_string().contains("No cached value"), "{}", err);
}

#[test]
fn test_wrong_cached_category() {
    let values = Arc::new(TestSource::default());
    let id = values.insert(CachedValue::Hook(Hook::construct(|_| Ok(()))));
    let source = format!(
        "public class Wrong {{ public object Run() {{ return core.ValueCache.callable(\"{}\"); }} }}",
        id
    );
    let err = run_with(&source, &[], values, "Run", &[]).unwrap_err();
    assert!(err.to_string().contains("is a hook, not a callable"), "{}", err);
}

// ============================================================================
// Chained generation
// ============================================================================

#[test]
fn test_generated_type_as_reference() {
    let ctx = ExecutionContext::new("chain", Arc::new(TestSource::default()));

    let first = compile(
        "namespace Demo; public class Counter { private int n; public int Next() { n = n + 1; return n; } }",
        &[],
        &CompileOptions::new("counter"),
    )
    .unwrap();
    let counter = ctx.load_bytes(first.image.as_deref().unwrap(), &[]).unwrap();
    let counter_unit = counter.unit().clone();

    let second = compile(
        "import Demo;
         public class Twice {
             private Counter c = new Counter();
             public int Run() { c.Next(); return c.Next(); }
         }",
        &[counter_unit.clone()],
        &CompileOptions::new("twice"),
    )
    .unwrap();
    assert!(second.is_success(), "{:?}", second.diagnostics);
    let twice = ctx.load_bytes(second.image.as_deref().unwrap(), &[counter_unit]).unwrap();

    let obj = twice.generated_type().create_instance(&[]).unwrap();
    assert_eq!(obj.invoke("Run", &[]).unwrap(), Value::Int(2));
    assert_eq!(twice.unit().dependencies()[0].name(), "counter");
    assert_eq!(ctx.modules().len(), 2);
}
