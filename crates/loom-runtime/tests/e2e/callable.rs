//! Callable wrapper tests
//!
//! Wrapping host callables into generated types, with and without
//! parameter routing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use loom_runtime::{
    CallableWrapper, CallableWrapperOptions, ConversionRule, MethodName, ParameterConversion, Route, RuntimeError,
};
use loom_sdk::{core_types, Callable, HostError, Signature, Value};

use super::harness::*;

/// `(int age, string name) -> bool`: true for adults with a name.
fn adult_check() -> Callable {
    let core = core_types();
    let sig = Signature::new(core.boolean.clone())
        .param("age", core.int32.clone())
        .param("name", core.string.clone());
    Callable::new(sig, |args| {
        Ok(Value::Bool(args[0].expect_i64()? >= 18 && !args[1].expect_str()?.is_empty()))
    })
}

/// `(int count, string label) -> string` echoing its arguments.
fn echo() -> Callable {
    let core = core_types();
    let sig = Signature::new(core.string.clone())
        .param("count", core.int32.clone())
        .param("label", core.string.clone());
    Callable::new(sig, |args| {
        Ok(Value::from(format!("{}:{}", args[0].expect_i64()?, args[1].expect_str()?)))
    })
}

fn options() -> CallableWrapperOptions {
    CallableWrapperOptions {
        compilation: Some(ephemeral()),
        ..CallableWrapperOptions::default()
    }
}

#[test]
fn test_plain_wrapper_has_parameterless_constructor() {
    let ty = CallableWrapper::default().create_type(adult_check(), &options()).unwrap();

    assert_eq!(ty.full_name(), "GeneratedNamespace.GeneratedType");
    assert_eq!(ty.constructors().len(), 1);
    assert!(ty.constructors()[0].params.is_empty());

    let run = ty.method("Run", 2).expect("Run(age, name)");
    assert_eq!(run.params[0].name, "age");
    assert_eq!(run.params[1].name, "name");
}

#[test]
fn test_invokes_wrapped_callable() {
    let ty = CallableWrapper::default().create_type(adult_check(), &options()).unwrap();
    let obj = ty.create_instance(&[]).unwrap();

    assert_eq!(obj.invoke("Run", &[Value::Int(25), Value::str("x")]).unwrap(), Value::Bool(true));
    assert_eq!(obj.invoke("Run", &[Value::Int(12), Value::str("x")]).unwrap(), Value::Bool(false));
    assert_eq!(obj.invoke("Run", &[Value::Int(25), Value::str("")]).unwrap(), Value::Bool(false));
}

#[test]
fn test_int_parameter_routed_to_constructor() {
    let options = CallableWrapperOptions {
        conversion_rules: vec![ConversionRule::for_type(&core_types().int32, Route::ConstructorParameter)],
        ..options()
    };
    let ty = CallableWrapper::default().create_type(adult_check(), &options).unwrap();

    assert_eq!(ty.constructors()[0].params.len(), 1);
    assert!(ty.method("Run", 1).is_some());
    assert!(ty.method("Run", 2).is_none());

    let adult = ty.create_instance(&[Value::Int(25)]).unwrap();
    let child = ty.create_instance(&[Value::Int(10)]).unwrap();
    assert_eq!(adult.invoke("Run", &[Value::str("x")]).unwrap(), Value::Bool(true));
    assert_eq!(child.invoke("Run", &[Value::str("x")]).unwrap(), Value::Bool(false));
    // Constructor state survives repeated calls
    assert_eq!(adult.invoke("Run", &[Value::str("y")]).unwrap(), Value::Bool(true));
}

#[test]
fn test_property_routing_reads_latest_value() {
    let options = CallableWrapperOptions {
        conversion_rules: vec![ConversionRule::for_name("label", Route::PublicProperty)],
        ..options()
    };
    let ty = CallableWrapper::default().create_type(echo(), &options).unwrap();
    assert!(ty.property("Label").is_some());

    let obj = ty.create_instance(&[]).unwrap();
    obj.set_property("Label", Value::str("first")).unwrap();
    assert_eq!(obj.invoke("Run", &[Value::Int(1)]).unwrap(), Value::str("1:first"));
    obj.set_property("Label", Value::str("second")).unwrap();
    assert_eq!(obj.invoke("Run", &[Value::Int(2)]).unwrap(), Value::str("2:second"));
}

#[test]
fn test_renamed_constructor_parameter() {
    let options = CallableWrapperOptions {
        conversion_rules: vec![ConversionRule::new(
            |p| p.name.as_deref() == Some("count"),
            |_| ParameterConversion::to_constructor().renamed("times"),
        )],
        method_name: MethodName::from("Echo"),
        ..options()
    };
    let ty = CallableWrapper::default().create_type(echo(), &options).unwrap();
    assert_eq!(ty.constructors()[0].params[0].name, "times");

    let obj = ty.create_instance(&[Value::Int(3)]).unwrap();
    assert_eq!(obj.invoke("Echo", &[Value::str("x")]).unwrap(), Value::str("3:x"));
}

#[test]
fn test_parameters_named_like_generated_locals() {
    let core = core_types();
    let sig = Signature::new(core.int32.clone())
        .param("deleg", core.int32.clone())
        .param("__deleg", core.int32.clone());
    let callable = Callable::new(sig, |args| Ok(Value::Int(args[0].expect_i64()? - args[1].expect_i64()?)));

    let ty = CallableWrapper::default().create_type(callable, &options()).unwrap();
    let obj = ty.create_instance(&[]).unwrap();
    assert_eq!(obj.invoke("Run", &[Value::Int(9), Value::Int(4)]).unwrap(), Value::Int(5));
}

#[test]
fn test_void_callable() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let sig = Signature::new(core_types().void.clone()).param("step", core_types().int32.clone());
    let callable = Callable::new(sig, move |args| {
        counter.fetch_add(args[0].expect_i64()? as usize, Ordering::SeqCst);
        Ok(Value::Null)
    });

    let ty = CallableWrapper::default().create_type(callable, &options()).unwrap();
    let obj = ty.create_instance(&[]).unwrap();
    assert_eq!(obj.invoke("Run", &[Value::Int(2)]).unwrap(), Value::Null);
    obj.invoke("Run", &[Value::Int(3)]).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 5);
}

#[test]
fn test_callable_error_surfaces() {
    let sig = Signature::new(core_types().int32.clone());
    let callable = Callable::new(sig, |_| Err(HostError::Failed("boom".to_string())));

    let ty = CallableWrapper::default().create_type(callable, &options()).unwrap();
    let obj = ty.create_instance(&[]).unwrap();
    let err = obj.invoke("Run", &[]).unwrap_err();
    assert!(err.to_string().contains("boom"), "{}", err);
}

#[test]
fn test_each_wrap_is_a_distinct_type() {
    let service = ephemeral();
    let options = CallableWrapperOptions {
        compilation: Some(service.clone()),
        ..CallableWrapperOptions::default()
    };
    let wrapper = CallableWrapper::default();
    let first = wrapper.create_type(adult_check(), &options).unwrap();
    let second = wrapper.create_type(adult_check(), &options).unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_ne!(first.module_name(), second.module_name());
    assert_eq!(service.context().modules().len(), 2);
}

#[test]
fn test_host_types_in_signature_are_referenced() {
    let app = app();
    let sig = Signature::new(core_types().string.clone()).param("person", app.person());
    let callable = Callable::new(sig, |args| {
        let person = args[0].as_object().ok_or(HostError::Failed("not an object".to_string()))?;
        Ok(person.get_property("Name")?)
    });

    let service = ephemeral();
    let options = CallableWrapperOptions {
        compilation: Some(service.clone()),
        ..CallableWrapperOptions::default()
    };
    let ty = CallableWrapper::default().create_type(callable, &options).unwrap();
    assert!(service.references().iter().any(|u| u.name() == "app"));

    let obj = ty.create_instance(&[]).unwrap();
    let person: loom_sdk::ObjectRef = app.new_person("Kim", 3);
    assert_eq!(obj.invoke("Run", &[Value::Object(person)]).unwrap(), Value::str("Kim"));
}

#[test]
fn test_unlocated_signature_type_rejected() {
    let floating = loom_sdk::UnitDescriptor::new("memory");
    let ty = loom_sdk::TypeDescriptor::class("Mem", "Floating").build(&floating);
    let sig = Signature::new(core_types().void.clone()).param("f", ty);
    let callable = Callable::new(sig, |_| Ok(Value::Null));

    let err = CallableWrapper::default().create_type(callable, &options()).unwrap_err();
    assert!(matches!(err, RuntimeError::UnresolvedReference { .. }), "{}", err);
}
