//! Instance wrapper tests
//!
//! Method and property selection, hooks, custom code, supertypes and
//! wrapping one generated type in another.

use std::sync::Arc;

use loom_runtime::{
    AdditionalParameter, ConversionRule, InstanceWrapper, InstanceWrapperOptions, ParameterConversion, Route,
    RuntimeError,
};
use loom_sdk::{core_types, Activator, MethodDescriptor, ObjectRef, TypeDescriptor, UnitDescriptor, Value};

use super::harness::*;

fn options() -> InstanceWrapperOptions {
    InstanceWrapperOptions {
        compilation: Some(ephemeral()),
        ..InstanceWrapperOptions::default()
    }
}

#[test]
fn test_wraps_public_instance_methods() {
    let app = app();
    let ty = InstanceWrapper::default().create_type(&app.person(), &options()).unwrap();

    assert!(ty.method("Greet", 1).is_some());
    assert!(ty.method("Rename", 1).is_some());
    assert!(ty.method("Describe", 0).is_some());
    assert!(ty.method("Forget", 0).is_none());
    assert!(ty.method("Create", 0).is_none());
    assert!(ty.property("Name").is_none());

    let obj = ty.create_instance(&[]).unwrap();
    assert_eq!(obj.invoke("Greet", &[Value::str("Bob")]).unwrap(), Value::str("Hello Bob, I am Ann"));
    obj.invoke("Rename", &[Value::str("Zoe")]).unwrap();
    assert_eq!(obj.invoke("Greet", &[Value::str("Bob")]).unwrap(), Value::str("Hello Bob, I am Zoe"));
}

#[test]
fn test_each_wrapper_instance_gets_its_own_object() {
    let app = app();
    let ty = InstanceWrapper::default().create_type(&app.person(), &options()).unwrap();
    let first = ty.create_instance(&[]).unwrap();
    let second = ty.create_instance(&[]).unwrap();

    first.invoke("Rename", &[Value::str("Zoe")]).unwrap();
    assert_eq!(second.invoke("Greet", &[Value::str("Al")]).unwrap(), Value::str("Hello Al, I am Ann"));
}

#[test]
fn test_include_pattern_matching_nothing() {
    let app = app();
    let options = InstanceWrapperOptions {
        include_methods: vec!["Nothing*".to_string()],
        ..options()
    };
    let ty = InstanceWrapper::default().create_type(&app.person(), &options).unwrap();

    assert!(ty.method("Greet", 1).is_none());
    assert!(ty.method("Describe", 0).is_none());
    assert!(ty.create_instance(&[]).is_ok());
}

#[test]
fn test_include_and_exclude_filters() {
    let app = app();
    let options = InstanceWrapperOptions {
        include_methods: vec!["Re*".to_string(), "Describe".to_string()],
        exclude_method: Some(Arc::new(|_: &InstanceWrapperOptions, _: &TypeDescriptor, m: &MethodDescriptor| {
            m.name == "Describe"
        })),
        ..options()
    };
    let ty = InstanceWrapper::default().create_type(&app.person(), &options).unwrap();
    assert!(ty.method("Rename", 1).is_some());
    assert!(ty.method("Describe", 0).is_none());
    assert!(ty.method("Greet", 1).is_none());
}

#[test]
fn test_hooks_bracket_the_call_once_each() {
    let app = app();
    let before_log = app.log.clone();
    let after_log = app.log.clone();
    let options = InstanceWrapperOptions {
        include_methods: vec!["Greet".to_string()],
        ..options()
    }
    .with_on_before_method(move |obj, method| {
        before_log.lock().push(format!("before:{}:{}", method.name, as_person(obj).name()));
        Ok(())
    })
    .with_on_after_method(move |_, method| {
        after_log.lock().push(format!("after:{}", method.name));
        Ok(())
    });

    let ty = InstanceWrapper::default().create_type(&app.person(), &options).unwrap();
    let obj = ty.create_instance(&[]).unwrap();
    assert_eq!(obj.invoke("Greet", &[Value::str("Bob")]).unwrap(), Value::str("Hello Bob, I am Ann"));

    assert_eq!(*app.log.lock(), vec!["before:Greet:Ann", "Greet", "after:Greet"]);
}

#[test]
fn test_construct_hook_sees_wrapped_instance() {
    let app = app();
    let log = app.log.clone();
    let options = options().with_on_construct(move |obj| {
        log.lock().push(format!("construct:{}", as_person(obj).name()));
        Ok(())
    });

    let ty = InstanceWrapper::default().create_type(&app.person(), &options).unwrap();
    ty.create_instance(&[]).unwrap();
    ty.create_instance(&[]).unwrap();
    assert_eq!(*app.log.lock(), vec!["construct:Ann", "construct:Ann"]);
}

#[test]
fn test_hook_failure_aborts_call() {
    let app = app();
    let options = InstanceWrapperOptions {
        include_methods: vec!["Rename".to_string()],
        ..options()
    }
    .with_on_before_method(|_, _| Err("denied".into()));

    let ty = InstanceWrapper::default().create_type(&app.person(), &options).unwrap();
    let obj = ty.create_instance(&[]).unwrap();
    let err = obj.invoke("Rename", &[Value::str("Zoe")]).unwrap_err();
    assert!(err.to_string().contains("denied"), "{}", err);
    assert!(!app.log.lock().contains(&"Rename".to_string()));
}

#[test]
fn test_custom_code_fragments() {
    let app = app();
    let options = InstanceWrapperOptions {
        include_methods: vec!["Describe".to_string()],
        additional_constructor_parameters: vec![AdditionalParameter::new(core_types().string.clone(), "label")],
        constructor_code: Some(Arc::new(|_: &InstanceWrapperOptions, _: &TypeDescriptor| {
            "_label = _label + \"!\";".to_string()
        })),
        after_method_code: Some(Arc::new(|_: &InstanceWrapperOptions, _: &TypeDescriptor, _: &MethodDescriptor| {
            "__result = _label + \" \" + __result;".to_string()
        })),
        custom_code: Some(Arc::new(|_: &InstanceWrapperOptions, _: &TypeDescriptor| {
            "public string Label() { return _label; }".to_string()
        })),
        ..options()
    };
    let ty = InstanceWrapper::default().create_type(&app.person(), &options).unwrap();
    assert_eq!(ty.constructors()[0].params.len(), 1);

    let obj = ty.create_instance(&[Value::str("tag")]).unwrap();
    assert_eq!(obj.invoke("Label", &[]).unwrap(), Value::str("tag!"));
    assert_eq!(obj.invoke("Describe", &[]).unwrap(), Value::str("tag! Person #7"));
}

#[test]
fn test_host_names_matching_generated_members() {
    let app = app();
    let options = InstanceWrapperOptions {
        include_methods: vec!["Greet".to_string(), "Describe".to_string()],
        conversion_rules: vec![ConversionRule::new(
            |p| p.name.as_deref() == Some("other"),
            |_| ParameterConversion::to_method().renamed("result"),
        )],
        additional_constructor_parameters: vec![
            AdditionalParameter::new(core_types().string.clone(), "instance"),
            AdditionalParameter::new(core_types().string.clone(), "_instance"),
        ],
        after_method_code: Some(Arc::new(|_: &InstanceWrapperOptions, _: &TypeDescriptor, m: &MethodDescriptor| {
            if m.name == "Describe" {
                "__result = __result + \" \" + _instance;".to_string()
            } else {
                String::new()
            }
        })),
        ..options()
    };
    let ty = InstanceWrapper::default().create_type(&app.person(), &options).unwrap();
    let greet = ty.method("Greet", 1).expect("Greet(result)");
    assert_eq!(greet.params[0].name, "result");

    let obj = ty.create_instance(&[Value::str("tag"), Value::str("other")]).unwrap();
    assert_eq!(obj.invoke("Greet", &[Value::str("Bob")]).unwrap(), Value::str("Hello Bob, I am Ann"));
    assert_eq!(obj.invoke("Describe", &[]).unwrap(), Value::str("Person #7 tag"));
}

#[test]
fn test_parameter_routed_to_constructor() {
    let app = app();
    let options = InstanceWrapperOptions {
        include_methods: vec!["Greet".to_string()],
        conversion_rules: vec![ConversionRule::for_name("other", Route::ConstructorParameter)],
        ..options()
    };
    let ty = InstanceWrapper::default().create_type(&app.person(), &options).unwrap();
    assert!(ty.method("Greet", 0).is_some());

    let obj = ty.create_instance(&[Value::str("Bob")]).unwrap();
    assert_eq!(obj.invoke("Greet", &[]).unwrap(), Value::str("Hello Bob, I am Ann"));
}

#[test]
fn test_wrapped_properties() {
    let app = app();
    let options = InstanceWrapperOptions {
        include_methods: vec!["None".to_string()],
        include_properties: vec!["*".to_string()],
        ..options()
    };
    let ty = InstanceWrapper::default().create_type(&app.person(), &options).unwrap();
    assert!(ty.property("Name").is_some_and(|p| p.setter.is_some()));
    assert!(ty.property("Id").is_some_and(|p| p.setter.is_none()));

    let obj = ty.create_instance(&[]).unwrap();
    assert_eq!(obj.get_property("Id").unwrap(), Value::Int(7));
    obj.set_property("Name", Value::str("Lee")).unwrap();
    assert_eq!(obj.get_property("Name").unwrap(), Value::str("Lee"));
    assert!(obj.set_property("Id", Value::Int(1)).is_err());
}

#[test]
fn test_factory_overrides_activator() {
    let app = app();
    let person = app.new_person("Fixed", 42);
    let factory: Activator = Arc::new(move |_: &[Value]| {
        let obj: ObjectRef = person.clone();
        Ok(obj)
    });
    let options = InstanceWrapperOptions {
        factory: Some(factory),
        include_methods: vec!["Describe".to_string()],
        ..options()
    };
    let ty = InstanceWrapper::default().create_type(&app.person(), &options).unwrap();
    let obj = ty.create_instance(&[]).unwrap();
    assert_eq!(obj.invoke("Describe", &[]).unwrap(), Value::str("Person #42"));
}

#[test]
fn test_type_without_activator_needs_factory() {
    let unit = UnitDescriptor::located("bare", "/virtual/bare.dll");
    let ty = TypeDescriptor::class("Bare", "Thing")
        .method(MethodDescriptor::new("Run", core_types().void.clone()))
        .build(&unit);

    let err = InstanceWrapper::default().create_type(&ty, &options()).unwrap_err();
    assert!(matches!(err, RuntimeError::Generation(_)), "{}", err);
}

#[test]
fn test_inherits_and_implements() {
    let app = app();
    let options = InstanceWrapperOptions {
        type_name: "NamedPerson".to_string(),
        namespace_name: "Proxies".to_string(),
        inherits: Some(app.entity()),
        implements: vec![app.named()],
        ..options()
    };
    let ty = InstanceWrapper::default().create_type(&app.person(), &options).unwrap();
    assert_eq!(ty.full_name(), "Proxies.NamedPerson");

    let descriptor = ty.descriptor();
    assert!(descriptor.is_assignable_to(&app.entity()));
    assert!(descriptor.is_assignable_to(&app.named()));

    let obj = ty.create_instance(&[]).unwrap();
    assert_eq!(obj.get_property("Kind").unwrap(), Value::str("entity"));
    assert_eq!(obj.invoke("Describe", &[]).unwrap(), Value::str("Person #7"));
}

#[test]
fn test_embedded_source() {
    let app = app();
    let ty = InstanceWrapper::default().create_type(&app.person(), &options()).unwrap();
    let source = ty.embedded_source().expect("source embedded");
    assert!(source.contains("public class GeneratedType"));
    assert!(source.contains("__instance.Greet(other)"));
    assert!(!source.contains("sourceplaceholder"));

    let options = InstanceWrapperOptions {
        include_source: false,
        ..options()
    };
    let ty = InstanceWrapper::default().create_type(&app.person(), &options).unwrap();
    assert!(ty.embedded_source().is_none());
}

#[test]
fn test_wrap_generated_type_from_persisted_module() {
    let dir = tempfile::tempdir().unwrap();
    let service = persisted(dir.path());
    let app = app();

    let inner_options = InstanceWrapperOptions {
        include_methods: vec!["Greet".to_string()],
        compilation: Some(service.clone()),
        ..InstanceWrapperOptions::default()
    };
    let inner = InstanceWrapper::default().create_type(&app.person(), &inner_options).unwrap();
    assert!(inner.module_location().is_some());

    let outer_options = InstanceWrapperOptions {
        type_name: "Outer".to_string(),
        ..inner_options.clone()
    };
    let outer = InstanceWrapper::default().create_type(inner.descriptor(), &outer_options).unwrap();

    let obj = outer.create_instance(&[]).unwrap();
    assert_eq!(obj.invoke("Greet", &[Value::str("Bob")]).unwrap(), Value::str("Hello Bob, I am Ann"));
    assert!(service.references().iter().any(|u| u.name() == inner.module_name()));
}

#[test]
fn test_wrap_generated_type_from_memory_module_fails() {
    let service = ephemeral();
    let app = app();
    let inner_options = InstanceWrapperOptions {
        compilation: Some(service.clone()),
        ..InstanceWrapperOptions::default()
    };
    let inner = InstanceWrapper::default().create_type(&app.person(), &inner_options).unwrap();

    let outer_options = InstanceWrapperOptions {
        type_name: "Outer".to_string(),
        ..inner_options
    };
    let err = InstanceWrapper::default().create_type(inner.descriptor(), &outer_options).unwrap_err();
    match err {
        RuntimeError::UnresolvedReference { type_name, unit } => {
            assert_eq!(type_name, "GeneratedNamespace.GeneratedType");
            assert_eq!(unit, inner.module_name());
        }
        other => panic!("unexpected error: {}", other),
    }
}
