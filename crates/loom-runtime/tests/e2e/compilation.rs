//! Compilation service tests
//!
//! Reference bookkeeping, persistence and configuration through the
//! public service API.

use std::sync::Arc;

use loom_engine::{ExecutionContext, VmError};
use loom_runtime::{
    CallableWrapper, CallableWrapperOptions, CompilationOptions, CompilationService, ContextFactory, GeneratorConfig,
    InstanceWrapper, InstanceWrapperOptions, RuntimeError, ValueCache,
};
use loom_sdk::{core_types, Callable, CachedValue, Signature, TypeDescriptor, UnitDescriptor, Value, ValueSource};

use super::harness::*;

#[test]
fn test_adding_a_reference_twice_is_idempotent() {
    let app = app();
    let service = ephemeral();
    assert_eq!(service.reference_count(), 1);

    service.add_reference(&app.person()).unwrap();
    let count = service.reference_count();
    service.add_reference(&app.person()).unwrap();
    service.add_reference(&app.named()).unwrap();
    service.add_unit(&app.unit).unwrap();
    assert_eq!(service.reference_count(), count);
    assert_eq!(count, 2);
}

#[test]
fn test_failed_reference_leaves_set_unchanged() {
    let app = app();
    let floating = UnitDescriptor::new("memory");
    let ty = TypeDescriptor::class("Mem", "Floating").build(&floating);
    let service = ephemeral();

    let err = service.add_references(&[app.person(), ty]).unwrap_err();
    assert!(err.to_string().contains("Mem.Floating"), "{}", err);
    assert_eq!(service.reference_count(), 1);
}

#[test]
fn test_compile_failure_reports_diagnostics_and_source() {
    let service = ephemeral();
    let source = "namespace Broken;\npublic class Oops { public int Run() { return nope; } }";
    match service.compile(source) {
        Err(RuntimeError::Compilation { message }) => {
            assert!(message.starts_with("Compilation failures!"), "{}", message);
            assert!(message.contains("nope"), "{}", message);
            assert!(message.contains("\nCode:\n\n"), "{}", message);
            assert!(message.ends_with(source), "{}", message);
        }
        Err(other) => panic!("unexpected error: {}", other),
        Ok(ty) => panic!("compiled unexpectedly: {:?}", ty),
    }
}

#[test]
fn test_compiled_source_sees_service_cache() {
    let cache = Arc::new(ValueCache::new());
    let sig = Signature::new(core_types().int32.clone());
    let id = cache.add_callable(Callable::new(sig, |_| Ok(Value::Int(11))));

    let service = CompilationService::new(CompilationOptions::ephemeral().with_cache(cache.clone())).unwrap();
    let source = format!(
        "public class Reader {{ public int Run() {{ return core.ValueCache.callable(\"{}\").invoke() as int; }} }}",
        id
    );
    let ty = service.compile(&source).unwrap();
    let obj = ty.create_instance(&[]).unwrap();
    assert_eq!(obj.invoke("Run", &[]).unwrap(), Value::Int(11));
    assert!(matches!(cache.get(&id).unwrap(), CachedValue::Callable(_)));
}

#[test]
fn test_persisted_modules_land_in_working_dir() {
    let dir = tempfile::tempdir().unwrap();
    let service = persisted(dir.path());
    let ty = service.compile("namespace Disk; public class Saved { }").unwrap();

    let path = dir.path().join(ty.module_name());
    assert!(path.is_file());
    assert_eq!(ty.module_location(), Some(path.display().to_string().as_str()));
    assert!(service.is_persisted());
}

#[test]
fn test_initial_units_are_referenced() {
    let app = app();
    let options = CompilationOptions::ephemeral()
        .with_cache(Arc::new(ValueCache::new()))
        .with_unit(app.unit.clone());
    let service = CompilationService::new(options).unwrap();
    assert_eq!(service.reference_count(), 2);

    let ty = service
        .compile("import App.Models; public class Maker { public string Run() { var p = new Person(); return p.Greet(\"Al\"); } }")
        .unwrap();
    let obj = ty.create_instance(&[]).unwrap();
    assert_eq!(obj.invoke("Run", &[]).unwrap(), Value::str("Hello Al, I am Ann"));
}

#[test]
fn test_generator_follows_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = GeneratorConfig::from_str(&format!(
        "persist = true\nworking_dir = {:?}\nnamespace = \"Configured.Proxies\"\ntype_name = \"Proxy\"\ninclude_source = false\n",
        dir.path().display().to_string()
    ))
    .unwrap();

    let app = app();
    let wrapper = InstanceWrapper::with_config(config.clone(), Arc::new(ValueCache::new()));
    let ty = wrapper
        .create_type(&app.person(), &InstanceWrapperOptions::from_config(&config))
        .unwrap();

    assert_eq!(ty.full_name(), "Configured.Proxies.Proxy");
    assert!(ty.embedded_source().is_none());
    assert!(dir.path().join(ty.module_name()).is_file());
}

#[test]
fn test_persisted_module_referenced_by_another_service() {
    let dir = tempfile::tempdir().unwrap();
    let producer = persisted(dir.path());
    let counter = producer
        .compile("namespace Chain; public class Counter { private int n; public int Next() { n = n + 1; return n; } }")
        .unwrap();

    let consumer = ephemeral();
    consumer.add_unit(counter.unit()).unwrap();
    assert!(consumer.references().iter().any(|u| u.name() == counter.module_name()));

    let ty = consumer
        .compile("import Chain; public class UsesCounter { public int Run() { var c = new Counter(); c.Next(); return c.Next(); } }")
        .unwrap();
    let obj = ty.create_instance(&[]).unwrap();
    assert_eq!(obj.invoke("Run", &[]).unwrap(), Value::Int(2));
    assert!(!Arc::ptr_eq(producer.context(), consumer.context()));
}

#[test]
fn test_unit_resolves_types_the_host_no_longer_holds() {
    let unit = UnitDescriptor::located("app", "/virtual/app.dll");
    drop(TypeDescriptor::class("App", "Person").build(&unit));

    let options = CompilationOptions::ephemeral()
        .with_cache(Arc::new(ValueCache::new()))
        .with_unit(unit);
    let service = CompilationService::new(options).unwrap();
    let ty = service.compile("import App; public class W { private Person p; }").unwrap();
    assert_eq!(ty.full_name(), "W");
}

fn doubler() -> Callable {
    let sig = Signature::new(core_types().int32.clone()).param("n", core_types().int32.clone());
    Callable::new(sig, |args| Ok(Value::Int(args[0].expect_i64()? * 2)))
}

#[test]
fn test_injected_context_on_service_cache() {
    let cache = Arc::new(ValueCache::new());
    let context = Arc::new(ExecutionContext::new("mine", cache.clone()));
    let service = CompilationService::new(
        CompilationOptions::ephemeral()
            .with_cache(cache.clone())
            .with_context(context.clone()),
    )
    .unwrap();

    let options = CallableWrapperOptions {
        compilation: Some(Arc::new(service)),
        ..CallableWrapperOptions::default()
    };
    let ty = CallableWrapper::default().create_type(doubler(), &options).unwrap();
    let obj = ty.create_instance(&[]).unwrap();
    assert_eq!(obj.invoke("Run", &[Value::Int(21)]).unwrap(), Value::Int(42));
    assert_eq!(context.modules().len(), 1);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_injected_context_on_another_store_is_rejected() {
    let context = Arc::new(ExecutionContext::new("mine", Arc::new(ValueCache::new())));
    let err = CompilationService::new(
        CompilationOptions::ephemeral()
            .with_cache(Arc::new(ValueCache::new()))
            .with_context(context),
    )
    .unwrap_err();
    match err {
        RuntimeError::ForeignContext { context } => assert_eq!(context, "mine"),
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_generator_with_custom_context_factory() {
    let factory: Arc<dyn ContextFactory> = Arc::new(|name: &str, source: Arc<dyn ValueSource>| {
        Arc::new(ExecutionContext::new(format!("factory-{}", name), source))
    });
    let service = Arc::new(
        CompilationService::new(
            CompilationOptions::ephemeral()
                .with_cache(Arc::new(ValueCache::new()))
                .with_context_factory(factory),
        )
        .unwrap(),
    );
    assert!(service.context().name().starts_with("factory-"));

    let app = app();
    let options = InstanceWrapperOptions {
        include_methods: vec!["Describe".to_string()],
        compilation: Some(service.clone()),
        ..InstanceWrapperOptions::default()
    };
    let ty = InstanceWrapper::default().create_type(&app.person(), &options).unwrap();
    let obj = ty.create_instance(&[]).unwrap();
    assert_eq!(obj.invoke("Describe", &[]).unwrap(), Value::str("Person #7"));
}

#[test]
fn test_same_source_twice_loads_distinct_types() {
    let service = ephemeral();
    let source = "namespace Twice; public class Same { public int Run() { return 1; } }";
    let first = service.compile(source).unwrap();
    let second = service.compile(source).unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_ne!(first.module_name(), second.module_name());
    assert_eq!(first.full_name(), second.full_name());
    assert_eq!(service.context().modules().len(), 2);
}

#[test]
fn test_fixed_module_name_is_not_reused() {
    let options = CompilationOptions::ephemeral()
        .with_cache(Arc::new(ValueCache::new()))
        .with_module_name("fixed");
    let service = CompilationService::new(options).unwrap();
    let first = service.compile("public class Twice { }").unwrap();

    let err = service.compile("public class Twice { }").unwrap_err();
    assert!(
        matches!(err, RuntimeError::Vm(VmError::DuplicateModule(ref name)) if name == "fixed"),
        "{}",
        err
    );
    assert_eq!(service.context().modules().len(), 1);
    assert!(Arc::ptr_eq(service.context().modules()[0].generated_type(), &first));
}
