//! Class tests
//!
//! Constructors, fields, properties, overloads and member visibility.

use std::sync::Arc;

use loom_sdk::Value;

use super::harness::*;

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_constructor_sets_fields() {
    expect_value(
        "public class Point {
             private int x;
             private int y;
             public Point() { x = 1; y = 2; }
             public int Run() { return x + y; }
         }",
        "Run",
        &[],
        Value::Int(3),
    );
}

#[test]
fn test_constructor_overload_by_arity() {
    let source = "public class Seed {
         private int start = 10;
         public Seed() { }
         public Seed(int s) { start = s; }
         public int Run() { return start; }
     }";
    let (_ctx, module) = load_with(source, &[], Arc::new(TestSource::default())).unwrap();
    let ty = module.generated_type();

    let default = ty.create_instance(&[]).unwrap();
    assert_eq!(default.invoke("Run", &[]).unwrap(), Value::Int(10));
    let seeded = ty.create_instance(&[Value::Int(4)]).unwrap();
    assert_eq!(seeded.invoke("Run", &[]).unwrap(), Value::Int(4));

    let Err(err) = ty.create_instance(&[Value::Int(1), Value::Int(2)]) else {
        panic!("two-argument construction should fail");
    };
    assert!(err.to_string().contains("no constructor taking 2"), "{}", err);
}

#[test]
fn test_initializers_run_before_constructor() {
    expect_value(
        "public class Order {
             private string log = \"init\";
             public Order() { log = log + \"+ctor\"; }
             public string Run() { return log; }
         }",
        "Run",
        &[],
        Value::str("init+ctor"),
    );
}

#[test]
fn test_fields_default_to_zero_values() {
    expect_value(
        "public class Zero {
             private int i;
             private double d;
             private bool b;
             private string s;
             public string Run() { return \"\" + i + \"|\" + d + \"|\" + b + \"|\" + s; }
         }",
        "Run",
        &[],
        Value::str("0|0|false|"),
    );
}

// ============================================================================
// Methods
// ============================================================================

#[test]
fn test_method_overload_by_arity() {
    expect_value(
        "public class Calc {
             public int Add(int a) { return a + 1; }
             public int Add(int a, int b) { return a + b; }
             public int Run() { return Add(1) + Add(2, 3); }
         }",
        "Run",
        &[],
        Value::Int(7),
    );
}

#[test]
fn test_private_methods_are_not_visible_to_hosts() {
    let source = "public class Hidden {
         private int Secret() { return 41; }
         public int Run() { return Secret() + 1; }
     }";
    let (_ctx, module) = load_with(source, &[], Arc::new(TestSource::default())).unwrap();
    let obj = module.generated_type().create_instance(&[]).unwrap();
    assert_eq!(obj.invoke("Run", &[]).unwrap(), Value::Int(42));
    assert!(obj.invoke("Secret", &[]).is_err());
}

#[test]
fn test_arguments_are_converted_to_parameter_types() {
    expect_value(
        "public class Widen {
             public double Run(double x) { return x / 2; }
         }",
        "Run",
        &[Value::Int(3)],
        Value::Float(1.5),
    );
    let err = run("public class Narrow { public int Run(int x) { return x; } }", "Run", &[Value::str("no")])
        .unwrap_err();
    assert!(err.to_string().contains("Cannot convert string"), "{}", err);
}

#[test]
fn test_recursion_limit() {
    // The interpreter recurses on the native stack
    let handle = std::thread::Builder::new()
        .stack_size(64 * 1024 * 1024)
        .spawn(|| {
            expect_runtime_error("public class Loop { public int Run() { return Run(); } }", "Run", "Stack overflow");
        })
        .unwrap();
    handle.join().unwrap();
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn test_property_with_accessor_bodies() {
    expect_value(
        "public class Labelled {
             private string label = \"box\";
             public string Label { get { return label + \"!\"; } set { label = value; } }
             public string Run() { Label = \"crate\"; return Label; }
         }",
        "Run",
        &[],
        Value::str("crate!"),
    );
}

#[test]
fn test_get_only_auto_property() {
    let source = "public class Tag {
         public string Text { get; }
         public Tag() { Text = \"fixed\"; }
     }";
    let (_ctx, module) = load_with(source, &[], Arc::new(TestSource::default())).unwrap();
    let obj = module.generated_type().create_instance(&[]).unwrap();
    assert_eq!(obj.get_property("Text").unwrap(), Value::str("fixed"));
    assert!(obj.set_property("Text", Value::str("other")).is_err());
}

#[test]
fn test_auto_property_round_trip_through_host() {
    let source = "public class Bag { public int Size { get; set; } }";
    let (_ctx, module) = load_with(source, &[], Arc::new(TestSource::default())).unwrap();
    let obj = module.generated_type().create_instance(&[]).unwrap();
    assert_eq!(obj.get_property("Size").unwrap(), Value::Int(0));
    obj.set_property("Size", Value::Int(9)).unwrap();
    assert_eq!(obj.get_property("Size").unwrap(), Value::Int(9));
    assert!(obj.set_property("Size", Value::Bool(true)).is_err());
}

// ============================================================================
// Self references
// ============================================================================

#[test]
fn test_private_members_of_other_instances() {
    expect_value(
        "public class Node {
             private int weight = 5;
             public int Run() { var other = new Node(); return other.weight + weight; }
         }",
        "Run",
        &[],
        Value::Int(10),
    );
}

#[test]
fn test_self_typed_parameter_rejects_foreign_values() {
    let source = "public class Pair {
         private int n = 2;
         public int Sum(Pair other) { return other.n + n; }
     }";
    let (_ctx, module) = load_with(source, &[], Arc::new(TestSource::default())).unwrap();
    let ty = module.generated_type();
    let a = ty.create_instance(&[]).unwrap();
    let b = ty.create_instance(&[]).unwrap();
    assert_eq!(a.invoke("Sum", &[Value::Object(b)]).unwrap(), Value::Int(4));
    assert!(a.invoke("Sum", &[Value::Int(1)]).is_err());
}

#[test]
fn test_generated_type_metadata() {
    let source = "namespace Gen.Deep;
         public class Meta {
             private string _source = \"public class Meta { }\";
             public int Count { get; set; }
             public void Touch() { }
         }";
    let (_ctx, module) = load_with(source, &[], Arc::new(TestSource::default())).unwrap();
    let ty = module.generated_type();
    assert_eq!(ty.full_name(), "Gen.Deep.Meta");
    assert_eq!(ty.namespace(), "Gen.Deep");
    assert_eq!(ty.embedded_source().as_deref(), Some("public class Meta { }"));
    assert!(ty.method("Touch", 0).is_some());
    assert!(ty.property("Count").is_some());
    assert!(ty.descriptor().find_method("Touch", 0).unwrap().returns_void());
    assert_eq!(module.version(), loom_engine::MODULE_VERSION);
}
