//! Operator tests

use loom_sdk::Value;

use super::harness::*;

fn run_body(return_type: &str, body: &str) -> Value {
    let source = format!("public class Ops {{ public {} Run() {{ {} }} }}", return_type, body);
    match run(&source, "Run", &[]) {
        Ok(value) => value,
        Err(e) => panic!("{}\nSource:\n{}", e, source),
    }
}

#[test]
fn test_integer_arithmetic() {
    assert_eq!(run_body("int", "return 7 / 2;"), Value::Int(3));
    assert_eq!(run_body("int", "return 7 % 4 * 3 - 1;"), Value::Int(8));
    assert_eq!(run_body("int", "return -(2 + 3);"), Value::Int(-5));
}

#[test]
fn test_mixed_arithmetic_widens() {
    assert_eq!(run_body("double", "return 7.0 / 2;"), Value::Float(3.5));
    assert_eq!(run_body("double", "return 1 + 0.5;"), Value::Float(1.5));
}

#[test]
fn test_int32_overflow_fails_conversion() {
    assert_eq!(run_body("long", "return 2147483647 + 1;"), Value::Int(2_147_483_648));
    expect_runtime_error(
        "public class Ops { public int Run() { return 2147483647 + 1; } }",
        "Run",
        "Cannot convert int to core.Int32",
    );
}

#[test]
fn test_division_by_zero() {
    expect_runtime_error(
        "public class Ops { public int Run() { var z = 0; return 1 / z; } }",
        "Run",
        "Division by zero",
    );
}

#[test]
fn test_string_concatenation() {
    assert_eq!(run_body("string", "return \"n=\" + 1 + null;"), Value::str("n=1"));
    assert_eq!(run_body("string", "return 2 + \"x\" + true;"), Value::str("2xtrue"));
    assert_eq!(run_body("bool", "return \"a\" + \"b\" == \"ab\";"), Value::Bool(true));
}

#[test]
fn test_comparisons_and_logic() {
    assert_eq!(run_body("bool", "return 1 < 2 && !(3 >= 4);"), Value::Bool(true));
    assert_eq!(run_body("bool", "return 2.5 > 2 || false;"), Value::Bool(true));
    assert_eq!(run_body("bool", "return 3 != 3;"), Value::Bool(false));
}

#[test]
fn test_logical_operators_short_circuit() {
    expect_value(
        "public class Ops {
             public bool Run() { return false && Boom(); }
             private bool Boom() { return 1 / 0 == 0; }
         }",
        "Run",
        &[],
        Value::Bool(false),
    );
}

#[test]
fn test_if_else() {
    assert_eq!(
        run_body("string", "var n = 3; if (n > 2) { return \"big\"; } else { return \"small\"; }"),
        Value::str("big")
    );
    assert_eq!(
        run_body("int", "var n = 0; if (n == 0) n = 5; return n;"),
        Value::Int(5)
    );
}

#[test]
fn test_string_length_counts_characters() {
    assert_eq!(run_body("int", "var s = \"h\u{e9}llo\"; return s.Length;"), Value::Int(5));
}

#[test]
fn test_null_member_access() {
    expect_runtime_error(
        "public class Ops { private string s; public int Run() { return s.Length; } }",
        "Run",
        "Null reference",
    );
}
