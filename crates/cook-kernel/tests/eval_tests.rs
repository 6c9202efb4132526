//! Language-level expression semantics: the laws and boundary behaviors
//! of the value model, exercised through whole programs.

use std::collections::HashMap;

use cook_kernel::{Interpreter, Parser};
use cook_types::Value;
use rstest::rstest;

/// Run a program that assigns `OUT` at top level, and return it.
fn eval_out(body: &str) -> Value {
    let src = format!("OUT = {body}\nall:\n");
    let program = Parser::parse_source("eval.cook", &src).expect("parse failure");
    let mut interp = Interpreter::new(&program);
    let code = interp.execute(&[], HashMap::new());
    assert_eq!(code, 0, "program canceled for OUT = {body}");
    interp
        .scope()
        .global("OUT")
        .cloned()
        .expect("OUT not assigned")
}

fn eval_fails(body: &str) -> bool {
    let src = format!("OUT = {body}\nall:\n");
    let program = Parser::parse_source("eval.cook", &src).expect("parse failure");
    let mut interp = Interpreter::new(&program);
    interp.execute(&[], HashMap::new()) != 0
}

#[rstest]
#[case("1 + 2", Value::Int(3))]
#[case("7 / 2", Value::Int(3))]
#[case("7 % 2", Value::Int(1))]
#[case("2 * 3.5", Value::Float(7.0))]
#[case("1 << 4", Value::Int(16))]
#[case("6 & 3", Value::Int(2))]
#[case("6 | 3", Value::Int(7))]
#[case("6 ^ 3", Value::Int(5))]
#[case("\"a\" + 1", Value::String("a1".into()))]
#[case("-5", Value::Int(-5))]
#[case("+\"42\"", Value::Int(42))]
#[case("^0", Value::Int(-1))]
fn arithmetic_cases(#[case] body: &str, #[case] want: Value) {
    assert_eq!(eval_out(body), want);
}

#[rstest]
#[case("1 < 2", true)]
#[case("2 <= 2", true)]
#[case("2 == 2.0", true)]
#[case("\"abc\" < \"abd\"", true)]
#[case("\"a\" == \"a\"", true)]
#[case("true == false", false)]
#[case("[1, 2] == [1, 2]", true)]
#[case("[1, 2] != [1, 3]", true)]
#[case("true && true", true)]
#[case("false || true", true)]
#[case("!0", true)]
#[case("!\"\"", true)]
#[case("!\"x\"", false)]
fn comparison_cases(#[case] body: &str, #[case] want: bool) {
    assert_eq!(eval_out(body), Value::Bool(want));
}

#[test]
fn sizeof_laws() {
    assert_eq!(eval_out("sizeof [1, 2, 3]"), Value::Int(3));
    assert_eq!(eval_out("sizeof \"abc\""), Value::Int(3));
    assert_eq!(eval_out("sizeof {1:\"a\", 2:\"b\"}"), Value::Int(2));
    assert_eq!(eval_out("sizeof 42"), Value::Int(8));
    assert_eq!(eval_out("sizeof 1.5"), Value::Int(8));
    assert_eq!(eval_out("sizeof true"), Value::Int(1));
}

#[test]
fn sequence_addition_laws() {
    assert_eq!(
        eval_out("0 + [1, 2]"),
        Value::List(vec![Value::Int(0), Value::Int(1), Value::Int(2)])
    );
    assert_eq!(
        eval_out("[1, 2] + 3"),
        Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
    );
    assert_eq!(
        eval_out("[1] + [2]"),
        Value::List(vec![Value::Int(1), Value::Int(2)])
    );
}

#[test]
fn cast_round_trips() {
    // integer(string(n)) == n
    assert_eq!(eval_out("integer(string(1234))"), Value::Int(1234));
    // string(integer("42")) == "42"
    assert_eq!(eval_out("string(integer(\"42\"))"), Value::from("42"));
    // boolean(string(true)) == true
    assert_eq!(eval_out("boolean(string(true))"), Value::Bool(true));
    assert_eq!(eval_out("integer(7.9)"), Value::Int(7));
    assert_eq!(eval_out("float(3)"), Value::Float(3.0));
}

#[test]
fn cast_failures_cancel() {
    assert!(eval_fails("integer(\"not a number\")"));
    assert!(eval_fails("boolean(\"yes\")"));
}

#[test]
fn index_boundaries() {
    assert_eq!(eval_out("[\"a\", \"b\"][1]"), Value::from("b"));
    // an exact float index is accepted
    assert_eq!(eval_out("[\"a\", \"b\"][1.0]"), Value::from("b"));
    // a fractional one is not
    assert!(eval_fails("[\"a\", \"b\"][1.5]"));
    assert!(eval_fails("[\"a\", \"b\"][2]"));
    assert!(eval_fails("[\"a\", \"b\"][0 - 1]"));
}

#[rstest]
#[case("1 is integer", true)]
#[case("1 is float", false)]
#[case("1.5 is float", true)]
#[case("1 is integer | float", true)]
#[case("\"x\" is string", true)]
#[case("[1] is array", true)]
#[case("{1:2} is map", true)]
#[case("true is boolean", true)]
fn is_type_cases(#[case] body: &str, #[case] want: bool) {
    assert_eq!(eval_out(body), Value::Bool(want));
}

#[test]
fn is_binds_below_arithmetic() {
    // parses as (1 + 2) is integer, not 1 + (2 is integer)
    assert_eq!(eval_out("1 + 2 is integer"), Value::Bool(true));
}

#[test]
fn ternary_evaluates_only_the_chosen_branch() {
    // the false branch indexes out of range; choosing true must not fail
    assert_eq!(eval_out("1 < 2 ? \"yes\" : [1][9]"), Value::from("yes"));
    assert!(eval_fails("1 > 2 ? \"yes\" : [1][9]"));
}

#[test]
fn ternary_requires_boolean_condition() {
    assert!(eval_fails("1 ? 2 : 3"));
}

#[test]
fn logical_operators_require_booleans() {
    assert!(eval_fails("1 && true"));
    assert!(eval_fails("true || \"x\""));
}

#[test]
fn fallback_composes_when_nested() {
    assert_eq!(eval_out("A ?? (B ?? 9)"), Value::Int(9));
    assert_eq!(eval_out("A ?? B ?? 9"), Value::Int(9));
    // a recoverable failure in the primary picks the secondary
    assert_eq!(eval_out("integer(\"zz\") ?? 42"), Value::Int(42));
    assert_eq!(eval_out("(MISSING + 1) ?? 42"), Value::Int(42));
    // a healthy primary wins
    assert_eq!(eval_out("7 ?? 9"), Value::Int(7));
}

#[test]
fn fallback_restores_error_handling() {
    // after a fallback consumed an error, later failures still cancel
    let src = "A = 0\nall:\n    A = MISSING ?? 1\n    B = integer(\"zz\")\n";
    let program = Parser::parse_source("eval.cook", src).unwrap();
    let mut interp = Interpreter::new(&program);
    assert_eq!(interp.execute(&[], HashMap::new()), 1);
    assert_eq!(interp.scope().global("A"), Some(&Value::Int(1)));
}

#[test]
fn increment_and_decrement() {
    let src = "N = 5\nF = 1.5\nall:\n    N++\n    N++\n    F--\n";
    let program = Parser::parse_source("eval.cook", src).unwrap();
    let mut interp = Interpreter::new(&program);
    assert_eq!(interp.execute(&[], HashMap::new()), 0);
    assert_eq!(interp.scope().global("N"), Some(&Value::Int(7)));
    assert_eq!(interp.scope().global("F"), Some(&Value::Float(0.5)));
}

#[test]
fn increment_of_numeric_string_converts() {
    let src = "N = \"41\"\nall:\n    N++\n";
    let program = Parser::parse_source("eval.cook", src).unwrap();
    let mut interp = Interpreter::new(&program);
    assert_eq!(interp.execute(&[], HashMap::new()), 0);
    assert_eq!(interp.scope().global("N"), Some(&Value::Int(42)));
}

#[test]
fn environment_variables_are_read_only() {
    std::env::set_var("COOK_EVAL_RO_TEST", "123");
    // reads as a string; unary plus converts it
    assert_eq!(eval_out("+COOK_EVAL_RO_TEST"), Value::Int(123));
    assert_eq!(eval_out("COOK_EVAL_RO_TEST + 1"), Value::from("1231"));
    // mutating cancels, and the binding is unchanged
    let src = "all:\n    COOK_EVAL_RO_TEST++\n";
    let program = Parser::parse_source("eval.cook", src).unwrap();
    let mut interp = Interpreter::new(&program);
    assert_eq!(interp.execute(&[], HashMap::new()), 1);
    assert_eq!(std::env::var("COOK_EVAL_RO_TEST").unwrap(), "123");
    std::env::remove_var("COOK_EVAL_RO_TEST");
}

#[test]
fn compound_assignment_requires_a_bound_variable() {
    let src = "all:\n    NOPE += 1\n";
    let program = Parser::parse_source("eval.cook", src).unwrap();
    let mut interp = Interpreter::new(&program);
    assert_eq!(interp.execute(&[], HashMap::new()), 1);
}

#[rstest]
#[case("[5..5]", vec![5])]
#[case("(5..5)", vec![])]
#[case("[5..3]", vec![5, 4, 3])]
#[case("[1..3]", vec![1, 2, 3])]
#[case("(1..3]", vec![2, 3])]
#[case("[1..3)", vec![1, 2])]
#[case("(1..4)", vec![2, 3])]
fn range_boundaries(#[case] interval: &str, #[case] want: Vec<i64>) {
    let src = format!("SEEN = []\nall:\n    for i in {interval} {{\n        SEEN += i\n    }}\n");
    let program = Parser::parse_source("eval.cook", &src).unwrap();
    let mut interp = Interpreter::new(&program);
    assert_eq!(interp.execute(&[], HashMap::new()), 0);
    let want = Value::List(want.into_iter().map(Value::Int).collect());
    assert_eq!(interp.scope().global("SEEN"), Some(&want));
}

#[test]
fn modulo_by_zero_cancels_instead_of_panicking() {
    assert!(eval_fails("1 % 0"));
    assert!(eval_fails("1 / 0"));
}

#[test]
fn division_stays_integer_for_integers() {
    assert_eq!(eval_out("9 / 2"), Value::Int(4));
    assert_eq!(eval_out("9 / 2.0"), Value::Float(4.5));
}
