//! End-to-end scenarios: parse a Cookfile from source and run it.

use std::collections::HashMap;

use cook_kernel::{Interpreter, Parser};
use cook_types::Value;

fn run(src: &str) -> i32 {
    let program = Parser::parse_source("scenario.cook", src).expect("parse failure");
    let mut interp = Interpreter::new(&program);
    interp.execute(&[], HashMap::new())
}

/// Run and hand the interpreter to a closure for state assertions.
fn run_check(src: &str, check: impl FnOnce(i32, &Interpreter)) {
    let program = Parser::parse_source("scenario.cook", src).expect("parse failure");
    let mut interp = Interpreter::new(&program);
    let code = interp.execute(&[], HashMap::new());
    check(code, &interp);
}

#[test]
fn s1_arithmetic_and_assignment() {
    run_check(
        "A = 12\nB = A * 2\nall:\n    A += 8.2\n",
        |code, interp| {
            assert_eq!(code, 0);
            assert_eq!(interp.scope().global("A"), Some(&Value::Float(20.2)));
            assert_eq!(interp.scope().global("B"), Some(&Value::Int(24)));
        },
    );
}

#[test]
fn s2_range_loop_with_manual_skip() {
    run_check(
        "SUM = 0\nall:\n    for i in [1..10] {\n        SUM += i\n        if i == 3 { i = 7 }\n    }\n",
        |code, interp| {
            assert_eq!(code, 0);
            // 1+2+3+8+9+10
            assert_eq!(interp.scope().global("SUM"), Some(&Value::Int(33)));
        },
    );
}

#[test]
fn s3_map_iteration_and_labeled_break() {
    run_check(
        concat!(
            "found = \"\"\n",
            "all:\n",
            "    M = {1:\"a\", 2:\"b\", 3:\"c\"}\n",
            "    for:scan k, v in M {\n",
            "        if v == \"b\" { found = k ; break:scan }\n",
            "    }\n",
        ),
        |code, interp| {
            assert_eq!(code, 0);
            assert_eq!(interp.scope().global("found"), Some(&Value::Int(2)));
        },
    );
}

#[test]
fn s4_fallback_on_missing_variable() {
    run_check("A = MISSING ?? 42\nall:\n", |code, interp| {
        assert_eq!(code, 0);
        assert_eq!(interp.scope().global("A"), Some(&Value::Int(42)));
    });
}

#[test]
fn s5_redirect_to_multiple_files() {
    let tmp = tempfile::tempdir().unwrap();
    let a = tmp.path().join("a.txt");
    let b = tmp.path().join("b.txt");
    std::fs::write(&a, "stale content to be truncated").unwrap();
    let src = format!(
        "all:\n    @print \"hello\" > {} {}\n",
        a.display(),
        b.display()
    );
    assert_eq!(run(&src), 0);
    assert_eq!(std::fs::read_to_string(&a).unwrap(), "hello\n");
    assert_eq!(std::fs::read_to_string(&b).unwrap(), "hello\n");
}

#[test]
fn s6_lifecycle_order() {
    let tmp = tempfile::tempdir().unwrap();
    let log = tmp.path().join("order.txt");
    let src = format!(
        concat!(
            "initialize:\n",
            "    @print \"init\" >> {log}\n",
            "build:\n",
            "    @print \"build\" >> {log}\n",
            "check:\n",
            "    @print \"check\" >> {log}\n",
            "finalize:\n",
            "    @print \"done\" >> {log}\n",
            "all:\n",
        ),
        log = log.display()
    );
    assert_eq!(run(&src), 0);
    // initialize, then every non-lifecycle target in declaration order,
    // then finalize
    assert_eq!(
        std::fs::read_to_string(&log).unwrap(),
        "init\nbuild\ncheck\ndone\n"
    );
}

#[test]
fn finalize_runs_after_cancellation() {
    let tmp = tempfile::tempdir().unwrap();
    let log = tmp.path().join("fin.txt");
    let src = format!(
        concat!(
            "finalize:\n",
            "    @print \"cleanup\" >> {log}\n",
            "all:\n",
            "    X = boom[0]\n", // indexing a non-array cancels
        ),
        log = log.display()
    );
    assert_eq!(run(&src), 1);
    assert_eq!(std::fs::read_to_string(&log).unwrap(), "cleanup\n");
}

#[test]
fn explicit_target_selection_skips_others() {
    let program = Parser::parse_source(
        "t.cook",
        "A = 0\nB = 0\none:\n    A = 1\ntwo:\n    B = 1\nall:\n",
    )
    .unwrap();
    let mut interp = Interpreter::new(&program);
    let code = interp.execute(&["two".to_string()], HashMap::new());
    assert_eq!(code, 0);
    assert_eq!(interp.scope().global("A"), Some(&Value::Int(0)));
    assert_eq!(interp.scope().global("B"), Some(&Value::Int(1)));
}

#[test]
fn universal_all_runs_targets_in_declaration_order() {
    run_check(
        "TRACE = \"\"\nfirst:\n    TRACE += \"1\"\nsecond:\n    TRACE += \"2\"\nall: *\n",
        |code, interp| {
            assert_eq!(code, 0);
            assert_eq!(interp.scope().global("TRACE"), Some(&Value::from("12")));
        },
    );
}

#[test]
fn target_arguments_bind_positionally() {
    run_check(
        "N = 0\nFIRST = \"\"\ngreet:\n    N = $0\n    FIRST = $1\nall:\n    @greet hello world\n",
        |code, interp| {
            assert_eq!(code, 0);
            assert_eq!(interp.scope().global("N"), Some(&Value::Int(2)));
            assert_eq!(interp.scope().global("FIRST"), Some(&Value::from("hello")));
        },
    );
}

#[test]
fn target_return_value_flows_to_caller() {
    run_check(
        "V = 0\npick:\n    return 7\nall:\n    V = @pick\n",
        |code, interp| {
            assert_eq!(code, 0);
            assert_eq!(interp.scope().global("V"), Some(&Value::Int(7)));
        },
    );
}

#[test]
fn target_locals_die_with_the_target() {
    run_check(
        "OUT = \"\"\nsetup:\n    LOCAL = \"in-target\"\nall:\n    @setup\n    OUT = LOCAL ?? \"gone\"\n",
        |code, interp| {
            assert_eq!(code, 0);
            assert_eq!(interp.scope().global("OUT"), Some(&Value::from("gone")));
        },
    );
}

#[test]
fn exit_statement_sets_the_process_code() {
    assert_eq!(run("all:\n    exit 3\n"), 3);
}

#[test]
fn exit_propagates_from_a_called_target() {
    assert_eq!(run("quit:\n    exit 4\nall:\n    @quit\n    A = 1\n"), 4);
}

#[test]
fn unknown_invocation_cancels() {
    assert_eq!(run("all:\n    @no_such_target_or_function\n"), 1);
}

#[test]
fn nested_loops_with_labeled_continue() {
    // continue:outer skips the rest of the inner loop for every j >= 1
    run_check(
        concat!(
            "HITS = 0\n",
            "all:\n",
            "    for:outer i in [1..3] {\n",
            "        for j in [1..3] {\n",
            "            if j == 2 { continue:outer }\n",
            "            HITS += 1\n",
            "        }\n",
            "    }\n",
        ),
        |code, interp| {
            assert_eq!(code, 0);
            // each outer iteration counts j==1 only
            assert_eq!(interp.scope().global("HITS"), Some(&Value::Int(3)));
        },
    );
}

#[test]
fn labeled_break_terminates_outer_loop() {
    run_check(
        concat!(
            "COUNT = 0\n",
            "all:\n",
            "    for:outer i in [1..10] {\n",
            "        for j in [1..10] {\n",
            "            COUNT += 1\n",
            "            if COUNT == 5 { break:outer }\n",
            "        }\n",
            "    }\n",
        ),
        |code, interp| {
            assert_eq!(code, 0);
            assert_eq!(interp.scope().global("COUNT"), Some(&Value::Int(5)));
        },
    );
}

#[test]
fn unconditional_loop_runs_until_break() {
    run_check(
        "N = 0\nall:\n    for {\n        N += 1\n        if N == 4 { break }\n    }\n",
        |code, interp| {
            assert_eq!(code, 0);
            assert_eq!(interp.scope().global("N"), Some(&Value::Int(4)));
        },
    );
}

#[test]
fn sibling_loop_after_break_still_runs() {
    // a consumed break must not leak into the next loop
    run_check(
        concat!(
            "A = 0\nB = 0\n",
            "all:\n",
            "    for i in [1..5] {\n",
            "        A += 1\n",
            "        if i == 2 { break }\n",
            "    }\n",
            "    for j in [1..3] {\n",
            "        B += 1\n",
            "    }\n",
        ),
        |code, interp| {
            assert_eq!(code, 0);
            assert_eq!(interp.scope().global("A"), Some(&Value::Int(2)));
            assert_eq!(interp.scope().global("B"), Some(&Value::Int(3)));
        },
    );
}

#[test]
fn break_outside_a_loop_cancels() {
    assert_eq!(run("all:\n    break\n"), 1);
}

#[test]
fn unknown_break_label_cancels() {
    assert_eq!(
        run("all:\n    for i in [1..3] {\n        break:missing\n    }\n"),
        1
    );
}

#[test]
fn loop_variable_type_pin_rejects_float() {
    assert_eq!(
        run("all:\n    for i in [1..3] {\n        i = 1.5\n    }\n"),
        1
    );
}

#[test]
fn loop_variable_pin_is_lifted_after_the_loop() {
    run_check(
        "all:\n    for i in [1..2] {\n        LAST = i\n    }\n    i = 1.5\n    OUT = i\nOUT = 0\n",
        |code, _| {
            assert_eq!(code, 0);
        },
    );
}

#[test]
fn collection_loop_over_list_binds_ordinal_and_element() {
    run_check(
        concat!(
            "KEYS = 0\nCAT = \"\"\n",
            "all:\n",
            "    for i, v in [\"a\", \"b\", \"c\"] {\n",
            "        KEYS += i\n",
            "        CAT += v\n",
            "    }\n",
        ),
        |code, interp| {
            assert_eq!(code, 0);
            assert_eq!(interp.scope().global("KEYS"), Some(&Value::Int(3)));
            assert_eq!(interp.scope().global("CAT"), Some(&Value::from("abc")));
        },
    );
}

#[test]
fn collection_loop_over_non_iterable_cancels() {
    assert_eq!(run("all:\n    X = 5\n    for k in X {\n    }\n"), 1);
}

#[test]
fn delete_removes_list_and_map_entries() {
    run_check(
        concat!(
            "LLEN = 0\nMLEN = 0\nKEPT = 0\n",
            "all:\n",
            "    L = [10, 20, 30, 40]\n",
            "    delete L[1, 2]\n",
            "    M = {\"a\": 1, \"b\": 2}\n",
            "    delete M[\"a\"]\n",
            "    LLEN = sizeof L\n",
            "    MLEN = sizeof M\n",
            "    KEPT = L[1]\n",
        ),
        |code, interp| {
            assert_eq!(code, 0);
            assert_eq!(interp.scope().global("LLEN"), Some(&Value::Int(2)));
            assert_eq!(interp.scope().global("MLEN"), Some(&Value::Int(1)));
            assert_eq!(interp.scope().global("KEPT"), Some(&Value::Int(40)));
        },
    );
}

#[test]
fn cli_variables_merge_into_globals() {
    let program =
        Parser::parse_source("t.cook", "OUT = \"\"\nall:\n    OUT = NAME + \"!\"\n").unwrap();
    let mut interp = Interpreter::new(&program);
    let mut vars = HashMap::new();
    vars.insert("NAME".to_string(), Value::from("cook"));
    let code = interp.execute(&[], vars);
    assert_eq!(code, 0);
    assert_eq!(interp.scope().global("OUT"), Some(&Value::from("cook!")));
}

#[test]
fn string_interpolation_renders_variables() {
    run_check(
        "NAME = \"world\"\nOUT = \"\"\nall:\n    OUT = \"hello ${NAME}!\"\n",
        |code, interp| {
            assert_eq!(code, 0);
            assert_eq!(
                interp.scope().global("OUT"),
                Some(&Value::from("hello world!"))
            );
        },
    );
}

#[test]
fn string_interpolation_with_index() {
    run_check(
        "L = [\"a\", \"b\"]\nOUT = \"\"\nall:\n    OUT = \"${L[1]}\"\n",
        |code, interp| {
            assert_eq!(code, 0);
            assert_eq!(interp.scope().global("OUT"), Some(&Value::from("b")));
        },
    );
}

#[test]
fn interpolating_an_undefined_variable_cancels() {
    assert_eq!(run("all:\n    OUT = \"v=${NOPE}\"\n"), 1);
}

#[test]
fn single_quotes_stay_verbatim() {
    run_check("OUT = ''\nall:\n    OUT = '$NAME'\n", |code, interp| {
        assert_eq!(code, 0);
        assert_eq!(interp.scope().global("OUT"), Some(&Value::from("$NAME")));
    });
}
