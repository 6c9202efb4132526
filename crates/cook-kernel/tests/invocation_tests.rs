//! Invocation router behavior: external commands, pipes, redirections and
//! readers. External-command tests rely on standard unix tools.

#![cfg(unix)]

use std::collections::HashMap;

use cook_kernel::{Interpreter, Parser};
use cook_types::Value;

fn run_check(src: &str, check: impl FnOnce(i32, &Interpreter)) {
    let program = Parser::parse_source("invoke.cook", src).expect("parse failure");
    let mut interp = Interpreter::new(&program);
    let code = interp.execute(&[], HashMap::new());
    check(code, &interp);
}

#[test]
fn external_capture_into_assignment() {
    run_check("OUT = \"\"\nall:\n    OUT = #echo hi\n", |code, interp| {
        assert_eq!(code, 0);
        assert_eq!(interp.scope().global("OUT"), Some(&Value::from("hi\n")));
    });
}

#[test]
fn external_arguments_expand_sequences() {
    run_check(
        "WORDS = [\"a\", \"b\"]\nOUT = \"\"\nall:\n    OUT = #echo $WORDS c\n",
        |code, interp| {
            assert_eq!(code, 0);
            assert_eq!(interp.scope().global("OUT"), Some(&Value::from("a b c\n")));
        },
    );
}

#[test]
fn failing_external_command_cancels() {
    run_check("all:\n    #false\n    X = 1\n", |code, interp| {
        assert_eq!(code, 1);
        assert_eq!(interp.scope().global("X"), None);
    });
}

#[test]
fn missing_external_command_cancels() {
    run_check("all:\n    #cook_no_such_binary_a8f2\n", |code, _| {
        assert_eq!(code, 1);
    });
}

#[test]
fn external_pipeline_wires_stdout_to_stdin() {
    run_check("OUT = \"\"\nall:\n    OUT = #echo hello | #cat\n", |code, interp| {
        assert_eq!(code, 0);
        assert_eq!(interp.scope().global("OUT"), Some(&Value::from("hello\n")));
    });
}

#[test]
fn three_stage_pipeline() {
    run_check(
        "OUT = \"\"\nall:\n    OUT = #printf 'b\\na\\n' | #sort | #cat\n",
        |code, interp| {
            assert_eq!(code, 0);
            assert_eq!(interp.scope().global("OUT"), Some(&Value::from("a\nb\n")));
        },
    );
}

#[test]
fn builtin_feeds_a_pipeline() {
    run_check("OUT = \"\"\nall:\n    OUT = @print \"piped\" | #cat\n", |code, interp| {
        assert_eq!(code, 0);
        assert_eq!(interp.scope().global("OUT"), Some(&Value::from("piped\n")));
    });
}

#[test]
fn target_feeds_a_pipeline() {
    run_check(
        "OUT = \"\"\nsay:\n    return \"from-target\"\nall:\n    OUT = @say | #cat\n",
        |code, interp| {
            assert_eq!(code, 0);
            assert_eq!(
                interp.scope().global("OUT"),
                Some(&Value::from("from-target"))
            );
        },
    );
}

#[test]
fn builtin_cannot_consume_piped_input() {
    run_check("all:\n    OUT = #echo x | @print y\n", |code, _| {
        assert_eq!(code, 1);
    });
}

#[test]
fn pipeline_failure_in_first_stage_cancels() {
    run_check("all:\n    OUT = #false | #cat\n", |code, _| {
        assert_eq!(code, 1);
    });
}

#[test]
fn redirect_append_accumulates() {
    let tmp = tempfile::tempdir().unwrap();
    let log = tmp.path().join("log.txt");
    let src = format!(
        "all:\n    @print \"one\" >> {log}\n    @print \"two\" >> {log}\n",
        log = log.display()
    );
    run_check(&src, |code, _| assert_eq!(code, 0));
    assert_eq!(std::fs::read_to_string(&log).unwrap(), "one\ntwo\n");
}

#[test]
fn redirect_overwrite_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("out.txt");
    let src = format!(
        "all:\n    @print \"noop\" > {out}\n    @print \"noop\" > {out}\n",
        out = out.display()
    );
    run_check(&src, |code, _| assert_eq!(code, 0));
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "noop\n");
}

#[test]
fn redirect_of_external_output() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("ext.txt");
    let src = format!("all:\n    #echo captured > {}\n", out.display());
    run_check(&src, |code, _| assert_eq!(code, 0));
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "captured\n");
}

#[test]
fn redirect_file_names_expand_from_sequences() {
    let tmp = tempfile::tempdir().unwrap();
    let a = tmp.path().join("a.txt");
    let b = tmp.path().join("b.txt");
    let src = format!(
        "FILES = [\"{}\", \"{}\"]\nall:\n    @print \"fan\" > $FILES\n",
        a.display(),
        b.display()
    );
    run_check(&src, |code, _| assert_eq!(code, 0));
    assert_eq!(std::fs::read_to_string(&a).unwrap(), "fan\n");
    assert_eq!(std::fs::read_to_string(&b).unwrap(), "fan\n");
}

#[test]
fn read_from_file_in_argument_position() {
    let tmp = tempfile::tempdir().unwrap();
    let data = tmp.path().join("data.txt");
    std::fs::write(&data, "contents").unwrap();
    let src = format!("OUT = \"\"\nall:\n    OUT = @print < {}\n", data.display());
    run_check(&src, |code, interp| {
        assert_eq!(code, 0);
        assert_eq!(interp.scope().global("OUT"), Some(&Value::from("contents\n")));
    });
}

#[test]
fn reader_literal_streams_file_contents() {
    let tmp = tempfile::tempdir().unwrap();
    let data = tmp.path().join("notes.txt");
    let out = tmp.path().join("copy.txt");
    std::fs::write(&data, "reader bytes").unwrap();
    let src = format!(
        "all:\n    @print -n ~'{}' > {}\n",
        data.display(),
        out.display()
    );
    run_check(&src, |code, _| assert_eq!(code, 0));
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "reader bytes");
}

#[test]
fn builtin_shadows_only_undeclared_targets() {
    // a target named `print` wins over the built-in
    run_check(
        "OUT = \"\"\nprint:\n    return \"target-print\"\nall:\n    OUT = @print x\n",
        |code, interp| {
            assert_eq!(code, 0);
            assert_eq!(
                interp.scope().global("OUT"),
                Some(&Value::from("target-print"))
            );
        },
    );
}

#[test]
fn workin_is_restored_after_the_target() {
    let before = std::env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    let src = format!("all:\n    @workin {}\n", tmp.path().display());
    run_check(&src, |code, _| assert_eq!(code, 0));
    assert_eq!(std::env::current_dir().unwrap(), before);
}
