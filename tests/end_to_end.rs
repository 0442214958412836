use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::NamedTempFile;

fn script(source: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp script");
    file.write_all(source.as_bytes()).expect("write temp script");
    file
}

fn lox() -> Command {
    Command::cargo_bin("lox-interpreter-rs").expect("find binary")
}

#[test]
fn arithmetic_precedence() {
    let file = script("print 1 + 2;");
    lox()
        .arg(file.path())
        .assert()
        .success()
        .stdout(contains("3"));
}

#[test]
fn block_scoping_shadows_then_restores() {
    let file = script("var a = 1; { var a = 2; print a; } print a;");
    lox()
        .arg(file.path())
        .assert()
        .success()
        .stdout(contains("2").and(contains("1")));
}

#[test]
fn closures_share_captured_state_across_calls() {
    let file = script(
        "fun c() { var i = 0; fun inc() { i = i + 1; return i; } return inc; } \
         var f = c(); print f(); print f();",
    );
    lox().arg(file.path()).assert().success().stdout(contains("1\n2\n"));
}

#[test]
fn inheritance_dispatches_through_super() {
    let file = script(
        "class A { m() { print \"A\"; } } \
         class B < A { m() { super.m(); print \"B\"; } } \
         B().m();",
    );
    lox().arg(file.path()).assert().success().stdout(contains("A\nB\n"));
}

#[test]
fn initializer_always_returns_the_instance() {
    let file = script("class P { init(x) { this.x = x; } } print P(7).x;");
    lox().arg(file.path()).assert().success().stdout(contains("7"));
}

#[test]
fn native_clock_is_a_non_negative_number() {
    let file = script("print clock() >= 0;");
    lox().arg(file.path()).assert().success().stdout(contains("true"));
}

#[test]
fn adding_string_and_number_is_a_runtime_error() {
    let file = script("\"a\" + 1;");
    lox()
        .arg(file.path())
        .assert()
        .code(70)
        .stdout(contains("Operands must be two numbers or two strings."));
}

#[test]
fn unterminated_string_is_a_compile_error_with_exit_65() {
    let file = script("\"unterminated");
    lox().arg(file.path()).assert().code(65);
}

#[test]
fn returning_a_value_from_init_is_rejected_before_it_ever_runs() {
    let file = script("class A { init() { return 1; } }");
    lox().arg(file.path()).assert().code(65);
}

#[test]
fn runtime_error_inside_init_propagates_instead_of_returning_the_instance() {
    let file = script("class P { init() { undefined_variable; } } P();");
    lox()
        .arg(file.path())
        .assert()
        .code(70)
        .stdout(contains("Undefined variable 'undefined_variable'."));
}
