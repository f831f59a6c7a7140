//! End-to-end tests: source text through scanner, parser, resolver, and
//! interpreter, asserting on captured program output or on the reported
//! error.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use rlox::error::LoxError;
use rlox::interpreter::Interpreter;
use rlox::parser::Parser;
use rlox::resolver::Resolver;
use rlox::scanner::Scanner;
use rlox::token::Token;

/// Output sink shared between the interpreter and the test.
#[derive(Clone, Default)]
struct SharedOutput(Rc<RefCell<Vec<u8>>>);

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl SharedOutput {
    fn text(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).unwrap()
    }
}

enum Outcome {
    /// Program ran to completion; captured output.
    Finished(String),

    /// The resolver reported static errors; execution never started.
    Static(Vec<LoxError>),

    /// A runtime error aborted execution; output up to that point is kept.
    Runtime { error: LoxError, output: String },
}

fn run(source: &str) -> Outcome {
    let tokens: Vec<Token> = Scanner::new(source.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .expect("test source must lex");

    let statements = Parser::new(&tokens)
        .parse()
        .expect("test source must parse");

    let sink = SharedOutput::default();
    let mut interpreter = Interpreter::with_output(Box::new(sink.clone()));

    let errors = Resolver::new(&mut interpreter).resolve(&statements);
    if !errors.is_empty() {
        return Outcome::Static(errors);
    }

    match interpreter.interpret(&statements) {
        Ok(()) => Outcome::Finished(sink.text()),
        Err(error) => Outcome::Runtime {
            error,
            output: sink.text(),
        },
    }
}

fn assert_prints(source: &str, expected: &str) {
    match run(source) {
        Outcome::Finished(output) => assert_eq!(output, expected),
        Outcome::Static(errors) => panic!("unexpected static errors: {:?}", errors),
        Outcome::Runtime { error, .. } => panic!("unexpected runtime error: {}", error),
    }
}

fn assert_runtime_error(source: &str, fragment: &str) {
    match run(source) {
        Outcome::Runtime { error, .. } => {
            assert!(
                matches!(error, LoxError::Runtime { .. }),
                "expected a runtime error, got: {}",
                error
            );
            assert!(
                error.to_string().contains(fragment),
                "error '{}' does not mention '{}'",
                error,
                fragment
            );
        }
        Outcome::Finished(output) => panic!("expected runtime error, program printed: {output:?}"),
        Outcome::Static(errors) => panic!("expected runtime error, got static: {:?}", errors),
    }
}

fn assert_static_error(source: &str, fragment: &str) {
    match run(source) {
        Outcome::Static(errors) => {
            assert!(
                errors.iter().any(|e| e.to_string().contains(fragment)),
                "no static error mentions '{}': {:?}",
                fragment,
                errors
            );
        }
        Outcome::Finished(output) => panic!("expected static error, program printed: {output:?}"),
        Outcome::Runtime { error, .. } => panic!("expected static error, got runtime: {}", error),
    }
}

// ───────────────────────── scoping and closures ─────────────────────────

#[test]
fn block_shadowing_leaves_outer_binding_intact() {
    assert_prints("var a = 1; { var a = 2; print a; } print a;", "2\n1\n");
}

#[test]
fn reading_a_local_in_its_own_initializer_is_rejected() {
    assert_static_error(
        "var a = 1; { var a = a; }",
        "Can't read local variable in its own initializer",
    );
}

#[test]
fn duplicate_declaration_in_one_scope_is_rejected() {
    assert_static_error(
        "{ var a = 1; var a = 2; }",
        "Already a variable with this name in this scope",
    );
}

#[test]
fn global_redeclaration_is_allowed() {
    // top-level declarations may be added incrementally
    assert_prints("var a = 1; var a = 2; print a;", "2\n");
}

#[test]
fn closures_see_later_mutations_of_captured_variables() {
    assert_prints(
        r#"
var f;
{
  var x = 1;
  fun read() { return x; }
  f = read;
  x = 2;
}
print f();
"#,
        "2\n",
    );
}

#[test]
fn closure_keeps_its_defining_frame_alive() {
    assert_prints(
        r#"
fun makeCounter() {
  var count = 0;
  fun increment() {
    count = count + 1;
    return count;
  }
  return increment;
}
var counter = makeCounter();
print counter(), counter(), counter();
"#,
        "1 2 3\n",
    );
}

#[test]
fn shadowing_does_not_rebind_an_already_resolved_use() {
    // the function reads the global it was resolved against, not the local
    // declared later in the block
    assert_prints(
        r#"
var a = "global";
{
  fun show() { print a; }
  show();
  var a = "block";
  show();
}
"#,
        "global\nglobal\n",
    );
}

#[test]
fn each_loop_iteration_gets_a_fresh_frame() {
    // closures created in different iterations capture distinct variables
    assert_prints(
        r#"
var first;
var second;
var i = 0;
while (i < 2) {
  var j = i;
  fun capture() { return j; }
  if (i == 0) first = capture; else second = capture;
  i = i + 1;
}
print first(), second();
"#,
        "0 1\n",
    );
}

// ───────────────────────── operators and values ─────────────────────────

#[test]
fn integer_valued_numbers_print_without_decimal_point() {
    assert_prints("print 1 + 1;", "2\n");
    assert_prints("print 2.5 * 2;", "5\n");
    assert_prints("print 10 / 4;", "2.5\n");
}

#[test]
fn non_integer_division_prints_bounded_decimal() {
    assert_prints("print 1 / 3;", "0.3333333333333333\n");
}

#[test]
fn plus_concatenates_strings() {
    assert_prints("print \"foo\" + \"bar\";", "foobar\n");
}

#[test]
fn plus_with_mixed_operands_is_a_type_error() {
    assert_runtime_error(
        "print \"a\" + 1;",
        "Operands must be two numbers or two strings.",
    );
}

#[test]
fn relational_operators_require_numbers() {
    assert_prints("print 1 < 2, 2 <= 2, 3 > 4, 3 >= 4;", "true true false false\n");
    assert_runtime_error("print 1 < \"a\";", "Operands must be numbers.");
}

#[test]
fn unary_minus_requires_a_number() {
    assert_prints("print -(3 + 4);", "-7\n");
    assert_runtime_error("print -\"a\";", "Operand must be a number.");
}

#[test]
fn division_by_zero_follows_ieee() {
    assert_prints("print 1 / 0;", "inf\n");
}

#[test]
fn truthiness_only_rejects_nil_and_false() {
    // zero and the empty string are truthy
    assert_prints("print !nil, !false, !0, !\"\", !true;", "true true false false false\n");
    assert_prints("if (0) print \"t\"; else print \"f\";", "t\n");
}

#[test]
fn logical_operators_yield_the_deciding_operand() {
    assert_prints(
        "print \"a\" or \"b\", nil or \"b\", nil and 1, 1 and 2;",
        "a b nil 2\n",
    );
}

#[test]
fn equality_mixes_types_without_erroring() {
    assert_prints(
        "print nil == nil, 1 == 1, \"a\" == \"b\", 1 == \"1\", nil == false;",
        "true true false false false\n",
    );
}

#[test]
fn object_equality_is_identity_not_structure() {
    assert_prints(
        r#"
class A {}
var a = A();
var b = a;
var c = A();
print a == b, a == c;
fun f() {}
var g = f;
print f == g;
"#,
        "true false\ntrue\n",
    );
}

#[test]
fn grouping_overrides_precedence() {
    assert_prints("print (1 + 2) * 3;", "9\n");
    assert_prints("print 1 + 2 * 3;", "7\n");
}

#[test]
fn assignment_is_an_expression_yielding_the_value() {
    assert_prints("var a = 0; print a = 3; print a;", "3\n3\n");
}

#[test]
fn print_renders_type_tagged_forms() {
    assert_prints(
        "fun f() {} class A {} print f, A, A(), clock;",
        "<fn f> <class A> <instance A> <native fn clock>\n",
    );
}

// ───────────────────────── functions and calls ──────────────────────────

#[test]
fn recursion_resolves_through_the_function_name() {
    assert_prints(
        "fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); } print fib(10);",
        "55\n",
    );
}

#[test]
fn function_body_without_return_yields_nil() {
    assert_prints("fun f() {} print f();", "nil\n");
}

#[test]
fn return_unwinds_through_nested_loops_and_blocks() {
    assert_prints(
        r#"
fun find() {
  var i = 0;
  while (true) {
    if (i == 3) { return i; }
    i = i + 1;
  }
}
print find();
"#,
        "3\n",
    );
}

#[test]
fn calling_a_non_callable_value_is_a_runtime_error() {
    assert_runtime_error("var x = 1; x();", "Can only call functions and classes.");
}

#[test]
fn arity_is_checked_exactly() {
    assert_runtime_error("fun f(a, b) {} f(1);", "Expected 2 arguments but got 1.");
    assert_runtime_error("fun f() {} f(1);", "Expected 0 arguments but got 1.");
}

#[test]
fn native_clock_returns_a_number() {
    assert_prints("print clock() > 0;", "true\n");
}

#[test]
fn return_at_top_level_is_rejected() {
    assert_static_error("return 1;", "Can't return from top-level code.");
}

// ───────────────────────── loops and break ──────────────────────────────

#[test]
fn break_halts_only_the_innermost_loop() {
    assert_prints(
        r#"
var i = 0;
while (i < 3) {
  var j = 0;
  while (j < 10) {
    if (j == 1) break;
    j = j + 1;
  }
  print i, j;
  i = i + 1;
}
"#,
        "0 1\n1 1\n2 1\n",
    );
}

#[test]
fn break_outside_a_loop_is_rejected() {
    assert_static_error("break;", "Expect break only inside loop body.");
}

#[test]
fn break_cannot_cross_a_function_boundary() {
    // a function body nested in a loop is not loop body
    assert_static_error(
        "while (true) { fun f() { break; } }",
        "Expect break only inside loop body.",
    );
}

#[test]
fn static_errors_are_collected_across_the_whole_pass() {
    match run("return 1;\nbreak;") {
        Outcome::Static(errors) => assert_eq!(errors.len(), 2),
        _ => panic!("expected two static errors"),
    }
}

// ───────────────────────── classes and instances ────────────────────────

#[test]
fn inherited_initializer_constructs_through_the_subclass() {
    assert_prints(
        r#"
class A { init(x) { this.x = x; } get() { return this.x; } }
class B < A {}
var b = B(5);
print b.get();
"#,
        "5\n",
    );
}

#[test]
fn inherited_method_binds_this_to_the_subclass_instance() {
    assert_prints(
        r#"
class A {
  name() { return "A"; }
  describe() { return this.name(); }
}
class B < A {
  name() { return "B"; }
}
print A().describe(), B().describe();
"#,
        "A B\n",
    );
}

#[test]
fn initializer_yields_the_instance_even_after_a_bare_return() {
    assert_prints(
        r#"
class Point { init() { this.x = 1; return; } }
var p = Point();
print p.x;
print Point();
"#,
        "1\n<instance Point>\n",
    );
}

#[test]
fn a_bound_method_remembers_its_receiver() {
    assert_prints(
        r#"
class Cake {
  init() { this.flavor = "chocolate"; }
  taste() { return this.flavor; }
}
var cake = Cake();
var taste = cake.taste;
print taste();
"#,
        "chocolate\n",
    );
}

#[test]
fn fields_shadow_methods() {
    assert_prints(
        r#"
class A { m() { return "method"; } }
var a = A();
a.m = "field";
print a.m;
"#,
        "field\n",
    );
}

#[test]
fn state_is_per_instance() {
    assert_prints(
        r#"
class Counter {
  init() { this.n = 0; }
  bump() { this.n = this.n + 1; return this.n; }
}
var a = Counter();
var b = Counter();
a.bump();
a.bump();
print a.bump(), b.bump();
"#,
        "3 1\n",
    );
}

#[test]
fn property_access_on_non_instances_is_a_runtime_error() {
    assert_runtime_error("var x = 1; print x.y;", "Only instances have properties.");
    assert_runtime_error("var x = 1; x.y = 2;", "Only instances have fields.");
}

#[test]
fn undefined_property_is_reported_by_name() {
    assert_runtime_error("class A {} print A().missing;", "Undefined property 'missing'.");
}

#[test]
fn superclass_expression_must_evaluate_to_a_class() {
    assert_runtime_error(
        "var NotAClass = 1; class B < NotAClass {}",
        "Superclass must be a class.",
    );
}

#[test]
fn a_class_cannot_inherit_from_its_own_placeholder() {
    // while the declaration executes, the name is still bound to nil
    assert_runtime_error("class A < A {}", "Superclass must be a class.");
}

// ───────────────────────── error reporting ──────────────────────────────

#[test]
fn undefined_variable_reports_the_name_and_line() {
    match run("var a = 1;\nprint missing;") {
        Outcome::Runtime { error, .. } => {
            let text = error.to_string();
            assert!(text.contains("Undefined variable 'missing'."), "{text}");
            assert!(text.contains("[line 2]"), "{text}");
        }
        _ => panic!("expected a runtime error"),
    }
}

#[test]
fn interpreting_unresolved_top_level_return_reports_an_error() {
    // callers that skip the resolver still get an error, not a panic
    let tokens: Vec<Token> = Scanner::new(b"return 1;")
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let statements = Parser::new(&tokens).parse().unwrap();

    let mut interpreter = Interpreter::new();
    let error = interpreter
        .interpret(&statements)
        .expect_err("stray return must not execute");

    assert!(
        error.to_string().contains("Can't return from top-level code."),
        "{error}"
    );
}

#[test]
fn stray_break_error_carries_the_nearest_source_line() {
    // the statement's line comes from its literal condition
    let tokens: Vec<Token> = Scanner::new(b"if (0) break;")
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let statements = Parser::new(&tokens).parse().unwrap();

    let mut interpreter = Interpreter::new();
    let error = interpreter
        .interpret(&statements)
        .expect_err("stray break must not execute");

    let text = error.to_string();
    assert!(text.contains("Expect break only inside loop body."), "{text}");
    assert!(text.contains("[line 1]"), "{text}");
}

#[test]
fn runtime_error_aborts_but_keeps_earlier_output() {
    match run("print \"before\";\nprint 1 + \"x\";\nprint \"after\";") {
        Outcome::Runtime { error, output } => {
            assert_eq!(output, "before\n");
            assert!(error.to_string().contains("[line 2]"), "{error}");
        }
        _ => panic!("expected a runtime error"),
    }
}
