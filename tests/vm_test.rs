mod common;

use std::sync::atomic::{AtomicUsize, Ordering};

use common::{capture_vm, run};
use rylox::backend::vm::InterpretResult;
use rylox::common::object::Value;

#[test]
fn arithmetic_precedence() {
    let (result, output) = run("print 1 + 2 * 3;");
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(output, "7\n");
}

#[test]
fn grouping_and_unary() {
    let (result, output) = run("print -(3 - 8) / 5;");
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(output, "1\n");
}

#[test]
fn string_concatenation() {
    let (result, output) = run("var a = \"foo\"; var b = \"bar\"; print a + b;");
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(output, "foobar\n");
}

#[test]
fn for_loop_accumulates() {
    let source = "var x = 0; for (var i = 0; i < 5; i = i + 1) x = x + i; print x;";
    let (result, output) = run(source);
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(output, "10\n");
}

#[test]
fn while_loop() {
    let source = "var i = 0; while (i < 3) { print i; i = i + 1; }";
    let (result, output) = run(source);
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(output, "0\n1\n2\n");
}

#[test]
fn if_else_branches() {
    let (result, output) = run("if (1 < 2) print \"then\"; else print \"else\";");
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(output, "then\n");

    let (result, output) = run("if (nil) print \"then\"; else print \"else\";");
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(output, "else\n");
}

#[test]
fn truthiness() {
    // 只有 nil 和 false 为假，0 和空串都为真
    let (result, output) = run("print !nil; print !false; print !0; print !\"\";");
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(output, "true\ntrue\nfalse\nfalse\n");
}

#[test]
fn comparison_operators() {
    let (result, output) = run("print 1 < 2; print 2 <= 2; print 3 > 4; print 4 >= 4; print 1 == 1; print 1 != 1;");
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(output, "true\ntrue\nfalse\ntrue\ntrue\nfalse\n");
}

#[test]
fn cross_type_equality_is_false() {
    let (result, output) = run("print 0 == false; print nil == false; print \"1\" == 1;");
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(output, "false\nfalse\nfalse\n");
}

#[test]
fn string_interning_makes_equality_true() {
    let (result, output) = run("print \"a\" == \"a\"; print \"ab\" == \"a\" + \"b\";");
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(output, "true\ntrue\n");
}

#[test]
fn nan_is_not_equal_to_itself() {
    let (result, output) = run("print (0/0) == (0/0);");
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(output, "false\n");
}

#[test]
fn print_formats() {
    let source = "fun f() {} print f; print nil; print true; print 2.5; print \"text\";";
    let (result, output) = run(source);
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(output, "<fn f>\nnil\ntrue\n2.5\ntext\n");
}

#[test]
fn global_redefinition_is_allowed() {
    let (result, output) = run("var a = 1; var a = 2; print a;");
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(output, "2\n");
}

#[test]
fn block_scoping_shadows() {
    let source = "var a = \"outer\"; { var a = \"inner\"; print a; } print a;";
    let (result, output) = run(source);
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(output, "inner\nouter\n");
}

#[test]
fn function_call_and_return() {
    let source = "fun add(a, b) { return a + b; } print add(1, 2); print add(\"x\", \"y\");";
    let (result, output) = run(source);
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(output, "3\nxy\n");
}

#[test]
fn function_without_return_yields_nil() {
    let (result, output) = run("fun noop() {} print noop();");
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(output, "nil\n");
}

#[test]
fn recursion() {
    let source = "fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); } print fib(10);";
    let (result, output) = run(source);
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(output, "55\n");
}

#[test]
fn runtime_error_on_bad_operands() {
    let (result, output) = run("print 1 + true;");
    assert_eq!(result, InterpretResult::RuntimeError);
    assert_eq!(output, "");

    let (result, _) = run("print -\"a\";");
    assert_eq!(result, InterpretResult::RuntimeError);

    let (result, _) = run("print 1 < \"a\";");
    assert_eq!(result, InterpretResult::RuntimeError);
}

#[test]
fn runtime_error_on_undefined_variable() {
    let (result, _) = run("print missing;");
    assert_eq!(result, InterpretResult::RuntimeError);
}

#[test]
fn runtime_error_on_undeclared_assignment() {
    let (result, _) = run("x = 1;");
    assert_eq!(result, InterpretResult::RuntimeError);
}

#[test]
fn assignment_after_declaration_is_fine() {
    let (result, output) = run("var x; x = 1; print x;");
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(output, "1\n");
}

#[test]
fn runtime_error_on_arity_mismatch() {
    let (result, _) = run("fun two(a, b) {} two(1);");
    assert_eq!(result, InterpretResult::RuntimeError);
}

#[test]
fn runtime_error_on_calling_non_callable() {
    let (result, _) = run("var x = 3; x();");
    assert_eq!(result, InterpretResult::RuntimeError);
}

#[test]
fn runtime_error_on_deep_recursion() {
    let (result, _) = run("fun loop() { loop(); } loop();");
    assert_eq!(result, InterpretResult::RuntimeError);
}

#[test]
fn output_stops_at_runtime_error() {
    let (result, output) = run("print \"before\"; print 1 + nil; print \"after\";");
    assert_eq!(result, InterpretResult::RuntimeError);
    assert_eq!(output, "before\n");
}

static TICKS: AtomicUsize = AtomicUsize::new(0);

fn tick_native(_args: &[Value]) -> Value {
    TICKS.fetch_add(1, Ordering::SeqCst);
    Value::Nil
}

#[test]
fn short_circuit_skips_side_effects() {
    let (mut vm, out) = capture_vm();
    vm.define_native("tick", tick_native);

    // 两条语句都不该触发 tick
    let result = vm.interpret("print false and tick(); print true or tick();");
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(TICKS.load(Ordering::SeqCst), 0);
    assert_eq!(out.contents(), "false\ntrue\n");

    // 反过来则各触发一次
    let result = vm.interpret("true and tick(); false or tick();");
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(TICKS.load(Ordering::SeqCst), 2);
}

#[test]
fn native_functions_receive_arguments() {
    fn sum_native(args: &[Value]) -> Value {
        let mut total = 0.0;
        for arg in args {
            if let Value::Number(n) = arg {
                total += n;
            }
        }
        Value::Number(total)
    }

    let (mut vm, out) = capture_vm();
    vm.define_native("sum", sum_native);
    let result = vm.interpret("print sum(1, 2, 3); print sum;");
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(out.contents(), "6\n<native fn>\n");
}

#[test]
fn stack_is_balanced_after_execution() {
    let source = "
        var a = 1;
        { var b = 2; print a + b; }
        if (a) print a;
        fun f(x) { return x; }
        f(a);
        while (a < 3) a = a + 1;
    ";
    let (mut vm, _out) = capture_vm();
    let result = vm.interpret(source);
    assert_eq!(result, InterpretResult::Ok);
    // 每条语句结束后栈都应回到原位，脚本跑完必须清空
    assert_eq!(vm.stack_top, 0);
}

#[test]
fn and_or_yield_operand_values() {
    let (result, output) = run("print 1 and 2; print nil and 2; print nil or 3; print 4 or 5;");
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(output, "2\nnil\n3\n4\n");
}
