mod common;

use common::run;
use rylox::backend::vm::InterpretResult;

#[test]
fn missing_operand_is_a_compile_error() {
    let (result, output) = run("print 1 +;");
    assert_eq!(result, InterpretResult::CompileError);
    assert_eq!(output, "");
}

#[test]
fn missing_semicolon_is_a_compile_error() {
    let (result, _) = run("print 1");
    assert_eq!(result, InterpretResult::CompileError);
}

#[test]
fn local_in_own_initializer_is_a_compile_error() {
    let (result, _) = run("{ var a = a; }");
    assert_eq!(result, InterpretResult::CompileError);
}

#[test]
fn redeclaring_local_in_same_scope_is_a_compile_error() {
    let (result, _) = run("{ var a = 1; var a = 2; }");
    assert_eq!(result, InterpretResult::CompileError);
}

#[test]
fn shadowing_in_inner_scope_is_allowed() {
    let (result, output) = run("{ var a = 1; { var a = 2; print a; } print a; }");
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(output, "2\n1\n");
}

#[test]
fn top_level_return_is_a_compile_error() {
    let (result, _) = run("return 1;");
    assert_eq!(result, InterpretResult::CompileError);
}

#[test]
fn return_inside_function_is_fine() {
    let (result, output) = run("fun f() { return 5; } print f();");
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(output, "5\n");
}

#[test]
fn invalid_assignment_target_is_a_compile_error() {
    let (result, _) = run("var a = 1; var b = 2; a + b = 3;");
    assert_eq!(result, InterpretResult::CompileError);
}

#[test]
fn reserved_class_keyword_has_no_rule_yet() {
    let (result, _) = run("class Foo {}");
    assert_eq!(result, InterpretResult::CompileError);
}

#[test]
fn no_bytecode_runs_after_a_compile_error() {
    // 编译失败的脚本一条指令都不能执行
    let (result, output) = run("print \"should not appear\"; print 1 +;");
    assert_eq!(result, InterpretResult::CompileError);
    assert_eq!(output, "");
}

#[test]
fn panic_mode_recovers_at_statement_boundary() {
    // 第二条语句还能继续报错/分析，但结果仍是编译失败
    let (result, _) = run("var = 1; var ok = 2; print ok;");
    assert_eq!(result, InterpretResult::CompileError);
}

#[test]
fn jump_wider_than_u16_is_rejected() {
    let mut body = String::with_capacity(11 * 40_000 + 32);
    body.push_str("if (true) {\n");
    for _ in 0..40_000 {
        body.push_str("print nil;\n");
    }
    body.push_str("}\n");

    let (result, output) = run(&body);
    assert_eq!(result, InterpretResult::CompileError);
    assert_eq!(output, "");
}

#[test]
fn constant_pool_overflow_is_rejected() {
    // 字面量不去重，300 个常量必然超出单字节索引
    let mut source = String::from("print 0");
    for i in 1..300 {
        source.push_str(&format!(" + {}", i));
    }
    source.push(';');

    let (result, _) = run(&source);
    assert_eq!(result, InterpretResult::CompileError);
}

#[test]
fn too_many_parameters_is_a_compile_error() {
    let mut source = String::from("fun wide(");
    for i in 0..256 {
        if i > 0 {
            source.push_str(", ");
        }
        source.push_str(&format!("p{}", i));
    }
    source.push_str(") {}");

    let (result, _) = run(&source);
    assert_eq!(result, InterpretResult::CompileError);
}
