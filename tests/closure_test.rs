mod common;

use common::run;
use rylox::backend::vm::InterpretResult;

#[test]
fn closure_captures_parameter() {
    let source = "
        fun make(n) {
            fun add(m) { return n + m; }
            return add;
        }
        var a3 = make(3);
        print a3(4);
        print a3(10);
    ";
    let (result, output) = run(source);
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(output, "7\n13\n");
}

#[test]
fn counter_shares_one_upvalue() {
    let source = "
        fun counter() {
            var c = 0;
            fun inc() { c = c + 1; return c; }
            return inc;
        }
        var k = counter();
        print k();
        print k();
        print k();
    ";
    let (result, output) = run(source);
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(output, "1\n2\n3\n");
}

#[test]
fn separate_invocations_get_separate_upvalues() {
    // 每次调用 counter() 都要捕获一份全新的 c
    let source = "
        fun counter() {
            var c = 0;
            fun inc() { c = c + 1; return c; }
            return inc;
        }
        var k1 = counter();
        var k2 = counter();
        print k1();
        print k1();
        print k2();
    ";
    let (result, output) = run(source);
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(output, "1\n2\n1\n");
}

#[test]
fn sibling_closures_share_the_same_variable() {
    let source = "
        var inc;
        var get;
        fun pair() {
            var x = 0;
            fun i() { x = x + 1; }
            fun g() { return x; }
            inc = i;
            get = g;
        }
        pair();
        inc();
        inc();
        print get();
    ";
    let (result, output) = run(source);
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(output, "2\n");
}

#[test]
fn upvalue_closes_when_scope_exits() {
    let source = "
        var f;
        {
            var text = \"kept alive\";
            fun show() { print text; }
            f = show;
        }
        f();
    ";
    let (result, output) = run(source);
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(output, "kept alive\n");
}

#[test]
fn transitive_capture_through_intermediate_function() {
    let source = "
        fun outer() {
            var x = \"out\";
            fun middle() {
                fun inner() { print x; }
                inner();
            }
            middle();
        }
        outer();
    ";
    let (result, output) = run(source);
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(output, "out\n");
}

#[test]
fn assignment_through_upvalue_is_visible_before_close() {
    let source = "
        fun outer() {
            var x = 1;
            fun bump() { x = x + 10; }
            bump();
            print x;
        }
        outer();
    ";
    let (result, output) = run(source);
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(output, "11\n");
}

#[test]
fn loop_variable_capture_per_iteration_scope() {
    // 循环体块级作用域里的局部，每轮迭代关闭一次
    let source = "
        var first;
        var second;
        for (var i = 0; i < 2; i = i + 1) {
            var label;
            if (i == 0) label = \"iter0\"; else label = \"iter1\";
            fun show() { print label; }
            if (i == 0) first = show;
            else second = show;
        }
        first();
        second();
    ";
    let (result, output) = run(source);
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(output, "iter0\niter1\n");
}
