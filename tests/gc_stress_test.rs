mod common;

use common::{SharedOutput, capture_vm};
use rylox::backend::vm::{InterpretResult, VirtualMachine};

fn run_stressed(source: &str) -> (InterpretResult, String) {
    let out = SharedOutput::new();
    let mut vm = VirtualMachine::with_output(Box::new(out.clone()));
    vm.heap.gc_stress = true;
    let result = vm.interpret(source);
    (result, out.contents())
}

/// 压力模式（每个安全点都回收）必须与正常模式输出完全一致
fn assert_stress_identical(source: &str) {
    let (mut vm, out) = capture_vm();
    let plain_result = vm.interpret(source);
    let plain_output = out.contents();
    drop(vm);

    let (stressed_result, stressed_output) = run_stressed(source);

    assert_eq!(plain_result, InterpretResult::Ok);
    assert_eq!(stressed_result, plain_result);
    assert_eq!(stressed_output, plain_output);
}

#[test]
fn stress_gc_preserves_string_building() {
    assert_stress_identical(
        "
        var s = \"\";
        for (var i = 0; i < 40; i = i + 1) {
            s = s + \"ab\";
        }
        print s;
        ",
    );
}

#[test]
fn stress_gc_preserves_closures() {
    assert_stress_identical(
        "
        fun makeCounter() {
            var c = 0;
            fun inc() { c = c + 1; return c; }
            return inc;
        }
        var k = makeCounter();
        for (var i = 0; i < 10; i = i + 1) { k(); }
        print k();
        ",
    );
}

#[test]
fn stress_gc_preserves_interning() {
    assert_stress_identical(
        "
        var a = \"x\" + \"y\";
        var b = \"xy\";
        print a == b;
        var keep = \"\";
        for (var i = 0; i < 30; i = i + 1) {
            keep = \"x\" + \"y\";
        }
        print keep == b;
        ",
    );
}

#[test]
fn stress_gc_deeply_nested_calls() {
    assert_stress_identical(
        "
        fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); }
        print fib(12);
        ",
    );
}

#[test]
fn collection_actually_reclaims_garbage() {
    let source = "
        var live = \"keep\";
        for (var i = 0; i < 50; i = i + 1) {
            var junk = \"aaaa\" + \"bbbb\";
            junk = junk + junk;
        }
        print live;
    ";
    let (result, output) = run_stressed(source);
    assert_eq!(result, InterpretResult::Ok);
    assert_eq!(output, "keep\n");
}
