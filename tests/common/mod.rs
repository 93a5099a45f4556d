use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use rylox::backend::vm::{InterpretResult, VirtualMachine};

/// Cloneable sink so the test keeps a handle on what the VM printed.
#[derive(Clone)]
pub struct SharedOutput(Rc<RefCell<Vec<u8>>>);

impl SharedOutput {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(Vec::new())))
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).to_string()
    }
}

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

pub fn capture_vm() -> (VirtualMachine, SharedOutput) {
    let out = SharedOutput::new();
    let vm = VirtualMachine::with_output(Box::new(out.clone()));
    (vm, out)
}

/// Runs a source string on a fresh VM and returns the result together with
/// everything `print` wrote.
pub fn run(source: &str) -> (InterpretResult, String) {
    let (mut vm, out) = capture_vm();
    let result = vm.interpret(source);
    (result, out.contents())
}
