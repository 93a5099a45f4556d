/*
   调用帧：closure + 指令指针 + 值栈基址
*/
use crate::common::object::{GcObject, ObjClosure};

pub const FRAMES_MAX: usize = 64;
pub const STACK_MAX: usize = FRAMES_MAX * 256;

pub struct CallFrame {
    pub closure: *mut GcObject<ObjClosure>,
    /// Index into the closure's function's chunk.
    pub ip: usize,
    /// Base index into the VM value stack; slot 0 holds the callee itself.
    pub slots: usize,
}

impl CallFrame {
    pub fn new(closure: *mut GcObject<ObjClosure>, slots: usize) -> Self {
        Self {
            closure,
            ip: 0,
            slots,
        }
    }
}
