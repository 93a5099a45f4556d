use crate::backend::vm::VirtualMachine;
use crate::backend::vm::error::{ErrorKind, VMError};
use crate::backend::vm::stack::{CallFrame, FRAMES_MAX};
use crate::common::object::{GcObject, ObjClosure, ObjKind, Value};

impl VirtualMachine {
    /// JUMP: unconditional forward jump.
    pub fn handle_jump(&mut self) -> Result<(), VMError> {
        let offset = self.read_short() as usize;
        self.frames.last_mut().unwrap().ip += offset;
        Ok(())
    }

    /// JUMP_IF_FALSE does not pop: and/or lowering needs the condition value
    /// left in place, the compiler emits the matching POP itself.
    pub fn handle_jump_if_false(&mut self) -> Result<(), VMError> {
        let offset = self.read_short() as usize;
        if self.peek(0).is_falsey() {
            self.frames.last_mut().unwrap().ip += offset;
        }
        Ok(())
    }

    /// LOOP: backward jump, offset is subtracted.
    pub fn handle_loop(&mut self) -> Result<(), VMError> {
        let offset = self.read_short() as usize;
        self.frames.last_mut().unwrap().ip -= offset;
        Ok(())
    }

    pub fn handle_print(&mut self) -> Result<(), VMError> {
        let value = self.pop();
        self.print_value(value);
        Ok(())
    }

    /// CALL: the callee sits below its arguments at peek(argc).
    pub fn handle_call(&mut self) -> Result<(), VMError> {
        let argc = self.read_byte() as usize;
        let callee = self.peek(argc);
        self.call_value(callee, argc)
    }

    pub(crate) fn call_value(&mut self, callee: Value, argc: usize) -> Result<(), VMError> {
        match callee.obj_kind() {
            Some(ObjKind::Closure) => {
                let closure = callee.as_closure().unwrap();
                self.call_closure(closure, argc)
            }
            Some(ObjKind::Native) => {
                let native = callee.as_native().unwrap();
                let function = unsafe { (*native).data.function };
                let args_start = self.stack_top - argc;
                let result = function(&self.stack[args_start..self.stack_top]);
                // drop the arguments and the callee, push the result
                self.stack_top -= argc + 1;
                self.push(result)
            }
            _ => Err(self.error(ErrorKind::InvalidCall)),
        }
    }

    pub(crate) fn call_closure(
        &mut self,
        closure: *mut GcObject<ObjClosure>,
        argc: usize,
    ) -> Result<(), VMError> {
        let arity = unsafe { (*(*closure).data.function).data.arity };
        if arity as usize != argc {
            return Err(self.error(ErrorKind::ArityMismatch {
                expected: arity,
                got: argc as u8,
            }));
        }

        if self.frames.len() == FRAMES_MAX {
            return Err(self.error(ErrorKind::StackOverflow));
        }

        // slot 0 of the new frame is the callee itself
        self.frames
            .push(CallFrame::new(closure, self.stack_top - argc - 1));
        Ok(())
    }

    /// RETURN: close every upvalue still open over this frame's slots, then
    /// hand the result back to the caller. Popping the last frame ends the
    /// script.
    pub fn handle_return(&mut self) -> Result<(), VMError> {
        let result = self.pop();
        let frame = self.frames.pop().unwrap();

        let base_ptr = unsafe { self.stack.as_mut_ptr().add(frame.slots) };
        self.close_upvalues(base_ptr);

        if self.frames.is_empty() {
            // the script closure itself
            self.pop();
            return Ok(());
        }

        self.stack_top = frame.slots;
        self.push(result)
    }
}
