use crate::backend::vm::VirtualMachine;
use crate::backend::vm::error::{ErrorKind, VMError};
use crate::common::object::{GcObject, ObjUpvalue, Value};

impl VirtualMachine {
    /// CLOSURE: wrap the function constant, then resolve each upvalue
    /// descriptor pair. `is_local` captures a slot of the *current* frame;
    /// otherwise the upvalue is shared from the enclosing closure.
    pub fn handle_closure(&mut self) -> Result<(), VMError> {
        let constant = self.read_constant();
        let function = constant.as_function().ok_or_else(|| {
            self.error(ErrorKind::InternalError(
                "CLOSURE operand is not a function constant".to_string(),
            ))
        })?;
        let closure = self
            .heap
            .alloc_closure(function)
            .ok_or_else(|| self.error(ErrorKind::OutOfMemory))?;
        // on the stack before the next safe point, like every fresh allocation
        self.push(Value::obj(closure))?;

        let upvalue_count = unsafe { (*function).data.upvalue_count };
        let (base, enclosing) = {
            let frame = self.frames.last().unwrap();
            (frame.slots, frame.closure)
        };

        for i in 0..upvalue_count {
            let is_local = self.read_byte() != 0;
            let index = self.read_byte() as usize;
            let upvalue = if is_local {
                let location = unsafe { self.stack.as_mut_ptr().add(base + index) };
                self.capture_upvalue(location)?
            } else {
                unsafe { (&(*enclosing).data.upvalues)[index] }
            };
            unsafe {
                (&mut (*closure).data.upvalues)[i] = upvalue;
            }
        }
        Ok(())
    }

    /// CLOSE_UPVALUE: the local leaving scope is on top of the stack; hoist it
    /// into its upvalue cell, then pop it.
    pub fn handle_close_upvalue(&mut self) -> Result<(), VMError> {
        let top = unsafe { self.stack.as_mut_ptr().add(self.stack_top - 1) };
        self.close_upvalues(top);
        self.pop();
        Ok(())
    }

    /// Returns the open upvalue for `local`, creating and threading a new one
    /// into the descending-by-address list when none exists yet.
    pub(crate) fn capture_upvalue(
        &mut self,
        local: *mut Value,
    ) -> Result<*mut GcObject<ObjUpvalue>, VMError> {
        unsafe {
            let mut prev: *mut GcObject<ObjUpvalue> = std::ptr::null_mut();
            let mut curr = self.open_upvalues;
            while !curr.is_null() && (*curr).data.location > local {
                prev = curr;
                curr = (*curr).data.next;
            }

            // 同一个栈槽最多只有一个开放 upvalue
            if !curr.is_null() && std::ptr::eq((*curr).data.location, local) {
                return Ok(curr);
            }

            let created = self
                .heap
                .alloc_upvalue(local)
                .ok_or_else(|| self.error(ErrorKind::OutOfMemory))?;
            (*created).data.next = curr;
            if prev.is_null() {
                self.open_upvalues = created;
            } else {
                (*prev).data.next = created;
            }
            Ok(created)
        }
    }

    /// Closes every open upvalue at or above `last`: the stack value moves
    /// into the upvalue's own `closed` cell and `location` is repointed at it.
    pub(crate) fn close_upvalues(&mut self, last: *mut Value) {
        unsafe {
            while !self.open_upvalues.is_null() && (*self.open_upvalues).data.location >= last {
                let upvalue = self.open_upvalues;
                (*upvalue).data.closed = *(*upvalue).data.location;
                (*upvalue).data.location = &mut (*upvalue).data.closed as *mut Value;
                self.open_upvalues = (*upvalue).data.next;
            }
        }
    }
}
