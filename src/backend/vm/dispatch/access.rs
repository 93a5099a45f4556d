use crate::backend::vm::VirtualMachine;
use crate::backend::vm::error::{ErrorKind, VMError};
use crate::common::object::Value;

impl VirtualMachine {
    pub fn handle_constant(&mut self) -> Result<(), VMError> {
        let value = self.read_constant();
        self.push(value)
    }

    pub fn handle_nil(&mut self) -> Result<(), VMError> {
        self.push(Value::Nil)
    }

    pub fn handle_true(&mut self) -> Result<(), VMError> {
        self.push(Value::Bool(true))
    }

    pub fn handle_false(&mut self) -> Result<(), VMError> {
        self.push(Value::Bool(false))
    }

    pub fn handle_pop(&mut self) -> Result<(), VMError> {
        self.pop();
        Ok(())
    }

    pub fn handle_get_local(&mut self) -> Result<(), VMError> {
        let slot = self.read_byte() as usize;
        let base = self.frames.last().unwrap().slots;
        self.push(self.stack[base + slot])
    }

    pub fn handle_set_local(&mut self) -> Result<(), VMError> {
        let slot = self.read_byte() as usize;
        let base = self.frames.last().unwrap().slots;
        // assignment is an expression, the value stays on top
        self.stack[base + slot] = self.peek(0);
        Ok(())
    }

    pub fn handle_get_global(&mut self) -> Result<(), VMError> {
        let name = self.read_string()?;
        match self.globals.get(name) {
            Some(value) => self.push(value),
            None => {
                let chars = unsafe { (*name).data.chars.clone() };
                Err(self.error(ErrorKind::UndefinedVariable(chars)))
            }
        }
    }

    pub fn handle_define_global(&mut self) -> Result<(), VMError> {
        let name = self.read_string()?;
        let value = self.peek(0);
        // redefining an existing global is allowed
        self.globals.set(name, value);
        self.pop();
        Ok(())
    }

    pub fn handle_set_global(&mut self) -> Result<(), VMError> {
        let name = self.read_string()?;
        let value = self.peek(0);
        if self.globals.set(name, value) {
            // the set just created a binding that was never declared; undo it
            self.globals.delete(name);
            let chars = unsafe { (*name).data.chars.clone() };
            return Err(self.error(ErrorKind::UndeclaredAssignment(chars)));
        }
        Ok(())
    }

    pub fn handle_get_upvalue(&mut self) -> Result<(), VMError> {
        let slot = self.read_byte() as usize;
        let closure = self.frames.last().unwrap().closure;
        let value = unsafe {
            let upvalue = (&(*closure).data.upvalues)[slot];
            *(*upvalue).data.location
        };
        self.push(value)
    }

    pub fn handle_set_upvalue(&mut self) -> Result<(), VMError> {
        let slot = self.read_byte() as usize;
        let closure = self.frames.last().unwrap().closure;
        let value = self.peek(0);
        unsafe {
            let upvalue = (&(*closure).data.upvalues)[slot];
            *(*upvalue).data.location = value;
        }
        Ok(())
    }
}
