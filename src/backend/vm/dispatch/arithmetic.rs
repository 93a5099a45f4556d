use crate::backend::vm::VirtualMachine;
use crate::backend::vm::error::{ErrorKind, VMError};
use crate::common::object::Value;

impl VirtualMachine {
    /// ADD is overloaded: two numbers add, two strings concatenate.
    pub fn handle_add(&mut self) -> Result<(), VMError> {
        if self.peek(0).is_string() && self.peek(1).is_string() {
            return self.concatenate();
        }
        if let (Value::Number(a), Value::Number(b)) = (self.peek(1), self.peek(0)) {
            self.pop();
            self.pop();
            return self.push(Value::Number(a + b));
        }
        Err(self.error(ErrorKind::TypeError(
            "Operands must be two numbers or two strings",
        )))
    }

    pub fn handle_subtract(&mut self) -> Result<(), VMError> {
        let (a, b) = self.pop_number_operands()?;
        self.push(Value::Number(a - b))
    }

    pub fn handle_multiply(&mut self) -> Result<(), VMError> {
        let (a, b) = self.pop_number_operands()?;
        self.push(Value::Number(a * b))
    }

    pub fn handle_divide(&mut self) -> Result<(), VMError> {
        // 不检查除零，IEEE-754 自己会给出 inf/nan
        let (a, b) = self.pop_number_operands()?;
        self.push(Value::Number(a / b))
    }

    pub fn handle_not(&mut self) -> Result<(), VMError> {
        let value = self.pop();
        self.push(Value::Bool(value.is_falsey()))
    }

    pub fn handle_negate(&mut self) -> Result<(), VMError> {
        match self.peek(0) {
            Value::Number(n) => {
                self.pop();
                self.push(Value::Number(-n))
            }
            _ => Err(self.error(ErrorKind::TypeError("Operand must be a number"))),
        }
    }

    /// Both operands stay on the stack until the checks pass, so a collection
    /// triggered by the result allocation can never miss them.
    fn concatenate(&mut self) -> Result<(), VMError> {
        let b = self.peek(0).as_string().unwrap();
        let a = self.peek(1).as_string().unwrap();

        let combined = unsafe {
            let mut buf = String::with_capacity((&(*a).data.chars).len() + (&(*b).data.chars).len());
            buf.push_str(&(*a).data.chars);
            buf.push_str(&(*b).data.chars);
            buf
        };

        let result = self
            .heap
            .take_string(combined)
            .ok_or_else(|| self.error(ErrorKind::OutOfMemory))?;

        self.pop();
        self.pop();
        self.push(Value::obj(result))
    }

    pub(crate) fn pop_number_operands(&mut self) -> Result<(f64, f64), VMError> {
        match (self.peek(1), self.peek(0)) {
            (Value::Number(a), Value::Number(b)) => {
                self.pop();
                self.pop();
                Ok((a, b))
            }
            _ => Err(self.error(ErrorKind::TypeError("Operands must be numbers"))),
        }
    }
}
