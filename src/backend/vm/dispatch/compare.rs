use crate::backend::vm::VirtualMachine;
use crate::backend::vm::error::VMError;
use crate::common::object::Value;

impl VirtualMachine {
    /// EQUAL works across all value kinds; mixed kinds are simply unequal.
    pub fn handle_equal(&mut self) -> Result<(), VMError> {
        let b = self.pop();
        let a = self.pop();
        self.push(Value::Bool(a == b))
    }

    pub fn handle_greater(&mut self) -> Result<(), VMError> {
        let (a, b) = self.pop_number_operands()?;
        self.push(Value::Bool(a > b))
    }

    pub fn handle_less(&mut self) -> Result<(), VMError> {
        let (a, b) = self.pop_number_operands()?;
        self.push(Value::Bool(a < b))
    }
}
