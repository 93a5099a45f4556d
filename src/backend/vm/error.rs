
#[derive(Debug, Clone)]
pub enum ErrorKind {
    // 类型错误：例如 -"a" 或 1 + true
    TypeError(&'static str),
    // 访问未定义的全局变量
    UndefinedVariable(String),
    // 给未声明的全局变量赋值
    UndeclaredAssignment(String),
    // 调用非函数值
    InvalidCall,
    // 实参个数与形参不符
    ArityMismatch { expected: u8, got: u8 },
    // 调用栈或值栈耗尽
    StackOverflow,
    // GC 后仍无法分配
    OutOfMemory,
    // 字节码损坏或 VM 实现 Bug
    InternalError(String),
}

/// One frame of the traceback captured when the error was raised.
#[derive(Debug, Clone)]
pub struct TraceFrame {
    pub line: u32,
    /// None for the top-level script.
    pub function: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VMError {
    pub kind: ErrorKind,
    /// Innermost frame last; rendering walks it in reverse.
    pub stack_trace: Vec<TraceFrame>,
}

impl VMError {
    pub fn message(&self) -> String {
        match &self.kind {
            ErrorKind::TypeError(m) => (*m).to_string(),
            ErrorKind::UndefinedVariable(name) => {
                format!("Undefined variable {}", name)
            }
            ErrorKind::UndeclaredAssignment(name) => {
                format!("Cannot set undeclared variable {}", name)
            }
            ErrorKind::InvalidCall => "Can only call functions and classes".to_string(),
            ErrorKind::ArityMismatch { expected, got } => {
                format!("Expected {} arguments but got {}", expected, got)
            }
            ErrorKind::StackOverflow => "Stack overflow".to_string(),
            ErrorKind::OutOfMemory => {
                "OutOfMemoryError: heap exhaustion during allocation".to_string()
            }
            ErrorKind::InternalError(m) => {
                format!("InternalExecutionException: {}", m)
            }
        }
    }
}

impl std::fmt::Display for VMError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.message())?;
        for frame in self.stack_trace.iter().rev() {
            match &frame.function {
                Some(name) => writeln!(f, "[line {}] in {}()", frame.line, name)?,
                None => writeln!(f, "[line {}] in script", frame.line)?,
            }
        }
        Ok(())
    }
}
