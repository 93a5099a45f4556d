// Rylox virtual machine
// Changelog:
// 2026-07-12: Stack machine core: fixed value stack, call frames, globals table,
//            byte-at-a-time dispatch over the current frame's chunk; introduced the
//            decoupled `dispatch` module so each opcode family lives with its peers.
// 2026-07-18: Closures: open-upvalue list ordered by descending stack address,
//            capture at OP_CLOSURE, closing at scope exit and on return.
// 2026-07-19: Mark-and-sweep wired into the run loop: collection happens at
//            instruction boundaries where the stack, frames, open upvalues and
//            globals form a complete root set; the strings table is swept weakly
//            between tracing and the object sweep.

pub mod dispatch;
pub mod error;
pub mod heap;
pub mod stack;
pub mod std_lib;
pub mod trace;

use std::io::Write;

use clap::ValueEnum;

use crate::backend::translator::emitter::compile;
use crate::backend::vm::error::{ErrorKind, TraceFrame, VMError};
use crate::backend::vm::heap::Heap;
use crate::backend::vm::stack::{CallFrame, STACK_MAX};
use crate::common::object::{
    GcObject, NativeFn, ObjFunction, ObjString, ObjUpvalue, RawObject, Value,
};
use crate::common::opcode::OpCode;
use crate::common::table::Table;

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Release, // 仅输出程序结果
    Debug,   // 输出编译信息与 GC 摘要
    Trace,   // 反汇编 + 全量指令追踪
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpretResult {
    Ok,
    CompileError,
    RuntimeError,
}

pub struct VirtualMachine {
    pub frames: Vec<CallFrame>,
    /// Fixed-capacity value stack. Never reallocated, so raw pointers into it
    /// (open upvalue locations) stay valid for the lifetime of the VM.
    pub stack: Box<[Value]>,
    pub stack_top: usize,
    pub globals: Table,
    /// Head of the open-upvalue list, descending by stack address.
    pub open_upvalues: *mut GcObject<ObjUpvalue>,
    pub heap: Heap,
    pub log_level: LogLevel,
    out: Box<dyn Write>,
}

impl VirtualMachine {
    pub fn new() -> Self {
        Self::with_output(Box::new(std::io::stdout()))
    }

    /// Builds a VM whose `print` statement writes into `out`; diagnostics and
    /// error reports keep going to the process stdout/stderr.
    pub fn with_output(out: Box<dyn Write>) -> Self {
        Self {
            frames: Vec::new(),
            stack: vec![Value::Nil; STACK_MAX].into_boxed_slice(),
            stack_top: 0,
            globals: Table::new(),
            open_upvalues: std::ptr::null_mut(),
            heap: Heap::new(),
            log_level: LogLevel::Release,
            out: Box::new(std::io::BufWriter::new(out)),
        }
    }

    /// Installs a host callable into globals. Must be called before
    /// `interpret`; bindings survive across scripts.
    pub fn define_native(&mut self, name: &str, function: NativeFn) {
        let Some(key) = self.heap.copy_string(name) else {
            return;
        };
        let Some(native) = self.heap.alloc_native(function) else {
            return;
        };
        self.globals.set(key, Value::obj(native));
    }

    /// Compiles and runs a top-level script.
    pub fn interpret(&mut self, source: &str) -> InterpretResult {
        let Some(function) = compile(source, &mut self.heap, self.log_level) else {
            return InterpretResult::CompileError;
        };

        let result = self.run_script(function);
        let _ = self.out.flush();
        match result {
            Ok(()) => InterpretResult::Ok,
            Err(err) => {
                eprint!("{}", err);
                self.reset_stack();
                InterpretResult::RuntimeError
            }
        }
    }

    fn run_script(&mut self, function: *mut GcObject<ObjFunction>) -> Result<(), VMError> {
        // the bare function is pushed while the closure is allocated so the
        // first collection already sees it as a root
        self.push(Value::obj(function))?;
        let closure = self
            .heap
            .alloc_closure(function)
            .ok_or_else(|| self.error(ErrorKind::OutOfMemory))?;
        self.pop();
        self.push(Value::obj(closure))?;
        self.call_closure(closure, 0)?;
        self.run()
    }

    fn run(&mut self) -> Result<(), VMError> {
        while !self.frames.is_empty() {
            if self.log_level == LogLevel::Trace {
                self.trace_execution();
            }

            let byte = self.read_byte();
            let op = OpCode::try_from(byte).map_err(|_| {
                self.error(ErrorKind::InternalError(format!(
                    "undecodable opcode byte 0x{:02X}",
                    byte
                )))
            })?;
            self.execute_instruction(op)?;

            // 指令边界是安全点：此刻栈、帧、开放 upvalue、全局表构成完整根集
            if self.heap.should_collect() {
                self.collect_garbage();
            }
        }
        Ok(())
    }

    pub fn reset_stack(&mut self) {
        self.stack_top = 0;
        self.frames.clear();
        self.open_upvalues = std::ptr::null_mut();
    }

    pub fn push(&mut self, value: Value) -> Result<(), VMError> {
        if self.stack_top == STACK_MAX {
            return Err(self.error(ErrorKind::StackOverflow));
        }
        self.stack[self.stack_top] = value;
        self.stack_top += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Value {
        self.stack_top -= 1;
        self.stack[self.stack_top]
    }

    pub fn peek(&self, distance: usize) -> Value {
        self.stack[self.stack_top - 1 - distance]
    }

    pub(crate) fn read_byte(&mut self) -> u8 {
        let frame = self.frames.last_mut().unwrap();
        let byte = unsafe { (&(*(*frame.closure).data.function).data.chunk.code)[frame.ip] };
        frame.ip += 1;
        byte
    }

    pub(crate) fn read_short(&mut self) -> u16 {
        let hi = self.read_byte() as u16;
        let lo = self.read_byte() as u16;
        (hi << 8) | lo
    }

    pub(crate) fn read_constant(&mut self) -> Value {
        let index = self.read_byte() as usize;
        let frame = self.frames.last().unwrap();
        unsafe { (&(*(*frame.closure).data.function).data.chunk.constants)[index] }
    }

    pub(crate) fn read_string(&mut self) -> Result<*mut GcObject<ObjString>, VMError> {
        let value = self.read_constant();
        value.as_string().ok_or_else(|| {
            self.error(ErrorKind::InternalError(
                "expected a string in the constant pool".to_string(),
            ))
        })
    }

    pub(crate) fn print_value(&mut self, value: Value) {
        let _ = writeln!(self.out, "{}", value);
    }

    /// Snapshots the traceback at the point of failure; rendering happens in
    /// `interpret` once the error reaches the host boundary.
    pub fn error(&self, kind: ErrorKind) -> VMError {
        let mut stack_trace = Vec::with_capacity(self.frames.len());
        for frame in &self.frames {
            unsafe {
                let function = (*frame.closure).data.function;
                let chunk = &(*function).data.chunk;
                let offset = frame.ip.saturating_sub(1);
                let line = chunk.lines.get(offset).copied().unwrap_or(0);
                let name = (*function).data.name;
                let function = if name.is_null() {
                    None
                } else {
                    Some((*name).data.chars.clone())
                };
                stack_trace.push(TraceFrame { line, function });
            }
        }
        VMError { kind, stack_trace }
    }

    pub fn collect_garbage(&mut self) {
        let before = self.heap.bytes_allocated;

        // 1. roots: every live stack slot, every frame's closure, the whole
        //    open-upvalue list, and both halves of every global entry
        for i in 0..self.stack_top {
            self.heap.mark_value(self.stack[i]);
        }
        for frame in &self.frames {
            self.heap.mark_object(frame.closure as RawObject);
        }
        let mut upvalue = self.open_upvalues;
        while !upvalue.is_null() {
            self.heap.mark_object(upvalue as RawObject);
            upvalue = unsafe { (*upvalue).data.next };
        }
        for i in 0..self.globals.entries.len() {
            let entry = self.globals.entries[i];
            if !entry.key.is_null() {
                self.heap.mark_object(entry.key as RawObject);
            }
            self.heap.mark_value(entry.value);
        }

        // 2. trace gray set
        self.heap.trace_references();

        // 3. weak-sweep interned strings, then 4. sweep the object list
        self.heap.strings.remove_unmarked();
        let (swept_count, swept_bytes) = self.heap.sweep();

        if swept_count > 0 && matches!(self.log_level, LogLevel::Debug | LogLevel::Trace) {
            println!(
                "[DEBUG] Sweep phase finished: reclaimed {} objects, {} bytes released ({} -> {} live).",
                swept_count, swept_bytes, before, self.heap.bytes_allocated
            );
        }
    }

    pub fn dump_internal_state(&self) {
        let sep = "=".repeat(50);
        println!("\n{}", sep);
        println!("         VIRTUAL MACHINE INTERNAL STATE");
        println!("{}", sep);

        println!("\n[1. Call Stack]");
        if self.frames.is_empty() {
            println!("  (no live frames)");
        } else {
            for (depth, frame) in self.frames.iter().enumerate() {
                let name = unsafe {
                    let function = (*frame.closure).data.function;
                    if (*function).data.name.is_null() {
                        "script".to_string()
                    } else {
                        (*(*function).data.name).data.chars.clone()
                    }
                };
                println!(
                    "  Frame #{} -> {} (ip: {}, slots base: {})",
                    depth, name, frame.ip, frame.slots
                );
            }
        }

        println!("\n[2. Value Stack]");
        for i in 0..self.stack_top {
            println!("  [{}] {}", i, self.stack[i]);
        }

        println!("\n[3. Heap]");
        println!(
            "  live: {} bytes, peak: {} bytes, next GC at {} bytes",
            self.heap.bytes_allocated, self.heap.max_allocated, self.heap.next_gc
        );
        println!(
            "  globals: {} entries, interned strings: {} entries",
            self.globals.count, self.heap.strings.count
        );

        println!("{}\n", sep);
    }
}

impl Default for VirtualMachine {
    fn default() -> Self {
        Self::new()
    }
}
