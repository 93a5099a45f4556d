// Chunk disassembler and per-instruction execution trace, reachable through
// LogLevel::Trace.

use crate::backend::vm::VirtualMachine;
use crate::common::chunk::Chunk;
use crate::common::opcode::OpCode;

pub fn disassemble_chunk(chunk: &Chunk, name: &str) {
    println!("== {} ==", name);
    let mut offset = 0;
    while offset < chunk.code.len() {
        offset = disassemble_instruction(chunk, offset);
    }
}

pub fn disassemble_instruction(chunk: &Chunk, offset: usize) -> usize {
    print!("{:04} ", offset);
    if offset > 0 && chunk.lines[offset] == chunk.lines[offset - 1] {
        print!("   | ");
    } else {
        print!("{:4} ", chunk.lines[offset]);
    }

    let byte = chunk.code[offset];
    let Ok(op) = OpCode::try_from(byte) else {
        println!("Unknown opcode 0x{:02X}", byte);
        return offset + 1;
    };

    match op {
        OpCode::Constant | OpCode::GetGlobal | OpCode::DefineGlobal | OpCode::SetGlobal => {
            constant_instruction(chunk, op, offset)
        }
        OpCode::GetLocal
        | OpCode::SetLocal
        | OpCode::GetUpvalue
        | OpCode::SetUpvalue
        | OpCode::Call => byte_instruction(chunk, op, offset),
        OpCode::Jump | OpCode::JumpIfFalse => jump_instruction(chunk, op, 1, offset),
        OpCode::Loop => jump_instruction(chunk, op, -1, offset),
        OpCode::Closure => closure_instruction(chunk, offset),
        _ => simple_instruction(op, offset),
    }
}

fn simple_instruction(op: OpCode, offset: usize) -> usize {
    println!("{:?}", op);
    offset + 1
}

fn constant_instruction(chunk: &Chunk, op: OpCode, offset: usize) -> usize {
    let constant = chunk.code[offset + 1] as usize;
    println!(
        "{:<16} {:4} '{}'",
        format!("{:?}", op),
        constant,
        chunk.constants[constant]
    );
    offset + 2
}

fn byte_instruction(chunk: &Chunk, op: OpCode, offset: usize) -> usize {
    let slot = chunk.code[offset + 1];
    println!("{:<16} {:4}", format!("{:?}", op), slot);
    offset + 2
}

fn jump_instruction(chunk: &Chunk, op: OpCode, sign: i64, offset: usize) -> usize {
    let jump = ((chunk.code[offset + 1] as u16) << 8 | chunk.code[offset + 2] as u16) as i64;
    let target = offset as i64 + 3 + sign * jump;
    println!("{:<16} {:4} -> {}", format!("{:?}", op), offset, target);
    offset + 3
}

// CLOSURE 后面跟着每个 upvalue 的 (is_local, index) 描述对
fn closure_instruction(chunk: &Chunk, offset: usize) -> usize {
    let mut offset = offset + 1;
    let constant = chunk.code[offset] as usize;
    offset += 1;
    println!(
        "{:<16} {:4} {}",
        "Closure", constant, chunk.constants[constant]
    );

    if let Some(function) = chunk.constants[constant].as_function() {
        let upvalue_count = unsafe { (*function).data.upvalue_count };
        for _ in 0..upvalue_count {
            let is_local = chunk.code[offset] != 0;
            let index = chunk.code[offset + 1];
            println!(
                "{:04}      |                     {} {}",
                offset,
                if is_local { "local" } else { "upvalue" },
                index
            );
            offset += 2;
        }
    }
    offset
}

impl VirtualMachine {
    /// Prints the live stack window and the instruction about to execute.
    pub fn trace_execution(&self) {
        print!("          ");
        for i in 0..self.stack_top {
            print!("[ {} ]", self.stack[i]);
        }
        println!();

        let frame = self.frames.last().unwrap();
        let chunk = unsafe { &(*(*frame.closure).data.function).data.chunk };
        disassemble_instruction(chunk, frame.ip);
    }
}
