// Rylox bytecode emitter
// Changelog:
// 2026-07-14: Single-pass Pratt compiler: tokens stream straight into bytecode,
//            no AST in between. A per-token rule table drives prefix/infix parsing
//            across eleven precedence levels; locals resolve against a push-down
//            stack of function contexts, jump targets are back-patched into the
//            chunk's byte buffer.
// 2026-07-17: Upvalue resolution across enclosing contexts with (is_local, index)
//            descriptor pairs emitted after CLOSURE; captured locals leave scope
//            through CLOSE_UPVALUE instead of POP.
// 2026-07-19: Panic-mode error recovery: the first error in a statement reports,
//            the rest stay quiet until a synchronization point.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::backend::vm::LogLevel;
use crate::backend::vm::heap::Heap;
use crate::backend::vm::trace::disassemble_chunk;
use crate::common::chunk::Chunk;
use crate::common::object::{GcObject, ObjFunction, Value};
use crate::common::opcode::OpCode;
use crate::frontend::scanner::{Scanner, Token, TokenKind};

/// Lowest to highest; the Pratt driver keeps consuming infix operators while
/// the current token's level is at least the caller's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
enum Precedence {
    None,
    Assignment, // =
    Or,         // or
    And,        // and
    Equality,   // == !=
    Comparison, // < > <= >=
    Term,       // + -
    Factor,     // * /
    Unary,      // ! -
    Call,       // ()
    Primary,
}

impl Precedence {
    fn next(self) -> Precedence {
        Precedence::try_from(u8::from(self) + 1).unwrap_or(Precedence::Primary)
    }
}

type ParseFn<'src, 'h> = fn(&mut Compiler<'src, 'h>, bool);

struct ParseRule<'src, 'h> {
    prefix: Option<ParseFn<'src, 'h>>,
    infix: Option<ParseFn<'src, 'h>>,
    precedence: Precedence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunctionKind {
    Script,
    Function,
}

struct Local<'src> {
    name: Token<'src>,
    /// -1 while declared but not yet initialized, so a variable cannot be
    /// read inside its own initializer.
    depth: i32,
    captured: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct UpvalueMeta {
    index: u8,
    is_local: bool,
}

const MAX_LOCALS: usize = 256;
const MAX_UPVALUES: usize = 256;

/// One per function being compiled; nested function declarations push and pop.
struct FuncContext<'src> {
    function: *mut GcObject<ObjFunction>,
    kind: FunctionKind,
    locals: Vec<Local<'src>>,
    upvalues: Vec<UpvalueMeta>,
    scope_depth: i32,
}

impl<'src> FuncContext<'src> {
    fn new(function: *mut GcObject<ObjFunction>, kind: FunctionKind) -> Self {
        // slot 0 belongs to the callee itself
        let reserved = Local {
            name: Token::synthetic(""),
            depth: 0,
            captured: false,
        };
        Self {
            function,
            kind,
            locals: vec![reserved],
            upvalues: Vec::new(),
            scope_depth: 0,
        }
    }
}

pub struct Compiler<'src, 'h> {
    scanner: Scanner<'src>,
    current: Token<'src>,
    previous: Token<'src>,
    had_error: bool,
    panic_mode: bool,
    contexts: Vec<FuncContext<'src>>,
    heap: &'h mut Heap,
    log_level: LogLevel,
}

/// Compiles a top-level script into an anonymous zero-arity function.
/// Returns None if any compile error was reported; no bytecode from a failed
/// compile is ever executed.
pub fn compile(
    source: &str,
    heap: &mut Heap,
    log_level: LogLevel,
) -> Option<*mut GcObject<ObjFunction>> {
    if matches!(log_level, LogLevel::Debug | LogLevel::Trace) {
        println!(
            "[DEBUG] Compilation started ({} bytes of source).",
            source.len()
        );
    }

    let script = heap.alloc_function()?;

    let placeholder = Token {
        kind: TokenKind::Eof,
        lexeme: "",
        line: 0,
    };
    let mut compiler = Compiler {
        scanner: Scanner::new(source),
        current: placeholder,
        previous: placeholder,
        had_error: false,
        panic_mode: false,
        contexts: vec![FuncContext::new(script, FunctionKind::Script)],
        heap,
        log_level,
    };

    compiler.advance();
    while !compiler.match_token(TokenKind::Eof) {
        compiler.declaration();
    }
    let (function, _) = compiler.end_context();

    if compiler.had_error { None } else { Some(function) }
}

impl<'src, 'h> Compiler<'src, 'h> {
    /* --- token plumbing --- */

    fn advance(&mut self) {
        self.previous = self.current;
        loop {
            self.current = self.scanner.scan_token();
            if self.current.kind != TokenKind::Error {
                break;
            }
            let message = self.current.lexeme;
            self.error_at_current(message);
        }
    }

    fn consume(&mut self, kind: TokenKind, message: &str) {
        if self.current.kind == kind {
            self.advance();
        } else {
            self.error_at_current(message);
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn match_token(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /* --- error reporting --- */

    fn error_at(&mut self, token: Token<'src>, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;

        eprint!("[line {}] Error", token.line);
        match token.kind {
            TokenKind::Eof => eprint!(" at end"),
            TokenKind::Error => {}
            _ => eprint!(" at {}", token.lexeme),
        }
        eprintln!(": {}", message);

        self.had_error = true;
    }

    fn error(&mut self, message: &str) {
        self.error_at(self.previous, message);
    }

    fn error_at_current(&mut self, message: &str) {
        self.error_at(self.current, message);
    }

    // 同步点：语句边界（分号之后，或下一个语句起始关键字之前）
    fn synchronize(&mut self) {
        self.panic_mode = false;

        while self.current.kind != TokenKind::Eof {
            if self.previous.kind == TokenKind::Semicolon {
                return;
            }
            match self.current.kind {
                TokenKind::Class
                | TokenKind::Fun
                | TokenKind::Var
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Print
                | TokenKind::Return => return,
                _ => {}
            }
            self.advance();
        }
    }

    /* --- emission --- */

    fn current_chunk(&mut self) -> &mut Chunk {
        unsafe { &mut (*self.contexts.last().unwrap().function).data.chunk }
    }

    fn emit_byte(&mut self, byte: u8) {
        let line = self.previous.line;
        self.current_chunk().write(byte, line);
    }

    fn emit_op(&mut self, op: OpCode) {
        let line = self.previous.line;
        self.current_chunk().write_op(op, line);
    }

    fn emit_ops(&mut self, first: OpCode, second: OpCode) {
        self.emit_op(first);
        self.emit_op(second);
    }

    fn emit_op_byte(&mut self, op: OpCode, byte: u8) {
        self.emit_op(op);
        self.emit_byte(byte);
    }

    // 函数尾部的隐式 return nil
    fn emit_return(&mut self) {
        self.emit_ops(OpCode::Nil, OpCode::Return);
    }

    fn make_constant(&mut self, value: Value) -> u8 {
        let constant = self.current_chunk().add_constant(value);
        if constant > u8::MAX as usize {
            self.error("Too many constants in one chunk");
            return 0;
        }
        constant as u8
    }

    fn emit_constant(&mut self, value: Value) {
        let constant = self.make_constant(value);
        self.emit_op_byte(OpCode::Constant, constant);
    }

    /// Emits `op` with a two-byte placeholder and returns the placeholder's
    /// offset for later patching.
    fn emit_jump(&mut self, op: OpCode) -> usize {
        self.emit_op(op);
        self.emit_byte(0xff);
        self.emit_byte(0xff);
        self.current_chunk().code.len() - 2
    }

    fn patch_jump(&mut self, offset: usize) {
        // -2 adjusts for the offset bytes themselves
        let jump = self.current_chunk().code.len() - offset - 2;

        if jump > u16::MAX as usize {
            self.error("Too much code to jump over");
            return;
        }

        let chunk = self.current_chunk();
        chunk.code[offset] = ((jump >> 8) & 0xff) as u8;
        chunk.code[offset + 1] = (jump & 0xff) as u8;
    }

    fn emit_loop(&mut self, loop_start: usize) {
        self.emit_op(OpCode::Loop);

        let offset = self.current_chunk().code.len() - loop_start + 2;
        if offset > u16::MAX as usize {
            self.error("Loop body too large");
        }

        self.emit_byte(((offset >> 8) & 0xff) as u8);
        self.emit_byte((offset & 0xff) as u8);
    }

    /* --- contexts & scopes --- */

    /// Finishes the current function: implicit return, final upvalue count,
    /// optional disassembly. Returns the function and its upvalue layout so
    /// the enclosing compiler can emit the CLOSURE descriptors.
    fn end_context(&mut self) -> (*mut GcObject<ObjFunction>, Vec<UpvalueMeta>) {
        self.emit_return();

        let ctx = self.contexts.pop().unwrap();
        unsafe {
            (*ctx.function).data.upvalue_count = ctx.upvalues.len();
        }

        if self.log_level == LogLevel::Trace && !self.had_error {
            unsafe {
                let name = (*ctx.function).data.name;
                let label = if name.is_null() {
                    "<script>".to_string()
                } else {
                    (*name).data.chars.clone()
                };
                disassemble_chunk(&(*ctx.function).data.chunk, &label);
            }
        }

        (ctx.function, ctx.upvalues)
    }

    fn begin_scope(&mut self) {
        self.contexts.last_mut().unwrap().scope_depth += 1;
    }

    fn end_scope(&mut self) {
        self.contexts.last_mut().unwrap().scope_depth -= 1;

        loop {
            let ctx = self.contexts.last().unwrap();
            let Some(local) = ctx.locals.last() else {
                break;
            };
            if local.depth <= ctx.scope_depth {
                break;
            }
            // captured locals move into their upvalue cell instead of dying
            let captured = local.captured;
            self.contexts.last_mut().unwrap().locals.pop();
            if captured {
                self.emit_op(OpCode::CloseUpvalue);
            } else {
                self.emit_op(OpCode::Pop);
            }
        }
    }

    /* --- variables --- */

    fn identifier_constant(&mut self, name: Token<'src>) -> u8 {
        match self.heap.copy_string(name.lexeme) {
            Some(string) => self.make_constant(Value::obj(string)),
            None => {
                self.error("OutOfMemoryError: string pool exhausted");
                0
            }
        }
    }

    fn identifiers_equal(a: &Token<'src>, b: &Token<'src>) -> bool {
        a.lexeme == b.lexeme
    }

    fn add_local(&mut self, name: Token<'src>) {
        if self.contexts.last().unwrap().locals.len() == MAX_LOCALS {
            self.error("Too many local variables in block");
            return;
        }
        self.contexts.last_mut().unwrap().locals.push(Local {
            name,
            depth: -1,
            captured: false,
        });
    }

    fn declare_variable(&mut self) {
        if self.contexts.last().unwrap().scope_depth == 0 {
            return;
        }

        let name = self.previous;
        let mut redeclared = false;
        {
            let ctx = self.contexts.last().unwrap();
            for local in ctx.locals.iter().rev() {
                if local.depth != -1 && local.depth < ctx.scope_depth {
                    break;
                }
                if Self::identifiers_equal(&name, &local.name) {
                    redeclared = true;
                    break;
                }
            }
        }
        if redeclared {
            self.error_at(name, "Redeclaring local in the same scope is verboten");
        }

        self.add_local(name);
    }

    fn parse_variable(&mut self, message: &str) -> u8 {
        self.consume(TokenKind::Identifier, message);

        self.declare_variable();
        if self.contexts.last().unwrap().scope_depth > 0 {
            return 0;
        }

        self.identifier_constant(self.previous)
    }

    fn mark_initialized(&mut self) {
        let ctx = self.contexts.last_mut().unwrap();
        if ctx.scope_depth == 0 {
            return;
        }
        let depth = ctx.scope_depth;
        if let Some(local) = ctx.locals.last_mut() {
            local.depth = depth;
        }
    }

    fn define_variable(&mut self, global: u8) {
        if self.contexts.last().unwrap().scope_depth > 0 {
            self.mark_initialized();
            return;
        }
        self.emit_op_byte(OpCode::DefineGlobal, global);
    }

    fn resolve_local(&mut self, ctx: usize, name: &Token<'src>) -> Option<u8> {
        let mut found = None;
        for (i, local) in self.contexts[ctx].locals.iter().enumerate().rev() {
            if Self::identifiers_equal(name, &local.name) {
                found = Some((i, local.depth));
                break;
            }
        }

        let (slot, depth) = found?;
        if depth == -1 {
            self.error_at(*name, "Can't access variable in its initializer");
        }
        Some(slot as u8)
    }

    fn add_upvalue(&mut self, ctx: usize, index: u8, is_local: bool) -> u8 {
        let meta = UpvalueMeta { index, is_local };

        // 同一个 (is_local, index) 只占一个 upvalue 槽
        for (i, existing) in self.contexts[ctx].upvalues.iter().enumerate() {
            if *existing == meta {
                return i as u8;
            }
        }

        if self.contexts[ctx].upvalues.len() == MAX_UPVALUES {
            self.error("Too many closure variables in one function");
            return 0;
        }

        self.contexts[ctx].upvalues.push(meta);
        (self.contexts[ctx].upvalues.len() - 1) as u8
    }

    /// Walks outward through enclosing contexts. A hit one level up captures
    /// that context's local directly; anything further is reached through the
    /// intermediate context's own upvalue, added transitively.
    fn resolve_upvalue(&mut self, ctx: usize, name: &Token<'src>) -> Option<u8> {
        if ctx == 0 {
            return None;
        }

        if let Some(local) = self.resolve_local(ctx - 1, name) {
            self.contexts[ctx - 1].locals[local as usize].captured = true;
            return Some(self.add_upvalue(ctx, local, true));
        }

        if let Some(upvalue) = self.resolve_upvalue(ctx - 1, name) {
            return Some(self.add_upvalue(ctx, upvalue, false));
        }

        None
    }

    fn named_variable(&mut self, name: Token<'src>, can_assign: bool) {
        let ctx = self.contexts.len() - 1;
        let (get_op, set_op, arg) = if let Some(slot) = self.resolve_local(ctx, &name) {
            (OpCode::GetLocal, OpCode::SetLocal, slot)
        } else if let Some(slot) = self.resolve_upvalue(ctx, &name) {
            (OpCode::GetUpvalue, OpCode::SetUpvalue, slot)
        } else {
            let constant = self.identifier_constant(name);
            (OpCode::GetGlobal, OpCode::SetGlobal, constant)
        };

        if can_assign && self.match_token(TokenKind::Equal) {
            self.expression();
            self.emit_op_byte(set_op, arg);
        } else {
            self.emit_op_byte(get_op, arg);
        }
    }

    /* --- expressions --- */

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();
        let Some(prefix) = Self::rule_for(self.previous.kind).prefix else {
            self.error("Expected expression");
            return;
        };

        // only the lowest levels may treat `identifier =` as an assignment
        let can_assign = precedence <= Precedence::Assignment;
        prefix(self, can_assign);

        while precedence <= Self::rule_for(self.current.kind).precedence {
            self.advance();
            if let Some(infix) = Self::rule_for(self.previous.kind).infix {
                infix(self, can_assign);
            }
        }

        if can_assign && self.match_token(TokenKind::Equal) {
            self.error("Invalid assignment target");
        }
    }

    fn rule_for(kind: TokenKind) -> ParseRule<'src, 'h> {
        let (prefix, infix, precedence): (
            Option<ParseFn<'src, 'h>>,
            Option<ParseFn<'src, 'h>>,
            Precedence,
        ) = match kind {
            TokenKind::LeftParen => (Some(Self::grouping), Some(Self::call), Precedence::Call),
            TokenKind::Minus => (Some(Self::unary), Some(Self::binary), Precedence::Term),
            TokenKind::Plus => (None, Some(Self::binary), Precedence::Term),
            TokenKind::Slash | TokenKind::Star => (None, Some(Self::binary), Precedence::Factor),
            TokenKind::Bang => (Some(Self::unary), None, Precedence::None),
            TokenKind::BangEqual | TokenKind::EqualEqual => {
                (None, Some(Self::binary), Precedence::Equality)
            }
            TokenKind::Greater
            | TokenKind::GreaterEqual
            | TokenKind::Less
            | TokenKind::LessEqual => (None, Some(Self::binary), Precedence::Comparison),
            TokenKind::Identifier => (Some(Self::variable), None, Precedence::None),
            TokenKind::Str => (Some(Self::string), None, Precedence::None),
            TokenKind::Number => (Some(Self::number), None, Precedence::None),
            TokenKind::And => (None, Some(Self::and_expression), Precedence::And),
            TokenKind::Or => (None, Some(Self::or_expression), Precedence::Or),
            TokenKind::False | TokenKind::True | TokenKind::Nil => {
                (Some(Self::literal), None, Precedence::None)
            }
            _ => (None, None, Precedence::None),
        };
        ParseRule {
            prefix,
            infix,
            precedence,
        }
    }

    fn grouping(&mut self, _can_assign: bool) {
        self.expression();
        self.consume(TokenKind::RightParen, "Expected ) after expression");
    }

    fn number(&mut self, _can_assign: bool) {
        let value: f64 = self.previous.lexeme.parse().unwrap_or(0.0);
        self.emit_constant(Value::Number(value));
    }

    fn string(&mut self, _can_assign: bool) {
        // the quotes are part of the lexeme, strip them here
        let lexeme = self.previous.lexeme;
        let chars = &lexeme[1..lexeme.len() - 1];
        match self.heap.copy_string(chars) {
            Some(string) => self.emit_constant(Value::obj(string)),
            None => self.error("OutOfMemoryError: string pool exhausted"),
        }
    }

    fn literal(&mut self, _can_assign: bool) {
        match self.previous.kind {
            TokenKind::False => self.emit_op(OpCode::False),
            TokenKind::True => self.emit_op(OpCode::True),
            TokenKind::Nil => self.emit_op(OpCode::Nil),
            _ => {}
        }
    }

    fn variable(&mut self, can_assign: bool) {
        self.named_variable(self.previous, can_assign);
    }

    fn unary(&mut self, _can_assign: bool) {
        let operator = self.previous.kind;

        self.parse_precedence(Precedence::Unary);

        match operator {
            TokenKind::Minus => self.emit_op(OpCode::Negate),
            TokenKind::Bang => self.emit_op(OpCode::Not),
            _ => {}
        }
    }

    fn binary(&mut self, _can_assign: bool) {
        let operator = self.previous.kind;
        let rule = Self::rule_for(operator);
        self.parse_precedence(rule.precedence.next());

        match operator {
            TokenKind::Plus => self.emit_op(OpCode::Add),
            TokenKind::Minus => self.emit_op(OpCode::Subtract),
            TokenKind::Star => self.emit_op(OpCode::Multiply),
            TokenKind::Slash => self.emit_op(OpCode::Divide),
            TokenKind::EqualEqual => self.emit_op(OpCode::Equal),
            TokenKind::BangEqual => self.emit_ops(OpCode::Equal, OpCode::Not),
            TokenKind::Greater => self.emit_op(OpCode::Greater),
            TokenKind::GreaterEqual => self.emit_ops(OpCode::Less, OpCode::Not),
            TokenKind::Less => self.emit_op(OpCode::Less),
            TokenKind::LessEqual => self.emit_ops(OpCode::Greater, OpCode::Not),
            _ => {}
        }
    }

    // a and b：a 为假时短路，b 不求值
    fn and_expression(&mut self, _can_assign: bool) {
        let end_jump = self.emit_jump(OpCode::JumpIfFalse);

        self.emit_op(OpCode::Pop);
        self.parse_precedence(Precedence::And);

        self.patch_jump(end_jump);
    }

    // a or b：a 为真时短路
    fn or_expression(&mut self, _can_assign: bool) {
        let else_jump = self.emit_jump(OpCode::JumpIfFalse);
        let end_jump = self.emit_jump(OpCode::Jump);

        self.patch_jump(else_jump);
        self.emit_op(OpCode::Pop);

        self.parse_precedence(Precedence::Or);

        self.patch_jump(end_jump);
    }

    fn call(&mut self, _can_assign: bool) {
        let argc = self.argument_list();
        self.emit_op_byte(OpCode::Call, argc);
    }

    fn argument_list(&mut self) -> u8 {
        let mut argc: usize = 0;
        if !self.check(TokenKind::RightParen) {
            loop {
                self.expression();
                if argc == 255 {
                    self.error("Can't have more than 255 arguments");
                }
                argc += 1;
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expected ) after arguments");
        argc as u8
    }

    /* --- declarations & statements --- */

    fn declaration(&mut self) {
        if self.match_token(TokenKind::Fun) {
            self.fun_declaration();
        } else if self.match_token(TokenKind::Var) {
            self.var_declaration();
        } else {
            self.statement();
        }

        if self.panic_mode {
            self.synchronize();
        }
    }

    fn statement(&mut self) {
        if self.match_token(TokenKind::Print) {
            self.print_statement();
        } else if self.match_token(TokenKind::LeftBrace) {
            self.begin_scope();
            self.block();
            self.end_scope();
        } else if self.match_token(TokenKind::If) {
            self.if_statement();
        } else if self.match_token(TokenKind::While) {
            self.while_statement();
        } else if self.match_token(TokenKind::For) {
            self.for_statement();
        } else if self.match_token(TokenKind::Return) {
            self.return_statement();
        } else {
            self.expression_statement();
        }
    }

    fn block(&mut self) {
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            self.declaration();
        }
        self.consume(TokenKind::RightBrace, "Expected } at end of block");
    }

    fn var_declaration(&mut self) {
        let global = self.parse_variable("Expected variable name");

        if self.match_token(TokenKind::Equal) {
            self.expression();
        } else {
            self.emit_op(OpCode::Nil);
        }
        self.consume(
            TokenKind::Semicolon,
            "Expected ; after variable declaration",
        );

        self.define_variable(global);
    }

    fn fun_declaration(&mut self) {
        let global = self.parse_variable("Expected function name");
        // initialized before the body compiles, so the function can recurse
        self.mark_initialized();
        self.function(FunctionKind::Function);
        self.define_variable(global);
    }

    fn function(&mut self, kind: FunctionKind) {
        let Some(function) = self.heap.alloc_function() else {
            self.error("OutOfMemoryError: function allocation failed");
            return;
        };
        match self.heap.copy_string(self.previous.lexeme) {
            Some(name) => unsafe {
                (*function).data.name = name;
            },
            None => {
                self.error("OutOfMemoryError: string pool exhausted");
                return;
            }
        }

        self.contexts.push(FuncContext::new(function, kind));
        self.begin_scope();

        self.consume(TokenKind::LeftParen, "Expected ( after function name");
        if !self.check(TokenKind::RightParen) {
            loop {
                unsafe {
                    if (*function).data.arity == u8::MAX {
                        self.error_at_current("Can't have more than 255 parameters");
                    } else {
                        (*function).data.arity += 1;
                    }
                }
                let constant = self.parse_variable("Expected parameter name");
                self.define_variable(constant);
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expected ) after parameters");
        self.consume(TokenKind::LeftBrace, "Expected { before function body");
        self.block();

        // no end_scope: popping the context discards its locals wholesale
        let (function, upvalues) = self.end_context();
        let constant = self.make_constant(Value::obj(function));
        self.emit_op_byte(OpCode::Closure, constant);

        for upvalue in upvalues {
            self.emit_byte(upvalue.is_local as u8);
            self.emit_byte(upvalue.index);
        }
    }

    fn print_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expected ; after value");
        self.emit_op(OpCode::Print);
    }

    fn expression_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expected ; after expression");
        self.emit_op(OpCode::Pop);
    }

    fn return_statement(&mut self) {
        if self.contexts.last().unwrap().kind == FunctionKind::Script {
            self.error("Can't return from top-level code");
        }

        if self.match_token(TokenKind::Semicolon) {
            self.emit_return();
        } else {
            self.expression();
            self.consume(TokenKind::Semicolon, "Expected ; after return value");
            self.emit_op(OpCode::Return);
        }
    }

    // 两个分支都恰好弹一次条件值
    fn if_statement(&mut self) {
        self.consume(TokenKind::LeftParen, "Expected ( before if condition");
        self.expression();
        self.consume(TokenKind::RightParen, "Expected ) after if condition");

        let then_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.statement();
        let else_jump = self.emit_jump(OpCode::Jump);

        self.patch_jump(then_jump);
        self.emit_op(OpCode::Pop);
        if self.match_token(TokenKind::Else) {
            self.statement();
        }
        self.patch_jump(else_jump);
    }

    fn while_statement(&mut self) {
        let loop_start = self.current_chunk().code.len();

        self.consume(TokenKind::LeftParen, "Expected ( before while condition");
        self.expression();
        self.consume(TokenKind::RightParen, "Expected ) after while condition");

        let exit_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.statement();
        self.emit_loop(loop_start);

        self.patch_jump(exit_jump);
        self.emit_op(OpCode::Pop);
    }

    /// Desugars onto the same jump primitives as `while`; the increment
    /// clause runs after the body via a jump over it and a loop back.
    fn for_statement(&mut self) {
        self.begin_scope();
        self.consume(TokenKind::LeftParen, "Expected ( after for");

        // initializer
        if self.match_token(TokenKind::Semicolon) {
            // none
        } else if self.match_token(TokenKind::Var) {
            self.var_declaration();
        } else {
            self.expression_statement();
        }

        let mut loop_start = self.current_chunk().code.len();

        // condition
        let mut exit_jump = None;
        if !self.match_token(TokenKind::Semicolon) {
            self.expression();
            self.consume(TokenKind::Semicolon, "Expected ; after loop condition");

            exit_jump = Some(self.emit_jump(OpCode::JumpIfFalse));
            self.emit_op(OpCode::Pop);
        }

        // increment
        if !self.match_token(TokenKind::RightParen) {
            let body_jump = self.emit_jump(OpCode::Jump);
            let increment_start = self.current_chunk().code.len();

            self.expression();
            self.emit_op(OpCode::Pop);
            self.consume(TokenKind::RightParen, "Expected ) after for clauses");

            self.emit_loop(loop_start);
            loop_start = increment_start;
            self.patch_jump(body_jump);
        }

        self.statement();
        self.emit_loop(loop_start);

        if let Some(exit_jump) = exit_jump {
            self.patch_jump(exit_jump);
            self.emit_op(OpCode::Pop);
        }

        self.end_scope();
    }
}
