//! # Compiler
//!
//! A recursive-descent, Pratt-style expression compiler that emits bytecode
//! directly into the arena as it parses — there is no separate AST. Local
//! peephole rewrites (literal narrowing, unary-minus folding, fetch-then-
//! store to a direct store) keep the emitted code close to what a human
//! assembler-writer would produce.

use std::io::{Read, Write};

use crate::arena::{Arena, Binding, NameKind, W, X};
use crate::assembler::Assembler;
use crate::bytecode::Opcode;
use crate::error::{Complaint, ComplaintKind, Latch};
use crate::lexer::{Lexer, Token};
use crate::native::NativeTable;
use crate::primitives;
use crate::vm;

/// What a compiled top-level command turned out to be.
#[derive(Debug, PartialEq)]
pub enum CommandOutcome {
    /// `let`/`fun` bound a name permanently.
    Definition,
    /// `forget` removed a definition.
    Forgotten,
    /// A bare expression was evaluated; carries its result.
    Value(W),
    /// Only whitespace/newlines were consumed; nothing to do.
    Nothing,
}

/// Binding power of a binary operator token. `assoc_right` controls whether
/// the recursive call uses the same precedence (right-assoc) or one more
/// (left-assoc).
fn binop_info(tok: &Token) -> Option<(u8, bool)> {
    Some(match tok {
        Token::Semi => (1, false),
        Token::Colon => (3, true),
        Token::Amp | Token::Pipe | Token::Caret => (5, false),
        Token::Lt | Token::Eq => (7, false),
        Token::Plus | Token::Minus => (9, false),
        Token::Star | Token::Slash | Token::Percent => (11, false),
        _ => return None,
    })
}

fn starts_factor(tok: &Token) -> bool {
    matches!(
        tok,
        Token::Number(_)
            | Token::Ident(_)
            | Token::Str(_)
            | Token::If
            | Token::Star
            | Token::Minus
            | Token::LParen
    )
}

pub struct Compiler<R: Read> {
    lexer: Lexer<R>,
    cur: Token,
    asm: Assembler,
}

impl<R: Read> Compiler<R> {
    pub fn new(source: R) -> Self {
        let mut lexer = Lexer::new(source);
        let mut dummy = Latch::new();
        let cur = lexer.next(&mut dummy);
        Compiler { lexer, cur, asm: Assembler::new() }
    }

    pub fn at_eof(&self) -> bool {
        self.cur == Token::Eof
    }

    /// After a complaint has been latched, discard whatever is left of the
    /// current input line and consume the newline that ends it, so the next
    /// call to `compile_command` starts clean on the following line (see
    /// SPEC_FULL.md §7: "flushes the rest of the current input line,
    /// consumes the next token, and continues"). `latch` is expected to
    /// already be raised; further lexical complaints encountered while
    /// skipping are no-ops against an already-latched `Latch`.
    pub fn recover_after_complaint(&mut self, latch: &mut Latch) {
        while !matches!(self.cur, Token::Newline | Token::Eof) {
            self.advance(latch);
        }
        if self.cur == Token::Newline {
            self.advance(latch);
        }
    }

    fn advance(&mut self, latch: &mut Latch) {
        self.cur = self.lexer.next(latch);
    }

    fn expect(&mut self, tok: Token, msg: &'static str, latch: &mut Latch) {
        if self.cur == tok {
            self.advance(latch);
        } else {
            latch.raise(Complaint::new(ComplaintKind::Syntactic, msg));
        }
    }

    fn skip_newlines(&mut self, latch: &mut Latch) {
        while self.cur == Token::Newline || self.cur == Token::Semi {
            self.advance(latch);
        }
    }

    /// Skip `Newline` tokens only (not `Semi`), for use inside an
    /// expression: a line break in the middle of a parenthesized expression
    /// or an `if`/`then`/`else` is just whitespace, unlike the `Newline`
    /// that terminates a top-level command.
    fn skip_inner_newlines(&mut self, latch: &mut Latch) {
        while self.cur == Token::Newline {
            self.advance(latch);
        }
    }

    /// Raise "Unexpected trailing token" unless the current token ends the
    /// command (`Newline` or `Eof`). Called once per top-level production
    /// after its grammar is otherwise satisfied.
    fn expect_end_of_command(&mut self, latch: &mut Latch) {
        if latch.is_raised() {
            return;
        }
        if !matches!(self.cur, Token::Newline | Token::Eof) {
            latch.raise(Complaint::new(ComplaintKind::Syntactic, "Unexpected trailing token"));
        }
    }

    // ---- literal/peephole helpers --------------------------------------

    fn emit_int_literal(&mut self, arena: &mut Arena, latch: &mut Latch, v: i32) {
        if let Ok(b) = i8::try_from(v) {
            self.asm.gen_sbyte(arena, Opcode::PushB, b, latch);
        } else if let Ok(s) = i16::try_from(v) {
            self.asm.gen_sshort(arena, Opcode::PushW, s, latch);
        } else {
            self.asm.gen_value(arena, Opcode::Push, v, latch);
        }
    }

    /// If the most recently emitted instruction is a literal push with
    /// nothing appended after it, return its opcode and the offset of its
    /// immediate operand so the unary-minus peephole can rewrite it.
    fn trailing_literal(&self, arena: &Arena) -> Option<(Opcode, usize)> {
        let off = self.asm.prev_instruc()?;
        let op = Opcode::from_byte(arena.byte_at(off))?;
        let width = op.operand_width();
        if off + 1 + width != arena.code_idx() {
            return None;
        }
        match op {
            Opcode::Push | Opcode::PushW | Opcode::PushB => Some((op, off + 1)),
            _ => None,
        }
    }

    /// If the LHS just compiled is exactly `GLOBAL_FETCH X`, return enough
    /// information for assignment compilation to rewind and rewrite it into
    /// a `GLOBAL_STORE`. Any other LHS (including a pointer dereference) is
    /// "Not an l-value" — see spec.md §4.3.
    fn lvalue(&self, arena: &Arena) -> Option<LValue> {
        let off = self.asm.prev_instruc()?;
        let op = Opcode::from_byte(arena.byte_at(off))?;
        match op {
            Opcode::GlobalFetch if off + 1 + std::mem::size_of::<X>() == arena.code_idx() => {
                let addr = arena.fetch_x(off + 1);
                Some(LValue::Global { instr_start: off, addr })
            }
            _ => None,
        }
    }

    // ---- expressions -----------------------------------------------------

    /// Parse and compile a full expression, absorbing operators with
    /// binding power >= `min_prec`.
    pub fn parse_expr(&mut self, arena: &mut Arena, latch: &mut Latch, min_prec: u8) {
        self.parse_factor(arena, latch);
        loop {
            if latch.is_raised() {
                return;
            }
            let (prec, right_assoc) = match binop_info(&self.cur) {
                Some(info) => info,
                None => return,
            };
            if prec < min_prec {
                return;
            }
            if self.cur == Token::Colon {
                self.advance(latch);
                self.skip_inner_newlines(latch);
                self.compile_assignment(arena, latch, prec);
                continue;
            }
            let op = self.cur.clone();
            self.advance(latch);
            self.skip_inner_newlines(latch);
            if op == Token::Semi {
                self.asm.gen(arena, Opcode::Pop, latch);
                self.parse_expr(arena, latch, prec + 1);
                continue;
            }
            let next_min = if right_assoc { prec } else { prec + 1 };
            self.parse_expr(arena, latch, next_min);
            let opcode = match op {
                Token::Amp => Opcode::And,
                Token::Pipe => Opcode::Or,
                Token::Caret => Opcode::Xor,
                Token::Lt => Opcode::Lt,
                Token::Eq => Opcode::Eq,
                Token::Plus => Opcode::Add,
                Token::Minus => Opcode::Sub,
                Token::Star => Opcode::Mul,
                Token::Slash => Opcode::Div,
                Token::Percent => Opcode::Mod,
                _ => unreachable!("binop_info and this match must agree"),
            };
            self.asm.gen(arena, opcode, latch);
        }
    }

    fn compile_assignment(&mut self, arena: &mut Arena, latch: &mut Latch, prec: u8) {
        match self.lvalue(arena) {
            Some(LValue::Global { instr_start, addr }) => {
                arena.set_code_idx(instr_start);
                self.asm.block_prev();
                self.parse_expr(arena, latch, prec);
                self.asm.gen_ushort(arena, Opcode::GlobalStore, addr, latch);
            }
            None => {
                latch.raise(Complaint::new(ComplaintKind::Syntactic, "Not an l-value"));
            }
        }
    }

    fn parse_factor(&mut self, arena: &mut Arena, latch: &mut Latch) {
        if latch.is_raised() {
            return;
        }
        self.skip_inner_newlines(latch);
        match self.cur.clone() {
            Token::Number(v) => {
                self.advance(latch);
                self.emit_int_literal(arena, latch, v);
            }
            Token::Str(bytes) => {
                self.advance(latch);
                self.asm.gen(arena, Opcode::PushString, latch);
                arena.emit_bytes(&bytes, latch);
                arena.emit_byte(0, latch);
            }
            Token::Minus => {
                self.advance(latch);
                self.parse_factor(arena, latch);
                if latch.is_raised() {
                    return;
                }
                if let Some((op, operand_off)) = self.trailing_literal(arena) {
                    match op {
                        Opcode::PushB => {
                            let v = arena.byte_at(operand_off) as i8;
                            arena.set_byte_at(operand_off, (-(v as i32)) as u8);
                        }
                        Opcode::PushW => {
                            let v = arena.fetch_i(operand_off);
                            arena.write_i(operand_off, -v);
                        }
                        Opcode::Push => {
                            let v = arena.fetch_w(operand_off);
                            arena.write_w(operand_off, -v);
                        }
                        _ => unreachable!(),
                    }
                } else {
                    self.asm.gen(arena, Opcode::Negate, latch);
                }
            }
            Token::Star => {
                self.advance(latch);
                self.parse_factor(arena, latch);
                self.asm.gen(arena, Opcode::RefB, latch);
            }
            Token::LParen => {
                self.advance(latch);
                self.parse_expr(arena, latch, 1);
                self.expect(Token::RParen, "Expected ')'", latch);
            }
            Token::If => {
                self.advance(latch);
                self.parse_expr(arena, latch, 1);
                let r_branch = self.asm.forward_ref(arena, Opcode::Branch, latch);
                self.skip_inner_newlines(latch);
                self.expect(Token::Then, "Expected 'then'", latch);
                self.parse_expr(arena, latch, 1);
                let r_jump = self.asm.forward_ref(arena, Opcode::Jump, latch);
                self.asm.resolve(arena, r_branch);
                self.skip_inner_newlines(latch);
                self.expect(Token::Else, "Expected 'else'", latch);
                self.parse_expr(arena, latch, 1);
                self.asm.resolve(arena, r_jump);
                self.asm.block_prev();
            }
            Token::Ident(name) => {
                self.advance(latch);
                self.compile_ident_factor(arena, latch, &name);
            }
            _ => {
                latch.raise(Complaint::new(ComplaintKind::Syntactic, "Expected factor"));
            }
        }
    }

    fn compile_ident_factor(&mut self, arena: &mut Arena, latch: &mut Latch, name: &[u8]) {
        if let Some(h) = arena.lookup(name) {
            match h.kind {
                NameKind::Global => {
                    let addr = match h.binding {
                        Binding::Index(x) => x,
                        _ => unreachable!(),
                    };
                    self.asm.gen_ushort(arena, Opcode::GlobalFetch, addr, latch);
                }
                NameKind::Local => {
                    let idx = match h.binding {
                        Binding::Index(x) => x as u8,
                        _ => unreachable!(),
                    };
                    match idx {
                        0 => self.asm.gen(arena, Opcode::LocalFetch0, latch),
                        1 => self.asm.gen(arena, Opcode::LocalFetch1, latch),
                        n => self.asm.gen_ubyte(arena, Opcode::LocalFetch, n, latch),
                    }
                }
                NameKind::Procedure => {
                    let body_off = match h.binding {
                        Binding::Index(x) => x as usize,
                        _ => unreachable!(),
                    };
                    let arity = arena.byte_at(body_off);
                    self.compile_call_args(arena, latch, arity);
                    self.asm.gen_ushort(arena, Opcode::Call, body_off as X, latch);
                }
                NameKind::CFunction => {
                    let body_off = match h.binding {
                        Binding::Index(x) => x as usize,
                        _ => unreachable!(),
                    };
                    let arity = arena.byte_at(body_off);
                    self.compile_call_args(arena, latch, arity);
                    self.asm.gen_ushort(arena, Opcode::CCall, body_off as X, latch);
                }
                NameKind::Primitive => unreachable!("primitives live in the static table, not the arena"),
            }
            return;
        }
        if let Some(p) = primitives::lookup(name) {
            self.compile_call_args(arena, latch, p.arity);
            self.asm.gen(arena, p.opcode, latch);
            return;
        }
        latch.raise(Complaint::new(ComplaintKind::Semantic, "Unknown identifier"));
    }

    fn compile_call_args(&mut self, arena: &mut Arena, latch: &mut Latch, arity: u8) {
        for _ in 0..arity {
            if latch.is_raised() {
                return;
            }
            if !starts_factor(&self.cur) {
                latch.raise(Complaint::new(ComplaintKind::Syntactic, "Expected factor"));
                return;
            }
            self.parse_factor(arena, latch);
        }
    }

    // ---- top-level commands ----------------------------------------------

    /// Compile (and, for `let` initializers and bare expressions, execute)
    /// one top-level command. Returns `None` if a complaint was latched;
    /// the driver is responsible for reading and clearing it.
    pub fn compile_command(
        &mut self,
        arena: &mut Arena,
        natives: &mut NativeTable,
        device_in: &mut dyn Read,
        device_out: &mut dyn Write,
        latch: &mut Latch,
    ) -> Option<CommandOutcome> {
        self.skip_newlines(latch);
        if self.cur == Token::Eof {
            return Some(CommandOutcome::Nothing);
        }
        self.asm.block_prev();
        let outcome = match self.cur.clone() {
            Token::Let => {
                self.advance(latch);
                self.compile_let(arena, natives, device_in, device_out, latch)
            }
            Token::Fun => {
                self.advance(latch);
                self.compile_fun(arena, latch)
            }
            Token::Forget => {
                self.advance(latch);
                self.compile_forget(arena, latch)
            }
            _ => self.compile_scratch_expr(arena, natives, device_in, device_out, latch),
        };
        if latch.is_raised() {
            return None;
        }
        Some(outcome)
    }

    fn compile_let(
        &mut self,
        arena: &mut Arena,
        natives: &mut NativeTable,
        device_in: &mut dyn Read,
        device_out: &mut dyn Write,
        latch: &mut Latch,
    ) -> CommandOutcome {
        let name = match self.cur.clone() {
            Token::Ident(n) => n,
            _ => {
                latch.raise(Complaint::new(ComplaintKind::Syntactic, "Expected identifier"));
                return CommandOutcome::Nothing;
            }
        };
        self.advance(latch);
        let cell_off = arena.code_idx();
        arena.emit_w(0, latch);
        if latch.is_raised() {
            return CommandOutcome::Nothing;
        }
        arena.bind(&name, NameKind::Global, Binding::Index(cell_off as X), latch);
        if self.cur == Token::Eq {
            self.advance(latch);
            let scratch_start = arena.code_idx();
            self.asm.block_prev();
            self.parse_expr(arena, latch, 1);
            self.asm.gen_ushort(arena, Opcode::GlobalStore, cell_off as X, latch);
            self.asm.gen(arena, Opcode::Pop, latch);
            self.asm.gen(arena, Opcode::Halt, latch);
            if !latch.is_raised() {
                vm::run(arena, natives, scratch_start, device_in, device_out, latch);
            }
            arena.set_code_idx(scratch_start);
        }
        CommandOutcome::Definition
    }

    fn compile_fun(&mut self, arena: &mut Arena, latch: &mut Latch) -> CommandOutcome {
        let code0 = arena.code_idx();
        let dict0 = arena.dict_idx();
        let name = match self.cur.clone() {
            Token::Ident(n) => n,
            _ => {
                latch.raise(Complaint::new(ComplaintKind::Syntactic, "Expected identifier"));
                return CommandOutcome::Nothing;
            }
        };
        self.advance(latch);
        let body_off = arena.code_idx();
        arena.bind(&name, NameKind::Procedure, Binding::Index(body_off as X), latch);
        let dict_after_name = arena.dict_idx();

        let mut arity: u8 = 0;
        loop {
            match self.cur.clone() {
                Token::Ident(pname) => {
                    self.advance(latch);
                    arena.bind(&pname, NameKind::Local, Binding::Index(arity as X), latch);
                    arity += 1;
                    if latch.is_raised() {
                        break;
                    }
                }
                Token::Eq => break,
                _ => {
                    latch.raise(Complaint::new(ComplaintKind::Syntactic, "Expected '='"));
                    break;
                }
            }
        }
        if !latch.is_raised() {
            self.expect(Token::Eq, "Expected '='", latch);
        }
        arena.emit_byte(arity, latch);
        self.asm.block_prev();
        if !latch.is_raised() {
            self.parse_expr(arena, latch, 1);
        }
        self.expect_end_of_command(latch);
        self.asm.gen(arena, Opcode::Return, latch);

        if latch.is_raised() {
            arena.rewind(code0, dict0);
        } else {
            arena.set_dict_idx(dict_after_name);
        }
        CommandOutcome::Definition
    }

    fn compile_forget(&mut self, arena: &mut Arena, latch: &mut Latch) -> CommandOutcome {
        let name = match self.cur.clone() {
            Token::Ident(n) => n,
            _ => {
                latch.raise(Complaint::new(ComplaintKind::Syntactic, "Expected identifier"));
                return CommandOutcome::Nothing;
            }
        };
        self.advance(latch);
        self.expect_end_of_command(latch);
        if !latch.is_raised() {
            match arena.lookup(&name) {
                Some(h) if matches!(h.kind, NameKind::Global | NameKind::Procedure | NameKind::CFunction) => {
                    let offset = h.offset.expect("dictionary header always has an offset");
                    let header_size = arena.header_size_at(offset);
                    let new_dict_idx = offset + header_size;
                    let new_code_idx = match h.binding {
                        Binding::Index(x) => x as usize,
                        _ => unreachable!(),
                    };
                    if new_code_idx > new_dict_idx {
                        latch.raise(Complaint::new(ComplaintKind::Resource, "Dictionary corrupted"));
                    } else {
                        arena.rewind(new_code_idx, new_dict_idx);
                    }
                }
                Some(_) => {
                    latch.raise(Complaint::new(ComplaintKind::Semantic, "Not a definition"));
                }
                None => {
                    latch.raise(Complaint::new(ComplaintKind::Semantic, "Unknown identifier"));
                }
            }
        }
        CommandOutcome::Forgotten
    }

    fn compile_scratch_expr(
        &mut self,
        arena: &mut Arena,
        natives: &mut NativeTable,
        device_in: &mut dyn Read,
        device_out: &mut dyn Write,
        latch: &mut Latch,
    ) -> CommandOutcome {
        let start = arena.code_idx();
        self.asm.block_prev();
        self.parse_expr(arena, latch, 1);
        self.expect_end_of_command(latch);
        self.asm.gen(arena, Opcode::Halt, latch);
        if latch.is_raised() {
            arena.set_code_idx(start);
            return CommandOutcome::Nothing;
        }
        let result = vm::run(arena, natives, start, device_in, device_out, latch);
        arena.set_code_idx(start);
        match result {
            Some(v) if !latch.is_raised() => CommandOutcome::Value(v),
            _ => CommandOutcome::Nothing,
        }
    }
}

enum LValue {
    Global { instr_start: usize, addr: X },
}
