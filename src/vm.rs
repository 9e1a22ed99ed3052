//! # Stack-based bytecode virtual machine
//!
//! The VM executes bytecode in place, inside the same [`Arena`] the
//! compiler just wrote it into. The operand stack is not a separate Rust
//! `Vec` — it is a region of the arena's own bytes, growing downward from
//! just below the dictionary, word-aligned. This mirrors the source's
//! single shared memory region exactly (see SPEC_FULL.md §3, "Operand stack
//! frame").
//!
//! ## Fetch-decode-execute
//! The main loop reads one opcode byte at `pc`, dispatches on it, and
//! either falls through to a generic "advance past the operand" step or
//! (for control-flow opcodes) sets `pc` itself and `continue`s. Arithmetic,
//! comparison, and bitwise opcodes are delegated to [`ops_arith`]; memory
//! and I/O opcodes to [`ops_mem`]; calls, returns, and branches to
//! [`ops_control`].
//!
//! ## Runtime tail-call rewriting
//! A `CALL` whose return address resolves (after skipping any `JUMP`
//! chain) straight to a `RETURN` is rewritten in place to `TCALL` the first
//! time it executes, then re-dispatched — see `Opcode::Call` below and
//! SPEC_FULL.md §4.5.

use std::io::{Read, Write};

use crate::arena::{Arena, CP_OFFSET, DP_OFFSET, SIZE_W, SIZE_X, W};
use crate::bytecode::{self, Opcode};
use crate::error::{Complaint, ComplaintKind, Latch};
use crate::native::NativeTable;

mod ops_arith;
mod ops_control;
mod ops_mem;
#[cfg(test)]
mod tests;

/// The operand stack: a pair of cursors (`sp`, `bp`) into the arena's own
/// byte buffer, plus the boundary (`code_end`) the stack must not cross.
pub(super) struct Stack {
    sp: usize,
    bp: usize,
    code_end: usize,
}

impl Stack {
    fn new(base: usize, code_end: usize) -> Self {
        Stack { sp: base, bp: base, code_end }
    }

    pub(super) fn sp(&self) -> usize {
        self.sp
    }

    pub(super) fn bp(&self) -> usize {
        self.bp
    }

    pub(super) fn code_end(&self) -> usize {
        self.code_end
    }

    pub(super) fn set_sp(&mut self, v: usize) {
        self.sp = v;
    }

    pub(super) fn set_bp(&mut self, v: usize) {
        self.bp = v;
    }

    /// Push one word, after checking it would not collide with the code
    /// region currently executing (`sp - sizeof(W) >= code_end`).
    pub(super) fn push(&mut self, arena: &mut Arena, v: W, latch: &mut Latch) {
        if let Some(addr) = self.reserve(latch) {
            arena.write_w(addr, v);
        }
    }

    /// Reserve one word of stack space without writing to it (used by
    /// `CALL`'s frame-info cell, which is written separately). Same
    /// overflow check as `push`.
    pub(super) fn reserve(&mut self, latch: &mut Latch) -> Option<usize> {
        if latch.is_raised() {
            return None;
        }
        if self.sp < self.code_end + SIZE_W {
            latch.raise(Complaint::new(ComplaintKind::Resource, "Stack overflow"));
            return None;
        }
        self.sp -= SIZE_W;
        Some(self.sp)
    }

    pub(super) fn pop(&mut self, arena: &Arena, latch: &mut Latch) -> W {
        if latch.is_raised() {
            return 0;
        }
        let v = arena.fetch_w(self.sp);
        self.sp += SIZE_W;
        v
    }

    pub(super) fn top(&self, arena: &Arena) -> W {
        arena.fetch_w(self.sp)
    }
}

/// Execute the bytecode starting at arena offset `start`, continuing until
/// `HALT` or an error. `start` must point at code already emitted into
/// `arena` (scratch expression code or a `let` initializer); it is never
/// used to enter a procedure body directly.
///
/// Returns the `HALT` result, or `None` if a [`Complaint`] was latched
/// during execution.
pub fn run(
    arena: &mut Arena,
    natives: &mut NativeTable,
    start: usize,
    device_in: &mut dyn Read,
    device_out: &mut dyn Write,
    latch: &mut Latch,
) -> Option<W> {
    // The stack must never grow into code currently executing; `code_idx`
    // is fixed for the duration of a run (compilation and execution never
    // interleave), so it is a stable boundary.
    let code_end = arena.code_idx();
    let base = (arena.dict_idx() / SIZE_W) * SIZE_W;
    let mut stack = Stack::new(base, code_end);
    let mut pc = start;

    loop {
        if latch.is_raised() {
            return None;
        }
        let opcode = match Opcode::from_byte(arena.byte_at(pc)) {
            Some(op) => op,
            None => {
                latch.raise(Complaint::new(ComplaintKind::Resource, "Dictionary corrupted"));
                return None;
            }
        };
        match opcode {
            Opcode::Halt => return Some(stack.top(arena)),

            Opcode::Push => {
                let r = pc + 1;
                let v = arena.fetch_w(r);
                stack.push(arena, v, latch);
            }
            Opcode::PushW => {
                let r = pc + 1;
                let v = arena.fetch_i(r) as W;
                stack.push(arena, v, latch);
            }
            Opcode::PushB => {
                let r = pc + 1;
                let v = arena.byte_at(r) as i8 as W;
                stack.push(arena, v, latch);
            }
            Opcode::Pop => {
                stack.pop(arena, latch);
            }
            Opcode::PushString => {
                let r = pc + 1;
                let mut len = 0usize;
                while arena.byte_at(r + len) != 0 {
                    len += 1;
                }
                stack.push(arena, r as W, latch);
                pc = r + len + 1;
                continue;
            }
            Opcode::GlobalFetch => {
                let r = pc + 1;
                let addr = arena.fetch_x(r) as usize;
                let v = match addr {
                    CP_OFFSET => arena.code_idx() as W,
                    DP_OFFSET => arena.dict_idx() as W,
                    _ => arena.fetch_w(addr),
                };
                stack.push(arena, v, latch);
            }
            Opcode::GlobalStore => {
                let r = pc + 1;
                let addr = arena.fetch_x(r) as usize;
                let v = stack.top(arena);
                arena.write_w(addr, v);
            }
            Opcode::LocalFetch0 => {
                let v = arena.fetch_w(stack.bp());
                stack.push(arena, v, latch);
            }
            Opcode::LocalFetch1 => {
                let v = arena.fetch_w(stack.bp() - SIZE_W);
                stack.push(arena, v, latch);
            }
            Opcode::LocalFetch => {
                let r = pc + 1;
                let n = arena.byte_at(r) as usize;
                let v = arena.fetch_w(stack.bp() - n * SIZE_W);
                stack.push(arena, v, latch);
            }

            Opcode::Call => {
                let r = pc + 1;
                let return_pc = r + SIZE_X;
                let target = bytecode::skip_jump_chain(arena.bytes(), return_pc);
                if Opcode::from_byte(arena.byte_at(target)) == Some(Opcode::Return) {
                    arena.set_byte_at(pc, Opcode::TCall.as_byte());
                    continue;
                }
                ops_control::handle_call(arena, &mut stack, &mut pc, r, latch);
                continue;
            }
            Opcode::TCall => {
                let r = pc + 1;
                ops_control::handle_tcall(arena, &mut stack, &mut pc, r);
                continue;
            }
            Opcode::CCall => {
                let r = pc + 1;
                ops_control::handle_ccall(arena, natives, &mut stack, r, latch);
            }
            Opcode::Return => {
                ops_control::handle_return(arena, &mut stack, &mut pc);
                continue;
            }
            Opcode::Branch => {
                let r = pc + 1;
                ops_control::handle_branch(arena, &mut stack, &mut pc, r, latch);
                continue;
            }
            Opcode::Jump => {
                let r = pc + 1;
                ops_control::handle_jump(&mut pc, r, arena);
                continue;
            }

            Opcode::Add => ops_arith::handle_add(arena, &mut stack, latch),
            Opcode::Sub => ops_arith::handle_sub(arena, &mut stack, latch),
            Opcode::Mul => ops_arith::handle_mul(arena, &mut stack, latch),
            Opcode::Div => ops_arith::handle_div(arena, &mut stack, latch),
            Opcode::Mod => ops_arith::handle_mod(arena, &mut stack, latch),
            Opcode::UMul => ops_arith::handle_umul(arena, &mut stack, latch),
            Opcode::UDiv => ops_arith::handle_udiv(arena, &mut stack, latch),
            Opcode::UMod => ops_arith::handle_umod(arena, &mut stack, latch),
            Opcode::ULt => ops_arith::handle_ult(arena, &mut stack, latch),
            Opcode::Negate => ops_arith::handle_negate(arena, &mut stack, latch),
            Opcode::Eq => ops_arith::handle_eq(arena, &mut stack, latch),
            Opcode::Lt => ops_arith::handle_lt(arena, &mut stack, latch),
            Opcode::And => ops_arith::handle_and(arena, &mut stack, latch),
            Opcode::Or => ops_arith::handle_or(arena, &mut stack, latch),
            Opcode::Xor => ops_arith::handle_xor(arena, &mut stack, latch),
            Opcode::Sla => ops_arith::handle_sla(arena, &mut stack, latch),
            Opcode::Sra => ops_arith::handle_sra(arena, &mut stack, latch),
            Opcode::Srl => ops_arith::handle_srl(arena, &mut stack, latch),

            Opcode::GetC => ops_mem::handle_getc(arena, &mut stack, device_in, latch),
            Opcode::PutC => ops_mem::handle_putc(arena, &mut stack, device_out, latch),
            Opcode::RefB => ops_mem::handle_refb(arena, &mut stack, latch),
            Opcode::RefV => ops_mem::handle_refv(arena, &mut stack, latch),
            Opcode::RefX => ops_mem::handle_refx(arena, &mut stack, latch),
            Opcode::SetV => ops_mem::handle_setv(arena, &mut stack, latch),
            Opcode::SetX => ops_mem::handle_setx(arena, &mut stack, latch),
            Opcode::SetB => ops_mem::handle_setb(arena, &mut stack, latch),
        }

        if latch.is_raised() {
            return None;
        }
        pc += 1 + opcode.operand_width();
    }
}
