//! # Assembler
//!
//! Thin code-emission helpers shared by the compiler: one function per
//! opcode/operand shape, plus the bookkeeping the compiler's peephole
//! rewrites depend on (`prev_instruc`, forward references).

use crate::arena::{Arena, X};
use crate::bytecode::Opcode;
use crate::error::Latch;

/// Tracks the offset of the most recently emitted opcode within the current
/// straight-line run, so the compiler's peephole rewrites know what they may
/// still rewrite in place. `None` means "unknown" — a control-flow join has
/// been crossed and nothing before it may be touched.
#[derive(Default)]
pub struct Assembler {
    prev_instruc: Option<usize>,
}

impl Assembler {
    pub fn new() -> Self {
        Assembler { prev_instruc: None }
    }

    pub fn prev_instruc(&self) -> Option<usize> {
        self.prev_instruc
    }

    /// Clear peephole eligibility across a control-flow join (only called
    /// at `if/then/else` resolution, matching the original exactly — see
    /// DESIGN.md Open Question (d)).
    pub fn block_prev(&mut self) {
        self.prev_instruc = None;
    }

    /// Emit an opcode with no operand, recording it as the new
    /// `prev_instruc`.
    pub fn gen(&mut self, arena: &mut Arena, op: Opcode, latch: &mut Latch) {
        self.prev_instruc = Some(arena.code_idx());
        arena.emit_byte(op.as_byte(), latch);
    }

    /// Emit an opcode followed by operand bytes, recording the opcode's
    /// offset as `prev_instruc`. Operand emission never updates
    /// `prev_instruc` itself.
    pub fn gen_ubyte(&mut self, arena: &mut Arena, op: Opcode, b: u8, latch: &mut Latch) {
        self.prev_instruc = Some(arena.code_idx());
        arena.emit_byte(op.as_byte(), latch);
        arena.emit_byte(b, latch);
    }

    pub fn gen_sbyte(&mut self, arena: &mut Arena, op: Opcode, b: i8, latch: &mut Latch) {
        self.gen_ubyte(arena, op, b as u8, latch);
    }

    pub fn gen_ushort(&mut self, arena: &mut Arena, op: Opcode, x: X, latch: &mut Latch) {
        self.prev_instruc = Some(arena.code_idx());
        arena.emit_byte(op.as_byte(), latch);
        arena.emit_x(x, latch);
    }

    pub fn gen_sshort(&mut self, arena: &mut Arena, op: Opcode, v: i16, latch: &mut Latch) {
        self.prev_instruc = Some(arena.code_idx());
        arena.emit_byte(op.as_byte(), latch);
        arena.emit_i(v, latch);
    }

    pub fn gen_value(&mut self, arena: &mut Arena, op: Opcode, v: i32, latch: &mut Latch) {
        self.prev_instruc = Some(arena.code_idx());
        arena.emit_byte(op.as_byte(), latch);
        arena.emit_w(v, latch);
    }

    /// Emit a cfunction call: opcode, then the native-function table index
    /// packed as `X` (the "opaque pointer" cell, narrowed to 16 bits since
    /// this implementation never registers more than 65535 natives).
    pub fn gen_pointer(&mut self, arena: &mut Arena, op: Opcode, idx: X, latch: &mut Latch) {
        self.gen_ushort(arena, op, idx, latch);
    }

    /// Emit an opcode and a zero-filled 2-byte placeholder for a forward
    /// branch target, returning the placeholder's offset so `resolve` can
    /// patch it later.
    pub fn forward_ref(&mut self, arena: &mut Arena, op: Opcode, latch: &mut Latch) -> usize {
        self.prev_instruc = Some(arena.code_idx());
        arena.emit_byte(op.as_byte(), latch);
        let r = arena.code_idx();
        arena.emit_x(0, latch);
        r
    }

    /// Patch the placeholder at `r` (as returned by `forward_ref`) with the
    /// displacement from `r` to the current code cursor.
    pub fn resolve(&mut self, arena: &mut Arena, r: usize) {
        let target = (arena.code_idx() - r) as X;
        arena.write_x(r, target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{AlignPolicy, DEFAULT_CAPACITY};
    use crate::error::Latch;

    #[test]
    fn gen_records_prev_instruc() {
        let mut arena = Arena::new(DEFAULT_CAPACITY, AlignPolicy::Unaligned);
        let mut latch = Latch::new();
        let mut asm = Assembler::new();
        let at = arena.code_idx();
        asm.gen(&mut arena, Opcode::Halt, &mut latch);
        assert_eq!(asm.prev_instruc(), Some(at));
    }

    #[test]
    fn forward_ref_resolves_to_displacement() {
        let mut arena = Arena::new(DEFAULT_CAPACITY, AlignPolicy::Unaligned);
        let mut latch = Latch::new();
        let mut asm = Assembler::new();
        let r = asm.forward_ref(&mut arena, Opcode::Branch, &mut latch);
        asm.gen(&mut arena, Opcode::Halt, &mut latch);
        let before = arena.code_idx();
        asm.resolve(&mut arena, r);
        assert_eq!(arena.fetch_x(r) as usize, before - r);
    }

    #[test]
    fn block_prev_clears_eligibility() {
        let mut arena = Arena::new(DEFAULT_CAPACITY, AlignPolicy::Unaligned);
        let mut latch = Latch::new();
        let mut asm = Assembler::new();
        asm.gen(&mut arena, Opcode::Halt, &mut latch);
        assert!(asm.prev_instruc().is_some());
        asm.block_prev();
        assert!(asm.prev_instruc().is_none());
    }
}
