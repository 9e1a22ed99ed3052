//! Calls, returns, and branches.
//!
//! A call frame is one stack cell: `(old_bp: X, return_pc: X)` packed into
//! a single `W`, sitting just below the callee's arguments. `bp` never
//! moves across a chain of tail calls — only the argument cells below it
//! are overwritten and `pc` jumps back into the callee's body — which is
//! what makes `TCALL` safe without growing the stack. See SPEC_FULL.md
//! §4.5 and §9 ("runtime tail-call rewrite").

use crate::arena::{Arena, SIZE_W, SIZE_X, W, X};
use crate::error::Latch;
use crate::native::NativeTable;

use super::Stack;

fn pack_frame(old_bp: X, return_pc: X) -> W {
    let bits = (old_bp as u32) | ((return_pc as u32) << 16);
    bits as W
}

fn unpack_frame(cell: W) -> (X, X) {
    let bits = cell as u32;
    ((bits & 0xffff) as X, (bits >> 16) as X)
}

/// `r` is the offset of `CALL`'s two-byte operand (the callee's absolute
/// code offset), already known not to be a self-tail-call (the caller in
/// `vm::run` rewrites those to `TCALL` before reaching here).
pub(super) fn handle_call(arena: &mut Arena, st: &mut Stack, pc: &mut usize, r: usize, latch: &mut Latch) {
    let body_off = arena.fetch_x(r) as usize;
    let return_pc = (r + SIZE_X) as X;
    let arity = arena.byte_at(body_off) as usize;

    let frame_info_addr = match st.reserve(latch) {
        Some(addr) => addr,
        None => return,
    };
    let packed = pack_frame(st.bp() as X, return_pc);
    arena.write_w(frame_info_addr, packed);

    let new_bp = frame_info_addr + arity * SIZE_W;
    st.set_bp(new_bp);
    *pc = body_off + 1;
}

/// Reuse the current frame: shift the `arity` freshly-pushed argument cells
/// down into the slots the old arguments occupied (`bp[-(n-1)] .. bp[0]`),
/// then resume the callee's body at its own `bp`. No new frame-info cell is
/// written — the existing one (still valid, since `bp` is unchanged) is
/// reused as-is.
pub(super) fn handle_tcall(arena: &mut Arena, st: &mut Stack, pc: &mut usize, r: usize) {
    let body_off = arena.fetch_x(r) as usize;
    let arity = arena.byte_at(body_off) as usize;
    let bp = st.bp();
    let sp = st.sp();

    for i in 0..arity {
        let src = sp + i * SIZE_W;
        let dst = bp - (arity - 1 - i) * SIZE_W;
        let v = arena.fetch_w(src);
        arena.write_w(dst, v);
    }
    st.set_sp(bp - arity * SIZE_W);
    *pc = body_off + 1;
}

/// The callee's body always leaves exactly one result at the current stack
/// top; the frame-info cell sits immediately below it regardless of arity.
pub(super) fn handle_return(arena: &mut Arena, st: &mut Stack, pc: &mut usize) {
    let sp = st.sp();
    let result = arena.fetch_w(sp);
    let frame_info_addr = sp + SIZE_W;
    let packed = arena.fetch_w(frame_info_addr);
    let (old_bp, return_pc) = unpack_frame(packed);
    let bp = st.bp();

    arena.write_w(bp, result);
    st.set_sp(bp);
    st.set_bp(old_bp as usize);
    *pc = return_pc as usize;
}

/// `BRANCH`'s operand is a displacement from the offset of the operand
/// itself: taken, `pc = r + disp`; not taken, `pc = r + sizeof(X)` (i.e.
/// fall through to the instruction right after the operand).
pub(super) fn handle_branch(arena: &Arena, st: &mut Stack, pc: &mut usize, r: usize, latch: &mut Latch) {
    let cond = st.pop(arena, latch);
    if latch.is_raised() {
        return;
    }
    if cond == 0 {
        let disp = arena.fetch_x(r) as usize;
        *pc = r + disp;
    } else {
        *pc = r + SIZE_X;
    }
}

pub(super) fn handle_jump(pc: &mut usize, r: usize, arena: &Arena) {
    let disp = arena.fetch_x(r) as usize;
    *pc = r + disp;
}

/// `CCALL`'s operand is the absolute offset of the cfunction body: one
/// arity byte followed by a native-table index (the "opaque pointer"
/// cell). Arguments are popped left-to-right (leftmost argument deepest on
/// the stack, matching the ordinary call-argument layout) and the host
/// function's single result is pushed.
pub(super) fn handle_ccall(
    arena: &mut Arena,
    natives: &mut NativeTable,
    st: &mut Stack,
    r: usize,
    latch: &mut Latch,
) {
    let body_off = arena.fetch_x(r) as usize;
    let arity = arena.byte_at(body_off) as usize;
    let idx = arena.fetch_p(body_off + 1);

    let sp = st.sp();
    let mut args = Vec::with_capacity(arity);
    for k in 0..arity {
        let addr = sp + (arity - 1 - k) * SIZE_W;
        args.push(arena.fetch_w(addr));
    }
    st.set_sp(sp + arity * SIZE_W);

    let result = natives.call(idx, &args);
    st.push(arena, result, latch);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_packs_and_unpacks() {
        let packed = pack_frame(1234, 56789);
        assert_eq!(unpack_frame(packed), (1234, 56789));
    }
}
