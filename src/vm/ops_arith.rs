//! Arithmetic, comparison, and bitwise opcode handlers.
//!
//! Each handler pops its operands (rightmost/top first), computes, and
//! pushes exactly one result word — the same shape as every other
//! expression-producing opcode.

use crate::arena::{Arena, U, W};
use crate::error::{Complaint, ComplaintKind, Latch};

use super::Stack;

pub(super) fn handle_add(arena: &mut Arena, st: &mut Stack, latch: &mut Latch) {
    let b = st.pop(arena, latch);
    let a = st.pop(arena, latch);
    st.push(arena, a.wrapping_add(b), latch);
}

pub(super) fn handle_sub(arena: &mut Arena, st: &mut Stack, latch: &mut Latch) {
    let b = st.pop(arena, latch);
    let a = st.pop(arena, latch);
    st.push(arena, a.wrapping_sub(b), latch);
}

pub(super) fn handle_mul(arena: &mut Arena, st: &mut Stack, latch: &mut Latch) {
    let b = st.pop(arena, latch);
    let a = st.pop(arena, latch);
    st.push(arena, a.wrapping_mul(b), latch);
}

pub(super) fn handle_div(arena: &mut Arena, st: &mut Stack, latch: &mut Latch) {
    let b = st.pop(arena, latch);
    let a = st.pop(arena, latch);
    if b == 0 {
        latch.raise(Complaint::new(ComplaintKind::Resource, "Division by zero"));
        return;
    }
    st.push(arena, a.wrapping_div(b), latch);
}

pub(super) fn handle_mod(arena: &mut Arena, st: &mut Stack, latch: &mut Latch) {
    let b = st.pop(arena, latch);
    let a = st.pop(arena, latch);
    if b == 0 {
        latch.raise(Complaint::new(ComplaintKind::Resource, "Division by zero"));
        return;
    }
    st.push(arena, a.wrapping_rem(b), latch);
}

pub(super) fn handle_umul(arena: &mut Arena, st: &mut Stack, latch: &mut Latch) {
    let b = st.pop(arena, latch) as U;
    let a = st.pop(arena, latch) as U;
    st.push(arena, a.wrapping_mul(b) as W, latch);
}

pub(super) fn handle_udiv(arena: &mut Arena, st: &mut Stack, latch: &mut Latch) {
    let b = st.pop(arena, latch) as U;
    let a = st.pop(arena, latch) as U;
    if b == 0 {
        latch.raise(Complaint::new(ComplaintKind::Resource, "Division by zero"));
        return;
    }
    st.push(arena, (a / b) as W, latch);
}

pub(super) fn handle_umod(arena: &mut Arena, st: &mut Stack, latch: &mut Latch) {
    let b = st.pop(arena, latch) as U;
    let a = st.pop(arena, latch) as U;
    if b == 0 {
        latch.raise(Complaint::new(ComplaintKind::Resource, "Division by zero"));
        return;
    }
    st.push(arena, (a % b) as W, latch);
}

pub(super) fn handle_ult(arena: &mut Arena, st: &mut Stack, latch: &mut Latch) {
    let b = st.pop(arena, latch) as U;
    let a = st.pop(arena, latch) as U;
    st.push(arena, (a < b) as W, latch);
}

pub(super) fn handle_negate(arena: &mut Arena, st: &mut Stack, latch: &mut Latch) {
    let a = st.pop(arena, latch);
    st.push(arena, a.wrapping_neg(), latch);
}

pub(super) fn handle_eq(arena: &mut Arena, st: &mut Stack, latch: &mut Latch) {
    let b = st.pop(arena, latch);
    let a = st.pop(arena, latch);
    st.push(arena, (a == b) as W, latch);
}

pub(super) fn handle_lt(arena: &mut Arena, st: &mut Stack, latch: &mut Latch) {
    let b = st.pop(arena, latch);
    let a = st.pop(arena, latch);
    st.push(arena, (a < b) as W, latch);
}

pub(super) fn handle_and(arena: &mut Arena, st: &mut Stack, latch: &mut Latch) {
    let b = st.pop(arena, latch);
    let a = st.pop(arena, latch);
    st.push(arena, a & b, latch);
}

pub(super) fn handle_or(arena: &mut Arena, st: &mut Stack, latch: &mut Latch) {
    let b = st.pop(arena, latch);
    let a = st.pop(arena, latch);
    st.push(arena, a | b, latch);
}

pub(super) fn handle_xor(arena: &mut Arena, st: &mut Stack, latch: &mut Latch) {
    let b = st.pop(arena, latch);
    let a = st.pop(arena, latch);
    st.push(arena, a ^ b, latch);
}

pub(super) fn handle_sla(arena: &mut Arena, st: &mut Stack, latch: &mut Latch) {
    let b = st.pop(arena, latch);
    let a = st.pop(arena, latch);
    st.push(arena, a.wrapping_shl(b as u32 & 31), latch);
}

pub(super) fn handle_sra(arena: &mut Arena, st: &mut Stack, latch: &mut Latch) {
    let b = st.pop(arena, latch);
    let a = st.pop(arena, latch);
    st.push(arena, a.wrapping_shr(b as u32 & 31), latch);
}

pub(super) fn handle_srl(arena: &mut Arena, st: &mut Stack, latch: &mut Latch) {
    let b = st.pop(arena, latch);
    let a = st.pop(arena, latch);
    st.push(arena, ((a as U).wrapping_shr(b as u32 & 31)) as W, latch);
}
