//! # Native function bindings
//!
//! The original represents a bound host function as a raw `apply_t`
//! function pointer, cast into an arena byte cell (`P`) and called back
//! through a fixed arity-dispatch table. Rust has no sound way to store an
//! arbitrary function pointer in a byte buffer and call it back without
//! `unsafe` transmutes, so here `P` is instead a `u32` index into a
//! `Vec<NativeFn>` side table owned by the [`crate::Interpreter`] — an
//! opaque handle, exactly as wide a contract as the original's "opaque
//! fetch/store pair, not necessarily the same width as `W`" (see
//! `DESIGN.md`, Open Question (f)).

use crate::arena::{Arena, Binding, NameKind, W};
use crate::error::{Complaint, ComplaintKind, Latch};

/// Largest arity a bound native function may take. `CCALL`'s dispatch table
/// covers exactly this range.
pub const MAX_ARITY: u8 = 7;

/// A host-provided function, taking up to [`MAX_ARITY`] word-sized
/// arguments and returning one word-sized result.
pub type NativeFn = Box<dyn FnMut(&[W]) -> W>;

/// Owns the registered native functions, indexed by the same `u32` values
/// stored in the arena's cfunction bodies.
#[derive(Default)]
pub struct NativeTable {
    fns: Vec<NativeFn>,
}

impl NativeTable {
    pub fn new() -> Self {
        NativeTable { fns: Vec::new() }
    }

    /// Register `f` under `name` with the given `arity`, emitting a
    /// cfunction body (`{arity, table_index}`) into the arena's code region
    /// and binding a dictionary header for it.
    ///
    /// Unlike the original, which silently returns 0 for any out-of-range
    /// arity at call time, this implementation rejects the registration
    /// itself when `arity > MAX_ARITY` (see DESIGN.md Open Question (e)).
    pub fn bind(
        &mut self,
        arena: &mut Arena,
        latch: &mut Latch,
        name: &[u8],
        arity: u8,
        f: NativeFn,
    ) -> bool {
        if arity > MAX_ARITY {
            latch.raise(Complaint::new(ComplaintKind::Resource, "Arity out of range"));
            return false;
        }
        let body_off = arena.code_idx();
        arena.emit_byte(arity, latch);
        let idx = self.fns.len() as u32;
        arena.emit_p(idx, latch);
        if latch.is_raised() {
            return false;
        }
        self.fns.push(f);
        arena.bind(name, NameKind::CFunction, Binding::Index(body_off as u16), latch).is_some()
    }

    pub fn call(&mut self, idx: u32, args: &[W]) -> W {
        self.fns[idx as usize](args)
    }

    pub fn len(&self) -> usize {
        self.fns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{AlignPolicy, DEFAULT_CAPACITY};

    /// A worked registration example, standing in for the original's sample
    /// `moo()` native function: takes no arguments, returns a fixed word.
    fn moo(_args: &[W]) -> W {
        0x4d4f4f // "MOO" as a packed constant, just to have a visible effect
    }

    #[test]
    fn bind_and_call_roundtrip() {
        let mut arena = Arena::new(DEFAULT_CAPACITY, AlignPolicy::Unaligned);
        let mut latch = Latch::new();
        let mut table = NativeTable::new();
        assert!(table.bind(&mut arena, &mut latch, b"moo", 0, Box::new(moo)));
        let h = arena.lookup(b"moo").unwrap();
        assert_eq!(h.kind, NameKind::CFunction);
        let off = match h.binding {
            Binding::Index(x) => x as usize,
            _ => panic!("expected index binding"),
        };
        assert_eq!(arena.byte_at(off), 0);
        let idx = arena.fetch_p(off + 1);
        assert_eq!(table.call(idx, &[]), 0x4d4f4f);
    }

    #[test]
    fn arity_over_max_is_rejected() {
        let mut arena = Arena::new(DEFAULT_CAPACITY, AlignPolicy::Unaligned);
        let mut latch = Latch::new();
        let mut table = NativeTable::new();
        assert!(!table.bind(&mut arena, &mut latch, b"bad", 8, Box::new(moo)));
        assert!(latch.is_raised());
    }
}
