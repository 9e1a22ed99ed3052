//! Embeddable compiler and virtual machine for a tiny interactive language.
//!
//! An [`Interpreter`] owns one [`Arena`]: a fixed-capacity byte buffer
//! holding compiled code, bound names, and (transiently, during execution)
//! the operand stack, all in the same region. There is no garbage
//! collector, no heap-allocated values beyond immutable byte strings, and
//! no dynamic dispatch beyond the small fixed instruction set — see
//! SPEC_FULL.md for the full design.

pub mod arena;
pub mod assembler;
pub mod bytecode;
pub mod compiler;
pub mod error;
pub mod lexer;
pub mod native;
pub mod primitives;
pub mod repl;
mod vm;

use std::io::{Read, Write};

use arena::{AlignPolicy, Arena, Binding, NameKind, C0_OFFSET, CP_OFFSET, D0_OFFSET, DP_OFFSET, X};
use error::{Complaint, Latch};
use native::{NativeFn, NativeTable};

/// A single interpreter instance: one arena, one native-function table.
/// Independent interpreters do not share any state (see DESIGN.md Open
/// Question (g)); there is no global mutable state anywhere in this crate
/// besides the read-only compiled-in primitive dictionary.
pub struct Interpreter {
    arena: Arena,
    natives: NativeTable,
    c0: usize,
    d0: usize,
}

impl Interpreter {
    /// Build a fresh interpreter with the default arena capacity (4096
    /// bytes).
    pub fn new() -> Self {
        Self::with_capacity(arena::DEFAULT_CAPACITY)
    }

    /// Build a fresh interpreter with a caller-chosen arena capacity
    /// (`capacity <= 65535`, per SPEC_FULL.md §3).
    pub fn with_capacity(capacity: usize) -> Self {
        let mut arena = Arena::new(capacity, AlignPolicy::default());
        let mut latch = Latch::new();

        // Reserve the four introspection globals; `emit_w` bumps `code_idx`
        // past each one as it's written. Their dictionary headers are bound
        // before `c0`/`d0` are captured, so the captured bounds describe the
        // store exactly as user code will first see it.
        for _ in 0..4 {
            arena.emit_w(0, &mut latch);
        }
        arena.bind(b"cp", NameKind::Global, Binding::Index(CP_OFFSET as X), &mut latch);
        arena.bind(b"dp", NameKind::Global, Binding::Index(DP_OFFSET as X), &mut latch);
        arena.bind(b"c0", NameKind::Global, Binding::Index(C0_OFFSET as X), &mut latch);
        arena.bind(b"d0", NameKind::Global, Binding::Index(D0_OFFSET as X), &mut latch);
        let c0 = arena.code_idx();
        let d0 = arena.dict_idx();
        arena.write_w(C0_OFFSET, c0 as i32);
        arena.write_w(D0_OFFSET, d0 as i32);

        Interpreter { arena, natives: NativeTable::new(), c0, d0 }
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Initial `code_idx`/`dict_idx`, just after the introspection globals
    /// were reserved (mirrors `c0`/`d0`).
    pub fn initial_bounds(&self) -> (usize, usize) {
        (self.c0, self.d0)
    }

    /// Register a host function callable from the language as `name(...)`.
    /// `arity` must be in `0..=7`.
    pub fn bind_c_function(&mut self, name: &[u8], arity: u8, f: NativeFn) -> Result<(), Complaint> {
        let mut latch = Latch::new();
        self.natives.bind(&mut self.arena, &mut latch, name, arity, f);
        match latch.get() {
            Some(c) => Err(c.clone()),
            None => Ok(()),
        }
    }

    /// Compile and execute every command in `source`, silently: there is no
    /// interactive device during a load, so `GETC` returns EOF immediately
    /// and `PUTC` output is discarded (see DESIGN.md). Returns the last
    /// complaint raised, if any — the CLI driver prints it and exits
    /// non-zero (SPEC_FULL.md §4, §6).
    pub fn load_file<R: Read>(&mut self, source: R) -> Option<Complaint> {
        repl::load_file(self, source)
    }

    /// Run an interactive, prompt-driven session reading commands (and
    /// `GETC` bytes) from `input`, writing prompts, results, and `PUTC`
    /// output to `out`.
    pub fn read_eval_print_loop<R: Read, W: Write>(&mut self, input: R, out: W) {
        repl::read_eval_print_loop(self, input, out);
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn introspection_globals_seeded_and_in_sync() {
        let interp = Interpreter::new();
        let (c0, d0) = interp.initial_bounds();
        assert_eq!(interp.arena().code_idx(), c0);
        assert_eq!(interp.arena().dict_idx(), d0);
        assert_eq!(interp.arena().fetch_w(C0_OFFSET) as usize, c0);
        assert_eq!(interp.arena().fetch_w(D0_OFFSET) as usize, d0);
    }

    #[test]
    fn load_file_defines_and_forgets() {
        let mut interp = Interpreter::new();
        assert!(interp.load_file(Cursor::new(b"let a = 5\n".to_vec())).is_none());
        assert!(interp.arena().lookup(b"a").is_some());
        assert!(interp.load_file(Cursor::new(b"forget a\n".to_vec())).is_none());
        assert!(interp.arena().lookup(b"a").is_none());
    }

    #[test]
    fn bind_c_function_is_callable_from_the_language() {
        let mut interp = Interpreter::new();
        interp.bind_c_function(b"double", 1, Box::new(|args| args[0] * 2)).unwrap();
        let mut out = Vec::new();
        interp.read_eval_print_loop(Cursor::new(b"double 21\n".to_vec()), &mut out);
        assert_eq!(String::from_utf8(out).unwrap(), "> 42\n> ");
    }
}
