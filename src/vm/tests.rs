//! End-to-end scenarios driving the compiler and VM together through a
//! fresh [`crate::Interpreter`], exactly as an embedder's REPL would.

use std::io;

use crate::compiler::{CommandOutcome, Compiler};
use crate::error::Latch;
use crate::Interpreter;

/// Compile and run every command in `src` against a fresh interpreter,
/// in order, collecting the `Value` result of each bare expression.
/// Panics on the first complaint — these scenarios are all expected to
/// compile and run cleanly.
fn run_all(src: &str) -> Vec<i32> {
    let mut interp = Interpreter::new();
    let mut compiler = Compiler::new(io::Cursor::new(src.as_bytes().to_vec()));
    let mut values = Vec::new();
    while !compiler.at_eof() {
        let mut latch = Latch::new();
        let outcome = compiler.compile_command(
            &mut interp.arena,
            &mut interp.natives,
            &mut io::empty(),
            &mut io::sink(),
            &mut latch,
        );
        if let Some(c) = latch.get() {
            panic!("unexpected complaint: {}", c.message);
        }
        if let Some(CommandOutcome::Value(v)) = outcome {
            values.push(v);
        }
    }
    values
}

#[test]
fn s1_arithmetic_precedence() {
    assert_eq!(run_all("1 + 2 * 3\n"), vec![7]);
}

#[test]
fn s2_global_assignment() {
    assert_eq!(run_all("let a = 10\na : a + 5\na\n"), vec![15, 15]);
}

#[test]
fn s3_function_call() {
    assert_eq!(run_all("fun sq x = x * x\nsq 9\n"), vec![81]);
}

#[test]
fn s4_recursive_factorial() {
    let src = "fun fact n = if n then n * fact (n - 1) else 1\nfact 5\n";
    assert_eq!(run_all(src), vec![120]);
}

#[test]
fn s5_tail_call_does_not_overflow_the_stack() {
    let src = "fun sum n a = if n then sum (n - 1) (a + n) else a\nsum 1000 0\n";
    assert_eq!(run_all(src), vec![500_500]);
}

#[test]
fn s6_pointer_style_arena_access_via_cp() {
    let src = "let p = cp\npokeb p 0x41\nputc (*p)\n";
    // `pokeb` is a primitive call: it writes a byte through the address and
    // yields the value written; `putc` then reads it back through `*p` (a
    // byte fetch) and writes the low byte of its argument to the device.
    assert_eq!(run_all(src), vec![0x41, 0x41]);
}

#[test]
fn integer_literal_narrowing_is_transparent_at_the_boundaries() {
    // -128/-129 straddle PUSHB/PUSHW; 32767/32768 straddle PUSHW/PUSH.
    assert_eq!(run_all("-128\n"), vec![-128]);
    assert_eq!(run_all("-129\n"), vec![-129]);
    assert_eq!(run_all("32767\n"), vec![32767]);
    assert_eq!(run_all("32768\n"), vec![32768]);
}

#[test]
fn let_then_forget_removes_the_binding() {
    let mut interp = Interpreter::new();
    let mut compiler = Compiler::new(io::Cursor::new(b"let a = 5\n".to_vec()));
    let mut latch = Latch::new();
    compiler.compile_command(
        &mut interp.arena,
        &mut interp.natives,
        &mut io::empty(),
        &mut io::sink(),
        &mut latch,
    );
    assert!(interp.arena().lookup(b"a").is_some());

    let mut compiler = Compiler::new(io::Cursor::new(b"forget a\n".to_vec()));
    let mut latch = Latch::new();
    compiler.compile_command(
        &mut interp.arena,
        &mut interp.natives,
        &mut io::empty(),
        &mut io::sink(),
        &mut latch,
    );
    assert!(!latch.is_raised());
    assert!(interp.arena().lookup(b"a").is_none());
}

#[test]
fn fun_body_sees_its_own_arguments_as_locals() {
    assert_eq!(run_all("fun add x y = x + y\nadd 3 4\n"), vec![7]);
}
